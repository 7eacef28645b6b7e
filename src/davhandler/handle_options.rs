use headers::HeaderMapExt;
use http::{Request, Response};

use crate::body::Body;
use crate::davpath::DavPath;
use crate::mount::Mountpoint;
use crate::DavResult;

impl crate::DavHandler {
    pub(crate) async fn handle_options(
        &self,
        _req: &Request<()>,
        mount: &Mountpoint,
        path: &DavPath,
    ) -> DavResult<Response<Body>> {
        let mut res = Response::new(Body::empty());

        let h = res.headers_mut();
        h.insert("Dav", "1, 2".parse().unwrap());
        h.insert("MS-Author-Via", "DAV".parse().unwrap());
        h.typed_insert(headers::ContentLength(0));

        // Advertise what makes sense for the state of the resource:
        // creation methods on an unmapped URL, the full set otherwise.
        let meta = match mount.resolve_strict(path).await {
            Ok(abspath) => tokio::fs::metadata(abspath).await.ok(),
            Err(_) => None,
        };
        let allow = match meta {
            None => "OPTIONS,MKCOL,PUT,LOCK",
            Some(meta) if meta.is_dir() => {
                "OPTIONS,HEAD,GET,DELETE,PROPFIND,PROPPATCH,MKCOL,COPY,MOVE,LOCK,UNLOCK"
            }
            Some(_) => {
                "OPTIONS,HEAD,GET,PUT,DELETE,PROPFIND,PROPPATCH,COPY,MOVE,LOCK,UNLOCK"
            }
        };
        res.headers_mut().insert("Allow", allow.parse().unwrap());

        Ok(res)
    }
}
