use headers::HeaderMapExt;
use http::{Request, Response, StatusCode};

use crate::body::Body;
use crate::davhandler::empty_response;
use crate::davheaders;
use crate::davpath::{decode_path, DavPath};
use crate::errors::DavError;
use crate::fs;
use crate::mount::Mountpoint;
use crate::util::DavMethod;
use crate::DavResult;

impl crate::DavHandler {
    pub(crate) async fn handle_copymove(
        &self,
        req: &Request<()>,
        mount: &Mountpoint,
        path: &DavPath,
        method: DavMethod,
    ) -> DavResult<Response<Body>> {
        let source = mount.resolve_strict(path).await?;

        let Some(dest) = req.headers().typed_get::<davheaders::Destination>() else {
            return Err(DavError::Forbidden);
        };
        let overwrite = req
            .headers()
            .typed_get::<davheaders::Overwrite>()
            .map(|o| o.0)
            .unwrap_or(true);

        // the destination resolves through the mount table like any
        // other request path.
        let dest_info = decode_path(dest.path())?;
        let Some((dest_mount, dest_rest)) = self.mounts.find(&dest_info) else {
            debug!("destination {} not mounted", dest_info);
            return Err(DavError::Conflict);
        };
        let dest_path = DavPath::new(dest_mount.prefix(), dest_rest);

        let (dest_abs, existed) = match dest_mount.resolve_strict(&dest_path).await {
            Ok(p) => {
                if !overwrite {
                    return Err(DavError::PreconditionFailed);
                }
                (p, true)
            }
            Err(_) => (dest_mount.resolve_parent(&dest_path).await?, false),
        };

        if source == dest_abs {
            return Err(DavError::Forbidden);
        }

        // with Overwrite: T an existing destination is replaced.
        if existed {
            fs::remove_any(&dest_abs)
                .await
                .map_err(|_| DavError::Forbidden)?;
        }

        match method {
            DavMethod::Move => {
                tokio::fs::rename(&source, &dest_abs).await.map_err(|e| {
                    debug!("rename {source:?} -> {dest_abs:?} failed: {e}");
                    DavError::Forbidden
                })?;
            }
            _ => {
                let meta = tokio::fs::metadata(&source)
                    .await
                    .map_err(|_| DavError::Forbidden)?;
                if meta.is_dir() {
                    fs::copy_tree(&source, &dest_abs).await.map_err(|e| {
                        debug!("copy {source:?} -> {dest_abs:?} failed: {e}");
                        DavError::Forbidden
                    })?;
                } else {
                    fs::copy_file(&source, &dest_abs).await.map_err(|e| {
                        debug!("copy {source:?} -> {dest_abs:?} failed: {e}");
                        DavError::Forbidden
                    })?;
                }
            }
        }

        if existed {
            Ok(empty_response(StatusCode::NO_CONTENT))
        } else {
            Ok(empty_response(StatusCode::CREATED))
        }
    }
}
