use headers::HeaderMapExt;
use http::{Request, Response, StatusCode};
use xmltree::Element;

use crate::body::Body;
use crate::davhandler::empty_response;
use crate::davheaders;
use crate::davpath::DavPath;
use crate::errors::DavError;
use crate::locks::{effective_timeout, DavLock, LockDepth};
use crate::mount::Mountpoint;
use crate::multistatus::{parse_lockinfo, NS_DAV_URI, XML_CONTENT_TYPE};
use crate::util::MemBuffer;
use crate::xmltree_ext::{write_document, ElementExt};
use crate::DavResult;

impl crate::DavHandler {
    pub(crate) async fn handle_lock(
        &self,
        req: &Request<()>,
        mount: &Mountpoint,
        path: &DavPath,
        body: &[u8],
    ) -> DavResult<Response<Body>> {
        let uri = self.lock_uri(req, path);
        let timeout = effective_timeout(
            req.headers()
                .typed_get::<davheaders::DavTimeout>()
                .and_then(|t| t.0),
        );

        // a bodyless LOCK refreshes a held lock, identified by the
        // submitted token.
        if body.is_empty() {
            for token in self.submitted_tokens(req) {
                if let Ok(lock) = self.ls.refresh(&uri, &token, timeout).await {
                    return lock_response(StatusCode::OK, &lock, path);
                }
            }
            return Err(DavError::PreconditionFailed);
        }

        let info = parse_lockinfo(body)?;
        if !info.exclusive {
            // the registry hands out exclusive locks only; a
            // shared-scope request gets the stricter scope.
            debug!("shared lock requested on {uri}, granting exclusive");
        }
        let depth = match req.headers().typed_get::<davheaders::Depth>() {
            Some(davheaders::Depth::Zero) => LockDepth::Zero,
            Some(davheaders::Depth::One) => {
                return Err(StatusCode::BAD_REQUEST.into());
            }
            _ => LockDepth::Infinity,
        };

        // locking an unmapped URL creates an empty resource.
        let created = match mount.resolve_strict(path).await {
            Ok(_) => false,
            Err(_) => {
                let abspath = mount.resolve_parent(path).await?;
                match tokio::fs::OpenOptions::new()
                    .write(true)
                    .create_new(true)
                    .open(&abspath)
                    .await
                {
                    Ok(_) => true,
                    Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => false,
                    Err(e) => {
                        debug!("lock-null create {abspath:?} failed: {e}");
                        return Err(DavError::Forbidden);
                    }
                }
            }
        };

        let lock = self.ls.acquire(&uri, info.owner, depth, timeout).await?;
        let status = if created {
            StatusCode::CREATED
        } else {
            StatusCode::OK
        };
        lock_response(status, &lock, path)
    }

    pub(crate) async fn handle_unlock(
        &self,
        req: &Request<()>,
        path: &DavPath,
    ) -> DavResult<Response<Body>> {
        let uri = self.lock_uri(req, path);
        let Some(davheaders::LockToken(token)) = req.headers().typed_get() else {
            return Err(DavError::Conflict);
        };
        match self.ls.release(&uri, &token).await {
            Ok(()) => Ok(empty_response(StatusCode::NO_CONTENT)),
            // an unknown token is a conflict, not a 404: the resource
            // itself may well exist.
            Err(_) => Err(DavError::Conflict),
        }
    }
}

// `prop/lockdiscovery/activelock` document plus the Lock-Token header.
fn lock_response(
    status: StatusCode,
    lock: &DavLock,
    path: &DavPath,
) -> DavResult<Response<Body>> {
    let mut active = Element::new2("D:activelock")
        .push(Element::new2("D:locktype").push(Element::new2("D:write")))
        .push(Element::new2("D:lockscope").push(Element::new2("D:exclusive")))
        .push(Element::new2("D:depth").text(lock.depth.as_str()));
    if let Some(owner) = &lock.owner {
        active = active.push(Element::new2("D:owner").text(owner.clone()));
    }
    let active = active
        .push(Element::new2("D:timeout").text(format!("Second-{}", lock.timeout)))
        .push(
            Element::new2("D:locktoken")
                .push(Element::new2("D:href").text(lock.token.clone())),
        )
        .push(
            Element::new2("D:lockroot")
                .push(Element::new2("D:href").text(path.as_url_string())),
        );

    let root = Element::new2("D:prop")
        .ns("D", NS_DAV_URI)
        .push(Element::new2("D:lockdiscovery").push(active));

    let mut buffer = MemBuffer::new();
    write_document(&root, &mut buffer)?;
    let bytes = buffer.take();

    let resp = Response::builder()
        .status(status)
        .header("Content-Type", XML_CONTENT_TYPE)
        .header("Content-Length", bytes.len().to_string())
        .header("Lock-Token", format!("<{}>", lock.token))
        .body(Body::from(bytes))
        .unwrap();
    Ok(resp)
}
