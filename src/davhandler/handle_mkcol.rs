use http::{Response, StatusCode};

use crate::body::Body;
use crate::davhandler::empty_response;
use crate::davpath::DavPath;
use crate::errors::DavError;
use crate::mount::Mountpoint;
use crate::DavResult;

impl crate::DavHandler {
    // A request body is already refused by the dispatcher (415).
    pub(crate) async fn handle_mkcol(
        &self,
        mount: &Mountpoint,
        path: &DavPath,
    ) -> DavResult<Response<Body>> {
        // the collection must not exist yet.
        if mount.resolve_strict(path).await.is_ok() {
            return Err(DavError::MethodNotAllowed);
        }

        let abspath = mount.resolve_parent(path).await?;
        if let Err(e) = tokio::fs::create_dir(&abspath).await {
            debug!("mkcol {abspath:?} failed: {e}");
            return Err(DavError::Conflict);
        }
        Ok(empty_response(StatusCode::CREATED))
    }
}
