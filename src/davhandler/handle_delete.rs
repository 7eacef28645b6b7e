use http::{Response, StatusCode};

use crate::body::Body;
use crate::davhandler::empty_response;
use crate::davpath::DavPath;
use crate::errors::DavError;
use crate::fs;
use crate::mount::Mountpoint;
use crate::DavResult;

impl crate::DavHandler {
    pub(crate) async fn handle_delete(
        &self,
        mount: &Mountpoint,
        path: &DavPath,
    ) -> DavResult<Response<Body>> {
        let abspath = mount.resolve_strict(path).await?;

        // lstat: a symlink is unlinked, never followed.
        let meta = tokio::fs::symlink_metadata(&abspath)
            .await
            .map_err(|_| DavError::NotFound)?;

        if meta.is_dir() {
            // fast path for an empty collection, recursive otherwise.
            if let Err(e) = tokio::fs::remove_dir(&abspath).await {
                let not_empty = e.raw_os_error() == Some(not_empty_errno());
                if !not_empty {
                    debug!("delete {abspath:?} failed: {e}");
                    return Err(DavError::Forbidden);
                }
                fs::remove_tree(&abspath)
                    .await
                    .map_err(|_| DavError::Forbidden)?;
            }
        } else {
            tokio::fs::remove_file(&abspath)
                .await
                .map_err(|_| DavError::Forbidden)?;
        }

        Ok(empty_response(StatusCode::OK))
    }
}

#[cfg(unix)]
fn not_empty_errno() -> i32 {
    libc::ENOTEMPTY
}

#[cfg(not(unix))]
fn not_empty_errno() -> i32 {
    // ERROR_DIR_NOT_EMPTY
    145
}
