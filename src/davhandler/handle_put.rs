use std::error::Error as StdError;

use bytes::buf::Buf;
use http::{Response, StatusCode};
use http_body::Body as HttpBody;
use tokio::io::AsyncWriteExt;

use crate::body::Body;
use crate::davhandler::empty_response;
use crate::davpath::DavPath;
use crate::errors::DavError;
use crate::mount::Mountpoint;
use crate::DavResult;

impl crate::DavHandler {
    pub(crate) async fn handle_put<ReqBody, ReqData, ReqError>(
        &self,
        mount: &Mountpoint,
        path: &DavPath,
        body: ReqBody,
    ) -> DavResult<Response<Body>>
    where
        ReqBody: HttpBody<Data = ReqData, Error = ReqError>,
        ReqData: Buf + Send + 'static,
        ReqError: StdError + Send + Sync + 'static,
    {
        // the target may not exist yet; its parent collection must.
        let abspath = match mount.resolve_strict(path).await {
            Ok(p) => p,
            Err(_) => mount.resolve_parent(path).await?,
        };

        let mut file = tokio::fs::OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(&abspath)
            .await
            .map_err(|_| DavError::Forbidden)?;

        // Stream the body to disk chunk by chunk. If the client goes
        // away mid-body the partial file is left as-is; no rollback.
        let mut body = Box::pin(body);
        while let Some(chunk) = body.data().await {
            let mut chunk = chunk.map_err(|_| DavError::Forbidden)?;
            file.write_all_buf(&mut chunk)
                .await
                .map_err(|_| DavError::Forbidden)?;
        }
        file.flush().await.map_err(|_| DavError::Forbidden)?;

        Ok(empty_response(StatusCode::CREATED))
    }
}
