//
// The handler entry point: the configuration builder, the per-request
// pipeline, and the helpers the method handlers share.
//
use std::error::Error as StdError;
use std::io;
use std::path::PathBuf;
use std::sync::Arc;

use bytes::buf::Buf;
use headers::HeaderMapExt;
use http::{Request, Response, StatusCode};
use http_body::Body as HttpBody;

use crate::body::Body;
use crate::cache::{DavCache, MemCache};
use crate::davheaders;
use crate::davpath::{decode_path, DavPath};
use crate::errors::DavError;
use crate::locks::LockManager;
use crate::mount::{MountTable, Mountpoint};
use crate::util::{DavMethod, DavMethodSet};
use crate::DavResult;

pub mod handle_copymove;
pub mod handle_delete;
pub mod handle_gethead;
pub mod handle_lock;
pub mod handle_mkcol;
pub mod handle_options;
pub mod handle_props;
pub mod handle_put;

/// Buffer size for file reads and body writes.
pub(crate) const READ_BUF_SIZE: usize = 32768;
// XML request bodies are pre-read and bounded.
const MAX_XML_BODY: usize = 65536;

/// Collects configuration for a [`DavHandler`].
#[derive(Clone)]
pub struct DavBuilder {
    /// Mountpoints: URL prefix and directory pairs.
    mounts: Vec<(String, PathBuf)>,
    /// Stylesheet URLs for the directory listing.
    css: Vec<String>,
    /// Script URLs for the directory listing.
    javascript: Vec<String>,
    /// CSS class of directory entries in the listing.
    class_directory: Option<String>,
    /// Identifier of the wrapping `div` in the listing.
    div: Option<String>,
    /// Cache backing the lock registry (in-process if not set).
    lock_cache: Option<Arc<dyn DavCache>>,
    /// Read buffer size in bytes.
    read_buf_size: usize,
}

impl Default for DavBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl DavBuilder {
    /// An empty configuration with default buffer sizes.
    pub fn new() -> DavBuilder {
        DavBuilder {
            mounts: Vec::new(),
            css: Vec::new(),
            javascript: Vec::new(),
            class_directory: None,
            div: None,
            lock_cache: None,
            read_buf_size: READ_BUF_SIZE,
        }
    }

    /// Map a filesystem directory as a webdav store under `prefix`.
    pub fn mount(self, prefix: impl Into<String>, dir: impl Into<PathBuf>) -> Self {
        let mut this = self;
        this.mounts.push((prefix.into(), dir.into()));
        this
    }

    /// Add a stylesheet url for the directory listing.
    pub fn css(self, url: impl Into<String>) -> Self {
        let mut this = self;
        this.css.push(url.into());
        this
    }

    /// Add a javascript url for the directory listing.
    pub fn javascript(self, url: impl Into<String>) -> Self {
        let mut this = self;
        this.javascript.push(url.into());
        this
    }

    /// Set the css class for directory entries in the listing.
    pub fn class_directory(self, class: impl Into<String>) -> Self {
        let mut this = self;
        this.class_directory = Some(class.into());
        this
    }

    /// Set the id of the div wrapping the directory listing.
    pub fn div(self, id: impl Into<String>) -> Self {
        let mut this = self;
        this.div = Some(id.into());
        this
    }

    /// Use a shared cache for the lock registry, so multiple workers
    /// see one lock view. Defaults to an in-process cache.
    pub fn lock_cache(self, cache: Arc<dyn DavCache>) -> Self {
        let mut this = self;
        this.lock_cache = Some(cache);
        this
    }

    /// Read buffer size in bytes.
    pub fn read_buf_size(self, size: usize) -> Self {
        let mut this = self;
        this.read_buf_size = size;
        this
    }

    /// Canonicalise the mountpoints and build the handler. Fails if a
    /// configured directory does not exist.
    pub fn build(self) -> io::Result<DavHandler> {
        let mut mounts = Vec::with_capacity(self.mounts.len());
        for (prefix, dir) in self.mounts {
            mounts.push(Mountpoint::new(prefix, dir)?);
        }
        let cache = self
            .lock_cache
            .unwrap_or_else(|| Arc::new(MemCache::new()));
        Ok(DavHandler {
            mounts: Arc::new(MountTable::new(mounts)),
            opts: Arc::new(DavOptions {
                css: self.css,
                javascript: self.javascript,
                class_directory: self.class_directory,
                div: self.div,
                read_buf_size: self.read_buf_size,
            }),
            ls: LockManager::new(cache),
        })
    }
}

// Options consulted while rendering responses.
pub(crate) struct DavOptions {
    pub css: Vec<String>,
    pub javascript: Vec<String>,
    pub class_directory: Option<String>,
    pub div: Option<String>,
    pub read_buf_size: usize,
}

/// The WebDAV engine itself.
///
/// Built once from a [`DavBuilder`]; cheap to clone and share between
/// workers. The mountpoint table is immutable after construction, the
/// only shared mutable state lives behind the lock cache.
#[derive(Clone)]
pub struct DavHandler {
    pub(crate) mounts: Arc<MountTable>,
    pub(crate) opts: Arc<DavOptions>,
    pub(crate) ls: LockManager,
}

impl DavHandler {
    /// Start building a handler configuration.
    pub fn builder() -> DavBuilder {
        DavBuilder::new()
    }

    /// Run one request through the WebDAV engine. Protocol errors come
    /// back as finished responses, never as `Err`.
    pub async fn handle<ReqBody, ReqData, ReqError>(&self, req: Request<ReqBody>) -> Response<Body>
    where
        ReqData: Buf + Send + 'static,
        ReqError: StdError + Send + Sync + 'static,
        ReqBody: HttpBody<Data = ReqData, Error = ReqError>,
    {
        match self.handle2(req).await {
            Ok(resp) => resp,
            Err(err) => {
                debug!("request failed: {:?} -> {}", err, err.statuscode());
                let mut resp = empty_response(err.statuscode());
                if err.must_close() {
                    resp.headers_mut()
                        .insert("Connection", "close".parse().unwrap());
                }
                resp
            }
        }
    }

    // request pipeline: validate, resolve the mount, gate on locks,
    // dispatch to the method handler.
    async fn handle2<ReqBody, ReqData, ReqError>(
        &self,
        req: Request<ReqBody>,
    ) -> DavResult<Response<Body>>
    where
        ReqBody: HttpBody<Data = ReqData, Error = ReqError>,
        ReqData: Buf + Send + 'static,
        ReqError: StdError + Send + Sync + 'static,
    {
        let (req, body) = {
            let (parts, body) = req.into_parts();
            (Request::from_parts(parts, ()), body)
        };

        if self.mounts.is_empty() {
            error!("no mountpoints configured");
            return Err(DavError::NotConfigured);
        }

        // map the HTTP verb onto the WebDAV method set.
        let method = match DavMethod::from_http(req.method()) {
            Ok(m) => m,
            Err(e) => {
                debug!("refusing method {} request {}", req.method(), req.uri());
                return Err(e);
            }
        };

        // make sure the request path is valid and mounted.
        let path_info = decode_path(req.uri().path())?;
        if path_info.is_empty() {
            return Err(DavError::Forbidden);
        }
        let Some((mount, rest)) = self.mounts.find(&path_info) else {
            debug!("no mountpoint for {}", path_info);
            return Err(DavError::Forbidden);
        };
        let path = DavPath::new(mount.prefix(), rest);

        // Only PUT consumes its body as a stream; everything else gets
        // a bounded pre-read buffer.
        let (body_strm, body_data) = match method {
            DavMethod::Put => (Some(body), Vec::new()),
            _ => (None, self.read_request(body, MAX_XML_BODY).await?),
        };

        // methods outside WEBDAV_BODY must not carry one.
        if !method.as_set().intersects(DavMethodSet::WEBDAV_BODY) && !body_data.is_empty() {
            return Err(StatusCode::UNSUPPORTED_MEDIA_TYPE.into());
        }

        debug!("dispatch {:?} {}", method, path);

        // the lock registry is advisory: a mutating request on a locked
        // URI must submit the lock token.
        if method.as_set().intersects(DavMethodSet::MUTATING) {
            let uri = self.lock_uri(&req, &path);
            let submitted = self.submitted_tokens(&req);
            if !self.ls.allows(&uri, &submitted).await {
                debug!("{} locked, no matching token submitted", uri);
                return Err(DavError::Locked);
            }
        }

        match method {
            DavMethod::Options => self.handle_options(&req, mount, &path).await,
            DavMethod::PropFind => self.handle_propfind(&req, mount, &path, &body_data).await,
            DavMethod::PropPatch => self.handle_proppatch(&req, mount, &path, &body_data).await,
            DavMethod::MkCol => self.handle_mkcol(mount, &path).await,
            DavMethod::Delete => self.handle_delete(mount, &path).await,
            DavMethod::Lock => self.handle_lock(&req, mount, &path, &body_data).await,
            DavMethod::Unlock => self.handle_unlock(&req, &path).await,
            DavMethod::Head => self.handle_get(&req, mount, &path, false).await,
            DavMethod::Get => self.handle_get(&req, mount, &path, true).await,
            DavMethod::Copy | DavMethod::Move => {
                self.handle_copymove(&req, mount, &path, method).await
            }
            DavMethod::Put => self.handle_put(mount, &path, body_strm.unwrap()).await,
        }
    }

    // Pre-read a request body into memory. Bodies over `max_size` are
    // refused; an aborted transfer surfaces as an I/O error.
    pub(crate) async fn read_request<ReqBody, ReqData, ReqError>(
        &self,
        body: ReqBody,
        max_size: usize,
    ) -> DavResult<Vec<u8>>
    where
        ReqBody: HttpBody<Data = ReqData, Error = ReqError>,
        ReqData: Buf + Send + 'static,
        ReqError: StdError + Send + Sync + 'static,
    {
        let mut body = Box::pin(body);
        let mut data = Vec::new();
        while let Some(chunk) = body.data().await {
            let mut chunk = chunk
                .map_err(|_| DavError::Io(io::Error::from(io::ErrorKind::UnexpectedEof)))?;
            let len = chunk.remaining();
            if data.len() + len > max_size {
                return Err(StatusCode::PAYLOAD_TOO_LARGE.into());
            }
            data.extend_from_slice(&chunk.copy_to_bytes(len));
        }
        Ok(data)
    }

    // The fully qualified URI that keys the lock registry. Includes
    // scheme and host so that locks are scoped per virtual host.
    pub(crate) fn lock_uri(&self, req: &Request<()>, path: &DavPath) -> String {
        let scheme = req.uri().scheme_str().unwrap_or("http");
        let host = match req.uri().authority() {
            Some(authority) => authority.as_str().to_string(),
            None => req
                .headers()
                .get(http::header::HOST)
                .and_then(|h| h.to_str().ok())
                .unwrap_or("")
                .to_string(),
        };
        format!("{}://{}{}", scheme, host, path.as_url_string())
    }

    // lock tokens submitted with the request (If and Lock-Token).
    pub(crate) fn submitted_tokens(&self, req: &Request<()>) -> Vec<String> {
        let mut tokens = req
            .headers()
            .typed_get::<davheaders::If>()
            .map(|i| i.0)
            .unwrap_or_default();
        if let Some(davheaders::LockToken(token)) = req.headers().typed_get() {
            tokens.push(token);
        }
        tokens
    }
}

// an empty-bodied response with an exact Content-Length.
pub(crate) fn empty_response(status: StatusCode) -> Response<Body> {
    let mut res = Response::new(Body::empty());
    *res.status_mut() = status;
    res.headers_mut().typed_insert(headers::ContentLength(0));
    res
}
