//
// Crate-wide error type, and the mapping from errors to HTTP status codes.
//
use std::io;

use http::StatusCode;
use thiserror::Error;

pub type DavResult<T> = Result<T, DavError>;

/// Errors that can occur while handling a WebDAV request.
///
/// Most variants map 1:1 onto a client-visible status code, see
/// [`DavError::statuscode`]. I/O errors keep their `io::Error` so the
/// handlers can inspect the raw OS error where it matters.
#[derive(Debug, Error)]
pub enum DavError {
    /// Request target (or an intermediate path component) does not exist.
    #[error("resource not found")]
    NotFound,
    /// The parent collection of the target does not exist.
    #[error("parent collection does not exist")]
    Conflict,
    /// Filesystem refused the operation (open/unlink/xattr/permission).
    #[error("operation forbidden")]
    Forbidden,
    /// E.g. MKCOL on an existing resource.
    #[error("method not allowed on this resource")]
    MethodNotAllowed,
    /// `Overwrite: F` with an existing destination.
    #[error("precondition failed")]
    PreconditionFailed,
    /// A request body where none is expected (MKCOL).
    #[error("unsupported media type")]
    UnsupportedMediaType,
    /// An unexpired lock with a different token is held on the URI.
    #[error("resource is locked")]
    Locked,
    /// HTTP method outside the WebDAV set.
    #[error("unknown WebDAV method")]
    UnknownDavMethod,
    /// Request path did not percent-decode to valid UTF-8.
    #[error("invalid request path")]
    InvalidPath,
    /// Required XML body was missing or did not parse.
    #[error("unparseable XML body")]
    XmlParse,
    /// Failure while serialising a response document.
    #[error("XML serialisation failed: {0}")]
    XmlWrite(#[from] xml::writer::Error),
    /// The handler was built without any mountpoints.
    #[error("no mountpoints configured")]
    NotConfigured,
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    /// A bare status code (used where no richer kind applies).
    #[error("status {0}")]
    Status(StatusCode),
    /// Like `Status`, but the connection must be closed because the
    /// request body was not drained.
    #[error("status {0} (close)")]
    StatusClose(StatusCode),
}

impl DavError {
    /// The HTTP status code this error is reported as.
    pub fn statuscode(&self) -> StatusCode {
        match self {
            DavError::NotFound => StatusCode::NOT_FOUND,
            DavError::Conflict => StatusCode::CONFLICT,
            DavError::Forbidden => StatusCode::FORBIDDEN,
            DavError::MethodNotAllowed => StatusCode::METHOD_NOT_ALLOWED,
            DavError::PreconditionFailed => StatusCode::PRECONDITION_FAILED,
            DavError::UnsupportedMediaType => StatusCode::UNSUPPORTED_MEDIA_TYPE,
            DavError::Locked => StatusCode::LOCKED,
            DavError::UnknownDavMethod => StatusCode::NOT_IMPLEMENTED,
            DavError::InvalidPath => StatusCode::BAD_REQUEST,
            DavError::XmlParse => StatusCode::INTERNAL_SERVER_ERROR,
            DavError::XmlWrite(_) => StatusCode::INTERNAL_SERVER_ERROR,
            DavError::NotConfigured => StatusCode::INTERNAL_SERVER_ERROR,
            DavError::Io(e) => match e.kind() {
                io::ErrorKind::NotFound => StatusCode::NOT_FOUND,
                // everything else, permissions included, is a 403.
                _ => StatusCode::FORBIDDEN,
            },
            DavError::Status(sc) | DavError::StatusClose(sc) => *sc,
        }
    }

    /// True if the connection cannot be reused after this error.
    pub fn must_close(&self) -> bool {
        matches!(self, DavError::StatusClose(_))
    }
}

impl From<StatusCode> for DavError {
    fn from(sc: StatusCode) -> DavError {
        DavError::Status(sc)
    }
}

impl From<xmltree::ParseError> for DavError {
    fn from(_: xmltree::ParseError) -> DavError {
        DavError::XmlParse
    }
}
