use std::cmp::Ordering;
use std::io::{self, Write};
use std::time::SystemTime;

use bitflags::bitflags;
use bytes::Bytes;
use headers::Header;

use crate::errors::DavError;
use crate::DavResult;

bitflags! {
    /// A set of WebDAV methods.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct DavMethodSet: u32 {
        const HEAD = 0x0001;
        const GET = 0x0002;
        const PUT = 0x0004;
        const OPTIONS = 0x0010;
        const PROPFIND = 0x0020;
        const PROPPATCH = 0x0040;
        const MKCOL = 0x0080;
        const COPY = 0x0100;
        const MOVE = 0x0200;
        const DELETE = 0x0400;
        const LOCK = 0x0800;
        const UNLOCK = 0x1000;

        // methods that may carry a request body.
        const WEBDAV_BODY = Self::PUT.bits()
            | Self::PROPFIND.bits() | Self::PROPPATCH.bits() | Self::LOCK.bits();
        // methods gated on the advisory lock registry.
        const MUTATING = Self::PUT.bits() | Self::DELETE.bits() | Self::MKCOL.bits()
            | Self::COPY.bits() | Self::MOVE.bits() | Self::PROPPATCH.bits();
    }
}

/// One WebDAV method, HTTP verbs included.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DavMethod {
    Head,
    Get,
    Put,
    Options,
    PropFind,
    PropPatch,
    MkCol,
    Copy,
    Move,
    Delete,
    Lock,
    Unlock,
}

impl DavMethod {
    /// Map an HTTP method onto the WebDAV set. The extension methods
    /// are not `http::Method` constants, so everything goes through the
    /// name.
    pub fn from_http(method: &http::Method) -> DavResult<DavMethod> {
        Ok(match method.as_str() {
            "OPTIONS" => DavMethod::Options,
            "HEAD" => DavMethod::Head,
            "GET" => DavMethod::Get,
            "PUT" => DavMethod::Put,
            "DELETE" => DavMethod::Delete,
            "PROPFIND" => DavMethod::PropFind,
            "PROPPATCH" => DavMethod::PropPatch,
            "MKCOL" => DavMethod::MkCol,
            "COPY" => DavMethod::Copy,
            "MOVE" => DavMethod::Move,
            "LOCK" => DavMethod::Lock,
            "UNLOCK" => DavMethod::Unlock,
            _ => return Err(DavError::UnknownDavMethod),
        })
    }

    /// This method as a singleton [`DavMethodSet`], for membership
    /// tests against the composed sets.
    pub fn as_set(self) -> DavMethodSet {
        match self {
            DavMethod::Head => DavMethodSet::HEAD,
            DavMethod::Get => DavMethodSet::GET,
            DavMethod::Put => DavMethodSet::PUT,
            DavMethod::Options => DavMethodSet::OPTIONS,
            DavMethod::PropFind => DavMethodSet::PROPFIND,
            DavMethod::PropPatch => DavMethodSet::PROPPATCH,
            DavMethod::MkCol => DavMethodSet::MKCOL,
            DavMethod::Copy => DavMethodSet::COPY,
            DavMethod::Move => DavMethodSet::MOVE,
            DavMethod::Delete => DavMethodSet::DELETE,
            DavMethod::Lock => DavMethodSet::LOCK,
            DavMethod::Unlock => DavMethodSet::UNLOCK,
        }
    }
}

impl std::convert::TryFrom<&http::Method> for DavMethod {
    type Error = DavError;

    fn try_from(method: &http::Method) -> DavResult<DavMethod> {
        DavMethod::from_http(method)
    }
}

/// The protocol string of the request, e.g. `HTTP/1.1`. Multi-status
/// documents repeat it verbatim in every `status` line.
pub fn protocol_string(version: http::Version) -> &'static str {
    match version {
        http::Version::HTTP_09 => "HTTP/0.9",
        http::Version::HTTP_10 => "HTTP/1.0",
        http::Version::HTTP_2 => "HTTP/2.0",
        http::Version::HTTP_3 => "HTTP/3.0",
        _ => "HTTP/1.1",
    }
}

/// Format a timestamp as an RFC 7231 HTTP-date, by way of the typed
/// `Date` header.
pub fn systemtime_to_httpdate(t: SystemTime) -> String {
    let mut encoded = Vec::with_capacity(1);
    headers::Date::from(t).encode(&mut encoded);
    encoded
        .first()
        .and_then(|value| value.to_str().ok())
        .unwrap_or_default()
        .to_string()
}

/// GNU versionsort-style ordering: runs of digits compare numerically,
/// everything else bytewise. Used for directory listings.
pub fn version_cmp(a: &str, b: &str) -> Ordering {
    let (a, b) = (a.as_bytes(), b.as_bytes());
    let (mut i, mut j) = (0, 0);
    while i < a.len() && j < b.len() {
        if a[i].is_ascii_digit() && b[j].is_ascii_digit() {
            let si = i;
            let sj = j;
            while i < a.len() && a[i].is_ascii_digit() {
                i += 1;
            }
            while j < b.len() && b[j].is_ascii_digit() {
                j += 1;
            }
            let na = &a[si..i];
            let nb = &b[sj..j];
            let ta = na.iter().position(|c| *c != b'0').unwrap_or(na.len());
            let tb = nb.iter().position(|c| *c != b'0').unwrap_or(nb.len());
            let (va, vb) = (&na[ta..], &nb[tb..]);
            let ord = va.len().cmp(&vb.len()).then_with(|| va.cmp(vb));
            if ord != Ordering::Equal {
                return ord;
            }
        } else {
            let ord = a[i].cmp(&b[j]);
            if ord != Ordering::Equal {
                return ord;
            }
            i += 1;
            j += 1;
        }
    }
    a.len().cmp(&b.len())
}

/// Minimal escaping for text dropped into the directory-listing HTML.
pub fn html_escape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            c => out.push(c),
        }
    }
    out
}

/// Grow-only byte sink for the XML emitter. [`MemBuffer::take`] hands
/// the accumulated document over as `Bytes` and resets the buffer.
#[derive(Default)]
pub struct MemBuffer {
    buf: Vec<u8>,
}

impl MemBuffer {
    pub fn new() -> MemBuffer {
        MemBuffer::default()
    }

    pub fn take(&mut self) -> Bytes {
        Bytes::from(std::mem::take(&mut self.buf))
    }
}

impl Write for MemBuffer {
    fn write(&mut self, data: &[u8]) -> io::Result<usize> {
        self.buf.extend_from_slice(data);
        Ok(data.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::UNIX_EPOCH;

    #[test]
    fn test_method_mapping() {
        assert_eq!(
            DavMethod::from_http(&http::Method::GET).unwrap(),
            DavMethod::Get
        );
        let propfind = http::Method::from_bytes(b"PROPFIND").unwrap();
        assert_eq!(
            DavMethod::from_http(&propfind).unwrap(),
            DavMethod::PropFind
        );
        assert!(DavMethod::from_http(&http::Method::TRACE).is_err());
        assert!(DavMethod::Put.as_set().intersects(DavMethodSet::MUTATING));
        assert!(!DavMethod::Get.as_set().intersects(DavMethodSet::MUTATING));
    }

    #[test]
    fn test_httpdate() {
        assert_eq!(
            systemtime_to_httpdate(UNIX_EPOCH),
            "Thu, 01 Jan 1970 00:00:00 GMT"
        );
    }

    #[test]
    fn test_membuffer_take_resets() {
        let mut buffer = MemBuffer::new();
        buffer.write_all(b"<a/>").unwrap();
        assert_eq!(buffer.take(), Bytes::from("<a/>"));
        assert!(buffer.take().is_empty());
    }

    #[test]
    fn test_version_cmp() {
        assert_eq!(version_cmp("file2", "file10"), Ordering::Less);
        assert_eq!(version_cmp("file10", "file2"), Ordering::Greater);
        assert_eq!(version_cmp("a02", "a2"), Ordering::Greater);
        assert_eq!(version_cmp("abc", "abd"), Ordering::Less);
        assert_eq!(version_cmp("same", "same"), Ordering::Equal);
    }

    #[test]
    fn test_html_escape() {
        assert_eq!(html_escape("a<b>&\"c\""), "a&lt;b&gt;&amp;&quot;c&quot;");
    }
}
