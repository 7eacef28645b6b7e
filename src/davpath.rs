//! Decoded request paths.
//!
//! A [`DavPath`] is the percent-decoded part of the request URI below a
//! mountpoint prefix, together with that prefix. It only deals in URL
//! space; translation to a filesystem path is the mountpoint's job.

use std::fmt;

use percent_encoding::{percent_decode_str, utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};

use crate::errors::DavError;
use crate::DavResult;

// encode everything except unreserved characters and the path separator.
const PATH_ENCODE: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'/')
    .remove(b'-')
    .remove(b'.')
    .remove(b'_')
    .remove(b'~');

/// Percent-decode a raw URI path. Fails on non-UTF-8 escapes and on
/// embedded NUL.
pub(crate) fn decode_path(raw: &str) -> DavResult<String> {
    let decoded = percent_decode_str(raw)
        .decode_utf8()
        .map_err(|_| DavError::InvalidPath)?;
    if decoded.contains('\0') {
        return Err(DavError::InvalidPath);
    }
    Ok(decoded.into_owned())
}

pub(crate) fn encode_path(decoded: &str) -> String {
    utf8_percent_encode(decoded, PATH_ENCODE).to_string()
}

/// The request path below a mountpoint, decoded.
#[derive(Clone, PartialEq, Eq)]
pub struct DavPath {
    // mountpoint prefix ("" for a root mount, otherwise "/prefix").
    prefix: String,
    // decoded path inside the mount, always starting with '/'.
    path: String,
}

impl DavPath {
    pub(crate) fn new(prefix: &str, path: &str) -> DavPath {
        let path = if path.is_empty() {
            "/".to_string()
        } else {
            path.to_string()
        };
        DavPath {
            prefix: prefix.to_string(),
            path,
        }
    }

    /// The decoded path relative to the mount, starting with '/'.
    pub fn rel(&self) -> &str {
        &self.path
    }

    /// Full URL path (prefix included), percent-encoded for use in hrefs.
    pub fn as_url_string(&self) -> String {
        let mut s = encode_path(&self.prefix);
        s.push_str(&encode_path(&self.path));
        s
    }

    /// Does the path end in a slash (i.e. was it requested as a collection).
    pub fn is_collection(&self) -> bool {
        self.path.ends_with('/')
    }

    pub(crate) fn add_slash(&mut self) {
        if !self.path.ends_with('/') {
            self.path.push('/');
        }
    }

    /// Path of the parent collection, always slash-terminated.
    pub(crate) fn parent(&self) -> DavPath {
        let trimmed = self.path.trim_end_matches('/');
        let parent = match trimmed.rfind('/') {
            Some(0) | None => "/",
            Some(idx) => &trimmed[..=idx],
        };
        DavPath {
            prefix: self.prefix.clone(),
            path: parent.to_string(),
        }
    }

    /// Last path segment ("" for the mount root).
    pub fn file_name(&self) -> &str {
        let trimmed = self.path.trim_end_matches('/');
        match trimmed.rfind('/') {
            Some(idx) => &trimmed[idx + 1..],
            None => trimmed,
        }
    }

    /// Child path for a directory entry, slash-terminated if `is_dir`.
    pub(crate) fn with_segment(&self, name: &str, is_dir: bool) -> DavPath {
        let mut path = self.path.clone();
        if !path.ends_with('/') {
            path.push('/');
        }
        path.push_str(name);
        if is_dir {
            path.push('/');
        }
        DavPath {
            prefix: self.prefix.clone(),
            path,
        }
    }
}

impl fmt::Display for DavPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.prefix, self.path)
    }
}

impl fmt::Debug for DavPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", format!("{}{}", self.prefix, self.path))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decode_rejects_bad_escapes() {
        assert!(decode_path("/a%ff%fe").is_err());
        assert_eq!(decode_path("/a%20b").unwrap(), "/a b");
    }

    #[test]
    fn url_string_is_encoded() {
        let p = DavPath::new("/mnt", "/a b/c#d");
        assert_eq!(p.as_url_string(), "/mnt/a%20b/c%23d");
    }

    #[test]
    fn parent_and_file_name() {
        let p = DavPath::new("", "/a/b/c");
        assert_eq!(p.parent().rel(), "/a/b/");
        assert_eq!(p.file_name(), "c");
        let d = DavPath::new("", "/a/b/");
        assert_eq!(d.parent().rel(), "/a/");
        assert_eq!(d.file_name(), "b");
        let root = DavPath::new("", "/");
        assert_eq!(root.parent().rel(), "/");
        assert_eq!(root.file_name(), "");
    }

    #[test]
    fn with_segment_adds_separator() {
        let p = DavPath::new("", "/d/");
        assert_eq!(p.with_segment("x", false).rel(), "/d/x");
        assert_eq!(p.with_segment("sub", true).rel(), "/d/sub/");
        let q = DavPath::new("", "/d");
        assert_eq!(q.with_segment("x", false).rel(), "/d/x");
    }
}
