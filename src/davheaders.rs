//! Typed versions of the WebDAV request headers.

use std::time::Duration;

use headers::{Header, HeaderName, HeaderValue};

lazy_static! {
    static ref DEPTH: HeaderName = HeaderName::from_static("depth");
    static ref DESTINATION: HeaderName = HeaderName::from_static("destination");
    static ref OVERWRITE: HeaderName = HeaderName::from_static("overwrite");
    static ref TIMEOUT: HeaderName = HeaderName::from_static("timeout");
    static ref IF: HeaderName = HeaderName::from_static("if");
    static ref LOCK_TOKEN: HeaderName = HeaderName::from_static("lock-token");
}

/// `Depth` header: 0, 1 or infinity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Depth {
    Zero,
    One,
    Infinity,
}

impl Header for Depth {
    fn name() -> &'static HeaderName {
        &DEPTH
    }

    fn decode<'i, I>(values: &mut I) -> Result<Self, headers::Error>
    where
        I: Iterator<Item = &'i HeaderValue>,
    {
        let value = values.next().ok_or_else(headers::Error::invalid)?;
        match value.to_str().map_err(|_| headers::Error::invalid())?.trim() {
            "0" => Ok(Depth::Zero),
            "1" => Ok(Depth::One),
            s if s.eq_ignore_ascii_case("infinity") => Ok(Depth::Infinity),
            _ => Err(headers::Error::invalid()),
        }
    }

    fn encode<E: Extend<HeaderValue>>(&self, values: &mut E) {
        let s = match self {
            Depth::Zero => "0",
            Depth::One => "1",
            Depth::Infinity => "infinity",
        };
        values.extend(std::iter::once(HeaderValue::from_static(s)));
    }
}

/// `Destination` header: the absolute URL of a COPY/MOVE target.
#[derive(Debug, Clone)]
pub struct Destination(pub String);

impl Destination {
    /// Strip scheme and host, leaving the request path. The scheme is
    /// assumed to be `http` when the value carries none.
    pub fn path(&self) -> &str {
        let s = self.0.as_str();
        match s.find("://") {
            Some(idx) => {
                let after_host = &s[idx + 3..];
                match after_host.find('/') {
                    Some(slash) => &after_host[slash..],
                    None => "/",
                }
            }
            None => s,
        }
    }
}

impl Header for Destination {
    fn name() -> &'static HeaderName {
        &DESTINATION
    }

    fn decode<'i, I>(values: &mut I) -> Result<Self, headers::Error>
    where
        I: Iterator<Item = &'i HeaderValue>,
    {
        let value = values.next().ok_or_else(headers::Error::invalid)?;
        let s = value.to_str().map_err(|_| headers::Error::invalid())?;
        Ok(Destination(s.trim().to_string()))
    }

    fn encode<E: Extend<HeaderValue>>(&self, values: &mut E) {
        if let Ok(v) = HeaderValue::from_str(&self.0) {
            values.extend(std::iter::once(v));
        }
    }
}

/// `Overwrite` header: `T` or `F`. Absent means `T`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Overwrite(pub bool);

impl Header for Overwrite {
    fn name() -> &'static HeaderName {
        &OVERWRITE
    }

    fn decode<'i, I>(values: &mut I) -> Result<Self, headers::Error>
    where
        I: Iterator<Item = &'i HeaderValue>,
    {
        let value = values.next().ok_or_else(headers::Error::invalid)?;
        match value.as_bytes().first() {
            Some(b'T') | Some(b't') => Ok(Overwrite(true)),
            Some(b'F') | Some(b'f') => Ok(Overwrite(false)),
            _ => Err(headers::Error::invalid()),
        }
    }

    fn encode<E: Extend<HeaderValue>>(&self, values: &mut E) {
        let s = if self.0 { "T" } else { "F" };
        values.extend(std::iter::once(HeaderValue::from_static(s)));
    }
}

/// `Timeout` header on LOCK. `Second-N` yields a duration, `Infinite`
/// (or anything unparseable) yields `None` and the caller's default.
#[derive(Debug, Clone, Copy)]
pub struct DavTimeout(pub Option<Duration>);

impl Header for DavTimeout {
    fn name() -> &'static HeaderName {
        &TIMEOUT
    }

    fn decode<'i, I>(values: &mut I) -> Result<Self, headers::Error>
    where
        I: Iterator<Item = &'i HeaderValue>,
    {
        let value = values.next().ok_or_else(headers::Error::invalid)?;
        let s = value.to_str().map_err(|_| headers::Error::invalid())?;
        for part in s.split(',') {
            let part = part.trim();
            if let Some(secs) = part.strip_prefix("Second-") {
                if let Ok(n) = secs.parse::<u64>() {
                    return Ok(DavTimeout(Some(Duration::from_secs(n))));
                }
            }
        }
        Ok(DavTimeout(None))
    }

    fn encode<E: Extend<HeaderValue>>(&self, values: &mut E) {
        let s = match self.0 {
            Some(d) => format!("Second-{}", d.as_secs()),
            None => "Infinite".to_string(),
        };
        if let Ok(v) = HeaderValue::from_str(&s) {
            values.extend(std::iter::once(v));
        }
    }
}

/// `If` header, reduced to the list of submitted state tokens. The
/// full RFC 4918 conditional syntax carries resource tags and etags as
/// well; the lock registry only needs the `<...>` tokens.
#[derive(Debug, Clone, Default)]
pub struct If(pub Vec<String>);

impl Header for If {
    fn name() -> &'static HeaderName {
        &IF
    }

    fn decode<'i, I>(values: &mut I) -> Result<Self, headers::Error>
    where
        I: Iterator<Item = &'i HeaderValue>,
    {
        let mut tokens = Vec::new();
        for value in values {
            let s = value.to_str().map_err(|_| headers::Error::invalid())?;
            let mut rest = s;
            while let Some(start) = rest.find('<') {
                let Some(len) = rest[start + 1..].find('>') else {
                    break;
                };
                tokens.push(rest[start + 1..start + 1 + len].to_string());
                rest = &rest[start + 1 + len + 1..];
            }
        }
        Ok(If(tokens))
    }

    fn encode<E: Extend<HeaderValue>>(&self, values: &mut E) {
        let s = self
            .0
            .iter()
            .map(|t| format!("(<{t}>)"))
            .collect::<Vec<_>>()
            .join(" ");
        if let Ok(v) = HeaderValue::from_str(&s) {
            values.extend(std::iter::once(v));
        }
    }
}

/// `Lock-Token` header, angle brackets removed.
#[derive(Debug, Clone)]
pub struct LockToken(pub String);

impl Header for LockToken {
    fn name() -> &'static HeaderName {
        &LOCK_TOKEN
    }

    fn decode<'i, I>(values: &mut I) -> Result<Self, headers::Error>
    where
        I: Iterator<Item = &'i HeaderValue>,
    {
        let value = values.next().ok_or_else(headers::Error::invalid)?;
        let s = value.to_str().map_err(|_| headers::Error::invalid())?;
        let s = s.trim().trim_start_matches('<').trim_end_matches('>');
        Ok(LockToken(s.to_string()))
    }

    fn encode<E: Extend<HeaderValue>>(&self, values: &mut E) {
        if let Ok(v) = HeaderValue::from_str(&format!("<{}>", self.0)) {
            values.extend(std::iter::once(v));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use headers::HeaderMapExt;
    use http::HeaderMap;

    fn map_with(name: &'static str, value: &str) -> HeaderMap {
        let mut map = HeaderMap::new();
        map.insert(name, HeaderValue::from_str(value).unwrap());
        map
    }

    #[test]
    fn depth_values() {
        assert_eq!(map_with("depth", "0").typed_get::<Depth>(), Some(Depth::Zero));
        assert_eq!(
            map_with("depth", "Infinity").typed_get::<Depth>(),
            Some(Depth::Infinity)
        );
        assert_eq!(map_with("depth", "2").typed_get::<Depth>(), None);
    }

    #[test]
    fn destination_strips_scheme_and_host() {
        let d = Destination("http://example.com/dir/file.txt".to_string());
        assert_eq!(d.path(), "/dir/file.txt");
        let d = Destination("/dir/file.txt".to_string());
        assert_eq!(d.path(), "/dir/file.txt");
        let d = Destination("https://example.com".to_string());
        assert_eq!(d.path(), "/");
    }

    #[test]
    fn timeout_parses_seconds() {
        let t = map_with("timeout", "Infinite, Second-600")
            .typed_get::<DavTimeout>()
            .unwrap();
        assert_eq!(t.0, Some(Duration::from_secs(600)));
        let t = map_with("timeout", "Infinite").typed_get::<DavTimeout>().unwrap();
        assert_eq!(t.0, None);
    }

    #[test]
    fn if_header_collects_tokens() {
        let i = map_with(
            "if",
            "(<opaquelocktoken:abc> [\"etag\"]) (Not <urn:x>)",
        )
        .typed_get::<If>()
        .unwrap();
        assert_eq!(i.0, vec!["opaquelocktoken:abc", "urn:x"]);
    }

    #[test]
    fn lock_token_strips_brackets() {
        let t = map_with("lock-token", "<opaquelocktoken:abc>")
            .typed_get::<LockToken>()
            .unwrap();
        assert_eq!(t.0, "opaquelocktoken:abc");
    }
}
