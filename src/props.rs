//! The property store.
//!
//! Dead properties are kept as extended attributes on the resource
//! itself, one xattr per property. The key format is
//! `user.uwsgi.webdav.` followed by the namespace URI, a `|` separator
//! and the property name; properties without a namespace omit both the
//! URI and the separator. Because a namespace URI could itself contain
//! `|`, the namespace portion is stored with `%` and `|` percent-escaped,
//! so every key round-trips exactly to its (namespace, name) pair.
//!
//! Live properties are computed from `stat` and never stored.

use std::path::Path;

use xmltree::Element;

use crate::errors::DavError;
use crate::util::systemtime_to_httpdate;
use crate::xmltree_ext::ElementExt;
use crate::DavResult;

pub(crate) const XATTR_PREFIX: &str = "user.uwsgi.webdav.";
const NS_SEP: char = '|';

/// A dead property: name, optional namespace URI and the stored value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DavProp {
    pub name: String,
    pub namespace: Option<String>,
    pub value: Vec<u8>,
}

fn escape_ns(ns: &str) -> String {
    let mut out = String::with_capacity(ns.len());
    for c in ns.chars() {
        match c {
            '%' => out.push_str("%25"),
            NS_SEP => out.push_str("%7C"),
            c => out.push(c),
        }
    }
    out
}

fn unescape_ns(ns: &str) -> String {
    ns.replace("%7C", "|").replace("%25", "%")
}

/// Xattr key for a (namespace, name) pair.
pub(crate) fn encode_key(namespace: Option<&str>, name: &str) -> String {
    match namespace {
        Some(ns) => format!("{}{}{}{}", XATTR_PREFIX, escape_ns(ns), NS_SEP, name),
        None => format!("{XATTR_PREFIX}{name}"),
    }
}

/// Reverse of [`encode_key`]. `None` for keys outside our prefix.
pub(crate) fn decode_key(key: &str) -> Option<(Option<String>, String)> {
    let rest = key.strip_prefix(XATTR_PREFIX)?;
    if rest.is_empty() {
        return None;
    }
    match rest.split_once(NS_SEP) {
        Some((ns, name)) => Some((Some(unescape_ns(ns)), name.to_string())),
        None => Some((None, rest.to_string())),
    }
}

/// All dead properties of a resource. Read errors (including a
/// filesystem without xattr support) degrade to an empty list, so a
/// PROPFIND over a collection still renders every entry that stats.
pub(crate) fn dead_properties(path: &Path) -> Vec<DavProp> {
    #[cfg(unix)]
    {
        let keys = match xattr::list(path) {
            Ok(keys) => keys,
            Err(e) => {
                debug!("listxattr {path:?} failed: {e}");
                return Vec::new();
            }
        };
        let mut props = Vec::new();
        for key in keys {
            let Some(key) = key.to_str() else { continue };
            let Some((namespace, name)) = decode_key(key) else {
                continue;
            };
            match xattr::get(path, key) {
                Ok(Some(value)) => props.push(DavProp {
                    name,
                    namespace,
                    value,
                }),
                Ok(None) => {}
                Err(e) => debug!("getxattr {path:?} {key:?} failed: {e}"),
            }
        }
        props
    }
    #[cfg(not(unix))]
    {
        let _ = path;
        Vec::new()
    }
}

/// Store one dead property. Failures (xattr unsupported, permission)
/// are `Forbidden`; the caller renders them inside the multi-status body.
pub(crate) fn set_prop(
    path: &Path,
    namespace: Option<&str>,
    name: &str,
    value: &[u8],
) -> DavResult<()> {
    #[cfg(unix)]
    {
        let key = encode_key(namespace, name);
        xattr::set(path, &key, value).map_err(|e| {
            debug!("setxattr {path:?} {key:?} failed: {e}");
            DavError::Forbidden
        })
    }
    #[cfg(not(unix))]
    {
        let _ = (path, namespace, name, value);
        Err(DavError::Forbidden)
    }
}

pub(crate) fn del_prop(path: &Path, namespace: Option<&str>, name: &str) -> DavResult<()> {
    #[cfg(unix)]
    {
        let key = encode_key(namespace, name);
        xattr::remove(path, &key).map_err(|e| {
            debug!("removexattr {path:?} {key:?} failed: {e}");
            DavError::Forbidden
        })
    }
    #[cfg(not(unix))]
    {
        let _ = (path, namespace, name);
        Err(DavError::Forbidden)
    }
}

/// Copy every dead property of `from` onto `to`. Used by COPY; a source
/// without properties is not an error.
pub(crate) fn copy_dead_properties(from: &Path, to: &Path) {
    for prop in dead_properties(from) {
        let _ = set_prop(to, prop.namespace.as_deref(), &prop.name, &prop.value);
    }
}

/// Render a dead property as an XML element: the name, a default
/// namespace declaration when one is set, and the value as text.
pub(crate) fn dead_prop_element(prop: &DavProp, with_value: bool) -> Element {
    let mut elem = Element::new(&prop.name);
    if let Some(ns) = &prop.namespace {
        elem = elem.ns("", ns);
    }
    if with_value {
        elem = elem.text(String::from_utf8_lossy(&prop.value).into_owned());
    }
    elem
}

// creation time approximated by ctime where there is no birth time.
fn creation_time(meta: &std::fs::Metadata) -> Option<std::time::SystemTime> {
    #[cfg(unix)]
    {
        use std::os::unix::fs::MetadataExt;
        use std::time::{Duration, UNIX_EPOCH};
        let ctime = meta.ctime();
        if ctime >= 0 {
            return Some(UNIX_EPOCH + Duration::from_secs(ctime as u64));
        }
        None
    }
    #[cfg(not(unix))]
    {
        meta.created().ok()
    }
}

/// The live properties of a resource, as `D:`-prefixed elements.
/// `uri` is the request URI used for `displayname`. With `with_values`
/// unset only the (empty) property names are produced, for `propname`.
pub(crate) fn live_properties(
    uri: &str,
    path: &Path,
    meta: &std::fs::Metadata,
    with_values: bool,
) -> Vec<Element> {
    let mut props = Vec::new();
    if !with_values {
        props.push(Element::new2("D:displayname"));
        props.push(Element::new2("D:resourcetype"));
        if !meta.is_dir() {
            props.push(Element::new2("D:getcontentlength"));
            props.push(Element::new2("D:getcontenttype"));
        }
        props.push(Element::new2("D:creationdate"));
        props.push(Element::new2("D:getlastmodified"));
        return props;
    }

    props.push(Element::new2("D:displayname").text(uri));
    let mut rtype = Element::new2("D:resourcetype");
    if meta.is_dir() {
        rtype = rtype.push(Element::new2("D:collection"));
    } else {
        props.push(Element::new2("D:getcontentlength").text(meta.len().to_string()));
        if let Some(mime) = mime_guess::from_path(path).first_raw() {
            props.push(Element::new2("D:getcontenttype").text(mime));
        }
    }
    props.push(rtype);
    if let Some(created) = creation_time(meta) {
        props.push(Element::new2("D:creationdate").text(systemtime_to_httpdate(created)));
    }
    if let Ok(modified) = meta.modified() {
        props.push(Element::new2("D:getlastmodified").text(systemtime_to_httpdate(modified)));
    }
    #[cfg(unix)]
    props.push(Element::new2("D:executable"));
    props
}

/// Does a requested property element match a live property we produce.
pub(crate) fn matches_live(requested: &Element, live: &Element) -> bool {
    requested.name == live.name
        && requested.namespace.as_deref() == Some(crate::multistatus::NS_DAV_URI)
}

/// Does a requested property element name a dead property.
pub(crate) fn matches_dead(requested: &Element, prop: &DavProp) -> bool {
    requested.name == prop.name && requested.namespace == prop.namespace
}
