//! The XML engine: parsing of PROPFIND/PROPPATCH/LOCK request bodies,
//! and construction of `multistatus` response documents.
//!
//! Inbound bodies tolerate any element order; only elements in the
//! `DAV:` namespace carry protocol meaning. Outbound documents are built
//! as an owned tree and serialised once into a byte buffer, so the
//! response always carries an exact `Content-Length`.

use std::io::Cursor;

use bytes::Bytes;
use http::{Response, StatusCode};
use xmltree::Element;

use crate::body::Body;
use crate::errors::DavError;
use crate::util::MemBuffer;
use crate::xmltree_ext::{write_document, ElementExt};
use crate::DavResult;

pub(crate) const NS_DAV_URI: &str = "DAV:";
pub(crate) const XML_CONTENT_TYPE: &str = "application/xml; charset=\"utf-8\"";

fn is_dav(elem: &Element) -> bool {
    elem.namespace.as_deref() == Some(NS_DAV_URI)
}

/// What a PROPFIND body asked for.
#[derive(Debug)]
pub(crate) enum PropfindType {
    /// `allprop`, or an empty body.
    AllProp,
    /// `propname`: names only, no values.
    PropName,
    /// `prop` with an explicit list.
    Prop(Vec<Element>),
}

pub(crate) fn parse_propfind(data: &[u8]) -> DavResult<PropfindType> {
    if data.is_empty() {
        return Ok(PropfindType::AllProp);
    }
    let root = Element::parse(Cursor::new(data))?;
    if root.name != "propfind" || !is_dav(&root) {
        return Err(DavError::XmlParse);
    }
    for child in &root.children {
        if !is_dav(child) {
            continue;
        }
        match child.name.as_str() {
            "allprop" => return Ok(PropfindType::AllProp),
            "propname" => return Ok(PropfindType::PropName),
            "prop" => return Ok(PropfindType::Prop(child.children.clone())),
            _ => {}
        }
    }
    Err(DavError::XmlParse)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum PatchAction {
    Set,
    Remove,
}

/// Parse a `propertyupdate` body into (action, property) pairs, in
/// document order.
pub(crate) fn parse_propertyupdate(data: &[u8]) -> DavResult<Vec<(PatchAction, Element)>> {
    let root = Element::parse(Cursor::new(data))?;
    if root.name != "propertyupdate" || !is_dav(&root) {
        return Err(DavError::XmlParse);
    }
    let mut updates = Vec::new();
    for block in &root.children {
        if !is_dav(block) {
            continue;
        }
        let action = match block.name.as_str() {
            "set" => PatchAction::Set,
            "remove" => PatchAction::Remove,
            _ => continue,
        };
        for prop in block.children.iter().filter(|c| is_dav(c) && c.name == "prop") {
            for item in &prop.children {
                updates.push((action, item.clone()));
            }
        }
    }
    Ok(updates)
}

/// The interesting parts of a `lockinfo` body.
#[derive(Debug)]
pub(crate) struct LockRequest {
    pub exclusive: bool,
    pub owner: Option<String>,
}

pub(crate) fn parse_lockinfo(data: &[u8]) -> DavResult<LockRequest> {
    let root = Element::parse(Cursor::new(data))?;
    if root.name != "lockinfo" || !is_dav(&root) {
        return Err(DavError::XmlParse);
    }
    let mut req = LockRequest {
        exclusive: true,
        owner: None,
    };
    for child in &root.children {
        if !is_dav(child) {
            continue;
        }
        match child.name.as_str() {
            "lockscope" => {
                req.exclusive = child.children.iter().any(|c| c.name == "exclusive")
                    || child.children.is_empty();
            }
            "owner" => {
                // flatten: either direct text or the text of an href child.
                let text = child.text.clone().or_else(|| {
                    child.children.first().and_then(|c| c.text.clone())
                });
                req.owner = text.map(|t| t.trim().to_string());
            }
            _ => {}
        }
    }
    Ok(req)
}

/// One `propstat` group: a status code shared by a set of properties.
pub(crate) struct PropStat {
    pub status: StatusCode,
    pub props: Vec<Element>,
}

/// Builder for a `D:multistatus` response document.
pub(crate) struct MultiStatus {
    proto: String,
    root: Element,
}

impl MultiStatus {
    pub fn new(proto: &str) -> MultiStatus {
        MultiStatus {
            proto: proto.to_string(),
            root: Element::new2("D:multistatus").ns("D", NS_DAV_URI),
        }
    }

    /// Status line in the wire format of the inbound request,
    /// e.g. `HTTP/1.1 200 OK`.
    pub fn status_line(&self, status: StatusCode) -> String {
        format!(
            "{} {} {}",
            self.proto,
            status.as_u16(),
            status.canonical_reason().unwrap_or("")
        )
    }

    /// Append a `response` with one `propstat` per status group.
    /// `href` must already be percent-encoded.
    pub fn add_response(&mut self, href: &str, propstats: Vec<PropStat>) {
        let mut response = Element::new2("D:response").push(Element::new2("D:href").text(href));
        for ps in propstats {
            if ps.props.is_empty() {
                continue;
            }
            let mut prop = Element::new2("D:prop");
            for p in ps.props {
                prop.children.push(p);
            }
            response = response.push(
                Element::new2("D:propstat")
                    .push(prop)
                    .push(Element::new2("D:status").text(self.status_line(ps.status))),
            );
        }
        self.root.children.push(response);
    }

    pub fn into_bytes(self) -> DavResult<Bytes> {
        let mut buffer = MemBuffer::new();
        write_document(&self.root, &mut buffer)?;
        Ok(buffer.take())
    }

    /// Serialise into a complete 207 response.
    pub fn into_response(self) -> DavResult<Response<Body>> {
        let bytes = self.into_bytes()?;
        let resp = Response::builder()
            .status(StatusCode::MULTI_STATUS)
            .header("Content-Type", XML_CONTENT_TYPE)
            .header("Content-Length", bytes.len().to_string())
            .body(Body::from(bytes))
            .unwrap();
        Ok(resp)
    }
}
