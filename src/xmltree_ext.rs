//! Small extension trait over `xmltree::Element` so response documents
//! can be built fluently and written through an `xml-rs` `EventWriter`.

use std::io::Write;

use xml::common::XmlVersion;
use xml::namespace::Namespace;
use xml::writer::{EmitterConfig, EventWriter, XmlEvent as XmlWEvent};
use xmltree::Element;

pub(crate) trait ElementExt {
    /// Build an element from a possibly prefixed name, e.g. `D:href`.
    fn new2(name: &str) -> Element;
    fn text(self, text: impl Into<String>) -> Element;
    /// Declare a namespace on this element. An empty prefix declares
    /// the default namespace.
    fn ns(self, prefix: &str, uri: &str) -> Element;
    fn push(self, child: Element) -> Element;
    fn write_ev<W: Write>(&self, emitter: &mut EventWriter<W>) -> Result<(), xml::writer::Error>;
}

impl ElementExt for Element {
    fn new2(name: &str) -> Element {
        match name.split_once(':') {
            Some((prefix, local)) => {
                let mut e = Element::new(local);
                e.prefix = Some(prefix.to_string());
                e
            }
            None => Element::new(name),
        }
    }

    fn text(mut self, text: impl Into<String>) -> Element {
        self.text = Some(text.into());
        self
    }

    fn ns(mut self, prefix: &str, uri: &str) -> Element {
        let namespaces = self.namespaces.get_or_insert_with(Namespace::empty);
        namespaces.put(prefix, uri);
        if prefix.is_empty() || self.prefix.as_deref() == Some(prefix) {
            self.namespace = Some(uri.to_string());
        }
        self
    }

    fn push(mut self, child: Element) -> Element {
        self.children.push(child);
        self
    }

    fn write_ev<W: Write>(&self, emitter: &mut EventWriter<W>) -> Result<(), xml::writer::Error> {
        let name = match &self.prefix {
            Some(prefix) => format!("{}:{}", prefix, self.name),
            None => self.name.clone(),
        };
        let mut start = XmlWEvent::start_element(name.as_str());
        if let Some(namespaces) = &self.namespaces {
            for (prefix, uri) in namespaces.0.iter() {
                if prefix.is_empty() {
                    start = start.default_ns(uri.as_str());
                } else {
                    start = start.ns(prefix.as_str(), uri.as_str());
                }
            }
        }
        for (key, value) in &self.attributes {
            start = start.attr(key.as_str(), value.as_str());
        }
        emitter.write(start)?;
        if let Some(text) = &self.text {
            emitter.write(XmlWEvent::characters(text))?;
        }
        for child in &self.children {
            child.write_ev(emitter)?;
        }
        emitter.write(XmlWEvent::end_element())
    }
}

/// Serialise a document with an XML declaration into `sink`.
pub(crate) fn write_document<W: Write>(
    root: &Element,
    sink: W,
) -> Result<(), xml::writer::Error> {
    let mut emitter =
        EventWriter::new_with_config(sink, EmitterConfig::new().perform_indent(true));
    emitter.write(XmlWEvent::StartDocument {
        version: XmlVersion::Version10,
        encoding: Some("utf-8"),
        standalone: None,
    })?;
    root.write_ev(&mut emitter)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new2_splits_prefix() {
        let e = Element::new2("D:href");
        assert_eq!(e.prefix.as_deref(), Some("D"));
        assert_eq!(e.name, "href");
        let e = Element::new2("plain");
        assert!(e.prefix.is_none());
        assert_eq!(e.name, "plain");
    }

    #[test]
    fn writes_prefixed_tree() {
        let root = Element::new2("D:multistatus")
            .ns("D", "DAV:")
            .push(Element::new2("D:response").push(Element::new2("D:href").text("/a%20b")));
        let mut out = Vec::new();
        write_document(&root, &mut out).unwrap();
        let s = String::from_utf8(out).unwrap();
        assert!(s.contains("<D:multistatus xmlns:D=\"DAV:\">"));
        assert!(s.contains("<D:href>/a%20b</D:href>"));
    }

    #[test]
    fn default_namespace_declared() {
        let e = Element::new2("foo").ns("", "X").text("bar");
        let mut out = Vec::new();
        write_document(&e, &mut out).unwrap();
        let s = String::from_utf8(out).unwrap();
        assert!(s.contains("<foo xmlns=\"X\">bar</foo>"));
    }
}
