//! Minimal owned XML tree
//!
//! The XML codec and the pre-decode migration passes both work on this tree:
//! the passes rewrite legacy structure before any typed value exists, then the
//! codec walks the result. Backed by `quick-xml` events.
//!
//! Whitespace-only text between child elements is dropped on parse; text of
//! leaf elements is kept verbatim. CDATA sections become ordinary text.

use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::{Reader, Writer};

/// Node of an element's content
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum XmlNode {
    Element(XmlElement),
    Text(String),
}

/// Owned XML element
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct XmlElement {
    pub name: String,
    pub attributes: Vec<(String, String)>,
    pub children: Vec<XmlNode>,
}

impl XmlElement {
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            attributes: Vec::new(),
            children: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_attr(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.set_attr(name, value);
        self
    }

    #[must_use]
    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.set_text(text);
        self
    }

    #[must_use]
    pub fn with_child(mut self, child: XmlElement) -> Self {
        self.children.push(XmlNode::Element(child));
        self
    }

    #[inline]
    #[must_use]
    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    /// Set or replace an attribute, keeping its original position
    pub fn set_attr(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        let value = value.into();
        match self.attributes.iter_mut().find(|(k, _)| *k == name) {
            Some(slot) => slot.1 = value,
            None => self.attributes.push((name, value)),
        }
    }

    pub fn remove_attr(&mut self, name: &str) -> Option<String> {
        let idx = self.attributes.iter().position(|(k, _)| k == name)?;
        Some(self.attributes.remove(idx).1)
    }

    /// Child elements, in document order
    pub fn elements(&self) -> impl Iterator<Item = &XmlElement> {
        self.children.iter().filter_map(|n| match n {
            XmlNode::Element(e) => Some(e),
            XmlNode::Text(_) => None,
        })
    }

    pub fn elements_mut(&mut self) -> impl Iterator<Item = &mut XmlElement> {
        self.children.iter_mut().filter_map(|n| match n {
            XmlNode::Element(e) => Some(e),
            XmlNode::Text(_) => None,
        })
    }

    /// Child elements named `name`
    pub fn children_named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a XmlElement> + 'a {
        self.elements().filter(move |e| e.name == name)
    }

    #[must_use]
    pub fn child(&self, name: &str) -> Option<&XmlElement> {
        self.elements().find(|e| e.name == name)
    }

    pub fn child_mut(&mut self, name: &str) -> Option<&mut XmlElement> {
        self.elements_mut().find(|e| e.name == name)
    }

    pub fn push(&mut self, child: XmlElement) {
        self.children.push(XmlNode::Element(child));
    }

    /// First child element matching `pred`, appending `make()` if none does
    pub fn child_or_insert_with(
        &mut self,
        pred: impl Fn(&XmlElement) -> bool,
        make: impl FnOnce() -> XmlElement,
    ) -> &mut XmlElement {
        let index = self
            .children
            .iter()
            .position(|n| matches!(n, XmlNode::Element(e) if pred(e)));
        let index = index.unwrap_or_else(|| {
            self.children.push(XmlNode::Element(make()));
            self.children.len() - 1
        });
        match &mut self.children[index] {
            XmlNode::Element(e) => e,
            XmlNode::Text(_) => unreachable!("index points at an element"),
        }
    }

    /// Keep only the element children for which `keep` returns true
    pub fn retain_elements(&mut self, mut keep: impl FnMut(&XmlElement) -> bool) {
        self.children.retain(|n| match n {
            XmlNode::Element(e) => keep(e),
            XmlNode::Text(_) => true,
        });
    }

    /// Concatenated text content of direct text children
    #[must_use]
    pub fn text(&self) -> String {
        self.children
            .iter()
            .filter_map(|n| match n {
                XmlNode::Text(t) => Some(t.as_str()),
                XmlNode::Element(_) => None,
            })
            .collect()
    }

    /// Replace all content with a single text node
    pub fn set_text(&mut self, text: impl Into<String>) {
        let text = text.into();
        self.children.clear();
        if !text.is_empty() {
            self.children.push(XmlNode::Text(text));
        }
    }

    fn write_to<W: std::io::Write>(&self, writer: &mut Writer<W>) -> Result<(), DocumentError> {
        let mut start = BytesStart::new(self.name.as_str());
        for (k, v) in &self.attributes {
            start.push_attribute((k.as_str(), v.as_str()));
        }
        if self.children.is_empty() {
            writer
                .write_event(Event::Empty(start))
                .map_err(|e| DocumentError::Write(e.to_string()))?;
            return Ok(());
        }
        writer
            .write_event(Event::Start(start))
            .map_err(|e| DocumentError::Write(e.to_string()))?;
        for child in &self.children {
            match child {
                XmlNode::Element(e) => e.write_to(writer)?,
                XmlNode::Text(t) => writer
                    .write_event(Event::Text(BytesText::new(t)))
                    .map_err(|e| DocumentError::Write(e.to_string()))?,
            }
        }
        writer
            .write_event(Event::End(BytesEnd::new(self.name.as_str())))
            .map_err(|e| DocumentError::Write(e.to_string()))?;
        Ok(())
    }
}

/// Parsed XML document with a single root element
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct XmlDocument {
    pub root: XmlElement,
}

impl XmlDocument {
    #[inline]
    #[must_use]
    pub fn new(root: XmlElement) -> Self {
        Self { root }
    }

    /// Parse UTF-8 bytes
    ///
    /// # Errors
    /// Returns error on invalid UTF-8 or malformed XML
    pub fn parse_bytes(bytes: &[u8]) -> Result<Self, DocumentError> {
        let text = std::str::from_utf8(bytes).map_err(|e| DocumentError::Parse(e.to_string()))?;
        Self::parse(text.trim_start_matches('\u{feff}'))
    }

    /// Parse a document
    ///
    /// # Errors
    /// Returns error on malformed XML, a missing root, or content after the root
    pub fn parse(text: &str) -> Result<Self, DocumentError> {
        let mut reader = Reader::from_str(text);
        let mut stack: Vec<XmlElement> = Vec::new();
        let mut root: Option<XmlElement> = None;

        loop {
            let event = reader
                .read_event()
                .map_err(|e| DocumentError::Parse(format!("at byte {}: {e}", reader.buffer_position())))?;
            match event {
                Event::Start(start) => stack.push(element_from(&start)?),
                Event::Empty(start) => {
                    let element = element_from(&start)?;
                    attach(&mut stack, &mut root, element)?;
                }
                Event::End(_) => {
                    let mut element = stack
                        .pop()
                        .ok_or_else(|| DocumentError::Parse("unbalanced end tag".into()))?;
                    drop_layout_whitespace(&mut element);
                    attach(&mut stack, &mut root, element)?;
                }
                Event::Text(text) => {
                    let text = text.unescape().map_err(|e| DocumentError::Parse(e.to_string()))?;
                    push_text(&mut stack, &text)?;
                }
                Event::CData(cdata) => {
                    let raw = cdata.into_inner();
                    let text = std::str::from_utf8(&raw).map_err(|e| DocumentError::Parse(e.to_string()))?;
                    push_text(&mut stack, text)?;
                }
                Event::Eof => break,
                // declarations, comments, processing instructions, doctype
                _ => {}
            }
        }

        if !stack.is_empty() {
            return Err(DocumentError::Parse("unexpected end of document".into()));
        }
        root.map(Self::new)
            .ok_or_else(|| DocumentError::Parse("document has no root element".into()))
    }

    /// Serialize with an XML declaration and two-space indentation
    ///
    /// # Errors
    /// Returns error if the writer fails
    pub fn to_xml_string(&self) -> Result<String, DocumentError> {
        let mut writer = Writer::new_with_indent(Vec::new(), b' ', 2);
        writer
            .write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))
            .map_err(|e| DocumentError::Write(e.to_string()))?;
        self.root.write_to(&mut writer)?;
        let mut bytes = writer.into_inner();
        bytes.push(b'\n');
        String::from_utf8(bytes).map_err(|e| DocumentError::Write(e.to_string()))
    }
}

fn element_from(start: &BytesStart<'_>) -> Result<XmlElement, DocumentError> {
    let name = std::str::from_utf8(start.name().as_ref())
        .map_err(|e| DocumentError::Parse(e.to_string()))?
        .to_string();
    let mut element = XmlElement::new(name);
    for attr in start.attributes() {
        let attr = attr.map_err(|e| DocumentError::Parse(e.to_string()))?;
        let key = std::str::from_utf8(attr.key.as_ref())
            .map_err(|e| DocumentError::Parse(e.to_string()))?
            .to_string();
        let value = attr
            .unescape_value()
            .map_err(|e| DocumentError::Parse(e.to_string()))?
            .into_owned();
        element.attributes.push((key, value));
    }
    Ok(element)
}

fn attach(
    stack: &mut [XmlElement],
    root: &mut Option<XmlElement>,
    element: XmlElement,
) -> Result<(), DocumentError> {
    if let Some(parent) = stack.last_mut() {
        parent.children.push(XmlNode::Element(element));
        return Ok(());
    }
    if root.is_some() {
        return Err(DocumentError::Parse("multiple root elements".into()));
    }
    *root = Some(element);
    Ok(())
}

fn push_text(stack: &mut [XmlElement], text: &str) -> Result<(), DocumentError> {
    match stack.last_mut() {
        Some(parent) => {
            if let Some(XmlNode::Text(prev)) = parent.children.last_mut() {
                prev.push_str(text);
            } else {
                parent.children.push(XmlNode::Text(text.to_string()));
            }
            Ok(())
        }
        None if text.trim().is_empty() => Ok(()),
        None => Err(DocumentError::Parse("text outside the root element".into())),
    }
}

fn drop_layout_whitespace(element: &mut XmlElement) {
    let has_elements = element
        .children
        .iter()
        .any(|n| matches!(n, XmlNode::Element(_)));
    if has_elements {
        element
            .children
            .retain(|n| !matches!(n, XmlNode::Text(t) if t.trim().is_empty()));
    }
}

/// XML tree errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DocumentError {
    #[error("XML parse error: {0}")]
    Parse(String),

    #[error("XML write error: {0}")]
    Write(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_keeps_leaf_text_and_drops_layout() {
        let doc = XmlDocument::parse(
            r#"<?xml version="1.0"?>
<root a="1">
  <value>  spaced  </value>
  <empty/>
</root>"#,
        )
        .unwrap();
        assert_eq!(doc.root.attr("a"), Some("1"));
        assert_eq!(doc.root.children.len(), 2);
        assert_eq!(doc.root.child("value").unwrap().text(), "  spaced  ");
        assert_eq!(doc.root.child("empty").unwrap().text(), "");
    }

    #[test]
    fn entities_and_cdata_are_decoded() {
        let doc = XmlDocument::parse(r#"<r k="a&amp;b"><v>&lt;x&gt;</v><c><![CDATA[<raw>]]></c></r>"#).unwrap();
        assert_eq!(doc.root.attr("k"), Some("a&b"));
        assert_eq!(doc.root.child("v").unwrap().text(), "<x>");
        assert_eq!(doc.root.child("c").unwrap().text(), "<raw>");
    }

    #[test]
    fn write_then_parse_is_stable() {
        let root = XmlElement::new("root")
            .with_attr("x", "\"quoted\" & <tag>")
            .with_child(XmlElement::new("value").with_text("a < b"))
            .with_child(XmlElement::new("default"));
        let doc = XmlDocument::new(root);
        let text = doc.to_xml_string().unwrap();
        let parsed = XmlDocument::parse(&text).unwrap();
        assert_eq!(parsed, doc);
    }

    #[test]
    fn malformed_input_is_rejected() {
        assert!(XmlDocument::parse("<a><b></a>").is_err());
        assert!(XmlDocument::parse("").is_err());
        assert!(XmlDocument::parse("<a/><b/>").is_err());
    }

    #[test]
    fn set_attr_replaces_in_place() {
        let mut e = XmlElement::new("e").with_attr("a", "1").with_attr("b", "2");
        e.set_attr("a", "3");
        assert_eq!(e.attributes[0], ("a".to_string(), "3".to_string()));
        assert_eq!(e.remove_attr("b"), Some("2".to_string()));
        assert_eq!(e.attr("b"), None);
    }
}
