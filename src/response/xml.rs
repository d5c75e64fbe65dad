//! Minimal XML document view for response bodies.
//!
//! Parsing uses `quick_xml` events and builds a small owned tree. Only the
//! first error is reported; quick_xml stops there anyway.

use std::fmt;

use quick_xml::events::{BytesStart, Event};
use quick_xml::reader::Reader;

/// One node of the tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum XmlNode {
    Element(XmlElement),
    Text(String),
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct XmlElement {
    pub name: String,
    pub attributes: Vec<(String, String)>,
    pub children: Vec<XmlNode>,
}

impl XmlElement {
    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    /// First child element called `name`.
    pub fn child(&self, name: &str) -> Option<&XmlElement> {
        self.elements().find(|e| e.name == name)
    }

    pub fn children_named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a XmlElement> + 'a {
        self.elements().filter(move |e| e.name == name)
    }

    pub fn elements(&self) -> impl Iterator<Item = &XmlElement> {
        self.children.iter().filter_map(|n| match n {
            XmlNode::Element(e) => Some(e),
            XmlNode::Text(_) => None,
        })
    }

    /// Concatenated text of the direct text children.
    pub fn text(&self) -> String {
        self.children
            .iter()
            .filter_map(|n| match n {
                XmlNode::Text(t) => Some(t.as_str()),
                XmlNode::Element(_) => None,
            })
            .collect()
    }
}

/// A parse error and the byte offset it was detected at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct XmlError {
    pub message: String,
    pub position: u64,
}

impl fmt::Display for XmlError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} at byte {}", self.message, self.position)
    }
}

impl std::error::Error for XmlError {}

fn element_from(start: &BytesStart<'_>) -> Result<XmlElement, String> {
    let name = String::from_utf8_lossy(start.name().as_ref()).into_owned();
    let mut attributes = Vec::new();
    for attr in start.attributes() {
        let attr = attr.map_err(|e| e.to_string())?;
        let key = String::from_utf8_lossy(attr.key.as_ref()).into_owned();
        let value = attr.unescape_value().map_err(|e| e.to_string())?.into_owned();
        attributes.push((key, value));
    }
    Ok(XmlElement { name, attributes, children: Vec::new() })
}

/// Parses a whole document and returns its root element.
pub fn parse_document(content: &str) -> Result<XmlElement, XmlError> {
    let mut reader = Reader::from_str(content);
    reader.config_mut().trim_text(true);

    let mut stack: Vec<XmlElement> = Vec::new();
    let mut root: Option<XmlElement> = None;

    let fail = |reader: &Reader<&[u8]>, message: String| XmlError {
        message,
        position: reader.buffer_position() as u64,
    };

    loop {
        let event = reader.read_event().map_err(|e| fail(&reader, e.to_string()))?;
        match event {
            Event::Eof => break,
            Event::Start(e) => {
                if root.is_some() {
                    return Err(fail(&reader, "content after the document element".into()));
                }
                let element = element_from(&e).map_err(|m| fail(&reader, m))?;
                stack.push(element);
            }
            Event::Empty(e) => {
                if root.is_some() {
                    return Err(fail(&reader, "content after the document element".into()));
                }
                let element = element_from(&e).map_err(|m| fail(&reader, m))?;
                match stack.last_mut() {
                    Some(parent) => parent.children.push(XmlNode::Element(element)),
                    None => root = Some(element),
                }
            }
            Event::End(_) => {
                // quick_xml already checked that the end tag matches
                let Some(element) = stack.pop() else {
                    return Err(fail(&reader, "unexpected end tag".into()));
                };
                match stack.last_mut() {
                    Some(parent) => parent.children.push(XmlNode::Element(element)),
                    None => root = Some(element),
                }
            }
            Event::Text(t) => {
                let text = t.unescape().map_err(|e| fail(&reader, e.to_string()))?;
                if text.trim().is_empty() {
                    continue;
                }
                match stack.last_mut() {
                    Some(parent) => parent.children.push(XmlNode::Text(text.into_owned())),
                    None => return Err(fail(&reader, "text outside of the document element".into())),
                }
            }
            Event::CData(c) => {
                let text = String::from_utf8_lossy(&c.into_inner()).into_owned();
                match stack.last_mut() {
                    Some(parent) => parent.children.push(XmlNode::Text(text)),
                    None => return Err(fail(&reader, "CDATA outside of the document element".into())),
                }
            }
            // Declarations, comments, processing instructions and doctypes carry nothing we keep.
            _ => {}
        }
    }

    if let Some(open) = stack.last() {
        return Err(fail(&reader, format!("unclosed element <{}>", open.name)));
    }

    root.ok_or_else(|| fail(&reader, "document has no root element".into()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_nested_document() {
        let doc = parse_document(
            r#"<?xml version="1.0"?>
            <feed lang="en">
              <entry id="1"><title>First &amp; best</title></entry>
              <entry id="2"><title><![CDATA[<raw>]]></title></entry>
              <empty/>
            </feed>"#,
        )
        .unwrap();

        assert_eq!(doc.name, "feed");
        assert_eq!(doc.attribute("lang"), Some("en"));
        let entries: Vec<_> = doc.children_named("entry").collect();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].attribute("id"), Some("1"));
        assert_eq!(entries[0].child("title").unwrap().text(), "First & best");
        assert_eq!(entries[1].child("title").unwrap().text(), "<raw>");
        assert!(doc.child("empty").is_some());
    }

    #[test]
    fn mismatched_end_tag_fails() {
        let err = parse_document("<a><b></a>").unwrap_err();
        assert!(!err.message.is_empty());
    }

    #[test]
    fn unclosed_element_fails() {
        assert!(parse_document("<a><b></b>").is_err());
    }

    #[test]
    fn empty_document_fails() {
        let err = parse_document("   ").unwrap_err();
        assert_eq!(err.message, "document has no root element");
    }

    #[test]
    fn plain_text_is_not_xml() {
        assert!(parse_document("hello").is_err());
    }

    #[test]
    fn second_root_fails() {
        assert!(parse_document("<a/><b/>").is_err());
    }
}
