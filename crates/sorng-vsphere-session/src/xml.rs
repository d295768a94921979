//! Small XML tree reader over `quick-xml`.
//!
//! vim25 responses are short, so they are read into a tree and walked by
//! local element name (namespace prefixes dropped). Attribute keys keep
//! their prefix so `type` and `xsi:type` stay distinct.

use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use std::borrow::Cow;

use crate::error::{SessionError, SessionResult};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct XmlNode {
    pub name: String,
    pub attrs: Vec<(String, String)>,
    pub text: String,
    pub children: Vec<XmlNode>,
}

impl XmlNode {
    fn from_start(e: &BytesStart) -> SessionResult<Self> {
        let mut attrs = Vec::new();
        for attr in e.attributes() {
            let attr = attr.map_err(|e| SessionError::parse(format!("XML attribute error: {e}")))?;
            let key = String::from_utf8_lossy(attr.key.as_ref()).into_owned();
            let val = attr.unescape_value()?.into_owned();
            attrs.push((key, val));
        }
        Ok(Self {
            name: local_name(e.name().as_ref()),
            attrs,
            ..Self::default()
        })
    }

    /// First direct child with the given local name.
    pub fn child(&self, name: &str) -> Option<&XmlNode> {
        self.children.iter().find(|c| c.name == name)
    }

    /// All direct children with the given local name.
    pub fn children_named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a XmlNode> + 'a {
        self.children.iter().filter(move |c| c.name == name)
    }

    /// Text of the first direct child with the given name.
    pub fn child_text(&self, name: &str) -> Option<&str> {
        self.child(name).map(|c| c.text.as_str())
    }

    /// Depth-first search for a descendant (or self) with the given name.
    pub fn find(&self, name: &str) -> Option<&XmlNode> {
        if self.name == name {
            return Some(self);
        }
        self.children.iter().find_map(|c| c.find(name))
    }

    pub fn attr(&self, key: &str) -> Option<&str> {
        self.attrs
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }
}

/// Parse a document into a synthetic root node whose children are the
/// top-level elements.
pub fn parse(xml: &str) -> SessionResult<XmlNode> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut stack: Vec<XmlNode> = vec![XmlNode {
        name: "#document".into(),
        ..XmlNode::default()
    }];
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(ref e)) => stack.push(XmlNode::from_start(e)?),
            Ok(Event::Empty(ref e)) => {
                let node = XmlNode::from_start(e)?;
                if let Some(top) = stack.last_mut() {
                    top.children.push(node);
                }
            }
            Ok(Event::Text(ref e)) => {
                if let Some(top) = stack.last_mut() {
                    top.text.push_str(&e.unescape()?);
                }
            }
            Ok(Event::CData(e)) => {
                if let Some(top) = stack.last_mut() {
                    top.text.push_str(&String::from_utf8_lossy(&e.into_inner()));
                }
            }
            Ok(Event::End(_)) => {
                if stack.len() < 2 {
                    return Err(SessionError::parse("XML error: unbalanced end tag"));
                }
                if let Some(node) = stack.pop() {
                    if let Some(parent) = stack.last_mut() {
                        parent.children.push(node);
                    }
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => {
                return Err(SessionError::parse(format!(
                    "XML error at position {}: {}",
                    reader.buffer_position(),
                    e
                )))
            }
            _ => {}
        }
        buf.clear();
    }

    if stack.len() != 1 {
        return Err(SessionError::parse("XML error: unexpected end of document"));
    }
    stack
        .pop()
        .ok_or_else(|| SessionError::parse("XML error: empty document"))
}

/// Escape text for use inside an element.
pub fn escape(s: &str) -> Cow<'_, str> {
    quick_xml::escape::escape(s)
}

fn local_name(raw: &[u8]) -> String {
    let s = String::from_utf8_lossy(raw);
    match s.rfind(':') {
        Some(pos) => s[pos + 1..].to_string(),
        None => s.into_owned(),
    }
}
