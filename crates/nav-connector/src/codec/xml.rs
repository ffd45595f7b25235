//! Minimal element tree over quick-xml.
//!
//! The wire documents are data-oriented: every element carries either text or
//! child elements, attributes are limited to namespace declarations, and the
//! namespace itself is fixed. Parsing keeps local names only.

use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::{Reader, Writer};

use crate::domain::ConnectorError;

/// One element with either text or children.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct XmlNode {
    /// Local element name.
    pub name: String,
    /// Text content; `None` for empty or branch elements.
    pub text: Option<String>,
    /// Child elements in document order.
    pub children: Vec<XmlNode>,
}

impl XmlNode {
    /// Text element. An empty string is stored as no text.
    pub fn leaf(name: impl Into<String>, text: impl Into<String>) -> Self {
        let text = text.into();
        Self {
            name: name.into(),
            text: if text.is_empty() { None } else { Some(text) },
            children: Vec::new(),
        }
    }

    /// Element with children.
    pub fn branch(name: impl Into<String>, children: Vec<XmlNode>) -> Self {
        Self {
            name: name.into(),
            text: None,
            children,
        }
    }

    /// Text, if any.
    pub fn text(&self) -> Option<&str> {
        self.text.as_deref()
    }

    /// First direct child with the given name.
    pub fn child(&self, name: &str) -> Option<&XmlNode> {
        self.children.iter().find(|c| c.name == name)
    }

    /// All direct children with the given name.
    pub fn children_named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a XmlNode> + 'a {
        self.children.iter().filter(move |c| c.name == name)
    }

    /// Text of the first direct child with the given name.
    pub fn child_text(&self, name: &str) -> Option<&str> {
        self.child(name).and_then(XmlNode::text)
    }

    /// Text of a mandatory child.
    pub fn required_text(&self, name: &str) -> Result<&str, ConnectorError> {
        self.child_text(name).ok_or_else(|| {
            ConnectorError::malformed(format!("<{}> is missing <{}>", self.name, name))
        })
    }

    /// Depth-first search for the first descendant with the given name.
    pub fn find(&self, name: &str) -> Option<&XmlNode> {
        self.children
            .iter()
            .find_map(|c| if c.name == name { Some(c) } else { c.find(name) })
    }
}

/// Find the first node with the given name in a list.
pub fn find_node<'a>(nodes: &'a [XmlNode], name: &str) -> Option<&'a XmlNode> {
    nodes.iter().find(|n| n.name == name)
}

/// Serialize a document: declaration, then `root` with the default namespace.
///
/// Output is compact, so equal trees always serialize to equal bytes.
pub fn write_document(root: &XmlNode, namespace: &str) -> Result<Vec<u8>, ConnectorError> {
    let mut writer = Writer::new(Vec::new());
    writer
        .write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))
        .map_err(|e| ConnectorError::Encode(e.to_string()))?;
    write_node(&mut writer, root, Some(namespace))?;
    Ok(writer.into_inner())
}

fn write_node(
    writer: &mut Writer<Vec<u8>>,
    node: &XmlNode,
    namespace: Option<&str>,
) -> Result<(), ConnectorError> {
    let mut start = BytesStart::new(node.name.as_str());
    if let Some(ns) = namespace {
        start.push_attribute(("xmlns", ns));
    }

    if node.text.is_none() && node.children.is_empty() {
        return writer
            .write_event(Event::Empty(start))
            .map_err(|e| ConnectorError::Encode(e.to_string()));
    }

    writer
        .write_event(Event::Start(start))
        .map_err(|e| ConnectorError::Encode(e.to_string()))?;
    if let Some(text) = &node.text {
        writer
            .write_event(Event::Text(BytesText::new(text)))
            .map_err(|e| ConnectorError::Encode(e.to_string()))?;
    }
    for child in &node.children {
        write_node(writer, child, None)?;
    }
    writer
        .write_event(Event::End(BytesEnd::new(node.name.as_str())))
        .map_err(|e| ConnectorError::Encode(e.to_string()))
}

/// Parse a document into its root element.
///
/// Namespace prefixes are dropped; text is trimmed. Anything that is not a
/// single well-formed root element is malformed.
pub fn parse_document(bytes: &[u8]) -> Result<XmlNode, ConnectorError> {
    let mut reader = Reader::from_reader(bytes);
    reader.config_mut().trim_text(true);

    let mut stack: Vec<XmlNode> = Vec::new();
    let mut root: Option<XmlNode> = None;

    loop {
        let event = reader
            .read_event()
            .map_err(|e| ConnectorError::malformed(format!("invalid XML: {}", e)))?;
        match event {
            Event::Start(start) => {
                if root.is_some() {
                    return Err(ConnectorError::malformed("more than one root element"));
                }
                stack.push(XmlNode::branch(local_name(&start)?, Vec::new()));
            }
            Event::Empty(start) => {
                if root.is_some() {
                    return Err(ConnectorError::malformed("more than one root element"));
                }
                let node = XmlNode::branch(local_name(&start)?, Vec::new());
                attach(&mut stack, &mut root, node);
            }
            Event::End(_) => {
                let node = stack
                    .pop()
                    .ok_or_else(|| ConnectorError::malformed("unbalanced end tag"))?;
                attach(&mut stack, &mut root, node);
            }
            Event::Text(text) => {
                let value = text
                    .unescape()
                    .map_err(|e| ConnectorError::malformed(format!("invalid text: {}", e)))?;
                push_text(&mut stack, &value)?;
            }
            Event::CData(data) => {
                let value = String::from_utf8(data.into_inner().into_owned())
                    .map_err(|e| ConnectorError::malformed(format!("invalid CDATA: {}", e)))?;
                push_text(&mut stack, &value)?;
            }
            Event::Eof => break,
            _ => {}
        }
    }

    if !stack.is_empty() {
        return Err(ConnectorError::malformed("unexpected end of document"));
    }
    root.ok_or_else(|| ConnectorError::malformed("document has no root element"))
}

fn local_name(start: &BytesStart<'_>) -> Result<String, ConnectorError> {
    std::str::from_utf8(start.local_name().as_ref())
        .map(str::to_string)
        .map_err(|e| ConnectorError::malformed(format!("invalid element name: {}", e)))
}

fn attach(stack: &mut [XmlNode], root: &mut Option<XmlNode>, node: XmlNode) {
    match stack.last_mut() {
        Some(parent) => parent.children.push(node),
        None => *root = Some(node),
    }
}

fn push_text(stack: &mut [XmlNode], value: &str) -> Result<(), ConnectorError> {
    if value.is_empty() {
        return Ok(());
    }
    let current = stack
        .last_mut()
        .ok_or_else(|| ConnectorError::malformed("text outside the root element"))?;
    match &mut current.text {
        Some(existing) => existing.push_str(value),
        None => current.text = Some(value.to_string()),
    }
    Ok(())
}
