//! Owned XML element tree with cursor-style navigation, built on quick-xml.

use std::str::FromStr;

use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::{Reader, Writer};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum XmlError {
    #[error("malformed xml: {0}")]
    Malformed(String),
    #[error("document has no root element")]
    NoRoot,
}

impl From<quick_xml::Error> for XmlError {
    fn from(err: quick_xml::Error) -> Self {
        XmlError::Malformed(err.to_string())
    }
}

/// A single XML element: name, ordered attributes, child elements and
/// character data. An element may carry text, attributes and children at
/// the same time.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Element {
    name: String,
    attributes: Vec<(String, String)>,
    children: Vec<Element>,
    text: String,
}

impl Element {
    /// Create an element with no attributes, children or text.
    pub fn new(name: impl Into<String>) -> Self {
        Element {
            name: name.into(),
            ..Element::default()
        }
    }

    /// Create an element holding only character data.
    pub fn with_text(name: impl Into<String>, text: impl Into<String>) -> Self {
        let mut elem = Element::new(name);
        elem.text = text.into();
        elem
    }

    /// Consuming builder: add or replace an attribute.
    pub fn with_attribute(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.set_attribute(name, value);
        self
    }

    /// Consuming builder: append a child element.
    pub fn with_child(mut self, child: Element) -> Self {
        self.children.push(child);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Concatenated character data of this element, as parsed (trimmed).
    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn set_text(&mut self, text: impl Into<String>) {
        self.text = text.into();
    }

    /// Attribute value by name, or `None` when the attribute is absent.
    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    /// All attributes in document order.
    pub fn attributes(&self) -> impl Iterator<Item = (&str, &str)> {
        self.attributes
            .iter()
            .map(|(key, value)| (key.as_str(), value.as_str()))
    }

    /// Add an attribute, replacing any existing value under the same name.
    pub fn set_attribute(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        let value = value.into();
        if let Some(slot) = self.attributes.iter_mut().find(|(key, _)| *key == name) {
            slot.1 = value;
        } else {
            self.attributes.push((name, value));
        }
    }

    /// First child element with the given name.
    ///
    /// A present-but-empty child yields `Some`; only a missing child yields
    /// `None`.
    pub fn child(&self, name: &str) -> Option<&Element> {
        self.children.iter().find(|child| child.name == name)
    }

    /// All child elements with the given name, in document order.
    pub fn children<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a Element> + 'a {
        self.children.iter().filter(move |child| child.name == name)
    }

    /// All child elements regardless of name.
    pub fn child_elements(&self) -> impl Iterator<Item = &Element> {
        self.children.iter()
    }

    pub fn has_child(&self, name: &str) -> bool {
        self.child(name).is_some()
    }

    /// Character data of the first child with the given name.
    pub fn child_text(&self, name: &str) -> Option<&str> {
        self.child(name).map(Element::text)
    }

    /// Parse this element's character data after trimming.
    pub fn parse_text<T: FromStr>(&self) -> Option<T> {
        self.text.trim().parse().ok()
    }

    /// Parse the character data of the first child with the given name.
    pub fn child_parsed<T: FromStr>(&self, name: &str) -> Option<T> {
        self.child(name).and_then(Element::parse_text)
    }

    /// Parse an attribute value after trimming.
    pub fn attribute_parsed<T: FromStr>(&self, name: &str) -> Option<T> {
        self.attribute(name).and_then(|value| value.trim().parse().ok())
    }

    /// Append a child element and return a reference to it for nested
    /// building.
    pub fn push(&mut self, child: Element) -> &mut Element {
        self.children.push(child);
        let last = self.children.len() - 1;
        &mut self.children[last]
    }
}

/// An XML document holding a single root element.
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    root: Element,
}

impl Document {
    pub fn new(root: Element) -> Self {
        Document { root }
    }

    pub fn root(&self) -> &Element {
        &self.root
    }

    pub fn root_mut(&mut self) -> &mut Element {
        &mut self.root
    }

    /// Parse a complete document from UTF-8 text.
    ///
    /// Comments, processing instructions and the doctype are skipped;
    /// attribute values and character data are unescaped.
    pub fn parse(xml: &str) -> Result<Document, XmlError> {
        let mut reader = Reader::from_str(xml);
        reader.trim_text(true);
        let mut buf = Vec::new();
        let mut stack: Vec<Element> = Vec::new();
        let mut root: Option<Element> = None;

        loop {
            match reader.read_event_into(&mut buf) {
                Ok(Event::Start(e)) => {
                    let elem = element_from_event(&e)?;
                    stack.push(elem);
                }
                Ok(Event::Empty(e)) => {
                    let elem = element_from_event(&e)?;
                    attach(&mut stack, &mut root, elem)?;
                }
                Ok(Event::End(_)) => {
                    let Some(elem) = stack.pop() else {
                        return Err(XmlError::Malformed("unbalanced closing tag".into()));
                    };
                    attach(&mut stack, &mut root, elem)?;
                }
                Ok(Event::Text(e)) => {
                    let text = e
                        .unescape()
                        .map_err(|err| XmlError::Malformed(err.to_string()))?;
                    if let Some(parent) = stack.last_mut() {
                        parent.text.push_str(text.trim());
                    }
                }
                Ok(Event::CData(e)) => {
                    let raw = e.into_inner();
                    if let Some(parent) = stack.last_mut() {
                        parent
                            .text
                            .push_str(String::from_utf8_lossy(&raw).trim());
                    }
                }
                Ok(Event::Eof) => break,
                Err(err) => return Err(XmlError::Malformed(err.to_string())),
                _ => {}
            }
            buf.clear();
        }

        if !stack.is_empty() {
            return Err(XmlError::Malformed("unclosed element".into()));
        }
        root.map(|root| Document { root }).ok_or(XmlError::NoRoot)
    }

    /// Serialize with an XML declaration and 4-space indentation.
    pub fn to_xml(&self) -> Result<String, XmlError> {
        let mut writer = Writer::new_with_indent(Vec::new(), b' ', 4);
        writer.write_event(Event::Decl(BytesDecl::new("1.0", Some("utf-8"), None)))?;
        write_element(&mut writer, &self.root)?;
        String::from_utf8(writer.into_inner())
            .map_err(|err| XmlError::Malformed(err.to_string()))
    }
}

fn element_from_event(event: &BytesStart<'_>) -> Result<Element, XmlError> {
    let name = String::from_utf8_lossy(event.name().as_ref()).into_owned();
    let mut elem = Element::new(name);
    for attr in event.attributes() {
        let attr = attr.map_err(|err| XmlError::Malformed(err.to_string()))?;
        let key = String::from_utf8_lossy(attr.key.as_ref()).into_owned();
        let value = attr
            .unescape_value()
            .map_err(|err| XmlError::Malformed(err.to_string()))?;
        elem.attributes.push((key, value.into_owned()));
    }
    Ok(elem)
}

fn attach(
    stack: &mut [Element],
    root: &mut Option<Element>,
    elem: Element,
) -> Result<(), XmlError> {
    if let Some(parent) = stack.last_mut() {
        parent.children.push(elem);
    } else if root.is_some() {
        return Err(XmlError::Malformed("multiple root elements".into()));
    } else {
        *root = Some(elem);
    }
    Ok(())
}

fn write_element(writer: &mut Writer<Vec<u8>>, elem: &Element) -> Result<(), XmlError> {
    let mut start = BytesStart::new(elem.name.as_str());
    for (key, value) in &elem.attributes {
        start.push_attribute((key.as_str(), value.as_str()));
    }
    if elem.children.is_empty() && elem.text.is_empty() {
        writer.write_event(Event::Empty(start))?;
        return Ok(());
    }
    writer.write_event(Event::Start(start))?;
    if !elem.text.is_empty() {
        writer.write_event(Event::Text(BytesText::new(&elem.text)))?;
    }
    for child in &elem.children {
        write_element(writer, child)?;
    }
    writer.write_event(Event::End(BytesEnd::new(elem.name.as_str())))?;
    Ok(())
}
