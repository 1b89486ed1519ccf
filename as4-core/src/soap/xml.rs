//! Minimal namespace-resolved element tree
//!
//! SOAP headers are small, so the envelope is read into an owned tree once
//! and then navigated by (namespace, local name). Documents nesting deeper
//! than [`MAX_DEPTH`] are refused.

use super::{SoapError, SoapResult};
use quick_xml::events::{BytesStart, Event};
use quick_xml::name::ResolveResult;
use quick_xml::NsReader;

/// Deepest element nesting accepted by [`XmlElement::parse`]
pub const MAX_DEPTH: usize = 256;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct XmlAttribute {
    pub namespace: Option<String>,
    pub name: String,
    pub value: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct XmlElement {
    pub namespace: Option<String>,
    pub name: String,
    pub attributes: Vec<XmlAttribute>,
    pub children: Vec<XmlElement>,
    /// Concatenated text content, whitespace-trimmed
    pub text: String,
}

impl XmlElement {
    pub fn is(&self, namespace: &str, name: &str) -> bool {
        self.name == name && self.namespace.as_deref() == Some(namespace)
    }

    /// First direct child with the given name
    pub fn child(&self, namespace: &str, name: &str) -> Option<&XmlElement> {
        self.children.iter().find(|c| c.is(namespace, name))
    }

    pub fn children_named<'a>(
        &'a self,
        namespace: &'a str,
        name: &'a str,
    ) -> impl Iterator<Item = &'a XmlElement> + 'a {
        self.children.iter().filter(move |c| c.is(namespace, name))
    }

    /// Text of the first direct child with the given name
    pub fn child_text(&self, namespace: &str, name: &str) -> Option<&str> {
        self.child(namespace, name).map(|c| c.text.as_str())
    }

    /// Unqualified attribute
    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|a| a.namespace.is_none() && a.name == name)
            .map(|a| a.value.as_str())
    }

    pub fn attr_ns(&self, namespace: &str, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|a| a.name == name && a.namespace.as_deref() == Some(namespace))
            .map(|a| a.value.as_str())
    }

    /// All descendants (depth first, document order) with the given name
    pub fn descendants(&self, namespace: &str, name: &str) -> Vec<&XmlElement> {
        self.walk().skip(1).filter(|e| e.is(namespace, name)).collect()
    }

    /// True if this element, one of its attributes, or any descendant lives
    /// in `namespace`
    pub fn uses_namespace(&self, namespace: &str) -> bool {
        self.walk().any(|e| {
            e.namespace.as_deref() == Some(namespace)
                || e.attributes
                    .iter()
                    .any(|a| a.namespace.as_deref() == Some(namespace))
        })
    }

    /// This element and its descendants in document order
    fn walk(&self) -> impl Iterator<Item = &XmlElement> + '_ {
        let mut pending = vec![self];
        std::iter::from_fn(move || {
            let next = pending.pop()?;
            pending.extend(next.children.iter().rev());
            Some(next)
        })
    }

    /// Parse a document and return its root element
    pub fn parse(xml: &str) -> SoapResult<XmlElement> {
        let mut reader = NsReader::from_str(xml);
        let mut stack: Vec<XmlElement> = Vec::new();

        loop {
            let (ns, event) = reader.read_resolved_event()?;
            let namespace = namespace_of(&ns);

            match event {
                Event::Start(start) => {
                    if stack.len() >= MAX_DEPTH {
                        return Err(SoapError::TooDeep(MAX_DEPTH));
                    }
                    let element = element_from(&reader, namespace, &start)?;
                    stack.push(element);
                }
                Event::Empty(start) => {
                    if stack.len() >= MAX_DEPTH {
                        return Err(SoapError::TooDeep(MAX_DEPTH));
                    }
                    let element = element_from(&reader, namespace, &start)?;
                    match stack.last_mut() {
                        Some(parent) => parent.children.push(element),
                        None => return Ok(element),
                    }
                }
                Event::End(_) => {
                    let mut element = stack.pop().ok_or(SoapError::Empty)?;
                    element.text = element.text.trim().to_string();
                    match stack.last_mut() {
                        Some(parent) => parent.children.push(element),
                        None => return Ok(element),
                    }
                }
                Event::Text(text) => {
                    if let Some(current) = stack.last_mut() {
                        let text = text.unescape().map_err(quick_xml::Error::from)?;
                        current.text.push_str(&text);
                    }
                }
                Event::CData(data) => {
                    if let Some(current) = stack.last_mut() {
                        current.text.push_str(&String::from_utf8_lossy(&data.into_inner()));
                    }
                }
                Event::Eof => return Err(SoapError::Empty),
                _ => {}
            }
        }
    }
}

fn namespace_of(ns: &ResolveResult<'_>) -> Option<String> {
    match ns {
        ResolveResult::Bound(ns) => Some(String::from_utf8_lossy(ns.as_ref()).into_owned()),
        _ => None,
    }
}

fn element_from(
    reader: &NsReader<&[u8]>,
    namespace: Option<String>,
    start: &BytesStart<'_>,
) -> SoapResult<XmlElement> {
    let name = String::from_utf8_lossy(start.local_name().as_ref()).into_owned();

    let mut attributes = Vec::new();
    for attr in start.attributes() {
        let attr = attr?;
        if attr.key.as_namespace_binding().is_some() {
            continue;
        }
        let (ns, local) = reader.resolve_attribute(attr.key);
        let value = attr.unescape_value().map_err(quick_xml::Error::from)?;
        attributes.push(XmlAttribute {
            namespace: namespace_of(&ns),
            name: String::from_utf8_lossy(local.as_ref()).into_owned(),
            value: value.into_owned(),
        });
    }

    Ok(XmlElement {
        namespace,
        name,
        attributes,
        children: Vec::new(),
        text: String::new(),
    })
}
