pub mod ds;

use xml::attribute::OwnedAttribute;
use xml::name::OwnedName;
use xml::reader::XmlEvent;

#[derive(Debug, Clone)]
pub enum Node {
    Element(Element),
    Text(String),
}

/// Minimal element tree, built from a slice of reader events.
#[derive(Debug, Clone)]
pub struct Element {
    pub name: OwnedName,
    pub attributes: Vec<OwnedAttribute>,
    pub children: Vec<Node>,
}

impl Element {
    /// Builds the tree of the first element in `events`.
    pub fn from_events(events: &[XmlEvent]) -> Option<Element> {
        let mut stack: Vec<Element> = vec![];
        for event in events {
            match event {
                XmlEvent::StartElement {
                    name, attributes, ..
                } => stack.push(Element {
                    name: name.clone(),
                    attributes: attributes.clone(),
                    children: vec![],
                }),
                XmlEvent::EndElement { .. } => {
                    let done = stack.pop()?;
                    match stack.last_mut() {
                        Some(parent) => parent.children.push(Node::Element(done)),
                        None => return Some(done),
                    }
                }
                XmlEvent::Characters(t) | XmlEvent::Whitespace(t) | XmlEvent::CData(t) => {
                    if let Some(current) = stack.last_mut() {
                        current.children.push(Node::Text(t.clone()));
                    }
                }
                _ => {}
            }
        }
        None
    }

    pub fn is(&self, namespace: &str, local_name: &str) -> bool {
        self.name.namespace.as_deref() == Some(namespace) && self.name.local_name == local_name
    }

    /// Value of the first attribute with this local name, whatever its prefix.
    pub fn attribute(&self, local_name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|a| a.name.local_name == local_name)
            .map(|a| a.value.as_str())
    }

    pub fn elements(&self) -> impl Iterator<Item = &Element> {
        self.children.iter().filter_map(|c| match c {
            Node::Element(e) => Some(e),
            Node::Text(_) => None,
        })
    }

    pub fn child(&self, local_name: &str) -> Option<&Element> {
        self.elements().find(|e| e.name.local_name == local_name)
    }

    pub fn descendant(&self, local_name: &str) -> Option<&Element> {
        for e in self.elements() {
            if e.name.local_name == local_name {
                return Some(e);
            }
            if let Some(found) = e.descendant(local_name) {
                return Some(found);
            }
        }
        None
    }

    /// Concatenated character data of the direct text children.
    pub fn text(&self) -> String {
        self.children
            .iter()
            .filter_map(|c| match c {
                Node::Text(t) => Some(t.as_str()),
                Node::Element(_) => None,
            })
            .collect()
    }
}
