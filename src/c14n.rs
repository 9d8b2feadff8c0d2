//! Canonical XML over `xml-rs` reader events.
//!
//! [`canonicalize`] renders the element subtree starting at an event offset.
//! Exclusive canonicalization only emits namespace declarations that are
//! visibly utilized (element or attribute prefix, or listed in the
//! InclusiveNamespaces prefix list) and not already rendered by an output
//! ancestor. Inclusive canonicalization emits every in-scope namespace that
//! differs from the output parent and inherits `xml:*` attributes at the apex.

use std::collections::{BTreeMap, BTreeSet};

use xml::attribute::OwnedAttribute;
use xml::name::OwnedName;
use xml::reader::XmlEvent;

use crate::algorithm::Canonicalization;
use crate::error::Error;

const XML_NAMESPACE: &str = "http://www.w3.org/XML/1998/namespace";

/// Markup copied through `normalize_source` as is, by open and close delimiter.
const OPAQUE_MARKUP: [(&str, &str); 4] = [
    ("<!--", "-->"),
    ("<![CDATA[", "]]>"),
    ("<?", "?>"),
    ("<!", ">"),
];

fn qualified_name(name: &OwnedName) -> String {
    match &name.prefix {
        Some(p) => format!("{}:{}", p, name.local_name),
        None => name.local_name.clone(),
    }
}

fn escape_attribute(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for ch in value.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '"' => out.push_str("&quot;"),
            '\t' => out.push_str("&#x9;"),
            '\n' => out.push_str("&#xA;"),
            '\r' => out.push_str("&#xD;"),
            c => out.push(c),
        }
    }
    out
}

fn escape_text(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for ch in value.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '\r' => out.push_str("&#xD;"),
            c => out.push(c),
        }
    }
    out
}

/// XML input normalization that `xml-rs` leaves to the caller.
///
/// Line ends become `\n`, and literal tab and newline characters inside
/// attribute values become spaces. Character references are untouched, so
/// `&#9;` still reaches the canonical form as `&#x9;`.
pub fn normalize_source(source: &str) -> String {
    let source = source.replace("\r\n", "\n").replace('\r', "\n");
    let mut out = String::with_capacity(source.len());
    let mut rest = source.as_str();

    while let Some(lt) = rest.find('<') {
        out.push_str(&rest[..lt]);
        rest = &rest[lt..];

        let opaque = OPAQUE_MARKUP.iter().find(|(open, _)| rest.starts_with(open));
        if let Some((open, close)) = opaque {
            let end = rest[open.len()..]
                .find(close)
                .map(|i| open.len() + i + close.len())
                .unwrap_or(rest.len());
            out.push_str(&rest[..end]);
            rest = &rest[end..];
            continue;
        }

        let mut quote = None;
        let mut end = rest.len();
        for (i, ch) in rest.char_indices() {
            match (quote, ch) {
                (None, '"') | (None, '\'') => quote = Some(ch),
                (None, '>') => {
                    end = i + 1;
                    break;
                }
                (Some(q), c) if c == q => quote = None,
                _ => {}
            }
        }
        for ch in rest[..end].chars() {
            match ch {
                '\t' | '\n' => out.push(' '),
                c => out.push(c),
            }
        }
        rest = &rest[end..];
    }
    out.push_str(rest);
    out
}

/// `xml:*` attributes in scope after `events`, nearest ancestor winning.
fn inherited_xml_attributes(events: &[XmlEvent]) -> Vec<OwnedAttribute> {
    let mut stack: Vec<Vec<&OwnedAttribute>> = vec![];
    for event in events {
        match event {
            XmlEvent::StartElement { attributes, .. } => stack.push(
                attributes
                    .iter()
                    .filter(|a| a.name.namespace.as_deref() == Some(XML_NAMESPACE))
                    .collect(),
            ),
            XmlEvent::EndElement { .. } => {
                stack.pop();
            }
            _ => {}
        }
    }

    let mut merged = BTreeMap::new();
    for attr in stack.into_iter().flatten() {
        merged.insert(attr.name.local_name.as_str(), attr);
    }
    merged.into_values().cloned().collect()
}

/// Index of the event closing the element opened at `start`.
pub fn element_end(events: &[XmlEvent], start: usize) -> Option<usize> {
    let mut level = 0usize;
    for (i, event) in events.iter().enumerate().skip(start) {
        match event {
            XmlEvent::StartElement { .. } => level += 1,
            XmlEvent::EndElement { .. } => {
                level = level.checked_sub(1)?;
                if level == 0 {
                    return Some(i);
                }
            }
            _ => {}
        }
    }
    None
}

/// Canonicalizes the first element at or after `offset`.
///
/// `inclusive_prefixes` is the exclusive c14n PrefixList; `#default` names
/// the default namespace. It is ignored for inclusive methods.
pub fn canonicalize(
    events: &[XmlEvent],
    offset: usize,
    method: Canonicalization,
    inclusive_prefixes: &[String],
) -> Result<String, Error> {
    let exclusive = method.is_exclusive();
    let with_comments = method.with_comments();

    let apex = events
        .iter()
        .enumerate()
        .skip(offset)
        .find(|(_, e)| matches!(e, XmlEvent::StartElement { .. }))
        .map(|(i, _)| i)
        .ok_or_else(|| Error::Canonicalization("no element to canonicalize".to_string()))?;

    let inherited = if exclusive {
        vec![]
    } else {
        inherited_xml_attributes(&events[..apex])
    };

    let mut output = String::new();
    let mut rendered_ns: Vec<BTreeMap<String, String>> = vec![BTreeMap::new()];
    let mut level: usize = 0;

    for event in &events[apex..] {
        match event {
            XmlEvent::StartElement {
                name,
                attributes,
                namespace,
            } => {
                let parent = rendered_ns.last().cloned().unwrap_or_default();

                let candidates: BTreeSet<&str> = if exclusive {
                    let mut utilized = BTreeSet::new();
                    utilized.insert(name.prefix.as_deref().unwrap_or(""));
                    for a in attributes {
                        if let Some(p) = a.name.prefix.as_deref() {
                            utilized.insert(p);
                        }
                    }
                    for p in inclusive_prefixes {
                        utilized.insert(if p == "#default" { "" } else { p.as_str() });
                    }
                    utilized
                } else {
                    namespace.0.keys().map(String::as_str).collect()
                };

                let mut current = parent.clone();
                let mut declarations = vec![];
                for prefix in candidates {
                    if prefix == "xml" || prefix == "xmlns" {
                        continue;
                    }
                    let uri = namespace.0.get(prefix).map(String::as_str).unwrap_or("");
                    let previous = parent.get(prefix).map(String::as_str).unwrap_or("");
                    if uri == previous || (!prefix.is_empty() && uri.is_empty()) {
                        continue;
                    }
                    declarations.push((prefix, uri));
                    current.insert(prefix.to_string(), uri.to_string());
                }

                let mut attrs = attributes
                    .iter()
                    .map(|a| (&a.name, a.value.as_str()))
                    .collect::<Vec<_>>();
                if level == 0 && !exclusive {
                    for a in &inherited {
                        let overridden = attributes.iter().any(|own| {
                            own.name.namespace.as_deref() == Some(XML_NAMESPACE)
                                && own.name.local_name == a.name.local_name
                        });
                        if !overridden {
                            attrs.push((&a.name, a.value.as_str()));
                        }
                    }
                }
                attrs.sort_by(|a, b| {
                    let a_ns = a.0.namespace.as_deref().unwrap_or_default();
                    let b_ns = b.0.namespace.as_deref().unwrap_or_default();
                    a_ns.cmp(b_ns)
                        .then_with(|| a.0.local_name.cmp(&b.0.local_name))
                });

                output.push('<');
                output.push_str(&qualified_name(name));
                for (prefix, uri) in declarations {
                    if prefix.is_empty() {
                        output.push_str(" xmlns=\"");
                    } else {
                        output.push_str(" xmlns:");
                        output.push_str(prefix);
                        output.push_str("=\"");
                    }
                    output.push_str(&escape_attribute(uri));
                    output.push('"');
                }
                for (attr_name, value) in attrs {
                    output.push(' ');
                    output.push_str(&qualified_name(attr_name));
                    output.push_str("=\"");
                    output.push_str(&escape_attribute(value));
                    output.push('"');
                }
                output.push('>');

                rendered_ns.push(current);
                level += 1;
            }
            XmlEvent::EndElement { name } => {
                output.push_str("</");
                output.push_str(&qualified_name(name));
                output.push('>');
                rendered_ns.pop();
                level -= 1;
                if level == 0 {
                    return Ok(output);
                }
            }
            XmlEvent::Characters(data) | XmlEvent::Whitespace(data) | XmlEvent::CData(data) => {
                output.push_str(&escape_text(data));
            }
            XmlEvent::Comment(data) => {
                if with_comments {
                    output.push_str("<!--");
                    output.push_str(data);
                    output.push_str("-->");
                }
            }
            XmlEvent::ProcessingInstruction { name, data } => {
                output.push_str("<?");
                output.push_str(name);
                if let Some(data) = data {
                    output.push(' ');
                    output.push_str(data);
                }
                output.push_str("?>");
            }
            _ => {}
        }
    }

    Err(Error::Canonicalization("unterminated element".to_string()))
}
