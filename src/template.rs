//! Process-wide registry of the XML fragment templates.
//!
//! Templates are plain XML with `{{ name }}` placeholders. They are compiled
//! once, on first use, and never change afterwards. Substituted values are
//! inserted verbatim; callers escape character data with [`escape`].

use std::collections::HashMap;

use once_cell::sync::Lazy;
use regex::Regex;

use crate::error::Error;

pub const SECURITY_HEADER: &str = "wsse-security-header";
pub const USERNAME_TOKEN: &str = "wsse-username-token";
pub const SECURITY_TOKEN_REFERENCE: &str = "wsse-security-token";

static PLACEHOLDER_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\{\{\s*([A-Za-z_][A-Za-z0-9_]*)\s*\}\}").unwrap());

static TEMPLATES: Lazy<HashMap<&'static str, Template>> = Lazy::new(|| {
    [
        (SECURITY_HEADER, include_str!("templates/wsse-security-header.xml")),
        (USERNAME_TOKEN, include_str!("templates/wsse-username-token.xml")),
        (
            SECURITY_TOKEN_REFERENCE,
            include_str!("templates/wsse-security-token.xml"),
        ),
    ]
    .into_iter()
    .map(|(name, source)| (name, Template::compile(source)))
    .collect()
});

#[derive(Debug)]
enum Segment {
    Literal(String),
    Variable(String),
}

#[derive(Debug)]
pub struct Template {
    segments: Vec<Segment>,
}

impl Template {
    pub fn compile(source: &str) -> Self {
        let source = source.trim_end();
        let mut segments = vec![];
        let mut last = 0;
        for caps in PLACEHOLDER_RE.captures_iter(source) {
            let whole = caps.get(0).unwrap();
            if whole.start() > last {
                segments.push(Segment::Literal(source[last..whole.start()].to_string()));
            }
            segments.push(Segment::Variable(caps[1].to_string()));
            last = whole.end();
        }
        if last < source.len() {
            segments.push(Segment::Literal(source[last..].to_string()));
        }
        Template { segments }
    }

    /// Renders the template. Every placeholder must have a value.
    pub fn render(&self, values: &[(&str, &str)]) -> Result<String, Error> {
        let mut out = String::new();
        for segment in &self.segments {
            match segment {
                Segment::Literal(l) => out.push_str(l),
                Segment::Variable(name) => {
                    let value = values
                        .iter()
                        .find(|(k, _)| k == name)
                        .map(|(_, v)| *v)
                        .ok_or_else(|| {
                            Error::TemplateRender(format!("no value for placeholder {}", name))
                        })?;
                    out.push_str(value);
                }
            }
        }
        Ok(out)
    }
}

pub fn render(name: &str, values: &[(&str, &str)]) -> Result<String, Error> {
    match TEMPLATES.get(name) {
        Some(t) => t.render(values),
        None => Err(Error::TemplateRender(format!("unknown template: {}", name))),
    }
}

/// Escapes text for use as character data or a quoted attribute value.
pub fn escape(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for ch in value.chars() {
        match ch {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&apos;"),
            _ => escaped.push(ch),
        }
    }
    escaped
}
