//! Textual splicing of fragments into the caller's document.
//!
//! Nothing here parses the document: fragments go in front of a matching
//! close tag and every other byte is left untouched.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::error::Error;

pub static HEADER_CLOSE: Lazy<CloseTag> = Lazy::new(|| CloseTag::new("Header"));
pub static SECURITY_CLOSE: Lazy<CloseTag> = Lazy::new(|| CloseTag::new("Security"));

static ENVELOPE_OPEN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"<(?:([A-Za-z_][A-Za-z0-9_.\-]*):)?Envelope[\s/>]").unwrap());
static HEADER_TAG: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"<(/?)(?:([A-Za-z_][A-Za-z0-9_.\-]*):)?Header(?:\s[^>]*?)?(/?)\s*>").unwrap()
});

/// A close tag matched by local name, with or without a namespace prefix.
#[derive(Debug)]
pub struct CloseTag {
    local_name: String,
    re: Regex,
}

/// Position of a close tag within a document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Marker<'a> {
    pub offset: usize,
    pub prefix: Option<&'a str>,
}

impl CloseTag {
    pub fn new(local_name: &str) -> Self {
        let re = Regex::new(&format!(
            r"</(?:([A-Za-z_][A-Za-z0-9_.\-]*):)?{}\s*>",
            regex::escape(local_name)
        ))
        .unwrap();
        CloseTag {
            local_name: local_name.to_string(),
            re,
        }
    }

    pub fn local_name(&self) -> &str {
        &self.local_name
    }

    /// First occurrence at or after `from`.
    pub fn find_from<'a>(&self, document: &'a str, from: usize) -> Option<Marker<'a>> {
        let caps = self.re.captures(document.get(from..)?)?;
        let whole = caps.get(0)?;
        Some(Marker {
            offset: from + whole.start(),
            prefix: caps.get(1).map(|m| &document[from + m.start()..from + m.end()]),
        })
    }

    pub fn find<'a>(&self, document: &'a str) -> Option<Marker<'a>> {
        self.find_from(document, 0)
    }
}

/// Close tag of the SOAP header: the `Header` child of the root `Envelope`,
/// in the envelope's own prefix.
///
/// Header blocks with the same local name in another prefix, or nested in the
/// SOAP header, are skipped. Without an `Envelope` start tag the first
/// `Header` close tag is used.
pub fn header_marker(document: &str) -> Option<Marker<'_>> {
    let envelope = match ENVELOPE_OPEN.captures(document) {
        Some(caps) => caps,
        None => return HEADER_CLOSE.find(document),
    };
    let prefix = envelope.get(1).map(|m| m.as_str());
    let from = envelope.get(0)?.end();

    let mut depth = 0usize;
    for caps in HEADER_TAG.captures_iter(&document[from..]) {
        let tag_prefix = caps.get(2).map(|m| m.as_str());
        if tag_prefix != prefix {
            continue;
        }
        let closing = !caps[1].is_empty();
        if closing && depth <= 1 {
            return Some(Marker {
                offset: from + caps.get(0)?.start(),
                prefix: tag_prefix,
            });
        } else if closing {
            depth -= 1;
        } else if caps[3].is_empty() {
            depth += 1;
        }
    }
    None
}

pub fn insert_at(fragment: &str, document: &str, offset: usize) -> String {
    let mut out = String::with_capacity(document.len() + fragment.len());
    out.push_str(&document[..offset]);
    out.push_str(fragment);
    out.push_str(&document[offset..]);
    out
}

/// Splices `fragment` in front of the first `marker` close tag at or after
/// `from`, failing if there is none.
pub fn insert_before_from(
    fragment: &str,
    document: &str,
    marker: &CloseTag,
    from: usize,
) -> Result<String, Error> {
    match marker.find_from(document, from) {
        Some(m) => {
            log::trace!("inserting before </{}> at {}", marker.local_name(), m.offset);
            Ok(insert_at(fragment, document, m.offset))
        }
        None => Err(Error::MarkerNotFound(format!("</{}>", marker.local_name()))),
    }
}

pub fn insert_before(fragment: &str, document: &str, marker: &CloseTag) -> Result<String, Error> {
    insert_before_from(fragment, document, marker, 0)
}
