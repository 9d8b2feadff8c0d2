//! Reference resolution and XML-DSig signature computation.

use once_cell::sync::Lazy;
use openssl::pkey::{PKey, Private};
use regex::Regex;
use xml::attribute::OwnedAttribute;
use xml::reader::XmlEvent;

use crate::algorithm::{Canonicalization, DigestAlgorithm, SignatureAlgorithm};
use crate::error::Error;
use crate::proto::ds;
use crate::{c14n, WSU_NAMESPACE};

/// An element to sign, selected by local name in any namespace.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReferenceTarget {
    pub local_name: String,
    #[serde(default)]
    pub canonicalization: Canonicalization,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub inclusive_prefixes: Vec<String>,
}

impl ReferenceTarget {
    pub fn new(local_name: &str) -> Self {
        ReferenceTarget {
            local_name: local_name.to_string(),
            canonicalization: Canonicalization::default(),
            inclusive_prefixes: vec![],
        }
    }

    /// Body, Timestamp, EBS and IDP with exclusive canonicalization.
    pub fn defaults() -> Vec<Self> {
        ["Body", "Timestamp", "EBS", "IDP"]
            .iter()
            .map(|n| ReferenceTarget::new(n))
            .collect()
    }

    pub fn selector(&self) -> String {
        format!("//*[local-name(.)='{}']", self.local_name)
    }

    /// XPath filter expression selecting the same elements as [`Self::selector`].
    pub fn xpath_filter(&self) -> String {
        format!("ancestor-or-self::*[local-name()='{}']", self.local_name)
    }

    fn transform(&self) -> ds::Transform {
        ds::Transform {
            algorithm: self.canonicalization.uri().to_string(),
            inclusive_prefixes: if self.canonicalization.is_exclusive()
                && !self.inclusive_prefixes.is_empty()
            {
                Some(self.inclusive_prefixes.clone())
            } else {
                None
            },
            xpath: None,
        }
    }
}

static XPATH_FILTER_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^ancestor-or-self::\*\[local-name\(\)\s*=\s*'([^']+)'\]$").unwrap()
});

/// Local name selected by an expression from [`ReferenceTarget::xpath_filter`].
pub fn xpath_filter_local_name(expression: &str) -> Option<&str> {
    XPATH_FILTER_RE
        .captures(expression.trim())
        .and_then(|c| c.get(1))
        .map(|m| m.as_str())
}

/// A matched element: start and end event indices plus its identifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedElement {
    pub start: usize,
    pub end: usize,
    pub id: Option<String>,
}

/// `Id`/`ID` attribute, unprefixed or in the wsu namespace.
pub fn element_id(attributes: &[OwnedAttribute]) -> Option<&str> {
    attributes
        .iter()
        .find(|a| {
            (a.name.local_name == "Id" || a.name.local_name == "ID")
                && match &a.name.namespace {
                    None => true,
                    Some(ns) => ns == WSU_NAMESPACE,
                }
        })
        .map(|a| a.value.as_str())
}

/// Every element named `local_name`, in document order.
pub fn resolve(events: &[XmlEvent], local_name: &str) -> Result<Vec<ResolvedElement>, Error> {
    let mut found = vec![];
    for (i, event) in events.iter().enumerate() {
        if let XmlEvent::StartElement {
            name, attributes, ..
        } = event
        {
            if name.local_name != local_name {
                continue;
            }
            let end = c14n::element_end(events, i).ok_or_else(|| {
                Error::Canonicalization(format!("unterminated element {}", local_name))
            })?;
            found.push(ResolvedElement {
                start: i,
                end,
                id: element_id(attributes).map(str::to_string),
            });
        }
    }
    Ok(found)
}

/// Canonical form of the node-set made of `elements` and their subtrees.
///
/// Elements nested in another element of the set are already covered by it;
/// the remaining subtrees are canonicalized in document order and
/// concatenated.
pub fn canonicalize_elements(
    events: &[XmlEvent],
    elements: &[ResolvedElement],
    method: Canonicalization,
    inclusive_prefixes: &[String],
) -> Result<String, Error> {
    let mut canonical = String::new();
    let mut covered_until = None;
    for element in elements {
        if matches!(covered_until, Some(end) if element.start < end) {
            continue;
        }
        canonical.push_str(&c14n::canonicalize(
            events,
            element.start,
            method,
            inclusive_prefixes,
        )?);
        covered_until = Some(element.end);
    }
    Ok(canonical)
}

/// Canonicalized `SignedInfo` bytes, the input to the signature algorithm.
pub fn canonical_signed_info(signed_info: &ds::SignedInfo) -> Result<String, Error> {
    let events = crate::parse_events(&signed_info.to_xml())?;
    c14n::canonicalize(&events, 0, Canonicalization::Exclusive, &[])
}

/// Digests the configured references and signs them with one private key.
pub struct ReferenceSigner {
    key: PKey<Private>,
    references: Vec<ReferenceTarget>,
    digest_algorithm: DigestAlgorithm,
    signature_algorithm: SignatureAlgorithm,
    key_info: ds::KeyInfo,
}

impl ReferenceSigner {
    pub fn new(
        key: PKey<Private>,
        references: Vec<ReferenceTarget>,
        digest_algorithm: DigestAlgorithm,
        signature_algorithm: SignatureAlgorithm,
        key_info: ds::KeyInfo,
    ) -> Self {
        ReferenceSigner {
            key,
            references,
            digest_algorithm,
            signature_algorithm,
            key_info,
        }
    }

    pub fn references(&self) -> &[ReferenceTarget] {
        &self.references
    }

    fn digest(&self, target: &ReferenceTarget, canonical: &str) -> Result<String, Error> {
        log::trace!("digest input for {}: {}", target.local_name, canonical);
        let digest =
            openssl::hash::hash(self.digest_algorithm.message_digest(), canonical.as_bytes())?;
        Ok(base64::encode(digest))
    }

    /// Signs every configured target.
    ///
    /// A target whose matches all carry an `Id` gets one `#id` Reference per
    /// match. Otherwise the target is covered by a single same-document
    /// Reference with an XPath filter naming its local name.
    pub fn compute_signature(&self, xml: &str) -> Result<ds::Signature, Error> {
        let events = crate::parse_events(xml)?;

        let mut references = vec![];
        for target in &self.references {
            let resolved = resolve(&events, &target.local_name)?;
            if resolved.is_empty() {
                return Err(Error::ReferenceResolution(target.selector()));
            }

            if resolved.iter().all(|e| e.id.is_some()) {
                for element in &resolved {
                    let canonical = canonicalize_elements(
                        &events,
                        std::slice::from_ref(element),
                        target.canonicalization,
                        &target.inclusive_prefixes,
                    )?;
                    references.push(ds::Reference {
                        uri: element.id.as_ref().map(|id| format!("#{}", id)),
                        transforms: vec![target.transform()],
                        digest_method: self.digest_algorithm.uri().to_string(),
                        digest_value: self.digest(target, &canonical)?,
                    });
                }
            } else {
                // a same-document reference never carries comment nodes
                let canonical = canonicalize_elements(
                    &events,
                    &resolved,
                    target.canonicalization.without_comments(),
                    &target.inclusive_prefixes,
                )?;
                references.push(ds::Reference {
                    uri: Some(String::new()),
                    transforms: vec![
                        ds::Transform::xpath_filter(&target.xpath_filter()),
                        target.transform(),
                    ],
                    digest_method: self.digest_algorithm.uri().to_string(),
                    digest_value: self.digest(target, &canonical)?,
                });
            }
        }

        let signed_info = ds::SignedInfo {
            canonicalization_method: Canonicalization::Exclusive.uri().to_string(),
            signature_method: self.signature_algorithm.uri().to_string(),
            references,
        };
        let canonical_signed_info = canonical_signed_info(&signed_info)?;

        let mut signer =
            openssl::sign::Signer::new(self.signature_algorithm.message_digest(), &self.key)?;
        signer.update(canonical_signed_info.as_bytes())?;
        let signature = signer.sign_to_vec()?;

        log::debug!(
            "signed {} references with {}",
            signed_info.references.len(),
            signed_info.signature_method
        );

        Ok(ds::Signature {
            signed_info,
            signature_value: base64::encode(&signature),
            key_info: self.key_info.clone(),
        })
    }
}
