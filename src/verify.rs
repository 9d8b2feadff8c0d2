//! Verification of documents produced by [`crate::WsSecurityCert::sign`].
//!
//! Each Reference carries its own selector: either `#id`, or an empty URI
//! followed by an XPath filter naming the signed local name. Elements inside
//! the Signature itself are never part of a reference.

use openssl::pkey::{PKey, Public};
use xml::reader::XmlEvent;

use crate::algorithm::{Canonicalization, DigestAlgorithm, SignatureAlgorithm};
use crate::c14n;
use crate::dsig::{self, ReferenceTarget, ResolvedElement};
use crate::error::Error;
use crate::proto::{ds, Element};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifiedReference {
    pub local_name: String,
    pub uri: Option<String>,
    /// The canonical bytes the digest was computed over.
    pub canonical: String,
}

#[derive(Debug)]
pub struct Verified {
    pub references: Vec<VerifiedReference>,
    pub token_id: String,
    pub pkey: PKey<Public>,
}

impl Verified {
    /// Fails with the selector of the first target no verified reference covers.
    pub fn require(&self, targets: &[ReferenceTarget]) -> Result<(), Error> {
        for target in targets {
            if !self
                .references
                .iter()
                .any(|r| r.local_name == target.local_name)
            {
                return Err(Error::ReferenceResolution(target.selector()));
            }
        }
        Ok(())
    }
}

fn fail<T>(message: String) -> Result<T, Error> {
    Err(Error::Verification(message))
}

fn find_start(
    events: &[XmlEvent],
    from: usize,
    to: usize,
    namespace: &str,
    local_name: &str,
) -> Option<usize> {
    (from..to).find(|&i| match &events[i] {
        XmlEvent::StartElement { name, .. } => {
            name.namespace.as_deref() == Some(namespace) && name.local_name == local_name
        }
        _ => false,
    })
}

/// Element carrying `id`, with its local name.
fn find_by_id(
    events: &[XmlEvent],
    id: &str,
    outside: (usize, usize),
) -> Result<Option<(String, ResolvedElement)>, Error> {
    for (i, event) in events.iter().enumerate() {
        if i >= outside.0 && i <= outside.1 {
            continue;
        }
        if let XmlEvent::StartElement {
            name, attributes, ..
        } = event
        {
            if dsig::element_id(attributes) != Some(id) {
                continue;
            }
            let end = c14n::element_end(events, i).ok_or_else(|| {
                Error::Canonicalization(format!("unterminated element {}", name.local_name))
            })?;
            let element = ResolvedElement {
                start: i,
                end,
                id: Some(id.to_string()),
            };
            return Ok(Some((name.local_name.clone(), element)));
        }
    }
    Ok(None)
}

fn canonicalization_of(transform: &ds::Transform) -> Result<Canonicalization, Error> {
    Canonicalization::from_uri(&transform.algorithm).ok_or_else(|| {
        Error::Verification(format!("unsupported transform: {}", transform.algorithm))
    })
}

/// Canonical bytes a Reference's digest covers, and the local name it selects.
fn dereference(
    events: &[XmlEvent],
    reference: &ds::Reference,
    signature: (usize, usize),
) -> Result<(String, String), Error> {
    let uri = reference.uri.as_deref().unwrap_or_default();

    if let Some(id) = uri.strip_prefix('#') {
        let transform = match reference.transforms.as_slice() {
            [t] => t,
            _ => return fail(format!("unexpected transforms for {}", uri)),
        };
        let method = canonicalization_of(transform)?;
        let prefixes = transform.inclusive_prefixes.clone().unwrap_or_default();
        let (local_name, element) = match find_by_id(events, id, signature)? {
            Some(found) => found,
            None => return fail(format!("no element with id {}", id)),
        };
        let canonical = dsig::canonicalize_elements(
            events,
            std::slice::from_ref(&element),
            method,
            &prefixes,
        )?;
        return Ok((local_name, canonical));
    }

    if !uri.is_empty() {
        return fail(format!("unsupported reference URI {:?}", uri));
    }

    let (filter, transform) = match reference.transforms.as_slice() {
        [f, t] if f.algorithm == crate::TRANSFORM_XPATH => (f, t),
        _ => return fail("same-document reference without an XPath filter".to_string()),
    };
    let expression = filter.xpath.as_deref().unwrap_or_default();
    let local_name = match dsig::xpath_filter_local_name(expression) {
        Some(n) => n.to_string(),
        None => return fail(format!("unsupported XPath filter {:?}", expression)),
    };
    let method = canonicalization_of(transform)?.without_comments();
    let prefixes = transform.inclusive_prefixes.clone().unwrap_or_default();

    let found = dsig::resolve(events, &local_name)?
        .into_iter()
        .filter(|e| e.start < signature.0 || e.start > signature.1)
        .collect::<Vec<_>>();
    if found.is_empty() {
        return fail(format!("XPath filter for {} selects nothing", local_name));
    }
    let canonical = dsig::canonicalize_elements(events, &found, method, &prefixes)?;
    Ok((local_name, canonical))
}

fn certificate_key(events: &[XmlEvent], token_id: &str) -> Result<PKey<Public>, Error> {
    let token = dsig::resolve(events, "BinarySecurityToken")?
        .into_iter()
        .find(|t| t.id.as_deref() == Some(token_id));
    let token = match token {
        Some(t) => t,
        None => return fail(format!("security token {} not found", token_id)),
    };

    let body = Element::from_events(&events[token.start..=token.end])
        .map(|e| e.text())
        .unwrap_or_default();
    let der = base64::decode(body.split_whitespace().collect::<String>())
        .map_err(|e| Error::Verification(format!("error decoding X509 cert: {}", e)))?;
    let certificate = openssl::x509::X509::from_der(&der)?;
    Ok(certificate.public_key()?)
}

fn verify_signature(
    algorithm: SignatureAlgorithm,
    pkey: &PKey<Public>,
    sig: &[u8],
    data: &[u8],
) -> bool {
    let mut verifier = match openssl::sign::Verifier::new(algorithm.message_digest(), pkey) {
        Ok(v) => v,
        Err(_) => return false,
    };

    match verifier.verify_oneshot(sig, data) {
        Ok(v) => v,
        Err(_) => false,
    }
}

/// Checks every reference digest and the signature over `SignedInfo`.
///
/// Which elements were signed is read from the Signature; use
/// [`Verified::require`] to check it covers an expected reference set.
pub fn verify_document(source_xml: &str) -> Result<Verified, Error> {
    let events = crate::parse_events(source_xml)?;

    let sig_i = match find_start(&events, 0, events.len(), ds::XMLDSIG_NAMESPACE, "Signature") {
        Some(i) => i,
        None => return fail("document is not signed".to_string()),
    };
    let sig_end_i = c14n::element_end(&events, sig_i)
        .ok_or_else(|| Error::Verification("unterminated Signature".to_string()))?;
    let sig = Element::from_events(&events[sig_i..=sig_end_i])
        .ok_or_else(|| Error::Verification("unterminated Signature".to_string()))
        .and_then(|e| ds::Signature::from_element(&e))?;

    if sig.signed_info.references.is_empty() {
        return fail("signature has no references".to_string());
    }

    let mut verified = vec![];
    for reference in &sig.signed_info.references {
        let (local_name, canonical) = dereference(&events, reference, (sig_i, sig_end_i))?;

        let dm = DigestAlgorithm::from_uri(&reference.digest_method).ok_or_else(|| {
            Error::Verification(format!("unsupported digest method: {}", reference.digest_method))
        })?;
        let digest = openssl::hash::hash(dm.message_digest(), canonical.as_bytes())?;
        let provided_digest = base64::decode(&reference.digest_value)
            .map_err(|e| Error::Verification(format!("invalid digest base64: {}", e)))?;
        if digest.as_ref() != provided_digest.as_slice() {
            return fail(format!("digest does not match for {}", local_name));
        }

        verified.push(VerifiedReference {
            local_name,
            uri: reference.uri.clone(),
            canonical,
        });
    }

    let method = Canonicalization::from_uri(&sig.signed_info.canonicalization_method)
        .ok_or_else(|| {
            Error::Verification(format!(
                "unsupported canonicalisation method: {}",
                sig.signed_info.canonicalization_method
            ))
        })?;
    let signed_info_i = find_start(&events, sig_i, sig_end_i, ds::XMLDSIG_NAMESPACE, "SignedInfo")
        .ok_or_else(|| Error::Verification("signature is missing SignedInfo".to_string()))?;
    let signed_info_data = c14n::canonicalize(&events, signed_info_i, method, &[])?;

    let algorithm = SignatureAlgorithm::from_uri(&sig.signed_info.signature_method).ok_or_else(|| {
        Error::Verification(format!(
            "unsupported signature method: {}",
            sig.signed_info.signature_method
        ))
    })?;
    let pkey = certificate_key(&events, &sig.key_info.token_id)?;
    let sig_data = base64::decode(&sig.signature_value)
        .map_err(|e| Error::Verification(format!("error decoding signature: {}", e)))?;

    if !verify_signature(algorithm, &pkey, &sig_data, signed_info_data.as_bytes()) {
        return fail("signature does not verify".to_string());
    }

    log::debug!("verified {} references", verified.len());
    Ok(Verified {
        references: verified,
        token_id: sig.key_info.token_id,
        pkey,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{signer_config, SOAP_DOCUMENT};
    use crate::WsSecurityCert;

    fn signed() -> (WsSecurityCert, String) {
        let signer = WsSecurityCert::new(signer_config(vec![
            ReferenceTarget::new("Body"),
            ReferenceTarget::new("Timestamp"),
        ]))
        .unwrap();
        let xml = signer.sign(SOAP_DOCUMENT).unwrap();
        (signer, xml)
    }

    /// Body and Timestamp of the payload carry no ids.
    const IDLESS_DOCUMENT: &str = r#"<soap:Envelope xmlns:soap="http://schemas.xmlsoap.org/soap/envelope/"><soap:Header></soap:Header><soap:Body><Timestamp>t</Timestamp></soap:Body></soap:Envelope>"#;

    #[test]
    fn verifies_signed_document() {
        let (signer, xml) = signed();
        let v = verify_document(&xml).unwrap();
        v.require(signer.references()).unwrap();
        assert_eq!(v.references[0].local_name, "Body");
        assert_eq!(v.references[0].uri.as_deref(), Some("#id-body"));
        assert!(v.references[0].canonical.starts_with("<soap:Body xmlns:soap="));
        assert_eq!(v.references[1].local_name, "Timestamp");
        assert!(v.references[1].uri.as_deref().unwrap().starts_with("#TS-"));
    }

    #[test]
    fn idless_elements_verify_in_any_target_order() {
        let signer = WsSecurityCert::new(signer_config(vec![
            ReferenceTarget::new("Body"),
            ReferenceTarget::new("Timestamp"),
        ]))
        .unwrap();
        let xml = signer.sign(IDLESS_DOCUMENT).unwrap();
        assert!(xml.contains("<Reference URI=\"\">"));

        let v = verify_document(&xml).unwrap();
        assert_eq!(v.references.len(), 2);
        assert_eq!(v.references[0].local_name, "Body");
        assert_eq!(v.references[1].local_name, "Timestamp");
        // the header Timestamp and the payload one share a reference
        assert!(v.references[1].canonical.ends_with("<Timestamp>t</Timestamp>"));
        v.require(&[ReferenceTarget::new("Timestamp"), ReferenceTarget::new("Body")])
            .unwrap();

        let tampered = xml.replace("<Timestamp>t</Timestamp>", "<Timestamp>u</Timestamp>");
        match verify_document(&tampered) {
            Err(Error::Verification(m)) => assert!(m.contains("Body")),
            r => panic!("unexpected {:?}", r.map(|v| v.references)),
        }
    }

    #[test]
    fn tampered_body_fails() {
        let (_, xml) = signed();
        let tampered = xml.replace("<m:Ping>hello</m:Ping>", "<m:Ping>HELLO</m:Ping>");
        assert_ne!(tampered, xml);
        match verify_document(&tampered) {
            Err(Error::Verification(m)) => assert!(m.contains("Body")),
            r => panic!("unexpected {:?}", r.map(|v| v.references)),
        }
    }

    #[test]
    fn tampered_signature_value_fails() {
        let (_, xml) = signed();
        let start = xml.find("<SignatureValue>").unwrap() + 16;
        let mut tampered = xml.clone();
        let replacement = if &xml[start..start + 1] == "A" { "B" } else { "A" };
        tampered.replace_range(start..start + 1, replacement);
        assert!(matches!(
            verify_document(&tampered),
            Err(Error::Verification(_))
        ));
    }

    #[test]
    fn rewritten_selector_fails() {
        let signer = WsSecurityCert::new(signer_config(vec![ReferenceTarget::new("Body")])).unwrap();
        let xml = signer.sign(IDLESS_DOCUMENT).unwrap();
        let tampered = xml.replace("local-name()=&apos;Body&apos;", "local-name()=&apos;Header&apos;");
        assert_ne!(tampered, xml);
        assert!(matches!(
            verify_document(&tampered),
            Err(Error::Verification(_))
        ));
    }

    #[test]
    fn whitespace_outside_references_is_ignored() {
        let (_, xml) = signed();
        let reformatted = xml.replacen("<soap:Header>", "<soap:Header>\n\n   ", 1);
        assert_ne!(reformatted, xml);
        verify_document(&reformatted).unwrap();
    }

    #[test]
    fn unsigned_document() {
        assert!(matches!(
            verify_document(SOAP_DOCUMENT),
            Err(Error::Verification(_))
        ));
    }

    #[test]
    fn different_reference_set_fails() {
        let (_, xml) = signed();
        let v = verify_document(&xml).unwrap();
        match v.require(&[ReferenceTarget::new("Body"), ReferenceTarget::new("EBS")]) {
            Err(Error::ReferenceResolution(s)) => assert!(s.contains("EBS")),
            r => panic!("unexpected {:?}", r),
        }
    }
}
