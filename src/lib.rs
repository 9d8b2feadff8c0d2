//! WS-Security X.509 token profile signing for SOAP envelopes.
//!
//! [`WsSecurityCert::sign`] splices a `wsse:Security` header (certificate
//! token, timestamp, optional username token) into a SOAP document, signs the
//! configured elements with XML-DSig and splices the `Signature` into the
//! header. The caller's bytes outside the two insertions are left untouched.

#[macro_use]
extern crate serde_derive;

pub mod algorithm;
pub mod assemble;
pub mod c14n;
pub mod config;
pub mod dsig;
pub mod error;
pub mod header;
pub mod id;
pub mod key;
pub mod proto;
pub mod template;
pub mod timestamp;
pub mod verify;

#[cfg(test)]
mod test_support;

pub use algorithm::{Canonicalization, DigestAlgorithm, SignatureAlgorithm};
pub use config::{Settings, SignerConfig};
pub use dsig::ReferenceTarget;
pub use error::Error;
pub use header::Credentials;
pub use key::KeyEncoding;
pub use timestamp::Timestamp;
pub use verify::{verify_document, Verified};

use assemble::{HEADER_CLOSE, SECURITY_CLOSE};
use header::SecurityHeader;

pub const DIGEST_SHA1: &str = "http://www.w3.org/2000/09/xmldsig#sha1";
pub const DIGEST_SHA256: &str = "http://www.w3.org/2001/04/xmlenc#sha256";
pub const DIGEST_SHA512: &str = "http://www.w3.org/2001/04/xmlenc#sha512";

pub const CANONICAL_1_0: &str = "http://www.w3.org/TR/2001/REC-xml-c14n-20010315";
pub const CANONICAL_1_0_COMMENTS: &str =
    "http://www.w3.org/TR/2001/REC-xml-c14n-20010315#WithComments";
pub const CANONICAL_EXCLUSIVE_1_0: &str = "http://www.w3.org/2001/10/xml-exc-c14n#";
pub const CANONICAL_EXCLUSIVE_1_0_COMMENTS: &str =
    "http://www.w3.org/2001/10/xml-exc-c14n#WithComments";

pub const SIGNATURE_RSA_SHA1: &str = "http://www.w3.org/2000/09/xmldsig#rsa-sha1";
pub const SIGNATURE_RSA_SHA256: &str = "http://www.w3.org/2001/04/xmldsig-more#rsa-sha256";
pub const SIGNATURE_RSA_SHA512: &str = "http://www.w3.org/2001/04/xmldsig-more#rsa-sha512";

pub const TRANSFORM_XPATH: &str = "http://www.w3.org/TR/1999/REC-xpath-19991116";

pub const WSU_NAMESPACE: &str =
    "http://docs.oasis-open.org/wss/2004/01/oasis-200401-wss-wssecurity-utility-1.0.xsd";

/// Reads a document into reader events, keeping comments and whitespace.
///
/// Line ends and attribute whitespace are normalized first, see
/// [`c14n::normalize_source`].
pub fn parse_events(source_xml: &str) -> Result<Vec<xml::reader::XmlEvent>, Error> {
    let normalized = c14n::normalize_source(source_xml);
    let events = xml::reader::EventReader::new_with_config(
        normalized.as_bytes(),
        xml::ParserConfig::new()
            .ignore_comments(false)
            .trim_whitespace(false)
            .coalesce_characters(false)
            .ignore_root_level_whitespace(true),
    )
    .into_iter()
    .collect::<Result<Vec<_>, _>>()?;
    Ok(events)
}

/// Signs SOAP documents with one private key and certificate.
///
/// Immutable once built; `sign` takes `&self` and may be called from many
/// threads at once.
pub struct WsSecurityCert {
    certificate_body: String,
    token_id: String,
    credentials: Option<Credentials>,
    signer: dsig::ReferenceSigner,
}

impl std::fmt::Debug for WsSecurityCert {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WsSecurityCert")
            .field("token_id", &self.token_id)
            .field("references", &self.signer.references())
            .finish()
    }
}

impl WsSecurityCert {
    pub fn new(config: SignerConfig) -> Result<Self, Error> {
        if config.credentials.is_some() && !config.allow_plaintext_credentials {
            return Err(Error::Config(
                "username/password are sent in plain text; set allow_plaintext_credentials to include them"
                    .to_string(),
            ));
        }
        if config.credentials.is_some() {
            log::warn!("username token password will be sent in plain text");
        }
        if config.references.is_empty() {
            return Err(Error::Config("no reference targets configured".to_string()));
        }

        let material = key::KeyMaterial::load(
            &config.private_key,
            config.passphrase.as_deref(),
            &config.certificate,
            config.encoding,
        )?;

        let token_id = format!("x509-{}", id::generate_id());
        let signer = dsig::ReferenceSigner::new(
            material.private_key,
            config.references,
            config.digest_algorithm,
            config.signature_algorithm,
            proto::ds::KeyInfo {
                token_id: token_id.clone(),
            },
        );
        log::debug!("signer ready, security token {}", token_id);

        Ok(WsSecurityCert {
            certificate_body: material.certificate_body,
            token_id,
            credentials: config.credentials,
            signer,
        })
    }

    pub fn token_id(&self) -> &str {
        &self.token_id
    }

    /// Base64 DER of the certificate placed in the `BinarySecurityToken`.
    pub fn certificate_body(&self) -> &str {
        &self.certificate_body
    }

    pub fn references(&self) -> &[ReferenceTarget] {
        self.signer.references()
    }

    pub fn sign(&self, xml: &str) -> Result<String, Error> {
        self.sign_with_timestamp(xml, &Timestamp::now())
    }

    pub fn sign_with_timestamp(&self, xml: &str, timestamp: &Timestamp) -> Result<String, Error> {
        let marker = assemble::header_marker(xml)
            .ok_or_else(|| Error::MarkerNotFound(format!("</{}>", HEADER_CLOSE.local_name())))?;

        let timestamp_id = format!("TS-{}", id::generate_id());
        let security_header = SecurityHeader {
            certificate_body: &self.certificate_body,
            token_id: &self.token_id,
            timestamp_id: &timestamp_id,
            timestamp,
            credentials: self.credentials.as_ref(),
            envelope_prefix: marker.prefix,
        }
        .render()?;

        let xml_with_sec = assemble::insert_at(&security_header, xml, marker.offset);
        let signature = self.signer.compute_signature(&xml_with_sec)?;

        assemble::insert_before_from(
            &signature.to_xml()?,
            &xml_with_sec,
            &SECURITY_CLOSE,
            marker.offset,
        )
    }
}
