use once_cell::sync::Lazy;
use openssl::asn1::Asn1Time;
use openssl::bn::BigNum;
use openssl::hash::MessageDigest;
use openssl::pkey::{PKey, Private, Public};
use openssl::rsa::Rsa;
use openssl::symm::Cipher;
use openssl::x509::{X509Name, X509};

use crate::config::SignerConfig;
use crate::dsig::ReferenceTarget;

pub const SOAP_DOCUMENT: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<soap:Envelope xmlns:soap="http://schemas.xmlsoap.org/soap/envelope/" xmlns:wsu="http://docs.oasis-open.org/wss/2004/01/oasis-200401-wss-wssecurity-utility-1.0.xsd" xmlns:m="urn:example:ping">
  <soap:Header>
  </soap:Header>
  <soap:Body wsu:Id="id-body">
    <m:Ping>hello</m:Ping>
  </soap:Body>
</soap:Envelope>"#;

pub struct Fixture {
    pub private_key: PKey<Private>,
    pub public_key: PKey<Public>,
    pub key_pem: Vec<u8>,
    /// PKCS#8, AES-256-CBC, passphrase "hunter2".
    pub key_pem_encrypted: Vec<u8>,
    pub key_der: Vec<u8>,
    pub cert_pem: Vec<u8>,
    pub cert_der: Vec<u8>,
    pub certificate_body: String,
    /// Self-signed certificate for an unrelated key.
    pub other_cert_pem: Vec<u8>,
}

fn self_signed(key: &PKey<Private>, common_name: &str) -> X509 {
    let mut name = X509Name::builder().unwrap();
    name.append_entry_by_text("CN", common_name).unwrap();
    let name = name.build();

    let mut builder = X509::builder().unwrap();
    builder.set_version(2).unwrap();
    let serial = BigNum::from_u32(1).unwrap().to_asn1_integer().unwrap();
    builder.set_serial_number(&serial).unwrap();
    builder.set_subject_name(&name).unwrap();
    builder.set_issuer_name(&name).unwrap();
    builder.set_pubkey(key).unwrap();
    builder
        .set_not_before(&Asn1Time::days_from_now(0).unwrap())
        .unwrap();
    builder
        .set_not_after(&Asn1Time::days_from_now(365).unwrap())
        .unwrap();
    builder.sign(key, MessageDigest::sha256()).unwrap();
    builder.build()
}

fn rsa_key() -> PKey<Private> {
    PKey::from_rsa(Rsa::generate(2048).unwrap()).unwrap()
}

static FIXTURE: Lazy<Fixture> = Lazy::new(|| {
    let private_key = rsa_key();
    let public_key = PKey::public_key_from_der(&private_key.public_key_to_der().unwrap()).unwrap();
    let cert = self_signed(&private_key, "wsse signer");
    let cert_der = cert.to_der().unwrap();

    Fixture {
        key_pem: private_key.private_key_to_pem_pkcs8().unwrap(),
        key_pem_encrypted: private_key
            .private_key_to_pem_pkcs8_passphrase(Cipher::aes_256_cbc(), b"hunter2")
            .unwrap(),
        key_der: private_key.private_key_to_der().unwrap(),
        cert_pem: cert.to_pem().unwrap(),
        certificate_body: base64::encode(&cert_der),
        cert_der,
        other_cert_pem: self_signed(&rsa_key(), "someone else").to_pem().unwrap(),
        private_key,
        public_key,
    }
});

pub fn fixture() -> &'static Fixture {
    &FIXTURE
}

pub fn signer_config(references: Vec<ReferenceTarget>) -> SignerConfig {
    let f = fixture();
    let mut config = SignerConfig::new(f.key_pem.clone(), f.cert_pem.clone());
    config.references = references;
    config
}
