use openssl::asn1::Asn1Time;
use openssl::hash::MessageDigest;
use openssl::pkey::PKey;
use openssl::rsa::Rsa;
use openssl::x509::{X509Name, X509};

use wssecurity_cert::{
    verify_document, Canonicalization, Credentials, DigestAlgorithm, Error, ReferenceTarget,
    SignatureAlgorithm, SignerConfig, Timestamp, WsSecurityCert,
};

const SOAP12_DOCUMENT: &str = r#"<env:Envelope xmlns:env="http://www.w3.org/2003/05/soap-envelope" xmlns:m="urn:example:m">
    <env:Header><m:Trace>abc</m:Trace></env:Header>
    <env:Body Id="body-1">
        <m:GetQuote><m:Symbol>ACME</m:Symbol></m:GetQuote>
    </env:Body>
</env:Envelope>"#;

fn key_and_cert() -> (Vec<u8>, Vec<u8>) {
    let key = PKey::from_rsa(Rsa::generate(2048).unwrap()).unwrap();

    let mut name = X509Name::builder().unwrap();
    name.append_entry_by_text("CN", "integration").unwrap();
    let name = name.build();

    let mut builder = X509::builder().unwrap();
    builder.set_version(2).unwrap();
    builder.set_subject_name(&name).unwrap();
    builder.set_issuer_name(&name).unwrap();
    builder.set_pubkey(&key).unwrap();
    builder
        .set_not_before(&Asn1Time::days_from_now(0).unwrap())
        .unwrap();
    builder
        .set_not_after(&Asn1Time::days_from_now(30).unwrap())
        .unwrap();
    builder.sign(&key, MessageDigest::sha256()).unwrap();

    (
        key.private_key_to_pem_pkcs8().unwrap(),
        builder.build().to_pem().unwrap(),
    )
}

#[test]
fn soap12_with_stronger_algorithms() {
    let (key, cert) = key_and_cert();

    let mut body = ReferenceTarget::new("Body");
    body.inclusive_prefixes = vec!["m".to_string()];
    let mut timestamp = ReferenceTarget::new("Timestamp");
    timestamp.canonicalization = Canonicalization::Inclusive;

    let mut config = SignerConfig::new(key, cert);
    config.references = vec![body, timestamp];
    config.digest_algorithm = DigestAlgorithm::Sha256;
    config.signature_algorithm = SignatureAlgorithm::RsaSha256;
    let signer = WsSecurityCert::new(config).unwrap();

    let signed = signer
        .sign_with_timestamp(
            SOAP12_DOCUMENT,
            &Timestamp {
                created: "2030-01-01T00:00:00Z".to_string(),
                expires: "2030-01-01T00:10:00Z".to_string(),
            },
        )
        .unwrap();

    assert!(signed.contains("<m:Trace>abc</m:Trace><wsse:Security"));
    assert!(signed.contains("env:mustUnderstand=\"1\""));
    assert!(signed.contains("<wsu:Created>2030-01-01T00:00:00Z</wsu:Created>"));
    assert!(signed.contains("PrefixList=\"m\""));
    assert!(signed.contains(SignatureAlgorithm::RsaSha256.uri()));

    let verified = verify_document(&signed).unwrap();
    assert_eq!(verified.references.len(), 2);
    assert!(verified.references[0].canonical.starts_with(
        "<env:Body xmlns:env=\"http://www.w3.org/2003/05/soap-envelope\" xmlns:m=\"urn:example:m\" Id=\"body-1\">"
    ));
    assert!(verified.references[1].canonical.contains("xmlns:m=\"urn:example:m\""));
}

#[test]
fn username_token_signed_document() {
    let (key, cert) = key_and_cert();
    let mut config = SignerConfig::new(key, cert);
    config.references = vec![ReferenceTarget::new("Body"), ReferenceTarget::new("Timestamp")];
    config.credentials = Some(Credentials {
        username: "svc".to_string(),
        password: "a&b".to_string(),
    });
    config.allow_plaintext_credentials = true;
    let signer = WsSecurityCert::new(config).unwrap();

    let signed = signer.sign(SOAP12_DOCUMENT).unwrap();
    assert!(signed.contains(">a&amp;b</wsse:Password>"));
    verify_document(&signed).unwrap();
}

#[test]
fn default_reference_set_requires_ebs_and_idp() {
    let (key, cert) = key_and_cert();
    let signer = WsSecurityCert::new(SignerConfig::new(key, cert)).unwrap();
    match signer.sign(SOAP12_DOCUMENT) {
        Err(Error::ReferenceResolution(selector)) => {
            assert_eq!(selector, "//*[local-name(.)='EBS']")
        }
        r => panic!("unexpected {:?}", r),
    }
}

#[test]
fn key_cert_mismatch_rejected_at_construction() {
    let (key, _) = key_and_cert();
    let (_, cert) = key_and_cert();
    assert!(matches!(
        WsSecurityCert::new(SignerConfig::new(key, cert)),
        Err(Error::KeyMaterial(_))
    ));
}

#[test]
fn idless_body_with_payload_timestamp() {
    let (key, cert) = key_and_cert();
    let mut config = SignerConfig::new(key, cert);
    config.references = vec![ReferenceTarget::new("Body"), ReferenceTarget::new("Timestamp")];
    let signer = WsSecurityCert::new(config).unwrap();

    let doc = r#"<soap:Envelope xmlns:soap="http://schemas.xmlsoap.org/soap/envelope/"><soap:Header></soap:Header><soap:Body><Timestamp>t</Timestamp></soap:Body></soap:Envelope>"#;
    let signed = signer.sign(doc).unwrap();
    assert!(signed.contains("<soap:Header><wsse:Security"));
    assert_eq!(signed.matches("<Reference URI=\"\">").count(), 2);
    assert!(signed.contains("<XPath>ancestor-or-self::*[local-name()=&apos;Body&apos;]</XPath>"));
    assert!(signed.contains("<XPath>ancestor-or-self::*[local-name()=&apos;Timestamp&apos;]</XPath>"));

    let verified = verify_document(&signed).unwrap();
    verified
        .require(&[ReferenceTarget::new("Timestamp"), ReferenceTarget::new("Body")])
        .unwrap();
    assert_eq!(
        verified.references[0].canonical,
        "<soap:Body xmlns:soap=\"http://schemas.xmlsoap.org/soap/envelope/\"><Timestamp>t</Timestamp></soap:Body>"
    );

    let tampered = signed.replace("<Timestamp>t</Timestamp>", "<Timestamp>x</Timestamp>");
    assert!(matches!(
        verify_document(&tampered),
        Err(Error::Verification(_))
    ));
}

#[test]
fn crlf_line_ends_digest_like_lf() {
    let (key, cert) = key_and_cert();
    let mut config = SignerConfig::new(key, cert);
    config.references = vec![ReferenceTarget::new("Body"), ReferenceTarget::new("Timestamp")];
    let signer = WsSecurityCert::new(config).unwrap();

    let crlf = SOAP12_DOCUMENT.replace('\n', "\r\n");
    let signed_crlf = signer.sign(&crlf).unwrap();
    assert!(signed_crlf.contains("</m:GetQuote>\r\n"));
    let signed_lf = signer.sign(SOAP12_DOCUMENT).unwrap();

    let body_crlf = &verify_document(&signed_crlf).unwrap().references[0];
    let body_lf = &verify_document(&signed_lf).unwrap().references[0];
    assert!(!body_crlf.canonical.contains('\r'));
    assert_eq!(body_crlf.canonical, body_lf.canonical);
}
