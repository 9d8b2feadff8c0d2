//! XML-DSig `Signature` model: rendering for the signer, decoding for the
//! verifier.

use crate::error::Error;
use crate::proto::Element;
use crate::template;

pub const XMLDSIG_NAMESPACE: &str = "http://www.w3.org/2000/09/xmldsig#";
pub const EXC_C14N_NAMESPACE: &str = "http://www.w3.org/2001/10/xml-exc-c14n#";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Signature {
    pub signed_info: SignedInfo,
    pub signature_value: String,
    pub key_info: KeyInfo,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedInfo {
    pub canonicalization_method: String,
    pub signature_method: String,
    pub references: Vec<Reference>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reference {
    pub uri: Option<String>,
    pub transforms: Vec<Transform>,
    pub digest_method: String,
    pub digest_value: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transform {
    pub algorithm: String,
    /// Exclusive c14n `InclusiveNamespaces` prefix list.
    pub inclusive_prefixes: Option<Vec<String>>,
    /// Expression of an XPath filter transform.
    pub xpath: Option<String>,
}

/// Points at the `BinarySecurityToken` carrying the signing certificate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyInfo {
    pub token_id: String,
}

fn push_algorithm_element(out: &mut String, local_name: &str, algorithm: &str) {
    out.push('<');
    out.push_str(local_name);
    out.push_str(" Algorithm=\"");
    out.push_str(&template::escape(algorithm));
    out.push_str("\"/>");
}

impl Transform {
    pub fn xpath_filter(expression: &str) -> Self {
        Transform {
            algorithm: crate::TRANSFORM_XPATH.to_string(),
            inclusive_prefixes: None,
            xpath: Some(expression.to_string()),
        }
    }

    fn write_xml(&self, out: &mut String) {
        if let Some(expression) = &self.xpath {
            out.push_str("<Transform Algorithm=\"");
            out.push_str(&template::escape(&self.algorithm));
            out.push_str("\"><XPath>");
            out.push_str(&template::escape(expression));
            out.push_str("</XPath></Transform>");
            return;
        }
        match &self.inclusive_prefixes {
            Some(prefixes) => {
                out.push_str("<Transform Algorithm=\"");
                out.push_str(&template::escape(&self.algorithm));
                out.push_str("\"><ec:InclusiveNamespaces xmlns:ec=\"");
                out.push_str(EXC_C14N_NAMESPACE);
                out.push_str("\" PrefixList=\"");
                out.push_str(&template::escape(&prefixes.join(" ")));
                out.push_str("\"/></Transform>");
            }
            None => push_algorithm_element(out, "Transform", &self.algorithm),
        }
    }
}

impl Reference {
    fn write_xml(&self, out: &mut String) {
        match &self.uri {
            Some(uri) => {
                out.push_str("<Reference URI=\"");
                out.push_str(&template::escape(uri));
                out.push_str("\">");
            }
            None => out.push_str("<Reference>"),
        }
        if !self.transforms.is_empty() {
            out.push_str("<Transforms>");
            for t in &self.transforms {
                t.write_xml(out);
            }
            out.push_str("</Transforms>");
        }
        push_algorithm_element(out, "DigestMethod", &self.digest_method);
        out.push_str("<DigestValue>");
        out.push_str(&self.digest_value);
        out.push_str("</DigestValue></Reference>");
    }
}

impl SignedInfo {
    /// `declare_namespace` puts the XML-DSig default namespace on
    /// `SignedInfo` itself, for canonicalizing it outside a `Signature`.
    pub fn write_xml(&self, out: &mut String, declare_namespace: bool) {
        if declare_namespace {
            out.push_str("<SignedInfo xmlns=\"");
            out.push_str(XMLDSIG_NAMESPACE);
            out.push_str("\">");
        } else {
            out.push_str("<SignedInfo>");
        }
        push_algorithm_element(out, "CanonicalizationMethod", &self.canonicalization_method);
        push_algorithm_element(out, "SignatureMethod", &self.signature_method);
        for r in &self.references {
            r.write_xml(out);
        }
        out.push_str("</SignedInfo>");
    }

    pub fn to_xml(&self) -> String {
        let mut out = String::new();
        self.write_xml(&mut out, true);
        out
    }

    fn from_element(e: &Element) -> Result<Self, Error> {
        let canonicalization_method = required_algorithm(e, "CanonicalizationMethod")?;
        let signature_method = required_algorithm(e, "SignatureMethod")?;
        let references = e
            .elements()
            .filter(|c| c.name.local_name == "Reference")
            .map(Reference::from_element)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(SignedInfo {
            canonicalization_method,
            signature_method,
            references,
        })
    }
}

impl KeyInfo {
    fn write_xml(&self, out: &mut String) -> Result<(), Error> {
        out.push_str("<KeyInfo>");
        out.push_str(&template::render(
            template::SECURITY_TOKEN_REFERENCE,
            &[("token_id", self.token_id.as_str())],
        )?);
        out.push_str("</KeyInfo>");
        Ok(())
    }

    fn from_element(e: &Element) -> Result<Self, Error> {
        let uri = e
            .descendant("SecurityTokenReference")
            .and_then(|str_element| str_element.child("Reference"))
            .and_then(|r| r.attribute("URI"))
            .ok_or_else(|| missing("SecurityTokenReference/Reference/@URI"))?;
        match uri.strip_prefix('#') {
            Some(id) => Ok(KeyInfo {
                token_id: id.to_string(),
            }),
            None => Err(Error::Verification(format!(
                "unsupported security token reference: {}",
                uri
            ))),
        }
    }
}

impl Reference {
    fn from_element(e: &Element) -> Result<Self, Error> {
        let transforms = match e.child("Transforms") {
            Some(ts) => ts
                .elements()
                .filter(|t| t.name.local_name == "Transform")
                .map(|t| {
                    Ok(Transform {
                        algorithm: t
                            .attribute("Algorithm")
                            .ok_or_else(|| missing("Transform/@Algorithm"))?
                            .to_string(),
                        inclusive_prefixes: t
                            .child("InclusiveNamespaces")
                            .and_then(|i| i.attribute("PrefixList"))
                            .map(|l| l.split_whitespace().map(str::to_string).collect()),
                        xpath: t.child("XPath").map(|x| x.text().trim().to_string()),
                    })
                })
                .collect::<Result<Vec<_>, Error>>()?,
            None => vec![],
        };
        Ok(Reference {
            uri: e.attribute("URI").map(str::to_string),
            transforms,
            digest_method: required_algorithm(e, "DigestMethod")?,
            digest_value: e
                .child("DigestValue")
                .ok_or_else(|| missing("DigestValue"))?
                .text()
                .trim()
                .to_string(),
        })
    }
}

impl Signature {
    pub fn to_xml(&self) -> Result<String, Error> {
        let mut out = String::new();
        out.push_str("<Signature xmlns=\"");
        out.push_str(XMLDSIG_NAMESPACE);
        out.push_str("\">");
        self.signed_info.write_xml(&mut out, false);
        out.push_str("<SignatureValue>");
        out.push_str(&self.signature_value);
        out.push_str("</SignatureValue>");
        self.key_info.write_xml(&mut out)?;
        out.push_str("</Signature>");
        Ok(out)
    }

    pub fn from_element(e: &Element) -> Result<Self, Error> {
        if !e.is(XMLDSIG_NAMESPACE, "Signature") {
            return Err(Error::Verification(format!(
                "expected Signature, found {}",
                e.name.local_name
            )));
        }
        Ok(Signature {
            signed_info: SignedInfo::from_element(
                e.child("SignedInfo").ok_or_else(|| missing("SignedInfo"))?,
            )?,
            signature_value: e
                .child("SignatureValue")
                .ok_or_else(|| missing("SignatureValue"))?
                .text()
                .split_whitespace()
                .collect(),
            key_info: KeyInfo::from_element(e.child("KeyInfo").ok_or_else(|| missing("KeyInfo"))?)?,
        })
    }
}

fn missing(what: &str) -> Error {
    Error::Verification(format!("signature is missing {}", what))
}

fn required_algorithm(e: &Element, local_name: &str) -> Result<String, Error> {
    e.child(local_name)
        .and_then(|c| c.attribute("Algorithm"))
        .map(str::to_string)
        .ok_or_else(|| missing(local_name))
}
