use openssl::hash::MessageDigest;

use crate::{
    CANONICAL_1_0, CANONICAL_1_0_COMMENTS, CANONICAL_EXCLUSIVE_1_0,
    CANONICAL_EXCLUSIVE_1_0_COMMENTS, DIGEST_SHA1, DIGEST_SHA256, DIGEST_SHA512,
    SIGNATURE_RSA_SHA1, SIGNATURE_RSA_SHA256, SIGNATURE_RSA_SHA512,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Canonicalization {
    #[default]
    Exclusive,
    ExclusiveWithComments,
    Inclusive,
    InclusiveWithComments,
}

impl Canonicalization {
    pub fn uri(self) -> &'static str {
        match self {
            Canonicalization::Exclusive => CANONICAL_EXCLUSIVE_1_0,
            Canonicalization::ExclusiveWithComments => CANONICAL_EXCLUSIVE_1_0_COMMENTS,
            Canonicalization::Inclusive => CANONICAL_1_0,
            Canonicalization::InclusiveWithComments => CANONICAL_1_0_COMMENTS,
        }
    }

    pub fn from_uri(uri: &str) -> Option<Self> {
        match uri {
            CANONICAL_EXCLUSIVE_1_0 => Some(Canonicalization::Exclusive),
            CANONICAL_EXCLUSIVE_1_0_COMMENTS => Some(Canonicalization::ExclusiveWithComments),
            CANONICAL_1_0 => Some(Canonicalization::Inclusive),
            CANONICAL_1_0_COMMENTS => Some(Canonicalization::InclusiveWithComments),
            _ => None,
        }
    }

    pub fn is_exclusive(self) -> bool {
        matches!(
            self,
            Canonicalization::Exclusive | Canonicalization::ExclusiveWithComments
        )
    }

    /// The same method with comment nodes dropped.
    pub fn without_comments(self) -> Self {
        match self {
            Canonicalization::ExclusiveWithComments => Canonicalization::Exclusive,
            Canonicalization::InclusiveWithComments => Canonicalization::Inclusive,
            c => c,
        }
    }

    pub fn with_comments(self) -> bool {
        matches!(
            self,
            Canonicalization::ExclusiveWithComments | Canonicalization::InclusiveWithComments
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DigestAlgorithm {
    #[default]
    Sha1,
    Sha256,
    Sha512,
}

impl DigestAlgorithm {
    pub fn uri(self) -> &'static str {
        match self {
            DigestAlgorithm::Sha1 => DIGEST_SHA1,
            DigestAlgorithm::Sha256 => DIGEST_SHA256,
            DigestAlgorithm::Sha512 => DIGEST_SHA512,
        }
    }

    pub fn from_uri(uri: &str) -> Option<Self> {
        match uri {
            DIGEST_SHA1 => Some(DigestAlgorithm::Sha1),
            DIGEST_SHA256 => Some(DigestAlgorithm::Sha256),
            DIGEST_SHA512 => Some(DigestAlgorithm::Sha512),
            _ => None,
        }
    }

    pub fn message_digest(self) -> MessageDigest {
        match self {
            DigestAlgorithm::Sha1 => MessageDigest::sha1(),
            DigestAlgorithm::Sha256 => MessageDigest::sha256(),
            DigestAlgorithm::Sha512 => MessageDigest::sha512(),
        }
    }
}

/// RSA PKCS#1 v1.5 signature methods.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SignatureAlgorithm {
    #[default]
    RsaSha1,
    RsaSha256,
    RsaSha512,
}

impl SignatureAlgorithm {
    pub fn uri(self) -> &'static str {
        match self {
            SignatureAlgorithm::RsaSha1 => SIGNATURE_RSA_SHA1,
            SignatureAlgorithm::RsaSha256 => SIGNATURE_RSA_SHA256,
            SignatureAlgorithm::RsaSha512 => SIGNATURE_RSA_SHA512,
        }
    }

    pub fn from_uri(uri: &str) -> Option<Self> {
        match uri {
            SIGNATURE_RSA_SHA1 => Some(SignatureAlgorithm::RsaSha1),
            SIGNATURE_RSA_SHA256 => Some(SignatureAlgorithm::RsaSha256),
            SIGNATURE_RSA_SHA512 => Some(SignatureAlgorithm::RsaSha512),
            _ => None,
        }
    }

    pub fn message_digest(self) -> MessageDigest {
        match self {
            SignatureAlgorithm::RsaSha1 => MessageDigest::sha1(),
            SignatureAlgorithm::RsaSha256 => MessageDigest::sha256(),
            SignatureAlgorithm::RsaSha512 => MessageDigest::sha512(),
        }
    }
}
