//! Signer construction options, and their YAML file form for the CLI.

use std::path::{Path, PathBuf};

use crate::algorithm::{DigestAlgorithm, SignatureAlgorithm};
use crate::dsig::ReferenceTarget;
use crate::error::Error;
use crate::header::Credentials;
use crate::key::KeyEncoding;

/// Everything needed to build a [`crate::WsSecurityCert`].
#[derive(Debug, Clone)]
pub struct SignerConfig {
    pub private_key: Vec<u8>,
    pub passphrase: Option<String>,
    pub certificate: Vec<u8>,
    /// Private key encoding; detected from the bytes when `None`.
    pub encoding: Option<KeyEncoding>,
    pub credentials: Option<Credentials>,
    /// Credentials are rejected unless this is set, as the password is
    /// sent in clear text.
    pub allow_plaintext_credentials: bool,
    pub references: Vec<ReferenceTarget>,
    pub digest_algorithm: DigestAlgorithm,
    pub signature_algorithm: SignatureAlgorithm,
}

impl SignerConfig {
    pub fn new(private_key: Vec<u8>, certificate: Vec<u8>) -> Self {
        SignerConfig {
            private_key,
            passphrase: None,
            certificate,
            encoding: None,
            credentials: None,
            allow_plaintext_credentials: false,
            references: ReferenceTarget::defaults(),
            digest_algorithm: DigestAlgorithm::default(),
            signature_algorithm: SignatureAlgorithm::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Settings {
    pub private_key: PathBuf,
    pub certificate: PathBuf,
    pub passphrase: Option<String>,
    pub encoding: Option<KeyEncoding>,
    pub username: Option<String>,
    pub password: Option<String>,
    pub allow_plaintext_credentials: bool,
    pub references: Vec<ReferenceTarget>,
    pub digest_algorithm: DigestAlgorithm,
    pub signature_algorithm: SignatureAlgorithm,
    /// Directory relative key and certificate paths are resolved against.
    #[serde(skip)]
    pub base_dir: Option<PathBuf>,
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            private_key: PathBuf::from("key.pem"),
            certificate: PathBuf::from("cert.pem"),
            passphrase: None,
            encoding: None,
            username: None,
            password: None,
            allow_plaintext_credentials: false,
            references: ReferenceTarget::defaults(),
            digest_algorithm: DigestAlgorithm::default(),
            signature_algorithm: SignatureAlgorithm::default(),
            base_dir: None,
        }
    }
}

impl Settings {
    pub fn from_yaml(source: &str) -> Result<Self, Error> {
        serde_yaml::from_str(source).map_err(|e| Error::Config(e.to_string()))
    }

    pub fn load(path: &Path) -> Result<Self, Error> {
        let source = std::fs::read_to_string(path)?;
        let mut settings = Self::from_yaml(&source)?;
        settings.base_dir = path.parent().map(Path::to_path_buf);
        log::debug!("loaded settings from {}", path.display());
        Ok(settings)
    }

    fn resolve_path(&self, path: &Path) -> PathBuf {
        match &self.base_dir {
            Some(base) if path.is_relative() => base.join(path),
            _ => path.to_path_buf(),
        }
    }

    /// Reads the key and certificate files into a [`SignerConfig`].
    pub fn signer_config(&self) -> Result<SignerConfig, Error> {
        let credentials = match (&self.username, &self.password) {
            (Some(username), password) => Some(Credentials {
                username: username.clone(),
                password: password.clone().unwrap_or_default(),
            }),
            (None, Some(_)) => {
                return Err(Error::Config("password given without a username".to_string()))
            }
            (None, None) => None,
        };

        Ok(SignerConfig {
            private_key: std::fs::read(self.resolve_path(&self.private_key))?,
            passphrase: self.passphrase.clone(),
            certificate: std::fs::read(self.resolve_path(&self.certificate))?,
            encoding: self.encoding,
            credentials,
            allow_plaintext_credentials: self.allow_plaintext_credentials,
            references: self.references.clone(),
            digest_algorithm: self.digest_algorithm,
            signature_algorithm: self.signature_algorithm,
        })
    }
}
