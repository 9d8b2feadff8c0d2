//! Error type shared by every signing and verification step.

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Private key or certificate could not be loaded; raised at construction.
    #[error("key material error: {0}")]
    KeyMaterial(String),

    /// A signed element is absent from the document.
    #[error("unable to find signed element: {0}")]
    ReferenceResolution(String),

    /// A close tag the assembler splices against is absent.
    #[error("insertion marker not found: {0}")]
    MarkerNotFound(String),

    #[error("template render error: {0}")]
    TemplateRender(String),

    #[error("unable to decode XML: {0}")]
    Xml(#[from] xml::reader::Error),

    #[error("canonicalization error: {0}")]
    Canonicalization(String),

    #[error("openssl error: {0}")]
    Crypto(#[from] openssl::error::ErrorStack),

    #[error("signature verification failed: {0}")]
    Verification(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
