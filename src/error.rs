//! use certmint::error::CertMintError;

use thiserror::Error;

/// Represents errors that can occur while issuing or storing certificates.
///
/// Every engine operation either fully succeeds or returns one of these
/// before anything was persisted. The one exception is
/// [`CertMintError::PersistFailed`], which is reported when a certificate was
/// signed but the store refused it.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CertMintError {
    /// A non-root certificate was requested but no authority could be resolved or created.
    #[error("No root authority available: {0}")]
    MissingRootAuthority(String),

    /// The self-signature of a certificate signing request did not verify.
    #[error("Certificate signing request signature is invalid")]
    InvalidCsrSignature,

    /// The certificate signing request could not be parsed.
    #[error("Malformed certificate signing request: {0}")]
    MalformedCsr(String),

    /// The certificate store rejected a read or write.
    #[error("Certificate store access failed: {0}")]
    StoreAccess(String),

    /// A certificate was signed but could not be written to the store.
    #[error("Issued certificate for {subject} could not be persisted: {reason}")]
    PersistFailed { subject: String, reason: String },

    /// A usage name did not match any known usage.
    #[error("Unknown certificate usage: {0}")]
    UnknownUsage(String),

    /// A subject or issuer name was malformed.
    #[error("Invalid distinguished name: {0}")]
    InvalidDistinguishedName(String),

    /// Error due to invalid input.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// A key or signature algorithm is not supported.
    #[error("Unsupported algorithm: {0}")]
    UnsupportedAlgorithm(String),

    /// Error during data encoding.
    #[error("Failed to encode data: {0}")]
    EncodingError(String),

    /// Error during data decoding.
    #[error("Failed to decode data: {0}")]
    DecodingError(String),

    /// Error during key generation.
    #[error("Key generation error: {0}")]
    KeyGenerationError(String),

    /// Error from RSA operations.
    #[error("RSA error: {0}")]
    RsaError(String),

    /// Error while building or opening a PKCS#12 bundle.
    #[error("PKCS#12 error: {0}")]
    Pkcs12Error(String),
}

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, CertMintError>;

impl From<der::Error> for CertMintError {
    /// Converts a `der::Error` into a `CertMintError`.
    fn from(err: der::Error) -> Self {
        CertMintError::DecodingError(err.to_string())
    }
}

impl From<rsa::Error> for CertMintError {
    fn from(err: rsa::Error) -> Self {
        CertMintError::RsaError(err.to_string())
    }
}

impl From<pkcs8::Error> for CertMintError {
    fn from(err: pkcs8::Error) -> Self {
        CertMintError::DecodingError(err.to_string())
    }
}

impl From<pkcs8::spki::Error> for CertMintError {
    fn from(err: pkcs8::spki::Error) -> Self {
        CertMintError::DecodingError(err.to_string())
    }
}

impl From<pem::PemError> for CertMintError {
    fn from(err: pem::PemError) -> Self {
        CertMintError::DecodingError(err.to_string())
    }
}

impl From<std::io::Error> for CertMintError {
    fn from(err: std::io::Error) -> Self {
        CertMintError::StoreAccess(err.to_string())
    }
}
