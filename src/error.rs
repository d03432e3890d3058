//! Error type shared by the library and the `pcert` binary.
//!
//! ```rust
//! use pcert::error::PcertError;
//! use pcert::usage::string_to_usage;
//!
//! match string_to_usage("NoSuchUsage") {
//!     Err(PcertError::UnknownUsage(name)) => assert_eq!(name, "NoSuchUsage"),
//!     other => panic!("unexpected result: {other:?}"),
//! }
//! ```

use std::fmt;

use thiserror::Error;

/// The half of a signer that was not supplied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MissingSignerPart {
    /// The issuer certificate is missing.
    Certificate,
    /// The issuer private key is missing.
    PrivateKey,
}

impl fmt::Display for MissingSignerPart {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MissingSignerPart::Certificate => f.write_str("issuer certificate"),
            MissingSignerPart::PrivateKey => f.write_str("issuer private key"),
        }
    }
}

/// Represents errors that can occur while building, signing or inspecting certificates.
#[derive(Debug, Error)]
pub enum PcertError {
    /// A key usage or extended key usage name is not known.
    #[error("unknown usage '{0}'")]
    UnknownUsage(String),

    /// A subject attribute key is not known.
    #[error("unknown subject attribute '{0}'")]
    UnknownAttribute(String),

    /// A subject segment could not be split into key and value.
    #[error("malformed subject segment '{0}': could not split into key and value")]
    MalformedSubject(String),

    /// A signature algorithm name is not known.
    #[error("unknown signature algorithm '{0}'")]
    UnknownSignatureAlgorithm(String),

    /// A key algorithm name is not known.
    #[error("unknown key algorithm '{0}'")]
    UnknownKeyAlgorithm(String),

    /// The key size is not valid for the chosen algorithm.
    #[error("unsupported key size {size} for {algorithm}")]
    UnsupportedKeySize { algorithm: String, size: usize },

    /// The signing key cannot produce the requested signature algorithm.
    #[error("signature algorithm {algorithm} cannot be used with a {key} key")]
    IncompatibleSignatureAlgorithm { algorithm: String, key: String },

    /// A profile name is not known.
    #[error("unknown profile '{0}'")]
    UnknownProfile(String),

    /// Two profiles with contradicting constraints were requested together.
    #[error("profiles '{0}' and '{1}' cannot be combined")]
    ConflictingProfiles(String, String),

    /// Only one half of the issuer material was supplied.
    #[error("incomplete signer: {0} is missing")]
    IncompleteSigner(MissingSignerPart),

    /// The issuer private key does not belong to the issuer certificate.
    #[error("issuer private key does not match the public key of the issuer certificate")]
    SignerKeyMismatch,

    /// The entropy source produced only zero serial numbers.
    #[error("could not generate a non-zero serial number after {0} attempts")]
    RandomnessExhausted(usize),

    /// The entropy source failed.
    #[error("entropy source failed: {0}")]
    Entropy(String),

    /// A duration string could not be parsed.
    #[error("invalid duration '{0}': expected <n>d or <n>y")]
    InvalidDuration(String),

    /// Error during data encoding.
    #[error("failed to encode data: {0}")]
    EncodingError(String),

    /// Error during data decoding.
    #[error("failed to decode data: {0}")]
    DecodingError(String),

    /// Error due to invalid input.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// Error during key generation or signing.
    #[error("key error: {0}")]
    KeyError(String),

    /// Error while reading or writing PEM data.
    #[error("PEM error: {0}")]
    Pem(#[from] pem::PemError),

    /// Error while reading or writing files.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, PcertError>;

impl From<der::Error> for PcertError {
    fn from(err: der::Error) -> Self {
        PcertError::DecodingError(err.to_string())
    }
}

impl From<pkcs8::Error> for PcertError {
    fn from(err: pkcs8::Error) -> Self {
        PcertError::KeyError(err.to_string())
    }
}

impl From<pkcs8::spki::Error> for PcertError {
    fn from(err: pkcs8::spki::Error) -> Self {
        PcertError::KeyError(err.to_string())
    }
}

impl From<rsa::Error> for PcertError {
    fn from(err: rsa::Error) -> Self {
        PcertError::KeyError(err.to_string())
    }
}

impl From<rsa::signature::Error> for PcertError {
    fn from(err: rsa::signature::Error) -> Self {
        PcertError::KeyError(err.to_string())
    }
}

impl From<p256::elliptic_curve::Error> for PcertError {
    fn from(err: p256::elliptic_curve::Error) -> Self {
        PcertError::KeyError(err.to_string())
    }
}
