//! Error types for the envelope protocol.
//!
//! Every variant is terminal for the operation that produced it. Nothing is
//! retried internally.

use thiserror::Error;

use sealpost_core::{CoreError, Fingerprint};

/// Errors that can occur while sealing or opening an envelope.
#[derive(Debug, Error)]
pub enum EnvelopeError {
    /// The sender signature did not verify. Nothing was decrypted.
    #[error("signature invalid")]
    SignatureInvalid,

    /// The message key could not be unwrapped: wrong private key, or the
    /// wrap material was corrupted in transit.
    #[error("message key unwrap failed")]
    KeyUnwrapFailed,

    /// The body failed AEAD authentication (tampering or context mismatch).
    #[error("body decryption failed")]
    BodyDecryptFailed,

    /// An attachment failed AEAD authentication.
    #[error("attachment decryption failed: {0}")]
    AttachmentDecryptFailed(String),

    /// Two sealed parts of one message share a nonce.
    #[error("nonce reused within message")]
    NonceReuse,

    /// A multi-recipient envelope carries no wrap record for this recipient.
    #[error("no wrap record for recipient {0}")]
    NoWrapForRecipient(Fingerprint),

    /// The same recipient fingerprint was given twice.
    #[error("duplicate recipient {0}")]
    DuplicateRecipient(Fingerprint),

    /// A multi-recipient seal was requested with nobody to wrap for.
    #[error("no recipients")]
    NoRecipients,

    /// AEAD encryption failed.
    #[error("encryption error: {0}")]
    Encryption(String),

    /// A wire field could not be decoded.
    #[error("malformed field {field}: {reason}")]
    MalformedField { field: &'static str, reason: String },

    /// CBOR serialization error.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Entropy or key derivation failure from the core crate.
    #[error("core error: {0}")]
    Core(#[from] CoreError),
}

/// Result type for envelope operations.
pub type Result<T> = std::result::Result<T, EnvelopeError>;
