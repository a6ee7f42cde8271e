//! Error types for Sealpost Core.

use thiserror::Error;

/// Errors that can occur while generating or using identity keys.
#[derive(Debug, Error)]
pub enum CoreError {
    /// The OS random source failed. Fatal: no key material was produced.
    #[error("entropy source unavailable: {0}")]
    EntropyUnavailable(String),

    #[error("invalid signature")]
    InvalidSignature,

    #[error("invalid public key")]
    InvalidPublicKey,

    #[error("key derivation error: {0}")]
    KeyDerivation(String),

    #[error("serialization error: {0}")]
    Serialization(String),
}

/// Result type for core operations.
pub type Result<T> = std::result::Result<T, CoreError>;
