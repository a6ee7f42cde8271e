//! Error types for the Postbox API.

use sealpost_core::CoreError;
use sealpost_envelope::EnvelopeError;
use sealpost_trust::TrustError;
use thiserror::Error;

/// Errors that can occur during Postbox operations.
#[derive(Debug, Error)]
pub enum PostboxError {
    /// Envelope sealing or opening failed.
    #[error("envelope error: {0}")]
    Envelope(#[from] EnvelopeError),

    /// Trust store error, including missing trust bindings.
    #[error("trust error: {0}")]
    Trust(#[from] TrustError),

    /// Identity or primitive failure.
    #[error("core error: {0}")]
    Core(#[from] CoreError),

    /// More recipients than the configured limit.
    #[error("{count} recipients exceeds limit of {max}")]
    TooManyRecipients { count: usize, max: usize },

    /// An attachment is larger than the configured limit.
    #[error("attachment {filename} is {size} bytes, limit is {max}")]
    AttachmentTooLarge {
        filename: String,
        size: u64,
        max: u64,
    },

    /// Configuration could not be loaded.
    #[error("configuration error: {0}")]
    Config(String),
}

impl PostboxError {
    /// Whether this is a missing pinned key for some address.
    pub fn is_missing_trust(&self) -> bool {
        matches!(self, Self::Trust(TrustError::MissingTrustBinding(_)))
    }
}

/// Result type for Postbox operations.
pub type Result<T> = std::result::Result<T, PostboxError>;
