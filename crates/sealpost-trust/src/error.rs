//! Error types for the trust store.

use thiserror::Error;

use crate::contact::ContactStatus;

/// Errors that can occur during trust store operations.
#[derive(Debug, Error)]
pub enum TrustError {
    /// No usable pinned key for this address. The caller decides whether
    /// that is a hard failure or a prompt for manual verification.
    #[error("no trust binding for {0}")]
    MissingTrustBinding(String),

    /// No contact stored under this address.
    #[error("contact not found: {0}")]
    ContactNotFound(String),

    /// The requested snapshot version does not exist.
    #[error("snapshot {version} not found for {email}")]
    SnapshotNotFound { email: String, version: u64 },

    /// The event is not valid for the contact's current state.
    #[error("{event} not valid for {email} in state {from:?}")]
    InvalidTransition {
        email: String,
        from: Option<ContactStatus>,
        event: &'static str,
    },

    /// Offered key material whose fingerprint does not match its keys.
    #[error("inconsistent key material offered for {email} (fingerprint {fingerprint})")]
    InconsistentKeys { email: String, fingerprint: String },

    /// The contact changed between read and write; nothing was written.
    #[error("concurrent update of {0}")]
    ConcurrentUpdate(String),

    /// Database error from SQLite.
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// Snapshot or column serialization error.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Migration error.
    #[error("migration error: {0}")]
    Migration(String),

    /// A backend lock was poisoned by a panicking writer.
    #[error("store lock poisoned: {0}")]
    LockPoisoned(String),
}

/// Result type for trust store operations.
pub type Result<T> = std::result::Result<T, TrustError>;
