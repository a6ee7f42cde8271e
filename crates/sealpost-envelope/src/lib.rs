//! # Sealpost Envelope
//!
//! Hybrid encryption with sender signatures for mail-like messages.
//!
//! A body is encrypted once with ChaCha20-Poly1305 under a random message
//! key, using `from\nto\nsubject` as associated data. The message key is
//! wrapped per recipient via ephemeral X25519 and HKDF-SHA256. The sender
//! signs every field a tamperer could swap; opening verifies that signature
//! against a key from the caller's trust store before decrypting anything.
//!
//! ## Key Types
//!
//! - [`EncryptedEnvelope`] - One recipient
//! - [`MultiRecipientEnvelope`] - One body, a sorted set of [`WrapRecord`]s
//! - [`Distribution`] - Visible envelope plus per-recipient BCC copies
//! - [`MessageContext`] - The associated data both sides must agree on
//!
//! ## Wire
//!
//! Every envelope type has CBOR `to_bytes`/`from_bytes`. The [`wire`] module
//! renders a single-recipient envelope as `X-Sealpost-*` headers.

pub mod attachment;
pub mod context;
pub mod crypto;
pub mod envelope;
pub mod error;
pub mod multi;
pub mod provider;
pub mod wire;
pub mod wrap;

pub use attachment::{attachment_digest, Attachment, EncryptedAttachment};
pub use context::MessageContext;
pub use crypto::{EncryptionNonce, MessageKey};
pub use envelope::{EncryptedEnvelope, OpenedMessage};
pub use error::{EnvelopeError, Result};
pub use multi::{seal_distribution, BccCopy, Distribution, MultiRecipientEnvelope};
pub use wire::HeaderFields;
pub use wrap::{RecipientKey, WrapRecord, WRAPPED_KEY_LEN};
