//! # Sealpost
//!
//! End-to-end encrypted, signed mail envelopes between parties who pin each
//! other's keys through an invite/accept exchange.
//!
//! ## Overview
//!
//! - **Identity**: an Ed25519 signing key and an X25519 agreement key,
//!   identified by a SHA-256 fingerprint
//! - **Trust**: contacts reach `Ready` only through a key-bearing accept;
//!   a changed key is reported, never applied silently
//! - **Envelopes**: one body ciphertext, a key wrap per recipient, a sender
//!   signature over everything swappable
//!
//! ## Usage
//!
//! ```rust,no_run
//! use sealpost::{Postbox, PostboxConfig, TrustEvent};
//! use sealpost::core::KeyBundle;
//! use sealpost::trust::SqliteTrustStore;
//!
//! async fn example() -> sealpost::Result<()> {
//!     let identity = KeyBundle::generate()?;
//!     let store = SqliteTrustStore::open("trust.db")?;
//!     let alice = Postbox::new(identity, "alice@x.com", store, PostboxConfig::default());
//!
//!     // Invite Bob, then record his accept with the keys he sent back.
//!     alice
//!         .apply_event(&TrustEvent::InviteSent { email: "bob@x.com".into() })
//!         .await?;
//!     // alice.apply_event(&TrustEvent::AcceptReceived { email, keys }).await?;
//!
//!     // let envelope = alice.seal("bob@x.com", "hi", b"hello", &[]).await?;
//!     Ok(())
//! }
//! ```
//!
//! ## Re-exports
//!
//! - `sealpost::core` - Identity and primitives
//! - `sealpost::envelope` - Envelope protocol
//! - `sealpost::trust` - Trust store

pub mod config;
pub mod error;
pub mod postbox;

pub use sealpost_core as core;
pub use sealpost_envelope as envelope;
pub use sealpost_trust as trust;

pub use config::PostboxConfig;
pub use error::{PostboxError, Result};
pub use postbox::{Outgoing, Postbox, UNDISCLOSED_RECIPIENTS};

pub use sealpost_core::{Fingerprint, KeyBundle, KeyMaterial};
pub use sealpost_envelope::{
    Attachment, Distribution, EncryptedEnvelope, MultiRecipientEnvelope, OpenedMessage,
};
pub use sealpost_trust::{ContactStatus, PinOutcome, Transition, TrustEvent, TrustedContact};
