//! # Sealpost Core
//!
//! Identity primitives for Sealpost: long-term Ed25519 signing keys, X25519
//! agreement keys, SHA-256 fingerprints, and the OS random source.
//!
//! This crate contains no I/O, no storage, no networking.
//!
//! ## Key Types
//!
//! - [`KeyBundle`] - A participant's long-term keys plus fingerprint
//! - [`KeyMaterial`] - The public half of an identity, as pinned by others
//! - [`Fingerprint`] - Hex SHA-256 over both public keys
//! - [`SharedSecret`] - ECDH output with HKDF-SHA256 expansion

pub mod agreement;
pub mod crypto;
pub mod error;
pub mod identity;

pub use agreement::{SharedSecret, X25519PublicKey, X25519StaticSecret};
pub use crypto::{random_bytes, Ed25519PublicKey, Ed25519Signature, Sha256Hash, SigningKeypair};
pub use error::{CoreError, Result};
pub use identity::{Fingerprint, KeyBundle, KeyMaterial};
