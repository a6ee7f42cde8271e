//! Per-recipient wrapping of the message key.
//!
//! The message key is encrypted to a recipient with a fresh ephemeral X25519
//! key, an HKDF-SHA256 wrap key salted by the recipient fingerprint, and
//! ChaCha20-Poly1305 under its own nonce. No AAD is used here: the binding of
//! wrap material to the message lives in the sender signature.

use serde::{Deserialize, Serialize};
use zeroize::Zeroizing;

use sealpost_core::{Fingerprint, KeyMaterial, X25519PublicKey, X25519StaticSecret};

use crate::crypto::{derive_wrap_key, EncryptionNonce, EphemeralKeyPair, MessageKey};
use crate::error::{EnvelopeError, Result};

/// Length of a wrapped message key: the 32-byte key plus the AEAD tag.
pub const WRAPPED_KEY_LEN: usize = 32 + 16;

/// Reject wrapped keys of the wrong length. The signed byte layout relies on
/// this field having a fixed width.
pub(crate) fn check_wrapped_key_len(wrapped_key: &[u8]) -> Result<()> {
    if wrapped_key.len() != WRAPPED_KEY_LEN {
        return Err(EnvelopeError::MalformedField {
            field: "wrapped_key",
            reason: format!("expected {WRAPPED_KEY_LEN} bytes, got {}", wrapped_key.len()),
        });
    }
    Ok(())
}

/// What the sender needs to know about a recipient to wrap for them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecipientKey {
    pub fingerprint: Fingerprint,
    pub agreement_key: X25519PublicKey,
}

impl RecipientKey {
    pub fn new(fingerprint: impl Into<Fingerprint>, agreement_key: X25519PublicKey) -> Self {
        Self {
            fingerprint: fingerprint.into(),
            agreement_key,
        }
    }
}

impl From<&KeyMaterial> for RecipientKey {
    fn from(material: &KeyMaterial) -> Self {
        Self {
            fingerprint: material.fingerprint.clone(),
            agreement_key: material.agreement_key,
        }
    }
}

/// The message key, wrapped for a single recipient.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WrapRecord {
    /// Fingerprint whose hash salts the wrap key. Stored verbatim.
    pub recipient_fingerprint: Fingerprint,

    /// Ephemeral X25519 public key (sender's side of ECDH).
    pub ephemeral_public: X25519PublicKey,

    /// The message key, encrypted under the derived wrap key.
    pub wrapped_key: Vec<u8>,

    /// Nonce used for wrapping.
    pub wrap_nonce: EncryptionNonce,
}

impl WrapRecord {
    /// Wrap `message_key` for a recipient.
    ///
    /// Draws a new ephemeral keypair and nonce on every call.
    pub fn create(
        message_key: &MessageKey,
        recipient_fingerprint: &Fingerprint,
        recipient_public: &X25519PublicKey,
    ) -> Result<Self> {
        let ephemeral = EphemeralKeyPair::generate()?;
        let ephemeral_public = ephemeral.public_key();

        let shared = ephemeral.diffie_hellman(recipient_public);
        let wrap_key = derive_wrap_key(&shared, recipient_fingerprint)?;

        let wrap_nonce = EncryptionNonce::generate()?;
        let wrapped_key = wrap_key.encrypt(message_key.as_bytes(), &wrap_nonce, &[])?;

        Ok(Self {
            recipient_fingerprint: recipient_fingerprint.clone(),
            ephemeral_public,
            wrapped_key,
            wrap_nonce,
        })
    }

    /// Recover the message key with the recipient's agreement secret.
    pub fn unwrap(&self, recipient_secret: &X25519StaticSecret) -> Result<MessageKey> {
        check_wrapped_key_len(&self.wrapped_key)?;

        let shared = recipient_secret.diffie_hellman(&self.ephemeral_public);
        let wrap_key = derive_wrap_key(&shared, &self.recipient_fingerprint)?;

        let key_bytes = Zeroizing::new(
            wrap_key
                .decrypt(&self.wrapped_key, &self.wrap_nonce, &[])
                .ok_or(EnvelopeError::KeyUnwrapFailed)?,
        );

        let arr: [u8; 32] = key_bytes
            .as_slice()
            .try_into()
            .map_err(|_| EnvelopeError::KeyUnwrapFailed)?;
        Ok(MessageKey::from_bytes(arr))
    }

    /// Length-prefixed encoding used when hashing a set of records.
    pub(crate) fn digest_input(&self, out: &mut Vec<u8>) {
        let fp = self.recipient_fingerprint.as_bytes();
        out.extend_from_slice(&(fp.len() as u32).to_be_bytes());
        out.extend_from_slice(fp);
        out.extend_from_slice(self.ephemeral_public.as_bytes());
        out.extend_from_slice(&(self.wrapped_key.len() as u32).to_be_bytes());
        out.extend_from_slice(&self.wrapped_key);
        out.extend_from_slice(self.wrap_nonce.as_bytes());
    }
}
