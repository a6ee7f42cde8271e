//! Symmetric primitives for the envelope protocol.
//!
//! ChaCha20-Poly1305 (256-bit key, 96-bit nonce) for both the message body
//! and key wrapping, X25519 ephemeral agreement, and HKDF-SHA256 wrap-key
//! derivation salted by the recipient fingerprint.

use chacha20poly1305::{
    aead::{Aead, KeyInit, Payload},
    ChaCha20Poly1305, Nonce,
};
use serde::{Deserialize, Serialize};
use zeroize::{Zeroize, ZeroizeOnDrop};

use sealpost_core::{
    random_bytes, Fingerprint, Sha256Hash, SharedSecret, X25519PublicKey, X25519StaticSecret,
};

use crate::error::{EnvelopeError, Result};

/// HKDF info label for wrap-key derivation.
pub const WRAP_INFO: &[u8] = b"sealpost-wrap-v1";

/// Prefix hashed with the recipient fingerprint to form the HKDF salt.
pub const WRAP_SALT_PREFIX: &[u8] = b"wrap-salt:";

/// A 256-bit symmetric key.
///
/// Used both as the per-message content key and as the per-recipient wrap key.
#[derive(Zeroize, ZeroizeOnDrop)]
pub struct MessageKey([u8; 32]);

impl MessageKey {
    /// Generate a new random key.
    pub fn generate() -> Result<Self> {
        Ok(Self(random_bytes::<32>()?))
    }

    /// Create from raw bytes.
    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Get the raw bytes.
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Encrypt data with this key, authenticating `aad` alongside it.
    pub fn encrypt(&self, plaintext: &[u8], nonce: &EncryptionNonce, aad: &[u8]) -> Result<Vec<u8>> {
        let cipher = ChaCha20Poly1305::new_from_slice(&self.0)
            .map_err(|e| EnvelopeError::Encryption(e.to_string()))?;

        cipher
            .encrypt(
                Nonce::from_slice(&nonce.0),
                Payload {
                    msg: plaintext,
                    aad,
                },
            )
            .map_err(|e| EnvelopeError::Encryption(e.to_string()))
    }

    /// Decrypt data with this key.
    ///
    /// Returns `None` on any authentication failure; the caller decides which
    /// protocol error that represents.
    pub fn decrypt(&self, ciphertext: &[u8], nonce: &EncryptionNonce, aad: &[u8]) -> Option<Vec<u8>> {
        let cipher = ChaCha20Poly1305::new_from_slice(&self.0).ok()?;
        cipher
            .decrypt(
                Nonce::from_slice(&nonce.0),
                Payload {
                    msg: ciphertext,
                    aad,
                },
            )
            .ok()
    }
}

/// A 96-bit nonce for ChaCha20-Poly1305.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EncryptionNonce(pub [u8; 12]);

impl EncryptionNonce {
    /// Generate a new random nonce.
    pub fn generate() -> Result<Self> {
        Ok(Self(random_bytes::<12>()?))
    }

    /// Create from raw bytes.
    pub const fn from_bytes(bytes: [u8; 12]) -> Self {
        Self(bytes)
    }

    /// Get the raw bytes.
    pub const fn as_bytes(&self) -> &[u8; 12] {
        &self.0
    }
}

/// Ephemeral key pair for one-time key agreement.
pub struct EphemeralKeyPair {
    secret: X25519StaticSecret,
    public: X25519PublicKey,
}

impl EphemeralKeyPair {
    /// Generate a new ephemeral key pair.
    pub fn generate() -> Result<Self> {
        let secret = X25519StaticSecret::generate()?;
        let public = secret.public_key();
        Ok(Self { secret, public })
    }

    /// Get the public key.
    pub fn public_key(&self) -> X25519PublicKey {
        self.public
    }

    /// Perform key agreement with a peer's public key.
    ///
    /// Consumes the ephemeral secret (can only be used once).
    pub fn diffie_hellman(self, peer_public: &X25519PublicKey) -> SharedSecret {
        self.secret.diffie_hellman(peer_public)
    }
}

/// HKDF salt for a recipient: `SHA-256("wrap-salt:" || fingerprint)`.
pub fn wrap_salt(recipient: &Fingerprint) -> Sha256Hash {
    Sha256Hash::hash_parts(&[WRAP_SALT_PREFIX, recipient.as_bytes()])
}

/// Derive the key-encryption key for one recipient from an ECDH output.
pub fn derive_wrap_key(shared: &SharedSecret, recipient: &Fingerprint) -> Result<MessageKey> {
    let salt = wrap_salt(recipient);
    let okm = shared.hkdf_sha256(salt.as_bytes(), WRAP_INFO)?;
    Ok(MessageKey::from_bytes(*okm))
}
