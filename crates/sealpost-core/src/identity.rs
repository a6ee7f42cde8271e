//! Local identity: the long-term key bundle and its fingerprint.
//!
//! A [`KeyBundle`] is created exactly once when an identity is initialized.
//! Regenerating it invalidates every trust pin counterparties hold for us, so
//! nothing in this crate ever does so implicitly. Persisting the bundle is the
//! caller's job; [`KeyBundle::to_secret_bytes`] provides the bytes to store.

use serde::{Deserialize, Serialize};
use std::fmt;
use zeroize::{Zeroize, ZeroizeOnDrop, Zeroizing};

use crate::agreement::{X25519PublicKey, X25519StaticSecret};
use crate::crypto::{Ed25519PublicKey, Sha256Hash, SigningKeypair};
use crate::error::{CoreError, Result};

/// Hex fingerprint identifying a pair of long-term public keys.
///
/// Computed as `hex(SHA-256(ed25519_pub || x25519_pub))` for real identities.
/// Any string is accepted as a fingerprint by the envelope layer, since it is
/// used verbatim as a domain-separation salt.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Fingerprint(String);

impl Fingerprint {
    /// Wrap an existing fingerprint string.
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Compute the fingerprint of a signing key and an agreement key.
    ///
    /// Order is fixed: Ed25519 first, then X25519.
    pub fn of_keys(signing: &Ed25519PublicKey, agreement: &X25519PublicKey) -> Self {
        let digest = Sha256Hash::hash_parts(&[signing.as_bytes(), agreement.as_bytes()]);
        Self(digest.to_hex())
    }

    /// The fingerprint string.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The fingerprint as raw UTF-8 bytes.
    pub fn as_bytes(&self) -> &[u8] {
        self.0.as_bytes()
    }

    /// First 16 characters, for log lines.
    pub fn short(&self) -> &str {
        let end = self
            .0
            .char_indices()
            .nth(16)
            .map_or(self.0.len(), |(idx, _)| idx);
        &self.0[..end]
    }
}

impl fmt::Debug for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Fingerprint({})", self.short())
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Fingerprint {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for Fingerprint {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// The public half of an identity, as pinned by counterparties.
///
/// Fingerprint and both keys always travel together.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyMaterial {
    pub fingerprint: Fingerprint,
    pub signing_key: Ed25519PublicKey,
    pub agreement_key: X25519PublicKey,
}

impl KeyMaterial {
    /// Build key material, computing the fingerprint from the keys.
    pub fn from_keys(signing_key: Ed25519PublicKey, agreement_key: X25519PublicKey) -> Self {
        Self {
            fingerprint: Fingerprint::of_keys(&signing_key, &agreement_key),
            signing_key,
            agreement_key,
        }
    }

    /// Whether the fingerprint matches the keys it travels with.
    pub fn is_consistent(&self) -> bool {
        self.fingerprint == Fingerprint::of_keys(&self.signing_key, &self.agreement_key)
    }
}

/// A participant's long-term keys.
pub struct KeyBundle {
    signing: SigningKeypair,
    agreement: X25519StaticSecret,
    fingerprint: Fingerprint,
}

#[derive(Serialize, Deserialize, Zeroize, ZeroizeOnDrop)]
struct SecretSeeds {
    signing_seed: [u8; 32],
    agreement_seed: [u8; 32],
}

impl KeyBundle {
    /// Generate a fresh identity.
    ///
    /// The two keypairs are drawn independently. Fails only if the entropy
    /// source fails, in which case no key material is returned.
    pub fn generate() -> Result<Self> {
        let signing = SigningKeypair::generate()?;
        let agreement = X25519StaticSecret::generate()?;
        Ok(Self::from_parts(signing, agreement))
    }

    /// Assemble a bundle from existing keypairs.
    pub fn from_parts(signing: SigningKeypair, agreement: X25519StaticSecret) -> Self {
        let fingerprint = Fingerprint::of_keys(&signing.public_key(), &agreement.public_key());
        Self {
            signing,
            agreement,
            fingerprint,
        }
    }

    /// The identity fingerprint.
    pub fn fingerprint(&self) -> &Fingerprint {
        &self.fingerprint
    }

    /// The signing keypair.
    pub fn signing(&self) -> &SigningKeypair {
        &self.signing
    }

    /// The agreement secret.
    pub fn agreement(&self) -> &X25519StaticSecret {
        &self.agreement
    }

    pub fn signing_public_key(&self) -> Ed25519PublicKey {
        self.signing.public_key()
    }

    pub fn agreement_public_key(&self) -> X25519PublicKey {
        self.agreement.public_key()
    }

    /// Public key material to hand out in invites and accepts.
    pub fn public_material(&self) -> KeyMaterial {
        KeyMaterial {
            fingerprint: self.fingerprint.clone(),
            signing_key: self.signing_public_key(),
            agreement_key: self.agreement_public_key(),
        }
    }

    /// Serialize both secret seeds to CBOR for the caller to persist.
    pub fn to_secret_bytes(&self) -> Result<Zeroizing<Vec<u8>>> {
        let seeds = SecretSeeds {
            signing_seed: *self.signing.seed(),
            agreement_seed: *self.agreement.to_bytes(),
        };
        let mut buf = Zeroizing::new(Vec::new());
        ciborium::into_writer(&seeds, &mut *buf)
            .map_err(|e| CoreError::Serialization(e.to_string()))?;
        Ok(buf)
    }

    /// Restore a bundle previously produced by [`KeyBundle::to_secret_bytes`].
    pub fn from_secret_bytes(bytes: &[u8]) -> Result<Self> {
        let seeds: SecretSeeds =
            ciborium::from_reader(bytes).map_err(|e| CoreError::Serialization(e.to_string()))?;
        Ok(Self::from_parts(
            SigningKeypair::from_seed(&seeds.signing_seed),
            X25519StaticSecret::from_bytes(seeds.agreement_seed),
        ))
    }
}

impl fmt::Debug for KeyBundle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyBundle")
            .field("fingerprint", &self.fingerprint)
            .finish_non_exhaustive()
    }
}
