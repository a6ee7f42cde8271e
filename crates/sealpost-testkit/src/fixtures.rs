//! Test fixtures and helpers.
//!
//! Common setup code for integration tests.

use sealpost::{Postbox, PostboxConfig};
use sealpost_core::{KeyBundle, KeyMaterial, SigningKeypair, X25519StaticSecret};
use sealpost_envelope::RecipientKey;
use sealpost_trust::{MemoryTrustStore, TrustEvent, TrustStore};

/// A participant: an address and a deterministic identity.
pub struct Party {
    pub address: String,
    pub keys: KeyBundle,
    seed: [u8; 32],
}

impl Party {
    /// Create a party whose keys derive from `seed`.
    pub fn with_seed(address: &str, seed: [u8; 32]) -> Self {
        Self {
            address: address.to_string(),
            keys: bundle_from_seed(seed),
            seed,
        }
    }

    /// Public keys as pinned by others.
    pub fn material(&self) -> KeyMaterial {
        self.keys.public_material()
    }

    /// What a sender needs to wrap for this party.
    pub fn recipient(&self) -> RecipientKey {
        RecipientKey::from(&self.material())
    }

    /// A fresh postbox for this identity with an empty in-memory store.
    pub fn postbox(&self, config: PostboxConfig) -> Postbox<MemoryTrustStore> {
        Postbox::new(
            bundle_from_seed(self.seed),
            &self.address,
            MemoryTrustStore::new(),
            config,
        )
    }
}

/// Deterministic identity from a seed. The agreement seed is the signing
/// seed with its last byte inverted, so the two keys stay independent.
pub fn bundle_from_seed(seed: [u8; 32]) -> KeyBundle {
    let mut agreement = seed;
    agreement[31] ^= 0xff;
    KeyBundle::from_parts(
        SigningKeypair::from_seed(&seed),
        X25519StaticSecret::from_bytes(agreement),
    )
}

/// One party per address, each with a distinct deterministic seed.
pub fn multi_party_fixtures(addresses: &[&str]) -> Vec<Party> {
    addresses
        .iter()
        .enumerate()
        .map(|(i, address)| {
            let mut seed = [0u8; 32];
            seed[0] = i as u8 + 1;
            Party::with_seed(address, seed)
        })
        .collect()
}

/// Run a complete invite/accept exchange so each side holds the other `Ready`.
///
/// `a` invites `b`; `b` records the invite and accepts; `a` records the
/// accept; `b` receives `a`'s confirming accept.
pub async fn introduce<S: TrustStore, T: TrustStore>(a: &Postbox<S>, b: &Postbox<T>) {
    let a_keys = a.invite_material();
    let b_keys = b.invite_material();

    let steps = async {
        a.apply_event(&TrustEvent::InviteSent {
            email: b.address().to_string(),
        })
        .await?;
        b.apply_event(&TrustEvent::InviteReceived {
            email: a.address().to_string(),
            keys: a_keys.clone(),
        })
        .await?;
        a.apply_event(&TrustEvent::AcceptReceived {
            email: b.address().to_string(),
            keys: b_keys,
        })
        .await?;
        b.apply_event(&TrustEvent::AcceptReceived {
            email: a.address().to_string(),
            keys: a_keys,
        })
        .await?;
        Ok::<_, sealpost::PostboxError>(())
    };

    if let Err(e) = steps.await {
        panic!("introduction failed: {e}");
    }
}
