//! In-memory implementation of the TrustStore trait.
//!
//! Same semantics as SQLite, nothing persisted. Thread-safe via RwLock.

use std::collections::{BTreeMap, HashMap};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;

use crate::contact::{normalize_email, ContactSnapshot, TrustedContact};
use crate::error::{Result, TrustError};
use crate::traits::TrustStore;

/// In-memory trust store.
pub struct MemoryTrustStore {
    inner: RwLock<MemoryTrustStoreInner>,
}

#[derive(Default)]
struct MemoryTrustStoreInner {
    contacts: BTreeMap<String, TrustedContact>,
    snapshots: HashMap<String, Vec<ContactSnapshot>>,
}

impl MemoryTrustStoreInner {
    /// Snapshot any existing contact under `email`, then store `contact`.
    fn replace(&mut self, email: String, contact: &TrustedContact, now: i64) {
        if let Some(previous) = self.contacts.get(&email).cloned() {
            let history = self.snapshots.entry(email.clone()).or_default();
            history.push(ContactSnapshot {
                version: history.len() as u64 + 1,
                contact: previous,
                recorded_at: now,
            });
        }

        let mut stored = contact.clone();
        stored.email = email.clone();
        self.contacts.insert(email, stored);
    }
}

impl MemoryTrustStore {
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(MemoryTrustStoreInner::default()),
        }
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, MemoryTrustStoreInner>> {
        self.inner
            .read()
            .map_err(|e| TrustError::LockPoisoned(e.to_string()))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, MemoryTrustStoreInner>> {
        self.inner
            .write()
            .map_err(|e| TrustError::LockPoisoned(e.to_string()))
    }
}

impl Default for MemoryTrustStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl TrustStore for MemoryTrustStore {
    async fn get_contact(&self, email: &str) -> Result<Option<TrustedContact>> {
        Ok(self.read()?.contacts.get(&normalize_email(email)).cloned())
    }

    async fn put_contact(&self, contact: &TrustedContact, now: i64) -> Result<()> {
        let email = normalize_email(&contact.email);
        self.write()?.replace(email, contact, now);
        Ok(())
    }

    async fn put_contact_if(
        &self,
        expected: Option<&TrustedContact>,
        contact: &TrustedContact,
        now: i64,
    ) -> Result<()> {
        let email = normalize_email(&contact.email);
        let mut inner = self.write()?;
        if inner.contacts.get(&email) != expected {
            return Err(TrustError::ConcurrentUpdate(email));
        }
        inner.replace(email, contact, now);
        Ok(())
    }

    async fn list_contacts(&self) -> Result<Vec<TrustedContact>> {
        Ok(self.read()?.contacts.values().cloned().collect())
    }

    async fn history(&self, email: &str) -> Result<Vec<ContactSnapshot>> {
        Ok(self
            .read()?
            .snapshots
            .get(&normalize_email(email))
            .cloned()
            .unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::contact::{ContactStatus, PinOutcome};
    use crate::events::{TrustEvent, Transition};
    use crate::traits::TrustStoreExt;
    use sealpost_core::{KeyBundle, KeyMaterial};

    fn keys() -> KeyMaterial {
        KeyBundle::generate().unwrap().public_material()
    }

    #[tokio::test]
    async fn test_invite_accept_lookup() {
        let store = MemoryTrustStore::new();
        let bob = keys();

        store
            .apply_event(&TrustEvent::InviteSent {
                email: "bob@x.com".into(),
            })
            .await
            .unwrap();
        assert!(store.lookup("bob@x.com").await.unwrap().is_none());

        store
            .apply_event(&TrustEvent::AcceptReceived {
                email: "Bob@X.com".into(),
                keys: bob.clone(),
            })
            .await
            .unwrap();
        assert_eq!(store.lookup(" BOB@x.com ").await.unwrap(), Some(bob));
    }

    #[tokio::test]
    async fn test_pending_needs_opt_in() {
        let store = MemoryTrustStore::new();
        let carol = keys();

        assert_eq!(
            store.pin("carol@x.com", carol.clone()).await.unwrap(),
            PinOutcome::Pinned
        );
        assert!(store.lookup("carol@x.com").await.unwrap().is_none());
        assert_eq!(
            store.lookup_with("carol@x.com", true).await.unwrap(),
            Some(carol)
        );
        assert!(matches!(
            store.require("carol@x.com", false).await,
            Err(TrustError::MissingTrustBinding(email)) if email == "carol@x.com"
        ));
    }

    #[tokio::test]
    async fn test_key_change_not_applied() {
        let store = MemoryTrustStore::new();
        let (old, new) = (keys(), keys());

        store.pin("bob@x.com", old.clone()).await.unwrap();
        assert_eq!(store.pin("bob@x.com", old.clone()).await.unwrap(), PinOutcome::Unchanged);

        let outcome = store.pin("bob@x.com", new.clone()).await.unwrap();
        assert_eq!(
            outcome,
            PinOutcome::KeyChanged {
                previous: old.fingerprint.clone(),
                offered: new.fingerprint.clone(),
            }
        );
        let stored = store.get_contact("bob@x.com").await.unwrap().unwrap();
        assert_eq!(stored.keys, Some(old.clone()));

        let event = TrustEvent::AcceptReceived {
            email: "bob@x.com".into(),
            keys: new.clone(),
        };
        assert!(matches!(
            store.apply_event(&event).await.unwrap(),
            Transition::KeyChanged { .. }
        ));

        let replaced = store.replace_pin("bob@x.com", new.clone()).await.unwrap();
        assert_eq!(replaced.keys, Some(new));
        assert_eq!(replaced.status, ContactStatus::Pending);
    }

    #[tokio::test]
    async fn test_history_and_restore() {
        let store = MemoryTrustStore::new();
        let bob = keys();

        store
            .apply_event(&TrustEvent::InviteSent {
                email: "bob@x.com".into(),
            })
            .await
            .unwrap();
        store
            .apply_event(&TrustEvent::AcceptReceived {
                email: "bob@x.com".into(),
                keys: bob,
            })
            .await
            .unwrap();

        let history = store.history("bob@x.com").await.unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].version, 1);
        assert_eq!(history[0].contact.status, ContactStatus::InvitedOut);

        let restored = store.restore("bob@x.com", 1).await.unwrap();
        assert_eq!(restored.status, ContactStatus::InvitedOut);
        assert!(store.lookup("bob@x.com").await.unwrap().is_none());

        let history = store.history("bob@x.com").await.unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[1].contact.status, ContactStatus::Ready);

        assert!(matches!(
            store.restore("bob@x.com", 9).await,
            Err(TrustError::SnapshotNotFound { version: 9, .. })
        ));
    }

    #[tokio::test]
    async fn test_replace_pin_requires_contact() {
        let store = MemoryTrustStore::new();
        assert!(matches!(
            store.replace_pin("nobody@x.com", keys()).await,
            Err(TrustError::ContactNotFound(_))
        ));
    }

    /// Yields to the scheduler after every read, so concurrent callers
    /// interleave between their read and their write.
    struct YieldingStore(MemoryTrustStore);

    #[async_trait]
    impl TrustStore for YieldingStore {
        async fn get_contact(&self, email: &str) -> Result<Option<TrustedContact>> {
            let contact = self.0.get_contact(email).await;
            tokio::task::yield_now().await;
            contact
        }

        async fn put_contact(&self, contact: &TrustedContact, now: i64) -> Result<()> {
            self.0.put_contact(contact, now).await
        }

        async fn put_contact_if(
            &self,
            expected: Option<&TrustedContact>,
            contact: &TrustedContact,
            now: i64,
        ) -> Result<()> {
            self.0.put_contact_if(expected, contact, now).await
        }

        async fn list_contacts(&self) -> Result<Vec<TrustedContact>> {
            self.0.list_contacts().await
        }

        async fn history(&self, email: &str) -> Result<Vec<ContactSnapshot>> {
            self.0.history(email).await
        }
    }

    #[tokio::test]
    async fn test_racing_pins_do_not_both_win() {
        let store = YieldingStore(MemoryTrustStore::new());
        let (a, b) = (keys(), keys());

        let (first, second) = tokio::join!(
            store.pin("bob@x.com", a.clone()),
            store.pin("bob@x.com", b.clone())
        );

        let stored = store.get_contact("bob@x.com").await.unwrap().unwrap();
        match (first, second) {
            (Ok(PinOutcome::Pinned), Err(TrustError::ConcurrentUpdate(email))) => {
                assert_eq!(email, "bob@x.com");
                assert_eq!(stored.keys, Some(a));
            }
            (Err(TrustError::ConcurrentUpdate(email)), Ok(PinOutcome::Pinned)) => {
                assert_eq!(email, "bob@x.com");
                assert_eq!(stored.keys, Some(b));
            }
            other => panic!("expected one pin and one conflict, got {other:?}"),
        }
        assert!(store.history("bob@x.com").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_put_contact_if_rejects_stale_expectation() {
        let store = MemoryTrustStore::new();
        let original = TrustedContact::with_keys("bob@x.com", ContactStatus::Pending, keys(), 1);
        store.put_contact_if(None, &original, 1).await.unwrap();

        let other = TrustedContact::with_keys("bob@x.com", ContactStatus::Pending, keys(), 2);
        assert!(matches!(
            store.put_contact_if(None, &other, 2).await,
            Err(TrustError::ConcurrentUpdate(_))
        ));
        assert_eq!(store.get_contact("bob@x.com").await.unwrap(), Some(original.clone()));

        let ready = TrustedContact {
            status: ContactStatus::Ready,
            ..original.clone()
        };
        store.put_contact_if(Some(&original), &ready, 3).await.unwrap();
        assert_eq!(store.history("bob@x.com").await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_pin_rejects_inconsistent_keys() {
        let store = MemoryTrustStore::new();
        let bob = keys();
        store.pin("bob@x.com", bob.clone()).await.unwrap();

        let forged = KeyMaterial {
            fingerprint: bob.fingerprint.clone(),
            ..keys()
        };
        assert!(matches!(
            store.pin("bob@x.com", forged.clone()).await,
            Err(TrustError::InconsistentKeys { .. })
        ));
        assert!(matches!(
            store.replace_pin("bob@x.com", forged).await,
            Err(TrustError::InconsistentKeys { .. })
        ));
        assert_eq!(store.lookup_with("bob@x.com", true).await.unwrap(), Some(bob));
    }
}
