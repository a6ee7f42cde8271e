//! TrustStore trait: the abstract interface for contact persistence.
//!
//! Backends implement the storage primitives; the pinning and event logic
//! lives once in [`TrustStoreExt`].

use std::future::Future;

use async_trait::async_trait;

use sealpost_core::KeyMaterial;

use crate::contact::{
    normalize_email, now_millis, ContactSnapshot, ContactStatus, PinOutcome, TrustedContact,
};
use crate::error::{Result, TrustError};
use crate::events::{ensure_consistent, transition, TrustEvent, Transition};

/// Async interface for contact persistence.
///
/// Email arguments may be in any case or padding; backends normalize them.
#[async_trait]
pub trait TrustStore: Send + Sync {
    /// Get a contact by address.
    async fn get_contact(&self, email: &str) -> Result<Option<TrustedContact>>;

    /// Insert or replace a contact.
    ///
    /// If a contact already exists under this address its current state is
    /// recorded as a new snapshot first, in the same step.
    async fn put_contact(&self, contact: &TrustedContact, now: i64) -> Result<()>;

    /// Like [`TrustStore::put_contact`], but only if the stored contact still
    /// equals `expected` (`None`: no contact stored). The check and the write
    /// happen in one step; on mismatch nothing is written and
    /// `ConcurrentUpdate` is returned.
    async fn put_contact_if(
        &self,
        expected: Option<&TrustedContact>,
        contact: &TrustedContact,
        now: i64,
    ) -> Result<()>;

    /// All contacts, ordered by address.
    async fn list_contacts(&self) -> Result<Vec<TrustedContact>>;

    /// Snapshots for an address, oldest first.
    async fn history(&self, email: &str) -> Result<Vec<ContactSnapshot>>;
}

/// Pinning, lookup and event handling on top of any [`TrustStore`].
///
/// Every read-modify-write goes through [`TrustStore::put_contact_if`], so a
/// racing writer surfaces as `ConcurrentUpdate` instead of a lost update.
/// Offered keys must carry the fingerprint computed from them.
pub trait TrustStoreExt: TrustStore {
    /// Keys for a `Ready` contact.
    fn lookup(
        &self,
        email: &str,
    ) -> impl Future<Output = Result<Option<KeyMaterial>>> + Send;

    /// Keys for a `Ready` contact, or a `Pending` one if `allow_pending`.
    fn lookup_with(
        &self,
        email: &str,
        allow_pending: bool,
    ) -> impl Future<Output = Result<Option<KeyMaterial>>> + Send;

    /// Like [`TrustStoreExt::lookup_with`], failing with `MissingTrustBinding`.
    fn require(
        &self,
        email: &str,
        allow_pending: bool,
    ) -> impl Future<Output = Result<KeyMaterial>> + Send;

    /// Pin keys for an address (trust on first use).
    ///
    /// Keys other than the ones already pinned are reported as `KeyChanged`
    /// and not written.
    fn pin(
        &self,
        email: &str,
        keys: KeyMaterial,
    ) -> impl Future<Output = Result<PinOutcome>> + Send;

    /// Replace the pinned keys of an existing contact, keeping its status.
    ///
    /// This is the explicit follow-up to a `KeyChanged` outcome.
    fn replace_pin(
        &self,
        email: &str,
        keys: KeyMaterial,
    ) -> impl Future<Output = Result<TrustedContact>> + Send;

    /// Apply an invite/accept event.
    fn apply_event(
        &self,
        event: &TrustEvent,
    ) -> impl Future<Output = Result<Transition>> + Send;

    /// Reinstate a snapshot. The current state is snapshotted first.
    fn restore(
        &self,
        email: &str,
        version: u64,
    ) -> impl Future<Output = Result<TrustedContact>> + Send;
}

impl<S: TrustStore + ?Sized> TrustStoreExt for S {
    async fn lookup(&self, email: &str) -> Result<Option<KeyMaterial>> {
        self.lookup_with(email, false).await
    }

    async fn lookup_with(&self, email: &str, allow_pending: bool) -> Result<Option<KeyMaterial>> {
        Ok(self
            .get_contact(email)
            .await?
            .and_then(|c| c.usable_keys(allow_pending).cloned()))
    }

    async fn require(&self, email: &str, allow_pending: bool) -> Result<KeyMaterial> {
        self.lookup_with(email, allow_pending)
            .await?
            .ok_or_else(|| TrustError::MissingTrustBinding(normalize_email(email)))
    }

    async fn pin(&self, email: &str, keys: KeyMaterial) -> Result<PinOutcome> {
        ensure_consistent(email, &keys)?;
        let now = now_millis();
        let current = self.get_contact(email).await?;

        let next = match &current {
            Some(existing) => match &existing.keys {
                Some(pinned) if pinned == &keys => return Ok(PinOutcome::Unchanged),
                Some(pinned) => {
                    tracing::warn!(
                        email = %existing.email,
                        previous = %pinned.fingerprint.short(),
                        offered = %keys.fingerprint.short(),
                        "pinned key changed; not applied"
                    );
                    return Ok(PinOutcome::KeyChanged {
                        previous: pinned.fingerprint.clone(),
                        offered: keys.fingerprint,
                    });
                }
                None => TrustedContact {
                    status: ContactStatus::Pending,
                    keys: Some(keys),
                    last_updated: now,
                    ..existing.clone()
                },
            },
            None => TrustedContact::with_keys(email, ContactStatus::Pending, keys, now),
        };

        self.put_contact_if(current.as_ref(), &next, now).await?;
        Ok(PinOutcome::Pinned)
    }

    async fn replace_pin(&self, email: &str, keys: KeyMaterial) -> Result<TrustedContact> {
        ensure_consistent(email, &keys)?;
        let now = now_millis();
        let existing = self
            .get_contact(email)
            .await?
            .ok_or_else(|| TrustError::ContactNotFound(normalize_email(email)))?;

        tracing::info!(
            email = %existing.email,
            previous = ?existing.fingerprint(),
            replacement = %keys.fingerprint.short(),
            "replacing pinned key"
        );

        let next = TrustedContact {
            keys: Some(keys),
            last_updated: now,
            ..existing.clone()
        };
        self.put_contact_if(Some(&existing), &next, now).await?;
        Ok(next)
    }

    async fn apply_event(&self, event: &TrustEvent) -> Result<Transition> {
        let now = now_millis();
        let current = self.get_contact(&event.email()).await?;
        let outcome = transition(current.as_ref(), event, now)?;

        match &outcome {
            Transition::Write(contact) => {
                self.put_contact_if(current.as_ref(), contact, now).await?;
                tracing::debug!(
                    email = %contact.email,
                    event = event.name(),
                    status = %contact.status,
                    "contact updated"
                );
            }
            Transition::KeyChanged { previous, offered } => {
                tracing::warn!(
                    email = %event.email(),
                    event = event.name(),
                    previous = %previous.short(),
                    offered = %offered.short(),
                    "event carries a different key; not applied"
                );
            }
            Transition::Unchanged => {}
        }

        Ok(outcome)
    }

    async fn restore(&self, email: &str, version: u64) -> Result<TrustedContact> {
        let now = now_millis();
        let current = self.get_contact(email).await?;
        let snapshot = self
            .history(email)
            .await?
            .into_iter()
            .find(|s| s.version == version)
            .ok_or_else(|| TrustError::SnapshotNotFound {
                email: normalize_email(email),
                version,
            })?;

        let restored = TrustedContact {
            last_updated: now,
            ..snapshot.contact
        };
        self.put_contact_if(current.as_ref(), &restored, now).await?;

        tracing::info!(email = %restored.email, version, "contact restored from snapshot");
        Ok(restored)
    }
}
