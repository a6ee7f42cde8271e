//! The Postbox: one local identity, its address, and its trust store.
//!
//! Every key used to seal or verify comes from the trust store. Nothing is
//! ever taken from an incoming envelope.

use std::sync::Arc;

use sealpost_core::{Fingerprint, KeyBundle, KeyMaterial};
use sealpost_envelope::{
    seal_distribution, Attachment, Distribution, EncryptedEnvelope, MessageContext,
    MultiRecipientEnvelope, OpenedMessage, RecipientKey,
};
use sealpost_trust::{
    normalize_email, TrustEvent, TrustStore, TrustStoreExt, TrustedContact, Transition,
};

use crate::config::PostboxConfig;
use crate::error::{PostboxError, Result};

/// `To` header used when every recipient is BCC.
pub const UNDISCLOSED_RECIPIENTS: &str = "undisclosed-recipients:;";

/// A message sealed for several recipients, ready for the transport.
#[derive(Debug, Clone)]
pub struct Outgoing {
    /// Visible recipients joined with `", "`. Part of every copy's AAD, so
    /// the transport must deliver it unchanged as the `To` header.
    pub to_header: String,
    pub distribution: Distribution,
}

/// A local mailbox identity bound to a trust store.
pub struct Postbox<S: TrustStore> {
    identity: KeyBundle,
    address: String,
    store: Arc<S>,
    config: PostboxConfig,
}

impl<S: TrustStore> Postbox<S> {
    /// Create a postbox. The address is normalized.
    pub fn new(identity: KeyBundle, address: &str, store: S, config: PostboxConfig) -> Self {
        Self {
            identity,
            address: normalize_email(address),
            store: Arc::new(store),
            config,
        }
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    pub fn fingerprint(&self) -> &Fingerprint {
        self.identity.fingerprint()
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn config(&self) -> &PostboxConfig {
        &self.config
    }

    /// Our public keys, to include in outgoing invites and accepts.
    pub fn invite_material(&self) -> KeyMaterial {
        self.identity.public_material()
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Sealing
    // ─────────────────────────────────────────────────────────────────────────

    /// Seal a message to one recipient resolved from the trust store.
    pub async fn seal(
        &self,
        to: &str,
        subject: &str,
        body: &[u8],
        attachments: &[Attachment],
    ) -> Result<EncryptedEnvelope> {
        self.check_attachments(attachments)?;

        let to = normalize_email(to);
        let keys = self
            .store
            .require(&to, self.config.accept_pending_contacts)
            .await?;

        let context = MessageContext::new(self.address.as_str(), to.as_str(), subject);
        let envelope = EncryptedEnvelope::seal(
            &context,
            body,
            attachments,
            self.identity.signing(),
            &RecipientKey::from(&keys),
        )?;

        tracing::debug!(to = %to, recipient = %keys.fingerprint.short(), "message sealed");
        Ok(envelope)
    }

    /// Seal one message for To, CC and BCC recipients.
    ///
    /// BCC recipients each get their own copy; nothing about them appears in
    /// the visible envelope or the `To` header.
    pub async fn seal_distribution(
        &self,
        to: &[&str],
        cc: &[&str],
        bcc: &[&str],
        subject: &str,
        body: &[u8],
        attachments: &[Attachment],
    ) -> Result<Outgoing> {
        let count = to.len() + cc.len() + bcc.len();
        if count > self.config.max_recipients {
            return Err(PostboxError::TooManyRecipients {
                count,
                max: self.config.max_recipients,
            });
        }
        self.check_attachments(attachments)?;

        let visible_addrs: Vec<String> = to
            .iter()
            .chain(cc.iter())
            .map(|a| normalize_email(a))
            .collect();
        let visible = self.resolve_all(&visible_addrs).await?;
        let bcc_addrs: Vec<String> = bcc.iter().map(|a| normalize_email(a)).collect();
        let hidden = self.resolve_all(&bcc_addrs).await?;

        let to_header = if visible_addrs.is_empty() {
            UNDISCLOSED_RECIPIENTS.to_string()
        } else {
            visible_addrs.join(", ")
        };

        let context = MessageContext::new(self.address.as_str(), to_header.as_str(), subject);
        let distribution = seal_distribution(
            &context,
            body,
            attachments,
            self.identity.signing(),
            &visible,
            &hidden,
        )?;

        tracing::debug!(
            visible = visible.len(),
            bcc = hidden.len(),
            "distribution sealed"
        );
        Ok(Outgoing {
            to_header,
            distribution,
        })
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Opening
    // ─────────────────────────────────────────────────────────────────────────

    /// Verify and decrypt a message addressed to us.
    ///
    /// The sender's signing key is looked up by `from`.
    pub async fn open(
        &self,
        from: &str,
        subject: &str,
        envelope: &EncryptedEnvelope,
    ) -> Result<OpenedMessage> {
        let from = normalize_email(from);
        let sender = self
            .store
            .require(&from, self.config.accept_pending_contacts)
            .await?;

        let context = MessageContext::new(from.as_str(), self.address.as_str(), subject);
        let opened = envelope.open(&context, self.identity.agreement(), &sender.signing_key)?;

        tracing::debug!(from = %from, body_len = opened.body.len(), "message opened");
        Ok(opened)
    }

    /// Verify and decrypt a multi-recipient envelope or BCC copy.
    ///
    /// `to_header` must be the `To` header exactly as delivered.
    pub async fn open_multi(
        &self,
        from: &str,
        to_header: &str,
        subject: &str,
        envelope: &MultiRecipientEnvelope,
    ) -> Result<OpenedMessage> {
        let from = normalize_email(from);
        let sender = self
            .store
            .require(&from, self.config.accept_pending_contacts)
            .await?;

        let context = MessageContext::new(from.as_str(), to_header, subject);
        let opened = envelope.open(
            &context,
            self.identity.fingerprint(),
            self.identity.agreement(),
            &sender.signing_key,
        )?;

        tracing::debug!(from = %from, body_len = opened.body.len(), "multi-recipient message opened");
        Ok(opened)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Trust
    // ─────────────────────────────────────────────────────────────────────────

    /// Apply an invite/accept event. `KeyChanged` is returned, not written.
    pub async fn apply_event(&self, event: &TrustEvent) -> Result<Transition> {
        Ok(self.store.apply_event(event).await?)
    }

    /// Explicitly accept a changed key for a contact.
    pub async fn accept_key_change(&self, email: &str, keys: KeyMaterial) -> Result<TrustedContact> {
        Ok(self.store.replace_pin(email, keys).await?)
    }

    async fn resolve_all(&self, addresses: &[String]) -> Result<Vec<RecipientKey>> {
        let mut keys = Vec::with_capacity(addresses.len());
        for address in addresses {
            let material = self
                .store
                .require(address, self.config.accept_pending_contacts)
                .await?;
            keys.push(RecipientKey::from(&material));
        }
        Ok(keys)
    }

    fn check_attachments(&self, attachments: &[Attachment]) -> Result<()> {
        let max = self.config.max_attachment_bytes;
        for attachment in attachments {
            let size = attachment.data.len() as u64;
            if size > max {
                return Err(PostboxError::AttachmentTooLarge {
                    filename: attachment.filename.clone(),
                    size,
                    max,
                });
            }
        }
        Ok(())
    }
}
