//! Multi-recipient envelopes and BCC distribution.
//!
//! The body and attachments are encrypted once; the message key is wrapped
//! independently per recipient. Wrap records are kept sorted by recipient
//! fingerprint (byte-wise ascending) and hashed in that order into the signed
//! bytes, so no record can be added, dropped or swapped without breaking the
//! signature for every recipient.
//!
//! BCC recipients never share a transport unit with visible recipients: each
//! gets a separately signed copy carrying only their own wrap record.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use sealpost_core::{
    Ed25519PublicKey, Ed25519Signature, Fingerprint, Sha256Hash, SigningKeypair,
    X25519StaticSecret,
};

use crate::attachment::{
    attachment_digest, ensure_distinct_nonces, open_attachments, seal_attachments, Attachment,
    EncryptedAttachment,
};
use crate::context::MessageContext;
use crate::crypto::{EncryptionNonce, MessageKey};
use crate::envelope::OpenedMessage;
use crate::error::{EnvelopeError, Result};
use crate::provider;
use crate::wrap::{check_wrapped_key_len, RecipientKey, WrapRecord};

/// Domain label prefixed to the multi-recipient signed bytes.
pub const MULTI_SIGN_DOMAIN: &[u8] = b"sealpost-multi-v1";

/// One body, many wrapped keys.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MultiRecipientEnvelope {
    /// Nonce for the shared body.
    pub message_nonce: EncryptionNonce,

    /// Body ciphertext, encrypted once for everyone.
    pub ciphertext: Vec<u8>,

    /// Per-recipient wrap records, sorted by recipient fingerprint.
    pub wraps: Vec<WrapRecord>,

    /// Attachments sealed under the shared message key.
    #[serde(default)]
    pub attachments: Vec<EncryptedAttachment>,

    /// Sender signature over the whole set.
    pub signature: Ed25519Signature,
}

/// A body sealed once, ready to be wrapped for any number of recipients.
struct SealedBody {
    message_key: MessageKey,
    message_nonce: EncryptionNonce,
    ciphertext: Vec<u8>,
    attachments: Vec<EncryptedAttachment>,
}

impl SealedBody {
    fn seal(aad: &[u8], plaintext: &[u8], attachments: &[Attachment]) -> Result<Self> {
        let message_key = MessageKey::generate()?;
        let message_nonce = EncryptionNonce::generate()?;
        let ciphertext = message_key.encrypt(plaintext, &message_nonce, aad)?;
        let attachments = seal_attachments(&message_key, &message_nonce, attachments)?;
        Ok(Self {
            message_key,
            message_nonce,
            ciphertext,
            attachments,
        })
    }

    fn wrap_all(&self, recipients: &[RecipientKey]) -> Result<Vec<WrapRecord>> {
        let mut wraps = recipients
            .iter()
            .map(|r| WrapRecord::create(&self.message_key, &r.fingerprint, &r.agreement_key))
            .collect::<Result<Vec<_>>>()?;
        wraps.sort_by(|a, b| a.recipient_fingerprint.cmp(&b.recipient_fingerprint));
        Ok(wraps)
    }

    fn envelope(
        &self,
        wraps: Vec<WrapRecord>,
        aad: &[u8],
        sender: &SigningKeypair,
    ) -> MultiRecipientEnvelope {
        let mut envelope = MultiRecipientEnvelope {
            message_nonce: self.message_nonce,
            ciphertext: self.ciphertext.clone(),
            wraps,
            attachments: self.attachments.clone(),
            signature: Ed25519Signature::from_bytes([0u8; 64]),
        };
        envelope.signature = sender.sign(&envelope.signed_bytes(aad));
        envelope
    }
}

impl MultiRecipientEnvelope {
    /// Encrypt once and wrap the message key for every recipient.
    pub fn seal(
        context: &MessageContext,
        plaintext: &[u8],
        attachments: &[Attachment],
        sender: &SigningKeypair,
        recipients: &[RecipientKey],
    ) -> Result<Self> {
        provider::init()?;
        ensure_unique(recipients.iter())?;
        if recipients.is_empty() {
            return Err(EnvelopeError::NoRecipients);
        }

        let aad = context.aad();
        let body = SealedBody::seal(&aad, plaintext, attachments)?;
        let wraps = body.wrap_all(recipients)?;
        let envelope = body.envelope(wraps, &aad, sender);

        tracing::debug!(
            recipients = envelope.wraps.len(),
            body_len = plaintext.len(),
            attachments = envelope.attachments.len(),
            "sealed multi-recipient envelope"
        );
        Ok(envelope)
    }

    /// SHA-256 over the length-prefixed wrap records, in stored order.
    pub fn wraps_digest(wraps: &[WrapRecord]) -> Sha256Hash {
        let mut buf = Vec::new();
        for wrap in wraps {
            wrap.digest_input(&mut buf);
        }
        Sha256Hash::hash(&buf)
    }

    /// `"sealpost-multi-v1" || wraps_digest || message_nonce || ciphertext || aad [|| attachment_digest]`
    pub fn signed_bytes(&self, aad: &[u8]) -> Vec<u8> {
        let mut out = Vec::with_capacity(
            MULTI_SIGN_DOMAIN.len() + 32 + 12 + self.ciphertext.len() + aad.len() + 32,
        );
        out.extend_from_slice(MULTI_SIGN_DOMAIN);
        out.extend_from_slice(Self::wraps_digest(&self.wraps).as_bytes());
        out.extend_from_slice(self.message_nonce.as_bytes());
        out.extend_from_slice(&self.ciphertext);
        out.extend_from_slice(aad);
        if !self.attachments.is_empty() {
            out.extend_from_slice(attachment_digest(&self.attachments).as_bytes());
        }
        out
    }

    /// Check the sender signature only.
    pub fn verify(&self, context: &MessageContext, sender_key: &Ed25519PublicKey) -> Result<()> {
        for wrap in &self.wraps {
            check_wrapped_key_len(&wrap.wrapped_key)?;
        }
        sender_key
            .verify(&self.signed_bytes(&context.aad()), &self.signature)
            .map_err(|_| {
                tracing::warn!(
                    recipients = self.wraps.len(),
                    "multi-recipient signature rejected"
                );
                EnvelopeError::SignatureInvalid
            })
    }

    /// The wrap record addressed to `fingerprint`, if any.
    pub fn wrap_for(&self, fingerprint: &Fingerprint) -> Option<&WrapRecord> {
        self.wraps
            .iter()
            .find(|w| &w.recipient_fingerprint == fingerprint)
    }

    /// Fingerprints this envelope is wrapped for.
    pub fn recipients(&self) -> impl Iterator<Item = &Fingerprint> {
        self.wraps.iter().map(|w| &w.recipient_fingerprint)
    }

    /// Verify, locate our wrap record, unwrap, decrypt.
    pub fn open(
        &self,
        context: &MessageContext,
        recipient_fingerprint: &Fingerprint,
        recipient_secret: &X25519StaticSecret,
        sender_key: &Ed25519PublicKey,
    ) -> Result<OpenedMessage> {
        self.verify(context, sender_key)?;
        ensure_distinct_nonces(&self.message_nonce, &self.attachments)?;

        let wrap = self
            .wrap_for(recipient_fingerprint)
            .ok_or_else(|| EnvelopeError::NoWrapForRecipient(recipient_fingerprint.clone()))?;
        let message_key = wrap.unwrap(recipient_secret)?;

        let body = message_key
            .decrypt(&self.ciphertext, &self.message_nonce, &context.aad())
            .ok_or(EnvelopeError::BodyDecryptFailed)?;
        let attachments = open_attachments(&message_key, &self.attachments)?;

        Ok(OpenedMessage { body, attachments })
    }

    /// Serialize to CBOR bytes.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let mut buf = Vec::new();
        ciborium::into_writer(self, &mut buf)
            .map_err(|e| EnvelopeError::Serialization(e.to_string()))?;
        Ok(buf)
    }

    /// Deserialize from CBOR bytes.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        ciborium::from_reader(bytes).map_err(|e| EnvelopeError::Serialization(e.to_string()))
    }
}

/// A BCC recipient's private copy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BccCopy {
    pub recipient: Fingerprint,
    pub envelope: MultiRecipientEnvelope,
}

/// Everything a sender hands to the transport for one message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Distribution {
    /// Envelope for To/CC recipients; `None` when every recipient is BCC.
    pub visible: Option<MultiRecipientEnvelope>,

    /// One separately signed envelope per BCC recipient.
    pub bcc: Vec<BccCopy>,
}

/// Seal one message for visible and BCC recipients.
///
/// The body is encrypted once and shared by every copy. The visible envelope
/// carries only visible wrap records; each BCC copy carries only its own.
pub fn seal_distribution(
    context: &MessageContext,
    plaintext: &[u8],
    attachments: &[Attachment],
    sender: &SigningKeypair,
    visible: &[RecipientKey],
    bcc: &[RecipientKey],
) -> Result<Distribution> {
    provider::init()?;
    ensure_unique(visible.iter().chain(bcc.iter()))?;
    if visible.is_empty() && bcc.is_empty() {
        return Err(EnvelopeError::NoRecipients);
    }

    let aad = context.aad();
    let body = SealedBody::seal(&aad, plaintext, attachments)?;

    let visible_envelope = if visible.is_empty() {
        None
    } else {
        let wraps = body.wrap_all(visible)?;
        Some(body.envelope(wraps, &aad, sender))
    };

    let bcc = bcc
        .iter()
        .map(|recipient| {
            let wraps = body.wrap_all(std::slice::from_ref(recipient))?;
            Ok(BccCopy {
                recipient: recipient.fingerprint.clone(),
                envelope: body.envelope(wraps, &aad, sender),
            })
        })
        .collect::<Result<Vec<_>>>()?;

    tracing::debug!(
        visible = visible.len(),
        bcc = bcc.len(),
        body_len = plaintext.len(),
        "sealed distribution"
    );

    Ok(Distribution {
        visible: visible_envelope,
        bcc,
    })
}

fn ensure_unique<'a>(recipients: impl Iterator<Item = &'a RecipientKey>) -> Result<()> {
    let mut seen = BTreeSet::new();
    for recipient in recipients {
        if !seen.insert(&recipient.fingerprint) {
            return Err(EnvelopeError::DuplicateRecipient(
                recipient.fingerprint.clone(),
            ));
        }
    }
    Ok(())
}
