//! Single-recipient envelope.
//!
//! Sealing encrypts the body once under a random message key (AAD = the
//! message context), wraps that key to the recipient, and signs every field a
//! tamperer could swap. Opening verifies the signature against a key the
//! caller obtained from its trust store before touching any ciphertext.

use serde::{Deserialize, Serialize};

use sealpost_core::{
    Ed25519PublicKey, Ed25519Signature, Fingerprint, SigningKeypair, X25519PublicKey,
    X25519StaticSecret,
};

use crate::attachment::{
    attachment_digest, ensure_distinct_nonces, open_attachments, seal_attachments, Attachment,
    EncryptedAttachment,
};
use crate::context::MessageContext;
use crate::crypto::{EncryptionNonce, MessageKey};
use crate::error::{EnvelopeError, Result};
use crate::provider;
use crate::wrap::{check_wrapped_key_len, RecipientKey, WrapRecord};

/// A message encrypted and signed for one recipient.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncryptedEnvelope {
    /// Ephemeral X25519 public key used to wrap the message key.
    pub ephemeral_public: X25519PublicKey,

    /// The message key, encrypted under the wrap key.
    pub wrapped_key: Vec<u8>,

    /// Nonce for the key wrap.
    pub wrap_nonce: EncryptionNonce,

    /// Nonce for the body.
    pub message_nonce: EncryptionNonce,

    /// Body ciphertext (includes authentication tag).
    pub ciphertext: Vec<u8>,

    /// Sender's Ed25519 signature over the signed fields.
    pub signature: Ed25519Signature,

    /// Fingerprint of the recipient key the message key was wrapped for.
    pub recipient_fingerprint: Fingerprint,

    /// Attachments sealed under the same message key.
    #[serde(default)]
    pub attachments: Vec<EncryptedAttachment>,
}

/// Plaintext recovered from an envelope.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OpenedMessage {
    pub body: Vec<u8>,
    pub attachments: Vec<Attachment>,
}

impl EncryptedEnvelope {
    /// Encrypt `plaintext` (and attachments) to one recipient, signed by `sender`.
    pub fn seal(
        context: &MessageContext,
        plaintext: &[u8],
        attachments: &[Attachment],
        sender: &SigningKeypair,
        recipient: &RecipientKey,
    ) -> Result<Self> {
        provider::init()?;

        let aad = context.aad();
        let message_key = MessageKey::generate()?;
        let message_nonce = EncryptionNonce::generate()?;
        let ciphertext = message_key.encrypt(plaintext, &message_nonce, &aad)?;

        let wrap = WrapRecord::create(&message_key, &recipient.fingerprint, &recipient.agreement_key)?;
        let attachments = seal_attachments(&message_key, &message_nonce, attachments)?;

        let mut envelope = Self {
            ephemeral_public: wrap.ephemeral_public,
            wrapped_key: wrap.wrapped_key,
            wrap_nonce: wrap.wrap_nonce,
            message_nonce,
            ciphertext,
            signature: Ed25519Signature::from_bytes([0u8; 64]),
            recipient_fingerprint: wrap.recipient_fingerprint,
            attachments,
        };
        envelope.signature = sender.sign(&envelope.signed_bytes(&aad));

        tracing::debug!(
            recipient = %envelope.recipient_fingerprint.short(),
            body_len = plaintext.len(),
            attachments = envelope.attachments.len(),
            "sealed envelope"
        );

        Ok(envelope)
    }

    /// The exact bytes covered by the sender signature:
    /// `ephemeral || wrapped_key || wrap_nonce || message_nonce || ciphertext || aad [|| attachment_digest]`.
    pub fn signed_bytes(&self, aad: &[u8]) -> Vec<u8> {
        let mut out = Vec::with_capacity(
            32 + self.wrapped_key.len() + 12 + 12 + self.ciphertext.len() + aad.len() + 32,
        );
        out.extend_from_slice(self.ephemeral_public.as_bytes());
        out.extend_from_slice(&self.wrapped_key);
        out.extend_from_slice(self.wrap_nonce.as_bytes());
        out.extend_from_slice(self.message_nonce.as_bytes());
        out.extend_from_slice(&self.ciphertext);
        out.extend_from_slice(aad);
        if !self.attachments.is_empty() {
            out.extend_from_slice(attachment_digest(&self.attachments).as_bytes());
        }
        out
    }

    /// Check the sender signature only.
    ///
    /// A wrapped key of the wrong length is rejected before verification.
    pub fn verify(&self, context: &MessageContext, sender_key: &Ed25519PublicKey) -> Result<()> {
        check_wrapped_key_len(&self.wrapped_key)?;
        sender_key
            .verify(&self.signed_bytes(&context.aad()), &self.signature)
            .map_err(|_| {
                tracing::warn!(
                    recipient = %self.recipient_fingerprint.short(),
                    "envelope signature rejected"
                );
                EnvelopeError::SignatureInvalid
            })
    }

    /// Verify, then decrypt.
    ///
    /// `sender_key` must come from the caller's trust store. Fails closed:
    /// nothing is decrypted unless the signature verifies.
    pub fn open(
        &self,
        context: &MessageContext,
        recipient_secret: &X25519StaticSecret,
        sender_key: &Ed25519PublicKey,
    ) -> Result<OpenedMessage> {
        self.verify(context, sender_key)?;
        ensure_distinct_nonces(&self.message_nonce, &self.attachments)?;

        let message_key = self.wrap_record().unwrap(recipient_secret)?;
        let body = message_key
            .decrypt(&self.ciphertext, &self.message_nonce, &context.aad())
            .ok_or(EnvelopeError::BodyDecryptFailed)?;
        let attachments = open_attachments(&message_key, &self.attachments)?;

        Ok(OpenedMessage { body, attachments })
    }

    /// The wrap fields of this envelope as a standalone record.
    pub fn wrap_record(&self) -> WrapRecord {
        WrapRecord {
            recipient_fingerprint: self.recipient_fingerprint.clone(),
            ephemeral_public: self.ephemeral_public,
            wrapped_key: self.wrapped_key.clone(),
            wrap_nonce: self.wrap_nonce,
        }
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
