//! Attachment sealing under the message key.
//!
//! Each attachment is encrypted with the same message key as the body and
//! its own fresh nonce, without AAD. Integrity across the set comes from
//! [`attachment_digest`], which the envelope signature covers.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use sealpost_core::Sha256Hash;

use crate::crypto::{EncryptionNonce, MessageKey};
use crate::error::{EnvelopeError, Result};

/// A plaintext attachment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attachment {
    pub filename: String,
    pub content_type: String,
    pub data: Vec<u8>,
}

impl Attachment {
    pub fn new(
        filename: impl Into<String>,
        content_type: impl Into<String>,
        data: impl Into<Vec<u8>>,
    ) -> Self {
        Self {
            filename: filename.into(),
            content_type: content_type.into(),
            data: data.into(),
        }
    }
}

/// An attachment sealed under a message key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncryptedAttachment {
    pub filename: String,
    pub content_type: String,
    pub original_size: u64,
    pub ciphertext: Vec<u8>,
    pub nonce: EncryptionNonce,
}

impl EncryptedAttachment {
    /// Decrypt with an already-recovered message key.
    ///
    /// No trust check happens here; the outer signature covers this
    /// attachment through the attachment digest.
    pub fn decrypt(&self, key: &MessageKey) -> Result<Attachment> {
        let data = key
            .decrypt(&self.ciphertext, &self.nonce, &[])
            .ok_or_else(|| EnvelopeError::AttachmentDecryptFailed(self.filename.clone()))?;

        if data.len() as u64 != self.original_size {
            return Err(EnvelopeError::AttachmentDecryptFailed(format!(
                "{}: size {} does not match declared {}",
                self.filename,
                data.len(),
                self.original_size
            )));
        }

        Ok(Attachment {
            filename: self.filename.clone(),
            content_type: self.content_type.clone(),
            data,
        })
    }
}

/// Seal attachments under `key`.
///
/// Every nonce is fresh and distinct from the body nonce and from every
/// other attachment nonce in the message.
pub fn seal_attachments(
    key: &MessageKey,
    body_nonce: &EncryptionNonce,
    attachments: &[Attachment],
) -> Result<Vec<EncryptedAttachment>> {
    let mut used = HashSet::with_capacity(attachments.len() + 1);
    used.insert(*body_nonce);

    attachments
        .iter()
        .map(|attachment| {
            let nonce = loop {
                let candidate = EncryptionNonce::generate()?;
                if used.insert(candidate) {
                    break candidate;
                }
            };
            let ciphertext = key.encrypt(&attachment.data, &nonce, &[])?;
            Ok(EncryptedAttachment {
                filename: attachment.filename.clone(),
                content_type: attachment.content_type.clone(),
                original_size: attachment.data.len() as u64,
                ciphertext,
                nonce,
            })
        })
        .collect()
}

/// SHA-256 over `filename || ciphertext || nonce` for each attachment, in order.
pub fn attachment_digest(attachments: &[EncryptedAttachment]) -> Sha256Hash {
    let mut parts: Vec<&[u8]> = Vec::with_capacity(attachments.len() * 3);
    for attachment in attachments {
        parts.push(attachment.filename.as_bytes());
        parts.push(&attachment.ciphertext);
        parts.push(attachment.nonce.as_bytes());
    }
    Sha256Hash::hash_parts(&parts)
}

/// Reject a message whose sealed parts share a nonce.
pub(crate) fn ensure_distinct_nonces(
    body_nonce: &EncryptionNonce,
    attachments: &[EncryptedAttachment],
) -> Result<()> {
    let mut seen = HashSet::with_capacity(attachments.len() + 1);
    seen.insert(*body_nonce);
    for attachment in attachments {
        if !seen.insert(attachment.nonce) {
            return Err(EnvelopeError::NonceReuse);
        }
    }
    Ok(())
}

/// Decrypt every attachment with the recovered message key.
pub fn open_attachments(
    key: &MessageKey,
    attachments: &[EncryptedAttachment],
) -> Result<Vec<Attachment>> {
    attachments.iter().map(|a| a.decrypt(key)).collect()
}
