//! Envelope metadata bound into every body ciphertext.

use serde::{Deserialize, Serialize};

/// Sender, recipient and subject as the transport carries them.
///
/// Both sides must supply identical values: they form the AEAD associated
/// data, so a changed subject or address fails body decryption.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageContext {
    pub from: String,
    pub to: String,
    pub subject: String,
}

impl MessageContext {
    pub fn new(from: impl Into<String>, to: impl Into<String>, subject: impl Into<String>) -> Self {
        Self {
            from: from.into(),
            to: to.into(),
            subject: subject.into(),
        }
    }

    /// `from || "\n" || to || "\n" || subject`
    pub fn aad(&self) -> Vec<u8> {
        let mut aad =
            Vec::with_capacity(self.from.len() + self.to.len() + self.subject.len() + 2);
        aad.extend_from_slice(self.from.as_bytes());
        aad.push(b'\n');
        aad.extend_from_slice(self.to.as_bytes());
        aad.push(b'\n');
        aad.extend_from_slice(self.subject.as_bytes());
        aad
    }
}
