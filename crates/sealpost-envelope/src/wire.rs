//! Mail header rendering of a single-recipient envelope.
//!
//! Key material travels as `X-Sealpost-*` headers in URL-safe unpadded
//! base64. The body ciphertext is left as an opaque blob for the transport to
//! carry as the message body. Header names are matched case-insensitively.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;

use sealpost_core::{Ed25519Signature, Fingerprint, X25519PublicKey};

use crate::attachment::EncryptedAttachment;
use crate::crypto::EncryptionNonce;
use crate::envelope::EncryptedEnvelope;
use crate::error::{EnvelopeError, Result};

pub const HEADER_VERSION: &str = "X-Sealpost-Version";
pub const HEADER_EPHEMERAL: &str = "X-Sealpost-Ephemeral";
pub const HEADER_WRAPPED_KEY: &str = "X-Sealpost-Wrapped-Key";
pub const HEADER_WRAP_NONCE: &str = "X-Sealpost-Wrap-Nonce";
pub const HEADER_NONCE: &str = "X-Sealpost-Nonce";
pub const HEADER_SIGNATURE: &str = "X-Sealpost-Signature";
pub const HEADER_RECIPIENT: &str = "X-Sealpost-Recipient";
pub const HEADER_ATTACHMENTS: &str = "X-Sealpost-Attachments";

/// Current header format version.
pub const WIRE_VERSION: &str = "1";

/// Header values plus the opaque body blob.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct HeaderFields {
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}

impl HeaderFields {
    /// Value of the first header named `name`, ignoring ASCII case.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    fn push(&mut self, name: &str, value: String) {
        self.headers.push((name.to_string(), value));
    }

    fn require(&self, name: &'static str) -> Result<&str> {
        self.get(name).ok_or(EnvelopeError::MalformedField {
            field: name,
            reason: "missing".into(),
        })
    }

    fn decode(&self, name: &'static str) -> Result<Vec<u8>> {
        URL_SAFE_NO_PAD
            .decode(self.require(name)?.trim())
            .map_err(|e| EnvelopeError::MalformedField {
                field: name,
                reason: e.to_string(),
            })
    }

    fn decode_array<const N: usize>(&self, name: &'static str) -> Result<[u8; N]> {
        let bytes = self.decode(name)?;
        let len = bytes.len();
        bytes.try_into().map_err(|_| EnvelopeError::MalformedField {
            field: name,
            reason: format!("expected {N} bytes, got {len}"),
        })
    }
}

/// Render an envelope as headers plus body.
pub fn to_headers(envelope: &EncryptedEnvelope) -> Result<HeaderFields> {
    let mut fields = HeaderFields {
        headers: Vec::with_capacity(8),
        body: envelope.ciphertext.clone(),
    };

    fields.push(HEADER_VERSION, WIRE_VERSION.to_string());
    fields.push(
        HEADER_EPHEMERAL,
        URL_SAFE_NO_PAD.encode(envelope.ephemeral_public.as_bytes()),
    );
    fields.push(HEADER_WRAPPED_KEY, URL_SAFE_NO_PAD.encode(&envelope.wrapped_key));
    fields.push(
        HEADER_WRAP_NONCE,
        URL_SAFE_NO_PAD.encode(envelope.wrap_nonce.as_bytes()),
    );
    fields.push(
        HEADER_NONCE,
        URL_SAFE_NO_PAD.encode(envelope.message_nonce.as_bytes()),
    );
    fields.push(
        HEADER_SIGNATURE,
        URL_SAFE_NO_PAD.encode(envelope.signature.as_bytes()),
    );
    fields.push(
        HEADER_RECIPIENT,
        URL_SAFE_NO_PAD.encode(envelope.recipient_fingerprint.as_bytes()),
    );

    if !envelope.attachments.is_empty() {
        let mut buf = Vec::new();
        ciborium::into_writer(&envelope.attachments, &mut buf)
            .map_err(|e| EnvelopeError::Serialization(e.to_string()))?;
        fields.push(HEADER_ATTACHMENTS, URL_SAFE_NO_PAD.encode(buf));
    }

    Ok(fields)
}

/// Parse headers plus body back into an envelope.
///
/// Only decodes; the signature is not checked here.
pub fn from_headers(fields: &HeaderFields) -> Result<EncryptedEnvelope> {
    let version = fields.require(HEADER_VERSION)?;
    if version.trim() != WIRE_VERSION {
        return Err(EnvelopeError::MalformedField {
            field: HEADER_VERSION,
            reason: format!("unsupported version {version:?}"),
        });
    }

    let recipient = String::from_utf8(fields.decode(HEADER_RECIPIENT)?).map_err(|e| {
        EnvelopeError::MalformedField {
            field: HEADER_RECIPIENT,
            reason: e.to_string(),
        }
    })?;

    let attachments: Vec<EncryptedAttachment> = match fields.get(HEADER_ATTACHMENTS) {
        Some(_) => ciborium::from_reader(fields.decode(HEADER_ATTACHMENTS)?.as_slice()).map_err(
            |e| EnvelopeError::MalformedField {
                field: HEADER_ATTACHMENTS,
                reason: e.to_string(),
            },
        )?,
        None => Vec::new(),
    };

    Ok(EncryptedEnvelope {
        ephemeral_public: X25519PublicKey::from_bytes(fields.decode_array(HEADER_EPHEMERAL)?),
        wrapped_key: fields.decode(HEADER_WRAPPED_KEY)?,
        wrap_nonce: EncryptionNonce::from_bytes(fields.decode_array(HEADER_WRAP_NONCE)?),
        message_nonce: EncryptionNonce::from_bytes(fields.decode_array(HEADER_NONCE)?),
        ciphertext: fields.body.clone(),
        signature: Ed25519Signature::from_bytes(fields.decode_array(HEADER_SIGNATURE)?),
        recipient_fingerprint: Fingerprint::new(recipient),
        attachments,
    })
}
