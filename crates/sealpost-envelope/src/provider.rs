//! One-time process-wide initialization.
//!
//! The only shared state in the envelope layer. `init` runs a self-test of
//! the OS random source and the AEAD once; concurrent first callers block on
//! the same `OnceLock` and all observe the same outcome. A failed self-test
//! is remembered: entropy failure is fatal for the process.

use std::sync::OnceLock;

use sealpost_core::{random_bytes, CoreError};

use crate::crypto::{EncryptionNonce, MessageKey};
use crate::error::{EnvelopeError, Result};

static PROVIDER: OnceLock<std::result::Result<(), String>> = OnceLock::new();

/// Initialize the crypto provider. Idempotent and thread-safe.
pub fn init() -> Result<()> {
    let outcome = PROVIDER.get_or_init(|| {
        let outcome = self_test().map_err(|e| e.to_string());
        match &outcome {
            Ok(()) => tracing::debug!("crypto provider initialized"),
            Err(reason) => tracing::error!(%reason, "crypto provider self-test failed"),
        }
        outcome
    });

    outcome
        .clone()
        .map_err(|reason| EnvelopeError::Core(CoreError::EntropyUnavailable(reason)))
}

/// Whether `init` has already run (successfully or not).
pub fn is_initialized() -> bool {
    PROVIDER.get().is_some()
}

fn self_test() -> Result<()> {
    let a = random_bytes::<32>()?;
    let b = random_bytes::<32>()?;
    if a == b {
        return Err(CoreError::EntropyUnavailable("random source repeated output".into()).into());
    }

    let key = MessageKey::generate()?;
    let nonce = EncryptionNonce::generate()?;
    let sealed = key.encrypt(b"self-test", &nonce, b"aad")?;
    match key.decrypt(&sealed, &nonce, b"aad") {
        Some(opened) if opened == b"self-test" => Ok(()),
        _ => Err(EnvelopeError::Encryption("AEAD self-test mismatch".into())),
    }
}
