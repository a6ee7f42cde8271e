//! Postbox configuration.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{PostboxError, Result};

/// Configuration for a [`Postbox`](crate::Postbox).
///
/// Missing JSON fields take their default values.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PostboxConfig {
    /// Use keys of `Pending` contacts (invite received, not yet accepted)
    /// both for sealing to them and for verifying mail from them.
    pub accept_pending_contacts: bool,
    /// Upper bound on To + CC + BCC per message.
    pub max_recipients: usize,
    /// Upper bound on a single attachment's plaintext size.
    pub max_attachment_bytes: u64,
}

impl Default for PostboxConfig {
    fn default() -> Self {
        Self {
            accept_pending_contacts: false,
            max_recipients: 100,
            max_attachment_bytes: 25 * 1024 * 1024,
        }
    }
}

impl PostboxConfig {
    /// Parse from a JSON string.
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|e| PostboxError::Config(e.to_string()))
    }

    /// Load from a JSON file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path)
            .map_err(|e| PostboxError::Config(format!("{}: {}", path.display(), e)))?;
        Self::from_json(&json)
    }
}
