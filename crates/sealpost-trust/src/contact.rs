//! Contacts, their trust status, and snapshot records.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use sealpost_core::{Fingerprint, KeyMaterial};

use crate::error::{Result, TrustError};

/// Where a contact stands in the invite/accept exchange.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ContactStatus {
    /// We invited them; no keys yet.
    InvitedOut,
    /// They sent us keys; not yet confirmed by an accept.
    Pending,
    /// Keys confirmed by an accept event.
    Ready,
}

impl ContactStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::InvitedOut => "invited-out",
            Self::Pending => "pending",
            Self::Ready => "ready",
        }
    }
}

impl fmt::Display for ContactStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ContactStatus {
    type Err = TrustError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "invited-out" => Ok(Self::InvitedOut),
            "pending" => Ok(Self::Pending),
            "ready" => Ok(Self::Ready),
            other => Err(TrustError::Serialization(format!(
                "unknown contact status {other:?}"
            ))),
        }
    }
}

/// Lower-case and trim an address. Contacts are keyed by this form.
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// A counterparty and the keys pinned for them.
///
/// `keys` carries fingerprint and both public keys as one value, so a contact
/// never has a verification key from one identity and an agreement key from
/// another.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrustedContact {
    pub email: String,
    pub status: ContactStatus,
    pub keys: Option<KeyMaterial>,
    pub first_seen: i64,
    pub last_updated: i64,
}

impl TrustedContact {
    /// A contact we have invited but know no keys for.
    pub fn invited(email: &str, now: i64) -> Self {
        Self {
            email: normalize_email(email),
            status: ContactStatus::InvitedOut,
            keys: None,
            first_seen: now,
            last_updated: now,
        }
    }

    /// A contact with keys in the given status.
    pub fn with_keys(email: &str, status: ContactStatus, keys: KeyMaterial, now: i64) -> Self {
        Self {
            email: normalize_email(email),
            status,
            keys: Some(keys),
            first_seen: now,
            last_updated: now,
        }
    }

    /// Pinned fingerprint, if any.
    pub fn fingerprint(&self) -> Option<&Fingerprint> {
        self.keys.as_ref().map(|k| &k.fingerprint)
    }

    pub fn is_ready(&self) -> bool {
        self.status == ContactStatus::Ready
    }

    /// Keys usable for sealing and verification.
    ///
    /// Only `Ready` contacts qualify unless `allow_pending` is set.
    pub fn usable_keys(&self, allow_pending: bool) -> Option<&KeyMaterial> {
        match self.status {
            ContactStatus::Ready => self.keys.as_ref(),
            ContactStatus::Pending if allow_pending => self.keys.as_ref(),
            _ => None,
        }
    }
}

/// A prior state of a contact, recorded before it was overwritten.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContactSnapshot {
    /// 1-based, increasing per contact.
    pub version: u64,
    pub contact: TrustedContact,
    pub recorded_at: i64,
}

/// Result of pinning keys for an address.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PinOutcome {
    /// Keys were stored (new contact, or first keys for an invited one).
    Pinned,
    /// The same fingerprint was already pinned; nothing changed.
    Unchanged,
    /// A different fingerprint is already pinned. Nothing was written.
    KeyChanged {
        previous: Fingerprint,
        offered: Fingerprint,
    },
}

/// Current time in Unix milliseconds.
pub fn now_millis() -> i64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}
