//! Invite/accept protocol events and the contact transitions they cause.
//!
//! Transitions are computed here without touching storage; the store applies
//! the result. A key-bearing event whose keys disagree with the ones already
//! pinned never mutates the contact.

use serde::{Deserialize, Serialize};

use sealpost_core::{Fingerprint, KeyMaterial};

use crate::contact::{normalize_email, ContactStatus, TrustedContact};
use crate::error::{Result, TrustError};

/// A trust-relevant protocol event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum TrustEvent {
    /// We invited `email`.
    InviteSent { email: String },
    /// `email` invited us and sent their keys.
    InviteReceived { email: String, keys: KeyMaterial },
    /// `email` accepted our invite and sent their keys.
    AcceptReceived { email: String, keys: KeyMaterial },
}

impl TrustEvent {
    /// Normalized address the event concerns.
    pub fn email(&self) -> String {
        match self {
            Self::InviteSent { email }
            | Self::InviteReceived { email, .. }
            | Self::AcceptReceived { email, .. } => normalize_email(email),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::InviteSent { .. } => "invite-sent",
            Self::InviteReceived { .. } => "invite-received",
            Self::AcceptReceived { .. } => "accept-received",
        }
    }

    fn keys(&self) -> Option<&KeyMaterial> {
        match self {
            Self::InviteSent { .. } => None,
            Self::InviteReceived { keys, .. } | Self::AcceptReceived { keys, .. } => Some(keys),
        }
    }
}

/// What applying an event means for the stored contact.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Transition {
    /// Nothing to write.
    Unchanged,
    /// Store this contact (snapshotting any previous state first).
    Write(TrustedContact),
    /// The event carries different keys than the pinned ones.
    KeyChanged {
        previous: Fingerprint,
        offered: Fingerprint,
    },
}

/// Compute the transition `event` causes on `current`.
pub fn transition(
    current: Option<&TrustedContact>,
    event: &TrustEvent,
    now: i64,
) -> Result<Transition> {
    let email = event.email();

    if let Some(offered) = event.keys() {
        ensure_consistent(&email, offered)?;
        if let Some(pinned) = current.and_then(|c| c.keys.as_ref()) {
            if pinned != offered {
                return Ok(Transition::KeyChanged {
                    previous: pinned.fingerprint.clone(),
                    offered: offered.fingerprint.clone(),
                });
            }
        }
    }

    let next = match (event, current) {
        (TrustEvent::InviteSent { .. }, Some(_)) => return Ok(Transition::Unchanged),
        (TrustEvent::InviteSent { .. }, None) => TrustedContact::invited(&email, now),

        (TrustEvent::InviteReceived { keys, .. }, None) => {
            TrustedContact::with_keys(&email, ContactStatus::Pending, keys.clone(), now)
        }
        (TrustEvent::InviteReceived { keys, .. }, Some(existing)) => match existing.status {
            ContactStatus::InvitedOut => TrustedContact {
                status: ContactStatus::Pending,
                keys: Some(keys.clone()),
                last_updated: now,
                ..existing.clone()
            },
            ContactStatus::Pending | ContactStatus::Ready => return Ok(Transition::Unchanged),
        },

        (TrustEvent::AcceptReceived { .. }, None) => {
            return Err(TrustError::InvalidTransition {
                email,
                from: None,
                event: event.name(),
            })
        }
        (TrustEvent::AcceptReceived { keys, .. }, Some(existing)) => match existing.status {
            ContactStatus::Ready => return Ok(Transition::Unchanged),
            ContactStatus::InvitedOut | ContactStatus::Pending => TrustedContact {
                status: ContactStatus::Ready,
                keys: Some(keys.clone()),
                last_updated: now,
                ..existing.clone()
            },
        },
    };

    Ok(Transition::Write(next))
}

/// Reject key material whose fingerprint was not computed from its keys.
pub(crate) fn ensure_consistent(email: &str, keys: &KeyMaterial) -> Result<()> {
    if keys.is_consistent() {
        Ok(())
    } else {
        Err(TrustError::InconsistentKeys {
            email: normalize_email(email),
            fingerprint: keys.fingerprint.as_str().to_string(),
        })
    }
}
