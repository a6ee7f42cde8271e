//! SQLite implementation of the TrustStore trait.
//!
//! rusqlite with bundled SQLite behind a mutex; every call runs on the
//! blocking pool via `tokio::task::spawn_blocking`.

use std::path::Path;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use rusqlite::{params, Connection, OptionalExtension, TransactionBehavior};

use sealpost_core::{Ed25519PublicKey, Fingerprint, KeyMaterial, X25519PublicKey};

use crate::contact::{normalize_email, ContactSnapshot, ContactStatus, TrustedContact};
use crate::error::{Result, TrustError};
use crate::migration;
use crate::traits::TrustStore;

/// SQLite-backed trust store.
pub struct SqliteTrustStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteTrustStore {
    /// Open (creating if needed) a database at `path` and run migrations.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let mut conn = Connection::open(path)?;
        migration::migrate(&mut conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Open an in-memory database.
    pub fn open_memory() -> Result<Self> {
        let mut conn = Connection::open_in_memory()?;
        migration::migrate(&mut conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Run `f` against the connection on the blocking pool.
    async fn blocking<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&mut Connection) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let conn = self.conn.clone();

        tokio::task::spawn_blocking(move || {
            let mut conn = conn
                .lock()
                .map_err(|e| TrustError::LockPoisoned(e.to_string()))?;
            f(&mut conn)
        })
        .await
        .map_err(|e| {
            TrustError::Database(rusqlite::Error::SqliteFailure(
                rusqlite::ffi::Error::new(rusqlite::ffi::SQLITE_ERROR),
                Some(format!("spawn_blocking failed: {}", e)),
            ))
        })?
    }
}

/// Columns of a `contacts` row before validation.
struct ContactRow {
    email: String,
    status: String,
    fingerprint: Option<String>,
    signing_key: Option<Vec<u8>>,
    agreement_key: Option<Vec<u8>>,
    first_seen: i64,
    last_updated: i64,
}

const CONTACT_COLUMNS: &str =
    "email, status, fingerprint, signing_key, agreement_key, first_seen, last_updated";

fn read_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<ContactRow> {
    Ok(ContactRow {
        email: row.get("email")?,
        status: row.get("status")?,
        fingerprint: row.get("fingerprint")?,
        signing_key: row.get("signing_key")?,
        agreement_key: row.get("agreement_key")?,
        first_seen: row.get("first_seen")?,
        last_updated: row.get("last_updated")?,
    })
}

fn key_bytes(column: &str, bytes: Vec<u8>) -> Result<[u8; 32]> {
    let len = bytes.len();
    bytes.try_into().map_err(|_| {
        TrustError::Serialization(format!("{column}: expected 32 bytes, got {len}"))
    })
}

impl TryFrom<ContactRow> for TrustedContact {
    type Error = TrustError;

    fn try_from(row: ContactRow) -> Result<Self> {
        let keys = match (row.fingerprint, row.signing_key, row.agreement_key) {
            (Some(fp), Some(signing), Some(agreement)) => Some(KeyMaterial {
                fingerprint: Fingerprint::new(fp),
                signing_key: Ed25519PublicKey::from_bytes(key_bytes("signing_key", signing)?),
                agreement_key: X25519PublicKey::from_bytes(key_bytes("agreement_key", agreement)?),
            }),
            (None, None, None) => None,
            _ => {
                return Err(TrustError::Serialization(format!(
                    "partial key material stored for {}",
                    row.email
                )))
            }
        };

        Ok(TrustedContact {
            status: row.status.parse::<ContactStatus>()?,
            email: row.email,
            keys,
            first_seen: row.first_seen,
            last_updated: row.last_updated,
        })
    }
}

fn select_contact(conn: &Connection, email: &str) -> Result<Option<TrustedContact>> {
    conn.query_row(
        &format!("SELECT {CONTACT_COLUMNS} FROM contacts WHERE email = ?1"),
        params![email],
        read_row,
    )
    .optional()?
    .map(TrustedContact::try_from)
    .transpose()
}

fn encode_snapshot(contact: &TrustedContact) -> Result<Vec<u8>> {
    let mut buf = Vec::new();
    ciborium::into_writer(contact, &mut buf)
        .map_err(|e| TrustError::Serialization(e.to_string()))?;
    Ok(buf)
}

/// Snapshot `previous` (if any), then write `contact` over it.
fn replace_contact(
    conn: &Connection,
    previous: Option<&TrustedContact>,
    contact: &TrustedContact,
    now: i64,
) -> Result<()> {
    if let Some(previous) = previous {
        let version: u64 = conn.query_row(
            "SELECT COALESCE(MAX(version), 0) + 1 FROM contact_snapshots WHERE email = ?1",
            params![contact.email],
            |row| row.get(0),
        )?;
        conn.execute(
            "INSERT INTO contact_snapshots (email, version, contact, recorded_at)
             VALUES (?1, ?2, ?3, ?4)",
            params![contact.email, version, encode_snapshot(previous)?, now],
        )?;
    }

    let keys = contact.keys.as_ref();
    conn.execute(
        &format!(
            "INSERT OR REPLACE INTO contacts ({CONTACT_COLUMNS})
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)"
        ),
        params![
            contact.email,
            contact.status.as_str(),
            keys.map(|k| k.fingerprint.as_str()),
            keys.map(|k| k.signing_key.as_bytes().as_slice()),
            keys.map(|k| k.agreement_key.as_bytes().as_slice()),
            contact.first_seen,
            contact.last_updated,
        ],
    )?;
    Ok(())
}

#[async_trait]
impl TrustStore for SqliteTrustStore {
    async fn get_contact(&self, email: &str) -> Result<Option<TrustedContact>> {
        let email = normalize_email(email);
        self.blocking(move |conn| select_contact(conn, &email)).await
    }

    async fn put_contact(&self, contact: &TrustedContact, now: i64) -> Result<()> {
        let mut contact = contact.clone();
        contact.email = normalize_email(&contact.email);

        self.blocking(move |conn| {
            let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
            let previous = select_contact(&tx, &contact.email)?;
            replace_contact(&tx, previous.as_ref(), &contact, now)?;
            tx.commit()?;
            Ok(())
        })
        .await
    }

    async fn put_contact_if(
        &self,
        expected: Option<&TrustedContact>,
        contact: &TrustedContact,
        now: i64,
    ) -> Result<()> {
        let mut contact = contact.clone();
        contact.email = normalize_email(&contact.email);
        let expected = expected.cloned();

        self.blocking(move |conn| {
            let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
            let previous = select_contact(&tx, &contact.email)?;
            if previous != expected {
                return Err(TrustError::ConcurrentUpdate(contact.email));
            }
            replace_contact(&tx, previous.as_ref(), &contact, now)?;
            tx.commit()?;
            Ok(())
        })
        .await
    }

    async fn list_contacts(&self) -> Result<Vec<TrustedContact>> {
        self.blocking(|conn| {
            let mut stmt =
                conn.prepare(&format!("SELECT {CONTACT_COLUMNS} FROM contacts ORDER BY email"))?;
            let rows = stmt
                .query_map([], read_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            rows.into_iter().map(TrustedContact::try_from).collect()
        })
        .await
    }

    async fn history(&self, email: &str) -> Result<Vec<ContactSnapshot>> {
        let email = normalize_email(email);
        self.blocking(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT version, contact, recorded_at FROM contact_snapshots
                 WHERE email = ?1 ORDER BY version",
            )?;
            let rows = stmt
                .query_map(params![email], |row| {
                    Ok((
                        row.get::<_, u64>(0)?,
                        row.get::<_, Vec<u8>>(1)?,
                        row.get::<_, i64>(2)?,
                    ))
                })?
                .collect::<std::result::Result<Vec<_>, _>>()?;

            rows.into_iter()
                .map(|(version, blob, recorded_at)| {
                    let contact: TrustedContact = ciborium::from_reader(blob.as_slice())
                        .map_err(|e| TrustError::Serialization(e.to_string()))?;
                    Ok(ContactSnapshot {
                        version,
                        contact,
                        recorded_at,
                    })
                })
                .collect()
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::contact::PinOutcome;
    use crate::events::{TrustEvent, Transition};
    use crate::traits::TrustStoreExt;
    use sealpost_core::KeyBundle;

    fn keys() -> KeyMaterial {
        KeyBundle::generate().unwrap().public_material()
    }

    #[tokio::test]
    async fn test_put_get_roundtrip() {
        let store = SqliteTrustStore::open_memory().unwrap();
        let bob = keys();

        let contact = TrustedContact::with_keys("Bob@X.com", ContactStatus::Ready, bob, 42);
        store.put_contact(&contact, 42).await.unwrap();

        let loaded = store.get_contact("bob@x.com").await.unwrap().unwrap();
        assert_eq!(loaded, contact);
        assert!(store.get_contact("carol@x.com").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_invited_contact_has_no_keys() {
        let store = SqliteTrustStore::open_memory().unwrap();
        store
            .apply_event(&TrustEvent::InviteSent {
                email: "dave@x.com".into(),
            })
            .await
            .unwrap();

        let loaded = store.get_contact("dave@x.com").await.unwrap().unwrap();
        assert_eq!(loaded.status, ContactStatus::InvitedOut);
        assert!(loaded.keys.is_none());
    }

    #[tokio::test]
    async fn test_snapshots_recorded_per_write() {
        let store = SqliteTrustStore::open_memory().unwrap();
        let bob = keys();

        store
            .apply_event(&TrustEvent::InviteReceived {
                email: "bob@x.com".into(),
                keys: bob.clone(),
            })
            .await
            .unwrap();
        store
            .apply_event(&TrustEvent::AcceptReceived {
                email: "bob@x.com".into(),
                keys: bob.clone(),
            })
            .await
            .unwrap();
        assert_eq!(store.lookup("bob@x.com").await.unwrap(), Some(bob));

        let history = store.history("bob@x.com").await.unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].contact.status, ContactStatus::Pending);

        store.restore("bob@x.com", 1).await.unwrap();
        assert!(store.lookup("bob@x.com").await.unwrap().is_none());
        assert_eq!(store.history("bob@x.com").await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_key_change_leaves_row_untouched() {
        let store = SqliteTrustStore::open_memory().unwrap();
        let (old, new) = (keys(), keys());

        store.pin("bob@x.com", old.clone()).await.unwrap();
        assert!(matches!(
            store.pin("bob@x.com", new.clone()).await.unwrap(),
            PinOutcome::KeyChanged { .. }
        ));
        assert!(matches!(
            store
                .apply_event(&TrustEvent::InviteReceived {
                    email: "bob@x.com".into(),
                    keys: new,
                })
                .await
                .unwrap(),
            Transition::KeyChanged { .. }
        ));

        let stored = store.get_contact("bob@x.com").await.unwrap().unwrap();
        assert_eq!(stored.keys, Some(old));
        assert!(store.history("bob@x.com").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_persists_across_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("trust.db");
        let bob = keys();

        {
            let store = SqliteTrustStore::open(&path).unwrap();
            store
                .apply_event(&TrustEvent::InviteSent {
                    email: "bob@x.com".into(),
                })
                .await
                .unwrap();
            store
                .apply_event(&TrustEvent::AcceptReceived {
                    email: "bob@x.com".into(),
                    keys: bob.clone(),
                })
                .await
                .unwrap();
        }

        let store = SqliteTrustStore::open(&path).unwrap();
        assert_eq!(store.lookup("bob@x.com").await.unwrap(), Some(bob));
        assert_eq!(store.list_contacts().await.unwrap().len(), 1);
        assert_eq!(store.history("bob@x.com").await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_conditional_write_detects_interleaving() {
        let store = SqliteTrustStore::open_memory().unwrap();
        let seen = store.get_contact("bob@x.com").await.unwrap();
        assert!(seen.is_none());

        // Another writer gets in between our read and our write.
        assert_eq!(store.pin("bob@x.com", keys()).await.unwrap(), PinOutcome::Pinned);

        let ours = TrustedContact::with_keys("bob@x.com", ContactStatus::Pending, keys(), 5);
        assert!(matches!(
            store.put_contact_if(seen.as_ref(), &ours, 5).await,
            Err(TrustError::ConcurrentUpdate(email)) if email == "bob@x.com"
        ));
        assert_ne!(store.get_contact("bob@x.com").await.unwrap(), Some(ours));
        assert!(store.history("bob@x.com").await.unwrap().is_empty());
    }
}
