//! Database schema migrations for SQLite.
//!
//! Versioned: each migration moves the schema from version N to N+1.

use rusqlite::Connection;

use crate::contact::now_millis;
use crate::error::{Result, TrustError};

/// Current schema version.
pub const CURRENT_VERSION: u32 = 1;

/// Initialize or migrate the database schema. Idempotent.
pub fn migrate(conn: &mut Connection) -> Result<()> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS schema_migrations (
            version INTEGER PRIMARY KEY,
            applied_at INTEGER NOT NULL
        )",
        [],
    )?;

    let current: u32 = conn.query_row(
        "SELECT COALESCE(MAX(version), 0) FROM schema_migrations",
        [],
        |row| row.get(0),
    )?;

    if current > CURRENT_VERSION {
        return Err(TrustError::Migration(format!(
            "database schema version {current} is newer than supported {CURRENT_VERSION}"
        )));
    }

    if current < CURRENT_VERSION {
        let tx = conn.transaction()?;

        for version in (current + 1)..=CURRENT_VERSION {
            apply_migration(&tx, version)?;

            tx.execute(
                "INSERT INTO schema_migrations (version, applied_at) VALUES (?1, ?2)",
                rusqlite::params![version, now_millis()],
            )?;
        }

        tx.commit()?;
        tracing::debug!(from = current, to = CURRENT_VERSION, "trust store schema migrated");
    }

    Ok(())
}

fn apply_migration(conn: &Connection, version: u32) -> Result<()> {
    match version {
        1 => apply_v1(conn),
        _ => Err(TrustError::Migration(format!(
            "unknown migration version: {}",
            version
        ))),
    }
}

/// Migration v1: contacts and their snapshot history.
fn apply_v1(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        r#"
        CREATE TABLE contacts (
            email TEXT PRIMARY KEY,           -- normalized address
            status TEXT NOT NULL,             -- invited-out | pending | ready
            fingerprint TEXT,
            signing_key BLOB,                 -- 32 bytes, Ed25519
            agreement_key BLOB,               -- 32 bytes, X25519
            first_seen INTEGER NOT NULL,
            last_updated INTEGER NOT NULL,

            -- keys are set together or not at all
            CHECK ((fingerprint IS NULL) = (signing_key IS NULL)
               AND (signing_key IS NULL) = (agreement_key IS NULL))
        );

        CREATE TABLE contact_snapshots (
            email TEXT NOT NULL,
            version INTEGER NOT NULL,
            contact BLOB NOT NULL,            -- CBOR TrustedContact
            recorded_at INTEGER NOT NULL,
            PRIMARY KEY (email, version)
        );

        CREATE INDEX idx_contacts_status ON contacts(status);
        "#,
    )?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_migration_creates_tables() {
        let mut conn = Connection::open_in_memory().unwrap();
        migrate(&mut conn).unwrap();

        let tables: Vec<String> = conn
            .prepare("SELECT name FROM sqlite_master WHERE type='table' ORDER BY name")
            .unwrap()
            .query_map([], |row| row.get(0))
            .unwrap()
            .collect::<std::result::Result<Vec<_>, _>>()
            .unwrap();

        assert!(tables.contains(&"contacts".to_string()));
        assert!(tables.contains(&"contact_snapshots".to_string()));
        assert!(tables.contains(&"schema_migrations".to_string()));
    }

    #[test]
    fn test_migration_idempotent() {
        let mut conn = Connection::open_in_memory().unwrap();
        migrate(&mut conn).unwrap();
        migrate(&mut conn).unwrap();

        let version: u32 = conn
            .query_row("SELECT MAX(version) FROM schema_migrations", [], |row| {
                row.get(0)
            })
            .unwrap();
        assert_eq!(version, 1);
    }

    #[test]
    fn test_partial_keys_rejected_by_schema() {
        let mut conn = Connection::open_in_memory().unwrap();
        migrate(&mut conn).unwrap();

        let result = conn.execute(
            "INSERT INTO contacts (email, status, fingerprint, first_seen, last_updated)
             VALUES ('b@x.com', 'pending', 'fp-b', 1, 1)",
            [],
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_newer_schema_rejected() {
        let mut conn = Connection::open_in_memory().unwrap();
        migrate(&mut conn).unwrap();
        conn.execute(
            "INSERT INTO schema_migrations (version, applied_at) VALUES (99, 0)",
            [],
        )
        .unwrap();

        assert!(matches!(migrate(&mut conn), Err(TrustError::Migration(_))));
    }
}
