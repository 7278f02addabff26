// OpenNotes Keystore: Schema Manager
//
// Owns the database name, the schema version and the layout of the `keys`
// table with its two non-unique secondary indexes. Only ever invoked from the
// open sequence in `db.rs`, inside an exclusive transaction.

use rusqlite::{Connection, Transaction};

use super::StoreError;

/// Logical name of the key store database.
pub const DATABASE_NAME: &str = "OpenNotes.keystore";

/// Schema version this build expects. Never decreases.
pub const SCHEMA_VERSION: u32 = 1;

pub const KEYS_TABLE: &str = "keys";
pub const NAME_INDEX: &str = "idx_keys_name";
pub const SPKI_INDEX: &str = "idx_keys_spki";

/// Ordered migrations; entry `n` brings the schema to version `n`.
const MIGRATIONS: &[(u32, &str)] = &[(
    1,
    "
    CREATE TABLE IF NOT EXISTS keys (
        id           INTEGER PRIMARY KEY AUTOINCREMENT,
        name         TEXT NOT NULL,
        public_key   BLOB NOT NULL,
        private_key  BLOB NOT NULL,
        spki         BLOB NOT NULL
    );

    CREATE INDEX IF NOT EXISTS idx_keys_name ON keys(name);

    CREATE INDEX IF NOT EXISTS idx_keys_spki ON keys(spki);
    ",
)];

/// Read the schema version stamped on the database.
pub(crate) fn on_disk_version(conn: &Connection) -> rusqlite::Result<u32> {
    conn.query_row("PRAGMA user_version", [], |row| row.get(0))
}

/// Bring the schema from `from_version` up to `SCHEMA_VERSION`.
///
/// Runs inside the caller's transaction; the caller commits. Every statement
/// is `IF NOT EXISTS`, so applying a migration twice changes nothing.
pub(crate) fn upgrade(tx: &Transaction<'_>, from_version: u32) -> Result<(), StoreError> {
    if from_version > SCHEMA_VERSION {
        return Err(StoreError::VersionTooNew {
            found: from_version,
            supported: SCHEMA_VERSION,
        });
    }

    for (version, sql) in MIGRATIONS.iter().filter(|(v, _)| *v > from_version) {
        tx.execute_batch(sql)
            .map_err(|source| StoreError::SchemaUpgrade {
                version: *version,
                source,
            })?;
        tracing::debug!(version = *version, "Applied key store migration");
    }

    tx.pragma_update(None, "user_version", SCHEMA_VERSION)
        .map_err(|source| StoreError::SchemaUpgrade {
            version: SCHEMA_VERSION,
            source,
        })?;

    Ok(())
}

// ─── Tests ───────────────────────────────────────────────────────────────────
