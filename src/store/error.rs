// OpenNotes Keystore: store error types

use thiserror::Error;

use crate::keys::KeyProviderError;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Key store is blocked by another connection: {0}")]
    ConnectionBlocked(String),

    #[error("Failed to open key store at {location}: {source}")]
    Connection {
        location: String,
        #[source]
        source: rusqlite::Error,
    },

    #[error("Failed to prepare key store location: {0}")]
    Io(#[from] std::io::Error),

    #[error("Key store schema version {found} is newer than supported version {supported}")]
    VersionTooNew { found: u32, supported: u32 },

    #[error("Schema upgrade to version {version} failed: {source}")]
    SchemaUpgrade {
        version: u32,
        #[source]
        source: rusqlite::Error,
    },

    #[error("Could not export public key: {0}")]
    Export(#[source] KeyProviderError),

    #[error("Transaction failed: {0}")]
    Persistence(#[from] rusqlite::Error),

    #[error("No such property: {0}")]
    InvalidCriterion(String),

    #[error("Invalid value for lookup by {criterion}: {reason}")]
    InvalidLookupValue { criterion: String, reason: String },

    #[error("Stored key record {id} is corrupt: {reason}")]
    CorruptRecord { id: i64, reason: String },

    #[error("Key store connection lock poisoned")]
    Poisoned,

    #[error("Storage task failed: {0}")]
    Task(String),
}

impl StoreError {
    /// True when SQLite reported that another connection holds a lock.
    pub(crate) fn is_busy(err: &rusqlite::Error) -> bool {
        matches!(
            err,
            rusqlite::Error::SqliteFailure(e, _)
                if matches!(
                    e.code,
                    rusqlite::ErrorCode::DatabaseBusy | rusqlite::ErrorCode::DatabaseLocked
                )
        )
    }
}
