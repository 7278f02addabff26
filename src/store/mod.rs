// OpenNotes Keystore: Store Module
//
// Schema-versioned SQLite storage for generated key pairs. One table, `keys`,
// addressable by auto-assigned id and by two non-unique secondary indexes
// (name and exported public key).

mod connection;
mod db;
mod error;
mod models;
mod repository;
mod schema;

pub use connection::{ConnectionManager, ConnectionState, DEFAULT_BUSY_TIMEOUT};
pub use db::{Database, StoreLocation};
pub use error::StoreError;
pub use models::{fingerprint, KeyEntry, KeyId, KeyQuery, KeyRecord, KeySummary, LookupCriterion};
pub use repository::{KeyRepository, SqliteKeyRepository};
pub use schema::{DATABASE_NAME, KEYS_TABLE, NAME_INDEX, SCHEMA_VERSION, SPKI_INDEX};
