// OpenNotes Keystore: Key Repository
//
// Transactional create/read/list over the `keys` table. Every operation asks
// the connection manager for the active handle (opening it on demand) and
// releases it when the transaction ends. Writes are atomic: a record is
// visible only once its transaction commits.

use std::sync::Arc;

use async_trait::async_trait;
use rusqlite::{params, OptionalExtension, Row, TransactionBehavior};
use zeroize::Zeroizing;

use crate::keys::{AsymmetricKeyProvider, PrivateKeyHandle, PublicKeyFormat, PublicKeyHandle};

use super::connection::ConnectionManager;
use super::db::run_blocking;
use super::models::{KeyEntry, KeyId, KeyQuery, KeyRecord};
use super::schema::{KEYS_TABLE, NAME_INDEX, SPKI_INDEX};
use super::StoreError;

// ─── Trait ───────────────────────────────────────────────────────────────────

/// Abstraction over key storage operations.
#[async_trait]
pub trait KeyRepository: Send + Sync {
    /// Export the public key, then insert one record in a read-write
    /// transaction. Resolves with the stored record, including its new id.
    async fn save_key(
        &self,
        public_key: PublicKeyHandle,
        private_key: PrivateKeyHandle,
        name: &str,
    ) -> Result<KeyRecord, StoreError>;

    /// Look up a single record. Secondary-index lookups return the first
    /// match in index order (lowest id).
    async fn get_key(&self, query: KeyQuery) -> Result<Option<KeyRecord>, StoreError>;

    /// Every record, in ascending id order.
    async fn list_keys(&self) -> Result<Vec<KeyEntry>, StoreError>;

    /// Look up by criterion name (`id`, `name`, `publicKeyEncoding`).
    /// An unknown criterion fails without touching storage.
    async fn get_key_by(&self, criterion: &str, value: &str) -> Result<Option<KeyRecord>, StoreError> {
        let query = KeyQuery::parse(criterion, value)?;
        self.get_key(query).await
    }
}

// ─── SQLite Implementation ──────────────────────────────────────────────────

const SELECT_COLUMNS: &str = "id, name, public_key, private_key, spki";

pub struct SqliteKeyRepository {
    connections: Arc<ConnectionManager>,
    provider: Arc<dyn AsymmetricKeyProvider>,
}

impl SqliteKeyRepository {
    pub fn new(
        connections: Arc<ConnectionManager>,
        provider: Arc<dyn AsymmetricKeyProvider>,
    ) -> Self {
        Self {
            connections,
            provider,
        }
    }

    pub fn connections(&self) -> &Arc<ConnectionManager> {
        &self.connections
    }

    /// Parse a key row from the database. The id is read first so decoding
    /// failures in later columns name the row they came from.
    fn row_to_record(row: &Row<'_>) -> Result<KeyRecord, StoreError> {
        let id: KeyId = row.get(0).map_err(|e| Self::decode_error(None, e))?;
        let decode = |e: rusqlite::Error| Self::decode_error(Some(id), e);
        let name: String = row.get(1).map_err(decode)?;
        let public_key: Vec<u8> = row.get(2).map_err(decode)?;
        let private_key: Vec<u8> = row.get(3).map_err(decode)?;
        let spki: Vec<u8> = row.get(4).map_err(decode)?;

        Ok(KeyRecord::new(
            id,
            name,
            PublicKeyHandle::new(public_key),
            PrivateKeyHandle::new(Zeroizing::new(private_key)),
            spki,
        ))
    }

    /// Map a row decoding failure to `CorruptRecord`; other errors pass through.
    fn decode_error(id: Option<KeyId>, err: rusqlite::Error) -> StoreError {
        match err {
            rusqlite::Error::InvalidColumnType(_, column, ty) => StoreError::CorruptRecord {
                id: id.unwrap_or_default(),
                reason: format!("column {} has type {}", column, ty),
            },
            rusqlite::Error::FromSqlConversionFailure(_, ty, e) => StoreError::CorruptRecord {
                id: id.unwrap_or_default(),
                reason: format!("{} value: {}", ty, e),
            },
            other => StoreError::Persistence(other),
        }
    }
}

#[async_trait]
impl KeyRepository for SqliteKeyRepository {
    async fn save_key(
        &self,
        public_key: PublicKeyHandle,
        private_key: PrivateKeyHandle,
        name: &str,
    ) -> Result<KeyRecord, StoreError> {
        let db = self.connections.open().await?;

        // Export before any write: a failure here leaves the store untouched.
        let spki = self
            .provider
            .export_public_key(&public_key, PublicKeyFormat::Spki)
            .await
            .map_err(StoreError::Export)?;

        let name = name.to_string();
        let record = run_blocking(move || {
            db.with_conn(|conn| {
                let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
                tx.execute(
                    &format!(
                        "INSERT INTO {KEYS_TABLE} (name, public_key, private_key, spki)
                         VALUES (?1, ?2, ?3, ?4)"
                    ),
                    params![name, public_key.as_bytes(), private_key.material(), spki],
                )?;
                let id = tx.last_insert_rowid();
                tx.commit()?;
                Ok(KeyRecord::new(id, name, public_key, private_key, spki))
            })
        })
        .await?;

        tracing::info!(
            key_id = record.id,
            name = %record.name,
            fingerprint = %record.fingerprint(),
            "Key pair stored successfully"
        );

        Ok(record)
    }

    async fn get_key(&self, query: KeyQuery) -> Result<Option<KeyRecord>, StoreError> {
        let db = self.connections.open().await?;
        let criterion = query.criterion();

        let record = run_blocking(move || {
            db.with_conn(|conn| {
                let tx = conn.transaction_with_behavior(TransactionBehavior::Deferred)?;
                let found = match &query {
                    KeyQuery::Id(id) => tx
                        .query_row(
                            &format!("SELECT {SELECT_COLUMNS} FROM {KEYS_TABLE} WHERE id = ?1"),
                            params![id],
                            |row| Ok(Self::row_to_record(row)),
                        )
                        .optional()?
                        .transpose()?,
                    KeyQuery::Name(name) => tx
                        .query_row(
                            &format!(
                                "SELECT {SELECT_COLUMNS} FROM {KEYS_TABLE} INDEXED BY {NAME_INDEX}
                                 WHERE name = ?1 ORDER BY id ASC LIMIT 1"
                            ),
                            params![name],
                            |row| Ok(Self::row_to_record(row)),
                        )
                        .optional()?
                        .transpose()?,
                    KeyQuery::PublicKeyEncoding(spki) => tx
                        .query_row(
                            &format!(
                                "SELECT {SELECT_COLUMNS} FROM {KEYS_TABLE} INDEXED BY {SPKI_INDEX}
                                 WHERE spki = ?1 ORDER BY id ASC LIMIT 1"
                            ),
                            params![spki],
                            |row| Ok(Self::row_to_record(row)),
                        )
                        .optional()?
                        .transpose()?,
                };
                tx.commit()?;
                Ok(found)
            })
        })
        .await?;

        tracing::debug!(
            criterion = %criterion,
            found = record.is_some(),
            "Key lookup completed"
        );

        Ok(record)
    }

    async fn list_keys(&self) -> Result<Vec<KeyEntry>, StoreError> {
        let db = self.connections.open().await?;

        let entries = run_blocking(move || {
            db.with_conn(|conn| {
                let tx = conn.transaction_with_behavior(TransactionBehavior::Deferred)?;
                let entries = {
                    let mut stmt =
                        tx.prepare(&format!("SELECT {SELECT_COLUMNS} FROM {KEYS_TABLE} ORDER BY id ASC"))?;
                    let rows = stmt.query_map([], |row| Ok(Self::row_to_record(row)))?;

                    let mut entries = Vec::new();
                    for row in rows {
                        let record = row??;
                        entries.push(KeyEntry {
                            id: record.id,
                            value: record,
                        });
                    }
                    entries
                };
                tx.commit()?;
                Ok(entries)
            })
        })
        .await?;

        tracing::debug!(count = entries.len(), "Listed stored keys");
        Ok(entries)
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────
