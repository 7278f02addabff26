// OpenNotes Keystore: Database Handle
//
// Opens (and creates or upgrades) the SQLite key store. A `Database` is the
// live connection handle cached by the connection manager; repository code
// borrows it for the length of one transaction and never keeps it.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use rusqlite::{Connection, TransactionBehavior};

use super::schema::{self, SCHEMA_VERSION};
use super::StoreError;

/// Where the key store lives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreLocation {
    /// A database file; the parent directory is created on open.
    File(PathBuf),
    /// A private in-memory database that disappears when its connection closes.
    Memory,
}

impl StoreLocation {
    pub fn file(path: impl AsRef<Path>) -> Self {
        Self::File(path.as_ref().to_path_buf())
    }
}

impl fmt::Display for StoreLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::File(path) => write!(f, "{}", path.display()),
            Self::Memory => f.write_str(":memory:"),
        }
    }
}

/// A live, schema-checked connection to the key store.
pub struct Database {
    conn: Mutex<Connection>,
    location: StoreLocation,
    accesses: AtomicU64,
}

impl Database {
    /// Open the store at `location`, upgrading the schema if it is older than
    /// `SCHEMA_VERSION`.
    ///
    /// Lock contention while opening or upgrading yields `ConnectionBlocked`
    /// once `busy_timeout` has elapsed.
    pub fn open(location: &StoreLocation, busy_timeout: Duration) -> Result<Self, StoreError> {
        let connection_error = |source: rusqlite::Error| {
            if StoreError::is_busy(&source) {
                StoreError::ConnectionBlocked(format!("{}: {}", location, source))
            } else {
                StoreError::Connection {
                    location: location.to_string(),
                    source,
                }
            }
        };

        let mut conn = match location {
            StoreLocation::File(path) => {
                if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                    std::fs::create_dir_all(parent)?;
                }
                Connection::open(path).map_err(connection_error)?
            }
            StoreLocation::Memory => Connection::open_in_memory().map_err(connection_error)?,
        };
        conn.busy_timeout(busy_timeout).map_err(connection_error)?;

        let version = schema::on_disk_version(&conn).map_err(connection_error)?;
        if version > SCHEMA_VERSION {
            return Err(StoreError::VersionTooNew {
                found: version,
                supported: SCHEMA_VERSION,
            });
        }

        if version < SCHEMA_VERSION {
            let tx = conn
                .transaction_with_behavior(TransactionBehavior::Exclusive)
                .map_err(connection_error)?;
            // Another process may have upgraded while we waited for the lock.
            let current = schema::on_disk_version(&tx).map_err(connection_error)?;
            schema::upgrade(&tx, current)?;
            tx.commit().map_err(connection_error)?;
            tracing::info!(
                location = %location,
                from = current,
                to = SCHEMA_VERSION,
                "Key store schema upgraded"
            );
        }

        tracing::debug!(location = %location, "Key store opened");

        Ok(Self {
            conn: Mutex::new(conn),
            location: location.clone(),
            accesses: AtomicU64::new(0),
        })
    }

    pub fn location(&self) -> &StoreLocation {
        &self.location
    }

    /// Number of storage operations run through this handle.
    pub fn storage_accesses(&self) -> u64 {
        self.accesses.load(Ordering::SeqCst)
    }

    /// Run `f` with exclusive use of the connection. Each call counts as one
    /// storage access.
    pub(crate) fn with_conn<T>(
        &self,
        f: impl FnOnce(&mut Connection) -> Result<T, StoreError>,
    ) -> Result<T, StoreError> {
        let mut conn = self.conn.lock().map_err(|_| StoreError::Poisoned)?;
        self.accesses.fetch_add(1, Ordering::SeqCst);
        f(&mut conn)
    }

    pub fn schema_version(&self) -> Result<u32, StoreError> {
        self.with_conn(|conn| Ok(schema::on_disk_version(conn)?))
    }

    /// Close the underlying connection, reporting any error SQLite raises.
    pub fn close(self) -> Result<(), StoreError> {
        let conn = self.conn.into_inner().map_err(|_| StoreError::Poisoned)?;
        conn.close().map_err(|(_, e)| StoreError::Persistence(e))?;
        tracing::debug!(location = %self.location, "Key store connection closed");
        Ok(())
    }
}

impl fmt::Debug for Database {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Database")
            .field("location", &self.location)
            .field("accesses", &self.storage_accesses())
            .finish()
    }
}

/// Run blocking storage work off the async executor.
pub(crate) async fn run_blocking<T, F>(f: F) -> Result<T, StoreError>
where
    F: FnOnce() -> Result<T, StoreError> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| StoreError::Task(e.to_string()))?
}

// ─── Tests ───────────────────────────────────────────────────────────────────
