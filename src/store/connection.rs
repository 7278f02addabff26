// OpenNotes Keystore: Connection Manager
//
// Owns the single active `Database` handle. Any component may trigger a lazy
// open; only the manager closes or replaces the handle.
//
// State machine:
//   Closed -> Opening -> Open -> Closed
//   Opening -> Closed   (blocked or failed attempt)

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex as StdMutex};
use std::time::Duration;

use tokio::sync::Mutex;

use super::db::{run_blocking, Database, StoreLocation};
use super::StoreError;

/// SQLite's customary busy timeout.
pub const DEFAULT_BUSY_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Closed,
    Opening,
    Open,
}

pub struct ConnectionManager {
    location: StoreLocation,
    busy_timeout: Duration,
    /// Held across the whole open so concurrent callers share one attempt.
    active: Mutex<Option<Arc<Database>>>,
    state: StdMutex<ConnectionState>,
    opens: AtomicU64,
}

impl ConnectionManager {
    pub fn new(location: StoreLocation) -> Self {
        Self::with_busy_timeout(location, DEFAULT_BUSY_TIMEOUT)
    }

    pub fn with_busy_timeout(location: StoreLocation, busy_timeout: Duration) -> Self {
        Self {
            location,
            busy_timeout,
            active: Mutex::new(None),
            state: StdMutex::new(ConnectionState::Closed),
            opens: AtomicU64::new(0),
        }
    }

    pub fn location(&self) -> &StoreLocation {
        &self.location
    }

    pub fn state(&self) -> ConnectionState {
        match self.state.lock() {
            Ok(state) => *state,
            Err(poisoned) => *poisoned.into_inner(),
        }
    }

    /// Number of physical opens performed so far.
    pub fn open_count(&self) -> u64 {
        self.opens.load(Ordering::SeqCst)
    }

    fn set_state(&self, next: ConnectionState) {
        match self.state.lock() {
            Ok(mut state) => *state = next,
            Err(poisoned) => *poisoned.into_inner() = next,
        }
    }

    /// Return the active connection, opening it first if necessary.
    pub async fn open(&self) -> Result<Arc<Database>, StoreError> {
        let mut active = self.active.lock().await;
        if let Some(db) = active.as_ref() {
            return Ok(Arc::clone(db));
        }

        let attempt = OpenAttempt::begin(self);
        let location = self.location.clone();
        let busy_timeout = self.busy_timeout;

        match run_blocking(move || Database::open(&location, busy_timeout)).await {
            Ok(db) => {
                let db = Arc::new(db);
                *active = Some(Arc::clone(&db));
                self.opens.fetch_add(1, Ordering::SeqCst);
                attempt.succeed();
                tracing::info!(location = %self.location, "Key store connection established");
                Ok(db)
            }
            Err(e) => {
                tracing::warn!(location = %self.location, error = %e, "Failed to open key store");
                Err(e)
            }
        }
    }

    /// Schema version of the open store, opening it first if necessary.
    pub async fn schema_version(&self) -> Result<u32, StoreError> {
        let db = self.open().await?;
        run_blocking(move || db.schema_version()).await
    }

    /// Release the active connection. Closing an already-closed store is a no-op.
    pub async fn close(&self) -> Result<(), StoreError> {
        let mut active = self.active.lock().await;
        let Some(db) = active.take() else {
            tracing::debug!("Key store already closed");
            return Ok(());
        };
        self.set_state(ConnectionState::Closed);

        match Arc::try_unwrap(db) {
            Ok(db) => run_blocking(move || db.close()).await?,
            // In-flight operations still hold a clone; the connection closes
            // when the last of them drops it.
            Err(_) => tracing::debug!("Key store close deferred to in-flight operations"),
        }

        tracing::info!(location = %self.location, "Key store connection released");
        Ok(())
    }
}

/// Marks the manager `Opening` for the life of one open attempt. Unless the
/// attempt succeeds, dropping it (on error or when the caller abandons the
/// `open` future) puts the manager back to `Closed`.
struct OpenAttempt<'a> {
    manager: &'a ConnectionManager,
    opened: bool,
}

impl<'a> OpenAttempt<'a> {
    fn begin(manager: &'a ConnectionManager) -> Self {
        manager.set_state(ConnectionState::Opening);
        Self {
            manager,
            opened: false,
        }
    }

    fn succeed(mut self) {
        self.opened = true;
        self.manager.set_state(ConnectionState::Open);
    }
}

impl Drop for OpenAttempt<'_> {
    fn drop(&mut self) {
        if !self.opened {
            self.manager.set_state(ConnectionState::Closed);
        }
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn file_manager(dir: &tempfile::TempDir) -> ConnectionManager {
        ConnectionManager::with_busy_timeout(
            StoreLocation::file(dir.path().join("keys.db")),
            Duration::from_millis(10),
        )
    }

    #[tokio::test]
    async fn test_open_caches_handle() {
        let dir = tempfile::tempdir().unwrap();
        let manager = file_manager(&dir);
        assert_eq!(manager.state(), ConnectionState::Closed);

        let first = manager.open().await.unwrap();
        let second = manager.open().await.unwrap();

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(manager.open_count(), 1);
        assert_eq!(manager.state(), ConnectionState::Open);
    }

    #[tokio::test]
    async fn test_concurrent_opens_share_one_connection() {
        let dir = tempfile::tempdir().unwrap();
        let manager = file_manager(&dir);

        let (a, b) = tokio::join!(manager.open(), manager.open());
        let (a, b) = (a.unwrap(), b.unwrap());

        assert!(Arc::ptr_eq(&a, &b), "Both callers must get the same instance");
        assert_eq!(manager.open_count(), 1, "Only one physical open/upgrade");
    }

    #[tokio::test]
    async fn test_close_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let manager = file_manager(&dir);

        assert!(manager.close().await.is_ok(), "Closing a closed store is a no-op");

        manager.open().await.unwrap();
        manager.close().await.unwrap();
        assert_eq!(manager.state(), ConnectionState::Closed);
        assert!(manager.close().await.is_ok());
    }

    #[tokio::test]
    async fn test_open_after_close_reopens() {
        let dir = tempfile::tempdir().unwrap();
        let manager = file_manager(&dir);

        let first = manager.open().await.unwrap();
        drop(first);
        manager.close().await.unwrap();

        let second = manager.open().await.unwrap();
        assert_eq!(manager.open_count(), 2);
        assert_eq!(manager.state(), ConnectionState::Open);
        assert_eq!(second.schema_version().unwrap(), crate::store::SCHEMA_VERSION);
    }

    #[tokio::test]
    async fn test_close_with_outstanding_handle_is_deferred() {
        let dir = tempfile::tempdir().unwrap();
        let manager = file_manager(&dir);

        let in_flight = manager.open().await.unwrap();
        manager.close().await.unwrap();
        assert_eq!(manager.state(), ConnectionState::Closed);

        // The in-flight holder can still finish its work
        assert!(in_flight.schema_version().is_ok());
    }

    #[tokio::test]
    async fn test_failed_open_returns_to_closed() {
        let dir = tempfile::tempdir().unwrap();
        let manager = ConnectionManager::with_busy_timeout(
            StoreLocation::file(dir.path()),
            Duration::from_millis(10),
        );

        let err = manager.open().await.unwrap_err();
        assert!(matches!(err, StoreError::Connection { .. }));
        assert_eq!(manager.state(), ConnectionState::Closed);
        assert_eq!(manager.open_count(), 0);
    }

    #[tokio::test]
    async fn test_blocked_open_reports_connection_blocked() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("keys.db");
        let holder = rusqlite::Connection::open(&path).unwrap();
        holder.execute_batch("BEGIN EXCLUSIVE;").unwrap();

        let manager = file_manager(&dir);
        let err = manager.open().await.unwrap_err();
        assert!(matches!(err, StoreError::ConnectionBlocked(_)));
        assert_eq!(manager.state(), ConnectionState::Closed);

        holder.execute_batch("COMMIT;").unwrap();
        assert!(manager.open().await.is_ok());
    }

    #[tokio::test]
    async fn test_abandoned_open_returns_to_closed() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("keys.db");
        let holder = rusqlite::Connection::open(&path).unwrap();
        holder.execute_batch("BEGIN EXCLUSIVE;").unwrap();

        let manager = ConnectionManager::with_busy_timeout(
            StoreLocation::file(&path),
            Duration::from_millis(500),
        );
        let outcome = tokio::time::timeout(Duration::from_millis(50), manager.open()).await;
        assert!(outcome.is_err(), "Open should still be waiting on the lock");
        assert_eq!(manager.state(), ConnectionState::Closed);
        assert_eq!(manager.open_count(), 0);

        holder.execute_batch("COMMIT;").unwrap();
        manager.open().await.unwrap();
        assert_eq!(manager.state(), ConnectionState::Open);
    }

    #[tokio::test]
    async fn test_schema_version_opens_lazily() {
        let dir = tempfile::tempdir().unwrap();
        let manager = file_manager(&dir);

        let version = manager.schema_version().await.unwrap();
        assert_eq!(version, crate::store::SCHEMA_VERSION);
        assert_eq!(manager.state(), ConnectionState::Open);
    }
}
