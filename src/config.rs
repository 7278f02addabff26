// OpenNotes Keystore: Configuration
//
// Resolves where the key store lives and how keys are generated. Precedence:
// explicit override (CLI `--db`) > OPENNOTES_KEYSTORE_PATH > platform data dir.

use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::keys::KeyGenParams;
use crate::store::{StoreLocation, DATABASE_NAME, DEFAULT_BUSY_TIMEOUT};

/// Environment variable overriding the database location.
pub const PATH_ENV_VAR: &str = "OPENNOTES_KEYSTORE_PATH";

/// Value of `PATH_ENV_VAR` selecting a throwaway in-memory store.
const MEMORY_LOCATION: &str = ":memory:";

#[derive(Debug, Clone)]
pub struct KeystoreConfig {
    pub location: StoreLocation,
    /// How long opening waits on another connection's lock before giving up.
    pub busy_timeout: Duration,
    pub key_params: KeyGenParams,
}

/// Default directory for OpenNotes data files.
pub fn data_dir() -> PathBuf {
    let base = dirs_next::data_dir().unwrap_or_else(|| PathBuf::from("."));
    base.join("opennotes")
}

/// Path to the key store database file.
pub fn default_db_path() -> PathBuf {
    data_dir().join(format!("{}.db", DATABASE_NAME))
}

impl Default for KeystoreConfig {
    fn default() -> Self {
        Self {
            location: StoreLocation::File(default_db_path()),
            busy_timeout: DEFAULT_BUSY_TIMEOUT,
            key_params: KeyGenParams::default(),
        }
    }
}

impl KeystoreConfig {
    /// Defaults, with the location taken from `OPENNOTES_KEYSTORE_PATH` if set.
    pub fn from_env() -> Self {
        let config = Self::default();
        match std::env::var(PATH_ENV_VAR) {
            Ok(value) if !value.trim().is_empty() => config.with_location(parse_location(&value)),
            _ => config,
        }
    }

    pub fn with_location(mut self, location: StoreLocation) -> Self {
        self.location = location;
        self
    }

    pub fn with_db_path(self, path: impl AsRef<Path>) -> Self {
        self.with_location(parse_location(&path.as_ref().to_string_lossy()))
    }
}

fn parse_location(value: &str) -> StoreLocation {
    match value.trim() {
        MEMORY_LOCATION => StoreLocation::Memory,
        path => StoreLocation::File(PathBuf::from(path)),
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_location_is_under_data_dir() {
        let config = KeystoreConfig::default();
        match config.location {
            StoreLocation::File(path) => {
                assert!(path.ends_with("opennotes/OpenNotes.keystore.db"));
            }
            StoreLocation::Memory => panic!("Default must be file-backed"),
        }
        assert_eq!(config.busy_timeout, DEFAULT_BUSY_TIMEOUT);
        assert_eq!(config.key_params, KeyGenParams::default());
    }

    #[test]
    fn test_db_path_override() {
        let config = KeystoreConfig::default().with_db_path("/tmp/elsewhere/keys.db");
        assert_eq!(
            config.location,
            StoreLocation::File(PathBuf::from("/tmp/elsewhere/keys.db"))
        );
    }

    #[test]
    fn test_memory_location_keyword() {
        let config = KeystoreConfig::default().with_db_path(":memory:");
        assert_eq!(config.location, StoreLocation::Memory);
    }
}
