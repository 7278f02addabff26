// OpenNotes Keystore: Top-level error types
//
// Aggregates errors from the key provider and store modules into a single
// error enum for the application boundary.

use thiserror::Error;

/// Top-level error type for all keystore operations.
#[derive(Debug, Error)]
pub enum KeystoreError {
    #[error("Key provider error: {0}")]
    Provider(#[from] crate::keys::KeyProviderError),

    #[error("Store error: {0}")]
    Store(#[from] crate::store::StoreError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Other(String),
}

pub type Result<T> = std::result::Result<T, KeystoreError>;
