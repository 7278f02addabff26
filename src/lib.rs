// OpenNotes Keystore: Library root
//
// Re-exports the key provider, store, enrollment, config and CLI modules.

pub mod cli;
pub mod config;
pub mod enrollment;
pub mod error;
pub mod keys;
pub mod store;

pub use error::{KeystoreError, Result};
