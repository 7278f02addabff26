// OpenNotes Keystore: key provider error types

use thiserror::Error;

#[derive(Debug, Error)]
pub enum KeyProviderError {
    #[error("Key generation failed: {0}")]
    Generation(String),

    #[error("Public key export failed: {0}")]
    Export(String),

    #[error("Unsupported key parameters: {0}")]
    UnsupportedParams(String),

    #[error("Invalid key material: {0}")]
    InvalidKeyMaterial(String),

    #[error("Key provider task failed: {0}")]
    Task(String),
}
