// OpenNotes Keystore: key handles and generation parameters
//
// SECURITY: `PrivateKeyHandle` never appears in Debug output or log messages,
// is zeroized on drop, and offers no export to an interchange encoding.

use std::fmt;

use serde::{Deserialize, Serialize};
use zeroize::Zeroizing;

// ─── Parameters ──────────────────────────────────────────────────────────────

/// Modulus size used for enrollment keys.
pub const DEFAULT_MODULUS_BITS: usize = 4096;

/// The standard RSA public exponent F4.
pub const DEFAULT_PUBLIC_EXPONENT: u64 = 65537;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum KeyAlgorithm {
    #[serde(rename = "RSA-OAEP")]
    RsaOaep,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum HashAlgorithm {
    #[serde(rename = "SHA-256")]
    Sha256,
    #[serde(rename = "SHA-384")]
    Sha384,
    #[serde(rename = "SHA-512")]
    Sha512,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum KeyUsage {
    Encrypt,
    Decrypt,
    Sign,
    Verify,
}

/// Parameters handed to `AsymmetricKeyProvider::generate_key_pair`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyGenParams {
    pub algorithm: KeyAlgorithm,
    pub modulus_bits: usize,
    pub public_exponent: u64,
    /// Hash used by the OAEP padding.
    pub hash: HashAlgorithm,
    pub usages: Vec<KeyUsage>,
    /// Whether the private key may be exported. Enrollment keys are not.
    pub extractable: bool,
}

impl KeyGenParams {
    /// RSA-OAEP encryption keys with a caller-chosen modulus size.
    pub fn rsa_oaep(modulus_bits: usize) -> Self {
        Self {
            algorithm: KeyAlgorithm::RsaOaep,
            modulus_bits,
            public_exponent: DEFAULT_PUBLIC_EXPONENT,
            hash: HashAlgorithm::Sha256,
            usages: vec![KeyUsage::Encrypt, KeyUsage::Decrypt],
            extractable: false,
        }
    }
}

impl Default for KeyGenParams {
    fn default() -> Self {
        Self::rsa_oaep(DEFAULT_MODULUS_BITS)
    }
}

/// Encodings a public key can be exported to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PublicKeyFormat {
    /// DER-encoded SubjectPublicKeyInfo.
    Spki,
}

// ─── Handles ─────────────────────────────────────────────────────────────────

/// Opaque public key. The bytes are in the producing provider's internal
/// encoding; use `AsymmetricKeyProvider::export_public_key` for an
/// interchange format.
#[derive(Clone, PartialEq, Eq)]
pub struct PublicKeyHandle {
    material: Vec<u8>,
}

impl PublicKeyHandle {
    pub fn new(material: Vec<u8>) -> Self {
        Self { material }
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.material
    }
}

impl fmt::Debug for PublicKeyHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PublicKeyHandle")
            .field("len", &self.material.len())
            .finish()
    }
}

/// Opaque private key. Persisted only inside the key store.
pub struct PrivateKeyHandle {
    material: Zeroizing<Vec<u8>>,
}

impl PrivateKeyHandle {
    pub fn new(material: Zeroizing<Vec<u8>>) -> Self {
        Self { material }
    }

    /// Raw provider-internal bytes.
    /// IMPORTANT: only the provider and the store's persistence layer may read
    /// these; never log them or place them in an error message.
    pub fn material(&self) -> &[u8] {
        &self.material
    }
}

impl fmt::Debug for PrivateKeyHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("PrivateKeyHandle([REDACTED])")
    }
}

/// Result of a key-pair generation.
#[derive(Debug)]
pub struct GeneratedKeyPair {
    pub public_key: PublicKeyHandle,
    pub private_key: PrivateKeyHandle,
}

// ─── Tests ───────────────────────────────────────────────────────────────────
