// OpenNotes Keystore: Asymmetric Key Provider
//
// Generates RSA-OAEP key pairs and exports public keys as SPKI DER. The
// provider never persists anything; the key store calls back into it only to
// export the public half of a pair it is about to save.
//
// Flow:
//   1. `generate_key_pair()` validates the parameters, then generates on the
//      blocking pool so the cooperative executor is never stalled
//   2. both halves are wrapped in opaque handles (PKCS#1 DER internally)
//   3. `export_public_key()` re-encodes the public half for storage/listing

use async_trait::async_trait;
use rand::rngs::OsRng;
use rsa::pkcs1::{DecodeRsaPublicKey, EncodeRsaPrivateKey, EncodeRsaPublicKey};
use rsa::pkcs8::EncodePublicKey;
use rsa::{BigUint, RsaPrivateKey, RsaPublicKey};
use zeroize::Zeroizing;

use super::material::{
    GeneratedKeyPair, HashAlgorithm, KeyAlgorithm, KeyGenParams, KeyUsage, PrivateKeyHandle, PublicKeyFormat,
    PublicKeyHandle, DEFAULT_PUBLIC_EXPONENT,
};
use super::KeyProviderError;

// ─── Constants ───────────────────────────────────────────────────────────────

/// Smallest modulus accepted for new keys.
const MIN_MODULUS_BITS: usize = 2048;

/// Largest modulus accepted; anything above takes minutes to generate.
const MAX_MODULUS_BITS: usize = 8192;

// ─── Trait ───────────────────────────────────────────────────────────────────

/// Abstraction over asymmetric key generation, enabling the RSA backend in
/// production and mock implementations for testing.
#[async_trait]
pub trait AsymmetricKeyProvider: Send + Sync {
    /// Generate a fresh key pair with the given parameters.
    async fn generate_key_pair(
        &self,
        params: &KeyGenParams,
    ) -> Result<GeneratedKeyPair, KeyProviderError>;

    /// Export a public key to an interchange encoding.
    async fn export_public_key(
        &self,
        key: &PublicKeyHandle,
        format: PublicKeyFormat,
    ) -> Result<Vec<u8>, KeyProviderError>;
}

// ─── RSA Implementation ──────────────────────────────────────────────────────

/// Production provider backed by the `rsa` crate.
#[derive(Debug, Default, Clone, Copy)]
pub struct RsaOaepProvider;

impl RsaOaepProvider {
    pub fn new() -> Self {
        Self
    }

    fn validate(params: &KeyGenParams) -> Result<(), KeyProviderError> {
        if params.algorithm != KeyAlgorithm::RsaOaep {
            return Err(KeyProviderError::UnsupportedParams(format!(
                "algorithm {:?}",
                params.algorithm
            )));
        }
        if !(MIN_MODULUS_BITS..=MAX_MODULUS_BITS).contains(&params.modulus_bits) {
            return Err(KeyProviderError::UnsupportedParams(format!(
                "modulus of {} bits (allowed {}..={})",
                params.modulus_bits, MIN_MODULUS_BITS, MAX_MODULUS_BITS
            )));
        }
        // Keys are only ever used with OAEP over SHA-256.
        if params.hash != HashAlgorithm::Sha256 {
            return Err(KeyProviderError::UnsupportedParams(format!(
                "OAEP hash {:?}",
                params.hash
            )));
        }
        if params.public_exponent != DEFAULT_PUBLIC_EXPONENT {
            return Err(KeyProviderError::UnsupportedParams(format!(
                "public exponent {}",
                params.public_exponent
            )));
        }
        if params.usages.is_empty()
            || params
                .usages
                .iter()
                .any(|u| !matches!(u, KeyUsage::Encrypt | KeyUsage::Decrypt))
        {
            return Err(KeyProviderError::UnsupportedParams(format!(
                "usages {:?} (RSA-OAEP keys only encrypt and decrypt)",
                params.usages
            )));
        }
        if params.extractable {
            return Err(KeyProviderError::UnsupportedParams(
                "extractable private keys".to_string(),
            ));
        }
        Ok(())
    }

    fn generate_blocking(
        modulus_bits: usize,
        public_exponent: u64,
    ) -> Result<GeneratedKeyPair, KeyProviderError> {
        let exponent = BigUint::from(public_exponent);
        let private = RsaPrivateKey::new_with_exp(&mut OsRng, modulus_bits, &exponent)
            .map_err(|e| KeyProviderError::Generation(e.to_string()))?;
        let public = RsaPublicKey::from(&private);

        let public_der = public
            .to_pkcs1_der()
            .map_err(|e| KeyProviderError::Generation(format!("encoding public key: {}", e)))?;
        let private_der = private
            .to_pkcs1_der()
            .map_err(|e| KeyProviderError::Generation(format!("encoding private key: {}", e)))?;

        Ok(GeneratedKeyPair {
            public_key: PublicKeyHandle::new(public_der.as_bytes().to_vec()),
            private_key: PrivateKeyHandle::new(Zeroizing::new(private_der.as_bytes().to_vec())),
        })
    }

    fn decode_public(key: &PublicKeyHandle) -> Result<RsaPublicKey, KeyProviderError> {
        RsaPublicKey::from_pkcs1_der(key.as_bytes())
            .map_err(|e| KeyProviderError::InvalidKeyMaterial(format!("public key: {}", e)))
    }
}

#[async_trait]
impl AsymmetricKeyProvider for RsaOaepProvider {
    async fn generate_key_pair(
        &self,
        params: &KeyGenParams,
    ) -> Result<GeneratedKeyPair, KeyProviderError> {
        Self::validate(params)?;

        let bits = params.modulus_bits;
        let exponent = params.public_exponent;
        tracing::debug!(modulus_bits = bits, "Generating RSA-OAEP key pair");

        let pair = tokio::task::spawn_blocking(move || Self::generate_blocking(bits, exponent))
            .await
            .map_err(|e| KeyProviderError::Task(e.to_string()))??;

        tracing::debug!(modulus_bits = bits, "RSA-OAEP key pair generated");
        Ok(pair)
    }

    async fn export_public_key(
        &self,
        key: &PublicKeyHandle,
        format: PublicKeyFormat,
    ) -> Result<Vec<u8>, KeyProviderError> {
        match format {
            PublicKeyFormat::Spki => {
                let public = Self::decode_public(key)?;
                let document = public
                    .to_public_key_der()
                    .map_err(|e| KeyProviderError::Export(e.to_string()))?;
                Ok(document.as_bytes().to_vec())
            }
        }
    }
}

// ─── In-Memory Mock for Testing ──────────────────────────────────────────────

/// A mock provider producing random handles instantly.
/// Used for unit tests so the store and workflow tests don't pay for RSA.
#[cfg(test)]
pub mod mock {
    use super::*;
    use rand::RngCore;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    /// Prefix that makes mock exports recognizable in assertions.
    pub const MOCK_SPKI_PREFIX: &[u8] = b"MOCK-SPKI:";

    #[derive(Default)]
    pub struct MockKeyProvider {
        fail_generation: AtomicBool,
        fail_export: AtomicBool,
        generations: AtomicUsize,
        exports: AtomicUsize,
    }

    impl MockKeyProvider {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn failing_generation() -> Self {
            let provider = Self::new();
            provider.fail_generation.store(true, Ordering::SeqCst);
            provider
        }

        pub fn failing_export() -> Self {
            let provider = Self::new();
            provider.fail_export.store(true, Ordering::SeqCst);
            provider
        }

        pub fn set_fail_export(&self, fail: bool) {
            self.fail_export.store(fail, Ordering::SeqCst);
        }

        pub fn generation_count(&self) -> usize {
            self.generations.load(Ordering::SeqCst)
        }

        pub fn export_count(&self) -> usize {
            self.exports.load(Ordering::SeqCst)
        }

        /// The export this provider produces for `key`.
        pub fn expected_export(key: &PublicKeyHandle) -> Vec<u8> {
            let mut spki = MOCK_SPKI_PREFIX.to_vec();
            spki.extend_from_slice(key.as_bytes());
            spki
        }
    }

    #[async_trait]
    impl AsymmetricKeyProvider for MockKeyProvider {
        async fn generate_key_pair(
            &self,
            _params: &KeyGenParams,
        ) -> Result<GeneratedKeyPair, KeyProviderError> {
            if self.fail_generation.load(Ordering::SeqCst) {
                return Err(KeyProviderError::Generation(
                    "mock generation failure".to_string(),
                ));
            }
            self.generations.fetch_add(1, Ordering::SeqCst);

            let mut public = vec![0u8; 32];
            let mut private = Zeroizing::new(vec![0u8; 32]);
            rand::thread_rng().fill_bytes(&mut public);
            rand::thread_rng().fill_bytes(&mut private);

            Ok(GeneratedKeyPair {
                public_key: PublicKeyHandle::new(public),
                private_key: PrivateKeyHandle::new(private),
            })
        }

        async fn export_public_key(
            &self,
            key: &PublicKeyHandle,
            _format: PublicKeyFormat,
        ) -> Result<Vec<u8>, KeyProviderError> {
            if self.fail_export.load(Ordering::SeqCst) {
                return Err(KeyProviderError::Export("mock export failure".to_string()));
            }
            self.exports.fetch_add(1, Ordering::SeqCst);
            Ok(Self::expected_export(key))
        }
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use rsa::pkcs1::DecodeRsaPrivateKey;
    use rsa::pkcs8::DecodePublicKey;
    use rsa::traits::PublicKeyParts;
    use rsa::Oaep;
    use sha2::Sha256;

    const TEST_MODULUS_BITS: usize = 2048;

    #[tokio::test]
    async fn test_generated_pair_exports_valid_spki() {
        let provider = RsaOaepProvider::new();
        let pair = provider
            .generate_key_pair(&KeyGenParams::rsa_oaep(TEST_MODULUS_BITS))
            .await
            .unwrap();

        let spki = provider
            .export_public_key(&pair.public_key, PublicKeyFormat::Spki)
            .await
            .unwrap();

        let decoded = RsaPublicKey::from_public_key_der(&spki).expect("SPKI must decode");
        assert_eq!(decoded.n().bits(), TEST_MODULUS_BITS);
        assert_eq!(decoded.e(), &BigUint::from(DEFAULT_PUBLIC_EXPONENT));

        // Export is deterministic for a given key
        let again = provider
            .export_public_key(&pair.public_key, PublicKeyFormat::Spki)
            .await
            .unwrap();
        assert_eq!(spki, again);
    }

    #[tokio::test]
    async fn test_generated_pair_round_trips_oaep_sha256() {
        let provider = RsaOaepProvider::new();
        let pair = provider
            .generate_key_pair(&KeyGenParams::rsa_oaep(TEST_MODULUS_BITS))
            .await
            .unwrap();

        let public = RsaPublicKey::from_pkcs1_der(pair.public_key.as_bytes()).unwrap();
        let private = RsaPrivateKey::from_pkcs1_der(pair.private_key.material()).unwrap();

        let message = b"note encryption key";
        let ciphertext = public
            .encrypt(&mut OsRng, Oaep::new::<Sha256>(), message)
            .unwrap();
        let plaintext = private.decrypt(Oaep::new::<Sha256>(), &ciphertext).unwrap();
        assert_eq!(plaintext, message);
    }

    #[tokio::test]
    async fn test_rejects_weak_modulus() {
        let provider = RsaOaepProvider::new();
        let err = provider
            .generate_key_pair(&KeyGenParams::rsa_oaep(1024))
            .await
            .unwrap_err();
        assert!(matches!(err, KeyProviderError::UnsupportedParams(_)));
    }

    #[tokio::test]
    async fn test_rejects_signing_usage_and_extractable_keys() {
        let provider = RsaOaepProvider::new();

        for hash in [HashAlgorithm::Sha384, HashAlgorithm::Sha512] {
            let mut params = KeyGenParams::rsa_oaep(TEST_MODULUS_BITS);
            params.hash = hash;
            assert!(matches!(
                provider.generate_key_pair(&params).await.unwrap_err(),
                KeyProviderError::UnsupportedParams(_)
            ));
        }

        let mut signing = KeyGenParams::rsa_oaep(TEST_MODULUS_BITS);
        signing.usages = vec![KeyUsage::Sign];
        assert!(matches!(
            provider.generate_key_pair(&signing).await.unwrap_err(),
            KeyProviderError::UnsupportedParams(_)
        ));

        let mut extractable = KeyGenParams::rsa_oaep(TEST_MODULUS_BITS);
        extractable.extractable = true;
        assert!(matches!(
            provider.generate_key_pair(&extractable).await.unwrap_err(),
            KeyProviderError::UnsupportedParams(_)
        ));
    }

    #[tokio::test]
    async fn test_export_of_garbage_handle_fails() {
        let provider = RsaOaepProvider::new();
        let bogus = PublicKeyHandle::new(vec![1, 2, 3, 4]);
        let err = provider
            .export_public_key(&bogus, PublicKeyFormat::Spki)
            .await
            .unwrap_err();
        assert!(matches!(err, KeyProviderError::InvalidKeyMaterial(_)));
    }

    #[tokio::test]
    async fn test_mock_provider_counts_and_fails_on_demand() {
        let provider = mock::MockKeyProvider::new();
        let pair = provider
            .generate_key_pair(&KeyGenParams::default())
            .await
            .unwrap();
        let spki = provider
            .export_public_key(&pair.public_key, PublicKeyFormat::Spki)
            .await
            .unwrap();
        assert!(spki.starts_with(mock::MOCK_SPKI_PREFIX));
        assert_eq!(provider.generation_count(), 1);
        assert_eq!(provider.export_count(), 1);

        provider.set_fail_export(true);
        assert!(provider
            .export_public_key(&pair.public_key, PublicKeyFormat::Spki)
            .await
            .is_err());
    }
}
