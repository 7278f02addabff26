// OpenNotes Keystore: Key Material Module
//
// Asymmetric key generation and public-key export. Generated key material is
// carried in opaque handles; only the provider that produced a handle knows
// how to interpret its bytes. Private keys have no export path.

mod error;
mod material;
mod provider;

pub use error::KeyProviderError;
pub use material::{
    GeneratedKeyPair, HashAlgorithm, KeyAlgorithm, KeyGenParams, KeyUsage, PrivateKeyHandle,
    PublicKeyFormat, PublicKeyHandle,
};
pub use provider::{AsymmetricKeyProvider, RsaOaepProvider};

#[cfg(test)]
pub use provider::mock;
