// OpenNotes Keystore: Enrollment Workflow
//
// generate key pair -> export + persist via the repository -> hand the stored
// record to the listing. The workflow is the only place where failures are
// turned into end-user messages; it never retries.

mod listing;

use std::sync::Arc;

use uuid::Uuid;

use crate::error::KeystoreError;
use crate::keys::{AsymmetricKeyProvider, KeyGenParams};
use crate::store::{KeyRecord, KeyRepository};

pub use listing::{ConsoleListing, ErrorReporter, KeyListing, TracingReporter};

#[cfg(test)]
pub use listing::mock;

fn random_name() -> String {
    Uuid::new_v4().to_string()
}

pub struct KeyEnrollment {
    provider: Arc<dyn AsymmetricKeyProvider>,
    repository: Arc<dyn KeyRepository>,
    listing: Arc<dyn KeyListing>,
    reporter: Arc<dyn ErrorReporter>,
    params: KeyGenParams,
    name_source: fn() -> String,
}

impl KeyEnrollment {
    pub fn new(
        provider: Arc<dyn AsymmetricKeyProvider>,
        repository: Arc<dyn KeyRepository>,
        listing: Arc<dyn KeyListing>,
        reporter: Arc<dyn ErrorReporter>,
    ) -> Self {
        Self {
            provider,
            repository,
            listing,
            reporter,
            params: KeyGenParams::default(),
            name_source: random_name,
        }
    }

    /// Override the key generation parameters (the default is 4096-bit RSA-OAEP).
    pub fn with_params(mut self, params: KeyGenParams) -> Self {
        self.params = params;
        self
    }

    /// Override how new keys are named (the default is a random UUID).
    pub fn with_name_source(mut self, name_source: fn() -> String) -> Self {
        self.name_source = name_source;
        self
    }

    /// Generate, store and list a new authentication key pair.
    ///
    /// Failures are reported to the error reporter and returned. A failed
    /// generation never reaches storage; a failed save leaves no record.
    pub async fn create_auth_key(&self) -> Result<KeyRecord, KeystoreError> {
        match self.generate_and_save().await {
            Ok(record) => {
                self.listing.add_to_key_list(&record.summary());
                Ok(record)
            }
            Err(e) => {
                self.reporter
                    .error(&format!("Could not create and save new key pair: {}", e));
                Err(e)
            }
        }
    }

    async fn generate_and_save(&self) -> Result<KeyRecord, KeystoreError> {
        let pair = self.provider.generate_key_pair(&self.params).await?;
        let name = (self.name_source)();
        let record = self
            .repository
            .save_key(pair.public_key, pair.private_key, &name)
            .await?;
        Ok(record)
    }

    /// Hand every stored key to the listing, oldest first. Returns how many
    /// keys were listed.
    pub async fn load_key_listing(&self) -> Result<usize, KeystoreError> {
        match self.repository.list_keys().await {
            Ok(entries) => {
                for entry in &entries {
                    self.listing.add_to_key_list(&entry.value.summary());
                }
                tracing::debug!(count = entries.len(), "Key listing loaded");
                Ok(entries.len())
            }
            Err(e) => {
                self.reporter
                    .error(&format!("Could not get a list of keys: {}", e));
                Err(e.into())
            }
        }
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────
