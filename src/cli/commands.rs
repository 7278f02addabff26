// OpenNotes Keystore: CLI Command Handlers
//
// Each function handles one CLI subcommand. They wire the RSA provider, the
// SQLite repository and the enrollment workflow together.

use std::path::PathBuf;
use std::sync::Arc;

use serde::Serialize;

use crate::config::KeystoreConfig;
use crate::enrollment::{ConsoleListing, KeyEnrollment, TracingReporter};
use crate::error::KeystoreError;
use crate::keys::{AsymmetricKeyProvider, KeyGenParams, RsaOaepProvider};
use crate::store::{
    ConnectionManager, KeyId, KeyRecord, KeyRepository, KeySummary, SqliteKeyRepository,
};

use super::{Cli, Commands};

/// Execute the parsed CLI command.
pub async fn execute(cli: Cli) -> Result<(), KeystoreError> {
    let config = match cli.db {
        Some(path) => KeystoreConfig::from_env().with_db_path(path),
        None => KeystoreConfig::from_env(),
    };

    match cli.command {
        Commands::Init => cmd_init(&config).await,
        Commands::Create { bits } => cmd_create(&config, bits).await,
        Commands::List { json } => cmd_list(&config, json).await,
        Commands::Get { by, value } => cmd_get(&config, &by, &value).await,
        Commands::Export { name, out } => cmd_export(&config, &name, out).await,
    }
}

// ─── Init ────────────────────────────────────────────────────────────────────

async fn cmd_init(config: &KeystoreConfig) -> Result<(), KeystoreError> {
    let connections = connections(config);
    let version = connections.schema_version().await;
    connections.close().await?;
    let version = version?;

    println!("✓ Key store initialized");
    println!("  Location: {}", config.location);
    println!("  Schema:   v{}", version);
    println!();
    println!("Next: create a key with `opennotes-keystore create`");

    Ok(())
}

// ─── Create ──────────────────────────────────────────────────────────────────

async fn cmd_create(config: &KeystoreConfig, bits: usize) -> Result<(), KeystoreError> {
    let (provider, repository) = open_repository(config);
    let params = KeyGenParams {
        modulus_bits: bits,
        ..config.key_params.clone()
    };

    println!("Generating {}-bit RSA-OAEP key pair...", bits);
    let enrollment = KeyEnrollment::new(
        provider,
        repository.clone(),
        Arc::new(ConsoleListing),
        Arc::new(TracingReporter),
    )
    .with_params(params);

    let record = enrollment.create_auth_key().await?;
    repository.connections().close().await?;

    println!("✓ Key pair stored");
    println!("  ID:          {}", record.id);
    println!("  Name:        {}", record.name);
    println!("  Fingerprint: {}", record.fingerprint());

    Ok(())
}

// ─── List ────────────────────────────────────────────────────────────────────

async fn cmd_list(config: &KeystoreConfig, json: bool) -> Result<(), KeystoreError> {
    let (provider, repository) = open_repository(config);

    if json {
        let entries = repository.list_keys().await;
        repository.connections().close().await?;
        let rows: Vec<ListedKey> = entries?
            .iter()
            .map(|e| ListedKey::from(&e.value.summary()))
            .collect();
        let output = serde_json::to_string_pretty(&rows)
            .map_err(|e| KeystoreError::Other(format!("Failed to serialize key list: {}", e)))?;
        println!("{}", output);
        return Ok(());
    }

    let enrollment = KeyEnrollment::new(
        provider,
        repository.clone(),
        Arc::new(ConsoleListing),
        Arc::new(TracingReporter),
    );

    let count = enrollment.load_key_listing().await?;
    repository.connections().close().await?;

    if count == 0 {
        println!("No keys stored yet.");
        println!("Create one with: opennotes-keystore create");
    } else {
        println!();
        println!("{} key(s) stored", count);
    }

    Ok(())
}

/// One `list --json` entry: the public key as a downloadable artifact.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ListedKey {
    id: KeyId,
    name: String,
    fingerprint: String,
    file_name: String,
    data_url: String,
}

impl From<&KeySummary> for ListedKey {
    fn from(summary: &KeySummary) -> Self {
        Self {
            id: summary.id,
            name: summary.name.clone(),
            fingerprint: summary.fingerprint(),
            file_name: summary.download_file_name(),
            data_url: summary.data_url(),
        }
    }
}

// ─── Get ─────────────────────────────────────────────────────────────────────

async fn cmd_get(config: &KeystoreConfig, by: &str, value: &str) -> Result<(), KeystoreError> {
    let (_provider, repository) = open_repository(config);
    let found = repository.get_key_by(by, value).await;
    repository.connections().close().await?;

    match found? {
        Some(record) => print_record(&record),
        None => println!("Key not found: {} = {}", by, value),
    }

    Ok(())
}

// ─── Export ──────────────────────────────────────────────────────────────────

async fn cmd_export(
    config: &KeystoreConfig,
    name: &str,
    out: Option<PathBuf>,
) -> Result<(), KeystoreError> {
    let (_provider, repository) = open_repository(config);
    let found = repository.get_key_by("name", name).await;
    repository.connections().close().await?;

    let record = found?.ok_or_else(|| KeystoreError::Other(format!("Key not found: {}", name)))?;
    let summary = record.summary();

    let dir = out.unwrap_or_else(|| PathBuf::from("."));
    std::fs::create_dir_all(&dir)?;
    let path = dir.join(summary.download_file_name());
    std::fs::write(&path, &summary.public_key_encoding)?;

    tracing::info!(id = record.id, path = %path.display(), "Public key exported");
    println!("✓ Public key written to {}", path.display());

    Ok(())
}

// ─── Helpers ─────────────────────────────────────────────────────────────────

fn connections(config: &KeystoreConfig) -> Arc<ConnectionManager> {
    Arc::new(ConnectionManager::with_busy_timeout(
        config.location.clone(),
        config.busy_timeout,
    ))
}

/// Build the provider and repository for `config`. The database is opened
/// lazily by the first repository call.
fn open_repository(
    config: &KeystoreConfig,
) -> (Arc<dyn AsymmetricKeyProvider>, Arc<SqliteKeyRepository>) {
    let provider: Arc<dyn AsymmetricKeyProvider> = Arc::new(RsaOaepProvider::new());
    let repository = Arc::new(SqliteKeyRepository::new(connections(config), provider.clone()));
    (provider, repository)
}

fn print_record(record: &KeyRecord) {
    let summary = record.summary();
    println!("Key details:\n");
    println!("  ID:          {}", record.id);
    println!("  Name:        {}", record.name);
    println!("  Fingerprint: {}", summary.fingerprint());
    println!("  SPKI bytes:  {}", summary.public_key_encoding.len());
    println!("  Private key: [REDACTED]");
    println!("  Download:    {}", summary.download_file_name());
}
