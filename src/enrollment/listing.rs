// OpenNotes Keystore: listing and error-reporting collaborators
//
// The enrollment workflow hands finished keys to a `KeyListing` and
// human-readable failures to an `ErrorReporter`. Neither ever receives
// private key material.

use crate::store::KeySummary;

/// Receives keys to display or expose for download.
pub trait KeyListing: Send + Sync {
    fn add_to_key_list(&self, key: &KeySummary);
}

/// Receives end-user-facing failure messages.
pub trait ErrorReporter: Send + Sync {
    fn error(&self, message: &str);
}

/// Prints one line per key to stdout.
#[derive(Debug, Default)]
pub struct ConsoleListing;

impl KeyListing for ConsoleListing {
    fn add_to_key_list(&self, key: &KeySummary) {
        println!(
            "  {:>5} │ {:36} │ {}",
            key.id,
            key.name,
            key.fingerprint()
        );
    }
}

/// Reports failures through the log. The binary's subscriber writes to stderr.
#[derive(Debug, Default)]
pub struct TracingReporter;

impl ErrorReporter for TracingReporter {
    fn error(&self, message: &str) {
        tracing::error!("{}", message);
    }
}

// ─── Test Doubles ────────────────────────────────────────────────────────────
