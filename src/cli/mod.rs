// OpenNotes Keystore: CLI Module
//
// Command-line interface using clap derive macros.
// Subcommands: init, create, list, get, export.

mod commands;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

pub use commands::execute;

/// OpenNotes Keystore: generate and manage RSA authentication keys.
#[derive(Parser, Debug)]
#[command(name = "opennotes-keystore")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Database location. Overrides OPENNOTES_KEYSTORE_PATH; use ":memory:" for a throwaway store.
    #[arg(long, global = true)]
    pub db: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Create the key store and bring its schema up to date.
    Init,

    /// Generate a new RSA-OAEP key pair and store it.
    Create {
        /// Modulus length in bits.
        #[arg(long, default_value = "4096")]
        bits: usize,
    },

    /// List every stored key (public material only).
    List {
        /// Print the key summaries as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Look up a single key.
    Get {
        /// Lookup criterion: id, name, publicKeyEncoding (or spki).
        #[arg(long, default_value = "name")]
        by: String,

        /// The value to match. SPKI encodings are given as hex.
        value: String,
    },

    /// Write a key's SPKI public key to `<name>.publicKey`.
    Export {
        /// Name of the key to export.
        name: String,

        /// Output directory (default: current directory).
        #[arg(long)]
        out: Option<PathBuf>,
    },
}
