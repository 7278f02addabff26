// OpenNotes Keystore: Application Entry Point
//
// Parses CLI arguments, initializes structured logging (private key material
// is never logged at any level), and dispatches to the command handler.

use clap::Parser;
use tracing_subscriber::EnvFilter;

use opennotes_keystore::cli::{execute, Cli};

#[tokio::main(flavor = "current_thread")]
async fn main() {
    // RUST_LOG=opennotes_keystore=debug for verbose output.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("opennotes_keystore=info")),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    if let Err(e) = execute(cli).await {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}
