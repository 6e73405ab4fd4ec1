//! Main entry point for the iga-extractor CLI

use clap::Parser;
use iga_extractor::cli::Cli;
use tracing::error;
use tracing_subscriber::EnvFilter;

/// Initialize tracing subscriber with optional JSON formatting
fn init_tracing() {
    // Check if JSON output is requested via environment variable
    let json_format = std::env::var("LOG_FORMAT")
        .map(|v| v.to_lowercase() == "json")
        .unwrap_or(false);

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("iga_extractor=info"));

    if json_format {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init();
    }
}

#[tokio::main]
async fn main() {
    // A missing .env file is not an error
    let dotenv_loaded = dotenvy::dotenv().is_ok();

    init_tracing();
    if dotenv_loaded {
        tracing::debug!("Loaded environment from .env");
    }

    let cli = Cli::parse();

    // Job failures are reported in the manifest; only fatal errors exit non-zero
    let result = cli.execute().await.map_err(|e| anyhow::anyhow!(e));

    if let Err(e) = result {
        error!("Extraction failed: {}", e);
        std::process::exit(1);
    }
}
