//! Extract command implementation

use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

use crate::downloader::config::{
    ExtractConfig, TransportSettings, DEFAULT_CONCURRENCY, DEFAULT_OUTPUT_DIR,
    DEFAULT_RATE_LIMIT_THRESHOLD, DEFAULT_REQUEST_DELAY_MS, DEFAULT_RETRY_JITTER_MS, MAX_CONCURRENCY,
    MAX_RETRIES,
};
use crate::downloader::{Extractor, Manifest, ResourceQuery};
use crate::metrics;
use crate::output::{JsonArtifactWriter, OutputError};
use crate::ResourceType;

use super::CliError;

/// Parse and validate concurrency value
fn parse_concurrency(s: &str) -> Result<usize, String> {
    let value: usize = s
        .parse()
        .map_err(|_| format!("'{s}' is not a valid number"))?;

    if value == 0 {
        return Err("concurrency must be at least 1".to_string());
    }
    if value > MAX_CONCURRENCY {
        return Err(format!(
            "concurrency {value} exceeds maximum of {MAX_CONCURRENCY}"
        ));
    }
    Ok(value)
}

/// Output format options
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    /// JSON output
    Json,
    /// Human-readable output
    Human,
}

impl FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "json" => Ok(OutputFormat::Json),
            "human" => Ok(OutputFormat::Human),
            _ => Err(format!("Invalid output format: {s}")),
        }
    }
}

/// IGA Extractor CLI
///
/// Every option can also be set through the environment variable shown in
/// `--help`; a `.env` file in the working directory is loaded first.
#[derive(Parser, Debug)]
#[command(name = "iga-extractor")]
#[command(about = "Snapshot identity governance data into JSON artifacts", long_about = None)]
#[command(version)]
pub struct Cli {
    /// API origin, e.g. https://example.okta.com
    #[arg(long, env = "IGA_BASE_URL")]
    pub base_url: Option<String>,

    /// Bearer token sent with every request
    #[arg(long, env = "IGA_API_TOKEN", hide_env_values = true)]
    pub token: Option<String>,

    /// Root directory for run artifacts
    #[arg(long, env = "IGA_OUTPUT_DIR", default_value = DEFAULT_OUTPUT_DIR)]
    pub output_dir: PathBuf,

    /// Number of jobs paginating concurrently (default: 4, max: 32)
    ///
    /// All jobs share one rate gate, so raising this mostly helps when the
    /// upstream quota is generous.
    #[arg(long, env = "IGA_CONCURRENCY", default_value_t = DEFAULT_CONCURRENCY, value_parser = parse_concurrency)]
    pub concurrency: usize,

    /// Page size sent as `limit`; the server default is used when omitted
    #[arg(long, env = "IGA_PAGE_SIZE", value_parser = clap::value_parser!(u32).range(1..))]
    pub page_size: Option<u32>,

    /// Resource types to discover (comma separated: applications, groups)
    #[arg(
        long,
        env = "IGA_RESOURCE_TYPES",
        value_delimiter = ',',
        default_value = "applications,groups"
    )]
    pub resource_types: Vec<ResourceType>,

    /// Keep at most this many resources per type (0 = unlimited)
    #[arg(long, env = "IGA_MAX_RESOURCES", default_value_t = 0)]
    pub max_resources: usize,

    /// Fixed delay before every request, in milliseconds
    #[arg(long, env = "IGA_REQUEST_DELAY_MS", default_value_t = DEFAULT_REQUEST_DELAY_MS)]
    pub request_delay_ms: u64,

    /// Pause proactively when `x-rate-limit-remaining` drops to this value
    #[arg(long, env = "IGA_RATE_LIMIT_THRESHOLD", default_value_t = DEFAULT_RATE_LIMIT_THRESHOLD)]
    pub rate_limit_threshold: u32,

    /// Retries allowed after an HTTP 429 (range: 0-20)
    #[arg(long, env = "IGA_MAX_RETRIES", default_value_t = MAX_RETRIES, value_parser = clap::value_parser!(u32).range(0..=20))]
    pub max_retries: u32,

    /// Upper bound of the random jitter added to every rate-limit wait, in milliseconds
    #[arg(long, env = "IGA_RETRY_JITTER_MS", default_value_t = DEFAULT_RETRY_JITTER_MS)]
    pub retry_jitter_ms: u64,

    /// Output format (json or human)
    #[arg(long, default_value = "human")]
    pub output_format: OutputFormat,

    /// Expose Prometheus metrics on this address, e.g. 127.0.0.1:9000
    #[arg(long, env = "IGA_METRICS_ADDR")]
    pub metrics_addr: Option<SocketAddr>,

    /// Disable the progress bar
    #[arg(long, default_value_t = false)]
    pub no_progress: bool,
}

impl Cli {
    /// Resolve the parsed arguments into a run configuration
    ///
    /// The result is not validated; see [`ExtractConfig::validate`].
    pub fn to_config(&self) -> ExtractConfig {
        let mut resource_types = Vec::new();
        for kind in &self.resource_types {
            if !resource_types.contains(kind) {
                resource_types.push(*kind);
            }
        }

        ExtractConfig {
            base_url: self.base_url.clone().unwrap_or_default(),
            token: self.token.clone().unwrap_or_default(),
            output_dir: self.output_dir.clone(),
            concurrency: self.concurrency,
            page_size: self.page_size,
            resource_types,
            max_resources: self.max_resources,
            transport: TransportSettings {
                request_delay: Duration::from_millis(self.request_delay_ms),
                rate_limit_threshold: self.rate_limit_threshold,
                max_retries: self.max_retries,
                retry_jitter: Duration::from_millis(self.retry_jitter_ms),
            },
        }
    }

    /// Execute the extraction
    ///
    /// Only configuration problems and an unwritable output directory are
    /// errors here; failed jobs are reported in the manifest and summary.
    pub async fn execute(&self) -> Result<Manifest, CliError> {
        let config = self.to_config();
        config.validate()?;

        if let Some(addr) = self.metrics_addr {
            metrics::init_metrics(addr).map_err(CliError::ConfigurationError)?;
        }

        let writer = Arc::new(JsonArtifactWriter::for_new_run(&config.output_dir)?);
        let progress = if self.no_progress || self.output_format == OutputFormat::Json {
            ProgressBar::hidden()
        } else {
            create_progress_bar()
        };

        let extractor = Extractor::from_config(&config)?.with_progress(progress.clone());
        let manifest = extractor.run(writer.clone()).await?;
        progress.finish_and_clear();

        let run_dir = writer.layout().run_dir();
        info!("Run finished, artifacts in {}", run_dir.display());

        match self.output_format {
            OutputFormat::Json => output_json(&manifest, run_dir)?,
            OutputFormat::Human => output_human(&manifest, run_dir),
        }

        Ok(manifest)
    }
}

fn create_progress_bar() -> ProgressBar {
    let pb = ProgressBar::new(0);
    if let Ok(style) = ProgressStyle::with_template(
        "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} jobs {msg}",
    ) {
        pb.set_style(style.progress_chars("#>-"));
    }
    pb.set_message("extracting");
    pb
}

/// Print the run summary as a single JSON line
fn output_json(manifest: &Manifest, run_dir: &Path) -> Result<(), CliError> {
    let manifest_value = serde_json::to_value(manifest)
        .map_err(|e| OutputError::SerializationError(e.to_string()))?;

    let output = serde_json::json!({
        "success": true,
        "run_dir": run_dir.display().to_string(),
        "artifacts": manifest.artifact_count(),
        "errors": manifest.error_count(),
        "elapsed_secs": manifest.elapsed_secs(),
        "manifest": manifest_value,
    });
    println!("{output}");
    Ok(())
}

/// Print the run summary for humans
fn output_human(manifest: &Manifest, run_dir: &Path) {
    println!("\nExtraction completed!");
    println!("Output: {}", run_dir.display());
    if let Some(secs) = manifest.elapsed_secs() {
        println!("Elapsed: {secs:.1}s");
    }

    println!("\nGlobal endpoints:");
    for entry in manifest.entries.values() {
        match &entry.error {
            None => println!("  {:<20} {}", entry.key, entry.count),
            Some(e) => println!("  {:<20} FAILED ({e})", entry.key),
        }
    }

    println!("\nDiscovery:");
    for (kind, entry) in &manifest.discovery {
        let kept = manifest.resources.discovered.get(kind).copied().unwrap_or(0);
        match &entry.error {
            None => println!("  {:<20} {} found, {} kept", entry.key, entry.count, kept),
            Some(e) => println!("  {:<20} FAILED ({e})", entry.key),
        }
    }

    println!("\nPer-resource totals:");
    for query in ResourceQuery::ALL {
        println!("  {:<20} {}", query.key(), manifest.total(query));
    }

    let errors = manifest.error_count();
    if errors > 0 {
        eprintln!("\n{errors} job(s) failed:");
        for failure in &manifest.resources.errors {
            eprintln!("  {}/{}: {}", failure.resource, failure.query, failure.error);
        }
    } else {
        println!("\nNo errors.");
    }
}
