//! Extraction orchestration and rate limiting
//!
//! This module turns a resolved configuration into a complete snapshot run:
//! it builds the job matrix, schedules jobs under one concurrency ceiling,
//! throttles every request through a shared rate gate and folds every
//! outcome into the run manifest.
//!
//! # Overview
//!
//! 1. **Configuration**: Resolved and validated via [`config::ExtractConfig`]
//! 2. **Job Creation**: Static and per-resource jobs from [`job`]
//! 3. **Discovery**: Applications and groups listed by [`discovery`]
//! 4. **Execution**: Bounded-concurrency fan-out via [`executor::JobScheduler`]
//! 5. **Rate Limiting**: Cross-request pauses via [`rate_limit::RateGate`]
//! 6. **Reporting**: Per-key counts and errors in [`manifest::Manifest`]
//!
//! # Quick Start
//!
//! ```no_run
//! use iga_extractor::downloader::{ExtractConfig, Extractor};
//! use iga_extractor::output::JsonArtifactWriter;
//! use std::sync::Arc;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let mut config = ExtractConfig::new("https://example.okta.com", "00abc-token");
//! config.concurrency = 8;
//! config.max_resources = 50;
//!
//! let extractor = Extractor::from_config(&config)?;
//! let writer = Arc::new(JsonArtifactWriter::for_new_run(&config.output_dir)?);
//! let manifest = extractor.run(writer).await?;
//! # Ok(())
//! # }
//! ```
//!
//! # Error Handling
//!
//! Job failures never surface as errors: they are captured per job and
//! recorded in the manifest. [`DownloadError`] is reserved for run-level
//! problems (invalid configuration, an unbuildable HTTP client, a manifest
//! that cannot be written).
//!
//! # Related Modules
//!
//! - [`crate::fetcher`] - HTTP transport and pagination
//! - [`crate::output`] - Artifact writers

pub mod config;
pub mod discovery;
pub mod executor;
pub mod job;
pub mod manifest;
pub mod pipeline;
pub mod rate_limit;

pub use config::{ExtractConfig, TransportSettings};
pub use discovery::{DiscoveryEndpoints, DiscoveryReport};
pub use executor::{JobOutcome, JobScheduler, ScheduleSummary};
pub use job::{Job, JobTarget, ResourceQuery, StaticEndpoint};
pub use manifest::Manifest;
pub use pipeline::Extractor;
pub use rate_limit::{Clock, FixedClock, RateGate, SystemClock};

use crate::fetcher::FetcherError;
use crate::output::OutputError;

/// Run-level errors
#[derive(Debug, thiserror::Error)]
pub enum DownloadError {
    /// Fetcher error
    #[error("fetcher error: {0}")]
    Fetcher(#[from] FetcherError),

    /// Output error
    #[error("output error: {0}")]
    Output(#[from] OutputError),

    /// Invalid or missing configuration
    #[error("configuration error: {0}")]
    Configuration(String),
}
