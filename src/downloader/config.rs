//! Extraction configuration and tuning constants

use std::path::PathBuf;
use std::time::Duration;

use crate::downloader::DownloadError;
use crate::ResourceType;

/// Maximum number of retries for a rate-limited request.
pub const MAX_RETRIES: u32 = 5;

/// Initial backoff delay in milliseconds, used for 429 responses that carry
/// neither `retry-after` nor `x-rate-limit-reset`.
pub const INITIAL_BACKOFF_MS: u64 = 1000; // 1 second

/// Maximum backoff delay in milliseconds.
pub const MAX_BACKOFF_MS: u64 = 30000; // 30 seconds

/// Longest pause or retry wait honoured from upstream hints, in milliseconds.
pub const MAX_RATE_LIMIT_WAIT_MS: u64 = 15 * 60 * 1000; // 15 minutes

/// Default number of jobs paginating at the same time.
pub const DEFAULT_CONCURRENCY: usize = 4;

/// Upper bound on concurrency to avoid self-inflicted rate limiting.
pub const MAX_CONCURRENCY: usize = 32;

/// Fixed delay before every request, in milliseconds.
pub const DEFAULT_REQUEST_DELAY_MS: u64 = 100;

/// Remaining-quota level at or below which requests pause until reset.
pub const DEFAULT_RATE_LIMIT_THRESHOLD: u32 = 5;

/// Upper bound of the random jitter added to pauses and retry waits.
pub const DEFAULT_RETRY_JITTER_MS: u64 = 500;

/// Default artifact root.
pub const DEFAULT_OUTPUT_DIR: &str = "output";

/// Calculate exponential backoff delay
pub fn calculate_backoff(retry_count: u32) -> Duration {
    let delay_ms = INITIAL_BACKOFF_MS.saturating_mul(2u64.saturating_pow(retry_count));
    let delay_ms = delay_ms.min(MAX_BACKOFF_MS);
    Duration::from_millis(delay_ms)
}

/// Clamp a computed pause to [`MAX_RATE_LIMIT_WAIT_MS`]
pub fn cap_wait(wait: Duration) -> Duration {
    wait.min(Duration::from_millis(MAX_RATE_LIMIT_WAIT_MS))
}

/// Knobs consumed by the HTTP transport
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportSettings {
    /// Unconditional sleep before each request
    pub request_delay: Duration,
    /// Pause proactively once `x-rate-limit-remaining` drops to this value
    pub rate_limit_threshold: u32,
    /// Retries allowed after a 429 (total attempts = `max_retries + 1`)
    pub max_retries: u32,
    /// Upper bound of the random jitter added to every pause
    pub retry_jitter: Duration,
}

impl Default for TransportSettings {
    fn default() -> Self {
        Self {
            request_delay: Duration::from_millis(DEFAULT_REQUEST_DELAY_MS),
            rate_limit_threshold: DEFAULT_RATE_LIMIT_THRESHOLD,
            max_retries: MAX_RETRIES,
            retry_jitter: Duration::from_millis(DEFAULT_RETRY_JITTER_MS),
        }
    }
}

/// Fully resolved configuration for one extraction run
#[derive(Debug, Clone)]
pub struct ExtractConfig {
    /// Upstream base URL, e.g. `https://example.okta.com`
    pub base_url: String,
    /// Static bearer credential
    pub token: String,
    /// Root directory for run artifacts
    pub output_dir: PathBuf,
    /// Maximum number of jobs paginating concurrently
    pub concurrency: usize,
    /// Fixed page size, omitted from requests when `None`
    pub page_size: Option<u32>,
    /// Resource types to discover and expand
    pub resource_types: Vec<ResourceType>,
    /// Maximum resources kept per type, 0 means unlimited
    pub max_resources: usize,
    /// Transport tuning
    pub transport: TransportSettings,
}

impl ExtractConfig {
    /// Create a configuration with defaults for everything but the endpoint and credential
    pub fn new(base_url: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            token: token.into(),
            output_dir: PathBuf::from(DEFAULT_OUTPUT_DIR),
            concurrency: DEFAULT_CONCURRENCY,
            page_size: None,
            resource_types: ResourceType::ALL.to_vec(),
            max_resources: 0,
            transport: TransportSettings::default(),
        }
    }

    /// Check run preconditions before any request is issued
    pub fn validate(&self) -> Result<(), DownloadError> {
        if self.token.trim().is_empty() {
            return Err(DownloadError::Configuration(
                "API token is required (set --token or IGA_API_TOKEN)".to_string(),
            ));
        }

        let base = self.base_url.trim();
        if base.is_empty() {
            return Err(DownloadError::Configuration(
                "base URL is required (set --base-url or IGA_BASE_URL)".to_string(),
            ));
        }
        reqwest::Url::parse(base)
            .map_err(|e| DownloadError::Configuration(format!("invalid base URL '{base}': {e}")))?;

        if self.concurrency == 0 {
            return Err(DownloadError::Configuration(
                "concurrency must be at least 1".to_string(),
            ));
        }

        if self.page_size == Some(0) {
            return Err(DownloadError::Configuration(
                "page size must be positive when set".to_string(),
            ));
        }

        Ok(())
    }

    /// Whether discovery and per-resource jobs include this type
    pub fn includes(&self, kind: ResourceType) -> bool {
        self.resource_types.contains(&kind)
    }

    /// Per-type resource cap, `None` when unlimited
    pub fn resource_limit(&self) -> Option<usize> {
        (self.max_resources > 0).then_some(self.max_resources)
    }
}
