//! Observability metrics for the extractor
//!
//! Counts requests, 429 responses, retries, rate-gate pauses and job outcomes.
//!
//! ## Architecture
//!
//! - Uses the `metrics` crate facade; without an installed recorder every call is a no-op
//! - Optional Prometheus exporter, installed by [`init_metrics`]
//! - Correlation IDs tie the log lines of one request together

use metrics::{counter, describe_counter, describe_histogram, histogram, Unit};
use metrics_exporter_prometheus::PrometheusBuilder;
use once_cell::sync::OnceCell;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

static METRICS_INITIALIZED: OnceCell<SocketAddr> = OnceCell::new();

static CORRELATION_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Initialize the Prometheus exporter
///
/// Idempotent: a second call is a no-op. Must run inside a tokio runtime.
///
/// # Arguments
/// * `addr` - Socket address for the scrape endpoint (e.g., "0.0.0.0:9090")
pub fn init_metrics(addr: SocketAddr) -> Result<(), String> {
    if METRICS_INITIALIZED.get().is_some() {
        debug!("Metrics already initialized, skipping");
        return Ok(());
    }

    info!("Initializing metrics system on {}", addr);

    PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
        .map_err(|e| format!("Failed to install Prometheus exporter: {e}"))?;

    describe_counter!(
        "http_requests_total",
        Unit::Count,
        "Total number of HTTP requests made to the upstream API"
    );
    describe_counter!(
        "http_429_errors_total",
        Unit::Count,
        "Total number of 429 rate limit responses received"
    );
    describe_counter!(
        "http_retries_total",
        Unit::Count,
        "Total number of retry attempts after 429 responses"
    );
    describe_counter!(
        "rate_gate_pauses_total",
        Unit::Count,
        "Times the shared rate gate was closed or extended"
    );
    describe_counter!(
        "jobs_completed_total",
        Unit::Count,
        "Fetch jobs finished, labelled by outcome"
    );
    describe_histogram!(
        "http_request_duration_seconds",
        Unit::Seconds,
        "HTTP request duration in seconds"
    );

    let _ = METRICS_INITIALIZED.set(addr);
    info!("Metrics system initialized successfully on {}", addr);
    Ok(())
}

/// Whether an exporter has been installed
pub fn is_initialized() -> bool {
    METRICS_INITIALIZED.get().is_some()
}

/// Generate a new correlation ID for request tracing
pub fn generate_correlation_id() -> String {
    let id = CORRELATION_COUNTER.fetch_add(1, Ordering::Relaxed) + 1;
    format!("req-{id:08x}")
}

/// Timing and labelling for one HTTP request attempt
#[derive(Debug)]
pub struct HttpRequestMetrics {
    endpoint: String,
    start_time: Instant,
    correlation_id: String,
    attempt: u32,
}

impl HttpRequestMetrics {
    /// Start recording a request attempt (1-indexed)
    pub fn start(endpoint: impl Into<String>, attempt: u32) -> Self {
        Self {
            endpoint: endpoint.into(),
            start_time: Instant::now(),
            correlation_id: generate_correlation_id(),
            attempt,
        }
    }

    /// Record a response with a status code
    pub fn record_complete(&self, status_code: u16) {
        let duration = self.start_time.elapsed();

        counter!(
            "http_requests_total",
            "endpoint" => self.endpoint.clone(),
            "status" => status_code.to_string(),
        )
        .increment(1);

        histogram!(
            "http_request_duration_seconds",
            "endpoint" => self.endpoint.clone(),
        )
        .record(duration.as_secs_f64());

        if status_code == 429 {
            counter!(
                "http_429_errors_total",
                "endpoint" => self.endpoint.clone(),
            )
            .increment(1);
        }

        debug!(
            correlation_id = %self.correlation_id,
            endpoint = %self.endpoint,
            attempt = self.attempt,
            status = status_code,
            duration_ms = duration.as_millis() as u64,
            "HTTP request completed"
        );
    }

    /// Record a network error (no status code)
    pub fn record_network_error(&self, error: &str) {
        let duration = self.start_time.elapsed();

        counter!(
            "http_requests_total",
            "endpoint" => self.endpoint.clone(),
            "status" => "network_error",
        )
        .increment(1);

        warn!(
            correlation_id = %self.correlation_id,
            endpoint = %self.endpoint,
            attempt = self.attempt,
            duration_ms = duration.as_millis() as u64,
            error = %error,
            "Network error"
        );
    }

    /// Correlation ID of this attempt
    pub fn correlation_id(&self) -> &str {
        &self.correlation_id
    }
}

/// Record a retry wait after a 429
pub fn record_retry_backoff(duration: Duration, attempt: u32) {
    counter!("http_retries_total").increment(1);
    debug!(
        attempt = attempt,
        backoff_ms = duration.as_millis() as u64,
        "Retry backoff recorded"
    );
}

/// Record that the rate gate was closed or extended
pub fn record_gate_pause(reason: &'static str, duration: Duration) {
    counter!("rate_gate_pauses_total", "reason" => reason).increment(1);
    debug!(
        reason = reason,
        pause_ms = duration.as_millis() as u64,
        "Rate gate pause recorded"
    );
}

/// Record a finished job
pub fn record_job_outcome(success: bool) {
    let outcome = if success { "success" } else { "failure" };
    counter!("jobs_completed_total", "outcome" => outcome).increment(1);
}
