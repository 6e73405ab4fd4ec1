//! HTTP transport for the governance API
//!
//! Every call runs the same pipeline:
//!
//! 1. fixed pre-request delay
//! 2. wait for the shared [`RateGate`] to open
//! 3. send the GET with the bearer credential
//! 4. inspect quota headers, closing the gate early when quota runs low
//! 5. classify: 2xx returns, 429 waits and re-sends, anything else fails
//!
//! Network errors and timeouts fail immediately; only 429 is retried.

use rand::Rng;
use reqwest::header::{HeaderMap, ACCEPT};
use reqwest::{Client, StatusCode};
use serde_json::Value;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

use crate::downloader::config::{calculate_backoff, cap_wait, TransportSettings};
use crate::downloader::rate_limit::{Clock, RateGate, SystemClock};
use crate::fetcher::headers::QuotaHeaders;
use crate::fetcher::{FetcherError, FetcherResult};
use crate::metrics::{self, HttpRequestMetrics};

/// Unclassified response: any status, body as text
#[derive(Debug, Clone)]
pub struct RawResponse {
    /// HTTP status
    pub status: StatusCode,
    /// Response headers
    pub headers: HeaderMap,
    /// Body text
    pub body: String,
}

/// Successful response with a decoded JSON body
#[derive(Debug, Clone)]
pub struct ApiResponse {
    /// HTTP status (always 2xx)
    pub status: u16,
    /// Response headers
    pub headers: HeaderMap,
    /// Decoded body, `null` for an empty body
    pub body: Value,
}

impl ApiResponse {
    /// Build a 200 response, mainly for driving the paginator without a server
    pub fn ok(body: Value, headers: HeaderMap) -> Self {
        Self {
            status: 200,
            headers,
            body,
        }
    }
}

enum Classified {
    Success(ApiResponse),
    RateLimited(HeaderMap),
}

/// Rate-aware HTTP client shared by every fetch job
#[derive(Clone)]
pub struct IgaHttpClient {
    client: Client,
    base_url: String,
    token: String,
    rate_gate: Arc<RateGate>,
    clock: Arc<dyn Clock>,
    settings: TransportSettings,
}

impl IgaHttpClient {
    /// Create a new transport
    ///
    /// # Arguments
    /// * `client` - Underlying reqwest client (cheap to clone, pools connections)
    /// * `base_url` - API origin (e.g., "<https://example.okta.com>")
    /// * `token` - Bearer credential sent with every request
    /// * `rate_gate` - Gate shared by every transport of the run
    /// * `settings` - Delay, threshold, retry and jitter settings
    pub fn new(
        client: Client,
        base_url: impl Into<String>,
        token: impl Into<String>,
        rate_gate: Arc<RateGate>,
        settings: TransportSettings,
    ) -> Self {
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token: token.into(),
            rate_gate,
            clock: Arc::new(SystemClock),
            settings,
        }
    }

    /// Replace the wall clock used to interpret `x-rate-limit-reset`
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// API origin without a trailing slash
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Retries allowed after a 429
    pub fn max_retries(&self) -> u32 {
        self.settings.max_retries
    }

    /// Shared rate gate
    pub fn rate_gate(&self) -> &Arc<RateGate> {
        &self.rate_gate
    }

    /// GET `path` and return the decoded body of the first non-429 response
    ///
    /// # Errors
    /// - [`FetcherError::NetworkError`] on connection failure or timeout
    /// - [`FetcherError::RateLimitExceeded`] when 429 persists past `max_retries`
    /// - [`FetcherError::HttpError`] on any other non-2xx status
    /// - [`FetcherError::ParseError`] when a 2xx body is not JSON
    pub async fn get(&self, path: &str, params: &[(String, String)]) -> FetcherResult<ApiResponse> {
        let mut attempt: u32 = 0;

        loop {
            let raw = self.execute_attempt(path, params, attempt + 1).await?;
            self.observe_quota(&raw.headers);

            match Self::classify(raw)? {
                Classified::Success(response) => {
                    if attempt > 0 {
                        debug!(path, attempts = attempt + 1, "Request succeeded after retry");
                    }
                    return Ok(response);
                }
                Classified::RateLimited(headers) => {
                    let wait = self.retry_wait(&QuotaHeaders::parse(&headers), attempt);
                    if self.rate_gate.extend_pause_for(wait) {
                        metrics::record_gate_pause("rate_limited", wait);
                    }

                    if attempt >= self.settings.max_retries {
                        warn!(
                            path,
                            attempts = attempt + 1,
                            "Rate limit (429) persisted, giving up"
                        );
                        return Err(FetcherError::RateLimitExceeded {
                            attempts: attempt + 1,
                        });
                    }

                    warn!(
                        path,
                        wait_ms = wait.as_millis() as u64,
                        "Rate limit error (429) on attempt {}/{}",
                        attempt + 1,
                        self.settings.max_retries + 1
                    );
                    metrics::record_retry_backoff(wait, attempt + 1);
                    tokio::time::sleep(wait).await;
                    attempt += 1;
                }
            }
        }
    }

    /// Run the delay, gate and send steps once, returning any HTTP status as-is
    ///
    /// # Errors
    /// Only [`FetcherError::NetworkError`].
    pub async fn execute(&self, path: &str, params: &[(String, String)]) -> FetcherResult<RawResponse> {
        self.execute_attempt(path, params, 1).await
    }

    async fn execute_attempt(
        &self,
        path: &str,
        params: &[(String, String)],
        attempt: u32,
    ) -> FetcherResult<RawResponse> {
        self.pre_request_delay().await;
        self.rate_gate.wait_if_paused().await;
        self.send(path, params, attempt).await
    }

    async fn pre_request_delay(&self) {
        if !self.settings.request_delay.is_zero() {
            tokio::time::sleep(self.settings.request_delay).await;
        }
    }

    async fn send(
        &self,
        path: &str,
        params: &[(String, String)],
        attempt: u32,
    ) -> FetcherResult<RawResponse> {
        let url = self.url_for(path);
        let request_metrics = HttpRequestMetrics::start(path, attempt);

        debug!(
            correlation_id = request_metrics.correlation_id(),
            "GET {} with {} params",
            url,
            params.len()
        );

        let response = self
            .client
            .get(&url)
            .bearer_auth(&self.token)
            .header(ACCEPT, "application/json")
            .query(params)
            .send()
            .await
            .map_err(|e| {
                let message = describe_network_error(&e);
                request_metrics.record_network_error(&message);
                FetcherError::NetworkError(message)
            })?;

        let status = response.status();
        let headers = response.headers().clone();
        let body = response.text().await.map_err(|e| {
            let message = describe_network_error(&e);
            request_metrics.record_network_error(&message);
            FetcherError::NetworkError(message)
        })?;

        request_metrics.record_complete(status.as_u16());

        Ok(RawResponse {
            status,
            headers,
            body,
        })
    }

    /// Close the gate until quota reset when remaining quota is at or below the threshold
    ///
    /// Returns the pause requested, if any.
    fn observe_quota(&self, headers: &HeaderMap) -> Option<Duration> {
        let quota = QuotaHeaders::parse(headers);
        if !quota.is_low(self.settings.rate_limit_threshold) {
            return None;
        }

        let until_reset = quota.millis_until_reset(self.clock.now_epoch_millis())?;
        let pause = cap_wait(Duration::from_millis(until_reset).saturating_add(self.jitter()));

        if self.rate_gate.extend_pause_for(pause) {
            warn!(
                remaining = quota.remaining,
                pause_ms = pause.as_millis() as u64,
                "Quota nearly exhausted, pausing requests until reset"
            );
            metrics::record_gate_pause("low_quota", pause);
        }
        Some(pause)
    }

    /// Wait before re-sending after a 429 on the 0-indexed `attempt`
    ///
    /// Preference: `retry-after`, then time to `x-rate-limit-reset`, then
    /// exponential backoff. Jitter is always added and the total is capped at
    /// [`MAX_RATE_LIMIT_WAIT_MS`](crate::downloader::config::MAX_RATE_LIMIT_WAIT_MS).
    pub fn retry_wait(&self, quota: &QuotaHeaders, attempt: u32) -> Duration {
        let base = if let Some(secs) = quota.retry_after_secs {
            Duration::from_secs(secs)
        } else if let Some(millis) = quota.millis_until_reset(self.clock.now_epoch_millis()) {
            Duration::from_millis(millis)
        } else {
            calculate_backoff(attempt)
        };
        cap_wait(base.saturating_add(self.jitter()))
    }

    fn jitter(&self) -> Duration {
        let max_ms = u64::try_from(self.settings.retry_jitter.as_millis()).unwrap_or(u64::MAX);
        if max_ms == 0 {
            return Duration::ZERO;
        }
        Duration::from_millis(rand::thread_rng().gen_range(0..=max_ms))
    }

    fn classify(raw: RawResponse) -> FetcherResult<Classified> {
        if raw.status.is_success() {
            let body = parse_body(&raw.body)?;
            return Ok(Classified::Success(ApiResponse {
                status: raw.status.as_u16(),
                headers: raw.headers,
                body,
            }));
        }

        if raw.status == StatusCode::TOO_MANY_REQUESTS {
            return Ok(Classified::RateLimited(raw.headers));
        }

        Err(FetcherError::HttpError {
            status: raw.status.as_u16(),
            body: raw.body,
        })
    }

    fn url_for(&self, path: &str) -> String {
        if path.starts_with("http://") || path.starts_with("https://") {
            path.to_string()
        } else if path.starts_with('/') {
            format!("{}{}", self.base_url, path)
        } else {
            format!("{}/{}", self.base_url, path)
        }
    }
}

impl fmt::Debug for IgaHttpClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IgaHttpClient")
            .field("base_url", &self.base_url)
            .field("token", &"<redacted>")
            .field("rate_gate", &self.rate_gate)
            .field("settings", &self.settings)
            .finish()
    }
}

fn parse_body(body: &str) -> FetcherResult<Value> {
    if body.trim().is_empty() {
        return Ok(Value::Null);
    }
    serde_json::from_str(body)
        .map_err(|e| FetcherError::ParseError(format!("Failed to deserialize response: {e}")))
}

fn describe_network_error(error: &reqwest::Error) -> String {
    if error.is_timeout() {
        format!("request timed out: {error}")
    } else if error.is_connect() {
        format!("connection failed: {error}")
    } else {
        error.to_string()
    }
}
