//! Underlying reqwest client construction
//!
//! One `reqwest::Client` is built per run and shared (it is reference-counted
//! internally) so connection pooling spans every concurrent job.

use reqwest::Client;
use std::time::Duration;

use crate::fetcher::{FetcherError, FetcherResult};

/// HTTP connect timeout (seconds) - time to establish TCP connection
pub const HTTP_CONNECT_TIMEOUT_SECS: u64 = 10;
/// HTTP request timeout (seconds) - overall time for the entire request
pub const HTTP_REQUEST_TIMEOUT_SECS: u64 = 30;

/// Build the HTTP client used by the transport
///
/// Configured with explicit timeouts to prevent indefinite hangs:
/// - Connect timeout: 10 seconds
/// - Request timeout: 30 seconds
pub fn build_http_client() -> FetcherResult<Client> {
    build_http_client_with_timeouts(
        Duration::from_secs(HTTP_CONNECT_TIMEOUT_SECS),
        Duration::from_secs(HTTP_REQUEST_TIMEOUT_SECS),
    )
}

/// Build an HTTP client with explicit timeouts
pub fn build_http_client_with_timeouts(
    connect_timeout: Duration,
    request_timeout: Duration,
) -> FetcherResult<Client> {
    Client::builder()
        .connect_timeout(connect_timeout)
        .timeout(request_timeout)
        .user_agent(concat!("iga-extractor/", env!("CARGO_PKG_VERSION")))
        .build()
        .map_err(|e| {
            FetcherError::NetworkError(format!(
                "failed to build HTTP client: {e}. Check system TLS configuration."
            ))
        })
}
