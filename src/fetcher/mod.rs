//! HTTP transport, response decoding and cursor pagination

pub mod client;
pub mod headers;
pub mod iga_http;
pub mod page;
pub mod pagination;

pub use iga_http::{ApiResponse, IgaHttpClient, RawResponse};
pub use page::PageBody;
pub use pagination::PaginationHelper;

/// Fetcher errors
///
/// Every variant is terminal for the job that raised it; the scheduler records
/// it in the manifest and moves on.
#[derive(Debug, thiserror::Error)]
pub enum FetcherError {
    /// Connection failure or timeout, never retried
    #[error("network error: {0}")]
    NetworkError(String),

    /// 429 responses persisted past the retry budget
    #[error("rate limit exceeded after {attempts} attempts")]
    RateLimitExceeded {
        /// Requests issued, including the first one
        attempts: u32,
    },

    /// Any other 4xx/5xx response
    #[error("HTTP {status}: {body}")]
    HttpError {
        /// Response status code
        status: u16,
        /// Response body text
        body: String,
    },

    /// Successful response whose body is not valid JSON
    #[error("parse error: {0}")]
    ParseError(String),

    /// Pagination did not terminate
    #[error("pagination error: {0}")]
    PaginationError(String),
}

impl FetcherError {
    /// HTTP status carried by the error, if any
    pub fn status(&self) -> Option<u16> {
        match self {
            FetcherError::HttpError { status, .. } => Some(*status),
            FetcherError::RateLimitExceeded { .. } => Some(429),
            _ => None,
        }
    }
}

/// Result type for fetcher operations
pub type FetcherResult<T> = Result<T, FetcherError>;
