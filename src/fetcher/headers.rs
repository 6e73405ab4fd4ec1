//! Rate-limit and pagination header parsing
//!
//! The upstream reports quota state on every response:
//! - `x-rate-limit-remaining` - requests left in the current window
//! - `x-rate-limit-reset` - window reset, in epoch seconds
//! - `retry-after` - seconds to wait, on 429 responses
//!
//! and pagination through an RFC 8288 `link` header whose `rel="next"` entry
//! carries the continuation cursor in its `after` query parameter.

use reqwest::header::HeaderMap;
use tracing::warn;

/// Remaining requests in the current quota window
pub const RATE_LIMIT_REMAINING: &str = "x-rate-limit-remaining";
/// Quota window reset time (epoch seconds)
pub const RATE_LIMIT_RESET: &str = "x-rate-limit-reset";
/// Explicit wait hint on 429 responses (seconds)
pub const RETRY_AFTER: &str = "retry-after";
/// Pagination link header
pub const LINK: &str = "link";
/// Query parameter carrying the continuation cursor
pub const CURSOR_PARAM: &str = "after";

/// Quota state reported by one response
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct QuotaHeaders {
    /// Requests left in the window
    pub remaining: Option<u64>,
    /// Window reset, epoch seconds
    pub reset_epoch_secs: Option<i64>,
    /// Explicit retry hint, seconds
    pub retry_after_secs: Option<u64>,
}

impl QuotaHeaders {
    /// Extract quota headers; malformed values are logged and ignored
    pub fn parse(headers: &HeaderMap) -> Self {
        Self {
            remaining: parse_header(headers, RATE_LIMIT_REMAINING),
            reset_epoch_secs: parse_header(headers, RATE_LIMIT_RESET),
            retry_after_secs: parse_header(headers, RETRY_AFTER),
        }
    }

    /// Whether remaining quota is at or below `threshold`
    pub fn is_low(&self, threshold: u32) -> bool {
        self.remaining
            .is_some_and(|remaining| remaining <= u64::from(threshold))
    }

    /// Milliseconds until the window resets, relative to `now_epoch_millis`
    ///
    /// Zero when the reset is already in the past; `None` without the header.
    pub fn millis_until_reset(&self, now_epoch_millis: i64) -> Option<u64> {
        self.reset_epoch_secs.map(|reset| {
            let delta = reset.saturating_mul(1000).saturating_sub(now_epoch_millis);
            u64::try_from(delta).unwrap_or(0)
        })
    }
}

fn parse_header<T: std::str::FromStr>(headers: &HeaderMap, name: &str) -> Option<T>
where
    T::Err: std::fmt::Display,
{
    let raw = headers.get(name)?.to_str().ok()?.trim();
    match raw.parse::<T>() {
        Ok(value) => Some(value),
        Err(e) => {
            warn!("Failed to parse {} header '{}': {}", name, raw, e);
            None
        }
    }
}

/// Target URL of the `rel="next"` entry of a link header value
pub fn next_link(link_header: &str) -> Option<&str> {
    link_header.split(',').find_map(|entry| {
        let mut parts = entry.split(';');
        let target = parts.next()?.trim();
        let url = target.strip_prefix('<')?.strip_suffix('>')?;
        let is_next = parts.any(|param| {
            let param = param.trim();
            let Some(value) = param.strip_prefix("rel=") else {
                return false;
            };
            value
                .trim_matches('"')
                .split_whitespace()
                .any(|rel| rel.eq_ignore_ascii_case("next"))
        });
        is_next.then_some(url)
    })
}

/// Cursor token carried by a next-page URL
///
/// Accepts absolute URLs and bare `path?query` references.
pub fn cursor_from_url(url: &str) -> Option<String> {
    let parsed = reqwest::Url::parse(url)
        .or_else(|_| reqwest::Url::parse("http://relative.invalid").and_then(|base| base.join(url)))
        .ok()?;
    parsed
        .query_pairs()
        .find(|(key, _)| key == CURSOR_PARAM)
        .map(|(_, value)| value.into_owned())
        .filter(|value| !value.is_empty())
}

/// Whether the response advertises a next page, and its cursor if any
///
/// `None` means there is no next link. `Some(None)` means a next link exists
/// but carries no cursor.
pub fn next_page(headers: &HeaderMap) -> Option<Option<String>> {
    let next = headers
        .get_all(LINK)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .find_map(next_link)?;
    Some(cursor_from_url(next))
}
