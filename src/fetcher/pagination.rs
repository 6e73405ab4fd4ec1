//! Cursor pagination over link headers
//!
//! A logical query is driven to completion by re-sending the same path with
//! an evolving `after` cursor taken from the previous response's
//! `link: <...>; rel="next"` header. Pages are concatenated in fetch order.
//!
//! Includes safety mechanisms:
//! - Maximum iteration limit to prevent infinite loops
//! - A next link without a cursor, or repeating the current one, is an error
//!   rather than a silently truncated result set
//! - Any page error fails the whole query; partial results are discarded

use std::future::Future;
use tracing::{debug, warn};

use crate::fetcher::headers::{self, CURSOR_PARAM};
use crate::fetcher::iga_http::{ApiResponse, IgaHttpClient};
use crate::fetcher::page::PageBody;
use crate::fetcher::{FetcherError, FetcherResult};
use crate::Record;

/// Maximum number of pages fetched for one query
pub const MAX_ITERATIONS: usize = 10_000;

/// Query parameter carrying the page size
pub const PAGE_SIZE_PARAM: &str = "limit";

/// Pagination helper for governance API queries
pub struct PaginationHelper;

impl PaginationHelper {
    /// Fetch every page of `path` through the transport
    ///
    /// # Arguments
    /// * `http_client` - Transport used for each page
    /// * `path` - API path (e.g., "/governance/api/v1/grants")
    /// * `base_params` - Parameters sent with every page
    /// * `page_size` - Sent as `limit` when set, omitted entirely otherwise
    ///
    /// # Errors
    /// The first transport error on any page, or a pagination overrun
    pub async fn fetch_all(
        http_client: &IgaHttpClient,
        path: &str,
        base_params: &[(String, String)],
        page_size: Option<u32>,
    ) -> FetcherResult<Vec<Record>> {
        Self::paginate(path, base_params, page_size, move |params| async move {
            http_client.get(path, &params).await
        })
        .await
    }

    /// Pagination loop over an arbitrary page source
    ///
    /// `fetch_fn` receives the full parameter list for one page and returns
    /// that page's response.
    pub async fn paginate<F, Fut>(
        path: &str,
        base_params: &[(String, String)],
        page_size: Option<u32>,
        mut fetch_fn: F,
    ) -> FetcherResult<Vec<Record>>
    where
        F: FnMut(Vec<(String, String)>) -> Fut,
        Fut: Future<Output = FetcherResult<ApiResponse>>,
    {
        let mut all_records = Vec::new();
        let mut cursor: Option<String> = None;
        let mut iteration = 0;

        loop {
            if iteration >= MAX_ITERATIONS {
                return Err(FetcherError::PaginationError(format!(
                    "Max iterations ({MAX_ITERATIONS}) exceeded for {path} - possible infinite loop. Last cursor: {cursor:?}"
                )));
            }

            let params = Self::page_params(base_params, page_size, cursor.as_deref());

            debug!(
                "Fetching page {} of {} (cursor: {:?})",
                iteration + 1,
                path,
                cursor
            );

            let response = fetch_fn(params).await?;
            let next = headers::next_page(&response.headers);
            let page = PageBody::decode(response.body).into_records();

            debug!("Received {} records in page {}", page.len(), iteration + 1);
            all_records.extend(page);
            iteration += 1;

            match next {
                None => break,
                Some(Some(next_cursor)) => {
                    if cursor.as_deref() == Some(next_cursor.as_str()) {
                        warn!(
                            "Next link for {} repeats cursor {} after {} pages",
                            path, next_cursor, iteration
                        );
                        return Err(FetcherError::PaginationError(format!(
                            "next link for {path} repeats cursor {next_cursor} after {iteration} pages"
                        )));
                    }
                    cursor = Some(next_cursor);
                }
                Some(None) => {
                    warn!(
                        "Next link for {} has no '{}' cursor after {} pages",
                        path, CURSOR_PARAM, iteration
                    );
                    return Err(FetcherError::PaginationError(format!(
                        "next link for {path} has no '{CURSOR_PARAM}' cursor after {iteration} pages"
                    )));
                }
            }
        }

        debug!(
            "Pagination of {} completed after {} pages. Total records: {}",
            path,
            iteration,
            all_records.len()
        );

        Ok(all_records)
    }

    /// Parameters for one page: base, then `limit` if configured, then `after` if known
    pub fn page_params(
        base_params: &[(String, String)],
        page_size: Option<u32>,
        cursor: Option<&str>,
    ) -> Vec<(String, String)> {
        let mut params = base_params.to_vec();
        if let Some(limit) = page_size {
            params.push((PAGE_SIZE_PARAM.to_string(), limit.to_string()));
        }
        if let Some(after) = cursor {
            params.push((CURSOR_PARAM.to_string(), after.to_string()));
        }
        params
    }
}
