//! Unit tests for link header and quota header parsing

use reqwest::header::{HeaderMap, HeaderValue};

use iga_extractor::fetcher::headers::{cursor_from_url, next_link, next_page, QuotaHeaders};

#[test]
fn test_next_link_among_several_relations() {
    let header = "<https://example.okta.com/api/v1/groups?limit=2>; rel=\"self\", \
                  <https://example.okta.com/api/v1/groups?after=00g2&limit=2>; rel=\"next\"";
    assert_eq!(
        next_link(header),
        Some("https://example.okta.com/api/v1/groups?after=00g2&limit=2")
    );
}

#[test]
fn test_no_next_relation() {
    assert_eq!(next_link("<https://example.okta.com/api/v1/apps>; rel=\"self\""), None);
    assert_eq!(next_link(""), None);
}

#[test]
fn test_cursor_extraction() {
    assert_eq!(
        cursor_from_url("https://example.okta.com/api/v1/apps?after=0oa9&limit=200"),
        Some("0oa9".to_string())
    );
    assert_eq!(
        cursor_from_url("/governance/api/v1/grants?after=abc%3D%3D"),
        Some("abc==".to_string())
    );
    assert_eq!(cursor_from_url("https://example.okta.com/api/v1/apps?limit=200"), None);
}

#[test]
fn test_next_page_reads_separate_link_headers() {
    let mut headers = HeaderMap::new();
    headers.append(
        "link",
        HeaderValue::from_static("<https://example.okta.com/api/v1/apps>; rel=\"self\""),
    );
    headers.append(
        "link",
        HeaderValue::from_static("<https://example.okta.com/api/v1/apps?after=c1>; rel=\"next\""),
    );
    assert_eq!(next_page(&headers), Some(Some("c1".to_string())));
    assert_eq!(next_page(&HeaderMap::new()), None);
}

#[test]
fn test_quota_headers() {
    let mut headers = HeaderMap::new();
    headers.insert("x-rate-limit-remaining", HeaderValue::from_static("5"));
    headers.insert("x-rate-limit-reset", HeaderValue::from_static("1700000010"));

    let quota = QuotaHeaders::parse(&headers);
    assert!(quota.is_low(5));
    assert!(!quota.is_low(4));
    assert_eq!(quota.millis_until_reset(1_700_000_000_000), Some(10_000));
    assert_eq!(quota.millis_until_reset(1_700_000_020_000), Some(0));
}

#[test]
fn test_malformed_quota_headers_are_ignored() {
    let mut headers = HeaderMap::new();
    headers.insert("x-rate-limit-remaining", HeaderValue::from_static("lots"));
    headers.insert("retry-after", HeaderValue::from_static("Wed, 21 Oct 2015 07:28:00 GMT"));

    let quota = QuotaHeaders::parse(&headers);
    assert_eq!(quota, QuotaHeaders::default());
    assert!(!quota.is_low(100));
}
