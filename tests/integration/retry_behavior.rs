//! Transport retry and error classification against a mock upstream

use reqwest::Client;
use serde_json::json;
use std::sync::Arc;
use std::time::{Duration, Instant};
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use iga_extractor::downloader::RateGate;
use iga_extractor::fetcher::{FetcherError, IgaHttpClient};

use super::support::{client_for, fast_settings, hits, json_page, too_many_requests, TOKEN};

/// Transport that sleeps `delay` before every request
fn delayed_client(server: &MockServer, delay: Duration, max_retries: u32) -> IgaHttpClient {
    let mut settings = fast_settings(max_retries);
    settings.request_delay = delay;
    IgaHttpClient::new(
        Client::new(),
        server.uri(),
        TOKEN,
        Arc::new(RateGate::new()),
        settings,
    )
}

#[tokio::test]
async fn test_429_then_success_returns_retry_data() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/governance/api/v1/labels"))
        .respond_with(too_many_requests())
        .up_to_n_times(1)
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/governance/api/v1/labels"))
        .respond_with(json_page(json!([{"id": "l1"}])))
        .expect(1)
        .mount(&server)
        .await;

    let http = client_for(&server, 3);
    let response = http.get("/governance/api/v1/labels", &[]).await.unwrap();

    assert_eq!(response.status, 200);
    assert_eq!(response.body, json!([{"id": "l1"}]));
    assert_eq!(hits(&server, "/governance/api/v1/labels").await, 2);
}

#[tokio::test]
async fn test_persistent_429_gives_up_after_max_retries() {
    let server = MockServer::start().await;
    Mock::given(path("/governance/api/v1/grants"))
        .respond_with(too_many_requests())
        .mount(&server)
        .await;

    let http = client_for(&server, 2);
    let err = http.get("/governance/api/v1/grants", &[]).await.unwrap_err();

    assert!(matches!(err, FetcherError::RateLimitExceeded { attempts: 3 }));
    // One initial attempt plus max_retries
    assert_eq!(hits(&server, "/governance/api/v1/grants").await, 3);
}

#[tokio::test]
async fn test_zero_retries_means_single_attempt() {
    let server = MockServer::start().await;
    Mock::given(path("/governance/api/v1/grants"))
        .respond_with(too_many_requests())
        .mount(&server)
        .await;

    let http = client_for(&server, 0);
    let err = http.get("/governance/api/v1/grants", &[]).await.unwrap_err();

    assert!(matches!(err, FetcherError::RateLimitExceeded { attempts: 1 }));
    assert_eq!(hits(&server, "/governance/api/v1/grants").await, 1);
}

#[tokio::test]
async fn test_server_error_is_not_retried() {
    let server = MockServer::start().await;
    Mock::given(path("/governance/api/v1/campaigns"))
        .respond_with(ResponseTemplate::new(500).set_body_string("upstream exploded"))
        .expect(1)
        .mount(&server)
        .await;

    let http = client_for(&server, 5);
    let err = http.get("/governance/api/v1/campaigns", &[]).await.unwrap_err();

    match err {
        FetcherError::HttpError { status, body } => {
            assert_eq!(status, 500);
            assert_eq!(body, "upstream exploded");
        }
        other => panic!("Expected HttpError, got {other:?}"),
    }
}

#[tokio::test]
async fn test_execute_returns_error_statuses_as_values() {
    let server = MockServer::start().await;
    Mock::given(path("/governance/api/v1/delegates"))
        .respond_with(ResponseTemplate::new(404).set_body_string("not found"))
        .mount(&server)
        .await;

    let http = client_for(&server, 5);
    let raw = http.execute("/governance/api/v1/delegates", &[]).await.unwrap();

    assert_eq!(raw.status.as_u16(), 404);
    assert_eq!(raw.body, "not found");
}

#[tokio::test]
async fn test_bearer_credential_is_sent() {
    let server = MockServer::start().await;
    Mock::given(path("/governance/api/v1/reviews"))
        .and(header("authorization", format!("Bearer {TOKEN}").as_str()))
        .and(header("accept", "application/json"))
        .respond_with(json_page(json!([])))
        .expect(1)
        .mount(&server)
        .await;

    let http = client_for(&server, 0);
    assert!(http.get("/governance/api/v1/reviews", &[]).await.is_ok());
}

#[tokio::test]
async fn test_invalid_json_is_a_parse_error() {
    let server = MockServer::start().await;
    Mock::given(path("/governance/api/v1/collections"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>oops</html>"))
        .mount(&server)
        .await;

    let http = client_for(&server, 0);
    let err = http.get("/governance/api/v1/collections", &[]).await.unwrap_err();
    assert!(matches!(err, FetcherError::ParseError(_)));
}

#[tokio::test]
async fn test_empty_success_body_is_null() {
    let server = MockServer::start().await;
    Mock::given(path("/governance/api/v1/collections"))
        .respond_with(ResponseTemplate::new(204))
        .mount(&server)
        .await;

    let http = client_for(&server, 0);
    let response = http.get("/governance/api/v1/collections", &[]).await.unwrap();
    assert!(response.body.is_null());
}

#[tokio::test]
async fn test_connection_failure_is_a_network_error() {
    // Unpooled server so that dropping it actually closes the listener
    let server = MockServer::builder().start().await;
    let http = client_for(&server, 3);
    drop(server);

    let err = http.get("/governance/api/v1/labels", &[]).await.unwrap_err();
    assert!(matches!(err, FetcherError::NetworkError(_)));
}

#[tokio::test]
async fn test_pre_request_delay_applies_to_every_request() {
    let server = MockServer::start().await;
    Mock::given(path("/governance/api/v1/labels"))
        .respond_with(json_page(json!([])))
        .expect(2)
        .mount(&server)
        .await;

    let http = delayed_client(&server, Duration::from_millis(200), 0);
    let start = Instant::now();
    http.get("/governance/api/v1/labels", &[]).await.unwrap();
    http.get("/governance/api/v1/labels", &[]).await.unwrap();

    assert!(start.elapsed() >= Duration::from_millis(400));
}

#[tokio::test]
async fn test_pre_request_delay_applies_again_on_retry() {
    let server = MockServer::start().await;
    Mock::given(path("/governance/api/v1/reviews"))
        .respond_with(too_many_requests())
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(path("/governance/api/v1/reviews"))
        .respond_with(json_page(json!([{"id": "r1"}])))
        .mount(&server)
        .await;

    let http = delayed_client(&server, Duration::from_millis(200), 1);
    let start = Instant::now();
    let response = http.get("/governance/api/v1/reviews", &[]).await.unwrap();

    assert_eq!(response.body, json!([{"id": "r1"}]));
    assert_eq!(hits(&server, "/governance/api/v1/reviews").await, 2);
    assert!(start.elapsed() >= Duration::from_millis(400));
}
