//! Job scheduler: failure isolation and the concurrency ceiling

use serde_json::json;
use std::sync::Arc;
use std::time::{Duration, Instant};
use wiremock::matchers::path;
use wiremock::{Mock, MockServer};

use iga_extractor::downloader::job::static_jobs;
use iga_extractor::downloader::{JobScheduler, JobTarget, StaticEndpoint};
use iga_extractor::fetcher::FetcherError;

use super::support::{client_for, json_page, too_many_requests};

fn target_key(target: &JobTarget) -> &str {
    match target {
        JobTarget::Static { key } => key,
        JobTarget::Resource { .. } => panic!("Expected static job"),
    }
}

#[tokio::test]
async fn test_exhausted_job_does_not_affect_sibling() {
    let server = MockServer::start().await;
    Mock::given(path("/limited"))
        .respond_with(too_many_requests())
        .mount(&server)
        .await;
    Mock::given(path("/healthy"))
        .respond_with(json_page(json!([{"id": 1}, {"id": 2}])))
        .mount(&server)
        .await;

    let scheduler = JobScheduler::new(Arc::new(client_for(&server, 2)), 2);
    let jobs = static_jobs(&[
        StaticEndpoint::new("limited", "/limited"),
        StaticEndpoint::new("healthy", "/healthy"),
    ]);

    let mut outcomes = scheduler.run_collect(jobs).await;
    outcomes.sort_by(|a, b| target_key(&a.job.target).cmp(target_key(&b.job.target)));

    assert_eq!(outcomes.len(), 2);
    assert_eq!(target_key(&outcomes[0].job.target), "healthy");
    assert_eq!(outcomes[0].record_count(), Some(2));
    assert!(matches!(
        outcomes[1].result,
        Err(FetcherError::RateLimitExceeded { attempts: 3 })
    ));
}

#[tokio::test]
async fn test_every_job_reports_exactly_once() {
    let server = MockServer::start().await;
    Mock::given(path("/ok"))
        .respond_with(json_page(json!([])))
        .mount(&server)
        .await;

    let scheduler = JobScheduler::new(Arc::new(client_for(&server, 0)), 3);
    let endpoints: Vec<_> = (0..10)
        .map(|i| StaticEndpoint::new(format!("job{i}"), "/ok"))
        .collect();

    let mut seen = Vec::new();
    let summary = scheduler
        .run(static_jobs(&endpoints), |outcome| {
            seen.push(target_key(&outcome.job.target).to_string())
        })
        .await;

    assert_eq!(summary.total, 10);
    assert_eq!(summary.succeeded, 10);
    assert_eq!(summary.failed, 0);
    seen.sort();
    seen.dedup();
    assert_eq!(seen.len(), 10);
}

#[tokio::test]
async fn test_concurrency_ceiling_bounds_parallelism() {
    let server = MockServer::start().await;
    Mock::given(path("/slow"))
        .respond_with(json_page(json!([])).set_delay(Duration::from_millis(200)))
        .mount(&server)
        .await;

    let scheduler = JobScheduler::new(Arc::new(client_for(&server, 0)), 2);
    let endpoints: Vec<_> = (0..6)
        .map(|i| StaticEndpoint::new(format!("slow{i}"), "/slow"))
        .collect();

    let started = Instant::now();
    let summary = scheduler.run(static_jobs(&endpoints), |_| {}).await;

    assert_eq!(summary.succeeded, 6);
    // Six 200ms jobs two at a time need at least three rounds
    assert!(started.elapsed() >= Duration::from_millis(600));
}

#[tokio::test]
async fn test_huge_retry_after_is_capped_and_isolated() {
    let server = MockServer::start().await;
    // Delayed so the sibling's request is already served when the gate closes
    Mock::given(path("/limited"))
        .respond_with(
            wiremock::ResponseTemplate::new(429)
                .insert_header("retry-after", "18446744073709551615")
                .set_delay(Duration::from_millis(200)),
        )
        .mount(&server)
        .await;
    Mock::given(path("/healthy"))
        .respond_with(json_page(json!([{"id": 1}])))
        .mount(&server)
        .await;

    let http = Arc::new(client_for(&server, 0));
    let scheduler = JobScheduler::new(http.clone(), 2);
    let started = tokio::time::Instant::now();
    let mut outcomes = scheduler
        .run_collect(static_jobs(&[
            StaticEndpoint::new("limited", "/limited"),
            StaticEndpoint::new("healthy", "/healthy"),
        ]))
        .await;
    outcomes.sort_by(|a, b| target_key(&a.job.target).cmp(target_key(&b.job.target)));

    assert_eq!(outcomes.len(), 2);
    assert_eq!(target_key(&outcomes[0].job.target), "healthy");
    assert_eq!(outcomes[0].record_count(), Some(1));
    assert!(matches!(
        outcomes[1].result,
        Err(FetcherError::RateLimitExceeded { attempts: 1 })
    ));

    let cap = Duration::from_millis(iga_extractor::downloader::config::MAX_RATE_LIMIT_WAIT_MS);
    let paused_until = http.rate_gate().paused_until().unwrap();
    assert!(paused_until <= started + cap + Duration::from_secs(5));
}
