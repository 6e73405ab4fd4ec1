//! Full runs through the extractor with artifacts written to disk

use serde_json::{json, Value};
use std::sync::Arc;
use tempfile::TempDir;
use wiremock::matchers::{path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use iga_extractor::downloader::{Extractor, JobScheduler, Manifest, ResourceQuery, StaticEndpoint};
use iga_extractor::output::{ArtifactLayout, JsonArtifactWriter};
use iga_extractor::ResourceType;

use super::support::{client_for, json_page, json_page_with_next};

fn read_json(path: std::path::PathBuf) -> Value {
    serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap()
}

async fn mount_empty_resource_queries(server: &MockServer, filter: &str) {
    for query in ResourceQuery::ALL {
        Mock::given(path(query.path()))
            .and(query_param("filter", filter))
            .respond_with(json_page(json!([])))
            .expect(1)
            .mount(server)
            .await;
    }
}

#[tokio::test]
async fn test_static_endpoints_and_single_group() {
    let server = MockServer::start().await;

    Mock::given(path("/governance/api/v1/staticA"))
        .respond_with(json_page(json!([{"a": 1}])))
        .mount(&server)
        .await;
    Mock::given(path("/governance/api/v1/staticB"))
        .and(query_param("after", "p2"))
        .respond_with(json_page(json!({"data": [{"b": 2}]})))
        .mount(&server)
        .await;
    Mock::given(path("/governance/api/v1/staticB"))
        .respond_with(json_page_with_next(
            &server,
            "/governance/api/v1/staticB",
            "p2",
            json!([{"b": 1}]),
        ))
        .mount(&server)
        .await;
    Mock::given(path("/api/v1/apps"))
        .respond_with(json_page(json!([])))
        .expect(0)
        .mount(&server)
        .await;
    Mock::given(path("/api/v1/groups"))
        .respond_with(json_page(json!([{"id": "00g1"}])))
        .mount(&server)
        .await;
    mount_empty_resource_queries(&server, "resource eq \"GROUP:00g1\"").await;

    let scheduler = JobScheduler::new(Arc::new(client_for(&server, 0)), 4);
    let extractor = Extractor::new(scheduler)
        .with_static_endpoints(vec![
            StaticEndpoint::new("staticA", "/governance/api/v1/staticA"),
            StaticEndpoint::new("staticB", "/governance/api/v1/staticB"),
        ])
        .with_resource_types(vec![ResourceType::Group]);

    let dir = TempDir::new().unwrap();
    let layout = ArtifactLayout::new(dir.path());
    let writer = Arc::new(JsonArtifactWriter::new(layout.clone()));
    let manifest = extractor.run(writer).await.unwrap();

    assert_eq!(manifest.count("staticA"), Some(1));
    assert_eq!(manifest.count("staticB"), Some(2));
    for query in ResourceQuery::ALL {
        assert_eq!(manifest.total(query), 0);
    }
    assert_eq!(manifest.error_count(), 0);
    assert_eq!(manifest.resources.succeeded, 4);
    assert_eq!(manifest.resources.discovered.get(&ResourceType::Group), Some(&1));
    assert!(manifest.resources.discovered.get(&ResourceType::Application).is_none());

    assert_eq!(read_json(layout.static_path("staticB")), json!([{"b": 1}, {"b": 2}]));
    let grants = dir.path().join("resources/GROUP-00g1/grants.json");
    assert_eq!(read_json(grants), json!([]));

    let on_disk: Manifest = serde_json::from_value(read_json(layout.manifest_path())).unwrap();
    assert_eq!(on_disk, manifest);
}

#[tokio::test]
async fn test_failures_are_recorded_and_run_completes() {
    let server = MockServer::start().await;

    Mock::given(path("/governance/api/v1/reviews"))
        .respond_with(ResponseTemplate::new(403).set_body_string("forbidden"))
        .mount(&server)
        .await;
    Mock::given(path("/governance/api/v1/labels"))
        .respond_with(json_page(json!([{"id": "lbl1"}])))
        .mount(&server)
        .await;
    Mock::given(path("/api/v1/apps"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;
    Mock::given(path("/api/v1/groups"))
        .respond_with(json_page(json!([{"id": "00g1"}])))
        .mount(&server)
        .await;
    Mock::given(path(ResourceQuery::Grants.path()))
        .respond_with(ResponseTemplate::new(429).insert_header("retry-after", "0"))
        .mount(&server)
        .await;
    for query in [
        ResourceQuery::Entitlements,
        ResourceQuery::EntitlementValues,
        ResourceQuery::ResourceOwners,
    ] {
        Mock::given(path(query.path()))
            .respond_with(json_page(json!({"data": [{"id": "x"}]})))
            .mount(&server)
            .await;
    }

    let scheduler = JobScheduler::new(Arc::new(client_for(&server, 1)), 2);
    let extractor = Extractor::new(scheduler).with_static_endpoints(vec![
        StaticEndpoint::new("reviews", "/governance/api/v1/reviews"),
        StaticEndpoint::new("labels", "/governance/api/v1/labels"),
    ]);

    let dir = TempDir::new().unwrap();
    let writer = Arc::new(JsonArtifactWriter::new(ArtifactLayout::new(dir.path())));
    let manifest = extractor.run(writer).await.unwrap();

    assert_eq!(manifest.count("labels"), Some(1));
    assert_eq!(manifest.count("reviews"), Some(0));
    assert!(manifest.entries["reviews"].error.as_deref().unwrap().contains("403"));
    assert!(manifest.discovery[&ResourceType::Application].error.is_some());

    assert_eq!(manifest.total(ResourceQuery::Entitlements), 1);
    assert_eq!(manifest.total(ResourceQuery::Grants), 0);
    assert_eq!(manifest.resources.errors.len(), 1);
    assert_eq!(manifest.resources.errors[0].resource, "GROUP:00g1");
    assert_eq!(manifest.resources.errors[0].query, ResourceQuery::Grants);

    // reviews, degraded apps discovery and the grants job
    assert_eq!(manifest.error_count(), 3);
    assert!(!dir.path().join("reviews.json").exists());
    assert!(dir.path().join("manifest.json").exists());
}
