//! Unit tests for CLI parsing and configuration resolution

use clap::Parser;
use std::time::Duration;

use iga_extractor::cli::{Cli, OutputFormat};
use iga_extractor::downloader::config::{
    DEFAULT_CONCURRENCY, DEFAULT_RATE_LIMIT_THRESHOLD, DEFAULT_REQUEST_DELAY_MS,
    DEFAULT_RETRY_JITTER_MS, MAX_RETRIES,
};
use iga_extractor::downloader::DownloadError;
use iga_extractor::ResourceType;

fn parse(args: &[&str]) -> Cli {
    let mut argv = vec!["iga-extractor"];
    argv.extend_from_slice(args);
    Cli::try_parse_from(argv).unwrap()
}

#[test]
fn test_defaults() {
    let cli = parse(&["--base-url", "https://example.okta.com", "--token", "t"]);
    let config = cli.to_config();

    assert_eq!(cli.output_format, OutputFormat::Human);
    assert!(!cli.no_progress);
    assert!(cli.metrics_addr.is_none());
    assert_eq!(config.output_dir, std::path::PathBuf::from("output"));
    assert_eq!(config.concurrency, DEFAULT_CONCURRENCY);
    assert_eq!(config.page_size, None);
    assert_eq!(config.resource_types, ResourceType::ALL.to_vec());
    assert_eq!(config.resource_limit(), None);
    assert_eq!(
        config.transport.request_delay,
        Duration::from_millis(DEFAULT_REQUEST_DELAY_MS)
    );
    assert_eq!(config.transport.rate_limit_threshold, DEFAULT_RATE_LIMIT_THRESHOLD);
    assert_eq!(config.transport.max_retries, MAX_RETRIES);
    assert_eq!(
        config.transport.retry_jitter,
        Duration::from_millis(DEFAULT_RETRY_JITTER_MS)
    );
}

#[test]
fn test_missing_token_fails_validation() {
    let cli = parse(&["--base-url", "https://example.okta.com", "--token", ""]);
    assert!(matches!(
        cli.to_config().validate(),
        Err(DownloadError::Configuration(msg)) if msg.contains("token")
    ));
}

#[test]
fn test_invalid_base_url_fails_validation() {
    let cli = parse(&["--base-url", "not a url", "--token", "t"]);
    assert!(matches!(
        cli.to_config().validate(),
        Err(DownloadError::Configuration(_))
    ));
}

#[test]
fn test_json_output_and_metrics_address() {
    let cli = parse(&[
        "--base-url",
        "https://example.okta.com",
        "--token",
        "t",
        "--output-format",
        "json",
        "--metrics-addr",
        "127.0.0.1:9000",
        "--no-progress",
    ]);
    assert_eq!(cli.output_format, OutputFormat::Json);
    assert_eq!(cli.metrics_addr, Some("127.0.0.1:9000".parse().unwrap()));
    assert!(cli.no_progress);
}
