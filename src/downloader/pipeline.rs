//! Run orchestration
//!
//! One run executes three phases in order, sharing a single scheduler and
//! therefore a single concurrency ceiling and rate gate:
//!
//! 1. the static wave, one job per global endpoint
//! 2. discovery of applications and groups
//! 3. the per-resource wave, every discovered resource × [`ResourceQuery`](job::ResourceQuery)
//!
//! Outcomes are consumed one at a time from the scheduler, so artifact writes
//! and manifest updates never race. Writes run on the blocking pool.

use futures::StreamExt;
use indicatif::ProgressBar;
use std::sync::Arc;
use tracing::{error, info};

use crate::downloader::config::ExtractConfig;
use crate::downloader::discovery::{self, DiscoveryEndpoints};
use crate::downloader::executor::{JobOutcome, JobScheduler, ScheduleSummary};
use crate::downloader::job::{self, Job, JobTarget, StaticEndpoint};
use crate::downloader::manifest::Manifest;
use crate::downloader::rate_limit::RateGate;
use crate::downloader::DownloadError;
use crate::fetcher::client::build_http_client;
use crate::fetcher::IgaHttpClient;
use crate::output::{ArtifactSink, OutputError};
use crate::{Record, ResourceType};

/// Drives a complete extraction run
#[derive(Debug, Clone)]
pub struct Extractor {
    scheduler: JobScheduler,
    static_endpoints: Vec<StaticEndpoint>,
    discovery_endpoints: DiscoveryEndpoints,
    resource_types: Vec<ResourceType>,
    resource_limit: Option<usize>,
}

impl Extractor {
    /// Extractor over an existing scheduler with the default endpoint catalog
    pub fn new(scheduler: JobScheduler) -> Self {
        Self {
            scheduler,
            static_endpoints: job::default_static_endpoints(),
            discovery_endpoints: DiscoveryEndpoints::default(),
            resource_types: ResourceType::ALL.to_vec(),
            resource_limit: None,
        }
    }

    /// Build the transport, rate gate and scheduler described by `config`
    ///
    /// # Errors
    /// - [`DownloadError::Configuration`] when `config` fails validation
    /// - [`DownloadError::Fetcher`] when the HTTP client cannot be built
    pub fn from_config(config: &ExtractConfig) -> Result<Self, DownloadError> {
        config.validate()?;

        let http_client = IgaHttpClient::new(
            build_http_client()?,
            config.base_url.trim(),
            config.token.clone(),
            Arc::new(RateGate::new()),
            config.transport.clone(),
        );
        let scheduler = JobScheduler::new(Arc::new(http_client), config.concurrency)
            .with_page_size(config.page_size);

        Ok(Self::new(scheduler)
            .with_resource_types(config.resource_types.clone())
            .with_resource_limit(config.resource_limit()))
    }

    /// Replace the static endpoint catalog
    pub fn with_static_endpoints(mut self, endpoints: Vec<StaticEndpoint>) -> Self {
        self.static_endpoints = endpoints;
        self
    }

    /// Replace the discovery listing paths
    pub fn with_discovery_endpoints(mut self, endpoints: DiscoveryEndpoints) -> Self {
        self.discovery_endpoints = endpoints;
        self
    }

    /// Restrict discovery and the per-resource wave to `types`
    pub fn with_resource_types(mut self, types: Vec<ResourceType>) -> Self {
        self.resource_types = types;
        self
    }

    /// Keep at most `limit` resources per type
    pub fn with_resource_limit(mut self, limit: Option<usize>) -> Self {
        self.resource_limit = limit;
        self
    }

    /// Advance `progress` as jobs finish
    pub fn with_progress(self, progress: ProgressBar) -> Self {
        Self {
            scheduler: self.scheduler.with_progress(progress),
            ..self
        }
    }

    /// Underlying scheduler
    pub fn scheduler(&self) -> &JobScheduler {
        &self.scheduler
    }

    /// Execute the run, writing every artifact and the manifest to `sink`
    ///
    /// Job failures and artifact write failures are recorded in the manifest
    /// and never abort the run.
    ///
    /// # Errors
    /// Returns [`DownloadError::Output`] only if the manifest itself cannot be written.
    pub async fn run(&self, sink: Arc<dyn ArtifactSink>) -> Result<Manifest, DownloadError> {
        let http_client = self.scheduler.http_client();
        let mut manifest = Manifest::new(http_client.base_url());

        info!(
            "Starting extraction from {} ({} static endpoints, types: {:?})",
            http_client.base_url(),
            self.static_endpoints.len(),
            self.resource_types
        );

        let static_summary = self
            .run_wave(job::static_jobs(&self.static_endpoints), &mut manifest, &sink)
            .await;
        info!(
            "Static wave finished: {} succeeded, {} failed",
            static_summary.succeeded, static_summary.failed
        );

        let report = discovery::discover(
            http_client,
            &self.discovery_endpoints,
            &self.resource_types,
            self.resource_limit,
            self.scheduler.page_size(),
        )
        .await;
        for outcome in &report.outcomes {
            let result = match &outcome.error {
                None => Ok(outcome.fetched as u64),
                Some(e) => Err(e.clone()),
            };
            manifest.record_discovery(outcome.kind, result);
            manifest.record_discovered(outcome.kind, outcome.resources.len() as u64);
        }

        let resources = report.resources();
        let resource_summary = self
            .run_wave(job::resource_jobs(&resources), &mut manifest, &sink)
            .await;
        info!(
            "Resource wave finished: {} resources, {} succeeded, {} failed",
            resources.len(),
            resource_summary.succeeded,
            resource_summary.failed
        );

        manifest.finish();
        let snapshot = manifest.clone();
        tokio::task::spawn_blocking(move || sink.write_manifest(&snapshot))
            .await
            .map_err(|e| OutputError::IoError(format!("manifest writer task failed: {e}")))??;

        info!(
            "Extraction complete: {} artifacts, {} errors",
            manifest.artifact_count(),
            manifest.error_count()
        );
        Ok(manifest)
    }

    /// Drain one scheduler wave into the manifest
    async fn run_wave(
        &self,
        jobs: Vec<Job>,
        manifest: &mut Manifest,
        sink: &Arc<dyn ArtifactSink>,
    ) -> ScheduleSummary {
        let mut summary = ScheduleSummary::new(jobs.len());
        let mut outcomes = std::pin::pin!(self.scheduler.outcomes(jobs));

        while let Some(outcome) = outcomes.next().await {
            summary.record(&outcome);
            record_outcome(manifest, sink, outcome).await;
        }

        summary
    }
}

/// Persist one outcome and fold it into the manifest
async fn record_outcome(manifest: &mut Manifest, sink: &Arc<dyn ArtifactSink>, outcome: JobOutcome) {
    let JobOutcome { job, result, .. } = outcome;

    let result = match result {
        Ok(records) => write_records(sink, &job, records).await.map_err(|e| {
            error!(job = %job.label(), error = %e, "Failed to write artifact");
            e.to_string()
        }),
        Err(e) => Err(e.to_string()),
    };

    match &job.target {
        JobTarget::Static { key } => manifest.record_static(key, result),
        JobTarget::Resource { resource, query } => {
            manifest.record_resource(resource, *query, result)
        }
    }
}

/// Write `records` on the blocking pool, returning how many were written
async fn write_records(
    sink: &Arc<dyn ArtifactSink>,
    job: &Job,
    records: Vec<Record>,
) -> Result<u64, OutputError> {
    let count = records.len() as u64;
    let sink = Arc::clone(sink);
    let target = job.target.clone();

    tokio::task::spawn_blocking(move || sink.write_records(&target, &records))
        .await
        .map_err(|e| OutputError::IoError(format!("artifact writer task failed: {e}")))??;
    Ok(count)
}
