//! Bounded-concurrency job scheduler
//!
//! Runs every job's pagination loop with at most `concurrency` loops in
//! flight. A job's failure is captured in its [`JobOutcome`] and never
//! cancels or delays its siblings. Outcomes are handed to the caller one at a
//! time, in completion order.

use futures::stream::{self, Stream, StreamExt};
use indicatif::ProgressBar;
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{error, info, Instrument};

use crate::downloader::job::Job;
use crate::fetcher::{FetcherResult, IgaHttpClient, PaginationHelper};
use crate::metrics;
use crate::Record;

/// Terminal outcome of one job: its records or its error, never both
#[derive(Debug)]
pub struct JobOutcome {
    /// The job that ran
    pub job: Job,
    /// Concatenated records of every page, or the first error
    pub result: FetcherResult<Vec<Record>>,
    /// Time spent paginating
    pub elapsed: Duration,
}

impl JobOutcome {
    /// Whether the job produced a result set
    pub fn is_success(&self) -> bool {
        self.result.is_ok()
    }

    /// Records captured, `None` on failure
    pub fn record_count(&self) -> Option<usize> {
        self.result.as_ref().ok().map(Vec::len)
    }
}

/// Counts for one scheduler wave
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScheduleSummary {
    /// Jobs submitted
    pub total: usize,
    /// Jobs that returned records
    pub succeeded: usize,
    /// Jobs that failed
    pub failed: usize,
}

impl ScheduleSummary {
    /// Empty summary for a wave of `total` jobs
    pub fn new(total: usize) -> Self {
        Self {
            total,
            ..Default::default()
        }
    }

    /// Count one finished job
    pub fn record(&mut self, outcome: &JobOutcome) {
        if outcome.is_success() {
            self.succeeded += 1;
        } else {
            self.failed += 1;
        }
    }
}

/// Executes fetch jobs with a concurrency ceiling
#[derive(Clone)]
pub struct JobScheduler {
    http_client: Arc<IgaHttpClient>,
    concurrency: usize,
    page_size: Option<u32>,
    progress: Option<ProgressBar>,
}

impl JobScheduler {
    /// Create a scheduler; a concurrency of 0 is treated as 1
    pub fn new(http_client: Arc<IgaHttpClient>, concurrency: usize) -> Self {
        Self {
            http_client,
            concurrency: concurrency.max(1),
            page_size: None,
            progress: None,
        }
    }

    /// Send `limit=<page_size>` on every page request
    pub fn with_page_size(mut self, page_size: Option<u32>) -> Self {
        self.page_size = page_size;
        self
    }

    /// Advance `progress` once per finished job
    pub fn with_progress(mut self, progress: ProgressBar) -> Self {
        self.progress = Some(progress);
        self
    }

    /// Concurrency ceiling
    pub fn concurrency(&self) -> usize {
        self.concurrency
    }

    /// Shared transport
    pub fn http_client(&self) -> &Arc<IgaHttpClient> {
        &self.http_client
    }

    /// Page size sent with requests
    pub fn page_size(&self) -> Option<u32> {
        self.page_size
    }

    /// Outcomes of `jobs` in completion order, at most `concurrency` in flight
    ///
    /// Jobs only make progress while the stream is polled.
    pub fn outcomes(&self, jobs: Vec<Job>) -> impl Stream<Item = JobOutcome> + '_ {
        if let Some(progress) = &self.progress {
            progress.inc_length(jobs.len() as u64);
        }
        info!(
            "Processing {} jobs with concurrency {}",
            jobs.len(),
            self.concurrency
        );

        stream::iter(jobs)
            .map(move |job| self.execute(job))
            .buffer_unordered(self.concurrency)
    }

    /// Run `jobs`, calling `on_complete` with each outcome as it finishes
    pub async fn run<F>(&self, jobs: Vec<Job>, mut on_complete: F) -> ScheduleSummary
    where
        F: FnMut(JobOutcome),
    {
        let mut summary = ScheduleSummary::new(jobs.len());
        let mut outcomes = std::pin::pin!(self.outcomes(jobs));

        while let Some(outcome) = outcomes.next().await {
            summary.record(&outcome);
            on_complete(outcome);
        }

        summary
    }

    /// Run `jobs` and collect every outcome
    pub async fn run_collect(&self, jobs: Vec<Job>) -> Vec<JobOutcome> {
        let mut outcomes = Vec::with_capacity(jobs.len());
        self.run(jobs, |outcome| outcomes.push(outcome)).await;
        outcomes
    }

    /// Paginate one job to completion
    pub async fn execute(&self, job: Job) -> JobOutcome {
        let span = tracing::info_span!("job", label = %job.label(), path = %job.path);
        let started = Instant::now();

        let result = PaginationHelper::fetch_all(
            &self.http_client,
            &job.path,
            &job.params,
            self.page_size,
        )
        .instrument(span.clone())
        .await;

        let elapsed = started.elapsed();
        span.in_scope(|| match &result {
            Ok(records) => info!(
                records = records.len(),
                duration_ms = elapsed.as_millis() as u64,
                "Job completed"
            ),
            Err(e) => error!(
                error = %e,
                duration_ms = elapsed.as_millis() as u64,
                "Job failed"
            ),
        });
        metrics::record_job_outcome(result.is_ok());
        if let Some(progress) = &self.progress {
            progress.inc(1);
        }

        JobOutcome {
            job,
            result,
            elapsed,
        }
    }
}

impl fmt::Debug for JobScheduler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JobScheduler")
            .field("base_url", &self.http_client.base_url())
            .field("concurrency", &self.concurrency)
            .field("page_size", &self.page_size)
            .finish()
    }
}
