//! Run manifest: per-key outcomes and aggregate totals
//!
//! Created empty when the run starts, filled as jobs complete and serialized
//! once at the end as `manifest.json`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::downloader::job::ResourceQuery;
use crate::{Resource, ResourceType};

/// Outcome of one static job or one discovery query
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManifestEntry {
    /// Endpoint or resource-type key
    pub key: String,
    /// Records captured, 0 on failure
    pub count: u64,
    /// Error message when the job failed
    pub error: Option<String>,
}

impl ManifestEntry {
    fn from_result(key: impl Into<String>, result: Result<u64, String>) -> Self {
        let key = key.into();
        match result {
            Ok(count) => Self {
                key,
                count,
                error: None,
            },
            Err(error) => Self {
                key,
                count: 0,
                error: Some(error),
            },
        }
    }

    /// Whether the job succeeded
    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }
}

/// A failed per-resource query
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceError {
    /// `TYPE:ID` of the resource
    pub resource: String,
    /// Query that failed
    pub query: ResourceQuery,
    /// Error message
    pub error: String,
}

/// Aggregates over every per-resource job
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceSummary {
    /// Resources expanded into jobs, per type
    pub discovered: BTreeMap<ResourceType, u64>,
    /// Records captured per query type across all resources
    pub totals: BTreeMap<ResourceQuery, u64>,
    /// Successful per-resource jobs
    pub succeeded: u64,
    /// Failed per-resource jobs
    pub errors: Vec<ResourceError>,
}

impl Default for ResourceSummary {
    fn default() -> Self {
        Self {
            discovered: BTreeMap::new(),
            totals: ResourceQuery::ALL.iter().map(|query| (*query, 0)).collect(),
            succeeded: 0,
            errors: Vec::new(),
        }
    }
}

/// Summary of one extraction run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Manifest {
    /// Run start
    pub started_at: DateTime<Utc>,
    /// Run end, set by [`Manifest::finish`]
    pub finished_at: Option<DateTime<Utc>>,
    /// Upstream origin
    pub base_url: String,
    /// Static endpoint outcomes by key
    pub entries: BTreeMap<String, ManifestEntry>,
    /// Discovery outcomes by resource type
    pub discovery: BTreeMap<ResourceType, ManifestEntry>,
    /// Per-resource aggregates
    pub resources: ResourceSummary,
}

impl Manifest {
    /// Start an empty manifest
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            started_at: Utc::now(),
            finished_at: None,
            base_url: base_url.into(),
            entries: BTreeMap::new(),
            discovery: BTreeMap::new(),
            resources: ResourceSummary::default(),
        }
    }

    /// Record a static job outcome (record count or error message)
    pub fn record_static(&mut self, key: &str, result: Result<u64, String>) {
        self.entries
            .insert(key.to_string(), ManifestEntry::from_result(key, result));
    }

    /// Record a discovery query outcome
    pub fn record_discovery(&mut self, kind: ResourceType, result: Result<u64, String>) {
        self.discovery
            .insert(kind, ManifestEntry::from_result(kind.plural(), result));
    }

    /// Record how many resources of `kind` were expanded into jobs
    pub fn record_discovered(&mut self, kind: ResourceType, count: u64) {
        self.resources.discovered.insert(kind, count);
    }

    /// Record a per-resource job outcome
    pub fn record_resource(
        &mut self,
        resource: &Resource,
        query: ResourceQuery,
        result: Result<u64, String>,
    ) {
        match result {
            Ok(count) => {
                *self.resources.totals.entry(query).or_insert(0) += count;
                self.resources.succeeded += 1;
            }
            Err(error) => self.resources.errors.push(ResourceError {
                resource: resource.to_string(),
                query,
                error,
            }),
        }
    }

    /// Stamp the end time
    pub fn finish(&mut self) {
        self.finished_at = Some(Utc::now());
    }

    /// Record count of a static key, `None` if the key was never recorded
    pub fn count(&self, key: &str) -> Option<u64> {
        self.entries.get(key).map(|entry| entry.count)
    }

    /// Total records of `query` across all resources
    pub fn total(&self, query: ResourceQuery) -> u64 {
        self.resources.totals.get(&query).copied().unwrap_or(0)
    }

    /// Failed static jobs, failed resource jobs and degraded discovery queries
    pub fn error_count(&self) -> usize {
        self.entries.values().filter(|e| !e.is_success()).count()
            + self.discovery.values().filter(|e| !e.is_success()).count()
            + self.resources.errors.len()
    }

    /// Successful jobs, i.e. artifacts produced
    pub fn artifact_count(&self) -> u64 {
        self.entries.values().filter(|e| e.is_success()).count() as u64 + self.resources.succeeded
    }

    /// Wall-clock duration of the run, once finished
    pub fn elapsed_secs(&self) -> Option<f64> {
        self.finished_at
            .map(|end| (end - self.started_at).num_milliseconds() as f64 / 1000.0)
    }
}
