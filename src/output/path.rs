//! Artifact path layout
//!
//! Every run writes under its own timestamped directory:
//!
//! ```text
//! {root}/{run-stamp}/{key}.json
//! {root}/{run-stamp}/resources/{TYPE}-{ID}/{query}.json
//! {root}/{run-stamp}/manifest.json
//! ```

use chrono::{DateTime, Utc};
use std::path::{Path, PathBuf};

use crate::downloader::job::{JobTarget, ResourceQuery};
use crate::Resource;

/// File name of the run manifest
pub const MANIFEST_FILE: &str = "manifest.json";

/// Sub-directory holding per-resource artifacts
pub const RESOURCES_DIR: &str = "resources";

/// Resolves artifact paths inside one run directory
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactLayout {
    run_dir: PathBuf,
}

impl ArtifactLayout {
    /// Layout rooted at an existing or future run directory
    pub fn new(run_dir: impl Into<PathBuf>) -> Self {
        Self {
            run_dir: run_dir.into(),
        }
    }

    /// Layout for a fresh run under `root`, stamped with the current time
    pub fn for_new_run(root: impl AsRef<Path>) -> Self {
        Self::new(root.as_ref().join(run_stamp(Utc::now())))
    }

    /// Run directory
    pub fn run_dir(&self) -> &Path {
        &self.run_dir
    }

    /// Artifact path of a static endpoint
    pub fn static_path(&self, key: &str) -> PathBuf {
        self.run_dir.join(format!("{}.json", sanitize_key(key)))
    }

    /// Artifact path of one query on one resource
    pub fn resource_path(&self, resource: &Resource, query: ResourceQuery) -> PathBuf {
        self.run_dir
            .join(RESOURCES_DIR)
            .join(resource.artifact_key())
            .join(format!("{}.json", query.key()))
    }

    /// Artifact path for a job target
    pub fn path_for(&self, target: &JobTarget) -> PathBuf {
        match target {
            JobTarget::Static { key } => self.static_path(key),
            JobTarget::Resource { resource, query } => self.resource_path(resource, *query),
        }
    }

    /// Manifest path
    pub fn manifest_path(&self) -> PathBuf {
        self.run_dir.join(MANIFEST_FILE)
    }
}

/// Directory name for a run started at `at`, e.g. `20240115T093000Z`
pub fn run_stamp(at: DateTime<Utc>) -> String {
    at.format("%Y%m%dT%H%M%SZ").to_string()
}

/// Make an endpoint key safe to use as a file name
///
/// Replaces `/`, `\`, `:` with `_` and `..` with `__`.
fn sanitize_key(key: &str) -> String {
    key.replace("..", "__").replace(['/', '\\', ':'], "_")
}
