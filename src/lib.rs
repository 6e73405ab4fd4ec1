//! # IGA Extractor Library
//!
//! A rate-limited snapshot extractor for identity governance APIs. It
//! enumerates applications and groups, then fans out a fixed battery of
//! paginated read queries (global and per-resource) and persists every result
//! set as a discrete JSON artifact.
//!
//! ## Features
//!
//! - **Cursor Pagination**: Follows `link: <...>; rel="next"` headers until exhausted
//! - **Adaptive Throttling**: A shared rate gate driven by `x-rate-limit-*` headers
//! - **429 Handling**: Retry with `retry-after` / reset-aware backoff and jitter
//! - **Bounded Parallelism**: One concurrency ceiling across all fetch jobs
//! - **Failure Isolation**: A failed job is recorded in the manifest, never fatal
//!
//! ## Quick Start
//!
//! ```no_run
//! use iga_extractor::downloader::{ExtractConfig, Extractor};
//! use iga_extractor::output::json::JsonArtifactWriter;
//! use std::sync::Arc;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = ExtractConfig::new("https://example.okta.com", "00abc-token");
//! config.validate()?;
//!
//! let extractor = Extractor::from_config(&config)?;
//! let writer = Arc::new(JsonArtifactWriter::for_new_run(&config.output_dir)?);
//! let manifest = extractor.run(writer).await?;
//! println!("{} artifacts, {} errors", manifest.artifact_count(), manifest.error_count());
//! # Ok(())
//! # }
//! ```
//!
//! ## Architecture
//!
//! - [`downloader`] - Rate gate, job model, scheduler, discovery, manifest and run pipeline
//! - [`fetcher`] - HTTP transport, header parsing, page decoding and pagination
//! - [`output`] - JSON artifact layout and writers
//! - [`cli`] - Command-line surface and configuration loading
//! - [`metrics`] - Request and job counters

#![warn(missing_docs)]
#![warn(clippy::all)]

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// CLI command implementations
pub mod cli;

/// Extraction orchestration
pub mod downloader;

/// HTTP transport and pagination
pub mod fetcher;

/// Observability counters
pub mod metrics;

/// Artifact writers
pub mod output;

/// One upstream record, passed through without interpretation.
pub type Record = serde_json::Value;

/// Kind of parent resource discovered before the per-resource wave
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ResourceType {
    /// An application integration
    Application,
    /// A group
    Group,
}

impl ResourceType {
    /// Every resource type, in discovery order
    pub const ALL: [ResourceType; 2] = [ResourceType::Application, ResourceType::Group];

    /// Upper-case name used in filter expressions and artifact paths
    pub fn as_str(&self) -> &'static str {
        match self {
            ResourceType::Application => "APPLICATION",
            ResourceType::Group => "GROUP",
        }
    }

    /// Plural lowercase label used in logs and the manifest
    pub fn plural(&self) -> &'static str {
        match self {
            ResourceType::Application => "applications",
            ResourceType::Group => "groups",
        }
    }
}

impl fmt::Display for ResourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ResourceType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "app" | "apps" | "application" | "applications" => Ok(ResourceType::Application),
            "group" | "groups" => Ok(ResourceType::Group),
            _ => Err(format!(
                "Invalid resource type: {s}. Valid options: applications, groups"
            )),
        }
    }
}

/// A discovered parent resource
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Resource {
    /// Resource kind
    pub kind: ResourceType,
    /// Upstream identifier
    pub id: String,
}

impl Resource {
    /// Create a resource reference
    pub fn new(kind: ResourceType, id: impl Into<String>) -> Self {
        Self {
            kind,
            id: id.into(),
        }
    }

    /// Filter expression selecting this resource: `resource eq "TYPE:ID"`
    pub fn filter_expression(&self) -> String {
        format!("resource eq \"{}:{}\"", self.kind.as_str(), self.id)
    }

    /// Stable artifact directory name: `TYPE-ID`
    pub fn artifact_key(&self) -> String {
        format!("{}-{}", self.kind.as_str(), self.id.replace([':', '/', '\\'], "_"))
    }
}

impl fmt::Display for Resource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.kind.as_str(), self.id)
    }
}
