//! Artifact writers
//!
//! Every successful job's result set is persisted as one JSON document; the
//! run manifest is written last. Writers implement [`ArtifactSink`] so the
//! pipeline can be driven against the filesystem or an in-memory sink.

use std::path::PathBuf;

use crate::downloader::job::JobTarget;
use crate::downloader::manifest::Manifest;
use crate::Record;

pub mod json;
pub mod path;

pub use json::JsonArtifactWriter;
pub use path::ArtifactLayout;

/// Output writer errors
#[derive(Debug, thiserror::Error)]
pub enum OutputError {
    /// IO error
    #[error("IO error: {0}")]
    IoError(String),

    /// Serialization error
    #[error("serialization error: {0}")]
    SerializationError(String),
}

/// Result type for output operations
pub type OutputResult<T> = Result<T, OutputError>;

/// Destination for job result sets and the run manifest
pub trait ArtifactSink: Send + Sync {
    /// Persist the records of one job, returning where they went
    fn write_records(&self, target: &JobTarget, records: &[Record]) -> OutputResult<PathBuf>;

    /// Persist the run manifest
    fn write_manifest(&self, manifest: &Manifest) -> OutputResult<PathBuf>;
}
