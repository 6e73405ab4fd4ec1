//! JSON artifact writer

use serde::Serialize;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use super::path::ArtifactLayout;
use super::{ArtifactSink, OutputError, OutputResult};
use crate::downloader::job::JobTarget;
use crate::downloader::manifest::Manifest;
use crate::Record;

const DEFAULT_BUFFER_SIZE: usize = 64 * 1024; // 64KB buffer

/// Writes each result set as a pretty-printed JSON array
#[derive(Debug, Clone)]
pub struct JsonArtifactWriter {
    layout: ArtifactLayout,
}

impl JsonArtifactWriter {
    /// Writer over an explicit layout
    pub fn new(layout: ArtifactLayout) -> Self {
        Self { layout }
    }

    /// Create a fresh timestamped run directory under `root`
    ///
    /// # Errors
    /// Returns [`OutputError::IoError`] if the directory cannot be created
    pub fn for_new_run(root: impl AsRef<Path>) -> OutputResult<Self> {
        let layout = ArtifactLayout::for_new_run(root);
        std::fs::create_dir_all(layout.run_dir()).map_err(|e| {
            OutputError::IoError(format!(
                "Failed to create directory {}: {}",
                layout.run_dir().display(),
                e
            ))
        })?;
        info!("Writing artifacts to {}", layout.run_dir().display());
        Ok(Self::new(layout))
    }

    /// Path layout used by this writer
    pub fn layout(&self) -> &ArtifactLayout {
        &self.layout
    }

    fn write_json<T: Serialize + ?Sized>(&self, path: &Path, value: &T) -> OutputResult<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                OutputError::IoError(format!(
                    "Failed to create directory {}: {}",
                    parent.display(),
                    e
                ))
            })?;
        }

        let file = File::create(path).map_err(|e| {
            OutputError::IoError(format!("Failed to create file {}: {}", path.display(), e))
        })?;
        let mut writer = BufWriter::with_capacity(DEFAULT_BUFFER_SIZE, file);

        serde_json::to_writer_pretty(&mut writer, value).map_err(|e| {
            OutputError::SerializationError(format!(
                "Failed to serialize {}: {}",
                path.display(),
                e
            ))
        })?;
        writer
            .flush()
            .map_err(|e| OutputError::IoError(format!("Failed to flush {}: {}", path.display(), e)))?;

        Ok(())
    }
}

impl ArtifactSink for JsonArtifactWriter {
    fn write_records(&self, target: &JobTarget, records: &[Record]) -> OutputResult<PathBuf> {
        let path = self.layout.path_for(target);
        self.write_json(&path, records)?;
        debug!("Wrote {} records to {}", records.len(), path.display());
        Ok(path)
    }

    fn write_manifest(&self, manifest: &Manifest) -> OutputResult<PathBuf> {
        let path = self.layout.manifest_path();
        self.write_json(&path, manifest)?;
        info!("Manifest written to {}", path.display());
        Ok(path)
    }
}
