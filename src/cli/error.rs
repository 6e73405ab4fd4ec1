//! CLI error types and conversions

use crate::downloader::DownloadError;
use crate::output::OutputError;

/// CLI errors
#[derive(Debug, thiserror::Error)]
pub enum CliError {
    /// Download error
    #[error("download error: {0}")]
    DownloadError(#[from] DownloadError),

    /// Output error
    #[error("output error: {0}")]
    OutputError(#[from] OutputError),

    /// Configuration error
    #[error("configuration error: {0}")]
    ConfigurationError(String),
}
