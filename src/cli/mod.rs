//! CLI command implementations

pub mod error;
pub mod extract;

pub use error::CliError;
pub use extract::{Cli, OutputFormat};
