//! CLI error type.

use std::fmt;
use std::io;
use std::path::PathBuf;

use pakfetch::CoordinatorError;

/// Errors surfaced by CLI commands.
#[derive(Debug)]
pub enum CliError {
    /// Invalid or unreadable configuration.
    Config(String),
    /// The CDN manifest could not be read or parsed.
    Manifest(String),
    /// Input is not a chunk identifier or DLC reference.
    InvalidChunkId(String),
    /// Filesystem operation failed.
    Io { path: PathBuf, source: io::Error },
    /// The async runtime could not be created.
    Runtime(String),
    /// Command output could not be rendered.
    Output(String),
    /// Some references could not be resolved.
    Resolve { failed: usize, total: usize },
    /// The coordinator reported an error.
    Coordinator(CoordinatorError),
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CliError::Config(msg) => write!(f, "Configuration error: {}", msg),
            CliError::Manifest(msg) => write!(f, "Manifest error: {}", msg),
            CliError::InvalidChunkId(input) => {
                write!(f, "'{}' is not a valid chunk identifier", input)
            }
            CliError::Io { path, source } => write!(f, "{}: {}", path.display(), source),
            CliError::Runtime(msg) => write!(f, "Failed to start async runtime: {}", msg),
            CliError::Output(msg) => write!(f, "Failed to render output: {}", msg),
            CliError::Resolve { failed, total } => {
                write!(f, "{} of {} references failed to resolve", failed, total)
            }
            CliError::Coordinator(e) => write!(f, "{}", e),
        }
    }
}

impl std::error::Error for CliError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            CliError::Io { source, .. } => Some(source),
            CliError::Coordinator(e) => Some(e),
            _ => None,
        }
    }
}

impl From<CoordinatorError> for CliError {
    fn from(e: CoordinatorError) -> Self {
        match e {
            CoordinatorError::Config(msg) => CliError::Config(msg),
            other => CliError::Coordinator(other),
        }
    }
}
