//! Error types for chunk acquisition and reference resolution.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

use crate::promise::PromiseAbandoned;

/// Result type for coordinator operations.
pub type CoordinatorResult<T> = Result<T, CoordinatorError>;

/// Errors that can occur while acquiring chunks or resolving references.
///
/// `ChunkNotFound` and `ManifestEntryUnparsable` are recoverable and are
/// absorbed (logged) by the coordinator. `InvariantViolation` marks a
/// programming error and halts the operation that hit it.
#[derive(Debug, Error)]
pub enum CoordinatorError {
    /// The chunk identifier does not match any registered package/version.
    #[error("no registered package for chunk identifier [{chunk_id}]")]
    ChunkNotFound { chunk_id: String },

    /// A manifest entry carries a chunk identifier that cannot be parsed.
    #[error("manifest entry [{chunk_id}] (chunk {chunk_number}) has an unparsable chunk identifier")]
    ManifestEntryUnparsable { chunk_id: String, chunk_number: i32 },

    /// An internal invariant does not hold.
    #[error("invariant violation: {0}")]
    InvariantViolation(String),

    /// The promise being awaited was dropped before completion.
    #[error(transparent)]
    Abandoned(#[from] PromiseAbandoned),

    /// Invalid configuration.
    #[error("invalid configuration: {0}")]
    Config(String),

    /// Filesystem operation failed.
    #[error("I/O error on {}: {source}", path.display())]
    Io { path: PathBuf, source: io::Error },

    /// No Tokio runtime is available to drive acquisitions.
    #[error("no Tokio runtime available: {0}")]
    NoRuntime(String),
}

impl CoordinatorError {
    /// Build an invariant violation error.
    pub fn invariant(message: impl Into<String>) -> Self {
        Self::InvariantViolation(message.into())
    }

    /// Whether the error is a tolerated condition rather than a failure.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::ChunkNotFound { .. } | Self::ManifestEntryUnparsable { .. }
        )
    }
}
