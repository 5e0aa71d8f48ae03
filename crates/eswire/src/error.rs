//! Error types for eswire.
//!
//! Transport failures, configuration problems and local store failures are
//! plain variants. Anything that means the cluster picture cannot be trusted
//! for a disk read is an [`InvariantViolation`], wrapped by [`Error::Invariant`].

use std::path::PathBuf;

use thiserror::Error;

/// Result type alias for eswire operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while migrating or extracting an index.
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration error (ESWIRE-001).
    #[error("[ESWIRE-001] Configuration error: {0}")]
    Config(String),

    /// IO error (ESWIRE-002).
    #[error("[ESWIRE-002] IO error: {0}")]
    Io(#[from] std::io::Error),

    /// YAML parsing error (ESWIRE-003).
    #[error("[ESWIRE-003] YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// HTTP transport error (ESWIRE-004).
    #[error("[ESWIRE-004] HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The cluster rejected or failed an administrative call (ESWIRE-005).
    #[error("[ESWIRE-005] Cluster error: {0}")]
    Cluster(String),

    /// Authentication against the cluster failed (ESWIRE-006).
    #[error("[ESWIRE-006] Authentication failed: {0}")]
    Authentication(String),

    /// A settlement poll ran out of attempts (ESWIRE-007).
    #[error("[ESWIRE-007] Timed out waiting for {operation} after {attempts} attempts")]
    Timeout {
        /// What was being waited for.
        operation: String,
        /// Number of polls performed.
        attempts: u32,
    },

    /// The cluster or disk state breaks a consistency invariant (ESWIRE-008).
    #[error("[ESWIRE-008] Invariant violated: {0}")]
    Invariant(#[from] InvariantViolation),

    /// Local segment store failure (ESWIRE-009).
    #[error("[ESWIRE-009] Segment store error: {0}")]
    Store(String),

    /// The run was cancelled before it finished (ESWIRE-010).
    #[error("[ESWIRE-010] Run cancelled")]
    Cancelled,
}

impl Error {
    /// Returns true when the error signals an unsafe cluster or disk state
    /// rather than an infrastructure failure.
    #[must_use]
    pub fn is_invariant_violation(&self) -> bool {
        matches!(self, Self::Invariant(_))
    }
}

impl From<tantivy::TantivyError> for Error {
    fn from(err: tantivy::TantivyError) -> Self {
        Self::Store(err.to_string())
    }
}

impl From<tantivy::directory::error::OpenDirectoryError> for Error {
    fn from(err: tantivy::directory::error::OpenDirectoryError) -> Self {
        Self::Store(err.to_string())
    }
}

/// Consistency violations detected before or while touching disk.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum InvariantViolation {
    /// A primary shard reported more than one segment.
    #[error("shard {shard} has more than one segment ({existing}, {extra})")]
    MultipleSegments {
        /// Shard id.
        shard: u32,
        /// Segment recorded first.
        existing: String,
        /// Segment that collided with it.
        extra: String,
    },

    /// Sum of segment document counts differs from the index statistics.
    #[error("segment document count sum {segments} != index document count {index}")]
    DocCountMismatch {
        /// Sum over all primary segments.
        segments: u64,
        /// Index-level total.
        index: u64,
    },

    /// A shard directory exists under more than one data root.
    #[error("shard {shard} found under more than one data root: {first:?} and {second:?}")]
    AmbiguousShardDirectory {
        /// Shard id.
        shard: u32,
        /// First path found.
        first: PathBuf,
        /// Second path found.
        second: PathBuf,
    },

    /// Shards of the segment map have no directory under any data root.
    #[error("missing local directories for shards {shards:?}")]
    MissingShardDirectories {
        /// Shard ids that did not resolve.
        shards: Vec<u32>,
    },
}
