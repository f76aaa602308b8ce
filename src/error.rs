//! Error types for canonry.
//!
//! All errors in canonry are strongly typed using thiserror.
//! This enables pattern matching on specific error conditions
//! and provides clear error messages.

use std::path::PathBuf;

use thiserror::Error;

use crate::graph::{BatchId, CanaryDiff};

pub use crate::graph::StorageError;

/// Validation errors that occur during input or configuration validation.
#[allow(missing_docs)]
#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("Candidate name cannot be empty")]
    EmptyCandidateName,

    #[error("Required field '{field}' is missing")]
    MissingField {
        field: String,
    },

    #[error("Candidate name '{name}' is empty after normalization")]
    EmptyNormalizedName {
        name: String,
    },

    #[error("Threshold {name}={value} for '{entity_type}' is out of range [0, 100]")]
    ThresholdOutOfRange {
        entity_type: String,
        name: &'static str,
        value: f64,
    },

    #[error("Thresholds for '{entity_type}' are inverted: review_low ({review_low}) > high ({high})")]
    InvertedThresholds {
        entity_type: String,
        high: f64,
        review_low: f64,
    },

    #[error("Invalid configuration: {reason}")]
    InvalidConfig {
        reason: String,
    },

    #[error("Canonical entity '{name}' not found in {entity_type}/{namespace}")]
    UnknownCanonical {
        entity_type: String,
        namespace: String,
        name: String,
    },

    #[error("Canonical name '{name}' already exists in {entity_type}/{namespace}")]
    DuplicateCanonical {
        entity_type: String,
        namespace: String,
        name: String,
    },
}

/// Errors raised on the Graph Writer commit path.
#[allow(missing_docs)]
#[derive(Debug, Error)]
pub enum GraphError {
    #[error("Refusing to commit: unacknowledged UNSAFE batches {}", format_ids(.batch_ids))]
    UnacknowledgedUnsafe {
        batch_ids: Vec<BatchId>,
    },

    #[error("Canary '{canary}' failed before commit: value {value}, expected {expected}")]
    CanaryPrecheckFailed {
        canary: String,
        value: u64,
        expected: String,
    },

    #[error("Batch {batch_id} is UNSAFE: {} canary mismatch(es)", .diffs.len())]
    CanaryViolation {
        batch_id: BatchId,
        diffs: Vec<CanaryDiff>,
    },

    #[error("Unknown batch: {0}")]
    UnknownBatch(BatchId),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),
}

fn format_ids(ids: &[BatchId]) -> String {
    ids.iter().map(ToString::to_string).collect::<Vec<_>>().join(", ")
}

/// Errors raised by the review ledger and its persisted state.
#[allow(missing_docs)]
#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("Ledger I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to encode ledger entry: {message}")]
    Encode {
        message: String,
    },

    #[error("Pending review queue at {path} is unreadable: {message}")]
    CorruptQueue {
        path: PathBuf,
        message: String,
    },
}

/// Errors raised by the file consolidator.
#[allow(missing_docs)]
#[derive(Debug, Error)]
pub enum ConsolidationError {
    #[error("Not a directory: {0}")]
    NotADirectory(PathBuf),

    #[error("Source and destination resolve to the same directory: {0}")]
    SameDirectory(PathBuf),

    #[error("Destination {destination} is inside source {source_dir}")]
    NestedDestination {
        source_dir: PathBuf,
        destination: PathBuf,
    },

    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Directory walk failed: {message}")]
    Walk {
        message: String,
    },
}

/// Top-level error type for canonry.
///
/// This enum encompasses all possible errors that can occur
/// when using canonry.
#[allow(missing_docs)]
#[derive(Debug, Error)]
pub enum CanonryError {
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("Graph error: {0}")]
    Graph(#[from] GraphError),

    #[error("Ledger error: {0}")]
    Ledger(#[from] LedgerError),

    #[error("Consolidation error: {0}")]
    Consolidation(#[from] ConsolidationError),

    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Serialization error: {message}")]
    Serialization {
        message: String,
    },

    #[error("Internal error: {message}")]
    Internal {
        message: String,
    },
}

impl From<StorageError> for CanonryError {
    fn from(err: StorageError) -> Self {
        Self::Graph(GraphError::Storage(err))
    }
}

impl CanonryError {
    /// Creates an internal error.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Creates an I/O error tagged with the path it occurred on.
    #[must_use]
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Creates a serialization error.
    #[must_use]
    pub fn serialization(message: impl std::fmt::Display) -> Self {
        Self::Serialization {
            message: message.to_string(),
        }
    }

    /// Returns true if this is a validation error.
    #[must_use]
    pub const fn is_validation(&self) -> bool {
        matches!(self, Self::Validation(_))
    }

    /// Returns true if this error comes from the graph commit path.
    #[must_use]
    pub const fn is_graph(&self) -> bool {
        matches!(self, Self::Graph(_))
    }

    /// Returns true if the writer is (or just became) UNSAFE.
    #[must_use]
    pub const fn is_unsafe_state(&self) -> bool {
        matches!(
            self,
            Self::Graph(GraphError::UnacknowledgedUnsafe { .. } | GraphError::CanaryViolation { .. })
        )
    }

    /// Returns true if this is an internal error.
    #[must_use]
    pub const fn is_internal(&self) -> bool {
        matches!(self, Self::Internal { .. })
    }

    /// Returns true if this error is retryable.
    ///
    /// UNSAFE states need a human acknowledgement, never a retry.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        match self {
            Self::Graph(GraphError::Storage(e)) => {
                matches!(e, StorageError::ConnectionError(_) | StorageError::BackendError(_))
            }
            Self::Io { .. } | Self::Ledger(LedgerError::Io { .. }) => true,
            _ => false,
        }
    }
}

/// Result type alias for canonry operations.
pub type CanonryResult<T> = Result<T, CanonryError>;
