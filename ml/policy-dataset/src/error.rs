//! Error types for policy-dataset crate.

use std::path::{Path, PathBuf};

use policy_types::TypesError;
use thiserror::Error;

/// Errors that can occur while assembling a policy dataset.
#[derive(Debug, Error)]
pub enum DatasetError {
    /// Episode directory or file does not exist.
    #[error("episode not found: {}", .0.display())]
    EpisodeNotFound(PathBuf),

    /// Episode file could not be parsed or its arrays disagree.
    #[error("malformed episode {}: {reason}", path.display())]
    MalformedEpisode {
        /// Offending file.
        path: PathBuf,
        /// What was wrong with it.
        reason: String,
    },

    /// A camera channel has `min == max` across the assembled set.
    #[error("degenerate normalization range: {0}")]
    DegenerateRange(#[source] TypesError),

    /// A camera channel holds `NaN` or an infinite value.
    #[error("non-finite value in {0}")]
    NonFiniteCamera(String),

    /// Any other invalid value reported by `policy-types`.
    #[error("invalid value: {0}")]
    InvalidValue(#[source] TypesError),

    /// Dataset has no samples.
    #[error("dataset is empty")]
    EmptyDataset,

    /// Dataset is too small for the requested split.
    #[error("insufficient samples: {available} available, split needs at least {required}")]
    InsufficientSamples {
        /// Samples available.
        available: usize,
        /// Samples required.
        required: usize,
    },

    /// Invalid split ratio.
    #[error("invalid split ratio: {0} (must be in (0, 1))")]
    InvalidSplitRatio(f64),

    /// Sample rows disagree in width.
    #[error("shape mismatch: expected {expected}, got {actual}")]
    ShapeMismatch {
        /// Expected row width.
        expected: usize,
        /// Actual row width.
        actual: usize,
    },

    /// Index outside the dataset.
    #[error("sample index {index} out of bounds for dataset of {len}")]
    IndexOutOfBounds {
        /// Requested index.
        index: usize,
        /// Dataset length.
        len: usize,
    },

    /// Batch worker pool could not be created.
    #[error("worker pool error: {0}")]
    WorkerPool(String),

    /// IO error.
    #[error("IO error at {}: {reason}", path.display())]
    Io {
        /// Path being accessed.
        path: PathBuf,
        /// Underlying error message.
        reason: String,
    },
}

impl DatasetError {
    /// Creates a malformed episode error.
    #[must_use]
    pub fn malformed(path: impl AsRef<Path>, reason: impl Into<String>) -> Self {
        Self::MalformedEpisode {
            path: path.as_ref().to_path_buf(),
            reason: reason.into(),
        }
    }

    /// Creates an IO error tagged with the path being accessed.
    #[must_use]
    pub fn io(path: impl AsRef<Path>, err: &std::io::Error) -> Self {
        Self::Io {
            path: path.as_ref().to_path_buf(),
            reason: err.to_string(),
        }
    }

    /// Creates an invalid split ratio error.
    #[must_use]
    pub const fn invalid_split_ratio(ratio: f64) -> Self {
        Self::InvalidSplitRatio(ratio)
    }
}

impl From<TypesError> for DatasetError {
    fn from(err: TypesError) -> Self {
        match err {
            TypesError::DegenerateRange { .. } => Self::DegenerateRange(err),
            TypesError::NonFinite(channel) => Self::NonFiniteCamera(channel),
            TypesError::EmptyRange(_) => Self::EmptyDataset,
            other => Self::InvalidValue(other),
        }
    }
}

/// Result type for policy-dataset operations.
pub type Result<T> = std::result::Result<T, DatasetError>;
