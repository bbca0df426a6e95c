//! Error types for policy-training crate.

use std::path::{Path, PathBuf};

use policy_dataset::DatasetError;
use policy_models::ModelError;
use thiserror::Error;

/// Errors that can occur during training.
#[derive(Debug, Error)]
pub enum TrainingError {
    /// Invalid training configuration.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// Dataset assembly, splitting or batching failed.
    #[error("dataset error: {0}")]
    Dataset(#[from] DatasetError),

    /// Model construction, loading or evaluation failed.
    #[error("model error: {0}")]
    Model(#[source] ModelError),

    /// Writing the predictor checkpoint failed.
    #[error("checkpoint error: {0}")]
    Checkpoint(#[source] ModelError),

    /// A report or run artifact could not be written.
    #[error("failed to write {}: {reason}", path.display())]
    Artifact {
        /// Artifact path.
        path: PathBuf,
        /// Underlying error message.
        reason: String,
    },
}

impl TrainingError {
    /// Creates an invalid configuration error.
    #[must_use]
    pub fn invalid_config(reason: impl Into<String>) -> Self {
        Self::InvalidConfig(reason.into())
    }

    /// Creates an artifact error tagged with its path.
    #[must_use]
    pub fn artifact(path: impl AsRef<Path>, reason: impl ToString) -> Self {
        Self::Artifact {
            path: path.as_ref().to_path_buf(),
            reason: reason.to_string(),
        }
    }
}

impl From<ModelError> for TrainingError {
    fn from(err: ModelError) -> Self {
        match err {
            ModelError::SaveCheckpoint { .. } => Self::Checkpoint(err),
            other => Self::Model(other),
        }
    }
}

/// Result type for policy-training operations.
pub type Result<T> = std::result::Result<T, TrainingError>;
