//! Checkpoint persistence for model weights.

use std::path::{Path, PathBuf};

use burn::module::Module;
use burn::prelude::Backend;
use burn::record::{BinFileRecorder, FullPrecisionSettings, PrettyJsonFileRecorder, Recorder};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{ModelError, Result};

/// Supported checkpoint file formats.
///
/// # Example
///
/// ```
/// use policy_models::CheckpointFormat;
///
/// let format = CheckpointFormat::from_extension("bin");
/// assert_eq!(format, Some(CheckpointFormat::Binary));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum CheckpointFormat {
    /// Burn `BinFileRecorder`, full precision.
    #[default]
    Binary,

    /// Burn `PrettyJsonFileRecorder`, for inspection.
    Json,
}

impl CheckpointFormat {
    /// Determines format from file extension.
    ///
    /// - `.bin` -> Binary
    /// - `.json` -> Json
    /// - Other -> None
    #[must_use]
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_lowercase().as_str() {
            "bin" => Some(Self::Binary),
            "json" => Some(Self::Json),
            _ => None,
        }
    }

    /// Determines format from file path.
    #[must_use]
    pub fn from_path(path: &Path) -> Option<Self> {
        path.extension()
            .and_then(|ext| ext.to_str())
            .and_then(Self::from_extension)
    }

    /// Returns the default file extension for this format.
    #[must_use]
    pub const fn extension(&self) -> &'static str {
        match self {
            Self::Binary => "bin",
            Self::Json => "json",
        }
    }

    /// Returns the format name.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Binary => "binary",
            Self::Json => "json",
        }
    }
}

impl std::fmt::Display for CheckpointFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Saves model weights, choosing the format from the file extension.
///
/// # Errors
///
/// Returns [`ModelError::UnsupportedFormat`] for an unknown extension and
/// [`ModelError::SaveCheckpoint`] if writing fails.
///
/// # Example
///
/// ```ignore
/// use policy_models::save_checkpoint;
///
/// save_checkpoint(&predictor, run_dir.join("model.bin"))?;
/// ```
pub fn save_checkpoint<B, M>(model: &M, path: impl AsRef<Path>) -> Result<PathBuf>
where
    B: Backend,
    M: Module<B>,
{
    let path = path.as_ref();
    let format = CheckpointFormat::from_path(path)
        .ok_or_else(|| ModelError::unsupported_format(path.display().to_string()))?;
    let record = model.clone().into_record();
    let shown = path.display().to_string();

    match format {
        CheckpointFormat::Binary => BinFileRecorder::<FullPrecisionSettings>::new()
            .record(record, path.to_path_buf())
            .map_err(|e| ModelError::save_checkpoint(&shown, e.to_string()))?,
        CheckpointFormat::Json => PrettyJsonFileRecorder::<FullPrecisionSettings>::new()
            .record(record, path.to_path_buf())
            .map_err(|e| ModelError::save_checkpoint(&shown, e.to_string()))?,
    }

    debug!(path = %shown, %format, "saved checkpoint");
    Ok(path.to_path_buf())
}

/// Loads weights from `path` into `model`.
///
/// # Errors
///
/// - [`ModelError::CheckpointNotFound`] if the file doesn't exist
/// - [`ModelError::UnsupportedFormat`] if the extension is unknown
/// - [`ModelError::LoadCheckpoint`] if the record doesn't match the model
pub fn load_checkpoint<B, M>(model: M, path: impl AsRef<Path>, device: &B::Device) -> Result<M>
where
    B: Backend,
    M: Module<B>,
{
    let path = path.as_ref();
    let display = path.display().to_string();
    if !path.is_file() {
        return Err(ModelError::checkpoint_not_found(display));
    }

    let format =
        CheckpointFormat::from_path(path).ok_or_else(|| ModelError::unsupported_format(&display))?;

    let loaded = match format {
        CheckpointFormat::Binary => model
            .load_file(path, &BinFileRecorder::<FullPrecisionSettings>::new(), device)
            .map_err(|e| ModelError::load_checkpoint(&display, e.to_string()))?,
        CheckpointFormat::Json => model
            .load_file(path, &PrettyJsonFileRecorder::<FullPrecisionSettings>::new(), device)
            .map_err(|e| ModelError::load_checkpoint(&display, e.to_string()))?,
    };

    Ok(loaded)
}
