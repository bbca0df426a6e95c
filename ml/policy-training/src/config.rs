//! Training and run configuration.

use std::path::{Path, PathBuf};

use policy_dataset::{AssemblyConfig, SplitRatio};
use policy_models::{DecoderConfig, DecoderSource, PredictorConfig};
use policy_types::AngleRange;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{Result, TrainingError};

/// Configuration for a training run.
///
/// # Example
///
/// ```
/// use policy_training::TrainingConfig;
///
/// let config = TrainingConfig::default();
/// assert_eq!(config.epochs, 100);
/// assert_eq!(config.batch_size, 5);
/// assert_eq!(config.val_batch_size, 10_000);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainingConfig {
    /// Number of training epochs.
    pub epochs: usize,

    /// Training batch size.
    pub batch_size: usize,

    /// Adam learning rate.
    pub learning_rate: f64,

    /// Adam weight decay (0.0 = disabled).
    pub weight_decay: f32,

    /// Threads collating batches (0 = training thread).
    pub num_workers: usize,

    /// Validation batch size.
    pub val_batch_size: usize,

    /// Fraction of samples used for training.
    pub split_ratio: f64,

    /// Random seed for splitting, shuffling and initialization.
    pub seed: Option<u64>,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self::new(100)
    }
}

impl TrainingConfig {
    /// Creates a new training config with the given epochs.
    #[must_use]
    pub const fn new(epochs: usize) -> Self {
        Self {
            epochs,
            batch_size: 5,
            learning_rate: 1e-3,
            weight_decay: 0.0,
            num_workers: 0,
            val_batch_size: 10_000,
            split_ratio: 0.7,
            seed: None,
        }
    }

    /// Sets the batch size.
    #[must_use]
    pub const fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    /// Sets the learning rate.
    #[must_use]
    pub const fn with_learning_rate(mut self, learning_rate: f64) -> Self {
        self.learning_rate = learning_rate;
        self
    }

    /// Sets the number of collation threads.
    #[must_use]
    pub const fn with_num_workers(mut self, num_workers: usize) -> Self {
        self.num_workers = num_workers;
        self
    }

    /// Sets the random seed.
    #[must_use]
    pub const fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Train/validation split ratio.
    ///
    /// # Errors
    ///
    /// Returns [`TrainingError::Dataset`] unless the ratio is in `(0, 1)`.
    pub fn split(&self) -> Result<SplitRatio> {
        Ok(SplitRatio::try_new(self.split_ratio)?)
    }

    /// Checks the configuration before any data is touched.
    ///
    /// # Errors
    ///
    /// Returns [`TrainingError::InvalidConfig`] naming the first bad field.
    pub fn validate(&self) -> Result<()> {
        if self.epochs == 0 {
            return Err(TrainingError::invalid_config("epochs must be > 0"));
        }
        if self.batch_size == 0 || self.val_batch_size == 0 {
            return Err(TrainingError::invalid_config("batch sizes must be > 0"));
        }
        if !(self.learning_rate.is_finite() && self.learning_rate > 0.0) {
            return Err(TrainingError::invalid_config(format!(
                "learning rate must be positive, got {}",
                self.learning_rate
            )));
        }
        if self.weight_decay < 0.0 {
            return Err(TrainingError::invalid_config("weight decay must be >= 0"));
        }
        if !(self.split_ratio > 0.0 && self.split_ratio < 1.0) {
            return Err(TrainingError::invalid_config(format!(
                "split ratio must be in (0, 1), got {}",
                self.split_ratio
            )));
        }
        Ok(())
    }
}

/// Filesystem roots of a deployment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicyPaths {
    /// Trained behaviour (decoder) models.
    pub behaviour_root: PathBuf,

    /// Simulation logs holding episode files.
    pub gibson_root: PathBuf,

    /// Trained policies.
    pub policy_root: PathBuf,
}

impl PolicyPaths {
    /// Creates the path set.
    #[must_use]
    pub fn new(
        behaviour_root: impl Into<PathBuf>,
        gibson_root: impl Into<PathBuf>,
        policy_root: impl Into<PathBuf>,
    ) -> Self {
        Self {
            behaviour_root: behaviour_root.into(),
            gibson_root: gibson_root.into(),
            policy_root: policy_root.into(),
        }
    }

    /// All three roots under one directory.
    #[must_use]
    pub fn under(root: impl AsRef<Path>) -> Self {
        let root = root.as_ref();
        Self::new(
            root.join("behaviour"),
            root.join("gibson"),
            root.join("policies"),
        )
    }

    /// Episode directory of an experiment: `<gibson>/log/<g_name>/mujoco_latents`.
    #[must_use]
    pub fn episode_dir(&self, g_name: &str) -> PathBuf {
        self.gibson_root
            .join("log")
            .join(g_name)
            .join("mujoco_latents")
    }

    /// Decoder snapshot location.
    #[must_use]
    pub fn decoder_source(&self, vae_name: &str, model_index: i64) -> DecoderSource {
        DecoderSource::new(&self.behaviour_root, vae_name, model_index)
    }

    /// Output directory of a policy: `<policy_root>/<policy_name>`.
    #[must_use]
    pub fn run_dir(&self, policy_name: &str) -> PathBuf {
        self.policy_root.join(policy_name)
    }
}

impl Default for PolicyPaths {
    fn default() -> Self {
        Self::under("data")
    }
}

/// Compute backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    /// CPU backend.
    #[default]
    #[value(name = "ndarray")]
    NdArray,

    /// GPU backend (requires the `backend-wgpu` feature).
    Wgpu,
}

/// Whether a run trains or only evaluates a saved policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunMode {
    /// Train and checkpoint on improvement.
    #[default]
    Train,

    /// Evaluate the saved policy over the whole dataset.
    Test,
}

/// Everything that defines a run. Saved as `arguments.json`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunConfig {
    /// Decoder model name.
    pub vae_name: String,

    /// Decoder snapshot index. Must be positive.
    pub model_index: i64,

    /// Decoder architecture.
    pub decoder: DecoderConfig,

    /// Joint-angle bounds of the decoder's training domain.
    pub angles: AngleRange,

    /// Perception experiment name.
    pub g_name: String,

    /// Perception latent width.
    pub g_latent: usize,

    /// Predictor hidden units.
    pub predictor_hidden: usize,

    /// Policy name; names the run directory.
    pub policy_name: String,

    /// Dataset assembly.
    pub assembly: AssemblyConfig,

    /// Optimization.
    pub training: TrainingConfig,

    /// Filesystem roots.
    pub paths: PolicyPaths,

    /// Compute backend.
    pub backend: BackendKind,

    /// Train or test.
    pub mode: RunMode,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            vae_name: "mse_fc_v1".to_string(),
            model_index: -1,
            decoder: DecoderConfig::default(),
            angles: AngleRange::default(),
            g_name: "rgb_test".to_string(),
            g_latent: 10,
            predictor_hidden: 128,
            policy_name: "example".to_string(),
            assembly: AssemblyConfig::default(),
            training: TrainingConfig::default(),
            paths: PolicyPaths::default(),
            backend: BackendKind::default(),
            mode: RunMode::default(),
        }
    }
}

impl RunConfig {
    /// Predictor shape implied by the camera mode and decoder.
    #[must_use]
    pub fn predictor_config(&self) -> PredictorConfig {
        PredictorConfig::new(
            self.g_latent + self.assembly.camera_mode.extra_inputs(),
            self.decoder.latent_dim,
        )
        .with_hidden(self.predictor_hidden)
    }

    /// Episode directory of this run.
    #[must_use]
    pub fn episode_dir(&self) -> PathBuf {
        self.paths.episode_dir(&self.g_name)
    }

    /// Decoder snapshot of this run.
    #[must_use]
    pub fn decoder_source(&self) -> DecoderSource {
        self.paths.decoder_source(&self.vae_name, self.model_index)
    }

    /// Output directory of this run.
    #[must_use]
    pub fn run_dir(&self) -> PathBuf {
        self.paths.run_dir(&self.policy_name)
    }

    /// Checks every part of the configuration.
    ///
    /// # Errors
    ///
    /// Returns [`TrainingError::Model`] for a non-positive model index or a
    /// bad decoder shape, and [`TrainingError::InvalidConfig`] otherwise.
    pub fn validate(&self) -> Result<()> {
        self.decoder_source().checkpoint_path()?;
        self.decoder.validate()?;
        self.predictor_config().validate()?;
        self.training.validate()?;
        if self.policy_name.is_empty() {
            return Err(TrainingError::invalid_config("policy name is empty"));
        }
        if self.assembly.debug_samples == 0 {
            return Err(TrainingError::invalid_config("debug sample count must be > 0"));
        }
        Ok(())
    }

    /// Writes `arguments.json` into `dir`, creating it if needed.
    ///
    /// # Errors
    ///
    /// Returns [`TrainingError::Artifact`] if the file cannot be written.
    pub fn save_arguments(&self, dir: impl AsRef<Path>) -> Result<PathBuf> {
        let dir = dir.as_ref();
        std::fs::create_dir_all(dir).map_err(|e| TrainingError::artifact(dir, e))?;
        let path = dir.join("arguments.json");
        let json = serde_json::to_string_pretty(self).map_err(|e| TrainingError::artifact(&path, e))?;
        std::fs::write(&path, json).map_err(|e| TrainingError::artifact(&path, e))?;
        debug!(path = %path.display(), "saved run arguments");
        Ok(path)
    }

    /// Reads a previously saved `arguments.json`.
    ///
    /// # Errors
    ///
    /// Returns [`TrainingError::Artifact`] if the file is missing or invalid.
    pub fn load_arguments(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|e| TrainingError::artifact(path, e))?;
        serde_json::from_str(&json).map_err(|e| TrainingError::artifact(path, e))
    }
}
