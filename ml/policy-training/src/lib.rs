//! Perception policy training.
//!
//! A [`Predictor`](policy_models::Predictor) maps a perception latent (plus
//! normalized camera parameters) to an action latent. The action latent is
//! decoded by a frozen trajectory decoder, the final joint configuration is
//! unnormalized and pushed through forward kinematics, and the resulting
//! end-effector position is regressed onto the target with a mean squared
//! error.
//!
//! # Components
//!
//! - [`RunConfig`] / [`TrainingConfig`] / [`PolicyPaths`] - run configuration
//! - [`PolicyPipeline`] - frozen decoder plus kinematic chain
//! - [`PolicyTrainer`] - epoch loop with best-so-far checkpointing
//! - [`TrainingMetrics`] - per-epoch losses, saved as `metrics.json`
//! - [`EpochReporter`] / [`JsonReporter`] / [`PngReporter`] - prediction
//!   scatters, latent histograms and loss curves
//! - [`run_policy`] - assemble, train or test, report
//!
//! # Example
//!
//! ```
//! use policy_training::{RunConfig, TrainingConfig};
//!
//! let config = RunConfig {
//!     model_index: 12,
//!     training: TrainingConfig::new(20).with_seed(7),
//!     ..RunConfig::default()
//! };
//! assert!(config.validate().is_ok());
//! assert!(config.run_dir().ends_with("example"));
//! ```

// Safety: Deny unwrap/expect in library code. Tests may use them (workspace warns).
#![cfg_attr(not(test), deny(clippy::unwrap_used, clippy::expect_used))]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod cli;
mod config;
mod error;
pub mod loss;
mod metrics;
mod pipeline;
mod plot;
mod report;
mod runner;
mod trainer;

/// Backend alias for training and evaluation (NdArray by default; WGPU if enabled).
#[cfg(feature = "backend-wgpu")]
pub type TrainBackend = burn::backend::Wgpu<f32>;
/// Backend alias for training and evaluation (NdArray by default; WGPU if enabled).
#[cfg(not(feature = "backend-wgpu"))]
pub type TrainBackend = burn::backend::NdArray<f32>;

pub use config::{BackendKind, PolicyPaths, RunConfig, RunMode, TrainingConfig};
pub use error::{Result, TrainingError};
pub use metrics::{EpochMetrics, TrainingMetrics};
pub use pipeline::PolicyPipeline;
pub use plot::{PngReporter, curves_image, histogram_image, scatter_image};
pub use report::{EpochReport, EpochReporter, JsonReporter, LatentStats, NullReporter, PositionSet};
pub use runner::{RunSummary, run_policy};
pub use trainer::{
    Evaluation, METRICS_FILE, MODEL_FILE, PolicyTrainer, TrainingOutcome, TrainingState, evaluate,
};

/// Prelude for convenient imports.
pub mod prelude {
    pub use super::{
        EpochMetrics, EpochReporter, JsonReporter, NullReporter, PngReporter, PolicyPaths,
        PolicyPipeline, PolicyTrainer, RunConfig, TrainingConfig, TrainingError, TrainingMetrics,
        run_policy,
    };
}
