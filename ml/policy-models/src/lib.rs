//! Burn modules for perception-policy training.
//!
//! # Models
//!
//! - [`Predictor`] - Observation latent (plus camera) to action latent
//! - [`TrajectoryDecoder`] - Action latent to normalized joint trajectory
//! - [`FrozenDecoder`] - Read-only decoder handle used during training
//!
//! # Kinematics
//!
//! - [`KinematicChain`] - Modified DH chain evaluated with tensor ops, so the
//!   end-effector position is differentiable in the joint angles
//!
//! # Checkpoint Persistence
//!
//! Weights are saved with burn's recorders; the format follows the file
//! extension (`.bin` or `.json`).
//!
//! # Backend Support
//!
//! Everything is generic over burn backends. Tests run on
//! `Autodiff<NdArray<f32>>`.
//!
//! # Example
//!
//! ```
//! use burn::backend::NdArray;
//! use burn::tensor::Tensor;
//! use policy_models::{DecoderConfig, FrozenDecoder, KinematicChain, TrajectoryDecoder};
//!
//! type B = NdArray<f32>;
//! let device = Default::default();
//!
//! let decoder = FrozenDecoder::new(TrajectoryDecoder::<B>::new(DecoderConfig::new(5, 7, 24), &device));
//! let trajectory = decoder.decode(Tensor::zeros([2, 5], &device));
//! assert_eq!(trajectory.dims(), [2, 7, 24]);
//!
//! let joints = trajectory.slice([0..2, 0..7, 23..24]).reshape([2, 7]);
//! let positions = KinematicChain::franka_panda().end_effector_positions(joints).unwrap();
//! assert_eq!(positions.dims(), [2, 3]);
//! ```

#![cfg_attr(not(test), deny(clippy::unwrap_used, clippy::expect_used))]
#![warn(missing_docs)]
#![warn(clippy::all)]

mod checkpoint;
mod decoder;
mod error;
mod kinematics;
mod predictor;

pub use checkpoint::{CheckpointFormat, load_checkpoint, save_checkpoint};
pub use decoder::{ConvHead, DecoderConfig, DecoderSource, FrozenDecoder, TrajectoryDecoder};
pub use kinematics::{DhLink, KinematicChain};
pub use predictor::{Predictor, PredictorConfig};

pub use error::{ModelError, Result};

/// Prelude for convenient imports.
pub mod prelude {
    pub use super::{
        CheckpointFormat, DecoderConfig, DecoderSource, FrozenDecoder, KinematicChain, ModelError,
        Predictor, PredictorConfig, TrajectoryDecoder, load_checkpoint, save_checkpoint,
    };
}
