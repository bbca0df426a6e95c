//! Value types for perception-policy training.
//!
//! This crate holds the plain data shared by the dataset, model, and
//! training crates:
//!
//! - [`CameraParams`] - Orbit-camera distance, azimuth, elevation
//! - [`ChannelRange`] / [`CameraStats`] - Global min-max normalization
//! - [`AngleRange`] - Decoder joint-angle bounds for unnormalization
//! - [`Pose`] - End-effector position and orientation
//!
//! # Layer 0 Crate
//!
//! No burn dependency. It can be used by data tools that never touch a
//! tensor.
//!
//! # Example
//!
//! ```
//! use policy_types::{CameraParams, CameraStats};
//!
//! let stats = CameraStats::from_channels(&[1.0, 2.0], &[0.0, 90.0], &[10.0, 20.0]).unwrap();
//! let cam = stats.normalize(CameraParams::new(2.0, 0.0, 15.0));
//! assert_eq!(cam.to_array(), [1.0, 0.0, 0.5]);
//! ```

#![cfg_attr(not(test), deny(clippy::unwrap_used, clippy::expect_used))]
#![warn(missing_docs)]
#![warn(clippy::all)]

mod camera;
mod error;
mod joint;
mod pose;
mod range;

pub use camera::{CameraParams, CameraStats};
pub use joint::AngleRange;
pub use pose::Pose;
pub use range::ChannelRange;

pub use error::{Result, TypesError};
