//! Dataset assembly for perception-policy training.
//!
//! Turns a directory of simulated episode files into `(input, target)`
//! pairs ready for batching:
//!
//! - [`EpisodeRecord`] - One episode file, six aligned arrays
//! - [`assemble`] - Concatenate, normalize camera channels, build inputs
//! - [`PolicyDataset`] - Indexed `(input, target)` store
//! - [`split_dataset`] - Seeded train/validation split
//! - [`BatchLoader`] - Per-epoch shuffling and worker-parallel collation
//!
//! # Layer 0 Crate
//!
//! No burn dependency. Batches are plain host buffers.
//!
//! # Example
//!
//! ```
//! use policy_dataset::{AssemblyConfig, CameraMode, EpisodeRecord, assemble_episodes};
//!
//! let episode = EpisodeRecord {
//!     latents: vec![vec![vec![0.1, 0.2]], vec![vec![0.3, 0.4]]],
//!     distances: vec![1.0, 2.0],
//!     azimuths: vec![0.0, 90.0],
//!     elevations: vec![-10.0, 10.0],
//!     targets: vec![[0.4, 0.0, 0.2], [0.5, 0.1, 0.3]],
//! };
//!
//! let data = assemble_episodes(&[episode], &AssemblyConfig::new(CameraMode::Variable)).unwrap();
//! assert_eq!(data.len(), 2);
//! assert_eq!(data.input(1), Some(&[0.3, 0.4, 1.0, 1.0, 1.0][..]));
//! ```

#![cfg_attr(not(test), deny(clippy::unwrap_used, clippy::expect_used))]
#![warn(missing_docs)]
#![warn(clippy::all)]

mod assemble;
mod batch;
mod episode;
mod error;
mod sample;
mod splits;

pub use assemble::{
    AssemblyConfig, CameraMatch, CameraMode, EpisodeColumns, LatentStep, assemble,
    assemble_episodes, debug_indices, filter_fixed_camera, subsample_debug, with_camera_inputs,
};
pub use batch::{Batch, BatchLoader};
pub use episode::{EpisodeRecord, list_episodes, load_episodes};
pub use sample::{PolicyDataset, TrainingSample};
pub use splits::{SplitRatio, split_dataset, split_indices};

pub use error::{DatasetError, Result};

/// Prelude for convenient imports.
pub mod prelude {
    pub use super::{
        AssemblyConfig, Batch, BatchLoader, CameraMatch, CameraMode, DatasetError, EpisodeRecord,
        LatentStep, PolicyDataset, SplitRatio, TrainingSample, assemble, split_dataset,
    };
}
