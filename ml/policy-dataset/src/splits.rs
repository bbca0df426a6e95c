//! Train/validation splitting.

use rand::SeedableRng;
use rand::seq::SliceRandom;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

use crate::error::{DatasetError, Result};
use crate::sample::PolicyDataset;

/// Ratio for splitting datasets into train/validation sets.
///
/// The ratio specifies the proportion of data to use for training.
/// The remainder goes to validation.
///
/// # Example
///
/// ```
/// use policy_dataset::SplitRatio;
///
/// let ratio = SplitRatio::try_new(0.8).unwrap();
/// assert_eq!(ratio.split_point(10), 8);
/// assert_eq!(SplitRatio::default(), SplitRatio::SEVENTY_THIRTY);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SplitRatio {
    train: f64,
}

impl SplitRatio {
    /// 70% train, 30% validation.
    pub const SEVENTY_THIRTY: Self = Self { train: 0.7 };

    /// Creates a split ratio.
    ///
    /// # Errors
    ///
    /// Returns [`DatasetError::InvalidSplitRatio`] unless `train` is in `(0, 1)`.
    pub fn try_new(train: f64) -> Result<Self> {
        if train > 0.0 && train < 1.0 {
            Ok(Self { train })
        } else {
            Err(DatasetError::invalid_split_ratio(train))
        }
    }

    /// Returns the training ratio.
    #[must_use]
    pub const fn train_ratio(&self) -> f64 {
        self.train
    }

    /// Returns the validation ratio.
    #[must_use]
    pub fn val_ratio(&self) -> f64 {
        1.0 - self.train
    }

    /// Number of training samples for a dataset of `total`: `floor(total * ratio)`.
    #[must_use]
    #[allow(
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss,
        clippy::cast_precision_loss
    )]
    pub fn split_point(&self, total: usize) -> usize {
        (self.train * total as f64).floor() as usize
    }
}

impl Default for SplitRatio {
    fn default() -> Self {
        Self::SEVENTY_THIRTY
    }
}

/// Shuffled `(train, val)` index partition of `0..len`.
///
/// The first `floor(len * ratio)` shuffled indices are training samples.
///
/// # Errors
///
/// Returns [`DatasetError::InsufficientSamples`] if either side would be empty.
pub fn split_indices(
    len: usize,
    ratio: SplitRatio,
    seed: Option<u64>,
) -> Result<(Vec<usize>, Vec<usize>)> {
    let split = ratio.split_point(len);
    if split == 0 || split == len {
        return Err(DatasetError::InsufficientSamples {
            available: len,
            required: min_samples(ratio),
        });
    }

    let mut indices: Vec<usize> = (0..len).collect();
    let mut rng = seed.map_or_else(ChaCha8Rng::from_entropy, ChaCha8Rng::seed_from_u64);
    indices.shuffle(&mut rng);

    let val = indices.split_off(split);
    Ok((indices, val))
}

/// Smallest dataset for which both partitions are non-empty.
fn min_samples(ratio: SplitRatio) -> usize {
    (2..)
        .find(|&n| {
            let split = ratio.split_point(n);
            split > 0 && split < n
        })
        .unwrap_or(2)
}

/// Splits a dataset into training and validation sets.
///
/// # Errors
///
/// Returns [`DatasetError::InsufficientSamples`] if either side would be empty.
///
/// # Example
///
/// ```
/// use policy_dataset::{PolicyDataset, SplitRatio, TrainingSample, split_dataset};
///
/// let data = PolicyDataset::from_samples(
///     (0..10).map(|i| TrainingSample::new(vec![i as f32], [0.0; 3])),
/// )
/// .unwrap();
///
/// let (train, val) = split_dataset(&data, SplitRatio::SEVENTY_THIRTY, Some(42)).unwrap();
/// assert_eq!(train.len(), 7);
/// assert_eq!(val.len(), 3);
/// ```
pub fn split_dataset(
    dataset: &PolicyDataset,
    ratio: SplitRatio,
    seed: Option<u64>,
) -> Result<(PolicyDataset, PolicyDataset)> {
    let (train, val) = split_indices(dataset.len(), ratio, seed)?;
    Ok((dataset.select(&train)?, dataset.select(&val)?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sample::TrainingSample;

    #[test]
    fn split_ratio_try_new() {
        assert!(SplitRatio::try_new(0.5).is_ok());
        assert!(SplitRatio::try_new(0.0).is_err());
        assert!(SplitRatio::try_new(1.0).is_err());
        assert!(SplitRatio::try_new(-0.5).is_err());
        assert!(matches!(
            SplitRatio::try_new(1.5),
            Err(DatasetError::InvalidSplitRatio(_))
        ));
    }

    #[test]
    fn split_point_floors() {
        let ratio = SplitRatio::SEVENTY_THIRTY;
        assert_eq!(ratio.split_point(10), 7);
        assert_eq!(ratio.split_point(11), 7);
        assert_eq!(ratio.split_point(3), 2);
        assert_eq!(ratio.split_point(1), 0);
    }

    #[test]
    fn split_ratio_serialization() {
        let ratio = SplitRatio::try_new(0.75).unwrap();
        let json = serde_json::to_string(&ratio).unwrap();
        let parsed: SplitRatio = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, ratio);
    }

    #[test]
    fn split_indices_disjoint_and_complete() {
        let (train, val) = split_indices(100, SplitRatio::SEVENTY_THIRTY, Some(42)).unwrap();
        assert_eq!(train.len(), 70);
        assert_eq!(val.len(), 30);

        let mut all: Vec<usize> = train.iter().chain(&val).copied().collect();
        all.sort_unstable();
        assert_eq!(all, (0..100).collect::<Vec<_>>());
    }

    #[test]
    fn split_indices_reproducible() {
        let a = split_indices(50, SplitRatio::SEVENTY_THIRTY, Some(7)).unwrap();
        let b = split_indices(50, SplitRatio::SEVENTY_THIRTY, Some(7)).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn split_indices_too_small() {
        for len in [0, 1] {
            let err = split_indices(len, SplitRatio::SEVENTY_THIRTY, Some(1)).unwrap_err();
            assert!(matches!(
                err,
                DatasetError::InsufficientSamples { required: 2, .. }
            ));
        }
    }

    #[test]
    fn split_dataset_keeps_rows_intact() {
        let data = PolicyDataset::from_samples(
            (0..20).map(|i| TrainingSample::new(vec![i as f32, 1.0], [i as f32, 0.0, 0.0])),
        )
        .unwrap();
        let (train, val) = split_dataset(&data, SplitRatio::SEVENTY_THIRTY, Some(3)).unwrap();

        assert_eq!(train.len(), 14);
        assert_eq!(val.len(), 6);
        for (input, target) in train.iter().chain(val.iter()) {
            assert_eq!(input[0], target[0]);
        }
    }
}
