//! Training samples and the assembled dataset.

use serde::{Deserialize, Serialize};

use crate::error::{DatasetError, Result};

/// One `(input, target)` training pair.
///
/// # Example
///
/// ```
/// use policy_dataset::TrainingSample;
///
/// let sample = TrainingSample::new(vec![0.1, 0.2, 0.3], [0.4, 0.0, 0.1]);
/// assert_eq!(sample.input_dim(), 3);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainingSample {
    /// Latent, optionally followed by the three normalized camera scalars.
    pub input: Vec<f32>,

    /// Target end-effector position `[x, y, z]`.
    pub target: [f32; 3],
}

impl TrainingSample {
    /// Creates a new sample.
    #[must_use]
    pub const fn new(input: Vec<f32>, target: [f32; 3]) -> Self {
        Self { input, target }
    }

    /// Width of the input vector.
    #[must_use]
    pub fn input_dim(&self) -> usize {
        self.input.len()
    }
}

/// Row-major `(inputs, targets)` store with fixed input width.
///
/// Supports length queries and indexed retrieval. Rows are stored in one
/// flat buffer so batches can be sliced without per-sample allocation.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct PolicyDataset {
    inputs: Vec<f32>,
    targets: Vec<[f32; 3]>,
    input_dim: usize,
}

impl PolicyDataset {
    /// Creates an empty dataset with rows of width `input_dim`.
    #[must_use]
    pub const fn new(input_dim: usize) -> Self {
        Self {
            inputs: Vec::new(),
            targets: Vec::new(),
            input_dim,
        }
    }

    /// Builds a dataset from samples.
    ///
    /// # Errors
    ///
    /// Returns [`DatasetError::ShapeMismatch`] if samples differ in width.
    pub fn from_samples(samples: impl IntoIterator<Item = TrainingSample>) -> Result<Self> {
        let mut samples = samples.into_iter().peekable();
        let input_dim = samples.peek().map_or(0, TrainingSample::input_dim);
        let mut dataset = Self::new(input_dim);
        for sample in samples {
            dataset.push(&sample.input, sample.target)?;
        }
        Ok(dataset)
    }

    /// Appends one row.
    ///
    /// # Errors
    ///
    /// Returns [`DatasetError::ShapeMismatch`] if `input` has the wrong width.
    pub fn push(&mut self, input: &[f32], target: [f32; 3]) -> Result<()> {
        if input.len() != self.input_dim {
            return Err(DatasetError::ShapeMismatch {
                expected: self.input_dim,
                actual: input.len(),
            });
        }
        self.inputs.extend_from_slice(input);
        self.targets.push(target);
        Ok(())
    }

    /// Number of samples.
    #[must_use]
    pub fn len(&self) -> usize {
        self.targets.len()
    }

    /// Returns true if there are no samples.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.targets.is_empty()
    }

    /// Width of each input row.
    #[must_use]
    pub const fn input_dim(&self) -> usize {
        self.input_dim
    }

    /// Input row `index`, borrowed.
    #[must_use]
    pub fn input(&self, index: usize) -> Option<&[f32]> {
        let start = index.checked_mul(self.input_dim)?;
        if index >= self.len() {
            return None;
        }
        self.inputs.get(start..start + self.input_dim)
    }

    /// Target of sample `index`.
    #[must_use]
    pub fn target(&self, index: usize) -> Option<[f32; 3]> {
        self.targets.get(index).copied()
    }

    /// Owned sample `index`.
    #[must_use]
    pub fn get(&self, index: usize) -> Option<TrainingSample> {
        Some(TrainingSample::new(
            self.input(index)?.to_vec(),
            self.target(index)?,
        ))
    }

    /// Iterates over `(input, target)` rows.
    pub fn iter(&self) -> impl Iterator<Item = (&[f32], [f32; 3])> + '_ {
        self.inputs
            .chunks_exact(self.input_dim.max(1))
            .zip(self.targets.iter().copied())
    }

    /// New dataset holding the rows at `indices`, in that order.
    ///
    /// # Errors
    ///
    /// Returns [`DatasetError::IndexOutOfBounds`] for any invalid index.
    pub fn select(&self, indices: &[usize]) -> Result<Self> {
        let mut out = Self::new(self.input_dim);
        out.inputs.reserve(indices.len() * self.input_dim);
        out.targets.reserve(indices.len());
        for &index in indices {
            let (Some(input), Some(target)) = (self.input(index), self.target(index)) else {
                return Err(DatasetError::IndexOutOfBounds {
                    index,
                    len: self.len(),
                });
            };
            out.inputs.extend_from_slice(input);
            out.targets.push(target);
        }
        Ok(out)
    }
}
