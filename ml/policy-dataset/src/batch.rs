//! Host-side batch collation.
//!
//! Batches are gathered into flat row-major buffers on a rayon pool; the
//! caller turns each one into tensors and consumes them in order.

use rand::SeedableRng;
use rand::seq::SliceRandom;
use rand_chacha::ChaCha8Rng;
use rayon::prelude::*;
use rayon::{ThreadPool, ThreadPoolBuilder};
use tracing::debug;

use crate::error::{DatasetError, Result};
use crate::sample::PolicyDataset;

/// One collated batch.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Batch {
    /// Inputs, `[len * input_dim]` row-major.
    pub inputs: Vec<f32>,

    /// Targets, `[len * 3]` row-major.
    pub targets: Vec<f32>,

    /// Number of samples.
    pub len: usize,

    /// Width of each input row.
    pub input_dim: usize,
}

impl Batch {
    /// Gathers the rows at `indices` into a batch.
    ///
    /// # Errors
    ///
    /// Returns [`DatasetError::IndexOutOfBounds`] for any invalid index.
    pub fn collate(dataset: &PolicyDataset, indices: &[usize]) -> Result<Self> {
        let input_dim = dataset.input_dim();
        let mut inputs = Vec::with_capacity(indices.len() * input_dim);
        let mut targets = Vec::with_capacity(indices.len() * 3);
        for &index in indices {
            let (Some(input), Some(target)) = (dataset.input(index), dataset.target(index)) else {
                return Err(DatasetError::IndexOutOfBounds {
                    index,
                    len: dataset.len(),
                });
            };
            inputs.extend_from_slice(input);
            targets.extend_from_slice(&target);
        }
        Ok(Self {
            inputs,
            targets,
            len: indices.len(),
            input_dim,
        })
    }

    /// Returns true if the batch is empty.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.len == 0
    }
}

/// Splits a dataset into batches, optionally reshuffling every epoch.
pub struct BatchLoader {
    dataset: PolicyDataset,
    batch_size: usize,
    shuffle: bool,
    seed: Option<u64>,
    pool: Option<ThreadPool>,
    rng: ChaCha8Rng,
}

impl std::fmt::Debug for BatchLoader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BatchLoader")
            .field("samples", &self.dataset.len())
            .field("batch_size", &self.batch_size)
            .field("shuffle", &self.shuffle)
            .field("workers", &self.pool.as_ref().map(ThreadPool::current_num_threads))
            .finish_non_exhaustive()
    }
}

impl BatchLoader {
    /// Creates a loader collating on `num_workers` threads (0 = caller's
    /// thread).
    ///
    /// `batch_size` is clamped to at least 1.
    ///
    /// # Errors
    ///
    /// Returns [`DatasetError::WorkerPool`] if the pool cannot be built.
    pub fn new(
        dataset: PolicyDataset,
        batch_size: usize,
        shuffle: bool,
        num_workers: usize,
        seed: Option<u64>,
    ) -> Result<Self> {
        let pool = if num_workers == 0 {
            None
        } else {
            Some(
                ThreadPoolBuilder::new()
                    .num_threads(num_workers)
                    .thread_name(|i| format!("batch-collate-{i}"))
                    .build()
                    .map_err(|e| DatasetError::WorkerPool(e.to_string()))?,
            )
        };
        let rng = seed.map_or_else(ChaCha8Rng::from_entropy, ChaCha8Rng::seed_from_u64);
        Ok(Self {
            dataset,
            batch_size: batch_size.max(1),
            shuffle,
            seed,
            pool,
            rng,
        })
    }

    /// The underlying dataset.
    #[must_use]
    pub const fn dataset(&self) -> &PolicyDataset {
        &self.dataset
    }

    /// Batch size.
    #[must_use]
    pub const fn batch_size(&self) -> usize {
        self.batch_size
    }

    /// Number of batches per epoch.
    #[must_use]
    pub fn num_batches(&self) -> usize {
        self.dataset.len().div_ceil(self.batch_size)
    }

    /// Resets the shuffling stream to its initial state.
    ///
    /// Only meaningful for seeded loaders.
    pub fn reset(&mut self) {
        if let Some(seed) = self.seed {
            self.rng = ChaCha8Rng::seed_from_u64(seed);
        }
    }

    /// Sample order for the next epoch.
    fn epoch_order(&mut self) -> Vec<usize> {
        let mut order: Vec<usize> = (0..self.dataset.len()).collect();
        if self.shuffle {
            order.shuffle(&mut self.rng);
        }
        order
    }

    /// Collates every batch of the next epoch.
    ///
    /// The last batch may be smaller than the batch size.
    ///
    /// # Errors
    ///
    /// Propagates collation errors.
    pub fn epoch(&mut self) -> Result<Vec<Batch>> {
        let order = self.epoch_order();
        let dataset = &self.dataset;
        let collate = || -> Result<Vec<Batch>> {
            order
                .par_chunks(self.batch_size)
                .map(|chunk| Batch::collate(dataset, chunk))
                .collect()
        };
        let batches = match &self.pool {
            Some(pool) => pool.install(collate),
            None => order
                .chunks(self.batch_size)
                .map(|chunk| Batch::collate(dataset, chunk))
                .collect(),
        }?;
        debug!(batches = batches.len(), "collated epoch");
        Ok(batches)
    }
}
