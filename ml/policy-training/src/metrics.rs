//! Training metrics.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{Result, TrainingError};
use crate::loss::error_distance;

/// Metrics for a single training epoch.
///
/// # Example
///
/// ```
/// use policy_training::EpochMetrics;
///
/// let metrics = EpochMetrics::new(1, 0.04, 0.09);
/// assert_eq!(metrics.epoch, 1);
/// assert!((metrics.val_distance() - 0.3).abs() < 1e-6);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EpochMetrics {
    /// Epoch number (1-indexed).
    pub epoch: usize,

    /// Mean training MSE over batches.
    pub train_loss: f32,

    /// Mean validation MSE over batches.
    pub val_loss: f32,

    /// Learning rate used.
    pub learning_rate: f64,

    /// Training time in seconds.
    pub train_time_secs: f32,

    /// Validation time in seconds.
    pub val_time_secs: f32,

    /// Number of training samples processed.
    pub train_samples: usize,

    /// Number of validation samples processed.
    pub val_samples: usize,
}

impl EpochMetrics {
    /// Creates new epoch metrics.
    #[must_use]
    pub const fn new(epoch: usize, train_loss: f32, val_loss: f32) -> Self {
        Self {
            epoch,
            train_loss,
            val_loss,
            learning_rate: 0.0,
            train_time_secs: 0.0,
            val_time_secs: 0.0,
            train_samples: 0,
            val_samples: 0,
        }
    }

    /// Sets the learning rate.
    #[must_use]
    pub const fn with_learning_rate(mut self, lr: f64) -> Self {
        self.learning_rate = lr;
        self
    }

    /// Sets the phase timings.
    #[must_use]
    pub const fn with_times(mut self, train_secs: f32, val_secs: f32) -> Self {
        self.train_time_secs = train_secs;
        self.val_time_secs = val_secs;
        self
    }

    /// Sets sample counts.
    #[must_use]
    pub const fn with_samples(mut self, train: usize, val: usize) -> Self {
        self.train_samples = train;
        self.val_samples = val;
        self
    }

    /// Average training error distance, `sqrt(train_loss)`.
    #[must_use]
    pub fn train_distance(&self) -> f32 {
        error_distance(self.train_loss)
    }

    /// Average validation error distance, `sqrt(val_loss)`.
    #[must_use]
    pub fn val_distance(&self) -> f32 {
        error_distance(self.val_loss)
    }

    /// Returns total time (train + val) in seconds.
    #[must_use]
    pub fn total_time_secs(&self) -> f32 {
        self.train_time_secs + self.val_time_secs
    }

    /// Returns true if validation loss is strictly below the previous best.
    #[must_use]
    pub fn val_improved(&self, previous_best: Option<f32>) -> bool {
        previous_best.is_none_or(|best| self.val_loss < best)
    }
}

/// Aggregate metrics for a training run. Saved as `metrics.json`.
///
/// # Example
///
/// ```
/// use policy_training::{EpochMetrics, TrainingMetrics};
///
/// let mut metrics = TrainingMetrics::new();
/// assert!(metrics.add_epoch(EpochMetrics::new(1, 0.5, 0.4)));
/// assert!(!metrics.add_epoch(EpochMetrics::new(2, 0.3, 0.45)));
///
/// assert_eq!(metrics.epochs_completed(), 2);
/// assert_eq!(metrics.best_epoch, Some(1));
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TrainingMetrics {
    /// Metrics for each epoch.
    pub epoch_metrics: Vec<EpochMetrics>,

    /// Best validation loss seen.
    pub best_val_loss: Option<f32>,

    /// Epoch with best validation loss.
    pub best_epoch: Option<usize>,

    /// Total training time in seconds.
    pub total_time_secs: f32,
}

impl TrainingMetrics {
    /// Creates new empty training metrics.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds metrics for an epoch. Returns true if validation improved.
    pub fn add_epoch(&mut self, metrics: EpochMetrics) -> bool {
        let improved = metrics.val_improved(self.best_val_loss);
        if improved {
            self.best_val_loss = Some(metrics.val_loss);
            self.best_epoch = Some(metrics.epoch);
        }
        self.total_time_secs += metrics.total_time_secs();
        self.epoch_metrics.push(metrics);
        improved
    }

    /// Returns the number of completed epochs.
    #[must_use]
    pub fn epochs_completed(&self) -> usize {
        self.epoch_metrics.len()
    }

    /// Returns the final training loss.
    #[must_use]
    pub fn final_loss(&self) -> f32 {
        self.epoch_metrics.last().map_or(f32::NAN, |m| m.train_loss)
    }

    /// Returns the final validation loss.
    #[must_use]
    pub fn final_val_loss(&self) -> Option<f32> {
        self.epoch_metrics.last().map(|m| m.val_loss)
    }

    /// Training loss curve.
    #[must_use]
    pub fn train_losses(&self) -> Vec<f32> {
        self.epoch_metrics.iter().map(|m| m.train_loss).collect()
    }

    /// Validation loss curve.
    #[must_use]
    pub fn val_losses(&self) -> Vec<f32> {
        self.epoch_metrics.iter().map(|m| m.val_loss).collect()
    }

    /// Returns a human-readable summary.
    #[must_use]
    #[allow(clippy::let_underscore_must_use)] // String::write_fmt is infallible
    pub fn summary(&self) -> String {
        use std::fmt::Write;

        let mut s = String::new();
        let _ = writeln!(s, "Training Summary");
        let _ = writeln!(s, "================");
        let _ = writeln!(s, "Epochs completed: {}", self.epochs_completed());
        let _ = writeln!(s, "Total time: {:.1}s", self.total_time_secs);
        let _ = writeln!(s, "Final train loss: {:.6}", self.final_loss());
        if let (Some(best), Some(epoch)) = (self.best_val_loss, self.best_epoch) {
            let _ = writeln!(
                s,
                "Best val loss: {best:.6} (distance {:.4}, epoch {epoch})",
                error_distance(best)
            );
        }
        s
    }

    /// Writes the metrics as pretty JSON.
    ///
    /// # Errors
    ///
    /// Returns [`TrainingError::Artifact`] if the file cannot be written.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let json = serde_json::to_string_pretty(self).map_err(|e| TrainingError::artifact(path, e))?;
        std::fs::write(path, json).map_err(|e| TrainingError::artifact(path, e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn epoch_metrics_builder() {
        let metrics = EpochMetrics::new(1, 0.3, 0.2)
            .with_learning_rate(1e-3)
            .with_times(10.0, 2.0)
            .with_samples(1000, 200);

        assert!((metrics.learning_rate - 1e-3).abs() < 1e-12);
        assert!((metrics.total_time_secs() - 12.0).abs() < 1e-6);
        assert_eq!(metrics.train_samples, 1000);
        assert_eq!(metrics.val_samples, 200);
    }

    #[test]
    fn epoch_metrics_distances() {
        let metrics = EpochMetrics::new(1, 0.25, 0.01);
        assert!((metrics.train_distance() - 0.5).abs() < 1e-6);
        assert!((metrics.val_distance() - 0.1).abs() < 1e-6);
    }

    #[test]
    fn epoch_metrics_val_improved() {
        let metrics = EpochMetrics::new(1, 0.5, 0.4);

        assert!(metrics.val_improved(Some(0.5)));
        assert!(!metrics.val_improved(Some(0.3)));
        assert!(!metrics.val_improved(Some(0.4)));
        assert!(metrics.val_improved(None));
    }

    #[test]
    fn training_metrics_best_so_far() {
        let mut metrics = TrainingMetrics::new();
        let improved: Vec<bool> = [5.0, 3.0, 4.0, 2.0]
            .into_iter()
            .enumerate()
            .map(|(i, val)| metrics.add_epoch(EpochMetrics::new(i + 1, 1.0, val)))
            .collect();

        assert_eq!(improved, vec![true, true, false, true]);
        assert_eq!(metrics.best_epoch, Some(4));
        assert!((metrics.best_val_loss.unwrap() - 2.0).abs() < 1e-6);
        assert_eq!(metrics.val_losses(), vec![5.0, 3.0, 4.0, 2.0]);
    }

    #[test]
    fn training_metrics_add_epoch() {
        let mut metrics = TrainingMetrics::new();
        metrics.add_epoch(EpochMetrics::new(1, 0.5, 0.4).with_times(10.0, 0.0));
        metrics.add_epoch(EpochMetrics::new(2, 0.3, 0.35).with_times(10.0, 0.0));

        assert_eq!(metrics.epochs_completed(), 2);
        assert!((metrics.final_loss() - 0.3).abs() < 1e-6);
        assert!((metrics.final_val_loss().unwrap() - 0.35).abs() < 1e-6);
        assert!((metrics.total_time_secs - 20.0).abs() < 1e-6);
        assert_eq!(metrics.train_losses(), vec![0.5, 0.3]);
    }

    #[test]
    fn training_metrics_summary() {
        let mut metrics = TrainingMetrics::new();
        metrics.add_epoch(EpochMetrics::new(1, 1.0, 0.9));
        metrics.add_epoch(EpochMetrics::new(2, 0.5, 0.45));

        let summary = metrics.summary();
        assert!(summary.contains("Epochs completed: 2"));
        assert!(summary.contains("Best val loss:"));
        assert!(summary.contains("epoch 2"));
    }

    #[test]
    fn training_metrics_save() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("metrics.json");
        let mut metrics = TrainingMetrics::new();
        metrics.add_epoch(EpochMetrics::new(1, 0.5, 0.4));
        metrics.save(&path).unwrap();

        let parsed: TrainingMetrics =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(parsed, metrics);
    }
}
