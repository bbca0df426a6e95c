//! Per-epoch reports: prediction scatters, latent statistics and loss curves.
//!
//! Reports are plain JSON so any plotting tool can render them.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{Result, TrainingError};
use crate::metrics::TrainingMetrics;

/// Predicted and target end-effector positions.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PositionSet {
    /// Predicted positions.
    pub predicted: Vec<[f32; 3]>,

    /// Target positions, aligned with `predicted`.
    pub target: Vec<[f32; 3]>,
}

impl PositionSet {
    /// Appends aligned predictions and targets.
    pub fn extend(&mut self, predicted: Vec<[f32; 3]>, target: Vec<[f32; 3]>) {
        self.predicted.extend(predicted);
        self.target.extend(target);
    }

    /// Number of points.
    #[must_use]
    pub fn len(&self) -> usize {
        self.predicted.len()
    }

    /// Returns true if there are no points.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.predicted.is_empty()
    }

    /// Both sets concatenated.
    #[must_use]
    pub fn merged(&self, other: &Self) -> Self {
        let mut merged = self.clone();
        merged.extend(other.predicted.clone(), other.target.clone());
        merged
    }
}

/// Everything produced by one epoch that reporters may render.
#[derive(Debug, Clone, Default)]
pub struct EpochReport {
    /// Epoch number (1-indexed).
    pub epoch: usize,

    /// Training predictions.
    pub train: PositionSet,

    /// Validation predictions.
    pub val: PositionSet,

    /// Predicted action latents over train and validation samples.
    pub latents: Vec<Vec<f32>>,
}

/// Consumes epoch results.
pub trait EpochReporter {
    /// Called once per epoch after validation.
    ///
    /// # Errors
    ///
    /// Implementations return [`TrainingError::Artifact`] on write failures.
    fn report(&mut self, report: &EpochReport, metrics: &TrainingMetrics) -> Result<()>;
}

/// Discards every report.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullReporter;

impl EpochReporter for NullReporter {
    fn report(&mut self, _report: &EpochReport, _metrics: &TrainingMetrics) -> Result<()> {
        Ok(())
    }
}

/// Runs both reporters in order; the first error stops the second.
impl<A: EpochReporter, B: EpochReporter> EpochReporter for (A, B) {
    fn report(&mut self, report: &EpochReport, metrics: &TrainingMetrics) -> Result<()> {
        self.0.report(report, metrics)?;
        self.1.report(report, metrics)
    }
}

/// Summary of one latent dimension.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LatentStats {
    /// Mean.
    pub mean: f32,

    /// Population standard deviation.
    pub std: f32,

    /// Minimum.
    pub min: f32,

    /// Maximum.
    pub max: f32,

    /// Counts over `HISTOGRAM_BINS` equal-width bins spanning `[min, max]`.
    pub histogram: Vec<usize>,
}

const HISTOGRAM_BINS: usize = 20;

impl LatentStats {
    /// Statistics of each column of `rows`. Empty input yields no columns.
    #[must_use]
    #[allow(
        clippy::cast_precision_loss,
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss
    )]
    pub fn per_dimension(rows: &[Vec<f32>]) -> Vec<Self> {
        let width = rows.iter().map(Vec::len).min().unwrap_or(0);
        (0..width)
            .map(|d| {
                let column: Vec<f32> = rows.iter().map(|r| r[d]).collect();
                let n = column.len() as f32;
                let mean = column.iter().sum::<f32>() / n;
                let var = column.iter().map(|x| (x - mean).powi(2)).sum::<f32>() / n;
                let min = column.iter().copied().fold(f32::INFINITY, f32::min);
                let max = column.iter().copied().fold(f32::NEG_INFINITY, f32::max);

                let mut histogram = vec![0; HISTOGRAM_BINS];
                let span = max - min;
                for x in &column {
                    let bin = if span > 0.0 {
                        (((x - min) / span) * HISTOGRAM_BINS as f32) as usize
                    } else {
                        0
                    };
                    histogram[bin.min(HISTOGRAM_BINS - 1)] += 1;
                }

                Self {
                    mean,
                    std: var.sqrt(),
                    min,
                    max,
                    histogram,
                }
            })
            .collect()
    }
}

#[derive(Serialize)]
struct Scatter<'a> {
    epoch: usize,
    #[serde(flatten)]
    points: &'a PositionSet,
}

#[derive(Serialize)]
struct Curves {
    train: Vec<f32>,
    val: Vec<f32>,
}

/// Writes JSON reports into a directory, overwriting them every epoch.
///
/// Files: `train_scatter.json`, `val_scatter.json`, `full_scatter.json`,
/// `latents_distribution.json`, `avg_mse.json`, `avg_log_mse.json`.
#[derive(Debug, Clone)]
pub struct JsonReporter {
    dir: PathBuf,
}

impl JsonReporter {
    /// Creates a reporter writing into `dir`.
    ///
    /// # Errors
    ///
    /// Returns [`TrainingError::Artifact`] if `dir` cannot be created.
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir).map_err(|e| TrainingError::artifact(&dir, e))?;
        Ok(Self { dir })
    }

    /// Output directory.
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn write<T: Serialize>(&self, name: &str, value: &T) -> Result<()> {
        let path = self.dir.join(name);
        let json = serde_json::to_string(value).map_err(|e| TrainingError::artifact(&path, e))?;
        std::fs::write(&path, json).map_err(|e| TrainingError::artifact(&path, e))
    }
}

impl EpochReporter for JsonReporter {
    fn report(&mut self, report: &EpochReport, metrics: &TrainingMetrics) -> Result<()> {
        let epoch = report.epoch;
        let full = report.train.merged(&report.val);
        self.write("train_scatter.json", &Scatter { epoch, points: &report.train })?;
        self.write("val_scatter.json", &Scatter { epoch, points: &report.val })?;
        self.write("full_scatter.json", &Scatter { epoch, points: &full })?;
        self.write(
            "latents_distribution.json",
            &LatentStats::per_dimension(&report.latents),
        )?;

        let curves = Curves {
            train: metrics.train_losses(),
            val: metrics.val_losses(),
        };
        self.write("avg_mse.json", &curves)?;
        let log = |v: Vec<f32>| -> Vec<f32> { v.into_iter().map(f32::ln).collect() };
        self.write(
            "avg_log_mse.json",
            &Curves {
                train: log(curves.train),
                val: log(curves.val),
            },
        )?;

        debug!(epoch, dir = %self.dir.display(), "wrote epoch report");
        Ok(())
    }
}
