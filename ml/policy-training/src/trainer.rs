//! Training loop implementation.
//!
//! Each epoch runs a training pass over shuffled batches, then a
//! validation pass on the inner backend. The predictor is written to
//! `model.bin` only when the mean validation loss reaches a new minimum.

use std::path::{Path, PathBuf};
use std::time::Instant;

use burn::module::AutodiffModule;
use burn::optim::decay::WeightDecayConfig;
use burn::optim::{AdamConfig, GradientsParams, Optimizer};
use burn::prelude::Backend;
use burn::tensor::backend::AutodiffBackend;
use policy_dataset::{BatchLoader, PolicyDataset};
use policy_models::{Predictor, load_checkpoint, save_checkpoint};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::config::TrainingConfig;
use crate::error::{Result, TrainingError};
use crate::loss::{batch_tensors, position_mse, scalar, to_points, to_rows};
use crate::metrics::{EpochMetrics, TrainingMetrics};
use crate::pipeline::PolicyPipeline;
use crate::report::{EpochReport, EpochReporter, PositionSet};

/// File name of the best predictor inside a run directory.
pub const MODEL_FILE: &str = "model.bin";

/// File name of the metrics inside a run directory.
pub const METRICS_FILE: &str = "metrics.json";

/// State of a training run.
///
/// The best validation loss lives in [`TrainingMetrics`]; an epoch
/// improves only if it is strictly below every earlier one.
///
/// # Example
///
/// ```
/// use policy_training::{EpochMetrics, TrainingState};
///
/// let mut state = TrainingState::new(2);
/// assert!(state.finish_epoch(EpochMetrics::new(1, 1.0, 5.0)));
/// assert!(!state.improves(&EpochMetrics::new(2, 1.0, 6.0)));
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainingState {
    /// Completed epochs.
    pub epoch: usize,

    /// Total epochs to run.
    pub total_epochs: usize,

    /// Accumulated metrics.
    pub metrics: TrainingMetrics,
}

impl TrainingState {
    /// Creates a state for a run of `total_epochs`.
    #[must_use]
    pub fn new(total_epochs: usize) -> Self {
        Self {
            epoch: 0,
            total_epochs,
            metrics: TrainingMetrics::new(),
        }
    }

    /// Returns true once every epoch has run.
    #[must_use]
    pub const fn is_finished(&self) -> bool {
        self.epoch >= self.total_epochs
    }

    /// Returns true if `metrics` would be a strict new best.
    #[must_use]
    pub fn improves(&self, metrics: &EpochMetrics) -> bool {
        metrics.val_improved(self.metrics.best_val_loss)
    }

    /// Closes an epoch. Returns true if it set a new best.
    pub fn finish_epoch(&mut self, metrics: EpochMetrics) -> bool {
        self.epoch += 1;
        self.metrics.add_epoch(metrics)
    }
}

/// Result of a validation pass.
#[derive(Debug, Clone, Default)]
pub struct Evaluation {
    /// Mean loss over batches.
    pub loss: f32,

    /// Predicted and target positions.
    pub positions: PositionSet,

    /// Predicted action latents.
    pub latents: Vec<Vec<f32>>,

    /// Decoded final joint angles of the first sample.
    pub first_joints: Option<Vec<f32>>,
}

/// What a finished run produced.
#[derive(Debug, Clone)]
pub struct TrainingOutcome {
    /// Per-epoch metrics and best epoch.
    pub metrics: TrainingMetrics,

    /// Path of the best predictor, if any epoch improved.
    pub checkpoint: Option<PathBuf>,

    /// Final joint angles of the first validation sample under the best
    /// predictor.
    pub best_joints: Option<Vec<f32>>,
}

/// Trains a predictor through a frozen decoder and kinematic chain.
#[derive(Debug, Clone)]
pub struct PolicyTrainer<B: AutodiffBackend> {
    config: TrainingConfig,
    pipeline: PolicyPipeline<B>,
    run_dir: PathBuf,
    device: B::Device,
}

impl<B: AutodiffBackend> PolicyTrainer<B> {
    /// Creates a trainer writing artifacts into `run_dir`.
    ///
    /// # Errors
    ///
    /// Returns [`TrainingError::InvalidConfig`] for a bad config and
    /// [`TrainingError::Artifact`] if `run_dir` cannot be created.
    pub fn new(
        config: TrainingConfig,
        pipeline: PolicyPipeline<B>,
        run_dir: impl Into<PathBuf>,
        device: B::Device,
    ) -> Result<Self> {
        config.validate()?;
        let run_dir = run_dir.into();
        std::fs::create_dir_all(&run_dir).map_err(|e| TrainingError::artifact(&run_dir, e))?;
        Ok(Self {
            config,
            pipeline,
            run_dir,
            device,
        })
    }

    /// The training configuration.
    #[must_use]
    pub const fn config(&self) -> &TrainingConfig {
        &self.config
    }

    /// The run directory.
    #[must_use]
    pub fn run_dir(&self) -> &Path {
        &self.run_dir
    }

    /// Path of the best predictor.
    #[must_use]
    pub fn model_path(&self) -> PathBuf {
        self.run_dir.join(MODEL_FILE)
    }

    /// Runs every epoch.
    ///
    /// # Errors
    ///
    /// Any dataset, model, checkpoint or report error aborts the run.
    pub fn fit<R: EpochReporter>(
        &self,
        mut predictor: Predictor<B>,
        train: PolicyDataset,
        val: PolicyDataset,
        reporter: &mut R,
    ) -> Result<(Predictor<B>, TrainingOutcome)> {
        let seed = self.config.seed;
        let mut train_loader = BatchLoader::new(
            train,
            self.config.batch_size,
            true,
            self.config.num_workers,
            seed,
        )?;
        let mut val_loader = BatchLoader::new(
            val,
            self.config.val_batch_size,
            false,
            self.config.num_workers,
            seed,
        )?;

        let mut optim_config = AdamConfig::new();
        if self.config.weight_decay > 0.0 {
            optim_config =
                optim_config.with_weight_decay(Some(WeightDecayConfig::new(self.config.weight_decay)));
        }
        let mut optim = optim_config.init();

        let mut state = TrainingState::new(self.config.epochs);
        let mut checkpoint = None;
        let mut best_joints = None;
        let lr = self.config.learning_rate;

        info!(
            train = train_loader.dataset().len(),
            val = val_loader.dataset().len(),
            epochs = self.config.epochs,
            batch_size = self.config.batch_size,
            "starting training"
        );

        while !state.is_finished() {
            let epoch = state.epoch + 1;
            info!("Epoch {epoch}");

            let start = Instant::now();
            let mut losses = Vec::with_capacity(train_loader.num_batches());
            let mut train_positions = PositionSet::default();
            let mut latents = Vec::new();

            for batch in train_loader.epoch()? {
                let (inputs, targets) = batch_tensors::<B>(&batch, &self.device);
                let latent = predictor.forward(inputs);
                let positions = self.pipeline.end_effector(latent.clone())?;
                let loss = position_mse(positions.clone(), targets.clone());

                let grads = GradientsParams::from_grads(loss.backward(), &predictor);
                predictor = optim.step(lr, predictor, grads);

                losses.push(scalar(loss));
                train_positions.extend(to_points(positions.detach()), to_points(targets));
                latents.extend(to_rows(latent.detach()));
            }
            let train_loss = mean(&losses);
            let train_secs = start.elapsed().as_secs_f32();

            let start = Instant::now();
            let evaluation = evaluate(
                &predictor.valid(),
                &self.pipeline.valid(),
                &mut val_loader,
                &self.device,
            )?;
            let val_secs = start.elapsed().as_secs_f32();

            let metrics = EpochMetrics::new(epoch, train_loss, evaluation.loss)
                .with_learning_rate(lr)
                .with_times(train_secs, val_secs)
                .with_samples(train_positions.len(), evaluation.positions.len());
            info!(
                "Average error distance (training) {}",
                metrics.train_distance()
            );
            info!(
                "Average error distance (validation) {}",
                metrics.val_distance()
            );

            if state.improves(&metrics) {
                let path = save_checkpoint::<B, _>(&predictor, self.model_path())?;
                info!(epoch, val_loss = evaluation.loss, path = %path.display(), "validation improved, saved predictor");
                checkpoint = Some(path);
                best_joints.clone_from(&evaluation.first_joints);
            }
            state.finish_epoch(metrics);
            state.metrics.save(self.run_dir.join(METRICS_FILE))?;

            latents.extend(evaluation.latents);
            let report = EpochReport {
                epoch,
                train: train_positions,
                val: evaluation.positions,
                latents,
            };
            reporter.report(&report, &state.metrics)?;
        }

        info!("{}", state.metrics.summary());
        Ok((
            predictor,
            TrainingOutcome {
                metrics: state.metrics,
                checkpoint,
                best_joints,
            },
        ))
    }

    /// Loads the best predictor of this run directory and evaluates it on
    /// `dataset` without training.
    ///
    /// # Errors
    ///
    /// Returns [`TrainingError::Model`] if `model.bin` is missing or does
    /// not match `predictor`'s shape.
    pub fn test(&self, predictor: Predictor<B>, dataset: PolicyDataset) -> Result<Evaluation> {
        let predictor = load_checkpoint::<B, _>(predictor, self.model_path(), &self.device)?;
        let mut loader = BatchLoader::new(
            dataset,
            self.config.val_batch_size,
            false,
            self.config.num_workers,
            self.config.seed,
        )?;
        let evaluation = evaluate(
            &predictor.valid(),
            &self.pipeline.valid(),
            &mut loader,
            &self.device,
        )?;
        info!(
            samples = evaluation.positions.len(),
            "Average error distance (test) {}",
            crate::loss::error_distance(evaluation.loss)
        );
        Ok(evaluation)
    }
}

/// Runs a gradient-free pass over every batch of `loader`.
///
/// # Errors
///
/// Propagates dataset and kinematic errors.
pub fn evaluate<B: Backend>(
    predictor: &Predictor<B>,
    pipeline: &PolicyPipeline<B>,
    loader: &mut BatchLoader,
    device: &B::Device,
) -> Result<Evaluation> {
    let mut losses = Vec::with_capacity(loader.num_batches());
    let mut evaluation = Evaluation::default();

    for batch in loader.epoch()? {
        let (inputs, targets) = batch_tensors::<B>(&batch, device);
        let latent = predictor.forward(inputs);
        let positions = pipeline.end_effector(latent.clone())?;
        losses.push(scalar(position_mse(positions.clone(), targets.clone())));

        if evaluation.first_joints.is_none() {
            let [_, width] = latent.dims();
            let first = latent.clone().slice([0..1, 0..width]);
            evaluation.first_joints = to_rows(pipeline.joint_angles(first)).into_iter().next();
        }

        evaluation.positions.extend(to_points(positions), to_points(targets));
        evaluation.latents.extend(to_rows(latent));
    }

    evaluation.loss = mean(&losses);
    debug!(batches = losses.len(), loss = evaluation.loss, "evaluated");
    Ok(evaluation)
}

#[allow(clippy::cast_precision_loss)]
fn mean(values: &[f32]) -> f32 {
    if values.is_empty() {
        0.0
    } else {
        values.iter().sum::<f32>() / values.len() as f32
    }
}
