//! Full runs against a synthetic decoder snapshot and episode directory.

#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]
#![allow(clippy::cast_precision_loss)]

use std::path::Path;

use burn::backend::{Autodiff, NdArray};
use policy_dataset::EpisodeRecord;
use policy_models::{DecoderConfig, ModelError, TrajectoryDecoder, save_checkpoint};
use policy_training::prelude::*;
use policy_training::{METRICS_FILE, MODEL_FILE, RunMode};

type B = Autodiff<NdArray<f32>>;

const G_LATENT: usize = 4;

fn write_episode(path: &Path, n: usize, offset: f32) {
    let record = EpisodeRecord {
        latents: (0..n)
            .map(|i| vec![vec![offset + 0.1 * i as f32, 0.5, -0.5, 0.2]])
            .collect(),
        distances: (0..n).map(|i| 1.0 + 0.05 * i as f32).collect(),
        azimuths: (0..n).map(|i| 10.0 * i as f32).collect(),
        elevations: (0..n).map(|i| -40.0 + 2.0 * i as f32).collect(),
        targets: (0..n)
            .map(|i| [0.3 + 0.01 * i as f32, 0.05, 0.5])
            .collect(),
    };
    record.write(path).unwrap();
}

fn run_config(root: &Path) -> RunConfig {
    let mut config = RunConfig {
        model_index: 1,
        decoder: DecoderConfig::new(5, 7, 24).with_hidden(16),
        g_latent: G_LATENT,
        predictor_hidden: 16,
        paths: PolicyPaths::under(root),
        training: TrainingConfig::new(2).with_batch_size(4).with_seed(3),
        ..RunConfig::default()
    };
    config.policy_name = "smoke".to_string();
    config
}

/// Writes the decoder snapshot and two episode files.
fn fixture(config: &RunConfig) {
    let device = Default::default();
    let path = config.decoder_source().checkpoint_path().unwrap();
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    save_checkpoint(&TrajectoryDecoder::<B>::new(config.decoder, &device), &path).unwrap();

    let episodes = config.episode_dir();
    std::fs::create_dir_all(&episodes).unwrap();
    write_episode(&episodes.join("episode_000.json"), 12, 0.0);
    write_episode(&episodes.join("episode_001.json"), 8, 1.0);
}

#[test]
fn train_then_test() {
    let root = tempfile::tempdir().unwrap();
    let mut config = run_config(root.path());
    fixture(&config);

    let summary = run_policy::<B>(&config, &Default::default()).unwrap();
    let run_dir = config.run_dir();
    assert_eq!(summary.run_dir, run_dir);

    // The first epoch always improves on "no best yet".
    assert_eq!(summary.checkpoint.as_deref(), Some(run_dir.join(MODEL_FILE).as_path()));
    assert!(summary.loss.unwrap().is_finite());
    let pose = summary.pose.unwrap();
    assert!(pose.position().iter().all(|v| v.is_finite()));

    for name in [
        MODEL_FILE,
        METRICS_FILE,
        "arguments.json",
        "train_scatter.json",
        "val_scatter.json",
        "full_scatter.json",
        "latents_distribution.json",
        "avg_mse.json",
        "avg_log_mse.json",
        "train_scatter.png",
        "val_scatter.png",
        "full_scatter.png",
        "latents_distribution.png",
        "avg_mse.png",
        "avg_log_mse.png",
    ] {
        assert!(run_dir.join(name).is_file(), "{name} missing");
    }

    let metrics: TrainingMetrics =
        serde_json::from_str(&std::fs::read_to_string(run_dir.join(METRICS_FILE)).unwrap())
            .unwrap();
    assert_eq!(metrics.epochs_completed(), 2);
    // 20 samples split 14 / 6.
    assert_eq!(metrics.epoch_metrics[0].train_samples, 14);
    assert_eq!(metrics.epoch_metrics[0].val_samples, 6);
    approx::assert_relative_eq!(
        metrics.best_val_loss.unwrap(),
        summary.loss.unwrap(),
        epsilon = 1e-6
    );

    let saved = RunConfig::load_arguments(run_dir.join("arguments.json")).unwrap();
    assert_eq!(saved, config);

    config.mode = RunMode::Test;
    let tested = run_policy::<B>(&config, &Default::default()).unwrap();
    assert!(tested.checkpoint.is_none());
    assert!(tested.loss.unwrap().is_finite());
    assert!(tested.pose.is_some());
}

#[test]
fn non_positive_model_index_fails_before_any_output() {
    let root = tempfile::tempdir().unwrap();
    let mut config = run_config(root.path());
    config.model_index = 0;

    let err = run_policy::<B>(&config, &Default::default()).unwrap_err();
    assert!(matches!(
        err,
        TrainingError::Model(ModelError::InvalidModelIndex(0))
    ));
    assert!(!config.run_dir().exists());
}

#[test]
fn missing_decoder_snapshot() {
    let root = tempfile::tempdir().unwrap();
    let config = run_config(root.path());

    let err = run_policy::<B>(&config, &Default::default()).unwrap_err();
    assert!(matches!(
        err,
        TrainingError::Model(ModelError::CheckpointNotFound(_))
    ));
}

#[test]
fn test_mode_without_trained_policy() {
    let root = tempfile::tempdir().unwrap();
    let mut config = run_config(root.path());
    config.mode = RunMode::Test;
    fixture(&config);

    assert!(run_policy::<B>(&config, &Default::default()).is_err());
}

type Setup = (
    PolicyTrainer<B>,
    policy_models::Predictor<B>,
    policy_dataset::PolicyDataset,
    policy_dataset::PolicyDataset,
);

/// Builds a trainer writing into `<root>/direct` from the fixture files.
fn direct_trainer(root: &Path, config: &RunConfig, epochs: usize) -> Setup {
    fixture(config);
    let device = Default::default();

    let path = config.decoder_source().checkpoint_path().unwrap();
    let decoder = policy_models::FrozenDecoder::<B>::load(config.decoder, &path, &device).unwrap();
    let pipeline = PolicyPipeline::new(
        decoder,
        policy_models::KinematicChain::franka_panda(),
        config.angles,
    )
    .unwrap();
    let data = policy_dataset::assemble(config.episode_dir(), &config.assembly).unwrap();
    let (train, val) =
        policy_dataset::split_dataset(&data, config.training.split().unwrap(), Some(1)).unwrap();

    let trainer = PolicyTrainer::new(
        TrainingConfig::new(epochs).with_batch_size(5).with_seed(1),
        pipeline,
        root.join("direct"),
        device,
    )
    .unwrap();
    let predictor = policy_models::Predictor::<B>::new(config.predictor_config(), &Default::default());
    (trainer, predictor, train, val)
}

#[derive(Default)]
struct CountingReporter {
    epochs: Vec<usize>,
}

impl EpochReporter for CountingReporter {
    fn report(
        &mut self,
        report: &policy_training::EpochReport,
        _metrics: &TrainingMetrics,
    ) -> policy_training::Result<()> {
        self.epochs.push(report.epoch);
        Ok(())
    }
}

#[test]
fn trainer_with_null_reporter_checkpoints_on_improvement() {
    let root = tempfile::tempdir().unwrap();
    let config = run_config(root.path());
    let (trainer, predictor, train, val) = direct_trainer(root.path(), &config, 3);

    let (_, outcome) = trainer.fit(predictor, train, val, &mut NullReporter).unwrap();

    assert_eq!(outcome.metrics.epochs_completed(), 3);
    assert_eq!(outcome.metrics.best_epoch.map(|e| e >= 1), Some(true));
    assert!(trainer.model_path().is_file());
    assert_eq!(outcome.best_joints.map(|q| q.len()), Some(7));
    assert!(!root.path().join("direct").join("train_scatter.json").exists());
}

#[test]
fn checkpoint_write_failure_aborts_training() {
    let root = tempfile::tempdir().unwrap();
    let config = run_config(root.path());
    let (trainer, predictor, train, val) = direct_trainer(root.path(), &config, 3);

    // A directory where the model file should go makes every save fail.
    std::fs::create_dir_all(trainer.model_path()).unwrap();
    let mut reporter = CountingReporter::default();

    let err = trainer.fit(predictor, train, val, &mut reporter).unwrap_err();
    assert!(matches!(
        err,
        TrainingError::Checkpoint(ModelError::SaveCheckpoint { .. })
    ));
    // The first epoch always improves, so the run stops there before any
    // metrics or reports for it are written.
    assert!(reporter.epochs.is_empty());
    assert!(!trainer.run_dir().join(METRICS_FILE).exists());
    assert!(trainer.model_path().is_dir());
}

#[test]
fn checkpoint_failure_keeps_earlier_metrics() {
    let root = tempfile::tempdir().unwrap();
    let config = run_config(root.path());
    let (trainer, predictor, train, val) = direct_trainer(root.path(), &config, 2);
    let (_, outcome) = trainer
        .fit(predictor.clone(), train.clone(), val.clone(), &mut NullReporter)
        .unwrap();
    assert_eq!(outcome.metrics.epochs_completed(), 2);

    // Rerunning into the same directory fails on its first save.
    std::fs::remove_file(trainer.model_path()).unwrap();
    std::fs::create_dir_all(trainer.model_path()).unwrap();
    let err = trainer.fit(predictor, train, val, &mut NullReporter).unwrap_err();
    assert!(matches!(err, TrainingError::Checkpoint(_)));

    let metrics: TrainingMetrics = serde_json::from_str(
        &std::fs::read_to_string(trainer.run_dir().join(METRICS_FILE)).unwrap(),
    )
    .unwrap();
    assert_eq!(metrics.epochs_completed(), 2);
    assert_eq!(metrics.best_epoch, outcome.metrics.best_epoch);
}
