//! End-to-end run: load the frozen decoder, assemble episodes, then train
//! or test.

use std::path::PathBuf;

use burn::tensor::backend::AutodiffBackend;
use policy_dataset::{assemble, split_dataset};
use policy_models::{FrozenDecoder, KinematicChain, Predictor};
use policy_types::Pose;
use tracing::info;

use crate::config::{RunConfig, RunMode};
use crate::error::Result;
use crate::pipeline::PolicyPipeline;
use crate::plot::PngReporter;
use crate::report::JsonReporter;
use crate::trainer::PolicyTrainer;

/// What a run produced.
#[derive(Debug, Clone, PartialEq)]
pub struct RunSummary {
    /// Output directory.
    pub run_dir: PathBuf,

    /// Best validation loss (train) or the evaluation loss (test).
    pub loss: Option<f32>,

    /// Saved predictor, when training improved at least once.
    pub checkpoint: Option<PathBuf>,

    /// End-effector pose for the first validation sample under the best
    /// predictor.
    pub pose: Option<Pose>,
}

/// Executes a run on backend `B`.
///
/// # Errors
///
/// Fails fast on invalid configuration (including a non-positive model
/// index) before touching the filesystem; any later error aborts the run.
pub fn run_policy<B: AutodiffBackend>(config: &RunConfig, device: &B::Device) -> Result<RunSummary> {
    config.validate()?;
    let run_dir = config.run_dir();
    config.save_arguments(&run_dir)?;

    if let Some(seed) = config.training.seed {
        B::seed(seed);
    }

    let decoder_path = config.decoder_source().checkpoint_path()?;
    let decoder = FrozenDecoder::<B>::load(config.decoder, &decoder_path, device)?;
    let chain = KinematicChain::franka_panda();
    let pipeline = PolicyPipeline::new(decoder, chain.clone(), config.angles)?;

    let dataset = assemble(config.episode_dir(), &config.assembly)?;
    info!("Dataset size {}", dataset.len());

    let predictor = Predictor::<B>::new(config.predictor_config(), device);
    let trainer = PolicyTrainer::new(config.training.clone(), pipeline, &run_dir, device.clone())?;

    let (loss, checkpoint, joints) = match config.mode {
        RunMode::Train => {
            let (train, val) = split_dataset(&dataset, config.training.split()?, config.training.seed)?;
            let mut reporter = (JsonReporter::new(&run_dir)?, PngReporter::new(&run_dir)?);
            let (_, outcome) = trainer.fit(predictor, train, val, &mut reporter)?;
            (
                outcome.metrics.best_val_loss,
                outcome.checkpoint,
                outcome.best_joints,
            )
        }
        RunMode::Test => {
            let evaluation = trainer.test(predictor, dataset)?;
            (Some(evaluation.loss), None, evaluation.first_joints)
        }
    };

    let pose = joints.map(|q| chain.host_pose(&q)).transpose()?;
    if let Some(pose) = &pose {
        info!(%pose, "predicted end-effector pose of the first validation sample");
    }

    Ok(RunSummary {
        run_dir,
        loss,
        checkpoint,
        pose,
    })
}
