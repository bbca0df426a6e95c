//! Command-line surface of `perception-policy-train`.

use std::path::PathBuf;

use burn::backend::Autodiff;
use clap::{Parser, ValueEnum};
use policy_dataset::{AssemblyConfig, CameraMatch, CameraMode, LatentStep};
use policy_models::{ConvHead, DecoderConfig};
use policy_types::AngleRange;

use crate::config::{BackendKind, PolicyPaths, RunConfig, RunMode, TrainingConfig};
use crate::runner::{RunSummary, run_policy};
use crate::TrainBackend;

/// Fixed-camera comparison rule.
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum CameraMatchArg {
    /// Each channel against itself.
    Exact,
    /// Elevation against azimuth and azimuth against elevation.
    Crossed,
}

impl From<CameraMatchArg> for CameraMatch {
    fn from(arg: CameraMatchArg) -> Self {
        match arg {
            CameraMatchArg::Exact => Self::Exact,
            CameraMatchArg::Crossed => Self::Crossed,
        }
    }
}

/// Command-line arguments.
#[derive(Parser, Debug, Clone)]
#[command(
    name = "perception-policy-train",
    about = "Train a perception policy through a frozen trajectory decoder"
)]
pub struct TrainArgs {
    /// Decoder model name.
    #[arg(long, default_value = "mse_fc_v1")]
    pub vae_name: String,
    /// Decoder latent width.
    #[arg(long, default_value_t = 5)]
    pub latent_dim: usize,
    /// Number of robot joints.
    #[arg(long, default_value_t = 7)]
    pub num_joints: usize,
    /// Trajectory length in time steps.
    #[arg(long, default_value_t = 24)]
    pub num_actions: usize,
    /// Decoder hidden units.
    #[arg(long, default_value_t = 128)]
    pub decoder_hidden: usize,
    /// Decoder was trained with a convolution head.
    #[arg(long)]
    pub conv: bool,
    /// Channels feeding the convolution head.
    #[arg(long, default_value_t = 2)]
    pub conv_channel: usize,
    /// Convolution kernel width.
    #[arg(long, default_value_t = 4)]
    pub kernel_row: usize,
    /// Decoder snapshot index (must be > 0).
    #[arg(long, default_value_t = -1, allow_negative_numbers = true)]
    pub model_index: i64,
    /// Lower joint-angle bound of the decoder domain (rad).
    #[arg(long, default_value_t = -std::f32::consts::PI, allow_negative_numbers = true)]
    pub min_angle: f32,
    /// Upper joint-angle bound of the decoder domain (rad).
    #[arg(long, default_value_t = std::f32::consts::PI, allow_negative_numbers = true)]
    pub max_angle: f32,
    /// Perception experiment name.
    #[arg(long, default_value = "rgb_test")]
    pub g_name: String,
    /// Perception latent width.
    #[arg(long, default_value_t = 10)]
    pub g_latent: usize,
    /// Predictor hidden units.
    #[arg(long, default_value_t = 128)]
    pub hidden: usize,
    /// Policy name; names the output directory.
    #[arg(long, default_value = "example")]
    pub policy_name: String,
    /// Keep only samples seen from the first sample's camera.
    #[arg(long)]
    pub fixed_camera: bool,
    /// Fixed-camera comparison rule.
    #[arg(long, value_enum, default_value_t = CameraMatchArg::Exact)]
    pub camera_match: CameraMatchArg,
    /// Latent time step to use (defaults to the first).
    #[arg(long)]
    pub latent_step: Option<usize>,
    /// Subsample the dataset to a handful of samples.
    #[arg(long)]
    pub debug: bool,
    /// Evaluate the saved policy instead of training.
    #[arg(long)]
    pub test: bool,
    /// Number of epochs.
    #[arg(long, default_value_t = 100)]
    pub num_epoch: usize,
    /// Batch size.
    #[arg(long, default_value_t = 5)]
    pub batch_size: usize,
    /// Validation batch size.
    #[arg(long, default_value_t = 10_000)]
    pub val_batch_size: usize,
    /// Learning rate.
    #[arg(long, default_value_t = 1e-3)]
    pub lr: f64,
    /// Adam weight decay.
    #[arg(long, default_value_t = 0.0)]
    pub weight_decay: f32,
    /// Batch collation threads (0 = training thread).
    #[arg(long, default_value_t = 0)]
    pub num_processes: usize,
    /// Fraction of samples used for training.
    #[arg(long, default_value_t = 0.7)]
    pub split_ratio: f64,
    /// Random seed.
    #[arg(long)]
    pub seed: Option<u64>,
    /// Trained decoder models.
    #[arg(long, default_value = "data/behaviour")]
    pub behaviour_root: PathBuf,
    /// Simulation logs with episode files.
    #[arg(long, default_value = "data/gibson")]
    pub gibson_root: PathBuf,
    /// Trained policies.
    #[arg(long, default_value = "data/policies")]
    pub policy_root: PathBuf,
    /// Backend to use (ndarray or wgpu if enabled).
    #[arg(long, value_enum, default_value_t = BackendKind::NdArray)]
    pub backend: BackendKind,
}

impl TrainArgs {
    /// Builds the run configuration.
    ///
    /// # Errors
    ///
    /// Fails if the angle bounds are not an increasing finite range.
    pub fn to_run_config(&self) -> anyhow::Result<RunConfig> {
        let mut decoder = DecoderConfig::new(self.latent_dim, self.num_joints, self.num_actions)
            .with_hidden(self.decoder_hidden);
        if self.conv {
            decoder = decoder.with_conv(ConvHead {
                channels: self.conv_channel,
                kernel: self.kernel_row,
            });
        }

        let camera_mode = if self.fixed_camera {
            CameraMode::Fixed
        } else {
            CameraMode::Variable
        };
        let mut assembly = AssemblyConfig::new(camera_mode)
            .with_camera_match(self.camera_match.into())
            .with_debug(self.debug);
        if let Some(step) = self.latent_step {
            assembly = assembly.with_latent_step(LatentStep::Index(step));
        }

        let training = TrainingConfig {
            epochs: self.num_epoch,
            batch_size: self.batch_size,
            learning_rate: self.lr,
            weight_decay: self.weight_decay,
            num_workers: self.num_processes,
            val_batch_size: self.val_batch_size,
            split_ratio: self.split_ratio,
            seed: self.seed,
        };
        if let Some(seed) = self.seed {
            assembly = assembly.with_seed(seed);
        }

        Ok(RunConfig {
            vae_name: self.vae_name.clone(),
            model_index: self.model_index,
            decoder,
            angles: AngleRange::new(self.min_angle, self.max_angle)?,
            g_name: self.g_name.clone(),
            g_latent: self.g_latent,
            predictor_hidden: self.hidden,
            policy_name: self.policy_name.clone(),
            assembly,
            training,
            paths: PolicyPaths::new(&self.behaviour_root, &self.gibson_root, &self.policy_root),
            backend: self.backend,
            mode: if self.test { RunMode::Test } else { RunMode::Train },
        })
    }
}

/// Fails if the requested backend was not compiled in.
///
/// # Errors
///
/// Returns an error for `wgpu` without the `backend-wgpu` feature.
pub fn validate_backend_choice(kind: BackendKind) -> anyhow::Result<()> {
    let built_wgpu = cfg!(feature = "backend-wgpu");
    match (kind, built_wgpu) {
        (BackendKind::Wgpu, false) => {
            anyhow::bail!(
                "backend-wgpu feature not enabled; rebuild with --features backend-wgpu or choose the ndarray backend"
            )
        }
        (BackendKind::NdArray, true) => {
            tracing::warn!("built with backend-wgpu; the WGPU backend is used despite --backend ndarray");
        }
        _ => {}
    }
    Ok(())
}

/// Runs a parsed invocation on the compiled-in backend.
///
/// # Errors
///
/// Returns the first configuration, dataset, model or artifact error.
pub fn run_train(args: &TrainArgs) -> anyhow::Result<RunSummary> {
    validate_backend_choice(args.backend)?;
    let config = args.to_run_config()?;
    let device = Default::default();
    Ok(run_policy::<Autodiff<TrainBackend>>(&config, &device)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(extra: &[&str]) -> TrainArgs {
        let mut argv = vec!["perception-policy-train"];
        argv.extend_from_slice(extra);
        TrainArgs::try_parse_from(argv).unwrap()
    }

    #[test]
    fn defaults_match_reference_runs() {
        let args = parse(&[]);
        assert_eq!(args.vae_name, "mse_fc_v1");
        assert_eq!(args.latent_dim, 5);
        assert_eq!(args.num_joints, 7);
        assert_eq!(args.num_actions, 24);
        assert_eq!(args.batch_size, 5);
        assert_eq!(args.g_latent, 10);
        assert_eq!(args.model_index, -1);
        assert!(!args.test);
    }

    #[test]
    fn run_config_from_args() {
        let args = parse(&[
            "--model-index",
            "3",
            "--fixed-camera",
            "--conv",
            "--latent-step",
            "2",
            "--seed",
            "9",
            "--test",
        ]);
        let run = args.to_run_config().unwrap();
        assert_eq!(run.model_index, 3);
        assert_eq!(run.assembly.camera_mode, CameraMode::Fixed);
        assert_eq!(run.assembly.latent_step, LatentStep::Index(2));
        assert_eq!(run.assembly.seed, Some(9));
        assert_eq!(run.training.seed, Some(9));
        assert_eq!(run.decoder.conv, Some(ConvHead::default()));
        assert_eq!(run.predictor_config().input_dim, 10);
        assert_eq!(run.mode, RunMode::Test);
        assert!(run.validate().is_ok());
    }

    #[test]
    fn negative_model_index_parses_then_fails_validation() {
        let run = parse(&["--model-index", "-1"]).to_run_config().unwrap();
        assert!(run.validate().is_err());
    }

    #[test]
    fn inverted_angle_range_rejected() {
        let args = parse(&["--min-angle", "1.0", "--max-angle", "-1.0"]);
        assert!(args.to_run_config().is_err());
    }

    #[test]
    fn backend_choice() {
        assert!(validate_backend_choice(BackendKind::NdArray).is_ok());
        assert_eq!(
            validate_backend_choice(BackendKind::Wgpu).is_ok(),
            cfg!(feature = "backend-wgpu")
        );
    }

    #[test]
    fn unknown_flag_rejected() {
        assert!(TrainArgs::try_parse_from(["perception-policy-train", "--random-goal"]).is_err());
    }
}
