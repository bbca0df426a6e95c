//! Trajectory decoder: action latent to a normalized joint trajectory.
//!
//! The decoder is trained elsewhere and only loaded here. [`FrozenDecoder`]
//! is the read-only handle the training loop uses.

use std::path::{Path, PathBuf};

use burn::module::{AutodiffModule, Module};
use burn::nn;
use burn::nn::PaddingConfig1d;
use burn::nn::conv::{Conv1d, Conv1dConfig};
use burn::prelude::Backend;
use burn::tensor::Tensor;
use burn::tensor::activation::{relu, sigmoid};
use burn::tensor::backend::AutodiffBackend;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::checkpoint::load_checkpoint;
use crate::error::{ModelError, Result};

/// Optional 1-D convolution head.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConvHead {
    /// Channels emitted by the last dense layer.
    pub channels: usize,

    /// Kernel width along the action axis.
    pub kernel: usize,
}

impl Default for ConvHead {
    fn default() -> Self {
        Self {
            channels: 2,
            kernel: 4,
        }
    }
}

/// Configuration for [`TrajectoryDecoder`].
///
/// # Example
///
/// ```
/// use policy_models::DecoderConfig;
///
/// let config = DecoderConfig::new(5, 7, 24);
/// assert_eq!(config.output_len(), 7 * 24);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DecoderConfig {
    /// Latent width.
    pub latent_dim: usize,

    /// Hidden units per dense layer.
    pub hidden: usize,

    /// Number of robot joints.
    pub joints: usize,

    /// Trajectory length in time steps.
    pub actions: usize,

    /// Convolution head, if the decoder was trained with one.
    pub conv: Option<ConvHead>,
}

impl Default for DecoderConfig {
    fn default() -> Self {
        Self::new(5, 7, 24)
    }
}

impl DecoderConfig {
    /// Dense decoder with the default hidden size.
    #[must_use]
    pub const fn new(latent_dim: usize, joints: usize, actions: usize) -> Self {
        Self {
            latent_dim,
            hidden: 128,
            joints,
            actions,
            conv: None,
        }
    }

    /// Sets the hidden size.
    #[must_use]
    pub const fn with_hidden(mut self, hidden: usize) -> Self {
        self.hidden = hidden;
        self
    }

    /// Adds a convolution head.
    #[must_use]
    pub const fn with_conv(mut self, conv: ConvHead) -> Self {
        self.conv = Some(conv);
        self
    }

    /// Flat output width, `joints * actions`.
    #[must_use]
    pub const fn output_len(&self) -> usize {
        self.joints * self.actions
    }

    /// Checks that every dimension is positive.
    ///
    /// # Errors
    ///
    /// Returns [`ModelError::InvalidConfig`] naming the zero dimension.
    pub fn validate(&self) -> Result<()> {
        let mut dims = vec![
            ("latent_dim", self.latent_dim),
            ("hidden", self.hidden),
            ("joints", self.joints),
            ("actions", self.actions),
        ];
        if let Some(conv) = self.conv {
            dims.push(("conv channels", conv.channels));
            dims.push(("conv kernel", conv.kernel));
        }
        for (name, value) in dims {
            if value == 0 {
                return Err(ModelError::invalid_config(format!("{name} must be > 0")));
            }
        }
        Ok(())
    }
}

/// Dense (optionally convolutional) trajectory decoder.
///
/// Architecture: Latent -> Linear -> `ReLU` -> Linear -> `ReLU` -> Linear
/// [-> Conv1d] -> Sigmoid. Outputs are joint angles normalized to `[0, 1]`.
#[derive(Debug, Module)]
pub struct TrajectoryDecoder<B: Backend> {
    input: nn::Linear<B>,
    hidden: nn::Linear<B>,
    output: nn::Linear<B>,
    conv: Option<Conv1d<B>>,
    conv_channels: usize,
    joints: usize,
    actions: usize,
}

impl<B: Backend> TrajectoryDecoder<B> {
    /// Creates a decoder with freshly initialized weights.
    #[must_use]
    pub fn new(config: DecoderConfig, device: &B::Device) -> Self {
        let (dense_out, conv, conv_channels) = match config.conv {
            Some(head) => (
                head.channels * config.actions,
                Some(
                    Conv1dConfig::new(head.channels, config.joints, head.kernel)
                        .with_padding(PaddingConfig1d::Explicit(head.kernel / 2))
                        .init(device),
                ),
                head.channels,
            ),
            None => (config.output_len(), None, 0),
        };

        Self {
            input: nn::LinearConfig::new(config.latent_dim, config.hidden).init(device),
            hidden: nn::LinearConfig::new(config.hidden, config.hidden).init(device),
            output: nn::LinearConfig::new(config.hidden, dense_out).init(device),
            conv,
            conv_channels,
            joints: config.joints,
            actions: config.actions,
        }
    }

    /// Decodes latents to flat trajectories.
    ///
    /// `[batch, latent_dim]` in, `[batch, joints * actions]` out.
    pub fn forward(&self, latent: Tensor<B, 2>) -> Tensor<B, 2> {
        let [batch, _] = latent.dims();
        let x = relu(self.input.forward(latent));
        let x = relu(self.hidden.forward(x));
        let x = self.output.forward(x);

        let x = match &self.conv {
            Some(conv) => {
                let x = x.reshape([batch, self.conv_channels, self.actions]);
                // Even kernels produce one extra step with symmetric padding.
                conv.forward(x)
                    .slice([0..batch, 0..self.joints, 0..self.actions])
                    .reshape([batch, self.joints * self.actions])
            }
            None => x,
        };
        sigmoid(x)
    }

    /// Reshapes flat decoder output to `[batch, joints, actions]`.
    pub fn to_trajectory(&self, flat: Tensor<B, 2>) -> Tensor<B, 3> {
        let [batch, _] = flat.dims();
        flat.reshape([batch, self.joints, self.actions])
    }

    /// Number of joints.
    #[must_use]
    pub const fn joints(&self) -> usize {
        self.joints
    }

    /// Number of time steps.
    #[must_use]
    pub const fn actions(&self) -> usize {
        self.actions
    }
}

/// Decoder with gradients disabled.
///
/// Parameters never receive gradients; gradients still flow through the
/// decoder to its input.
#[derive(Debug, Clone)]
pub struct FrozenDecoder<B: Backend> {
    decoder: TrajectoryDecoder<B>,
}

impl<B: Backend> FrozenDecoder<B> {
    /// Freezes an existing decoder.
    #[must_use]
    pub fn new(decoder: TrajectoryDecoder<B>) -> Self {
        Self {
            decoder: decoder.no_grad(),
        }
    }

    /// Loads decoder weights from a checkpoint and freezes them.
    ///
    /// # Errors
    ///
    /// Returns [`ModelError::InvalidConfig`] for a bad config and the
    /// checkpoint errors of [`load_checkpoint`].
    pub fn load(config: DecoderConfig, path: &Path, device: &B::Device) -> Result<Self> {
        config.validate()?;
        let decoder = load_checkpoint(TrajectoryDecoder::new(config, device), path, device)?;
        info!(path = %path.display(), joints = config.joints, actions = config.actions, "loaded decoder");
        Ok(Self::new(decoder))
    }

    /// Decodes latents to `[batch, joints, actions]` normalized trajectories.
    pub fn decode(&self, latent: Tensor<B, 2>) -> Tensor<B, 3> {
        self.decoder.to_trajectory(self.decoder.forward(latent))
    }

    /// Number of joints.
    #[must_use]
    pub const fn joints(&self) -> usize {
        self.decoder.joints()
    }

    /// Number of time steps.
    #[must_use]
    pub const fn actions(&self) -> usize {
        self.decoder.actions()
    }
}

impl<B: AutodiffBackend> FrozenDecoder<B> {
    /// The same decoder on the inner backend, for validation passes.
    #[must_use]
    pub fn valid(&self) -> FrozenDecoder<B::InnerBackend> {
        FrozenDecoder {
            decoder: self.decoder.valid(),
        }
    }
}

/// Where a trained decoder lives: `<root>/<vae_name>/decoder_<index>.bin`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DecoderSource {
    /// Root directory of trained behaviour models.
    pub root: PathBuf,

    /// Model name.
    pub vae_name: String,

    /// Model snapshot index. Must be positive.
    pub model_index: i64,
}

impl DecoderSource {
    /// Creates a source description.
    #[must_use]
    pub fn new(root: impl Into<PathBuf>, vae_name: impl Into<String>, model_index: i64) -> Self {
        Self {
            root: root.into(),
            vae_name: vae_name.into(),
            model_index,
        }
    }

    /// Checkpoint path of the selected snapshot.
    ///
    /// # Errors
    ///
    /// Returns [`ModelError::InvalidModelIndex`] if `model_index <= 0`.
    pub fn checkpoint_path(&self) -> Result<PathBuf> {
        if self.model_index <= 0 {
            return Err(ModelError::InvalidModelIndex(self.model_index));
        }
        Ok(self
            .root
            .join(&self.vae_name)
            .join(format!("decoder_{}.bin", self.model_index)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::{Autodiff, NdArray};

    type TestBackend = NdArray<f32>;

    fn device() -> <TestBackend as Backend>::Device {
        Default::default()
    }

    #[test]
    fn config_validate() {
        assert!(DecoderConfig::new(5, 7, 24).validate().is_ok());
        assert!(DecoderConfig::new(5, 0, 24).validate().is_err());
        let bad_conv = DecoderConfig::new(5, 7, 24).with_conv(ConvHead {
            channels: 0,
            kernel: 4,
        });
        assert!(bad_conv.validate().unwrap_err().to_string().contains("conv channels"));
    }

    #[test]
    fn config_serialization() {
        let config = DecoderConfig::new(5, 7, 24).with_conv(ConvHead::default());
        let json = serde_json::to_string(&config).unwrap();
        let parsed: DecoderConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, config);
    }

    #[test]
    fn dense_decoder_shapes_and_range() {
        let decoder = TrajectoryDecoder::<TestBackend>::new(DecoderConfig::new(5, 7, 24), &device());
        let flat = decoder.forward(Tensor::random(
            [3, 5],
            burn::tensor::Distribution::Normal(0.0, 1.0),
            &device(),
        ));
        assert_eq!(flat.dims(), [3, 7 * 24]);

        let values = flat.clone().into_data().to_vec::<f32>().unwrap();
        assert!(values.iter().all(|v| (0.0..=1.0).contains(v)));

        assert_eq!(decoder.to_trajectory(flat).dims(), [3, 7, 24]);
    }

    #[test]
    fn conv_decoder_shapes() {
        for kernel in [3, 4] {
            let config = DecoderConfig::new(5, 7, 24).with_conv(ConvHead {
                channels: 2,
                kernel,
            });
            let decoder = TrajectoryDecoder::<TestBackend>::new(config, &device());
            let flat = decoder.forward(Tensor::zeros([2, 5], &device()));
            assert_eq!(flat.dims(), [2, 7 * 24]);
        }
    }

    #[test]
    fn frozen_decoder_passes_gradient_to_input_only() {
        type B = Autodiff<TestBackend>;
        let device = Default::default();
        let frozen = FrozenDecoder::new(TrajectoryDecoder::<B>::new(
            DecoderConfig::new(3, 2, 4).with_hidden(8),
            &device,
        ));

        let latent = Tensor::<B, 2>::ones([1, 3], &device).require_grad();
        let trajectory = frozen.decode(latent.clone());
        assert_eq!(trajectory.dims(), [1, 2, 4]);

        let grads = trajectory.sum().backward();
        assert!(latent.grad(&grads).is_some());
    }

    #[test]
    fn decoder_source_path() {
        let source = DecoderSource::new("/models", "mse_fc_v1", 3);
        assert_eq!(
            source.checkpoint_path().unwrap(),
            PathBuf::from("/models/mse_fc_v1/decoder_3.bin")
        );
    }

    #[test]
    fn decoder_source_rejects_non_positive_index() {
        for index in [0, -1] {
            let err = DecoderSource::new("/models", "v", index)
                .checkpoint_path()
                .unwrap_err();
            assert!(matches!(err, ModelError::InvalidModelIndex(i) if i == index));
        }
    }

    #[test]
    fn frozen_decoder_load_missing_checkpoint() {
        let err = FrozenDecoder::<TestBackend>::load(
            DecoderConfig::default(),
            Path::new("/no/such/decoder_1.bin"),
            &device(),
        )
        .unwrap_err();
        assert!(matches!(err, ModelError::CheckpointNotFound(_)));
    }
}
