//! Predictor network: observation latent (plus camera) to action latent.

use burn::module::Module;
use burn::nn;
use burn::prelude::Backend;
use burn::tensor::Tensor;
use burn::tensor::activation::relu;
use serde::{Deserialize, Serialize};

use crate::error::{ModelError, Result};

/// Configuration for the predictor.
///
/// # Example
///
/// ```
/// use policy_models::PredictorConfig;
///
/// let config = PredictorConfig::new(13, 5);
/// assert_eq!(config.hidden, 128);
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PredictorConfig {
    /// Input width: observation latent, plus 3 in variable-camera mode.
    pub input_dim: usize,

    /// Number of hidden units per layer.
    pub hidden: usize,

    /// Output width: the decoder's latent dimension.
    pub latent_dim: usize,
}

impl Default for PredictorConfig {
    fn default() -> Self {
        Self::new(13, 5)
    }
}

impl PredictorConfig {
    /// Creates a configuration with the default hidden size.
    #[must_use]
    pub const fn new(input_dim: usize, latent_dim: usize) -> Self {
        Self {
            input_dim,
            hidden: 128,
            latent_dim,
        }
    }

    /// Sets the hidden size.
    #[must_use]
    pub const fn with_hidden(mut self, hidden: usize) -> Self {
        self.hidden = hidden;
        self
    }

    /// Checks that every dimension is positive.
    ///
    /// # Errors
    ///
    /// Returns [`ModelError::InvalidConfig`] naming the zero dimension.
    pub fn validate(&self) -> Result<()> {
        for (name, value) in [
            ("input_dim", self.input_dim),
            ("hidden", self.hidden),
            ("latent_dim", self.latent_dim),
        ] {
            if value == 0 {
                return Err(ModelError::invalid_config(format!("{name} must be > 0")));
            }
        }
        Ok(())
    }
}

/// Feedforward predictor.
///
/// Architecture: Input -> Linear -> `ReLU` -> Linear -> `ReLU` -> Linear
///
/// The output is unbounded; the decoder squashes it.
#[derive(Debug, Module)]
pub struct Predictor<B: Backend> {
    input: nn::Linear<B>,
    hidden: nn::Linear<B>,
    output: nn::Linear<B>,
}

impl<B: Backend> Predictor<B> {
    /// Creates a predictor with freshly initialized weights.
    #[must_use]
    pub fn new(config: PredictorConfig, device: &B::Device) -> Self {
        Self {
            input: nn::LinearConfig::new(config.input_dim, config.hidden).init(device),
            hidden: nn::LinearConfig::new(config.hidden, config.hidden).init(device),
            output: nn::LinearConfig::new(config.hidden, config.latent_dim).init(device),
        }
    }

    /// Runs the forward pass.
    ///
    /// `[batch, input_dim]` in, `[batch, latent_dim]` out.
    pub fn forward(&self, input: Tensor<B, 2>) -> Tensor<B, 2> {
        let x = relu(self.input.forward(input));
        let x = relu(self.hidden.forward(x));
        self.output.forward(x)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::NdArray;

    type TestBackend = NdArray<f32>;

    #[test]
    fn config_builder() {
        let config = PredictorConfig::new(10, 5).with_hidden(32);
        assert_eq!(config.input_dim, 10);
        assert_eq!(config.hidden, 32);
        assert_eq!(config.latent_dim, 5);
    }

    #[test]
    fn config_rejects_zero_dims() {
        let err = PredictorConfig::new(0, 5).validate().unwrap_err();
        assert!(err.to_string().contains("input_dim"));
        assert!(PredictorConfig::new(10, 5).with_hidden(0).validate().is_err());
    }

    #[test]
    fn config_serialization() {
        let config = PredictorConfig::new(13, 5);
        let json = serde_json::to_string(&config).unwrap();
        let parsed: PredictorConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, config);
    }

    #[test]
    fn predictor_forward_shape() {
        let device = <TestBackend as Backend>::Device::default();
        let model = Predictor::<TestBackend>::new(PredictorConfig::new(13, 5), &device);

        let output = model.forward(Tensor::zeros([4, 13], &device));
        assert_eq!(output.dims(), [4, 5]);
    }
}
