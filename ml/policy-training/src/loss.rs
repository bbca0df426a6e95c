//! Positional loss and host/tensor conversions.

use burn::nn::loss::{MseLoss, Reduction};
use burn::prelude::Backend;
use burn::tensor::{ElementConversion, Tensor, TensorData};
use policy_dataset::Batch;

/// Mean squared error over every coordinate of `[batch, 3]` positions.
pub fn position_mse<B: Backend>(predicted: Tensor<B, 2>, target: Tensor<B, 2>) -> Tensor<B, 1> {
    MseLoss::new().forward(predicted, target, Reduction::Mean)
}

/// Reads a single-element tensor back to the host.
pub fn scalar<B: Backend>(tensor: Tensor<B, 1>) -> f32 {
    tensor.into_scalar().elem::<f32>()
}

/// Root of a mean squared error: the average error distance.
#[must_use]
pub fn error_distance(mse: f32) -> f32 {
    mse.max(0.0).sqrt()
}

/// `[batch, 3]` tensor rows as host points.
pub fn to_points<B: Backend>(tensor: Tensor<B, 2>) -> Vec<[f32; 3]> {
    tensor
        .into_data()
        .convert::<f32>()
        .to_vec::<f32>()
        .unwrap_or_default()
        .chunks_exact(3)
        .map(|p| [p[0], p[1], p[2]])
        .collect()
}

/// `[batch, n]` tensor rows as host vectors.
pub fn to_rows<B: Backend>(tensor: Tensor<B, 2>) -> Vec<Vec<f32>> {
    let [_, width] = tensor.dims();
    tensor
        .into_data()
        .convert::<f32>()
        .to_vec::<f32>()
        .unwrap_or_default()
        .chunks_exact(width.max(1))
        .map(<[f32]>::to_vec)
        .collect()
}

/// Builds `(inputs, targets)` tensors from a collated batch.
pub fn batch_tensors<B: Backend>(batch: &Batch, device: &B::Device) -> (Tensor<B, 2>, Tensor<B, 2>) {
    let inputs = Tensor::from_data(
        TensorData::new(batch.inputs.clone(), [batch.len, batch.input_dim]),
        device,
    );
    let targets = Tensor::from_data(TensorData::new(batch.targets.clone(), [batch.len, 3]), device);
    (inputs, targets)
}
