//! Decoder snapshots on disk feeding the frozen decode + kinematics path.

#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]

use burn::backend::{Autodiff, NdArray};
use burn::tensor::{Tensor, TensorData};
use policy_models::prelude::*;
use policy_models::ConvHead;

type B = Autodiff<NdArray<f32>>;

fn flat(tensor: Tensor<B, 3>) -> Vec<f32> {
    tensor.into_data().to_vec::<f32>().unwrap()
}

#[test]
fn decoder_snapshot_loads_from_source_layout() {
    let root = tempfile::tempdir().unwrap();
    let device = Default::default();
    let config = DecoderConfig::new(5, 7, 24).with_hidden(16);

    let source = DecoderSource::new(root.path(), "mse_fc_v1", 2);
    let path = source.checkpoint_path().unwrap();
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();

    let trained = TrajectoryDecoder::<B>::new(config, &device);
    save_checkpoint(&trained, &path).unwrap();

    let frozen = FrozenDecoder::<B>::load(config, &path, &device).unwrap();
    let latent = Tensor::<B, 2>::from_data(
        TensorData::new(vec![0.1, -0.2, 0.3, 0.0, 1.0], [1, 5]),
        &device,
    );
    let reference = FrozenDecoder::new(trained);
    assert_eq!(flat(frozen.decode(latent.clone())), flat(reference.decode(latent)));
}

#[test]
fn conv_decoder_snapshot_roundtrip() {
    let root = tempfile::tempdir().unwrap();
    let device = Default::default();
    let config = DecoderConfig::new(5, 7, 24)
        .with_hidden(16)
        .with_conv(ConvHead::default());
    let path = root.path().join("decoder_1.json");

    save_checkpoint(&TrajectoryDecoder::<B>::new(config, &device), &path).unwrap();
    let frozen = FrozenDecoder::<B>::load(config, &path, &device).unwrap();
    assert_eq!(frozen.joints(), 7);
    assert_eq!(frozen.actions(), 24);
}

#[test]
fn corrupted_snapshot_is_a_load_error() {
    let root = tempfile::tempdir().unwrap();
    let path = root.path().join("decoder_1.bin");
    std::fs::write(&path, b"not a burn record").unwrap();

    let err = FrozenDecoder::<B>::load(DecoderConfig::default(), &path, &Default::default())
        .unwrap_err();
    assert!(matches!(err, ModelError::LoadCheckpoint { .. }));
}

#[test]
fn gradients_reach_predictor_through_frozen_decoder() {
    let device = Default::default();
    let predictor = Predictor::<B>::new(PredictorConfig::new(13, 5).with_hidden(16), &device);
    let decoder = FrozenDecoder::new(TrajectoryDecoder::<B>::new(
        DecoderConfig::new(5, 7, 24).with_hidden(16),
        &device,
    ));
    let chain = KinematicChain::franka_panda();

    let latent = predictor.forward(Tensor::ones([3, 13], &device));
    let joints = decoder
        .decode(latent)
        .slice([0..3, 0..7, 23..24])
        .reshape([3, 7]);
    let positions = chain.end_effector_positions(joints).unwrap();
    let grads = positions.sum().backward();

    let grads = burn::optim::GradientsParams::from_grads(grads, &predictor);
    assert!(!grads.is_empty());
}
