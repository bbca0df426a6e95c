//! Frozen decoder plus forward kinematics: predicted latent to end-effector
//! position.

use burn::prelude::Backend;
use burn::tensor::Tensor;
use burn::tensor::backend::AutodiffBackend;
use policy_models::{FrozenDecoder, KinematicChain, ModelError};
use policy_types::AngleRange;

use crate::error::Result;

/// Maps action latents to end-effector positions.
///
/// The decoder emits a normalized trajectory `[batch, joints, actions]`.
/// Only the final time step is used: it is unnormalized with the decoder's
/// angle range and passed through the kinematic chain.
#[derive(Debug, Clone)]
pub struct PolicyPipeline<B: Backend> {
    decoder: FrozenDecoder<B>,
    chain: KinematicChain,
    angles: AngleRange,
}

impl<B: Backend> PolicyPipeline<B> {
    /// Creates a pipeline.
    ///
    /// # Errors
    ///
    /// Returns [`crate::TrainingError::Model`] if the decoder and chain
    /// disagree on the joint count.
    pub fn new(decoder: FrozenDecoder<B>, chain: KinematicChain, angles: AngleRange) -> Result<Self> {
        if decoder.joints() != chain.num_joints() {
            return Err(ModelError::shape_mismatch(
                format!("{} joints (kinematic chain)", chain.num_joints()),
                format!("{} joints (decoder)", decoder.joints()),
            )
            .into());
        }
        Ok(Self {
            decoder,
            chain,
            angles,
        })
    }

    /// The kinematic chain.
    #[must_use]
    pub const fn chain(&self) -> &KinematicChain {
        &self.chain
    }

    /// The joint-angle range.
    #[must_use]
    pub const fn angles(&self) -> AngleRange {
        self.angles
    }

    /// Final joint angles (rad) of the decoded trajectories, `[batch, joints]`.
    pub fn joint_angles(&self, latent: Tensor<B, 2>) -> Tensor<B, 2> {
        let trajectory = self.decoder.decode(latent);
        let [batch, joints, actions] = trajectory.dims();
        trajectory
            .slice([0..batch, 0..joints, actions - 1..actions])
            .reshape([batch, joints])
            .mul_scalar(self.angles.span())
            .add_scalar(self.angles.min)
    }

    /// End-effector positions `[batch, 3]` for action latents.
    ///
    /// # Errors
    ///
    /// Propagates kinematic shape errors.
    pub fn end_effector(&self, latent: Tensor<B, 2>) -> Result<Tensor<B, 2>> {
        Ok(self.chain.end_effector_positions(self.joint_angles(latent))?)
    }
}

impl<B: AutodiffBackend> PolicyPipeline<B> {
    /// The same pipeline on the inner backend.
    #[must_use]
    pub fn valid(&self) -> PolicyPipeline<B::InnerBackend> {
        PolicyPipeline {
            decoder: self.decoder.valid(),
            chain: self.chain.clone(),
            angles: self.angles,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loss::{position_mse, scalar, to_rows};
    use approx::assert_relative_eq;
    use burn::backend::{Autodiff, NdArray};
    use burn::tensor::{Distribution, TensorData};
    use policy_models::{DecoderConfig, Predictor, PredictorConfig, TrajectoryDecoder};

    type TestBackend = NdArray<f32>;

    fn pipeline<B: Backend>(device: &B::Device) -> PolicyPipeline<B> {
        let decoder = FrozenDecoder::new(TrajectoryDecoder::new(
            DecoderConfig::new(5, 7, 24).with_hidden(32),
            device,
        ));
        PolicyPipeline::new(decoder, KinematicChain::franka_panda(), AngleRange::FULL_TURN).unwrap()
    }

    #[test]
    fn joint_count_must_match_chain() {
        let device = Default::default();
        let decoder = FrozenDecoder::<TestBackend>::new(TrajectoryDecoder::new(
            DecoderConfig::new(5, 6, 24),
            &device,
        ));
        let err =
            PolicyPipeline::new(decoder, KinematicChain::franka_panda(), AngleRange::FULL_TURN)
                .unwrap_err();
        assert!(err.to_string().contains("joints"));
    }

    #[test]
    fn joint_angles_use_last_step_unnormalized() {
        let device = Default::default();
        let pipeline = pipeline::<TestBackend>(&device);
        let latent = Tensor::<TestBackend, 2>::random([3, 5], Distribution::Normal(0.0, 1.0), &device);

        let trajectory = pipeline.decoder.decode(latent.clone());
        let last: Vec<f32> = trajectory
            .into_data()
            .to_vec::<f32>()
            .unwrap()
            .chunks_exact(24)
            .map(|row| row[23])
            .collect();

        let angles = to_rows(pipeline.joint_angles(latent));
        assert_eq!(angles.len(), 3);
        for (row, chunk) in angles.iter().zip(last.chunks_exact(7)) {
            for (&angle, &normalized) in row.iter().zip(chunk) {
                assert_relative_eq!(angle, AngleRange::FULL_TURN.unnormalize(normalized), epsilon = 1e-5);
                assert!(angle.abs() <= std::f32::consts::PI + 1e-5);
            }
        }
    }

    #[test]
    fn end_effector_matches_host_kinematics() {
        let device = Default::default();
        let pipeline = pipeline::<TestBackend>(&device);
        let latent = Tensor::<TestBackend, 2>::from_data(
            TensorData::new(vec![0.1, -0.2, 0.3, 0.0, 0.5], [1, 5]),
            &device,
        );
        let joints = to_rows(pipeline.joint_angles(latent.clone()));
        let expected = pipeline.chain().host_position(&joints[0]).unwrap();
        let positions = to_rows(pipeline.end_effector(latent).unwrap());
        for axis in 0..3 {
            assert_relative_eq!(f64::from(positions[0][axis]), expected[axis], epsilon = 1e-4);
        }
    }

    #[test]
    fn oracle_latents_beat_random_predictor() {
        type B = Autodiff<TestBackend>;
        let device = Default::default();
        let pipeline = pipeline::<B>(&device);

        let true_latents = Tensor::<B, 2>::random([16, 5], Distribution::Normal(0.0, 1.0), &device);
        let targets = pipeline.end_effector(true_latents.clone()).unwrap().detach();

        let oracle = scalar(position_mse(
            pipeline.end_effector(true_latents).unwrap(),
            targets.clone(),
        ));

        let predictor = Predictor::<B>::new(PredictorConfig::new(13, 5), &device);
        let inputs = Tensor::<B, 2>::random([16, 13], Distribution::Normal(0.0, 1.0), &device);
        let random = scalar(position_mse(
            pipeline.end_effector(predictor.forward(inputs)).unwrap(),
            targets,
        ));

        assert!(oracle <= random);
        assert_relative_eq!(oracle, 0.0, epsilon = 1e-10);
    }

    #[test]
    fn valid_pipeline_agrees_with_autodiff_pipeline() {
        type B = Autodiff<TestBackend>;
        let device = Default::default();
        let pipeline = pipeline::<B>(&device);
        let values = vec![0.3, 0.1, -0.4, 0.2, 0.0];

        let latent = Tensor::<B, 2>::from_data(TensorData::new(values.clone(), [1, 5]), &device);
        let inner_latent =
            Tensor::<TestBackend, 2>::from_data(TensorData::new(values, [1, 5]), &device);

        let a = to_rows(pipeline.end_effector(latent).unwrap());
        let b = to_rows(pipeline.valid().end_effector(inner_latent).unwrap());
        for (x, y) in a[0].iter().zip(&b[0]) {
            assert_relative_eq!(x, y, epsilon = 1e-6);
        }
    }
}
