//! Differentiable forward kinematics for serial arms.
//!
//! Links follow the modified Denavit-Hartenberg convention (Craig):
//!
//! ```text
//! T_i = RotX(alpha) * TransX(a) * RotZ(theta) * TransZ(d)
//! ```
//!
//! [`KinematicChain::end_effector_positions`] evaluates the chain with burn
//! tensor ops so gradients flow back to the joint angles. The `host_*`
//! methods evaluate the same chain with nalgebra for reference checks.

use burn::prelude::Backend;
use burn::tensor::Tensor;
use nalgebra::{Matrix3, Matrix4, Rotation3, UnitQuaternion};
use policy_types::Pose;
use serde::{Deserialize, Serialize};

use crate::error::{ModelError, Result};

/// One modified DH link.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DhLink {
    /// Link length along the previous x axis (m).
    pub a: f32,

    /// Link offset along the new z axis (m).
    pub d: f32,

    /// Twist about the previous x axis (rad).
    pub alpha: f32,

    /// Constant added to the joint angle (rad).
    pub theta_offset: f32,
}

impl DhLink {
    /// Creates a link with zero joint offset.
    #[must_use]
    pub const fn new(a: f32, d: f32, alpha: f32) -> Self {
        Self {
            a,
            d,
            alpha,
            theta_offset: 0.0,
        }
    }

    /// Batched link transforms for joint angles `theta` of shape `[batch, 1]`.
    fn transform<B: Backend>(&self, theta: Tensor<B, 2>) -> Tensor<B, 3> {
        let [batch, _] = theta.dims();
        let device = theta.device();
        let theta = theta.add_scalar(self.theta_offset);
        let (sa, ca) = self.alpha.sin_cos();
        let c = theta.clone().cos();
        let s = theta.sin();
        let constant = |value: f32| Tensor::<B, 2>::full([batch, 1], value, &device);

        let entries = vec![
            c.clone(),
            s.clone().neg(),
            constant(0.0),
            constant(self.a),
            s.clone().mul_scalar(ca),
            c.clone().mul_scalar(ca),
            constant(-sa),
            constant(-sa * self.d),
            s.mul_scalar(sa),
            c.mul_scalar(sa),
            constant(ca),
            constant(ca * self.d),
            constant(0.0),
            constant(0.0),
            constant(0.0),
            constant(1.0),
        ];
        Tensor::cat(entries, 1).reshape([batch, 4, 4])
    }

    fn host_transform(&self, theta: f64) -> Matrix4<f64> {
        let theta = theta + f64::from(self.theta_offset);
        let (st, ct) = theta.sin_cos();
        let (sa, ca) = f64::from(self.alpha).sin_cos();
        let a = f64::from(self.a);
        let d = f64::from(self.d);
        #[rustfmt::skip]
        let m = Matrix4::new(
            ct,      -st,      0.0, a,
            st * ca, ct * ca, -sa,  -sa * d,
            st * sa, ct * sa,  ca,  ca * d,
            0.0,     0.0,      0.0, 1.0,
        );
        m
    }
}

/// Serial chain of revolute joints plus an optional fixed flange.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KinematicChain {
    links: Vec<DhLink>,
    flange: Option<DhLink>,
}

impl KinematicChain {
    /// Creates a chain.
    ///
    /// # Errors
    ///
    /// Returns [`ModelError::InvalidConfig`] if `links` is empty.
    pub fn new(links: Vec<DhLink>, flange: Option<DhLink>) -> Result<Self> {
        if links.is_empty() {
            return Err(ModelError::invalid_config("kinematic chain has no joints"));
        }
        Ok(Self { links, flange })
    }

    /// Franka Emika Panda: 7 joints plus the flange.
    #[must_use]
    pub fn franka_panda() -> Self {
        use std::f32::consts::FRAC_PI_2;
        Self {
            links: vec![
                DhLink::new(0.0, 0.333, 0.0),
                DhLink::new(0.0, 0.0, -FRAC_PI_2),
                DhLink::new(0.0, 0.316, FRAC_PI_2),
                DhLink::new(0.0825, 0.0, FRAC_PI_2),
                DhLink::new(-0.0825, 0.384, -FRAC_PI_2),
                DhLink::new(0.0, 0.0, FRAC_PI_2),
                DhLink::new(0.088, 0.0, FRAC_PI_2),
            ],
            flange: Some(DhLink::new(0.0, 0.107, 0.0)),
        }
    }

    /// Number of actuated joints.
    #[must_use]
    pub fn num_joints(&self) -> usize {
        self.links.len()
    }

    fn check_joints(&self, actual: usize) -> Result<()> {
        if actual == self.links.len() {
            Ok(())
        } else {
            Err(ModelError::shape_mismatch(
                format!("{} joint angles", self.links.len()),
                format!("{actual} joint angles"),
            ))
        }
    }

    /// End-effector positions for joint angles `[batch, joints]` (rad).
    ///
    /// Returns `[batch, 3]`.
    ///
    /// # Errors
    ///
    /// Returns [`ModelError::ShapeMismatch`] if the joint count differs
    /// from the chain's.
    pub fn end_effector_positions<B: Backend>(&self, joints: Tensor<B, 2>) -> Result<Tensor<B, 2>> {
        let [batch, n] = joints.dims();
        self.check_joints(n)?;

        let mut transform: Option<Tensor<B, 3>> = None;
        for (i, link) in self.links.iter().enumerate() {
            let local = link.transform(joints.clone().slice([0..batch, i..i + 1]));
            transform = Some(match transform {
                Some(t) => t.matmul(local),
                None => local,
            });
        }
        let mut transform = transform
            .ok_or_else(|| ModelError::invalid_config("kinematic chain has no joints"))?;
        if let Some(flange) = &self.flange {
            let zero = Tensor::<B, 2>::zeros([batch, 1], &joints.device());
            transform = transform.matmul(flange.transform(zero));
        }

        Ok(transform.slice([0..batch, 0..3, 3..4]).reshape([batch, 3]))
    }

    /// Homogeneous end-effector transform on the host.
    ///
    /// # Errors
    ///
    /// Returns [`ModelError::ShapeMismatch`] if the joint count differs.
    pub fn host_transform(&self, joints: &[f32]) -> Result<Matrix4<f64>> {
        self.check_joints(joints.len())?;
        let mut t = self
            .links
            .iter()
            .zip(joints)
            .fold(Matrix4::identity(), |t, (link, &q)| {
                t * link.host_transform(f64::from(q))
            });
        if let Some(flange) = &self.flange {
            t *= flange.host_transform(0.0);
        }
        Ok(t)
    }

    /// End-effector position `[x, y, z]` on the host.
    ///
    /// # Errors
    ///
    /// Returns [`ModelError::ShapeMismatch`] if the joint count differs.
    pub fn host_position(&self, joints: &[f32]) -> Result<[f64; 3]> {
        let t = self.host_transform(joints)?;
        Ok([t[(0, 3)], t[(1, 3)], t[(2, 3)]])
    }

    /// End-effector pose on the host.
    ///
    /// # Errors
    ///
    /// Returns [`ModelError::ShapeMismatch`] if the joint count differs.
    #[allow(clippy::cast_possible_truncation)]
    pub fn host_pose(&self, joints: &[f32]) -> Result<Pose> {
        let t = self.host_transform(joints)?;
        let rotation: Matrix3<f64> = t.fixed_view::<3, 3>(0, 0).into_owned();
        let q = UnitQuaternion::from_rotation_matrix(&Rotation3::from_matrix(&rotation));
        let q = q.quaternion();
        Pose::new(
            [t[(0, 3)] as f32, t[(1, 3)] as f32, t[(2, 3)] as f32],
            [q.i as f32, q.j as f32, q.k as f32, q.w as f32],
        )
        .map_err(|e| ModelError::invalid_config(e.to_string()))
    }
}
