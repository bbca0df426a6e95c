//! Cartesian poses for end-effector targets.

use nalgebra::{Point3, Quaternion, UnitQuaternion};
use serde::{Deserialize, Serialize};

use crate::error::{Result, TypesError};

/// Position plus orientation of a robot tool frame.
///
/// Orientation is stored as a unit quaternion. Positions are in metres in
/// the robot base frame.
///
/// # Example
///
/// ```
/// use policy_types::Pose;
///
/// let pose = Pose::from_euler([0.4, 0.0, 0.1], 0.0, 0.0, 0.0);
/// assert_eq!(pose.position(), [0.4, 0.0, 0.1]);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Pose {
    /// Position `[x, y, z]`.
    pub position: Point3<f32>,

    /// Orientation.
    pub orientation: UnitQuaternion<f32>,
}

impl Pose {
    /// Creates a pose from a position and an `[x, y, z, w]` quaternion.
    ///
    /// The quaternion is normalized.
    ///
    /// # Errors
    ///
    /// Returns [`TypesError::ZeroQuaternion`] if the quaternion has (near)
    /// zero norm.
    pub fn new(position: [f32; 3], orientation_xyzw: [f32; 4]) -> Result<Self> {
        let [x, y, z, w] = orientation_xyzw;
        let orientation = UnitQuaternion::try_new(Quaternion::new(w, x, y, z), 1e-8)
            .ok_or(TypesError::ZeroQuaternion)?;
        Ok(Self {
            position: Point3::from(position),
            orientation,
        })
    }

    /// Creates a pose from roll/pitch/yaw in radians (static XYZ axes).
    #[must_use]
    pub fn from_euler(position: [f32; 3], roll: f32, pitch: f32, yaw: f32) -> Self {
        Self {
            position: Point3::from(position),
            orientation: UnitQuaternion::from_euler_angles(roll, pitch, yaw),
        }
    }

    /// Returns the position as `[x, y, z]`.
    #[must_use]
    pub fn position(&self) -> [f32; 3] {
        [self.position.x, self.position.y, self.position.z]
    }

    /// Returns the orientation as `[x, y, z, w]`.
    #[must_use]
    pub fn orientation_xyzw(&self) -> [f32; 4] {
        let q = self.orientation.quaternion();
        [q.i, q.j, q.k, q.w]
    }

    /// Euclidean distance between two positions.
    #[must_use]
    pub fn distance_to(&self, other: &Self) -> f32 {
        nalgebra::distance(&self.position, &other.position)
    }
}

impl std::fmt::Display for Pose {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "x: {:.4}, y: {:.4}, z: {:.4}",
            self.position.x, self.position.y, self.position.z
        )
    }
}
