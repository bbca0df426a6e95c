//! Camera parameters attached to every rendered view.

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::range::ChannelRange;

/// Orbit-camera parameters for one simulated view.
///
/// # Example
///
/// ```
/// use policy_types::CameraParams;
///
/// let cam = CameraParams::new(1.5, 90.0, -30.0);
/// assert_eq!(cam.to_array(), [1.5, 90.0, -30.0]);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CameraParams {
    /// Distance from the look-at point.
    pub distance: f32,

    /// Azimuth angle.
    pub azimuth: f32,

    /// Elevation angle.
    pub elevation: f32,
}

impl CameraParams {
    /// Creates camera parameters.
    #[must_use]
    pub const fn new(distance: f32, azimuth: f32, elevation: f32) -> Self {
        Self {
            distance,
            azimuth,
            elevation,
        }
    }

    /// Returns `[distance, azimuth, elevation]`.
    #[must_use]
    pub const fn to_array(&self) -> [f32; 3] {
        [self.distance, self.azimuth, self.elevation]
    }
}

/// Per-channel normalization statistics for camera parameters.
///
/// Each channel is normalized independently.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CameraStats {
    /// Range of camera distances.
    pub distance: ChannelRange,

    /// Range of azimuths.
    pub azimuth: ChannelRange,

    /// Range of elevations.
    pub elevation: ChannelRange,
}

impl CameraStats {
    /// Computes statistics over the three channel columns.
    ///
    /// # Errors
    ///
    /// Fails if any channel is empty, non-finite or degenerate.
    pub fn from_channels(distances: &[f32], azimuths: &[f32], elevations: &[f32]) -> Result<Self> {
        Ok(Self {
            distance: ChannelRange::from_values("camera distance", distances)?,
            azimuth: ChannelRange::from_values("azimuth", azimuths)?,
            elevation: ChannelRange::from_values("elevation", elevations)?,
        })
    }

    /// Normalizes one set of camera parameters.
    #[must_use]
    pub fn normalize(&self, cam: CameraParams) -> CameraParams {
        CameraParams {
            distance: self.distance.normalize(cam.distance),
            azimuth: self.azimuth.normalize(cam.azimuth),
            elevation: self.elevation.normalize(cam.elevation),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn camera_stats_normalize_independently() {
        let stats =
            CameraStats::from_channels(&[1.0, 3.0], &[0.0, 180.0], &[-45.0, 45.0]).unwrap();
        let cam = stats.normalize(CameraParams::new(2.0, 180.0, -45.0));

        assert_relative_eq!(cam.distance, 0.5);
        assert_relative_eq!(cam.azimuth, 1.0);
        assert_relative_eq!(cam.elevation, 0.0);
    }

    #[test]
    fn camera_stats_degenerate_channel() {
        let result = CameraStats::from_channels(&[1.0, 3.0], &[10.0, 10.0], &[-45.0, 45.0]);
        let err = result.unwrap_err();
        assert!(err.to_string().contains("azimuth"));
    }
}
