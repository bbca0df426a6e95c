//! Joint-angle range used to unnormalize decoder output.

use serde::{Deserialize, Serialize};

use crate::error::{Result, TypesError};

/// Global joint-angle bounds of a trajectory decoder.
///
/// Decoders emit joint angles in `[0, 1]`; the real angle is
/// `(max - min) * x + min`. The bounds come from the decoder's training
/// domain and are passed in as configuration.
///
/// # Example
///
/// ```
/// use policy_types::AngleRange;
///
/// let range = AngleRange::new(-2.0, 2.0).unwrap();
/// assert!((range.unnormalize(0.5)).abs() < 1e-6);
/// assert!((range.unnormalize(1.0) - 2.0).abs() < 1e-6);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AngleRange {
    /// Angle mapped from 0.0 (radians).
    pub min: f32,

    /// Angle mapped from 1.0 (radians).
    pub max: f32,
}

impl AngleRange {
    /// Creates a validated range.
    ///
    /// # Errors
    ///
    /// Returns [`TypesError::InvalidAngleRange`] unless `min < max` and both
    /// are finite.
    pub fn new(min: f32, max: f32) -> Result<Self> {
        if !(min.is_finite() && max.is_finite() && min < max) {
            return Err(TypesError::InvalidAngleRange { min, max });
        }
        Ok(Self { min, max })
    }

    /// `[-pi, pi]`.
    pub const FULL_TURN: Self = Self {
        min: -std::f32::consts::PI,
        max: std::f32::consts::PI,
    };

    /// Width of the range.
    #[must_use]
    pub fn span(&self) -> f32 {
        self.max - self.min
    }

    /// Maps a normalized angle back to radians.
    #[must_use]
    pub fn unnormalize(&self, normalized: f32) -> f32 {
        self.span().mul_add(normalized, self.min)
    }

    /// Maps radians into the normalized `[0, 1]` domain.
    #[must_use]
    pub fn normalize(&self, angle: f32) -> f32 {
        (angle - self.min) / self.span()
    }
}

impl Default for AngleRange {
    fn default() -> Self {
        Self::FULL_TURN
    }
}
