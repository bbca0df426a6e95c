//! Min-max statistics for scalar channels.

use serde::{Deserialize, Serialize};

use crate::error::{Result, TypesError};

/// Observed `[min, max]` of one scalar channel.
///
/// Used to min-max normalize camera parameters across a whole assembled
/// dataset. Statistics are computed once over every sample; building a
/// range from a single repeated value is an error rather than a silent
/// division by zero.
///
/// # Example
///
/// ```
/// use policy_types::ChannelRange;
///
/// let range = ChannelRange::from_values("distance", &[1.0, 2.0, 3.0]).unwrap();
/// assert!((range.normalize(1.0) - 0.0).abs() < 1e-6);
/// assert!((range.normalize(3.0) - 1.0).abs() < 1e-6);
/// assert!((range.normalize(2.0) - 0.5).abs() < 1e-6);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ChannelRange {
    /// Smallest observed value.
    pub min: f32,

    /// Largest observed value.
    pub max: f32,
}

impl ChannelRange {
    /// Computes the range of `values`.
    ///
    /// # Errors
    ///
    /// - [`TypesError::EmptyRange`] if `values` is empty
    /// - [`TypesError::NonFinite`] if any value is `NaN` or infinite
    /// - [`TypesError::DegenerateRange`] if all values are equal
    pub fn from_values(channel: &str, values: &[f32]) -> Result<Self> {
        if values.is_empty() {
            return Err(TypesError::empty_range(channel));
        }
        if values.iter().any(|v| !v.is_finite()) {
            return Err(TypesError::non_finite(channel));
        }

        let (min, max) = values
            .iter()
            .fold((f32::INFINITY, f32::NEG_INFINITY), |(lo, hi), &v| {
                (lo.min(v), hi.max(v))
            });

        if max <= min {
            return Err(TypesError::degenerate_range(channel, min));
        }

        Ok(Self { min, max })
    }

    /// Width of the range (`max - min`).
    #[must_use]
    pub fn span(&self) -> f32 {
        self.max - self.min
    }

    /// Maps `value` to `(value - min) / (max - min)`.
    #[must_use]
    pub fn normalize(&self, value: f32) -> f32 {
        (value - self.min) / self.span()
    }

    /// Normalizes every value in place.
    pub fn normalize_all(&self, values: &mut [f32]) {
        let span = self.span();
        for v in values {
            *v = (*v - self.min) / span;
        }
    }
}
