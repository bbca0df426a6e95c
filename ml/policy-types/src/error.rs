//! Error types for policy-types crate.

use thiserror::Error;

/// Errors that can occur when building policy value types.
#[derive(Debug, Error)]
pub enum TypesError {
    /// A min-max range collapsed to a single value.
    #[error("degenerate range for {channel}: min == max == {value}")]
    DegenerateRange {
        /// Name of the channel being normalized.
        channel: String,
        /// The single observed value.
        value: f32,
    },

    /// A range was built from no values at all.
    #[error("empty range for {0}")]
    EmptyRange(String),

    /// A range bound was `NaN` or infinite.
    #[error("non-finite value in {0}")]
    NonFinite(String),

    /// Invalid joint-angle range.
    #[error("invalid angle range: min {min} must be < max {max}")]
    InvalidAngleRange {
        /// Lower bound (radians).
        min: f32,
        /// Upper bound (radians).
        max: f32,
    },

    /// Quaternion could not be normalized.
    #[error("invalid orientation: quaternion has zero norm")]
    ZeroQuaternion,
}

impl TypesError {
    /// Creates a degenerate range error.
    #[must_use]
    pub fn degenerate_range(channel: impl Into<String>, value: f32) -> Self {
        Self::DegenerateRange {
            channel: channel.into(),
            value,
        }
    }

    /// Creates an empty range error.
    #[must_use]
    pub fn empty_range(channel: impl Into<String>) -> Self {
        Self::EmptyRange(channel.into())
    }

    /// Creates a non-finite value error.
    #[must_use]
    pub fn non_finite(channel: impl Into<String>) -> Self {
        Self::NonFinite(channel.into())
    }
}

/// Result type for policy-types operations.
pub type Result<T> = std::result::Result<T, TypesError>;
