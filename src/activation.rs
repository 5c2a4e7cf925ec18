//! Activation descriptor fused into the inverse transform
//!
//! The inverse-transform functor applies the activation in the same pass
//! that writes spatial output, so no separate elementwise kernel runs.

use serde::{Deserialize, Serialize};

/// Activation applied to the convolution output
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum Activation {
    /// No activation
    Identity,
    /// Clip to `[0, +inf)`
    Relu,
    /// Clip to `[0, limit]`
    Relux {
        /// Upper bound of the clipped range
        limit: f32,
    },
}

impl Activation {
    /// Apply the activation to one value
    #[must_use]
    pub fn apply(&self, value: f32) -> f32 {
        match *self {
            Activation::Identity => value,
            Activation::Relu => value.max(0.0),
            Activation::Relux { limit } => value.clamp(0.0, limit),
        }
    }
}

impl Default for Activation {
    fn default() -> Self {
        Activation::Identity
    }
}
