//! Padding policy for the stride-1 convolution path
//!
//! SAME padding preserves the spatial size of the input; VALID applies none.
//! Explicit amounts may be supplied by the caller instead of being computed.
//! Only stride 1 is handled here, which is the only stride the Winograd
//! algebra is valid for.

use serde::{Deserialize, Serialize};

/// Padding descriptor for a convolution
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Padding {
    /// No padding; output shrinks by `filter - 1` per spatial axis
    Valid,
    /// Computed padding so output spatial size equals input spatial size
    Same,
    /// Caller-supplied padding amounts
    Explicit {
        /// Rows added above the input
        top: usize,
        /// Columns added left of the input
        left: usize,
        /// Rows added below the input
        bottom: usize,
        /// Columns added right of the input
        right: usize,
    },
}

/// Resolved per-edge padding amounts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PadAmounts {
    /// Rows above
    pub top: usize,
    /// Columns left
    pub left: usize,
    /// Rows below
    pub bottom: usize,
    /// Columns right
    pub right: usize,
}

/// Compute effective padding for a square `filter` at stride 1
///
/// SAME splits the total of `filter - 1` with the smaller half on the
/// top/left edge, so output coordinates line up with the input origin.
#[must_use]
pub fn compute_padding(padding: &Padding, filter: usize) -> PadAmounts {
    match *padding {
        Padding::Valid => PadAmounts::default(),
        Padding::Same => {
            let total = filter - 1;
            let lead = total / 2;
            PadAmounts {
                top: lead,
                left: lead,
                bottom: total - lead,
                right: total - lead,
            }
        }
        Padding::Explicit {
            top,
            left,
            bottom,
            right,
        } => PadAmounts {
            top,
            left,
            bottom,
            right,
        },
    }
}

/// Convolution output spatial size for one axis at stride 1
///
/// Saturates to zero when the padded input is smaller than the filter;
/// callers treat a zero dimension as a shape error.
#[must_use]
pub fn output_dim(input: usize, filter: usize, lead: usize, trail: usize) -> usize {
    (input + lead + trail + 1).saturating_sub(filter)
}

/// Output `(height, width)` for a padded stride-1 convolution
#[must_use]
pub fn output_dims(padding: &Padding, in_h: usize, in_w: usize, filter: usize) -> (usize, usize) {
    let amounts = compute_padding(padding, filter);
    (
        output_dim(in_h, filter, amounts.top, amounts.bottom),
        output_dim(in_w, filter, amounts.left, amounts.right),
    )
}
