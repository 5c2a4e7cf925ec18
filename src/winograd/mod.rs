//! Winograd transform pair for 3×3, stride-1 convolution
//!
//! The convolution is rewritten as three stages: a forward transform of the
//! NHWC activation into Winograd-domain tiles, an elementwise
//! multiply-accumulate against pre-transformed filters (performed by the
//! engine's matmul, outside this crate), and an inverse transform back to
//! the spatial domain with bias and activation fused in.
//!
//! # Declared layouts
//!
//! Both functors and the external matmul agree on coordinate-major layouts:
//!
//! - forward output / matmul right operand: `[coords, in_c, batch·tiles]`
//! - transformed filter / matmul left operand: `[coords, out_c, in_c]`
//! - matmul result / inverse input: `[coords, out_c, batch·tiles]`
//!
//! so the matmul is one `[out_c, in_c] × [in_c, tiles]` product per
//! Winograd coordinate. Tiles are ordered batch-major, then tile row, then
//! tile column.

pub mod inverse;
pub(crate) mod kernels;
pub mod transform;
pub mod variant;

pub use inverse::{InverseConfig, WinogradInverseTransform};
pub use transform::{
    filter_output_shape, transform_filter, TransformConfig, WinogradTransform,
};
pub use variant::{WinogradVariant, FILTER_SIZE};
