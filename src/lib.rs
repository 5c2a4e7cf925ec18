//! # Tesela
//!
//! Winograd transform stage for an accelerated 3×3, stride-1 convolution
//! path inside a neural-network inference engine.
//!
//! Tesela (Spanish: "mosaic tile") projects activation tensors into the
//! Winograd basis, where convolution reduces to an elementwise
//! multiply-accumulate per coordinate, and projects matmul results back to
//! the spatial domain with bias and activation fused into the write. Each
//! functor is polymorphic over an execution strategy: a synchronous
//! reference path, or an accelerated path that compiles device kernels,
//! tunes work-group sizes, caches both per input shape, and surfaces
//! device-side faults through an error-buffer readback.
//!
//! ## Example
//!
//! ```
//! use tesela::{
//!     Completion, Padding, Tensor, TransformConfig, WinogradTransform,
//! };
//!
//! let config = TransformConfig::new(Padding::Same);
//! let mut functor = WinogradTransform::<f32>::reference(config);
//!
//! let input = Tensor::zeros(vec![1, 8, 8, 3]).unwrap();
//! let out_shape = functor.output_shape(input.shape()).unwrap();
//! assert_eq!(out_shape, vec![36, 3, 4]); // 36 coords, 3 channels, 2x2 tiles
//!
//! let mut output = Tensor::zeros(out_shape).unwrap();
//! let completion = Completion::new();
//! functor.transform(&input, &mut output, &completion).unwrap();
//! let stats = completion.wait().unwrap();
//! assert!(stats.run_micros < u64::MAX);
//! ```
//!
//! ## Error contract
//!
//! Every failure is a typed [`TeselaError`]: precondition violations are
//! caught before any device work, a missing reference kernel for an
//! element type is a negotiable `UnsupportedOperation` rather than an
//! abort, and device faults reported after execution are distinct from
//! dispatch failures. Nothing is silently swallowed; a numeric kernel that
//! proceeds with wrong values is the worst possible outcome for an
//! inference engine.

#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::cast_precision_loss)] // index -> f32 in test fixtures
#![allow(clippy::must_use_candidate)]
#![allow(clippy::missing_panics_doc)] // lock poisoning is handled, not propagated
#![allow(clippy::float_cmp)] // exact comparisons against written constants in tests
#![allow(clippy::uninlined_format_args)]

pub mod activation;
pub mod completion;
pub mod device;
pub mod dtype;
pub mod error;
pub mod padding;
pub mod tensor;
pub mod winograd;

pub use activation::Activation;
pub use completion::{Completion, DeviceTiming};
pub use device::{ComputeDevice, Executor, KernelCache, MockDevice};
pub use dtype::{DataType, Element};
pub use error::{Result, TeselaError};
pub use padding::{Padding, PadAmounts};
pub use tensor::Tensor;
pub use winograd::{
    filter_output_shape, transform_filter, InverseConfig, TransformConfig, WinogradInverseTransform,
    WinogradTransform, WinogradVariant,
};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(VERSION.starts_with("0."));
        assert!(VERSION.contains('.'));
    }
}
