//! Error types for the Winograd transform stage
//!
//! Every failure mode is a typed variant; nothing is reported through panics
//! or silent fallbacks. The taxonomy separates precondition violations
//! (detected before any device work), capability gaps (a reference path that
//! is deliberately not implemented for an element type), device compile or
//! dispatch failures, and computation faults reported by device-side code
//! through the error buffer after a kernel has run.

use thiserror::Error;

/// Result type for all tesela operations
pub type Result<T> = std::result::Result<T, TeselaError>;

/// Errors produced by the transform stage
#[derive(Debug, Clone, PartialEq, Error)]
pub enum TeselaError {
    /// Tensor shape violates a precondition (rank, dimension, or layout)
    #[error("Invalid shape: {reason}")]
    InvalidShape {
        /// Description of the violated constraint
        reason: String,
    },

    /// Data buffer size does not match the declared shape
    #[error("Data size {data_size} does not match shape {shape:?} (expected {expected})")]
    DataShapeMismatch {
        /// Actual number of elements supplied
        data_size: usize,
        /// Declared shape
        shape: Vec<usize>,
        /// Element count implied by the shape
        expected: usize,
    },

    /// Operation is not supported for this configuration
    ///
    /// Covers both rejected construction parameters (stride or dilation
    /// other than 1) and execution paths that are not implemented for a
    /// given element type. The latter is a build/configuration gap, not a
    /// runtime data problem, and is surfaced as a value so callers can
    /// negotiate capabilities instead of crashing.
    #[error("Unsupported operation '{operation}': {reason}")]
    UnsupportedOperation {
        /// Name of the rejected operation
        operation: String,
        /// Why it is unsupported
        reason: String,
    },

    /// Device rejected kernel compilation or work-group tuning
    #[error("Kernel build failed for '{kernel}': {reason}")]
    KernelBuild {
        /// Kernel name
        kernel: String,
        /// Device-reported reason
        reason: String,
    },

    /// Device rejected the dispatch of a compiled kernel
    #[error("Dispatch failed for '{kernel}': {reason}")]
    Dispatch {
        /// Kernel name
        kernel: String,
        /// Device-reported reason
        reason: String,
    },

    /// Device-side code reported a fault through the error buffer
    ///
    /// The kernel ran to completion but detected an invalid internal state.
    /// Distinct from [`TeselaError::Dispatch`]: dispatch succeeded, the
    /// computation itself failed.
    #[error("Computation fault reported by device (code {code})")]
    ComputeFault {
        /// Non-zero fault word read back from the device error buffer
        code: u32,
    },
}
