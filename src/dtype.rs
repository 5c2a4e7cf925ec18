//! Element types and capability negotiation
//!
//! The transform kernels compute in f32; tensors of other element types are
//! staged through f32 on the way in and out. Whether the *reference*
//! execution path exists for a given element type is a capability, not an
//! assumption: half precision is accelerated-only, and asking the reference
//! path to process it yields a typed `UnsupportedOperation` rather than an
//! abort.

use half::f16;
use num_traits::Num;

/// Element type of a tensor, carried in kernel specs for compilation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DataType {
    /// 32-bit IEEE float
    F32,
    /// 16-bit IEEE float (accelerated path only)
    F16,
}

impl DataType {
    /// Whether an in-process reference kernel exists for this element type
    #[must_use]
    pub fn reference_supported(self) -> bool {
        matches!(self, DataType::F32)
    }

    /// Lowercase name used in kernel identifiers
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            DataType::F32 => "f32",
            DataType::F16 => "f16",
        }
    }
}

/// Tensor element usable by the transform functors
pub trait Element: Num + Copy + Send + Sync + 'static {
    /// Data type tag for this element
    const DTYPE: DataType;

    /// Widen to f32 for kernel computation
    fn to_f32(self) -> f32;

    /// Narrow from f32 after kernel computation
    fn from_f32(value: f32) -> Self;
}

impl Element for f32 {
    const DTYPE: DataType = DataType::F32;

    fn to_f32(self) -> f32 {
        self
    }

    fn from_f32(value: f32) -> Self {
        value
    }
}

impl Element for f16 {
    const DTYPE: DataType = DataType::F16;

    fn to_f32(self) -> f32 {
        f16::to_f32(self)
    }

    fn from_f32(value: f32) -> Self {
        f16::from_f32(value)
    }
}
