//! Device execution strategy for the transform functors
//!
//! Each functor is polymorphic over an [`Executor`] with two strategies:
//!
//! - **Reference** — direct, synchronous, in-process computation. No
//!   caching, no external device state. Only exists for element types whose
//!   reference kernels are implemented; others get a typed
//!   `UnsupportedOperation` instead of wrong numbers.
//! - **Accelerated** — offloads to a compute kernel behind the
//!   [`ComputeDevice`] trait, with a per-functor [`KernelCache`] keyed by
//!   input shape and an error-buffer readback after every dispatch.
//!
//! The trait is the seam to the real device runtime; a [`MockDevice`] that
//! executes the same kernels in-process and records every call stands in
//! for hardware in tests.

pub mod cache;
pub mod mock;

pub use cache::{CacheEntry, KernelCache};
pub use mock::{DeviceCall, MockDevice};

use std::time::Instant;

use crate::activation::Activation;
use crate::completion::DeviceTiming;
use crate::dtype::DataType;
use crate::error::{Result, TeselaError};
use crate::winograd::kernels;
use crate::winograd::WinogradVariant;

/// Work-group sizes offered to the device tuner
///
/// The device picks one; the pick must be deterministic for a given shape
/// and device so repeated runs reproduce.
pub const WORK_GROUP_CANDIDATES: &[u32] = &[8, 16, 32, 64, 128];

/// Which transform a kernel implements
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KernelFamily {
    /// Spatial input to Winograd-domain tiles
    InputTransform,
    /// Winograd-domain matmul result to spatial output
    InverseTransform,
}

impl KernelFamily {
    /// Short tag used in kernel identifiers
    #[must_use]
    pub fn tag(self) -> &'static str {
        match self {
            KernelFamily::InputTransform => "winograd_transform",
            KernelFamily::InverseTransform => "winograd_inverse_transform",
        }
    }
}

/// Scalar parameters baked into a compiled kernel
#[derive(Debug, Clone, PartialEq)]
pub enum KernelParams {
    /// Parameters for the forward input transform
    InputTransform {
        /// Rows of implicit zero padding above the input
        pad_top: usize,
        /// Columns of implicit zero padding left of the input
        pad_left: usize,
        /// Tile-grid rows
        tiles_h: usize,
        /// Tile-grid columns
        tiles_w: usize,
    },
    /// Parameters for the inverse transform
    InverseTransform {
        /// Output batch size
        batch: usize,
        /// Declared output height; tile overhang beyond it is discarded
        height: usize,
        /// Declared output width; tile overhang beyond it is discarded
        width: usize,
        /// Output channel count
        out_channels: usize,
        /// Activation fused into the spatial write
        activation: Activation,
    },
}

/// Everything the device needs to compile or fetch a kernel
#[derive(Debug, Clone, PartialEq)]
pub struct KernelSpec {
    /// Kernel family
    pub family: KernelFamily,
    /// Winograd variant the kernel is specialized for
    pub variant: WinogradVariant,
    /// Element type of the tensors, as staged on the device
    pub dtype: DataType,
    /// Input tensor shape the kernel is specialized for
    pub input_shape: Vec<usize>,
    /// Scalar parameters
    pub params: KernelParams,
}

impl KernelSpec {
    /// Canonical kernel name: family, variant, dtype, and shape
    #[must_use]
    pub fn kernel_name(&self) -> String {
        let dims: Vec<String> = self.input_shape.iter().map(ToString::to_string).collect();
        format!(
            "{}_{}_{}_{}",
            self.family.tag(),
            self.variant.tag(),
            self.dtype.name(),
            dims.join("x")
        )
    }
}

/// Buffer arguments for one kernel dispatch
///
/// Tensors are staged as f32; the functor converts on the way in and out.
pub struct KernelArgs<'a> {
    /// Input buffer
    pub input: &'a [f32],
    /// Optional bias buffer (inverse transform only)
    pub bias: Option<&'a [f32]>,
    /// Output buffer, fully overwritten on success
    pub output: &'a mut [f32],
}

/// Opaque handle to a compiled kernel, issued by the device
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KernelHandle {
    id: u64,
    name: String,
}

impl KernelHandle {
    /// Create a handle; called by device implementations
    #[must_use]
    pub fn new(id: u64, name: String) -> Self {
        Self { id, name }
    }

    /// Device-assigned identifier
    #[must_use]
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Kernel name, used in error reports
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }
}

/// Scoped device-visible error word, written by device-side code on fault
///
/// Acquired before a dispatch and always read back (which releases it)
/// regardless of outcome.
#[derive(Debug)]
pub struct ErrorBuffer {
    id: u64,
}

impl ErrorBuffer {
    /// Create a buffer token; called by device implementations
    #[must_use]
    pub fn new(id: u64) -> Self {
        Self { id }
    }

    /// Device-assigned identifier
    #[must_use]
    pub fn id(&self) -> u64 {
        self.id
    }
}

/// Abstraction over the compute-device runtime
///
/// Implementations own kernel compilation, work-group tuning, asynchronous
/// dispatch, and the error-buffer mechanism. All methods take `&mut self`;
/// a device instance belongs to one functor and calls on it are serialized
/// by construction.
pub trait ComputeDevice: Send {
    /// Device name for diagnostics
    fn name(&self) -> &str;

    /// Compile (or fetch from a device-level cache) the kernel for a spec
    ///
    /// # Errors
    ///
    /// Returns [`TeselaError::KernelBuild`] if the device rejects the
    /// kernel.
    fn compile_kernel(&mut self, spec: &KernelSpec) -> Result<KernelHandle>;

    /// Pick a work-group size for the kernel from the candidate list
    ///
    /// Must be deterministic for a given kernel and device.
    ///
    /// # Errors
    ///
    /// Returns [`TeselaError::KernelBuild`] if tuning fails.
    fn tune_work_group(&mut self, kernel: &KernelHandle, candidates: &[u32]) -> Result<u32>;

    /// Enqueue the kernel and wait for device-side completion
    ///
    /// # Errors
    ///
    /// Returns [`TeselaError::Dispatch`] if the device rejects the launch.
    fn enqueue(
        &mut self,
        kernel: &KernelHandle,
        args: KernelArgs<'_>,
        work_group_size: u32,
    ) -> Result<DeviceTiming>;

    /// Allocate a scoped error buffer for the next dispatch
    ///
    /// # Errors
    ///
    /// Returns [`TeselaError::Dispatch`] if allocation fails.
    fn alloc_error_buffer(&mut self) -> Result<ErrorBuffer>;

    /// Read back and release the error buffer; non-zero means a fault
    ///
    /// # Errors
    ///
    /// Returns [`TeselaError::Dispatch`] if the readback itself fails.
    fn read_error_buffer(&mut self, buffer: ErrorBuffer) -> Result<u32>;
}

/// Execution strategy owned by one functor instance
pub enum Executor {
    /// Synchronous in-process computation
    Reference,
    /// Offload through a [`ComputeDevice`], with kernel/shape caching
    Accelerated {
        /// Device runtime
        device: Box<dyn ComputeDevice>,
        /// Compiled-kernel cache keyed by input shape
        cache: KernelCache,
    },
}

impl Executor {
    /// Reference strategy
    #[must_use]
    pub fn reference() -> Self {
        Executor::Reference
    }

    /// Accelerated strategy on the given device, starting with a cold cache
    #[must_use]
    pub fn accelerated(device: Box<dyn ComputeDevice>) -> Self {
        Executor::Accelerated {
            device,
            cache: KernelCache::new(),
        }
    }

    /// Kernel cache of the accelerated strategy, if any
    #[must_use]
    pub fn kernel_cache(&self) -> Option<&KernelCache> {
        match self {
            Executor::Reference => None,
            Executor::Accelerated { cache, .. } => Some(cache),
        }
    }

    /// Run one kernel according to the strategy
    ///
    /// Reference runs the in-process kernel and reports wall time.
    /// Accelerated resolves the kernel through the cache (compiling and
    /// re-tuning when the input shape changed), dispatches, then reads back
    /// the error buffer; the buffer is read and released on every outcome.
    pub(crate) fn run(&mut self, spec: &KernelSpec, args: KernelArgs<'_>) -> Result<DeviceTiming> {
        match self {
            Executor::Reference => {
                if !spec.dtype.reference_supported() {
                    return Err(TeselaError::UnsupportedOperation {
                        operation: spec.family.tag().to_string(),
                        reason: format!(
                            "reference kernel not implemented for element type {}",
                            spec.dtype.name()
                        ),
                    });
                }
                let start = Instant::now();
                kernels::execute(spec, args)?;
                Ok(DeviceTiming {
                    queued_micros: 0,
                    run_micros: u64::try_from(start.elapsed().as_micros()).unwrap_or(u64::MAX),
                })
            }
            Executor::Accelerated { device, cache } => {
                let entry = cache.get_or_build(&spec.input_shape, || {
                    let kernel = device.compile_kernel(spec)?;
                    let size = device.tune_work_group(&kernel, WORK_GROUP_CANDIDATES)?;
                    Ok((kernel, size))
                })?;

                let error_buffer = device.alloc_error_buffer()?;
                let dispatched = device.enqueue(&entry.kernel, args, entry.work_group_size);
                // Readback releases the buffer whether or not dispatch
                // succeeded. A dispatch failure is the root cause, so it
                // takes precedence over a failed readback.
                let fault = device.read_error_buffer(error_buffer);
                let timing = dispatched?;
                let fault = fault?;
                if fault != 0 {
                    return Err(TeselaError::ComputeFault { code: fault });
                }
                Ok(timing)
            }
        }
    }
}

impl std::fmt::Debug for Executor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Executor::Reference => f.write_str("Executor::Reference"),
            Executor::Accelerated { device, cache } => f
                .debug_struct("Executor::Accelerated")
                .field("device", &device.name())
                .field("cache", cache)
                .finish(),
        }
    }
}
