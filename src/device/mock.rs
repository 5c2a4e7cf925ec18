//! Mock compute device for testing the accelerated path without hardware
//!
//! Executes the same in-process kernels as the reference strategy, so the
//! accelerated plumbing (kernel cache, tuning, error-buffer readback,
//! completion signaling) can be verified against reference results. Every
//! trait call is recorded for inspection, and failure modes are injectable:
//! compile rejection, dispatch rejection, and a non-zero fault word in the
//! error buffer.

use std::collections::{HashMap, HashSet};

use crate::completion::DeviceTiming;
use crate::error::{Result, TeselaError};
use crate::winograd::kernels;

use super::{ComputeDevice, ErrorBuffer, KernelArgs, KernelHandle, KernelSpec};

/// One recorded trait call
#[derive(Debug, Clone, PartialEq)]
pub enum DeviceCall {
    /// `compile_kernel`
    Compile {
        /// Kernel name derived from the kernel spec
        name: String,
        /// Input shape the kernel was specialized for
        input_shape: Vec<usize>,
    },
    /// `tune_work_group`
    Tune {
        /// Kernel id being tuned
        kernel: u64,
        /// Work-group size the device picked
        picked: u32,
    },
    /// `enqueue`
    Enqueue {
        /// Kernel id dispatched
        kernel: u64,
        /// Work-group size used
        work_group_size: u32,
    },
    /// `alloc_error_buffer`
    AllocErrorBuffer {
        /// Buffer id issued
        id: u64,
    },
    /// `read_error_buffer`
    ReadErrorBuffer {
        /// Buffer id read back and released
        id: u64,
        /// Fault word returned
        value: u32,
    },
}

/// In-process stand-in for a device runtime
pub struct MockDevice {
    name: String,
    specs: HashMap<u64, KernelSpec>,
    live_buffers: HashSet<u64>,
    calls: Vec<DeviceCall>,
    next_kernel_id: u64,
    next_buffer_id: u64,
    fail_compile: bool,
    fail_dispatch: bool,
    fail_readback: bool,
    fault_code: u32,
}

impl MockDevice {
    /// Create a healthy mock device
    #[must_use]
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            specs: HashMap::new(),
            live_buffers: HashSet::new(),
            calls: Vec::new(),
            next_kernel_id: 0,
            next_buffer_id: 0,
            fail_compile: false,
            fail_dispatch: false,
            fail_readback: false,
            fault_code: 0,
        }
    }

    /// Reject every `compile_kernel` call
    #[must_use]
    pub fn with_failing_compile(mut self) -> Self {
        self.fail_compile = true;
        self
    }

    /// Reject every `enqueue` call
    #[must_use]
    pub fn with_failing_dispatch(mut self) -> Self {
        self.fail_dispatch = true;
        self
    }

    /// Fail every `read_error_buffer` call (the buffer is still released)
    #[must_use]
    pub fn with_failing_readback(mut self) -> Self {
        self.fail_readback = true;
        self
    }

    /// Report `code` from every error-buffer readback
    #[must_use]
    pub fn with_fault_code(mut self, code: u32) -> Self {
        self.fault_code = code;
        self
    }

    /// All recorded calls, in order
    #[must_use]
    pub fn calls(&self) -> &[DeviceCall] {
        &self.calls
    }

    /// Number of `compile_kernel` calls
    #[must_use]
    pub fn compile_count(&self) -> usize {
        self.calls
            .iter()
            .filter(|c| matches!(c, DeviceCall::Compile { .. }))
            .count()
    }

    /// Number of `tune_work_group` calls
    #[must_use]
    pub fn tune_count(&self) -> usize {
        self.calls
            .iter()
            .filter(|c| matches!(c, DeviceCall::Tune { .. }))
            .count()
    }

    /// Number of `enqueue` calls
    #[must_use]
    pub fn enqueue_count(&self) -> usize {
        self.calls
            .iter()
            .filter(|c| matches!(c, DeviceCall::Enqueue { .. }))
            .count()
    }

    /// Error buffers allocated but not yet read back
    #[must_use]
    pub fn live_error_buffers(&self) -> usize {
        self.live_buffers.len()
    }
}

impl ComputeDevice for MockDevice {
    fn name(&self) -> &str {
        &self.name
    }

    fn compile_kernel(&mut self, spec: &KernelSpec) -> Result<KernelHandle> {
        let name = spec.kernel_name();
        self.calls.push(DeviceCall::Compile {
            name: name.clone(),
            input_shape: spec.input_shape.clone(),
        });
        if self.fail_compile {
            return Err(TeselaError::KernelBuild {
                kernel: name,
                reason: "mock device configured to reject compilation".to_string(),
            });
        }
        let id = self.next_kernel_id;
        self.next_kernel_id += 1;
        self.specs.insert(id, spec.clone());
        Ok(KernelHandle::new(id, name))
    }

    fn tune_work_group(&mut self, kernel: &KernelHandle, candidates: &[u32]) -> Result<u32> {
        let spec = self
            .specs
            .get(&kernel.id())
            .ok_or_else(|| TeselaError::KernelBuild {
                kernel: kernel.name().to_string(),
                reason: "unknown kernel handle".to_string(),
            })?;
        // Deterministic per shape: the pick depends only on element count.
        let elements: usize = spec.input_shape.iter().product();
        let picked = candidates[elements % candidates.len()];
        self.calls.push(DeviceCall::Tune {
            kernel: kernel.id(),
            picked,
        });
        Ok(picked)
    }

    fn enqueue(
        &mut self,
        kernel: &KernelHandle,
        args: KernelArgs<'_>,
        work_group_size: u32,
    ) -> Result<DeviceTiming> {
        self.calls.push(DeviceCall::Enqueue {
            kernel: kernel.id(),
            work_group_size,
        });
        if self.fail_dispatch {
            return Err(TeselaError::Dispatch {
                kernel: kernel.name().to_string(),
                reason: "mock device configured to reject dispatch".to_string(),
            });
        }
        let spec = self
            .specs
            .get(&kernel.id())
            .ok_or_else(|| TeselaError::Dispatch {
                kernel: kernel.name().to_string(),
                reason: "unknown kernel handle".to_string(),
            })?
            .clone();
        kernels::execute(&spec, args)?;
        let elements: u64 = spec.input_shape.iter().product::<usize>() as u64;
        Ok(DeviceTiming {
            queued_micros: 1,
            run_micros: elements.max(1),
        })
    }

    fn alloc_error_buffer(&mut self) -> Result<ErrorBuffer> {
        let id = self.next_buffer_id;
        self.next_buffer_id += 1;
        self.live_buffers.insert(id);
        self.calls.push(DeviceCall::AllocErrorBuffer { id });
        Ok(ErrorBuffer::new(id))
    }

    fn read_error_buffer(&mut self, buffer: ErrorBuffer) -> Result<u32> {
        if !self.live_buffers.remove(&buffer.id()) {
            return Err(TeselaError::Dispatch {
                kernel: "error_buffer".to_string(),
                reason: format!("buffer {} was not allocated or already read", buffer.id()),
            });
        }
        if self.fail_readback {
            return Err(TeselaError::Dispatch {
                kernel: "error_buffer".to_string(),
                reason: "mock device configured to fail readback".to_string(),
            });
        }
        let value = self.fault_code;
        self.calls.push(DeviceCall::ReadErrorBuffer {
            id: buffer.id(),
            value,
        });
        Ok(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::{KernelFamily, KernelParams, WORK_GROUP_CANDIDATES};
    use crate::dtype::DataType;
    use crate::winograd::WinogradVariant;

    fn spec(shape: Vec<usize>) -> KernelSpec {
        KernelSpec {
            family: KernelFamily::InputTransform,
            variant: WinogradVariant::OutputTile2,
            dtype: DataType::F32,
            input_shape: shape,
            params: KernelParams::InputTransform {
                pad_top: 0,
                pad_left: 0,
                tiles_h: 1,
                tiles_w: 1,
            },
        }
    }

    #[test]
    fn test_compile_issues_distinct_handles() {
        let mut device = MockDevice::new("mock:0");
        let a = device.compile_kernel(&spec(vec![1, 4, 4, 1])).unwrap();
        let b = device.compile_kernel(&spec(vec![1, 4, 4, 2])).unwrap();
        assert_ne!(a.id(), b.id());
        assert_eq!(device.compile_count(), 2);
    }

    #[test]
    fn test_tuning_is_deterministic_per_shape() {
        let mut device = MockDevice::new("mock:0");
        let k1 = device.compile_kernel(&spec(vec![1, 4, 4, 1])).unwrap();
        let k2 = device.compile_kernel(&spec(vec![1, 4, 4, 1])).unwrap();
        let s1 = device.tune_work_group(&k1, WORK_GROUP_CANDIDATES).unwrap();
        let s2 = device.tune_work_group(&k2, WORK_GROUP_CANDIDATES).unwrap();
        assert_eq!(s1, s2);
    }

    #[test]
    fn test_failing_compile() {
        let mut device = MockDevice::new("mock:0").with_failing_compile();
        let err = device.compile_kernel(&spec(vec![1, 4, 4, 1])).unwrap_err();
        assert!(matches!(err, TeselaError::KernelBuild { .. }));
    }

    #[test]
    fn test_error_buffer_lifecycle() {
        let mut device = MockDevice::new("mock:0").with_fault_code(5);
        let buffer = device.alloc_error_buffer().unwrap();
        assert_eq!(device.live_error_buffers(), 1);
        assert_eq!(device.read_error_buffer(buffer).unwrap(), 5);
        assert_eq!(device.live_error_buffers(), 0);
    }

    #[test]
    fn test_failing_readback_still_releases_buffer() {
        let mut device = MockDevice::new("mock:0").with_failing_readback();
        let buffer = device.alloc_error_buffer().unwrap();
        let err = device.read_error_buffer(buffer).unwrap_err();
        assert!(matches!(err, TeselaError::Dispatch { .. }));
        assert_eq!(device.live_error_buffers(), 0);
    }

    #[test]
    fn test_double_read_is_rejected() {
        let mut device = MockDevice::new("mock:0");
        let buffer = device.alloc_error_buffer().unwrap();
        let id = buffer.id();
        device.read_error_buffer(buffer).unwrap();
        let err = device.read_error_buffer(ErrorBuffer::new(id)).unwrap_err();
        assert!(matches!(err, TeselaError::Dispatch { .. }));
    }
}
