//! Write-once completion handle for issued transform work
//!
//! Host-side calls are synchronous with respect to issuing work, but
//! accelerated-path device execution is asynchronous relative to the host.
//! Callers synchronize through this handle before reading output tensors or
//! timing statistics. It is a single `Result`-bearing contract: waiting
//! yields either timing statistics or the structured fault that ended the
//! run, combining what would otherwise be a separate profiling future and a
//! device error flag.

use std::sync::{Arc, Condvar, Mutex};

use crate::error::Result;

/// Timing statistics for one executed transform
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DeviceTiming {
    /// Microseconds the work spent queued before execution started
    pub queued_micros: u64,
    /// Microseconds of execution time
    pub run_micros: u64,
}

#[derive(Default)]
struct Slot {
    outcome: Mutex<Option<Result<DeviceTiming>>>,
    ready: Condvar,
}

/// Write-once completion handle
///
/// Cloned handles share one slot, so a caller can keep a handle while the
/// executing strategy fills it. The first `complete` wins; later writes are
/// ignored.
///
/// # Examples
///
/// ```
/// use tesela::{Completion, DeviceTiming};
///
/// let completion = Completion::new();
/// completion.complete(Ok(DeviceTiming { queued_micros: 2, run_micros: 40 }));
/// let stats = completion.wait().unwrap();
/// assert_eq!(stats.run_micros, 40);
/// ```
#[derive(Clone, Default)]
pub struct Completion {
    slot: Arc<Slot>,
}

impl Completion {
    /// Create an unfilled completion handle
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the outcome of the work
    ///
    /// Returns `true` if this call filled the slot, `false` if the outcome
    /// had already been recorded.
    pub fn complete(&self, outcome: Result<DeviceTiming>) -> bool {
        let mut guard = self
            .slot
            .outcome
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        if guard.is_some() {
            return false;
        }
        *guard = Some(outcome);
        self.slot.ready.notify_all();
        true
    }

    /// Whether an outcome has been recorded
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.slot
            .outcome
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .is_some()
    }

    /// Outcome if already recorded, without blocking
    #[must_use]
    pub fn try_stats(&self) -> Option<Result<DeviceTiming>> {
        self.slot
            .outcome
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .clone()
    }

    /// Block until the outcome is recorded, then return it
    ///
    /// # Errors
    ///
    /// Returns the structured fault the executing strategy recorded, e.g.
    /// [`TeselaError::ComputeFault`](crate::error::TeselaError::ComputeFault)
    /// after a non-zero error-buffer readback.
    pub fn wait(&self) -> Result<DeviceTiming> {
        let mut guard = self
            .slot
            .outcome
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        while guard.is_none() {
            guard = self
                .slot
                .ready
                .wait(guard)
                .unwrap_or_else(std::sync::PoisonError::into_inner);
        }
        guard.clone().expect("outcome present after wait")
    }
}

impl std::fmt::Debug for Completion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Completion")
            .field("complete", &self.is_complete())
            .finish()
    }
}
