//! Shape-keyed kernel cache for the accelerated execution strategy
//!
//! One cache per functor instance. It holds at most one entry: the compiled
//! kernel, the tuned work-group size, and the input shape they were built
//! for. A call with a different shape (including the very first call)
//! invalidates the entry before rebuilding, so a failed rebuild can never
//! leave a kernel tuned for a stale shape behind.

use crate::error::Result;

use super::KernelHandle;

/// Cached artifacts for one input shape
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheEntry {
    /// Compiled kernel handle
    pub kernel: KernelHandle,
    /// Tuned work-group size for that kernel
    pub work_group_size: u32,
    /// Input shape the kernel and tuning were built for
    pub input_shape: Vec<usize>,
}

/// Per-functor kernel cache
#[derive(Debug, Default)]
pub struct KernelCache {
    entry: Option<CacheEntry>,
    rebuilds: u64,
}

impl KernelCache {
    /// Create an empty (cold) cache
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether the cache holds an entry built for exactly this shape
    #[must_use]
    pub fn is_warm_for(&self, shape: &[usize]) -> bool {
        self.entry
            .as_ref()
            .is_some_and(|e| e.input_shape == shape)
    }

    /// Drop the current entry, if any
    pub fn invalidate(&mut self) {
        self.entry = None;
    }

    /// Number of times an entry has been built or rebuilt
    #[must_use]
    pub fn rebuild_count(&self) -> u64 {
        self.rebuilds
    }

    /// Current entry, if any
    #[must_use]
    pub fn entry(&self) -> Option<&CacheEntry> {
        self.entry.as_ref()
    }

    /// Return the entry for `shape`, rebuilding through `build` on a miss
    ///
    /// A shape change invalidates the stale entry before `build` runs; if
    /// `build` fails the cache stays empty.
    ///
    /// # Errors
    ///
    /// Propagates whatever `build` returns (kernel compile or tuning
    /// failure).
    pub fn get_or_build<F>(&mut self, shape: &[usize], build: F) -> Result<&CacheEntry>
    where
        F: FnOnce() -> Result<(KernelHandle, u32)>,
    {
        if !self.is_warm_for(shape) {
            self.entry = None;
            let (kernel, work_group_size) = build()?;
            self.entry = Some(CacheEntry {
                kernel,
                work_group_size,
                input_shape: shape.to_vec(),
            });
            self.rebuilds += 1;
        }
        Ok(self.entry.as_ref().expect("entry just built"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::TeselaError;

    fn handle(id: u64) -> KernelHandle {
        KernelHandle::new(id, format!("kernel_{id}"))
    }

    #[test]
    fn test_first_call_builds() {
        let mut cache = KernelCache::new();
        assert!(!cache.is_warm_for(&[1, 8, 8, 3]));

        let entry = cache
            .get_or_build(&[1, 8, 8, 3], || Ok((handle(1), 64)))
            .unwrap();
        assert_eq!(entry.work_group_size, 64);
        assert_eq!(cache.rebuild_count(), 1);
        assert!(cache.is_warm_for(&[1, 8, 8, 3]));
    }

    #[test]
    fn test_same_shape_reuses_entry() {
        let mut cache = KernelCache::new();
        cache
            .get_or_build(&[1, 8, 8, 3], || Ok((handle(1), 32)))
            .unwrap();
        let entry = cache
            .get_or_build(&[1, 8, 8, 3], || panic!("must not rebuild"))
            .unwrap();
        assert_eq!(entry.kernel.id(), 1);
        assert_eq!(cache.rebuild_count(), 1);
    }

    #[test]
    fn test_shape_change_rebuilds() {
        let mut cache = KernelCache::new();
        cache
            .get_or_build(&[1, 8, 8, 3], || Ok((handle(1), 32)))
            .unwrap();
        let entry = cache
            .get_or_build(&[1, 16, 16, 3], || Ok((handle(2), 128)))
            .unwrap();
        assert_eq!(entry.kernel.id(), 2);
        assert_eq!(entry.work_group_size, 128);
        assert_eq!(cache.rebuild_count(), 2);
        assert!(!cache.is_warm_for(&[1, 8, 8, 3]));
    }

    #[test]
    fn test_failed_build_leaves_cache_cold() {
        let mut cache = KernelCache::new();
        cache
            .get_or_build(&[1, 8, 8, 3], || Ok((handle(1), 32)))
            .unwrap();
        let result = cache.get_or_build(&[1, 4, 4, 3], || {
            Err(TeselaError::KernelBuild {
                kernel: "winograd_transform".to_string(),
                reason: "device out of memory".to_string(),
            })
        });
        assert!(result.is_err());
        // The stale entry must be gone, not silently reused.
        assert!(cache.entry().is_none());
        assert!(!cache.is_warm_for(&[1, 8, 8, 3]));
    }

    #[test]
    fn test_invalidate() {
        let mut cache = KernelCache::new();
        cache
            .get_or_build(&[1, 8, 8, 3], || Ok((handle(1), 32)))
            .unwrap();
        cache.invalidate();
        assert!(cache.entry().is_none());
    }
}
