//! Allocator configuration.

use crate::error::ConfigError;
use crate::frame::{FrameIndex, MAX_FRAMES};
use crate::policy::Policy;

/// Slots in the ownership table.
pub const DEFAULT_TABLE_CAPACITY: usize = 16384;

/// Default end of the kernel image (1 MiB).
pub const DEFAULT_KERNEL_END: u64 = 0x10_0000;

/// Default top of physical memory (224 MiB).
pub const DEFAULT_PHYS_LIMIT: u64 = 0x0E00_0000;

/// Memory handed over in bootstrap phase 1, before SMP page tables exist.
pub const EARLY_WINDOW: u64 = 4 * 1024 * 1024;

#[cfg(feature = "locality")]
const DEFAULT_POLICY: Policy = Policy::LocalityAware;
#[cfg(not(feature = "locality"))]
const DEFAULT_POLICY: Policy = Policy::Simple;

/// Static parameters of one allocator instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KmemConfig {
    pub policy: Policy,
    /// Fixed number of ownership table slots.
    pub table_capacity: usize,
    /// First address past the kernel image; frames below it are never managed.
    pub kernel_end: u64,
    /// Exclusive top of managed physical memory.
    pub phys_limit: u64,
}

impl KmemConfig {
    pub const DEFAULT: KmemConfig = KmemConfig {
        policy: DEFAULT_POLICY,
        table_capacity: DEFAULT_TABLE_CAPACITY,
        kernel_end: DEFAULT_KERNEL_END,
        phys_limit: DEFAULT_PHYS_LIMIT,
    };

    /// Builder: choose the placement policy.
    pub const fn with_policy(mut self, policy: Policy) -> Self {
        self.policy = policy;
        self
    }

    /// Builder: size the ownership table.
    pub const fn with_table_capacity(mut self, capacity: usize) -> Self {
        self.table_capacity = capacity;
        self
    }

    /// Builder: set the managed physical range.
    pub const fn with_range(mut self, kernel_end: u64, phys_limit: u64) -> Self {
        self.kernel_end = kernel_end;
        self.phys_limit = phys_limit;
        self
    }

    /// Builder: manage `[start, end)`, cut off at the current `phys_limit`.
    ///
    /// The free-list links live on the kernel heap, so the limit also bounds
    /// how much heap the allocator needs.
    pub const fn with_region(mut self, start: u64, end: u64) -> Self {
        self.kernel_end = start;
        if end < self.phys_limit {
            self.phys_limit = end;
        }
        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.table_capacity == 0 {
            return Err(ConfigError::ZeroCapacity);
        }
        if self.table_capacity as u64 > MAX_FRAMES {
            return Err(ConfigError::CapacityTooLarge(self.table_capacity));
        }
        self.frame_index().map(|_| ())
    }

    /// Frame index over `[kernel_end, phys_limit)`.
    pub fn frame_index(&self) -> Result<FrameIndex, ConfigError> {
        FrameIndex::new(self.kernel_end, self.phys_limit)
    }
}

impl Default for KmemConfig {
    fn default() -> Self {
        Self::DEFAULT
    }
}
