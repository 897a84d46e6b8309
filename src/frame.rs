//! Frames, frame numbers and the physical range they are drawn from.

use crate::error::{ConfigError, FrameError};

/// Size of one frame in bytes.
pub const PAGE_SIZE: u64 = 4096;

/// log2 of [`PAGE_SIZE`].
pub const PAGE_SHIFT: u32 = 12;

/// Highest frame count an index may hold; the top two `u32` values are
/// reserved as free-list link markers.
pub const MAX_FRAMES: u64 = (u32::MAX - 1) as u64;

/// Round `addr` up to the next frame boundary.
pub const fn align_up(addr: u64) -> u64 {
    addr.saturating_add(PAGE_SIZE - 1) & !(PAGE_SIZE - 1)
}

/// Round `addr` down to a frame boundary.
pub const fn align_down(addr: u64) -> u64 {
    addr & !(PAGE_SIZE - 1)
}

// ─── Frame ──────────────────────────────────────────────────────

/// A physical frame, identified by its page-aligned start address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Frame(u64);

impl Frame {
    /// Handle for the frame starting at `addr`. The allocator validates
    /// the address when the frame is released.
    pub const fn from_start(addr: u64) -> Self {
        Frame(addr)
    }

    /// Physical start address of the frame.
    pub const fn start_address(self) -> u64 {
        self.0
    }

    /// Physical page number (`start >> PAGE_SHIFT`).
    pub const fn number(self) -> u64 {
        self.0 >> PAGE_SHIFT
    }
}

impl core::fmt::Display for Frame {
    fn fmt(&self, f: &mut core::fmt::Formatter) -> core::fmt::Result {
        write!(f, "Frame(0x{:x})", self.0)
    }
}

/// Dense, zero-based position of a frame within the managed range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct FrameId(u32);

impl FrameId {
    pub(crate) const fn new(raw: u32) -> Self {
        FrameId(raw)
    }

    pub const fn raw(self) -> u32 {
        self.0
    }

    pub const fn as_usize(self) -> usize {
        self.0 as usize
    }
}

// ─── PhysRange ──────────────────────────────────────────────────

/// Half-open physical address range `[start, end)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PhysRange {
    pub start: u64,
    pub end: u64,
}

impl PhysRange {
    pub const fn new(start: u64, end: u64) -> Self {
        PhysRange { start, end }
    }

    /// Start addresses of every whole frame inside the range.
    ///
    /// The first frame starts at `start` rounded up; a trailing partial
    /// frame is skipped.
    pub fn frames(&self) -> impl Iterator<Item = u64> {
        let first = align_up(self.start);
        let count = self.frame_count();
        (0..count).map(move |i| first + i * PAGE_SIZE)
    }

    /// Number of whole frames inside the range.
    pub fn frame_count(&self) -> u64 {
        let first = align_up(self.start);
        if first >= self.end {
            return 0;
        }
        (self.end - first) / PAGE_SIZE
    }

    pub fn is_empty(&self) -> bool {
        self.frame_count() == 0
    }
}

impl core::fmt::Display for PhysRange {
    fn fmt(&self, f: &mut core::fmt::Formatter) -> core::fmt::Result {
        write!(f, "0x{:x}..0x{:x}", self.start, self.end)
    }
}

// ─── FrameIndex ─────────────────────────────────────────────────

/// Maps frame addresses in `[kernel_end, limit)` to dense [`FrameId`]s.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameIndex {
    kernel_end: u64,
    origin: u64,
    limit: u64,
}

impl FrameIndex {
    /// Build an index over the frames between the end of the kernel image
    /// and the physical memory limit.
    pub fn new(kernel_end: u64, limit: u64) -> Result<Self, ConfigError> {
        let origin = align_up(kernel_end);
        let limit = align_down(limit);
        if origin >= limit {
            return Err(ConfigError::EmptyRange { start: kernel_end, end: limit });
        }
        if (limit - origin) / PAGE_SIZE > MAX_FRAMES {
            return Err(ConfigError::RangeTooLarge);
        }
        Ok(FrameIndex { kernel_end, origin, limit })
    }

    /// First frame-aligned address at or above the kernel image end.
    pub const fn origin(&self) -> u64 {
        self.origin
    }

    /// Frame-aligned physical memory limit (exclusive).
    pub const fn limit(&self) -> u64 {
        self.limit
    }

    /// Number of frames the index covers.
    pub const fn frame_count(&self) -> usize {
        ((self.limit - self.origin) / PAGE_SIZE) as usize
    }

    /// Translate a frame address into its frame number.
    pub fn to_frame_number(&self, addr: u64) -> Result<FrameId, FrameError> {
        if addr % PAGE_SIZE != 0 {
            return Err(FrameError::Misaligned { addr });
        }
        if addr < self.kernel_end || addr >= self.limit {
            return Err(FrameError::OutOfRange { addr });
        }
        Ok(FrameId::new(((addr - self.origin) / PAGE_SIZE) as u32))
    }

    /// Inverse of [`to_frame_number`](Self::to_frame_number).
    pub const fn frame(&self, id: FrameId) -> Frame {
        Frame::from_start(self.origin + id.0 as u64 * PAGE_SIZE)
    }

    /// Check that every whole frame in `range` is addressable.
    pub fn check_range(&self, range: &PhysRange) -> Result<(), FrameError> {
        let count = range.frame_count();
        if count == 0 {
            return Ok(());
        }
        let first = align_up(range.start);
        self.to_frame_number(first)?;
        self.to_frame_number(first + (count - 1) * PAGE_SIZE)?;
        Ok(())
    }
}
