//! Early bump frame allocator over the bootloader's memory map.
//!
//! Backs the kernel heap before `Kmem` exists (it needs the heap for its
//! arena and table). Frames are never freed; whatever it has not handed
//! out is passed on to `Kmem` through [`EarlyFrames::largest_remaining`].

use bootloader_api::info::{MemoryRegion, MemoryRegionKind};
use frametrack::frame::{align_up, PAGE_SIZE};
use frametrack::PhysRange;
use x86_64::structures::paging::{FrameAllocator, PhysFrame, Size4KiB};
use x86_64::PhysAddr;

/// A frame allocator that yields usable frames from the bootloader memory map.
pub struct EarlyFrames {
    memory_regions: &'static [MemoryRegion],
    next: usize,
}

impl EarlyFrames {
    /// Create a new frame allocator from the bootloader memory map.
    ///
    /// # Safety
    /// The caller must guarantee that the memory map is valid and that
    /// all `Usable` regions are truly unused.
    pub unsafe fn new(memory_regions: &'static [MemoryRegion]) -> Self {
        EarlyFrames {
            memory_regions,
            next: 0,
        }
    }

    fn usable_regions(&self) -> impl Iterator<Item = PhysRange> + '_ {
        self.memory_regions
            .iter()
            .filter(|r| r.kind == MemoryRegionKind::Usable)
            .map(|r| PhysRange::new(r.start, r.end))
    }

    /// Returns an iterator over all usable physical frames.
    fn usable_frames(&self) -> impl Iterator<Item = u64> + '_ {
        self.usable_regions().flat_map(|r| r.frames())
    }

    /// Total usable frames in the memory map.
    pub fn usable_count(&self) -> u64 {
        self.usable_regions().map(|r| r.frame_count()).sum()
    }

    /// The largest usable region, minus the frames already handed out.
    ///
    /// The bump pointer walks regions in map order, so a region is either
    /// untouched, partly consumed from its start, or exhausted.
    pub fn largest_remaining(&self) -> Option<PhysRange> {
        let mut consumed = self.next as u64;
        let mut best: Option<PhysRange> = None;
        for region in self.usable_regions() {
            let taken = consumed.min(region.frame_count());
            consumed -= taken;
            let rest = PhysRange::new(align_up(region.start) + taken * PAGE_SIZE, region.end);
            if rest.is_empty() {
                continue;
            }
            if best.map_or(true, |b| rest.frame_count() > b.frame_count()) {
                best = Some(rest);
            }
        }
        best
    }
}

unsafe impl FrameAllocator<Size4KiB> for EarlyFrames {
    fn allocate_frame(&mut self) -> Option<PhysFrame<Size4KiB>> {
        let frame = self.usable_frames().nth(self.next)?;
        self.next += 1;
        Some(PhysFrame::containing_address(PhysAddr::new(frame)))
    }
}
