//! Frame storage through the bootloader's physical-memory mapping.

use frametrack::frame::PAGE_SIZE;
use frametrack::{Frame, FrameStorage};
use x86_64::VirtAddr;

/// Reaches frame contents at `offset + physical address`.
pub struct PhysMapStorage {
    offset: VirtAddr,
}

impl PhysMapStorage {
    /// # Safety
    /// All managed physical memory must be mapped, writable, at `offset`,
    /// and the allocator must be the only one handing out those frames.
    pub unsafe fn new(offset: VirtAddr) -> Self {
        PhysMapStorage { offset }
    }

    fn ptr(&self, frame: Frame) -> *mut u8 {
        (self.offset + frame.start_address()).as_mut_ptr()
    }
}

impl FrameStorage for PhysMapStorage {
    fn fill(&mut self, frame: Frame, byte: u8) {
        // SAFETY: `Kmem` only passes frames inside its validated range,
        // which `new`'s contract guarantees is mapped.
        unsafe { core::ptr::write_bytes(self.ptr(frame), byte, PAGE_SIZE as usize) }
    }

    fn contents(&self, frame: Frame) -> &[u8] {
        // SAFETY: as for `fill`.
        unsafe { core::slice::from_raw_parts(self.ptr(frame), PAGE_SIZE as usize) }
    }
}
