//! Kernel heap and page mapping helpers.
//!
//! The heap holds `Kmem`'s link arena and ownership table, so it is
//! mapped with frames from the early bump allocator.

use linked_list_allocator::LockedHeap;
use x86_64::structures::paging::{
    mapper::MapToError, FrameAllocator, Mapper, Page, PageTableFlags, Size4KiB,
};
use x86_64::VirtAddr;

/// Start address of the kernel heap (chosen to be in a high, unused region).
pub const HEAP_START: usize = 0x_4444_4444_0000;

/// Size of the kernel heap in bytes (1 MiB).
pub const HEAP_SIZE: usize = 1024 * 1024;

#[global_allocator]
static ALLOCATOR: LockedHeap = LockedHeap::empty();

/// Map `[start, start + size)` to fresh frames from `frames`.
///
/// Page-table frames needed along the way come from the same source.
pub fn map_range(
    mapper: &mut impl Mapper<Size4KiB>,
    frames: &mut impl FrameAllocator<Size4KiB>,
    start: VirtAddr,
    size: u64,
) -> Result<(), MapToError<Size4KiB>> {
    let first = Page::containing_address(start);
    let last = Page::containing_address(start + size - 1u64);
    let flags = PageTableFlags::PRESENT | PageTableFlags::WRITABLE;

    for page in Page::range_inclusive(first, last) {
        let frame = frames
            .allocate_frame()
            .ok_or(MapToError::FrameAllocationFailed)?;
        unsafe {
            mapper.map_to(page, frame, flags, frames)?.flush();
        }
    }
    Ok(())
}

/// Map the heap and hand it to the global allocator.
pub fn init_heap(
    mapper: &mut impl Mapper<Size4KiB>,
    frames: &mut impl FrameAllocator<Size4KiB>,
) -> Result<(), MapToError<Size4KiB>> {
    map_range(mapper, frames, VirtAddr::new(HEAP_START as u64), HEAP_SIZE as u64)?;

    unsafe {
        ALLOCATOR.lock().init(HEAP_START as *mut u8, HEAP_SIZE);
    }
    Ok(())
}
