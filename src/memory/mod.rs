//! Memory bring-up for the kernel.
//!
//! Provides:
//! - Early bump frames from the bootloader memory map (heap backing)
//! - Kernel heap via linked_list_allocator
//! - The global `Kmem` frame allocator, bootstrapped in two phases

pub mod frame_allocator;
pub mod heap;
mod phys;

use bootloader_api::BootInfo;
use frametrack::config::EARLY_WINDOW;
use frametrack::frame::{align_up, PAGE_SIZE};
use frametrack::{Kmem, KmemConfig, PhysRange};
use log::info;
use spin::Once;
use x86_64::structures::paging::{FrameAllocator, OffsetPageTable, PageTable, PhysFrame, Size4KiB};
use x86_64::{PhysAddr, VirtAddr};

pub use phys::PhysMapStorage;

/// Virtual page mapped between the two bootstrap phases.
const SCRATCH_START: u64 = 0x_5555_5555_0000;

/// The kernel's frame allocator, published once bootstrap is complete.
static KMEM: Once<Kmem<PhysMapStorage>> = Once::new();

/// Access the frame allocator.
pub fn kmem() -> &'static Kmem<PhysMapStorage> {
    KMEM.get().expect("kmem used before memory::init")
}

/// Page-table frames drawn from `Kmem`, tagged as kernel-owned.
struct KmemFrames<'a>(&'a Kmem<PhysMapStorage>);

unsafe impl FrameAllocator<Size4KiB> for KmemFrames<'_> {
    fn allocate_frame(&mut self) -> Option<PhysFrame<Size4KiB>> {
        self.0
            .allocate()
            .map(|f| PhysFrame::containing_address(PhysAddr::new(f.start_address())))
    }
}

/// Initialize all memory subsystems.
///
/// Must be called once, before any heap allocation.
pub fn init(boot_info: &'static BootInfo) {
    let phys_mem_offset = boot_info
        .physical_memory_offset
        .into_option()
        .expect("bootloader must map physical memory");
    let phys_mem_offset = VirtAddr::new(phys_mem_offset);

    let level_4_table = unsafe { active_level_4_table(phys_mem_offset) };
    let mut mapper = unsafe { OffsetPageTable::new(level_4_table, phys_mem_offset) };

    let mut early = unsafe { frame_allocator::EarlyFrames::new(&boot_info.memory_regions) };
    let usable = early.usable_count();
    info!("{} usable frames ({} MiB)", usable, usable * PAGE_SIZE / 1024 / 1024);

    heap::init_heap(&mut mapper, &mut early).expect("heap initialization failed");
    info!("kernel heap initialized ({} KiB)", heap::HEAP_SIZE / 1024);

    let region = early
        .largest_remaining()
        .expect("no usable memory left for kmem");
    let config = KmemConfig::DEFAULT.with_region(region.start, region.end);
    let storage = unsafe { PhysMapStorage::new(phys_mem_offset) };
    let mut kmem = Kmem::new(config, storage).expect("invalid kmem configuration");
    let range = PhysRange::new(region.start, config.phys_limit);
    if range.end < region.end {
        info!("kmem capped at {}, {} unmanaged", range, PhysRange::new(range.end, region.end));
    }

    // Phase 1: boot core only, early window.
    let split = (align_up(range.start) + EARLY_WINDOW).min(range.end);
    kmem.bootstrap_phase1(PhysRange::new(range.start, split))
        .expect("kmem phase 1");
    heap::map_range(
        &mut mapper,
        &mut KmemFrames(&kmem),
        VirtAddr::new(SCRATCH_START),
        PAGE_SIZE,
    )
    .expect("scratch page mapping failed");

    // Phase 2: everything else; locking from here on.
    kmem.bootstrap_phase2(PhysRange::new(split, range.end))
        .expect("kmem phase 2");
    info!("kmem ({} policy) over {}: {}", kmem.policy(), range, kmem.summary());

    KMEM.call_once(|| kmem);
}

/// Get a mutable reference to the active level 4 page table.
///
/// # Safety
/// - `physical_memory_offset` must be the correct offset that the bootloader
///   used to map all physical memory.
/// - Must only be called once to avoid aliasing `&mut` references.
unsafe fn active_level_4_table(physical_memory_offset: VirtAddr) -> &'static mut PageTable {
    use x86_64::registers::control::Cr3;

    let (level_4_table_frame, _) = Cr3::read();
    let phys = level_4_table_frame.start_address();
    let virt = physical_memory_offset + phys.as_u64();
    let page_table_ptr: *mut PageTable = virt.as_mut_ptr();

    unsafe { &mut *page_table_ptr }
}
