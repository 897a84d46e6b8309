//! ParyantaOS frame-ownership kernel
//!
//! Boots, brings up the frame allocator in two phases, hands a few
//! frames to demo processes and prints the ownership dump over serial.

#![no_std]
#![no_main]

extern crate alloc;

mod memory;
mod serial;

use alloc::vec::Vec;
use bootloader_api::config::{BootloaderConfig, Mapping};
use bootloader_api::{entry_point, BootInfo};
use core::panic::PanicInfo;
use frametrack::{diag, Pid};
use log::{warn, LevelFilter};

pub static BOOTLOADER_CONFIG: BootloaderConfig = {
    let mut config = BootloaderConfig::new_default();
    config.mappings.physical_memory = Some(Mapping::Dynamic);
    config
};

entry_point!(kernel_main, config = &BOOTLOADER_CONFIG);

/// Entry point after bootloader hands off control.
fn kernel_main(boot_info: &'static mut BootInfo) -> ! {
    // Initialize serial output first (for debugging in QEMU)
    serial::init(LevelFilter::Info);

    println!("ParyantaOS frametrack v0.1.0");
    println!("============================");

    memory::init(boot_info);
    println!("[OK] Memory initialized");

    dump_physmem_demo();

    println!("Kernel ready. Halting.");
    loop {
        x86_64::instructions::hlt();
    }
}

/// Hand frames to a few processes, drop one, then print the dump the way
/// the user-level `dump_physmem` test does.
fn dump_physmem_demo() {
    let kmem = memory::kmem();

    let mut held = Vec::new();
    for raw in [3, 3, 7, 3] {
        let Some(pid) = Pid::new(raw) else { continue };
        match kmem.allocate_for(pid) {
            Some(frame) => held.push(frame),
            None => warn!("out of memory for {}", pid),
        }
    }
    if let Some(&frame) = held.first() {
        kmem.release(frame).expect("released a frame the kernel does not own");
    }

    let mut frames = [0u32; 10];
    let mut pids = [0i32; 10];
    let written = diag::sys_dump_physmem(kmem, Some(&mut frames[..]), Some(&mut pids[..]), 5);
    for record in diag::records(&frames, &pids, written.max(0) as usize) {
        println!("{}", record);
    }
    println!("return value of dump_physmem: {}", written);
    println!("{}", kmem.summary());
}

/// Panic handler for kernel panics.
#[panic_handler]
fn panic(info: &PanicInfo) -> ! {
    println!("\n!!! KERNEL PANIC !!!");
    println!("{}", info);

    loop {
        x86_64::instructions::hlt();
    }
}
