//! ParyantaOS physical frame allocator.
//!
//! Hands out fixed-size 4 KiB frames and keeps a table of which owner
//! (a process, the kernel, or nobody) holds each one:
//! - Intrusive free list over an arena of frame slots
//! - Ownership table with linear-scan, locality-aware placement
//! - Two-phase bootstrap (before and after SMP page tables are live)
//! - Ownership export for the `dump_physmem` diagnostic
//!
//! The library is `no_std` + `alloc`; the kernel image that drives it
//! lives in `main.rs` behind the `kernel` feature.

#![cfg_attr(not(test), no_std)]

extern crate alloc;

pub mod bootstrap;
pub mod config;
pub mod diag;
pub mod error;
pub mod frame;
pub mod free_list;
pub mod kmem;
pub mod ownership;
pub mod policy;
pub mod storage;

pub use bootstrap::Phase;
pub use config::KmemConfig;
pub use error::{BootstrapError, ConfigError, ExportError, FrameError};
pub use frame::{Frame, FrameId, FrameIndex, PhysRange};
pub use kmem::Kmem;
pub use ownership::{OwnerTag, OwnershipSummary, Pid};
pub use policy::Policy;
pub use storage::{ArenaStorage, FrameStorage};
