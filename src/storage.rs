//! Backing bytes of the managed frames.
//!
//! The allocator never touches frame memory except to scribble the junk
//! pattern over a frame when it is freed. The kernel writes through the
//! physical-memory mapping; hosted code uses [`ArenaStorage`].

use alloc::vec;
use alloc::vec::Vec;

use crate::frame::{FrameIndex, Frame, PAGE_SIZE};

/// Byte written over every freed frame so dangling users read garbage.
pub const JUNK_BYTE: u8 = 0x01;

/// Access to the contents of managed frames.
pub trait FrameStorage: Send {
    /// Overwrite the whole frame with `byte`.
    fn fill(&mut self, frame: Frame, byte: u8);

    /// Current contents of the frame.
    fn contents(&self, frame: Frame) -> &[u8];
}

/// Heap-backed arena with one frame-sized slot per managed frame.
pub struct ArenaStorage {
    origin: u64,
    bytes: Vec<u8>,
}

impl ArenaStorage {
    /// Allocate slots for every frame covered by `index`, zero-filled.
    pub fn new(index: &FrameIndex) -> Self {
        ArenaStorage {
            origin: index.origin(),
            bytes: vec![0; index.frame_count() * PAGE_SIZE as usize],
        }
    }

    fn slot(&self, frame: Frame) -> core::ops::Range<usize> {
        let start = (frame.start_address() - self.origin) as usize;
        start..start + PAGE_SIZE as usize
    }

    /// Mutable view of a frame, standing in for whoever holds it.
    pub fn contents_mut(&mut self, frame: Frame) -> &mut [u8] {
        let slot = self.slot(frame);
        &mut self.bytes[slot]
    }
}

impl FrameStorage for ArenaStorage {
    fn fill(&mut self, frame: Frame, byte: u8) {
        let slot = self.slot(frame);
        self.bytes[slot].fill(byte);
    }

    fn contents(&self, frame: Frame) -> &[u8] {
        &self.bytes[self.slot(frame)]
    }
}
