//! `dump_physmem` diagnostic.
//!
//! User space hands in two arrays and a count; the kernel fills them with
//! `(frame number, owner)` pairs for every frame that is not free.

use crate::kmem::Kmem;
use crate::storage::FrameStorage;

/// Syscall body for `dump_physmem`.
///
/// `None` stands for a null user pointer. Returns `-1` when a buffer is
/// missing or `count` is zero, otherwise the number of records written.
pub fn sys_dump_physmem<S: FrameStorage>(
    kmem: &Kmem<S>,
    frames: Option<&mut [u32]>,
    owners: Option<&mut [i32]>,
    count: usize,
) -> isize {
    let (Some(frames), Some(owners)) = (frames, owners) else {
        return -1;
    };
    match kmem.export_ownership(frames, owners, count) {
        Ok(written) => written as isize,
        Err(_) => -1,
    }
}

/// One exported pair, printed the way the user-level command shows it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DumpRecord {
    pub slot: usize,
    pub frame: u32,
    pub owner: i32,
}

impl core::fmt::Display for DumpRecord {
    fn fmt(&self, f: &mut core::fmt::Formatter) -> core::fmt::Result {
        write!(
            f,
            "frames[{}] = {}   pid[{}] = {}",
            self.slot, self.frame, self.slot, self.owner
        )
    }
}

/// Pair up the first `written` entries of the two output buffers.
pub fn records<'a>(
    frames: &'a [u32],
    owners: &'a [i32],
    written: usize,
) -> impl Iterator<Item = DumpRecord> + 'a {
    frames
        .iter()
        .zip(owners)
        .take(written)
        .enumerate()
        .map(|(slot, (&frame, &owner))| DumpRecord { slot, frame, owner })
}
