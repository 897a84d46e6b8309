//! The physical frame allocator.
//!
//! [`Kmem`] owns the free list, the ownership table and the frame storage
//! behind one `spin::Mutex`. Bootstrap runs through `&mut self` and never
//! takes the lock; every other operation holds it for its whole body.

use log::trace;
use spin::Mutex;

use crate::bootstrap::Phase;
use crate::config::KmemConfig;
use crate::error::{ConfigError, ExportError, FrameError};
use crate::frame::{Frame, FrameId, FrameIndex};
use crate::free_list::FreeList;
use crate::ownership::{OwnerTag, OwnershipSummary, OwnershipTable, Pid};
use crate::policy::Policy;
use crate::storage::{FrameStorage, JUNK_BYTE};

/// State guarded by the allocator lock.
pub(crate) struct Inner<S> {
    pub(crate) index: FrameIndex,
    pub(crate) free: FreeList,
    pub(crate) table: OwnershipTable,
    pub(crate) storage: S,
    /// Simple-policy allocations that did not fit in the log.
    pub(crate) unlogged: usize,
}

impl<S: FrameStorage> Inner<S> {
    pub(crate) fn pop_free(&mut self) -> Option<Frame> {
        self.free.pop().map(|id| self.index.frame(id))
    }

    /// Scribble over a frame and put it on the free list.
    pub(crate) fn push_free(&mut self, id: FrameId) -> Result<(), FrameError> {
        let frame = self.index.frame(id);
        if self.free.contains(id) {
            return Err(FrameError::DoubleFree { addr: frame.start_address() });
        }
        self.fill_junk(frame);
        self.free
            .push(id)
            .map_err(|_| FrameError::DoubleFree { addr: frame.start_address() })
    }

    pub(crate) fn fill_junk(&mut self, frame: Frame) {
        self.storage.fill(frame, JUNK_BYTE);
    }
}

/// Physical frame allocator with ownership tracking.
pub struct Kmem<S> {
    pub(crate) config: KmemConfig,
    pub(crate) phase: Phase,
    pub(crate) inner: Mutex<Inner<S>>,
}

impl<S: FrameStorage> Kmem<S> {
    /// Create an allocator with an empty free list. Nothing can be
    /// allocated until [`bootstrap_phase1`](Self::bootstrap_phase1) runs.
    pub fn new(config: KmemConfig, storage: S) -> Result<Self, ConfigError> {
        config.validate()?;
        let index = config.frame_index()?;
        Ok(Kmem {
            config,
            phase: Phase::Cold,
            inner: Mutex::new(Inner {
                index,
                free: FreeList::new(index.frame_count()),
                table: OwnershipTable::new(config.table_capacity),
                storage,
                unlogged: 0,
            }),
        })
    }

    pub fn config(&self) -> &KmemConfig {
        &self.config
    }

    pub fn policy(&self) -> Policy {
        self.config.policy
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Whether bootstrap is complete and the lock is enforced.
    pub fn locking(&self) -> bool {
        self.phase.locking()
    }

    /// Allocate a frame for kernel use.
    pub fn allocate(&self) -> Option<Frame> {
        self.allocate_tagged(OwnerTag::Transient)
    }

    /// Allocate a frame on behalf of process `pid`.
    pub fn allocate_for(&self, pid: Pid) -> Option<Frame> {
        self.allocate_tagged(OwnerTag::Process(pid))
    }

    fn allocate_tagged(&self, owner: OwnerTag) -> Option<Frame> {
        let mut inner = self.inner.lock();
        let frame = if self.phase.locking() {
            self.config.policy.allocate(&mut inner, owner)
        } else {
            // Page-table construction before the table is live.
            inner.pop_free()
        };
        trace!("alloc {:?} for {}", frame, owner);
        frame
    }

    /// Give a frame back.
    ///
    /// The frame is filled with [`JUNK_BYTE`] before anyone can see it
    /// again. An error means the caller broke the allocator contract.
    pub fn release(&self, frame: Frame) -> Result<(), FrameError> {
        let mut inner = self.inner.lock();
        let id = inner.index.to_frame_number(frame.start_address())?;
        if self.phase.locking() {
            self.config.policy.release(&mut inner, id)?;
        } else {
            inner.push_free(id)?;
        }
        trace!("free {}", frame);
        Ok(())
    }

    /// Copy up to `max_entries` non-free `(frame, owner)` records, in
    /// table order, into the output buffers.
    ///
    /// Frames are written as physical page numbers, owners in their raw
    /// encoding. Returns the number of records written; an empty buffer or
    /// a zero count is rejected without writing anything.
    pub fn export_ownership(
        &self,
        frames: &mut [u32],
        owners: &mut [i32],
        max_entries: usize,
    ) -> Result<usize, ExportError> {
        if frames.is_empty() || owners.is_empty() || max_entries == 0 {
            return Err(ExportError::InvalidArgument);
        }
        let limit = max_entries.min(frames.len()).min(owners.len());

        let inner = self.inner.lock();
        let mut written = 0;
        for (entry, (frame_out, owner_out)) in inner
            .table
            .owned()
            .zip(frames.iter_mut().zip(owners.iter_mut()))
            .take(limit)
        {
            *frame_out = entry.frame.number() as u32;
            *owner_out = entry.owner.as_raw();
            written += 1;
        }
        Ok(written)
    }

    pub fn summary(&self) -> OwnershipSummary {
        let inner = self.inner.lock();
        inner.table.summarize(inner.free.len())
    }

    /// Frames currently recorded as held by `pid`.
    pub fn owned_by(&self, pid: Pid) -> usize {
        self.inner.lock().table.count(OwnerTag::Process(pid))
    }

    /// Run `f` over the bytes of `frame`.
    pub fn inspect_frame<R>(
        &self,
        frame: Frame,
        f: impl FnOnce(&[u8]) -> R,
    ) -> Result<R, FrameError> {
        let inner = self.inner.lock();
        inner.index.to_frame_number(frame.start_address())?;
        Ok(f(inner.storage.contents(frame)))
    }
}
