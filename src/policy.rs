//! Placement policies.
//!
//! Both policies serve the same allocate/release contract once the
//! allocator is past bootstrap; they differ only in where the next frame
//! comes from and where a freed frame goes.

use log::{trace, warn};

use crate::error::{ConfigError, FrameError};
use crate::frame::{Frame, FrameId};
use crate::kmem::Inner;
use crate::ownership::OwnerTag;
use crate::storage::FrameStorage;

/// How frames are chosen after bootstrap.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Policy {
    /// Pop the free-list head; log `(frame, owner)` in an append-only table,
    /// one record per frame.
    Simple,
    /// Place each frame next to frames the same owner already holds,
    /// driven entirely by the ownership table.
    LocalityAware,
}

impl Policy {
    pub(crate) fn allocate<S: FrameStorage>(
        self,
        inner: &mut Inner<S>,
        owner: OwnerTag,
    ) -> Option<Frame> {
        match self {
            Policy::Simple => {
                let frame = inner.pop_free()?;
                // A frame keeps its first log record; later owners overwrite it.
                let logged = inner.table.set_owner(frame, owner).is_some()
                    || inner.table.append(frame, owner);
                if !logged {
                    inner.unlogged += 1;
                    if inner.unlogged == 1 {
                        warn!(
                            "ownership log full ({} slots); further allocations go unrecorded",
                            inner.table.capacity()
                        );
                    }
                }
                Some(frame)
            }
            Policy::LocalityAware => match inner.table.find_free_slot(owner) {
                Some(slot) => {
                    trace!("placing {} in slot {}", owner, slot);
                    Some(inner.table.claim(slot, owner))
                }
                None => {
                    warn!("no placement for {} ({} slots)", owner, inner.table.len());
                    None
                }
            },
        }
    }

    pub(crate) fn release<S: FrameStorage>(
        self,
        inner: &mut Inner<S>,
        id: FrameId,
    ) -> Result<(), FrameError> {
        match self {
            // The log keeps the stale record.
            Policy::Simple => inner.push_free(id),
            Policy::LocalityAware => {
                let frame = inner.index.frame(id);
                match inner.table.set_owner(frame, OwnerTag::Free) {
                    Some(OwnerTag::Free) => {
                        Err(FrameError::DoubleFree { addr: frame.start_address() })
                    }
                    Some(_) => {
                        inner.fill_junk(frame);
                        Ok(())
                    }
                    None => {
                        warn!("{} has no ownership slot, returning it to the free list", frame);
                        inner.push_free(id)
                    }
                }
            }
        }
    }

    pub const fn name(self) -> &'static str {
        match self {
            Policy::Simple => "simple",
            Policy::LocalityAware => "locality",
        }
    }
}

impl core::str::FromStr for Policy {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "simple" => Ok(Policy::Simple),
            "locality" => Ok(Policy::LocalityAware),
            _ => Err(ConfigError::UnknownPolicy),
        }
    }
}

impl core::fmt::Display for Policy {
    fn fmt(&self, f: &mut core::fmt::Formatter) -> core::fmt::Result {
        f.write_str(self.name())
    }
}
