//! Two-phase allocator bootstrap.
//!
//! 1. `bootstrap_phase1` runs while only the boot core is up and the early
//!    page tables map a small window of memory. It seeds the free list
//!    with that window.
//! 2. `bootstrap_phase2` runs once page tables covering all of memory are
//!    live on every core. It seeds the rest, lets the locality policy
//!    build its table from the free list, and turns locking on for good.
//!
//! Both phases take `&mut self`, so the lock is bypassed through
//! `Mutex::get_mut` rather than acquired.

use log::debug;

use crate::error::{BootstrapError, FrameError};
use crate::frame::PhysRange;
use crate::kmem::{Inner, Kmem};
use crate::ownership::OwnerTag;
use crate::policy::Policy;
use crate::storage::FrameStorage;

/// Where the allocator is in its startup sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Constructed, nothing seeded.
    Cold,
    /// Phase 1 done; single core, lock not enforced.
    Uniprocessor,
    /// Phase 2 done; lock enforced from here on.
    Multiprocessor,
}

impl Phase {
    pub const fn locking(self) -> bool {
        matches!(self, Phase::Multiprocessor)
    }
}

impl core::fmt::Display for Phase {
    fn fmt(&self, f: &mut core::fmt::Formatter) -> core::fmt::Result {
        match self {
            Phase::Cold => write!(f, "cold"),
            Phase::Uniprocessor => write!(f, "phase 1 (uniprocessor)"),
            Phase::Multiprocessor => write!(f, "phase 2 (multiprocessor)"),
        }
    }
}

impl<S: FrameStorage> Kmem<S> {
    /// Seed the free list with the memory the early page tables map.
    ///
    /// Returns the number of frames added.
    pub fn bootstrap_phase1(&mut self, range: PhysRange) -> Result<usize, BootstrapError> {
        self.expect_phase(Phase::Cold)?;
        let seeded = seed(self.inner.get_mut(), &range)?;
        self.phase = Phase::Uniprocessor;
        debug!("kmem: phase 1 seeded {} frames from {}", seeded, range);
        Ok(seeded)
    }

    /// Seed the remaining memory, build the ownership table if the policy
    /// needs one, and enable locking.
    ///
    /// Returns the number of frames added.
    pub fn bootstrap_phase2(&mut self, range: PhysRange) -> Result<usize, BootstrapError> {
        self.expect_phase(Phase::Uniprocessor)?;
        let inner = self.inner.get_mut();
        let seeded = seed(inner, &range)?;
        if self.config.policy == Policy::LocalityAware {
            let slots = materialize(inner);
            debug!(
                "kmem: ownership table holds {} frames, {} left on the free list",
                slots,
                inner.free.len()
            );
        }
        self.phase = Phase::Multiprocessor;
        debug!("kmem: phase 2 seeded {} frames from {}, locking on", seeded, range);
        Ok(seeded)
    }

    fn expect_phase(&self, expected: Phase) -> Result<(), BootstrapError> {
        if self.phase != expected {
            return Err(BootstrapError::OutOfOrder { expected, found: self.phase });
        }
        Ok(())
    }
}

/// Push every whole frame of `range` onto the free list.
///
/// The range is checked up front, bounds and overlap with frames already
/// on the list, so a bad range seeds nothing.
fn seed<S: FrameStorage>(inner: &mut Inner<S>, range: &PhysRange) -> Result<usize, FrameError> {
    inner.index.check_range(range)?;
    for addr in range.frames() {
        let id = inner.index.to_frame_number(addr)?;
        if inner.free.contains(id) {
            return Err(FrameError::DoubleFree { addr });
        }
    }

    let mut seeded = 0;
    for addr in range.frames() {
        let id = inner.index.to_frame_number(addr)?;
        inner.push_free(id)?;
        seeded += 1;
    }
    Ok(seeded)
}

/// Move free-list frames, in link order, into `Free` table slots until the
/// table is full or the list is empty. Slot order is fixed from here on.
fn materialize<S: FrameStorage>(inner: &mut Inner<S>) -> usize {
    let mut slots = 0;
    while !inner.table.is_full() {
        let Some(frame) = inner.pop_free() else {
            break;
        };
        inner.table.append(frame, OwnerTag::Free);
        slots += 1;
    }
    slots
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::KmemConfig;
    use crate::frame::PAGE_SIZE;
    use crate::storage::ArenaStorage;

    const BASE: u64 = 0x40_0000;

    fn cold(policy: Policy) -> Kmem<ArenaStorage> {
        let config = KmemConfig::DEFAULT
            .with_policy(policy)
            .with_table_capacity(64)
            .with_range(BASE, BASE + 16 * PAGE_SIZE);
        let storage = ArenaStorage::new(&config.frame_index().unwrap());
        Kmem::new(config, storage).unwrap()
    }

    #[test]
    fn phases_advance_in_order() {
        let mut kmem = cold(Policy::Simple);
        assert!(!kmem.locking());
        assert_eq!(kmem.bootstrap_phase1(PhysRange::new(BASE, BASE + 4 * PAGE_SIZE)), Ok(4));
        assert_eq!(kmem.phase(), Phase::Uniprocessor);
        assert!(!kmem.locking());
        assert_eq!(
            kmem.bootstrap_phase2(PhysRange::new(BASE + 4 * PAGE_SIZE, BASE + 16 * PAGE_SIZE)),
            Ok(12)
        );
        assert!(kmem.locking());
        assert_eq!(kmem.summary().free_list, 16);
    }

    #[test]
    fn phase2_before_phase1_is_rejected() {
        let mut kmem = cold(Policy::Simple);
        assert_eq!(
            kmem.bootstrap_phase2(PhysRange::new(BASE, BASE + PAGE_SIZE)),
            Err(BootstrapError::OutOfOrder { expected: Phase::Uniprocessor, found: Phase::Cold })
        );
    }

    #[test]
    fn no_way_back_after_phase2() {
        let mut kmem = cold(Policy::LocalityAware);
        kmem.bootstrap_phase1(PhysRange::new(BASE, BASE)).unwrap();
        kmem.bootstrap_phase2(PhysRange::new(BASE, BASE + PAGE_SIZE)).unwrap();
        assert!(matches!(
            kmem.bootstrap_phase1(PhysRange::new(BASE + PAGE_SIZE, BASE + 2 * PAGE_SIZE)),
            Err(BootstrapError::OutOfOrder { found: Phase::Multiprocessor, .. })
        ));
        assert!(kmem.locking());
    }

    #[test]
    fn bad_range_seeds_nothing() {
        let mut kmem = cold(Policy::Simple);
        let err = kmem
            .bootstrap_phase1(PhysRange::new(BASE - PAGE_SIZE, BASE + 2 * PAGE_SIZE))
            .unwrap_err();
        assert_eq!(err, BootstrapError::Frame(FrameError::OutOfRange { addr: BASE - PAGE_SIZE }));
        assert_eq!(kmem.phase(), Phase::Cold);
        assert_eq!(kmem.summary().free_list, 0);
    }

    #[test]
    fn overlapping_phases_are_a_double_free() {
        let mut kmem = cold(Policy::Simple);
        kmem.bootstrap_phase1(PhysRange::new(BASE, BASE + 2 * PAGE_SIZE)).unwrap();
        assert_eq!(
            kmem.bootstrap_phase2(PhysRange::new(BASE + PAGE_SIZE, BASE + 3 * PAGE_SIZE)),
            Err(BootstrapError::Frame(FrameError::DoubleFree { addr: BASE + PAGE_SIZE }))
        );
    }

    #[test]
    fn overlapping_range_leaves_list_untouched() {
        let mut kmem = cold(Policy::Simple);
        kmem.bootstrap_phase1(PhysRange::new(BASE + 2 * PAGE_SIZE, BASE + 3 * PAGE_SIZE))
            .unwrap();
        assert_eq!(
            kmem.bootstrap_phase2(PhysRange::new(BASE, BASE + 4 * PAGE_SIZE)),
            Err(BootstrapError::Frame(FrameError::DoubleFree { addr: BASE + 2 * PAGE_SIZE }))
        );
        assert_eq!(kmem.phase(), Phase::Uniprocessor);
        assert_eq!(kmem.summary().free_list, 1);

        assert_eq!(kmem.bootstrap_phase2(PhysRange::new(BASE, BASE + 2 * PAGE_SIZE)), Ok(2));
        assert_eq!(kmem.summary().free_list, 3);
    }

    #[test]
    fn unaligned_range_start_is_rounded_up() {
        let mut kmem = cold(Policy::Simple);
        assert_eq!(kmem.bootstrap_phase1(PhysRange::new(BASE + 1, BASE + 3 * PAGE_SIZE)), Ok(2));
    }

    #[test]
    fn locality_table_takes_every_seeded_frame() {
        let mut kmem = cold(Policy::LocalityAware);
        kmem.bootstrap_phase1(PhysRange::new(BASE, BASE + 4 * PAGE_SIZE)).unwrap();
        kmem.bootstrap_phase2(PhysRange::new(BASE + 4 * PAGE_SIZE, BASE + 16 * PAGE_SIZE))
            .unwrap();
        let summary = kmem.summary();
        assert_eq!(summary.tracked, 16);
        assert_eq!(summary.free, 16);
        assert_eq!(summary.free_list, 0);
    }
}
