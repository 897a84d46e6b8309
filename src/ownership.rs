//! Frame ownership tracking.
//!
//! A fixed-capacity table of `(frame, owner)` pairs. Under the simple
//! policy it is an append-only log of allocations; under the locality
//! policy every managed frame gets a slot at bootstrap and the slot order
//! decides which frames count as neighbours.

use alloc::vec::Vec;
use core::num::NonZeroU32;

use crate::frame::Frame;

// ─── Owner tags ─────────────────────────────────────────────────

/// Process identifier, always positive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Pid(NonZeroU32);

impl Pid {
    /// Returns `None` for zero and for ids that do not fit the raw
    /// (signed) owner encoding.
    pub const fn new(raw: u32) -> Option<Pid> {
        if raw > i32::MAX as u32 {
            return None;
        }
        match NonZeroU32::new(raw) {
            Some(id) => Some(Pid(id)),
            None => None,
        }
    }

    pub const fn get(self) -> u32 {
        self.0.get()
    }
}

impl core::fmt::Display for Pid {
    fn fmt(&self, f: &mut core::fmt::Formatter) -> core::fmt::Result {
        write!(f, "pid {}", self.0)
    }
}

/// Who currently holds a frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OwnerTag {
    /// Unallocated.
    Free,
    /// Allocated for kernel use with no attributable process.
    Transient,
    /// Allocated to a process.
    Process(Pid),
}

impl OwnerTag {
    pub const RAW_FREE: i32 = 0;
    pub const RAW_TRANSIENT: i32 = -2;

    /// Encoding used by the diagnostic export.
    pub const fn as_raw(self) -> i32 {
        match self {
            OwnerTag::Free => Self::RAW_FREE,
            OwnerTag::Transient => Self::RAW_TRANSIENT,
            OwnerTag::Process(pid) => pid.get() as i32,
        }
    }

    pub const fn from_raw(raw: i32) -> Option<OwnerTag> {
        match raw {
            Self::RAW_FREE => Some(OwnerTag::Free),
            Self::RAW_TRANSIENT => Some(OwnerTag::Transient),
            p if p > 0 => match Pid::new(p as u32) {
                Some(pid) => Some(OwnerTag::Process(pid)),
                None => None,
            },
            _ => None,
        }
    }

    pub const fn is_free(self) -> bool {
        matches!(self, OwnerTag::Free)
    }

    /// Whether a slot held by `self` may border a slot claimed for
    /// `requester`.
    fn borders(self, requester: OwnerTag) -> bool {
        matches!(self, OwnerTag::Free | OwnerTag::Transient) || self == requester
    }
}

impl From<Pid> for OwnerTag {
    fn from(pid: Pid) -> Self {
        OwnerTag::Process(pid)
    }
}

impl core::fmt::Display for OwnerTag {
    fn fmt(&self, f: &mut core::fmt::Formatter) -> core::fmt::Result {
        match self {
            OwnerTag::Free => write!(f, "free"),
            OwnerTag::Transient => write!(f, "kernel"),
            OwnerTag::Process(pid) => write!(f, "{}", pid),
        }
    }
}

// ─── Table ──────────────────────────────────────────────────────

/// One table slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OwnershipEntry {
    pub frame: Frame,
    pub owner: OwnerTag,
}

pub struct OwnershipTable {
    entries: Vec<OwnershipEntry>,
    capacity: usize,
}

impl OwnershipTable {
    /// Reserve room for `capacity` slots up front; the table never grows
    /// past it.
    pub fn new(capacity: usize) -> Self {
        OwnershipTable {
            entries: Vec::with_capacity(capacity),
            capacity,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.entries.len() >= self.capacity
    }

    pub fn entries(&self) -> &[OwnershipEntry] {
        &self.entries
    }

    /// Append a slot. Returns `false` (and records nothing) when full.
    pub fn append(&mut self, frame: Frame, owner: OwnerTag) -> bool {
        if self.is_full() {
            return false;
        }
        self.entries.push(OwnershipEntry { frame, owner });
        true
    }

    /// Slot index of `frame`, by linear scan.
    pub fn position(&self, frame: Frame) -> Option<usize> {
        self.entries.iter().position(|e| e.frame == frame)
    }

    /// Overwrite the owner of `frame`, returning the previous owner.
    pub fn set_owner(&mut self, frame: Frame, owner: OwnerTag) -> Option<OwnerTag> {
        let slot = self.position(frame)?;
        Some(core::mem::replace(&mut self.entries[slot].owner, owner))
    }

    /// Hand slot `slot` to `owner` and return its frame.
    pub fn claim(&mut self, slot: usize, owner: OwnerTag) -> Frame {
        let entry = &mut self.entries[slot];
        entry.owner = owner;
        entry.frame
    }

    fn owner_at(&self, slot: usize) -> Option<OwnerTag> {
        self.entries.get(slot).map(|e| e.owner)
    }

    /// First free slot whose neighbours are compatible with `requester`.
    ///
    /// Slot 0 only looks right: it is taken when slot 1 is free or already
    /// belongs to the requester. Every other free slot needs both
    /// neighbours free, transient or the requester's own; a slot past the
    /// end of the table never counts as compatible. A transient requester
    /// skips the neighbour test and takes the first free slot from 1 up.
    ///
    /// May return `None` while free slots remain. A one-slot table never
    /// hands out its frame, not even to a transient requester.
    pub fn find_free_slot(&self, requester: OwnerTag) -> Option<usize> {
        let fits = |slot: usize| self.owner_at(slot).is_some_and(|o| o.borders(requester));

        if self.owner_at(0) == Some(OwnerTag::Free)
            && self
                .owner_at(1)
                .is_some_and(|o| o == OwnerTag::Free || o == requester)
        {
            return Some(0);
        }

        (1..self.entries.len()).find(|&slot| {
            self.entries[slot].owner.is_free()
                && (requester == OwnerTag::Transient || (fits(slot - 1) && fits(slot + 1)))
        })
    }

    /// Slots that are not free, in table order.
    pub fn owned(&self) -> impl Iterator<Item = &OwnershipEntry> + '_ {
        self.entries.iter().filter(|e| !e.owner.is_free())
    }

    /// Number of slots held by `owner`.
    pub fn count(&self, owner: OwnerTag) -> usize {
        self.entries.iter().filter(|e| e.owner == owner).count()
    }

    pub(crate) fn summarize(&self, free_list: usize) -> OwnershipSummary {
        let mut summary = OwnershipSummary {
            tracked: self.entries.len(),
            free_list,
            ..OwnershipSummary::default()
        };
        for entry in &self.entries {
            match entry.owner {
                OwnerTag::Free => summary.free += 1,
                OwnerTag::Transient => summary.transient += 1,
                OwnerTag::Process(_) => summary.process += 1,
            }
        }
        summary
    }
}

/// Aggregate view of the table.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OwnershipSummary {
    /// Slots in use in the table.
    pub tracked: usize,
    pub free: usize,
    pub transient: usize,
    pub process: usize,
    /// Frames sitting on the free list.
    pub free_list: usize,
}

impl core::fmt::Display for OwnershipSummary {
    fn fmt(&self, f: &mut core::fmt::Formatter) -> core::fmt::Result {
        write!(
            f,
            "{} tracked ({} free, {} kernel, {} process), {} on free list",
            self.tracked, self.free, self.transient, self.process, self.free_list
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::PAGE_SIZE;

    fn pid(raw: u32) -> OwnerTag {
        OwnerTag::Process(Pid::new(raw).unwrap())
    }

    fn table(owners: &[OwnerTag]) -> OwnershipTable {
        let mut table = OwnershipTable::new(owners.len());
        for (i, &owner) in owners.iter().enumerate() {
            assert!(table.append(Frame::from_start((i as u64 + 1) * PAGE_SIZE), owner));
        }
        table
    }

    #[test]
    fn raw_encoding() {
        assert_eq!(OwnerTag::Free.as_raw(), 0);
        assert_eq!(OwnerTag::Transient.as_raw(), -2);
        assert_eq!(pid(7).as_raw(), 7);
        assert_eq!(OwnerTag::from_raw(-2), Some(OwnerTag::Transient));
        assert_eq!(OwnerTag::from_raw(9), Some(pid(9)));
        assert_eq!(OwnerTag::from_raw(-1), None);
    }

    #[test]
    fn pid_must_be_positive_and_fit() {
        assert!(Pid::new(0).is_none());
        assert!(Pid::new(u32::MAX).is_none());
        assert_eq!(Pid::new(5).map(Pid::get), Some(5));
    }

    #[test]
    fn append_stops_at_capacity() {
        let mut table = OwnershipTable::new(1);
        assert!(table.append(Frame::from_start(PAGE_SIZE), OwnerTag::Transient));
        assert!(!table.append(Frame::from_start(2 * PAGE_SIZE), OwnerTag::Transient));
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn set_owner_finds_by_frame() {
        let mut table = table(&[OwnerTag::Free, pid(3), OwnerTag::Free]);
        let frame = table.entries()[1].frame;
        assert_eq!(table.set_owner(frame, OwnerTag::Free), Some(pid(3)));
        assert_eq!(table.count(OwnerTag::Free), 3);
        assert_eq!(table.set_owner(Frame::from_start(0x9999_000), OwnerTag::Free), None);
    }

    #[test]
    fn slot_zero_taken_when_right_neighbour_free() {
        let table = table(&[OwnerTag::Free, OwnerTag::Free, OwnerTag::Free]);
        assert_eq!(table.find_free_slot(pid(5)), Some(0));
    }

    #[test]
    fn slot_zero_taken_when_right_neighbour_is_requester() {
        let table = table(&[OwnerTag::Free, pid(5), OwnerTag::Free]);
        assert_eq!(table.find_free_slot(pid(5)), Some(0));
    }

    #[test]
    fn slot_zero_ignores_transient_right_neighbour_for_processes() {
        // Only slot 0 is picky about a transient neighbour.
        let table = table(&[OwnerTag::Free, OwnerTag::Transient, OwnerTag::Free, OwnerTag::Free]);
        assert_eq!(table.find_free_slot(pid(5)), Some(2));
    }

    #[test]
    fn grows_next_to_own_frames() {
        let table = table(&[pid(5), OwnerTag::Free, OwnerTag::Free]);
        assert_eq!(table.find_free_slot(pid(5)), Some(1));
    }

    #[test]
    fn skips_slots_bordering_other_processes() {
        let table = table(&[
            pid(4),
            OwnerTag::Free,
            pid(4),
            OwnerTag::Free,
            OwnerTag::Free,
            OwnerTag::Free,
        ]);
        assert_eq!(table.find_free_slot(pid(5)), Some(4));
        assert_eq!(table.find_free_slot(pid(4)), Some(1));
    }

    #[test]
    fn last_slot_is_never_neighbour_compatible() {
        let table = table(&[pid(5), OwnerTag::Free]);
        assert_eq!(table.find_free_slot(pid(5)), None);
        assert_eq!(table.find_free_slot(OwnerTag::Transient), Some(1));
    }

    #[test]
    fn transient_takes_first_free_from_one() {
        let table = table(&[pid(4), pid(7), OwnerTag::Free, pid(9)]);
        assert_eq!(table.find_free_slot(OwnerTag::Transient), Some(2));
        assert_eq!(table.find_free_slot(pid(5)), None);
    }

    #[test]
    fn fragmented_table_reports_nothing() {
        let table = table(&[pid(1), OwnerTag::Free, pid(2), OwnerTag::Free, pid(3)]);
        assert_eq!(table.count(OwnerTag::Free), 2);
        assert_eq!(table.find_free_slot(pid(5)), None);
    }

    #[test]
    fn full_scan_of_large_table_terminates() {
        let mut owners = vec![pid(1); 4096];
        owners[4094] = OwnerTag::Free;
        owners[4095] = OwnerTag::Transient;
        let table = table(&owners);
        assert_eq!(table.find_free_slot(pid(2)), None);
        assert_eq!(table.find_free_slot(pid(1)), Some(4094));
    }

    #[test]
    fn summary_counts_each_kind() {
        let table = table(&[OwnerTag::Free, OwnerTag::Transient, pid(2), pid(3)]);
        let summary = table.summarize(6);
        assert_eq!(
            summary,
            OwnershipSummary { tracked: 4, free: 1, transient: 1, process: 2, free_list: 6 }
        );
        assert_eq!(table.owned().count(), 3);
    }
}
