//! Intrusive singly linked free list over an arena of frame slots.
//!
//! Each frame in the managed range owns one link word. A free frame's word
//! holds the index of the next free frame (or [`END`]); a frame that is
//! not on the list holds [`DETACHED`]. Push and pop are O(1) and LIFO.

use alloc::vec;
use alloc::vec::Vec;

use crate::frame::FrameId;

/// Link value terminating the list.
const END: u32 = u32::MAX;
/// Link value of a frame that is not on the list.
const DETACHED: u32 = u32::MAX - 1;

/// Result of pushing a frame that is already on the list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AlreadyFree(pub FrameId);

pub struct FreeList {
    links: Vec<u32>,
    head: u32,
    len: usize,
}

impl FreeList {
    /// Create an empty list able to hold `slots` frames.
    pub fn new(slots: usize) -> Self {
        FreeList {
            links: vec![DETACHED; slots],
            head: END,
            len: 0,
        }
    }

    /// Prepend `frame`.
    pub fn push(&mut self, frame: FrameId) -> Result<(), AlreadyFree> {
        let slot = frame.as_usize();
        if self.links[slot] != DETACHED {
            return Err(AlreadyFree(frame));
        }
        self.links[slot] = self.head;
        self.head = frame.raw();
        self.len += 1;
        Ok(())
    }

    /// Remove and return the head.
    pub fn pop(&mut self) -> Option<FrameId> {
        if self.head == END {
            return None;
        }
        let id = FrameId::new(self.head);
        let slot = id.as_usize();
        self.head = self.links[slot];
        self.links[slot] = DETACHED;
        self.len -= 1;
        Some(id)
    }

    /// Whether `frame` is currently on the list.
    pub fn contains(&self, frame: FrameId) -> bool {
        self.links[frame.as_usize()] != DETACHED
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.head == END
    }

    /// Walk the list from the head in link order.
    pub fn iter(&self) -> Iter<'_> {
        Iter { list: self, cursor: self.head }
    }
}

pub struct Iter<'a> {
    list: &'a FreeList,
    cursor: u32,
}

impl Iterator for Iter<'_> {
    type Item = FrameId;

    fn next(&mut self) -> Option<FrameId> {
        if self.cursor == END {
            return None;
        }
        let id = FrameId::new(self.cursor);
        self.cursor = self.list.links[id.as_usize()];
        Some(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(raw: u32) -> FrameId {
        FrameId::new(raw)
    }

    #[test]
    fn pops_in_lifo_order() {
        let mut list = FreeList::new(4);
        for raw in 0..4 {
            list.push(id(raw)).unwrap();
        }
        assert_eq!(list.len(), 4);
        let popped: Vec<u32> = core::iter::from_fn(|| list.pop()).map(FrameId::raw).collect();
        assert_eq!(popped, vec![3, 2, 1, 0]);
        assert!(list.is_empty());
        assert_eq!(list.pop(), None);
    }

    #[test]
    fn single_link_advance_keeps_every_frame() {
        let mut list = FreeList::new(8);
        for raw in 0..8 {
            list.push(id(raw)).unwrap();
        }
        let mut seen = 0;
        while list.pop().is_some() {
            seen += 1;
        }
        assert_eq!(seen, 8);
    }

    #[test]
    fn double_push_is_rejected() {
        let mut list = FreeList::new(2);
        list.push(id(1)).unwrap();
        assert_eq!(list.push(id(1)), Err(AlreadyFree(id(1))));
        assert_eq!(list.len(), 1);
    }

    #[test]
    fn popped_frame_can_be_pushed_again() {
        let mut list = FreeList::new(2);
        list.push(id(0)).unwrap();
        let frame = list.pop().unwrap();
        assert!(!list.contains(frame));
        list.push(frame).unwrap();
        assert!(list.contains(frame));
    }

    #[test]
    fn iter_follows_link_order() {
        let mut list = FreeList::new(5);
        for raw in [2, 0, 4] {
            list.push(id(raw)).unwrap();
        }
        let order: Vec<u32> = list.iter().map(FrameId::raw).collect();
        assert_eq!(order, vec![4, 0, 2]);
        assert_eq!(list.len(), 3);
    }
}
