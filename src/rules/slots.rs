//! Thread-slot registry shared by every scanner of one rule set.
//!
//! A rule set may be scanned by at most `max_threads` scanners at once. Each
//! scanner holds one bit of an atomic mask for its whole lifetime; dropping
//! the [`SlotGuard`] clears the bit.

use std::sync::atomic::{AtomicU64, Ordering};

#[derive(Debug)]
pub(crate) struct ThreadSlots {
    mask: AtomicU64,
    max: usize,
}

impl ThreadSlots {
    pub(crate) fn new(max: usize) -> Self {
        debug_assert!(max >= 1 && max <= 64);
        Self {
            mask: AtomicU64::new(0),
            max,
        }
    }

    pub(crate) fn max(&self) -> usize {
        self.max
    }

    /// Claims the lowest free slot, or returns `None` when all are taken.
    pub(crate) fn acquire(&self) -> Option<SlotGuard<'_>> {
        let mut current = self.mask.load(Ordering::Relaxed);
        loop {
            let idx = (!current).trailing_zeros() as usize;
            if idx >= self.max {
                return None;
            }
            let bit = 1u64 << idx;
            match self.mask.compare_exchange_weak(
                current,
                current | bit,
                Ordering::Acquire,
                Ordering::Relaxed,
            ) {
                Ok(_) => {
                    return Some(SlotGuard {
                        slots: self,
                        idx: idx as u32,
                    })
                }
                Err(actual) => current = actual,
            }
        }
    }

    pub(crate) fn in_use(&self) -> usize {
        self.mask.load(Ordering::Relaxed).count_ones() as usize
    }
}

/// Holds one slot of a rule set; the slot is released on drop.
#[derive(Debug)]
pub struct SlotGuard<'a> {
    slots: &'a ThreadSlots,
    idx: u32,
}

impl SlotGuard<'_> {
    pub fn index(&self) -> usize {
        self.idx as usize
    }
}

impl Drop for SlotGuard<'_> {
    fn drop(&mut self) {
        self.slots
            .mask
            .fetch_and(!(1u64 << self.idx), Ordering::Release);
    }
}
