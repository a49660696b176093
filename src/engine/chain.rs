//! Joins matches of chained parts separated by bounded gaps.
//!
//! Each chained part that is not the last one keeps a pending list of
//! `(head_start, end)` records: `head_start` is where the whole chain began,
//! `end` is where this part's match ended. Lists are sorted by `end`, so both
//! joining and expiry are range operations.
//!
//! # Semantics
//! - A match of part `k > 0` starting at `start` joins every record of part
//!   `k - 1` with `start - end` in `[gap.min, gap.max]`.
//! - A gap that is too small rejects only that pairing; the record stays for
//!   later hits.
//! - Records whose `end + gap.max` lies behind the earliest start any future
//!   hit of the next part can have are dropped.
//! - A pending list holds at most `cap` records; overflow is dropped and
//!   counted.
//! - State is per block: `reset` is called before each block.

use std::collections::VecDeque;

use super::stats::{bump, ScanStats};
use crate::rules::Rules;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct Pending {
    head_start: usize,
    end: usize,
}

pub(crate) struct ChainState {
    pending: Vec<VecDeque<Pending>>,
    cap: usize,
}

impl ChainState {
    pub(crate) fn new(parts: usize, cap: usize) -> Self {
        let mut pending = Vec::with_capacity(parts);
        pending.resize_with(parts, VecDeque::new);
        Self { pending, cap }
    }

    pub(crate) fn reset(&mut self) {
        for list in &mut self.pending {
            list.clear();
        }
    }

    #[cfg(test)]
    fn pending_len(&self, sub: u32) -> usize {
        self.pending[sub as usize].len()
    }

    /// Feeds a verified match `start..end` of chained part `sub`, found
    /// while the prefilter stood at `pos`. Completed chains are appended to
    /// `completed` as `(head_start, end)`.
    pub(crate) fn on_part_match(
        &mut self,
        rules: &Rules,
        sub: u32,
        start: usize,
        end: usize,
        pos: usize,
        stats: &mut ScanStats,
        completed: &mut Vec<(usize, usize)>,
    ) {
        let part = rules.sub(sub);
        let Some(prev) = part.chained_to else {
            self.insert(
                sub,
                Pending {
                    head_start: start,
                    end,
                },
                stats,
            );
            return;
        };
        let Some(gap) = part.gap else {
            return;
        };

        let horizon = pos.saturating_sub(part.reach as usize);
        let list = &mut self.pending[prev as usize];
        while list
            .front()
            .is_some_and(|p| p.end.saturating_add(gap.max as usize) < horizon)
        {
            list.pop_front();
        }

        let Some(hi) = start.checked_sub(gap.min as usize) else {
            return;
        };
        let lo = start.saturating_sub(gap.max as usize);
        let first = list.partition_point(|p| p.end < lo);
        let last = list.partition_point(|p| p.end <= hi);
        if first >= last {
            return;
        }

        let heads: Vec<usize> = list.range(first..last).map(|p| p.head_start).collect();
        for head_start in heads {
            if part.has_next {
                self.insert(sub, Pending { head_start, end }, stats);
            } else {
                completed.push((head_start, end));
            }
        }
    }

    fn insert(&mut self, sub: u32, rec: Pending, stats: &mut ScanStats) {
        let list = &mut self.pending[sub as usize];
        let pos = list.partition_point(|p| p.end <= rec.end);
        if list.range(..pos).rev().take_while(|p| p.end == rec.end).any(|p| *p == rec) {
            return;
        }
        if list.len() >= self.cap {
            bump(&mut stats.chain_pending_dropped);
            return;
        }
        list.insert(pos, rec);
    }
}
