//! Per-pattern match storage, match caps, and sampled verification profile.
//!
//! # Invariants
//! - Each pattern's matches are sorted by offset with no two equal offsets.
//! - A pattern never holds more than `cap` matches. The first drop past the
//!   cap is reported once per scan through [`Recorded::Capped`].
//! - Growth uses `try_reserve`; allocation failure is surfaced to the
//!   session instead of aborting the process.

use std::time::Duration;

use crate::api::{Match, PatternId};
use crate::error::ScanError;

/// Outcome of [`MatchStore::record`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Recorded {
    Inserted,
    /// The offset is already recorded for this pattern.
    Duplicate,
    /// The pattern is full; `first` is true for the first drop of the scan.
    Capped { first: bool },
}

/// Match storage could not grow.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) struct OutOfMemory;

pub(crate) struct MatchStore {
    per_pattern: Vec<Vec<Match>>,
    capped: Vec<bool>,
    cap: usize,
    total: usize,
}

impl MatchStore {
    pub(crate) fn new(patterns: usize, cap: usize) -> Result<Self, ScanError> {
        let mut per_pattern = Vec::new();
        let mut capped = Vec::new();
        per_pattern
            .try_reserve_exact(patterns)
            .and_then(|_| capped.try_reserve_exact(patterns))
            .map_err(|_| ScanError::AllocationFailed {
                what: "match store",
            })?;
        per_pattern.resize_with(patterns, Vec::new);
        capped.resize(patterns, false);
        Ok(Self {
            per_pattern,
            capped,
            cap,
            total: 0,
        })
    }

    /// Drops every match and cap flag, keeping allocations.
    pub(crate) fn clear(&mut self) {
        for list in &mut self.per_pattern {
            list.clear();
        }
        self.capped.iter_mut().for_each(|c| *c = false);
        self.total = 0;
    }

    pub(crate) fn record(&mut self, pattern: PatternId, m: Match) -> Result<Recorded, OutOfMemory> {
        let list = &mut self.per_pattern[pattern.index()];
        // Matches mostly arrive in offset order, so check the tail first.
        let pos = match list.last() {
            Some(last) if last.offset < m.offset => list.len(),
            _ => list.partition_point(|x| x.offset < m.offset),
        };
        if list.get(pos).is_some_and(|x| x.offset == m.offset) {
            return Ok(Recorded::Duplicate);
        }
        if list.len() >= self.cap {
            let first = !self.capped[pattern.index()];
            self.capped[pattern.index()] = true;
            return Ok(Recorded::Capped { first });
        }
        list.try_reserve(1).map_err(|_| OutOfMemory)?;
        list.insert(pos, m);
        self.total += 1;
        Ok(Recorded::Inserted)
    }

    #[inline]
    pub(crate) fn matches(&self, pattern: PatternId) -> &[Match] {
        self.per_pattern
            .get(pattern.index())
            .map_or(&[], |list| list.as_slice())
    }

    /// Matches recorded over all patterns.
    pub(crate) fn total(&self) -> usize {
        self.total
    }
}

/// Sampled verification cost per pattern.
///
/// Costs are estimates: each timed verification stands for `rate`
/// verifications, so its elapsed time is scaled by the sampling rate.
#[derive(Clone, Debug, Default)]
pub struct ScanProfile {
    per_pattern: Vec<Duration>,
}

impl ScanProfile {
    pub(crate) fn reset(&mut self, patterns: usize) {
        self.per_pattern.clear();
        self.per_pattern.resize(patterns, Duration::ZERO);
    }

    pub(crate) fn add(&mut self, pattern: PatternId, elapsed: Duration, rate: u64) {
        if let Some(cost) = self.per_pattern.get_mut(pattern.index()) {
            let scaled = elapsed.saturating_mul(rate.min(u32::MAX as u64) as u32);
            *cost = cost.saturating_add(scaled);
        }
    }

    /// Estimated verification time attributed to `pattern`.
    pub fn cost(&self, pattern: PatternId) -> Duration {
        self.per_pattern
            .get(pattern.index())
            .copied()
            .unwrap_or(Duration::ZERO)
    }

    /// Up to `n` patterns with non-zero cost, most expensive first.
    pub fn slowest(&self, n: usize) -> Vec<(PatternId, Duration)> {
        let mut ranked: Vec<(PatternId, Duration)> = self
            .per_pattern
            .iter()
            .enumerate()
            .filter(|(_, d)| !d.is_zero())
            .map(|(i, d)| (PatternId(i as u32), *d))
            .collect();
        ranked.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(&b.0)));
        ranked.truncate(n);
        ranked
    }
}
