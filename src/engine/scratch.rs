//! Per-scanner scratch state.
//!
//! [`ScanScratch`] bundles everything a scan mutates: the match store, chain
//! pending lists, fiber arenas, counters, signals and profile. It is owned by
//! exactly one `Scanner` and reused across scans so steady-state scanning does
//! not allocate beyond match growth.

use crate::api::Signal;
use crate::error::ScanError;
use crate::rules::Rules;

use super::chain::ChainState;
use super::fiber::FiberScratch;
use super::match_store::{MatchStore, ScanProfile};
use super::prefilter::PrefilterState;
use super::stats::ScanStats;

pub(crate) struct ScanScratch {
    pub(crate) store: MatchStore,
    pub(crate) chains: ChainState,
    pub(crate) fibers: FiberScratch,
    pub(crate) prefilter: PrefilterState,
    pub(crate) stats: ScanStats,
    pub(crate) signals: Vec<Signal>,
    pub(crate) profile: ScanProfile,
    /// Verifications seen since the last timed one.
    pub(crate) sample_tick: u64,
    pub(crate) slow_signalled: bool,
    /// Chains completed by the current hit.
    pub(crate) completed: Vec<(usize, usize)>,
}

impl ScanScratch {
    pub(crate) fn new(rules: &Rules) -> Result<Self, ScanError> {
        let limits = rules.limits();
        Ok(Self {
            store: MatchStore::new(rules.pattern_count(), limits.max_string_matches)?,
            chains: ChainState::new(rules.sub_count(), limits.max_string_matches),
            fibers: FiberScratch::new(),
            prefilter: PrefilterState::default(),
            stats: ScanStats::default(),
            signals: Vec::new(),
            profile: ScanProfile::default(),
            sample_tick: 0,
            slow_signalled: false,
            completed: Vec::new(),
        })
    }

    /// Prepares for a new scan over the same rule set.
    pub(crate) fn reset(&mut self, patterns: usize) {
        self.store.clear();
        self.chains.reset();
        self.prefilter.reset();
        self.stats.reset();
        self.signals.clear();
        self.profile.reset(patterns);
        self.sample_tick = 0;
        self.slow_signalled = false;
        self.completed.clear();
    }

    /// Prepares for the next block of the current scan.
    pub(crate) fn begin_block(&mut self) {
        self.chains.reset();
        self.prefilter.reset();
    }
}
