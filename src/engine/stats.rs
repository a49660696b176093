//! Per-scan counters.
//!
//! Counters saturate instead of wrapping; they are reset at the start of each
//! scan and read back through `ScanResults::stats`.

/// Saturating add for a `u64` counter.
#[inline(always)]
pub(crate) fn sat_add_u64(counter: &mut u64, delta: u64) {
    *counter = counter.saturating_add(delta);
}

/// Saturating increment for a `u64` counter.
#[inline(always)]
pub(crate) fn bump(counter: &mut u64) {
    sat_add_u64(counter, 1);
}

/// Work and loss counters for one scan.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ScanStats {
    /// Bytes fed through the prefilter, over all blocks.
    pub bytes_scanned: u64,
    pub blocks_scanned: u64,
    /// Atom occurrences reported by the prefilter.
    pub atom_hits: u64,
    /// Candidates handed to a verifier.
    pub verifications: u64,
    /// Candidates abandoned by a local verification failure.
    pub verify_failures: u64,
    /// Subset of `verify_failures` caused by the fiber ceiling.
    pub fiber_overflows: u64,
    /// Chain records dropped because a pending list was full.
    pub chain_pending_dropped: u64,
    /// Matches dropped because their pattern reached its cap.
    pub matches_dropped: u64,
    pub matches_recorded: u64,
}

impl ScanStats {
    pub(crate) fn reset(&mut self) {
        *self = Self::default();
    }
}
