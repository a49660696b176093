//! Scan sessions: the [`Scanner`] lifecycle and hit dispatch.
//!
//! # Lifecycle
//! `Idle -> Scanning -> {Completed | Aborted(reason)}`. A finished scanner
//! may start another scan, which resets its scratch and returns to
//! `Scanning`.
//!
//! # Flow per block
//! 1) The block is fed to the prefilter in chunks of `chunk_size` bytes; the
//!    cancel token is polled before each chunk.
//! 2) Each atom hit fans out to its owning parts. The anchor is the atom
//!    start minus the part's backtrack; hits whose anchor would fall before
//!    the block start are skipped.
//! 3) The part verifies the anchor (literal fast path or fiber executor).
//! 4) Single-part matches go straight to the match store; chained parts go
//!    through the chain resolver, which forwards completed spans.
//! 5) The store applies dedupe and caps; new matches and signals are
//!    delivered to the callback. A `Break` from the callback aborts the scan.
//!
//! # Concurrency
//! A scanner holds one thread slot of its rule set until dropped. Scratch is
//! owned by the scanner and never shared.

use std::ops::ControlFlow;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use tracing::{debug, trace, warn};

use crate::api::{
    AbortReason, CallbackFlow, Match, MemoryBlock, PatternId, ScanEvent, ScanOptions, ScanState,
    Signal,
};
use crate::error::{ScanError, VerifyError};
use crate::rules::{Matcher, Rules, SlotGuard, SubPattern};

use super::fiber;
use super::literal;
use super::match_store::{OutOfMemory, Recorded, ScanProfile};
use super::prefilter::AtomHit;
use super::scratch::ScanScratch;
use super::stats::{bump, sat_add_u64, ScanStats};

/// Cooperative cancellation flag shared with other threads.
///
/// The flag is sticky: once cancelled, every scan of the owning scanner
/// aborts until [`CancelToken::reset`] is called.
#[derive(Clone, Debug, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Release);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }

    pub fn reset(&self) {
        self.0.store(false, Ordering::Release);
    }
}

type Callback<'c> = dyn FnMut(&ScanEvent) -> CallbackFlow + 'c;

/// Scans buffers against one rule set.
pub struct Scanner<'r> {
    rules: &'r Rules,
    slot: SlotGuard<'r>,
    scratch: ScanScratch,
    options: ScanOptions,
    state: ScanState,
    cancel: CancelToken,
}

impl<'r> Scanner<'r> {
    /// Claims a thread slot of `rules` and allocates scan state.
    ///
    /// # Errors
    /// - `NoFreeSlot` when `max_threads` scanners already hold a slot.
    /// - `AllocationFailed` when scan state cannot be allocated.
    pub fn new(rules: &'r Rules) -> Result<Self, ScanError> {
        let Some(slot) = rules.slots().acquire() else {
            let max = rules.slots().max();
            warn!(max, "no free scan slot");
            return Err(ScanError::NoFreeSlot { max });
        };
        let scratch = ScanScratch::new(rules)?;
        Ok(Self {
            rules,
            slot,
            scratch,
            options: ScanOptions::default(),
            state: ScanState::Idle,
            cancel: CancelToken::new(),
        })
    }

    pub fn with_options(mut self, options: ScanOptions) -> Self {
        self.options = options;
        self
    }

    pub fn set_options(&mut self, options: ScanOptions) {
        self.options = options;
    }

    pub fn options(&self) -> &ScanOptions {
        &self.options
    }

    /// Handle that cancels this scanner's scans from any thread.
    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    pub fn state(&self) -> ScanState {
        self.state
    }

    /// Index of the thread slot held by this scanner.
    pub fn slot(&self) -> usize {
        self.slot.index()
    }

    pub fn rules(&self) -> &'r Rules {
        self.rules
    }

    /// Scans `data` as one block at base 0.
    pub fn scan(&mut self, data: &[u8]) -> ScanState {
        self.scan_with(data, |_| ControlFlow::Continue(()))
    }

    /// Scans `data`, delivering matches and signals to `callback` as they
    /// are found.
    pub fn scan_with<F>(&mut self, data: &[u8], callback: F) -> ScanState
    where
        F: FnMut(&ScanEvent) -> CallbackFlow,
    {
        self.scan_blocks([MemoryBlock::new(0, data)], callback)
    }

    /// Scans independent blocks as one scan. Match offsets are absolute
    /// (`block.base + offset`); chains never span blocks.
    pub fn scan_blocks<'a, I, F>(&mut self, blocks: I, mut callback: F) -> ScanState
    where
        I: IntoIterator<Item = MemoryBlock<'a>>,
        F: FnMut(&ScanEvent) -> CallbackFlow,
    {
        self.scratch.reset(self.rules.pattern_count());
        self.state = ScanState::Scanning;
        debug!(
            slot = self.slot.index(),
            patterns = self.rules.pattern_count(),
            "scan started"
        );

        let mut outcome = Ok(());
        for block in blocks {
            if let Err(reason) = self.scan_block(block, &mut callback) {
                outcome = Err(reason);
                break;
            }
        }
        self.finish(outcome)
    }

    fn scan_block(
        &mut self,
        block: MemoryBlock<'_>,
        callback: &mut Callback<'_>,
    ) -> Result<(), AbortReason> {
        let rules = self.rules;
        let chunk_size = self.options.chunk_size.max(1);
        self.scratch.begin_block();
        bump(&mut self.scratch.stats.blocks_scanned);

        let mut ctx = HitCtx {
            rules,
            options: self.options,
            data: block.data,
            base: block.base,
            bytes_before: self.scratch.stats.bytes_scanned,
            callback,
            abort: None,
        };

        let mut offset = 0usize;
        loop {
            if self.cancel.is_cancelled() {
                return Err(AbortReason::Cancelled);
            }
            let chunk_end = offset.saturating_add(chunk_size).min(block.data.len());
            let chunk = &block.data[offset..chunk_end];

            let mut pf = self.scratch.prefilter;
            let scratch = &mut self.scratch;
            let flow = rules
                .prefilter()
                .scan_chunk(&mut pf, chunk, offset, |hit| ctx.on_hit(scratch, hit));
            self.scratch.prefilter = pf;
            sat_add_u64(&mut self.scratch.stats.bytes_scanned, chunk.len() as u64);

            if flow.is_break() {
                return Err(ctx.abort.unwrap_or(AbortReason::Callback));
            }
            offset = chunk_end;
            if offset >= block.data.len() {
                return Ok(());
            }
        }
    }

    fn finish(&mut self, outcome: Result<(), AbortReason>) -> ScanState {
        let stats = self.scratch.stats;
        match outcome {
            Ok(()) => {
                self.state = ScanState::Completed;
                debug!(
                    bytes = stats.bytes_scanned,
                    atom_hits = stats.atom_hits,
                    matches = stats.matches_recorded,
                    verify_failures = stats.verify_failures,
                    "scan completed"
                );
            }
            Err(reason) => {
                if !self.options.retain_partial_matches {
                    self.scratch.store.clear();
                }
                self.state = ScanState::Aborted(reason);
                debug!(?reason, bytes = stats.bytes_scanned, "scan aborted");
            }
        }
        self.state
    }

    /// Results of the most recent scan.
    pub fn results(&self) -> ScanResults<'_> {
        ScanResults {
            rules: self.rules,
            scratch: &self.scratch,
            state: self.state,
        }
    }
}

/// Borrowed view of a scanner's last scan.
pub struct ScanResults<'s> {
    rules: &'s Rules,
    scratch: &'s ScanScratch,
    state: ScanState,
}

impl<'s> ScanResults<'s> {
    pub fn state(&self) -> ScanState {
        self.state
    }

    /// Matches of `pattern`, sorted by offset.
    pub fn matches(&self, pattern: PatternId) -> &'s [Match] {
        self.scratch.store.matches(pattern)
    }

    pub fn matches_by_name(&self, name: &str) -> Option<&'s [Match]> {
        self.rules.pattern_id(name).map(|id| self.matches(id))
    }

    /// Patterns with at least one match, with their matches.
    pub fn matching(&self) -> impl Iterator<Item = (PatternId, &'s [Match])> + 's {
        let store = &self.scratch.store;
        (0..self.rules.pattern_count() as u32)
            .map(PatternId)
            .map(move |id| (id, store.matches(id)))
            .filter(|(_, m)| !m.is_empty())
    }

    pub fn total_matches(&self) -> usize {
        self.scratch.store.total()
    }

    pub fn signals(&self) -> &'s [Signal] {
        &self.scratch.signals
    }

    pub fn stats(&self) -> ScanStats {
        self.scratch.stats
    }

    pub fn profile(&self) -> &'s ScanProfile {
        &self.scratch.profile
    }
}

/// Per-block dispatch context.
struct HitCtx<'a, 'c> {
    rules: &'a Rules,
    options: ScanOptions,
    data: &'a [u8],
    base: u64,
    /// Bytes of earlier blocks in this scan.
    bytes_before: u64,
    callback: &'a mut Callback<'c>,
    abort: Option<AbortReason>,
}

impl HitCtx<'_, '_> {
    fn on_hit(&mut self, scratch: &mut ScanScratch, hit: AtomHit) -> ControlFlow<()> {
        bump(&mut scratch.stats.atom_hits);
        let rules = self.rules;
        let atom_len = rules.prefilter().atom_len(hit.atom);
        for target in rules.targets(hit.atom) {
            let Some(anchor) = hit.end.checked_sub(atom_len + target.backtrack as usize) else {
                continue;
            };
            let sub = rules.sub(target.sub);
            let Some((len, xor_key)) = self.verify(scratch, sub, anchor) else {
                continue;
            };

            if !sub.is_chained() {
                self.emit(scratch, sub.pattern, anchor, len, xor_key, hit.end)?;
                continue;
            }

            let mut completed = std::mem::take(&mut scratch.completed);
            completed.clear();
            scratch.chains.on_part_match(
                rules,
                target.sub,
                anchor,
                anchor + len,
                hit.end,
                &mut scratch.stats,
                &mut completed,
            );
            let mut flow = ControlFlow::Continue(());
            for &(head, end) in &completed {
                flow = self.emit(scratch, sub.pattern, head, end - head, 0, hit.end);
                if flow.is_break() {
                    break;
                }
            }
            scratch.completed = completed;
            flow?;
        }
        ControlFlow::Continue(())
    }

    /// Verifies one candidate; local failures count as no match.
    fn verify(
        &mut self,
        scratch: &mut ScanScratch,
        sub: &SubPattern,
        anchor: usize,
    ) -> Option<(usize, u8)> {
        bump(&mut scratch.stats.verifications);
        let rate = self.rules.limits().verification_profiling_rate;
        let started = if self.options.profiling {
            scratch.sample_tick += 1;
            (scratch.sample_tick >= rate).then(|| {
                scratch.sample_tick = 0;
                Instant::now()
            })
        } else {
            None
        };

        let result = match &sub.matcher {
            Matcher::Literal(lit) => {
                literal::verify(lit, self.data, anchor).map(|hit| (hit.len, hit.xor_key))
            }
            Matcher::Program(prog) => {
                let limits = self.rules.limits();
                match fiber::run(
                    prog,
                    self.data,
                    anchor,
                    limits.scan_limit,
                    limits.max_fibers,
                    &mut scratch.fibers,
                ) {
                    Ok(found) => found.map(|len| (len, 0)),
                    Err(err) => {
                        bump(&mut scratch.stats.verify_failures);
                        if matches!(err, VerifyError::TooManyFibers { .. }) {
                            bump(&mut scratch.stats.fiber_overflows);
                        }
                        debug!(
                            pattern = sub.pattern.0,
                            offset = self.base + anchor as u64,
                            %err,
                            "verification failed"
                        );
                        None
                    }
                }
            }
        };

        if let Some(t) = started {
            scratch.profile.add(sub.pattern, t.elapsed(), rate);
        }
        result
    }

    fn emit(
        &mut self,
        scratch: &mut ScanScratch,
        pattern: PatternId,
        start: usize,
        len: usize,
        xor_key: u8,
        pos: usize,
    ) -> ControlFlow<()> {
        let info = self.rules.pattern(pattern);
        if info.fullword && !literal::is_fullword(self.data, start, len, info.wide) {
            return ControlFlow::Continue(());
        }
        let m = Match {
            offset: self.base + start as u64,
            length: len as u64,
            xor_key,
        };
        match scratch.store.record(pattern, m) {
            Err(OutOfMemory) => {
                warn!(pattern = pattern.0, "match storage exhausted");
                self.abort = Some(AbortReason::OutOfMemory);
                ControlFlow::Break(())
            }
            Ok(Recorded::Duplicate) => ControlFlow::Continue(()),
            Ok(Recorded::Capped { first }) => {
                bump(&mut scratch.stats.matches_dropped);
                if first {
                    self.signal(scratch, Signal::TooManyMatches(pattern))
                } else {
                    ControlFlow::Continue(())
                }
            }
            Ok(Recorded::Inserted) => {
                bump(&mut scratch.stats.matches_recorded);
                trace!(pattern = pattern.0, offset = m.offset, length = m.length, "match");
                self.deliver(&ScanEvent::Match { pattern, m })?;
                self.check_slow(scratch, pattern, pos)
            }
        }
    }

    fn check_slow(
        &mut self,
        scratch: &mut ScanScratch,
        pattern: PatternId,
        pos: usize,
    ) -> ControlFlow<()> {
        if scratch.slow_signalled || !self.rules.has_weak_atoms() {
            return ControlFlow::Continue(());
        }
        let limits = self.rules.limits();
        let scanned = self.bytes_before + pos as u64;
        if scratch.store.total() > limits.slow_string_matches
            && scanned > limits.file_size_threshold as u64
        {
            scratch.slow_signalled = true;
            let culprit = self.rules.pattern(pattern).weak.then_some(pattern);
            return self.signal(scratch, Signal::TooSlowScanning(culprit));
        }
        ControlFlow::Continue(())
    }

    fn signal(&mut self, scratch: &mut ScanScratch, signal: Signal) -> ControlFlow<()> {
        warn!(?signal, "scan degraded");
        scratch.signals.push(signal);
        self.deliver(&ScanEvent::Signal(signal))
    }

    fn deliver(&mut self, event: &ScanEvent) -> ControlFlow<()> {
        if (self.callback)(event).is_break() {
            self.abort = Some(AbortReason::Callback);
            return ControlFlow::Break(());
        }
        ControlFlow::Continue(())
    }
}
