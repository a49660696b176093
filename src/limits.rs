//! Resource limits that govern scanning behavior.
//!
//! Every bound the engine enforces lives here: atom shape, match caps,
//! degradation thresholds, and the verifier's structural ceilings. The
//! constants are the single source of policy; [`Limits`] gathers them into a
//! value that is injected once when a rule set is built, so tests and callers
//! with unusual workloads can tighten or relax them without touching the
//! engine.
//!
//! # Invariants
//! - Defaults equal the constants below exactly.
//! - `Limits::validate` must succeed before any rule set is assembled.

use crate::error::BuildError;

/// Maximum number of scanners that may share one rule set simultaneously.
pub const MAX_THREADS: usize = 32;

/// Maximum length of an atom fed into the prefilter automaton.
pub const MAX_ATOM_LENGTH: usize = 4;

/// Highest atom quality score.
pub const MAX_ATOM_QUALITY: u8 = 255;

/// Lowest atom quality score.
pub const MIN_ATOM_QUALITY: u8 = 0;

/// Atoms scoring below this are considered weak for slow-scan detection.
pub const ATOM_QUALITY_WARNING_THRESHOLD: u8 =
    (MAX_ATOM_QUALITY as usize - 22 * MAX_ATOM_LENGTH + 38) as u8;

/// Maximum number of matches recorded for one pattern in one scan.
pub const MAX_STRING_MATCHES: usize = 1_000_000;

/// Total recorded matches after which a scan may be flagged as slow.
pub const SLOW_STRING_MATCHES: usize = 600_000;

/// Scanned bytes after which weak atoms make a scan eligible for the
/// slow-scan signal.
pub const FILE_SIZE_THRESHOLD: usize = 200_000;

/// Gaps wider than this split a pattern into chained parts.
pub const STRING_CHAINING_THRESHOLD: usize = 200;

/// One out of this many verifications is timed when profiling is enabled.
pub const MATCH_VERIFICATION_PROFILING_RATE: u64 = 1024;

/// Maximum number of split instructions in one program. Split ids are
/// stored in a `u8`, so this can never exceed 255.
pub const RE_MAX_SPLIT_ID: usize = 128;

/// Maximum depth of the explicit stack used while building programs.
pub const RE_MAX_STACK: usize = 1024;

/// Maximum number of bytes a verification may consume from its anchor.
pub const RE_SCAN_LIMIT: usize = 1024;

/// Maximum number of live fibers in one verification step.
pub const RE_MAX_FIBERS: usize = 1024;

/// Largest bound accepted in a counted repetition or gap.
pub const RE_MAX_RANGE: u16 = i16::MAX as u16;

/// Depth of the per-fiber repetition counter stack.
pub const FIBER_MAX_COUNTERS: usize = 8;

/// Bound set injected into a rule set at build time.
///
/// The default value mirrors the module constants. Thread slots are tracked
/// in a 64-bit mask, so `max_threads` is capped at 64.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Limits {
    pub max_threads: usize,
    pub max_atom_length: usize,
    pub atom_quality_warning_threshold: u8,
    pub max_string_matches: usize,
    pub slow_string_matches: usize,
    pub file_size_threshold: usize,
    pub string_chaining_threshold: usize,
    pub verification_profiling_rate: u64,
    pub max_split_id: usize,
    pub max_stack: usize,
    pub scan_limit: usize,
    pub max_fibers: usize,
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            max_threads: MAX_THREADS,
            max_atom_length: MAX_ATOM_LENGTH,
            atom_quality_warning_threshold: ATOM_QUALITY_WARNING_THRESHOLD,
            max_string_matches: MAX_STRING_MATCHES,
            slow_string_matches: SLOW_STRING_MATCHES,
            file_size_threshold: FILE_SIZE_THRESHOLD,
            string_chaining_threshold: STRING_CHAINING_THRESHOLD,
            verification_profiling_rate: MATCH_VERIFICATION_PROFILING_RATE,
            max_split_id: RE_MAX_SPLIT_ID,
            max_stack: RE_MAX_STACK,
            scan_limit: RE_SCAN_LIMIT,
            max_fibers: RE_MAX_FIBERS,
        }
    }
}

impl Limits {
    /// Checks that every bound is usable by the engine.
    ///
    /// # Errors
    /// - `BuildError::InvalidLimits` naming the first offending field.
    pub fn validate(&self) -> Result<(), BuildError> {
        let invalid = |field: &'static str, reason: &'static str| {
            Err(BuildError::InvalidLimits { field, reason })
        };
        if self.max_threads == 0 || self.max_threads > 64 {
            return invalid("max_threads", "must be in 1..=64");
        }
        if self.max_atom_length == 0 || self.max_atom_length > u8::MAX as usize {
            return invalid("max_atom_length", "must be in 1..=255");
        }
        if self.max_string_matches == 0 {
            return invalid("max_string_matches", "must be > 0");
        }
        if self.verification_profiling_rate == 0 {
            return invalid("verification_profiling_rate", "must be > 0");
        }
        if self.max_split_id > u8::MAX as usize {
            return invalid("max_split_id", "split ids must fit in a byte");
        }
        if self.max_stack == 0 {
            return invalid("max_stack", "must be > 0");
        }
        if self.scan_limit == 0 {
            return invalid("scan_limit", "must be > 0");
        }
        if self.max_fibers == 0 {
            return invalid("max_fibers", "must be > 0");
        }
        Ok(())
    }
}
