//! Error types for rule assembly, scan setup, and candidate verification.
//!
//! Errors are split by stage so each failure keeps its own precise shape:
//! building a rule set ([`BuildError`]), starting a scan ([`ScanError`]),
//! and verifying one candidate ([`VerifyError`]). All enums are
//! `#[non_exhaustive]`; consumers should include a fallback match arm.
//!
//! # Design Notes
//! - `VerifyError` never escapes a scan. The session counts it and treats the
//!   candidate as non-matching.
//! - `ScanError` only describes failures that refuse a scan before it starts.
//!   Cancellation and callback aborts are terminal states, not errors.

use std::fmt;

/// Errors from building programs and assembling a rule set.
#[derive(Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum BuildError {
    /// A limit field is out of its usable range.
    InvalidLimits {
        field: &'static str,
        reason: &'static str,
    },
    /// The explicit construction stack exceeded its capacity.
    StackOverflow { max: usize },
    /// The program needs more split instructions than allowed.
    TooManySplits { max: usize },
    /// A repetition or gap bound exceeds the allowed range.
    RangeTooLarge { bound: u32, max: u16 },
    /// A repetition or gap has `min > max`.
    InvalidRange { min: u16, max: u16 },
    /// Counted repetitions are nested deeper than the fiber counter stack.
    RepeatNestingTooDeep { max: usize },
    /// A pattern has no parts or a literal part is empty.
    EmptyPattern { pattern: String },
    /// An atom is longer than the configured maximum.
    AtomTooLong { pattern: String, len: usize, max: usize },
    /// An atom does not lie inside the region its sub-pattern can match.
    AtomOutOfPattern { pattern: String, part: usize },
    /// A non-first chain part is missing its gap bounds.
    MissingGap { pattern: String, part: usize },
    /// The first part of a pattern declares a gap.
    UnexpectedGap { pattern: String },
    /// A chain gap has `min > max`.
    InvalidGap { pattern: String, min: u32, max: u32 },
    /// A literal combines `nocase` with `xor`.
    NocaseWithXor { pattern: String },
    /// A literal's xor key range is empty.
    EmptyXorRange { pattern: String },
    /// The rule set needs more ids than fit in 32 bits.
    TooManyPatterns,
}

impl fmt::Display for BuildError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidLimits { field, reason } => {
                write!(f, "invalid limit `{field}`: {reason}")
            }
            Self::StackOverflow { max } => {
                write!(f, "program construction stack exceeded {max} entries")
            }
            Self::TooManySplits { max } => {
                write!(f, "program uses more than {max} split instructions")
            }
            Self::RangeTooLarge { bound, max } => {
                write!(f, "repetition bound {bound} exceeds maximum {max}")
            }
            Self::InvalidRange { min, max } => {
                write!(f, "invalid repetition range {{{min},{max}}}")
            }
            Self::RepeatNestingTooDeep { max } => {
                write!(f, "counted repetitions nested deeper than {max}")
            }
            Self::EmptyPattern { pattern } => write!(f, "pattern `{pattern}` is empty"),
            Self::AtomTooLong { pattern, len, max } => {
                write!(
                    f,
                    "atom of length {len} in pattern `{pattern}` exceeds maximum {max}"
                )
            }
            Self::AtomOutOfPattern { pattern, part } => {
                write!(
                    f,
                    "atom in part {part} of pattern `{pattern}` lies outside the matched region"
                )
            }
            Self::MissingGap { pattern, part } => {
                write!(f, "part {part} of pattern `{pattern}` has no gap bounds")
            }
            Self::UnexpectedGap { pattern } => {
                write!(f, "first part of pattern `{pattern}` declares a gap")
            }
            Self::InvalidGap { pattern, min, max } => {
                write!(f, "invalid gap [{min}-{max}] in pattern `{pattern}`")
            }
            Self::NocaseWithXor { pattern } => {
                write!(f, "pattern `{pattern}` combines nocase with xor")
            }
            Self::EmptyXorRange { pattern } => {
                write!(f, "pattern `{pattern}` has an empty xor key range")
            }
            Self::TooManyPatterns => write!(f, "rule set exceeds 32-bit id space"),
        }
    }
}

impl std::error::Error for BuildError {}

/// Errors that refuse a scan before it starts.
#[derive(Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum ScanError {
    /// Every thread slot of the rule set is held by another scanner.
    NoFreeSlot { max: usize },
    /// Per-thread scan state could not be allocated.
    AllocationFailed { what: &'static str },
}

impl fmt::Display for ScanError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoFreeSlot { max } => {
                write!(f, "all {max} scan slots of the rule set are in use")
            }
            Self::AllocationFailed { what } => {
                write!(f, "failed to allocate scan state: {what}")
            }
        }
    }
}

impl std::error::Error for ScanError {}

/// Local failure while verifying one candidate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum VerifyError {
    /// More fibers were live in one step than the ceiling allows.
    TooManyFibers { max: usize },
    /// Nested repetition counters overflowed the fiber counter stack.
    CounterOverflow,
}

impl fmt::Display for VerifyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::TooManyFibers { max } => write!(f, "more than {max} live fibers"),
            Self::CounterOverflow => write!(f, "fiber counter stack overflow"),
        }
    }
}

impl std::error::Error for VerifyError {}
