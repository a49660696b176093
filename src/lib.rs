//! Multi-pattern signature scanning core.
//!
//! ## Scope
//! Classifies byte buffers against a compiled set of signature patterns:
//! literal strings (with `nocase`, `wide`, `xor` and `fullword` modifiers),
//! hex patterns with wildcards and gaps, and regular-expression programs.
//! Rule parsing and condition evaluation live elsewhere; this crate takes
//! already-extracted atoms and pattern syntax trees or programs.
//!
//! ## Key invariants
//! - Every resource is structurally bounded: atoms by `MAX_ATOM_LENGTH`,
//!   live fibers by `RE_MAX_FIBERS`, verification reach by `RE_SCAN_LIMIT`,
//!   matches per pattern by `MAX_STRING_MATCHES`.
//! - Verification is non-backtracking and never recurses.
//! - Rule sets are immutable and shared by up to `MAX_THREADS` scanners.
//!
//! ## Engine flow (single block)
//! 1) Aho-Corasick prefilter over atoms reports `(atom, end)` hits.
//! 2) Each hit fans out to its owning parts and is verified from its anchor
//!    (literal fast path or fiber executor).
//! 3) Chained parts are joined under their gap bounds.
//! 4) The match store dedupes, caps and raises degradation signals.
//!
//! ## Notable entry points
//! - `RulesBuilder` / `PatternSpec`: assemble a rule set.
//! - `Program` / `Node`: build pattern programs.
//! - `Scanner`: scan buffers or memory blocks; `ScanResults` to read back.

mod api;
mod demo;
mod engine;
mod error;
pub mod limits;
pub mod program;
mod rules;
#[cfg(test)]
pub mod test_utils;

pub use api::{
    AbortReason, CallbackFlow, ChainLink, GapBounds, Match, MemoryBlock, PatternId, ScanEvent,
    ScanOptions, ScanState, Signal, SubPatternId,
};
pub use demo::{demo_rules, demo_specs};
pub use engine::{CancelToken, ScanProfile, ScanResults, ScanStats, Scanner};
pub use error::{BuildError, ScanError, VerifyError};
pub use limits::Limits;
pub use program::{ByteClass, Inst, LengthBounds, MatchPolicy, Node, Program};
pub use rules::{
    AtomSpec, LiteralMatcher, Matcher, PartSpec, PatternSpec, Rules, RulesBuilder, SlotGuard,
};
