//! Scanning engine: prefilter, verifiers, chain resolver, match store and
//! the scan session that drives them.
//!
//! The engine never owns rules. A [`Scanner`] borrows an immutable
//! [`Rules`](crate::Rules) and owns all mutable scan state in its
//! [`ScanScratch`](scratch::ScanScratch).
//!
//! Submodules, leaves first:
//! - `prefilter`: Aho-Corasick over atoms, resumable across chunks.
//! - `literal`: literal fast path and `fullword` check.
//! - `fiber`: bounded Pike-style program executor.
//! - `chain`: gap-bounded joining of chained parts.
//! - `match_store`: per-pattern ordered, capped match lists and profile.
//! - `session`: the scanner state machine and hit dispatch.

mod chain;
mod fiber;
mod literal;
mod match_store;
pub(crate) mod prefilter;
mod scratch;
mod session;
mod stats;

pub use match_store::ScanProfile;
pub use session::{CancelToken, ScanResults, Scanner};
pub use stats::ScanStats;
