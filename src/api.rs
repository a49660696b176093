use std::ops::ControlFlow;

// --------------------------
// Public API types
// --------------------------

/// Identifier of a pattern inside a rule set, in insertion order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PatternId(pub u32);

impl PatternId {
    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// Identifier of one sub-pattern (chain part) inside a rule set.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct SubPatternId(pub(crate) u32);

/// Inclusive byte distance allowed between the end of one chain part and the
/// start of the next.
///
/// `max == u32::MAX` stands for an unbounded gap.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct GapBounds {
    pub min: u32,
    pub max: u32,
}

impl GapBounds {
    pub const fn new(min: u32, max: u32) -> Self {
        Self { min, max }
    }

    pub const fn unbounded(min: u32) -> Self {
        Self { min, max: u32::MAX }
    }
}

/// Link between two consecutive parts of a chained pattern.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ChainLink {
    pub pattern: PatternId,
    pub from: SubPatternId,
    pub to: SubPatternId,
    pub gap: GapBounds,
}

/// One recorded occurrence of a pattern.
///
/// `offset` is absolute: the block base plus the offset inside the block.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Match {
    pub offset: u64,
    pub length: u64,
    /// Key the literal was xor-encoded with; 0 for plain matches.
    pub xor_key: u8,
}

/// Advisory conditions raised during a scan.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Signal {
    /// The pattern reached its match cap; later matches were dropped.
    TooManyMatches(PatternId),
    /// The scan is likely slow because weak atoms produce many matches.
    /// Tagged with the responsible pattern when it owns weak atoms.
    TooSlowScanning(Option<PatternId>),
}

/// Event delivered to the scan callback.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ScanEvent {
    Match { pattern: PatternId, m: Match },
    Signal(Signal),
}

/// Return value of scan callbacks. `Break` aborts the scan.
pub type CallbackFlow = ControlFlow<()>;

/// Why a scan stopped before the end of its input.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AbortReason {
    /// The scan's `CancelToken` was triggered.
    Cancelled,
    /// The event callback returned `ControlFlow::Break`.
    Callback,
    /// Match storage could not grow.
    OutOfMemory,
}

/// Lifecycle of a scanner.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ScanState {
    #[default]
    Idle,
    Scanning,
    Completed,
    Aborted(AbortReason),
}

impl ScanState {
    pub fn is_terminal(self) -> bool {
        matches!(self, ScanState::Completed | ScanState::Aborted(_))
    }
}

/// Per-scan options.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ScanOptions {
    /// Bytes fed to the prefilter between cancellation polls.
    pub chunk_size: usize,
    /// Time sampled verifications and attribute cost to patterns.
    pub profiling: bool,
    /// Keep matches found before an abort instead of discarding them.
    pub retain_partial_matches: bool,
}

impl Default for ScanOptions {
    fn default() -> Self {
        Self {
            chunk_size: 64 * 1024,
            profiling: false,
            retain_partial_matches: false,
        }
    }
}

/// A region of a larger address space, scanned independently.
#[derive(Clone, Copy, Debug)]
pub struct MemoryBlock<'a> {
    pub base: u64,
    pub data: &'a [u8],
}

impl<'a> MemoryBlock<'a> {
    pub fn new(base: u64, data: &'a [u8]) -> Self {
        Self { base, data }
    }
}
