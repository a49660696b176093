//! Rule-set assembly: pattern specs in, immutable scannable [`Rules`] out.
//!
//! # Model
//! - A pattern is one or more *parts* (sub-patterns). Parts after the first
//!   are chained: each declares the gap allowed between the end of the
//!   previous part's match and its own start.
//! - Each part owns atoms: short literals (at most `max_atom_length` bytes)
//!   that the prefilter looks for. An atom sits `backtrack` bytes after the
//!   start of its part's match.
//! - Atoms with identical bytes are stored once and fan out to every owning
//!   part through `atom_offsets`/`atom_targets`.
//!
//! # Invariants
//! - `Rules` is immutable after `build` except for the thread-slot mask.
//! - Every atom fits inside the region its part can match.
//! - Pattern and part ids fit in `u32`.

mod slots;

pub use slots::SlotGuard;
pub(crate) use slots::ThreadSlots;

use std::fmt;
use std::ops::RangeInclusive;

use ahash::AHashMap;

use crate::api::{ChainLink, GapBounds, PatternId, SubPatternId};
use crate::engine::prefilter::Prefilter;
use crate::error::BuildError;
use crate::limits::{Limits, MAX_ATOM_LENGTH, MAX_ATOM_QUALITY};
use crate::program::{MatchPolicy, Node, Program};

/// Literal sub-pattern with YARA-style text modifiers.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LiteralMatcher {
    pub bytes: Vec<u8>,
    /// ASCII case-insensitive comparison.
    pub nocase: bool,
    /// Each byte is followed by a zero byte (UTF-16LE of ASCII text).
    pub wide: bool,
    /// Accept the literal xor-encoded with any single-byte key in range.
    pub xor: Option<RangeInclusive<u8>>,
}

impl LiteralMatcher {
    pub fn new(bytes: &[u8]) -> Self {
        Self {
            bytes: bytes.to_vec(),
            nocase: false,
            wide: false,
            xor: None,
        }
    }

    pub fn nocase(mut self) -> Self {
        self.nocase = true;
        self
    }

    pub fn wide(mut self) -> Self {
        self.wide = true;
        self
    }

    pub fn xor(mut self, keys: RangeInclusive<u8>) -> Self {
        self.xor = Some(keys);
        self
    }

    /// Length of a match in bytes.
    pub fn match_len(&self) -> usize {
        if self.wide {
            self.bytes.len() * 2
        } else {
            self.bytes.len()
        }
    }

    /// Byte `i` of the literal as it appears in the input before xor.
    #[inline]
    pub(crate) fn encoded_byte(&self, i: usize) -> u8 {
        if self.wide {
            if i % 2 == 0 {
                self.bytes[i / 2]
            } else {
                0
            }
        } else {
            self.bytes[i]
        }
    }

    /// Prefix atoms covering every case and key variant of the literal.
    pub fn prefix_atoms(&self, max_len: usize) -> Vec<AtomSpec> {
        let mut len = self.match_len().min(max_len);
        if self.nocase {
            // Each letter doubles the variants; expand at most
            // `MAX_ATOM_LENGTH` of them.
            let mut letters = 0;
            len = (0..len)
                .take_while(|&i| {
                    letters += usize::from(self.encoded_byte(i).is_ascii_alphabetic());
                    letters <= MAX_ATOM_LENGTH
                })
                .count();
        }
        let base: Vec<u8> = (0..len).map(|i| self.encoded_byte(i)).collect();
        let quality = length_quality(len, max_len);

        let mut variants: Vec<Vec<u8>> = vec![base];
        if self.nocase {
            for i in 0..len {
                let b = variants[0][i];
                if !b.is_ascii_alphabetic() {
                    continue;
                }
                let flipped: Vec<Vec<u8>> = variants
                    .iter()
                    .map(|v| {
                        let mut v = v.clone();
                        v[i] ^= 0x20;
                        v
                    })
                    .collect();
                variants.extend(flipped);
            }
        }
        if let Some(keys) = &self.xor {
            let plain = std::mem::take(&mut variants);
            for key in keys.clone() {
                for v in &plain {
                    variants.push(v.iter().map(|b| b ^ key).collect());
                }
            }
        }
        variants.sort();
        variants.dedup();
        variants
            .into_iter()
            .map(|bytes| AtomSpec {
                bytes,
                backtrack: 0,
                quality,
            })
            .collect()
    }
}

/// How a part verifies a candidate anchor.
#[derive(Clone, Debug)]
pub enum Matcher {
    Literal(LiteralMatcher),
    Program(Program),
}

impl Matcher {
    /// Upper bound on a match length; `None` when unbounded.
    fn max_len(&self) -> Option<u64> {
        match self {
            Matcher::Literal(lit) => Some(lit.match_len() as u64),
            Matcher::Program(prog) => prog.bounds().max.map(u64::from),
        }
    }
}

/// Prefilter atom owned by a part.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AtomSpec {
    pub bytes: Vec<u8>,
    /// Offset of the atom inside the part's match.
    pub backtrack: u32,
    /// Selectivity score in `MIN_ATOM_QUALITY..=MAX_ATOM_QUALITY`.
    pub quality: u8,
}

impl AtomSpec {
    pub fn new(bytes: &[u8], backtrack: u32, quality: u8) -> Self {
        Self {
            bytes: bytes.to_vec(),
            backtrack,
            quality,
        }
    }

    /// Atom that fires at every offset.
    pub fn empty() -> Self {
        Self {
            bytes: Vec::new(),
            backtrack: 0,
            quality: 0,
        }
    }
}

/// Length-only quality estimate for atoms derived by this crate. Scores
/// drop by 22 per missing byte, so 1-byte and empty atoms rate as weak.
fn length_quality(len: usize, max_len: usize) -> u8 {
    if len == 0 {
        return 0;
    }
    let missing = max_len.saturating_sub(len);
    (MAX_ATOM_QUALITY as usize).saturating_sub(22 * missing) as u8
}

/// One part of a pattern.
#[derive(Clone, Debug)]
pub struct PartSpec {
    pub matcher: Matcher,
    /// Gap before this part; must be `None` exactly for the first part.
    pub gap: Option<GapBounds>,
    /// Atoms locating this part. An empty list means the literal's prefix
    /// atoms for a literal part and a zero-length atom for a program part.
    pub atoms: Vec<AtomSpec>,
}

impl PartSpec {
    /// Literal part located by its own prefix atoms, derived at build time
    /// from the rule set's `max_atom_length`.
    pub fn literal(lit: LiteralMatcher) -> Self {
        Self {
            matcher: Matcher::Literal(lit),
            gap: None,
            atoms: Vec::new(),
        }
    }

    pub fn program(program: Program, atoms: Vec<AtomSpec>) -> Self {
        Self {
            matcher: Matcher::Program(program),
            gap: None,
            atoms,
        }
    }

    pub fn after_gap(mut self, gap: GapBounds) -> Self {
        self.gap = Some(gap);
        self
    }
}

/// A named pattern handed to [`RulesBuilder`].
#[derive(Clone, Debug)]
pub struct PatternSpec {
    pub name: String,
    pub parts: Vec<PartSpec>,
    /// Matches must not be preceded or followed by an alphanumeric byte.
    pub fullword: bool,
}

impl PatternSpec {
    pub fn new(name: impl Into<String>, parts: Vec<PartSpec>) -> Self {
        Self {
            name: name.into(),
            parts,
            fullword: false,
        }
    }

    /// Single-part literal pattern.
    pub fn literal(name: impl Into<String>, lit: LiteralMatcher) -> Self {
        Self::new(name, vec![PartSpec::literal(lit)])
    }

    /// Compiles a syntax tree into a pattern, splitting it into chained
    /// parts at wide gaps. Each part is located by its literal prefix, or by
    /// a zero-length atom when it has none.
    ///
    /// # Errors
    /// Any program construction error of a part.
    pub fn from_node(
        name: impl Into<String>,
        node: Node,
        policy: MatchPolicy,
        limits: &Limits,
    ) -> Result<Self, BuildError> {
        let mut parts = Vec::new();
        for (node, gap) in node.split_at_chaining_points(limits.string_chaining_threshold) {
            let program = Program::compile_with_policy(&node, policy, limits)?;
            let prefix = node.literal_prefix(limits.max_atom_length);
            let atoms = vec![AtomSpec {
                quality: length_quality(prefix.len(), limits.max_atom_length),
                bytes: prefix,
                backtrack: 0,
            }];
            parts.push(PartSpec {
                matcher: Matcher::Program(program),
                gap,
                atoms,
            });
        }
        Ok(Self::new(name, parts))
    }

    pub fn fullword(mut self) -> Self {
        self.fullword = true;
        self
    }
}

/// Compiled atom fan-out target.
#[derive(Clone, Copy, Debug)]
pub(crate) struct AtomTarget {
    pub(crate) sub: u32,
    pub(crate) backtrack: u32,
}

/// Compiled part.
#[derive(Debug)]
pub(crate) struct SubPattern {
    pub(crate) pattern: PatternId,
    pub(crate) matcher: Matcher,
    /// Previous part of the chain.
    pub(crate) chained_to: Option<u32>,
    pub(crate) has_next: bool,
    /// Gap before this part.
    pub(crate) gap: Option<GapBounds>,
    /// Largest `atom length + backtrack` over this part's atoms: how far a
    /// match start can trail the prefilter position.
    pub(crate) reach: u32,
}

impl SubPattern {
    #[inline]
    pub(crate) fn is_chained(&self) -> bool {
        self.chained_to.is_some() || self.has_next
    }
}

#[derive(Debug)]
pub(crate) struct PatternInfo {
    pub(crate) name: String,
    pub(crate) fullword: bool,
    pub(crate) wide: bool,
    /// Owns a zero-length or low-quality atom.
    pub(crate) weak: bool,
}

/// Collects patterns and builds an immutable [`Rules`].
#[derive(Debug, Default)]
pub struct RulesBuilder {
    limits: Limits,
    patterns: Vec<PatternSpec>,
}

impl RulesBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_limits(mut self, limits: Limits) -> Self {
        self.limits = limits;
        self
    }

    pub fn limits(&self) -> &Limits {
        &self.limits
    }

    /// Queues a pattern; ids are assigned in insertion order.
    pub fn add_pattern(&mut self, spec: PatternSpec) -> PatternId {
        let id = PatternId(self.patterns.len() as u32);
        self.patterns.push(spec);
        id
    }

    /// Validates every pattern and assembles the rule set.
    ///
    /// # Errors
    /// - `InvalidLimits` when the limits fail validation.
    /// - `TooManyPatterns` when ids overflow 32 bits.
    /// - Pattern shape errors (`EmptyPattern`, `UnexpectedGap`, `MissingGap`,
    ///   `InvalidGap`, `NocaseWithXor`, `EmptyXorRange`, `AtomTooLong`,
    ///   `AtomOutOfPattern`).
    pub fn build(self) -> Result<Rules, BuildError> {
        let limits = self.limits;
        limits.validate()?;
        if self.patterns.len() > u32::MAX as usize {
            return Err(BuildError::TooManyPatterns);
        }

        let mut patterns = Vec::with_capacity(self.patterns.len());
        let mut subs: Vec<SubPattern> = Vec::new();
        let mut links = Vec::new();
        let mut atom_ids: AHashMap<Vec<u8>, u32> = AHashMap::new();
        let mut atom_bytes: Vec<Vec<u8>> = Vec::new();
        let mut atom_targets: Vec<Vec<AtomTarget>> = Vec::new();
        let mut has_weak_atoms = false;

        for (pid, spec) in self.patterns.into_iter().enumerate() {
            let pattern = PatternId(pid as u32);
            validate_pattern(&spec, &limits)?;

            let mut weak = false;
            let mut wide = false;
            let part_count = spec.parts.len();
            for (k, part) in spec.parts.into_iter().enumerate() {
                if subs.len() >= u32::MAX as usize {
                    return Err(BuildError::TooManyPatterns);
                }
                let sub_id = subs.len() as u32;
                if let Matcher::Literal(lit) = &part.matcher {
                    wide |= lit.wide;
                }

                let atoms = match (&part.matcher, part.atoms.is_empty()) {
                    (_, false) => part.atoms,
                    (Matcher::Literal(lit), true) => lit.prefix_atoms(limits.max_atom_length),
                    (Matcher::Program(_), true) => vec![AtomSpec::empty()],
                };
                let mut reach = 0u32;
                for atom in atoms {
                    weak |= atom.bytes.is_empty()
                        || atom.quality < limits.atom_quality_warning_threshold;
                    reach = reach.max(atom.backtrack.saturating_add(atom.bytes.len() as u32));
                    let next_id = atom_bytes.len() as u32;
                    let id = *atom_ids.entry(atom.bytes.clone()).or_insert_with(|| {
                        atom_bytes.push(atom.bytes);
                        atom_targets.push(Vec::new());
                        next_id
                    });
                    atom_targets[id as usize].push(AtomTarget {
                        sub: sub_id,
                        backtrack: atom.backtrack,
                    });
                }

                let chained_to = (k > 0).then(|| sub_id - 1);
                if let (Some(prev), Some(gap)) = (chained_to, part.gap) {
                    links.push(ChainLink {
                        pattern,
                        from: SubPatternId(prev),
                        to: SubPatternId(sub_id),
                        gap,
                    });
                }
                subs.push(SubPattern {
                    pattern,
                    matcher: part.matcher,
                    chained_to,
                    has_next: k + 1 < part_count,
                    gap: part.gap,
                    reach,
                });
            }
            has_weak_atoms |= weak;
            patterns.push(PatternInfo {
                name: spec.name,
                fullword: spec.fullword,
                wide,
                weak,
            });
        }

        // Some targets may list the same part twice when a spec repeats an
        // atom; keep one per (part, backtrack).
        let mut atom_offsets = Vec::with_capacity(atom_targets.len() + 1);
        let mut flat_targets = Vec::new();
        atom_offsets.push(0u32);
        for mut targets in atom_targets {
            targets.sort_by_key(|t| (t.sub, t.backtrack));
            targets.dedup_by_key(|t| (t.sub, t.backtrack));
            flat_targets.extend(targets);
            atom_offsets.push(flat_targets.len() as u32);
        }

        let prefilter = Prefilter::new(&atom_bytes);
        let slots = ThreadSlots::new(limits.max_threads);
        tracing::debug!(
            patterns = patterns.len(),
            parts = subs.len(),
            atoms = atom_bytes.len(),
            states = prefilter.state_count(),
            weak = has_weak_atoms,
            "rule set built"
        );

        Ok(Rules {
            limits,
            patterns,
            subs,
            links,
            atom_offsets,
            atom_targets: flat_targets,
            prefilter,
            has_weak_atoms,
            slots,
        })
    }
}

fn validate_pattern(spec: &PatternSpec, limits: &Limits) -> Result<(), BuildError> {
    let name = || spec.name.clone();
    if spec.parts.is_empty() {
        return Err(BuildError::EmptyPattern { pattern: name() });
    }
    for (k, part) in spec.parts.iter().enumerate() {
        match (k, part.gap) {
            (0, Some(_)) => return Err(BuildError::UnexpectedGap { pattern: name() }),
            (0, None) => {}
            (_, None) => {
                return Err(BuildError::MissingGap {
                    pattern: name(),
                    part: k,
                })
            }
            (_, Some(gap)) if gap.min > gap.max => {
                return Err(BuildError::InvalidGap {
                    pattern: name(),
                    min: gap.min,
                    max: gap.max,
                })
            }
            _ => {}
        }
        if let Matcher::Literal(lit) = &part.matcher {
            if lit.bytes.is_empty() {
                return Err(BuildError::EmptyPattern { pattern: name() });
            }
            if let Some(keys) = &lit.xor {
                if keys.is_empty() {
                    return Err(BuildError::EmptyXorRange { pattern: name() });
                }
                if lit.nocase {
                    return Err(BuildError::NocaseWithXor { pattern: name() });
                }
            }
        }
        let max_len = part.matcher.max_len();
        for atom in &part.atoms {
            if atom.bytes.len() > limits.max_atom_length {
                return Err(BuildError::AtomTooLong {
                    pattern: name(),
                    len: atom.bytes.len(),
                    max: limits.max_atom_length,
                });
            }
            let end = atom.backtrack as u64 + atom.bytes.len() as u64;
            if max_len.is_some_and(|max| end > max) {
                return Err(BuildError::AtomOutOfPattern {
                    pattern: name(),
                    part: k,
                });
            }
        }
    }
    Ok(())
}

/// Immutable, shareable rule set.
pub struct Rules {
    limits: Limits,
    patterns: Vec<PatternInfo>,
    subs: Vec<SubPattern>,
    links: Vec<ChainLink>,
    atom_offsets: Vec<u32>,
    atom_targets: Vec<AtomTarget>,
    prefilter: Prefilter,
    has_weak_atoms: bool,
    slots: ThreadSlots,
}

impl Rules {
    pub fn limits(&self) -> &Limits {
        &self.limits
    }

    pub fn pattern_count(&self) -> usize {
        self.patterns.len()
    }

    pub fn pattern_name(&self, id: PatternId) -> Option<&str> {
        self.patterns.get(id.index()).map(|p| p.name.as_str())
    }

    pub fn pattern_id(&self, name: &str) -> Option<PatternId> {
        self.patterns
            .iter()
            .position(|p| p.name == name)
            .map(|idx| PatternId(idx as u32))
    }

    /// Links of every chained pattern, in pattern order.
    pub fn chain_links(&self) -> &[ChainLink] {
        &self.links
    }

    /// Number of distinct atoms in the prefilter.
    pub fn atom_count(&self) -> usize {
        self.atom_offsets.len().saturating_sub(1)
    }

    /// True when some pattern owns a zero-length or low-quality atom.
    pub fn has_weak_atoms(&self) -> bool {
        self.has_weak_atoms
    }

    /// Scanners currently holding a slot.
    pub fn active_scanners(&self) -> usize {
        self.slots.in_use()
    }

    pub(crate) fn slots(&self) -> &ThreadSlots {
        &self.slots
    }

    pub(crate) fn prefilter(&self) -> &Prefilter {
        &self.prefilter
    }

    pub(crate) fn pattern(&self, id: PatternId) -> &PatternInfo {
        &self.patterns[id.index()]
    }

    #[inline]
    pub(crate) fn sub(&self, id: u32) -> &SubPattern {
        &self.subs[id as usize]
    }

    #[inline]
    pub(crate) fn targets(&self, atom: u32) -> &[AtomTarget] {
        let start = self.atom_offsets[atom as usize] as usize;
        let end = self.atom_offsets[atom as usize + 1] as usize;
        &self.atom_targets[start..end]
    }

    pub(crate) fn sub_count(&self) -> usize {
        self.subs.len()
    }
}

impl fmt::Debug for Rules {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Rules")
            .field("patterns", &self.patterns.len())
            .field("parts", &self.subs.len())
            .field("atoms", &self.atom_count())
            .field("has_weak_atoms", &self.has_weak_atoms)
            .finish()
    }
}
