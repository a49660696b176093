//! Bounded, non-backtracking program executor.
//!
//! Verification runs a Pike-style simulation of a [`Program`] from one anchor:
//! a priority-ordered list of live fibers advances in lock step, one input
//! byte per step. Each fiber is a program counter plus a small fixed stack of
//! repetition counters.
//!
//! # Semantics
//! - Epsilon closure (splits, jumps, repeat bookkeeping, assertions) is
//!   computed with an explicit work stack. Fibers equal in `(pc, counters)`
//!   are admitted once per step.
//! - A fiber reaching `Match` records the current length and cuts every
//!   lower-priority fiber, so results follow split priority (leftmost-first).
//!   [`MatchPolicy::Shortest`] returns at the first match reached.
//! - A gap (`RepeatAny`) keeps one in-gap fiber whose counter advances per
//!   byte; once `min` bytes were skipped it also spawns one exit fiber per
//!   step.
//! - Unbounded counters saturate at their minimum, which keeps the set of
//!   distinct fibers finite.
//!
//! # Bounds
//! - At most `max_fibers` fibers are live in one step; exceeding it fails the
//!   candidate with [`VerifyError::TooManyFibers`].
//! - At most `scan_limit` bytes are consumed from the anchor, never past the
//!   end of the block. Assertions look at the real block, not the window.

use ahash::AHashSet;

use crate::error::VerifyError;
use crate::limits::FIBER_MAX_COUNTERS;
use crate::program::{Inst, InstId, MatchPolicy, Program};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
struct Fiber {
    pc: InstId,
    depth: u8,
    counters: [u16; FIBER_MAX_COUNTERS],
}

impl Fiber {
    fn start() -> Self {
        Self {
            pc: 0,
            depth: 0,
            counters: [0; FIBER_MAX_COUNTERS],
        }
    }

    #[inline]
    fn at(mut self, pc: InstId) -> Self {
        self.pc = pc;
        self
    }

    fn push(mut self, value: u16) -> Result<Self, VerifyError> {
        if self.depth as usize >= FIBER_MAX_COUNTERS {
            return Err(VerifyError::CounterOverflow);
        }
        self.counters[self.depth as usize] = value;
        self.depth += 1;
        Ok(self)
    }

    fn pop(mut self) -> Self {
        if self.depth > 0 {
            self.depth -= 1;
            self.counters[self.depth as usize] = 0;
        }
        self
    }

    #[inline]
    fn top(&self) -> u16 {
        if self.depth == 0 {
            0
        } else {
            self.counters[self.depth as usize - 1]
        }
    }

    fn set_top(mut self, value: u16) -> Self {
        if self.depth > 0 {
            self.counters[self.depth as usize - 1] = value;
        }
        self
    }
}

enum Work {
    Visit(Fiber),
    /// Admit and park without following transitions.
    Park(Fiber),
    /// Decide stay/exit for a fiber inside a gap; its top counter is the
    /// number of bytes skipped so far.
    GapFollow(Fiber),
}

/// Reusable fiber arenas; one per scanner.
#[derive(Default)]
pub(crate) struct FiberScratch {
    clist: Vec<Fiber>,
    nlist: Vec<Fiber>,
    work: Vec<Work>,
    marks: Vec<u32>,
    epoch: u32,
    seen: AHashSet<Fiber>,
}

impl FiberScratch {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    fn next_epoch(&mut self, prog_len: usize) {
        if self.marks.len() < prog_len {
            self.marks.resize(prog_len, 0);
        }
        self.epoch = self.epoch.wrapping_add(1);
        if self.epoch == 0 {
            self.marks.iter_mut().for_each(|m| *m = 0);
            self.epoch = 1;
        }
        self.seen.clear();
    }

    /// Returns true the first time `fiber` is seen in the current step.
    fn admit(&mut self, fiber: &Fiber) -> bool {
        if fiber.depth == 0 {
            let mark = &mut self.marks[fiber.pc as usize];
            if *mark == self.epoch {
                return false;
            }
            *mark = self.epoch;
            true
        } else {
            self.seen.insert(*fiber)
        }
    }
}

#[inline]
fn is_word(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'_'
}

fn at_word_boundary(data: &[u8], pos: usize) -> bool {
    let before = pos > 0 && is_word(data[pos - 1]);
    let after = pos < data.len() && is_word(data[pos]);
    before != after
}

/// Runs `prog` against `data` starting at `anchor`.
///
/// Returns the match length, or `None` when no match starts at `anchor`.
///
/// # Errors
/// - `TooManyFibers` when a step would hold more than `max_fibers` fibers.
/// - `CounterOverflow` when repetitions nest deeper than the counter stack.
pub(crate) fn run(
    prog: &Program,
    data: &[u8],
    anchor: usize,
    scan_limit: usize,
    max_fibers: usize,
    scratch: &mut FiberScratch,
) -> Result<Option<usize>, VerifyError> {
    let end = data.len().min(anchor.saturating_add(scan_limit));
    let mut clist = std::mem::take(&mut scratch.clist);
    let mut nlist = std::mem::take(&mut scratch.nlist);
    clist.clear();
    nlist.clear();
    let result = step_all(
        prog,
        data,
        anchor,
        end,
        max_fibers,
        scratch,
        &mut clist,
        &mut nlist,
    );
    scratch.clist = clist;
    scratch.nlist = nlist;
    result
}

#[allow(clippy::too_many_arguments)]
fn step_all(
    prog: &Program,
    data: &[u8],
    anchor: usize,
    end: usize,
    max_fibers: usize,
    scratch: &mut FiberScratch,
    clist: &mut Vec<Fiber>,
    nlist: &mut Vec<Fiber>,
) -> Result<Option<usize>, VerifyError> {
    let insts = prog.insts();
    let shortest = prog.policy() == MatchPolicy::Shortest;

    scratch.next_epoch(insts.len());
    closure(
        prog,
        data,
        anchor,
        Work::Visit(Fiber::start()),
        clist,
        max_fibers,
        scratch,
    )?;

    let mut matched = None;
    let mut pos = anchor;
    while !clist.is_empty() {
        scratch.next_epoch(insts.len());
        nlist.clear();
        let byte = (pos < end).then(|| data[pos]);
        for &fiber in clist.iter() {
            let next = match (insts[fiber.pc as usize], byte) {
                (Inst::Match, _) => {
                    matched = Some(pos - anchor);
                    if shortest {
                        return Ok(matched);
                    }
                    break;
                }
                (Inst::RepeatAny { .. }, Some(_)) => {
                    Work::GapFollow(fiber.set_top(fiber.top().saturating_add(1)))
                }
                (_, Some(b)) if prog.consumes(fiber.pc, b) => Work::Visit(fiber.at(fiber.pc + 1)),
                _ => continue,
            };
            closure(prog, data, pos + 1, next, nlist, max_fibers, scratch)?;
        }
        if byte.is_none() {
            break;
        }
        std::mem::swap(clist, nlist);
        pos += 1;
    }
    Ok(matched)
}

/// Follows epsilon transitions from `start` at block offset `pos`, parking
/// consuming and `Match` fibers in `list` in priority order.
fn closure(
    prog: &Program,
    data: &[u8],
    pos: usize,
    start: Work,
    list: &mut Vec<Fiber>,
    max_fibers: usize,
    scratch: &mut FiberScratch,
) -> Result<(), VerifyError> {
    let mut work = std::mem::take(&mut scratch.work);
    work.clear();
    work.push(start);
    let result = follow(prog, data, pos, &mut work, list, max_fibers, scratch);
    scratch.work = work;
    result
}

fn follow(
    prog: &Program,
    data: &[u8],
    pos: usize,
    work: &mut Vec<Work>,
    list: &mut Vec<Fiber>,
    max_fibers: usize,
    scratch: &mut FiberScratch,
) -> Result<(), VerifyError> {
    let insts = prog.insts();
    while let Some(item) = work.pop() {
        let fiber = match item {
            Work::Visit(fiber) => fiber,
            Work::Park(fiber) => {
                if scratch.admit(&fiber) {
                    park(fiber, list, max_fibers)?;
                }
                continue;
            }
            Work::GapFollow(fiber) => {
                let Inst::RepeatAny { min, max, greedy } = insts[fiber.pc as usize] else {
                    continue;
                };
                let count = fiber.top();
                let stay = max.map_or(true, |m| count < m).then(|| {
                    if max.is_none() && count > min {
                        fiber.set_top(min)
                    } else {
                        fiber
                    }
                });
                let exit = (count >= min).then(|| fiber.pop().at(fiber.pc + 1));
                push_choice(work, greedy, stay.map(Work::Park), exit.map(Work::Visit));
                continue;
            }
        };

        if !scratch.admit(&fiber) {
            continue;
        }
        match insts[fiber.pc as usize] {
            Inst::Byte(_) | Inst::Masked { .. } | Inst::Class(_) | Inst::Any | Inst::Match => {
                park(fiber, list, max_fibers)?;
            }
            Inst::Jump(target) => work.push(Work::Visit(fiber.at(target))),
            Inst::Split { first, second, .. } => {
                work.push(Work::Visit(fiber.at(second)));
                work.push(Work::Visit(fiber.at(first)));
            }
            Inst::RepeatStart {
                min,
                max,
                greedy,
                exit,
            } => {
                let counted = fiber.push(0)?;
                let body = counted.at(fiber.pc + 1);
                if min > 0 {
                    work.push(Work::Visit(body));
                } else {
                    let again = max.map_or(true, |m| m > 0).then_some(body);
                    let out = counted.pop().at(exit);
                    push_choice(
                        work,
                        greedy,
                        again.map(Work::Visit),
                        Some(Work::Visit(out)),
                    );
                }
            }
            Inst::RepeatEnd {
                min,
                max,
                greedy,
                body,
            } => {
                let mut count = fiber.top().saturating_add(1);
                if max.is_none() {
                    count = count.min(min);
                }
                let counted = fiber.set_top(count);
                let again = max
                    .map_or(true, |m| count < m)
                    .then(|| Work::Visit(counted.at(body)));
                let out = (count >= min).then(|| Work::Visit(counted.pop().at(fiber.pc + 1)));
                push_choice(work, greedy, again, out);
            }
            Inst::RepeatAny { .. } => {
                work.push(Work::GapFollow(fiber.push(0)?));
            }
            Inst::AssertStart => {
                if pos == 0 {
                    work.push(Work::Visit(fiber.at(fiber.pc + 1)));
                }
            }
            Inst::AssertEnd => {
                if pos == data.len() {
                    work.push(Work::Visit(fiber.at(fiber.pc + 1)));
                }
            }
            Inst::WordBoundary => {
                if at_word_boundary(data, pos) {
                    work.push(Work::Visit(fiber.at(fiber.pc + 1)));
                }
            }
            Inst::NotWordBoundary => {
                if !at_word_boundary(data, pos) {
                    work.push(Work::Visit(fiber.at(fiber.pc + 1)));
                }
            }
        }
    }
    Ok(())
}

/// Pushes a loop/exit pair so the preferred one is popped first.
#[inline]
fn push_choice(work: &mut Vec<Work>, greedy: bool, again: Option<Work>, out: Option<Work>) {
    let (first, second) = if greedy { (again, out) } else { (out, again) };
    if let Some(item) = second {
        work.push(item);
    }
    if let Some(item) = first {
        work.push(item);
    }
}

#[inline]
fn park(fiber: Fiber, list: &mut Vec<Fiber>, max_fibers: usize) -> Result<(), VerifyError> {
    if list.len() >= max_fibers {
        return Err(VerifyError::TooManyFibers { max: max_fibers });
    }
    list.push(fiber);
    Ok(())
}
