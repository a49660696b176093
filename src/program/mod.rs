//! Pattern programs: the instruction form consumed by the fiber executor.
//!
//! A [`Program`] is an immutable, flat instruction sequence compiled from a
//! [`Node`] tree. It is shared read-only by every scanner using the rule set.
//!
//! # Instruction model
//! - Consuming instructions (`Byte`, `Masked`, `Class`, `Any`) advance one
//!   input byte.
//! - `Split` forks a fiber; `first` has priority over `second`. Greedy and
//!   lazy repetitions differ only in which successor is `first`.
//! - `RepeatStart`/`RepeatEnd` bracket a counted repetition body; the count
//!   lives on the fiber's counter stack.
//! - `RepeatAny` is a hex gap: one fiber stays inside the gap and spawns an
//!   exit fiber per step once `min` bytes were skipped.
//! - Assertions are zero-width and evaluated against the scanned block.
//!
//! # Construction
//! Lowering uses an explicit task stack capped by `Limits::max_stack`.
//! Sequences and alternations keep a cursor task instead of pushing one task
//! per child, so stack depth tracks nesting depth only.

pub mod class;
pub mod node;

pub use class::ByteClass;
pub use node::{LengthBounds, Node};

use crate::error::BuildError;
use crate::limits::{Limits, FIBER_MAX_COUNTERS, RE_MAX_RANGE};

/// Index of an instruction inside its program.
pub type InstId = u32;

const PLACEHOLDER: InstId = InstId::MAX;

/// One program instruction.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Inst {
    Byte(u8),
    Masked {
        value: u8,
        mask: u8,
    },
    /// Index into the program's class table.
    Class(u32),
    Any,
    Split {
        id: u8,
        first: InstId,
        second: InstId,
    },
    Jump(InstId),
    RepeatStart {
        min: u16,
        max: Option<u16>,
        greedy: bool,
        exit: InstId,
    },
    RepeatEnd {
        min: u16,
        max: Option<u16>,
        greedy: bool,
        body: InstId,
    },
    RepeatAny {
        min: u16,
        max: Option<u16>,
        greedy: bool,
    },
    AssertStart,
    AssertEnd,
    WordBoundary,
    NotWordBoundary,
    Match,
}

/// How the executor picks among viable match lengths.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum MatchPolicy {
    /// Highest-priority match wins (regex leftmost-first semantics); greedy
    /// repetitions extend as far as possible.
    #[default]
    LeftmostFirst,
    /// Stop at the first match reached, i.e. the shortest viable length.
    Shortest,
}

/// Compiled pattern program.
#[derive(Clone, Debug)]
pub struct Program {
    insts: Vec<Inst>,
    classes: Vec<ByteClass>,
    split_count: usize,
    bounds: LengthBounds,
    policy: MatchPolicy,
}

impl Program {
    /// Compiles `node` with the default match policy.
    ///
    /// # Errors
    /// See [`Program::compile_with_policy`].
    pub fn compile(node: &Node, limits: &Limits) -> Result<Self, BuildError> {
        Self::compile_with_policy(node, MatchPolicy::default(), limits)
    }

    /// Compiles `node` into a program.
    ///
    /// # Errors
    /// - `StackOverflow` when nesting exceeds `limits.max_stack`.
    /// - `TooManySplits` when more than `limits.max_split_id` splits are needed.
    /// - `RangeTooLarge` / `InvalidRange` for malformed repetition bounds.
    /// - `RepeatNestingTooDeep` when counted repetitions nest deeper than the
    ///   fiber counter stack.
    pub fn compile_with_policy(
        node: &Node,
        policy: MatchPolicy,
        limits: &Limits,
    ) -> Result<Self, BuildError> {
        let bounds = node.length_bounds(limits.max_stack)?;
        let mut lowering = Lowering::new(limits);
        lowering.run(node)?;
        lowering.insts.push(Inst::Match);
        Ok(Self {
            insts: lowering.insts,
            classes: lowering.classes,
            split_count: lowering.split_count,
            bounds,
            policy,
        })
    }

    #[inline]
    pub fn insts(&self) -> &[Inst] {
        &self.insts
    }

    /// Declared match length bounds.
    #[inline]
    pub fn bounds(&self) -> LengthBounds {
        self.bounds
    }

    #[inline]
    pub fn policy(&self) -> MatchPolicy {
        self.policy
    }

    pub fn split_count(&self) -> usize {
        self.split_count
    }

    /// Returns true when the instruction at `pc` consumes `b`.
    #[inline]
    pub(crate) fn consumes(&self, pc: InstId, b: u8) -> bool {
        match self.insts[pc as usize] {
            Inst::Byte(v) => v == b,
            Inst::Masked { value, mask } => b & mask == value & mask,
            Inst::Class(idx) => self.classes[idx as usize].contains(b),
            Inst::Any => true,
            _ => false,
        }
    }
}

enum Task<'a> {
    Emit(&'a Node),
    /// Cursor over a concatenation.
    Seq {
        children: &'a [Node],
        next: usize,
    },
    /// Cursor over alternation branches.
    AltBranch {
        children: &'a [Node],
        next: usize,
    },
    /// Closes one non-final alternation branch.
    BranchEnd,
    /// Points every branch-exit jump of the innermost alternation here.
    AltJoin,
    /// Patches the open split of `?` or `*` to the following instruction.
    OptionalClose { looped: bool },
    /// Emits the back-edge split of `+`.
    PlusClose { greedy: bool },
    /// Emits `RepeatEnd` and patches the matching `RepeatStart`.
    RepeatClose {
        min: u16,
        max: Option<u16>,
        greedy: bool,
    },
}

struct Lowering<'a> {
    max_stack: usize,
    max_splits: usize,
    insts: Vec<Inst>,
    classes: Vec<ByteClass>,
    split_count: usize,
    tasks: Vec<Task<'a>>,
    open_splits: Vec<InstId>,
    marks: Vec<InstId>,
    alt_groups: Vec<Vec<InstId>>,
    counter_depth: usize,
}

impl<'a> Lowering<'a> {
    fn new(limits: &Limits) -> Self {
        Self {
            max_stack: limits.max_stack,
            max_splits: limits.max_split_id,
            insts: Vec::new(),
            classes: Vec::new(),
            split_count: 0,
            tasks: Vec::new(),
            open_splits: Vec::new(),
            marks: Vec::new(),
            alt_groups: Vec::new(),
            counter_depth: 0,
        }
    }

    fn push(&mut self, task: Task<'a>) -> Result<(), BuildError> {
        if self.tasks.len() >= self.max_stack {
            return Err(BuildError::StackOverflow {
                max: self.max_stack,
            });
        }
        self.tasks.push(task);
        Ok(())
    }

    #[inline]
    fn pc(&self) -> InstId {
        self.insts.len() as InstId
    }

    fn emit(&mut self, inst: Inst) -> InstId {
        let pc = self.pc();
        self.insts.push(inst);
        pc
    }

    fn next_split_id(&mut self) -> Result<u8, BuildError> {
        if self.split_count >= self.max_splits {
            return Err(BuildError::TooManySplits {
                max: self.max_splits,
            });
        }
        let id = self.split_count as u8;
        self.split_count += 1;
        Ok(id)
    }

    fn emit_split(&mut self, first: InstId, second: InstId) -> Result<InstId, BuildError> {
        let id = self.next_split_id()?;
        Ok(self.emit(Inst::Split { id, first, second }))
    }

    /// Replaces whichever split target is still a placeholder.
    fn patch_split(&mut self, at: InstId, target: InstId) {
        if let Inst::Split { first, second, .. } = &mut self.insts[at as usize] {
            if *first == PLACEHOLDER {
                *first = target;
            } else if *second == PLACEHOLDER {
                *second = target;
            }
        }
    }

    fn enter_counter_scope(&mut self) -> Result<(), BuildError> {
        if self.counter_depth >= FIBER_MAX_COUNTERS {
            return Err(BuildError::RepeatNestingTooDeep {
                max: FIBER_MAX_COUNTERS,
            });
        }
        self.counter_depth += 1;
        Ok(())
    }

    fn run(&mut self, root: &'a Node) -> Result<(), BuildError> {
        self.push(Task::Emit(root))?;
        while let Some(task) = self.tasks.pop() {
            match task {
                Task::Emit(node) => self.emit_node(node)?,
                Task::Seq { children, next } => {
                    if next < children.len() {
                        self.push(Task::Seq {
                            children,
                            next: next + 1,
                        })?;
                        self.push(Task::Emit(&children[next]))?;
                    }
                }
                Task::AltBranch { children, next } => {
                    if next + 1 < children.len() {
                        let pc = self.pc();
                        let split = self.emit_split(pc + 1, PLACEHOLDER)?;
                        self.open_splits.push(split);
                        self.push(Task::AltBranch {
                            children,
                            next: next + 1,
                        })?;
                        self.push(Task::BranchEnd)?;
                        self.push(Task::Emit(&children[next]))?;
                    } else if next < children.len() {
                        self.push(Task::Emit(&children[next]))?;
                    }
                }
                Task::BranchEnd => {
                    let jump = self.emit(Inst::Jump(PLACEHOLDER));
                    if let Some(group) = self.alt_groups.last_mut() {
                        group.push(jump);
                    }
                    if let Some(split) = self.open_splits.pop() {
                        let here = self.pc();
                        self.patch_split(split, here);
                    }
                }
                Task::AltJoin => {
                    let here = self.pc();
                    for jump in self.alt_groups.pop().unwrap_or_default() {
                        self.insts[jump as usize] = Inst::Jump(here);
                    }
                }
                Task::OptionalClose { looped } => {
                    if let Some(split) = self.open_splits.pop() {
                        if looped {
                            self.emit(Inst::Jump(split));
                        }
                        let here = self.pc();
                        self.patch_split(split, here);
                    }
                }
                Task::PlusClose { greedy } => {
                    if let Some(start) = self.marks.pop() {
                        let exit = self.pc() + 1;
                        if greedy {
                            self.emit_split(start, exit)?;
                        } else {
                            self.emit_split(exit, start)?;
                        }
                    }
                }
                Task::RepeatClose { min, max, greedy } => {
                    if let Some(start) = self.marks.pop() {
                        self.emit(Inst::RepeatEnd {
                            min,
                            max,
                            greedy,
                            body: start + 1,
                        });
                        let here = self.pc();
                        if let Inst::RepeatStart { exit, .. } = &mut self.insts[start as usize] {
                            *exit = here;
                        }
                    }
                    self.counter_depth -= 1;
                }
            }
        }
        Ok(())
    }

    fn emit_node(&mut self, node: &'a Node) -> Result<(), BuildError> {
        match node {
            Node::Empty => {}
            Node::Literal(bytes) => {
                for &b in bytes {
                    self.emit(Inst::Byte(b));
                }
            }
            Node::Masked { value, mask } => {
                let inst = match *mask {
                    0xff => Inst::Byte(*value),
                    0x00 => Inst::Any,
                    mask => Inst::Masked {
                        value: *value & mask,
                        mask,
                    },
                };
                self.emit(inst);
            }
            Node::Class(class) => {
                let inst = match class.len() {
                    256 => Inst::Any,
                    1 => Inst::Byte(class.iter().next().unwrap_or(0)),
                    _ => {
                        let idx = self.classes.len() as u32;
                        self.classes.push(*class);
                        Inst::Class(idx)
                    }
                };
                self.emit(inst);
            }
            Node::Any => {
                self.emit(Inst::Any);
            }
            Node::StartOfInput => {
                self.emit(Inst::AssertStart);
            }
            Node::EndOfInput => {
                self.emit(Inst::AssertEnd);
            }
            Node::WordBoundary => {
                self.emit(Inst::WordBoundary);
            }
            Node::NotWordBoundary => {
                self.emit(Inst::NotWordBoundary);
            }
            Node::Concat(children) => {
                self.push(Task::Seq { children, next: 0 })?;
            }
            Node::Alt(children) => match children.len() {
                0 => {}
                1 => self.push(Task::Emit(&children[0]))?,
                _ => {
                    self.alt_groups.push(Vec::new());
                    self.push(Task::AltJoin)?;
                    self.push(Task::AltBranch { children, next: 0 })?;
                }
            },
            Node::Gap { min, max, greedy } => {
                check_range(*min, *max)?;
                if *max == Some(0) {
                    return Ok(());
                }
                // Needs one counter slot while a fiber is inside the gap.
                if self.counter_depth >= FIBER_MAX_COUNTERS {
                    return Err(BuildError::RepeatNestingTooDeep {
                        max: FIBER_MAX_COUNTERS,
                    });
                }
                self.emit(Inst::RepeatAny {
                    min: *min,
                    max: *max,
                    greedy: *greedy,
                });
            }
            Node::Repeat {
                node: body,
                min,
                max,
                greedy,
            } => self.emit_repeat(body, *min, *max, *greedy)?,
        }
        Ok(())
    }

    fn emit_repeat(
        &mut self,
        body: &'a Node,
        min: u16,
        max: Option<u16>,
        greedy: bool,
    ) -> Result<(), BuildError> {
        check_range(min, max)?;
        match (min, max) {
            (_, Some(0)) => {}
            (1, Some(1)) => self.push(Task::Emit(body))?,
            (0, None) if body.length_bounds(self.max_stack)?.min == 0 => {
                // `x*` over a nullable body lowers as `(x+)?`: an empty pass
                // through the body reaches the exit before any consuming
                // alternative inside it.
                let pc = self.pc();
                let split = if greedy {
                    self.emit_split(pc + 1, PLACEHOLDER)?
                } else {
                    self.emit_split(PLACEHOLDER, pc + 1)?
                };
                self.open_splits.push(split);
                self.marks.push(pc + 1);
                self.push(Task::OptionalClose { looped: false })?;
                self.push(Task::PlusClose { greedy })?;
                self.push(Task::Emit(body))?;
            }
            (0, Some(1)) | (0, None) => {
                let pc = self.pc();
                let split = if greedy {
                    self.emit_split(pc + 1, PLACEHOLDER)?
                } else {
                    self.emit_split(PLACEHOLDER, pc + 1)?
                };
                self.open_splits.push(split);
                self.push(Task::OptionalClose {
                    looped: max.is_none(),
                })?;
                self.push(Task::Emit(body))?;
            }
            (1, None) => {
                let start = self.pc();
                self.marks.push(start);
                self.push(Task::PlusClose { greedy })?;
                self.push(Task::Emit(body))?;
            }
            _ => {
                self.enter_counter_scope()?;
                let start = self.emit(Inst::RepeatStart {
                    min,
                    max,
                    greedy,
                    exit: PLACEHOLDER,
                });
                self.marks.push(start);
                self.push(Task::RepeatClose { min, max, greedy })?;
                self.push(Task::Emit(body))?;
            }
        }
        Ok(())
    }
}

fn check_range(min: u16, max: Option<u16>) -> Result<(), BuildError> {
    let top = max.unwrap_or(min).max(min);
    if top > RE_MAX_RANGE {
        return Err(BuildError::RangeTooLarge {
            bound: top as u32,
            max: RE_MAX_RANGE,
        });
    }
    if let Some(max) = max {
        if min > max {
            return Err(BuildError::InvalidRange { min, max });
        }
    }
    Ok(())
}
