//! Pattern syntax trees handed over by the rule compiler.
//!
//! A [`Node`] describes one sub-pattern in terms of bytes, classes,
//! alternation, repetition and hex-style gaps. The program builder lowers it
//! into instructions; this module also hosts the construction-time analyses
//! that run on the tree itself (declared length bounds and chaining-point
//! splitting).
//!
//! # Invariants
//! - Analyses never recurse. They walk the tree with an explicit stack whose
//!   depth is capped by `Limits::max_stack`, so stack usage is proportional to
//!   nesting depth, not to tree width or input size.

use super::class::ByteClass;
use crate::api::GapBounds;
use crate::error::BuildError;

/// One node of a pattern syntax tree.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Node {
    /// Matches the empty string.
    Empty,
    /// Exact byte sequence.
    Literal(Vec<u8>),
    /// Single byte where only the bits in `mask` must equal `value`.
    Masked { value: u8, mask: u8 },
    /// Single byte from a set.
    Class(ByteClass),
    /// Any single byte.
    Any,
    Concat(Vec<Node>),
    /// Alternation; earlier branches take priority.
    Alt(Vec<Node>),
    /// Counted repetition; `max: None` is unbounded.
    Repeat {
        node: Box<Node>,
        min: u16,
        max: Option<u16>,
        greedy: bool,
    },
    /// Hex-style jump over `min..=max` arbitrary bytes.
    Gap {
        min: u16,
        max: Option<u16>,
        greedy: bool,
    },
    /// Matches only at offset 0 of the scanned block.
    StartOfInput,
    /// Matches only at the end of the scanned block.
    EndOfInput,
    WordBoundary,
    NotWordBoundary,
}

impl Node {
    pub fn literal(bytes: &[u8]) -> Self {
        Node::Literal(bytes.to_vec())
    }

    /// ASCII case-insensitive literal.
    pub fn nocase_literal(bytes: &[u8]) -> Self {
        Node::Concat(
            bytes
                .iter()
                .map(|&b| {
                    if b.is_ascii_alphabetic() {
                        Node::Class(ByteClass::nocase(b))
                    } else {
                        Node::Literal(vec![b])
                    }
                })
                .collect(),
        )
    }

    pub fn concat(nodes: impl IntoIterator<Item = Node>) -> Self {
        Node::Concat(nodes.into_iter().collect())
    }

    pub fn alt(nodes: impl IntoIterator<Item = Node>) -> Self {
        Node::Alt(nodes.into_iter().collect())
    }

    pub fn repeat(node: Node, min: u16, max: Option<u16>) -> Self {
        Node::Repeat {
            node: Box::new(node),
            min,
            max,
            greedy: true,
        }
    }

    pub fn repeat_lazy(node: Node, min: u16, max: Option<u16>) -> Self {
        Node::Repeat {
            node: Box::new(node),
            min,
            max,
            greedy: false,
        }
    }

    /// Hex jump `[min-max]`.
    pub fn gap(min: u16, max: Option<u16>) -> Self {
        Node::Gap {
            min,
            max,
            greedy: false,
        }
    }

    /// Declared match length bounds: `(min, max)` where `max: None` means
    /// unbounded.
    ///
    /// # Errors
    /// - `BuildError::StackOverflow` when nesting exceeds `max_stack`.
    pub fn length_bounds(&self, max_stack: usize) -> Result<LengthBounds, BuildError> {
        let mut stack: Vec<BoundsFrame<'_>> = Vec::new();
        let mut value = enter_bounds(self, &mut stack, max_stack)?;
        loop {
            let Some(top) = stack.last_mut() else {
                return Ok(value);
            };
            match top {
                BoundsFrame::Seq {
                    children,
                    next,
                    acc,
                    alt,
                } => {
                    *acc = Some(match acc.take() {
                        None => value,
                        Some(prev) if *alt => prev.either(value),
                        Some(prev) => prev.then(value),
                    });
                    *next += 1;
                    let (slice, idx) = (*children, *next);
                    if idx < slice.len() {
                        value = enter_bounds(&slice[idx], &mut stack, max_stack)?;
                    } else {
                        let done = acc.take().unwrap_or(LengthBounds::EMPTY);
                        stack.pop();
                        value = done;
                    }
                }
                BoundsFrame::Repeat { min, max } => {
                    let (min, max) = (*min, *max);
                    stack.pop();
                    value = value.repeated(min, max);
                }
            }
        }
    }

    /// Leading bytes every match must start with, at most `max_len` of them.
    ///
    /// Only exact bytes count: literals, fully masked bytes and one-byte
    /// classes at the front of a (possibly nested) concatenation.
    pub fn literal_prefix(&self, max_len: usize) -> Vec<u8> {
        let mut out = Vec::new();
        let mut stack: Vec<&Node> = vec![self];
        while let Some(node) = stack.pop() {
            if out.len() >= max_len {
                break;
            }
            match node {
                Node::Literal(bytes) => {
                    let take = bytes.len().min(max_len - out.len());
                    out.extend_from_slice(&bytes[..take]);
                    if take < bytes.len() {
                        break;
                    }
                }
                Node::Masked { value, mask: 0xff } => out.push(*value),
                Node::Class(class) if class.len() == 1 => {
                    out.extend(class.iter());
                }
                Node::Concat(children) => stack.extend(children.iter().rev()),
                Node::Empty => {}
                _ => break,
            }
        }
        out
    }

    /// Splits a top-level concatenation at gaps too wide to keep inside one
    /// program.
    ///
    /// A gap is a chaining point when its minimum or maximum exceeds
    /// `threshold`, or when it is unbounded. Returns the parts in order, each
    /// paired with the gap that precedes it (`None` for the first part). Nodes
    /// that are not a concatenation, or have no chaining point, come back as a
    /// single part. Leading and trailing gaps never split.
    pub fn split_at_chaining_points(self, threshold: usize) -> Vec<(Node, Option<GapBounds>)> {
        let children = match self {
            Node::Concat(children) => children,
            other => return vec![(other, None)],
        };

        let mut parts: Vec<(Node, Option<GapBounds>)> = Vec::new();
        let mut current: Vec<Node> = Vec::new();
        let mut pending_gap: Option<GapBounds> = None;

        let last = children.len().saturating_sub(1);
        for (i, child) in children.into_iter().enumerate() {
            if let Node::Gap { min, max, .. } = child {
                let wide =
                    min as usize > threshold || max.map_or(true, |m| m as usize > threshold);
                if wide && !current.is_empty() && i < last {
                    parts.push((Node::Concat(std::mem::take(&mut current)), pending_gap));
                    pending_gap = Some(GapBounds::new(
                        min as u32,
                        max.map_or(u32::MAX, |m| m as u32),
                    ));
                    continue;
                }
            }
            current.push(child);
        }
        parts.push((Node::Concat(current), pending_gap));
        parts
    }
}

/// Declared length bounds of a pattern.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LengthBounds {
    pub min: u32,
    pub max: Option<u32>,
}

impl LengthBounds {
    pub const EMPTY: Self = Self {
        min: 0,
        max: Some(0),
    };

    fn exact(n: u32) -> Self {
        Self {
            min: n,
            max: Some(n),
        }
    }

    fn then(self, next: Self) -> Self {
        Self {
            min: self.min.saturating_add(next.min),
            max: match (self.max, next.max) {
                (Some(a), Some(b)) => Some(a.saturating_add(b)),
                _ => None,
            },
        }
    }

    fn either(self, other: Self) -> Self {
        Self {
            min: self.min.min(other.min),
            max: match (self.max, other.max) {
                (Some(a), Some(b)) => Some(a.max(b)),
                _ => None,
            },
        }
    }

    fn repeated(self, min: u16, max: Option<u16>) -> Self {
        Self {
            min: self.min.saturating_mul(min as u32),
            max: match (self.max, max) {
                (Some(0), _) | (_, Some(0)) => Some(0),
                (Some(a), Some(b)) => Some(a.saturating_mul(b as u32)),
                _ => None,
            },
        }
    }
}

enum BoundsFrame<'a> {
    Seq {
        children: &'a [Node],
        next: usize,
        acc: Option<LengthBounds>,
        alt: bool,
    },
    Repeat {
        min: u16,
        max: Option<u16>,
    },
}

/// Descends from `node` to its leftmost leaf, pushing one frame per
/// composite on the way, and returns that leaf's bounds.
fn enter_bounds<'a>(
    mut node: &'a Node,
    stack: &mut Vec<BoundsFrame<'a>>,
    max_stack: usize,
) -> Result<LengthBounds, BuildError> {
    loop {
        if stack.len() >= max_stack {
            return Err(BuildError::StackOverflow { max: max_stack });
        }
        match node {
            Node::Empty
            | Node::StartOfInput
            | Node::EndOfInput
            | Node::WordBoundary
            | Node::NotWordBoundary => return Ok(LengthBounds::EMPTY),
            Node::Literal(bytes) => return Ok(LengthBounds::exact(bytes.len() as u32)),
            Node::Masked { .. } | Node::Class(_) | Node::Any => {
                return Ok(LengthBounds::exact(1))
            }
            Node::Gap { min, max, .. } => {
                return Ok(LengthBounds {
                    min: *min as u32,
                    max: max.map(|m| m as u32),
                })
            }
            Node::Concat(children) | Node::Alt(children) if children.is_empty() => {
                return Ok(LengthBounds::EMPTY)
            }
            Node::Concat(children) | Node::Alt(children) => {
                stack.push(BoundsFrame::Seq {
                    children,
                    next: 0,
                    acc: None,
                    alt: matches!(node, Node::Alt(_)),
                });
                node = &children[0];
            }
            Node::Repeat {
                node: inner,
                min,
                max,
                ..
            } => {
                stack.push(BoundsFrame::Repeat {
                    min: *min,
                    max: *max,
                });
                node = inner;
            }
        }
    }
}
