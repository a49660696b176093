//! Program verification checked against the `regex` crate.
//!
//! Generated syntax trees are rendered to byte regexes. A scan must report a
//! match at exactly the offsets where the anchored regex matches, with the
//! regex's leftmost-first length, and every reported span must itself be a
//! full match of the regex.

use proptest::prelude::*;
use regex::bytes::{Regex, RegexBuilder};
use sigscan_rs::{ByteClass, Limits, MatchPolicy, Node, PatternSpec, RulesBuilder, Scanner};
use std::fmt::Write;

use crate::proptest_cases;

// =============================================================================
// Constants
// =============================================================================

/// Alphabet for exhaustive domain testing.
const ALPHABET: &[u8] = b"abc";

/// Maximum haystack length for exhaustive enumeration: 3^0 + ... + 3^6 = 1093.
const EXHAUSTIVE_MAX_LEN: usize = 6;

// =============================================================================
// Helper Functions
// =============================================================================

fn render(node: &Node, out: &mut String) {
    match node {
        Node::Empty => out.push_str("(?:)"),
        Node::Literal(bytes) => {
            for b in bytes {
                let _ = write!(out, "\\x{b:02x}");
            }
        }
        Node::Class(class) => {
            out.push('[');
            for b in class.iter() {
                let _ = write!(out, "\\x{b:02x}");
            }
            out.push(']');
        }
        Node::Masked { value, mask } => {
            render(&Node::Class(ByteClass::masked(*value, *mask)), out);
        }
        Node::Any => out.push('.'),
        Node::Concat(nodes) => {
            out.push_str("(?:");
            for n in nodes {
                render(n, out);
            }
            out.push(')');
        }
        Node::Alt(nodes) => {
            out.push_str("(?:");
            for (i, n) in nodes.iter().enumerate() {
                if i > 0 {
                    out.push('|');
                }
                render(n, out);
            }
            out.push(')');
        }
        Node::Repeat {
            node,
            min,
            max,
            greedy,
        } => {
            out.push_str("(?:");
            render(node, out);
            out.push(')');
            push_bounds(out, *min, *max, *greedy);
        }
        Node::Gap { min, max, greedy } => {
            out.push('.');
            push_bounds(out, *min, *max, *greedy);
        }
        other => panic!("not generated: {other:?}"),
    }
}

fn push_bounds(out: &mut String, min: u16, max: Option<u16>, greedy: bool) {
    match max {
        Some(max) => {
            let _ = write!(out, "{{{min},{max}}}");
        }
        None => {
            let _ = write!(out, "{{{min},}}");
        }
    }
    if !greedy {
        out.push('?');
    }
}

fn compile_bytes_regex(pattern: &str) -> Regex {
    RegexBuilder::new(pattern)
        .size_limit(1 << 22)
        .build()
        .expect("oracle regex")
}

/// Anchored-at-start and whole-span regexes for `node`.
fn oracles(node: &Node) -> (Regex, Regex) {
    let mut body = String::new();
    render(node, &mut body);
    (
        compile_bytes_regex(&format!("(?s-u)\\A(?:{body})")),
        compile_bytes_regex(&format!("(?s-u)\\A(?:{body})\\z")),
    )
}

/// Checks one haystack. Returns `None` when a verification hit the fiber
/// ceiling, in which case the comparison is not meaningful.
fn check(node: &Node, hay: &[u8]) -> Option<(Vec<u64>, Vec<u64>)> {
    let limits = Limits::default();
    let spec = PatternSpec::from_node("p", node.clone(), MatchPolicy::default(), &limits)
        .expect("spec");
    let mut builder = RulesBuilder::new();
    builder.add_pattern(spec);
    let rules = builder.build().expect("rules");
    let mut scanner = Scanner::new(&rules).expect("scanner");
    scanner.scan(hay);
    let results = scanner.results();
    if results.stats().fiber_overflows > 0 {
        return None;
    }

    let (starts, whole) = oracles(node);
    let found = results.matches_by_name("p").expect("pattern");
    for m in found {
        let start = m.offset as usize;
        let span = &hay[start..start + m.length as usize];
        assert!(
            whole.is_match(span),
            "span {span:?} at {start} is not a full match of {node:?}"
        );
        assert_eq!(
            Some(m.length as usize),
            starts.find(&hay[start..]).map(|f| f.end()),
            "length at {start} of {node:?} on {hay:?}"
        );
    }
    let actual: Vec<u64> = found.iter().map(|m| m.offset).collect();
    let expected: Vec<u64> = (0..hay.len())
        .filter(|&i| starts.is_match(&hay[i..]))
        .map(|i| i as u64)
        .collect();
    Some((actual, expected))
}

fn for_each_string(max_len: usize, mut f: impl FnMut(&[u8])) {
    let mut buf = Vec::with_capacity(max_len);
    fn rec(buf: &mut Vec<u8>, max_len: usize, f: &mut impl FnMut(&[u8])) {
        f(buf);
        if buf.len() == max_len {
            return;
        }
        for &b in ALPHABET {
            buf.push(b);
            rec(buf, max_len, f);
            buf.pop();
        }
    }
    rec(&mut buf, max_len, &mut f);
}

// =============================================================================
// Generators
// =============================================================================

fn leaf() -> impl Strategy<Value = Node> {
    prop_oneof![
        prop::collection::vec(b'a'..=b'c', 1..=3).prop_map(Node::Literal),
        prop::collection::vec(b'a'..=b'c', 1..=2).prop_map(|b| Node::Class(ByteClass::from_bytes(&b))),
        Just(Node::Any),
        (0u16..=2, 0u16..=3).prop_map(|(min, extra)| Node::gap(min, Some(min + extra))),
    ]
}

fn tree() -> impl Strategy<Value = Node> {
    leaf().prop_recursive(3, 16, 3, |inner| {
        prop_oneof![
            prop::collection::vec(inner.clone(), 1..=3).prop_map(Node::Concat),
            prop::collection::vec(inner.clone(), 2..=3).prop_map(Node::Alt),
            (inner.clone(), 0u16..=2, 0u16..=2, any::<bool>()).prop_map(
                |(node, min, extra, greedy)| Node::Repeat {
                    node: Box::new(node),
                    min,
                    max: Some(min + extra),
                    greedy,
                }
            ),
            (inner, 0u16..=1, any::<bool>()).prop_map(|(node, min, greedy)| Node::Repeat {
                node: Box::new(node),
                min,
                max: None,
                greedy,
            }),
        ]
    })
}

/// Patterns always start with one literal byte, so every match is non-empty
/// and located by a real atom.
fn pattern() -> impl Strategy<Value = Node> {
    (b'a'..=b'c', tree()).prop_map(|(first, rest)| Node::concat([Node::Literal(vec![first]), rest]))
}

// =============================================================================
// Properties
// =============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(proptest_cases(128)))]

    #[test]
    fn program_matches_regex_oracle(
        node in pattern(),
        hay in prop::collection::vec(b'a'..=b'd', 0..48),
    ) {
        if let Some((actual, expected)) = check(&node, &hay) {
            prop_assert_eq!(actual, expected, "pattern {:?}", node);
        }
    }
}

// =============================================================================
// Exhaustive
// =============================================================================

#[test]
fn fixed_programs_over_small_domain() {
    let programs = [
        Node::concat([
            Node::literal(b"a"),
            Node::repeat(Node::literal(b"b"), 0, None),
            Node::literal(b"c"),
        ]),
        Node::concat([
            Node::literal(b"a"),
            Node::alt([Node::literal(b"b"), Node::literal(b"cb")]),
            Node::gap(0, Some(2)),
            Node::literal(b"a"),
        ]),
        Node::concat([
            Node::literal(b"b"),
            Node::repeat_lazy(
                Node::alt([Node::literal(b"a"), Node::literal(b"ab")]),
                1,
                Some(2),
            ),
        ]),
        Node::concat([
            Node::literal(b"c"),
            Node::repeat(Node::repeat(Node::Class(ByteClass::from_bytes(b"ab")), 1, Some(2)), 2, Some(2)),
        ]),
        Node::concat([
            Node::literal(b"b"),
            Node::repeat(Node::repeat_lazy(Node::Any, 0, Some(1)), 0, None),
            Node::literal(b"a"),
        ]),
        Node::concat([
            Node::literal(b"c"),
            Node::repeat_lazy(Node::alt([Node::Empty, Node::literal(b"a")]), 0, None),
            Node::literal(b"b"),
        ]),
    ];
    for node in &programs {
        for_each_string(EXHAUSTIVE_MAX_LEN, |hay| {
            let (actual, expected) = check(node, hay).expect("no fiber overflow");
            assert_eq!(actual, expected, "pattern {node:?} on {hay:?}");
        });
    }
}
