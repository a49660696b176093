//! Match caps and degradation signals at real scale.

use sigscan_rs::{
    BuildError, Limits, MatchPolicy, Node, PatternId, PatternSpec, ScanEvent, ScanState, Scanner,
    Signal,
};
use std::ops::ControlFlow;

use crate::{build, literal};

#[test]
fn cap_at_one_million_matches() {
    let rules = build(Limits::default(), vec![literal("ab", b"ab")]);
    assert!(!rules.has_weak_atoms());
    let data = b"ab".repeat(1_000_001);

    let mut scanner = Scanner::new(&rules).expect("scanner");
    let mut cap_signals = 0;
    let state = scanner.scan_with(&data, |event| {
        if let ScanEvent::Signal(Signal::TooManyMatches(id)) = event {
            assert_eq!(*id, PatternId(0));
            cap_signals += 1;
        }
        ControlFlow::Continue(())
    });

    assert_eq!(state, ScanState::Completed);
    assert_eq!(cap_signals, 1);
    let results = scanner.results();
    let found = results.matches(PatternId(0));
    assert_eq!(found.len(), 1_000_000);
    assert_eq!(found[999_999].offset, 1_999_998);
    assert_eq!(results.stats().matches_dropped, 1);
    assert_eq!(results.signals(), &[Signal::TooManyMatches(PatternId(0))]);
}

#[test]
fn single_byte_pattern_caps_and_degrades() {
    let rules = build(Limits::default(), vec![literal("x", b"x")]);
    let data = vec![b'x'; 1_000_001];

    let mut scanner = Scanner::new(&rules).expect("scanner");
    assert_eq!(scanner.scan(&data), ScanState::Completed);
    let results = scanner.results();
    assert_eq!(results.matches(PatternId(0)).len(), 1_000_000);
    // The weak one-byte atom also crosses the slow-scan thresholds first.
    assert_eq!(
        results.signals(),
        &[
            Signal::TooSlowScanning(Some(PatternId(0))),
            Signal::TooManyMatches(PatternId(0)),
        ]
    );
}

#[test]
fn slow_scan_with_tightened_limits() {
    let limits = Limits {
        slow_string_matches: 100,
        file_size_threshold: 1_000,
        ..Limits::default()
    };
    let rules = build(limits, vec![literal("x", b"x"), literal("word", b"word")]);
    assert!(rules.has_weak_atoms());

    let mut scanner = Scanner::new(&rules).expect("scanner");
    // Many matches but a small buffer: no signal yet.
    scanner.scan(&[b'x'; 500]);
    assert!(scanner.results().signals().is_empty());

    scanner.scan(&[b'x'; 2_000]);
    let results = scanner.results();
    assert_eq!(
        results.signals(),
        &[Signal::TooSlowScanning(Some(PatternId(0)))]
    );
    assert_eq!(results.total_matches(), 2_000);
}

#[test]
fn slow_scan_blames_nobody_when_strong_pattern_crosses() {
    let limits = Limits {
        slow_string_matches: 3,
        file_size_threshold: 10,
        ..Limits::default()
    };
    // The weak pattern never matches; the strong one crosses the thresholds.
    let rules = build(limits, vec![literal("q", b"q"), literal("abcd", b"abcd")]);
    let mut scanner = Scanner::new(&rules).expect("scanner");
    scanner.scan(&b"abcd".repeat(8));
    assert_eq!(
        scanner.results().signals(),
        &[Signal::TooSlowScanning(None)]
    );
}

#[test]
fn oversized_range_is_a_build_error() {
    let node = Node::repeat(Node::literal(b"a"), 0, Some(40_000));
    let err = PatternSpec::from_node("big", node, MatchPolicy::default(), &Limits::default())
        .expect_err("range too large");
    assert!(matches!(err, BuildError::RangeTooLarge { .. }));
}

#[test]
fn split_ceiling_is_a_build_error() {
    let limits = Limits {
        max_split_id: 2,
        ..Limits::default()
    };
    let node = Node::alt([
        Node::literal(b"a"),
        Node::literal(b"b"),
        Node::literal(b"c"),
        Node::literal(b"d"),
    ]);
    let err = PatternSpec::from_node("alts", node, MatchPolicy::default(), &limits)
        .expect_err("too many splits");
    assert!(matches!(err, BuildError::TooManySplits { max: 2 }));
}

#[test]
fn invalid_limits_are_rejected() {
    let limits = Limits {
        max_threads: 0,
        ..Limits::default()
    };
    let mut builder = sigscan_rs::RulesBuilder::new().with_limits(limits);
    builder.add_pattern(literal("a", b"a"));
    assert!(matches!(
        builder.build(),
        Err(BuildError::InvalidLimits {
            field: "max_threads",
            ..
        })
    ));
}
