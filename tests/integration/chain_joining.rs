//! Chained patterns joined across gaps, end to end.

use sigscan_rs::{
    GapBounds, Limits, LiteralMatcher, MatchPolicy, Node, PartSpec, PatternId, PatternSpec,
    Scanner, SubPatternId,
};

use crate::build;

fn aaaa_bbbb(gap: GapBounds) -> PatternSpec {
    PatternSpec::new(
        "pair",
        vec![
            PartSpec::literal(LiteralMatcher::new(b"AAAA")),
            PartSpec::literal(LiteralMatcher::new(b"BBBB")).after_gap(gap),
        ],
    )
}

fn spans(data: &[u8], gap: GapBounds) -> Vec<(u64, u64)> {
    let rules = build(Limits::default(), vec![aaaa_bbbb(gap)]);
    let mut scanner = Scanner::new(&rules).expect("scanner");
    scanner.scan(data);
    scanner
        .results()
        .matches(PatternId(0))
        .iter()
        .map(|m| (m.offset, m.length))
        .collect()
}

#[test]
fn join_inside_bounds() {
    let gap = GapBounds::new(2, 5);
    assert_eq!(spans(b"AAAAxxBBBB", gap), vec![(0, 10)]);
    assert_eq!(spans(b"AAAAxxxxxBBBB", gap), vec![(0, 13)]);
}

#[test]
fn gap_outside_bounds_is_rejected() {
    let gap = GapBounds::new(2, 5);
    assert!(spans(b"AAAABBBB", gap).is_empty());
    assert!(spans(b"AAAAxBBBB", gap).is_empty());
    assert!(spans(b"AAAAxxxxxxBBBB", gap).is_empty());
    assert!(spans(b"AAAAxxxxxxxBBBB", gap).is_empty());
    assert!(spans(b"BBBBxxAAAA", gap).is_empty());
}

#[test]
fn every_head_joins_a_shared_tail() {
    // Heads at 0 and 3 both sit 2..=5 bytes before the tail.
    let data = b"AAAAAAA..BBBB";
    let found = spans(data, GapBounds::new(2, 5));
    assert_eq!(found, vec![(0, 13), (1, 12), (2, 11), (3, 10)]);
}

#[test]
fn unbounded_gap() {
    let mut data = b"AAAA".to_vec();
    data.extend(std::iter::repeat(b'-').take(10_000));
    data.extend_from_slice(b"BBBB");
    let found = spans(&data, GapBounds::unbounded(0));
    assert_eq!(found, vec![(0, data.len() as u64)]);
}

#[test]
fn chain_links_describe_parts() {
    let rules = build(Limits::default(), vec![aaaa_bbbb(GapBounds::new(2, 5))]);
    let links = rules.chain_links();
    assert_eq!(links.len(), 1);
    assert_eq!(links[0].pattern, PatternId(0));
    assert_ne!(links[0].from, links[0].to);
    assert_eq!(links[0].gap, GapBounds::new(2, 5));
    let _: SubPatternId = links[0].to;
}

#[test]
fn syntax_tree_splits_at_wide_gaps() {
    let limits = Limits::default();
    let node = Node::concat([
        Node::literal(b"head"),
        Node::gap(0, Some(8)),
        Node::literal(b"mid"),
        Node::gap(250, None),
        Node::literal(b"tail"),
    ]);
    let spec = PatternSpec::from_node("split", node, MatchPolicy::default(), &limits)
        .expect("spec");
    assert_eq!(spec.parts.len(), 2);
    assert_eq!(spec.parts[1].gap, Some(GapBounds::unbounded(250)));

    let rules = build(limits, vec![spec]);
    let mut data = b"head..mid".to_vec();
    data.extend(std::iter::repeat(b'.').take(300));
    data.extend_from_slice(b"tail");

    let mut scanner = Scanner::new(&rules).expect("scanner");
    scanner.scan(&data);
    let results = scanner.results();
    let found = results.matches(PatternId(0));
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].offset, 0);
    assert_eq!(found[0].length as usize, data.len());

    // Too close: the wide gap needs at least 250 bytes.
    let mut short = b"head..mid".to_vec();
    short.extend(std::iter::repeat(b'.').take(100));
    short.extend_from_slice(b"tail");
    scanner.scan(&short);
    assert_eq!(scanner.results().total_matches(), 0);
}
