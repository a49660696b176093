//! Every literal occurrence is reported, checked against an independent
//! Aho-Corasick implementation.

use aho_corasick::AhoCorasick;
use proptest::prelude::*;
use sigscan_rs::{LiteralMatcher, PatternSpec, RulesBuilder, ScanOptions, Scanner};
use std::collections::BTreeSet;

use crate::proptest_cases;

// =============================================================================
// Helpers
// =============================================================================

fn scan_pairs(
    patterns: &[Vec<u8>],
    nocase: bool,
    hay: &[u8],
    chunk_size: usize,
) -> BTreeSet<(usize, usize)> {
    let mut builder = RulesBuilder::new();
    for (i, bytes) in patterns.iter().enumerate() {
        let mut lit = LiteralMatcher::new(bytes);
        if nocase {
            lit = lit.nocase();
        }
        builder.add_pattern(PatternSpec::literal(format!("p{i}"), lit));
    }
    let rules = builder.build().expect("rules");
    let mut scanner = Scanner::new(&rules).expect("scanner").with_options(ScanOptions {
        chunk_size,
        ..ScanOptions::default()
    });
    scanner.scan(hay);
    scanner
        .results()
        .matching()
        .flat_map(|(id, found)| found.iter().map(move |m| (id.index(), m.offset as usize)))
        .collect()
}

fn oracle_pairs(ac: &AhoCorasick, hay: &[u8]) -> BTreeSet<(usize, usize)> {
    ac.find_overlapping_iter(hay)
        .map(|m| (m.pattern().as_usize(), m.start()))
        .collect()
}

// =============================================================================
// Properties
// =============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(proptest_cases(64)))]

    #[test]
    fn literals_match_oracle(
        raw in prop::collection::btree_set(prop::collection::vec(b'a'..=b'c', 1..=6), 1..8),
        hay in prop::collection::vec(b'a'..=b'd', 0..256),
        chunk_size in 1usize..64,
    ) {
        let patterns: Vec<Vec<u8>> = raw.into_iter().collect();
        let ac = AhoCorasick::new(&patterns).expect("oracle");
        prop_assert_eq!(
            scan_pairs(&patterns, false, &hay, chunk_size),
            oracle_pairs(&ac, &hay)
        );
    }

    #[test]
    fn nocase_literals_match_oracle(
        raw in prop::collection::btree_set(prop::collection::vec(b'a'..=b'c', 1..=6), 1..6),
        hay in prop::collection::vec(prop::sample::select(b"aAbBcC-".to_vec()), 0..256),
    ) {
        let patterns: Vec<Vec<u8>> = raw.into_iter().collect();
        let ac = AhoCorasick::builder()
            .ascii_case_insensitive(true)
            .build(&patterns)
            .expect("oracle");
        prop_assert_eq!(
            scan_pairs(&patterns, true, &hay, 64 * 1024),
            oracle_pairs(&ac, &hay)
        );
    }
}

#[test]
fn dense_overlaps_match_oracle() {
    let patterns: Vec<Vec<u8>> = vec![
        b"a".to_vec(),
        b"aa".to_vec(),
        b"aaa".to_vec(),
        b"aaaaa".to_vec(),
        b"aaaaaaa".to_vec(),
    ];
    let hay = vec![b'a'; 40];
    let ac = AhoCorasick::new(&patterns).expect("oracle");
    let expected = oracle_pairs(&ac, &hay);
    assert_eq!(expected.len(), 40 + 39 + 38 + 36 + 34);
    for chunk_size in [1, 3, 7, 64] {
        assert_eq!(scan_pairs(&patterns, false, &hay, chunk_size), expected);
    }
}
