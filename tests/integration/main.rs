//! Integration tests for the sigscan-rs scanning core.
//!
//! Run with: `cargo test --test integration`

mod cancellation;
mod chain_joining;
mod concurrency;
mod demo_rules;
mod limits;

use sigscan_rs::{Limits, LiteralMatcher, PatternSpec, Rules, RulesBuilder};

pub(crate) fn build(limits: Limits, specs: Vec<PatternSpec>) -> Rules {
    let mut builder = RulesBuilder::new().with_limits(limits);
    for spec in specs {
        builder.add_pattern(spec);
    }
    builder.build().expect("rules")
}

pub(crate) fn literal(name: &str, bytes: &[u8]) -> PatternSpec {
    PatternSpec::literal(name, LiteralMatcher::new(bytes))
}
