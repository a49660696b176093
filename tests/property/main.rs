//! Property-based and exhaustive oracle tests.
//!
//! Run with: `cargo test --test property`

mod prefilter_completeness;
mod verifier_oracle;

/// Case count for proptest blocks: `PROPTEST_CASES` wins, otherwise `default`.
pub(crate) fn proptest_cases(default: u32) -> u32 {
    std::env::var("PROPTEST_CASES")
        .ok()
        .and_then(|value| value.parse().ok())
        .unwrap_or(default)
        .max(1)
}
