use crate::error::BuildError;
use crate::limits::Limits;
use crate::program::{ByteClass, MatchPolicy, Node};
use crate::rules::{LiteralMatcher, PatternSpec, Rules, RulesBuilder};

// --------------------------
// Demo rule set
// --------------------------

/// A small rule set exercising every pattern shape: plain and modified
/// literals, a hex pattern with a short gap, a chained pattern, and a
/// counted-repetition program.
pub fn demo_rules() -> Result<Rules, BuildError> {
    let mut builder = RulesBuilder::new();
    for spec in demo_specs(builder.limits())? {
        builder.add_pattern(spec);
    }
    builder.build()
}

/// Pattern specs behind [`demo_rules`], compiled against `limits`.
pub fn demo_specs(limits: &Limits) -> Result<Vec<PatternSpec>, BuildError> {
    let pe_header = Node::concat([
        Node::literal(b"MZ"),
        Node::gap(0, Some(64)),
        Node::literal(b"PE\0\0"),
    ]);

    // Two markers far enough apart to become a chain.
    let staged_payload = Node::concat([
        Node::literal(b"BEGIN"),
        Node::gap(256, Some(4096)),
        Node::literal(b"END!"),
    ]);

    let api_key = Node::concat([
        Node::literal(b"key="),
        Node::repeat(Node::Class(ByteClass::word()), 16, Some(64)),
    ]);

    let hex_blob = Node::concat([
        Node::literal(b"\xde\xad"),
        Node::Masked {
            value: 0xb0,
            mask: 0xf0,
        },
        Node::Any,
        Node::literal(b"\xef"),
    ]);

    Ok(vec![
        PatternSpec::literal("cmd_exe", LiteralMatcher::new(b"cmd.exe").nocase()).fullword(),
        PatternSpec::literal(
            "powershell_wide",
            LiteralMatcher::new(b"powershell").wide().nocase(),
        ),
        PatternSpec::literal("xor_url", LiteralMatcher::new(b"http://").xor(1..=255)),
        PatternSpec::from_node("pe_header", pe_header, MatchPolicy::Shortest, limits)?,
        PatternSpec::from_node("staged_payload", staged_payload, MatchPolicy::default(), limits)?,
        PatternSpec::from_node("api_key", api_key, MatchPolicy::default(), limits)?,
        PatternSpec::from_node("hex_blob", hex_blob, MatchPolicy::default(), limits)?,
    ])
}
