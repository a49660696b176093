//! The bundled demo rule set end to end.

use sigscan_rs::{demo_rules, ScanState, Scanner};

#[test]
fn demo_patterns_fire() {
    let rules = demo_rules().expect("demo rules");
    assert_eq!(rules.pattern_count(), 7);
    assert_eq!(rules.chain_links().len(), 1);

    let mut data = Vec::new();
    data.extend_from_slice(b"start CMD.EXE /c ");
    data.extend_from_slice(b"p\0O\0w\0E\0r\0s\0h\0e\0l\0l\0 ");
    data.extend(b"http://".iter().map(|b| b ^ 0x21));
    data.extend_from_slice(b" MZ\x90\x00\x03\x00PE\0\0 ");
    data.extend_from_slice(b"key=0123456789abcdef_tail ");
    data.extend_from_slice(b"\xde\xad\xb7\x00\xef ");
    data.extend_from_slice(b"BEGIN");
    data.extend(std::iter::repeat(b'.').take(512));
    data.extend_from_slice(b"END! xcmd.exe");

    let mut scanner = Scanner::new(&rules).expect("scanner");
    assert_eq!(scanner.scan(&data), ScanState::Completed);
    let results = scanner.results();

    let count = |name: &str| results.matches_by_name(name).expect(name).len();
    assert_eq!(count("cmd_exe"), 1);
    assert_eq!(count("powershell_wide"), 1);
    assert_eq!(count("xor_url"), 1);
    assert_eq!(count("pe_header"), 1);
    assert_eq!(count("api_key"), 1);
    assert_eq!(count("hex_blob"), 1);
    assert_eq!(count("staged_payload"), 1);

    let xor = results.matches_by_name("xor_url").expect("xor_url");
    assert_eq!(xor[0].xor_key, 0x21);
    let key = results.matches_by_name("api_key").expect("api_key");
    assert_eq!(key[0].length as usize, b"key=0123456789abcdef_tail".len());
}
