//! Fast-path verification for literal parts and the `fullword` check.
//!
//! Literal parts never enter the fiber executor: a candidate anchor is
//! compared byte by byte against the literal's encoded form.
//!
//! - `wide` interleaves a zero byte after every literal byte.
//! - `nocase` folds ASCII letters; zero bytes of wide text stay exact.
//! - `xor` derives the key from the first input byte and requires it to fall
//!   in the accepted range. The zero bytes of wide text are xored too.

use crate::rules::LiteralMatcher;

/// Result of a successful literal comparison.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) struct LiteralHit {
    pub(crate) len: usize,
    pub(crate) xor_key: u8,
}

/// Compares `lit` against `data[start..]`.
pub(crate) fn verify(lit: &LiteralMatcher, data: &[u8], start: usize) -> Option<LiteralHit> {
    let len = lit.match_len();
    let window = data.get(start..start.checked_add(len)?)?;
    if len == 0 {
        return None;
    }

    let key = match &lit.xor {
        Some(keys) => {
            let key = window[0] ^ lit.encoded_byte(0);
            if !keys.contains(&key) {
                return None;
            }
            key
        }
        None => 0,
    };

    let ok = window.iter().enumerate().all(|(i, &b)| {
        let expected = lit.encoded_byte(i);
        let b = b ^ key;
        if lit.nocase {
            b.eq_ignore_ascii_case(&expected)
        } else {
            b == expected
        }
    });
    ok.then_some(LiteralHit { len, xor_key: key })
}

/// Returns true when the span `start..start+len` is not glued to
/// alphanumeric bytes on either side. Wide spans look at the UTF-16 code
/// unit on each side instead.
pub(crate) fn is_fullword(data: &[u8], start: usize, len: usize, wide: bool) -> bool {
    let end = start + len;
    if wide {
        let before = start >= 2 && data[start - 2].is_ascii_alphanumeric() && data[start - 1] == 0;
        let after =
            end + 1 < data.len() && data[end].is_ascii_alphanumeric() && data[end + 1] == 0;
        !before && !after
    } else {
        let before = start >= 1 && data[start - 1].is_ascii_alphanumeric();
        let after = end < data.len() && data[end].is_ascii_alphanumeric();
        !before && !after
    }
}
