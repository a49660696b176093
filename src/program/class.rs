//! 256-bit byte sets used by `Class` instructions.

use std::fmt;

/// A set of byte values with O(1) membership.
///
/// # Invariants
/// - Bit `b` of the mask is set if and only if byte `b` is in the set.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct ByteClass {
    mask: [u64; 4],
}

impl ByteClass {
    /// Returns the empty class.
    pub const fn empty() -> Self {
        Self { mask: [0; 4] }
    }

    /// Returns the class containing every byte.
    pub const fn full() -> Self {
        Self {
            mask: [u64::MAX; 4],
        }
    }

    /// Builds a class from a list of bytes.
    pub fn from_bytes(bytes: &[u8]) -> Self {
        let mut class = Self::empty();
        for &b in bytes {
            class.insert(b);
        }
        class
    }

    /// Builds a class from an inclusive range.
    pub fn from_range(lo: u8, hi: u8) -> Self {
        let mut class = Self::empty();
        class.insert_range(lo, hi);
        class
    }

    /// ASCII digits `0-9`.
    pub fn digit() -> Self {
        Self::from_range(b'0', b'9')
    }

    /// ASCII word characters `[A-Za-z0-9_]`.
    pub fn word() -> Self {
        let mut class = Self::from_range(b'a', b'z');
        class.insert_range(b'A', b'Z');
        class.insert_range(b'0', b'9');
        class.insert(b'_');
        class
    }

    /// ASCII whitespace as matched by `\s` in byte regexes.
    pub fn space() -> Self {
        Self::from_bytes(b"\t\n\x0b\x0c\r ")
    }

    /// Both ASCII cases of `b`, or just `b` when it is not a letter.
    pub fn nocase(b: u8) -> Self {
        let mut class = Self::empty();
        class.insert(b.to_ascii_lowercase());
        class.insert(b.to_ascii_uppercase());
        class
    }

    /// Every byte `x` with `x & mask == value & mask`.
    pub fn masked(value: u8, mask: u8) -> Self {
        let mut class = Self::empty();
        for b in 0..=255u8 {
            if b & mask == value & mask {
                class.insert(b);
            }
        }
        class
    }

    #[inline]
    pub fn insert(&mut self, b: u8) {
        self.mask[(b >> 6) as usize] |= 1u64 << (b & 63);
    }

    pub fn insert_range(&mut self, lo: u8, hi: u8) {
        for b in lo..=hi {
            self.insert(b);
        }
    }

    #[inline]
    pub fn contains(&self, b: u8) -> bool {
        (self.mask[(b >> 6) as usize] >> (b & 63)) & 1 == 1
    }

    /// Returns the complement of this class.
    pub fn negated(&self) -> Self {
        Self {
            mask: [!self.mask[0], !self.mask[1], !self.mask[2], !self.mask[3]],
        }
    }

    pub fn union(&self, other: &Self) -> Self {
        let mut mask = self.mask;
        for (w, o) in mask.iter_mut().zip(other.mask.iter()) {
            *w |= *o;
        }
        Self { mask }
    }

    /// Number of bytes in the class.
    pub fn len(&self) -> usize {
        self.mask.iter().map(|w| w.count_ones() as usize).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.mask.iter().all(|&w| w == 0)
    }

    /// Iterates members in ascending order.
    pub fn iter(&self) -> impl Iterator<Item = u8> + '_ {
        (0..=255u8).filter(move |&b| self.contains(b))
    }

    /// Collapses members into inclusive ranges, ascending.
    pub fn ranges(&self) -> Vec<(u8, u8)> {
        let mut out: Vec<(u8, u8)> = Vec::new();
        for b in self.iter() {
            match out.last_mut() {
                Some((_, hi)) if *hi != u8::MAX && *hi + 1 == b => *hi = b,
                _ => out.push((b, b)),
            }
        }
        out
    }
}

impl fmt::Debug for ByteClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[")?;
        for (lo, hi) in self.ranges() {
            if lo == hi {
                write!(f, "\\x{lo:02x}")?;
            } else {
                write!(f, "\\x{lo:02x}-\\x{hi:02x}")?;
            }
        }
        write!(f, "]")
    }
}
