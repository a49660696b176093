//! Aho-Corasick prefilter over the rule set's atoms.
//!
//! # Layout
//! - Root transitions are a dense 256-entry table; missing bytes loop back to
//!   the root.
//! - Every other state keeps its children as a sorted `(byte, state)` run in
//!   one flat array, plus a failure link. Atoms are at most a few bytes long,
//!   so the trie is shallow and a byte costs a bounded number of lookups.
//! - Output lists are flattened per state and already include the outputs of
//!   the failure chain, longest atom first. Zero-length atoms are root outputs
//!   and therefore appear at the tail of every list.
//!
//! # Semantics
//! - Reports every `(atom, end)` occurrence in increasing `end` order.
//!   Zero-length atoms are reported at every end offset `0..=len`.
//! - Scanning is resumable: a [`PrefilterState`] carries the automaton state
//!   across chunks of one block.
//! - While the automaton idles at the root, scanning skips ahead with
//!   `memchr`/`memchr2`/`memchr3` when the root has at most three live bytes
//!   and no zero-length atom exists.

use std::collections::VecDeque;
use std::ops::ControlFlow;

use memchr::{memchr, memchr2, memchr3};

const ROOT: u32 = 0;

/// One prefilter occurrence: atom index and block offset just past its end.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) struct AtomHit {
    pub(crate) atom: u32,
    pub(crate) end: usize,
}

/// Root skip strategy.
#[derive(Clone, Copy, Debug)]
enum Skip {
    /// No atoms at all: nothing can ever be reported.
    Never,
    One(u8),
    Two(u8, u8),
    Three(u8, u8, u8),
    /// Walk every byte.
    Off,
}

/// Resumable scan position inside one block.
#[derive(Clone, Copy, Debug, Default)]
pub(crate) struct PrefilterState {
    state: u32,
    /// Zero-length atoms were reported at offset 0.
    started: bool,
}

impl PrefilterState {
    pub(crate) fn reset(&mut self) {
        *self = Self::default();
    }
}

pub(crate) struct Prefilter {
    root: Box<[u32; 256]>,
    /// `trans[trans_offsets[s]..trans_offsets[s + 1]]` are the children of `s`.
    trans_offsets: Vec<u32>,
    trans: Vec<(u8, u32)>,
    fail: Vec<u32>,
    out_offsets: Vec<u32>,
    outs: Vec<u32>,
    atom_lens: Vec<u8>,
    skip: Skip,
}

impl Prefilter {
    /// Builds the automaton. Atom `i` is reported with index `i`.
    pub(crate) fn new(atoms: &[Vec<u8>]) -> Self {
        // Trie with sorted child lists.
        let mut children: Vec<Vec<(u8, u32)>> = vec![Vec::new()];
        let mut own: Vec<Vec<u32>> = vec![Vec::new()];
        let mut depth: Vec<u8> = vec![0];
        for (idx, atom) in atoms.iter().enumerate() {
            let mut s = ROOT as usize;
            for &b in atom {
                s = match children[s].binary_search_by_key(&b, |&(c, _)| c) {
                    Ok(pos) => children[s][pos].1 as usize,
                    Err(pos) => {
                        let next = children.len() as u32;
                        children[s].insert(pos, (b, next));
                        children.push(Vec::new());
                        own.push(Vec::new());
                        depth.push(depth[s].saturating_add(1));
                        next as usize
                    }
                };
            }
            own[s].push(idx as u32);
        }

        // Failure links in BFS order so every link target is already final.
        let states = children.len();
        let mut fail = vec![ROOT; states];
        let mut order: Vec<u32> = Vec::with_capacity(states);
        let mut queue: VecDeque<u32> = children[ROOT as usize].iter().map(|&(_, c)| c).collect();
        while let Some(v) = queue.pop_front() {
            order.push(v);
            for &(b, child) in &children[v as usize] {
                let mut f = fail[v as usize];
                fail[child as usize] = loop {
                    if let Ok(pos) = children[f as usize].binary_search_by_key(&b, |&(c, _)| c) {
                        break children[f as usize][pos].1;
                    }
                    if f == ROOT {
                        break ROOT;
                    }
                    f = fail[f as usize];
                };
                queue.push_back(child);
            }
        }

        // Flattened output lists: own outputs, then the failure state's list.
        let mut lists: Vec<Vec<u32>> = vec![Vec::new(); states];
        lists[ROOT as usize] = own[ROOT as usize].clone();
        for &v in &order {
            let mut list = own[v as usize].clone();
            list.extend_from_slice(&lists[fail[v as usize] as usize]);
            lists[v as usize] = list;
        }

        let mut out_offsets = Vec::with_capacity(states + 1);
        let mut outs = Vec::new();
        out_offsets.push(0);
        for list in &lists {
            outs.extend_from_slice(list);
            out_offsets.push(outs.len() as u32);
        }

        let mut root = Box::new([ROOT; 256]);
        for &(b, child) in &children[ROOT as usize] {
            root[b as usize] = child;
        }
        let mut trans_offsets = Vec::with_capacity(states + 1);
        let mut trans = Vec::new();
        trans_offsets.push(0);
        for list in &children {
            trans.extend_from_slice(list);
            trans_offsets.push(trans.len() as u32);
        }

        let root_bytes: Vec<u8> = children[ROOT as usize].iter().map(|&(b, _)| b).collect();
        let skip = if !own[ROOT as usize].is_empty() {
            Skip::Off
        } else {
            match root_bytes.as_slice() {
                [] => Skip::Never,
                [a] => Skip::One(*a),
                [a, b] => Skip::Two(*a, *b),
                [a, b, c] => Skip::Three(*a, *b, *c),
                _ => Skip::Off,
            }
        };

        Self {
            root,
            trans_offsets,
            trans,
            fail,
            out_offsets,
            outs,
            atom_lens: atoms.iter().map(|a| a.len() as u8).collect(),
            skip,
        }
    }

    pub(crate) fn state_count(&self) -> usize {
        self.fail.len()
    }

    #[inline]
    pub(crate) fn atom_len(&self, atom: u32) -> usize {
        self.atom_lens[atom as usize] as usize
    }

    #[inline]
    fn next_state(&self, mut s: u32, b: u8) -> u32 {
        loop {
            if s == ROOT {
                return self.root[b as usize];
            }
            let start = self.trans_offsets[s as usize] as usize;
            let end = self.trans_offsets[s as usize + 1] as usize;
            let run = &self.trans[start..end];
            if let Ok(pos) = run.binary_search_by_key(&b, |&(c, _)| c) {
                return run[pos].1;
            }
            s = self.fail[s as usize];
        }
    }

    #[inline]
    fn outputs(&self, s: u32) -> &[u32] {
        let start = self.out_offsets[s as usize] as usize;
        let end = self.out_offsets[s as usize + 1] as usize;
        &self.outs[start..end]
    }

    #[inline]
    fn skip_to(&self, hay: &[u8]) -> Option<usize> {
        match self.skip {
            Skip::Never => None,
            Skip::One(a) => memchr(a, hay),
            Skip::Two(a, b) => memchr2(a, b, hay),
            Skip::Three(a, b, c) => memchr3(a, b, c, hay),
            Skip::Off => Some(0),
        }
    }

    /// Scans one chunk of a block.
    ///
    /// `base` is the block offset of `chunk[0]`; reported ends are block
    /// offsets. Stops early when `on_hit` breaks.
    pub(crate) fn scan_chunk<F>(
        &self,
        st: &mut PrefilterState,
        chunk: &[u8],
        base: usize,
        mut on_hit: F,
    ) -> ControlFlow<()>
    where
        F: FnMut(AtomHit) -> ControlFlow<()>,
    {
        if !st.started {
            st.started = true;
            for &atom in self.outputs(ROOT) {
                on_hit(AtomHit { atom, end: base })?;
            }
        }

        let mut s = st.state;
        let mut i = 0usize;
        while i < chunk.len() {
            if s == ROOT {
                match self.skip_to(&chunk[i..]) {
                    Some(delta) => i += delta,
                    None => {
                        i = chunk.len();
                        break;
                    }
                }
            }
            s = self.next_state(s, chunk[i]);
            i += 1;
            for &atom in self.outputs(s) {
                if let ControlFlow::Break(()) = on_hit(AtomHit {
                    atom,
                    end: base + i,
                }) {
                    st.state = s;
                    return ControlFlow::Break(());
                }
            }
        }
        debug_assert_eq!(i, chunk.len());
        st.state = s;
        ControlFlow::Continue(())
    }

    /// Scans a whole block in one pass.
    pub(crate) fn scan<F>(&self, hay: &[u8], on_hit: F) -> ControlFlow<()>
    where
        F: FnMut(AtomHit) -> ControlFlow<()>,
    {
        let mut st = PrefilterState::default();
        self.scan_chunk(&mut st, hay, 0, on_hit)
    }
}
