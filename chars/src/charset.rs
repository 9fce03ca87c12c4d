use crate::ichar::IChar;
use crate::interval::IntervalSet;
use crate::uchar::{UChar, MAX_UNICODE};

/// An alphabet refinement: a set of pairwise-disjoint [`IChar`]s covering
/// exactly the characters a pattern's atoms reference.
///
/// Patterns are built incrementally by calling [`ICharSet::add`] once per
/// atom in the AST. Each call re-splits the existing members against the
/// new atom so the invariant — members never overlap — holds after every
/// call. [`ICharSet::refine`] then answers "which atoms of the final
/// alphabet does this particular character class cover", which is exactly
/// what the ε-NFA compiler needs to turn a `Consume` transition's character
/// class into a set of alphabet symbols.
#[derive(Debug, Clone, Default)]
pub struct ICharSet {
    members: Vec<IChar>,
}

impl ICharSet {
    pub fn new() -> Self {
        ICharSet { members: Vec::new() }
    }

    pub fn members(&self) -> &[IChar] {
        &self.members
    }

    /// Adds `c` to the refinement, splitting every existing member `d` into
    /// `d∩c`, `d∖c`, keeping the pieces that are non-empty, and adding
    /// `c∖(union of all d)` as a new member for whatever of `c` wasn't
    /// already covered.
    pub fn add(&mut self, c: &IChar) {
        let mut remaining = c.clone();
        let mut next = Vec::with_capacity(self.members.len() + 1);
        for d in &self.members {
            let both = d.intersection(&remaining);
            let only_d = d.difference(&remaining);
            if !only_d.is_empty() {
                next.push(only_d);
            }
            if !both.is_empty() {
                next.push(both);
            }
            remaining = remaining.difference(d);
        }
        if !remaining.is_empty() {
            next.push(remaining);
        }
        self.members = next;
    }

    /// The atoms of the refinement whose intersection with `c` equals
    /// themselves, i.e. the pieces of `c` as split by everything added to
    /// the set so far (including `c` itself, since callers always `add`
    /// before `refine`).
    pub fn refine(&self, c: &IChar) -> Vec<usize> {
        self.members
            .iter()
            .enumerate()
            .filter(|(_, d)| d.intersection(c) == **d && !d.is_empty())
            .map(|(i, _)| i)
            .collect()
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    /// A code point outside every member's ranges — no atom this alphabet
    /// distinguishes can ever match it. Ambiguity witnesses pump a shared
    /// prefix two structurally different ways, which says nothing about
    /// whether an input actually matches the pattern; terminating an
    /// attack string with this sentinel forces the overall match to fail,
    /// which is what drives a backtracking engine to exhaust every way of
    /// splitting the pumped run before giving up.
    pub fn sentinel(&self) -> UChar {
        let covered = self
            .members
            .iter()
            .fold(IntervalSet::empty(), |acc, m| acc.union(m.ranges()));
        covered
            .complement(MAX_UNICODE)
            .ranges()
            .first()
            .map(|&(lo, _)| lo)
            .unwrap_or(MAX_UNICODE - 1)
    }
}
