//! The pattern AST of `spec.md` §3: a tagged enumeration of pattern nodes,
//! consumed by [`crate::enfa`]. Building one from source text is an
//! external concern — see [`from_hir`] — this module only defines the
//! shape and the facts derived from it.

pub mod from_hir;
mod raw;

use reguard_chars::IChar;

/// `spec.md`'s `max: {none | some(none=∞) | some(some(n))}` encoding for a
/// bounded repeat, spelled out as a three-variant enum instead of a nested
/// `Option<Option<u32>>` so the compiler rules in §4.2 read directly off
/// the match arms.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RepeatMax {
    /// No upper bound was given at all: `{n}`, compiles like `max == min`.
    Exact,
    /// `{n,}`.
    Unbounded,
    /// `{n,m}`.
    Bounded(u32),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssertionKind {
    WordBoundary { invert: bool },
    LineBegin,
    LineEnd,
}

#[derive(Debug, Clone)]
pub enum Node {
    Disjunction(Vec<Node>),
    Sequence(Vec<Node>),
    Capture(Box<Node>, u32),
    NamedCapture(Box<Node>, String, u32),
    Group(Box<Node>),
    Star { non_greedy: bool, node: Box<Node> },
    Plus { non_greedy: bool, node: Box<Node> },
    Question { non_greedy: bool, node: Box<Node> },
    Repeat { min: u32, max: RepeatMax, non_greedy: bool, node: Box<Node> },
    Assertion(AssertionKind),
    LookAhead { invert: bool, node: Box<Node> },
    LookBehind { invert: bool, node: Box<Node> },
    /// A single literal character, already case-canonicalized by
    /// [`from_hir`] if the pattern is case-insensitive.
    Character(IChar),
    /// `invert` is `true` for `[^...]`; `items` is the union of the class
    /// members *before* inversion (inversion happens against the
    /// alphabet at ε-NFA compile time, per §4.2, since it needs the full
    /// refined alphabet to compute a complement).
    CharacterClass { invert: bool, items: Vec<IChar> },
    SimpleEscapeClass(IChar),
    UnicodeClass { invert: bool, items: Vec<IChar> },
    Dot,
    BackReference(u32),
    NamedBackReference(String),
}

/// The `g,i,m,s,u,y` flags of `spec.md` §3.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FlagSet {
    pub global: bool,
    pub ignore_case: bool,
    pub multiline: bool,
    pub dot_all: bool,
    pub unicode: bool,
    pub sticky: bool,
}

#[derive(Debug, Clone)]
pub struct Pattern {
    pub node: Node,
    pub flags: FlagSet,
}

impl Pattern {
    /// No unbounded repetition anywhere in the tree — `Star`/`Plus`
    /// trivially count (their bodies could still be empty matches, but
    /// their multiplicity is unbounded regardless), as does any
    /// `Repeat` whose `max` is `Unbounded` or `Bounded` but only if `min
    /// != max` the pattern can still repeat a variable number of times.
    /// A `Repeat` with `max == Exact` is constant-width, same as its
    /// body repeated `min` times.
    pub fn is_constant(&self) -> bool {
        fn rec(n: &Node) -> bool {
            match n {
                Node::Disjunction(ns) | Node::Sequence(ns) => ns.iter().all(rec),
                Node::Capture(n, _) | Node::NamedCapture(n, _, _) | Node::Group(n) => rec(n),
                Node::Star { .. } | Node::Plus { .. } => false,
                Node::Question { node, .. } => rec(node),
                Node::Repeat { max, node, .. } => matches!(max, RepeatMax::Exact) && rec(node),
                Node::Assertion(_)
                | Node::Character(_)
                | Node::CharacterClass { .. }
                | Node::SimpleEscapeClass(_)
                | Node::UnicodeClass { .. }
                | Node::Dot
                | Node::BackReference(_)
                | Node::NamedBackReference(_) => true,
                Node::LookAhead { node, .. } | Node::LookBehind { node, .. } => rec(node),
            }
        }
        rec(&self.node)
    }

    /// Whether the very first thing the pattern can match is a `^`
    /// assertion, used by the ε-NFA compiler to decide whether the start
    /// needs an implicit `.*?`-style self loop (§4.2 "Unanchored
    /// wrapping").
    pub fn has_line_begin_at_begin(&self) -> bool {
        fn rec(n: &Node) -> bool {
            match n {
                Node::Assertion(AssertionKind::LineBegin) => true,
                Node::Sequence(ns) => ns.first().map(rec).unwrap_or(false),
                Node::Disjunction(ns) => !ns.is_empty() && ns.iter().all(rec),
                Node::Capture(n, _) | Node::NamedCapture(n, _, _) | Node::Group(n) => rec(n),
                _ => false,
            }
        }
        rec(&self.node)
    }

    pub fn has_line_end_at_end(&self) -> bool {
        fn rec(n: &Node) -> bool {
            match n {
                Node::Assertion(AssertionKind::LineEnd) => true,
                Node::Sequence(ns) => ns.last().map(rec).unwrap_or(false),
                Node::Disjunction(ns) => !ns.is_empty() && ns.iter().all(rec),
                Node::Capture(n, _) | Node::NamedCapture(n, _, _) | Node::Group(n) => rec(n),
                _ => false,
            }
        }
        rec(&self.node)
    }

    /// Number of AST nodes, used by `Hybrid`'s `maxPatternSize` cutoff.
    pub fn size(&self) -> usize {
        fn rec(n: &Node) -> usize {
            1 + match n {
                Node::Disjunction(ns) | Node::Sequence(ns) => ns.iter().map(rec).sum(),
                Node::Capture(n, _) | Node::NamedCapture(n, _, _) | Node::Group(n) => rec(n),
                Node::Star { node, .. }
                | Node::Plus { node, .. }
                | Node::Question { node, .. }
                | Node::Repeat { node, .. }
                | Node::LookAhead { node, .. }
                | Node::LookBehind { node, .. } => rec(node),
                _ => 0,
            }
        }
        rec(&self.node)
    }

    /// Number of repetition quantifiers (`*`, `+`, `?`, `{m,n}`), used by
    /// `Hybrid`'s `maxRepeatCount` cutoff.
    pub fn repeat_count(&self) -> usize {
        fn rec(n: &Node) -> usize {
            match n {
                Node::Disjunction(ns) | Node::Sequence(ns) => ns.iter().map(rec).sum(),
                Node::Capture(n, _) | Node::NamedCapture(n, _, _) | Node::Group(n) => rec(n),
                Node::Star { node, .. } | Node::Plus { node, .. } | Node::Question { node, .. } => {
                    1 + rec(node)
                }
                Node::Repeat { node, .. } => 1 + rec(node),
                Node::LookAhead { node, .. } | Node::LookBehind { node, .. } => rec(node),
                _ => 0,
            }
        }
        rec(&self.node)
    }
}
