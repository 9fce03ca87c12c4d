//! The ε-NFA compiler of `spec.md` §4.2: turns a [`crate::ast::Pattern`]
//! into an ε-NFA whose states carry one of three transition kinds —
//! an ordered epsilon priority list, a zero-width assertion, or a
//! width-one consume over a set of alphabet atoms.
//!
//! Construction follows the classic per-node fragment style (compile a
//! node into a `(start, end)` pair of fresh states, leave `end` without a
//! transition until whoever embeds the fragment wires it up) — the same
//! shape as
//! `other_examples/bc581468_BurntSushi-rsc-regexp__idiomatic-translation-nfa.rs.rs`'s
//! `StateID`-indexed arena, adapted to this crate's three-way transition
//! sum type instead of a single-symbol Thompson NFA.

use reguard_chars::{ICharSet, IChar, IntervalSet, MAX_BMP, MAX_UNICODE};

use crate::ast::{AssertionKind, FlagSet, Node, Pattern, RepeatMax};
use crate::error::{Checker, Error};
use crate::timeout::Timeout;

/// One state's outgoing behavior. `None` (absence from the arena slot)
/// means the state has no outgoing transition — true of the accept state,
/// and transiently true of every fragment's `end` state until its parent
/// wires it to whatever follows.
#[derive(Debug, Clone)]
pub enum Transition {
    Eps(Vec<usize>),
    Assert(AssertionKind, usize),
    Consume(Vec<usize>, usize),
}

#[derive(Debug, Clone)]
pub struct EpsilonNfa {
    pub alphabet: ICharSet,
    pub transitions: Vec<Option<Transition>>,
    pub init: usize,
    pub accept: usize,
}

impl EpsilonNfa {
    pub fn state_count(&self) -> usize {
        self.transitions.len()
    }
}

#[derive(Debug, Clone, Copy)]
struct Frag {
    start: usize,
    end: usize,
}

struct Builder {
    transitions: Vec<Option<Transition>>,
}

impl Builder {
    fn new() -> Self {
        Builder { transitions: Vec::new() }
    }

    fn alloc(&mut self) -> usize {
        self.transitions.push(None);
        self.transitions.len() - 1
    }

    fn set(&mut self, state: usize, transition: Transition) {
        debug_assert!(self.transitions[state].is_none(), "state {state} assigned twice");
        self.transitions[state] = Some(transition);
    }
}

/// Builds the alphabet refinement a pattern's atoms need, independent of
/// compiling the rest of the ε-NFA. Shared with [`crate::ir`], which
/// compiles the same [`Pattern`] to VM bytecode and needs its `Read`
/// instructions to agree with the automaton path on exactly which atoms a
/// character class resolves to.
pub(crate) fn build_alphabet(pattern: &Pattern) -> ICharSet {
    let mut alphabet = ICharSet::new();
    collect_alphabet(&pattern.node, &pattern.flags, &mut alphabet);
    alphabet
}

pub fn compile(pattern: &Pattern, timeout: &Timeout) -> Result<EpsilonNfa, Error> {
    let alphabet = build_alphabet(pattern);

    let mut builder = Builder::new();
    let body = compile_node(&mut builder, &alphabet, &pattern.node, &pattern.flags, timeout)?;

    let (init, accept) = wrap_unanchored(&mut builder, &alphabet, pattern, body);

    Ok(EpsilonNfa { alphabet, transitions: builder.transitions, init, accept })
}

/// "If the pattern does not begin with `^`, wrap the initial with a
/// self-loop over the full alphabet... If it does not end with `$`, wrap
/// the accept similarly." Implements unanchored (substring) search on top
/// of the otherwise fully-anchored compiled body.
fn wrap_unanchored(
    builder: &mut Builder,
    alphabet: &ICharSet,
    pattern: &Pattern,
    body: Frag,
) -> (usize, usize) {
    let full: Vec<usize> = (0..alphabet.len()).collect();

    let start = if pattern.has_line_begin_at_begin() {
        body.start
    } else {
        // `.*?`-style prefix: at `loop_state`, try the body first (non-greedy
        // preference for "stop consuming as soon as the body can start"),
        // falling back to consuming one symbol and retrying.
        let loop_state = builder.alloc();
        let consume_state = builder.alloc();
        builder.set(consume_state, Transition::Consume(full.clone(), loop_state));
        builder.set(loop_state, Transition::Eps(vec![body.start, consume_state]));
        loop_state
    };

    let accept = if pattern.has_line_end_at_end() {
        body.end
    } else {
        let accept_state = builder.alloc();
        let consume_state = builder.alloc();
        builder.set(consume_state, Transition::Consume(full, accept_state));
        builder.set(body.end, Transition::Eps(vec![accept_state, consume_state]));
        accept_state
    };

    (start, accept)
}

fn collect_alphabet(node: &Node, flags: &FlagSet, alphabet: &mut ICharSet) {
    if let Some((ch, _)) = atom_ichar(node, flags.unicode) {
        let ch = if flags.ignore_case { ch.canonicalize() } else { ch };
        alphabet.add(&ch);
        return;
    }
    for_each_child(node, |n| collect_alphabet(n, flags, alphabet));
}

fn for_each_child(node: &Node, mut f: impl FnMut(&Node)) {
    match node {
        Node::Disjunction(ns) | Node::Sequence(ns) => ns.iter().for_each(f),
        Node::Capture(n, _) | Node::NamedCapture(n, _, _) | Node::Group(n) => f(n),
        Node::Star { node, .. }
        | Node::Plus { node, .. }
        | Node::Question { node, .. }
        | Node::Repeat { node, .. }
        | Node::LookAhead { node, .. }
        | Node::LookBehind { node, .. } => f(node),
        Node::Assertion(_)
        | Node::Character(_)
        | Node::CharacterClass { .. }
        | Node::SimpleEscapeClass(_)
        | Node::UnicodeClass { .. }
        | Node::Dot
        | Node::BackReference(_)
        | Node::NamedBackReference(_) => {}
    }
}

pub(crate) fn atom_ichar(node: &Node, unicode: bool) -> Option<(IChar, bool)> {
    match node {
        Node::Character(c) => Some((c.clone(), false)),
        Node::SimpleEscapeClass(c) => Some((c.clone(), false)),
        Node::CharacterClass { invert, items } | Node::UnicodeClass { invert, items } => {
            let ch = items.iter().fold(IChar::default(), |acc, c| acc.union(c));
            Some((ch, *invert))
        }
        Node::Dot => Some((dot_ichar(unicode), false)),
        _ => None,
    }
}

pub(crate) fn dot_ichar(unicode: bool) -> IChar {
    let bound = if unicode { MAX_UNICODE } else { MAX_BMP };
    let line_terminators = IntervalSet::from_ranges(vec![
        (0x0A, 0x0B),
        (0x0D, 0x0E),
        (0x2028, 0x2029),
        (0x2029, 0x202A),
    ]);
    let everything = IntervalSet::from_ranges(vec![(0, bound)]);
    IChar::with_flags(everything.difference(&line_terminators), false, false)
}

fn compile_node(
    builder: &mut Builder,
    alphabet: &ICharSet,
    node: &Node,
    flags: &FlagSet,
    timeout: &Timeout,
) -> Result<Frag, Error> {
    timeout.check("enfa::compile_node", Checker::Automaton)?;
    match node {
        Node::Sequence(ns) => compile_sequence(builder, alphabet, ns, flags, timeout),
        Node::Disjunction(ns) => compile_disjunction(builder, alphabet, ns, flags, timeout),
        Node::Capture(n, _) | Node::NamedCapture(n, _, _) | Node::Group(n) => {
            compile_node(builder, alphabet, n, flags, timeout)
        }
        Node::Star { non_greedy, node } => {
            let body = compile_node(builder, alphabet, node, flags, timeout)?;
            Ok(wrap_star(builder, *non_greedy, body))
        }
        Node::Plus { non_greedy, node } => {
            let body = compile_node(builder, alphabet, node, flags, timeout)?;
            Ok(wrap_plus(builder, *non_greedy, body))
        }
        Node::Question { non_greedy, node } => {
            let body = compile_node(builder, alphabet, node, flags, timeout)?;
            Ok(wrap_question(builder, *non_greedy, body))
        }
        Node::Repeat { min, max, non_greedy, node } => {
            compile_repeat(builder, alphabet, *min, *max, *non_greedy, node, flags, timeout)
        }
        Node::Assertion(kind) => {
            let start = builder.alloc();
            let end = builder.alloc();
            builder.set(start, Transition::Assert(*kind, end));
            Ok(Frag { start, end })
        }
        Node::LookAhead { .. } => {
            Err(Error::Unsupported("look-ahead assertion".to_string(), Checker::Automaton))
        }
        Node::LookBehind { .. } => {
            Err(Error::Unsupported("look-behind assertion".to_string(), Checker::Automaton))
        }
        Node::BackReference(_) | Node::NamedBackReference(_) => {
            Err(Error::Unsupported("back-reference".to_string(), Checker::Automaton))
        }
        Node::Character(_)
        | Node::CharacterClass { .. }
        | Node::SimpleEscapeClass(_)
        | Node::UnicodeClass { .. }
        | Node::Dot => compile_atom(builder, alphabet, node, flags),
    }
}

fn compile_atom(
    builder: &mut Builder,
    alphabet: &ICharSet,
    node: &Node,
    flags: &FlagSet,
) -> Result<Frag, Error> {
    let (ch, invert) =
        atom_ichar(node, flags.unicode).expect("compile_atom called on a non-atom node");
    let ch = if flags.ignore_case { ch.canonicalize() } else { ch };
    let atoms = if invert {
        let refined = alphabet.refine(&ch);
        (0..alphabet.len()).filter(|i| !refined.contains(i)).collect()
    } else {
        alphabet.refine(&ch)
    };
    let start = builder.alloc();
    let end = builder.alloc();
    builder.set(start, Transition::Consume(atoms, end));
    Ok(Frag { start, end })
}

fn compile_sequence(
    builder: &mut Builder,
    alphabet: &ICharSet,
    ns: &[Node],
    flags: &FlagSet,
    timeout: &Timeout,
) -> Result<Frag, Error> {
    if ns.is_empty() {
        let s = builder.alloc();
        return Ok(Frag { start: s, end: s });
    }
    let mut frags = Vec::with_capacity(ns.len());
    for n in ns {
        frags.push(compile_node(builder, alphabet, n, flags, timeout)?);
    }
    Ok(link_sequence(builder, frags))
}

fn link_sequence(builder: &mut Builder, frags: Vec<Frag>) -> Frag {
    let mut iter = frags.into_iter();
    let mut acc = iter.next().expect("link_sequence called with no fragments");
    for next in iter {
        acc = concat(builder, acc, next);
    }
    acc
}

fn concat(builder: &mut Builder, a: Frag, b: Frag) -> Frag {
    builder.set(a.end, Transition::Eps(vec![b.start]));
    Frag { start: a.start, end: b.end }
}

fn compile_disjunction(
    builder: &mut Builder,
    alphabet: &ICharSet,
    ns: &[Node],
    flags: &FlagSet,
    timeout: &Timeout,
) -> Result<Frag, Error> {
    let start = builder.alloc();
    let end = builder.alloc();
    let mut branch_starts = Vec::with_capacity(ns.len());
    for n in ns {
        let frag = compile_node(builder, alphabet, n, flags, timeout)?;
        builder.set(frag.end, Transition::Eps(vec![end]));
        branch_starts.push(frag.start);
    }
    builder.set(start, Transition::Eps(branch_starts));
    Ok(Frag { start, end })
}

fn wrap_star(builder: &mut Builder, non_greedy: bool, body: Frag) -> Frag {
    let i = builder.alloc();
    let a = builder.alloc();
    let order = if non_greedy { vec![a, body.start] } else { vec![body.start, a] };
    builder.set(i, Transition::Eps(order));
    builder.set(body.end, Transition::Eps(vec![i]));
    Frag { start: i, end: a }
}

fn wrap_plus(builder: &mut Builder, non_greedy: bool, body: Frag) -> Frag {
    let a = builder.alloc();
    let order = if non_greedy { vec![a, body.start] } else { vec![body.start, a] };
    builder.set(body.end, Transition::Eps(order));
    Frag { start: body.start, end: a }
}

fn wrap_question(builder: &mut Builder, non_greedy: bool, body: Frag) -> Frag {
    let i = builder.alloc();
    let a = builder.alloc();
    let order = if non_greedy { vec![a, body.start] } else { vec![body.start, a] };
    builder.set(i, Transition::Eps(order));
    builder.set(body.end, Transition::Eps(vec![a]));
    Frag { start: i, end: a }
}

#[allow(clippy::too_many_arguments)]
fn compile_repeat(
    builder: &mut Builder,
    alphabet: &ICharSet,
    min: u32,
    max: RepeatMax,
    non_greedy: bool,
    node: &Node,
    flags: &FlagSet,
    timeout: &Timeout,
) -> Result<Frag, Error> {
    if let RepeatMax::Bounded(k) = max {
        if k < min {
            return Err(Error::InvalidRegExp("out of order repetition quantifier".to_string()));
        }
    }

    let mut copies = Vec::with_capacity(min as usize);
    for _ in 0..min {
        copies.push(compile_node(builder, alphabet, node, flags, timeout)?);
    }
    let head = if copies.is_empty() {
        let s = builder.alloc();
        Frag { start: s, end: s }
    } else {
        link_sequence(builder, copies)
    };

    match max {
        RepeatMax::Exact => Ok(head),
        RepeatMax::Bounded(k) if k == min => Ok(head),
        RepeatMax::Unbounded => {
            let body = compile_node(builder, alphabet, node, flags, timeout)?;
            let tail = wrap_star(builder, non_greedy, body);
            Ok(concat(builder, head, tail))
        }
        RepeatMax::Bounded(k) => {
            let tail = compile_optional_chain(builder, alphabet, node, non_greedy, flags, k - min, timeout)?;
            Ok(concat(builder, head, tail))
        }
    }
}

/// The "right-folded `Question(non-greedy, n)` chain of length `k − min`":
/// `node{0,j}` expands as `node(node(...node()?...)?)?`, `j` levels deep.
#[allow(clippy::too_many_arguments)]
fn compile_optional_chain(
    builder: &mut Builder,
    alphabet: &ICharSet,
    node: &Node,
    non_greedy: bool,
    flags: &FlagSet,
    remaining: u32,
    timeout: &Timeout,
) -> Result<Frag, Error> {
    if remaining == 0 {
        let s = builder.alloc();
        return Ok(Frag { start: s, end: s });
    }
    let body = compile_node(builder, alphabet, node, flags, timeout)?;
    let rest = compile_optional_chain(builder, alphabet, node, non_greedy, flags, remaining - 1, timeout)?;
    let seq = concat(builder, body, rest);
    Ok(wrap_question(builder, non_greedy, seq))
}

#[cfg(test)]
mod tests {
    use super::*;
    use reguard_chars::UChar;

    fn timeout() -> Timeout {
        Timeout::NO_TIMEOUT
    }

    fn ch(c: char) -> Node {
        Node::Character(IChar::single(c as UChar))
    }

    fn pattern(node: Node, flags: FlagSet) -> Pattern {
        Pattern { node, flags }
    }

    #[test]
    fn literal_sequence_has_no_branching() {
        let p = pattern(
            Node::Sequence(vec![ch('a'), ch('b')]),
            FlagSet { global: false, ignore_case: false, multiline: false, dot_all: false, unicode: true, sticky: false },
        );
        let nfa = compile(&p, &timeout()).unwrap();
        assert!(nfa.state_count() > 0);
    }

    #[test]
    fn lookahead_is_unsupported() {
        let p = pattern(
            Node::LookAhead { invert: false, node: Box::new(ch('a')) },
            FlagSet::default(),
        );
        let err = compile(&p, &timeout()).unwrap_err();
        assert!(matches!(err, Error::Unsupported(ref m, _) if m == "look-ahead assertion"));
    }

    #[test]
    fn backreference_is_unsupported() {
        let p = pattern(Node::BackReference(1), FlagSet::default());
        let err = compile(&p, &timeout()).unwrap_err();
        assert!(matches!(err, Error::Unsupported(ref m, _) if m == "back-reference"));
    }

    #[test]
    fn out_of_order_repeat_is_invalid() {
        let p = pattern(
            Node::Repeat { min: 5, max: RepeatMax::Bounded(3), non_greedy: false, node: Box::new(ch('a')) },
            FlagSet::default(),
        );
        let err = compile(&p, &timeout()).unwrap_err();
        assert!(matches!(err, Error::InvalidRegExp(_)));
    }

    #[test]
    fn anchored_pattern_has_no_self_loop_wrapping() {
        let p = pattern(
            Node::Sequence(vec![Node::Assertion(AssertionKind::LineBegin), ch('a'), Node::Assertion(AssertionKind::LineEnd)]),
            FlagSet::default(),
        );
        let nfa = compile(&p, &timeout()).unwrap();
        // init should be the assertion's own start state, not a freshly
        // allocated self-loop state.
        assert!(matches!(nfa.transitions[nfa.init], Some(Transition::Assert(AssertionKind::LineBegin, _))));
    }

    #[test]
    fn unanchored_pattern_gets_self_loop() {
        let p = pattern(Node::Sequence(vec![ch('a')]), FlagSet::default());
        let nfa = compile(&p, &timeout()).unwrap();
        assert!(matches!(nfa.transitions[nfa.init], Some(Transition::Eps(_))));
    }
}
