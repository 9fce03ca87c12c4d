//! The IR of `spec.md` §4.5: a linear bytecode a backtracking VM
//! interprets under canonical ECMA-262 backtracking semantics. This is the
//! *second* compilation target for a [`Pattern`](crate::ast::Pattern) —
//! alongside the [`crate::enfa`]/[`crate::nfa`] path the automaton checker
//! uses — because the automaton path reasons about structure only, while
//! the fuzz checker (`crate::fuzz`) needs to actually run candidate
//! strings and measure how many steps they cost.
//!
//! Compilation follows the same per-node fragment shape as `enfa`
//! (compile a node, get back an entry point, the caller wires up what
//! follows) but emits into a flat `Vec<Inst>` addressed by index rather
//! than an ε-NFA state arena, since a VM needs a program counter to step
//! through, not a graph to traverse.
//!
//! Two simplifications from the full instruction set §4.5 names, recorded
//! here rather than scattered as magic: `tx` (a fused consume-then-branch
//! op) is not emitted as its own opcode — `Read` already consumes and
//! falls through to `pc+1` on success or an implicit rollback on failure,
//! which is the same behavior `tx` describes, so a dedicated terminator
//! would just be an alias. And bounded `{m,n}` repeats use `reset`/`inc`/
//! `cmp` registers rather than `enfa`'s static unrolling: `enfa`'s ordered
//! NFA is already capped by `maxNFASize`, so unrolling a large bound there
//! is self-limiting, but the VM has no such cap and a `{0,10000}` unrolled
//! naively would blow up code size for no benefit — registers are the
//! right tool here specifically because the VM's size budget is input
//! size, not state count.

use std::collections::HashMap;

use reguard_chars::{ICharSet, IntervalSet, UChar};

use crate::ast::{AssertionKind, FlagSet, Node, Pattern, RepeatMax};
use crate::enfa::atom_ichar;

/// A width-one character test: does the input code point at the VM's
/// current position fall in this interval set. Built once at compile time
/// from the same atom-resolution rules `enfa::compile_atom` uses
/// (case-canonicalization, class inversion against the full BMP/Unicode
/// range), so a literal `a` and the automaton path's `Consume` transition
/// agree on exactly which characters match.
#[derive(Debug, Clone)]
pub struct CharTest(pub IntervalSet);

impl CharTest {
    pub fn matches(&self, c: UChar) -> bool {
        self.0.contains(c)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CmpTarget {
    Lt(usize),
    Ge(usize),
}

/// One bytecode instruction. Terminators (`Ok`, `Jmp`, `Try`, `Cmp`,
/// `Rollback`) always decide the next `pc` explicitly; non-terminators
/// fall through to `pc + 1` on success and trigger an implicit rollback
/// (pop the backtrack stack, same as the `Rollback` terminator) on
/// failure — this is a flattened encoding of the basic-block structure
/// §4.5 describes, where every non-terminator's "else" edge is always
/// "give up and backtrack".
#[derive(Debug, Clone)]
pub enum Inst {
    // terminators
    Ok,
    Jmp(usize),
    /// Push a choice point resuming at `fallback` (with the VM state as
    /// of right now), then jump to `preferred`. Encodes backtracking
    /// priority: `preferred` is tried first.
    Try { preferred: usize, fallback: usize },
    Cmp { reg: usize, n: u32, lt: usize, ge: usize },
    Rollback,

    // non-terminators
    /// Marks a loop-body entry for the empty-match guard: records the
    /// current input position so a later `CheckCanary` can detect "this
    /// iteration consumed nothing".
    PushCanary,
    /// Fails (triggers rollback) if the input position hasn't advanced
    /// since the matching `PushCanary` — the guard against `(a*)*`-style
    /// infinite empty loops a backtracking engine must apply.
    CheckCanary,
    ResetReg(usize),
    IncReg(usize),
    Assert(AssertKind),
    Read(CharTest),
    /// Back-reference to capture group `usize`: matches the captured text
    /// literally. An unmatched group (never entered on this path) matches
    /// the empty string, per ECMA-262.
    ReadBack(usize),
    CapBegin(usize),
    CapEnd(usize),
    /// Clears capture slots `[from, to)`, used when re-entering a
    /// quantified group so a later backtrack into an earlier iteration
    /// doesn't see a subsequent iteration's captures.
    CapReset(usize, usize),
}

/// A zero-width assertion, extended beyond [`AssertionKind`] with the two
/// constructs the automaton path can't model at all (§4.2): lookaround,
/// compiled here as a fully nested sub-[`Program`] the VM runs a bounded
/// backtracking search over without consuming the outer position.
#[derive(Debug, Clone)]
pub enum VmAssertKind {
    Plain(AssertionKind),
    LookAhead { invert: bool, sub: usize },
    LookBehind { invert: bool, sub: usize },
}

pub use VmAssertKind as AssertKind;

/// A compiled pattern: the flat instruction list plus the register/capture
/// bookkeeping the compiler assigned, and any lookaround bodies compiled
/// as their own nested programs.
#[derive(Debug, Clone)]
pub struct Program {
    pub insts: Vec<Inst>,
    pub register_count: usize,
    pub capture_count: usize,
    pub capture_names: HashMap<String, u32>,
    pub subprograms: Vec<Program>,
    pub multiline: bool,
    pub unicode: bool,
}

struct Compiler {
    insts: Vec<Inst>,
    register_count: usize,
    capture_count: usize,
    capture_names: HashMap<String, u32>,
    subprograms: Vec<Program>,
    alphabet: ICharSet,
    flags: FlagSet,
}

impl Compiler {
    fn emit(&mut self, inst: Inst) -> usize {
        self.insts.push(inst);
        self.insts.len() - 1
    }

    fn patch(&mut self, at: usize, inst: Inst) {
        self.insts[at] = inst;
    }

    fn alloc_register(&mut self) -> usize {
        let id = self.register_count;
        self.register_count += 1;
        id
    }

    fn char_test(&self, node: &Node) -> CharTest {
        let (ch, invert) =
            atom_ichar(node, self.flags.unicode).expect("char_test called on a non-atom node");
        let ch = if self.flags.ignore_case { ch.canonicalize() } else { ch };
        let ranges = self.alphabet.refine(&ch).into_iter().fold(IntervalSet::empty(), |acc, i| {
            acc.union(self.alphabet.members()[i].ranges())
        });
        let ranges = if invert {
            let bound = if self.flags.unicode { reguard_chars::MAX_UNICODE } else { reguard_chars::MAX_BMP };
            ch.ranges().complement(bound)
        } else {
            ranges
        };
        CharTest(ranges)
    }

    /// Compiles `node`, returning the pc it starts at. Since this is a
    /// flat instruction stream rather than a graph, "where it ends" is
    /// always just "wherever `self.insts.len()` is after the call" — no
    /// separate end-state bookkeeping is needed the way `enfa::Frag`
    /// needs one.
    fn compile_node(&mut self, node: &Node) -> usize {
        let entry = self.insts.len();
        match node {
            Node::Sequence(ns) => {
                for n in ns {
                    self.compile_node(n);
                }
            }
            Node::Disjunction(ns) => self.compile_disjunction(ns),
            Node::Capture(n, idx) => self.compile_capture(n, *idx, None),
            Node::NamedCapture(n, name, idx) => self.compile_capture(n, *idx, Some(name)),
            Node::Group(n) => {
                self.compile_node(n);
            }
            Node::Star { non_greedy, node } => self.compile_star(node, *non_greedy),
            Node::Plus { non_greedy, node } => {
                self.compile_node(node);
                self.compile_star(node, *non_greedy);
            }
            Node::Question { non_greedy, node } => self.compile_question(node, *non_greedy),
            Node::Repeat { min, max, non_greedy, node } => {
                self.compile_repeat(*min, *max, *non_greedy, node)
            }
            Node::Assertion(kind) => {
                self.emit(Inst::Assert(AssertKind::Plain(*kind)));
            }
            Node::LookAhead { invert, node } => {
                let sub = self.compile_subprogram(node);
                self.emit(Inst::Assert(AssertKind::LookAhead { invert: *invert, sub }));
            }
            Node::LookBehind { invert, node } => {
                let sub = self.compile_subprogram(node);
                self.emit(Inst::Assert(AssertKind::LookBehind { invert: *invert, sub }));
            }
            Node::Character(_)
            | Node::CharacterClass { .. }
            | Node::SimpleEscapeClass(_)
            | Node::UnicodeClass { .. }
            | Node::Dot => {
                let test = self.char_test(node);
                self.emit(Inst::Read(test));
            }
            Node::BackReference(idx) => {
                self.emit(Inst::ReadBack(*idx as usize));
            }
            Node::NamedBackReference(name) => {
                let idx = *self.capture_names.get(name).unwrap_or(&0) as usize;
                self.emit(Inst::ReadBack(idx));
            }
        }
        entry
    }

    fn compile_capture(&mut self, node: &Node, idx: u32, name: Option<&str>) {
        self.capture_count = self.capture_count.max(idx as usize + 1);
        if let Some(name) = name {
            self.capture_names.insert(name.to_string(), idx);
        }
        self.emit(Inst::CapBegin(idx as usize));
        self.compile_node(node);
        self.emit(Inst::CapEnd(idx as usize));
    }

    /// A nested sub-program for a lookaround body: compiled as its own
    /// self-contained `Program` (own register/capture namespace layered
    /// on top of the outer one's capture slots, since ECMA lookaheads can
    /// still capture into the outer match) so the VM can run a bounded
    /// "does this reach `Ok`" search over it without touching the outer
    /// instruction stream's `pc`.
    fn compile_subprogram(&mut self, node: &Node) -> usize {
        let mut sub = Compiler {
            insts: Vec::new(),
            register_count: 0,
            capture_count: self.capture_count,
            capture_names: self.capture_names.clone(),
            subprograms: Vec::new(),
            alphabet: self.alphabet.clone(),
            flags: self.flags,
        };
        sub.compile_node(node);
        sub.emit(Inst::Ok);
        self.capture_count = self.capture_count.max(sub.capture_count);
        for (name, idx) in &sub.capture_names {
            self.capture_names.entry(name.clone()).or_insert(*idx);
        }
        self.subprograms.push(Program {
            insts: sub.insts,
            register_count: sub.register_count,
            capture_count: sub.capture_count,
            capture_names: sub.capture_names,
            subprograms: sub.subprograms,
            multiline: self.flags.multiline,
            unicode: self.flags.unicode,
        });
        self.subprograms.len() - 1
    }

    fn compile_disjunction(&mut self, ns: &[Node]) {
        if ns.is_empty() {
            return;
        }
        let mut end_jumps = Vec::new();
        for (i, n) in ns.iter().enumerate() {
            let is_last = i == ns.len() - 1;
            if is_last {
                self.compile_node(n);
            } else {
                let try_pc = self.emit(Inst::Try { preferred: 0, fallback: 0 });
                let branch_pc = self.insts.len();
                self.compile_node(n);
                end_jumps.push(self.emit(Inst::Jmp(0)));
                let next_branch = self.insts.len();
                self.patch(try_pc, Inst::Try { preferred: branch_pc, fallback: next_branch });
            }
        }
        let end = self.insts.len();
        for pc in end_jumps {
            self.patch(pc, Inst::Jmp(end));
        }
    }

    /// `(body)*`, guarded against infinite empty-match looping via a
    /// canary pushed at every loop-body entry.
    fn compile_star(&mut self, node: &Node, non_greedy: bool) {
        let loop_pc = self.emit(Inst::Try { preferred: 0, fallback: 0 });
        let body_pc = self.insts.len();
        self.emit(Inst::PushCanary);
        self.compile_node(node);
        self.emit(Inst::CheckCanary);
        self.emit(Inst::Jmp(loop_pc));
        let exit_pc = self.insts.len();
        let (preferred, fallback) = if non_greedy { (exit_pc, body_pc) } else { (body_pc, exit_pc) };
        self.patch(loop_pc, Inst::Try { preferred, fallback });
    }

    fn compile_question(&mut self, node: &Node, non_greedy: bool) {
        let try_pc = self.emit(Inst::Try { preferred: 0, fallback: 0 });
        let body_pc = self.insts.len();
        self.compile_node(node);
        let end_pc = self.insts.len();
        let (preferred, fallback) = if non_greedy { (end_pc, body_pc) } else { (body_pc, end_pc) };
        self.patch(try_pc, Inst::Try { preferred, fallback });
    }

    /// `{min,max}`, register-counted rather than statically unrolled (see
    /// module docs): first force exactly `min` iterations via a `cmp`
    /// loop, then continue up to `max` (or unboundedly, canary-guarded,
    /// for `{min,}`) through a second `cmp`-gated loop.
    fn compile_repeat(&mut self, min: u32, max: RepeatMax, non_greedy: bool, node: &Node) {
        let reg = self.alloc_register();
        self.emit(Inst::ResetReg(reg));

        let mandatory_loop = self.emit(Inst::Cmp { reg, n: min, lt: 0, ge: 0 });
        let mandatory_body = self.insts.len();
        self.compile_node(node);
        self.emit(Inst::IncReg(reg));
        self.emit(Inst::Jmp(mandatory_loop));
        let after_mandatory = self.insts.len();
        self.patch(mandatory_loop, Inst::Cmp { reg, n: min, lt: mandatory_body, ge: after_mandatory });

        match max {
            RepeatMax::Exact => {}
            RepeatMax::Bounded(k) if k == min => {}
            RepeatMax::Unbounded => self.compile_star(node, non_greedy),
            RepeatMax::Bounded(k) => {
                let check_pc = self.emit(Inst::Cmp { reg, n: k, lt: 0, ge: 0 });
                let try_pc = self.emit(Inst::Try { preferred: 0, fallback: 0 });
                let more_body = self.insts.len();
                self.compile_node(node);
                self.emit(Inst::IncReg(reg));
                self.emit(Inst::Jmp(check_pc));
                let end_pc = self.insts.len();
                self.patch(check_pc, Inst::Cmp { reg, n: k, lt: try_pc, ge: end_pc });
                let (preferred, fallback) =
                    if non_greedy { (end_pc, more_body) } else { (more_body, end_pc) };
                self.patch(try_pc, Inst::Try { preferred, fallback });
            }
        }
    }
}

/// Compiles `pattern` to VM bytecode. Unlike [`crate::enfa::compile`],
/// this never fails: lookaround and back-references, which the automaton
/// path rejects as `Unsupported`, are exactly the constructs the VM
/// exists to handle, since it evaluates them against a concrete input
/// rather than reasoning about them structurally.
pub fn compile(pattern: &Pattern, alphabet: ICharSet) -> Program {
    let mut compiler = Compiler {
        insts: Vec::new(),
        register_count: 0,
        capture_count: 0,
        capture_names: HashMap::new(),
        subprograms: Vec::new(),
        alphabet,
        flags: pattern.flags,
    };
    compiler.emit(Inst::CapBegin(0));
    compiler.compile_node(&pattern.node);
    compiler.emit(Inst::CapEnd(0));
    compiler.capture_count = compiler.capture_count.max(1);
    compiler.emit(Inst::Ok);
    Program {
        insts: compiler.insts,
        register_count: compiler.register_count,
        capture_count: compiler.capture_count,
        capture_names: compiler.capture_names,
        subprograms: compiler.subprograms,
        multiline: pattern.flags.multiline,
        unicode: pattern.flags.unicode,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{FlagSet, Pattern};
    use reguard_chars::{ICharSet, IChar};

    fn ch(c: char) -> Node {
        Node::Character(IChar::single(c as UChar))
    }

    fn alphabet_for(node: &Node) -> ICharSet {
        let mut alphabet = ICharSet::new();
        fn collect(node: &Node, alphabet: &mut ICharSet) {
            if let Some((ch, _)) = atom_ichar(node, true) {
                alphabet.add(&ch);
                return;
            }
            match node {
                Node::Sequence(ns) | Node::Disjunction(ns) => ns.iter().for_each(|n| collect(n, alphabet)),
                Node::Star { node, .. }
                | Node::Plus { node, .. }
                | Node::Question { node, .. }
                | Node::Repeat { node, .. }
                | Node::Capture(node, _)
                | Node::NamedCapture(node, _, _)
                | Node::Group(node)
                | Node::LookAhead { node, .. }
                | Node::LookBehind { node, .. } => collect(node, alphabet),
                _ => {}
            }
        }
        collect(node, &mut alphabet);
        alphabet
    }

    #[test]
    fn literal_sequence_compiles_one_read_per_char() {
        let node = Node::Sequence(vec![ch('a'), ch('b')]);
        let alphabet = alphabet_for(&node);
        let pattern = Pattern { node, flags: FlagSet::default() };
        let program = compile(&pattern, alphabet);
        let reads = program.insts.iter().filter(|i| matches!(i, Inst::Read(_))).count();
        assert_eq!(reads, 2);
    }

    #[test]
    fn star_emits_canary_guard() {
        let node = Node::Star { non_greedy: false, node: Box::new(ch('a')) };
        let alphabet = alphabet_for(&node);
        let pattern = Pattern { node, flags: FlagSet::default() };
        let program = compile(&pattern, alphabet);
        assert!(program.insts.iter().any(|i| matches!(i, Inst::PushCanary)));
        assert!(program.insts.iter().any(|i| matches!(i, Inst::CheckCanary)));
    }

    #[test]
    fn bounded_repeat_uses_a_register() {
        let node = Node::Repeat {
            min: 2,
            max: RepeatMax::Bounded(5),
            non_greedy: false,
            node: Box::new(ch('a')),
        };
        let alphabet = alphabet_for(&node);
        let pattern = Pattern { node, flags: FlagSet::default() };
        let program = compile(&pattern, alphabet);
        assert_eq!(program.register_count, 1);
        assert!(program.insts.iter().any(|i| matches!(i, Inst::Cmp { .. })));
    }

    #[test]
    fn lookahead_compiles_to_a_subprogram() {
        let node = Node::LookAhead { invert: false, node: Box::new(ch('a')) };
        let alphabet = alphabet_for(&node);
        let pattern = Pattern { node, flags: FlagSet::default() };
        let program = compile(&pattern, alphabet);
        assert_eq!(program.subprograms.len(), 1);
        assert!(program
            .insts
            .iter()
            .any(|i| matches!(i, Inst::Assert(AssertKind::LookAhead { sub: 0, .. }))));
    }
}
