//! The backtracking VM + tracer of `spec.md` §4.5: interprets the
//! [`crate::ir::Program`] bytecode under canonical ECMA-262 backtracking
//! semantics, observed by a [`Tracer`] at every instruction dispatch.
//!
//! `LimitException` (§4.5's name for "the step budget ran out") is not
//! modeled via unwinding — per §9's explicit design note for systems
//! languages — but as [`VmError::LimitExceeded`], a `Result` variant
//! `execute` and every recursive lookaround sub-match propagate with `?`.

use std::collections::HashSet;

use reguard_chars::UChar;

use crate::ast::AssertionKind;
use crate::ir::{AssertKind, Inst, Program};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VmError {
    LimitExceeded,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Forward,
    Backward,
}

/// Observes every instruction dispatch. `LimitTracer` only counts;
/// `FuzzTracer` additionally records the coverage/rate signals the fuzz
/// checker's genetic search uses as fitness.
pub trait Tracer {
    fn step(&mut self, pc: usize, stack_depth: usize, direction: Direction) -> Result<(), VmError>;
}

/// Counts steps, failing once `limit` is exceeded. Used for attack-string
/// validation: confirm a witness's expansion actually blows the budget
/// before reporting it.
pub struct LimitTracer {
    limit: u64,
    steps: u64,
}

impl LimitTracer {
    pub fn new(limit: u64) -> Self {
        LimitTracer { limit, steps: 0 }
    }

    pub fn steps(&self) -> u64 {
        self.steps
    }
}

impl Tracer for LimitTracer {
    fn step(&mut self, _pc: usize, _stack_depth: usize, _direction: Direction) -> Result<(), VmError> {
        self.steps += 1;
        if self.steps > self.limit {
            return Err(VmError::LimitExceeded);
        }
        Ok(())
    }
}

/// Counts steps like [`LimitTracer`] and additionally records coverage —
/// the set of `(pc, stack-shape digest, direction)` triples observed —
/// used by the fuzz checker's [`crate::fuzz::Population`] admission rule
/// to detect "this candidate exercises a backtracking path we haven't
/// seen yet" even when its rate isn't an improvement.
pub struct FuzzTracer {
    limit: u64,
    steps: u64,
    coverage: HashSet<(usize, u32, bool)>,
}

impl FuzzTracer {
    pub fn new(limit: u64) -> Self {
        FuzzTracer { limit, steps: 0, coverage: HashSet::new() }
    }

    pub fn steps(&self) -> u64 {
        self.steps
    }

    pub fn coverage(&self) -> &HashSet<(usize, u32, bool)> {
        &self.coverage
    }

    /// Steps per input length, clamped so a zero-length candidate doesn't
    /// divide by zero.
    pub fn rate(&self, input_len: usize) -> f64 {
        self.steps as f64 / input_len.max(1) as f64
    }
}

impl Tracer for FuzzTracer {
    fn step(&mut self, pc: usize, stack_depth: usize, direction: Direction) -> Result<(), VmError> {
        self.steps += 1;
        if self.steps > self.limit {
            return Err(VmError::LimitExceeded);
        }
        let bucket = (stack_depth as u32).min(64);
        self.coverage.insert((pc, bucket, direction == Direction::Backward));
        Ok(())
    }
}

/// A completed match: only the end position is kept. Full capture-span
/// reporting is an end-user matching concern `spec.md` §1 scopes out
/// (this crate asks "can matching be made slow", not "what did it
/// match"); back-references still need the internal start/end bookkeeping
/// to evaluate, so that part is kept, just not surfaced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Match {
    pub end: usize,
}

#[derive(Clone)]
struct Frame {
    pc: usize,
    sp: usize,
    captures: Vec<Option<(usize, usize)>>,
    open: Vec<Option<usize>>,
    registers: Vec<u32>,
    canary: Vec<usize>,
}

fn is_word_char(c: UChar) -> bool {
    matches!(c, 0x30..=0x39 | 0x41..=0x5A | 0x61..=0x7A) || c == b'_' as UChar
}

fn is_line_terminator(c: UChar) -> bool {
    matches!(c, 0x0A | 0x0D | 0x2028 | 0x2029)
}

/// Runs `program` starting at input position `start`. If `require_end` is
/// set, a reached `Ok` only counts as a match when it lands exactly at
/// that position — the lookbehind helper uses this to ask "does the
/// sub-pattern match ending exactly here" rather than "does it match at
/// all".
pub fn execute<T: Tracer>(
    program: &Program,
    input: &[UChar],
    start: usize,
    tracer: &mut T,
) -> Result<Option<Match>, VmError> {
    run(program, input, start, tracer, None)
}

/// `spec.md`'s unanchored ("match anywhere") search: tries `execute` at
/// every start position in turn, the same left-to-right preference a real
/// engine's `exec` loop uses. Stops at the first position that matches.
pub fn search<T: Tracer>(
    program: &Program,
    input: &[UChar],
    tracer: &mut T,
) -> Result<Option<Match>, VmError> {
    for start in 0..=input.len() {
        if let Some(m) = run(program, input, start, tracer, None)? {
            return Ok(Some(m));
        }
    }
    Ok(None)
}

fn run<T: Tracer>(
    program: &Program,
    input: &[UChar],
    start: usize,
    tracer: &mut T,
    require_end: Option<usize>,
) -> Result<Option<Match>, VmError> {
    let mut pc = 0usize;
    let mut sp = start;
    let mut captures: Vec<Option<(usize, usize)>> = vec![None; program.capture_count];
    let mut open: Vec<Option<usize>> = vec![None; program.capture_count];
    let mut registers: Vec<u32> = vec![0; program.register_count];
    let mut canary: Vec<usize> = Vec::new();
    let mut backtrack: Vec<Frame> = Vec::new();

    macro_rules! rollback {
        () => {
            match backtrack.pop() {
                Some(frame) => {
                    tracer.step(frame.pc, backtrack.len(), Direction::Backward)?;
                    pc = frame.pc;
                    sp = frame.sp;
                    captures = frame.captures;
                    open = frame.open;
                    registers = frame.registers;
                    canary = frame.canary;
                    continue;
                }
                None => return Ok(None),
            }
        };
    }

    loop {
        tracer.step(pc, backtrack.len(), Direction::Forward)?;
        match &program.insts[pc] {
            Inst::Ok => {
                if require_end.map_or(true, |end| end == sp) {
                    return Ok(Some(Match { end: sp }));
                }
                rollback!();
            }
            Inst::Jmp(target) => pc = *target,
            Inst::Try { preferred, fallback } => {
                backtrack.push(Frame {
                    pc: *fallback,
                    sp,
                    captures: captures.clone(),
                    open: open.clone(),
                    registers: registers.clone(),
                    canary: canary.clone(),
                });
                pc = *preferred;
            }
            Inst::Cmp { reg, n, lt, ge } => {
                pc = if registers[*reg] < *n { *lt } else { *ge };
            }
            Inst::Rollback => rollback!(),
            Inst::PushCanary => {
                canary.push(sp);
                pc += 1;
            }
            Inst::CheckCanary => {
                let entered_at = canary.pop().expect("CheckCanary always follows a PushCanary");
                if entered_at == sp {
                    rollback!();
                }
                pc += 1;
            }
            Inst::ResetReg(r) => {
                registers[*r] = 0;
                pc += 1;
            }
            Inst::IncReg(r) => {
                registers[*r] += 1;
                pc += 1;
            }
            Inst::Assert(kind) => {
                if eval_assert(kind, program, input, sp, tracer)? {
                    pc += 1;
                } else {
                    rollback!();
                }
            }
            Inst::Read(test) => {
                if sp < input.len() && test.matches(input[sp]) {
                    sp += 1;
                    pc += 1;
                } else {
                    rollback!();
                }
            }
            Inst::ReadBack(idx) => {
                let len = captures.get(*idx).and_then(|c| *c).map_or(0, |(s, e)| e - s);
                let group_start = captures.get(*idx).and_then(|c| *c).map_or(sp, |(s, _)| s);
                if sp + len <= input.len()
                    && (0..len).all(|i| input[sp + i] == input[group_start + i])
                {
                    sp += len;
                    pc += 1;
                } else {
                    rollback!();
                }
            }
            Inst::CapBegin(i) => {
                open[*i] = Some(sp);
                pc += 1;
            }
            Inst::CapEnd(i) => {
                let begin = open[*i].take().unwrap_or(sp);
                captures[*i] = Some((begin, sp));
                pc += 1;
            }
            Inst::CapReset(from, to) => {
                for i in *from..*to {
                    captures[i] = None;
                    open[i] = None;
                }
                pc += 1;
            }
        }
    }
}

fn eval_assert<T: Tracer>(
    kind: &AssertKind,
    program: &Program,
    input: &[UChar],
    sp: usize,
    tracer: &mut T,
) -> Result<bool, VmError> {
    match kind {
        AssertKind::Plain(AssertionKind::LineBegin) => {
            Ok(sp == 0 || (program.multiline && is_line_terminator(input[sp - 1])))
        }
        AssertKind::Plain(AssertionKind::LineEnd) => {
            Ok(sp == input.len() || (program.multiline && is_line_terminator(input[sp])))
        }
        AssertKind::Plain(AssertionKind::WordBoundary { invert }) => {
            let before = sp > 0 && is_word_char(input[sp - 1]);
            let after = sp < input.len() && is_word_char(input[sp]);
            Ok((before != after) != *invert)
        }
        AssertKind::LookAhead { invert, sub } => {
            let sub_program = &program.subprograms[*sub];
            let matched = run(sub_program, input, sp, tracer, None)?.is_some();
            Ok(matched != *invert)
        }
        AssertKind::LookBehind { invert, sub } => {
            let sub_program = &program.subprograms[*sub];
            let mut matched = false;
            for start in (0..=sp).rev() {
                if run(sub_program, input, start, tracer, Some(sp))?.is_some() {
                    matched = true;
                    break;
                }
            }
            Ok(matched != *invert)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{FlagSet, Node, Pattern};
    use crate::ir;
    use reguard_chars::{ICharSet, IChar};

    fn ch(c: char) -> Node {
        Node::Character(IChar::single(c as UChar))
    }

    fn alphabet_for(node: &Node) -> ICharSet {
        let mut alphabet = ICharSet::new();
        fn collect(node: &Node, alphabet: &mut ICharSet) {
            if let Some((ch, _)) = crate::enfa::atom_ichar(node, true) {
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

    fn compile(node: Node, flags: FlagSet) -> Program {
        let alphabet = alphabet_for(&node);
        let pattern = Pattern { node, flags };
        ir::compile(&pattern, alphabet)
    }

    fn input(s: &str) -> Vec<UChar> {
        s.chars().map(|c| c as UChar).collect()
    }

    #[test]
    fn literal_matches_at_start() {
        let program = compile(Node::Sequence(vec![ch('a'), ch('b')]), FlagSet::default());
        let mut tracer = LimitTracer::new(1_000);
        let result = execute(&program, &input("ab"), 0, &mut tracer).unwrap();
        assert_eq!(result, Some(Match { end: 2 }));
    }

    #[test]
    fn literal_fails_on_mismatch() {
        let program = compile(Node::Sequence(vec![ch('a'), ch('b')]), FlagSet::default());
        let mut tracer = LimitTracer::new(1_000);
        let result = execute(&program, &input("ac"), 0, &mut tracer).unwrap();
        assert_eq!(result, None);
    }

    #[test]
    fn star_is_greedy_then_backtracks() {
        // a*ab matched against "aaab" requires backtracking the star.
        let node = Node::Sequence(vec![
            Node::Star { non_greedy: false, node: Box::new(ch('a')) },
            ch('a'),
            ch('b'),
        ]);
        let program = compile(node, FlagSet::default());
        let mut tracer = LimitTracer::new(10_000);
        let result = execute(&program, &input("aaab"), 0, &mut tracer).unwrap();
        assert_eq!(result, Some(Match { end: 4 }));
    }

    #[test]
    fn nested_star_hits_the_step_limit_on_a_pump() {
        // (a*)*$ against a run of 'a' followed by one character it can
        // never consume: every way of splitting the run between the two
        // stars still fails the trailing `$`, so the VM must exhaust them
        // all before giving up. Without the anchor, the greedy path just
        // stops short of the mismatching tail and reports a cheap match —
        // the blow-up only happens when the overall match must fail.
        let node = Node::Sequence(vec![
            Node::Star {
                non_greedy: false,
                node: Box::new(Node::Star { non_greedy: false, node: Box::new(ch('a')) }),
            },
            Node::Assertion(AssertionKind::LineEnd),
        ]);
        let program = compile(node, FlagSet::default());
        let mut tracer = LimitTracer::new(50_000);
        let mut hay = input(&"a".repeat(30));
        hay.push('!' as UChar);
        let err = execute(&program, &hay, 0, &mut tracer);
        assert_eq!(err, Err(VmError::LimitExceeded));
    }

    #[test]
    fn backreference_matches_captured_text() {
        let node = Node::Sequence(vec![
            Node::Capture(Box::new(ch('a')), 1),
            Node::BackReference(1),
        ]);
        let program = compile(node, FlagSet::default());
        let mut tracer = LimitTracer::new(1_000);
        assert!(execute(&program, &input("aa"), 0, &mut tracer).unwrap().is_some());
        assert!(execute(&program, &input("ab"), 0, &mut tracer).unwrap().is_none());
    }

    #[test]
    fn lookahead_does_not_consume() {
        let node = Node::Sequence(vec![
            Node::LookAhead { invert: false, node: Box::new(ch('a')) },
            ch('a'),
        ]);
        let program = compile(node, FlagSet::default());
        let mut tracer = LimitTracer::new(1_000);
        let result = execute(&program, &input("a"), 0, &mut tracer).unwrap();
        assert_eq!(result, Some(Match { end: 1 }));
    }

    #[test]
    fn negative_lookahead_rejects_match() {
        let node = Node::Sequence(vec![
            Node::LookAhead { invert: true, node: Box::new(ch('a')) },
            ch('a'),
        ]);
        let program = compile(node, FlagSet::default());
        let mut tracer = LimitTracer::new(1_000);
        let result = execute(&program, &input("a"), 0, &mut tracer).unwrap();
        assert_eq!(result, None);
    }

    #[test]
    fn lookbehind_checks_preceding_text() {
        let node = Node::Sequence(vec![
            ch('a'),
            Node::LookBehind { invert: false, node: Box::new(ch('a')) },
        ]);
        let program = compile(node, FlagSet::default());
        let mut tracer = LimitTracer::new(1_000);
        let result = execute(&program, &input("a"), 0, &mut tracer).unwrap();
        assert_eq!(result, Some(Match { end: 1 }));
    }

    #[test]
    fn search_tries_every_start_position() {
        let program = compile(ch('b'), FlagSet::default());
        let mut tracer = LimitTracer::new(1_000);
        let result = search(&program, &input("aaab"), &mut tracer).unwrap();
        assert_eq!(result, Some(Match { end: 4 }));
    }
}
