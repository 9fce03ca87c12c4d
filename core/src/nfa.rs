//! ε-elimination: turns an [`EpsilonNfa`](crate::enfa::EpsilonNfa) into the
//! ordered NFA of `spec.md` §4.3 — a transition function whose image is
//! an *ordered sequence* of successor states, preserving the
//! greedy/non-greedy priority the ε-NFA encoded in its `Eps` priority
//! lists.
//!
//! Assertions have no runtime input available at this stage (the
//! automaton checker reasons about structure, not concrete strings), so
//! ε-closure computation treats `Assert` the same as an unconditional
//! `Eps` pass-through. This is a deliberate over-approximation: a pattern
//! whose blow-up only happens when an assertion would in fact fail (e.g.
//! a `\b` that can never hold at the relevant position) may be reported
//! Vulnerable when a real backtracking engine would never reach the
//! dangerous state. `spec.md` already scopes the safety claim to "with
//! respect to the backtracking semantics modeled here", and the fuzz
//! checker's VM (§4.5) does evaluate assertions for real, so Hybrid's
//! fuzz fallback still catches cases the automaton over-approximates.

use std::collections::HashMap;

use crate::enfa::{EpsilonNfa, Transition};
use crate::error::{Checker, Error};
use crate::timeout::Timeout;

/// `{ alphabet: Σ, states: Q, inits, accepts, δ }` of `spec.md` §3. `Σ` is
/// represented only by its size here — the atoms themselves still live in
/// the originating [`reguard_chars::ICharSet`], which callers keep
/// alongside this value (ordered-NFA symbol `s` is alphabet atom index
/// `s`).
#[derive(Debug, Clone)]
pub struct OrderedNfa {
    pub alphabet_size: usize,
    pub state_count: usize,
    pub inits: Vec<usize>,
    pub accepts: Vec<bool>,
    /// `delta[state * alphabet_size + symbol]` = ordered successor states.
    delta: Vec<Vec<usize>>,
}

impl OrderedNfa {
    pub fn successors(&self, state: usize, symbol: usize) -> &[usize] {
        &self.delta[state * self.alphabet_size + symbol]
    }

    pub fn is_accept(&self, state: usize) -> bool {
        self.accepts[state]
    }
}

/// The ordered-sequence ε-closure of one ε-NFA state: which original
/// `Consume` states are reachable (priority order, first-reached wins on
/// ε-cycles), and whether the ε-NFA's accept state is among them.
struct Closure {
    consume_leaves: Vec<usize>,
    is_accept: bool,
}

fn closure(enfa: &EpsilonNfa, start: usize, timeout: &Timeout) -> Result<Closure, Error> {
    let mut visited = vec![false; enfa.state_count()];
    let mut consume_leaves = Vec::new();
    let mut is_accept = false;
    let mut stack = vec![start];
    // pre-order DFS respecting each Eps priority list; `stack` holds
    // pending work in reverse-of-priority order so popping yields the
    // correct left-to-right visitation.
    while let Some(state) = stack.pop() {
        timeout.check("nfa::closure", Checker::Automaton)?;
        if visited[state] {
            continue;
        }
        visited[state] = true;
        if state == enfa.accept {
            is_accept = true;
        }
        match &enfa.transitions[state] {
            None => {}
            Some(Transition::Consume(_, _)) => consume_leaves.push(state),
            Some(Transition::Eps(targets)) => {
                for &t in targets.iter().rev() {
                    stack.push(t);
                }
            }
            Some(Transition::Assert(_, target)) => stack.push(*target),
        }
    }
    Ok(Closure { consume_leaves, is_accept })
}

/// Builds the ordered NFA, densely renumbering states starting at 0 in
/// BFS discovery order (`rename`, stable across runs for a given
/// compilation since discovery order is deterministic).
pub fn compile(
    enfa: &EpsilonNfa,
    max_nfa_size: usize,
    timeout: &Timeout,
) -> Result<OrderedNfa, Error> {
    let mut rename: HashMap<usize, usize> = HashMap::new();
    let mut closures: Vec<Closure> = Vec::new();
    let mut queue: Vec<usize> = Vec::new();

    fn intern(state: usize, rename: &mut HashMap<usize, usize>, queue: &mut Vec<usize>) -> usize {
        if let Some(&id) = rename.get(&state) {
            return id;
        }
        let id = rename.len();
        rename.insert(state, id);
        queue.push(state);
        id
    }

    let init_new_id = intern(enfa.init, &mut rename, &mut queue);
    debug_assert_eq!(init_new_id, 0);

    let mut frontier = 0;
    while frontier < queue.len() {
        let original = queue[frontier];
        frontier += 1;
        timeout.check("nfa::compile", Checker::Automaton)?;
        if closures.len() >= max_nfa_size {
            return Err(Error::Unsupported(
                "MultiNFA size is too large".to_string(),
                Checker::Automaton,
            ));
        }
        let c = closure(enfa, original, timeout)?;
        for &leaf in &c.consume_leaves {
            if let Some(Transition::Consume(_, target)) = &enfa.transitions[leaf] {
                intern(*target, &mut rename, &mut queue);
            }
        }
        closures.push(c);
    }

    let state_count = closures.len();
    if state_count > max_nfa_size {
        return Err(Error::Unsupported(
            "MultiNFA size is too large".to_string(),
            Checker::Automaton,
        ));
    }

    let mut accepts = vec![false; state_count];
    let mut delta = vec![Vec::new(); state_count * enfa.alphabet.len()];

    for (new_id, c) in closures.iter().enumerate() {
        accepts[new_id] = c.is_accept;
        for symbol in 0..enfa.alphabet.len() {
            timeout.check("nfa::delta", Checker::Automaton)?;
            let mut targets = Vec::new();
            for &leaf in &c.consume_leaves {
                if let Some(Transition::Consume(atoms, target)) = &enfa.transitions[leaf] {
                    if atoms.contains(&symbol) {
                        let new_target = *rename.get(target).expect("target interned during discovery");
                        if !targets.contains(&new_target) {
                            targets.push(new_target);
                        }
                    }
                }
            }
            delta[new_id * enfa.alphabet.len() + symbol] = targets;
        }
    }

    Ok(OrderedNfa { alphabet_size: enfa.alphabet.len(), state_count, inits: vec![0], accepts, delta })
}
