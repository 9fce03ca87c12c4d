//! The product-automaton decision engine of `spec.md` §4.4: the core
//! "does this pattern blow up" judgement, built directly on the
//! [`crate::graph::Graph`] kernel over the [`crate::nfa::OrderedNfa`].
//!
//! `G²` pairs up two independent runs of the same ordered NFA over the
//! same input. A cycle that revisits a *diagonal* vertex `(p,p)` through
//! an *off-diagonal* vertex `(p₁,p₂)` along the way is exactly two
//! distinct ways to match the same string prefix — the structural
//! signature of catastrophic backtracking. A single such cycle inside one
//! SCC is exponential (EDA); a chain of several "loopy" SCCs feeding into
//! each other without ever re-merging is polynomial in the chain length
//! (IDA).

use std::collections::HashSet;

use itertools::iproduct;
use reguard_chars::{ICharSet, UChar};

use crate::ast::Pattern;
use crate::diagnostics::Complexity;
use crate::error::{Checker, Error};
use crate::graph::Graph;
use crate::nfa::OrderedNfa;
use crate::timeout::Timeout;
use crate::witness::Witness;
use crate::Config;

/// Runs the automaton checker: decides `pattern`'s worst-case matching
/// complexity from its ordered NFA, per §4.4's four-way split.
pub fn check(
    pattern: &Pattern,
    nfa: &OrderedNfa,
    alphabet: &ICharSet,
    config: &Config,
    timeout: &Timeout,
) -> Result<Complexity, Error> {
    let q = nfa.state_count;
    if q.checked_mul(q).map_or(true, |sq| sq > config.max_nfa_size.saturating_mul(config.max_nfa_size))
    {
        return Err(Error::Unsupported("MultiNFA size is too large".to_string(), Checker::Automaton));
    }

    let product = build_product_graph(nfa, timeout)?;
    let mut sccs = product.scc(timeout, Checker::Automaton)?;
    // canonical order so the "lexicographically first" tie-break of §4.4
    // is deterministic across runs: sort components by their smallest
    // member vertex id.
    sccs.sort_by_key(|c| *c.iter().min().expect("Tarjan never emits an empty component"));

    if let Some(witness) = find_eda(&product, nfa, &sccs, timeout)? {
        return Ok(Complexity::Exponential(render_witness(&witness, alphabet)));
    }

    if let Some((degree, witness)) = find_ida(&product, nfa, &sccs, timeout)? {
        return Ok(Complexity::Polynomial(degree, render_witness(&witness, alphabet)));
    }

    Ok(if pattern.is_constant() { Complexity::Constant } else { Complexity::Linear })
}

fn vertex(q: usize, p1: usize, p2: usize) -> usize {
    p1 * q + p2
}

fn is_diagonal(q: usize, v: usize) -> bool {
    v / q == v % q
}

/// `G²`: `(p₁,p₂) —a→ (p₁',p₂')` iff `p₁ —a→ p₁'` and `p₂ —a→ p₂'` in `δ`,
/// successor positions chosen independently of one another.
fn build_product_graph(nfa: &OrderedNfa, timeout: &Timeout) -> Result<Graph<usize>, Error> {
    let q = nfa.state_count;
    let mut g = Graph::new(q * q);
    for (p1, p2) in iproduct!(0..q, 0..q) {
        timeout.check("automaton::product", Checker::Automaton)?;
        let v = vertex(q, p1, p2);
        for symbol in 0..nfa.alphabet_size {
            let s1 = nfa.successors(p1, symbol);
            let s2 = nfa.successors(p2, symbol);
            for (&t1, &t2) in iproduct!(s1, s2) {
                g.add_edge(v, symbol, vertex(q, t1, t2));
            }
        }
    }
    Ok(g)
}

/// Looks for an SCC that contains both a diagonal and an off-diagonal
/// vertex — by strong connectivity that's exactly a cycle through `(p,p)`
/// with an off-diagonal intermediate, the EDA condition of §4.4 step 2.
/// SCCs are tried in the canonical order established by the caller;
/// within the chosen SCC the diagonal and off-diagonal vertices are each
/// the smallest by vertex id, giving the "lexicographically first"
/// tie-break. An SCC unreachable from any initial state is skipped (its
/// ambiguity, if any, is never exercised by a real match attempt).
fn find_eda(
    product: &Graph<usize>,
    nfa: &OrderedNfa,
    sccs: &[Vec<usize>],
    timeout: &Timeout,
) -> Result<Option<Witness<usize>>, Error> {
    let q = nfa.state_count;
    let init_diagonals: Vec<usize> = nfa.inits.iter().map(|&s| vertex(q, s, s)).collect();

    for scc in sccs {
        timeout.check("automaton::eda", Checker::Automaton)?;
        let mut diag: Vec<usize> = scc.iter().copied().filter(|&v| is_diagonal(q, v)).collect();
        let mut off: Vec<usize> = scc.iter().copied().filter(|&v| !is_diagonal(q, v)).collect();
        if diag.is_empty() || off.is_empty() {
            continue;
        }
        diag.sort_unstable();
        off.sort_unstable();
        let p = diag[0];
        let bridge = off[0];

        let Some(sigma0) = product.path(&init_diagonals, p, timeout, Checker::Automaton)? else {
            continue;
        };
        let sigma1a = product
            .path(&[p], bridge, timeout, Checker::Automaton)?
            .expect("off-diagonal vertex is in p's own SCC, so it is reachable from p");
        let sigma1b = product
            .path(&[bridge], p, timeout, Checker::Automaton)?
            .expect("p is in bridge's own SCC, so it is reachable back from bridge");
        let mut pump = sigma1a;
        pump.extend(sigma1b);

        // The pump only proves the product automaton revisits `(p,p)` two
        // structurally distinct ways — it says nothing about whether any
        // particular input matches. A backtracking engine that finds a
        // matching path immediately returns without ever exploring the
        // ambiguity, so the witness needs a tail the pattern cannot
        // consume at all: `nfa.alphabet_size` is reserved as exactly that
        // sentinel symbol (see `render_witness`), forcing every way of
        // splitting the pumped run to be tried and fail.
        let suffix = vec![nfa.alphabet_size];
        return Ok(Some(Witness { pumps: vec![(sigma0, pump)], suffix }));
    }
    Ok(None)
}

/// Whether an SCC "individually contains a cycle": more than one vertex,
/// or a single vertex with a self-loop.
fn is_loopy(graph: &Graph<usize>, scc: &[usize]) -> bool {
    if scc.len() > 1 {
        return true;
    }
    let v = scc[0];
    graph.edges(v).iter().any(|(_, target)| *target == v)
}

/// §4.4 step 3: collapses every loopy SCC to a meta-node, draws a meta-edge
/// `C₁ → C₂` when an off-diagonal bridge `(p,q)` (`p∈C₁, q∈C₂`) is reachable
/// in the product from `C₁`'s diagonal and reaches `C₂`'s diagonal in turn,
/// then finds the longest such chain. Emits `Polynomial(k, witness)` for
/// the longest chain of `k ≥ 2` loopy SCCs found this way.
fn find_ida(
    product: &Graph<usize>,
    nfa: &OrderedNfa,
    sccs: &[Vec<usize>],
    timeout: &Timeout,
) -> Result<Option<(u32, Witness<usize>)>, Error> {
    let q = nfa.state_count;
    let loopy_sccs: Vec<&Vec<usize>> = sccs.iter().filter(|c| is_loopy(product, c)).collect();
    if loopy_sccs.len() < 2 {
        return Ok(None);
    }

    let rev = product.reverse();
    let mut forward_reach = Vec::with_capacity(loopy_sccs.len());
    let mut backward_reach = Vec::with_capacity(loopy_sccs.len());
    for scc in &loopy_sccs {
        timeout.check("automaton::ida_reach", Checker::Automaton)?;
        let diag: Vec<usize> = scc.iter().copied().filter(|&v| is_diagonal(q, v)).collect();
        forward_reach.push(product.reachable_vertices(&diag, timeout, Checker::Automaton)?);
        backward_reach.push(rev.reachable_vertices(&diag, timeout, Checker::Automaton)?);
    }

    // meta-edge i -> j iff some off-diagonal vertex with its first
    // component's SCC == i and second component's SCC == j is both
    // forward-reachable from i's diagonal and backward-reachable to j's
    // diagonal.
    let scc_of: Vec<Option<usize>> = {
        let mut map = vec![None; q * q];
        for (idx, scc) in loopy_sccs.iter().enumerate() {
            for &v in scc.iter() {
                map[v] = Some(idx);
            }
        }
        map
    };

    let n = loopy_sccs.len();
    let mut edges: Vec<Vec<usize>> = vec![Vec::new(); n];
    let mut bridge_vertex: Vec<Vec<Option<usize>>> = vec![vec![None; n]; n];
    for i in 0..n {
        timeout.check("automaton::ida_edges", Checker::Automaton)?;
        let mut candidates: Vec<usize> =
            forward_reach[i].iter().copied().filter(|&v| !is_diagonal(q, v)).collect();
        candidates.sort_unstable();
        for v in candidates {
            let p1 = v / q;
            let p2 = v % q;
            if scc_of[p1] != Some(i) {
                continue;
            }
            let Some(j) = scc_of[p2] else { continue };
            if j == i || bridge_vertex[i][j].is_some() {
                continue;
            }
            if backward_reach[j].contains(&v) {
                edges[i].push(j);
                bridge_vertex[i][j] = Some(v);
            }
        }
        edges[i].sort_unstable();
    }

    // the meta-graph over distinct SCCs is acyclic (a standard condensation
    // property), so longest-path-in-edges is a plain topological DP.
    let mut memo: Vec<Option<usize>> = vec![None; n];
    let mut best_node = 0;
    let mut best_len = 0usize;
    for start in 0..n {
        let len = longest_chain(start, &edges, &mut memo);
        if len > best_len {
            best_len = len;
            best_node = start;
        }
    }

    let degree = best_len as u32 + 1;
    if degree < 2 {
        return Ok(None);
    }

    let chain = reconstruct_chain(best_node, &edges, &memo);
    let witness = build_ida_witness(product, nfa, &loopy_sccs, &bridge_vertex, &chain, timeout)?;
    Ok(Some((degree, witness)))
}

fn longest_chain(v: usize, edges: &[Vec<usize>], memo: &mut Vec<Option<usize>>) -> usize {
    if let Some(len) = memo[v] {
        return len;
    }
    let best = edges[v].iter().map(|&w| 1 + longest_chain(w, edges, memo)).max().unwrap_or(0);
    memo[v] = Some(best);
    best
}

/// Walks the meta-DAG from `start` always taking the successor with the
/// longest remaining chain (ties broken by smallest SCC index, since
/// `edges[v]` is kept sorted), reconstructing the actual chain
/// `longest_chain` found.
fn reconstruct_chain(start: usize, edges: &[Vec<usize>], memo: &[Option<usize>]) -> Vec<usize> {
    let mut chain = vec![start];
    let mut cur = start;
    loop {
        let cur_len = memo[cur].unwrap_or(0);
        let Some(&next) = edges[cur].iter().find(|&&w| 1 + memo[w].unwrap_or(0) == cur_len) else {
            break;
        };
        chain.push(next);
        cur = next;
    }
    chain
}

/// One pump segment per consecutive pair of SCCs in the chain, each built
/// the same way as the EDA pump: into the SCC's diagonal, out to the
/// bridge vertex and back. The prefix into the first SCC's diagonal and
/// the suffix out of the last are the overall pump path's head and tail.
fn build_ida_witness(
    product: &Graph<usize>,
    nfa: &OrderedNfa,
    loopy_sccs: &[&Vec<usize>],
    bridge_vertex: &[Vec<Option<usize>>],
    chain: &[usize],
    timeout: &Timeout,
) -> Result<Witness<usize>, Error> {
    let q = nfa.state_count;
    let init_diagonals: Vec<usize> = nfa.inits.iter().map(|&s| vertex(q, s, s)).collect();

    let diag = |idx: usize| -> usize {
        let mut ds: Vec<usize> = loopy_sccs[idx].iter().copied().filter(|&v| is_diagonal(q, v)).collect();
        ds.sort_unstable();
        ds[0]
    };

    let mut pumps = Vec::new();
    let mut cursor: Option<usize> = None;
    for window in chain.windows(2) {
        let (from, to) = (window[0], window[1]);
        let from_diag = diag(from);
        let prefix = match cursor {
            Some(c) => product.path(&[c], from_diag, timeout, Checker::Automaton)?.unwrap_or_default(),
            None => product.path(&init_diagonals, from_diag, timeout, Checker::Automaton)?.unwrap_or_default(),
        };
        let bridge = bridge_vertex[from][to].expect("chain edge always has a witnessing bridge vertex");
        let to_bridge = product
            .path(&[from_diag], bridge, timeout, Checker::Automaton)?
            .expect("bridge is forward-reachable from from_diag by construction");
        let to_diag = diag(to);
        let bridge_to_to = product
            .path(&[bridge], to_diag, timeout, Checker::Automaton)?
            .expect("bridge reaches to_diag by construction");
        let mut pump_labels = to_bridge;
        pump_labels.extend(bridge_to_to);
        pumps.push((prefix, pump_labels));
        cursor = Some(to_diag);
    }

    // Same reasoning as `find_eda`'s suffix: the chain of pumps only
    // proves ambiguity along the way, so the final tail still has to be
    // the out-of-alphabet sentinel to force the overall match to fail.
    let suffix = vec![nfa.alphabet_size];
    Ok(Witness { pumps, suffix })
}

/// Projects alphabet-symbol indices down to one concrete `UChar` per
/// index — each atom's smallest member character, or the out-of-alphabet
/// sentinel for the reserved `alphabet.len()` index `find_eda`/
/// `build_ida_witness` use to terminate a witness's suffix — the
/// `mapAlphabet` rewrite `spec.md` describes, deferred here (per
/// `crate::nfa`'s design note) to the point a witness is actually turned
/// into text.
fn render_witness(witness: &Witness<usize>, alphabet: &ICharSet) -> Witness<UChar> {
    let sentinel = alphabet.sentinel();
    witness.map(|&symbol| {
        if symbol == alphabet.len() {
            return sentinel;
        }
        alphabet.members()[symbol]
            .ranges()
            .ranges()
            .first()
            .map(|&(lo, _)| lo)
            .unwrap_or(0)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{AssertionKind, FlagSet, Node, Pattern};
    use crate::{enfa, nfa};
    use reguard_chars::IChar;

    fn timeout() -> Timeout {
        Timeout::NO_TIMEOUT
    }

    fn ch(c: char) -> Node {
        Node::Character(IChar::single(c as UChar))
    }

    fn compile(node: Node) -> (OrderedNfa, ICharSet, Pattern) {
        let pattern = Pattern { node, flags: FlagSet::default() };
        let e = enfa::compile(&pattern, &timeout()).unwrap();
        let n = nfa::compile(&e, 10_000, &timeout()).unwrap();
        (n, e.alphabet, pattern)
    }

    fn star(node: Node) -> Node {
        Node::Star { non_greedy: false, node: Box::new(node) }
    }

    fn plus(node: Node) -> Node {
        Node::Plus { non_greedy: false, node: Box::new(node) }
    }

    #[test]
    fn literal_pattern_is_constant() {
        let (n, alphabet, p) = compile(Node::Sequence(vec![ch('a'), ch('b'), ch('c')]));
        let cfg = Config::default();
        let result = check(&p, &n, &alphabet, &cfg, &timeout()).unwrap();
        assert_eq!(result, Complexity::Constant);
    }

    #[test]
    fn single_star_is_linear_not_vulnerable() {
        let (n, alphabet, p) = compile(Node::Sequence(vec![star(ch('a')), ch('b')]));
        let cfg = Config::default();
        let result = check(&p, &n, &alphabet, &cfg, &timeout()).unwrap();
        assert_eq!(result, Complexity::Linear);
        assert!(!result.is_vulnerable());
    }

    #[test]
    fn nested_star_is_exponential() {
        // (a*)* — the classic catastrophic-backtracking shape.
        let (n, alphabet, p) = compile(star(star(ch('a'))));
        let cfg = Config::default();
        let result = check(&p, &n, &alphabet, &cfg, &timeout()).unwrap();
        assert!(matches!(result, Complexity::Exponential(_)));
        assert!(result.is_vulnerable());
    }

    #[test]
    fn repeated_plus_is_exponential() {
        // (a+)+
        let (n, alphabet, p) = compile(plus(plus(ch('a'))));
        let cfg = Config::default();
        let result = check(&p, &n, &alphabet, &cfg, &timeout()).unwrap();
        assert!(matches!(result, Complexity::Exponential(_)));
    }

    #[test]
    fn alternation_of_identical_branches_is_exponential() {
        // (a|a)*
        let (n, alphabet, p) =
            compile(star(Node::Disjunction(vec![ch('a'), ch('a')])));
        let cfg = Config::default();
        let result = check(&p, &n, &alphabet, &cfg, &timeout()).unwrap();
        assert!(matches!(result, Complexity::Exponential(_)));
    }

    #[test]
    fn three_independent_stars_are_polynomial() {
        // a*a*a*b
        let (n, alphabet, p) = compile(Node::Sequence(vec![
            star(ch('a')),
            star(ch('a')),
            star(ch('a')),
            ch('b'),
        ]));
        let cfg = Config::default();
        let result = check(&p, &n, &alphabet, &cfg, &timeout()).unwrap();
        match result {
            Complexity::Polynomial(degree, _) => assert!(degree >= 2),
            other => panic!("expected Polynomial, got {other:?}"),
        }
    }

    #[test]
    fn oversized_product_is_unsupported() {
        let (n, alphabet, p) = compile(Node::Sequence(vec![ch('a'), ch('b'), ch('c')]));
        assert!(n.state_count > 1, "need at least 2 states for the cap to bite");
        let cfg = Config::builder().max_nfa_size(n.state_count - 1).build();
        let err = check(&p, &n, &alphabet, &cfg, &timeout()).unwrap_err();
        assert!(matches!(err, Error::Unsupported(ref m, _) if m == "MultiNFA size is too large"));
    }

    /// A reported `Exponential`/`Polynomial` witness must actually drive
    /// the backtracking VM past a step limit for a large enough pump
    /// count. NFA acceptance alone isn't this property: it only proves
    /// the product automaton can revisit a state two structurally
    /// distinct ways, which says nothing about whether a real
    /// backtracking engine ever explores that ambiguity instead of
    /// returning on the first path it finds.
    #[test]
    fn exponential_witness_blows_up_the_vm() {
        // (a*)*$ — the anchor matters: without it the pattern always
        // succeeds along the first greedy path the VM tries, so no attack
        // string could ever force it past a step limit.
        let (n, alphabet, p) = compile(Node::Sequence(vec![
            star(star(ch('a'))),
            Node::Assertion(AssertionKind::LineEnd),
        ]));
        let cfg = Config::default();
        let result = check(&p, &n, &alphabet, &cfg, &timeout()).unwrap();
        let witness = match result {
            Complexity::Exponential(w) => w,
            other => panic!("expected Exponential, got {other:?}"),
        };
        let program = crate::ir::compile(&p, alphabet.clone());
        let attack = crate::witness::attack_string(&witness, None, cfg.attack_limit, cfg.max_attack_size);
        let mut tracer = crate::vm::LimitTracer::new(cfg.attack_limit);
        let outcome = crate::vm::execute(&program, &attack, 0, &mut tracer);
        assert_eq!(outcome, Err(crate::vm::VmError::LimitExceeded));
    }

    #[test]
    fn polynomial_witness_blows_up_the_vm() {
        let (n, alphabet, p) = compile(Node::Sequence(vec![
            star(ch('a')),
            star(ch('a')),
            star(ch('a')),
            ch('b'),
        ]));
        let cfg = Config::default();
        let result = check(&p, &n, &alphabet, &cfg, &timeout()).unwrap();
        let (degree, witness) = match result {
            Complexity::Polynomial(degree, w) => (degree, w),
            other => panic!("expected Polynomial, got {other:?}"),
        };
        let program = crate::ir::compile(&p, alphabet.clone());
        let attack =
            crate::witness::attack_string(&witness, Some(degree), cfg.attack_limit, cfg.max_attack_size);
        let mut tracer = crate::vm::LimitTracer::new(cfg.attack_limit);
        let outcome = crate::vm::execute(&program, &attack, 0, &mut tracer);
        assert_eq!(outcome, Err(crate::vm::VmError::LimitExceeded));
    }
}
