//! Property tests for `graph.rs`'s kernel, per SPEC_FULL.md's "universally
//! quantified invariants" test-tooling note. Graphs are generated small
//! (bounded vertex/edge counts) since `scc`'s mutual-reachability check
//! below is quadratic in vertex count.

use std::collections::HashSet;

use quickcheck::{Arbitrary, Gen};
use quickcheck_macros::quickcheck;
use reguard_core::error::Checker;
use reguard_core::graph::Graph;
use reguard_core::timeout::Timeout;

#[derive(Clone, Debug)]
struct SmallGraph {
    vertex_count: usize,
    edges: Vec<(usize, usize)>,
}

impl Arbitrary for SmallGraph {
    fn arbitrary(g: &mut Gen) -> Self {
        let vertex_count = 1 + usize::arbitrary(g) % 8;
        let edge_count = usize::arbitrary(g) % 16;
        let edges = (0..edge_count)
            .map(|_| (usize::arbitrary(g) % vertex_count, usize::arbitrary(g) % vertex_count))
            .collect();
        SmallGraph { vertex_count, edges }
    }
}

fn build(g: &SmallGraph) -> Graph<()> {
    let mut graph = Graph::new(g.vertex_count);
    for &(s, t) in &g.edges {
        graph.add_edge(s, (), t);
    }
    graph
}

#[quickcheck]
fn scc_partitions_every_vertex_exactly_once(g: SmallGraph) -> bool {
    let graph = build(&g);
    let components = graph.scc(&Timeout::NO_TIMEOUT, Checker::Automaton).unwrap();
    let mut seen = HashSet::new();
    for component in &components {
        for &v in component {
            if !seen.insert(v) {
                return false;
            }
        }
    }
    seen == (0..g.vertex_count).collect::<HashSet<_>>()
}

#[quickcheck]
fn scc_components_are_mutually_reachable(g: SmallGraph) -> bool {
    let graph = build(&g);
    let timeout = Timeout::NO_TIMEOUT;
    let components = graph.scc(&timeout, Checker::Automaton).unwrap();
    for component in &components {
        for &u in component {
            for &v in component {
                if u == v {
                    continue;
                }
                let reachable = graph.reachable_vertices(&[u], &timeout, Checker::Automaton).unwrap();
                if !reachable.contains(&v) {
                    return false;
                }
            }
        }
    }
    true
}

#[quickcheck]
fn scc_does_not_merge_unreachable_pairs(g: SmallGraph) -> bool {
    let graph = build(&g);
    let timeout = Timeout::NO_TIMEOUT;
    let components = graph.scc(&timeout, Checker::Automaton).unwrap();
    let mut component_of = vec![usize::MAX; g.vertex_count];
    for (idx, component) in components.iter().enumerate() {
        for &v in component {
            component_of[v] = idx;
        }
    }
    for u in 0..g.vertex_count {
        for v in 0..g.vertex_count {
            if u == v || component_of[u] != component_of[v] {
                continue;
            }
            let forward = graph.reachable_vertices(&[u], &timeout, Checker::Automaton).unwrap();
            let backward = graph.reverse().reachable_vertices(&[u], &timeout, Checker::Automaton).unwrap();
            if !(forward.contains(&v) && backward.contains(&v)) {
                return false;
            }
        }
    }
    true
}

#[quickcheck]
fn reverse_of_reverse_has_same_edge_count(g: SmallGraph) -> bool {
    let graph = build(&g);
    graph.edge_count() == graph.reverse().reverse().edge_count()
}
