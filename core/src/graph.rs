//! A directed labeled multigraph over dense `usize` vertex ids — the
//! `spec.md` §4.1 graph kernel that the product-automaton checker in
//! [`crate::automaton`] is built on: reachability, Tarjan SCC, and
//! shortest labeled paths.
//!
//! Vertices are plain indices into a `Vec`, the same dense integer-arena
//! style the ε-NFA/NFA/automaton modules use for states, rather than a
//! pointer- or `HashMap`-keyed graph.

use std::collections::{HashSet, VecDeque};

use crate::error::{Checker, Error};
use crate::timeout::Timeout;

/// A directed multigraph: more than one labeled edge may exist between the
/// same ordered pair of vertices.
#[derive(Debug, Clone)]
pub struct Graph<L> {
    out_edges: Vec<Vec<(L, usize)>>,
}

impl<L: Clone> Graph<L> {
    pub fn new(vertex_count: usize) -> Self {
        Graph { out_edges: vec![Vec::new(); vertex_count] }
    }

    pub fn vertex_count(&self) -> usize {
        self.out_edges.len()
    }

    pub fn vertices(&self) -> impl Iterator<Item = usize> {
        0..self.out_edges.len()
    }

    pub fn add_edge(&mut self, source: usize, label: L, target: usize) {
        self.out_edges[source].push((label, target));
    }

    pub fn edges(&self, vertex: usize) -> &[(L, usize)] {
        &self.out_edges[vertex]
    }

    pub fn edge_count(&self) -> usize {
        self.out_edges.iter().map(Vec::len).sum()
    }

    /// Every edge with source and target swapped, same vertex set.
    pub fn reverse(&self) -> Graph<L> {
        let mut rev = Graph::new(self.vertex_count());
        for source in self.vertices() {
            for (label, target) in self.edges(source) {
                rev.add_edge(*target, label.clone(), source);
            }
        }
        rev
    }

    /// Subgraph induced by the vertices reachable from `init` by forward
    /// traversal, keeping the original vertex ids (unreachable vertices
    /// are kept in the arena with no edges, so callers can still index by
    /// the ids they already hold).
    pub fn reachable(
        &self,
        init: &[usize],
        timeout: &Timeout,
        checker: Checker,
    ) -> Result<Graph<L>, Error> {
        let reached = self.reachable_vertices(init, timeout, checker)?;
        let mut out = Graph::new(self.vertex_count());
        for v in &reached {
            timeout.check("graph::reachable", checker)?;
            for (label, target) in self.edges(*v) {
                if reached.contains(target) {
                    out.add_edge(*v, label.clone(), *target);
                }
            }
        }
        Ok(out)
    }

    /// The set of vertices reachable from `init` by forward traversal,
    /// `init` itself included. Lower-level than [`Graph::reachable`] (no
    /// subgraph materialized), for callers that only need membership
    /// tests.
    pub fn reachable_vertices(
        &self,
        init: &[usize],
        timeout: &Timeout,
        checker: Checker,
    ) -> Result<HashSet<usize>, Error> {
        let mut seen: HashSet<usize> = init.iter().copied().collect();
        let mut queue: VecDeque<usize> = init.iter().copied().collect();
        while let Some(v) = queue.pop_front() {
            timeout.check("graph::reachable_set", checker)?;
            for (_, target) in self.edges(v) {
                if seen.insert(*target) {
                    queue.push_back(*target);
                }
            }
        }
        Ok(seen)
    }

    /// Shortest (fewest-edges) sequence of labels from any vertex in
    /// `sources` to `target`. `Some(empty vec)` if some source already
    /// equals `target`; `None` if `target` is unreachable.
    pub fn path(
        &self,
        sources: &[usize],
        target: usize,
        timeout: &Timeout,
        checker: Checker,
    ) -> Result<Option<Vec<L>>, Error> {
        if sources.contains(&target) {
            return Ok(Some(Vec::new()));
        }
        // back-pointer per visited vertex: (predecessor, label taken to get here)
        let mut came_from: Vec<Option<(usize, L)>> = vec![None; self.vertex_count()];
        let mut seen: HashSet<usize> = sources.iter().copied().collect();
        let mut queue: VecDeque<usize> = sources.iter().copied().collect();
        while let Some(v) = queue.pop_front() {
            timeout.check("graph::path", checker)?;
            for (label, next) in self.edges(v) {
                if seen.insert(*next) {
                    came_from[*next] = Some((v, label.clone()));
                    if *next == target {
                        queue.clear();
                        break;
                    }
                    queue.push_back(*next);
                }
            }
        }
        if came_from[target].is_none() {
            return Ok(None);
        }
        let mut labels = Vec::new();
        let mut cur = target;
        while let Some((prev, label)) = &came_from[cur] {
            labels.push(label.clone());
            cur = *prev;
        }
        labels.reverse();
        Ok(Some(labels))
    }

    /// Per-vertex set of descendants, including the vertex itself. Assumes
    /// `self` is acyclic; a cyclic graph causes unbounded recursion here
    /// (stack overflow), not a graceful error — callers are responsible
    /// for only calling this on acyclic input (e.g. the SCC-collapsed
    /// product graph).
    pub fn reachable_map(
        &self,
        timeout: &Timeout,
        checker: Checker,
    ) -> Result<Vec<HashSet<usize>>, Error> {
        let mut memo: Vec<Option<HashSet<usize>>> = vec![None; self.vertex_count()];
        for v in self.vertices() {
            self.reachable_map_rec(v, &mut memo, timeout, checker)?;
        }
        Ok(memo.into_iter().map(|s| s.unwrap_or_default()).collect())
    }

    fn reachable_map_rec(
        &self,
        v: usize,
        memo: &mut Vec<Option<HashSet<usize>>>,
        timeout: &Timeout,
        checker: Checker,
    ) -> Result<(), Error> {
        if memo[v].is_some() {
            return Ok(());
        }
        timeout.check("graph::reachable_map", checker)?;
        let mut set = HashSet::new();
        set.insert(v);
        let targets: Vec<usize> = self.edges(v).iter().map(|(_, target)| *target).collect();
        for target in targets {
            self.reachable_map_rec(target, memo, timeout, checker)?;
            if let Some(desc) = &memo[target] {
                set.extend(desc.iter().copied());
            }
        }
        memo[v] = Some(set);
        Ok(())
    }

    /// Tarjan's algorithm, run iteratively to avoid recursion-depth limits
    /// on the large automata this kernel is built for. One `Vec<usize>`
    /// per component, order unspecified; a self-loop-free singleton is
    /// still returned as its own trivial component.
    pub fn scc(&self, timeout: &Timeout, checker: Checker) -> Result<Vec<Vec<usize>>, Error> {
        let n = self.vertex_count();
        let mut index: Vec<Option<u32>> = vec![None; n];
        let mut lowlink: Vec<u32> = vec![0; n];
        let mut on_stack: Vec<bool> = vec![false; n];
        let mut stack: Vec<usize> = Vec::new();
        let mut next_index: u32 = 0;
        let mut components: Vec<Vec<usize>> = Vec::new();

        // explicit work-stack frame standing in for the native call stack a
        // recursive formulation would use: which vertex, how far through
        // its edge list, and (on resumption after a tree edge) which child
        // just finished so its lowlink can be folded in.
        enum Frame {
            Enter(usize),
            Resume(usize, usize, Option<usize>),
        }
        let mut work: Vec<Frame> = Vec::new();

        for start in self.vertices() {
            if index[start].is_some() {
                continue;
            }
            work.push(Frame::Enter(start));
            while let Some(frame) = work.pop() {
                timeout.check("graph::scc", checker)?;
                match frame {
                    Frame::Enter(v) => {
                        index[v] = Some(next_index);
                        lowlink[v] = next_index;
                        next_index += 1;
                        stack.push(v);
                        on_stack[v] = true;
                        work.push(Frame::Resume(v, 0, None));
                    }
                    Frame::Resume(v, edge_pos, child) => {
                        if let Some(w) = child {
                            lowlink[v] = lowlink[v].min(lowlink[w]);
                        }
                        let edges = self.edges(v);
                        let mut pos = edge_pos;
                        let mut paused = false;
                        while pos < edges.len() {
                            let (_, target) = edges[pos];
                            pos += 1;
                            if index[target].is_none() {
                                work.push(Frame::Resume(v, pos, Some(target)));
                                work.push(Frame::Enter(target));
                                paused = true;
                                break;
                            } else if on_stack[target] {
                                lowlink[v] = lowlink[v].min(index[target].unwrap());
                            }
                        }
                        if paused {
                            continue;
                        }
                        if lowlink[v] == index[v].unwrap() {
                            let mut component = Vec::new();
                            loop {
                                let w = stack.pop().unwrap();
                                on_stack[w] = false;
                                component.push(w);
                                if w == v {
                                    break;
                                }
                            }
                            components.push(component);
                        }
                    }
                }
            }
        }
        Ok(components)
    }
}
