//! The genetic-search checker of `spec.md` §4.6: where the automaton
//! checker proves a bound structurally, the fuzz checker looks for one by
//! actually running candidate strings through [`crate::vm`] and evolving
//! whatever makes the step count grow. It never produces a complexity
//! class — only a witnessed attack string or "nothing found in the
//! iteration budget" — so it is the fallback the hybrid policy
//! (`crate::hybrid`) reaches for once the automaton checker admits it
//! cannot reason about a pattern at all (lookaround, back-references, or a
//! size cap breach).
//!
//! An `FString` is the search's unit of mutation: a short sequence of
//! literal characters interleaved with `Repeat` markers that say "the `k`
//! elements before this one repeat `n·m` additional times" for whatever
//! outer multiplier `n` the caller expands at. Candidates are judged by
//! running their `n = 1` expansion through a [`crate::vm::FuzzTracer`] and
//! scoring rate (steps per input char) and coverage (which backtracking
//! paths got exercised); a population of the fittest candidates is bred
//! generation over generation until one of them, pumped up by
//! [`try_attack`], actually blows the step budget.

use std::collections::HashSet;

use reguard_chars::{ICharSet, UChar};

use crate::ast::{Node, Pattern};
use crate::config::Config;
use crate::diagnostics::Diagnostics;
use crate::enfa;
use crate::error::{Checker, Error};
use crate::ir::{self, Program};
use crate::random::Random;
use crate::timeout::Timeout;
use crate::vm::{self, FuzzTracer, LimitTracer, VmError};

/// One element of an [`FString`]: a literal code point, or a marker that
/// the `size` elements immediately before it repeat `n·m` additional
/// times once the string is expanded at multiplier `n`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FElem {
    Wrap(UChar),
    Repeat { m: u32, size: usize },
}

/// A candidate attack-string template, structurally mutated and crossed
/// by the genetic search, expanded to a concrete `Vec<UChar>` only when
/// it needs to be run through the VM.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FString {
    elems: Vec<FElem>,
}

impl FString {
    pub fn new(elems: Vec<FElem>) -> Self {
        FString { elems }
    }

    /// Structural element count — not the length of any expansion.
    pub fn size(&self) -> usize {
        self.elems.len()
    }

    pub fn is_constant(&self) -> bool {
        !self.elems.iter().any(|e| matches!(e, FElem::Repeat { .. }))
    }

    pub fn insert_at(&mut self, pos: usize, elem: FElem) {
        let pos = pos.min(self.elems.len());
        self.elems.insert(pos, elem);
    }

    pub fn replace_at(&mut self, pos: usize, elem: FElem) {
        if pos < self.elems.len() {
            self.elems[pos] = elem;
        }
    }

    pub fn delete(&mut self, from: usize, to: usize) {
        let from = from.min(self.elems.len());
        let to = to.min(self.elems.len()).max(from);
        self.elems.drain(from..to);
    }

    /// Splits `self` at `pos1` and `other` at `pos2`, swapping tails: the
    /// single-point crossover §4.6 describes, applied twice to produce
    /// both offspring in one call.
    pub fn cross(&self, other: &FString, pos1: usize, pos2: usize) -> (FString, FString) {
        let pos1 = pos1.min(self.elems.len());
        let pos2 = pos2.min(other.elems.len());
        let mut a = self.elems[..pos1].to_vec();
        a.extend_from_slice(&other.elems[pos2..]);
        let mut b = other.elems[..pos2].to_vec();
        b.extend_from_slice(&self.elems[pos1..]);
        (FString::new(a), FString::new(b))
    }

    /// Rescales every `Repeat`'s `m` by `f`, used by [`try_attack`] to
    /// escalate a candidate toward the step budget without changing its
    /// shape.
    pub fn map_n(&self, f: impl Fn(u32) -> u32) -> FString {
        FString::new(
            self.elems
                .iter()
                .map(|e| match e {
                    FElem::Wrap(c) => FElem::Wrap(*c),
                    FElem::Repeat { m, size } => FElem::Repeat { m: f(*m), size: *size },
                })
                .collect(),
        )
    }

    /// Expands at multiplier `n`: each `Wrap` emits its character, each
    /// `Repeat{m,size}` repeats the `size` characters already emitted
    /// immediately before it `n·m` additional times.
    pub fn to_uchars(&self, n: u64) -> Vec<UChar> {
        let mut out: Vec<UChar> = Vec::new();
        for elem in &self.elems {
            match elem {
                FElem::Wrap(c) => out.push(*c),
                FElem::Repeat { m, size } => {
                    let take = (*size).min(out.len());
                    let tail: Vec<UChar> = out[out.len() - take..].to_vec();
                    let reps = n.saturating_mul(*m as u64);
                    for _ in 0..reps {
                        out.extend_from_slice(&tail);
                    }
                }
            }
        }
        out
    }
}

/// One evaluated candidate: its template plus the fitness signal its
/// `n = 1` expansion produced.
#[derive(Debug, Clone)]
struct Trace {
    fstring: FString,
    rate: f64,
    coverage: HashSet<(usize, u32, bool)>,
}

/// A closed generation: traces sorted by rate descending and truncated to
/// `maxGenerationSize`, plus the accumulated seen-inputs/coverage sets the
/// next generation's admission rule is judged against.
struct Generation {
    min_rate: f64,
    traces: Vec<Trace>,
    inputs: HashSet<Vec<UChar>>,
    covered: HashSet<(usize, u32, bool)>,
}

impl Generation {
    fn initial() -> Self {
        Generation { min_rate: 0.0, traces: Vec::new(), inputs: HashSet::new(), covered: HashSet::new() }
    }
}

/// A generation's mutable working set while the current round's crosses
/// and mutations are being evaluated. Admission rule (§4.6): a candidate
/// is kept iff its expansion hasn't been seen before, and either this is
/// the first (seeding) generation, its rate is at least the parent
/// generation's `minRate`, or it exercises coverage the population hasn't
/// seen yet.
struct Population {
    max_generation_size: usize,
    is_initial: bool,
    min_rate: f64,
    traces: Vec<Trace>,
    inputs: HashSet<Vec<UChar>>,
    covered: HashSet<(usize, u32, bool)>,
}

impl Population {
    fn from_generation(gen: &Generation, max_generation_size: usize, is_initial: bool) -> Self {
        Population {
            max_generation_size,
            is_initial,
            min_rate: gen.min_rate,
            traces: gen.traces.clone(),
            inputs: gen.inputs.clone(),
            covered: gen.covered.clone(),
        }
    }

    fn try_admit(&mut self, fstring: FString, expanded: &[UChar], rate: f64, coverage: HashSet<(usize, u32, bool)>) {
        if self.inputs.contains(expanded) {
            return;
        }
        let introduces_coverage = !coverage.is_subset(&self.covered);
        if !(self.is_initial || rate >= self.min_rate || introduces_coverage) {
            return;
        }
        self.inputs.insert(expanded.to_vec());
        self.covered.extend(coverage.iter().copied());
        self.traces.push(Trace { fstring, rate, coverage });
    }

    fn close(mut self) -> Generation {
        self.traces.sort_by(|a, b| b.rate.partial_cmp(&a.rate).unwrap_or(std::cmp::Ordering::Equal));
        self.traces.truncate(self.max_generation_size);
        let min_rate = self.traces.last().map(|t| t.rate).unwrap_or(0.0);
        Generation { min_rate, traces: self.traces, inputs: self.inputs, covered: self.covered }
    }
}

/// Literal substrings and alphabet-edge characters pulled from the
/// pattern's own AST, used to seed the initial population and as the
/// "insert something plausible" source for mutation.
struct FuzzContext {
    parts: Vec<Vec<UChar>>,
    interesting_chars: Vec<UChar>,
}

impl FuzzContext {
    fn build(pattern: &Pattern, alphabet: &ICharSet) -> Self {
        let mut parts = Vec::new();
        collect_parts(&pattern.node, &mut parts);

        let mut interesting_chars = Vec::new();
        for member in alphabet.members() {
            for &(lo, hi) in member.ranges().ranges() {
                interesting_chars.push(lo);
                if hi > lo + 1 {
                    interesting_chars.push(hi - 1);
                }
            }
        }
        // None of the pattern's own atoms can ever make the overall match
        // fail. A run built only from them can always succeed along some
        // path, and a backtracking engine that succeeds never explores
        // the ambiguity that makes it slow — mutation needs at least one
        // character the pattern cannot consume at all so a pumped run can
        // be capped with a guaranteed mismatch, the same way the
        // automaton checker's attack strings are terminated.
        interesting_chars.push(alphabet.sentinel());

        FuzzContext { parts, interesting_chars }
    }
}

/// Collects maximal runs of two or more consecutive literal characters as
/// reusable "parts" — e.g. `abc` in `a(bc)+d` — the same way an attacker
/// hand-crafting a payload would recognize a literal anchor worth
/// repeating verbatim rather than character by character.
fn collect_parts(node: &Node, parts: &mut Vec<Vec<UChar>>) {
    match node {
        Node::Sequence(ns) => {
            let mut run: Vec<UChar> = Vec::new();
            for n in ns {
                if let Node::Character(c) = n {
                    if let Some(&(lo, _)) = c.ranges().ranges().first() {
                        run.push(lo);
                        continue;
                    }
                }
                if run.len() >= 2 {
                    parts.push(std::mem::take(&mut run));
                } else {
                    run.clear();
                }
                collect_parts(n, parts);
            }
            if run.len() >= 2 {
                parts.push(run);
            }
        }
        Node::Disjunction(ns) => ns.iter().for_each(|n| collect_parts(n, parts)),
        Node::Capture(n, _)
        | Node::NamedCapture(n, _, _)
        | Node::Group(n)
        | Node::Star { node: n, .. }
        | Node::Plus { node: n, .. }
        | Node::Question { node: n, .. }
        | Node::Repeat { node: n, .. }
        | Node::LookAhead { node: n, .. }
        | Node::LookBehind { node: n, .. } => collect_parts(n, parts),
        _ => {}
    }
}

fn build_seeds(ctx: &FuzzContext, seed_limit: usize) -> Vec<FString> {
    let mut seeds = vec![FString::new(Vec::new())];
    for part in &ctx.parts {
        seeds.push(FString::new(part.iter().map(|&c| FElem::Wrap(c)).collect()));
        if seeds.len() >= seed_limit {
            seeds.truncate(seed_limit);
            return seeds;
        }
    }
    for &c in &ctx.interesting_chars {
        seeds.push(FString::new(vec![FElem::Wrap(c)]));
        seeds.push(FString::new(vec![FElem::Wrap(c), FElem::Repeat { m: 1, size: 1 }]));
        if seeds.len() >= seed_limit {
            break;
        }
    }
    seeds.truncate(seed_limit);
    seeds
}

/// Numeric knobs copied out of [`Config`] up front, so the rest of this
/// module can hold them alongside a `&mut dyn Random` borrowed from
/// `config.random` without fighting the borrow checker over one struct.
struct Params {
    attack_limit: u64,
    max_attack_size: usize,
    max_degree: u32,
    population_limit: u64,
    max_generation_size: usize,
    max_iteration: usize,
    cross_size: usize,
    mutate_size: usize,
    max_seed_size: usize,
    seed_limit: usize,
}

impl Params {
    fn from_config(config: &Config) -> Self {
        Params {
            attack_limit: config.attack_limit,
            max_attack_size: config.max_attack_size,
            max_degree: config.max_degree,
            population_limit: config.population_limit,
            max_generation_size: config.max_generation_size,
            max_iteration: config.max_iteration,
            cross_size: config.cross_size,
            mutate_size: config.mutate_size,
            max_seed_size: config.max_seed_size,
            seed_limit: config.seed_limit,
        }
    }
}

/// Runs the fuzz checker standalone: compiles `pattern` to a VM program
/// and alphabet itself. [`crate::hybrid`] instead calls [`check_with`]
/// directly, reusing the automaton path's already-built program so the
/// same pattern is never compiled twice.
pub fn check(pattern: &Pattern, config: &mut Config, timeout: &Timeout) -> Result<Diagnostics, Error> {
    let alphabet = enfa::build_alphabet(pattern);
    let program = ir::compile(pattern, alphabet.clone());
    check_with(pattern, &program, &alphabet, config, timeout)
}

pub fn check_with(
    pattern: &Pattern,
    program: &Program,
    alphabet: &ICharSet,
    config: &mut Config,
    timeout: &Timeout,
) -> Result<Diagnostics, Error> {
    let ctx = FuzzContext::build(pattern, alphabet);
    let params = Params::from_config(config);
    let rng = config.random.as_mut();
    run(program, &ctx, &params, rng, timeout)
}

fn run(
    program: &Program,
    ctx: &FuzzContext,
    params: &Params,
    rng: &mut dyn Random,
    timeout: &Timeout,
) -> Result<Diagnostics, Error> {
    let mut population = Population::from_generation(&Generation::initial(), params.max_generation_size, true);

    for seed in build_seeds(ctx, params.seed_limit) {
        timeout.check("fuzz::seed", Checker::Fuzz)?;
        let expanded = seed.to_uchars(1);
        if expanded.len() > params.max_seed_size {
            continue;
        }
        if let Some(attack) = evaluate(program, &seed, &expanded, params, &mut population)? {
            return Ok(Diagnostics::Vulnerable { attack, complexity: None, checker: Checker::Fuzz });
        }
    }

    let mut generation = population.close();

    for _ in 0..params.max_iteration {
        timeout.check("fuzz::iteration", Checker::Fuzz)?;
        if generation.traces.is_empty() {
            break;
        }
        let mut population = Population::from_generation(&generation, params.max_generation_size, false);

        for _ in 0..params.cross_size {
            if generation.traces.len() < 2 {
                break;
            }
            let i = rng.next_int(generation.traces.len());
            let j = rng.next_int(generation.traces.len());
            let pos1 = rng.next_int(generation.traces[i].fstring.size() + 1);
            let pos2 = rng.next_int(generation.traces[j].fstring.size() + 1);
            let (a, b) = generation.traces[i].fstring.cross(&generation.traces[j].fstring, pos1, pos2);
            for child in [a, b] {
                let expanded = child.to_uchars(1);
                if let Some(attack) = evaluate(program, &child, &expanded, params, &mut population)? {
                    return Ok(Diagnostics::Vulnerable { attack, complexity: None, checker: Checker::Fuzz });
                }
            }
        }

        for _ in 0..params.mutate_size {
            if generation.traces.is_empty() {
                break;
            }
            let idx = rng.next_int(generation.traces.len());
            let child = mutate(&generation.traces[idx].fstring, ctx, rng);
            let expanded = child.to_uchars(1);
            if let Some(attack) = evaluate(program, &child, &expanded, params, &mut population)? {
                return Ok(Diagnostics::Vulnerable { attack, complexity: None, checker: Checker::Fuzz });
            }
        }

        generation = population.close();
    }

    Ok(Diagnostics::Safe { complexity: None, checker: Checker::Fuzz })
}

/// Runs one candidate's `n = 1` expansion under the population step
/// budget. A budget breach escalates straight to [`try_attack`] — no
/// point admitting a candidate into the next generation once it has
/// already proven itself — otherwise the candidate's rate/coverage is
/// offered to `population`.
fn evaluate(
    program: &Program,
    fstring: &FString,
    expanded: &[UChar],
    params: &Params,
    population: &mut Population,
) -> Result<Option<Vec<UChar>>, Error> {
    let mut tracer = FuzzTracer::new(params.population_limit);
    match vm::search(program, expanded, &mut tracer) {
        Err(VmError::LimitExceeded) => Ok(try_attack(program, fstring, 1, params)),
        Ok(_) => {
            let rate = tracer.rate(expanded.len());
            population.try_admit(fstring.clone(), expanded, rate, tracer.coverage().clone());
            Ok(None)
        }
    }
}

/// Escalates `fstring`'s pump multiplier to actually drive the VM past
/// `attackLimit`, trying the exponential assumption first (§4.4: `n` that
/// makes `2^n` reach the limit) and falling back through decreasing
/// polynomial degrees down to 2. Returns the winning expansion, capped at
/// `maxAttackSize`.
fn try_attack(program: &Program, fstring: &FString, current_n: u64, params: &Params) -> Option<Vec<UChar>> {
    let n0 = current_n.max(1) as f64;

    let exponential_r = ((params.attack_limit as f64).log2() / n0).max(1.0);
    if let Some(attack) = try_multiplier((n0 * exponential_r).ceil() as u64, program, fstring, params) {
        return Some(attack);
    }

    let mut degree = params.max_degree.max(2);
    while degree >= 2 {
        let r = (params.attack_limit as f64).powf(1.0 / degree as f64) / n0;
        if r >= 1.0 {
            if let Some(attack) = try_multiplier((n0 * r).ceil() as u64, program, fstring, params) {
                return Some(attack);
            }
        }
        degree -= 1;
    }
    None
}

fn try_multiplier(n: u64, program: &Program, fstring: &FString, params: &Params) -> Option<Vec<UChar>> {
    let mut expanded = fstring.to_uchars(n);
    if expanded.len() > params.max_attack_size {
        expanded.truncate(params.max_attack_size);
    }
    let mut tracer = LimitTracer::new(params.attack_limit);
    match vm::search(program, &expanded, &mut tracer) {
        Err(VmError::LimitExceeded) => Some(expanded),
        Ok(_) => None,
    }
}

fn mutate(parent: &FString, ctx: &FuzzContext, rng: &mut dyn Random) -> FString {
    let mut child = parent.clone();
    match rng.next_int(6) {
        0 => mutate_repeat(&mut child, rng),
        1 => mutate_insert(&mut child, ctx, rng),
        2 => mutate_insert_part(&mut child, ctx, rng),
        3 => mutate_update(&mut child, ctx, rng),
        4 => mutate_copy(&mut child, rng),
        _ => mutate_delete(&mut child, rng),
    }
    child
}

/// Rescales a random existing `Repeat`'s `m`, either doubling it or
/// nudging it by a small additive delta — the two escalation shapes §4.6
/// names, picked with equal odds.
fn mutate_repeat(f: &mut FString, rng: &mut dyn Random) {
    let idxs: Vec<usize> =
        f.elems.iter().enumerate().filter(|(_, e)| matches!(e, FElem::Repeat { .. })).map(|(i, _)| i).collect();
    if idxs.is_empty() {
        return;
    }
    let i = idxs[rng.next_int(idxs.len())];
    if let FElem::Repeat { m, .. } = &mut f.elems[i] {
        if rng.bool() {
            *m = m.saturating_mul(2).max(1);
        } else {
            let delta = rng.next_int(21) as i64 - 10;
            *m = (*m as i64 + delta).max(0) as u32;
        }
    }
}

fn random_wrap(ctx: &FuzzContext, rng: &mut dyn Random) -> FElem {
    FElem::Wrap(ctx.interesting_chars[rng.next_int(ctx.interesting_chars.len())])
}

fn mutate_insert(f: &mut FString, ctx: &FuzzContext, rng: &mut dyn Random) {
    let pos = rng.next_int(f.size() + 1);
    let elem = if f.size() == 0 || rng.bool() {
        random_wrap(ctx, rng)
    } else {
        FElem::Repeat { m: rng.next_int(10) as u32, size: rng.next_int(f.size()) }
    };
    f.insert_at(pos, elem);
}

/// Inserts one of the pattern's own literal substrings verbatim,
/// optionally followed by a `Repeat` marker that pumps it — the "reuse a
/// plausible anchor" counterpart to [`mutate_insert`]'s single-character
/// inserts.
fn mutate_insert_part(f: &mut FString, ctx: &FuzzContext, rng: &mut dyn Random) {
    if ctx.parts.is_empty() {
        return mutate_insert(f, ctx, rng);
    }
    let part = &ctx.parts[rng.next_int(ctx.parts.len())];
    let pos = rng.next_int(f.size() + 1);
    let mut elems: Vec<FElem> = part.iter().map(|&c| FElem::Wrap(c)).collect();
    if rng.bool() {
        let len = elems.len();
        elems.push(FElem::Repeat { m: rng.next_int(10) as u32, size: len });
    }
    for (offset, e) in elems.into_iter().enumerate() {
        f.insert_at(pos + offset, e);
    }
}

fn mutate_update(f: &mut FString, ctx: &FuzzContext, rng: &mut dyn Random) {
    if f.size() == 0 {
        return;
    }
    let pos = rng.next_int(f.size());
    let elem = if rng.bool() {
        random_wrap(ctx, rng)
    } else {
        FElem::Repeat { m: rng.next_int(10) as u32, size: rng.next_int(f.size()) }
    };
    f.replace_at(pos, elem);
}

fn mutate_copy(f: &mut FString, rng: &mut dyn Random) {
    if f.size() == 0 {
        return;
    }
    let i = rng.next_int(f.size());
    let j = i + rng.next_int(f.size() - i + 1);
    let slice = f.elems[i..j].to_vec();
    let pos = rng.next_int(f.size() + 1);
    for (offset, e) in slice.into_iter().enumerate() {
        f.insert_at(pos + offset, e);
    }
}

fn mutate_delete(f: &mut FString, rng: &mut dyn Random) {
    if f.size() < 2 {
        return;
    }
    let i = rng.next_int(f.size());
    let j = i + 1 + rng.next_int(f.size() - i);
    f.delete(i, j);
}
