use bon::Builder;

use crate::random::{Random, StdRandom};
use crate::timeout::Timeout;

/// Which checker(s) `check` is allowed to run. See `spec.md` §4.7.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CheckerKind {
    Automaton,
    Fuzz,
    #[default]
    Hybrid,
}

/// Every tunable named in `spec.md` §6, built the way the teacher builds
/// its configuration structs (`bon::Builder`, one `#[builder(default =
/// ...)]` per field instead of a hand-written `Default` impl).
#[derive(Builder)]
pub struct Config {
    #[builder(default)]
    pub checker: CheckerKind,

    #[builder(default = Timeout::NO_TIMEOUT)]
    pub timeout: Timeout,

    /// Upper bound on the length of an emitted attack string.
    #[builder(default = 10_000)]
    pub max_attack_size: usize,

    /// Step budget treated as "catastrophic" when validating a witness or
    /// fuzzing for one.
    #[builder(default = 1_000_000)]
    pub attack_limit: u64,

    /// Used to scale the `n` parameter for polynomial witnesses.
    #[builder(default = 2.0)]
    pub step_rate: f64,

    /// Hard cap on ordered-NFA state count; breaching it (or its square,
    /// for the product automaton) makes the automaton checker
    /// `Unsupported`.
    #[builder(default = 35_000)]
    pub max_nfa_size: usize,

    /// Hybrid-only cutoff: patterns with at least this many repetition
    /// quantifiers skip the automaton path entirely.
    #[builder(default = 30)]
    pub max_repeat_count: usize,

    /// Hybrid-only cutoff: patterns with at least this many AST nodes skip
    /// the automaton path entirely.
    #[builder(default = 1_500)]
    pub max_pattern_size: usize,

    #[builder(default = 10_000)]
    pub seed_limit: usize,

    #[builder(default = 100_000)]
    pub population_limit: u64,

    #[builder(default = 25)]
    pub cross_size: usize,

    #[builder(default = 50)]
    pub mutate_size: usize,

    #[builder(default = 100)]
    pub max_seed_size: usize,

    #[builder(default = 100)]
    pub max_generation_size: usize,

    #[builder(default = 30)]
    pub max_iteration: usize,

    #[builder(default = 4)]
    pub max_degree: u32,

    #[builder(default = Box::new(StdRandom::from_entropy()))]
    pub random: Box<dyn Random>,
}

impl Default for Config {
    fn default() -> Self {
        Config::builder().build()
    }
}
