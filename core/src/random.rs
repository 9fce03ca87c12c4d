use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// A PRNG source injected into the fuzz checker, per `spec.md` §9's "PRNG
/// injection" design note. Narrowed to the single `between` contract the
/// fuzz checker needs — mutation/crossover sites never need anything
/// fancier than "an index/count in this range" — so tests can swap in a
/// deterministic sequence without depending on `rand`'s `Rng` trait object
/// safety quirks.
pub trait Random {
    /// Returns an integer in `[lo, hi)`. Panics if `lo >= hi`.
    fn between(&mut self, lo: usize, hi: usize) -> usize;

    fn next_int(&mut self, n: usize) -> usize {
        self.between(0, n)
    }

    fn bool(&mut self) -> bool {
        self.between(0, 2) == 1
    }
}

/// The default [`Random`] source: a seeded `rand::rngs::StdRng`, so a given
/// seed reproduces byte-identical fuzz runs (§5's determinism requirement).
pub struct StdRandom {
    rng: StdRng,
}

impl StdRandom {
    pub fn seed(seed: u64) -> Self {
        StdRandom { rng: StdRng::seed_from_u64(seed) }
    }

    pub fn from_entropy() -> Self {
        StdRandom { rng: StdRng::from_entropy() }
    }
}

impl Random for StdRandom {
    fn between(&mut self, lo: usize, hi: usize) -> usize {
        self.rng.gen_range(lo..hi)
    }
}
