//! `Witness[A]` (`spec.md` §3) and the attack-string construction rules of
//! §4.4: a witness names the repeated structure a vulnerability pumps on,
//! independent of how many times it gets pumped; turning it into an
//! actual attack string is just picking `n` from the requested
//! `attackLimit` and expanding.

/// `pumps: ordered seq of (prefix, pump)` plus `suffix`. The attack
/// string for repetition `n` is `prefix₁ pump₁ⁿ prefix₂ pump₂ⁿ … suffix`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Witness<A> {
    pub pumps: Vec<(Vec<A>, Vec<A>)>,
    pub suffix: Vec<A>,
}

impl<A: Clone> Witness<A> {
    pub fn map<B>(&self, f: impl Fn(&A) -> B) -> Witness<B> {
        Witness {
            pumps: self
                .pumps
                .iter()
                .map(|(prefix, pump)| {
                    (prefix.iter().map(&f).collect(), pump.iter().map(&f).collect())
                })
                .collect(),
            suffix: self.suffix.iter().map(&f).collect(),
        }
    }

    /// `Σ|pumpᵢ|`, the total pumped-per-repetition length the attack-size
    /// formulas of §4.4 scale against.
    pub fn pump_length(&self) -> usize {
        self.pumps.iter().map(|(_, pump)| pump.len()).sum()
    }

    /// Expands the witness at repetition count `n`:
    /// `prefix₁ pump₁ⁿ prefix₂ pump₂ⁿ … suffix`.
    pub fn expand(&self, n: u64) -> Vec<A> {
        let mut out = Vec::new();
        for (prefix, pump) in &self.pumps {
            out.extend(prefix.iter().cloned());
            for _ in 0..n {
                out.extend(pump.iter().cloned());
            }
        }
        out.extend(self.suffix.iter().cloned());
        out
    }
}

/// The repetition count `n` to use when expanding a witness for a given
/// `degree` (`None` = exponential, `Some(k)` = polynomial of degree `k`)
/// so the expanded VM step count is expected to reach `attack_limit`.
pub fn pump_count(degree: Option<u32>, pump_length: usize, attack_limit: u64) -> u64 {
    let pump_length = pump_length.max(1) as f64;
    let n = match degree {
        None => (attack_limit as f64).log2() / pump_length,
        Some(k) => (attack_limit as f64).powf(1.0 / k as f64) / pump_length,
    };
    (n.ceil() as u64).max(1)
}

/// Expands `witness` to provoke `attack_limit` VM steps, truncating to
/// `max_attack_size` if the natural expansion would be longer (§4.4:
/// "cap expanded length at `maxAttackSize`; if exceeded, truncate and
/// report as Vulnerable but with a shorter attack").
pub fn attack_string<A: Clone>(
    witness: &Witness<A>,
    degree: Option<u32>,
    attack_limit: u64,
    max_attack_size: usize,
) -> Vec<A> {
    let n = pump_count(degree, witness.pump_length(), attack_limit);
    let mut expanded = witness.expand(n);
    expanded.truncate(max_attack_size);
    expanded
}

#[cfg(test)]
mod tests {
    use super::*;

    fn witness() -> Witness<char> {
        Witness { pumps: vec![(vec!['a'], vec!['b'])], suffix: vec!['c'] }
    }

    #[test]
    fn expand_repeats_pump_n_times() {
        let w = witness();
        assert_eq!(w.expand(3), vec!['a', 'b', 'b', 'b', 'c']);
    }

    #[test]
    fn expand_zero_omits_pump_entirely() {
        let w = witness();
        assert_eq!(w.expand(0), vec!['a', 'c']);
    }

    #[test]
    fn pump_count_is_at_least_one() {
        assert_eq!(pump_count(None, 1, 1), 1);
    }

    #[test]
    fn exponential_pump_count_scales_with_log() {
        let n = pump_count(None, 1, 1_000_000);
        assert!(n >= 19 && n <= 21, "expected ~log2(1e6)=20, got {n}");
    }

    #[test]
    fn polynomial_pump_count_scales_with_root() {
        let n = pump_count(Some(2), 1, 1_000_000);
        assert!(n >= 999 && n <= 1001, "expected ~sqrt(1e6)=1000, got {n}");
    }

    #[test]
    fn attack_string_truncates_to_max_size() {
        let w = witness();
        let s = attack_string(&w, None, 1_000_000, 5);
        assert_eq!(s.len(), 5);
    }

    #[test]
    fn map_preserves_shape() {
        let w = witness();
        let mapped = w.map(|c| *c as u32);
        assert_eq!(mapped.pumps[0].1, vec!['b' as u32]);
        assert_eq!(mapped.suffix, vec!['c' as u32]);
    }
}
