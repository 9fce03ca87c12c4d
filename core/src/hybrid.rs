//! The frontend policy of `spec.md` §4.7: the single entry point that
//! decides which checker(s) actually run and folds whatever they report
//! into a [`Diagnostics`] — the top-level interface is infallible by
//! design (every [`Error`] this crate can raise ends up represented as
//! `Diagnostics::Unknown` rather than propagated), since "I couldn't
//! determine an answer" is itself a valid answer for a security tool to
//! give a caller.
//!
//! `CheckerKind::Hybrid` (the default) tries the automaton checker first
//! and falls back to the fuzz checker exactly once, only when the
//! automaton checker reports `Unsupported` — a construct it can't model
//! at all (lookaround, back-references) or a size cap it refused to
//! cross. Any other error (a timeout, an unexpected failure) is not
//! retried; it surfaces directly as `Unknown`.
//!
//! Before trusting an automaton witness, this module re-runs it through
//! the VM under `attackLimit` (§4.4's open question about validating a
//! `Polynomial`/`Exponential` classification before reporting it): a
//! witness that doesn't actually reproduce the step blowup demotes the
//! automaton result to `Unsupported`, which — in `Hybrid` mode — hands
//! the pattern to the fuzz checker instead of reporting a false positive.

use reguard_chars::{ICharSet, UChar};

use crate::ast::Pattern;
use crate::automaton;
use crate::config::{CheckerKind, Config};
use crate::diagnostics::{Complexity, Diagnostics};
use crate::enfa;
use crate::error::{Checker, Error};
use crate::fuzz;
use crate::ir;
use crate::nfa;
use crate::timeout::Timeout;
use crate::vm::{self, LimitTracer, VmError};
use crate::witness::{self, Witness};

/// Runs whichever checker(s) `config.checker` selects and returns the
/// resulting diagnosis. Never returns an `Err`: every failure mode this
/// crate defines is represented in-band as `Diagnostics::Unknown`.
pub fn check(pattern: &Pattern, config: &mut Config, timeout: &Timeout) -> Diagnostics {
    match config.checker {
        CheckerKind::Automaton => run_automaton(pattern, config, timeout).unwrap_or_else(to_unknown),
        CheckerKind::Fuzz => fuzz::check(pattern, config, timeout).unwrap_or_else(to_unknown),
        CheckerKind::Hybrid => run_hybrid(pattern, config, timeout),
    }
}

fn to_unknown(err: Error) -> Diagnostics {
    Diagnostics::Unknown { error: err.to_string() }
}

fn run_hybrid(pattern: &Pattern, config: &mut Config, timeout: &Timeout) -> Diagnostics {
    match run_automaton(pattern, &*config, timeout) {
        Ok(diag) => diag,
        Err(Error::Unsupported(_, Checker::Automaton)) => {
            fuzz::check(pattern, config, timeout).unwrap_or_else(to_unknown)
        }
        Err(err) => to_unknown(err),
    }
}

/// §4.7's `maxRepeatCount`/`maxPatternSize` hybrid-only guards reject the
/// pattern as `Unsupported` before the automaton path is even attempted
/// — cheaper than building the ε-NFA just to discover it would have
/// breached `maxNFASize` anyway, and a pattern this large is exactly the
/// shape the fuzz checker was built to take over for.
fn run_automaton(pattern: &Pattern, config: &Config, timeout: &Timeout) -> Result<Diagnostics, Error> {
    if pattern.repeat_count() >= config.max_repeat_count || pattern.size() >= config.max_pattern_size {
        return Err(Error::Unsupported(
            "pattern exceeds the hybrid repeat-count/size guard".to_string(),
            Checker::Automaton,
        ));
    }

    let epsilon_nfa = enfa::compile(pattern, timeout)?;
    let nfa = nfa::compile(&epsilon_nfa, config.max_nfa_size, timeout)?;
    let complexity = automaton::check(pattern, &nfa, &epsilon_nfa.alphabet, config, timeout)?;
    let reported = complexity.clone();

    match complexity {
        Complexity::Constant | Complexity::Linear => {
            Ok(Diagnostics::Safe { complexity: Some(reported), checker: Checker::Automaton })
        }
        Complexity::Polynomial(degree, witness) => validate_and_report(
            pattern,
            &epsilon_nfa.alphabet,
            &witness,
            Some(degree),
            reported,
            config,
            timeout,
        ),
        Complexity::Exponential(witness) => {
            validate_and_report(pattern, &epsilon_nfa.alphabet, &witness, None, reported, config, timeout)
        }
    }
}

fn validate_and_report(
    pattern: &Pattern,
    alphabet: &ICharSet,
    witness: &Witness<UChar>,
    degree: Option<u32>,
    complexity: Complexity,
    config: &Config,
    timeout: &Timeout,
) -> Result<Diagnostics, Error> {
    timeout.check("hybrid::validate_witness", Checker::Automaton)?;
    let attack = witness::attack_string(witness, degree, config.attack_limit, config.max_attack_size);
    let program = ir::compile(pattern, alphabet.clone());
    let mut tracer = LimitTracer::new(config.attack_limit);
    match vm::search(&program, &attack, &mut tracer) {
        Err(VmError::LimitExceeded) => {
            Ok(Diagnostics::Vulnerable { attack, complexity: Some(complexity), checker: Checker::Automaton })
        }
        Ok(_) => Err(Error::Unsupported(
            "automaton witness did not reproduce under the VM".to_string(),
            Checker::Automaton,
        )),
    }
}
