//! Decides whether an ECMA-262 regular expression can be driven into
//! catastrophic backtracking (ReDoS), and if so, produces a concrete
//! attack string that reproduces the blow-up.
//!
//! Two independent checkers back the decision. The automaton checker
//! (`automaton`, `graph`, `nfa`, `enfa`) compiles a pattern to an ordered
//! NFA and reasons about its product-automaton structure — exact, but
//! blind to lookaround and back-references, and bounded by `maxNFASize`.
//! The fuzz checker (`fuzz`, `vm`, `ir`) compiles the same pattern to
//! backtracking-VM bytecode and evolves attack strings against it by
//! genetic search — it can exercise anything the VM can run, including
//! lookaround and back-references, but only ever finds a witness, never
//! proves their absence. `hybrid` is the frontend that picks between
//! them, and the only module most callers need.
//!
//! ```
//! use reguard_core::{check, Config};
//!
//! let mut config = Config::default();
//! let diagnostics = check("(a+)+$", "", &mut config);
//! assert!(diagnostics.is_vulnerable());
//! ```
#![cfg_attr(docsrs, feature(doc_auto_cfg))]

pub mod ast;
pub mod automaton;
pub mod config;
pub mod diagnostics;
pub mod enfa;
pub mod error;
pub mod fuzz;
pub mod graph;
pub mod hybrid;
pub mod ir;
pub mod nfa;
pub mod random;
pub mod timeout;
pub mod vm;
pub mod witness;

pub use config::{CheckerKind, Config};
pub use diagnostics::{Complexity, Diagnostics};
pub use error::{Checker, Error};
pub use timeout::Timeout;

/// Parses `source` under `flags` (any of `gimsuy`, ECMA-262 syntax) and
/// runs whichever checker(s) `config.checker` selects.
///
/// Infallible: a syntactically invalid pattern, a timeout, or any other
/// failure this crate can raise is folded into
/// [`Diagnostics::Unknown`](diagnostics::Diagnostics::Unknown) rather than
/// returned as an `Err` — there is always an answer to give back, even if
/// that answer is "could not be determined".
///
/// `config` is taken by `&mut` rather than `&`: the fuzz checker draws
/// from `config.random` as it searches, so its PRNG state genuinely
/// advances call over call, the same way a caller-owned `StdRng` would.
pub fn check(source: &str, flags: &str, config: &mut Config) -> Diagnostics {
    let timeout = config.timeout;
    match ast::from_hir::parse(source, flags) {
        Ok(pattern) => hybrid::check(&pattern, config, &timeout),
        Err(err) => Diagnostics::Unknown { error: err.to_string() },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn literal_pattern_is_safe() {
        let mut config = Config::default();
        let result = check("abc", "", &mut config);
        assert!(!result.is_vulnerable());
    }

    #[test]
    fn nested_star_is_vulnerable() {
        let mut config = Config::default();
        let result = check("(a*)*$", "", &mut config);
        assert!(result.is_vulnerable());
    }

    #[test]
    fn invalid_pattern_is_unknown() {
        let mut config = Config::default();
        let result = check("(", "", &mut config);
        assert!(matches!(result, Diagnostics::Unknown { .. }));
    }

    #[test]
    fn bad_flag_is_unknown() {
        let mut config = Config::default();
        let result = check("abc", "q", &mut config);
        assert!(matches!(result, Diagnostics::Unknown { .. }));
    }
}
