//! Scenario tests driving the crate end to end through
//! [`reguard_core::check`], the way a caller handing over raw pattern
//! source actually would.

use reguard_core::{check, Complexity, Config, Diagnostics};

fn is_safe(result: &Diagnostics) -> bool {
    matches!(result, Diagnostics::Safe { .. })
}

#[test]
fn literal_is_safe_constant() {
    let mut config = Config::default();
    let result = check("abc", "", &mut config);
    assert!(is_safe(&result));
    assert!(matches!(result, Diagnostics::Safe { complexity: Some(Complexity::Constant), .. }));
}

#[test]
fn bounded_repeat_then_literal_is_safe_linear() {
    let mut config = Config::default();
    let result = check("a{3,5}b", "", &mut config);
    assert!(is_safe(&result));
    assert!(matches!(result, Diagnostics::Safe { complexity: Some(Complexity::Linear), .. }));
}

#[test]
fn star_then_literal_is_safe_linear() {
    let mut config = Config::default();
    let result = check("a*b", "", &mut config);
    assert!(is_safe(&result));
}

#[test]
fn nested_star_is_exponential() {
    let mut config = Config::default();
    let result = check("(a*)*$", "", &mut config);
    assert!(result.is_vulnerable());
    assert!(matches!(result, Diagnostics::Vulnerable { complexity: Some(Complexity::Exponential(_)), .. }));
}

#[test]
fn nested_plus_is_exponential() {
    let mut config = Config::default();
    let result = check("(a+)+$", "", &mut config);
    assert!(result.is_vulnerable());
    match &result {
        Diagnostics::Vulnerable { attack, .. } => assert!(!attack.is_empty()),
        other => panic!("expected Vulnerable, got {other:?}"),
    }
}

#[test]
fn alternation_of_identical_branches_is_vulnerable() {
    let mut config = Config::default();
    let result = check("^(a|a)*$", "", &mut config);
    assert!(result.is_vulnerable());
}

#[test]
fn chained_stars_are_polynomial_or_worse() {
    let mut config = Config::default();
    let result = check("^a*a*a*b$", "", &mut config);
    assert!(result.is_vulnerable());
    match result {
        Diagnostics::Vulnerable { complexity: Some(Complexity::Polynomial(degree, _)), .. } => {
            assert!(degree >= 2);
        }
        Diagnostics::Vulnerable { complexity: Some(Complexity::Exponential(_)), .. } => {}
        other => panic!("expected a vulnerable polynomial/exponential verdict, got {other:?}"),
    }
}

#[test]
fn invalid_syntax_is_unknown() {
    let mut config = Config::default();
    let result = check("(", "", &mut config);
    assert!(matches!(result, Diagnostics::Unknown { .. }));
}

#[test]
fn unsupported_flag_is_unknown() {
    let mut config = Config::default();
    let result = check("abc", "q", &mut config);
    assert!(matches!(result, Diagnostics::Unknown { .. }));
}

/// The automaton checker can't model look-ahead at all, but source text
/// containing one still reaches a verdict: the raw-syntax pre-scan in
/// `ast::from_hir` catches `(?=` before `regex-syntax` ever sees the
/// pattern and hands it to the hand-rolled reader in `ast::raw` instead, so
/// `Hybrid` still gets a real `Pattern` to try the automaton checker
/// against, and falls back to the fuzz checker once that checker reports
/// `Unsupported`. The nested `(a+)+$` inside the look-ahead is the classic
/// catastrophic-backtracking shape, and the trailing `b` that can never
/// match an all-`a` string forces the VM to exhaust every way of splitting
/// the pumped run before giving up — exactly the scenario the fuzz search
/// is built to catch.
#[test]
fn lookahead_via_source_text_reaches_the_fuzz_fallback() {
    let mut config = Config::default();
    let result = check("^(?=(a+)+$)b", "", &mut config);
    assert_eq!(result.checker(), Some(reguard_core::Checker::Fuzz));
    match result {
        Diagnostics::Vulnerable { complexity: None, .. } => {}
        Diagnostics::Safe { complexity: None, .. } => {}
        other => panic!("expected a fuzz-checker Vulnerable or Safe(None) verdict, got {other:?}"),
    }
}

#[test]
fn same_seed_gives_same_verdict() {
    use reguard_core::config::CheckerKind;
    use reguard_core::random::StdRandom;

    let pattern = "(a+)+$";
    let mut config_a = Config::builder()
        .checker(CheckerKind::Fuzz)
        .random(Box::new(StdRandom::seed(42)))
        .build();
    let mut config_b = Config::builder()
        .checker(CheckerKind::Fuzz)
        .random(Box::new(StdRandom::seed(42)))
        .build();

    let result_a = check(pattern, "", &mut config_a);
    let result_b = check(pattern, "", &mut config_b);
    assert_eq!(result_a.is_vulnerable(), result_b.is_vulnerable());
}

#[test]
fn attack_string_respects_max_attack_size() {
    let mut config = Config::builder().max_attack_size(64).build();
    let result = check("(a+)+$", "", &mut config);
    if let Diagnostics::Vulnerable { attack, .. } = result {
        assert!(attack.len() <= 64);
    }
}
