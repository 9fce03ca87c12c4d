//! Converts the external parser's output — `regex-syntax`'s `Hir` — into
//! this crate's own [`Pattern`](super::Pattern) AST: the same shape of
//! problem as any `Hir`-walking conversion — walk the external tree,
//! reshape into our own structures.
//!
//! `regex-syntax`'s grammar rejects look-around and back-references at the
//! AST-parsing stage (`(?=`, `(?!`, `(?<=`, `(?<!` and `\1`..`\9` are not
//! valid concrete syntax for it, only for engines that backtrack) — and it
//! rejects the *entire pattern*, not just the unsupported sub-expression,
//! the moment one appears anywhere in the source. `spec.md` §4.2 still
//! wants those constructs to reach the hybrid fuzz fallback, which needs a
//! real [`Node::LookAhead`] / [`Node::LookBehind`] / [`Node::BackReference`]
//! tree to run against — an `Unsupported` error this early would make that
//! fallback unreachable from source text at all. [`parse`] pre-scans the
//! raw source for that syntax before ever invoking `regex-syntax`; if found,
//! [`super::raw`]'s own recursive-descent reader builds the `Pattern`
//! directly, otherwise `regex-syntax` parses as before.
//!
//! A pattern `regex-syntax` itself calls `Unsupported` for some other
//! reason (it has a couple of shorter-lived restrictions on other
//! constructs) still maps to [`Error::Unsupported`], preserving `spec.md`
//! §4.2's outcome for whatever is left in that category.

use regex_syntax::ast::{self, Error as AstError};
use regex_syntax::hir::{Class, Hir, HirKind, Look};
use regex_syntax::{Error as HirError, ParserBuilder};
use reguard_chars::{IChar, IntervalSet, UChar};

use super::raw;
use super::{AssertionKind, FlagSet, Node, Pattern, RepeatMax};
use crate::error::{Checker, Error};

/// Parses `source` under ECMA-262 `flags` (`g,i,m,s,u,y`, in any order,
/// duplicates rejected) into this crate's [`Pattern`] AST.
pub fn parse(source: &str, flags: &str) -> Result<Pattern, Error> {
    let flags = parse_flags(flags)?;

    if raw::needs_raw_parser(source) {
        let node = raw::parse(source)?;
        return Ok(Pattern { node, flags });
    }

    let hir = ParserBuilder::new()
        .case_insensitive(flags.ignore_case)
        .multi_line(flags.multiline)
        .dot_matches_new_line(flags.dot_all)
        .unicode(flags.unicode)
        .utf8(true)
        .build()
        .parse(source)
        .map_err(|e| classify_parse_error(&e))?;

    Ok(Pattern { node: hir_to_node(&hir), flags })
}

fn parse_flags(flags: &str) -> Result<FlagSet, Error> {
    let mut out = FlagSet::default();
    for c in flags.chars() {
        let slot = match c {
            'g' => &mut out.global,
            'i' => &mut out.ignore_case,
            'm' => &mut out.multiline,
            's' => &mut out.dot_all,
            'u' => &mut out.unicode,
            'y' => &mut out.sticky,
            other => {
                return Err(Error::InvalidRegExp(format!("unknown regex flag '{other}'")))
            }
        };
        if *slot {
            return Err(Error::InvalidRegExp(format!("duplicate regex flag '{c}'")));
        }
        *slot = true;
    }
    Ok(out)
}

fn classify_parse_error(e: &HirError) -> Error {
    if let HirError::Parse(ast_err) = e {
        if let Some(msg) = unsupported_message(ast_err) {
            return Error::Unsupported(msg.to_string(), Checker::Automaton);
        }
    }
    Error::InvalidRegExp(e.to_string())
}

fn unsupported_message(e: &AstError) -> Option<&'static str> {
    match e.kind() {
        ast::ErrorKind::UnsupportedBackreference => Some("back-reference"),
        ast::ErrorKind::UnsupportedLookAround => {
            // The AST parser doesn't distinguish look-ahead from
            // look-behind in its error kind; look behind the match for the
            // tell-tale `<` of `(?<=`/`(?<!`.
            let span_start = e.span().start.offset;
            let pattern = e.pattern();
            if pattern[..span_start].ends_with('<') || pattern[span_start..].starts_with("(?<") {
                Some("look-behind assertion")
            } else {
                Some("look-ahead assertion")
            }
        }
        _ => None,
    }
}

fn hir_to_node(hir: &Hir) -> Node {
    match hir.kind() {
        HirKind::Empty => Node::Sequence(Vec::new()),
        HirKind::Literal(lit) => {
            let s = String::from_utf8_lossy(&lit.0);
            let chars: Vec<Node> = s.chars().map(|c| Node::Character(IChar::single(c as UChar))).collect();
            match chars.len() {
                1 => chars.into_iter().next().unwrap(),
                _ => Node::Sequence(chars),
            }
        }
        HirKind::Class(class) => class_to_node(class),
        HirKind::Look(look) => Node::Assertion(look_to_assertion(*look)),
        HirKind::Repetition(rep) => {
            let sub = hir_to_node(&rep.sub);
            let non_greedy = !rep.greedy;
            match (rep.min, rep.max) {
                (0, None) => Node::Star { non_greedy, node: Box::new(sub) },
                (1, None) => Node::Plus { non_greedy, node: Box::new(sub) },
                (0, Some(1)) => Node::Question { non_greedy, node: Box::new(sub) },
                (min, max) => {
                    let max = match max {
                        None => RepeatMax::Unbounded,
                        Some(m) if m == min => RepeatMax::Exact,
                        Some(m) => RepeatMax::Bounded(m),
                    };
                    Node::Repeat { min, max, non_greedy, node: Box::new(sub) }
                }
            }
        }
        HirKind::Capture(cap) => {
            let sub = Box::new(hir_to_node(&cap.sub));
            match &cap.name {
                Some(name) => Node::NamedCapture(sub, name.to_string(), cap.index),
                None => Node::Capture(sub, cap.index),
            }
        }
        HirKind::Concat(subs) => Node::Sequence(subs.iter().map(hir_to_node).collect()),
        HirKind::Alternation(subs) => Node::Disjunction(subs.iter().map(hir_to_node).collect()),
    }
}

fn look_to_assertion(look: Look) -> AssertionKind {
    match look {
        Look::Start | Look::StartLF | Look::StartCRLF => AssertionKind::LineBegin,
        Look::End | Look::EndLF | Look::EndCRLF => AssertionKind::LineEnd,
        Look::WordAsciiNegate | Look::WordUnicodeNegate => {
            AssertionKind::WordBoundary { invert: true }
        }
        // Half/start/end word boundaries have no dedicated AST node in
        // this crate; approximating them as a plain (non-inverted) word
        // boundary is conservative for backtracking-time analysis, since
        // it only affects which zero-width positions are *rejected*, not
        // the consuming structure the checker reasons about.
        _ => AssertionKind::WordBoundary { invert: false },
    }
}

fn class_to_node(class: &Class) -> Node {
    let ranges: Vec<(UChar, UChar)> = match class {
        Class::Unicode(c) => c
            .iter()
            .map(|r| (r.start() as UChar, r.end() as UChar + 1))
            .collect(),
        Class::Bytes(c) => c
            .iter()
            .map(|r| (r.start() as UChar, r.end() as UChar + 1))
            .collect(),
    };
    let items = vec![IChar::new(IntervalSet::from_ranges(ranges))];
    Node::CharacterClass { invert: false, items }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn simple_literal() {
        let p = parse("abc", "").unwrap();
        assert!(matches!(p.node, Node::Sequence(ref ns) if ns.len() == 3));
    }

    #[test]
    fn star_is_non_constant() {
        let p = parse("a*", "").unwrap();
        assert!(!p.is_constant());
    }

    #[test]
    fn bounded_repeat_is_constant() {
        let p = parse("a{3,5}", "").unwrap();
        assert!(!p.is_constant());
        let p = parse("a{3}", "").unwrap();
        assert!(p.is_constant());
    }

    #[test]
    fn lookahead_routes_through_the_raw_parser() {
        let p = parse("(?=x)", "").unwrap();
        assert!(matches!(p.node, Node::LookAhead { invert: false, .. }));
    }

    #[test]
    fn lookbehind_routes_through_the_raw_parser() {
        let p = parse("(?<=x)", "").unwrap();
        assert!(matches!(p.node, Node::LookBehind { invert: false, .. }));
    }

    #[test]
    fn backreference_routes_through_the_raw_parser() {
        let p = parse(r"(a)\1", "").unwrap();
        match p.node {
            Node::Sequence(ref terms) => {
                assert!(matches!(terms[0], Node::Capture(_, 1)));
                assert!(matches!(terms[1], Node::BackReference(1)));
            }
            ref other => panic!("expected a sequence, got {other:?}"),
        }
    }

    #[test]
    fn malformed_syntax_is_invalid_not_unsupported() {
        let err = parse("a(", "").unwrap_err();
        assert!(matches!(err, Error::InvalidRegExp(_)));
    }

    #[test]
    fn unknown_flag_is_invalid() {
        let err = parse("a", "z").unwrap_err();
        assert!(matches!(err, Error::InvalidRegExp(_)));
    }
}
