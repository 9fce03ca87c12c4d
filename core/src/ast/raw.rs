//! A hand-rolled recursive-descent reader for the one corner of ECMA-262
//! syntax `regex-syntax` refuses to parse at all: patterns containing
//! look-around (`(?=`, `(?!`, `(?<=`, `(?<!`) or back-references (`\1`..`\9`,
//! `\k<name>`). `regex-syntax` rejects the *whole pattern* the moment either
//! appears anywhere in it, so once [`super::from_hir`]'s pre-scan trips,
//! there is no way to hand the rest of the pattern to `regex-syntax` either
//! — this module reads the entire pattern itself and builds [`Node`]
//! directly, the same shape of tree `from_hir::hir_to_node` builds from the
//! other frontend.
//!
//! Deliberately narrower than `regex-syntax`'s own grammar: no POSIX
//! classes, no Unicode property escapes, no named-class shorthand beyond
//! `\d\D\w\W\s\S`. Patterns that need those *and* a look-around or
//! back-reference in the same source string are rare enough that this
//! crate's job — deciding whether backtracking can blow up — doesn't need
//! to get those corners pixel-perfect, only structurally faithful enough
//! for the ε-NFA/VM to reason about.

use reguard_chars::{IChar, IntervalSet, UChar};

use super::{AssertionKind, Node};
use crate::error::Error;

/// Scans raw pattern source for the syntax `regex-syntax` can't parse at
/// all: look-around group openers and digit/`k<name>` back-references.
/// Conservative by design — a false positive just routes a pattern that
/// didn't need it through this module instead of `regex-syntax`, which
/// still produces the same tree for everything this module understands.
pub fn needs_raw_parser(source: &str) -> bool {
    let bytes = source.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'(' if starts_with_at(bytes, i, b"(?=")
                || starts_with_at(bytes, i, b"(?!")
                || starts_with_at(bytes, i, b"(?<=")
                || starts_with_at(bytes, i, b"(?<!") =>
            {
                return true;
            }
            b'\\' if i + 1 < bytes.len() && bytes[i + 1].is_ascii_digit() && bytes[i + 1] != b'0' => {
                return true;
            }
            b'\\' if starts_with_at(bytes, i, b"\\k<") => {
                return true;
            }
            _ => {}
        }
        i += 1;
    }
    false
}

fn starts_with_at(bytes: &[u8], i: usize, needle: &[u8]) -> bool {
    bytes[i..].starts_with(needle)
}

pub fn parse(source: &str) -> Result<Node, Error> {
    let mut parser = Parser { chars: source.chars().collect(), pos: 0, next_capture: 1 };
    let node = parser.parse_disjunction()?;
    if parser.pos != parser.chars.len() {
        return Err(Error::InvalidRegExp(format!(
            "unexpected '{}' at position {}",
            parser.chars[parser.pos], parser.pos
        )));
    }
    Ok(node)
}

struct Parser {
    chars: Vec<char>,
    pos: usize,
    next_capture: u32,
}

impl Parser {
    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn peek_at(&self, offset: usize) -> Option<char> {
        self.chars.get(self.pos + offset).copied()
    }

    fn expect(&mut self, c: char) -> Result<(), Error> {
        if self.peek() == Some(c) {
            self.pos += 1;
            Ok(())
        } else {
            Err(Error::InvalidRegExp(format!("expected '{c}' at position {}", self.pos)))
        }
    }

    fn parse_disjunction(&mut self) -> Result<Node, Error> {
        let mut branches = vec![self.parse_sequence()?];
        while self.peek() == Some('|') {
            self.pos += 1;
            branches.push(self.parse_sequence()?);
        }
        if branches.len() == 1 {
            Ok(branches.into_iter().next().unwrap())
        } else {
            Ok(Node::Disjunction(branches))
        }
    }

    fn parse_sequence(&mut self) -> Result<Node, Error> {
        let mut terms = Vec::new();
        while let Some(c) = self.peek() {
            if c == '|' || c == ')' {
                break;
            }
            terms.push(self.parse_term()?);
        }
        if terms.len() == 1 {
            Ok(terms.into_iter().next().unwrap())
        } else {
            Ok(Node::Sequence(terms))
        }
    }

    fn parse_term(&mut self) -> Result<Node, Error> {
        if let Some(assertion) = self.try_parse_assertion()? {
            return Ok(assertion);
        }
        let atom = self.parse_atom()?;
        self.parse_quantifier(atom)
    }

    /// `^`, `$`, `\b`, `\B`, and the four look-around group forms — these
    /// never take a quantifier, so they're peeled off before
    /// [`Self::parse_atom`] rather than folded into it.
    fn try_parse_assertion(&mut self) -> Result<Option<Node>, Error> {
        match (self.peek(), self.peek_at(1)) {
            (Some('^'), _) => {
                self.pos += 1;
                Ok(Some(Node::Assertion(AssertionKind::LineBegin)))
            }
            (Some('$'), _) => {
                self.pos += 1;
                Ok(Some(Node::Assertion(AssertionKind::LineEnd)))
            }
            (Some('\\'), Some('b')) => {
                self.pos += 2;
                Ok(Some(Node::Assertion(AssertionKind::WordBoundary { invert: false })))
            }
            (Some('\\'), Some('B')) => {
                self.pos += 2;
                Ok(Some(Node::Assertion(AssertionKind::WordBoundary { invert: true })))
            }
            (Some('('), Some('?')) => match (self.peek_at(2), self.peek_at(3)) {
                (Some('='), _) => {
                    self.pos += 3;
                    let node = self.parse_disjunction()?;
                    self.expect(')')?;
                    Ok(Some(Node::LookAhead { invert: false, node: Box::new(node) }))
                }
                (Some('!'), _) => {
                    self.pos += 3;
                    let node = self.parse_disjunction()?;
                    self.expect(')')?;
                    Ok(Some(Node::LookAhead { invert: true, node: Box::new(node) }))
                }
                (Some('<'), Some('=')) => {
                    self.pos += 4;
                    let node = self.parse_disjunction()?;
                    self.expect(')')?;
                    Ok(Some(Node::LookBehind { invert: false, node: Box::new(node) }))
                }
                (Some('<'), Some('!')) => {
                    self.pos += 4;
                    let node = self.parse_disjunction()?;
                    self.expect(')')?;
                    Ok(Some(Node::LookBehind { invert: true, node: Box::new(node) }))
                }
                _ => Ok(None),
            },
            _ => Ok(None),
        }
    }

    fn parse_quantifier(&mut self, atom: Node) -> Result<Node, Error> {
        let (min, max) = match self.peek() {
            Some('*') => {
                self.pos += 1;
                (0, None)
            }
            Some('+') => {
                self.pos += 1;
                (1, None)
            }
            Some('?') => {
                self.pos += 1;
                (0, Some(1))
            }
            Some('{') if self.looks_like_bounded_quantifier() => {
                self.pos += 1;
                let min = self.parse_decimal();
                let max = if self.peek() == Some(',') {
                    self.pos += 1;
                    if self.peek() == Some('}') {
                        None
                    } else {
                        Some(self.parse_decimal())
                    }
                } else {
                    Some(min)
                };
                self.expect('}')?;
                (min, max)
            }
            _ => return Ok(atom),
        };
        let non_greedy = if self.peek() == Some('?') {
            self.pos += 1;
            true
        } else {
            false
        };
        Ok(match (min, max) {
            (0, None) => Node::Star { non_greedy, node: Box::new(atom) },
            (1, None) => Node::Plus { non_greedy, node: Box::new(atom) },
            (0, Some(1)) => Node::Question { non_greedy, node: Box::new(atom) },
            (min, None) => {
                Node::Repeat { min, max: super::RepeatMax::Unbounded, non_greedy, node: Box::new(atom) }
            }
            (min, Some(max)) if max == min => {
                Node::Repeat { min, max: super::RepeatMax::Exact, non_greedy, node: Box::new(atom) }
            }
            (min, Some(max)) => {
                Node::Repeat { min, max: super::RepeatMax::Bounded(max), non_greedy, node: Box::new(atom) }
            }
        })
    }

    /// `{` only introduces a quantifier when followed by the `{m}` /
    /// `{m,}` / `{m,n}` shape; otherwise (e.g. `a{b}`) it's a literal brace,
    /// same rule `regex-syntax` applies to the non-look-around grammar.
    fn looks_like_bounded_quantifier(&self) -> bool {
        let mut i = self.pos + 1;
        let start = i;
        while self.chars.get(i).is_some_and(|c| c.is_ascii_digit()) {
            i += 1;
        }
        if i == start {
            return false;
        }
        if self.chars.get(i) == Some(&',') {
            i += 1;
            while self.chars.get(i).is_some_and(|c| c.is_ascii_digit()) {
                i += 1;
            }
        }
        self.chars.get(i) == Some(&'}')
    }

    fn parse_decimal(&mut self) -> u32 {
        let mut value: u32 = 0;
        while let Some(c) = self.peek() {
            match c.to_digit(10) {
                Some(d) => {
                    value = value.saturating_mul(10).saturating_add(d);
                    self.pos += 1;
                }
                None => break,
            }
        }
        value
    }

    fn parse_atom(&mut self) -> Result<Node, Error> {
        match self.peek() {
            Some('.') => {
                self.pos += 1;
                Ok(Node::Dot)
            }
            Some('[') => self.parse_class(),
            Some('(') => self.parse_group(),
            Some('\\') => self.parse_escape_atom(),
            Some(c) => {
                self.pos += 1;
                Ok(Node::Character(IChar::single(c as UChar)))
            }
            None => Err(Error::InvalidRegExp("unexpected end of pattern".to_string())),
        }
    }

    fn parse_group(&mut self) -> Result<Node, Error> {
        self.expect('(')?;
        if self.peek() == Some('?') {
            match self.peek_at(1) {
                Some(':') => {
                    self.pos += 2;
                    let node = self.parse_disjunction()?;
                    self.expect(')')?;
                    Ok(Node::Group(Box::new(node)))
                }
                Some('<') => {
                    self.pos += 2;
                    let name = self.parse_group_name()?;
                    let idx = self.next_capture;
                    self.next_capture += 1;
                    let node = self.parse_disjunction()?;
                    self.expect(')')?;
                    Ok(Node::NamedCapture(Box::new(node), name, idx))
                }
                _ => Err(Error::InvalidRegExp(format!(
                    "unrecognized group syntax at position {}",
                    self.pos
                ))),
            }
        } else {
            let idx = self.next_capture;
            self.next_capture += 1;
            let node = self.parse_disjunction()?;
            self.expect(')')?;
            Ok(Node::Capture(Box::new(node), idx))
        }
    }

    fn parse_group_name(&mut self) -> Result<String, Error> {
        let mut name = String::new();
        while let Some(c) = self.peek() {
            if c == '>' {
                self.pos += 1;
                return Ok(name);
            }
            name.push(c);
            self.pos += 1;
        }
        Err(Error::InvalidRegExp("unterminated group name".to_string()))
    }

    fn parse_escape_atom(&mut self) -> Result<Node, Error> {
        self.expect('\\')?;
        match self.peek() {
            Some('d') => {
                self.pos += 1;
                Ok(Node::SimpleEscapeClass(digit_class(false)))
            }
            Some('D') => {
                self.pos += 1;
                Ok(Node::SimpleEscapeClass(digit_class(true)))
            }
            Some('w') => {
                self.pos += 1;
                Ok(Node::SimpleEscapeClass(word_class(false)))
            }
            Some('W') => {
                self.pos += 1;
                Ok(Node::SimpleEscapeClass(word_class(true)))
            }
            Some('s') => {
                self.pos += 1;
                Ok(Node::SimpleEscapeClass(space_class(false)))
            }
            Some('S') => {
                self.pos += 1;
                Ok(Node::SimpleEscapeClass(space_class(true)))
            }
            Some('k') if self.peek_at(1) == Some('<') => {
                self.pos += 2;
                let name = self.parse_group_name()?;
                Ok(Node::NamedBackReference(name))
            }
            Some(c) if c.is_ascii_digit() && c != '0' => {
                let idx = self.parse_decimal();
                Ok(Node::BackReference(idx))
            }
            Some(_) => Ok(Node::Character(IChar::single(self.parse_escaped_char()?))),
            None => Err(Error::InvalidRegExp("trailing backslash".to_string())),
        }
    }

    fn parse_escaped_char(&mut self) -> Result<UChar, Error> {
        let c = self
            .peek()
            .ok_or_else(|| Error::InvalidRegExp("trailing backslash".to_string()))?;
        match c {
            'n' => {
                self.pos += 1;
                Ok('\n' as UChar)
            }
            'r' => {
                self.pos += 1;
                Ok('\r' as UChar)
            }
            't' => {
                self.pos += 1;
                Ok('\t' as UChar)
            }
            'f' => {
                self.pos += 1;
                Ok(0x0C)
            }
            'v' => {
                self.pos += 1;
                Ok(0x0B)
            }
            '0' => {
                self.pos += 1;
                Ok(0)
            }
            'x' => {
                self.pos += 1;
                self.parse_hex_escape(2)
            }
            'u' => {
                self.pos += 1;
                self.parse_unicode_escape()
            }
            other => {
                self.pos += 1;
                Ok(other as UChar)
            }
        }
    }

    fn parse_hex_escape(&mut self, digits: usize) -> Result<UChar, Error> {
        let mut value: u32 = 0;
        for _ in 0..digits {
            let c = self
                .peek()
                .ok_or_else(|| Error::InvalidRegExp("truncated hex escape".to_string()))?;
            let d = c
                .to_digit(16)
                .ok_or_else(|| Error::InvalidRegExp(format!("invalid hex digit '{c}'")))?;
            value = value * 16 + d;
            self.pos += 1;
        }
        Ok(value)
    }

    fn parse_unicode_escape(&mut self) -> Result<UChar, Error> {
        if self.peek() == Some('{') {
            self.pos += 1;
            let mut value: u32 = 0;
            loop {
                let c = self
                    .peek()
                    .ok_or_else(|| Error::InvalidRegExp("unterminated unicode escape".to_string()))?;
                if c == '}' {
                    self.pos += 1;
                    return Ok(value);
                }
                let d = c
                    .to_digit(16)
                    .ok_or_else(|| Error::InvalidRegExp(format!("invalid hex digit '{c}'")))?;
                value = value * 16 + d;
                self.pos += 1;
            }
        } else {
            self.parse_hex_escape(4)
        }
    }

    fn parse_class(&mut self) -> Result<Node, Error> {
        self.expect('[')?;
        let invert = if self.peek() == Some('^') {
            self.pos += 1;
            true
        } else {
            false
        };
        let mut items: Vec<IChar> = Vec::new();
        loop {
            match self.peek() {
                None => return Err(Error::InvalidRegExp("unterminated character class".to_string())),
                Some(']') => {
                    self.pos += 1;
                    break;
                }
                _ => {
                    if let Some(class) = self.try_parse_class_escape_class() {
                        items.push(class);
                        continue;
                    }
                    let lo = self.parse_class_char()?;
                    if self.peek() == Some('-') && self.peek_at(1).is_some_and(|c| c != ']') {
                        self.pos += 1;
                        let hi = self.parse_class_char()?;
                        let (lo, hi) = (lo.min(hi), lo.max(hi));
                        items.push(IChar::new(IntervalSet::from_ranges(vec![(lo, hi + 1)])));
                    } else {
                        items.push(IChar::single(lo));
                    }
                }
            }
        }
        if items.is_empty() {
            items.push(IChar::new(IntervalSet::empty()));
        }
        Ok(Node::CharacterClass { invert, items })
    }

    fn try_parse_class_escape_class(&mut self) -> Option<IChar> {
        if self.peek() != Some('\\') {
            return None;
        }
        let class = match self.peek_at(1)? {
            'd' => digit_class(false),
            'D' => digit_class(true),
            'w' => word_class(false),
            'W' => word_class(true),
            's' => space_class(false),
            'S' => space_class(true),
            _ => return None,
        };
        self.pos += 2;
        Some(class)
    }

    fn parse_class_char(&mut self) -> Result<UChar, Error> {
        match self.peek() {
            Some('\\') => {
                self.pos += 1;
                self.parse_escaped_char()
            }
            Some(c) => {
                self.pos += 1;
                Ok(c as UChar)
            }
            None => Err(Error::InvalidRegExp("unterminated character class".to_string())),
        }
    }
}

fn digit_class(invert: bool) -> IChar {
    let digits = IChar::new(IntervalSet::from_ranges(vec![(b'0' as UChar, b'9' as UChar + 1)]));
    if invert {
        IChar::new(digits.ranges().complement(reguard_chars::MAX_UNICODE))
    } else {
        digits
    }
}

fn word_class(invert: bool) -> IChar {
    let word = IChar::new(IntervalSet::from_ranges(vec![
        (b'a' as UChar, b'z' as UChar + 1),
        (b'A' as UChar, b'Z' as UChar + 1),
        (b'0' as UChar, b'9' as UChar + 1),
        (b'_' as UChar, b'_' as UChar + 1),
    ]));
    if invert {
        IChar::new(word.ranges().complement(reguard_chars::MAX_UNICODE))
    } else {
        word
    }
}

fn space_class(invert: bool) -> IChar {
    let space = IChar::new(IntervalSet::from_ranges(vec![
        (b' ' as UChar, b' ' as UChar + 1),
        (b'\t' as UChar, b'\t' as UChar + 1),
        (b'\n' as UChar, b'\n' as UChar + 1),
        (0x0B, 0x0C),
        (0x0C, 0x0D),
        (b'\r' as UChar, b'\r' as UChar + 1),
        (0xA0, 0xA1),
        (0xFEFF, 0xFF00),
    ]));
    if invert {
        IChar::new(space.ranges().complement(reguard_chars::MAX_UNICODE))
    } else {
        space
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_lookahead_and_lookbehind_and_backreference() {
        assert!(needs_raw_parser("(?=x)"));
        assert!(needs_raw_parser("(?!x)"));
        assert!(needs_raw_parser("(?<=x)"));
        assert!(needs_raw_parser("(?<!x)"));
        assert!(needs_raw_parser(r"(a)\1"));
        assert!(needs_raw_parser(r"(?<foo>a)\k<foo>"));
        assert!(!needs_raw_parser("a(b)c"));
        assert!(!needs_raw_parser(r"a\0b"));
    }

    #[test]
    fn parses_lookahead_into_node() {
        let node = parse("(?=a)a").unwrap();
        match node {
            Node::Sequence(terms) => {
                assert_eq!(terms.len(), 2);
                assert!(matches!(terms[0], Node::LookAhead { invert: false, .. }));
            }
            other => panic!("expected a sequence, got {other:?}"),
        }
    }

    #[test]
    fn parses_negative_lookbehind() {
        let node = parse("(?<!a)b").unwrap();
        match node {
            Node::Sequence(terms) => {
                assert!(matches!(terms[0], Node::LookBehind { invert: true, .. }));
            }
            other => panic!("expected a sequence, got {other:?}"),
        }
    }

    #[test]
    fn parses_capture_and_backreference_with_matching_index() {
        let node = parse(r"(a)\1").unwrap();
        match node {
            Node::Sequence(terms) => {
                assert!(matches!(terms[0], Node::Capture(_, 1)));
                assert!(matches!(terms[1], Node::BackReference(1)));
            }
            other => panic!("expected a sequence, got {other:?}"),
        }
    }

    #[test]
    fn parses_named_backreference() {
        let node = parse(r"(?<foo>a)\k<foo>").unwrap();
        match node {
            Node::Sequence(terms) => {
                assert!(matches!(terms[0], Node::NamedCapture(_, ref name, 1) if name == "foo"));
                assert!(matches!(terms[1], Node::NamedBackReference(ref name) if name == "foo"));
            }
            other => panic!("expected a sequence, got {other:?}"),
        }
    }

    #[test]
    fn bounded_repeat_after_backreference() {
        let node = parse(r"(a)\1{2,3}").unwrap();
        match node {
            Node::Sequence(terms) => {
                assert!(matches!(
                    terms[1],
                    Node::Repeat { min: 2, max: super::super::RepeatMax::Bounded(3), .. }
                ));
            }
            other => panic!("expected a sequence, got {other:?}"),
        }
    }

    #[test]
    fn alternation_and_class_still_parse() {
        let node = parse(r"(?=a)[a-c\d]|b").unwrap();
        assert!(matches!(node, Node::Disjunction(ref branches) if branches.len() == 2));
    }
}
