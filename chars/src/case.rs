use crate::interval::IntervalSet;
use crate::uchar::UChar;

/// A simple case-fold conversion: every code point in `domain` maps to
/// `domain + offset` (offset may be negative, encoded as `-i32`).
struct Fold {
    domain: (UChar, UChar),
    offset: i32,
}

/// Ranges covering the common scripts that have a simple 1:1 upper/lower
/// mapping by fixed offset. Characters with irregular or multi-character
/// foldings (German ß, Unicode special casing, ...) are intentionally left
/// untouched; a miss here only means the analysis treats two differently
/// folding code points as distinct, which is conservative for the purpose
/// of finding an attack string.
const FOLDS: &[Fold] = &[
    // ASCII
    Fold { domain: (0x41, 0x5B), offset: 32 },   // A-Z -> a-z
    Fold { domain: (0x61, 0x7B), offset: -32 },  // a-z -> A-Z
    // Latin-1 supplement
    Fold { domain: (0xC0, 0xD7), offset: 32 },
    Fold { domain: (0xE0, 0xF7), offset: -32 },
    Fold { domain: (0xD8, 0xDF), offset: 32 },
    Fold { domain: (0xF8, 0xFF), offset: -32 },
    // Greek
    Fold { domain: (0x391, 0x3A2), offset: 32 },
    Fold { domain: (0x3B1, 0x3C2), offset: -32 },
    Fold { domain: (0x3A3, 0x3AC), offset: 32 },
    Fold { domain: (0x3C3, 0x3CC), offset: -32 },
    // Cyrillic
    Fold { domain: (0x410, 0x430), offset: 32 },
    Fold { domain: (0x430, 0x450), offset: -32 },
];

/// Returns every code point that `c` case-folds to or from under the table
/// above, including `c` itself.
pub fn canonicalize(c: UChar) -> IntervalSet {
    canonicalize_set(&IntervalSet::single(c))
}

/// Case-canonicalizes a whole interval set at once: for each fold domain,
/// the slice of `set` that intersects it is shifted by the domain's offset
/// and unioned back in. This is the set-level form of the same
/// (domain, offset) conversions `canonicalize` applies to a single code
/// point, and avoids materializing one code point at a time for large
/// ranges (e.g. `\w` or a Unicode property class).
pub fn canonicalize_set(set: &IntervalSet) -> IntervalSet {
    let mut out = set.clone();
    for fold in FOLDS {
        let domain = IntervalSet::from_ranges(vec![fold.domain]);
        let slice = set.intersection(&domain);
        if slice.is_empty() {
            continue;
        }
        let shifted: Vec<(UChar, UChar)> = slice
            .ranges()
            .iter()
            .map(|&(lo, hi)| {
                let lo = (lo as i64 + fold.offset as i64) as UChar;
                let hi = (hi as i64 + fold.offset as i64) as UChar;
                (lo, hi)
            })
            .collect();
        out = out.union(&IntervalSet::from_ranges(shifted));
    }
    out
}
