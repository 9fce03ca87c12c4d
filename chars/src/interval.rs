use crate::uchar::UChar;

/// A canonical, sorted, coalesced set of half-open `[lo, hi)` ranges over
/// [`UChar`].
///
/// Invariant: every stored range is non-empty, ranges are sorted by `lo`,
/// and no two ranges are adjacent or overlapping (adjacent/overlapping
/// ranges are always merged by the constructors below). This invariant is
/// what makes equality and the set algebra below simple linear-time merges.
#[derive(Debug, Clone, PartialEq, Eq, Default, Hash)]
pub struct IntervalSet {
    ranges: Vec<(UChar, UChar)>,
}

impl IntervalSet {
    pub fn empty() -> Self {
        IntervalSet { ranges: Vec::new() }
    }

    /// Builds a set from arbitrary (possibly unsorted, overlapping) ranges.
    pub fn from_ranges(mut ranges: Vec<(UChar, UChar)>) -> Self {
        ranges.retain(|&(lo, hi)| lo < hi);
        ranges.sort_unstable();
        let mut coalesced: Vec<(UChar, UChar)> = Vec::with_capacity(ranges.len());
        for (lo, hi) in ranges {
            match coalesced.last_mut() {
                Some(last) if lo <= last.1 => {
                    if hi > last.1 {
                        last.1 = hi;
                    }
                }
                _ => coalesced.push((lo, hi)),
            }
        }
        IntervalSet { ranges: coalesced }
    }

    pub fn single(c: UChar) -> Self {
        IntervalSet { ranges: vec![(c, c + 1)] }
    }

    pub fn is_empty(&self) -> bool {
        self.ranges.is_empty()
    }

    pub fn ranges(&self) -> &[(UChar, UChar)] {
        &self.ranges
    }

    pub fn contains(&self, c: UChar) -> bool {
        self.ranges
            .binary_search_by(|&(lo, hi)| {
                if c < lo {
                    std::cmp::Ordering::Greater
                } else if c >= hi {
                    std::cmp::Ordering::Less
                } else {
                    std::cmp::Ordering::Equal
                }
            })
            .is_ok()
    }

    /// Total number of code points covered.
    pub fn len(&self) -> u64 {
        self.ranges.iter().map(|&(lo, hi)| (hi - lo) as u64).sum()
    }

    pub fn union(&self, other: &IntervalSet) -> IntervalSet {
        let mut ranges = self.ranges.clone();
        ranges.extend_from_slice(&other.ranges);
        IntervalSet::from_ranges(ranges)
    }

    pub fn intersection(&self, other: &IntervalSet) -> IntervalSet {
        let mut out = Vec::new();
        let (mut i, mut j) = (0, 0);
        while i < self.ranges.len() && j < other.ranges.len() {
            let (a_lo, a_hi) = self.ranges[i];
            let (b_lo, b_hi) = other.ranges[j];
            let lo = a_lo.max(b_lo);
            let hi = a_hi.min(b_hi);
            if lo < hi {
                out.push((lo, hi));
            }
            if a_hi < b_hi {
                i += 1;
            } else {
                j += 1;
            }
        }
        IntervalSet::from_ranges(out)
    }

    pub fn difference(&self, other: &IntervalSet) -> IntervalSet {
        let mut out = Vec::new();
        let mut j = 0;
        for &(a_lo, a_hi) in &self.ranges {
            let mut cur = a_lo;
            while cur < a_hi {
                while j < other.ranges.len() && other.ranges[j].1 <= cur {
                    j += 1;
                }
                if j >= other.ranges.len() || other.ranges[j].0 >= a_hi {
                    out.push((cur, a_hi));
                    break;
                }
                let (b_lo, b_hi) = other.ranges[j];
                if b_lo > cur {
                    out.push((cur, b_lo));
                }
                cur = b_hi.max(cur);
            }
        }
        IntervalSet::from_ranges(out)
    }

    /// Complement within `[0, bound)`. `bound` should be [`crate::MAX_BMP`]
    /// for BMP-only matching or [`crate::MAX_UNICODE`] for full Unicode mode.
    pub fn complement(&self, bound: UChar) -> IntervalSet {
        let mut out = Vec::new();
        let mut cur = 0;
        for &(lo, hi) in &self.ranges {
            if lo > cur {
                out.push((cur, lo.min(bound)));
            }
            cur = cur.max(hi);
            if cur >= bound {
                break;
            }
        }
        if cur < bound {
            out.push((cur, bound));
        }
        IntervalSet::from_ranges(out)
    }

    /// Splits `(a, b)` into the triple `(a∩b, a∖b, b∖a)`, each pairwise
    /// disjoint and together covering `a∪b`.
    pub fn partition(a: &IntervalSet, b: &IntervalSet) -> (IntervalSet, IntervalSet, IntervalSet) {
        (a.intersection(b), a.difference(b), b.difference(a))
    }

    pub fn iter(&self) -> impl Iterator<Item = (UChar, UChar)> + '_ {
        self.ranges.iter().copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn set(rs: &[(UChar, UChar)]) -> IntervalSet {
        IntervalSet::from_ranges(rs.to_vec())
    }

    #[test]
    fn coalesces_adjacent_and_overlapping() {
        let s = set(&[(0, 3), (3, 5), (10, 12), (11, 20)]);
        assert_eq!(s.ranges(), &[(0, 5), (10, 20)]);
    }

    #[test]
    fn drops_empty_ranges() {
        let s = set(&[(5, 5), (1, 2)]);
        assert_eq!(s.ranges(), &[(1, 2)]);
    }

    #[test]
    fn union_is_commutative() {
        let a = set(&[(0, 5), (20, 30)]);
        let b = set(&[(3, 10), (25, 40)]);
        assert_eq!(a.union(&b), b.union(&a));
    }

    #[test]
    fn intersection_distributes_over_union() {
        let a = set(&[(0, 10)]);
        let b = set(&[(5, 15)]);
        let c = set(&[(8, 20)]);
        let lhs = a.intersection(&b.union(&c));
        let rhs = a.intersection(&b).union(&a.intersection(&c));
        assert_eq!(lhs, rhs);
    }

    #[test]
    fn double_complement_is_identity() {
        let a = set(&[(1, 3), (10, 20)]);
        assert_eq!(a.complement(30).complement(30), a);
    }

    #[test]
    fn partition_pieces_are_disjoint_and_cover_union() {
        let a = set(&[(0, 10)]);
        let b = set(&[(5, 15)]);
        let (ab, a_minus_b, b_minus_a) = IntervalSet::partition(&a, &b);
        assert!(ab.intersection(&a_minus_b).is_empty());
        assert!(ab.intersection(&b_minus_a).is_empty());
        assert!(a_minus_b.intersection(&b_minus_a).is_empty());
        let reunited = ab.union(&a_minus_b).union(&b_minus_a);
        assert_eq!(reunited, a.union(&b));
    }

    #[test]
    fn contains_matches_linear_scan() {
        let s = set(&[(0, 5), (10, 20)]);
        for c in 0..25 {
            let expected = s.ranges().iter().any(|&(lo, hi)| c >= lo && c < hi);
            assert_eq!(s.contains(c), expected, "c={c}");
        }
    }
}
