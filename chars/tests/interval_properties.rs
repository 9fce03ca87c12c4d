//! Property tests for `IntervalSet`'s set-algebra laws and `ICharSet`'s
//! refinement invariant, per SPEC_FULL.md's testable-properties #1 and #2.

use quickcheck::{Arbitrary, Gen};
use quickcheck_macros::quickcheck;
use reguard_chars::{ICharSet, IChar, IntervalSet, MAX_BMP};

#[derive(Clone, Debug)]
struct ArbSet(IntervalSet);

impl Arbitrary for ArbSet {
    fn arbitrary(g: &mut Gen) -> Self {
        let range_count = usize::arbitrary(g) % 6;
        let ranges = (0..range_count)
            .map(|_| {
                let lo = u32::arbitrary(g) % 200;
                let len = u32::arbitrary(g) % 20 + 1;
                (lo, lo + len)
            })
            .collect();
        ArbSet(IntervalSet::from_ranges(ranges))
    }
}

fn is_sorted_coalesced(set: &IntervalSet) -> bool {
    let ranges = set.ranges();
    ranges.iter().all(|&(lo, hi)| lo < hi)
        && ranges.windows(2).all(|w| w[0].1 < w[1].0)
}

#[quickcheck]
fn union_is_commutative(a: ArbSet, b: ArbSet) -> bool {
    a.0.union(&b.0) == b.0.union(&a.0)
}

#[quickcheck]
fn intersection_distributes_over_union(a: ArbSet, b: ArbSet, c: ArbSet) -> bool {
    let lhs = a.0.intersection(&b.0.union(&c.0));
    let rhs = a.0.intersection(&b.0).union(&a.0.intersection(&c.0));
    lhs == rhs
}

#[quickcheck]
fn double_complement_is_identity(a: ArbSet) -> bool {
    a.0.complement(MAX_BMP).complement(MAX_BMP) == a.0
}

#[quickcheck]
fn partition_pieces_are_disjoint_and_cover_union(a: ArbSet, b: ArbSet) -> bool {
    let (both, only_a, only_b) = IntervalSet::partition(&a.0, &b.0);
    let pairwise_disjoint = both.intersection(&only_a).is_empty()
        && both.intersection(&only_b).is_empty()
        && only_a.intersection(&only_b).is_empty();
    let union = both.union(&only_a).union(&only_b);
    pairwise_disjoint && union == a.0.union(&b.0)
}

#[quickcheck]
fn every_result_stays_sorted_and_coalesced(a: ArbSet, b: ArbSet) -> bool {
    is_sorted_coalesced(&a.0.union(&b.0))
        && is_sorted_coalesced(&a.0.intersection(&b.0))
        && is_sorted_coalesced(&a.0.difference(&b.0))
        && is_sorted_coalesced(&a.0.complement(MAX_BMP))
}

#[derive(Clone, Debug)]
struct ArbChars(Vec<IChar>);

impl Arbitrary for ArbChars {
    fn arbitrary(g: &mut Gen) -> Self {
        let count = usize::arbitrary(g) % 5;
        let chars = (0..count)
            .map(|_| {
                let lo = u32::arbitrary(g) % 100;
                let len = u32::arbitrary(g) % 10 + 1;
                IChar::new(IntervalSet::from_ranges(vec![(lo, lo + len)]))
            })
            .collect();
        ArbChars(chars)
    }
}

#[quickcheck]
fn refinement_members_are_pairwise_disjoint(input: ArbChars) -> bool {
    let mut set = ICharSet::new();
    for c in &input.0 {
        set.add(c);
    }
    let members = set.members();
    for i in 0..members.len() {
        for j in (i + 1)..members.len() {
            if !members[i].intersection(&members[j]).is_empty() {
                return false;
            }
        }
    }
    true
}

#[quickcheck]
fn refinement_covers_every_added_char(input: ArbChars) -> bool {
    let mut set = ICharSet::new();
    for c in &input.0 {
        set.add(c);
    }
    for c in &input.0 {
        let covered = set
            .members()
            .iter()
            .fold(IChar::new(IntervalSet::empty()), |acc, m| acc.union(&m.intersection(c)));
        if covered.ranges() != c.ranges() {
            return false;
        }
    }
    true
}
