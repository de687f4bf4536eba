//! Canonical disjoint-interval arithmetic over `i64 ∪ {±∞}`, backing the
//! [`super::AttributeValue::IntegerInterval`] variant.

use std::cmp::Ordering;
use std::fmt;

/// An endpoint of a closed interval: a finite integer or one of the two
/// infinities.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Bound {
    NegInf,
    Finite(i64),
    PosInf,
}

impl PartialOrd for Bound {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Bound {
    fn cmp(&self, other: &Self) -> Ordering {
        use Bound::*;
        match (self, other) {
            (NegInf, NegInf) | (PosInf, PosInf) => Ordering::Equal,
            (NegInf, _) => Ordering::Less,
            (_, NegInf) => Ordering::Greater,
            (PosInf, _) => Ordering::Greater,
            (_, PosInf) => Ordering::Less,
            (Finite(a), Finite(b)) => a.cmp(b),
        }
    }
}

impl fmt::Display for Bound {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Bound::NegInf => write!(f, "-inf"),
            Bound::Finite(n) => write!(f, "{n}"),
            Bound::PosInf => write!(f, "inf"),
        }
    }
}

/// Sort, merge overlapping or touching intervals, and drop empty (`lo > hi`) ones.
pub fn normalize(mut raw: Vec<(Bound, Bound)>) -> Vec<(Bound, Bound)> {
    raw.retain(|(lo, hi)| lo <= hi);
    raw.sort_by(|a, b| a.0.cmp(&b.0).then(a.1.cmp(&b.1)));
    let mut merged: Vec<(Bound, Bound)> = Vec::with_capacity(raw.len());
    for (lo, hi) in raw {
        if let Some(last) = merged.last_mut() {
            if touches_or_overlaps(last.1, lo) {
                if hi > last.1 {
                    last.1 = hi;
                }
                continue;
            }
        }
        merged.push((lo, hi));
    }
    merged
}

fn touches_or_overlaps(prev_hi: Bound, next_lo: Bound) -> bool {
    match (prev_hi, next_lo) {
        (Bound::PosInf, _) => true,
        (_, Bound::NegInf) => true,
        (Bound::Finite(a), Bound::Finite(b)) => b <= a.saturating_add(1),
        _ => false,
    }
}

pub fn contains(ivs: &[(Bound, Bound)], n: i64) -> bool {
    let x = Bound::Finite(n);
    ivs.iter().any(|(lo, hi)| *lo <= x && x <= *hi)
}

pub fn is_subset(a: &[(Bound, Bound)], b: &[(Bound, Bound)]) -> bool {
    a.iter().all(|(alo, ahi)| b.iter().any(|(blo, bhi)| blo <= alo && ahi <= bhi))
}

pub fn intersect(a: &[(Bound, Bound)], b: &[(Bound, Bound)]) -> Vec<(Bound, Bound)> {
    let mut result = Vec::new();
    for &(alo, ahi) in a {
        for &(blo, bhi) in b {
            let lo = alo.max(blo);
            let hi = ahi.min(bhi);
            if lo <= hi {
                result.push((lo, hi));
            }
        }
    }
    normalize(result)
}

/// Complement over ℤ (the whole line, `(-inf, inf)`).
pub fn complement(ivs: &[(Bound, Bound)]) -> Vec<(Bound, Bound)> {
    let sorted = normalize(ivs.to_vec());
    let mut result = Vec::new();
    let mut cursor = Bound::NegInf;
    for &(lo, hi) in &sorted {
        if cursor < lo {
            let gap_hi = predecessor(lo);
            if cursor <= gap_hi {
                result.push((cursor, gap_hi));
            }
        }
        cursor = successor(hi);
    }
    if !matches!(cursor, Bound::PosInf) {
        result.push((cursor, Bound::PosInf));
    }
    normalize(result)
}

fn predecessor(b: Bound) -> Bound {
    match b {
        Bound::Finite(n) => Bound::Finite(n - 1),
        other => other,
    }
}

fn successor(b: Bound) -> Bound {
    match b {
        Bound::Finite(n) => Bound::Finite(n + 1),
        other => other,
    }
}

/// `a ∖ b`, computed as `a ∩ complement(b)`.
pub fn subtract(a: &[(Bound, Bound)], b: &[(Bound, Bound)]) -> Vec<(Bound, Bound)> {
    intersect(a, &complement(b))
}

pub fn format_intervals(ivs: &[(Bound, Bound)]) -> String {
    ivs.iter()
        .map(|(lo, hi)| format!("[{lo}, {hi}]"))
        .collect::<Vec<_>>()
        .join(" ∪ ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn complement_of_single_interval() {
        let ivs = vec![(Bound::Finite(0), Bound::Finite(10))];
        let c = complement(&ivs);
        assert_eq!(c, vec![(Bound::NegInf, Bound::Finite(-1)), (Bound::Finite(11), Bound::PosInf)]);
    }

    #[test]
    fn complement_of_empty_is_universal() {
        let c = complement(&[]);
        assert_eq!(c, vec![(Bound::NegInf, Bound::PosInf)]);
    }

    #[test]
    fn merges_adjacent_and_overlapping() {
        let raw = vec![
            (Bound::Finite(1), Bound::Finite(3)),
            (Bound::Finite(4), Bound::Finite(5)),
            (Bound::Finite(10), Bound::Finite(12)),
            (Bound::Finite(2), Bound::Finite(4)),
        ];
        let merged = normalize(raw);
        assert_eq!(
            merged,
            vec![(Bound::Finite(1), Bound::Finite(5)), (Bound::Finite(10), Bound::Finite(12))]
        );
    }

    #[test]
    fn double_complement_is_identity() {
        let ivs = normalize(vec![(Bound::Finite(-5), Bound::Finite(5)), (Bound::Finite(20), Bound::PosInf)]);
        let back = complement(&complement(&ivs));
        assert_eq!(back, ivs);
    }
}
