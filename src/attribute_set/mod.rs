//! Attribute-set Algebra (§4.A)
//!
//! A closed family of possibly-infinite value sets — [`Empty`](AttributeValue::Empty),
//! [`Universal`](AttributeValue::Universal), [`Finite`](AttributeValue::Finite),
//! [`IntegerInterval`](AttributeValue::IntegerInterval), and
//! [`Regex`](AttributeValue::Regex) — forming a bounded lattice under
//! subset/union/intersection. Every operation returns a canonical
//! representation: finite sets de-duplicated, interval lists sorted and
//! merged, regex patterns left as-is (minimization is not required, only
//! equivalence).
//!
//! Heterogeneous operations lift to the most expressive variant that
//! exactly represents the result, per the table in `spec.md` §4.A. Where
//! no exact representation exists the operation fails with
//! [`AttributeSetError`] rather than silently approximating.

mod interval;
mod regex_set;

pub use interval::Bound;

use std::collections::BTreeSet;
use std::fmt;

use regex_set::RegexPattern;
use thiserror::Error;

/// A comparable atomic value: the elements attribute sets range over.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Atom {
    Str(String),
    Int(i64),
    Bool(bool),
}

impl Atom {
    fn as_int(&self) -> Option<i64> {
        match self {
            Atom::Int(n) => Some(*n),
            _ => None,
        }
    }

    /// A string rendering used for regex matching and literal lifting.
    fn as_match_str(&self) -> String {
        match self {
            Atom::Str(s) => s.clone(),
            Atom::Int(n) => n.to_string(),
            Atom::Bool(b) => b.to_string(),
        }
    }
}

impl fmt::Display for Atom {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Atom::Str(s) => write!(f, "{s:?}"),
            Atom::Int(n) => write!(f, "{n}"),
            Atom::Bool(b) => write!(f, "{b}"),
        }
    }
}

impl From<&str> for Atom {
    fn from(value: &str) -> Self {
        Atom::Str(value.to_string())
    }
}

impl From<String> for Atom {
    fn from(value: String) -> Self {
        Atom::Str(value)
    }
}

impl From<i64> for Atom {
    fn from(value: i64) -> Self {
        Atom::Int(value)
    }
}

impl From<bool> for Atom {
    fn from(value: bool) -> Self {
        Atom::Bool(value)
    }
}

/// Errors raised by attribute-set lattice operations.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum AttributeSetError {
    #[error("cannot combine '{left}' and '{right}': no faithful common variant")]
    IncompatibleVariants { left: String, right: String },

    #[error("complement is undefined for variant '{0}'")]
    UndefinedComplement(String),

    #[error("malformed regular expression '{pattern}': {message}")]
    MalformedRegex { pattern: String, message: String },

    #[error("operation '{op}' between '{left}' and '{right}' is not supported by this implementation")]
    Unsupported {
        op: String,
        left: String,
        right: String,
    },
}

/// A possibly-infinite set of [`Atom`] values.
#[derive(Debug, Clone)]
pub enum AttributeValue {
    /// The empty set: contains nothing.
    Empty,
    /// The set of all possible atoms.
    Universal,
    /// An explicit, finite, de-duplicated set of atoms.
    Finite(BTreeSet<Atom>),
    /// A set of disjoint, sorted, merged closed intervals over `i64 ∪ {±∞}`.
    IntegerInterval(Vec<(Bound, Bound)>),
    /// The set of strings (atoms rendered via [`Atom::as_match_str`]) matched
    /// by a regular expression.
    Regex(RegexPattern),
}

impl PartialEq for AttributeValue {
    fn eq(&self, other: &Self) -> bool {
        self.equals(other)
    }
}

impl fmt::Display for AttributeValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AttributeValue::Empty => write!(f, "∅"),
            AttributeValue::Universal => write!(f, "𝒰"),
            AttributeValue::Finite(set) => {
                write!(f, "{{")?;
                for (i, a) in set.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{a}")?;
                }
                write!(f, "}}")
            }
            AttributeValue::IntegerInterval(ivs) => {
                write!(f, "{}", interval::format_intervals(ivs))
            }
            AttributeValue::Regex(p) => write!(f, "/{}/", p.pattern()),
        }
    }
}

impl AttributeValue {
    pub fn empty() -> Self {
        AttributeValue::Empty
    }

    pub fn universal() -> Self {
        AttributeValue::Universal
    }

    pub fn finite<I, A>(atoms: I) -> Self
    where
        I: IntoIterator<Item = A>,
        A: Into<Atom>,
    {
        let set: BTreeSet<Atom> = atoms.into_iter().map(Into::into).collect();
        if set.is_empty() {
            AttributeValue::Empty
        } else {
            AttributeValue::Finite(set)
        }
    }

    /// A single closed interval `[lo, hi]`; use [`Bound::NegInf`]/[`Bound::PosInf`]
    /// for unbounded ends.
    pub fn integer_interval(lo: Bound, hi: Bound) -> Self {
        Self::integer_intervals(vec![(lo, hi)])
    }

    /// A union of closed intervals, normalized to canonical form.
    pub fn integer_intervals(raw: Vec<(Bound, Bound)>) -> Self {
        let merged = interval::normalize(raw);
        if merged.is_empty() {
            AttributeValue::Empty
        } else if merged.len() == 1 && merged[0] == (Bound::NegInf, Bound::PosInf) {
            AttributeValue::Universal
        } else {
            AttributeValue::IntegerInterval(merged)
        }
    }

    pub fn regex(pattern: &str) -> Result<Self, AttributeSetError> {
        RegexPattern::compile(pattern).map(AttributeValue::Regex)
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, AttributeValue::Empty)
    }

    pub fn is_universal(&self) -> bool {
        matches!(self, AttributeValue::Universal)
    }

    fn variant_name(&self) -> &'static str {
        match self {
            AttributeValue::Empty => "Empty",
            AttributeValue::Universal => "Universal",
            AttributeValue::Finite(_) => "Finite",
            AttributeValue::IntegerInterval(_) => "IntegerInterval",
            AttributeValue::Regex(_) => "Regex",
        }
    }

    pub fn contains(&self, atom: &Atom) -> bool {
        match self {
            AttributeValue::Empty => false,
            AttributeValue::Universal => true,
            AttributeValue::Finite(set) => set.contains(atom),
            AttributeValue::IntegerInterval(ivs) => {
                atom.as_int().is_some_and(|n| interval::contains(ivs, n))
            }
            AttributeValue::Regex(p) => p.is_match(&atom.as_match_str()),
        }
    }

    /// Sound and complete for the cases described in `spec.md` §4.A; for
    /// general `Regex` vs `Regex` containment outside the documented
    /// fragment this returns `Ok` only when it can prove the answer and
    /// otherwise an [`AttributeSetError::Unsupported`].
    pub fn is_subset(&self, other: &AttributeValue) -> Result<bool, AttributeSetError> {
        use AttributeValue::*;
        Ok(match (self, other) {
            (Empty, _) => true,
            (_, Universal) => true,
            (Universal, _) => other.is_universal(),
            (_, Empty) => self.is_empty(),
            (Finite(a), Finite(b)) => a.is_subset(b),
            (IntegerInterval(a), IntegerInterval(b)) => interval::is_subset(a, b),
            (Finite(a), IntegerInterval(b)) => a
                .iter()
                .all(|atom| atom.as_int().is_some_and(|n| interval::contains(b, n))),
            (IntegerInterval(_), Finite(_)) => false,
            (Finite(a), Regex(p)) => a.iter().all(|atom| p.is_match(&atom.as_match_str())),
            (Regex(_), Finite(_)) => false,
            (IntegerInterval(_), Regex(_)) | (Regex(_), IntegerInterval(_)) => {
                return Err(AttributeSetError::Unsupported {
                    op: "is_subset".into(),
                    left: self.variant_name().into(),
                    right: other.variant_name().into(),
                })
            }
            (Regex(a), Regex(b)) => {
                if a.pattern() == b.pattern() {
                    true
                } else {
                    return regex_set::is_subset(a, b);
                }
            }
        })
    }

    pub fn equals(&self, other: &AttributeValue) -> bool {
        use AttributeValue::*;
        match (self, other) {
            (Empty, Empty) | (Universal, Universal) => true,
            (Finite(a), Finite(b)) => a == b,
            (IntegerInterval(a), IntegerInterval(b)) => a == b,
            (Regex(a), Regex(b)) => a.pattern() == b.pattern(),
            _ => false,
        }
    }

    pub fn union(&self, other: &AttributeValue) -> Result<AttributeValue, AttributeSetError> {
        use AttributeValue::*;
        Ok(match (self, other) {
            (Universal, _) | (_, Universal) => Universal,
            (Empty, x) | (x, Empty) => x.clone(),
            (Finite(a), Finite(b)) => {
                let mut merged = a.clone();
                merged.extend(b.iter().cloned());
                AttributeValue::finite_set(merged)
            }
            (IntegerInterval(a), IntegerInterval(b)) => {
                let mut ivs = a.clone();
                ivs.extend(b.iter().cloned());
                AttributeValue::integer_intervals(ivs)
            }
            (Finite(f), IntegerInterval(iv)) | (IntegerInterval(iv), Finite(f)) => {
                if f.iter().all(|a| a.as_int().is_some()) {
                    let mut ivs = iv.clone();
                    for a in f {
                        let n = a.as_int().expect("checked all() above");
                        ivs.push((Bound::Finite(n), Bound::Finite(n)));
                    }
                    AttributeValue::integer_intervals(ivs)
                } else {
                    let pattern = regex_set::literal_alternation(f)?;
                    AttributeValue::Regex(RegexPattern::compile(&pattern)?)
                }
            }
            (Finite(f), Regex(p)) | (Regex(p), Finite(f)) => {
                let literal = regex_set::literal_alternation(f)?;
                AttributeValue::Regex(p.alternate(&literal)?)
            }
            (Regex(a), Regex(b)) => AttributeValue::Regex(a.alternate(b.pattern())?),
            (IntegerInterval(_), Regex(_)) | (Regex(_), IntegerInterval(_)) => {
                return Err(AttributeSetError::IncompatibleVariants {
                    left: self.variant_name().into(),
                    right: other.variant_name().into(),
                })
            }
        })
    }

    pub fn intersection(&self, other: &AttributeValue) -> Result<AttributeValue, AttributeSetError> {
        use AttributeValue::*;
        Ok(match (self, other) {
            (Empty, _) | (_, Empty) => Empty,
            (Universal, x) | (x, Universal) => x.clone(),
            (Finite(a), Finite(b)) => AttributeValue::finite_set(a.intersection(b).cloned().collect()),
            (IntegerInterval(a), IntegerInterval(b)) => {
                AttributeValue::integer_intervals(interval::intersect(a, b))
            }
            (Finite(f), IntegerInterval(iv)) | (IntegerInterval(iv), Finite(f)) => {
                AttributeValue::finite_set(
                    f.iter()
                        .filter(|a| a.as_int().is_some_and(|n| interval::contains(iv, n)))
                        .cloned()
                        .collect(),
                )
            }
            (Finite(f), Regex(p)) | (Regex(p), Finite(f)) => AttributeValue::finite_set(
                f.iter()
                    .filter(|a| p.is_match(&a.as_match_str()))
                    .cloned()
                    .collect(),
            ),
            (IntegerInterval(_), Regex(_)) | (Regex(_), IntegerInterval(_)) => {
                return Err(AttributeSetError::Unsupported {
                    op: "intersection".into(),
                    left: self.variant_name().into(),
                    right: other.variant_name().into(),
                })
            }
            (Regex(a), Regex(b)) => {
                if a.pattern() == b.pattern() {
                    Regex(a.clone())
                } else if self.is_subset(other).unwrap_or(false) {
                    Regex(a.clone())
                } else if other.is_subset(self).unwrap_or(false) {
                    Regex(b.clone())
                } else {
                    return Err(AttributeSetError::Unsupported {
                        op: "intersection".into(),
                        left: self.variant_name().into(),
                        right: other.variant_name().into(),
                    });
                }
            }
        })
    }

    pub fn difference(&self, other: &AttributeValue) -> Result<AttributeValue, AttributeSetError> {
        use AttributeValue::*;
        if self.equals(other) {
            return Ok(Empty);
        }
        Ok(match (self, other) {
            (Empty, _) => Empty,
            (_, Universal) => Empty,
            (x, Empty) => x.clone(),
            (Universal, Finite(_)) | (Universal, IntegerInterval(_)) | (Universal, Regex(_)) => {
                return Err(AttributeSetError::Unsupported {
                    op: "difference".into(),
                    left: self.variant_name().into(),
                    right: other.variant_name().into(),
                })
            }
            (Finite(a), Finite(b)) => AttributeValue::finite_set(a.difference(b).cloned().collect()),
            (IntegerInterval(a), IntegerInterval(b)) => {
                AttributeValue::integer_intervals(interval::subtract(a, b))
            }
            (Finite(f), IntegerInterval(iv)) => AttributeValue::finite_set(
                f.iter()
                    .filter(|a| !a.as_int().is_some_and(|n| interval::contains(iv, n)))
                    .cloned()
                    .collect(),
            ),
            (IntegerInterval(iv), Finite(f)) => {
                let points: Vec<(Bound, Bound)> = f
                    .iter()
                    .filter_map(|a| a.as_int())
                    .map(|n| (Bound::Finite(n), Bound::Finite(n)))
                    .collect();
                AttributeValue::integer_intervals(interval::subtract(iv, &interval::normalize(points)))
            }
            (Finite(f), Regex(p)) => AttributeValue::finite_set(
                f.iter()
                    .filter(|a| !p.is_match(&a.as_match_str()))
                    .cloned()
                    .collect(),
            ),
            (Regex(_), Finite(_)) => {
                return Err(AttributeSetError::Unsupported {
                    op: "difference".into(),
                    left: self.variant_name().into(),
                    right: other.variant_name().into(),
                })
            }
            (IntegerInterval(_), Regex(_)) | (Regex(_), IntegerInterval(_)) | (Regex(_), Regex(_)) => {
                return Err(AttributeSetError::Unsupported {
                    op: "difference".into(),
                    left: self.variant_name().into(),
                    right: other.variant_name().into(),
                })
            }
        })
    }

    /// Defined for `IntegerInterval` (over ℤ), `Empty`/`Universal` (trivially);
    /// undefined otherwise per `spec.md` §4.A.
    pub fn complement(&self) -> Result<AttributeValue, AttributeSetError> {
        match self {
            AttributeValue::Empty => Ok(AttributeValue::Universal),
            AttributeValue::Universal => Ok(AttributeValue::Empty),
            AttributeValue::IntegerInterval(ivs) => {
                Ok(AttributeValue::integer_intervals(interval::complement(ivs)))
            }
            AttributeValue::Finite(_) | AttributeValue::Regex(_) => {
                Err(AttributeSetError::UndefinedComplement(self.variant_name().into()))
            }
        }
    }

    fn finite_set(set: BTreeSet<Atom>) -> AttributeValue {
        if set.is_empty() {
            AttributeValue::Empty
        } else {
            AttributeValue::Finite(set)
        }
    }
}
