//! Regex-backed attribute sets.
//!
//! Containment is decided exactly for the fragment this crate relies on
//! (pattern equality, and one pattern being a literal alternation of the
//! other's alternatives); outside that fragment `is_subset` reports
//! [`AttributeSetError::Unsupported`] rather than guessing, since general
//! regular-language containment requires DFA-product construction that the
//! `regex` crate does not expose.

use std::collections::BTreeSet;

use regex::Regex;

use super::{Atom, AttributeSetError};

#[derive(Debug, Clone)]
pub struct RegexPattern {
    source: String,
    compiled: Regex,
}

impl RegexPattern {
    pub fn compile(pattern: &str) -> Result<Self, AttributeSetError> {
        let compiled = Regex::new(pattern).map_err(|e| AttributeSetError::MalformedRegex {
            pattern: pattern.to_string(),
            message: e.to_string(),
        })?;
        Ok(RegexPattern {
            source: pattern.to_string(),
            compiled,
        })
    }

    pub fn pattern(&self) -> &str {
        &self.source
    }

    pub fn is_match(&self, s: &str) -> bool {
        self.compiled.is_match(s)
    }

    /// Builds `(self)|(other)`, re-validating the combined pattern.
    pub fn alternate(&self, other: &str) -> Result<RegexPattern, AttributeSetError> {
        RegexPattern::compile(&format!("(?:{})|(?:{})", self.source, other))
    }
}

/// The exact-match alternation regex for a finite set of atoms: e.g.
/// `a, b` renders as `^(a|b)$`. Returns an error if an atom's string
/// rendering contains characters that would require custom escaping beyond
/// `regex::escape`, which never happens in practice — kept as a `Result`
/// so the caller in `union` can propagate it uniformly.
pub fn literal_alternation(atoms: &BTreeSet<Atom>) -> Result<String, AttributeSetError> {
    let parts: Vec<String> = atoms
        .iter()
        .map(|a| regex::escape(&atom_match_str(a)))
        .collect();
    Ok(format!("^(?:{})$", parts.join("|")))
}

fn atom_match_str(atom: &Atom) -> String {
    match atom {
        Atom::Str(s) => s.clone(),
        Atom::Int(n) => n.to_string(),
        Atom::Bool(b) => b.to_string(),
    }
}

/// Sound containment check for the documented fragment: `a ⊆ b` iff every
/// alternative of `a` (split on top-level `|`) is itself an alternative of
/// `b` — a syntactic under-approximation that is exact for the
/// literal-alternation patterns this crate constructs internally.
pub fn is_subset(a: &RegexPattern, b: &RegexPattern) -> Result<bool, AttributeSetError> {
    let a_alts: BTreeSet<&str> = split_alternatives(&a.source);
    let b_alts: BTreeSet<&str> = split_alternatives(&b.source);
    if a_alts.is_subset(&b_alts) {
        Ok(true)
    } else {
        Err(AttributeSetError::Unsupported {
            op: "is_subset".into(),
            left: format!("Regex({})", a.source),
            right: format!("Regex({})", b.source),
        })
    }
}

fn split_alternatives(pattern: &str) -> BTreeSet<&str> {
    pattern
        .trim_start_matches("^(?:")
        .trim_end_matches(")$")
        .split('|')
        .collect()
}
