//! Attribute maps: a mapping from attribute name to [`AttributeValue`],
//! shared by graph nodes and edges (§3 "Attribute map").

use std::collections::BTreeMap;

use crate::attribute_set::AttributeValue;
use crate::error::GraphError;

/// A mapping from attribute names to attribute values. An absent key and a
/// key mapped to [`AttributeValue::Empty`] are equivalent for subsumption
/// purposes (see [`AttributeMap::get_or_empty`]), but the map distinguishes
/// them in storage — `remove_attrs` erases keys whose value differences
/// out to empty.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AttributeMap(BTreeMap<String, AttributeValue>);

impl AttributeMap {
    pub fn new() -> Self {
        AttributeMap(BTreeMap::new())
    }

    pub fn from_pairs<I>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (String, AttributeValue)>,
    {
        AttributeMap(pairs.into_iter().collect())
    }

    pub fn is_empty(&self) -> bool {
        self.0.values().all(AttributeValue::is_empty)
    }

    pub fn get(&self, key: &str) -> Option<&AttributeValue> {
        self.0.get(key)
    }

    /// The effective value of `key`: `Empty` when absent, matching the
    /// "absent ≡ Empty for subsumption purposes" rule of §3.
    pub fn get_or_empty(&self, key: &str) -> &AttributeValue {
        self.0.get(key).unwrap_or(&EMPTY)
    }

    pub fn set(&mut self, key: impl Into<String>, value: AttributeValue) {
        self.0.insert(key.into(), value);
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &AttributeValue)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Per-key union with `other`, used by `add_node_attrs`/`add_edge_attrs`.
    pub fn union_with(&self, other: &AttributeMap) -> Result<AttributeMap, GraphError> {
        let mut result = self.clone();
        for (key, value) in other.iter() {
            let merged = match result.0.get(key) {
                Some(existing) => existing
                    .union(value)
                    .map_err(|e| GraphError::AttributeError(key.to_string(), e))?,
                None => value.clone(),
            };
            result.0.insert(key.to_string(), merged);
        }
        Ok(result)
    }

    /// Per-key set difference with `other`. A key whose resulting value is
    /// `Empty` is erased entirely, per §3's erasure rule.
    pub fn difference_with(&self, other: &AttributeMap) -> Result<AttributeMap, GraphError> {
        let mut result = self.clone();
        for (key, value) in other.iter() {
            if let Some(existing) = result.0.get(key) {
                let diff = existing
                    .difference(value)
                    .map_err(|e| GraphError::AttributeError(key.to_string(), e))?;
                if diff.is_empty() {
                    result.0.remove(key);
                } else {
                    result.0.insert(key.to_string(), diff);
                }
            }
        }
        Ok(result)
    }

    /// Per-key intersection with `other`, used by backward attribute
    /// propagation (§4.F): the propagated value never exceeds the parent's.
    pub fn intersect_with(&self, other: &AttributeMap) -> Result<AttributeMap, GraphError> {
        let mut result = AttributeMap::new();
        for (key, value) in self.iter() {
            let other_value = other.get_or_empty(key);
            let meet = value
                .intersection(other_value)
                .map_err(|e| GraphError::AttributeError(key.to_string(), e))?;
            if !meet.is_empty() {
                result.0.insert(key.to_string(), meet);
            }
        }
        Ok(result)
    }

    /// Does every attribute of `self` subsume (is a subset of) the
    /// corresponding attribute of `other`? Missing keys on either side are
    /// treated as `Empty`.
    pub fn is_subsumed_by(&self, other: &AttributeMap) -> Result<bool, GraphError> {
        for (key, value) in self.iter() {
            let image_value = other.get_or_empty(key);
            let ok = value
                .is_subset(image_value)
                .map_err(|e| GraphError::AttributeError(key.to_string(), e))?;
            if !ok {
                return Ok(false);
            }
        }
        Ok(true)
    }

    pub fn remove(&mut self, key: &str) {
        self.0.remove(key);
    }

    /// `self \ other`, keyed over `self`'s own keys (unlike
    /// [`AttributeMap::difference_with`], which only touches keys present in
    /// `other`). Used by the rewrite engine to compute the amount of an
    /// attribute an `L -> P` or `R -> P` edge sheds, on the `Err` side
    /// carrying the offending key so the caller can report it.
    pub fn minus(&self, other: &AttributeMap) -> Result<AttributeMap, (String, crate::attribute_set::AttributeSetError)> {
        let mut result = AttributeMap::new();
        for (key, value) in self.iter() {
            let other_value = other.get_or_empty(key);
            let diff = value.difference(other_value).map_err(|e| (key.to_string(), e))?;
            if !diff.is_empty() {
                result.0.insert(key.to_string(), diff);
            }
        }
        Ok(result)
    }
}

// A single static `Empty` to hand out references to from `get_or_empty`
// without allocating per call.
static EMPTY: AttributeValue = AttributeValue::Empty;

impl FromIterator<(String, AttributeValue)> for AttributeMap {
    fn from_iter<T: IntoIterator<Item = (String, AttributeValue)>>(iter: T) -> Self {
        AttributeMap(iter.into_iter().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn union_is_idempotent_per_key() {
        let mut m = AttributeMap::new();
        m.set("color", AttributeValue::finite(["blue"]));
        let merged = m.union_with(&m).unwrap();
        assert_eq!(merged.get("color"), m.get("color"));
    }

    #[test]
    fn erasure_removes_key_on_full_difference() {
        let mut m = AttributeMap::new();
        m.set("color", AttributeValue::finite(["blue"]));
        let mut sub = AttributeMap::new();
        sub.set("color", AttributeValue::finite(["blue"]));
        let diffed = m.difference_with(&sub).unwrap();
        assert!(diffed.get("color").is_none());
    }

    #[test]
    fn absent_key_subsumed_by_anything() {
        let m = AttributeMap::new();
        let mut other = AttributeMap::new();
        other.set("color", AttributeValue::finite(["blue"]));
        assert!(m.is_subsumed_by(&other).unwrap());
    }
}
