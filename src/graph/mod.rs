//! Graph and Homomorphism (§4.B)
//!
//! A simple directed graph with attributed nodes and edges, stored as two
//! adjacency maps (outgoing, incoming) keyed by node id — the arena design
//! of `spec.md` §9, which sidesteps pointer cycles and keeps clone/merge
//! proportional to degree.

mod attrs;
mod backend;
pub mod homomorphism;

pub use attrs::AttributeMap;
pub use backend::GraphBackend;
pub use homomorphism::Homomorphism;

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use tracing::instrument;

use crate::error::GraphError;

/// An opaque, hashable node identifier. Usually a short human-readable
/// string; the crate never interprets its contents.
pub type NodeId = String;

/// A simple directed graph: at most one edge per ordered pair, self-loops
/// permitted, every edge's endpoints present (§3 invariants).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Graph {
    nodes: BTreeMap<NodeId, AttributeMap>,
    /// `out_edges[u][v]` is the attribute map of edge `(u, v)`.
    out_edges: BTreeMap<NodeId, BTreeMap<NodeId, AttributeMap>>,
    /// `in_edges[v]` is the set of `u` such that `(u, v)` is an edge; kept
    /// redundant with `out_edges` so `remove_node` and predecessor lookups
    /// are proportional to degree, not to graph size.
    in_edges: BTreeMap<NodeId, BTreeSet<NodeId>>,
    next_auto_id: u64,
}

impl Graph {
    pub fn new() -> Self {
        Graph::default()
    }

    // -- Queries --------------------------------------------------------

    pub fn has_node(&self, id: &str) -> bool {
        self.nodes.contains_key(id)
    }

    pub fn has_edge(&self, u: &str, v: &str) -> bool {
        self.out_edges.get(u).is_some_and(|m| m.contains_key(v))
    }

    pub fn node_attrs(&self, id: &str) -> Result<&AttributeMap, GraphError> {
        self.nodes.get(id).ok_or_else(|| GraphError::NodeNotFound(id.to_string()))
    }

    pub fn edge_attrs(&self, u: &str, v: &str) -> Result<&AttributeMap, GraphError> {
        self.out_edges
            .get(u)
            .and_then(|m| m.get(v))
            .ok_or_else(|| GraphError::EdgeNotFound(u.to_string(), v.to_string()))
    }

    pub fn nodes(&self) -> impl Iterator<Item = &NodeId> {
        self.nodes.keys()
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn edges(&self) -> impl Iterator<Item = (&NodeId, &NodeId, &AttributeMap)> {
        self.out_edges
            .iter()
            .flat_map(|(u, targets)| targets.iter().map(move |(v, attrs)| (u, v, attrs)))
    }

    pub fn edge_count(&self) -> usize {
        self.out_edges.values().map(BTreeMap::len).sum()
    }

    pub fn successors(&self, id: &str) -> impl Iterator<Item = &NodeId> {
        self.out_edges.get(id).into_iter().flat_map(BTreeMap::keys)
    }

    pub fn predecessors(&self, id: &str) -> impl Iterator<Item = &NodeId> {
        self.in_edges.get(id).into_iter().flatten()
    }

    /// Mints a fresh, collision-free id from this graph's monotonic
    /// per-graph counter (§5, §9: deterministic, never wall-clock derived).
    pub fn fresh_id(&mut self, prefix: &str) -> NodeId {
        loop {
            let candidate = format!("{prefix}_{}", self.next_auto_id);
            self.next_auto_id += 1;
            if !self.nodes.contains_key(&candidate) {
                return candidate;
            }
        }
    }

    // -- Primitive edits --------------------------------------------------

    pub fn add_node(&mut self, id: impl Into<NodeId>, attrs: Option<AttributeMap>) -> Result<(), GraphError> {
        let id = id.into();
        if self.nodes.contains_key(&id) {
            return Err(GraphError::NodeExists(id));
        }
        self.nodes.insert(id.clone(), attrs.unwrap_or_default());
        self.out_edges.entry(id.clone()).or_default();
        self.in_edges.entry(id).or_default();
        Ok(())
    }

    #[instrument(skip(self))]
    pub fn remove_node(&mut self, id: &str) -> Result<(), GraphError> {
        if !self.nodes.contains_key(id) {
            return Err(GraphError::NodeNotFound(id.to_string()));
        }
        let successors: Vec<NodeId> = self.successors(id).cloned().collect();
        for v in successors {
            self.remove_edge_unchecked(id, &v);
        }
        let predecessors: Vec<NodeId> = self.predecessors(id).cloned().collect();
        for u in predecessors {
            self.remove_edge_unchecked(&u, id);
        }
        self.nodes.remove(id);
        self.out_edges.remove(id);
        self.in_edges.remove(id);
        Ok(())
    }

    pub fn add_edge(&mut self, u: &str, v: &str, attrs: Option<AttributeMap>) -> Result<(), GraphError> {
        if !self.nodes.contains_key(u) {
            return Err(GraphError::NodeNotFound(u.to_string()));
        }
        if !self.nodes.contains_key(v) {
            return Err(GraphError::NodeNotFound(v.to_string()));
        }
        if self.has_edge(u, v) {
            return Err(GraphError::EdgeExists(u.to_string(), v.to_string()));
        }
        self.out_edges.entry(u.to_string()).or_default().insert(v.to_string(), attrs.unwrap_or_default());
        self.in_edges.entry(v.to_string()).or_default().insert(u.to_string());
        Ok(())
    }

    pub fn remove_edge(&mut self, u: &str, v: &str) -> Result<(), GraphError> {
        if !self.has_edge(u, v) {
            return Err(GraphError::EdgeNotFound(u.to_string(), v.to_string()));
        }
        self.remove_edge_unchecked(u, v);
        Ok(())
    }

    fn remove_edge_unchecked(&mut self, u: &str, v: &str) {
        if let Some(targets) = self.out_edges.get_mut(u) {
            targets.remove(v);
        }
        if let Some(sources) = self.in_edges.get_mut(v) {
            sources.remove(u);
        }
    }

    pub fn add_node_attrs(&mut self, id: &str, attrs: &AttributeMap) -> Result<(), GraphError> {
        let existing = self.node_attrs(id)?;
        let merged = existing.union_with(attrs)?;
        self.nodes.insert(id.to_string(), merged);
        Ok(())
    }

    pub fn remove_node_attrs(&mut self, id: &str, attrs: &AttributeMap) -> Result<(), GraphError> {
        let existing = self.node_attrs(id)?;
        let diffed = existing.difference_with(attrs)?;
        self.nodes.insert(id.to_string(), diffed);
        Ok(())
    }

    pub fn add_edge_attrs(&mut self, u: &str, v: &str, attrs: &AttributeMap) -> Result<(), GraphError> {
        let existing = self.edge_attrs(u, v)?;
        let merged = existing.union_with(attrs)?;
        self.out_edges.get_mut(u).expect("edge exists").insert(v.to_string(), merged);
        Ok(())
    }

    pub fn remove_edge_attrs(&mut self, u: &str, v: &str, attrs: &AttributeMap) -> Result<(), GraphError> {
        let existing = self.edge_attrs(u, v)?;
        let diffed = existing.difference_with(attrs)?;
        self.out_edges.get_mut(u).expect("edge exists").insert(v.to_string(), diffed);
        Ok(())
    }

    /// Renames `old` to `new`; attributes and incident edges are preserved.
    pub fn relabel_node(&mut self, old: &str, new: impl Into<NodeId>) -> Result<(), GraphError> {
        let new = new.into();
        if old == new {
            return Ok(());
        }
        if !self.nodes.contains_key(old) {
            return Err(GraphError::NodeNotFound(old.to_string()));
        }
        if self.nodes.contains_key(&new) {
            return Err(GraphError::RelabelCollision {
                old: old.to_string(),
                new,
            });
        }
        let attrs = self.nodes.remove(old).expect("checked above");
        self.nodes.insert(new.clone(), attrs);

        let out = self.out_edges.remove(old).unwrap_or_default();
        for v in out.keys() {
            if let Some(sources) = self.in_edges.get_mut(v) {
                sources.remove(old);
                sources.insert(new.clone());
            }
        }
        let out = rename_self_loop(out, old, &new);
        self.out_edges.insert(new.clone(), out);

        let preds = self.in_edges.remove(old).unwrap_or_default();
        for u in &preds {
            if let Some(targets) = self.out_edges.get_mut(u) {
                if let Some(attrs) = targets.remove(old) {
                    targets.insert(new.clone(), attrs);
                }
            }
        }
        let preds = rename_set_member(preds, old, &new);
        self.in_edges.insert(new, preds);
        Ok(())
    }

    /// Disjoint copy of `id`'s attributes and incident edges; self-loops
    /// become four edges per §4.B. Returns the clone's id.
    #[instrument(skip(self))]
    pub fn clone_node(&mut self, id: &str, new_id: Option<NodeId>) -> Result<NodeId, GraphError> {
        if !self.nodes.contains_key(id) {
            return Err(GraphError::NodeNotFound(id.to_string()));
        }
        let new_id = self.reserve_id(new_id, id)?;
        let attrs = self.nodes.get(id).expect("checked above").clone();
        self.nodes.insert(new_id.clone(), attrs);
        self.out_edges.entry(new_id.clone()).or_default();
        self.in_edges.entry(new_id.clone()).or_default();

        let self_loop_attrs = self.out_edges[id].get(id).cloned();

        let out: Vec<(NodeId, AttributeMap)> = self.out_edges[id]
            .iter()
            .filter(|(v, _)| v.as_str() != id)
            .map(|(v, a)| (v.clone(), a.clone()))
            .collect();
        for (v, a) in out {
            self.add_edge(&new_id, &v, Some(a)).expect("fresh clone node has no such edge yet");
        }

        let preds: Vec<(NodeId, AttributeMap)> = self.in_edges[id]
            .iter()
            .filter(|u| u.as_str() != id)
            .map(|u| (u.clone(), self.out_edges[u][id].clone()))
            .collect();
        for (u, a) in preds {
            self.add_edge(&u, &new_id, Some(a)).expect("fresh clone node has no such edge yet");
        }

        if let Some(loop_attrs) = self_loop_attrs {
            self.add_edge(id, &new_id, Some(loop_attrs.clone()))?;
            self.add_edge(&new_id, id, Some(loop_attrs.clone()))?;
            self.add_edge(&new_id, &new_id, Some(loop_attrs))?;
        }
        Ok(new_id)
    }

    /// Merges `ids` into a single node; attribute maps union per key,
    /// incident edges redirect and union on collision, and any loop among
    /// or within the merged set becomes one self-loop on the result.
    #[instrument(skip(self))]
    pub fn merge_nodes(&mut self, ids: &BTreeSet<NodeId>, new_id: Option<NodeId>) -> Result<NodeId, GraphError> {
        if ids.is_empty() {
            return Err(GraphError::EmptyMergeSet);
        }
        for id in ids {
            if !self.nodes.contains_key(id) {
                return Err(GraphError::NodeNotFound(id.clone()));
            }
        }
        let new_id = match new_id {
            Some(id) => id,
            None => self.fresh_id("merged"),
        };

        let mut merged_attrs = AttributeMap::new();
        for id in ids {
            merged_attrs = merged_attrs.union_with(&self.nodes[id])?;
        }

        // Snapshot redirected edges before mutating.
        let mut redirected: BTreeMap<(NodeId, NodeId), AttributeMap> = BTreeMap::new();
        let mut self_loop: Option<AttributeMap> = None;
        for (u, v, attrs) in self.edges() {
            let u_in = ids.contains(u);
            let v_in = ids.contains(v);
            if !u_in && !v_in {
                continue;
            }
            if u_in && v_in {
                self_loop = Some(match self_loop {
                    Some(existing) => existing.union_with(attrs)?,
                    None => attrs.clone(),
                });
            } else if u_in {
                let key = (new_id.clone(), v.clone());
                Self::accumulate(&mut redirected, key, attrs)?;
            } else {
                let key = (u.clone(), new_id.clone());
                Self::accumulate(&mut redirected, key, attrs)?;
            }
        }

        for id in ids {
            self.remove_node(id)?;
        }
        self.add_node(new_id.clone(), Some(merged_attrs))?;
        for ((u, v), attrs) in redirected {
            self.add_edge(&u, &v, Some(attrs))?;
        }
        if let Some(loop_attrs) = self_loop {
            self.add_edge(&new_id, &new_id, Some(loop_attrs))?;
        }
        Ok(new_id)
    }

    fn accumulate(
        map: &mut BTreeMap<(NodeId, NodeId), AttributeMap>,
        key: (NodeId, NodeId),
        attrs: &AttributeMap,
    ) -> Result<(), GraphError> {
        let merged = match map.get(&key) {
            Some(existing) => existing.union_with(attrs)?,
            None => attrs.clone(),
        };
        map.insert(key, merged);
        Ok(())
    }

    fn reserve_id(&mut self, requested: Option<NodeId>, fallback_prefix: &str) -> Result<NodeId, GraphError> {
        match requested {
            Some(id) => {
                if self.nodes.contains_key(&id) {
                    return Err(GraphError::NodeExists(id));
                }
                Ok(id)
            }
            None => Ok(self.fresh_id(fallback_prefix)),
        }
    }
}

fn rename_self_loop(
    mut out: BTreeMap<NodeId, AttributeMap>,
    old: &str,
    new: &str,
) -> BTreeMap<NodeId, AttributeMap> {
    if let Some(attrs) = out.remove(old) {
        out.insert(new.to_string(), attrs);
    }
    out
}

fn rename_set_member(mut set: BTreeSet<NodeId>, old: &str, new: &str) -> BTreeSet<NodeId> {
    if set.remove(old) {
        set.insert(new.to_string());
    }
    set
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attribute_set::AttributeValue;

    fn attrs(pairs: &[(&str, AttributeValue)]) -> AttributeMap {
        AttributeMap::from_pairs(pairs.iter().map(|(k, v)| (k.to_string(), v.clone())))
    }

    #[test]
    fn remove_node_cascades_edges() {
        let mut g = Graph::new();
        g.add_node("a", None).unwrap();
        g.add_node("b", None).unwrap();
        g.add_edge("a", "b", None).unwrap();
        g.remove_node("a").unwrap();
        assert!(!g.has_node("a"));
        assert!(!g.has_edge("a", "b"));
        assert!(g.has_node("b"));
    }

    #[test]
    fn clone_node_duplicates_self_loop_as_four_edges() {
        let mut g = Graph::new();
        g.add_node("a", None).unwrap();
        g.add_edge("a", "a", Some(attrs(&[("w", AttributeValue::finite([1i64]))]))).unwrap();
        let clone = g.clone_node("a", Some("a_clone".to_string())).unwrap();
        assert!(g.has_edge("a", "a"));
        assert!(g.has_edge("a", &clone));
        assert!(g.has_edge(&clone, "a"));
        assert!(g.has_edge(&clone, &clone));
        assert_eq!(g.edge_attrs("a", &clone).unwrap(), g.edge_attrs("a", "a").unwrap());
    }

    #[test]
    fn clone_node_duplicates_incident_edges() {
        let mut g = Graph::new();
        for n in ["a", "b", "c"] {
            g.add_node(n, None).unwrap();
        }
        g.add_edge("a", "b", None).unwrap();
        g.add_edge("c", "a", None).unwrap();
        let clone = g.clone_node("a", None).unwrap();
        assert!(g.has_edge(&clone, "b"));
        assert!(g.has_edge("c", &clone));
    }

    #[test]
    fn merge_single_element_is_identity() {
        let mut g = Graph::new();
        g.add_node("a", Some(attrs(&[("color", AttributeValue::finite(["blue"]))]))).unwrap();
        let ids: BTreeSet<NodeId> = ["a".to_string()].into();
        let merged = g.merge_nodes(&ids, Some("a2".to_string())).unwrap();
        assert_eq!(g.node_attrs(&merged).unwrap().get("color"), Some(&AttributeValue::finite(["blue"])));
    }

    #[test]
    fn merge_unions_attrs_and_redirects_edges() {
        let mut g = Graph::new();
        g.add_node("1", Some(attrs(&[("color", AttributeValue::finite(["blue"]))]))).unwrap();
        g.add_node("2", None).unwrap();
        g.add_node("3", Some(attrs(&[("color", AttributeValue::finite(["red"]))]))).unwrap();
        g.add_edge("1", "2", None).unwrap();
        g.add_edge("3", "2", None).unwrap();

        let ids: BTreeSet<NodeId> = ["1".to_string(), "3".to_string()].into();
        let merged = g.merge_nodes(&ids, Some("1_3".to_string())).unwrap();

        assert_eq!(merged, "1_3");
        assert!(!g.has_node("1"));
        assert!(!g.has_node("3"));
        assert!(g.has_edge("1_3", "2"));
        assert_eq!(
            g.node_attrs("1_3").unwrap().get("color"),
            Some(&AttributeValue::finite(["blue", "red"]))
        );
    }

    #[test]
    fn relabel_preserves_attrs_and_edges() {
        let mut g = Graph::new();
        g.add_node("a", Some(attrs(&[("x", AttributeValue::finite([1i64]))]))).unwrap();
        g.add_node("b", None).unwrap();
        g.add_edge("a", "b", None).unwrap();
        g.add_edge("a", "a", None).unwrap();
        g.relabel_node("a", "z").unwrap();
        assert!(!g.has_node("a"));
        assert!(g.has_edge("z", "b"));
        assert!(g.has_edge("z", "z"));
        assert_eq!(g.node_attrs("z").unwrap().get("x"), Some(&AttributeValue::finite([1i64])));
    }

    #[test]
    fn no_multi_edges() {
        let mut g = Graph::new();
        g.add_node("a", None).unwrap();
        g.add_node("b", None).unwrap();
        g.add_edge("a", "b", None).unwrap();
        assert!(g.add_edge("a", "b", None).is_err());
    }
}
