//! Rule: a Span `L ←ℓ P →ρ R` (§4.D)
//!
//! `L` is the pattern, `P` the preserved interface, `R` the result. Built
//! either explicitly (supply all three graphs and both homomorphisms) or
//! by starting from a pattern and injecting primitive edits, which is the
//! common case: `P = R = L` initially, and each injection keeps `P`/`R`
//! and the two homomorphisms well-formed.

use std::collections::BTreeSet;

use crate::graph::{AttributeMap, Graph, Homomorphism, NodeId};
use crate::error::RuleError;

/// A span of graphs and homomorphisms describing a rewrite.
#[derive(Debug, Clone)]
pub struct Rule {
    l: Graph,
    p: Graph,
    r: Graph,
    /// `ℓ: P -> L`
    left: Homomorphism,
    /// `ρ: P -> R`
    right: Homomorphism,
}

impl Rule {
    /// Explicit construction: validates both legs of the span.
    pub fn new(l: Graph, p: Graph, r: Graph, left: Homomorphism, right: Homomorphism) -> Result<Rule, RuleError> {
        Homomorphism::build(&p, &l, left.mapping().clone()).map_err(RuleError::InvalidSpan)?;
        Homomorphism::build(&p, &r, right.mapping().clone()).map_err(RuleError::InvalidSpan)?;
        Ok(Rule { l, p, r, left, right })
    }

    /// `P = R = L`, identity on both legs: the starting point for
    /// transform-from-pattern construction.
    pub fn from_pattern(l: Graph) -> Rule {
        let identity = |g: &Graph| -> Homomorphism {
            let mapping = g.nodes().map(|n| (n.clone(), n.clone())).collect();
            Homomorphism::from_checked_mapping(mapping)
        };
        let left = identity(&l);
        let right = identity(&l);
        let p = l.clone();
        let r = l.clone();
        Rule { l, p, r, left, right }
    }

    pub fn lhs(&self) -> &Graph {
        &self.l
    }

    pub fn preserved(&self) -> &Graph {
        &self.p
    }

    pub fn rhs(&self) -> &Graph {
        &self.r
    }

    pub fn left_leg(&self) -> &Homomorphism {
        &self.left
    }

    pub fn right_leg(&self) -> &Homomorphism {
        &self.right
    }

    // -- Injections -------------------------------------------------------

    /// Adds a second preimage of `x` (an `L`-node) in `P`, and a
    /// corresponding vertex in `R`: `x` becomes cloned by this rule.
    pub fn inject_clone_node(&mut self, x: &str, new_p_id: Option<NodeId>) -> Result<NodeId, RuleError> {
        if !self.l.has_node(x) {
            return Err(RuleError::UnknownLhsNode(x.to_string()));
        }
        let p_preimage = self.left.preimage_of(x);
        let Some(p_node) = p_preimage.iter().next() else {
            return Err(RuleError::NothingToClone(x.to_string()));
        };
        let p_clone_id = self.p.clone_node(p_node, new_p_id)?;
        let r_clone_id = self.r.clone_node(&self.right.apply(p_node).expect("ρ is total").clone(), None)?;

        let mut left_map = self.left.mapping().clone();
        left_map.insert(p_clone_id.clone(), x.to_string());
        self.left = Homomorphism::from_checked_mapping(left_map);

        let mut right_map = self.right.mapping().clone();
        right_map.insert(p_clone_id.clone(), r_clone_id);
        self.right = Homomorphism::from_checked_mapping(right_map);

        Ok(p_clone_id)
    }

    /// Removes an `L`-node (and cascading edges) from the rule's pattern:
    /// it will not be matched against again and will be deleted on rewrite
    /// if still matched via an earlier-built instance. In practice this
    /// removes every `P`-preimage of `x`, so `ℓ` stays total on the
    /// shrunk `P`.
    pub fn inject_remove_node(&mut self, x: &str) -> Result<(), RuleError> {
        if !self.l.has_node(x) {
            return Err(RuleError::UnknownLhsNode(x.to_string()));
        }
        let preimages = self.left.preimage_of(x);
        let mut left_map = self.left.mapping().clone();
        let mut right_map = self.right.mapping().clone();
        for p_node in &preimages {
            self.p.remove_node(p_node)?;
            left_map.remove(p_node);
            if let Some(r_node) = right_map.remove(p_node) {
                let still_mapped = right_map.values().any(|v| *v == r_node);
                if !still_mapped && self.r.has_node(&r_node) {
                    self.r.remove_node(&r_node)?;
                }
            }
        }
        self.left = Homomorphism::from_checked_mapping(left_map);
        self.right = Homomorphism::from_checked_mapping(right_map);
        Ok(())
    }

    /// Removes an `L`-edge from `P` (keeping both endpoints).
    pub fn inject_remove_edge(&mut self, u: &str, v: &str) -> Result<(), RuleError> {
        if !self.l.has_edge(u, v) {
            return Err(RuleError::Graph(crate::error::GraphError::EdgeNotFound(u.to_string(), v.to_string())));
        }
        for p_u in self.left.preimage_of(u) {
            for p_v in self.left.preimage_of(v) {
                if self.p.has_edge(&p_u, &p_v) {
                    self.p.remove_edge(&p_u, &p_v)?;
                    if self.r.has_edge(
                        self.right.apply(&p_u).expect("ρ total"),
                        self.right.apply(&p_v).expect("ρ total"),
                    ) {
                        let ru = self.right.apply(&p_u).expect("ρ total").clone();
                        let rv = self.right.apply(&p_v).expect("ρ total").clone();
                        self.r.remove_edge(&ru, &rv)?;
                    }
                }
            }
        }
        Ok(())
    }

    /// Adds a fresh node to `R` only: it has no `P`-preimage, so it will be
    /// added on rewrite.
    pub fn inject_add_node(&mut self, id: impl Into<NodeId>, attrs: Option<AttributeMap>) -> Result<NodeId, RuleError> {
        let id = id.into();
        self.r.add_node(id.clone(), attrs)?;
        Ok(id)
    }

    /// Adds a fresh edge between two `R`-nodes.
    pub fn inject_add_edge(&mut self, u: &str, v: &str, attrs: Option<AttributeMap>) -> Result<(), RuleError> {
        if !self.r.has_node(u) {
            return Err(RuleError::UnknownRhsNode(u.to_string()));
        }
        if !self.r.has_node(v) {
            return Err(RuleError::UnknownRhsNode(v.to_string()));
        }
        self.r.add_edge(u, v, attrs)?;
        Ok(())
    }

    /// Merges the `R`-images of a set of `P`-nodes: those preimage clones
    /// will be merged on rewrite.
    pub fn inject_merge_nodes(&mut self, p_nodes: &BTreeSet<NodeId>, new_r_id: Option<NodeId>) -> Result<NodeId, RuleError> {
        if p_nodes.len() < 2 {
            return Err(RuleError::MergeRequiresTwo);
        }
        let r_targets: BTreeSet<NodeId> = p_nodes
            .iter()
            .map(|p| self.right.apply(p).cloned())
            .collect::<Option<BTreeSet<_>>>()
            .ok_or_else(|| RuleError::UnknownLhsNode("<p-node missing from ρ>".to_string()))?;
        let merged_id = self.r.merge_nodes(&r_targets, new_r_id)?;
        let mut right_map = self.right.mapping().clone();
        for (p, r) in right_map.iter_mut() {
            if p_nodes.contains(p) && r_targets.contains(r) {
                *r = merged_id.clone();
            }
        }
        self.right = Homomorphism::from_checked_mapping(right_map);
        Ok(merged_id)
    }

    /// Removes `attrs` from an `L`-node's image in `P` (and, transitively,
    /// from `R` since the attribute difference also applies there).
    pub fn inject_remove_attrs(&mut self, l_node: &str, attrs: &AttributeMap) -> Result<(), RuleError> {
        for p_node in self.left.preimage_of(l_node) {
            self.p.remove_node_attrs(&p_node, attrs)?;
            if let Some(r_node) = self.right.apply(&p_node).cloned() {
                self.r.remove_node_attrs(&r_node, attrs)?;
            }
        }
        Ok(())
    }

    /// Adds `attrs` to an `R`-node (attributes not hit by `ρ` are "added").
    pub fn inject_add_attrs(&mut self, r_node: &str, attrs: &AttributeMap) -> Result<(), RuleError> {
        self.r.add_node_attrs(r_node, attrs)?;
        Ok(())
    }

    // -- Derived predicates (§4.D) -----------------------------------------

    pub fn deletes_node(&self, l_node: &str) -> bool {
        self.left.preimage_of(l_node).is_empty()
    }

    pub fn deletes_edge(&self, u: &str, v: &str) -> bool {
        if !self.l.has_edge(u, v) {
            return false;
        }
        !self
            .left
            .preimage_of(u)
            .iter()
            .any(|pu| self.left.preimage_of(v).iter().any(|pv| self.p.has_edge(pu, pv)))
    }

    pub fn clones_node(&self, l_node: &str) -> bool {
        self.left.preimage_of(l_node).len() >= 2
    }

    pub fn adds_node(&self, r_node: &str) -> bool {
        !self.right.mapping().values().any(|v| v == r_node)
    }

    pub fn adds_edge(&self, u: &str, v: &str) -> bool {
        if !self.r.has_edge(u, v) {
            return false;
        }
        !self.p.edges().any(|(pu, pv, _)| {
            self.right.apply(pu).map(String::as_str) == Some(u) && self.right.apply(pv).map(String::as_str) == Some(v)
        })
    }

    pub fn merges_nodes(&self, r_node: &str) -> bool {
        self.right.preimage_of(r_node).len() >= 2
    }

    pub fn clone_classes(&self) -> Vec<(NodeId, Vec<NodeId>)> {
        self.left
            .fibers()
            .into_iter()
            .filter(|(_, pre)| pre.len() >= 2)
            .collect()
    }

    pub fn merge_classes(&self) -> Vec<(NodeId, Vec<NodeId>)> {
        self.right
            .fibers()
            .into_iter()
            .filter(|(_, pre)| pre.len() >= 2)
            .collect()
    }
}
