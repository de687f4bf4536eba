//! Hierarchy and Propagation (§4.F)
//!
//! A DAG of typed graphs: nodes of the DAG are named [`Graph`]s, edges are
//! typings (checked homomorphisms from a more concrete graph to a more
//! abstract one), plus a symmetric node-set relation that carries no
//! propagation obligation of its own. Rewriting one graph in the hierarchy
//! either rejects the change (strict mode) or replays its effect onto every
//! related graph (non-strict mode): deletions and clones propagate toward
//! ancestors, additions and merges propagate toward descendants.

mod propagation;

use std::collections::{BTreeMap, BTreeSet, VecDeque};

use tracing::instrument;

use crate::error::HierarchyError;
use crate::graph::{Graph, Homomorphism, NodeId};
use crate::matcher::{find_matching, Match, PatternTyping};
use crate::rewrite::rewrite_traced;
use crate::rule::Rule;

/// Per-ancestor clone assignment: which `P`-node a given ancestor instance
/// should be pinned to, when a rewrite clones the node that typed it.
pub type PTyping = BTreeMap<String, BTreeMap<NodeId, NodeId>>;

/// Per-descendant image assignment: which existing descendant node a given
/// `R`-node's addition should be typed onto, instead of minting a new one.
pub type RhsTyping = BTreeMap<String, BTreeMap<NodeId, NodeId>>;

/// A DAG of typed graphs.
#[derive(Debug, Clone, Default)]
pub struct Hierarchy {
    graphs: BTreeMap<String, Graph>,
    /// `typings[src][tgt]` is the checked homomorphism `src -> tgt`: `src`
    /// is the more concrete graph, `tgt` the more abstract one it is typed
    /// by. `src` is a child of `tgt` in common DAG terminology.
    typings: BTreeMap<String, BTreeMap<String, Homomorphism>>,
    relations: BTreeMap<(String, String), BTreeSet<(NodeId, NodeId)>>,
}

impl Hierarchy {
    pub fn new() -> Self {
        Hierarchy::default()
    }

    pub fn graph(&self, id: &str) -> Result<&Graph, HierarchyError> {
        self.graphs.get(id).ok_or_else(|| HierarchyError::GraphNotFound(id.to_string()))
    }

    pub fn graph_ids(&self) -> impl Iterator<Item = &String> {
        self.graphs.keys()
    }

    pub fn add_graph(&mut self, id: impl Into<String>, graph: Graph) -> Result<(), HierarchyError> {
        let id = id.into();
        self.graphs.entry(id).or_insert(graph);
        Ok(())
    }

    /// Removes `id`. If `reconnect`, every ancestor-typing-into-`id`
    /// composes with every `id`-typing-into-a-descendant, so typed paths
    /// through `id` survive its removal.
    pub fn remove_graph(&mut self, id: &str, reconnect: bool) -> Result<(), HierarchyError> {
        if !self.graphs.contains_key(id) {
            return Err(HierarchyError::GraphNotFound(id.to_string()));
        }
        if reconnect {
            let parents: Vec<(String, Homomorphism)> = self
                .typings
                .get(id)
                .map(|m| m.iter().map(|(tgt, h)| (tgt.clone(), h.clone())).collect())
                .unwrap_or_default();
            let children: Vec<(String, Homomorphism)> = self
                .typings
                .iter()
                .filter_map(|(src, tgts)| tgts.get(id).map(|h| (src.clone(), h.clone())))
                .collect();
            for (child, child_to_id) in &children {
                for (parent, id_to_parent) in &parents {
                    if child == parent {
                        continue;
                    }
                    let composed = child_to_id.compose(id_to_parent).map_err(|e| HierarchyError::InvalidTyping {
                        src: child.clone(),
                        tgt: parent.clone(),
                        source: e,
                    })?;
                    self.typings.entry(child.clone()).or_default().entry(parent.clone()).or_insert(composed);
                }
            }
        }
        self.graphs.remove(id);
        self.typings.remove(id);
        for tgts in self.typings.values_mut() {
            tgts.remove(id);
        }
        self.relations.retain(|(a, b), _| a != id && b != id);
        Ok(())
    }

    /// Validates that `mapping` is a homomorphism `src -> tgt`, that adding
    /// the edge keeps the DAG acyclic, and that it does not contradict any
    /// typing already reachable directly from `tgt`.
    #[instrument(skip(self, mapping))]
    pub fn add_typing(&mut self, src: &str, tgt: &str, mapping: BTreeMap<NodeId, NodeId>) -> Result<(), HierarchyError> {
        let src_graph = self.graph(src)?;
        let tgt_graph = self.graph(tgt)?;
        let homomorphism = Homomorphism::build(src_graph, tgt_graph, mapping).map_err(|e| HierarchyError::InvalidTyping {
            src: src.to_string(),
            tgt: tgt.to_string(),
            source: e,
        })?;

        if src == tgt || self.reaches(tgt, src) {
            return Err(HierarchyError::WouldCycle(src.to_string(), tgt.to_string()));
        }

        if let Some(existing_targets) = self.typings.get(tgt) {
            for (further, tgt_to_further) in existing_targets {
                if let Some(direct) = self.typings.get(src).and_then(|m| m.get(further)) {
                    for node in src_graph.nodes() {
                        let via_tgt = homomorphism.apply(node).and_then(|t| tgt_to_further.apply(t));
                        let via_direct = direct.apply(node);
                        if via_tgt != via_direct {
                            return Err(HierarchyError::CommutativityViolation {
                                path_a: vec![src.to_string(), tgt.to_string(), further.clone()],
                                path_b: vec![src.to_string(), further.clone()],
                                node: node.clone(),
                            });
                        }
                    }
                }
            }
        }

        self.typings.entry(src.to_string()).or_default().insert(tgt.to_string(), homomorphism);
        Ok(())
    }

    /// Every `(src, tgt, homomorphism)` typing edge in the hierarchy.
    pub fn typings(&self) -> impl Iterator<Item = (&String, &String, &Homomorphism)> {
        self.typings
            .iter()
            .flat_map(|(src, tgts)| tgts.iter().map(move |(tgt, h)| (src, tgt, h)))
    }

    pub fn typing(&self, src: &str, tgt: &str) -> Result<&Homomorphism, HierarchyError> {
        self.typings
            .get(src)
            .and_then(|m| m.get(tgt))
            .ok_or_else(|| HierarchyError::TypingNotFound(src.to_string(), tgt.to_string()))
    }

    /// Direct typing targets of `graph_id` (graphs it is typed *by*).
    pub fn outbound_typings(&self, graph_id: &str) -> impl Iterator<Item = &String> {
        self.typings.get(graph_id).into_iter().flat_map(|m| m.keys())
    }

    /// Direct typing sources of `graph_id` (graphs typed *into* it).
    pub fn inbound_typings(&self, graph_id: &str) -> Vec<String> {
        self.typings
            .iter()
            .filter_map(|(src, tgts)| if tgts.contains_key(graph_id) { Some(src.clone()) } else { None })
            .collect()
    }

    pub fn relations(&self) -> impl Iterator<Item = (&(String, String), &BTreeSet<(NodeId, NodeId)>)> {
        self.relations.iter()
    }

    pub fn add_relation(&mut self, a: &str, b: &str, pairs: BTreeSet<(NodeId, NodeId)>) -> Result<(), HierarchyError> {
        self.graph(a)?;
        self.graph(b)?;
        let key = if a <= b { (a.to_string(), b.to_string()) } else { (b.to_string(), a.to_string()) };
        self.relations.insert(key, pairs);
        Ok(())
    }

    /// The image of `node` under every outbound typing of `graph`.
    pub fn node_type(&self, graph: &str, node: &str) -> Result<BTreeMap<String, NodeId>, HierarchyError> {
        self.graph(graph)?;
        let mut types = BTreeMap::new();
        if let Some(tgts) = self.typings.get(graph) {
            for (tgt, h) in tgts {
                if let Some(image) = h.apply(node) {
                    types.insert(tgt.clone(), image.clone());
                }
            }
        }
        Ok(types)
    }

    pub fn find_matching<'a>(
        &'a self,
        graph_id: &str,
        pattern: &'a Graph,
        typing: Option<&'a PatternTyping>,
    ) -> Result<impl Iterator<Item = Match> + 'a, HierarchyError> {
        let target = self.graph(graph_id)?;
        Ok(find_matching(pattern, target, typing))
    }

    /// Applies `rule` at `m` on `graph_id`. In strict mode the rewrite is
    /// rejected outright if it would force propagation onto a related
    /// graph; otherwise it is applied and propagated per §4.F.
    #[instrument(skip(self, rule, m, p_typing, rhs_typing))]
    pub fn rewrite(
        &mut self,
        graph_id: &str,
        rule: &Rule,
        m: &Match,
        p_typing: Option<&PTyping>,
        rhs_typing: Option<&RhsTyping>,
        strict: bool,
    ) -> Result<Homomorphism, HierarchyError> {
        self.graph(graph_id)?;

        if strict {
            propagation::check_strict(self, graph_id, rule, m, p_typing, rhs_typing)?;
        }

        let trace = {
            let target = self.graphs.get_mut(graph_id).expect("checked above");
            rewrite_traced(target, rule, m)?
        };

        propagation::propagate_backward(self, graph_id, rule, &trace, p_typing)?;
        propagation::propagate_forward(self, graph_id, rule, &trace, rhs_typing)?;
        self.revalidate_relations();

        Ok(trace.witness)
    }

    fn revalidate_relations(&mut self) {
        for ((a, b), pairs) in self.relations.iter_mut() {
            let Some(ga) = self.graphs.get(a) else { continue };
            let Some(gb) = self.graphs.get(b) else { continue };
            pairs.retain(|(na, nb)| ga.has_node(na) && gb.has_node(nb));
        }
    }

    /// Is `to` reachable from `from` by following typing edges (`src` ->
    /// `tgt`)? Used to reject cycles before inserting a new typing edge.
    fn reaches(&self, from: &str, to: &str) -> bool {
        let mut seen = BTreeSet::new();
        let mut queue = VecDeque::from([from.to_string()]);
        while let Some(current) = queue.pop_front() {
            if current == to {
                return true;
            }
            if !seen.insert(current.clone()) {
                continue;
            }
            if let Some(tgts) = self.typings.get(&current) {
                queue.extend(tgts.keys().cloned());
            }
        }
        false
    }

    /// Ancestors of `graph_id` (graphs typed, directly or transitively,
    /// into it), nearest first.
    pub(crate) fn ancestors_topological(&self, graph_id: &str) -> Vec<String> {
        let mut order = Vec::new();
        let mut frontier: Vec<String> = self.inbound_typings(graph_id);
        let mut seen: BTreeSet<String> = BTreeSet::new();
        while !frontier.is_empty() {
            let mut next = Vec::new();
            for a in frontier {
                if seen.insert(a.clone()) {
                    next.extend(self.inbound_typings(&a));
                    order.push(a);
                }
            }
            frontier = next;
        }
        order
    }

    /// Descendants of `graph_id` (graphs it is typed, directly or
    /// transitively, into), nearest first.
    pub(crate) fn descendants_topological(&self, graph_id: &str) -> Vec<String> {
        let mut order = Vec::new();
        let mut frontier: Vec<String> = self.outbound_typings(graph_id).cloned().collect();
        let mut seen: BTreeSet<String> = BTreeSet::new();
        while !frontier.is_empty() {
            let mut next = Vec::new();
            for d in frontier {
                if seen.insert(d.clone()) {
                    next.extend(self.outbound_typings(&d).cloned());
                    order.push(d);
                }
            }
            frontier = next;
        }
        order
    }

    pub(crate) fn graph_mut(&mut self, id: &str) -> &mut Graph {
        self.graphs.get_mut(id).expect("caller already checked id exists")
    }

    pub(crate) fn typing_or_none(&self, src: &str, tgt: &str) -> Option<&Homomorphism> {
        self.typings.get(src).and_then(|m| m.get(tgt))
    }

    pub(crate) fn set_typing_unchecked(&mut self, src: &str, tgt: &str, h: Homomorphism) {
        self.typings.entry(src.to_string()).or_default().insert(tgt.to_string(), h);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rule::Rule;

    fn single_node_graph(id: &str) -> Graph {
        let mut g = Graph::new();
        g.add_node(id, None).unwrap();
        g
    }

    #[test]
    fn add_typing_validates_homomorphism() {
        let mut h = Hierarchy::new();
        h.add_graph("child", single_node_graph("a")).unwrap();
        h.add_graph("parent", single_node_graph("t")).unwrap();
        let mapping: BTreeMap<NodeId, NodeId> = [("a".to_string(), "t".to_string())].into();
        h.add_typing("child", "parent", mapping).unwrap();
        assert_eq!(h.node_type("child", "a").unwrap().get("parent"), Some(&"t".to_string()));
    }

    #[test]
    fn add_typing_rejects_cycle() {
        let mut h = Hierarchy::new();
        h.add_graph("a", single_node_graph("x")).unwrap();
        h.add_graph("b", single_node_graph("y")).unwrap();
        let mapping: BTreeMap<NodeId, NodeId> = [("x".to_string(), "y".to_string())].into();
        h.add_typing("a", "b", mapping).unwrap();
        let back: BTreeMap<NodeId, NodeId> = [("y".to_string(), "x".to_string())].into();
        let err = h.add_typing("b", "a", back).unwrap_err();
        assert!(matches!(err, HierarchyError::WouldCycle(_, _)));
    }

    #[test]
    fn strict_rewrite_rejects_forced_backward_deletion() {
        let mut hierarchy = Hierarchy::new();
        let mut parent = Graph::new();
        parent.add_node("p", None).unwrap();
        hierarchy.add_graph("parent", parent).unwrap();

        let mut child = Graph::new();
        child.add_node("c", None).unwrap();
        hierarchy.add_graph("child", child).unwrap();
        let mapping: BTreeMap<NodeId, NodeId> = [("c".to_string(), "p".to_string())].into();
        hierarchy.add_typing("child", "parent", mapping).unwrap();

        let mut l = Graph::new();
        l.add_node("x", None).unwrap();
        let mut rule = Rule::from_pattern(l);
        rule.inject_remove_node("x").unwrap();

        let m: Match = [("x".to_string(), "p".to_string())].into_iter().collect();
        let err = hierarchy.rewrite("parent", &rule, &m, None, None, true).unwrap_err();
        assert!(matches!(err, HierarchyError::StrictModeViolation { .. }));
    }

    #[test]
    fn non_strict_rewrite_cascades_deletion_to_child() {
        let mut hierarchy = Hierarchy::new();
        let mut parent = Graph::new();
        parent.add_node("p", None).unwrap();
        hierarchy.add_graph("parent", parent).unwrap();

        let mut child = Graph::new();
        child.add_node("c", None).unwrap();
        hierarchy.add_graph("child", child).unwrap();
        let mapping: BTreeMap<NodeId, NodeId> = [("c".to_string(), "p".to_string())].into();
        hierarchy.add_typing("child", "parent", mapping).unwrap();

        let mut l = Graph::new();
        l.add_node("x", None).unwrap();
        let mut rule = Rule::from_pattern(l);
        rule.inject_remove_node("x").unwrap();

        let m: Match = [("x".to_string(), "p".to_string())].into_iter().collect();
        hierarchy.rewrite("parent", &rule, &m, None, None, false).unwrap();

        assert!(!hierarchy.graph("parent").unwrap().has_node("p"));
        assert!(!hierarchy.graph("child").unwrap().has_node("c"));
    }
}
