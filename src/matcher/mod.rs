//! Pattern Matcher (§4.C)
//!
//! Enumerates node-injective homomorphisms (monomorphisms) `L -> G` that
//! respect edge existence and attribute subsumption, in a deterministic
//! order derived from a total order over node ids, as a lazy iterator so
//! callers can consume a prefix and stop.

use std::collections::{BTreeMap, BTreeSet};

use tracing::instrument;

use crate::graph::{Graph, Homomorphism, NodeId};

/// A single match: a total injective map from pattern nodes to target nodes.
pub type Match = BTreeMap<NodeId, NodeId>;

/// Restricts each pattern node to a permitted subset of target nodes, used
/// by [`crate::hierarchy::Hierarchy::find_matching`] to search only within
/// a typing fiber.
#[derive(Debug, Clone, Default)]
pub struct PatternTyping(BTreeMap<NodeId, BTreeSet<NodeId>>);

impl PatternTyping {
    pub fn new() -> Self {
        PatternTyping::default()
    }

    pub fn restrict(mut self, pattern_node: impl Into<NodeId>, allowed: BTreeSet<NodeId>) -> Self {
        self.0.insert(pattern_node.into(), allowed);
        self
    }

    fn allows(&self, pattern_node: &str, target_node: &str) -> bool {
        match self.0.get(pattern_node) {
            Some(allowed) => allowed.contains(target_node),
            None => true,
        }
    }
}

/// Enumerate all monomorphisms `pattern -> target`, optionally constrained
/// by a [`PatternTyping`]. The returned iterator is lazy: a backtracking
/// search resumes from its stack on each `next()` call.
#[instrument(skip(pattern, target, typing))]
pub fn find_matching<'a>(
    pattern: &'a Graph,
    target: &'a Graph,
    typing: Option<&'a PatternTyping>,
) -> MatchIter<'a> {
    let order: Vec<NodeId> = {
        let mut nodes: Vec<NodeId> = pattern.nodes().cloned().collect();
        nodes.sort_by(|a, b| {
            degree(pattern, b)
                .cmp(&degree(pattern, a))
                .then_with(|| a.cmp(b))
        });
        nodes
    };
    MatchIter {
        pattern,
        target,
        typing,
        order,
        stack: vec![Frame {
            assigned: Match::new(),
            used: BTreeSet::new(),
            candidates: None,
        }],
        started: false,
    }
}

fn degree(g: &Graph, id: &str) -> usize {
    g.successors(id).count() + g.predecessors(id).count()
}

struct Frame {
    assigned: Match,
    used: BTreeSet<NodeId>,
    /// Remaining candidate target nodes for `order[assigned.len()]`, lazily
    /// computed and drained one at a time.
    candidates: Option<std::vec::IntoIter<NodeId>>,
}

/// Lazy backtracking monomorphism search.
pub struct MatchIter<'a> {
    pattern: &'a Graph,
    target: &'a Graph,
    typing: Option<&'a PatternTyping>,
    order: Vec<NodeId>,
    stack: Vec<Frame>,
    started: bool,
}

impl<'a> MatchIter<'a> {
    fn candidates_for(&self, pattern_node: &str, used: &BTreeSet<NodeId>) -> Vec<NodeId> {
        let mut candidates: Vec<NodeId> = self
            .target
            .nodes()
            .filter(|n| !used.contains(*n))
            .filter(|n| match self.typing {
                Some(t) => t.allows(pattern_node, n),
                None => true,
            })
            .filter(|n| degree(self.target, n) >= degree(self.pattern, pattern_node))
            .filter(|n| self.attrs_compatible(pattern_node, n))
            .cloned()
            .collect();
        candidates.sort();
        candidates
    }

    fn attrs_compatible(&self, pattern_node: &str, target_node: &str) -> bool {
        let pattern_attrs = self.pattern.node_attrs(pattern_node).expect("pattern node exists");
        let target_attrs = self.target.node_attrs(target_node).expect("candidate exists");
        pattern_attrs.is_subsumed_by(target_attrs).unwrap_or(false)
    }

    /// Does `assigned ∪ {pattern_node -> target_node}` preserve every
    /// pattern edge incident to `pattern_node` whose other endpoint is
    /// already assigned, including attribute subsumption on that edge?
    fn consistent_with_partial(&self, pattern_node: &str, target_node: &str, assigned: &Match) -> bool {
        for (u, v, attrs) in self.pattern.edges() {
            let (hu, hv): (Option<&NodeId>, Option<&NodeId>) = (
                if u == pattern_node { Some(&target_node.to_string()) } else { assigned.get(u) },
                if v == pattern_node { Some(&target_node.to_string()) } else { assigned.get(v) },
            );
            // Only check edges where both endpoints are now determined and
            // at least one is the node we are about to assign.
            if u != pattern_node && v != pattern_node {
                continue;
            }
            let (Some(hu), Some(hv)) = (hu, hv) else { continue };
            if !self.target.has_edge(hu, hv) {
                return false;
            }
            let image_attrs = self.target.edge_attrs(hu, hv).expect("checked has_edge above");
            if !attrs.is_subsumed_by(image_attrs).unwrap_or(false) {
                return false;
            }
        }
        true
    }
}

impl<'a> Iterator for MatchIter<'a> {
    type Item = Match;

    fn next(&mut self) -> Option<Match> {
        if self.order.is_empty() {
            if !self.started {
                self.started = true;
                return Some(Match::new());
            }
            return None;
        }

        loop {
            let depth = self.stack.len() - 1;
            if depth == self.order.len() {
                // Complete assignment sitting on top of the stack: emit it,
                // then pop so the next call resumes the search from the
                // parent frame's next untried candidate.
                return self.stack.pop().map(|f| f.assigned);
            }

            let pattern_node = &self.order[depth];
            let frame = self.stack.last_mut().expect("stack never empty while searching");
            if frame.candidates.is_none() {
                let candidates = self.candidates_for(pattern_node, &frame.used);
                frame.candidates = Some(candidates.into_iter());
            }

            let used_so_far = frame.used.clone();
            let assigned_so_far = frame.assigned.clone();
            let next_candidate = self.stack.last_mut().unwrap().candidates.as_mut().unwrap().next();

            match next_candidate {
                Some(target_node) => {
                    if !self.consistent_with_partial(pattern_node, &target_node, &assigned_so_far) {
                        continue;
                    }
                    let mut assigned = assigned_so_far;
                    assigned.insert(pattern_node.clone(), target_node.clone());
                    let mut used = used_so_far;
                    used.insert(target_node);
                    self.stack.push(Frame {
                        assigned,
                        used,
                        candidates: None,
                    });
                }
                None => {
                    self.stack.pop();
                    if self.stack.is_empty() {
                        return None;
                    }
                }
            }
        }
    }
}

/// Converts a completed [`Match`] into a checked [`Homomorphism`]; callers
/// that already trust the matcher's output (it only ever yields valid
/// monomorphisms) can skip the re-validation `Homomorphism::build` would
/// otherwise perform.
pub fn into_homomorphism(m: Match) -> Homomorphism {
    Homomorphism::from_checked_mapping(m)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attribute_set::AttributeValue;
    use crate::graph::AttributeMap;

    fn target_graph() -> Graph {
        let mut g = Graph::new();
        for (n, color) in [("1", "blue"), ("2", "blue"), ("3", "red")] {
            let mut attrs = AttributeMap::new();
            attrs.set("color", AttributeValue::finite([color]));
            g.add_node(n, Some(attrs)).unwrap();
        }
        let mut friends = AttributeMap::new();
        friends.set("friends", AttributeValue::finite([true]));
        g.add_edge("1", "2", Some(friends.clone())).unwrap();
        g.add_edge("3", "2", Some(friends)).unwrap();
        g
    }

    fn friend_pattern() -> Graph {
        let mut l = Graph::new();
        l.add_node("x", None).unwrap();
        l.add_node("y", None).unwrap();
        let mut friends = AttributeMap::new();
        friends.set("friends", AttributeValue::finite([true]));
        l.add_edge("x", "y", Some(friends)).unwrap();
        l
    }

    #[test]
    fn finds_all_matches_deterministically() {
        let g = target_graph();
        let l = friend_pattern();
        let matches: Vec<Match> = find_matching(&l, &g, None).collect();
        assert_eq!(matches.len(), 2);
        let again: Vec<Match> = find_matching(&l, &g, None).collect();
        assert_eq!(matches, again);
    }

    #[test]
    fn empty_pattern_matches_once() {
        let empty = Graph::new();
        let g = target_graph();
        let matches: Vec<Match> = find_matching(&empty, &g, None).collect();
        assert_eq!(matches, vec![Match::new()]);
    }

    #[test]
    fn no_match_returns_empty_sequence() {
        let mut l = Graph::new();
        l.add_node("x", None).unwrap();
        l.add_node("y", None).unwrap();
        l.add_node("z", None).unwrap();
        l.add_edge("x", "y", None).unwrap();
        l.add_edge("y", "z", None).unwrap();
        l.add_edge("z", "x", None).unwrap();
        let g = target_graph();
        let matches: Vec<Match> = find_matching(&l, &g, None).collect();
        assert!(matches.is_empty());
    }

    #[test]
    fn lazy_iterator_can_stop_after_first() {
        let g = target_graph();
        let l = friend_pattern();
        let mut iter = find_matching(&l, &g, None);
        assert!(iter.next().is_some());
    }
}
