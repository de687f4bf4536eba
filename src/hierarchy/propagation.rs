//! Strict-mode rejection and backward/forward propagation for
//! [`super::Hierarchy::rewrite`] (§4.F).

use std::collections::{BTreeMap, BTreeSet};

use tracing::instrument;

use crate::error::{GraphError, HierarchyError};
use crate::graph::{AttributeMap, Homomorphism, NodeId};
use crate::matcher::Match;
use crate::rewrite::RewriteTrace;
use crate::rule::Rule;

use super::{Hierarchy, PTyping, RhsTyping};

/// Rejects `rule`/`m` on `graph_id` if applying it would force any
/// propagation onto a related graph, per the four strict-mode conditions
/// of §4.F.
pub(super) fn check_strict(
    hierarchy: &Hierarchy,
    graph_id: &str,
    rule: &Rule,
    m: &Match,
    p_typing: Option<&PTyping>,
    rhs_typing: Option<&RhsTyping>,
) -> Result<(), HierarchyError> {
    let outbound: Vec<String> = hierarchy.outbound_typings(graph_id).cloned().collect();
    let inbound: Vec<String> = hierarchy.inbound_typings(graph_id);

    // Additions must be pre-typed toward every outbound typing.
    for y in rule.rhs().nodes() {
        if !rule.adds_node(y) {
            continue;
        }
        for tgt in &outbound {
            let typed = rhs_typing.and_then(|rt| rt.get(tgt)).is_some_and(|m| m.contains_key(y));
            if !typed {
                return Err(HierarchyError::StrictModeViolation {
                    graph: graph_id.to_string(),
                    element: y.clone(),
                    reason: format!("adds a node with no rhs_typing entry for '{tgt}'"),
                });
            }
        }
    }

    // Clones must be fully assigned for every ancestor with an instance.
    for x in rule.lhs().nodes() {
        if !rule.clones_node(x) {
            continue;
        }
        let Some(target_id) = m.get(x) else { continue };
        for ancestor in &inbound {
            let Some(typing) = hierarchy.typing_or_none(ancestor, graph_id) else { continue };
            for instance in typing.preimage_of(target_id) {
                let assigned = p_typing
                    .and_then(|pt| pt.get(ancestor))
                    .is_some_and(|m| m.contains_key(&instance));
                if !assigned {
                    return Err(HierarchyError::StrictModeViolation {
                        graph: graph_id.to_string(),
                        element: x.clone(),
                        reason: format!(
                            "clones a node with an unassigned instance '{instance}' in ancestor '{ancestor}'"
                        ),
                    });
                }
            }
        }
    }

    // Deletions must have no surviving inbound instance.
    for x in rule.lhs().nodes() {
        if !rule.deletes_node(x) {
            continue;
        }
        let Some(target_id) = m.get(x) else { continue };
        for ancestor in &inbound {
            let Some(typing) = hierarchy.typing_or_none(ancestor, graph_id) else { continue };
            if !typing.preimage_of(target_id).is_empty() {
                return Err(HierarchyError::StrictModeViolation {
                    graph: graph_id.to_string(),
                    element: x.clone(),
                    reason: format!("deletes a node with a surviving instance in ancestor '{ancestor}'"),
                });
            }
        }
    }

    // Merges must not collapse images that disagree under any outbound typing.
    for (r_node, p_nodes) in rule.merge_classes() {
        let target_ids: BTreeSet<NodeId> = p_nodes
            .iter()
            .filter_map(|p| rule.left_leg().apply(p))
            .filter_map(|l| m.get(l))
            .cloned()
            .collect();
        for tgt in &outbound {
            let Some(typing) = hierarchy.typing_or_none(graph_id, tgt) else { continue };
            let images: BTreeSet<&NodeId> = target_ids.iter().filter_map(|t| typing.apply(t)).collect();
            if images.len() > 1 {
                return Err(HierarchyError::StrictModeViolation {
                    graph: graph_id.to_string(),
                    element: r_node.clone(),
                    reason: format!("merges nodes typed differently in descendant '{tgt}'"),
                });
            }
        }
    }

    Ok(())
}

/// Target-graph ids removed by the rewrite, and the fiber of every cloned
/// node (original id first, then each additional clone), both derived from
/// the rule's span and the trace rather than diffing the graph.
fn deleted_and_cloned(rule: &Rule, m: &Match, trace: &RewriteTrace) -> (BTreeSet<NodeId>, BTreeMap<NodeId, Vec<NodeId>>) {
    let mut deleted = BTreeSet::new();
    let mut cloned = BTreeMap::new();
    for x in rule.lhs().nodes() {
        let Some(target_id) = m.get(x) else { continue };
        if rule.deletes_node(x) {
            deleted.insert(target_id.clone());
        }
        if rule.clones_node(x) {
            // BTreeSet::into_iter already yields sorted order.
            let p_nodes: Vec<NodeId> = rule.left_leg().preimage_of(x).into_iter().collect();
            let ids: Vec<NodeId> = p_nodes.iter().filter_map(|p| trace.m_p.get(p).cloned()).collect();
            cloned.insert(target_id.clone(), ids);
        }
    }
    (deleted, cloned)
}

/// Replays deletions and clones onto every ancestor of `graph_id`,
/// nearest-first, recursing so multi-level typings stay consistent.
#[instrument(skip(hierarchy, rule, trace, p_typing))]
pub(super) fn propagate_backward(
    hierarchy: &mut Hierarchy,
    graph_id: &str,
    rule: &Rule,
    trace: &RewriteTrace,
    p_typing: Option<&PTyping>,
) -> Result<(), HierarchyError> {
    let (deleted, cloned) = deleted_and_cloned(rule, &trace.match_, trace);
    // Even when nothing was deleted or cloned, a rewrite can still shrink
    // surviving nodes' attribute values (§4.F), which must still narrow
    // every ancestor's typed instance to stay a valid homomorphism.
    let mut visited = BTreeSet::new();
    propagate_backward_from(hierarchy, graph_id, &deleted, &cloned, p_typing, &mut visited)
}

fn propagate_backward_from(
    hierarchy: &mut Hierarchy,
    parent: &str,
    deleted_in_parent: &BTreeSet<NodeId>,
    clone_fibers: &BTreeMap<NodeId, Vec<NodeId>>,
    p_typing: Option<&PTyping>,
    visited: &mut BTreeSet<String>,
) -> Result<(), HierarchyError> {
    if !visited.insert(parent.to_string()) {
        return Ok(());
    }
    let mut ancestors = hierarchy.inbound_typings(parent);
    ancestors.sort();

    for ancestor in ancestors {
        let Some(typing) = hierarchy.typing_or_none(&ancestor, parent) else { continue };
        let typing = typing.clone();

        let mut deleted_here = Vec::new();
        for target in deleted_in_parent {
            deleted_here.extend(typing.preimage_of(target));
        }
        deleted_here.sort();

        let mut clone_plan: Vec<(NodeId, Vec<NodeId>)> = Vec::new();
        for (original, clones) in clone_fibers {
            let mut instances: Vec<NodeId> = typing.preimage_of(original).into_iter().collect();
            instances.sort();
            for instance in instances {
                let assignment = p_typing.and_then(|pt| pt.get(&ancestor)).and_then(|m| m.get(&instance));
                match assignment {
                    Some(chosen) if clones.contains(chosen) => {
                        clone_plan.push((instance, vec![chosen.clone()]));
                    }
                    _ => clone_plan.push((instance, clones.clone())),
                }
            }
        }

        let mut deleted_here_set = BTreeSet::new();
        let mut ancestor_clone_fibers: BTreeMap<NodeId, Vec<NodeId>> = BTreeMap::new();
        {
            let graph = hierarchy.graph_mut(&ancestor);
            for a in &deleted_here {
                if graph.has_node(a) {
                    graph.remove_node(a)?;
                }
                deleted_here_set.insert(a.clone());
            }
            for (instance, targets) in &clone_plan {
                if targets.len() <= 1 {
                    continue;
                }
                if !graph.has_node(instance) {
                    continue;
                }
                let mut ids = vec![instance.clone()];
                for _ in 1..targets.len() {
                    ids.push(graph.clone_node(instance, None)?);
                }
                ancestor_clone_fibers.insert(instance.clone(), ids);
            }
        }

        // Rebuild the ancestor -> parent typing: deleted instances drop
        // out, clone instances fan out to their assigned (or all) clones.
        let mut new_mapping: BTreeMap<NodeId, NodeId> = BTreeMap::new();
        for (a, t) in typing.mapping() {
            if deleted_here_set.contains(a) {
                continue;
            }
            new_mapping.insert(a.clone(), t.clone());
        }
        for (instance, targets) in &clone_plan {
            if let Some(ids) = ancestor_clone_fibers.get(instance) {
                for (id, target) in ids.iter().zip(targets.iter()) {
                    new_mapping.insert(id.clone(), target.clone());
                }
            } else if targets.len() == 1 {
                new_mapping.insert(instance.clone(), targets[0].clone());
            }
        }
        // Shrink every surviving instance's attributes to the intersection
        // with its (possibly rewrite-shrunk) image, so the rebuilt typing
        // below stays a valid homomorphism.
        let mut shrink: Vec<(NodeId, AttributeMap)> = Vec::new();
        for (a, t) in &new_mapping {
            let ancestor_attrs = hierarchy.graph(&ancestor)?.node_attrs(a)?;
            let parent_attrs = hierarchy.graph(parent)?.node_attrs(t)?;
            let meet = ancestor_attrs.intersect_with(parent_attrs)?;
            let excess = ancestor_attrs
                .minus(&meet)
                .map_err(|(key, e)| HierarchyError::Graph(GraphError::AttributeError(key, e)))?;
            if !excess.is_empty() {
                shrink.push((a.clone(), excess));
            }
        }
        let attrs_shrank = !shrink.is_empty();
        if attrs_shrank {
            let graph = hierarchy.graph_mut(&ancestor);
            for (a, excess) in shrink {
                graph.remove_node_attrs(&a, &excess)?;
            }
        }

        let rebuilt = Homomorphism::build(hierarchy.graph(&ancestor)?, hierarchy.graph(parent)?, new_mapping)
            .map_err(|e| HierarchyError::InvalidTyping { src: ancestor.clone(), tgt: parent.to_string(), source: e })?;
        hierarchy.set_typing_unchecked(&ancestor, parent, rebuilt);

        if !deleted_here_set.is_empty() || !ancestor_clone_fibers.is_empty() || attrs_shrank {
            propagate_backward_from(hierarchy, &ancestor, &deleted_here_set, &ancestor_clone_fibers, p_typing, visited)?;
        }
    }
    Ok(())
}

/// Target-graph ids added by the rewrite, and the pre-merge id set mapped
/// to each merged node's final id.
fn added_and_merged(rule: &Rule, trace: &RewriteTrace) -> (BTreeSet<NodeId>, BTreeMap<NodeId, BTreeSet<NodeId>>) {
    let mut added = BTreeSet::new();
    for y in rule.rhs().nodes() {
        if rule.adds_node(y) {
            if let Some(id) = trace.witness.apply(y) {
                added.insert(id.clone());
            }
        }
    }
    let mut merged = BTreeMap::new();
    for (y, p_nodes) in rule.merge_classes() {
        let pre_merge: BTreeSet<NodeId> = p_nodes.iter().filter_map(|p| trace.m_p.get(p).cloned()).collect();
        if let Some(final_id) = trace.witness.apply(&y) {
            merged.insert(final_id.clone(), pre_merge);
        }
    }
    (added, merged)
}

/// Replays additions and merges onto every descendant of `graph_id`,
/// nearest-first.
#[instrument(skip(hierarchy, rule, trace, rhs_typing))]
pub(super) fn propagate_forward(
    hierarchy: &mut Hierarchy,
    graph_id: &str,
    rule: &Rule,
    trace: &RewriteTrace,
    rhs_typing: Option<&RhsTyping>,
) -> Result<(), HierarchyError> {
    let (added, merged) = added_and_merged(rule, trace);
    if added.is_empty() && merged.is_empty() {
        return Ok(());
    }
    let mut visited = BTreeSet::new();
    propagate_forward_from(hierarchy, graph_id, &added, &merged, rhs_typing, &mut visited)
}

fn propagate_forward_from(
    hierarchy: &mut Hierarchy,
    source: &str,
    added_in_source: &BTreeSet<NodeId>,
    merged_in_source: &BTreeMap<NodeId, BTreeSet<NodeId>>,
    rhs_typing: Option<&RhsTyping>,
    visited: &mut BTreeSet<String>,
) -> Result<(), HierarchyError> {
    if !visited.insert(source.to_string()) {
        return Ok(());
    }
    let mut descendants: Vec<String> = hierarchy.outbound_typings(source).cloned().collect();
    descendants.sort();

    for descendant in descendants {
        let Some(typing) = hierarchy.typing_or_none(source, &descendant) else { continue };

        let mut new_mapping = typing.mapping().clone();
        let mut added_here = BTreeSet::new();
        for new_node in added_in_source {
            if new_mapping.contains_key(new_node) {
                continue;
            }
            let provided = rhs_typing.and_then(|rt| rt.get(&descendant)).and_then(|m| m.get(new_node));
            let image = match provided {
                Some(existing) => existing.clone(),
                None => {
                    let source_attrs = hierarchy.graph(source)?.node_attrs(new_node)?.clone();
                    let graph = hierarchy.graph_mut(&descendant);
                    let fresh = graph.fresh_id(new_node);
                    graph.add_node(fresh.clone(), Some(source_attrs))?;
                    added_here.insert(fresh.clone());
                    fresh
                }
            };
            new_mapping.insert(new_node.clone(), image);
        }

        let mut merged_here: BTreeMap<NodeId, BTreeSet<NodeId>> = BTreeMap::new();
        for (final_id, pre_merge) in merged_in_source {
            let images: BTreeSet<NodeId> = pre_merge.iter().filter_map(|p| new_mapping.get(p).cloned()).collect();
            if images.len() > 1 {
                let candidate = images.iter().cloned().collect::<Vec<_>>().join("_");
                let merged_id = hierarchy.graph_mut(&descendant).merge_nodes(&images, Some(candidate))?;
                for p in pre_merge {
                    new_mapping.insert(p.clone(), merged_id.clone());
                }
                new_mapping.insert(final_id.clone(), merged_id.clone());
                merged_here.insert(merged_id, images);
            } else if let Some(only) = images.into_iter().next() {
                new_mapping.insert(final_id.clone(), only);
            }
        }

        let rebuilt = Homomorphism::build(hierarchy.graph(source)?, hierarchy.graph(&descendant)?, new_mapping)
            .map_err(|e| HierarchyError::InvalidTyping { src: source.to_string(), tgt: descendant.clone(), source: e })?;
        hierarchy.set_typing_unchecked(source, &descendant, rebuilt);

        if !added_here.is_empty() || !merged_here.is_empty() {
            propagate_forward_from(hierarchy, &descendant, &added_here, &merged_here, rhs_typing, visited)?;
        }
    }
    Ok(())
}
