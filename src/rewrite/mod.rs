//! SqPO Rewrite Engine (§4.E)
//!
//! Applies a [`crate::rule::Rule`] at a [`crate::matcher::Match`] in four
//! ordered phases — clone, delete, add, merge — and returns the homomorphism
//! `R -> G'` witnessing the rewrite's effect on the derived graph. Ordering
//! is fixed: cloning before deletion means a deleted node never has to be
//! cloned first; deletion before addition means a freshly added node can
//! never collide with one about to disappear; addition before merging means
//! merge sees every attribute and edge the rule's `R` calls for.

use std::collections::{BTreeMap, BTreeSet};

use tracing::instrument;

use crate::error::RewritingError;
use crate::graph::{Graph, Homomorphism, NodeId};
use crate::matcher::Match;
use crate::rule::Rule;

/// Everything a caller needs to propagate a rewrite across a hierarchy
/// without re-deriving it: the original match, the post-clone/pre-merge
/// map `P -> target`, and the final witness `R -> target`.
#[derive(Debug, Clone)]
pub struct RewriteTrace {
    pub match_: Match,
    pub m_p: BTreeMap<NodeId, NodeId>,
    pub witness: Homomorphism,
}

/// Applies `rule` at `m` to `target` in place, returning `ρ': R -> target`
/// after the rewrite.
#[instrument(skip(target, rule, m))]
pub fn rewrite(target: &mut Graph, rule: &Rule, m: &Match) -> Result<Homomorphism, RewritingError> {
    Ok(rewrite_traced(target, rule, m)?.witness)
}

/// As [`rewrite`], but also returns the intermediate maps needed to replay
/// the rewrite's effect onto related graphs in a [`crate::hierarchy::Hierarchy`].
pub fn rewrite_traced(target: &mut Graph, rule: &Rule, m: &Match) -> Result<RewriteTrace, RewritingError> {
    validate_match(rule, target, m)?;

    let m_p = clone_phase(target, rule, m)?;
    delete_phase(target, rule, m, &m_p)?;
    let mut m_r = add_phase(target, rule, &m_p)?;
    merge_phase(target, rule, &m_p, &mut m_r)?;

    Ok(RewriteTrace {
        match_: m.clone(),
        m_p,
        witness: Homomorphism::from_checked_mapping(m_r),
    })
}

/// Applies `rule` at `m` to a clone of `target`, leaving `target` untouched.
/// Returns the derived graph alongside the same witness homomorphism as
/// [`rewrite`].
pub fn rewrite_pure(target: &Graph, rule: &Rule, m: &Match) -> Result<(Graph, Homomorphism), RewritingError> {
    let mut derived = target.clone();
    let witness = rewrite(&mut derived, rule, m)?;
    Ok((derived, witness))
}

fn validate_match(rule: &Rule, target: &Graph, m: &Match) -> Result<(), RewritingError> {
    Homomorphism::build(rule.lhs(), target, m.clone())
        .map_err(|e| RewritingError::InvalidMatch(e.to_string()))?;
    let distinct: BTreeSet<&NodeId> = m.values().collect();
    if distinct.len() != m.len() {
        return Err(RewritingError::InvalidMatch(
            "match is not injective: two pattern nodes share a target node".to_string(),
        ));
    }
    Ok(())
}

/// Materializes every extra `ℓ`-preimage of a matched `L`-node as a fresh
/// clone in `target`, returning the total map `P -> target`.
fn clone_phase(target: &mut Graph, rule: &Rule, m: &Match) -> Result<BTreeMap<NodeId, NodeId>, RewritingError> {
    let fibers = rule.left_leg().fibers();
    let mut m_p = BTreeMap::new();

    let mut l_nodes: Vec<&NodeId> = rule.lhs().nodes().collect();
    l_nodes.sort();
    for x in l_nodes {
        let Some(preimages) = fibers.get(x) else {
            continue; // x has no P-preimage: deleted, handled in delete_phase
        };
        let mut preimages = preimages.clone();
        preimages.sort();
        let g_id = m[x].clone();
        for (i, p_node) in preimages.into_iter().enumerate() {
            if i == 0 {
                m_p.insert(p_node, g_id.clone());
            } else {
                let clone_id = target.clone_node(&g_id, None)?;
                m_p.insert(p_node, clone_id);
            }
        }
    }
    Ok(m_p)
}

/// Removes every `L`-element `P` does not preserve, and shrinks attribute
/// values on surviving elements down to what `P` still carries.
fn delete_phase(
    target: &mut Graph,
    rule: &Rule,
    m: &Match,
    m_p: &BTreeMap<NodeId, NodeId>,
) -> Result<(), RewritingError> {
    let mut l_nodes: Vec<&NodeId> = rule.lhs().nodes().collect();
    l_nodes.sort();
    for x in l_nodes {
        if rule.deletes_node(x) {
            let g_id = &m[x.as_str()];
            if target.has_node(g_id) {
                target.remove_node(g_id)?;
            }
        }
    }

    let mut l_edges: Vec<(NodeId, NodeId)> = rule.lhs().edges().map(|(u, v, _)| (u.clone(), v.clone())).collect();
    l_edges.sort();
    for (u, v) in &l_edges {
        if !rule.deletes_edge(u, v) {
            continue;
        }
        for pu in rule.left_leg().preimage_of(u) {
            for pv in rule.left_leg().preimage_of(v) {
                if rule.preserved().has_edge(&pu, &pv) {
                    continue;
                }
                if let (Some(tu), Some(tv)) = (m_p.get(&pu), m_p.get(&pv)) {
                    if target.has_edge(tu, tv) {
                        target.remove_edge(tu, tv)?;
                    }
                }
            }
        }
    }

    for p_node in rule.preserved().nodes() {
        let l_node = rule.left_leg().apply(p_node).expect("ℓ is total");
        let l_attrs = rule.lhs().node_attrs(l_node).expect("ℓ-image exists in L");
        let p_attrs = rule.preserved().node_attrs(p_node).expect("node exists in P");
        let shed = l_attrs
            .minus(p_attrs)
            .map_err(|(key, _)| RewritingError::AttributeIncompatible { element: p_node.clone(), key })?;
        if !shed.is_empty() {
            if let Some(g_id) = m_p.get(p_node) {
                if target.has_node(g_id) {
                    target.remove_node_attrs(g_id, &shed)?;
                }
            }
        }
    }

    for (pu, pv, p_attrs) in rule.preserved().edges() {
        let lu = rule.left_leg().apply(pu).expect("ℓ is total");
        let lv = rule.left_leg().apply(pv).expect("ℓ is total");
        if !rule.lhs().has_edge(lu, lv) {
            continue;
        }
        let l_attrs = rule.lhs().edge_attrs(lu, lv).expect("checked has_edge above");
        let shed = l_attrs
            .minus(p_attrs)
            .map_err(|(key, _)| RewritingError::AttributeIncompatible { element: format!("({pu}, {pv})"), key })?;
        if shed.is_empty() {
            continue;
        }
        if let (Some(tu), Some(tv)) = (m_p.get(pu), m_p.get(pv)) {
            if target.has_edge(tu, tv) {
                target.remove_edge_attrs(tu, tv, &shed)?;
            }
        }
    }

    Ok(())
}

/// Mints fresh ids for genuinely new `R`-nodes, adds `R`-only edges, and
/// grows attributes on preserved elements up to what `R` calls for. Returns
/// the (possibly not-yet-merged) map `R -> target`.
fn add_phase(target: &mut Graph, rule: &Rule, m_p: &BTreeMap<NodeId, NodeId>) -> Result<BTreeMap<NodeId, NodeId>, RewritingError> {
    let mut m_r: BTreeMap<NodeId, NodeId> = BTreeMap::new();

    for p_node in rule.preserved().nodes() {
        let r_node = rule.right_leg().apply(p_node).expect("ρ is total");
        if let Some(g_id) = m_p.get(p_node) {
            m_r.entry(r_node.clone()).or_insert_with(|| g_id.clone());
        }
    }

    for p_node in rule.preserved().nodes() {
        let r_node = rule.right_leg().apply(p_node).expect("ρ is total");
        let r_attrs = rule.rhs().node_attrs(r_node).expect("ρ-image exists in R");
        let p_attrs = rule.preserved().node_attrs(p_node).expect("node exists in P");
        let grown = r_attrs
            .minus(p_attrs)
            .map_err(|(key, _)| RewritingError::AttributeIncompatible { element: p_node.clone(), key })?;
        if !grown.is_empty() {
            if let Some(g_id) = m_p.get(p_node) {
                target.add_node_attrs(g_id, &grown)?;
            }
        }
    }

    let mut r_nodes: Vec<&NodeId> = rule.rhs().nodes().collect();
    r_nodes.sort();
    for y in r_nodes {
        if rule.adds_node(y) {
            let attrs = rule.rhs().node_attrs(y).expect("node exists in R").clone();
            let new_id = mint_id(target, y);
            target.add_node(new_id.clone(), Some(attrs))?;
            m_r.insert(y.clone(), new_id);
        }
    }

    for (pu, pv, p_attrs) in rule.preserved().edges() {
        let ru = rule.right_leg().apply(pu).expect("ρ is total");
        let rv = rule.right_leg().apply(pv).expect("ρ is total");
        if !rule.rhs().has_edge(ru, rv) {
            continue;
        }
        let r_attrs = rule.rhs().edge_attrs(ru, rv).expect("checked has_edge above");
        let grown = r_attrs
            .minus(p_attrs)
            .map_err(|(key, _)| RewritingError::AttributeIncompatible { element: format!("({pu}, {pv})"), key })?;
        if grown.is_empty() {
            continue;
        }
        if let (Some(tu), Some(tv)) = (m_p.get(pu), m_p.get(pv)) {
            if target.has_edge(tu, tv) {
                target.add_edge_attrs(tu, tv, &grown)?;
            }
        }
    }

    let mut r_edges: Vec<(NodeId, NodeId)> = rule.rhs().edges().map(|(u, v, _)| (u.clone(), v.clone())).collect();
    r_edges.sort();
    for (u, v) in r_edges {
        let r_attrs = rule.rhs().edge_attrs(&u, &v).expect("checked above").clone();
        let pu_list = rule.right_leg().preimage_of(&u);
        let pv_list = rule.right_leg().preimage_of(&v);

        if pu_list.is_empty() || pv_list.is_empty() {
            for tu in representative_targets(&u, &pu_list, m_p, &m_r) {
                for tv in representative_targets(&v, &pv_list, m_p, &m_r) {
                    if !target.has_edge(&tu, &tv) {
                        target.add_edge(&tu, &tv, Some(r_attrs.clone()))?;
                    }
                }
            }
            continue;
        }

        for pu in &pu_list {
            for pv in &pv_list {
                if rule.preserved().has_edge(pu, pv) {
                    continue; // handled by the preserved-edge attr-diff loop above
                }
                if let (Some(tu), Some(tv)) = (m_p.get(pu), m_p.get(pv)) {
                    if !target.has_edge(tu, tv) {
                        target.add_edge(tu, tv, Some(r_attrs.clone()))?;
                    }
                }
            }
        }
    }

    Ok(m_r)
}

fn representative_targets(
    r_node: &str,
    preimages: &BTreeSet<NodeId>,
    m_p: &BTreeMap<NodeId, NodeId>,
    m_r: &BTreeMap<NodeId, NodeId>,
) -> Vec<NodeId> {
    if preimages.is_empty() {
        m_r.get(r_node).cloned().into_iter().collect()
    } else {
        preimages.iter().filter_map(|p| m_p.get(p).cloned()).collect()
    }
}

/// Collapses every `ρ`-fiber of size `>= 2` into a single merged node,
/// finalizing `R -> target`.
fn merge_phase(
    target: &mut Graph,
    rule: &Rule,
    m_p: &BTreeMap<NodeId, NodeId>,
    m_r: &mut BTreeMap<NodeId, NodeId>,
) -> Result<(), RewritingError> {
    let mut r_nodes: Vec<&NodeId> = rule.rhs().nodes().collect();
    r_nodes.sort();
    for y in r_nodes {
        let preimages = rule.right_leg().preimage_of(y);
        if preimages.len() < 2 {
            continue;
        }
        let ids: BTreeSet<NodeId> = preimages.iter().filter_map(|p| m_p.get(p).cloned()).collect();
        match ids.len() {
            0 => {}
            1 => {
                m_r.insert(y.clone(), ids.into_iter().next().expect("checked len == 1"));
            }
            _ => {
                let candidate = mint_merge_id(target, &ids);
                let merged = target.merge_nodes(&ids, Some(candidate))?;
                m_r.insert(y.clone(), merged);
            }
        }
    }
    Ok(())
}

fn mint_id(target: &Graph, requested: &str) -> NodeId {
    if !target.has_node(requested) {
        return requested.to_string();
    }
    let mut n = 2;
    loop {
        let candidate = format!("{requested}_{n}");
        if !target.has_node(&candidate) {
            return candidate;
        }
        n += 1;
    }
}

fn mint_merge_id(target: &Graph, ids: &BTreeSet<NodeId>) -> NodeId {
    let candidate = ids.iter().cloned().collect::<Vec<_>>().join("_");
    if !target.has_node(&candidate) || ids.contains(&candidate) {
        return candidate;
    }
    let mut n = 2;
    loop {
        let alt = format!("{candidate}_{n}");
        if !target.has_node(&alt) {
            return alt;
        }
        n += 1;
    }
}
