//! Homomorphisms between graphs (§3, §4.B): data, not methods on graphs —
//! a total mapping between node sets, checked once at construction time for
//! totality, edge preservation, and attribute subsumption.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use super::{Graph, NodeId};
use crate::error::HomomorphismError;

/// A checked, total, edge- and attribute-preserving map `dom -> cod`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Homomorphism {
    mapping: BTreeMap<NodeId, NodeId>,
}

impl Homomorphism {
    /// Verifies totality, edge preservation, and attribute subsumption of
    /// `mapping: dom -> cod`, returning the checked homomorphism.
    pub fn build(
        dom: &Graph,
        cod: &Graph,
        mapping: BTreeMap<NodeId, NodeId>,
    ) -> Result<Homomorphism, HomomorphismError> {
        for node in dom.nodes() {
            let Some(image) = mapping.get(node) else {
                return Err(HomomorphismError::NotTotal(node.clone()));
            };
            if !cod.has_node(image) {
                return Err(HomomorphismError::ImageMissing(image.clone()));
            }
        }
        for (u, v, attrs) in dom.edges() {
            let hu = &mapping[u];
            let hv = &mapping[v];
            if !cod.has_edge(hu, hv) {
                return Err(HomomorphismError::EdgeNotPreserved(u.clone(), v.clone()));
            }
            let image_attrs = cod.edge_attrs(hu, hv).expect("checked has_edge above");
            check_subsumption(attrs, image_attrs, &format!("({u}, {v})"))?;
        }
        for node in dom.nodes() {
            let image = &mapping[node];
            let node_attrs = dom.node_attrs(node).expect("node in dom");
            let image_attrs = cod.node_attrs(image).expect("checked has_node above");
            check_subsumption(node_attrs, image_attrs, node)?;
        }
        Ok(Homomorphism { mapping })
    }

    /// Builds without re-deriving from scratch; used internally once a
    /// mapping has already been validated elsewhere (e.g. the matcher).
    pub(crate) fn from_checked_mapping(mapping: BTreeMap<NodeId, NodeId>) -> Homomorphism {
        Homomorphism { mapping }
    }

    pub fn apply(&self, node: &str) -> Option<&NodeId> {
        self.mapping.get(node)
    }

    pub fn mapping(&self) -> &BTreeMap<NodeId, NodeId> {
        &self.mapping
    }

    pub fn domain(&self) -> impl Iterator<Item = &NodeId> {
        self.mapping.keys()
    }

    pub fn image(&self, nodes: &BTreeSet<NodeId>) -> BTreeSet<NodeId> {
        nodes.iter().filter_map(|n| self.mapping.get(n).cloned()).collect()
    }

    pub fn preimage(&self, nodes: &BTreeSet<NodeId>) -> BTreeSet<NodeId> {
        self.mapping
            .iter()
            .filter(|(_, v)| nodes.contains(*v))
            .map(|(k, _)| k.clone())
            .collect()
    }

    /// All domain nodes that map to `target`.
    pub fn preimage_of(&self, target: &str) -> BTreeSet<NodeId> {
        self.mapping
            .iter()
            .filter(|(_, v)| v.as_str() == target)
            .map(|(k, _)| k.clone())
            .collect()
    }

    /// Groups the domain by image, for detecting clones (`|preimage| >= 2`
    /// under `ℓ`) and merges (`|preimage| >= 2` under `ρ`), per §4.D.
    pub fn fibers(&self) -> BTreeMap<NodeId, Vec<NodeId>> {
        let mut fibers: BTreeMap<NodeId, Vec<NodeId>> = BTreeMap::new();
        for (k, v) in &self.mapping {
            fibers.entry(v.clone()).or_default().push(k.clone());
        }
        fibers
    }

    /// `self` followed by `next`; fails if some image of `self` is not in
    /// `next`'s domain.
    pub fn compose(&self, next: &Homomorphism) -> Result<Homomorphism, HomomorphismError> {
        let mut composed = BTreeMap::new();
        for (k, v) in &self.mapping {
            let Some(w) = next.mapping.get(v) else {
                return Err(HomomorphismError::DomainCodomainMismatch(v.clone(), "next.domain".into()));
            };
            composed.insert(k.clone(), w.clone());
        }
        Ok(Homomorphism { mapping: composed })
    }

    pub fn is_identity_on(&self, nodes: &BTreeSet<NodeId>) -> bool {
        nodes.iter().all(|n| self.mapping.get(n) == Some(n))
    }
}

fn check_subsumption(
    source: &super::AttributeMap,
    image: &super::AttributeMap,
    element: &str,
) -> Result<(), HomomorphismError> {
    for (key, value) in source.iter() {
        let image_value = image.get_or_empty(key);
        let ok = value.is_subset(image_value).map_err(|_| HomomorphismError::AttributeNotSubsumed {
            node: element.to_string(),
            key: key.to_string(),
            source_value: value.to_string(),
            image_value: image_value.to_string(),
        })?;
        if !ok {
            return Err(HomomorphismError::AttributeNotSubsumed {
                node: element.to_string(),
                key: key.to_string(),
                source_value: value.to_string(),
                image_value: image_value.to_string(),
            });
        }
    }
    Ok(())
}
