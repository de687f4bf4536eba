//! JSON Interchange (§6)
//!
//! Wire-format documents plus explicit `TryFrom`/`From` conversions to and
//! from the in-memory [`Graph`]/[`Hierarchy`] types. Kept separate from
//! `serde(remote)`-style derives on the core types themselves, since the
//! attribute-set lattice and the `Homomorphism`-checked hierarchy both need
//! validation, not just a structural round-trip.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::attribute_set::{AttributeValue, Bound};
use crate::error::JsonError;
use crate::graph::{AttributeMap, Graph, NodeId};
use crate::hierarchy::Hierarchy;

/// `{type: "...", data: ...}` per §6.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum AttributeValueDocument {
    EmptySet,
    UniversalSet,
    FiniteSet { data: Vec<AtomDocument> },
    IntegerSet { data: Vec<(BoundDocument, BoundDocument)> },
    RegexSet { data: String },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AtomDocument {
    Str(String),
    Int(i64),
    Bool(bool),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum BoundDocument {
    Sentinel(String),
    Finite(i64),
}

impl From<&AttributeValue> for AttributeValueDocument {
    fn from(value: &AttributeValue) -> Self {
        match value {
            AttributeValue::Empty => AttributeValueDocument::EmptySet,
            AttributeValue::Universal => AttributeValueDocument::UniversalSet,
            AttributeValue::Finite(atoms) => AttributeValueDocument::FiniteSet {
                data: atoms.iter().map(atom_to_document).collect(),
            },
            AttributeValue::IntegerInterval(ivs) => AttributeValueDocument::IntegerSet {
                data: ivs.iter().map(|(lo, hi)| (bound_to_document(*lo), bound_to_document(*hi))).collect(),
            },
            AttributeValue::Regex(pattern) => AttributeValueDocument::RegexSet { data: pattern.pattern().to_string() },
        }
    }
}

fn atom_to_document(atom: &crate::attribute_set::Atom) -> AtomDocument {
    use crate::attribute_set::Atom;
    match atom {
        Atom::Str(s) => AtomDocument::Str(s.clone()),
        Atom::Int(n) => AtomDocument::Int(*n),
        Atom::Bool(b) => AtomDocument::Bool(*b),
    }
}

fn bound_to_document(bound: Bound) -> BoundDocument {
    match bound {
        Bound::NegInf => BoundDocument::Sentinel("-inf".to_string()),
        Bound::PosInf => BoundDocument::Sentinel("inf".to_string()),
        Bound::Finite(n) => BoundDocument::Finite(n),
    }
}

impl TryFrom<&AttributeValueDocument> for AttributeValue {
    type Error = JsonError;

    fn try_from(doc: &AttributeValueDocument) -> Result<Self, JsonError> {
        Ok(match doc {
            AttributeValueDocument::EmptySet => AttributeValue::Empty,
            AttributeValueDocument::UniversalSet => AttributeValue::Universal,
            AttributeValueDocument::FiniteSet { data } => {
                AttributeValue::finite(data.iter().cloned().map(atom_from_document))
            }
            AttributeValueDocument::IntegerSet { data } => {
                let mut ivs = Vec::with_capacity(data.len());
                for (lo, hi) in data {
                    ivs.push((bound_from_document(lo)?, bound_from_document(hi)?));
                }
                AttributeValue::integer_intervals(ivs)
            }
            AttributeValueDocument::RegexSet { data } => AttributeValue::regex(data)?,
        })
    }
}

fn atom_from_document(doc: AtomDocument) -> crate::attribute_set::Atom {
    use crate::attribute_set::Atom;
    match doc {
        AtomDocument::Str(s) => Atom::Str(s),
        AtomDocument::Int(n) => Atom::Int(n),
        AtomDocument::Bool(b) => Atom::Bool(b),
    }
}

fn bound_from_document(doc: &BoundDocument) -> Result<Bound, JsonError> {
    Ok(match doc {
        BoundDocument::Finite(n) => Bound::Finite(*n),
        BoundDocument::Sentinel(s) if s == "-inf" => Bound::NegInf,
        BoundDocument::Sentinel(s) if s == "inf" => Bound::PosInf,
        BoundDocument::Sentinel(other) => {
            return Err(JsonError::At {
                path: "attrs[].data[]".to_string(),
                message: format!("unknown interval bound sentinel '{other}'"),
            })
        }
    })
}

/// `{id, attrs: {key: AttributeValueDocument}}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeDocument {
    pub id: NodeId,
    #[serde(default)]
    pub attrs: BTreeMap<String, AttributeValueDocument>,
}

/// `{from, to, attrs}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EdgeDocument {
    pub from: NodeId,
    pub to: NodeId,
    #[serde(default)]
    pub attrs: BTreeMap<String, AttributeValueDocument>,
}

/// `{nodes: [...], edges: [...]}` per §6.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct GraphDocument {
    pub nodes: Vec<NodeDocument>,
    pub edges: Vec<EdgeDocument>,
}

fn attrs_to_document(attrs: &AttributeMap) -> BTreeMap<String, AttributeValueDocument> {
    attrs.iter().map(|(k, v)| (k.to_string(), AttributeValueDocument::from(v))).collect()
}

fn attrs_from_document(doc: &BTreeMap<String, AttributeValueDocument>) -> Result<AttributeMap, JsonError> {
    let mut attrs = AttributeMap::new();
    for (key, value) in doc {
        attrs.set(key.clone(), AttributeValue::try_from(value)?);
    }
    Ok(attrs)
}

impl From<&Graph> for GraphDocument {
    fn from(graph: &Graph) -> Self {
        let nodes = graph
            .nodes()
            .map(|id| NodeDocument {
                id: id.clone(),
                attrs: attrs_to_document(graph.node_attrs(id).expect("id came from graph.nodes()")),
            })
            .collect();
        let edges = graph
            .edges()
            .map(|(u, v, attrs)| EdgeDocument { from: u.clone(), to: v.clone(), attrs: attrs_to_document(attrs) })
            .collect();
        GraphDocument { nodes, edges }
    }
}

impl TryFrom<&GraphDocument> for Graph {
    type Error = JsonError;

    fn try_from(doc: &GraphDocument) -> Result<Self, JsonError> {
        let mut graph = Graph::new();
        for node in &doc.nodes {
            let attrs = attrs_from_document(&node.attrs)?;
            graph.add_node(node.id.clone(), Some(attrs))?;
        }
        for edge in &doc.edges {
            let attrs = attrs_from_document(&edge.attrs)?;
            graph.add_edge(&edge.from, &edge.to, Some(attrs))?;
        }
        Ok(graph)
    }
}

/// `{src, tgt, mapping}`: one typing edge. The hierarchy is a general DAG
/// rather than a single-rooted tree, so unlike the nested
/// `top_graph`/`children` shape for a strict tree hierarchy, typing edges
/// are listed flat and can be replayed in any order that respects
/// [`Hierarchy::add_graph`] having already run for both endpoints.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TypingDocument {
    pub src: String,
    pub tgt: String,
    pub mapping: BTreeMap<NodeId, NodeId>,
}

/// `{a, b, pairs}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelationDocument {
    pub a: String,
    pub b: String,
    pub pairs: BTreeSet<(NodeId, NodeId)>,
}

/// `{name, graphs, typings, relations}` per §6.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct HierarchyDocument {
    pub name: String,
    pub graphs: BTreeMap<String, GraphDocument>,
    pub typings: Vec<TypingDocument>,
    pub relations: Vec<RelationDocument>,
}

impl HierarchyDocument {
    pub fn from_hierarchy(name: impl Into<String>, hierarchy: &Hierarchy) -> Self {
        let graphs = hierarchy
            .graph_ids()
            .map(|id| (id.clone(), GraphDocument::from(hierarchy.graph(id).expect("id came from graph_ids()"))))
            .collect();
        let typings = hierarchy
            .typings()
            .map(|(src, tgt, h)| TypingDocument { src: src.clone(), tgt: tgt.clone(), mapping: h.mapping().clone() })
            .collect();
        let relations = hierarchy
            .relations()
            .map(|((a, b), pairs)| RelationDocument { a: a.clone(), b: b.clone(), pairs: pairs.clone() })
            .collect();
        HierarchyDocument { name: name.into(), graphs, typings, relations }
    }

    pub fn into_hierarchy(&self) -> Result<Hierarchy, JsonError> {
        let mut hierarchy = Hierarchy::new();
        for (id, doc) in &self.graphs {
            let graph = Graph::try_from(doc)?;
            hierarchy
                .add_graph(id.clone(), graph)
                .map_err(|e| JsonError::At { path: format!("graphs[{id}]"), message: e.to_string() })?;
        }
        for typing in &self.typings {
            hierarchy.add_typing(&typing.src, &typing.tgt, typing.mapping.clone()).map_err(|e| JsonError::At {
                path: format!("typings[{} -> {}]", typing.src, typing.tgt),
                message: e.to_string(),
            })?;
        }
        for relation in &self.relations {
            hierarchy
                .add_relation(&relation.a, &relation.b, relation.pairs.clone())
                .map_err(|e| JsonError::At { path: format!("relations[{},{}]", relation.a, relation.b), message: e.to_string() })?;
        }
        Ok(hierarchy)
    }
}

pub fn graph_to_json(graph: &Graph) -> serde_json::Value {
    serde_json::to_value(GraphDocument::from(graph)).expect("GraphDocument serialization cannot fail")
}

pub fn graph_from_json(value: &serde_json::Value) -> Result<Graph, JsonError> {
    let doc: GraphDocument =
        serde_json::from_value(value.clone()).map_err(|e| JsonError::At { path: String::new(), message: e.to_string() })?;
    Graph::try_from(&doc)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn graph_round_trips_through_json() {
        let mut g = Graph::new();
        let mut attrs = AttributeMap::new();
        attrs.set("color", AttributeValue::finite(["blue"]));
        g.add_node("a", Some(attrs)).unwrap();
        g.add_node("b", None).unwrap();
        g.add_edge("a", "b", None).unwrap();

        let value = graph_to_json(&g);
        let restored = graph_from_json(&value).unwrap();

        assert!(restored.has_node("a"));
        assert!(restored.has_edge("a", "b"));
        assert_eq!(restored.node_attrs("a").unwrap().get("color"), Some(&AttributeValue::finite(["blue"])));
    }

    #[test]
    fn integer_interval_round_trips_with_infinite_sentinels() {
        let doc = AttributeValueDocument::from(&AttributeValue::integer_interval(Bound::NegInf, Bound::Finite(5)));
        let restored = AttributeValue::try_from(&doc).unwrap();
        assert_eq!(restored, AttributeValue::integer_interval(Bound::NegInf, Bound::Finite(5)));
    }

    #[test]
    fn hierarchy_round_trips_typings_and_relations() {
        let mut hierarchy = Hierarchy::new();
        let mut child = Graph::new();
        child.add_node("c", None).unwrap();
        hierarchy.add_graph("child", child).unwrap();
        let mut parent = Graph::new();
        parent.add_node("p", None).unwrap();
        hierarchy.add_graph("parent", parent).unwrap();
        let mapping: BTreeMap<NodeId, NodeId> = [("c".to_string(), "p".to_string())].into();
        hierarchy.add_typing("child", "parent", mapping).unwrap();

        let doc = HierarchyDocument::from_hierarchy("h", &hierarchy);
        let restored = doc.into_hierarchy().unwrap();
        assert!(restored.graph("child").unwrap().has_node("c"));
        assert_eq!(restored.node_type("child", "c").unwrap().get("parent"), Some(&"p".to_string()));
    }
}
