//! The persistent-backend adapter boundary (§6).
//!
//! `spec.md` §1 places on-disk/persistent graph backends out of scope,
//! offering the same operations as the in-memory reference. This trait is
//! that boundary: [`crate::graph::Graph`] implements it, and an external
//! adapter crate implementing the same trait over a database or file
//! format is a drop-in replacement wherever the rewrite engine or matcher
//! only needs the primitive operations below.

use super::{AttributeMap, Graph, NodeId};
use crate::error::GraphError;

/// The primitive operation set of §4.B, as a trait so a persistent backend
/// can implement the same surface opaquely. Synchronous and assumed
/// transactional per call, per §6.
pub trait GraphBackend {
    fn add_node(&mut self, id: NodeId, attrs: Option<AttributeMap>) -> Result<(), GraphError>;
    fn remove_node(&mut self, id: &str) -> Result<(), GraphError>;
    fn add_edge(&mut self, u: &str, v: &str, attrs: Option<AttributeMap>) -> Result<(), GraphError>;
    fn remove_edge(&mut self, u: &str, v: &str) -> Result<(), GraphError>;
    fn has_node(&self, id: &str) -> bool;
    fn has_edge(&self, u: &str, v: &str) -> bool;
}

impl GraphBackend for Graph {
    fn add_node(&mut self, id: NodeId, attrs: Option<AttributeMap>) -> Result<(), GraphError> {
        Graph::add_node(self, id, attrs)
    }

    fn remove_node(&mut self, id: &str) -> Result<(), GraphError> {
        Graph::remove_node(self, id)
    }

    fn add_edge(&mut self, u: &str, v: &str, attrs: Option<AttributeMap>) -> Result<(), GraphError> {
        Graph::add_edge(self, u, v, attrs)
    }

    fn remove_edge(&mut self, u: &str, v: &str) -> Result<(), GraphError> {
        Graph::remove_edge(self, u, v)
    }

    fn has_node(&self, id: &str) -> bool {
        Graph::has_node(self, id)
    }

    fn has_edge(&self, u: &str, v: &str) -> bool {
        Graph::has_edge(self, u, v)
    }
}
