//! # ReGraph
//!
//! An attributed graph rewriting library built on the sesqui-pushout
//! (SqPO) construction: rewrites are spans `L ←ℓ P →ρ R` applied to a
//! match, in three phases — clone, delete, add/merge — against a typed
//! hierarchy of graphs.
//!
//! ## Pipeline
//! ```text
//! Graph + Rule + Match
//!     ↓
//! [Matcher]           → candidate Matches respecting a typing
//!     ↓
//! [Rewrite engine]    → clone phase → delete phase → add/merge phase
//!     ↓
//! [Hierarchy]          → propagation to ancestor/descendant typed graphs
//!     ↓
//! [Audit]               → branch/commit/rollback over the result
//! ```
//!
//! ## Usage
//! ```rust,ignore
//! use regraph::{Graph, Rule, Hierarchy};
//!
//! let mut g = Graph::new();
//! g.add_node("1", None)?;
//!
//! let mut hierarchy = Hierarchy::new();
//! hierarchy.add_graph("g".to_string(), g)?;
//! ```
//!
//! ## Module organization
//!
//! | Module | Purpose |
//! |--------|---------|
//! | `attribute_set` | Node/edge attribute value lattice |
//! | `graph` | Attributed directed graph + homomorphisms |
//! | `matcher` | Pattern matching respecting an optional typing |
//! | `rule` | Rewrite rule spans `L ←ℓ P →ρ R` |
//! | `rewrite` | SqPO rewrite engine (clone/delete/add/merge) |
//! | `hierarchy` | DAG of typed graphs with propagation |
//! | `audit` | Branch/commit/rollback revision history |
//! | `json` | Wire format for graphs and hierarchies |
//! | `config` | Layered configuration |

pub mod attribute_set;
pub mod audit;
pub mod config;
pub mod error;
pub mod graph;
pub mod hierarchy;
pub mod json;
pub mod matcher;
pub mod rewrite;
pub mod rule;

pub use attribute_set::{Atom, AttributeSetError, AttributeValue, Bound};
pub use audit::{VersionedGraph, VersionedHierarchy};
pub use config::Config;
pub use error::{AuditError, GraphError, HierarchyError, HomomorphismError, JsonError, ReGraphError, RewritingError, RuleError};
pub use graph::{AttributeMap, Graph, Homomorphism, NodeId};
pub use hierarchy::{Hierarchy, PTyping, RhsTyping};
pub use json::{graph_from_json, graph_to_json, GraphDocument, HierarchyDocument};
pub use matcher::{find_matching, Match, PatternTyping};
pub use rewrite::{rewrite, rewrite_pure, rewrite_traced, RewriteTrace};
pub use rule::Rule;
