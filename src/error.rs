//! Error Taxonomy
//!
//! One error enum per component, each carrying the offending identifiers as
//! struct fields rather than a pre-formatted string, plus a crate-wide
//! [`ReGraphError`] that aggregates them via `#[from]` for callers who want
//! a single `Result` alias across the library.

use thiserror::Error;

use crate::attribute_set::AttributeSetError;

/// Errors raised by [`crate::graph::Graph`] primitive operations.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum GraphError {
    #[error("node '{0}' already exists")]
    NodeExists(String),

    #[error("node '{0}' not found")]
    NodeNotFound(String),

    #[error("edge ({0}, {1}) already exists")]
    EdgeExists(String, String),

    #[error("edge ({0}, {1}) not found")]
    EdgeNotFound(String, String),

    #[error("cannot relabel '{old}' to '{new}': target already exists")]
    RelabelCollision { old: String, new: String },

    #[error("merge set must not be empty")]
    EmptyMergeSet,

    #[error("attribute operation on '{0}' failed: {1}")]
    AttributeError(String, AttributeSetError),
}

/// Errors raised when a proposed mapping fails to be a valid homomorphism.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum HomomorphismError {
    #[error("mapping is not total: domain node '{0}' has no image")]
    NotTotal(String),

    #[error("mapping is not edge-preserving: edge ({0}, {1}) has no image edge")]
    EdgeNotPreserved(String, String),

    #[error(
        "attribute '{key}' on node '{node}' is not subsumed by its image: {source_value} not subset of {image_value}"
    )]
    AttributeNotSubsumed {
        node: String,
        key: String,
        source_value: String,
        image_value: String,
    },

    #[error("image node '{0}' does not exist in codomain")]
    ImageMissing(String),

    #[error("cannot compose: codomain of first map ('{0}') does not match domain of second ('{1}')")]
    DomainCodomainMismatch(String, String),
}

/// Errors raised while building or injecting into a [`crate::rule::Rule`].
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RuleError {
    #[error("invalid span: {0}")]
    InvalidSpan(HomomorphismError),

    #[error("cannot clone node '{0}': it has no preimage in P")]
    NothingToClone(String),

    #[error("cannot merge: node set for merge must have at least two elements")]
    MergeRequiresTwo,

    #[error("node '{0}' is not present in R")]
    UnknownRhsNode(String),

    #[error("node '{0}' is not present in L")]
    UnknownLhsNode(String),

    #[error("graph error while injecting rule edit: {0}")]
    Graph(#[from] GraphError),
}

/// Errors raised by the rewrite engine (§4.E).
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RewritingError {
    #[error("invalid match: {0}")]
    InvalidMatch(String),

    #[error(
        "attribute incompatible on preserved element '{element}', key '{key}': difference is not representable"
    )]
    AttributeIncompatible { element: String, key: String },

    #[error("graph error during rewrite: {0}")]
    Graph(#[from] GraphError),
}

/// Errors raised by the hierarchy (§4.F).
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum HierarchyError {
    #[error("graph '{0}' not found in hierarchy")]
    GraphNotFound(String),

    #[error("typing {0} -> {1} not found")]
    TypingNotFound(String, String),

    #[error("adding typing {0} -> {1} would introduce a cycle")]
    WouldCycle(String, String),

    #[error("typing {src} -> {tgt} is not a valid homomorphism: {source}")]
    InvalidTyping {
        src: String,
        tgt: String,
        source: HomomorphismError,
    },

    #[error(
        "commutativity violated: paths {path_a:?} and {path_b:?} disagree on node '{node}'"
    )]
    CommutativityViolation {
        path_a: Vec<String>,
        path_b: Vec<String>,
        node: String,
    },

    #[error(
        "strict-mode rewrite rejected: rule {reason} at graph '{graph}', element '{element}'"
    )]
    StrictModeViolation {
        graph: String,
        element: String,
        reason: String,
    },

    #[error("rewrite error during propagation: {0}")]
    Rewriting(#[from] RewritingError),

    #[error("graph error during propagation: {0}")]
    Graph(#[from] GraphError),
}

/// Errors raised by the audit / revision layer (§4.G).
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum AuditError {
    #[error("unknown branch '{0}'")]
    UnknownBranch(String),

    #[error("branch '{0}' already exists")]
    BranchExists(String),

    #[error("unknown commit '{0}'")]
    UnknownCommit(String),

    #[error("rollback target '{0}' is not an ancestor of the current head")]
    RollbackTargetUnreachable(String),

    #[error("a rollback is already in progress; cannot start a new rewrite")]
    RollbackInProgress,

    #[error("merge conflict between '{ours}' and '{theirs}': {reason}")]
    MergeConflict {
        ours: String,
        theirs: String,
        reason: String,
    },

    #[error("hierarchy error during replay: {0}")]
    Hierarchy(#[from] HierarchyError),

    #[error("rewrite error during replay: {0}")]
    Rewriting(#[from] RewritingError),
}

/// Errors raised by JSON import/export (§6).
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum JsonError {
    #[error("at '{path}': {message}")]
    At { path: String, message: String },

    #[error("graph error while importing: {0}")]
    Graph(#[from] GraphError),

    #[error("attribute set error while importing: {0}")]
    AttributeSet(#[from] AttributeSetError),
}

/// Crate-wide aggregate error for callers that want a single `Result` type.
#[derive(Debug, Clone, Error)]
pub enum ReGraphError {
    #[error(transparent)]
    AttributeSet(#[from] AttributeSetError),

    #[error(transparent)]
    Graph(#[from] GraphError),

    #[error(transparent)]
    Homomorphism(#[from] HomomorphismError),

    #[error(transparent)]
    Rule(#[from] RuleError),

    #[error(transparent)]
    Rewriting(#[from] RewritingError),

    #[error(transparent)]
    Hierarchy(#[from] HierarchyError),

    #[error(transparent)]
    Audit(#[from] AuditError),

    #[error(transparent)]
    Json(#[from] JsonError),
}
