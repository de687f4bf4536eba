//! Audit / Revision Control (§4.G)
//!
//! An append-only commit DAG over either a single [`Graph`]
//! ([`VersionedGraph`]) or a whole [`Hierarchy`] ([`VersionedHierarchy`]).
//! History is never destroyed: `rollback` creates a new head that undoes a
//! run of commits rather than deleting them, and every replay goes through
//! the same [`crate::rewrite::rewrite`] / [`Hierarchy::rewrite`] entry
//! points the rest of the crate uses, so a commit's payload is exactly
//! enough to redo or invert it.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde_json::json;
use tracing::instrument;

use crate::error::AuditError;
use crate::graph::{Graph, Homomorphism};
use crate::hierarchy::{Hierarchy, PTyping, RhsTyping};
use crate::matcher::Match;
use crate::rewrite::rewrite;
use crate::rule::Rule;

pub type CommitId = String;

/// What a commit records, beyond its DAG position.
#[derive(Debug, Clone)]
pub enum Payload<S> {
    /// The root commit: a full snapshot, since there is nothing before it
    /// to replay from.
    Init(S),
    /// `graph_id`/`p_typing`/`rhs_typing` are only ever set by
    /// [`VersionedHierarchy`], which targets one graph within a hierarchy;
    /// [`VersionedGraph`] leaves them `None`.
    Rewrite {
        rule: Rule,
        match_: Match,
        witness: Homomorphism,
        graph_id: Option<String>,
        p_typing: Option<PTyping>,
        rhs_typing: Option<RhsTyping>,
    },
    BranchCreate { source: String, name: String },
    Merge { other_branch: String, other_head: CommitId },
    RollbackTarget { commit: CommitId },
}

#[derive(Debug, Clone)]
pub struct Commit<S> {
    pub id: CommitId,
    pub branch: String,
    pub parents: Vec<CommitId>,
    pub timestamp: DateTime<Utc>,
    pub message: String,
    pub payload: Payload<S>,
}

#[derive(Debug, Clone)]
pub struct HistoryEntry {
    pub timestamp: DateTime<Utc>,
    pub id: CommitId,
    pub branch: String,
    pub message: String,
}

/// Shared bookkeeping: the commit DAG and branch heads. Parameterized over
/// the snapshot type `S` (`Graph` or `Hierarchy`) the root commit carries.
#[derive(Debug, Clone)]
struct Log<S> {
    commits: BTreeMap<CommitId, Commit<S>>,
    branch_heads: BTreeMap<String, CommitId>,
    current_branch: String,
    next_id: u64,
}

impl<S> Log<S> {
    fn new(root_payload: Payload<S>) -> Self {
        let mut log = Log { commits: BTreeMap::new(), branch_heads: BTreeMap::new(), current_branch: "main".to_string(), next_id: 0 };
        let root_id = log.mint_id();
        log.commits.insert(
            root_id.clone(),
            Commit { id: root_id.clone(), branch: "main".to_string(), parents: vec![], timestamp: Utc::now(), message: "init".to_string(), payload: root_payload },
        );
        log.branch_heads.insert("main".to_string(), root_id);
        log
    }

    fn mint_id(&mut self) -> CommitId {
        let id = format!("c{}", self.next_id);
        self.next_id += 1;
        id
    }

    fn head(&self) -> Result<&CommitId, AuditError> {
        self.branch_heads.get(&self.current_branch).ok_or_else(|| AuditError::UnknownBranch(self.current_branch.clone()))
    }

    fn commit(&self, id: &str) -> Result<&Commit<S>, AuditError> {
        self.commits.get(id).ok_or_else(|| AuditError::UnknownCommit(id.to_string()))
    }

    /// The path from the root to `commit_id` inclusive, following each
    /// commit's first parent (a merge's second parent is already flattened
    /// into the linear history by the commits it replayed at merge time).
    fn path_from_root(&self, commit_id: &str) -> Result<Vec<CommitId>, AuditError> {
        let mut path = vec![commit_id.to_string()];
        let mut current = self.commit(commit_id)?;
        while let Some(parent) = current.parents.first() {
            path.push(parent.clone());
            current = self.commit(parent)?;
        }
        path.reverse();
        Ok(path)
    }

    fn is_ancestor(&self, candidate: &str, of: &str) -> Result<bool, AuditError> {
        Ok(self.path_from_root(of)?.iter().any(|id| id == candidate))
    }

    fn record(&mut self, parents: Vec<CommitId>, branch: String, message: String, payload: Payload<S>) -> CommitId {
        let id = self.mint_id();
        self.commits.insert(id.clone(), Commit { id: id.clone(), branch: branch.clone(), parents, timestamp: Utc::now(), message, payload });
        self.branch_heads.insert(branch, id.clone());
        id
    }

    fn history(&self) -> Vec<HistoryEntry> {
        let mut entries: Vec<HistoryEntry> = self
            .commits
            .values()
            .map(|c| HistoryEntry { timestamp: c.timestamp, id: c.id.clone(), branch: c.branch.clone(), message: c.message.clone() })
            .collect();
        entries.sort_by(|a, b| a.id.cmp(&b.id));
        entries
    }
}

fn history_to_json(entries: &[HistoryEntry]) -> serde_json::Value {
    json!(entries
        .iter()
        .map(|e| json!({
            "timestamp": e.timestamp.to_rfc3339(),
            "id": e.id,
            "branch": e.branch,
            "message": e.message,
        }))
        .collect::<Vec<_>>())
}

/// Reverses a rewrite's span: the forward rule's witness, replayed through
/// `R ← P → L`, undoes it.
fn invert_rule(rule: &Rule) -> Result<Rule, AuditError> {
    Rule::new(rule.rhs().clone(), rule.preserved().clone(), rule.lhs().clone(), rule.right_leg().clone(), rule.left_leg().clone())
        .map_err(|e| AuditError::MergeConflict { ours: "inverse".to_string(), theirs: "rule".to_string(), reason: e.to_string() })
}

// -- VersionedGraph -------------------------------------------------------

/// Branch/commit history over a single [`Graph`].
#[derive(Debug, Clone)]
pub struct VersionedGraph {
    log: Log<Graph>,
    graph: Graph,
}

impl VersionedGraph {
    pub fn new(initial: Graph) -> Self {
        let graph = initial.clone();
        VersionedGraph { log: Log::new(Payload::Init(initial)), graph }
    }

    pub fn graph(&self) -> &Graph {
        &self.graph
    }

    pub fn current_branch(&self) -> &str {
        &self.log.current_branch
    }

    pub fn head(&self) -> Result<&CommitId, AuditError> {
        self.log.head()
    }

    #[instrument(skip(self, rule, m))]
    pub fn rewrite(&mut self, rule: &Rule, m: &Match, message: impl Into<String>) -> Result<Homomorphism, AuditError> {
        let witness = rewrite(&mut self.graph, rule, m)?;
        let parent = self.log.head()?.clone();
        let branch = self.log.current_branch.clone();
        self.log.record(
            vec![parent],
            branch,
            message.into(),
            Payload::Rewrite { rule: rule.clone(), match_: m.clone(), witness: witness.clone(), graph_id: None, p_typing: None, rhs_typing: None },
        );
        Ok(witness)
    }

    pub fn branch(&mut self, name: impl Into<String>) -> Result<(), AuditError> {
        let name = name.into();
        if self.log.branch_heads.contains_key(&name) {
            return Err(AuditError::BranchExists(name));
        }
        let parent = self.log.head()?.clone();
        let source = self.log.current_branch.clone();
        self.log.record(vec![parent], name.clone(), format!("branch from {source}"), Payload::BranchCreate { source, name });
        Ok(())
    }

    pub fn switch_branch(&mut self, name: &str) -> Result<(), AuditError> {
        let head = self.log.branch_heads.get(name).ok_or_else(|| AuditError::UnknownBranch(name.to_string()))?.clone();
        self.graph = self.materialize(&head)?;
        self.log.current_branch = name.to_string();
        Ok(())
    }

    fn materialize(&self, commit_id: &str) -> Result<Graph, AuditError> {
        let path = self.log.path_from_root(commit_id)?;
        let mut g = Graph::new();
        for id in path {
            let commit = self.log.commit(&id)?;
            match &commit.payload {
                Payload::Init(snapshot) => g = snapshot.clone(),
                Payload::Rewrite { rule, match_, .. } => {
                    rewrite(&mut g, rule, match_)?;
                }
                Payload::BranchCreate { .. } | Payload::Merge { .. } | Payload::RollbackTarget { .. } => {}
            }
        }
        Ok(g)
    }

    /// Replays every rewrite commit on `other_branch` since its last common
    /// ancestor with the current branch onto `self.graph`, then records a
    /// merge commit with both heads as parents.
    pub fn merge_with(&mut self, other_branch: &str) -> Result<(), AuditError> {
        let other_head = self.log.branch_heads.get(other_branch).ok_or_else(|| AuditError::UnknownBranch(other_branch.to_string()))?.clone();
        let our_head = self.log.head()?.clone();

        let our_path = self.log.path_from_root(&our_head)?;
        let other_path = self.log.path_from_root(&other_head)?;
        let lca_index = our_path.iter().zip(other_path.iter()).take_while(|(a, b)| a == b).count();
        let lca = other_path.get(lca_index.saturating_sub(1)).cloned().unwrap_or_else(|| other_path[0].clone());

        for id in &other_path[lca_index..] {
            let commit = self.log.commit(id)?.clone();
            if let Payload::Rewrite { rule, match_, .. } = &commit.payload {
                rewrite(&mut self.graph, rule, match_)?;
            }
        }

        let branch = self.log.current_branch.clone();
        self.log.record(
            vec![our_head, other_head.clone()],
            branch,
            format!("merge {other_branch} (since {lca})"),
            Payload::Merge { other_branch: other_branch.to_string(), other_head },
        );
        Ok(())
    }

    /// Undoes every commit between `commit_id` (exclusive) and the current
    /// head (inclusive), in reverse order, and records a new head.
    pub fn rollback(&mut self, commit_id: &str) -> Result<(), AuditError> {
        let head = self.log.head()?.clone();
        if !self.log.is_ancestor(commit_id, &head)? {
            return Err(AuditError::RollbackTargetUnreachable(commit_id.to_string()));
        }
        let path = self.log.path_from_root(&head)?;
        let cut = path.iter().position(|id| id == commit_id).expect("checked is_ancestor above") + 1;
        for id in path[cut..].iter().rev() {
            let commit = self.log.commit(id)?.clone();
            if let Payload::Rewrite { rule, witness, .. } = &commit.payload {
                let inverse = invert_rule(rule)?;
                rewrite(&mut self.graph, &inverse, witness.mapping())?;
            }
        }
        let branch = self.log.current_branch.clone();
        self.log.record(vec![head], branch, format!("rollback to {commit_id}"), Payload::RollbackTarget { commit: commit_id.to_string() });
        Ok(())
    }

    pub fn print_history(&self) -> String {
        self.log
            .history()
            .iter()
            .map(|e| format!("{} {} [{}] {}", e.timestamp.to_rfc3339(), e.id, e.branch, e.message))
            .collect::<Vec<_>>()
            .join("\n")
    }

    pub fn to_json(&self) -> serde_json::Value {
        history_to_json(&self.log.history())
    }
}

// -- VersionedHierarchy ----------------------------------------------------

/// Branch/commit history over a whole [`Hierarchy`]. Each rewrite commit
/// names the `graph_id` within the hierarchy it targeted, alongside the
/// same rule/match/witness a plain [`VersionedGraph`] commit carries.
#[derive(Debug, Clone)]
pub struct VersionedHierarchy {
    log: Log<Hierarchy>,
    hierarchy: Hierarchy,
}

impl VersionedHierarchy {
    pub fn new(initial: Hierarchy) -> Self {
        let hierarchy = initial.clone();
        VersionedHierarchy { log: Log::new(Payload::Init(initial)), hierarchy }
    }

    pub fn hierarchy(&self) -> &Hierarchy {
        &self.hierarchy
    }

    pub fn current_branch(&self) -> &str {
        &self.log.current_branch
    }

    pub fn head(&self) -> Result<&CommitId, AuditError> {
        self.log.head()
    }

    #[instrument(skip(self, rule, m, p_typing, rhs_typing))]
    #[allow(clippy::too_many_arguments)]
    pub fn rewrite(
        &mut self,
        graph_id: &str,
        rule: &Rule,
        m: &Match,
        p_typing: Option<&PTyping>,
        rhs_typing: Option<&RhsTyping>,
        strict: bool,
        message: impl Into<String>,
    ) -> Result<Homomorphism, AuditError> {
        let witness = self.hierarchy.rewrite(graph_id, rule, m, p_typing, rhs_typing, strict)?;
        let parent = self.log.head()?.clone();
        let branch = self.log.current_branch.clone();
        self.log.record(
            vec![parent],
            branch,
            message.into(),
            Payload::Rewrite {
                rule: rule.clone(),
                match_: m.clone(),
                witness: witness.clone(),
                graph_id: Some(graph_id.to_string()),
                p_typing: p_typing.cloned(),
                rhs_typing: rhs_typing.cloned(),
            },
        );
        Ok(witness)
    }

    pub fn branch(&mut self, name: impl Into<String>) -> Result<(), AuditError> {
        let name = name.into();
        if self.log.branch_heads.contains_key(&name) {
            return Err(AuditError::BranchExists(name));
        }
        let parent = self.log.head()?.clone();
        let source = self.log.current_branch.clone();
        self.log.record(vec![parent], name.clone(), format!("branch from {source}"), Payload::BranchCreate { source, name });
        Ok(())
    }

    pub fn switch_branch(&mut self, name: &str) -> Result<(), AuditError> {
        let head = self.log.branch_heads.get(name).ok_or_else(|| AuditError::UnknownBranch(name.to_string()))?.clone();
        self.hierarchy = self.materialize(&head)?;
        self.log.current_branch = name.to_string();
        Ok(())
    }

    fn materialize(&self, commit_id: &str) -> Result<Hierarchy, AuditError> {
        let path = self.log.path_from_root(commit_id)?;
        let mut h = Hierarchy::new();
        for id in path {
            let commit = self.log.commit(&id)?;
            match &commit.payload {
                Payload::Init(snapshot) => h = snapshot.clone(),
                Payload::BranchCreate { .. } | Payload::Merge { .. } | Payload::RollbackTarget { .. } => {}
                Payload::Rewrite { rule, match_, graph_id: Some(graph_id), p_typing, rhs_typing, .. } => {
                    h.rewrite(graph_id, rule, match_, p_typing.as_ref(), rhs_typing.as_ref(), false)?;
                }
                Payload::Rewrite { graph_id: None, .. } => {}
            }
        }
        Ok(h)
    }

    /// Replays every rewrite commit on `other_branch` since its last common
    /// ancestor with the current branch onto `self.hierarchy`, then records
    /// a merge commit with both heads as parents.
    pub fn merge_with(&mut self, other_branch: &str) -> Result<(), AuditError> {
        let other_head = self.log.branch_heads.get(other_branch).ok_or_else(|| AuditError::UnknownBranch(other_branch.to_string()))?.clone();
        let our_head = self.log.head()?.clone();

        let our_path = self.log.path_from_root(&our_head)?;
        let other_path = self.log.path_from_root(&other_head)?;
        let lca_index = our_path.iter().zip(other_path.iter()).take_while(|(a, b)| a == b).count();
        let lca = other_path.get(lca_index.saturating_sub(1)).cloned().unwrap_or_else(|| other_path[0].clone());

        for id in &other_path[lca_index..] {
            let commit = self.log.commit(id)?.clone();
            if let Payload::Rewrite { rule, match_, graph_id: Some(graph_id), p_typing, rhs_typing, .. } = &commit.payload {
                self.hierarchy.rewrite(graph_id, rule, match_, p_typing.as_ref(), rhs_typing.as_ref(), false)?;
            }
        }

        let branch = self.log.current_branch.clone();
        self.log.record(
            vec![our_head, other_head.clone()],
            branch,
            format!("merge {other_branch} (since {lca})"),
            Payload::Merge { other_branch: other_branch.to_string(), other_head },
        );
        Ok(())
    }

    /// Undoes every commit between `commit_id` (exclusive) and the current
    /// head (inclusive), in reverse order, and records a new head.
    pub fn rollback(&mut self, commit_id: &str) -> Result<(), AuditError> {
        let head = self.log.head()?.clone();
        if !self.log.is_ancestor(commit_id, &head)? {
            return Err(AuditError::RollbackTargetUnreachable(commit_id.to_string()));
        }
        let path = self.log.path_from_root(&head)?;
        let cut = path.iter().position(|id| id == commit_id).expect("checked is_ancestor above") + 1;
        for id in path[cut..].iter().rev() {
            let commit = self.log.commit(id)?.clone();
            if let Payload::Rewrite { rule, witness, graph_id: Some(graph_id), .. } = &commit.payload {
                let inverse = invert_rule(rule)?;
                self.hierarchy.rewrite(graph_id, &inverse, witness.mapping(), None, None, false)?;
            }
        }
        let branch = self.log.current_branch.clone();
        self.log.record(vec![head], branch, format!("rollback to {commit_id}"), Payload::RollbackTarget { commit: commit_id.to_string() });
        Ok(())
    }

    pub fn print_history(&self) -> String {
        self.log
            .history()
            .iter()
            .map(|e| format!("{} {} [{}] {}", e.timestamp.to_rfc3339(), e.id, e.branch, e.message))
            .collect::<Vec<_>>()
            .join("\n")
    }

    pub fn to_json(&self) -> serde_json::Value {
        history_to_json(&self.log.history())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::matcher::Match;

    fn single_node_graph(id: &str) -> Graph {
        let mut g = Graph::new();
        g.add_node(id, None).unwrap();
        g
    }

    #[test]
    fn rewrite_appends_a_commit_and_mutates_the_graph() {
        let mut vg = VersionedGraph::new(single_node_graph("1"));
        let mut l = Graph::new();
        l.add_node("x", None).unwrap();
        let mut rule = Rule::from_pattern(l);
        rule.inject_remove_node("x").unwrap();
        let m: Match = [("x".to_string(), "1".to_string())].into_iter().collect();

        vg.rewrite(&rule, &m, "delete node 1").unwrap();
        assert!(!vg.graph().has_node("1"));
        assert_eq!(vg.log.history().len(), 2);
    }

    #[test]
    fn branch_and_switch_preserve_independent_history() {
        let mut vg = VersionedGraph::new(single_node_graph("1"));
        vg.branch("feature").unwrap();
        vg.switch_branch("feature").unwrap();
        assert_eq!(vg.current_branch(), "feature");
        assert!(vg.graph().has_node("1"));
    }

    #[test]
    fn rollback_restores_prior_graph_state() {
        let mut vg = VersionedGraph::new(single_node_graph("1"));
        let before = vg.head().unwrap().clone();

        let mut l = Graph::new();
        l.add_node("x", None).unwrap();
        let mut rule = Rule::from_pattern(l);
        rule.inject_remove_node("x").unwrap();
        let m: Match = [("x".to_string(), "1".to_string())].into_iter().collect();
        vg.rewrite(&rule, &m, "delete node 1").unwrap();
        assert!(!vg.graph().has_node("1"));

        vg.rollback(&before).unwrap();
        assert!(vg.graph().has_node("1"));
    }

    #[test]
    fn rollback_rejects_unreachable_target() {
        let mut vg = VersionedGraph::new(single_node_graph("1"));
        let err = vg.rollback("not-a-commit").unwrap_err();
        assert!(matches!(err, AuditError::RollbackTargetUnreachable(_)));
    }

    #[test]
    fn hierarchy_rollback_restores_prior_graph_state() {
        let mut h = Hierarchy::new();
        h.add_graph("g", single_node_graph("1")).unwrap();
        let mut vh = VersionedHierarchy::new(h);
        let before = vh.head().unwrap().clone();

        let mut l = Graph::new();
        l.add_node("x", None).unwrap();
        let mut rule = Rule::from_pattern(l);
        rule.inject_remove_node("x").unwrap();
        let m: Match = [("x".to_string(), "1".to_string())].into_iter().collect();
        vh.rewrite("g", &rule, &m, None, None, false, "delete node 1").unwrap();
        assert!(!vh.hierarchy().graph("g").unwrap().has_node("1"));

        vh.rollback(&before).unwrap();
        assert!(vh.hierarchy().graph("g").unwrap().has_node("1"));
    }
}
