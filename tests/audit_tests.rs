use regraph::{Graph, Hierarchy, Match, Rule, VersionedGraph, VersionedHierarchy};

fn seed_graph() -> Graph {
    let mut g = Graph::new();
    g.add_node("1", None).unwrap();
    g.add_node("2", None).unwrap();
    g.add_edge("1", "2", None).unwrap();
    g
}

fn delete_node_rule(name: &str) -> Rule {
    let mut l = Graph::new();
    l.add_node(name, None).unwrap();
    let mut rule = Rule::from_pattern(l);
    rule.inject_remove_node(name).unwrap();
    rule
}

#[test]
fn branching_then_rewriting_each_branch_keeps_them_independent() {
    let mut vg = VersionedGraph::new(seed_graph());
    vg.branch("feature").unwrap();

    let rule = delete_node_rule("x");
    let m: Match = [("x".to_string(), "2".to_string())].into_iter().collect();
    vg.rewrite(&rule, &m, "delete 2 on main").unwrap();
    assert!(!vg.graph().has_node("2"));

    vg.switch_branch("feature").unwrap();
    assert!(vg.graph().has_node("2"));
}

#[test]
fn rollback_restores_a_prior_commit_and_appends_a_new_head() {
    let mut vg = VersionedGraph::new(seed_graph());
    let before = vg.head().unwrap().clone();

    let rule = delete_node_rule("x");
    let m: Match = [("x".to_string(), "2".to_string())].into_iter().collect();
    vg.rewrite(&rule, &m, "delete 2").unwrap();
    assert!(!vg.graph().has_node("2"));

    vg.rollback(&before).unwrap();
    assert!(vg.graph().has_node("2"));
    assert!(vg.graph().has_node("1"));
    assert!(vg.graph().has_edge("1", "2"));
}

#[test]
fn merge_replays_the_other_branchs_commits() {
    let mut vg = VersionedGraph::new(seed_graph());
    vg.branch("feature").unwrap();
    vg.switch_branch("feature").unwrap();

    let rule = delete_node_rule("x");
    let m: Match = [("x".to_string(), "2".to_string())].into_iter().collect();
    vg.rewrite(&rule, &m, "delete 2 on feature").unwrap();

    vg.switch_branch("main").unwrap();
    assert!(vg.graph().has_node("2"));

    vg.merge_with("feature").unwrap();
    assert!(!vg.graph().has_node("2"));
}

#[test]
fn history_lists_every_commit_in_order() {
    let mut vg = VersionedGraph::new(seed_graph());
    let rule = delete_node_rule("x");
    let m: Match = [("x".to_string(), "2".to_string())].into_iter().collect();
    vg.rewrite(&rule, &m, "delete 2").unwrap();

    let history = vg.print_history();
    assert!(history.contains("init"));
    assert!(history.contains("delete 2"));

    let json = vg.to_json();
    assert_eq!(json.as_array().unwrap().len(), 2);
}

fn seed_hierarchy() -> Hierarchy {
    let mut hierarchy = Hierarchy::new();
    hierarchy.add_graph("g", seed_graph()).unwrap();
    hierarchy
}

#[test]
fn hierarchy_branching_then_rewriting_each_branch_keeps_them_independent() {
    let mut vh = VersionedHierarchy::new(seed_hierarchy());
    vh.branch("feature").unwrap();

    let rule = delete_node_rule("x");
    let m: Match = [("x".to_string(), "2".to_string())].into_iter().collect();
    vh.rewrite("g", &rule, &m, None, None, false, "delete 2 on main").unwrap();
    assert!(!vh.hierarchy().graph("g").unwrap().has_node("2"));

    vh.switch_branch("feature").unwrap();
    assert!(vh.hierarchy().graph("g").unwrap().has_node("2"));
}

#[test]
fn hierarchy_rollback_restores_a_prior_commit_and_appends_a_new_head() {
    let mut vh = VersionedHierarchy::new(seed_hierarchy());
    let before = vh.head().unwrap().clone();

    let rule = delete_node_rule("x");
    let m: Match = [("x".to_string(), "2".to_string())].into_iter().collect();
    vh.rewrite("g", &rule, &m, None, None, false, "delete 2").unwrap();
    assert!(!vh.hierarchy().graph("g").unwrap().has_node("2"));

    vh.rollback(&before).unwrap();
    assert!(vh.hierarchy().graph("g").unwrap().has_node("2"));
    assert!(vh.hierarchy().graph("g").unwrap().has_edge("1", "2"));
}

#[test]
fn hierarchy_merge_replays_the_other_branchs_commits() {
    let mut vh = VersionedHierarchy::new(seed_hierarchy());
    vh.branch("feature").unwrap();
    vh.switch_branch("feature").unwrap();

    let rule = delete_node_rule("x");
    let m: Match = [("x".to_string(), "2".to_string())].into_iter().collect();
    vh.rewrite("g", &rule, &m, None, None, false, "delete 2 on feature").unwrap();

    vh.switch_branch("main").unwrap();
    assert!(vh.hierarchy().graph("g").unwrap().has_node("2"));

    vh.merge_with("feature").unwrap();
    assert!(!vh.hierarchy().graph("g").unwrap().has_node("2"));
}
