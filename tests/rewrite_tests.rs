use std::collections::BTreeSet;

use regraph::{rewrite, Graph, Match, Rule};

fn edge_pattern() -> Graph {
    let mut l = Graph::new();
    l.add_node("x", None).unwrap();
    l.add_node("y", None).unwrap();
    l.add_edge("x", "y", None).unwrap();
    l
}

fn path_graph() -> Graph {
    let mut g = Graph::new();
    g.add_node("1", None).unwrap();
    g.add_node("2", None).unwrap();
    g.add_node("3", None).unwrap();
    g.add_edge("1", "2", None).unwrap();
    g.add_edge("2", "3", None).unwrap();
    g
}

#[test]
fn delete_rule_removes_the_matched_node_and_its_edges() {
    let mut rule = Rule::from_pattern(edge_pattern());
    rule.inject_remove_node("y").unwrap();

    let mut target = path_graph();
    let m: Match = [("x".to_string(), "1".to_string()), ("y".to_string(), "2".to_string())].into_iter().collect();

    rewrite(&mut target, &rule, &m).unwrap();

    assert!(target.has_node("1"));
    assert!(!target.has_node("2"));
    assert!(target.has_node("3"));
    assert!(!target.has_edge("1", "2"));
}

#[test]
fn clone_rule_duplicates_the_matched_node_with_its_edges() {
    let mut l = Graph::new();
    l.add_node("x", None).unwrap();
    let mut rule = Rule::from_pattern(l);
    rule.inject_clone_node("x", None).unwrap();

    let mut target = Graph::new();
    target.add_node("a", None).unwrap();
    target.add_node("b", None).unwrap();
    target.add_edge("a", "b", None).unwrap();

    let m: Match = [("x".to_string(), "a".to_string())].into_iter().collect();
    let witness = rewrite(&mut target, &rule, &m).unwrap();

    assert_eq!(target.node_count(), 3);
    let rhs_nodes: BTreeSet<String> = rule.rhs().nodes().cloned().collect();
    let image = witness.image(&rhs_nodes);
    assert_eq!(image.len(), 2);
    for clone_id in &image {
        assert!(target.has_edge(clone_id, "b"));
    }
}

#[test]
fn merge_rule_combines_two_matched_nodes() {
    let mut l = Graph::new();
    l.add_node("x", None).unwrap();
    l.add_node("y", None).unwrap();
    let mut rule = Rule::from_pattern(l);
    rule.inject_merge_nodes(&BTreeSet::from(["x".to_string(), "y".to_string()]), Some("merged".to_string())).unwrap();

    let mut target = Graph::new();
    target.add_node("a", None).unwrap();
    target.add_node("b", None).unwrap();
    target.add_node("c", None).unwrap();
    target.add_edge("a", "c", None).unwrap();
    target.add_edge("c", "b", None).unwrap();

    let m: Match = [("x".to_string(), "a".to_string()), ("y".to_string(), "b".to_string())].into_iter().collect();
    rewrite(&mut target, &rule, &m).unwrap();

    assert_eq!(target.node_count(), 2);
    assert!(target.has_edge("merged", "c"));
    assert!(target.has_edge("c", "merged"));
}

#[test]
fn add_rule_introduces_a_fresh_node_and_edge() {
    let mut l = Graph::new();
    l.add_node("x", None).unwrap();
    let mut rule = Rule::from_pattern(l);
    rule.inject_add_node("new", None).unwrap();
    rule.inject_add_edge("x", "new", None).unwrap();

    let mut target = Graph::new();
    target.add_node("a", None).unwrap();
    let m: Match = [("x".to_string(), "a".to_string())].into_iter().collect();

    let witness = rewrite(&mut target, &rule, &m).unwrap();

    let new_id = witness.apply("new").unwrap();
    assert!(target.has_node(new_id));
    assert!(target.has_edge("a", new_id));
}
