use std::collections::BTreeMap;

use regraph::{AttributeMap, AttributeValue, Graph, Hierarchy, Match, Rule};

fn two_node_graph(a: &str, b: &str) -> Graph {
    let mut g = Graph::new();
    g.add_node(a, None).unwrap();
    g.add_node(b, None).unwrap();
    g.add_edge(a, b, None).unwrap();
    g
}

#[test]
fn add_typing_rejects_a_map_that_does_not_preserve_edges() {
    let mut hierarchy = Hierarchy::new();
    hierarchy.add_graph("child", two_node_graph("1", "2")).unwrap();

    let mut parent = Graph::new();
    parent.add_node("p", None).unwrap();
    hierarchy.add_graph("parent", parent).unwrap();

    let mapping: BTreeMap<String, String> = [("1".to_string(), "p".to_string()), ("2".to_string(), "p".to_string())].into_iter().collect();
    assert!(hierarchy.add_typing("child", "parent", mapping).is_err());
}

#[test]
fn node_type_follows_the_typing_chain_transitively() {
    let mut hierarchy = Hierarchy::new();
    hierarchy.add_graph("instance", two_node_graph("1", "2")).unwrap();

    let mut schema = Graph::new();
    schema.add_node("Entity", None).unwrap();
    schema.add_edge("Entity", "Entity", None).unwrap();
    hierarchy.add_graph("schema", schema).unwrap();

    let mut meta = Graph::new();
    meta.add_node("Node", None).unwrap();
    meta.add_edge("Node", "Node", None).unwrap();
    hierarchy.add_graph("meta", meta).unwrap();

    hierarchy
        .add_typing(
            "instance",
            "schema",
            [("1".to_string(), "Entity".to_string()), ("2".to_string(), "Entity".to_string())].into_iter().collect(),
        )
        .unwrap();
    hierarchy
        .add_typing("schema", "meta", [("Entity".to_string(), "Node".to_string())].into_iter().collect())
        .unwrap();

    let types = hierarchy.node_type("instance", "1").unwrap();
    assert_eq!(types.get("schema"), Some(&"Entity".to_string()));
    assert_eq!(types.get("meta"), Some(&"Node".to_string()));
}

#[test]
fn non_strict_delete_cascades_to_an_ancestor_instance() {
    let mut hierarchy = Hierarchy::new();
    hierarchy.add_graph("instance", two_node_graph("1", "2")).unwrap();
    hierarchy.add_graph("schema", two_node_graph("Entity", "Other")).unwrap();
    hierarchy
        .add_typing(
            "instance",
            "schema",
            [("1".to_string(), "Entity".to_string()), ("2".to_string(), "Other".to_string())].into_iter().collect(),
        )
        .unwrap();

    let mut l = Graph::new();
    l.add_node("x", None).unwrap();
    let mut rule = Rule::from_pattern(l);
    rule.inject_remove_node("x").unwrap();
    let m: Match = [("x".to_string(), "Entity".to_string())].into_iter().collect();

    hierarchy.rewrite("schema", &rule, &m, None, None, false).unwrap();

    assert!(!hierarchy.graph("schema").unwrap().has_node("Entity"));
    assert!(!hierarchy.graph("instance").unwrap().has_node("1"));
    assert!(hierarchy.graph("instance").unwrap().has_node("2"));
}

#[test]
fn strict_rewrite_is_rejected_when_it_would_force_ancestor_deletion() {
    let mut hierarchy = Hierarchy::new();
    hierarchy.add_graph("instance", two_node_graph("1", "2")).unwrap();
    hierarchy.add_graph("schema", two_node_graph("Entity", "Other")).unwrap();
    hierarchy
        .add_typing(
            "instance",
            "schema",
            [("1".to_string(), "Entity".to_string()), ("2".to_string(), "Other".to_string())].into_iter().collect(),
        )
        .unwrap();

    let mut l = Graph::new();
    l.add_node("x", None).unwrap();
    let mut rule = Rule::from_pattern(l);
    rule.inject_remove_node("x").unwrap();
    let m: Match = [("x".to_string(), "Entity".to_string())].into_iter().collect();

    let err = hierarchy.rewrite("schema", &rule, &m, None, None, true).unwrap_err();
    assert!(format!("{err}").contains("strict") || format!("{err:?}").contains("StrictModeViolation"));
    assert!(hierarchy.graph("schema").unwrap().has_node("Entity"));
}

#[test]
fn backward_propagation_narrows_ancestor_attributes_to_the_intersection() {
    let colors = AttributeMap::from_pairs([("color".to_string(), AttributeValue::finite(["blue", "red", "green"]))]);

    let mut instance = Graph::new();
    instance.add_node("1", Some(colors.clone())).unwrap();
    let mut hierarchy = Hierarchy::new();
    hierarchy.add_graph("instance", instance).unwrap();

    let mut schema = Graph::new();
    schema.add_node("Entity", Some(colors)).unwrap();
    hierarchy.add_graph("schema", schema).unwrap();

    hierarchy.add_typing("instance", "schema", [("1".to_string(), "Entity".to_string())].into_iter().collect()).unwrap();

    let mut l = Graph::new();
    l.add_node("x", Some(AttributeMap::from_pairs([("color".to_string(), AttributeValue::finite(["blue", "red", "green"]))]))).unwrap();
    let mut rule = Rule::from_pattern(l);
    rule.inject_remove_attrs("x", &AttributeMap::from_pairs([("color".to_string(), AttributeValue::finite(["green"]))])).unwrap();
    let m: Match = [("x".to_string(), "Entity".to_string())].into_iter().collect();

    hierarchy.rewrite("schema", &rule, &m, None, None, false).unwrap();

    let shrunk = AttributeValue::finite(["blue", "red"]);
    assert_eq!(hierarchy.graph("schema").unwrap().node_attrs("Entity").unwrap().get_or_empty("color"), &shrunk);
    assert_eq!(hierarchy.graph("instance").unwrap().node_attrs("1").unwrap().get_or_empty("color"), &shrunk);
}
