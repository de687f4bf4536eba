use std::collections::BTreeSet;

use regraph::{find_matching, AttributeMap, AttributeValue, Graph, PatternTyping};

fn triangle() -> Graph {
    let mut g = Graph::new();
    g.add_node("1", None).unwrap();
    g.add_node("2", None).unwrap();
    g.add_node("3", None).unwrap();
    g.add_edge("1", "2", None).unwrap();
    g.add_edge("2", "3", None).unwrap();
    g.add_edge("3", "1", None).unwrap();
    g
}

#[test]
fn finds_every_rotation_of_a_directed_triangle_pattern() {
    let mut pattern = Graph::new();
    pattern.add_node("x", None).unwrap();
    pattern.add_node("y", None).unwrap();
    pattern.add_edge("x", "y", None).unwrap();

    let target = triangle();
    let matches: Vec<_> = find_matching(&pattern, &target, None).collect();

    assert_eq!(matches.len(), 3);
    for m in &matches {
        assert!(target.has_edge(&m["x"], &m["y"]));
    }
}

#[test]
fn pattern_typing_restricts_candidate_assignments() {
    let mut pattern = Graph::new();
    pattern.add_node("x", None).unwrap();
    let target = triangle();

    let typing = PatternTyping::new().restrict("x", BTreeSet::from(["2".to_string()]));
    let matches: Vec<_> = find_matching(&pattern, &target, Some(&typing)).collect();

    assert_eq!(matches.len(), 1);
    assert_eq!(matches[0]["x"], "2");
}

#[test]
fn attribute_subsumption_prunes_non_matching_nodes() {
    let mut pattern = Graph::new();
    let mut wanted = AttributeMap::new();
    wanted.set("color", AttributeValue::finite(["red"]));
    pattern.add_node("x", Some(wanted)).unwrap();

    let mut target = Graph::new();
    let mut red = AttributeMap::new();
    red.set("color", AttributeValue::finite(["red", "blue"]));
    target.add_node("a", Some(red)).unwrap();
    let mut blue = AttributeMap::new();
    blue.set("color", AttributeValue::finite(["blue"]));
    target.add_node("b", Some(blue)).unwrap();

    let matches: Vec<_> = find_matching(&pattern, &target, None).collect();
    assert_eq!(matches.len(), 1);
    assert_eq!(matches[0]["x"], "a");
}
