use regraph::{AttributeMap, AttributeValue, Graph};

#[test]
fn clone_node_duplicates_edges_and_attrs() {
    let mut g = Graph::new();
    let mut attrs = AttributeMap::new();
    attrs.set("color", AttributeValue::finite(["red"]));
    g.add_node("a", Some(attrs)).unwrap();
    g.add_node("b", None).unwrap();
    g.add_edge("a", "b", None).unwrap();
    g.add_edge("b", "a", None).unwrap();

    let clone_id = g.clone_node("a", None).unwrap();

    assert!(g.has_node(&clone_id));
    assert_ne!(clone_id, "a");
    assert!(g.has_edge(&clone_id, "b"));
    assert!(g.has_edge("b", &clone_id));
    assert_eq!(g.node_attrs(&clone_id).unwrap().get("color"), g.node_attrs("a").unwrap().get("color"));
}

#[test]
fn merge_nodes_unions_edges_and_attrs() {
    let mut g = Graph::new();
    let mut a_attrs = AttributeMap::new();
    a_attrs.set("tag", AttributeValue::finite(["a"]));
    let mut b_attrs = AttributeMap::new();
    b_attrs.set("tag", AttributeValue::finite(["b"]));
    g.add_node("a", Some(a_attrs)).unwrap();
    g.add_node("b", Some(b_attrs)).unwrap();
    g.add_node("c", None).unwrap();
    g.add_edge("a", "c", None).unwrap();
    g.add_edge("c", "b", None).unwrap();

    let merged = g.merge_nodes(&["a".to_string(), "b".to_string()].into_iter().collect(), Some("ab".to_string())).unwrap();

    assert_eq!(merged, "ab");
    assert!(!g.has_node("a"));
    assert!(!g.has_node("b"));
    assert!(g.has_edge("ab", "c"));
    assert!(g.has_edge("c", "ab"));
    let merged_tag = g.node_attrs("ab").unwrap().get("tag").unwrap();
    assert!(merged_tag.contains(&regraph::Atom::Str("a".to_string())));
    assert!(merged_tag.contains(&regraph::Atom::Str("b".to_string())));
}

#[test]
fn remove_node_cascades_to_incident_edges() {
    let mut g = Graph::new();
    g.add_node("a", None).unwrap();
    g.add_node("b", None).unwrap();
    g.add_edge("a", "b", None).unwrap();

    g.remove_node("b").unwrap();

    assert!(!g.has_node("b"));
    assert!(!g.has_edge("a", "b"));
}

#[test]
fn fresh_id_never_collides_with_existing_nodes() {
    let mut g = Graph::new();
    for i in 0..5 {
        let id = g.fresh_id("n");
        g.add_node(id, None).unwrap();
        assert_eq!(g.node_count(), i + 1);
    }
}
