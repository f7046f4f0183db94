use threatflow::core::dfd::{DfdAssembler, EdgeDirection, GraphMode};
use threatflow::core::{Protocol, ThreatModel};

fn abc_model() -> ThreatModel {
    let mut model = ThreatModel::new();
    let a = model.process("A").id();
    let b = model.process("B").id();
    let c = model.process("C").id();
    let flows = vec![
        model.flow(a, b, "Edge 1").unwrap(),
        model.flow(b, c, "Edge 2").unwrap(),
    ];
    model.add_scene("Test ABC", flows).unwrap();
    model
}

#[test]
fn test_abc_scene_renders_numbered_edges() {
    let model = abc_model();
    let graph = DfdAssembler::default().scene_graph(&model, "Test ABC", true).unwrap();

    let expected = "digraph \"Test ABC\" {\n\
\tgraph [color=blue fontname=Arial rankdir=LR]\n\
\tnode [fontname=Arial fontsize=11 shape=box style=rounded]\n\
\tedge [fontname=Arial fontsize=11]\n\
\tA\n\
\tB\n\
\tC\n\
\tA -> B [label=\"(1) Edge 1\"]\n\
\tB -> C [label=\"(2) Edge 2\"]\n\
}";
    assert_eq!(graph.to_dot(), expected);
}

#[test]
fn test_abc_scene_without_labels_keeps_numbers() {
    let model = abc_model();
    let graph = DfdAssembler::default().scene_graph(&model, "Test ABC", false).unwrap();

    let labels: Vec<_> = graph.edges().iter().map(|e| e.label.clone().unwrap()).collect();
    assert_eq!(labels, vec!["(1)", "(2)"]);
}

#[test]
fn test_shared_boundary_becomes_one_cluster() {
    let mut model = ThreatModel::new();
    let d = model.process("D").in_boundary("BOUNDARY").unwrap().id();
    let e = model.process("E").in_boundary("BOUNDARY").unwrap().id();
    let flow = model.flow(d, e, "Edge 3").unwrap();
    model.add_scene("Test DE", vec![flow]).unwrap();

    let graph = DfdAssembler::default().scene_graph(&model, "Test DE", true).unwrap();

    assert!(graph.top_level_nodes().is_empty());
    assert_eq!(graph.clusters().len(), 1);
    let cluster = graph.find_cluster("BOUNDARY").unwrap();
    assert_eq!(cluster.nodes, vec!["D".to_string(), "E".to_string()]);
    assert_eq!(graph.edges().len(), 1);
    assert_eq!(graph.edges()[0].label.as_deref(), Some("(1) Edge 3"));

    let dot = graph.to_dot();
    assert!(dot.contains("\tsubgraph cluster_BOUNDARY {\n"));
    assert!(dot.contains(
        "\t\tgraph [color=red fontname=Arial fontsize=11 label=BOUNDARY style=dashed]\n"
    ));
}

#[test]
fn test_nested_boundaries_are_deterministic() {
    let build = || {
        let mut model = ThreatModel::new();
        let inner = model.boundary("Inner").in_boundary("Mid").unwrap().id();
        model.boundary("Mid").in_boundary("Outer").unwrap();
        let e1 = model.process("E1").in_boundary(inner).unwrap().id();
        let e2 = model.actor("E2").id();
        let flow = model.flow(e2, e1, "probe").unwrap();
        model.add_scene("Nested", vec![flow]).unwrap();
        DfdAssembler::default().scene_graph(&model, "Nested", true).unwrap()
    };

    let graph = build();
    assert_eq!(graph.top_level_nodes(), &["E2".to_string()]);

    let outer: Vec<_> = graph.top_level_clusters().collect();
    assert_eq!(outer.len(), 1);
    assert_eq!(outer[0].label, "Outer");
    let mid = graph.cluster(outer[0].children[0]);
    assert_eq!(mid.label, "Mid");
    let inner = graph.cluster(mid.children[0]);
    assert_eq!(inner.label, "Inner");
    assert_eq!(inner.nodes, vec!["E1".to_string()]);

    assert_eq!(graph.to_dot(), build().to_dot());
}

#[test]
fn test_simplified_graph_merges_reverse_flows() {
    let mut model = ThreatModel::new();
    let a = model.process("A").id();
    let b = model.process("B").id();
    let c = model.process("C").id();
    let flows = vec![
        model.flow(a, b, "request").unwrap(),
        model.flow(b, a, "reply").unwrap(),
        model.flow(a, b, "again").unwrap(),
        model.flow(b, c, "forward").unwrap(),
    ];

    let graph = DfdAssembler::default()
        .flows_graph(&model, "Simple", &flows, GraphMode::Simplified)
        .unwrap();

    assert_eq!(graph.edges().len(), 2);
    assert_eq!(graph.edges()[0].direction, Some(EdgeDirection::Both));
    assert_eq!(graph.edges()[1].direction, Some(EdgeDirection::Forward));
    assert!(graph.edges().iter().all(|e| e.label.is_none()));
    assert!(graph.to_dot().contains("\tA -> B [dir=both]\n"));
}

#[test]
fn test_response_expansion_adds_reverse_edge() {
    let mut model = ThreatModel::new();
    let customer = model.actor("Customer").id();
    let web = model.process("Web").id();
    let http = model.wrap(Protocol::Http, "Credentials").unwrap().id();
    let request = model.wrap(Protocol::Tls, http).unwrap().id();
    let cookie = model.wrap(Protocol::Http, "Session Cookie").unwrap().id();

    let flow = model.flow(customer, web, request).unwrap().responding(cookie);
    model.add_scene("Login", vec![flow]).unwrap();
    model.expand_responses("Login").unwrap();

    let graph = DfdAssembler::default().scene_graph(&model, "Login", true).unwrap();
    let edges = graph.edges();
    assert_eq!(edges.len(), 2);
    assert_eq!((edges[0].from.as_str(), edges[0].to.as_str()), ("Customer", "Web"));
    assert_eq!(edges[0].label.as_deref(), Some("(1) Credentials"));
    assert_eq!((edges[1].from.as_str(), edges[1].to.as_str()), ("Web", "Customer"));
    assert_eq!(edges[1].label.as_deref(), Some("(2) Session Cookie"));
}

#[test]
fn test_aggregate_graph_spans_all_scenes() {
    let mut model = abc_model();
    let c = model.process("C").id();
    let a = model.process("A").id();
    let flow = model.flow(c, a, "Edge 3").unwrap();
    model.add_scene("Test CA", vec![flow]).unwrap();

    let graph = DfdAssembler::default().aggregate_graph(&model, "AggregatedDfd").unwrap();
    assert_eq!(graph.top_level_nodes().len(), 3);
    assert_eq!(graph.edges().len(), 3);
    assert!(graph
        .edges()
        .iter()
        .all(|e| e.direction == Some(EdgeDirection::Forward)));
}
