use neuromap::graph::{CodeGraph, GraphBuilder};
use neuromap::impact::{ImpactAnalyzer, ImpactReport, RIPPLE_LIMIT};
use neuromap::model::{EdgeKind, EdgeRecord, NodeKind, NodeRecord};
use serde_json::Value;

fn file_a_graph() -> CodeGraph {
    GraphBuilder::build(
        vec![
            NodeRecord::file("fileA.py", "fileA"),
            NodeRecord::member("fileA.py", NodeKind::Class, "Helper"),
        ],
        vec![
            EdgeRecord::new("fileA.py", "fileA.py::Helper", EdgeKind::Contains),
            EdgeRecord::new("fileA.py", "requests", EdgeKind::Imports),
        ],
    )
}

#[test]
fn external_import_has_one_direct_dependent() {
    let graph = file_a_graph();
    let prediction = ImpactAnalyzer::new(&graph).analyze("requests");
    assert_eq!(prediction.target_node, "requests");
    assert_eq!(prediction.direct_impact, vec!["fileA.py"]);
    assert!(prediction.ripple_effect.is_empty());
    assert_eq!(prediction.risk_score, 10.0);
}

#[test]
fn node_without_dependents_has_zero_impact() {
    let graph = file_a_graph();
    let prediction = ImpactAnalyzer::new(&graph).analyze("fileA.py");
    assert!(prediction.direct_impact.is_empty());
    assert!(prediction.ripple_effect.is_empty());
    assert_eq!(prediction.risk_score, 0.0);
}

#[test]
fn unknown_target_is_a_soft_miss() {
    let graph = file_a_graph();
    let prediction = ImpactAnalyzer::new(&graph).analyze("nowhere::Nothing");
    assert_eq!(prediction.target_node, "nowhere::Nothing");
    assert!(prediction.direct_impact.is_empty());
    assert!(prediction.ripple_effect.is_empty());
    assert_eq!(prediction.risk_score, 0.0);
}

#[test]
fn ripple_walks_ancestors_of_direct_dependents() {
    // app.py imports service; service.py holds class Service which inherits Base.
    let graph = GraphBuilder::build(
        vec![
            NodeRecord::file("base.py", "base"),
            NodeRecord::member("base.py", NodeKind::Class, "Base"),
            NodeRecord::file("service.py", "service"),
            NodeRecord::member("service.py", NodeKind::Class, "Service"),
            NodeRecord::file("app.py", "app"),
        ],
        vec![
            EdgeRecord::new("base.py", "base.py::Base", EdgeKind::Contains),
            EdgeRecord::new("service.py", "service.py::Service", EdgeKind::Contains),
            EdgeRecord::new("service.py::Service", "base.py::Base", EdgeKind::Inherits),
            EdgeRecord::new("app.py", "service.py", EdgeKind::Imports),
        ],
    );
    let prediction = ImpactAnalyzer::new(&graph).analyze("base.py::Base");
    assert_eq!(
        prediction.direct_impact,
        vec!["base.py", "service.py::Service"]
    );
    assert_eq!(prediction.ripple_effect, vec!["app.py", "service.py"]);
    assert_eq!(prediction.risk_score, 24.0);
    assert_eq!(
        prediction.affected_nodes(),
        vec!["app.py", "base.py", "service.py", "service.py::Service"]
    );
}

#[test]
fn suffix_match_prefers_shortest_id() {
    let graph = GraphBuilder::build(
        vec![
            NodeRecord::file("pkg/util.py", "util"),
            NodeRecord::file("util.py", "util"),
            NodeRecord::file("main.py", "main"),
        ],
        vec![EdgeRecord::new("main.py", "util.py", EdgeKind::Imports)],
    );
    let analyzer = ImpactAnalyzer::new(&graph);
    assert_eq!(analyzer.resolve("util.py"), Some("util.py"));
    assert_eq!(analyzer.resolve("til.py"), Some("util.py"));
    let prediction = analyzer.analyze("til.py");
    assert_eq!(prediction.target_node, "util.py");
    assert_eq!(prediction.direct_impact, vec!["main.py"]);
}

#[test]
fn ripple_is_truncated_but_risk_uses_full_count() {
    // core <- mid <- 30 leaves
    let mut nodes = vec![
        NodeRecord::file("core.py", "core"),
        NodeRecord::file("mid.py", "mid"),
    ];
    let mut edges = vec![EdgeRecord::new("mid.py", "core.py", EdgeKind::Imports)];
    for i in 0..30 {
        let rel = format!("leaf{i:02}.py");
        nodes.push(NodeRecord::file(&rel, &format!("leaf{i:02}")));
        edges.push(EdgeRecord::new(rel, "mid.py", EdgeKind::Imports));
    }
    let graph = GraphBuilder::build(nodes, edges);
    let prediction = ImpactAnalyzer::new(&graph).analyze("core.py");

    assert_eq!(prediction.direct_impact, vec!["mid.py"]);
    assert_eq!(prediction.ripple_effect.len(), RIPPLE_LIMIT);
    assert_eq!(prediction.ripple_effect.first().map(String::as_str), Some("leaf00.py"));
    assert_eq!(prediction.ripple_effect.last().map(String::as_str), Some("leaf19.py"));
    // 10 * 1 + 2 * 30, capped at 100
    assert_eq!(prediction.risk_score, 70.0);
}

#[test]
fn report_carries_affected_nodes() {
    let graph = file_a_graph();
    let prediction = ImpactAnalyzer::new(&graph).analyze("requests");
    let value: Value = serde_json::to_value(ImpactReport::from(&prediction)).unwrap();
    assert_eq!(value["target_node"], "requests");
    assert_eq!(value["direct_impact"][0], "fileA.py");
    assert_eq!(value["affected_nodes"][0], "fileA.py");
    assert_eq!(value["risk_score"], 10.0);
}
