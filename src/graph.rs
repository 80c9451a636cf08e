//! The structural graph: nodes keyed by stable id, directed edges from
//! referencer to referenced. Parallel edges are kept.

use crate::model::{EdgeKind, EdgeRecord, NodeKind, NodeRecord};
use petgraph::Direction;
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::EdgeRef;
use std::collections::{BTreeSet, HashMap, HashSet, VecDeque};
use tracing::debug;

#[derive(Debug, Clone, Default)]
pub struct CodeGraph {
    graph: DiGraph<NodeRecord, EdgeKind>,
    index: HashMap<String, NodeIndex>,
}

impl CodeGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.index.contains_key(id)
    }

    /// Inserts `node` unless its id is already present. Returns the index of
    /// the node holding that id.
    pub fn insert_node(&mut self, node: NodeRecord) -> NodeIndex {
        if let Some(idx) = self.index.get(&node.id) {
            return *idx;
        }
        let id = node.id.clone();
        let idx = self.graph.add_node(node);
        self.index.insert(id, idx);
        idx
    }

    /// Adds an edge between two existing ids. Returns false when either end
    /// is unknown.
    pub fn insert_edge(&mut self, source: &str, target: &str, kind: EdgeKind) -> bool {
        match (self.index.get(source), self.index.get(target)) {
            (Some(src), Some(dst)) => {
                self.graph.add_edge(*src, *dst, kind);
                true
            }
            _ => false,
        }
    }

    pub fn node(&self, id: &str) -> Option<&NodeRecord> {
        self.index.get(id).map(|idx| &self.graph[*idx])
    }

    /// Nodes in insertion order.
    pub fn nodes(&self) -> impl Iterator<Item = &NodeRecord> {
        self.graph.node_weights()
    }

    /// Edges in insertion order as `(source id, target id, kind)`.
    pub fn edges(&self) -> impl Iterator<Item = (&str, &str, EdgeKind)> {
        self.graph.edge_references().map(|edge| {
            (
                self.graph[edge.source()].id.as_str(),
                self.graph[edge.target()].id.as_str(),
                *edge.weight(),
            )
        })
    }

    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    pub fn in_degree(&self, id: &str) -> usize {
        self.degree(id, Direction::Incoming)
    }

    pub fn out_degree(&self, id: &str) -> usize {
        self.degree(id, Direction::Outgoing)
    }

    fn degree(&self, id: &str, direction: Direction) -> usize {
        self.index
            .get(id)
            .map(|idx| self.graph.edges_directed(*idx, direction).count())
            .unwrap_or(0)
    }

    /// Ids holding an edge into `id`, each listed once, sorted.
    pub fn predecessors(&self, id: &str) -> Vec<String> {
        let Some(idx) = self.index.get(id) else {
            return Vec::new();
        };
        let unique: BTreeSet<&str> = self
            .graph
            .neighbors_directed(*idx, Direction::Incoming)
            .map(|pred| self.graph[pred].id.as_str())
            .collect();
        unique.into_iter().map(str::to_string).collect()
    }

    /// Every id with a path into `id`, excluding `id` itself.
    pub fn ancestors(&self, id: &str) -> HashSet<String> {
        let mut seen: HashSet<NodeIndex> = HashSet::new();
        let Some(start) = self.index.get(id).copied() else {
            return HashSet::new();
        };
        let mut queue = VecDeque::from([start]);
        while let Some(current) = queue.pop_front() {
            for pred in self.graph.neighbors_directed(current, Direction::Incoming) {
                if seen.insert(pred) {
                    queue.push_back(pred);
                }
            }
        }
        seen.remove(&start);
        seen.into_iter()
            .map(|idx| self.graph[idx].id.clone())
            .collect()
    }

    /// Resolves a partial id: the shortest id ending with `suffix`, ties
    /// broken lexicographically.
    pub fn find_by_suffix(&self, suffix: &str) -> Option<&str> {
        if suffix.is_empty() {
            return None;
        }
        self.index
            .keys()
            .filter(|id| id.ends_with(suffix))
            .min_by(|a, b| a.len().cmp(&b.len()).then_with(|| a.cmp(b)))
            .map(String::as_str)
    }

    /// Content hash of the graph shape, independent of insertion order.
    pub fn fingerprint(&self) -> String {
        let nodes: BTreeSet<(&str, NodeKind)> =
            self.nodes().map(|node| (node.id.as_str(), node.kind)).collect();
        let mut edges: Vec<(&str, &str, EdgeKind)> = self.edges().collect();
        edges.sort();

        let mut hasher = blake3::Hasher::new();
        for (id, kind) in nodes {
            hasher.update(id.as_bytes());
            hasher.update(b"\x1f");
            hasher.update(kind.as_str().as_bytes());
            hasher.update(b"\x1e");
        }
        hasher.update(b"\x1d");
        for (source, target, kind) in edges {
            hasher.update(source.as_bytes());
            hasher.update(b"\x1f");
            hasher.update(target.as_bytes());
            hasher.update(b"\x1f");
            hasher.update(kind.as_str().as_bytes());
            hasher.update(b"\x1e");
        }
        hasher.finalize().to_hex().to_string()
    }
}

/// Assembles scanner output into a [`CodeGraph`].
pub struct GraphBuilder;

impl GraphBuilder {
    /// Nodes are inserted first (first record per id wins). An edge whose
    /// target is unknown gets a module placeholder; an edge whose source is
    /// unknown is dropped.
    pub fn build(nodes: Vec<NodeRecord>, edges: Vec<EdgeRecord>) -> CodeGraph {
        let mut graph = CodeGraph::new();
        for node in nodes {
            graph.insert_node(node);
        }
        let mut placeholders = 0usize;
        let mut dropped = 0usize;
        for edge in edges {
            if !graph.contains(&edge.source) {
                dropped += 1;
                continue;
            }
            if !graph.contains(&edge.target) {
                graph.insert_node(NodeRecord::placeholder(&edge.target, NodeKind::Module));
                placeholders += 1;
            }
            graph.insert_edge(&edge.source, &edge.target, edge.kind);
        }
        debug!(
            nodes = graph.node_count(),
            edges = graph.edge_count(),
            placeholders,
            dropped,
            "graph built"
        );
        graph
    }
}
