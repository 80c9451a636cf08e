//! One mounted project: scan → build → fresh overlay → persisted overlay,
//! plus the operations callers run against it.
//!
//! Each public operation runs inside a single exclusive region over the
//! combined graph and state map, so readers never observe a half-applied
//! event or a half-rebuilt graph.

use crate::graph::{CodeGraph, GraphBuilder};
use crate::impact::{ImpactAnalyzer, ImpactPrediction};
use crate::model::{
    GraphSnapshot, NeuronState, NodeMetrics, RebuildStats, SnapshotLink, SnapshotNode,
};
use crate::persist::OverlayStore;
use crate::scanner::{ScanOptions, SourceScanner};
use crate::state::{StateStore, TelemetryEvent};
use anyhow::Result;
use chrono::Utc;
use parking_lot::Mutex;
use serde_json::{Map, Value};
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{info, warn};

/// Graph and overlay, always replaced or mutated together.
struct Brain {
    graph: CodeGraph,
    states: StateStore,
}

pub struct ArchitectService {
    root: PathBuf,
    overlay: OverlayStore,
    scanner: Mutex<SourceScanner>,
    brain: Mutex<Brain>,
    last_rebuild: Mutex<Option<RebuildStats>>,
}

impl ArchitectService {
    /// Scans `root` (assumed to exist) with the Python dialect and loads the
    /// persisted overlay.
    pub fn new(root: PathBuf) -> Result<Self> {
        Ok(Self::with_scanner(
            root,
            SourceScanner::python(ScanOptions::default())?,
        ))
    }

    pub fn with_scanner(root: PathBuf, scanner: SourceScanner) -> Self {
        let overlay = OverlayStore::for_root(&root);
        Self::with_overlay(root, scanner, overlay)
    }

    pub fn with_overlay(root: PathBuf, scanner: SourceScanner, overlay: OverlayStore) -> Self {
        let service = Self {
            root,
            overlay,
            scanner: Mutex::new(scanner),
            brain: Mutex::new(Brain {
                graph: CodeGraph::new(),
                states: StateStore::default(),
            }),
            last_rebuild: Mutex::new(None),
        };
        service.rebuild();
        service
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn overlay_path(&self) -> &Path {
        self.overlay.path()
    }

    /// Full rescan. The previous graph is discarded; overlay state survives
    /// only for ids present in the new graph. Concurrent ingestion waits for
    /// the swap and is never applied to the discarded graph.
    pub fn rebuild(&self) -> RebuildStats {
        let started = Instant::now();
        let mut scanner = self.scanner.lock();
        let dialect = scanner.dialect_name();
        let scan = scanner.scan(&self.root);
        let scan_stats = scan.stats;
        let (nodes, edges) = scan.into_parts();
        let graph = GraphBuilder::build(nodes, edges);
        let fingerprint = graph.fingerprint();

        let mut brain = self.brain.lock();
        brain.states = StateStore::for_graph(&graph);
        brain.graph = graph;
        let restored = match self.overlay.load_into(&mut brain.states) {
            Ok(count) => count,
            Err(err) => {
                warn!(error = %err, "ignoring persisted overlay");
                0
            }
        };

        let stats = RebuildStats {
            root: self.root.display().to_string(),
            scan: scan_stats,
            nodes: brain.graph.node_count(),
            edges: brain.graph.edge_count(),
            restored,
            fingerprint,
            duration_ms: started.elapsed().as_millis() as u64,
        };
        drop(brain);
        drop(scanner);

        info!(
            root = %stats.root,
            dialect,
            files = stats.scan.files,
            failed = stats.scan.failed,
            nodes = stats.nodes,
            edges = stats.edges,
            restored = stats.restored,
            "graph rebuilt"
        );
        *self.last_rebuild.lock() = Some(stats.clone());
        stats
    }

    pub fn last_rebuild(&self) -> Option<RebuildStats> {
        self.last_rebuild.lock().clone()
    }

    /// Applies one telemetry event and persists the whole overlay. A failed
    /// save is logged; the in-memory state keeps the event.
    pub fn ingest_telemetry(&self, node_id: &str, event_type: &str, payload: &Map<String, Value>) {
        let event = TelemetryEvent::parse(event_type);
        let mut brain = self.brain.lock();
        let Brain { graph, states } = &mut *brain;
        states.ingest(graph, node_id, &event, payload);
        if let Err(err) = self.overlay.save(states) {
            warn!(error = %err, "overlay save failed");
        }
    }

    pub fn analyze_impact(&self, target: &str) -> ImpactPrediction {
        let brain = self.brain.lock();
        ImpactAnalyzer::new(&brain.graph).analyze(target)
    }

    pub fn snapshot(&self) -> GraphSnapshot {
        let brain = self.brain.lock();
        let nodes: Vec<SnapshotNode> = brain
            .graph
            .nodes()
            .map(|node| SnapshotNode {
                id: node.id.clone(),
                label: node.name.clone(),
                kind: node.kind,
                state: brain.states.get(&node.id).cloned().unwrap_or_default(),
                metrics: NodeMetrics {
                    in_degree: brain.graph.in_degree(&node.id),
                    out_degree: brain.graph.out_degree(&node.id),
                },
            })
            .collect();
        let links: Vec<SnapshotLink> = brain
            .graph
            .edges()
            .map(|(source, target, kind)| SnapshotLink {
                source: source.to_string(),
                target: target.to_string(),
                kind,
            })
            .collect();
        GraphSnapshot {
            timestamp: Utc::now(),
            neuron_count: nodes.len(),
            synapse_count: links.len(),
            nodes,
            links,
        }
    }

    pub fn node_count(&self) -> usize {
        self.brain.lock().graph.node_count()
    }

    pub fn state_count(&self) -> usize {
        self.brain.lock().states.len()
    }

    /// Runs `f` against the current graph inside the exclusive region.
    pub fn with_graph<T>(&self, f: impl FnOnce(&CodeGraph) -> T) -> T {
        let brain = self.brain.lock();
        f(&brain.graph)
    }

    /// State of one node, cloned out of the exclusive region.
    pub fn state(&self, node_id: &str) -> Option<NeuronState> {
        self.brain.lock().states.get(node_id).cloned()
    }
}
