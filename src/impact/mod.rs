//! Impact analysis: answers "what breaks if I change this?" by walking the
//! structural graph backwards from the target.
//!
//! Every edge points from the referencer to the referenced, so dependents of
//! a node are its predecessors, and the ripple is the union of the
//! dependents' ancestors.

pub mod types;

pub use types::{ImpactPrediction, ImpactReport};

use crate::graph::CodeGraph;
use std::collections::BTreeSet;
use tracing::debug;

/// Maximum number of ripple ids reported.
pub const RIPPLE_LIMIT: usize = 20;

const DIRECT_WEIGHT: f64 = 10.0;
const RIPPLE_WEIGHT: f64 = 2.0;
const MAX_RISK: f64 = 100.0;

pub struct ImpactAnalyzer<'g> {
    graph: &'g CodeGraph,
}

impl<'g> ImpactAnalyzer<'g> {
    pub fn new(graph: &'g CodeGraph) -> Self {
        Self { graph }
    }

    /// Exact id first, then suffix match. An unresolved target yields an
    /// empty prediction rather than an error.
    pub fn resolve(&self, target: &str) -> Option<&'g str> {
        if let Some(node) = self.graph.node(target) {
            return Some(node.id.as_str());
        }
        self.graph.find_by_suffix(target)
    }

    pub fn analyze(&self, target: &str) -> ImpactPrediction {
        let Some(resolved) = self.resolve(target) else {
            debug!(node = target, "impact target not found");
            return ImpactPrediction::empty(target);
        };

        let direct = self.graph.predecessors(resolved);
        let mut ripple: BTreeSet<String> = BTreeSet::new();
        for dependent in &direct {
            ripple.extend(self.graph.ancestors(dependent));
        }
        for dependent in &direct {
            ripple.remove(dependent);
        }
        ripple.remove(resolved);

        let risk_score = risk_score(direct.len(), ripple.len());
        ImpactPrediction {
            target_node: resolved.to_string(),
            direct_impact: direct,
            ripple_effect: ripple.into_iter().take(RIPPLE_LIMIT).collect(),
            risk_score,
        }
    }
}

/// Weighted dependent count, capped at 100. Uses the full ripple count,
/// not the truncated list.
pub fn risk_score(direct: usize, ripple: usize) -> f64 {
    (direct as f64 * DIRECT_WEIGHT + ripple as f64 * RIPPLE_WEIGHT).min(MAX_RISK)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn risk_is_weighted_and_capped() {
        assert_eq!(risk_score(0, 0), 0.0);
        assert_eq!(risk_score(1, 0), 10.0);
        assert_eq!(risk_score(2, 3), 26.0);
        assert_eq!(risk_score(9, 30), 100.0);
    }

    #[test]
    fn empty_prediction_for_empty_graph() {
        let graph = CodeGraph::new();
        let prediction = ImpactAnalyzer::new(&graph).analyze("anything");
        assert_eq!(prediction, ImpactPrediction::empty("anything"));
        assert!(prediction.affected_nodes().is_empty());
    }
}
