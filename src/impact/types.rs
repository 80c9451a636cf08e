//! Type definitions for impact analysis

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Predicted blast radius of changing one node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImpactPrediction {
    /// Resolved id of the analyzed node (the requested id when unresolved).
    pub target_node: String,
    /// Nodes holding an edge into the target, sorted.
    pub direct_impact: Vec<String>,
    /// Transitive dependents beyond the direct ones, sorted, at most
    /// [`RIPPLE_LIMIT`](super::RIPPLE_LIMIT) entries.
    pub ripple_effect: Vec<String>,
    /// 0..=100, monotonic in the number of dependents.
    pub risk_score: f64,
}

impl ImpactPrediction {
    /// Result for a target that resolved to nothing.
    pub fn empty(target: &str) -> Self {
        Self {
            target_node: target.to_string(),
            direct_impact: Vec::new(),
            ripple_effect: Vec::new(),
            risk_score: 0.0,
        }
    }

    /// Sorted union of direct and ripple ids.
    pub fn affected_nodes(&self) -> Vec<String> {
        let all: BTreeSet<&String> = self
            .direct_impact
            .iter()
            .chain(self.ripple_effect.iter())
            .collect();
        all.into_iter().cloned().collect()
    }
}

/// Wire form, with the derived `affected_nodes` list.
#[derive(Debug, Serialize)]
pub struct ImpactReport<'a> {
    #[serde(flatten)]
    pub prediction: &'a ImpactPrediction,
    pub affected_nodes: Vec<String>,
}

impl<'a> From<&'a ImpactPrediction> for ImpactReport<'a> {
    fn from(prediction: &'a ImpactPrediction) -> Self {
        Self {
            affected_nodes: prediction.affected_nodes(),
            prediction,
        }
    }
}
