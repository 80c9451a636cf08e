//! Telemetry overlay: one [`NeuronState`] per graph node, mutated by events
//! independently of how the graph was built.

use crate::graph::CodeGraph;
use crate::model::{NeuronState, NodeKind, NodeRecord, value_text};
use chrono::Utc;
use serde_json::{Map, Value};
use std::collections::HashMap;
use tracing::debug;

const ACTIVATION_STEP: f64 = 0.2;
const ERROR_STEP: f64 = 0.1;

#[derive(Debug, Clone, PartialEq)]
pub enum TelemetryEvent {
    Execution,
    Error,
    VariableUpdate,
    /// Only refreshes `last_active`.
    Other(String),
}

impl TelemetryEvent {
    pub fn parse(raw: &str) -> Self {
        match raw {
            "execution" => TelemetryEvent::Execution,
            "error" => TelemetryEvent::Error,
            "variable_update" => TelemetryEvent::VariableUpdate,
            other => TelemetryEvent::Other(other.to_string()),
        }
    }
}

#[derive(Debug, Default)]
pub struct StateStore {
    states: HashMap<String, NeuronState>,
}

impl StateStore {
    /// Fresh state for every node of `graph`.
    pub fn for_graph(graph: &CodeGraph) -> Self {
        let states = graph
            .nodes()
            .map(|node| (node.id.clone(), NeuronState::default()))
            .collect();
        Self { states }
    }

    pub fn get(&self, id: &str) -> Option<&NeuronState> {
        self.states.get(id)
    }

    pub fn get_mut(&mut self, id: &str) -> Option<&mut NeuronState> {
        self.states.get_mut(id)
    }

    pub fn len(&self) -> usize {
        self.states.len()
    }

    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &NeuronState)> {
        self.states.iter().map(|(id, state)| (id.as_str(), state))
    }

    /// Applies one event to `node_id`, creating a dynamic node (and its
    /// state) when the id is new.
    pub fn ingest(
        &mut self,
        graph: &mut CodeGraph,
        node_id: &str,
        event: &TelemetryEvent,
        payload: &Map<String, Value>,
    ) -> &NeuronState {
        if !graph.contains(node_id) {
            debug!(node = node_id, "creating dynamic node");
            graph.insert_node(NodeRecord::placeholder(node_id, NodeKind::Dynamic));
        }
        let state = self.states.entry(node_id.to_string()).or_default();
        state.last_active = Some(Utc::now());

        match event {
            TelemetryEvent::Execution => {
                state.activation_level = (state.activation_level + ACTIVATION_STEP).min(1.0);
            }
            TelemetryEvent::Error => {
                state.error_rate = (state.error_rate + ERROR_STEP).min(1.0);
                let message = payload
                    .get("message")
                    .filter(|message| !message.is_null())
                    .map(value_text)
                    .unwrap_or_else(|| "Unknown".to_string());
                state.push_log(format!("ERROR: {message}"));
            }
            TelemetryEvent::VariableUpdate => {
                for (key, value) in payload {
                    state.active_variables.insert(key.clone(), value_text(value));
                }
            }
            TelemetryEvent::Other(kind) => {
                debug!(node = node_id, event = %kind, "unknown telemetry event");
            }
        }
        state
    }
}
