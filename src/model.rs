use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Number of log entries a neuron keeps.
pub const LOG_TAIL_LEN: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeKind {
    File,
    Class,
    Function,
    /// External module or any reference the scan could not resolve.
    Module,
    /// Created by telemetry for an id the scan never produced.
    Dynamic,
}

impl NodeKind {
    pub fn as_str(self) -> &'static str {
        match self {
            NodeKind::File => "file",
            NodeKind::Class => "class",
            NodeKind::Function => "function",
            NodeKind::Module => "module",
            NodeKind::Dynamic => "dynamic",
        }
    }
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Structural relation, always pointing from the referencer to the referenced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum EdgeKind {
    #[serde(rename = "contains")]
    Contains,
    #[serde(rename = "inherits")]
    Inherits,
    #[serde(rename = "method")]
    MethodOf,
    #[serde(rename = "import")]
    Imports,
}

impl EdgeKind {
    pub fn as_str(self) -> &'static str {
        match self {
            EdgeKind::Contains => "contains",
            EdgeKind::Inherits => "inherits",
            EdgeKind::MethodOf => "method",
            EdgeKind::Imports => "import",
        }
    }
}

impl fmt::Display for EdgeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeRecord {
    pub id: String,
    pub kind: NodeKind,
    pub name: String,
    pub file_path: Option<String>,
}

impl NodeRecord {
    pub fn file(rel_path: &str, stem: &str) -> Self {
        Self {
            id: rel_path.to_string(),
            kind: NodeKind::File,
            name: stem.to_string(),
            file_path: Some(rel_path.to_string()),
        }
    }

    pub fn member(rel_path: &str, kind: NodeKind, name: &str) -> Self {
        Self {
            id: member_id(rel_path, name),
            kind,
            name: name.to_string(),
            file_path: Some(rel_path.to_string()),
        }
    }

    /// Placeholder for an id that only appears as an edge endpoint.
    pub fn placeholder(id: &str, kind: NodeKind) -> Self {
        Self {
            id: id.to_string(),
            kind,
            name: id.to_string(),
            file_path: None,
        }
    }
}

/// Id of a class or function declared in `rel_path`.
pub fn member_id(rel_path: &str, name: &str) -> String {
    format!("{rel_path}::{name}")
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EdgeRecord {
    pub source: String,
    pub target: String,
    pub kind: EdgeKind,
}

impl EdgeRecord {
    pub fn new(source: impl Into<String>, target: impl Into<String>, kind: EdgeKind) -> Self {
        Self {
            source: source.into(),
            target: target.into(),
            kind,
        }
    }
}

/// Telemetry overlay kept per node.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct NeuronState {
    #[serde(deserialize_with = "lenient_timestamp")]
    pub last_active: Option<DateTime<Utc>>,
    pub activation_level: f64,
    pub error_rate: f64,
    #[serde(deserialize_with = "lenient_variables")]
    pub active_variables: BTreeMap<String, String>,
    pub logs: Vec<String>,
}

impl NeuronState {
    pub fn push_log(&mut self, entry: String) {
        self.logs.push(entry);
        self.trim_logs();
    }

    /// Pull loaded values back inside their documented ranges.
    pub fn normalize(&mut self) {
        self.activation_level = clamp_unit(self.activation_level);
        self.error_rate = clamp_unit(self.error_rate);
        self.trim_logs();
    }

    fn trim_logs(&mut self) {
        if self.logs.len() > LOG_TAIL_LEN {
            let excess = self.logs.len() - LOG_TAIL_LEN;
            self.logs.drain(..excess);
        }
    }
}

fn clamp_unit(value: f64) -> f64 {
    if value.is_nan() { 0.0 } else { value.clamp(0.0, 1.0) }
}

/// Accepts RFC 3339 as well as zone-less ISO-8601 timestamps, which older
/// overlay files contain. Anything unparseable becomes `None`.
fn lenient_timestamp<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<String> = Option::deserialize(deserializer)?;
    Ok(raw.as_deref().and_then(parse_timestamp))
}

/// Older overlay files store raw JSON values; they are read back as text.
fn lenient_variables<'de, D>(deserializer: D) -> Result<BTreeMap<String, String>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<BTreeMap<String, serde_json::Value>> = Option::deserialize(deserializer)?;
    Ok(raw
        .unwrap_or_default()
        .iter()
        .map(|(key, value)| (key.clone(), value_text(value)))
        .collect())
}

/// Strings verbatim, everything else as compact JSON.
pub fn value_text(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}

pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(value) = DateTime::parse_from_rfc3339(raw) {
        return Some(value.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
        .ok()
        .map(|naive| naive.and_utc())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeMetrics {
    pub in_degree: usize,
    pub out_degree: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SnapshotNode {
    pub id: String,
    pub label: String,
    #[serde(rename = "type")]
    pub kind: NodeKind,
    pub state: NeuronState,
    pub metrics: NodeMetrics,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SnapshotLink {
    pub source: String,
    pub target: String,
    #[serde(rename = "type")]
    pub kind: EdgeKind,
}

/// Export contract consumed by visualizers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphSnapshot {
    pub timestamp: DateTime<Utc>,
    pub nodes: Vec<SnapshotNode>,
    pub links: Vec<SnapshotLink>,
    pub neuron_count: usize,
    pub synapse_count: usize,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanStats {
    pub files: usize,
    pub parsed: usize,
    pub failed: usize,
    pub skipped_large: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RebuildStats {
    pub root: String,
    pub scan: ScanStats,
    pub nodes: usize,
    pub edges: usize,
    pub restored: usize,
    pub fingerprint: String,
    pub duration_ms: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn log_tail_keeps_latest_entries() {
        let mut state = NeuronState::default();
        for i in 0..8 {
            state.push_log(format!("entry {i}"));
        }
        assert_eq!(state.logs.len(), LOG_TAIL_LEN);
        assert_eq!(state.logs.first().map(String::as_str), Some("entry 3"));
        assert_eq!(state.logs.last().map(String::as_str), Some("entry 7"));
    }

    #[test]
    fn normalize_clamps_levels() {
        let mut state = NeuronState {
            activation_level: 3.5,
            error_rate: -1.0,
            ..Default::default()
        };
        state.normalize();
        assert_eq!(state.activation_level, 1.0);
        assert_eq!(state.error_rate, 0.0);
    }

    #[test]
    fn parses_naive_and_rfc3339_timestamps() {
        assert!(parse_timestamp("2025-01-02T03:04:05.123456").is_some());
        assert!(parse_timestamp("2025-01-02T03:04:05").is_some());
        assert!(parse_timestamp("2025-01-02T03:04:05+02:00").is_some());
        assert!(parse_timestamp("yesterday").is_none());
    }

    #[test]
    fn edge_kind_wire_names() {
        let json = serde_json::to_string(&EdgeKind::MethodOf).unwrap();
        assert_eq!(json, "\"method\"");
        let kind: NodeKind = serde_json::from_str("\"dynamic\"").unwrap();
        assert_eq!(kind, NodeKind::Dynamic);
    }
}
