//! Overlay persistence: the telemetry layer is written as one JSON document
//! and merged back by node id after every rebuild.
//!
//! Writes overwrite the file in place (no temp file + rename), so a crash
//! mid-write can leave a corrupt snapshot. A corrupt snapshot is treated as
//! empty on the next load.

use crate::config::{Config, OVERLAY_FILE_NAME};
use crate::error::PersistenceError;
use crate::model::NeuronState;
use crate::state::StateStore;
use crate::util;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use serde_json::Value;
use tracing::{debug, info, warn};

#[derive(Serialize)]
struct OverlayDocument<'a> {
    timestamp: DateTime<Utc>,
    states: BTreeMap<&'a str, &'a NeuronState>,
}

/// States are kept raw so one unreadable entry only costs that node.
#[derive(Deserialize)]
struct StoredOverlay {
    #[serde(default)]
    states: HashMap<String, Value>,
}

#[derive(Debug, Clone)]
pub struct OverlayStore {
    path: PathBuf,
}

impl OverlayStore {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    /// Store at the fixed location under the project's metadata directory.
    pub fn for_root(root: &Path) -> Self {
        Self::new(
            root.join(&Config::get().metadata_dir)
                .join(OVERLAY_FILE_NAME),
        )
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Overwrites the snapshot with every state in `states`.
    pub fn save(&self, states: &StateStore) -> Result<(), PersistenceError> {
        let document = OverlayDocument {
            timestamp: Utc::now(),
            states: states.iter().collect(),
        };
        let json = serde_json::to_string_pretty(&document).map_err(|source| {
            PersistenceError::Malformed {
                path: self.path.clone(),
                source,
            }
        })?;
        util::ensure_parent_dir(&self.path).map_err(|source| self.io_error(source))?;
        fs::write(&self.path, json).map_err(|source| self.io_error(source))?;
        debug!(path = %self.path.display(), neurons = states.len(), "overlay saved");
        Ok(())
    }

    /// Merges the snapshot into `states`. Only ids already present are
    /// updated; the rest of the file is dropped, as is any entry that does
    /// not read as a state. A missing file restores nothing. Returns how
    /// many states were restored.
    pub fn load_into(&self, states: &mut StateStore) -> Result<usize, PersistenceError> {
        let raw = match fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(0),
            Err(source) => return Err(self.io_error(source)),
        };
        let stored: StoredOverlay =
            serde_json::from_str(&raw).map_err(|source| PersistenceError::Malformed {
                path: self.path.clone(),
                source,
            })?;

        let total = stored.states.len();
        let mut restored = 0usize;
        for (id, raw_state) in stored.states {
            let Some(state) = states.get_mut(&id) else {
                continue;
            };
            match serde_json::from_value::<NeuronState>(raw_state) {
                Ok(mut loaded) => {
                    loaded.normalize();
                    *state = loaded;
                    restored += 1;
                }
                Err(err) => warn!(node = %id, error = %err, "skipping unreadable overlay entry"),
            }
        }
        info!(
            path = %self.path.display(),
            restored,
            dropped = total - restored,
            "overlay loaded"
        );
        Ok(restored)
    }

    fn io_error(&self, source: std::io::Error) -> PersistenceError {
        PersistenceError::Io {
            path: self.path.clone(),
            source,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::GraphBuilder;
    use crate::model::NodeRecord;

    fn store_with(ids: &[&str]) -> StateStore {
        let graph = GraphBuilder::build(
            ids.iter().map(|id| NodeRecord::file(id, id)).collect(),
            Vec::new(),
        );
        StateStore::for_graph(&graph)
    }

    #[test]
    fn missing_file_restores_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let overlay = OverlayStore::new(dir.path().join("nope.json"));
        let mut states = store_with(&["a.py"]);
        assert_eq!(overlay.load_into(&mut states).unwrap(), 0);
    }

    #[test]
    fn malformed_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("brain.json");
        fs::write(&path, "{ not json").unwrap();
        let overlay = OverlayStore::new(path);
        let mut states = store_with(&["a.py"]);
        let err = overlay.load_into(&mut states).unwrap_err();
        assert!(matches!(err, PersistenceError::Malformed { .. }));
        assert_eq!(states.get("a.py"), Some(&NeuronState::default()));
    }

    #[test]
    fn accepts_zone_less_timestamps_and_clamps() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("brain.json");
        fs::write(
            &path,
            r#"{
  "timestamp": "2025-03-01T10:00:00.000001",
  "states": {
    "a.py": {
      "last_active": "2025-03-01T09:59:59.123456",
      "activation_level": 1.7,
      "error_rate": 0.3,
      "active_variables": {"k": "v"},
      "logs": ["1", "2", "3", "4", "5", "6", "7"]
    },
    "gone.py": {"activation_level": 0.5}
  }
}"#,
        )
        .unwrap();
        let overlay = OverlayStore::new(path);
        let mut states = store_with(&["a.py"]);
        assert_eq!(overlay.load_into(&mut states).unwrap(), 1);
        let state = states.get("a.py").unwrap();
        assert!(state.last_active.is_some());
        assert_eq!(state.activation_level, 1.0);
        assert_eq!(state.logs, vec!["3", "4", "5", "6", "7"]);
        assert!(states.get("gone.py").is_none());
    }

    #[test]
    fn non_string_variables_load_as_text() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("brain.json");
        fs::write(
            &path,
            r#"{
  "timestamp": "2025-03-01T10:00:00",
  "states": {
    "a.py": {"activation_level": 0.6},
    "a.py::f": {"active_variables": {"retries": 3, "user": "ada", "opts": {"x": null}}}
  }
}"#,
        )
        .unwrap();
        let overlay = OverlayStore::new(path);
        let mut states = store_with(&["a.py", "a.py::f"]);
        assert_eq!(overlay.load_into(&mut states).unwrap(), 2);
        assert_eq!(states.get("a.py").unwrap().activation_level, 0.6);
        let vars = &states.get("a.py::f").unwrap().active_variables;
        assert_eq!(vars.get("retries").map(String::as_str), Some("3"));
        assert_eq!(vars.get("user").map(String::as_str), Some("ada"));
        assert_eq!(vars.get("opts").map(String::as_str), Some(r#"{"x":null}"#));
    }

    #[test]
    fn unreadable_entry_costs_only_that_node() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("brain.json");
        fs::write(
            &path,
            r#"{"states": {"a.py": {"activation_level": 0.4}, "b.py": {"logs": "not a list"}}}"#,
        )
        .unwrap();
        let overlay = OverlayStore::new(path);
        let mut states = store_with(&["a.py", "b.py"]);
        assert_eq!(overlay.load_into(&mut states).unwrap(), 1);
        assert_eq!(states.get("a.py").unwrap().activation_level, 0.4);
        assert_eq!(states.get("b.py"), Some(&NeuronState::default()));
    }
}
