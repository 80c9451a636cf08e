//! Explicit session: owns one [`ArchitectService`] per mounted root and
//! remembers which root calls without a root refer to.
//!
//! Every operation returns a [`Response`] envelope; failures carry a
//! readable message and never escape as raw errors.

use crate::architect::ArchitectService;
use crate::error::SessionError;
use crate::impact::ImpactReport;
use crate::scanner::{ScanOptions, SourceScanner};
use anyhow::Result;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::info;

/// `{success, payload, error}` result relayed unchanged by transports.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Response {
    pub success: bool,
    pub payload: Option<Value>,
    pub error: Option<String>,
}

impl Response {
    pub fn ok(payload: impl Serialize) -> Self {
        match serde_json::to_value(payload) {
            Ok(value) => Self {
                success: true,
                payload: Some(value),
                error: None,
            },
            Err(err) => Self::failure(format!("serialize payload: {err}")),
        }
    }

    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            success: false,
            payload: None,
            error: Some(message.into()),
        }
    }

    fn from_result(result: Result<Value>) -> Self {
        match result {
            Ok(value) => Self::ok(value),
            Err(err) => Self::failure(format!("{err:#}")),
        }
    }
}

pub struct Session {
    scan_options: ScanOptions,
    services: RwLock<HashMap<PathBuf, Arc<ArchitectService>>>,
    current: RwLock<Option<PathBuf>>,
}

impl Default for Session {
    fn default() -> Self {
        Self::new(ScanOptions::default())
    }
}

impl Session {
    pub fn new(scan_options: ScanOptions) -> Self {
        Self {
            scan_options,
            services: RwLock::new(HashMap::new()),
            current: RwLock::new(None),
        }
    }

    /// Root used when a call names none.
    pub fn current_root(&self) -> Option<PathBuf> {
        self.current.read().clone()
    }

    pub fn mounted_roots(&self) -> Vec<PathBuf> {
        let mut roots: Vec<PathBuf> = self.services.read().keys().cloned().collect();
        roots.sort();
        roots
    }

    /// Service for `root`, mounting it on first use, or for the current root
    /// when `root` is `None` or empty. Makes the resolved root current.
    pub fn service(&self, root: Option<&str>) -> Result<Arc<ArchitectService>> {
        match root.map(str::trim).filter(|r| !r.is_empty()) {
            Some(root) => Ok(self.mount_service(root)?.0),
            None => {
                let current = self.current_root().ok_or(SessionError::NotMounted)?;
                self.services
                    .read()
                    .get(&current)
                    .cloned()
                    .ok_or_else(|| SessionError::NotMounted.into())
            }
        }
    }

    /// Returns the service and whether this call created it.
    fn mount_service(&self, root: &str) -> Result<(Arc<ArchitectService>, bool)> {
        let root = canonical_root(Path::new(root))?;
        if let Some(existing) = self.services.read().get(&root).cloned() {
            *self.current.write() = Some(root);
            return Ok((existing, false));
        }

        let scanner = SourceScanner::python(self.scan_options.clone())?;
        let built = Arc::new(ArchitectService::with_scanner(root.clone(), scanner));
        let (service, created) = {
            let mut services = self.services.write();
            match services.get(&root) {
                // Another caller mounted the same root while we scanned.
                Some(existing) => (existing.clone(), false),
                None => {
                    services.insert(root.clone(), built.clone());
                    (built, true)
                }
            }
        };
        if created {
            info!(root = %root.display(), "project mounted");
        }
        *self.current.write() = Some(root);
        Ok((service, created))
    }

    pub fn mount(&self, root: &str) -> Response {
        Response::from_result(self.mount_service(root).and_then(|(service, _)| {
            Ok(serde_json::to_value(service.last_rebuild())?)
        }))
    }

    /// Full rescan of `root` (mounting it if needed). Overlay state is
    /// reloaded by id afterwards.
    pub fn refresh(&self, root: &str) -> Response {
        Response::from_result(self.mount_service(root).and_then(|(service, created)| {
            let stats = if created {
                service.last_rebuild()
            } else {
                Some(service.rebuild())
            };
            Ok(serde_json::to_value(stats)?)
        }))
    }

    pub fn ingest_telemetry(
        &self,
        node: &str,
        event_type: &str,
        payload: &Map<String, Value>,
        root: Option<&str>,
    ) -> Response {
        if node.trim().is_empty() {
            return Response::failure("a node id is required");
        }
        Response::from_result(self.service(root).map(|service| {
            service.ingest_telemetry(node, event_type, payload);
            json!({
                "node": node,
                "event_type": event_type,
                "state": service.state(node),
            })
        }))
    }

    pub fn analyze_impact(&self, node: &str, root: Option<&str>) -> Response {
        Response::from_result(self.service(root).and_then(|service| {
            let prediction = service.analyze_impact(node);
            Ok(serde_json::to_value(ImpactReport::from(&prediction))?)
        }))
    }

    pub fn snapshot(&self, root: Option<&str>) -> Response {
        Response::from_result(
            self.service(root)
                .and_then(|service| Ok(serde_json::to_value(service.snapshot())?)),
        )
    }
}

fn canonical_root(root: &Path) -> Result<PathBuf, SessionError> {
    if root.as_os_str().is_empty() {
        return Err(SessionError::EmptyRoot);
    }
    let canonical = std::fs::canonicalize(root).map_err(|source| SessionError::RootInaccessible {
        root: root.to_path_buf(),
        source,
    })?;
    if !canonical.is_dir() {
        return Err(SessionError::NotADirectory { root: canonical });
    }
    Ok(canonical)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn envelope_shapes() {
        let ok = serde_json::to_value(Response::ok(json!({"a": 1}))).unwrap();
        assert_eq!(ok, json!({"success": true, "payload": {"a": 1}, "error": null}));
        let failed = serde_json::to_value(Response::failure("boom")).unwrap();
        assert_eq!(
            failed,
            json!({"success": false, "payload": null, "error": "boom"})
        );
    }

    #[test]
    fn calls_without_mount_fail_softly() {
        let session = Session::default();
        let response = session.analyze_impact("a.py", None);
        assert!(!response.success);
        assert!(response.error.unwrap().contains("no project is mounted"));
    }

    #[test]
    fn missing_root_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("does-not-exist");
        let session = Session::default();
        let response = session.mount(missing.to_str().unwrap());
        assert!(!response.success);
        assert!(response.error.unwrap().contains("not accessible"));
    }

    #[test]
    fn same_root_is_mounted_once() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.py"), "x = 1\n").unwrap();
        let session = Session::default();
        let root = dir.path().to_str().unwrap();
        let first = session.service(Some(root)).unwrap();
        let second = session.service(Some(root)).unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(session.mounted_roots().len(), 1);
        let implicit = session.service(None).unwrap();
        assert!(Arc::ptr_eq(&first, &implicit));
    }
}
