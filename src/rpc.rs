use crate::error::SessionError;
use crate::scanner::ScanOptions;
use crate::session::{Response, Session};
use anyhow::{Context, Result};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};
use std::collections::HashMap;
use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{debug, warn};

#[derive(Deserialize)]
struct RpcRequest {
    #[serde(default)]
    id: Value,
    method: String,
    #[serde(default)]
    params: Value,
}

#[derive(Serialize)]
struct RpcResponse {
    id: Value,
    #[serde(flatten)]
    response: Response,
}

#[derive(Deserialize, schemars::JsonSchema)]
struct MountParams {
    /// Project root directory.
    #[serde(alias = "project", alias = "target_project", alias = "path")]
    root: String,
}

#[derive(Deserialize, schemars::JsonSchema)]
struct RefreshParams {
    /// Project root; defaults to the current project.
    #[serde(default, alias = "project", alias = "target_project", alias = "path")]
    root: Option<String>,
}

#[derive(Deserialize, schemars::JsonSchema)]
struct TelemetryParams {
    /// Node id; unknown ids become dynamic nodes.
    #[serde(alias = "node_id", alias = "target_node")]
    node: String,
    /// `execution`, `error`, `variable_update` or any other label.
    #[serde(alias = "event", alias = "type")]
    event_type: String,
    /// Event data: `message` for errors, key/values for variable updates.
    #[serde(default, alias = "metadata", alias = "data")]
    payload: Map<String, Value>,
    #[serde(default, alias = "project", alias = "target_project")]
    root: Option<String>,
}

#[derive(Deserialize, schemars::JsonSchema)]
struct ImpactParams {
    /// Node id, or a suffix of one.
    #[serde(alias = "target_node", alias = "target", alias = "node_id")]
    node: String,
    #[serde(default, alias = "project", alias = "target_project")]
    root: Option<String>,
}

#[derive(Deserialize, schemars::JsonSchema)]
struct SnapshotParams {
    #[serde(default, alias = "project", alias = "target_project")]
    root: Option<String>,
}

#[derive(Deserialize, Default, schemars::JsonSchema)]
struct ListMethodsParams {
    /// `names` for a bare list, anything else for details.
    format: Option<String>,
}

struct MethodDoc {
    name: &'static str,
    summary: &'static str,
    key_params: &'static [&'static str],
}

const METHOD_DOCS: &[MethodDoc] = &[
    MethodDoc {
        name: "mount",
        summary: "Scan a project root, build its graph and restore the persisted overlay. Makes it the current project.",
        key_params: &["root"],
    },
    MethodDoc {
        name: "refresh",
        summary: "Rescan a mounted project in place; overlay state survives for ids still present.",
        key_params: &["root"],
    },
    MethodDoc {
        name: "ingest_telemetry",
        summary: "Apply one runtime event to a node and persist the overlay.",
        key_params: &["node", "event_type", "payload", "root"],
    },
    MethodDoc {
        name: "analyze_impact",
        summary: "Direct dependents, transitive ripple and a 0-100 risk score for changing a node.",
        key_params: &["node", "root"],
    },
    MethodDoc {
        name: "snapshot",
        summary: "Every node with its state and degrees, every edge, and totals.",
        key_params: &["root"],
    },
    MethodDoc {
        name: "list_methods",
        summary: "Method names, summaries and parameter schemas.",
        key_params: &["format"],
    },
    MethodDoc {
        name: "help",
        summary: "Overview and example requests.",
        key_params: &[],
    },
];

const METHOD_ALIASES: &[(&str, &str)] = &[
    ("send_telemetry", "ingest_telemetry"),
    ("get_snapshot", "snapshot"),
];

fn schema_value<T: schemars::JsonSchema>() -> Value {
    let schema = schemars::schema_for!(T);
    let mut raw = serde_json::to_value(schema).unwrap_or_else(|_| json!({"type": "object"}));
    if let Some(obj) = raw.as_object_mut() {
        obj.remove("$schema");
        obj.remove("title");
        obj.remove("definitions");
    }
    raw
}

/// Simplified JSON Schema for the params of `method`.
pub fn method_param_schema(method: &str) -> Value {
    match canonical_method(method) {
        "mount" => schema_value::<MountParams>(),
        "refresh" => schema_value::<RefreshParams>(),
        "ingest_telemetry" => schema_value::<TelemetryParams>(),
        "analyze_impact" => schema_value::<ImpactParams>(),
        "snapshot" => schema_value::<SnapshotParams>(),
        "list_methods" => schema_value::<ListMethodsParams>(),
        _ => json!({"type": "object"}),
    }
}

fn canonical_method(method: &str) -> &str {
    METHOD_ALIASES
        .iter()
        .find(|(alias, _)| *alias == method)
        .map(|(_, target)| *target)
        .unwrap_or(method)
}

fn method_names() -> Vec<&'static str> {
    METHOD_DOCS.iter().map(|doc| doc.name).collect()
}

fn method_docs_json() -> Vec<Value> {
    let mut aliases: HashMap<&str, Vec<&str>> = HashMap::new();
    for (alias, target) in METHOD_ALIASES {
        aliases.entry(*target).or_default().push(*alias);
    }
    METHOD_DOCS
        .iter()
        .map(|doc| {
            let mut entry = Map::new();
            entry.insert("name".to_string(), json!(doc.name));
            entry.insert("summary".to_string(), json!(doc.summary));
            if !doc.key_params.is_empty() {
                entry.insert("key_params".to_string(), json!(doc.key_params));
            }
            if let Some(names) = aliases.get(doc.name) {
                entry.insert("aliases".to_string(), json!(names));
            }
            entry.insert("params".to_string(), method_param_schema(doc.name));
            Value::Object(entry)
        })
        .collect()
}

fn method_list(params: ListMethodsParams) -> Value {
    let format = params
        .format
        .as_deref()
        .unwrap_or("details")
        .trim()
        .to_ascii_lowercase();
    if format == "names" || format == "name" || format == "list" {
        return json!(method_names());
    }
    let aliases: Map<String, Value> = METHOD_ALIASES
        .iter()
        .map(|(alias, target)| (alias.to_string(), json!(target)))
        .collect();
    json!({
        "methods": method_docs_json(),
        "aliases": aliases,
        "names": method_names(),
    })
}

fn method_help() -> Value {
    json!({
        "summary": "neuromap builds a structural graph of a Python project, overlays runtime telemetry on it and predicts the impact of changes.",
        "start_here": "mount a root first; later calls without a root use the current project.",
        "envelope": "every call returns {success, payload, error}",
        "methods": method_docs_json(),
        "examples": [
            r#"neuromap request --method mount --params '{"root":"."}'"#,
            r#"neuromap request --root . --method analyze_impact --params '{"node":"app/models.py::User"}'"#,
            r#"neuromap request --root . --method ingest_telemetry --params '{"node":"app/api.py::handler","event_type":"error","payload":{"message":"timeout"}}'"#,
            "neuromap impact --root . --node requests",
            "neuromap snapshot --root .",
            "neuromap serve --root .",
        ]
    })
}

/// Params of `null` are read as an empty object.
fn parse_params<T: DeserializeOwned>(params: Value) -> Result<T> {
    let params = if params.is_null() {
        Value::Object(Map::new())
    } else {
        params
    };
    serde_json::from_value(params).with_context(|| "invalid params")
}

fn current_root_display(session: &Session) -> Option<String> {
    session
        .current_root()
        .map(|root| root.display().to_string())
}

/// Runs one method against `session`. Never fails: every error is folded
/// into the envelope.
pub fn handle_method(session: &Session, method: &str, params: Value) -> Response {
    let start = Instant::now();
    let response = dispatch(session, canonical_method(method), params)
        .unwrap_or_else(|err| Response::failure(format!("{err:#}")));
    debug!(
        method,
        success = response.success,
        elapsed_ms = start.elapsed().as_millis() as u64,
        "rpc call"
    );
    response
}

fn dispatch(session: &Session, method: &str, params: Value) -> Result<Response> {
    let response = match method {
        "help" => Response::ok(method_help()),
        "list_methods" => Response::ok(method_list(parse_params(params)?)),
        "mount" => {
            let params: MountParams = parse_params(params)?;
            session.mount(&params.root)
        }
        "refresh" => {
            let params: RefreshParams = parse_params(params)?;
            match params.root.or_else(|| current_root_display(session)) {
                Some(root) => session.refresh(&root),
                None => Response::failure(SessionError::NotMounted.to_string()),
            }
        }
        "ingest_telemetry" => {
            let params: TelemetryParams = parse_params(params)?;
            session.ingest_telemetry(
                &params.node,
                &params.event_type,
                &params.payload,
                params.root.as_deref(),
            )
        }
        "analyze_impact" => {
            let params: ImpactParams = parse_params(params)?;
            session.analyze_impact(&params.node, params.root.as_deref())
        }
        "snapshot" => {
            let params: SnapshotParams = parse_params(params)?;
            session.snapshot(params.root.as_deref())
        }
        other => Response::failure(format!(
            "unknown method: {other} (try list_methods)"
        )),
    };
    Ok(response)
}

fn needs_project(method: &str) -> bool {
    !matches!(canonical_method(method), "help" | "list_methods")
}

fn mount_default(session: &Session, root: &Path) -> Response {
    session.mount(&root.to_string_lossy())
}

/// JSON-lines loop over stdin/stdout against one session.
pub fn serve(default_root: Option<PathBuf>, scan_options: ScanOptions) -> Result<()> {
    let session = Session::new(scan_options);
    if let Some(root) = &default_root {
        let mounted = mount_default(&session, root);
        if let Some(error) = mounted.error {
            warn!(root = %root.display(), error = %error, "default root not mounted");
        }
    }
    let stdin = io::stdin();
    let mut stdout = io::stdout();

    for line in stdin.lock().lines() {
        let line = match line {
            Ok(value) => value,
            Err(err) => {
                warn!(error = %err, "stdin error");
                break;
            }
        };
        if line.trim().is_empty() {
            continue;
        }

        let reply = match serde_json::from_str::<RpcRequest>(&line) {
            Ok(request) => RpcResponse {
                id: request.id,
                response: handle_method(&session, &request.method, request.params),
            },
            Err(err) => RpcResponse {
                id: Value::Null,
                response: Response::failure(format!("invalid request: {err}")),
            },
        };

        writeln!(stdout, "{}", serde_json::to_string(&reply)?)?;
        stdout.flush()?;
    }

    Ok(())
}

/// One request against a fresh session, mounting `root` first when the
/// method needs a project.
pub fn call(
    root: Option<PathBuf>,
    scan_options: ScanOptions,
    method: String,
    params_raw: &str,
    id_raw: &str,
) -> Result<String> {
    let params: Value = serde_json::from_str(params_raw).with_context(|| "parse params JSON")?;
    let id = parse_value(id_raw);
    let session = Session::new(scan_options);
    let response = match root {
        Some(root) if needs_project(&method) => {
            let mounted = mount_default(&session, &root);
            if mounted.success {
                handle_method(&session, &method, params)
            } else {
                mounted
            }
        }
        _ => handle_method(&session, &method, params),
    };
    Ok(serde_json::to_string(&RpcResponse { id, response })?)
}

fn parse_value(raw: &str) -> Value {
    serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn aliases_resolve_to_canonical_methods() {
        assert_eq!(canonical_method("send_telemetry"), "ingest_telemetry");
        assert_eq!(canonical_method("get_snapshot"), "snapshot");
        assert_eq!(canonical_method("mount"), "mount");
    }

    #[test]
    fn unknown_method_fails_in_envelope() {
        let session = Session::default();
        let response = handle_method(&session, "explode", Value::Null);
        assert!(!response.success);
        assert!(response.error.unwrap().contains("unknown method"));
    }

    #[test]
    fn missing_required_param_is_reported() {
        let session = Session::default();
        let response = handle_method(&session, "analyze_impact", json!({}));
        assert!(!response.success);
        assert!(response.error.unwrap().contains("invalid params"));
    }

    #[test]
    fn list_methods_carries_schemas() {
        let session = Session::default();
        let response = handle_method(&session, "list_methods", Value::Null);
        let payload = response.payload.unwrap();
        let methods = payload["methods"].as_array().unwrap();
        let ingest = methods
            .iter()
            .find(|m| m["name"] == "ingest_telemetry")
            .unwrap();
        assert!(ingest["params"]["properties"]["node"].is_object());
        assert_eq!(payload["aliases"]["get_snapshot"], "snapshot");

        let names = handle_method(&session, "list_methods", json!({"format": "names"}));
        assert_eq!(names.payload.unwrap().as_array().unwrap().len(), METHOD_DOCS.len());
    }

    #[test]
    fn refresh_without_project_is_not_mounted() {
        let session = Session::default();
        let response = handle_method(&session, "refresh", json!({}));
        assert_eq!(
            response.error.as_deref(),
            Some("no project is mounted; pass a root path")
        );
    }

    #[test]
    fn call_wraps_the_envelope_with_id() {
        let raw = call(None, ScanOptions::default(), "help".to_string(), "{}", "7").unwrap();
        let value: Value = serde_json::from_str(&raw).unwrap();
        assert_eq!(value["id"], 7);
        assert_eq!(value["success"], true);
        assert!(value["error"].is_null());
    }
}
