use crate::error::ModuleError;
use crate::module::Module;
use crate::node::NodeId;
use crate::parameter::{Parameter, Scalar};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashSet;
use std::fs;
use std::path::Path;

/// Persisted form of a module: parameter values plus one opaque payload per
/// persistable child, keyed by attachment name. Tree shape is not recorded;
/// it is owned by code.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    #[serde(default)]
    pub parameters: Map<String, Value>,
    #[serde(default)]
    pub modules: Map<String, Value>,
}

pub(crate) fn save<M: Module + ?Sized>(module: &M, path: &Path) -> Result<(), ModuleError> {
    let node = module.node();

    let mut parameters = Map::new();
    for (name, parameter) in node.parameter_entries() {
        parameters.insert(name, parameter.value().to_json());
    }

    // A child attached under several names is emitted once, under its first
    // attachment name.
    let mut modules = Map::new();
    let mut seen: HashSet<NodeId> = HashSet::new();
    for (name, child) in node.child_entries() {
        if seen.insert(child.node().id()) {
            modules.insert(name, Value::Object(child.snapshot()));
        }
    }

    let snapshot = Snapshot {
        parameters,
        modules,
    };
    let raw = serde_json::to_string_pretty(&snapshot)
        .map_err(|err| ModuleError::SnapshotFormat(format!("encode snapshot failed: {err}")))?;
    fs::write(path, raw)
        .map_err(|err| ModuleError::SnapshotIo(format!("write snapshot failed: {err}")))
}

pub(crate) fn load<M: Module + ?Sized>(module: &M, path: &Path) -> Result<(), ModuleError> {
    let raw = fs::read_to_string(path)
        .map_err(|err| ModuleError::SnapshotIo(format!("read snapshot failed: {err}")))?;
    let snapshot: Snapshot = serde_json::from_str(&raw)
        .map_err(|err| ModuleError::SnapshotFormat(format!("decode snapshot failed: {err}")))?;

    let node = module.node();

    for (name, value) in &snapshot.parameters {
        let scalar = Scalar::from_json(value).ok_or_else(|| {
            ModuleError::SnapshotFormat(format!("parameter '{name}' is not a scalar value"))
        })?;
        node.attach_parameter(name.clone(), Parameter::new(scalar));
    }

    // Replace only currently attached children that have a non-empty saved
    // entry; everything else in the file is ignored.
    for (name, child) in node.child_entries() {
        let Some(Value::Object(payload)) = snapshot.modules.get(&name) else {
            continue;
        };
        if payload.is_empty() {
            continue;
        }
        let restored = child.restore(&Value::Object(payload.clone()))?;
        node.attach_child(name, restored)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn snapshot_defaults_missing_sections() {
        let snapshot: Snapshot = serde_json::from_value(json!({})).expect("empty doc is valid");
        assert!(snapshot.parameters.is_empty());
        assert!(snapshot.modules.is_empty());
    }

    #[test]
    fn snapshot_round_trips_non_ascii_text() {
        let snapshot = Snapshot {
            parameters: Map::from_iter([("greeting".to_string(), json!("안녕하세요"))]),
            modules: Map::new(),
        };
        let raw = serde_json::to_string_pretty(&snapshot).expect("encode should succeed");
        assert!(raw.contains("안녕하세요"));
        let decoded: Snapshot = serde_json::from_str(&raw).expect("decode should succeed");
        assert_eq!(decoded, snapshot);
    }
}
