//! v1.0 → v1.1
//!
//! v1.1 standardised several `cwltool:` extensions and changed two defaults:
//! network access became opt-in and directory listings became shallow.
//! Documents keep their v1.0 behavior by gaining explicit hints.

use crate::hop::{Hop, ReapplyPolicy, V1_0, V1_1};
use cwl_document::{Map, Value};

/// Extensions promoted to standard classes, as `(extension, standard)`
const PROMOTED: [(&str, &str); 5] = [
    ("LoadListingRequirement", "LoadListingRequirement"),
    ("InplaceUpdateRequirement", "InplaceUpdateRequirement"),
    ("TimeLimit", "ToolTimeLimit"),
    ("WorkReuse", "WorkReuse"),
    ("NetworkAccess", "NetworkAccess"),
];

/// Namespace prefixes of the extensions
const EXTENSION_PREFIXES: [&str; 2] = ["cwltool:", "http://commonwl.org/cwltool#"];

/// v1.0 → v1.1 upgrade
#[derive(Debug, Clone, Copy)]
pub struct UpgradeV1_0;

impl Hop for UpgradeV1_0 {
    type From = V1_0;
    type To = V1_1;
    const POLICY: ReapplyPolicy = ReapplyPolicy::Reject;

    fn upgrade_process(process: Value) -> Value {
        let Value::Object(mut process) = process else {
            return process;
        };

        promote_extensions(&mut process);

        let is_tool = process.get("class").and_then(Value::as_str) == Some("CommandLineTool");
        if is_tool && !declares(&process, "NetworkAccess") {
            let mut hint = Map::new();
            hint.insert("networkAccess".to_string(), Value::Bool(true));
            add_hint(&mut process, "NetworkAccess", hint);
        }
        if has_directory_parameter(&process) && !declares(&process, "LoadListingRequirement") {
            let mut hint = Map::new();
            hint.insert("loadListing".to_string(), Value::String("deep_listing".to_string()));
            add_hint(&mut process, "LoadListingRequirement", hint);
        }

        for field in ["inputs", "outputs"] {
            for param in entries_mut(&mut process, field) {
                upgrade_secondary_files(param);
            }
        }

        for step in entries_mut(&mut process, "steps") {
            let Some(step) = step.as_object_mut() else { continue };
            promote_extensions(step);
            if let Some(run) = step.get_mut("run").filter(|run| run.is_object()) {
                *run = Self::upgrade_process(run.take());
            }
        }

        Value::Object(process)
    }
}

/// Values of a list or id-map field
fn entries_mut<'a>(object: &'a mut Map<String, Value>, field: &str) -> Box<dyn Iterator<Item = &'a mut Value> + 'a> {
    match object.get_mut(field) {
        Some(Value::Array(items)) => Box::new(items.iter_mut()),
        Some(Value::Object(map)) => Box::new(map.values_mut()),
        _ => Box::new(std::iter::empty()),
    }
}

fn standard_name(class: &str) -> Option<&'static str> {
    let local = EXTENSION_PREFIXES
        .iter()
        .find_map(|prefix| class.strip_prefix(prefix))?;
    PROMOTED
        .iter()
        .find(|(extension, _)| *extension == local)
        .map(|(_, standard)| *standard)
}

/// Rename extension classes in `requirements` and `hints`
fn promote_extensions(object: &mut Map<String, Value>) {
    for field in ["requirements", "hints"] {
        match object.get_mut(field) {
            Some(Value::Array(items)) => {
                for item in items {
                    let renamed = item.get("class").and_then(Value::as_str).and_then(standard_name);
                    if let (Some(standard), Some(item)) = (renamed, item.as_object_mut()) {
                        item.insert("class".to_string(), Value::String(standard.to_string()));
                    }
                }
            }
            Some(Value::Object(map)) => {
                let renamed: Map<String, Value> = std::mem::take(map)
                    .into_iter()
                    .map(|(class, body)| match standard_name(&class) {
                        Some(standard) => (standard.to_string(), body),
                        None => (class, body),
                    })
                    .collect();
                *map = renamed;
            }
            _ => {}
        }
    }
}

/// Whether `class` appears in `requirements` or `hints`
fn declares(object: &Map<String, Value>, class: &str) -> bool {
    ["requirements", "hints"].iter().any(|field| match object.get(*field) {
        Some(Value::Array(items)) => items
            .iter()
            .any(|item| item.get("class").and_then(Value::as_str) == Some(class)),
        Some(Value::Object(map)) => map.contains_key(class),
        _ => false,
    })
}

fn add_hint(object: &mut Map<String, Value>, class: &str, body: Map<String, Value>) {
    if let Some(Value::Object(map)) = object.get_mut("hints") {
        map.insert(class.to_string(), Value::Object(body));
        return;
    }
    let mut hint = Map::new();
    hint.insert("class".to_string(), Value::String(class.to_string()));
    hint.extend(body);
    match object.get_mut("hints") {
        Some(Value::Array(items)) => items.push(Value::Object(hint)),
        _ => {
            object.insert("hints".to_string(), Value::Array(vec![Value::Object(hint)]));
        }
    }
}

fn has_directory_parameter(process: &Map<String, Value>) -> bool {
    ["inputs", "outputs"].iter().any(|field| match process.get(*field) {
        Some(Value::Array(items)) => items.iter().any(|p| mentions_directory(p.get("type").unwrap_or(p))),
        Some(Value::Object(map)) => map.values().any(|p| mentions_directory(p.get("type").unwrap_or(p))),
        _ => false,
    })
}

fn mentions_directory(ty: &Value) -> bool {
    match ty {
        Value::String(name) => name.trim_end_matches('?').trim_end_matches("[]") == "Directory",
        Value::Array(members) => members.iter().any(mentions_directory),
        Value::Object(obj) => {
            obj.get("items").is_some_and(mentions_directory)
                || obj.get("type").is_some_and(|t| !t.is_string() && mentions_directory(t))
                || obj
                    .get("fields")
                    .and_then(Value::as_array)
                    .is_some_and(|fields| fields.iter().any(|f| f.get("type").is_some_and(mentions_directory)))
        }
        _ => false,
    }
}

/// `secondaryFiles: ".bai"` → `secondaryFiles: [{pattern: ".bai"}]`
fn upgrade_secondary_files(param: &mut Value) {
    let Some(secondary) = param.get_mut("secondaryFiles") else {
        return;
    };
    let entries = match secondary.take() {
        Value::Array(items) => items,
        other => vec![other],
    };
    *secondary = Value::Array(
        entries
            .into_iter()
            .map(|entry| match entry {
                Value::String(pattern) => {
                    let mut record = Map::new();
                    record.insert("pattern".to_string(), Value::String(pattern));
                    Value::Object(record)
                }
                other => other,
            })
            .collect(),
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn upgrade(process: Value) -> Value {
        UpgradeV1_0::upgrade_process(process)
    }

    #[test]
    fn tool_gains_network_access() {
        let tool = upgrade(json!({"id": "t", "class": "CommandLineTool", "inputs": [], "outputs": []}));
        assert_eq!(
            tool["hints"],
            json!([{"class": "NetworkAccess", "networkAccess": true}])
        );
    }

    #[test]
    fn explicit_network_access_is_kept() {
        let tool = upgrade(json!({
            "id": "t",
            "class": "CommandLineTool",
            "inputs": [],
            "outputs": [],
            "requirements": [{"class": "cwltool:NetworkAccess", "networkAccess": false}]
        }));
        assert_eq!(
            tool["requirements"],
            json!([{"class": "NetworkAccess", "networkAccess": false}])
        );
        assert!(tool.get("hints").is_none());
    }

    #[test]
    fn extensions_are_promoted() {
        let tool = upgrade(json!({
            "id": "t",
            "class": "ExpressionTool",
            "inputs": [],
            "outputs": [],
            "expression": "$({})",
            "hints": {
                "cwltool:TimeLimit": {"timelimit": 30},
                "http://commonwl.org/cwltool#WorkReuse": {"enableReuse": false},
                "cwltool:Unknown": {}
            }
        }));
        let hints: Vec<&String> = tool["hints"].as_object().unwrap().keys().collect();
        assert_eq!(hints, vec!["ToolTimeLimit", "WorkReuse", "cwltool:Unknown"]);
    }

    #[test]
    fn directory_parameters_keep_deep_listing() {
        let tool = upgrade(json!({
            "id": "t",
            "class": "ExpressionTool",
            "inputs": [{"id": "d", "type": "Directory[]"}],
            "outputs": [],
            "expression": "$({})"
        }));
        assert_eq!(
            tool["hints"],
            json!([{"class": "LoadListingRequirement", "loadListing": "deep_listing"}])
        );

        let plain = upgrade(json!({"id": "e", "class": "Operation", "inputs": [{"id": "f", "type": "File"}], "outputs": []}));
        assert!(plain.get("hints").is_none());
    }

    #[test]
    fn secondary_files_become_patterns() {
        let tool = upgrade(json!({
            "id": "t",
            "class": "Operation",
            "inputs": [
                {"id": "bam", "type": "File", "secondaryFiles": ".bai"},
                {"id": "ref", "type": "File", "secondaryFiles": [".fai", {"pattern": ".dict"}]}
            ],
            "outputs": []
        }));
        assert_eq!(tool["inputs"][0]["secondaryFiles"], json!([{"pattern": ".bai"}]));
        assert_eq!(
            tool["inputs"][1]["secondaryFiles"],
            json!([{"pattern": ".fai"}, {"pattern": ".dict"}])
        );
    }

    #[test]
    fn inline_runs_and_steps_are_upgraded() {
        let wf = upgrade(json!({
            "id": "wf",
            "class": "Workflow",
            "inputs": [],
            "outputs": [],
            "steps": [{
                "id": "s",
                "requirements": [{"class": "cwltool:LoadListingRequirement", "loadListing": "no_listing"}],
                "run": {"class": "CommandLineTool", "inputs": [], "outputs": []},
                "in": [],
                "out": []
            }]
        }));
        let step = &wf["steps"][0];
        assert_eq!(step["requirements"][0]["class"], "LoadListingRequirement");
        assert_eq!(step["run"]["hints"][0]["class"], "NetworkAccess");
        assert!(wf.get("hints").is_none());
    }
}
