//! Shape normalization of process trees
//!
//! After normalization every id-map field is in list form and every
//! identifier (parameter, step, step port, record field, enum symbol) is a
//! short name.

use cwl_document::idmap::{class_of, expand_field};
use cwl_document::{shortname, IdMapError, Map, Value};

/// Normalize one process tree in place
pub(crate) fn normalize_process(process: &mut Map<String, Value>) -> Result<(), IdMapError> {
    expand_field(process, "inputs", "id", Some("type"))?;
    expand_field(process, "outputs", "id", Some("type"))?;
    normalize_requirements(process)?;
    for field in ["inputs", "outputs"] {
        for param in list_mut(process, field) {
            if let Value::Object(param) = param {
                shorten_key(param, "id");
                if let Some(ty) = param.get_mut("type") {
                    normalize_type(ty)?;
                }
            }
        }
    }

    expand_field(process, "steps", "id", None)?;
    for step in list_mut(process, "steps") {
        if let Value::Object(step) = step {
            normalize_step(step)?;
        }
    }
    Ok(())
}

fn normalize_step(step: &mut Map<String, Value>) -> Result<(), IdMapError> {
    shorten_key(step, "id");
    expand_field(step, "in", "id", Some("source"))?;
    for input in list_mut(step, "in") {
        if let Value::Object(input) = input {
            shorten_key(input, "id");
        }
    }

    if let Some(out) = step.get_mut("out") {
        let names = match out {
            Value::Array(items) => items
                .iter()
                .map(|item| match item {
                    Value::String(name) => Ok(Value::String(shortname(name).to_string())),
                    Value::Object(obj) => obj
                        .get("id")
                        .and_then(Value::as_str)
                        .map(|id| Value::String(shortname(id).to_string()))
                        .ok_or_else(|| IdMapError {
                            field: "out".to_string(),
                            message: "entry has no id".to_string(),
                        }),
                    other => Err(IdMapError {
                        field: "out".to_string(),
                        message: format!("unexpected entry {other}"),
                    }),
                })
                .collect::<Result<Vec<_>, _>>()?,
            Value::Null => Vec::new(),
            other => {
                return Err(IdMapError {
                    field: "out".to_string(),
                    message: format!("expected a list, got {other}"),
                })
            }
        };
        *out = Value::Array(names);
    }

    match step.get_mut("scatter") {
        Some(Value::Array(scatter)) => scatter.iter_mut().for_each(shorten_string),
        Some(scatter) => shorten_string(scatter),
        None => {}
    }

    normalize_requirements(step)
}

fn normalize_requirements(object: &mut Map<String, Value>) -> Result<(), IdMapError> {
    expand_field(object, "requirements", "class", None)?;
    expand_field(object, "hints", "class", None)?;
    for field in ["requirements", "hints"] {
        for requirement in list_mut(object, field) {
            if class_of(requirement) != Some("SchemaDefRequirement") {
                continue;
            }
            if let Some(Value::Array(types)) = requirement.get_mut("types") {
                for ty in types.iter_mut() {
                    normalize_type(ty)?;
                }
            }
        }
    }
    Ok(())
}

/// Normalize a type expression: record fields to list form, short names
pub(crate) fn normalize_type(ty: &mut Value) -> Result<(), IdMapError> {
    match ty {
        Value::Array(members) => {
            for member in members.iter_mut() {
                normalize_type(member)?;
            }
        }
        Value::Object(obj) => {
            shorten_key(obj, "name");
            let kind = obj.get("type").and_then(Value::as_str).map(str::to_owned);
            match kind.as_deref() {
                Some("record") => {
                    expand_field(obj, "fields", "name", Some("type"))?;
                    for field in list_mut(obj, "fields") {
                        if let Value::Object(field) = field {
                            shorten_key(field, "name");
                            if let Some(inner) = field.get_mut("type") {
                                normalize_type(inner)?;
                            }
                        }
                    }
                }
                Some("enum") => {
                    if let Some(Value::Array(symbols)) = obj.get_mut("symbols") {
                        for symbol in symbols.iter_mut() {
                            shorten_string(symbol);
                        }
                    }
                }
                Some("array") => {
                    if let Some(items) = obj.get_mut("items") {
                        normalize_type(items)?;
                    }
                }
                _ => {
                    if let Some(inner @ (Value::Object(_) | Value::Array(_))) = obj.get_mut("type") {
                        normalize_type(inner)?;
                    }
                }
            }
        }
        _ => {}
    }
    Ok(())
}

/// Mutable entries of a list field; empty when absent or not a list
pub(crate) fn list_mut<'a>(
    object: &'a mut Map<String, Value>,
    field: &str,
) -> impl Iterator<Item = &'a mut Value> {
    object
        .get_mut(field)
        .and_then(Value::as_array_mut)
        .into_iter()
        .flatten()
}

/// Entries of a list field; empty when absent or not a list
pub(crate) fn list<'a>(object: &'a Map<String, Value>, field: &str) -> impl Iterator<Item = &'a Value> {
    object
        .get(field)
        .and_then(Value::as_array)
        .into_iter()
        .flatten()
}

fn shorten_key(object: &mut Map<String, Value>, key: &str) {
    if let Some(value) = object.get_mut(key) {
        shorten_string(value);
    }
}

fn shorten_string(value: &mut Value) {
    if let Value::String(raw) = value {
        let short = shortname(raw);
        if short.len() != raw.len() {
            *raw = short.to_string();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn normalized(tree: Value) -> Value {
        let Value::Object(mut map) = tree else { panic!("not a mapping") };
        normalize_process(&mut map).unwrap();
        Value::Object(map)
    }

    #[test]
    fn parameters_become_lists_with_short_ids() {
        let tree = normalized(json!({
            "class": "CommandLineTool",
            "inputs": {"message": "string"},
            "outputs": [{"id": "#echo/out", "type": "stdout"}],
            "requirements": {"DockerRequirement": {"dockerPull": "alpine"}}
        }));
        assert_eq!(tree["inputs"], json!([{"id": "message", "type": "string"}]));
        assert_eq!(tree["outputs"][0]["id"], "out");
        assert_eq!(tree["requirements"][0]["class"], "DockerRequirement");
    }

    #[test]
    fn steps_are_normalized() {
        let tree = normalized(json!({
            "class": "Workflow",
            "inputs": [],
            "outputs": [],
            "steps": {
                "step1": {
                    "run": "echo.cwl",
                    "in": {"message": "inp"},
                    "out": ["#main/step1/out", {"id": "log"}],
                    "scatter": "#main/step1/message",
                    "hints": {"ResourceRequirement": {"coresMin": 2}}
                }
            }
        }));
        let step = &tree["steps"][0];
        assert_eq!(step["id"], "step1");
        assert_eq!(step["in"], json!([{"id": "message", "source": "inp"}]));
        assert_eq!(step["out"], json!(["out", "log"]));
        assert_eq!(step["scatter"], "message");
        assert_eq!(step["hints"][0]["coresMin"], 2);
    }

    #[test]
    fn record_and_enum_types() {
        let mut ty = json!({
            "type": "record",
            "name": "#main/Sample",
            "fields": {
                "id": "string",
                "kind": {"type": {"type": "enum", "symbols": ["#main/Sample/kind/a", "b"]}}
            }
        });
        normalize_type(&mut ty).unwrap();
        assert_eq!(ty["name"], "Sample");
        assert_eq!(ty["fields"][0], json!({"name": "id", "type": "string"}));
        assert_eq!(ty["fields"][1]["type"]["symbols"], json!(["a", "b"]));
    }

    #[test]
    fn schema_def_types_are_normalized() {
        let tree = normalized(json!({
            "class": "Workflow",
            "requirements": [{
                "class": "SchemaDefRequirement",
                "types": [{"type": "record", "name": "#Pair", "fields": {"left": "int"}}]
            }],
            "inputs": [],
            "outputs": [],
            "steps": []
        }));
        assert_eq!(tree["requirements"][0]["types"][0]["name"], "Pair");
        assert_eq!(
            tree["requirements"][0]["types"][0]["fields"],
            json!([{"name": "left", "type": "int"}])
        );
    }

    #[test]
    fn bad_out_is_rejected() {
        let Value::Object(mut map) = json!({"steps": [{"id": "s", "out": 3}]}) else {
            unreachable!()
        };
        assert!(normalize_process(&mut map).is_err());
    }
}
