//! Id-map shorthand expansion
//!
//! Several fields may be written either as a list of objects or as a mapping
//! keyed by identifier:
//!
//! ```yaml
//! inputs:
//!   message: string          # predicate shorthand
//!   count: {type: int}       # mapping entry
//! requirements:
//!   DockerRequirement: {dockerPull: alpine}
//! ```
//!
//! [`expand`] turns either form into the list form.

use crate::error::IdMapError;
use serde_json::{Map, Value};

/// Expand `value` (the content of `field`) into list form
///
/// * `key` is the field receiving the mapping key (`id` or `class`)
/// * `predicate` is the field receiving a non-mapping value (`type`,
///   `source`); without one, non-mapping entries are rejected
///
/// Null expands to an empty list. List entries pass through untouched.
///
/// # Errors
/// `IdMapError` if the value is neither list, mapping nor null, or an entry
/// cannot be expanded
pub fn expand(
    field: &str,
    value: &Value,
    key: &str,
    predicate: Option<&str>,
) -> Result<Vec<Value>, IdMapError> {
    match value {
        Value::Null => Ok(Vec::new()),
        Value::Array(items) => Ok(items.clone()),
        Value::Object(map) => map
            .iter()
            .map(|(name, entry)| expand_entry(field, name, entry, key, predicate))
            .collect(),
        other => Err(IdMapError {
            field: field.to_string(),
            message: format!("expected a list or mapping, got {other}"),
        }),
    }
}

fn expand_entry(
    field: &str,
    name: &str,
    entry: &Value,
    key: &str,
    predicate: Option<&str>,
) -> Result<Value, IdMapError> {
    let mut expanded = Map::new();
    expanded.insert(key.to_string(), Value::String(name.to_string()));
    match (entry, predicate) {
        (Value::Object(fields), _) => {
            for (k, v) in fields {
                if k != key {
                    expanded.insert(k.clone(), v.clone());
                }
            }
        }
        (other, Some(predicate)) => {
            expanded.insert(predicate.to_string(), other.clone());
        }
        (other, None) => {
            return Err(IdMapError {
                field: field.to_string(),
                message: format!("entry '{name}' must be a mapping, got {other}"),
            })
        }
    }
    Ok(Value::Object(expanded))
}

/// Expand `object[field]` in place; absent fields are left absent
///
/// # Errors
/// See [`expand`]
pub fn expand_field(
    object: &mut Map<String, Value>,
    field: &str,
    key: &str,
    predicate: Option<&str>,
) -> Result<(), IdMapError> {
    if let Some(value) = object.get(field) {
        let expanded = expand(field, value, key, predicate)?;
        object.insert(field.to_string(), Value::Array(expanded));
    }
    Ok(())
}

/// `class` of a process or requirement object
#[inline]
#[must_use]
pub fn class_of(value: &Value) -> Option<&str> {
    value.get("class").and_then(Value::as_str)
}
