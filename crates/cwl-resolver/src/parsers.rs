//! Text → tree parsers
//!
//! Workflow documents are YAML (of which JSON is a subset). Both formats
//! parse into the same insertion-ordered [`Value`].

use serde::Deserialize;
use serde_json::Value;
use std::path::Path;

/// Supported text formats
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TextFormat {
    /// YAML 1.2
    Yaml,
    /// JSON
    Json,
}

impl TextFormat {
    /// Format implied by a path or URI's extension
    ///
    /// Anything other than `.json` is read as YAML.
    #[must_use]
    pub fn for_path(path: &str) -> Self {
        let extension = Path::new(path)
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase);
        match extension.as_deref() {
            Some("json") => Self::Json,
            _ => Self::Yaml,
        }
    }

    /// Parse `text` in this format
    ///
    /// # Errors
    /// Parser message on syntax errors or empty input
    pub fn parse(self, text: &str) -> Result<Value, String> {
        match self {
            Self::Json => serde_json::from_str(text).map_err(|e| e.to_string()),
            Self::Yaml => parse_yaml(text),
        }
    }
}

/// Parse the first document of a YAML stream
fn parse_yaml(text: &str) -> Result<Value, String> {
    let mut documents = serde_yaml::Deserializer::from_str(text);
    let Some(first) = documents.next() else {
        return Err("empty document".to_string());
    };
    let value = Value::deserialize(first).map_err(|e| e.to_string())?;
    if value.is_null() {
        return Err("empty document".to_string());
    }
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn format_from_extension() {
        assert_eq!(TextFormat::for_path("/a/b.json"), TextFormat::Json);
        assert_eq!(TextFormat::for_path("/a/b.JSON"), TextFormat::Json);
        assert_eq!(TextFormat::for_path("/a/b.cwl"), TextFormat::Yaml);
        assert_eq!(TextFormat::for_path("/a/b"), TextFormat::Yaml);
    }

    #[test]
    fn yaml_keeps_key_order() {
        let tree = TextFormat::Yaml
            .parse("cwlVersion: v1.0\nclass: Workflow\ninputs:\n  b: int\n  a: string\n")
            .unwrap();
        let keys: Vec<_> = tree["inputs"].as_object().unwrap().keys().cloned().collect();
        assert_eq!(keys, vec!["b".to_string(), "a".to_string()]);
    }

    #[test]
    fn yaml_reads_first_document() {
        let tree = TextFormat::Yaml.parse("a: 1\n---\nb: 2\n").unwrap();
        assert_eq!(tree, json!({"a": 1}));
    }

    #[test]
    fn errors_are_reported() {
        assert!(TextFormat::Yaml.parse("").is_err());
        assert!(TextFormat::Yaml.parse("a: [1, 2").is_err());
        assert!(TextFormat::Json.parse("{\"a\":").is_err());
    }

    #[test]
    fn json_parses() {
        let tree = TextFormat::Json.parse(r#"{"class": "Operation"}"#).unwrap();
        assert_eq!(tree["class"], "Operation");
    }
}
