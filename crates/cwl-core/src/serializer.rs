//! Model → document tree
//!
//! A model with one process renders as a plain document. Several processes
//! are packed into a `$graph`; every process keeps its short id, the root
//! first, others suffixed `_2`, `_3`, … on collision. Steps run `#id`
//! references into the same graph.

use crate::error::RenderError;
use cwl_document::{CwlVersion, Document, DocumentUri, Value};
use cwl_graph::{Process, ProcessId, ProcessModel};
use cwl_upgrade::upgrade_to;
use std::collections::HashSet;
use tracing::debug;

/// Id of a packed root that has none of its own
pub const PACKED_ROOT_ID: &str = "main";

/// Serializable document produced by [`render`]
#[derive(Debug, Clone, PartialEq)]
pub struct RenderedDocument {
    tree: Value,
    root_id: String,
    version: CwlVersion,
}

impl RenderedDocument {
    /// Document tree
    #[inline]
    #[must_use]
    pub fn tree(&self) -> &Value {
        &self.tree
    }

    /// Take the document tree
    #[inline]
    #[must_use]
    pub fn into_tree(self) -> Value {
        self.tree
    }

    /// Id of the root process inside the tree
    #[inline]
    #[must_use]
    pub fn root_id(&self) -> &str {
        &self.root_id
    }

    /// Declared `cwlVersion`
    #[inline]
    #[must_use]
    pub fn version(&self) -> CwlVersion {
        self.version
    }

    /// Whether the processes sit in a `$graph`
    #[must_use]
    pub fn is_packed(&self) -> bool {
        self.tree.get("$graph").is_some()
    }

    /// YAML text of the tree
    ///
    /// # Errors
    /// `Yaml` if the encoder rejects the tree
    pub fn to_yaml(&self) -> Result<String, RenderError> {
        serde_yaml::to_string(&self.tree).map_err(|e| RenderError::Yaml(e.to_string()))
    }
}

/// Render `model` as a document of version `target`
///
/// The model is emitted in its own version and then upgraded.
///
/// # Errors
/// - `Upgrade(UnsupportedVersion)` if `target` is older than the model
/// - `Document` if the root key does not carry a usable URI
pub fn render(model: &ProcessModel, target: CwlVersion) -> Result<RenderedDocument, RenderError> {
    let root = model.root_id();
    let ids = assign_ids(model);
    let run_of = |id: ProcessId| Value::String(format!("#{}", ids[id.index()]));

    let processes = model
        .iter()
        .map(|(id, process)| {
            let mut tree = process.to_tree(&run_of);
            if let Value::Object(map) = &mut tree {
                map.insert("id".to_string(), Value::String(ids[id.index()].clone()));
            }
            tree
        })
        .collect();

    let uri = source_uri(model.root())?;
    let document = Document::new(uri, model.version(), processes);
    debug!(
        uri = %document.uri(),
        processes = model.len(),
        from = %model.version(),
        to = %target,
        "rendering model"
    );
    let document = upgrade_to(&document, target)?;

    Ok(RenderedDocument {
        tree: document.to_tree(),
        root_id: ids[root.index()].clone(),
        version: document.version(),
    })
}

/// Render `model` as YAML text of version `target`
///
/// # Errors
/// As [`render`], plus `Yaml` if encoding fails
pub fn render_yaml(model: &ProcessModel, target: CwlVersion) -> Result<String, RenderError> {
    render(model, target)?.to_yaml()
}

/// Output id of every process, indexed by arena position
fn assign_ids(model: &ProcessModel) -> Vec<String> {
    let mut ids = vec![String::new(); model.len()];
    if model.len() == 1 {
        ids[0] = model.root().id.clone();
        return ids;
    }

    let root = model.root_id();
    let mut taken = HashSet::new();
    let order = model
        .get(root)
        .map(|process| (root, process))
        .into_iter()
        .chain(model.iter().filter(|(id, _)| *id != root));
    for (id, process) in order {
        let base = if process.id.is_empty() {
            PACKED_ROOT_ID
        } else {
            process.id.as_str()
        };
        let mut candidate = base.to_string();
        let mut suffix = 2;
        while taken.contains(&candidate) {
            candidate = format!("{base}_{suffix}");
            suffix += 1;
        }
        taken.insert(candidate.clone());
        ids[id.index()] = candidate;
    }
    ids
}

/// Document the root process was loaded from
fn source_uri(root: &Process) -> Result<DocumentUri, RenderError> {
    let document = root.key.split_once('#').map_or(root.key.as_str(), |(uri, _)| uri);
    Ok(DocumentUri::parse(document)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use cwl_graph::ModelBuilder;
    use cwl_resolver::Resolver;
    use cwl_test_utils::{echo_tool, fetcher_with, fixture_fetcher, two_step_workflow, ECHO_URI, WORKFLOW_URI};
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn model(fetcher: &cwl_resolver::InMemoryFetcher, root: &str) -> ProcessModel {
        let graph = Resolver::new(fetcher).resolve(root).unwrap();
        ModelBuilder::build(&graph).unwrap()
    }

    #[test]
    fn single_tool_is_plain() {
        let fetcher = fetcher_with(&[(ECHO_URI, echo_tool())]);
        let rendered = render(&model(&fetcher, ECHO_URI), CwlVersion::V1_0).unwrap();

        assert!(!rendered.is_packed());
        assert_eq!(rendered.root_id(), "echo");
        let tree = rendered.tree();
        assert_eq!(tree["cwlVersion"], "v1.0");
        assert_eq!(tree["class"], "CommandLineTool");
        assert_eq!(tree["inputs"][0]["id"], "message");
        assert_eq!(tree["inputs"][0]["type"], "string");
    }

    #[test]
    fn workflow_is_packed_with_local_runs() {
        let fetcher = fixture_fetcher(two_step_workflow(Some(json!("n"))));
        let rendered = render(&model(&fetcher, WORKFLOW_URI), CwlVersion::V1_0).unwrap();

        assert!(rendered.is_packed());
        assert_eq!(rendered.root_id(), "wf");
        let graph = rendered.tree()["$graph"].as_array().unwrap();
        assert_eq!(graph.len(), 3);

        let root = graph.iter().find(|p| p["id"] == "wf").unwrap();
        assert_eq!(root["steps"][0]["run"], "#echo");
        assert_eq!(root["steps"][1]["run"], "#cat");
        assert_eq!(root["outputs"][0]["outputSource"], "step2/out");
        assert!(graph.iter().all(|p| p.get("cwlVersion").is_none()));
    }

    #[test]
    fn colliding_ids_are_suffixed() {
        let other_echo = json!({
            "cwlVersion": "v1.0",
            "class": "CommandLineTool",
            "id": "echo",
            "inputs": {"message": "string"},
            "outputs": {"out": "stdout"}
        });
        let workflow = json!({
            "cwlVersion": "v1.0",
            "class": "Workflow",
            "inputs": {"msg": "string"},
            "outputs": {},
            "steps": {
                "a": {"run": "tools/echo.cwl", "in": {"message": "msg"}, "out": ["out"]},
                "b": {"run": "other/shout.cwl", "in": {"message": "msg"}, "out": ["out"]}
            }
        });
        let fetcher = fetcher_with(&[
            (WORKFLOW_URI, workflow),
            (ECHO_URI, echo_tool()),
            ("file:///fixtures/other/shout.cwl", other_echo),
        ]);
        let rendered = render(&model(&fetcher, WORKFLOW_URI), CwlVersion::V1_0).unwrap();

        let graph = rendered.tree()["$graph"].as_array().unwrap();
        let ids: HashSet<&str> = graph.iter().filter_map(|p| p["id"].as_str()).collect();
        assert_eq!(ids, HashSet::from(["wf", "echo", "echo_2"]));

        let root = graph.iter().find(|p| p["id"] == "wf").unwrap();
        assert_ne!(root["steps"][0]["run"], root["steps"][1]["run"]);
    }

    #[test]
    fn root_keeps_its_id_on_collision() {
        let mut workflow = two_step_workflow(Some(json!("n")));
        workflow["id"] = json!("echo");
        let fetcher = fixture_fetcher(workflow);
        let rendered = render(&model(&fetcher, WORKFLOW_URI), CwlVersion::V1_0).unwrap();

        assert_eq!(rendered.root_id(), "echo");
        let graph = rendered.tree()["$graph"].as_array().unwrap();
        let root = graph.iter().find(|p| p["id"] == "echo").unwrap();
        assert_eq!(root["class"], "Workflow");
        assert_eq!(root["steps"][0]["run"], "#echo_2");
    }

    #[test]
    fn render_upgrades_and_refuses_downgrade() {
        let fetcher = fetcher_with(&[(ECHO_URI, echo_tool())]);
        let model = model(&fetcher, ECHO_URI);

        let rendered = render(&model, CwlVersion::V1_2).unwrap();
        assert_eq!(rendered.version(), CwlVersion::V1_2);
        assert_eq!(rendered.tree()["cwlVersion"], "v1.2");

        let upgraded = ProcessModel::new(CwlVersion::V1_2, model.root_id(), model.processes().to_vec());
        let err = render(&upgraded, CwlVersion::V1_0).unwrap_err();
        assert!(matches!(err, RenderError::Upgrade(cwl_upgrade::UpgradeError::UnsupportedVersion { .. })));
    }

    #[test]
    fn yaml_text() {
        let fetcher = fetcher_with(&[(ECHO_URI, echo_tool())]);
        let yaml = render_yaml(&model(&fetcher, ECHO_URI), CwlVersion::V1_0).unwrap();
        assert!(yaml.starts_with("cwlVersion: v1.0"));
        assert!(yaml.contains("class: CommandLineTool"));
    }
}
