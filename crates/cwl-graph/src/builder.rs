//! Process model builder
//!
//! Turns the normalized trees of a [`ResolvedGraph`] into typed
//! [`Process`]es. Shape problems are fatal here; semantic problems (cycles,
//! unsatisfied inputs, type mismatches) are left to the validator.

use crate::error::ModelError;
use crate::model::{
    Binding, LinkMerge, OutputBinding, Parameter, PickValue, Process, ProcessId, ProcessKind,
    ProcessModel, ScatterMethod, SourceRef, Step, StepInput,
};
use crate::requirement::Requirement;
use crate::types::TypeDescriptor;
use cwl_resolver::{ProcessHandle, ResolvedGraph};
use serde_json::{Map, Value};
use std::collections::{HashMap, HashSet};
use tracing::{debug, trace};

const PROCESS_FIELDS: [&str; 7] = ["id", "class", "inputs", "outputs", "requirements", "hints", "steps"];
const STEP_FIELDS: [&str; 9] = [
    "id",
    "run",
    "in",
    "out",
    "requirements",
    "hints",
    "scatter",
    "scatterMethod",
    "when",
];
const BINDING_FIELDS: [&str; 3] = ["source", "linkMerge", "pickValue"];
const OUTPUT_BINDING_FIELDS: [&str; 3] = ["outputSource", "linkMerge", "pickValue"];

/// Builds a [`ProcessModel`] from a resolved graph
#[derive(Debug)]
pub struct ModelBuilder<'g> {
    graph: &'g ResolvedGraph,
    ids: HashMap<ProcessHandle, ProcessId>,
}

impl<'g> ModelBuilder<'g> {
    /// Build the typed model of every process in `graph`
    ///
    /// Processes are laid out in arena order, so the same graph always
    /// yields the same model.
    ///
    /// # Errors
    /// - `MixedVersions` if the documents do not share one version
    /// - `DuplicateIdentifier` for repeated process, parameter, step or
    ///   port ids
    /// - `MalformedProcess` for trees missing required structure
    pub fn build(graph: &'g ResolvedGraph) -> Result<ProcessModel, ModelError> {
        let versions = graph.versions();
        let mut declared = versions.iter().copied();
        let version = match (declared.next(), declared.next()) {
            (Some(version), None) => version,
            _ => {
                return Err(ModelError::MixedVersions {
                    versions: versions.iter().copied().collect(),
                })
            }
        };

        for document in graph.documents() {
            if let Some(id) = first_duplicate(document.process_ids()) {
                return Err(ModelError::duplicate(document.uri().as_str(), id));
            }
        }

        let builder = Self {
            graph,
            ids: graph
                .processes()
                .enumerate()
                .map(|(position, (handle, _))| (handle, ProcessId::new(position)))
                .collect(),
        };

        let keys: HashMap<ProcessHandle, &str> = graph.targets().map(|(key, h)| (h, key)).collect();
        let mut processes = Vec::with_capacity(builder.ids.len());
        for (handle, tree) in graph.processes() {
            let key = match keys.get(&handle) {
                Some(key) => (*key).to_string(),
                None => fallback_key(graph, handle, tree),
            };
            trace!(process = %key, "building process");
            processes.push(builder.process(key, tree)?);
        }
        check_step_outputs(&processes)?;

        let root = builder
            .ids
            .get(&graph.root())
            .copied()
            .ok_or_else(|| ModelError::malformed("<root>", "root handle is not in the graph"))?;
        debug!(processes = processes.len(), version = %version, "process model built");
        Ok(ProcessModel::new(version, root, processes))
    }

    fn process(&self, key: String, tree: &Value) -> Result<Process, ModelError> {
        let object = tree
            .as_object()
            .ok_or_else(|| ModelError::malformed(&key, "process must be a mapping"))?;
        let id = object
            .get("id")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        let class = object
            .get("class")
            .ok_or_else(|| ModelError::malformed(&key, "missing class"))?
            .as_str()
            .ok_or_else(|| ModelError::malformed(&key, "class must be a string"))?;
        if !matches!(class, "CommandLineTool" | "Workflow" | "ExpressionTool" | "Operation") {
            return Err(ModelError::malformed(&key, format!("unknown class '{class}'")));
        }
        let is_workflow = class == "Workflow";

        let inputs = parameters(&key, object, "inputs", &[])?;
        let output_skip: &[&str] = if is_workflow { &OUTPUT_BINDING_FIELDS } else { &[] };
        let outputs = parameters(&key, object, "outputs", output_skip)?;
        if let Some(id) = first_duplicate(inputs.iter().chain(&outputs).map(|p| p.id.as_str())) {
            return Err(ModelError::duplicate(&key, id));
        }

        let kind = match class {
            "CommandLineTool" => ProcessKind::Tool {
                base_command: strings(object.get("baseCommand")),
            },
            "ExpressionTool" => ProcessKind::ExpressionTool {
                expression: object
                    .get("expression")
                    .cloned()
                    .ok_or_else(|| ModelError::malformed(&key, "ExpressionTool without expression"))?,
            },
            "Workflow" => {
                let steps = self.steps(&key, object)?;
                let outputs = list(&key, object, "outputs")?
                    .iter()
                    .zip(&outputs)
                    .map(|(tree, param)| -> Result<OutputBinding, ModelError> {
                        Ok(OutputBinding {
                            id: param.id.clone(),
                            binding: binding(&key, tree, "outputSource")?,
                        })
                    })
                    .collect::<Result<Vec<_>, _>>()?;
                ProcessKind::Workflow { steps, outputs }
            }
            _ => ProcessKind::Operation,
        };

        Ok(Process {
            requirements: requirements(&key, object, "requirements")?,
            hints: requirements(&key, object, "hints")?,
            extra: rest(object, &PROCESS_FIELDS),
            id,
            key,
            inputs,
            outputs,
            kind,
        })
    }

    fn steps(&self, key: &str, workflow: &Map<String, Value>) -> Result<Vec<Step>, ModelError> {
        if !workflow.contains_key("steps") {
            return Err(ModelError::malformed(key, "Workflow without steps"));
        }
        let steps = list(key, workflow, "steps")?
            .iter()
            .map(|tree| self.step(key, tree))
            .collect::<Result<Vec<_>, _>>()?;
        if let Some(id) = first_duplicate(steps.iter().map(|s| s.id.as_str())) {
            return Err(ModelError::duplicate(key, id));
        }
        Ok(steps)
    }

    fn step(&self, key: &str, tree: &Value) -> Result<Step, ModelError> {
        let object = tree
            .as_object()
            .ok_or_else(|| ModelError::malformed(key, "steps must be mappings"))?;
        let id = object
            .get("id")
            .and_then(Value::as_str)
            .ok_or_else(|| ModelError::malformed(key, "step without id"))?
            .to_string();
        let scope = format!("{key}/{id}");

        let run = match object.get("run") {
            Some(Value::String(run)) => run,
            Some(_) => {
                return Err(ModelError::malformed(key, format!("step '{id}' has an unlinked run")))
            }
            None => return Err(ModelError::malformed(key, format!("step '{id}' has no run"))),
        };
        let target = self
            .graph
            .target(run)
            .and_then(|handle| self.ids.get(&handle).copied())
            .ok_or_else(|| ModelError::malformed(key, format!("step '{id}' runs unresolved '{run}'")))?;

        let outputs = match object.get("out") {
            Some(Value::Array(items)) => items
                .iter()
                .map(|item| {
                    item.as_str()
                        .map(ToString::to_string)
                        .ok_or_else(|| ModelError::malformed(key, format!("step '{id}' has a non-string out")))
                })
                .collect::<Result<Vec<_>, _>>()?,
            Some(_) => return Err(ModelError::malformed(key, format!("step '{id}' out must be a list"))),
            None => return Err(ModelError::malformed(key, format!("step '{id}' has no out"))),
        };
        if let Some(dup) = first_duplicate(outputs.iter().map(String::as_str)) {
            return Err(ModelError::duplicate(&scope, dup));
        }

        let inputs = list(&scope, object, "in")?
            .iter()
            .map(|tree| step_input(&scope, tree))
            .collect::<Result<Vec<_>, _>>()?;
        if let Some(dup) = first_duplicate(inputs.iter().map(|i| i.id.as_str())) {
            return Err(ModelError::duplicate(&scope, dup));
        }

        let scatter_method = match object.get("scatterMethod") {
            None | Some(Value::Null) => None,
            Some(Value::String(name)) => Some(ScatterMethod::parse(name).ok_or_else(|| {
                ModelError::malformed(key, format!("step '{id}' has unknown scatterMethod '{name}'"))
            })?),
            Some(other) => {
                return Err(ModelError::malformed(
                    key,
                    format!("step '{id}' has scatterMethod {other}"),
                ))
            }
        };

        Ok(Step {
            target,
            inputs,
            outputs,
            requirements: requirements(&scope, object, "requirements")?,
            hints: requirements(&scope, object, "hints")?,
            scatter: strings(object.get("scatter")),
            scatter_method,
            when: object.get("when").cloned(),
            extra: rest(object, &STEP_FIELDS),
            id,
        })
    }
}

/// Key for a process the resolver did not register
fn fallback_key(graph: &ResolvedGraph, handle: ProcessHandle, tree: &Value) -> String {
    let id = tree.get("id").and_then(Value::as_str).unwrap_or_default();
    graph
        .document(handle.document)
        .map_or_else(|| id.to_string(), |doc| doc.uri().process_key(id))
}

/// First id that appears twice
fn first_duplicate<'a>(ids: impl IntoIterator<Item = &'a str>) -> Option<&'a str> {
    let mut seen = HashSet::new();
    ids.into_iter().find(|id| !seen.insert(*id))
}

fn list<'a>(key: &str, object: &'a Map<String, Value>, field: &str) -> Result<&'a [Value], ModelError> {
    match object.get(field) {
        None | Some(Value::Null) => Ok(&[]),
        Some(Value::Array(items)) => Ok(items),
        Some(other) => Err(ModelError::malformed(key, format!("{field} must be a list, got {other}"))),
    }
}

fn rest(object: &Map<String, Value>, modelled: &[&str]) -> Map<String, Value> {
    object
        .iter()
        .filter(|(k, _)| !modelled.contains(&k.as_str()))
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect()
}

fn strings(value: Option<&Value>) -> Vec<String> {
    match value {
        Some(Value::String(s)) => vec![s.clone()],
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(Value::as_str)
            .map(ToString::to_string)
            .collect(),
        _ => Vec::new(),
    }
}

fn parameters(
    key: &str,
    process: &Map<String, Value>,
    field: &str,
    skip: &[&str],
) -> Result<Vec<Parameter>, ModelError> {
    if !process.contains_key(field) {
        return Err(ModelError::malformed(key, format!("missing {field}")));
    }
    list(key, process, field)?
        .iter()
        .map(|tree| {
            let object = tree
                .as_object()
                .ok_or_else(|| ModelError::malformed(key, format!("{field} entries must be mappings")))?;
            let id = object
                .get("id")
                .and_then(Value::as_str)
                .ok_or_else(|| ModelError::malformed(key, format!("{field} entry without id")))?;
            let raw = object
                .get("type")
                .ok_or_else(|| ModelError::malformed(key, format!("parameter '{id}' has no type")))?;
            let parsed = TypeDescriptor::parse(raw)
                .map_err(|e| ModelError::malformed(key, format!("parameter '{id}': {e}")))?;
            let mut skipped = vec!["id"];
            skipped.extend_from_slice(skip);
            Ok(Parameter {
                id: id.to_string(),
                ty: parsed.ty,
                optional: parsed.optional,
                default: object.get("default").filter(|v| !v.is_null()).cloned(),
                fields: rest(object, &skipped),
            })
        })
        .collect()
}

fn requirements(key: &str, object: &Map<String, Value>, field: &str) -> Result<Vec<Requirement>, ModelError> {
    list(key, object, field)?
        .iter()
        .map(|tree| Requirement::from_tree(tree).map_err(|e| ModelError::malformed(key, format!("{field}: {e}"))))
        .collect()
}

fn binding(key: &str, tree: &Value, source_field: &str) -> Result<Binding, ModelError> {
    let (sources, source_is_list) = match tree.get(source_field) {
        None | Some(Value::Null) => (Vec::new(), false),
        Some(Value::String(raw)) => (vec![SourceRef::parse(raw)], false),
        Some(Value::Array(items)) => (
            items
                .iter()
                .map(|item| {
                    item.as_str()
                        .map(SourceRef::parse)
                        .ok_or_else(|| ModelError::malformed(key, format!("{source_field} entries must be strings")))
                })
                .collect::<Result<Vec<_>, _>>()?,
            true,
        ),
        Some(other) => {
            return Err(ModelError::malformed(key, format!("unexpected {source_field} {other}")))
        }
    };
    let link_merge = match tree.get("linkMerge").and_then(Value::as_str) {
        Some(name) => Some(
            LinkMerge::parse(name).ok_or_else(|| ModelError::malformed(key, format!("unknown linkMerge '{name}'")))?,
        ),
        None => None,
    };
    let pick_value = match tree.get("pickValue").and_then(Value::as_str) {
        Some(name) => Some(
            PickValue::parse(name).ok_or_else(|| ModelError::malformed(key, format!("unknown pickValue '{name}'")))?,
        ),
        None => None,
    };
    Ok(Binding {
        sources,
        source_is_list,
        link_merge,
        pick_value,
    })
}

fn step_input(scope: &str, tree: &Value) -> Result<StepInput, ModelError> {
    let object = tree
        .as_object()
        .ok_or_else(|| ModelError::malformed(scope, "step inputs must be mappings"))?;
    let id = object
        .get("id")
        .and_then(Value::as_str)
        .ok_or_else(|| ModelError::malformed(scope, "step input without id"))?;
    let mut modelled = vec!["id", "default", "valueFrom"];
    modelled.extend_from_slice(&BINDING_FIELDS);
    Ok(StepInput {
        id: id.to_string(),
        binding: binding(scope, tree, "source")?,
        default: object.get("default").filter(|v| !v.is_null()).cloned(),
        value_from: object.get("valueFrom").filter(|v| !v.is_null()).cloned(),
        extra: rest(object, &modelled),
    })
}

/// Every step `out` must name an output of the step's target
fn check_step_outputs(processes: &[Process]) -> Result<(), ModelError> {
    for process in processes {
        for step in process.steps() {
            let Some(target) = processes.get(step.target.index()) else {
                continue;
            };
            if let Some(missing) = step.outputs.iter().find(|out| target.output(out).is_none()) {
                return Err(ModelError::malformed(
                    &process.key,
                    format!(
                        "step '{}' declares output '{missing}' which '{}' does not produce",
                        step.id, target.id
                    ),
                ));
            }
        }
    }
    Ok(())
}
