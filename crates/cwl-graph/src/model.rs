//! Typed process model
//!
//! Processes live in an arena indexed by [`ProcessId`]; steps point at
//! their targets by id, so shared tools are stored once however many steps
//! run them.

use crate::dag::StepGraph;
use crate::requirement::{Requirement, RequirementKind};
use crate::types::{ParsedType, TypeDescriptor};
use cwl_document::CwlVersion;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt::{self, Display, Formatter};

/// Index of a process in a [`ProcessModel`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ProcessId(pub(crate) usize);

impl ProcessId {
    /// Id of the process at arena position `index`
    #[inline]
    #[must_use]
    pub const fn new(index: usize) -> Self {
        Self(index)
    }

    /// Arena position
    #[inline]
    #[must_use]
    pub fn index(self) -> usize {
        self.0
    }
}

/// Input or output parameter
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Parameter {
    /// Short id
    pub id: String,
    /// Parsed type
    pub ty: TypeDescriptor,
    /// Whether `null` is accepted
    pub optional: bool,
    /// Default value
    pub default: Option<Value>,
    /// Every other field as written, including the raw `type`
    pub fields: Map<String, Value>,
}

impl Parameter {
    /// Whether a value must be supplied
    #[inline]
    #[must_use]
    pub fn is_required(&self) -> bool {
        !self.optional && self.default.is_none()
    }

    /// Declared type with its nullability
    #[must_use]
    pub fn parsed_type(&self) -> ParsedType {
        ParsedType {
            ty: self.ty.clone(),
            optional: self.optional,
        }
    }

    /// Parameter object, `id` first
    #[must_use]
    pub fn to_tree(&self) -> Value {
        let mut tree = Map::new();
        tree.insert("id".to_string(), Value::String(self.id.clone()));
        tree.extend(self.fields.clone());
        Value::Object(tree)
    }
}

/// Where a value comes from inside a workflow
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum SourceRef {
    /// Input of the enclosing workflow
    WorkflowInput(String),
    /// Output of a sibling step
    StepOutput {
        /// Producing step
        step: String,
        /// Output port
        output: String,
    },
}

impl SourceRef {
    /// Parse a canonical source (`input` or `step/output`)
    #[must_use]
    pub fn parse(raw: &str) -> Self {
        match raw.split_once('/') {
            Some((step, output)) => Self::StepOutput {
                step: step.to_string(),
                output: output.to_string(),
            },
            None => Self::WorkflowInput(raw.to_string()),
        }
    }

    /// Producing step, if any
    #[must_use]
    pub fn step(&self) -> Option<&str> {
        match self {
            Self::StepOutput { step, .. } => Some(step),
            Self::WorkflowInput(_) => None,
        }
    }
}

impl Display for SourceRef {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::WorkflowInput(id) => f.write_str(id),
            Self::StepOutput { step, output } => write!(f, "{step}/{output}"),
        }
    }
}

/// How several sources combine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LinkMerge {
    /// One array item per source
    MergeNested,
    /// Concatenate array sources, append scalars
    MergeFlattened,
}

impl LinkMerge {
    /// Parse a schema name
    #[must_use]
    pub fn parse(name: &str) -> Option<Self> {
        match name {
            "merge_nested" => Some(Self::MergeNested),
            "merge_flattened" => Some(Self::MergeFlattened),
            _ => None,
        }
    }

    /// Schema name
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::MergeNested => "merge_nested",
            Self::MergeFlattened => "merge_flattened",
        }
    }
}

/// Null filtering of merged sources
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PickValue {
    /// First non-null
    FirstNonNull,
    /// Exactly one non-null
    TheOnlyNonNull,
    /// All non-null, as an array
    AllNonNull,
}

impl PickValue {
    /// Parse a schema name
    #[must_use]
    pub fn parse(name: &str) -> Option<Self> {
        match name {
            "first_non_null" => Some(Self::FirstNonNull),
            "the_only_non_null" => Some(Self::TheOnlyNonNull),
            "all_non_null" => Some(Self::AllNonNull),
            _ => None,
        }
    }

    /// Whether the picked value is a single item rather than an array
    #[must_use]
    pub const fn is_single(self) -> bool {
        !matches!(self, Self::AllNonNull)
    }
}

/// Combination of scattered inputs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScatterMethod {
    /// Pairwise
    DotProduct,
    /// Cartesian product, nested one level per scattered input
    NestedCrossproduct,
    /// Cartesian product, flat
    FlatCrossproduct,
}

impl ScatterMethod {
    /// Parse a schema name
    #[must_use]
    pub fn parse(name: &str) -> Option<Self> {
        match name {
            "dotproduct" => Some(Self::DotProduct),
            "nested_crossproduct" => Some(Self::NestedCrossproduct),
            "flat_crossproduct" => Some(Self::FlatCrossproduct),
            _ => None,
        }
    }
}

/// Sources feeding one port (step input or workflow output)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Binding {
    /// Sources in declaration order
    pub sources: Vec<SourceRef>,
    /// Whether the source was written as a list
    pub source_is_list: bool,
    /// Merge policy
    pub link_merge: Option<LinkMerge>,
    /// Null filtering
    pub pick_value: Option<PickValue>,
}

impl Binding {
    /// Whether several values are combined into an array
    ///
    /// A single source written as a list is merged too.
    #[must_use]
    pub fn merges(&self) -> bool {
        self.link_merge.is_some() || self.sources.len() > 1 || (self.source_is_list && !self.sources.is_empty())
    }
}

/// Step input
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepInput {
    /// Port id (target input name)
    pub id: String,
    /// Sources
    pub binding: Binding,
    /// Literal default
    pub default: Option<Value>,
    /// Expression computing the value
    pub value_from: Option<Value>,
    /// Unmodelled fields
    pub extra: Map<String, Value>,
}

impl StepInput {
    /// Whether anything supplies a value
    #[must_use]
    pub fn is_satisfied(&self) -> bool {
        !self.binding.sources.is_empty() || self.default.is_some() || self.value_from.is_some()
    }
}

/// Step of a workflow
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Step {
    /// Short id, unique within the workflow
    pub id: String,
    /// Process the step runs
    pub target: ProcessId,
    /// Inputs in declaration order
    pub inputs: Vec<StepInput>,
    /// Declared outputs
    pub outputs: Vec<String>,
    /// Requirements
    pub requirements: Vec<Requirement>,
    /// Hints
    pub hints: Vec<Requirement>,
    /// Scattered input ids
    pub scatter: Vec<String>,
    /// Scatter combination
    pub scatter_method: Option<ScatterMethod>,
    /// Conditional execution expression
    pub when: Option<Value>,
    /// Unmodelled fields
    pub extra: Map<String, Value>,
}

impl Step {
    /// Input by port id
    #[must_use]
    pub fn input(&self, id: &str) -> Option<&StepInput> {
        self.inputs.iter().find(|input| input.id == id)
    }

    /// Whether the step scatters over anything
    #[inline]
    #[must_use]
    pub fn is_scattered(&self) -> bool {
        !self.scatter.is_empty()
    }

    /// Array depth added to each output by scattering
    #[must_use]
    pub fn scatter_depth(&self) -> usize {
        match (self.scatter.len(), self.scatter_method) {
            (0, _) => 0,
            (n, Some(ScatterMethod::NestedCrossproduct)) => n,
            _ => 1,
        }
    }

    /// Steps this step reads from, in order of first use
    pub fn upstream(&self) -> impl Iterator<Item = &str> {
        let mut seen = Vec::new();
        self.inputs
            .iter()
            .flat_map(|input| input.binding.sources.iter())
            .filter_map(SourceRef::step)
            .filter(move |step| {
                if seen.contains(step) {
                    false
                } else {
                    seen.push(*step);
                    true
                }
            })
    }
}

/// Workflow output with its binding
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutputBinding {
    /// Output parameter id
    pub id: String,
    /// `outputSource` and merge settings
    pub binding: Binding,
}

/// Class-specific payload
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ProcessKind {
    /// `CommandLineTool`
    Tool {
        /// `baseCommand` words
        base_command: Vec<String>,
    },
    /// `Workflow`
    Workflow {
        /// Steps in declaration order
        steps: Vec<Step>,
        /// Bindings of the workflow outputs, in output order
        outputs: Vec<OutputBinding>,
    },
    /// `ExpressionTool`
    ExpressionTool {
        /// Expression
        expression: Value,
    },
    /// `Operation`
    Operation,
}

impl ProcessKind {
    /// Schema class name
    #[must_use]
    pub const fn class(&self) -> &'static str {
        match self {
            Self::Tool { .. } => "CommandLineTool",
            Self::Workflow { .. } => "Workflow",
            Self::ExpressionTool { .. } => "ExpressionTool",
            Self::Operation => "Operation",
        }
    }
}

/// One process of the model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Process {
    /// Short id
    pub id: String,
    /// Canonical key (`document#id`)
    pub key: String,
    /// Inputs in declaration order
    pub inputs: Vec<Parameter>,
    /// Outputs in declaration order
    pub outputs: Vec<Parameter>,
    /// Requirements
    pub requirements: Vec<Requirement>,
    /// Hints
    pub hints: Vec<Requirement>,
    /// Class payload
    pub kind: ProcessKind,
    /// Unmodelled fields (`label`, `doc`, `baseCommand`, `arguments`, ...)
    pub extra: Map<String, Value>,
}

impl Process {
    /// Schema class name
    #[inline]
    #[must_use]
    pub fn class(&self) -> &'static str {
        self.kind.class()
    }

    /// `label`
    #[must_use]
    pub fn label(&self) -> Option<&str> {
        self.extra.get("label").and_then(Value::as_str)
    }

    /// `doc`
    #[must_use]
    pub fn doc(&self) -> Option<&str> {
        self.extra.get("doc").and_then(Value::as_str)
    }

    /// Input by id
    #[must_use]
    pub fn input(&self, id: &str) -> Option<&Parameter> {
        self.inputs.iter().find(|p| p.id == id)
    }

    /// Output by id
    #[must_use]
    pub fn output(&self, id: &str) -> Option<&Parameter> {
        self.outputs.iter().find(|p| p.id == id)
    }

    /// Steps, empty unless the process is a workflow
    #[must_use]
    pub fn steps(&self) -> &[Step] {
        match &self.kind {
            ProcessKind::Workflow { steps, .. } => steps,
            _ => &[],
        }
    }

    /// Step by id
    #[must_use]
    pub fn step(&self, id: &str) -> Option<&Step> {
        self.steps().iter().find(|s| s.id == id)
    }

    /// Whether the process is a workflow
    #[inline]
    #[must_use]
    pub fn is_workflow(&self) -> bool {
        matches!(self.kind, ProcessKind::Workflow { .. })
    }

    /// Requirement of `kind` (requirements only, not hints)
    #[must_use]
    pub fn requirement(&self, kind: &RequirementKind) -> Option<&Requirement> {
        self.requirements.iter().find(|r| &r.kind == kind)
    }

    /// Process tree in list form
    ///
    /// `run_of` renders the `run` field of each step from its target.
    #[must_use]
    pub fn to_tree(&self, run_of: &dyn Fn(ProcessId) -> Value) -> Value {
        let mut tree = Map::new();
        tree.insert("id".to_string(), Value::String(self.id.clone()));
        tree.insert("class".to_string(), Value::String(self.class().to_string()));
        tree.extend(self.extra.clone());
        tree.insert(
            "inputs".to_string(),
            Value::Array(self.inputs.iter().map(Parameter::to_tree).collect()),
        );

        let outputs = match &self.kind {
            ProcessKind::Workflow { outputs, .. } => self
                .outputs
                .iter()
                .map(|param| {
                    let mut tree = param.to_tree();
                    if let (Value::Object(map), Some(output)) =
                        (&mut tree, outputs.iter().find(|o| o.id == param.id))
                    {
                        write_binding(map, "outputSource", &output.binding);
                    }
                    tree
                })
                .collect(),
            _ => self.outputs.iter().map(Parameter::to_tree).collect(),
        };
        tree.insert("outputs".to_string(), Value::Array(outputs));
        write_requirements(&mut tree, "requirements", &self.requirements);
        write_requirements(&mut tree, "hints", &self.hints);

        if let ProcessKind::Workflow { steps, .. } = &self.kind {
            let steps = steps.iter().map(|step| step_tree(step, run_of)).collect();
            tree.insert("steps".to_string(), Value::Array(steps));
        }
        Value::Object(tree)
    }
}

fn write_requirements(tree: &mut Map<String, Value>, field: &str, requirements: &[Requirement]) {
    if !requirements.is_empty() {
        tree.insert(
            field.to_string(),
            Value::Array(requirements.iter().map(Requirement::to_tree).collect()),
        );
    }
}

fn write_binding(tree: &mut Map<String, Value>, field: &str, binding: &Binding) {
    let mut sources: Vec<Value> = binding
        .sources
        .iter()
        .map(|s| Value::String(s.to_string()))
        .collect();
    match (binding.source_is_list, sources.len()) {
        (_, 0) => {}
        (false, 1) => {
            tree.insert(field.to_string(), sources.remove(0));
        }
        _ => {
            tree.insert(field.to_string(), Value::Array(sources));
        }
    }
    if let Some(merge) = binding.link_merge {
        tree.insert("linkMerge".to_string(), Value::String(merge.as_str().to_string()));
    }
    if let Some(pick) = binding.pick_value {
        let name = match pick {
            PickValue::FirstNonNull => "first_non_null",
            PickValue::TheOnlyNonNull => "the_only_non_null",
            PickValue::AllNonNull => "all_non_null",
        };
        tree.insert("pickValue".to_string(), Value::String(name.to_string()));
    }
}

fn step_tree(step: &Step, run_of: &dyn Fn(ProcessId) -> Value) -> Value {
    let mut tree = Map::new();
    tree.insert("id".to_string(), Value::String(step.id.clone()));
    tree.insert("run".to_string(), run_of(step.target));
    let inputs = step
        .inputs
        .iter()
        .map(|input| {
            let mut map = Map::new();
            map.insert("id".to_string(), Value::String(input.id.clone()));
            write_binding(&mut map, "source", &input.binding);
            if let Some(default) = &input.default {
                map.insert("default".to_string(), default.clone());
            }
            if let Some(value_from) = &input.value_from {
                map.insert("valueFrom".to_string(), value_from.clone());
            }
            map.extend(input.extra.clone());
            Value::Object(map)
        })
        .collect();
    tree.insert("in".to_string(), Value::Array(inputs));
    tree.insert(
        "out".to_string(),
        Value::Array(step.outputs.iter().cloned().map(Value::String).collect()),
    );
    write_requirements(&mut tree, "requirements", &step.requirements);
    write_requirements(&mut tree, "hints", &step.hints);
    match step.scatter.as_slice() {
        [] => {}
        [single] => {
            tree.insert("scatter".to_string(), Value::String(single.clone()));
        }
        many => {
            tree.insert(
                "scatter".to_string(),
                Value::Array(many.iter().cloned().map(Value::String).collect()),
            );
        }
    }
    if let Some(method) = step.scatter_method {
        let name = match method {
            ScatterMethod::DotProduct => "dotproduct",
            ScatterMethod::NestedCrossproduct => "nested_crossproduct",
            ScatterMethod::FlatCrossproduct => "flat_crossproduct",
        };
        tree.insert("scatterMethod".to_string(), Value::String(name.to_string()));
    }
    if let Some(when) = &step.when {
        tree.insert("when".to_string(), when.clone());
    }
    tree.extend(step.extra.clone());
    Value::Object(tree)
}

/// Typed graph of every process reachable from a root
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessModel {
    version: CwlVersion,
    root: ProcessId,
    processes: Vec<Process>,
}

impl ProcessModel {
    /// Assemble a model
    ///
    /// No invariants are checked here; models built by hand should go
    /// through [`GraphValidator`](crate::GraphValidator).
    #[must_use]
    pub fn new(version: CwlVersion, root: ProcessId, processes: Vec<Process>) -> Self {
        Self {
            version,
            root,
            processes,
        }
    }

    /// Schema version shared by all processes
    #[inline]
    #[must_use]
    pub fn version(&self) -> CwlVersion {
        self.version
    }

    /// Root process id
    #[inline]
    #[must_use]
    pub fn root_id(&self) -> ProcessId {
        self.root
    }

    /// Root process
    ///
    /// # Panics
    /// If the model was assembled with a root outside the arena
    #[must_use]
    pub fn root(&self) -> &Process {
        &self.processes[self.root.0]
    }

    /// All processes in arena order
    #[inline]
    #[must_use]
    pub fn processes(&self) -> &[Process] {
        &self.processes
    }

    /// Processes with their ids
    pub fn iter(&self) -> impl Iterator<Item = (ProcessId, &Process)> {
        self.processes.iter().enumerate().map(|(i, p)| (ProcessId(i), p))
    }

    /// Process by id
    #[must_use]
    pub fn get(&self, id: ProcessId) -> Option<&Process> {
        self.processes.get(id.0)
    }

    /// Process by canonical key
    #[must_use]
    pub fn by_key(&self, key: &str) -> Option<ProcessId> {
        self.processes.iter().position(|p| p.key == key).map(ProcessId)
    }

    /// First process with short id `id`
    #[must_use]
    pub fn find(&self, id: &str) -> Option<ProcessId> {
        self.processes.iter().position(|p| p.id == id).map(ProcessId)
    }

    /// Number of processes
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.processes.len()
    }

    /// Whether the model holds no process
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.processes.is_empty()
    }

    /// Step ids of a workflow in an order that runs producers first
    ///
    /// `None` for unknown ids, non-workflows, and cyclic workflows.
    #[must_use]
    pub fn execution_order(&self, id: ProcessId) -> Option<Vec<&str>> {
        let process = self.get(id)?;
        if !process.is_workflow() {
            return None;
        }
        StepGraph::new(process.steps()).execution_order()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn source_refs() {
        assert_eq!(SourceRef::parse("msg"), SourceRef::WorkflowInput("msg".into()));
        let out = SourceRef::parse("step1/out");
        assert_eq!(out.step(), Some("step1"));
        assert_eq!(out.to_string(), "step1/out");
    }

    #[test]
    fn schema_names() {
        assert_eq!(LinkMerge::parse("merge_flattened"), Some(LinkMerge::MergeFlattened));
        assert_eq!(LinkMerge::MergeNested.as_str(), "merge_nested");
        assert_eq!(PickValue::parse("all_non_null"), Some(PickValue::AllNonNull));
        assert!(!PickValue::AllNonNull.is_single());
        assert_eq!(ScatterMethod::parse("dotproduct"), Some(ScatterMethod::DotProduct));
        assert_eq!(ScatterMethod::parse("cross"), None);
    }

    #[test]
    fn binding_merges() {
        let single = Binding {
            sources: vec![SourceRef::parse("a")],
            ..Binding::default()
        };
        assert!(!single.merges());
        let listed = Binding {
            source_is_list: true,
            ..single.clone()
        };
        assert!(listed.merges());
    }

    #[test]
    fn scatter_depth() {
        let mut step = Step {
            id: "s".into(),
            target: ProcessId(0),
            inputs: Vec::new(),
            outputs: Vec::new(),
            requirements: Vec::new(),
            hints: Vec::new(),
            scatter: vec!["a".into(), "b".into()],
            scatter_method: Some(ScatterMethod::NestedCrossproduct),
            when: None,
            extra: Map::new(),
        };
        assert_eq!(step.scatter_depth(), 2);
        step.scatter_method = Some(ScatterMethod::DotProduct);
        assert_eq!(step.scatter_depth(), 1);
        step.scatter.clear();
        assert_eq!(step.scatter_depth(), 0);
    }

    #[test]
    fn parameter_tree_keeps_fields() {
        let mut fields = Map::new();
        fields.insert("type".into(), json!("int"));
        fields.insert("default".into(), json!(3));
        let param = Parameter {
            id: "count".into(),
            ty: TypeDescriptor::scalar(crate::types::ScalarType::Int),
            optional: false,
            default: Some(json!(3)),
            fields,
        };
        assert!(!param.is_required());
        assert_eq!(param.to_tree(), json!({"id": "count", "type": "int", "default": 3}));
    }
}
