//! Graph validator
//!
//! Validation never fails; every problem becomes a [`Diagnostic`]. For each
//! process, in model order, the checks run in a fixed sequence:
//!
//! 1. identifier scopes
//! 2. step dependency cycles
//! 3. step input satisfaction
//! 4. type compatibility of step inputs and workflow outputs
//! 5. feature requirements (optional)
//! 6. workflow output sources

mod diagnostic;

pub use diagnostic::Diagnostic;

use crate::dag::StepGraph;
use crate::model::{
    Binding, LinkMerge, Parameter, Process, ProcessId, ProcessKind, ProcessModel, SourceRef, Step,
    StepInput,
};
use crate::requirement::RequirementKind;
use crate::types::{ParsedType, ScalarType, TypeDescriptor, TypeRules};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashSet};
use tracing::{debug, trace};

/// Validator settings
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ValidatorOptions {
    /// Report steps using features their workflow did not require
    pub check_requirements: bool,
    /// Type compatibility rules
    pub type_rules: TypeRules,
}

impl Default for ValidatorOptions {
    fn default() -> Self {
        Self {
            check_requirements: true,
            type_rules: TypeRules::default(),
        }
    }
}

impl ValidatorOptions {
    /// Toggle the feature-requirement check
    #[inline]
    #[must_use]
    pub fn with_check_requirements(mut self, enabled: bool) -> Self {
        self.check_requirements = enabled;
        self
    }

    /// Toggle numeric widening
    #[inline]
    #[must_use]
    pub fn with_numeric_widening(mut self, enabled: bool) -> Self {
        self.type_rules.numeric_widening = enabled;
        self
    }
}

/// Diagnostics of one validation run, in check order
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ValidationResult {
    diagnostics: Vec<Diagnostic>,
}

impl ValidationResult {
    /// Whether no problem was found
    #[inline]
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.diagnostics.is_empty()
    }

    /// All diagnostics
    #[inline]
    #[must_use]
    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    /// Number of diagnostics
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.diagnostics.len()
    }

    /// Same as [`is_valid`](Self::is_valid)
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.diagnostics.is_empty()
    }

    /// Iterate diagnostics
    pub fn iter(&self) -> std::slice::Iter<'_, Diagnostic> {
        self.diagnostics.iter()
    }

    /// Diagnostics with taxonomy name `code`
    pub fn with_code<'a>(&'a self, code: &'a str) -> impl Iterator<Item = &'a Diagnostic> {
        self.diagnostics.iter().filter(move |d| d.code() == code)
    }
}

impl IntoIterator for ValidationResult {
    type Item = Diagnostic;
    type IntoIter = std::vec::IntoIter<Diagnostic>;

    fn into_iter(self) -> Self::IntoIter {
        self.diagnostics.into_iter()
    }
}

impl<'a> IntoIterator for &'a ValidationResult {
    type Item = &'a Diagnostic;
    type IntoIter = std::slice::Iter<'a, Diagnostic>;

    fn into_iter(self) -> Self::IntoIter {
        self.diagnostics.iter()
    }
}

/// Structural and type validator for [`ProcessModel`]s
#[derive(Debug, Clone, Copy, Default)]
pub struct GraphValidator {
    options: ValidatorOptions,
}

impl GraphValidator {
    /// Validator with `options`
    #[must_use]
    pub fn new(options: ValidatorOptions) -> Self {
        Self { options }
    }

    /// Settings in use
    #[inline]
    #[must_use]
    pub fn options(&self) -> &ValidatorOptions {
        &self.options
    }

    /// Check every process of `model`
    #[must_use]
    pub fn validate(&self, model: &ProcessModel) -> ValidationResult {
        let contexts = requirement_contexts(model);
        let mut diagnostics = Vec::new();
        for (id, process) in model.iter() {
            let before = diagnostics.len();
            let check = Check {
                model,
                process,
                rules: &self.options.type_rules,
                features: &contexts[id.index()],
            };
            check.run(self.options.check_requirements, &mut diagnostics);
            trace!(
                process = %process.key,
                diagnostics = diagnostics.len() - before,
                "process validated"
            );
        }
        debug!(diagnostics = diagnostics.len(), "validation complete");
        ValidationResult { diagnostics }
    }
}

/// Requirement classes in effect for each process
///
/// Requirements flow from the root down through steps; a process reached
/// along several paths keeps the context of the first path found.
/// Processes unreachable from the root get only their own requirements.
fn requirement_contexts(model: &ProcessModel) -> Vec<BTreeSet<RequirementKind>> {
    let own = |process: &Process| -> BTreeSet<RequirementKind> {
        process.requirements.iter().map(|r| r.kind.clone()).collect()
    };
    let mut contexts: Vec<Option<BTreeSet<RequirementKind>>> = vec![None; model.len()];
    let mut stack: Vec<(ProcessId, BTreeSet<RequirementKind>)> = Vec::new();
    if model.get(model.root_id()).is_some() {
        stack.push((model.root_id(), BTreeSet::new()));
    }
    while let Some((id, inherited)) = stack.pop() {
        let Some(process) = model.get(id) else { continue };
        if contexts[id.index()].is_some() {
            continue;
        }
        let mut context = inherited;
        context.extend(own(process));
        for step in process.steps().iter().rev() {
            let mut child = context.clone();
            child.extend(step.requirements.iter().map(|r| r.kind.clone()));
            stack.push((step.target, child));
        }
        contexts[id.index()] = Some(context);
    }
    model
        .processes()
        .iter()
        .zip(contexts)
        .map(|(process, context)| context.unwrap_or_else(|| own(process)))
        .collect()
}

/// `ty` without its `null` members
fn strip_null(ty: TypeDescriptor) -> TypeDescriptor {
    let null = TypeDescriptor::scalar(ScalarType::Null);
    match ty {
        TypeDescriptor::Union { members } => {
            TypeDescriptor::union(members.into_iter().filter(|member| *member != null).collect())
        }
        ty => ty,
    }
}

/// Every id that occurs more than once, in order of first repetition
fn duplicates<'a>(ids: impl IntoIterator<Item = &'a str>) -> Vec<&'a str> {
    let mut seen = HashSet::new();
    let mut repeated = Vec::new();
    for id in ids {
        if !seen.insert(id) && !repeated.contains(&id) {
            repeated.push(id);
        }
    }
    repeated
}

struct Check<'a> {
    model: &'a ProcessModel,
    process: &'a Process,
    rules: &'a TypeRules,
    features: &'a BTreeSet<RequirementKind>,
}

impl Check<'_> {
    fn run(&self, check_requirements: bool, out: &mut Vec<Diagnostic>) {
        self.identifiers(out);
        if !self.process.is_workflow() {
            return;
        }
        self.cycles(out);
        self.satisfaction(out);
        self.types(out);
        if check_requirements {
            self.requirements(out);
        }
        self.outputs(out);
    }

    fn workflow(&self) -> String {
        self.process.key.clone()
    }

    fn has(&self, step: &Step, kind: &RequirementKind) -> bool {
        self.features.contains(kind) || step.requirements.iter().any(|r| &r.kind == kind)
    }

    fn identifiers(&self, out: &mut Vec<Diagnostic>) {
        let process = self.process;
        let duplicate = |scope: &str, id: &str| Diagnostic::DuplicateIdentifier {
            scope: scope.to_string(),
            id: id.to_string(),
        };
        let params = process.inputs.iter().chain(&process.outputs).map(|p| p.id.as_str());
        for id in duplicates(params) {
            out.push(duplicate(&process.key, id));
        }
        for id in duplicates(process.steps().iter().map(|s| s.id.as_str())) {
            out.push(duplicate(&process.key, id));
        }
        for step in process.steps() {
            let scope = format!("{}/{}", process.key, step.id);
            let inputs = duplicates(step.inputs.iter().map(|i| i.id.as_str()));
            let outputs = duplicates(step.outputs.iter().map(String::as_str));
            for id in inputs.into_iter().chain(outputs) {
                out.push(duplicate(&scope, id));
            }
        }
    }

    fn cycles(&self, out: &mut Vec<Diagnostic>) {
        for steps in StepGraph::new(self.process.steps()).cycles() {
            out.push(Diagnostic::CyclicDependency {
                workflow: self.workflow(),
                steps: steps.into_iter().map(ToString::to_string).collect(),
            });
        }
    }

    fn satisfaction(&self, out: &mut Vec<Diagnostic>) {
        for step in self.process.steps() {
            let Some(target) = self.model.get(step.target) else { continue };
            for param in target.inputs.iter().filter(|p| p.is_required()) {
                if !step.input(&param.id).is_some_and(StepInput::is_satisfied) {
                    out.push(Diagnostic::UnsatisfiedInput {
                        workflow: self.workflow(),
                        step: step.id.clone(),
                        input: param.id.clone(),
                    });
                }
            }
            for input in &step.inputs {
                if self.is_ambiguous(step, &input.binding) {
                    out.push(Diagnostic::AmbiguousSource {
                        workflow: self.workflow(),
                        step: step.id.clone(),
                        input: input.id.clone(),
                        sources: input.binding.sources.iter().map(ToString::to_string).collect(),
                    });
                }
            }
        }
    }

    fn is_ambiguous(&self, step: &Step, binding: &Binding) -> bool {
        binding.sources.len() > 1
            && binding.link_merge.is_none()
            && !self.has(step, &RequirementKind::MultipleInputFeature)
    }

    fn types(&self, out: &mut Vec<Diagnostic>) {
        for step in self.process.steps() {
            let Some(target) = self.model.get(step.target) else { continue };
            for input in &step.inputs {
                if input.value_from.is_some()
                    || input.binding.sources.is_empty()
                    || self.is_ambiguous(step, &input.binding)
                {
                    continue;
                }
                let Some(param) = target.input(&input.id) else { continue };
                let Some(producer) = self.combined(&input.binding) else { continue };
                let ty = if step.scatter.contains(&input.id) {
                    TypeDescriptor::array(param.ty.clone())
                } else {
                    param.ty.clone()
                };
                // a default stands in for a null delivered by the source
                let consumer = ParsedType {
                    ty,
                    optional: param.optional || param.default.is_some() || input.default.is_some(),
                };
                let name = format!("{}/{}", step.id, input.id);
                self.compare(&input.binding, name, &producer, &consumer, out);
            }
        }

        if let ProcessKind::Workflow { outputs, .. } = &self.process.kind {
            for output in outputs {
                if output.binding.sources.is_empty() {
                    continue;
                }
                let Some(param) = self.process.output(&output.id) else { continue };
                let Some(producer) = self.combined(&output.binding) else { continue };
                self.compare(&output.binding, output.id.clone(), &producer, &param.parsed_type(), out);
            }
        }
    }

    fn compare(
        &self,
        binding: &Binding,
        consumer: String,
        producer_type: &ParsedType,
        consumer_type: &ParsedType,
        out: &mut Vec<Diagnostic>,
    ) {
        if self.rules.accepts(producer_type, consumer_type) {
            return;
        }
        let producer = binding
            .sources
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(", ");
        out.push(Diagnostic::TypeMismatch {
            workflow: self.workflow(),
            producer,
            consumer,
            producer_type: producer_type.descriptor(),
            consumer_type: consumer_type.descriptor(),
        });
    }

    /// Type of a single source, arrays added for scattered producers
    ///
    /// A scattered step always delivers an array, so only the unscattered
    /// output keeps its nullability. Array items carry none.
    fn source_type(&self, source: &SourceRef) -> Option<ParsedType> {
        match source {
            SourceRef::WorkflowInput(id) => self.process.input(id).map(Parameter::parsed_type),
            SourceRef::StepOutput { step, output } => {
                let step = self.process.step(step)?;
                let param = self.model.get(step.target)?.output(output)?;
                let depth = step.scatter_depth();
                if depth == 0 {
                    return Some(param.parsed_type());
                }
                let ty = (0..depth).fold(param.ty.clone(), |ty, _| TypeDescriptor::array(ty));
                Some(ParsedType { ty, optional: false })
            }
        }
    }

    /// Effective type delivered by a binding; `None` if a source is unknown
    fn combined(&self, binding: &Binding) -> Option<ParsedType> {
        let types = binding
            .sources
            .iter()
            .map(|source| self.source_type(source))
            .collect::<Option<Vec<_>>>()?;
        let merge = match binding.link_merge {
            Some(merge) => Some(merge),
            None if binding.merges() => Some(LinkMerge::MergeNested),
            None => None,
        };
        let merged = match merge {
            None => return types.into_iter().next(),
            Some(LinkMerge::MergeNested) => {
                let items = types.into_iter().map(|parsed| parsed.ty).collect();
                TypeDescriptor::array(TypeDescriptor::union(items))
            }
            Some(LinkMerge::MergeFlattened) => {
                let items = types
                    .into_iter()
                    .map(|parsed| match parsed.ty {
                        TypeDescriptor::Array { items } => *items,
                        other => other,
                    })
                    .collect();
                TypeDescriptor::array(TypeDescriptor::union(items))
            }
        };
        // pickValue never yields null
        let ty = match (binding.pick_value, merged) {
            (Some(pick), TypeDescriptor::Array { items }) if pick.is_single() => strip_null(*items),
            (_, merged) => merged,
        };
        Some(ParsedType { ty, optional: false })
    }

    fn requirements(&self, out: &mut Vec<Diagnostic>) {
        for step in self.process.steps() {
            let mut missing = Vec::new();
            if self.model.get(step.target).is_some_and(Process::is_workflow)
                && !self.has(step, &RequirementKind::SubworkflowFeature)
            {
                missing.push(RequirementKind::SubworkflowFeature);
            }
            if step.is_scattered() && !self.has(step, &RequirementKind::ScatterFeature) {
                missing.push(RequirementKind::ScatterFeature);
            }
            if step.inputs.iter().any(|i| i.value_from.is_some())
                && !self.has(step, &RequirementKind::StepInputExpression)
            {
                missing.push(RequirementKind::StepInputExpression);
            }
            for requirement in missing {
                out.push(Diagnostic::MissingRequirement {
                    workflow: self.workflow(),
                    step: step.id.clone(),
                    requirement,
                });
            }
        }
    }

    fn outputs(&self, out: &mut Vec<Diagnostic>) {
        let ProcessKind::Workflow { outputs, .. } = &self.process.kind else {
            return;
        };
        for param in &self.process.outputs {
            let bound = outputs
                .iter()
                .find(|o| o.id == param.id)
                .is_some_and(|o| !o.binding.sources.is_empty());
            if !bound {
                out.push(Diagnostic::UnsatisfiedOutput {
                    workflow: self.workflow(),
                    output: param.id.clone(),
                });
            }
        }
    }
}

#[cfg(test)]
mod tests;
