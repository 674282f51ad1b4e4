use super::*;
use crate::builder::ModelBuilder;
use crate::types::ScalarType;
use cwl_resolver::Resolver;
use cwl_test_utils::fetcher_with;
use pretty_assertions::assert_eq;
use serde_json::{json, Value};

const WF: &str = "file:///w/wf.cwl";
const WF_KEY: &str = "file:///w/wf.cwl#wf";

fn model(docs: &[(&str, Value)]) -> ProcessModel {
    let fetcher = fetcher_with(docs);
    let graph = Resolver::new(&fetcher).resolve(docs[0].0).unwrap();
    ModelBuilder::build(&graph).unwrap()
}

fn validate(docs: &[(&str, Value)]) -> ValidationResult {
    GraphValidator::default().validate(&model(docs))
}

fn tool(inputs: Value) -> Value {
    json!({
        "cwlVersion": "v1.2",
        "class": "CommandLineTool",
        "baseCommand": "echo",
        "inputs": inputs,
        "outputs": {"out": "stdout"}
    })
}

fn workflow(inputs: Value, outputs: Value, steps: Value) -> Value {
    json!({
        "cwlVersion": "v1.2",
        "class": "Workflow",
        "inputs": inputs,
        "outputs": outputs,
        "steps": steps
    })
}

fn codes(result: &ValidationResult) -> Vec<&'static str> {
    result.iter().map(Diagnostic::code).collect()
}

#[test]
fn linear_workflow_is_valid() {
    let result = validate(&[
        (
            WF,
            workflow(
                json!({"msg": "string"}),
                json!({"final": {"type": "File", "outputSource": "step2/out"}}),
                json!({
                    "step1": {"run": "echo.cwl", "in": {"message": "msg"}, "out": ["out"]},
                    "step2": {"run": "cat.cwl", "in": {"file": "step1/out"}, "out": ["out"]}
                }),
            ),
        ),
        ("file:///w/echo.cwl", tool(json!({"message": "string"}))),
        ("file:///w/cat.cwl", tool(json!({"file": "File", "lines": {"type": "int", "default": 10}}))),
    ]);
    assert!(result.is_valid(), "{:?}", result.diagnostics());
}

#[test]
fn three_step_cycle_yields_one_diagnostic() {
    let result = validate(&[
        (
            WF,
            workflow(
                json!({}),
                json!({}),
                json!({
                    "a": {"run": "cat.cwl", "in": {"file": "c/out"}, "out": ["out"]},
                    "b": {"run": "cat.cwl", "in": {"file": "a/out"}, "out": ["out"]},
                    "c": {"run": "cat.cwl", "in": {"file": "b/out"}, "out": ["out"]}
                }),
            ),
        ),
        ("file:///w/cat.cwl", tool(json!({"file": "File"}))),
    ]);
    assert_eq!(
        result.diagnostics(),
        &[Diagnostic::CyclicDependency {
            workflow: WF_KEY.into(),
            steps: vec!["a".into(), "b".into(), "c".into()],
        }]
    );
}

#[test]
fn missing_required_input() {
    let result = validate(&[
        (
            WF,
            workflow(
                json!({"msg": "string"}),
                json!({"final": {"type": "File", "outputSource": "step1/out"}}),
                json!({"step1": {"run": "echo.cwl", "in": {"message": "msg"}, "out": ["out"]}}),
            ),
        ),
        (
            "file:///w/echo.cwl",
            tool(json!({"message": "string", "count": "int", "sep": "string?"})),
        ),
    ]);
    assert_eq!(
        result.diagnostics(),
        &[Diagnostic::UnsatisfiedInput {
            workflow: WF_KEY.into(),
            step: "step1".into(),
            input: "count".into(),
        }]
    );
}

fn two_sources(requirements: Value) -> Value {
    let mut wf = workflow(
        json!({"a": "string", "b": "string"}),
        json!({"final": {"type": "File", "outputSource": "join/out"}}),
        json!({"join": {"run": "join.cwl", "in": {"words": {"source": ["a", "b"]}}, "out": ["out"]}}),
    );
    wf["requirements"] = requirements;
    wf
}

#[test]
fn several_sources_need_a_merge() {
    let join = ("file:///w/join.cwl", tool(json!({"words": "string[]"})));
    let result = validate(&[(WF, two_sources(json!([]))), join.clone()]);
    assert_eq!(
        result.diagnostics(),
        &[Diagnostic::AmbiguousSource {
            workflow: WF_KEY.into(),
            step: "join".into(),
            input: "words".into(),
            sources: vec!["a".into(), "b".into()],
        }]
    );

    let merged = validate(&[
        (WF, two_sources(json!([{"class": "MultipleInputFeatureRequirement"}]))),
        join,
    ]);
    assert!(merged.is_valid(), "{:?}", merged.diagnostics());
}

fn typed_workflow(input: &str) -> Value {
    workflow(
        json!({"n": input}),
        json!({"final": {"type": "File", "outputSource": "step1/out"}}),
        json!({"step1": {"run": "consume.cwl", "in": {"value": "n"}, "out": ["out"]}}),
    )
}

#[test]
fn type_mismatch_names_both_ends() {
    let result = validate(&[
        (WF, typed_workflow("int")),
        ("file:///w/consume.cwl", tool(json!({"value": "string"}))),
    ]);
    assert_eq!(
        result.diagnostics(),
        &[Diagnostic::TypeMismatch {
            workflow: WF_KEY.into(),
            producer: "n".into(),
            consumer: "step1/value".into(),
            producer_type: TypeDescriptor::scalar(ScalarType::Int),
            consumer_type: TypeDescriptor::scalar(ScalarType::String),
        }]
    );
    assert!(result.to_owned().into_iter().all(|d| d.to_string().contains("cannot feed")));
}

#[test]
fn numeric_widening_is_toggleable() {
    let model = model(&[
        (WF, typed_workflow("int")),
        ("file:///w/consume.cwl", tool(json!({"value": "long"}))),
    ]);
    assert!(GraphValidator::default().validate(&model).is_valid());
    let strict = GraphValidator::new(ValidatorOptions::default().with_numeric_widening(false));
    assert_eq!(codes(&strict.validate(&model)), vec!["TypeMismatchError"]);
}

#[test]
fn nullable_source_needs_optional_input() {
    let result = validate(&[
        (WF, typed_workflow("int?")),
        ("file:///w/consume.cwl", tool(json!({"value": "int"}))),
    ]);
    assert_eq!(
        result.diagnostics(),
        &[Diagnostic::TypeMismatch {
            workflow: WF_KEY.into(),
            producer: "n".into(),
            consumer: "step1/value".into(),
            producer_type: TypeDescriptor::union(vec![
                TypeDescriptor::scalar(ScalarType::Null),
                TypeDescriptor::scalar(ScalarType::Int),
            ]),
            consumer_type: TypeDescriptor::scalar(ScalarType::Int),
        }]
    );
    assert!(result.diagnostics()[0].to_string().contains("null | int"));

    for consumer in [json!("int?"), json!({"type": "int", "default": 1})] {
        let result = validate(&[
            (WF, typed_workflow("int?")),
            ("file:///w/consume.cwl", tool(json!({"value": consumer}))),
        ]);
        assert!(result.is_valid(), "{:?}", result.diagnostics());
    }
}

#[test]
fn step_default_covers_nullable_source() {
    let wf = workflow(
        json!({"n": "int?"}),
        json!({"final": {"type": "File", "outputSource": "step1/out"}}),
        json!({"step1": {"run": "consume.cwl", "in": {"value": {"source": "n", "default": 3}}, "out": ["out"]}}),
    );
    let result = validate(&[(WF, wf), ("file:///w/consume.cwl", tool(json!({"value": "int"})))]);
    assert!(result.is_valid(), "{:?}", result.diagnostics());
}

#[test]
fn nullable_step_output_into_required_workflow_output() {
    let wf = workflow(
        json!({"n": "int"}),
        json!({"final": {"type": "File", "outputSource": "step1/maybe"}}),
        json!({"step1": {"run": "consume.cwl", "in": {"value": "n"}, "out": ["maybe"]}}),
    );
    let mut consume = tool(json!({"value": "int"}));
    consume["outputs"] = json!({"maybe": {"type": "File?", "outputBinding": {"glob": "*.txt"}}});
    let result = validate(&[(WF, wf), ("file:///w/consume.cwl", consume)]);
    assert_eq!(codes(&result), vec!["TypeMismatchError"]);
}

fn scatter_docs(requirements: Value, collect_type: &str) -> Vec<(&'static str, Value)> {
    let mut wf = workflow(
        json!({"names": "string[]"}),
        json!({"all": {"type": "File[]", "outputSource": "greet/out"}}),
        json!({
            "greet": {"run": "echo.cwl", "in": {"message": "names"}, "scatter": "message", "out": ["out"]},
            "collect": {"run": "collect.cwl", "in": {"files": "greet/out"}, "out": ["out"]}
        }),
    );
    wf["requirements"] = requirements;
    vec![
        (WF, wf),
        ("file:///w/echo.cwl", tool(json!({"message": "string"}))),
        ("file:///w/collect.cwl", tool(json!({"files": collect_type}))),
    ]
}

#[test]
fn scatter_wraps_both_ends_in_arrays() {
    let enabled = json!([{"class": "ScatterFeatureRequirement"}]);
    let result = validate(&scatter_docs(enabled.clone(), "File[]"));
    assert!(result.is_valid(), "{:?}", result.diagnostics());

    let result = validate(&scatter_docs(enabled, "File"));
    assert_eq!(codes(&result), vec!["TypeMismatchError"]);
}

#[test]
fn scatter_requires_its_feature() {
    let docs = scatter_docs(json!([]), "File[]");
    let result = validate(&docs);
    assert_eq!(
        result.diagnostics(),
        &[Diagnostic::MissingRequirement {
            workflow: WF_KEY.into(),
            step: "greet".into(),
            requirement: RequirementKind::ScatterFeature,
        }]
    );

    let relaxed = GraphValidator::new(ValidatorOptions::default().with_check_requirements(false));
    assert!(relaxed.validate(&model(&docs)).is_valid());
}

fn nested(requirements: Value) -> Vec<(&'static str, Value)> {
    let mut wf = workflow(
        json!({"names": "string[]"}),
        json!({"all": {"type": "File[]", "outputSource": "inner/outs"}}),
        json!({
            "inner": {
                "run": {
                    "class": "Workflow",
                    "inputs": {"names": "string[]"},
                    "outputs": {"outs": {"type": "File[]", "outputSource": "s/out"}},
                    "steps": {
                        "s": {"run": "echo.cwl", "in": {"message": "names"}, "scatter": "message", "out": ["out"]}
                    }
                },
                "in": {"names": "names"},
                "out": ["outs"]
            }
        }),
    );
    wf["requirements"] = requirements;
    vec![(WF, wf), ("file:///w/echo.cwl", tool(json!({"message": "string"})))]
}

#[test]
fn requirements_are_inherited_by_subworkflows() {
    let result = validate(&nested(json!([
        {"class": "SubworkflowFeatureRequirement"},
        {"class": "ScatterFeatureRequirement"}
    ])));
    assert!(result.is_valid(), "{:?}", result.diagnostics());

    let result = validate(&nested(json!([])));
    let missing: Vec<_> = result
        .iter()
        .map(|d| match d {
            Diagnostic::MissingRequirement { step, requirement, .. } => (step.as_str(), requirement.clone()),
            other => panic!("unexpected {other}"),
        })
        .collect();
    assert_eq!(
        missing,
        vec![
            ("inner", RequirementKind::SubworkflowFeature),
            ("s", RequirementKind::ScatterFeature),
        ]
    );
}

#[test]
fn value_from_skips_types_but_needs_its_feature() {
    let result = validate(&[
        (
            WF,
            workflow(
                json!({"n": "int"}),
                json!({"final": {"type": "File", "outputSource": "step1/out"}}),
                json!({
                    "step1": {
                        "run": "consume.cwl",
                        "in": {"value": {"source": "n", "valueFrom": "$(String(self))"}},
                        "out": ["out"]
                    }
                }),
            ),
        ),
        ("file:///w/consume.cwl", tool(json!({"value": "string"}))),
    ]);
    assert_eq!(codes(&result), vec!["MissingRequirementError"]);
    assert!(matches!(
        &result.diagnostics()[0],
        Diagnostic::MissingRequirement { requirement: RequirementKind::StepInputExpression, .. }
    ));
}

#[test]
fn merge_flattened_and_pick_value() {
    let mut wf = workflow(
        json!({"one": "File", "many": "File[]", "a": "string?", "b": "string?"}),
        json!({"final": {"type": "File", "outputSource": "greet/out"}}),
        json!({
            "collect": {
                "run": "collect.cwl",
                "in": {"files": {"source": ["many", "one"], "linkMerge": "merge_flattened"}},
                "out": ["out"]
            },
            "greet": {
                "run": "echo.cwl",
                "in": {"message": {"source": ["a", "b"], "pickValue": "first_non_null"}},
                "out": ["out"]
            }
        }),
    );
    wf["requirements"] = json!([{"class": "MultipleInputFeatureRequirement"}]);
    let result = validate(&[
        (WF, wf),
        ("file:///w/collect.cwl", tool(json!({"files": "File[]"}))),
        ("file:///w/echo.cwl", tool(json!({"message": "string"}))),
    ]);
    assert!(result.is_valid(), "{:?}", result.diagnostics());
}

#[test]
fn unbound_workflow_output() {
    let result = validate(&[
        (
            WF,
            workflow(
                json!({"msg": "string"}),
                json!({"final": {"type": "File"}}),
                json!({"step1": {"run": "echo.cwl", "in": {"message": "msg"}, "out": ["out"]}}),
            ),
        ),
        ("file:///w/echo.cwl", tool(json!({"message": "string"}))),
    ]);
    assert_eq!(
        result.diagnostics(),
        &[Diagnostic::UnsatisfiedOutput {
            workflow: WF_KEY.into(),
            output: "final".into(),
        }]
    );
}

#[test]
fn checks_run_in_fixed_order() {
    let result = validate(&[
        (
            WF,
            workflow(
                json!({"n": "int"}),
                json!({"final": {"type": "File"}}),
                json!({
                    "a": {"run": "pair.cwl", "in": {"file": "b/out", "count": "n"}, "out": ["out"]},
                    "b": {"run": "pair.cwl", "in": {"file": "a/out"}, "out": ["out"]}
                }),
            ),
        ),
        ("file:///w/pair.cwl", tool(json!({"file": "File", "count": "string"}))),
    ]);
    assert_eq!(
        codes(&result),
        vec![
            "CyclicDependencyError",
            "UnsatisfiedInputError",
            "TypeMismatchError",
            "UnsatisfiedOutputError",
        ]
    );
}

#[test]
fn hand_built_models_are_rechecked_for_duplicates() {
    let built = model(&[
        (
            WF,
            workflow(
                json!({"msg": "string"}),
                json!({"final": {"type": "File", "outputSource": "step1/out"}}),
                json!({"step1": {"run": "echo.cwl", "in": {"message": "msg"}, "out": ["out"]}}),
            ),
        ),
        ("file:///w/echo.cwl", tool(json!({"message": "string"}))),
    ]);
    let mut processes = built.processes().to_vec();
    let root = built.root_id().index();
    if let ProcessKind::Workflow { steps, .. } = &mut processes[root].kind {
        let copy = steps[0].clone();
        steps.push(copy);
    }
    let edited = ProcessModel::new(built.version(), built.root_id(), processes);

    let result = GraphValidator::default().validate(&edited);
    assert_eq!(
        result.diagnostics().first(),
        Some(&Diagnostic::DuplicateIdentifier {
            scope: WF_KEY.into(),
            id: "step1".into(),
        })
    );
    assert_eq!(result.with_code("DuplicateIdentifierError").count(), 1);
}
