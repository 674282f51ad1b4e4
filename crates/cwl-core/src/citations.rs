//! Software package extraction
//!
//! Walks the model from the root the way a run would: each process, then
//! each of its steps and the process the step runs. A tool reached through
//! two steps is reported twice, once per path.

use cwl_graph::{ProcessId, ProcessModel, Requirement, SoftwarePackage};
use serde::Serialize;
use tracing::trace;

/// Package declared by a process or step
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SoftwareCitation {
    /// Process key, or `process key/step id` for step-level declarations
    pub owner: String,
    /// Declared package
    pub package: SoftwarePackage,
}

/// Every `SoftwareRequirement` package reachable from the root
///
/// Requirements come before hints at each level.
#[must_use]
pub fn software_requirements(model: &ProcessModel) -> Vec<SoftwareCitation> {
    let mut citations = Vec::new();
    let mut path = Vec::new();
    visit(model, model.root_id(), &mut path, &mut citations);
    citations
}

fn visit(model: &ProcessModel, id: ProcessId, path: &mut Vec<ProcessId>, out: &mut Vec<SoftwareCitation>) {
    let Some(process) = model.get(id) else {
        return;
    };
    if path.contains(&id) {
        trace!(process = %process.key, "process already on the path");
        return;
    }
    path.push(id);

    collect(&process.key, &process.requirements, &process.hints, out);
    for step in process.steps() {
        let owner = format!("{}/{}", process.key, step.id);
        collect(&owner, &step.requirements, &step.hints, out);
        visit(model, step.target, path, out);
    }

    path.pop();
}

fn collect(owner: &str, requirements: &[Requirement], hints: &[Requirement], out: &mut Vec<SoftwareCitation>) {
    for requirement in requirements.iter().chain(hints) {
        out.extend(requirement.software_packages().into_iter().map(|package| SoftwareCitation {
            owner: owner.to_string(),
            package,
        }));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cwl_graph::ModelBuilder;
    use cwl_resolver::Resolver;
    use cwl_test_utils::{cat_tool, echo_tool, fetcher_with, CAT_URI, ECHO_URI, WORKFLOW_URI};
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn packages_follow_steps() {
        let mut echo = echo_tool();
        echo["hints"] = json!([{
            "class": "SoftwareRequirement",
            "packages": {"coreutils": {"version": ["9.1"], "specs": ["https://bio.tools/coreutils"]}}
        }]);
        let workflow = json!({
            "cwlVersion": "v1.0",
            "class": "Workflow",
            "inputs": {"msg": "string", "n": "int"},
            "outputs": {},
            "steps": {
                "first": {"run": "tools/echo.cwl", "in": {"message": "msg"}, "out": ["out"]},
                "second": {
                    "run": "tools/cat.cwl",
                    "in": {"file": "first/out", "count": "n"},
                    "out": ["out"],
                    "hints": [{
                        "class": "SoftwareRequirement",
                        "packages": [{"package": "cat"}]
                    }]
                },
                "third": {"run": "tools/echo.cwl", "in": {"message": "msg"}, "out": ["out"]}
            }
        });
        let fetcher = fetcher_with(&[(WORKFLOW_URI, workflow), (ECHO_URI, echo), (CAT_URI, cat_tool())]);
        let graph = Resolver::new(&fetcher).resolve(WORKFLOW_URI).unwrap();
        let model = ModelBuilder::build(&graph).unwrap();

        let citations = software_requirements(&model);
        let owners: Vec<&str> = citations.iter().map(|c| c.owner.as_str()).collect();
        assert_eq!(
            owners,
            vec![
                "file:///fixtures/tools/echo.cwl#echo",
                "file:///fixtures/wf.cwl#wf/second",
                "file:///fixtures/tools/echo.cwl#echo",
            ]
        );
        assert_eq!(citations[0].package.package, "coreutils");
        assert_eq!(citations[0].package.versions, vec!["9.1".to_string()]);
        assert_eq!(citations[0].package.specs, vec!["https://bio.tools/coreutils".to_string()]);
        assert!(citations[1].package.versions.is_empty());
    }

    #[test]
    fn tool_without_packages() {
        let fetcher = fetcher_with(&[(CAT_URI, cat_tool())]);
        let graph = Resolver::new(&fetcher).resolve(CAT_URI).unwrap();
        let model = ModelBuilder::build(&graph).unwrap();
        assert!(software_requirements(&model).is_empty());
    }
}
