//! Testing utilities for the CWL graph workspace
//!
//! Shared document fixtures and instrumented fetchers.

#![allow(missing_docs)]

use cwl_resolver::{DocumentFetcher, FetchError, InMemoryFetcher};
use parking_lot::Mutex;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use url::Url;

pub const WORKFLOW_URI: &str = "file:///fixtures/wf.cwl";
pub const ECHO_URI: &str = "file:///fixtures/tools/echo.cwl";
pub const CAT_URI: &str = "file:///fixtures/tools/cat.cwl";

pub fn echo_tool() -> Value {
    json!({
        "cwlVersion": "v1.0",
        "class": "CommandLineTool",
        "baseCommand": "echo",
        "inputs": {"message": {"type": "string", "inputBinding": {"position": 1}}},
        "outputs": {"out": "stdout"}
    })
}

pub fn cat_tool() -> Value {
    json!({
        "cwlVersion": "v1.0",
        "class": "CommandLineTool",
        "baseCommand": "cat",
        "hints": [{"class": "DockerRequirement", "dockerPull": "debian:stable-slim"}],
        "inputs": {
            "file": {"type": "File", "inputBinding": {"position": 1}},
            "count": "int"
        },
        "outputs": {"out": "stdout"}
    })
}

/// `msg → echo → cat → final`, with `count` supplied by the caller
pub fn two_step_workflow(count: Option<Value>) -> Value {
    let mut cat_in = json!({"file": "step1/out"});
    if let Some(count) = count {
        cat_in["count"] = count;
    }
    json!({
        "cwlVersion": "v1.0",
        "class": "Workflow",
        "inputs": {"msg": "string", "n": "int"},
        "outputs": {"final": {"type": "File", "outputSource": "step2/out"}},
        "steps": {
            "step1": {"run": "tools/echo.cwl", "in": {"message": "msg"}, "out": ["out"]},
            "step2": {"run": "tools/cat.cwl", "in": cat_in, "out": ["out"]}
        }
    })
}

/// Steps `A → B → C → A`
pub fn cyclic_workflow() -> Value {
    json!({
        "cwlVersion": "v1.0",
        "class": "Workflow",
        "inputs": {},
        "outputs": {},
        "steps": {
            "A": {"run": "tools/cat.cwl", "in": {"file": "C/out", "count": {"default": 1}}, "out": ["out"]},
            "B": {"run": "tools/cat.cwl", "in": {"file": "A/out", "count": {"default": 1}}, "out": ["out"]},
            "C": {"run": "tools/cat.cwl", "in": {"file": "B/out", "count": {"default": 1}}, "out": ["out"]}
        }
    })
}

/// Fetcher holding the workflow under [`WORKFLOW_URI`] and both tools
pub fn fixture_fetcher(workflow: Value) -> InMemoryFetcher {
    fetcher_with(&[(WORKFLOW_URI, workflow), (ECHO_URI, echo_tool()), (CAT_URI, cat_tool())])
}

pub fn fetcher_with(documents: &[(&str, Value)]) -> InMemoryFetcher {
    let mut fetcher = InMemoryFetcher::new();
    for (uri, tree) in documents {
        fetcher.insert(uri, tree.clone()).unwrap();
    }
    fetcher
}

/// Write `tree` as YAML to `dir/name` and return the path
pub fn write_yaml(dir: &Path, name: &str, tree: &Value) -> PathBuf {
    let path = dir.join(name);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).unwrap();
    }
    std::fs::write(&path, serde_yaml::to_string(tree).unwrap()).unwrap();
    path
}

/// Fetcher wrapper recording how often each URI is fetched
#[derive(Debug)]
pub struct CountingFetcher<F> {
    inner: F,
    counts: Mutex<HashMap<String, usize>>,
}

impl<F: DocumentFetcher> CountingFetcher<F> {
    pub fn new(inner: F) -> Self {
        Self {
            inner,
            counts: Mutex::new(HashMap::new()),
        }
    }

    pub fn fetches(&self, uri: &str) -> usize {
        self.counts.lock().get(uri).copied().unwrap_or(0)
    }

    pub fn total(&self) -> usize {
        self.counts.lock().values().sum()
    }

    /// Highest fetch count of any single URI
    pub fn max_per_uri(&self) -> usize {
        self.counts.lock().values().copied().max().unwrap_or(0)
    }

    pub fn reset(&self) {
        self.counts.lock().clear();
    }
}

impl<F: DocumentFetcher> DocumentFetcher for CountingFetcher<F> {
    fn fetch(&self, uri: &Url) -> Result<Value, FetchError> {
        *self.counts.lock().entry(uri.to_string()).or_default() += 1;
        self.inner.fetch(uri)
    }
}
