//! Reference resolution
//!
//! Starting from a root reference, documents are fetched, normalized and
//! linked:
//!
//! 1. `$import` directives are replaced by the imported content
//! 2. id-map fields are expanded and identifiers shortened
//! 3. step `run` references are followed (fetching, selecting from a
//!    `$graph`, or materializing an inline process as its own document)
//!    and rewritten to canonical process keys
//! 4. step sources and workflow `outputSource`s are checked and rewritten
//!    to `input` or `step/output`
//! 5. named types from `SchemaDefRequirement` are inlined
//!
//! A document is fetched at most once per [`Resolver`]; every request gets
//! a fresh resolver and so a fresh cache.

use crate::cache::{DocumentIndex, Lookup, ResolutionCache};
use crate::error::ResolveError;
use crate::fetch::DocumentFetcher;
use crate::graph::{ProcessHandle, ResolvedGraph};
use crate::normalize::{list, list_mut, normalize_process};
use cwl_document::idmap::class_of;
use cwl_document::{
    scoped_fragment, shortname, CwlVersion, Document, DocumentError, DocumentUri, Map, Reference,
    Value,
};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use tracing::{debug, trace};

/// Type names that never refer to a `SchemaDefRequirement` entry
const BUILTIN_TYPES: [&str; 12] = [
    "null", "boolean", "int", "long", "float", "double", "string", "File", "Directory", "Any",
    "stdout", "stderr",
];

/// Named types visible to a document
type NamedTypes = IndexMap<String, Value>;

/// Resolver limits
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResolverOptions {
    /// Maximum number of documents (fetched and inline) per request
    pub max_documents: usize,
}

impl ResolverOptions {
    /// Override the document limit
    #[inline]
    #[must_use]
    pub fn with_max_documents(mut self, max_documents: usize) -> Self {
        self.max_documents = max_documents;
        self
    }
}

impl Default for ResolverOptions {
    fn default() -> Self {
        Self { max_documents: 256 }
    }
}

/// Single-request resolver
///
/// # Example
///
/// ```rust
/// use cwl_resolver::{InMemoryFetcher, Resolver};
/// use serde_json::json;
///
/// let fetcher = InMemoryFetcher::new()
///     .with_document("file:///w/echo.cwl", json!({
///         "cwlVersion": "v1.2",
///         "class": "CommandLineTool",
///         "baseCommand": "echo",
///         "inputs": {"message": "string"},
///         "outputs": {}
///     }))
///     .unwrap();
///
/// let graph = Resolver::new(&fetcher).resolve("file:///w/echo.cwl").unwrap();
/// assert_eq!(graph.documents().len(), 1);
/// assert_eq!(graph.process(graph.root()).unwrap()["id"], "echo");
/// ```
pub struct Resolver<'f, F: DocumentFetcher + ?Sized> {
    fetcher: &'f F,
    options: ResolverOptions,
    cache: ResolutionCache,
    stack: Vec<DocumentUri>,
    targets: IndexMap<String, ProcessHandle>,
}

impl<'f, F: DocumentFetcher + ?Sized> Resolver<'f, F> {
    /// Create resolver with default limits
    #[must_use]
    pub fn new(fetcher: &'f F) -> Self {
        Self::with_options(fetcher, ResolverOptions::default())
    }

    /// Create resolver with explicit limits
    #[must_use]
    pub fn with_options(fetcher: &'f F, options: ResolverOptions) -> Self {
        Self {
            fetcher,
            options,
            cache: ResolutionCache::new(),
            stack: Vec::new(),
            targets: IndexMap::new(),
        }
    }

    /// Resolve everything reachable from `root`
    ///
    /// `root` is an absolute URI, optionally with a fragment selecting a
    /// process from a `$graph`.
    ///
    /// # Errors
    /// - `UnresolvedReference` for anything that cannot be fetched or found
    /// - `CyclicImport` when a document requires itself
    /// - `RecursiveType` for self-referencing named types
    /// - `TooManyDocuments` past the configured limit
    /// - `Document` for shape and version errors
    pub fn resolve(mut self, root: &str) -> Result<ResolvedGraph, ResolveError> {
        let reference = Reference::parse(root)?;
        debug!(root = %reference, "resolving");

        let document = self.load(&reference.document, None, root, &reference.document)?;
        let process = self.select(document, reference.fragment.as_deref(), root, &reference.document)?;

        let (documents, stats) = self.cache.into_documents();
        debug!(
            documents = stats.documents,
            fetches = stats.fetches,
            hits = stats.hits,
            "resolution complete"
        );
        Ok(ResolvedGraph::new(
            documents,
            self.targets,
            ProcessHandle { document, process },
            stats,
        ))
    }

    /// Load a fetched document, from cache when possible
    fn load(
        &mut self,
        uri: &DocumentUri,
        inherited: Option<CwlVersion>,
        raw: &str,
        referrer: &DocumentUri,
    ) -> Result<DocumentIndex, ResolveError> {
        match self.cache.lookup(uri) {
            Some(Lookup::Resolved(index)) => {
                trace!(uri = %uri, "document cache hit");
                return Ok(index);
            }
            Some(Lookup::InProgress) => return Err(self.cycle(uri)),
            None => {}
        }
        let tree = self.fetch_tree(uri, raw, referrer)?;
        self.materialize(uri.clone(), tree, inherited, NamedTypes::new())
    }

    fn fetch_tree(
        &mut self,
        uri: &DocumentUri,
        raw: &str,
        referrer: &DocumentUri,
    ) -> Result<Value, ResolveError> {
        if let Some(tree) = self.cache.tree(uri) {
            trace!(uri = %uri, "tree cache hit");
            return Ok(tree);
        }
        debug!(uri = %uri, "fetching document");
        let tree = self
            .fetcher
            .fetch(uri.as_url())
            .map_err(|e| ResolveError::unresolved(raw, referrer, e))?;
        self.cache.store_tree(uri.clone(), tree.clone());
        Ok(tree)
    }

    fn cycle(&self, uri: &DocumentUri) -> ResolveError {
        let start = self.stack.iter().position(|u| u == uri).unwrap_or(0);
        let mut chain: Vec<String> = self.stack[start..].iter().map(ToString::to_string).collect();
        chain.push(uri.to_string());
        ResolveError::CyclicImport { chain }
    }

    /// Build a document from its tree and store it in the arena
    fn materialize(
        &mut self,
        uri: DocumentUri,
        tree: Value,
        inherited: Option<CwlVersion>,
        types: NamedTypes,
    ) -> Result<DocumentIndex, ResolveError> {
        if self.cache.len() >= self.options.max_documents {
            return Err(ResolveError::TooManyDocuments {
                limit: self.options.max_documents,
            });
        }
        let index = self.cache.begin(uri.clone());
        self.stack.push(uri.clone());
        let result = self.build_document(index, &uri, tree, inherited, types);
        self.stack.pop();
        let document = result?;
        trace!(uri = %uri, processes = document.processes().len(), "document resolved");
        self.cache.complete(index, document);
        Ok(index)
    }

    fn build_document(
        &mut self,
        index: DocumentIndex,
        uri: &DocumentUri,
        tree: Value,
        inherited: Option<CwlVersion>,
        mut types: NamedTypes,
    ) -> Result<Document, ResolveError> {
        let file = DocumentUri::from_url(uri.as_url().clone());
        let tree = self.expand_imports(uri, tree, &mut vec![file])?;
        let document = Document::from_tree(uri.clone(), tree, inherited)?;
        let version = document.version();

        let mut processes = Vec::with_capacity(document.processes().len());
        for process in document.processes() {
            let Value::Object(mut process) = process.clone() else {
                return Err(DocumentError::malformed(uri, "process must be a mapping").into());
            };
            normalize_process(&mut process).map_err(|e| DocumentError::malformed(uri, e.to_string()))?;
            collect_named_types(&process, &mut types);
            processes.push(process);
        }

        for (position, process) in processes.iter().enumerate() {
            let id = process_id(process);
            self.targets.insert(
                uri.process_key(id),
                ProcessHandle {
                    document: index,
                    process: position,
                },
            );
        }

        for process in &mut processes {
            inline_process_types(uri, process, &types)?;
            if class_of_map(process) == Some("Workflow") {
                self.link_steps(uri, version, process, &types)?;
                link_sources(uri, process)?;
            }
        }

        Ok(document.with_processes(processes.into_iter().map(Value::Object).collect()))
    }

    /// Select a process from an arena document
    fn select(
        &self,
        index: DocumentIndex,
        fragment: Option<&str>,
        raw: &str,
        referrer: &DocumentUri,
    ) -> Result<usize, ResolveError> {
        let document = self
            .cache
            .document(index)
            .ok_or_else(|| ResolveError::unresolved(raw, referrer, "document is still being resolved"))?;
        document
            .select(fragment.map(shortname))
            .map_err(|e| ResolveError::unresolved(raw, referrer, e))
    }

    /// Follow every step `run` and rewrite it to a canonical key
    fn link_steps(
        &mut self,
        uri: &DocumentUri,
        version: CwlVersion,
        process: &mut Map<String, Value>,
        types: &NamedTypes,
    ) -> Result<(), ResolveError> {
        let owner = process_id(process).to_string();
        for step in list_mut(process, "steps") {
            let Value::Object(step) = step else {
                return Err(DocumentError::malformed(uri, "steps must be mappings").into());
            };
            let step_id = step.get("id").and_then(Value::as_str).unwrap_or_default().to_string();
            let Some(run) = step.get_mut("run").map(Value::take) else {
                continue;
            };
            let key = match run {
                Value::String(raw) => self.link_reference(uri, version, &raw)?,
                tree @ Value::Object(_) => {
                    let inline = uri.inline(&owner, &step_id);
                    trace!(uri = %inline, "materializing inline process");
                    let index = self.materialize(inline.clone(), tree, Some(version), types.clone())?;
                    let id = self.process_id_at(index, 0).unwrap_or_default();
                    inline.process_key(&id)
                }
                other => {
                    return Err(DocumentError::malformed(
                        uri,
                        format!("step '{step_id}' has a run of unexpected shape: {other}"),
                    )
                    .into())
                }
            };
            step.insert("run".to_string(), Value::String(key));
        }
        Ok(())
    }

    fn link_reference(
        &mut self,
        uri: &DocumentUri,
        version: CwlVersion,
        raw: &str,
    ) -> Result<String, ResolveError> {
        // Inline documents resolve relative to the file that holds them.
        let file = DocumentUri::from_url(uri.as_url().clone());
        let reference =
            Reference::resolve(&file, raw).map_err(|e| ResolveError::unresolved(raw, uri, e))?;

        if reference.is_local_to(&file) {
            let Some(fragment) = reference.fragment.as_deref() else {
                return Err(ResolveError::unresolved(raw, uri, "a document cannot run itself"));
            };
            let key = file.process_key(shortname(fragment));
            if !self.targets.contains_key(&key) {
                return Err(ResolveError::unresolved(
                    raw,
                    uri,
                    format!("no process '{}' in {file}", shortname(fragment)),
                ));
            }
            return Ok(key);
        }

        let target = self.load(&reference.document, Some(version), raw, uri)?;
        let position = self.select(target, reference.fragment.as_deref(), raw, uri)?;
        let id = self.process_id_at(target, position).unwrap_or_default();
        Ok(reference.document.process_key(&id))
    }

    fn process_id_at(&self, index: DocumentIndex, position: usize) -> Option<String> {
        self.cache
            .document(index)?
            .processes()
            .get(position)?
            .get("id")?
            .as_str()
            .map(ToString::to_string)
    }

    /// Replace `{$import: ref}` nodes with the referenced content
    fn expand_imports(
        &mut self,
        base: &DocumentUri,
        value: Value,
        chain: &mut Vec<DocumentUri>,
    ) -> Result<Value, ResolveError> {
        match value {
            Value::Object(map) => {
                if map.len() == 1 {
                    if let Some(Value::String(raw)) = map.get("$import") {
                        let raw = raw.clone();
                        return self.import(base, &raw, chain);
                    }
                }
                let mut expanded = Map::with_capacity(map.len());
                for (key, value) in map {
                    let value = self.expand_imports(base, value, chain)?;
                    expanded.insert(key, value);
                }
                Ok(Value::Object(expanded))
            }
            Value::Array(items) => items
                .into_iter()
                .map(|item| self.expand_imports(base, item, chain))
                .collect::<Result<Vec<_>, _>>()
                .map(Value::Array),
            other => Ok(other),
        }
    }

    fn import(
        &mut self,
        base: &DocumentUri,
        raw: &str,
        chain: &mut Vec<DocumentUri>,
    ) -> Result<Value, ResolveError> {
        let file = DocumentUri::from_url(base.as_url().clone());
        let reference =
            Reference::resolve(&file, raw).map_err(|e| ResolveError::unresolved(raw, base, e))?;
        let target = reference.document;
        if chain.contains(&target) {
            let mut names: Vec<String> = chain.iter().map(ToString::to_string).collect();
            names.push(target.to_string());
            return Err(ResolveError::CyclicImport { chain: names });
        }

        let tree = self.fetch_tree(&target, raw, base)?;
        chain.push(target.clone());
        let expanded = self.expand_imports(&target, tree, chain);
        chain.pop();
        let expanded = expanded?;

        match reference.fragment {
            None => Ok(expanded),
            Some(fragment) => find_by_name(&expanded, shortname(&fragment))
                .cloned()
                .ok_or_else(|| ResolveError::unresolved(raw, base, "fragment not found in imported document")),
        }
    }
}

fn process_id(process: &Map<String, Value>) -> &str {
    process.get("id").and_then(Value::as_str).unwrap_or_default()
}

fn class_of_map(process: &Map<String, Value>) -> Option<&str> {
    process.get("class").and_then(Value::as_str)
}

/// First node in `value` whose `id` or `name` has short name `name`
fn find_by_name<'a>(value: &'a Value, name: &str) -> Option<&'a Value> {
    match value {
        Value::Object(map) => {
            let matches = ["id", "name"]
                .iter()
                .filter_map(|key| map.get(*key).and_then(Value::as_str))
                .any(|id| shortname(id) == name);
            if matches {
                return Some(value);
            }
            map.values().find_map(|v| find_by_name(v, name))
        }
        Value::Array(items) => items.iter().find_map(|v| find_by_name(v, name)),
        _ => None,
    }
}

fn collect_named_types(process: &Map<String, Value>, types: &mut NamedTypes) {
    for requirement in list(process, "requirements").chain(list(process, "hints")) {
        if class_of(requirement) != Some("SchemaDefRequirement") {
            continue;
        }
        let entries = requirement.get("types").and_then(Value::as_array).into_iter().flatten();
        // An imported list of types lands as a nested list.
        for entry in entries.flat_map(|e| e.as_array().map_or_else(|| vec![e], |v| v.iter().collect())) {
            if let Some(name) = entry.get("name").and_then(Value::as_str) {
                types.insert(shortname(name).to_string(), entry.clone());
            }
        }
    }
}

fn inline_process_types(
    uri: &DocumentUri,
    process: &mut Map<String, Value>,
    types: &NamedTypes,
) -> Result<(), ResolveError> {
    for field in ["inputs", "outputs"] {
        for param in list_mut(process, field) {
            if let Some(ty) = param.get_mut("type") {
                inline_named_types(uri, ty, types, &mut Vec::new())?;
            }
        }
    }
    Ok(())
}

/// Split `T[]?` shorthand into `(T, is_array, is_optional)`
fn split_shorthand(raw: &str) -> (&str, bool, bool) {
    let (rest, optional) = raw.strip_suffix('?').map_or((raw, false), |r| (r, true));
    let (base, array) = rest.strip_suffix("[]").map_or((rest, false), |r| (r, true));
    (base, array, optional)
}

/// Replace references to named types with their definitions
fn inline_named_types(
    uri: &DocumentUri,
    ty: &mut Value,
    types: &NamedTypes,
    stack: &mut Vec<String>,
) -> Result<(), ResolveError> {
    match ty {
        Value::String(raw) => {
            let (base, array, optional) = split_shorthand(raw);
            if BUILTIN_TYPES.contains(&base) {
                return Ok(());
            }
            let name = shortname(base).to_string();
            if stack.contains(&name) {
                return Err(ResolveError::RecursiveType {
                    name,
                    document: uri.to_string(),
                });
            }
            let Some(definition) = types.get(&name) else {
                return Err(ResolveError::unresolved(raw.clone(), uri, "unknown type"));
            };
            let mut resolved = definition.clone();
            stack.push(name);
            inline_named_types(uri, &mut resolved, types, stack)?;
            stack.pop();
            if array {
                let mut wrapper = Map::new();
                wrapper.insert("type".to_string(), Value::String("array".to_string()));
                wrapper.insert("items".to_string(), resolved);
                resolved = Value::Object(wrapper);
            }
            if optional {
                resolved = Value::Array(vec![Value::String("null".to_string()), resolved]);
            }
            *ty = resolved;
        }
        Value::Array(members) => {
            for member in members {
                inline_named_types(uri, member, types, stack)?;
            }
        }
        Value::Object(obj) => {
            let kind = obj.get("type").and_then(Value::as_str).map(str::to_owned);
            match kind.as_deref() {
                Some("enum") => {}
                Some("array") => {
                    if let Some(items) = obj.get_mut("items") {
                        inline_named_types(uri, items, types, stack)?;
                    }
                }
                Some("record") => {
                    let name = obj.get("name").and_then(Value::as_str).map(str::to_owned);
                    if let Some(name) = &name {
                        stack.push(name.clone());
                    }
                    for field in list_mut(obj, "fields") {
                        if let Some(inner) = field.get_mut("type") {
                            inline_named_types(uri, inner, types, stack)?;
                        }
                    }
                    if name.is_some() {
                        stack.pop();
                    }
                }
                _ => {
                    if let Some(inner) = obj.get_mut("type") {
                        inline_named_types(uri, inner, types, stack)?;
                    }
                }
            }
        }
        _ => {}
    }
    Ok(())
}

/// Ports a workflow's links may name
struct Ports<'a> {
    uri: &'a DocumentUri,
    scope: String,
    inputs: HashSet<String>,
    outputs: HashMap<String, HashSet<String>>,
}

impl Ports<'_> {
    fn canonicalize(&self, value: &mut Value) -> Result<(), ResolveError> {
        match value {
            Value::Null => Ok(()),
            Value::String(raw) => {
                *raw = self.canonical(raw)?;
                Ok(())
            }
            Value::Array(items) => {
                for item in items {
                    let Value::String(raw) = item else {
                        return Err(DocumentError::malformed(self.uri, "sources must be strings").into());
                    };
                    *raw = self.canonical(raw)?;
                }
                Ok(())
            }
            other => Err(DocumentError::malformed(self.uri, format!("unexpected source {other}")).into()),
        }
    }

    fn canonical(&self, raw: &str) -> Result<String, ResolveError> {
        let fragment = scoped_fragment(raw, &self.scope);
        match fragment.rsplit_once('/') {
            Some((step, port)) => {
                let step = shortname(step);
                match self.outputs.get(step) {
                    Some(ports) if ports.contains(port) => Ok(format!("{step}/{port}")),
                    Some(_) => Err(ResolveError::unresolved(
                        raw,
                        self.uri,
                        format!("step '{step}' has no output '{port}'"),
                    )),
                    None => Err(ResolveError::unresolved(raw, self.uri, format!("no step '{step}'"))),
                }
            }
            None if self.inputs.contains(fragment) => Ok(fragment.to_string()),
            None => Err(ResolveError::unresolved(raw, self.uri, "no workflow input of that name")),
        }
    }
}

/// Check and canonicalize step sources and workflow output sources
fn link_sources(uri: &DocumentUri, process: &mut Map<String, Value>) -> Result<(), ResolveError> {
    let ports = Ports {
        uri,
        scope: process_id(process).to_string(),
        inputs: list(process, "inputs")
            .filter_map(|p| p.get("id").and_then(Value::as_str))
            .map(ToString::to_string)
            .collect(),
        outputs: list(process, "steps")
            .filter_map(|step| {
                let id = step.get("id").and_then(Value::as_str)?;
                let outs = step
                    .get("out")
                    .and_then(Value::as_array)
                    .into_iter()
                    .flatten()
                    .filter_map(Value::as_str)
                    .map(ToString::to_string)
                    .collect();
                Some((id.to_string(), outs))
            })
            .collect(),
    };

    for step in list_mut(process, "steps") {
        let Value::Object(step) = step else { continue };
        for input in list_mut(step, "in") {
            if let Some(source) = input.get_mut("source") {
                ports.canonicalize(source)?;
            }
        }
    }
    for output in list_mut(process, "outputs") {
        if let Some(source) = output.get_mut("outputSource") {
            ports.canonicalize(source)?;
        }
    }
    Ok(())
}
