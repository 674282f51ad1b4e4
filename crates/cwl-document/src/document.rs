//! Versioned document container

use crate::error::DocumentError;
use crate::uri::{shortname, DocumentUri};
use crate::version::CwlVersion;
use serde_json::{Map, Value};

/// Top-level keys carried alongside the processes
const METADATA_KEYS: [&str; 2] = ["$namespaces", "$schemas"];

/// Root container of one or more process trees
///
/// Documents are values: every transformation returns a new `Document`
/// and leaves its input untouched.
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    uri: DocumentUri,
    version: CwlVersion,
    processes: Vec<Value>,
    packed: bool,
    metadata: Map<String, Value>,
}

impl Document {
    /// Create document from process trees
    ///
    /// A single process is written plainly, several as a `$graph`.
    #[must_use]
    pub fn new(uri: DocumentUri, version: CwlVersion, processes: Vec<Value>) -> Self {
        let packed = processes.len() != 1;
        Self {
            uri,
            version,
            processes,
            packed,
            metadata: Map::new(),
        }
    }

    /// Replace top-level metadata (`$namespaces`, `$schemas`)
    #[must_use]
    pub fn with_metadata(mut self, metadata: Map<String, Value>) -> Self {
        self.metadata = metadata;
        self
    }

    /// Build a document from a parsed tree
    ///
    /// `inherited` is used when the tree declares no `cwlVersion`
    /// (documents imported by, or embedded in, another document).
    ///
    /// Every process ends up with a short `id`; processes without one get
    /// [`DocumentUri::default_process_id`].
    ///
    /// # Errors
    /// - `NotAMapping` if the tree is not a mapping
    /// - `MissingVersion` if no version is declared or inherited
    /// - `UnrecognizedVersion` if the declared version is unsupported
    /// - `Malformed` for a `$graph` that is not a list of mappings
    pub fn from_tree(
        uri: DocumentUri,
        tree: Value,
        inherited: Option<CwlVersion>,
    ) -> Result<Self, DocumentError> {
        let Value::Object(map) = tree else {
            return Err(DocumentError::NotAMapping {
                uri: uri.to_string(),
            });
        };

        // Partition rather than remove so the process keeps its key order.
        let mut declared = None;
        let mut graph = None;
        let mut metadata = Map::new();
        let mut body = Map::new();
        for (key, value) in map {
            match key.as_str() {
                "cwlVersion" => declared = Some(value),
                "$graph" => graph = Some(value),
                k if METADATA_KEYS.contains(&k) => {
                    metadata.insert(key, value);
                }
                _ => {
                    body.insert(key, value);
                }
            }
        }

        let version = match declared {
            Some(Value::String(tag)) => tag.parse()?,
            Some(other) => {
                return Err(DocumentError::malformed(
                    &uri,
                    format!("cwlVersion must be a string, got {other}"),
                ))
            }
            None => inherited.ok_or_else(|| DocumentError::MissingVersion(uri.to_string()))?,
        };

        let (processes, packed) = match graph {
            Some(Value::Array(items)) => {
                let mut processes = Vec::with_capacity(items.len());
                for item in items {
                    let Value::Object(process) = item else {
                        return Err(DocumentError::malformed(&uri, "$graph entries must be mappings"));
                    };
                    processes.push(
                        process
                            .into_iter()
                            .filter(|(key, _)| key != "cwlVersion")
                            .collect::<Map<_, _>>(),
                    );
                }
                (processes, true)
            }
            Some(_) => return Err(DocumentError::malformed(&uri, "$graph must be a list")),
            None => (vec![body], false),
        };

        let default_id = uri.default_process_id();
        let multiple = processes.len() > 1;
        let processes = processes
            .into_iter()
            .enumerate()
            .map(|(position, mut process)| {
                let id = match process.get("id").and_then(Value::as_str) {
                    Some(raw) => shortname(raw).to_string(),
                    None if multiple => format!("{default_id}_{position}"),
                    None => default_id.clone(),
                };
                process.insert("id".to_string(), Value::String(id));
                Value::Object(process)
            })
            .collect();

        Ok(Self {
            uri,
            version,
            processes,
            packed,
            metadata,
        })
    }

    /// Canonical URI
    #[inline]
    #[must_use]
    pub fn uri(&self) -> &DocumentUri {
        &self.uri
    }

    /// Declared schema version
    #[inline]
    #[must_use]
    pub fn version(&self) -> CwlVersion {
        self.version
    }

    /// Process trees in document order
    #[inline]
    #[must_use]
    pub fn processes(&self) -> &[Value] {
        &self.processes
    }

    /// Whether the document is written as a `$graph`
    #[inline]
    #[must_use]
    pub fn is_packed(&self) -> bool {
        self.packed
    }

    /// Top-level metadata
    #[inline]
    #[must_use]
    pub fn metadata(&self) -> &Map<String, Value> {
        &self.metadata
    }

    /// Short ids of all processes, in order
    pub fn process_ids(&self) -> impl Iterator<Item = &str> + '_ {
        self.processes
            .iter()
            .filter_map(|p| p.get("id").and_then(Value::as_str))
    }

    /// Process by short id
    #[must_use]
    pub fn process(&self, id: &str) -> Option<&Value> {
        self.position(id).map(|i| &self.processes[i])
    }

    /// Position of the process with short id `id`
    #[must_use]
    pub fn position(&self, id: &str) -> Option<usize> {
        self.processes
            .iter()
            .position(|p| p.get("id").and_then(Value::as_str) == Some(id))
    }

    /// Select the process a reference points at
    ///
    /// Without a fragment, a single-process document yields its process and
    /// a `$graph` yields `main`.
    ///
    /// # Errors
    /// `GraphTargetMissing` listing the available ids
    pub fn select(&self, fragment: Option<&str>) -> Result<usize, DocumentError> {
        let requested = fragment.map(|f| f.trim_start_matches('#'));
        let found = match requested {
            Some(id) => self.position(id),
            None if self.processes.len() == 1 => Some(0),
            None => self.position("main"),
        };
        found.ok_or_else(|| DocumentError::GraphTargetMissing {
            uri: self.uri.to_string(),
            requested: requested.map(ToString::to_string),
            available: self.process_ids().map(ToString::to_string).collect(),
        })
    }

    /// Same document tagged with another version
    #[must_use]
    pub fn with_version(mut self, version: CwlVersion) -> Self {
        self.version = version;
        self
    }

    /// Replace the process trees, keeping layout and metadata
    #[must_use]
    pub fn with_processes(mut self, processes: Vec<Value>) -> Self {
        self.processes = processes;
        self
    }

    /// Apply `f` to every process tree
    #[must_use]
    pub fn map_processes(mut self, f: impl FnMut(Value) -> Value) -> Self {
        self.processes = self.processes.into_iter().map(f).collect();
        self
    }

    /// Serializable tree (inverse of [`Document::from_tree`])
    #[must_use]
    pub fn to_tree(&self) -> Value {
        let mut root = Map::new();
        root.insert(
            "cwlVersion".to_string(),
            Value::String(self.version.as_str().to_string()),
        );
        for (key, value) in &self.metadata {
            root.insert(key.clone(), value.clone());
        }
        match (self.packed, self.processes.as_slice()) {
            (false, [Value::Object(process)]) => {
                for (key, value) in process {
                    root.insert(key.clone(), value.clone());
                }
            }
            _ => {
                root.insert("$graph".to_string(), Value::Array(self.processes.clone()));
            }
        }
        Value::Object(root)
    }
}
