//! Result of resolution: an arena of documents and the links between them

use crate::cache::{CacheStats, DocumentIndex};
use cwl_document::{CwlVersion, Document, Value};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Handle to one process inside a [`ResolvedGraph`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ProcessHandle {
    /// Document holding the process
    pub document: DocumentIndex,
    /// Position of the process within the document
    pub process: usize,
}

/// Documents reachable from a root reference, all references resolved
///
/// Step `run` fields hold canonical keys (see
/// [`DocumentUri::process_key`](cwl_document::DocumentUri::process_key)),
/// which [`ResolvedGraph::target`] maps to handles. Documents shared by
/// several referrers appear once.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedGraph {
    documents: Vec<Document>,
    targets: IndexMap<String, ProcessHandle>,
    root: ProcessHandle,
    stats: CacheStats,
}

impl ResolvedGraph {
    pub(crate) fn new(
        documents: Vec<Document>,
        targets: IndexMap<String, ProcessHandle>,
        root: ProcessHandle,
        stats: CacheStats,
    ) -> Self {
        Self {
            documents,
            targets,
            root,
            stats,
        }
    }

    /// Root process
    #[inline]
    #[must_use]
    pub fn root(&self) -> ProcessHandle {
        self.root
    }

    /// All documents in resolution order
    #[inline]
    #[must_use]
    pub fn documents(&self) -> &[Document] {
        &self.documents
    }

    /// Document by arena index
    #[inline]
    #[must_use]
    pub fn document(&self, index: DocumentIndex) -> Option<&Document> {
        self.documents.get(index.get())
    }

    /// Process tree behind a handle
    #[must_use]
    pub fn process(&self, handle: ProcessHandle) -> Option<&Value> {
        self.document(handle.document)?.processes().get(handle.process)
    }

    /// Every process with its handle, in arena order
    pub fn processes(&self) -> impl Iterator<Item = (ProcessHandle, &Value)> {
        self.documents.iter().enumerate().flat_map(|(document, doc)| {
            doc.processes().iter().enumerate().map(move |(process, tree)| {
                let handle = ProcessHandle {
                    document: DocumentIndex::new(document),
                    process,
                };
                (handle, tree)
            })
        })
    }

    /// Handle for a canonical process key
    #[must_use]
    pub fn target(&self, key: &str) -> Option<ProcessHandle> {
        self.targets.get(key).copied()
    }

    /// Canonical key of a handle
    #[must_use]
    pub fn key_of(&self, handle: ProcessHandle) -> Option<&str> {
        self.targets
            .iter()
            .find(|(_, h)| **h == handle)
            .map(|(key, _)| key.as_str())
    }

    /// All canonical keys with their handles
    pub fn targets(&self) -> impl Iterator<Item = (&str, ProcessHandle)> {
        self.targets.iter().map(|(k, h)| (k.as_str(), *h))
    }

    /// Number of processes across all documents
    #[must_use]
    pub fn process_count(&self) -> usize {
        self.documents.iter().map(|d| d.processes().len()).sum()
    }

    /// Distinct versions declared by the documents
    #[must_use]
    pub fn versions(&self) -> BTreeSet<CwlVersion> {
        self.documents.iter().map(Document::version).collect()
    }

    /// Cache statistics of the resolution that produced this graph
    #[inline]
    #[must_use]
    pub fn stats(&self) -> CacheStats {
        self.stats
    }

    /// Replace every document with `f(document)`
    ///
    /// `f` must keep process ids and their order, otherwise handles stop
    /// pointing at the right processes.
    ///
    /// # Errors
    /// The first error returned by `f`
    pub fn try_map_documents<E>(
        self,
        mut f: impl FnMut(&Document) -> Result<Document, E>,
    ) -> Result<Self, E> {
        let documents = self
            .documents
            .iter()
            .map(|document| -> Result<Document, E> {
                let mapped = f(document)?;
                debug_assert!(
                    mapped.process_ids().eq(document.process_ids()),
                    "document mapping changed process ids"
                );
                Ok(mapped)
            })
            .collect::<Result<Vec<_>, E>>()?;
        Ok(Self { documents, ..self })
    }
}
