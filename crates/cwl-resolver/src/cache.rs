//! Per-request resolution cache
//!
//! An arena of documents keyed by canonical URI. Every document is fetched
//! at most once per request; later references get the arena index of the
//! first resolution. Entries are marked in progress while their own
//! references are being followed so that import cycles are detected instead
//! of looping.

use cwl_document::{Document, DocumentUri};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

/// Index of a document in the arena
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct DocumentIndex(usize);

impl DocumentIndex {
    pub(crate) const fn new(index: usize) -> Self {
        Self(index)
    }

    /// Raw arena position
    #[inline]
    #[must_use]
    pub fn get(self) -> usize {
        self.0
    }
}

/// Cache statistics for one request
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheStats {
    /// Fetches issued to the fetch capability
    pub fetches: usize,
    /// References answered from the cache
    pub hits: usize,
    /// Documents in the arena (fetched and inline)
    pub documents: usize,
}

/// State of a cache entry
#[derive(Debug, Clone)]
enum Slot {
    InProgress,
    Resolved(Document),
}

/// Outcome of a cache lookup
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Lookup {
    /// Fully resolved earlier
    Resolved(DocumentIndex),
    /// Currently being resolved further up the stack
    InProgress,
}

/// Document arena plus raw-tree cache
#[derive(Debug, Default)]
pub(crate) struct ResolutionCache {
    documents: IndexMap<DocumentUri, Slot>,
    trees: HashMap<DocumentUri, Value>,
    stats: CacheStats,
}

impl ResolutionCache {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Look up a document by URI, counting hits
    pub(crate) fn lookup(&mut self, uri: &DocumentUri) -> Option<Lookup> {
        let (index, _, slot) = self.documents.get_full(uri)?;
        match slot {
            Slot::InProgress => Some(Lookup::InProgress),
            Slot::Resolved(_) => {
                self.stats.hits += 1;
                Some(Lookup::Resolved(DocumentIndex(index)))
            }
        }
    }

    /// Raw tree fetched earlier for `uri`
    pub(crate) fn tree(&mut self, uri: &DocumentUri) -> Option<Value> {
        let tree = self.trees.get(uri).cloned();
        if tree.is_some() {
            self.stats.hits += 1;
        }
        tree
    }

    /// Remember a freshly fetched tree
    pub(crate) fn store_tree(&mut self, uri: DocumentUri, tree: Value) {
        self.stats.fetches += 1;
        self.trees.insert(uri, tree);
    }

    /// Reserve an arena slot, marking it in progress
    pub(crate) fn begin(&mut self, uri: DocumentUri) -> DocumentIndex {
        let (index, _) = self.documents.insert_full(uri, Slot::InProgress);
        DocumentIndex(index)
    }

    /// Store the finished document
    pub(crate) fn complete(&mut self, index: DocumentIndex, document: Document) {
        if let Some((_, slot)) = self.documents.get_index_mut(index.0) {
            *slot = Slot::Resolved(document);
        }
    }

    /// Resolved document at `index`
    pub(crate) fn document(&self, index: DocumentIndex) -> Option<&Document> {
        match self.documents.get_index(index.0) {
            Some((_, Slot::Resolved(document))) => Some(document),
            _ => None,
        }
    }

    /// Number of arena entries, in progress included
    pub(crate) fn len(&self) -> usize {
        self.documents.len()
    }

    /// Consume into resolved documents in arena order
    ///
    /// Entries left in progress are dropped; they only exist after a
    /// failed resolution.
    pub(crate) fn into_documents(self) -> (Vec<Document>, CacheStats) {
        let mut stats = self.stats;
        let documents: Vec<Document> = self
            .documents
            .into_values()
            .filter_map(|slot| match slot {
                Slot::Resolved(document) => Some(document),
                Slot::InProgress => None,
            })
            .collect();
        stats.documents = documents.len();
        (documents, stats)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cwl_document::CwlVersion;

    fn uri(raw: &str) -> DocumentUri {
        DocumentUri::parse(raw).unwrap()
    }

    #[test]
    fn slots_progress_to_resolved() {
        let mut cache = ResolutionCache::new();
        let a = uri("file:///a.cwl");
        assert_eq!(cache.lookup(&a), None);

        let index = cache.begin(a.clone());
        assert_eq!(cache.lookup(&a), Some(Lookup::InProgress));
        assert!(cache.document(index).is_none());

        cache.complete(index, Document::new(a.clone(), CwlVersion::V1_0, Vec::new()));
        assert_eq!(cache.lookup(&a), Some(Lookup::Resolved(index)));
        assert!(cache.document(index).is_some());

        let (documents, stats) = cache.into_documents();
        assert_eq!(documents.len(), 1);
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.documents, 1);
    }

    #[test]
    fn trees_count_fetches_and_hits() {
        let mut cache = ResolutionCache::new();
        let a = uri("file:///a.yml");
        assert!(cache.tree(&a).is_none());
        cache.store_tree(a.clone(), serde_json::json!({"x": 1}));
        assert!(cache.tree(&a).is_some());
        assert!(cache.tree(&a).is_some());
        let (_, stats) = cache.into_documents();
        assert_eq!(stats.fetches, 1);
        assert_eq!(stats.hits, 2);
    }
}
