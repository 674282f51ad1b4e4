//! Error types for reference resolution
//!
//! Provides error handling for:
//! - Fetch operations (URI → parsed tree), reported by the fetch capability
//! - Resolution (references that cannot be followed, import cycles)

use cwl_document::DocumentError;

/// Failure reported by a [`DocumentFetcher`](crate::DocumentFetcher)
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FetchError {
    /// Nothing exists at the URI
    #[error("not found: {0}")]
    NotFound(String),

    /// Caller cancelled the fetch
    #[error("fetch of {0} cancelled")]
    Cancelled(String),

    /// IO error during read
    #[error("io error reading {uri}: {message}")]
    Io { uri: String, message: String },

    /// Content could not be parsed into a tree
    #[error("syntax error in {uri}: {message}")]
    Parse { uri: String, message: String },

    /// Fetcher cannot serve this scheme
    #[error("unsupported scheme '{scheme}' for {uri}")]
    UnsupportedScheme { scheme: String, uri: String },
}

/// Errors during resolution; all of them abort the request
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ResolveError {
    /// Reference names a document, process, port or type that cannot be supplied
    #[error("unresolved reference '{reference}' in {document}: {reason}")]
    UnresolvedReference {
        reference: String,
        document: String,
        reason: String,
    },

    /// A document requires itself before its own resolution completes
    #[error("cyclic import: {}", chain.join(" -> "))]
    CyclicImport { chain: Vec<String> },

    /// Named type refers to itself
    #[error("recursive type '{name}' in {document}")]
    RecursiveType { name: String, document: String },

    /// Request pulled in more documents than allowed
    #[error("resolution exceeded the limit of {limit} documents")]
    TooManyDocuments { limit: usize },

    /// Document could not be read into the document model
    #[error("document error: {0}")]
    Document(#[from] DocumentError),
}

impl ResolveError {
    /// Create unresolved-reference error
    pub fn unresolved(
        reference: impl Into<String>,
        document: impl ToString,
        reason: impl ToString,
    ) -> Self {
        Self::UnresolvedReference {
            reference: reference.into(),
            document: document.to_string(),
            reason: reason.to_string(),
        }
    }

    /// Whether the underlying cause was a cancelled fetch
    #[must_use]
    pub fn is_cancellation(&self) -> bool {
        matches!(self, Self::UnresolvedReference { reason, .. } if reason.contains("cancelled"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cyclic_import_display() {
        let err = ResolveError::CyclicImport {
            chain: vec!["a".into(), "b".into(), "a".into()],
        };
        assert_eq!(err.to_string(), "cyclic import: a -> b -> a");
    }

    #[test]
    fn fetch_error_becomes_reason() {
        let fetch = FetchError::Cancelled("file:///x.cwl".into());
        let err = ResolveError::unresolved("x.cwl", "file:///w.cwl", fetch);
        assert!(err.is_cancellation());
        assert!(err.to_string().contains("x.cwl"));
    }

    #[test]
    fn document_error_conversion() {
        let err: ResolveError = DocumentError::UnrecognizedVersion("v9".into()).into();
        assert!(matches!(err, ResolveError::Document(_)));
    }
}
