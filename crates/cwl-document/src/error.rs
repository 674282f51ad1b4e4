//! Error types for document handling

/// Errors raised while turning a parsed tree into a [`Document`](crate::Document)
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DocumentError {
    /// URI could not be parsed or joined
    #[error("invalid uri '{uri}': {reason}")]
    InvalidUri { uri: String, reason: String },

    /// `cwlVersion` names a version outside the supported set
    #[error("unrecognised cwlVersion '{0}'")]
    UnrecognizedVersion(String),

    /// Root document without `cwlVersion`
    #[error("could not get the cwlVersion of {0}")]
    MissingVersion(String),

    /// Top-level value is not a mapping
    #[error("document {uri} is not a mapping")]
    NotAMapping { uri: String },

    /// Shape error inside the document
    #[error("malformed document {uri}: {message}")]
    Malformed { uri: String, message: String },

    /// `$graph` document without the requested process
    #[error(
        "{uri} contains a graph of multiple objects without '{}', must specify one of {available:?}",
        requested.as_deref().unwrap_or("main")
    )]
    GraphTargetMissing {
        uri: String,
        requested: Option<String>,
        available: Vec<String>,
    },
}

impl DocumentError {
    /// Create malformed-document error
    pub fn malformed(uri: impl ToString, message: impl Into<String>) -> Self {
        Self::Malformed {
            uri: uri.to_string(),
            message: message.into(),
        }
    }

    /// Create invalid-uri error
    pub fn invalid_uri(uri: impl Into<String>, reason: impl ToString) -> Self {
        Self::InvalidUri {
            uri: uri.into(),
            reason: reason.to_string(),
        }
    }
}

/// Error while expanding an id-map shorthand field
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("field '{field}': {message}")]
pub struct IdMapError {
    /// Field being expanded
    pub field: String,
    /// What went wrong
    pub message: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn graph_target_missing_display_defaults_to_main() {
        let err = DocumentError::GraphTargetMissing {
            uri: "file:///w.cwl".to_string(),
            requested: None,
            available: vec!["a".to_string(), "b".to_string()],
        };
        let text = err.to_string();
        assert!(text.contains("without 'main'"));
        assert!(text.contains("\"a\""));
    }

    #[test]
    fn malformed_helper() {
        let err = DocumentError::malformed("file:///x.cwl", "bad");
        assert_eq!(err.to_string(), "malformed document file:///x.cwl: bad");
    }
}
