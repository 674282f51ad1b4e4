//! Model construction errors

use cwl_document::CwlVersion;
use thiserror::Error;

/// Errors raised while building a [`ProcessModel`](crate::ProcessModel)
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ModelError {
    /// A process tree does not have the shape its class requires
    #[error("malformed process '{process}': {message}")]
    MalformedProcess {
        /// Canonical key of the process
        process: String,
        /// What is wrong
        message: String,
    },

    /// Two siblings share an identifier
    #[error("duplicate identifier '{id}' in {scope}")]
    DuplicateIdentifier {
        /// Enclosing scope (process key, or `process key#step`)
        scope: String,
        /// Repeated identifier
        id: String,
    },

    /// Documents of different versions in one graph
    #[error("graph mixes schema versions: {}", list(.versions))]
    MixedVersions {
        /// Versions present
        versions: Vec<CwlVersion>,
    },
}

impl ModelError {
    /// Create a malformed-process error
    pub fn malformed(process: impl Into<String>, message: impl Into<String>) -> Self {
        Self::MalformedProcess {
            process: process.into(),
            message: message.into(),
        }
    }

    /// Create a duplicate-identifier error
    pub fn duplicate(scope: impl Into<String>, id: impl Into<String>) -> Self {
        Self::DuplicateIdentifier {
            scope: scope.into(),
            id: id.into(),
        }
    }
}

fn list(versions: &[CwlVersion]) -> String {
    versions
        .iter()
        .map(|v| v.as_str())
        .collect::<Vec<_>>()
        .join(", ")
}
