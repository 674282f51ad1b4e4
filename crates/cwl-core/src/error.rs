//! Error types for the conversion pipeline
//!
//! Every fatal error of a request ends up in [`ConvertError`]; graph-level
//! problems are diagnostics in the
//! [`ValidationResult`](cwl_graph::ValidationResult) instead.

use cwl_document::DocumentError;
use cwl_graph::ModelError;
use cwl_resolver::ResolveError;
use cwl_upgrade::UpgradeError;
use serde::Serialize;
use std::fmt::{self, Display, Formatter};

/// Main pipeline error type
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConvertError {
    /// Resolution failed
    #[error("resolution failed: {0}")]
    Resolve(#[from] ResolveError),

    /// Version upgrade failed
    #[error("upgrade failed: {0}")]
    Upgrade(#[from] UpgradeError),

    /// Model construction failed
    #[error("model construction failed: {0}")]
    Model(#[from] ModelError),

    /// Rendering failed
    #[error("render failed: {0}")]
    Render(#[from] RenderError),

    /// Configuration could not be loaded
    #[error("configuration error: {0}")]
    Config(String),

    /// Log subscriber could not be installed
    #[error("logging error: {0}")]
    Logging(String),
}

impl ConvertError {
    /// Error taxonomy classification
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Resolve(err) => match err {
                ResolveError::UnresolvedReference { .. } | ResolveError::TooManyDocuments { .. } => {
                    ErrorKind::UnresolvedReference
                }
                ResolveError::CyclicImport { .. } => ErrorKind::CyclicImport,
                ResolveError::RecursiveType { .. } => ErrorKind::MalformedProcess,
                ResolveError::Document(err) => document_kind(err),
            },
            Self::Upgrade(err) => upgrade_kind(err),
            Self::Model(err) => match err {
                ModelError::MalformedProcess { .. } => ErrorKind::MalformedProcess,
                ModelError::DuplicateIdentifier { .. } => ErrorKind::DuplicateIdentifier,
                ModelError::MixedVersions { .. } => ErrorKind::UnsupportedVersion,
            },
            Self::Render(err) => match err {
                RenderError::Upgrade(err) => upgrade_kind(err),
                RenderError::Document(err) => document_kind(err),
                RenderError::Yaml(_) => ErrorKind::MalformedProcess,
            },
            Self::Config(_) | Self::Logging(_) => ErrorKind::Configuration,
        }
    }

    /// Whether the request was cancelled by its caller
    #[inline]
    #[must_use]
    pub fn is_cancellation(&self) -> bool {
        matches!(self, Self::Resolve(err) if err.is_cancellation())
    }
}

fn upgrade_kind(err: &UpgradeError) -> ErrorKind {
    match err {
        UpgradeError::UnsupportedVersion { .. } => ErrorKind::UnsupportedVersion,
        UpgradeError::AlreadyUpgraded { .. } => ErrorKind::AlreadyUpgraded,
    }
}

fn document_kind(err: &DocumentError) -> ErrorKind {
    match err {
        DocumentError::UnrecognizedVersion(_) | DocumentError::MissingVersion(_) => {
            ErrorKind::UnsupportedVersion
        }
        DocumentError::InvalidUri { .. } | DocumentError::GraphTargetMissing { .. } => {
            ErrorKind::UnresolvedReference
        }
        DocumentError::NotAMapping { .. } | DocumentError::Malformed { .. } => {
            ErrorKind::MalformedProcess
        }
    }
}

/// Serializer errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RenderError {
    /// Target version not reachable from the model's version
    #[error(transparent)]
    Upgrade(#[from] UpgradeError),

    /// Rendered tree did not form a valid document
    #[error(transparent)]
    Document(#[from] DocumentError),

    /// YAML encoding failed
    #[error("yaml encoding failed: {0}")]
    Yaml(String),
}

/// Fatal error classes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum ErrorKind {
    /// A reference names something that cannot be supplied
    UnresolvedReference,
    /// Documents import each other
    CyclicImport,
    /// Version unknown or not reachable
    UnsupportedVersion,
    /// Upgrade step applied twice
    AlreadyUpgraded,
    /// Process tree with the wrong shape
    MalformedProcess,
    /// Siblings sharing an identifier
    DuplicateIdentifier,
    /// Bad configuration
    Configuration,
}

impl ErrorKind {
    /// Taxonomy name
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::UnresolvedReference => "UnresolvedReferenceError",
            Self::CyclicImport => "CyclicImportError",
            Self::UnsupportedVersion => "UnsupportedVersionError",
            Self::AlreadyUpgraded => "AlreadyUpgradedError",
            Self::MalformedProcess => "MalformedProcessError",
            Self::DuplicateIdentifier => "DuplicateIdentifierError",
            Self::Configuration => "ConfigurationError",
        }
    }
}

impl Display for ErrorKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cwl_document::CwlVersion;

    #[test]
    fn kinds() {
        let err: ConvertError = ResolveError::CyclicImport { chain: vec!["a".into(), "a".into()] }.into();
        assert_eq!(err.kind(), ErrorKind::CyclicImport);

        let err: ConvertError = ResolveError::unresolved("x.cwl", "file:///w.cwl", "not found").into();
        assert_eq!(err.kind().as_str(), "UnresolvedReferenceError");

        let err: ConvertError = ResolveError::from(DocumentError::UnrecognizedVersion("v2".into())).into();
        assert_eq!(err.kind(), ErrorKind::UnsupportedVersion);

        let err: ConvertError = ModelError::duplicate("file:///w.cwl#wf", "step1").into();
        assert_eq!(err.kind(), ErrorKind::DuplicateIdentifier);

        let err: ConvertError = ModelError::MixedVersions {
            versions: vec![CwlVersion::V1_0, CwlVersion::V1_2],
        }
        .into();
        assert_eq!(err.kind(), ErrorKind::UnsupportedVersion);

        let err: ConvertError = RenderError::from(UpgradeError::unsupported("v1.0", "downgrade")).into();
        assert_eq!(err.kind(), ErrorKind::UnsupportedVersion);
    }

    #[test]
    fn cancellation() {
        let err: ConvertError =
            ResolveError::unresolved("x.cwl", "file:///w.cwl", "fetch of x.cwl cancelled").into();
        assert!(err.is_cancellation());
        assert!(!ConvertError::Config("bad".into()).is_cancellation());
    }

    #[test]
    fn display() {
        let err = ConvertError::Config("missing field".into());
        assert_eq!(err.to_string(), "configuration error: missing field");
        assert_eq!(ErrorKind::AlreadyUpgraded.to_string(), "AlreadyUpgradedError");
    }
}
