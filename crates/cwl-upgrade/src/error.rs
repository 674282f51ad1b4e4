//! Upgrade errors

use cwl_document::CwlVersion;

/// Errors during version upgrade
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum UpgradeError {
    /// Version unknown, a downgrade, or an origin the document is older than
    #[error("unsupported version '{version}': {reason}")]
    UnsupportedVersion { version: String, reason: String },

    /// Document is already past a hop that refuses re-application
    #[error("{uri} is already at {current}; the {from} -> {to} upgrade cannot be applied again")]
    AlreadyUpgraded {
        uri: String,
        current: CwlVersion,
        from: CwlVersion,
        to: CwlVersion,
    },
}

impl UpgradeError {
    /// Create unsupported-version error
    pub fn unsupported(version: impl ToString, reason: impl Into<String>) -> Self {
        Self::UnsupportedVersion {
            version: version.to_string(),
            reason: reason.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display() {
        let err = UpgradeError::unsupported("v0.9", "unknown version");
        assert_eq!(err.to_string(), "unsupported version 'v0.9': unknown version");

        let err = UpgradeError::AlreadyUpgraded {
            uri: "file:///t.cwl".into(),
            current: CwlVersion::V1_1,
            from: CwlVersion::V1_0,
            to: CwlVersion::V1_1,
        };
        assert!(err.to_string().contains("already at v1.1"));
    }
}
