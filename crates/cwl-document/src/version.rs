//! Supported schema versions
//!
//! Versions form a strict chain `v1.0 < v1.1 < v1.2`. Upgrades only ever walk
//! forward along that chain.

use crate::error::DocumentError;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt::{self, Display, Formatter};
use std::str::FromStr;

/// Schema version of a workflow document
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum CwlVersion {
    /// `v1.0`
    #[serde(rename = "v1.0")]
    V1_0,
    /// `v1.1`
    #[serde(rename = "v1.1")]
    V1_1,
    /// `v1.2`
    #[serde(rename = "v1.2")]
    V1_2,
}

impl CwlVersion {
    /// Every supported version, oldest first
    pub const ALL: [CwlVersion; 3] = [CwlVersion::V1_0, CwlVersion::V1_1, CwlVersion::V1_2];

    /// Newest supported version
    pub const LATEST: CwlVersion = CwlVersion::V1_2;

    /// Canonical tag as written in `cwlVersion`
    #[inline]
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::V1_0 => "v1.0",
            Self::V1_1 => "v1.1",
            Self::V1_2 => "v1.2",
        }
    }

    /// Immediate successor on the chain
    #[inline]
    #[must_use]
    pub const fn next(self) -> Option<Self> {
        match self {
            Self::V1_0 => Some(Self::V1_1),
            Self::V1_1 => Some(Self::V1_2),
            Self::V1_2 => None,
        }
    }

    /// Immediate predecessor on the chain
    #[inline]
    #[must_use]
    pub const fn previous(self) -> Option<Self> {
        match self {
            Self::V1_0 => None,
            Self::V1_1 => Some(Self::V1_0),
            Self::V1_2 => Some(Self::V1_1),
        }
    }

    /// Read `cwlVersion` from a parsed tree
    ///
    /// Returns `Ok(None)` when the key is absent.
    ///
    /// # Errors
    /// - `Malformed` if the tree is not a mapping or the tag is not a string
    /// - `UnrecognizedVersion` if the tag is outside the supported set
    pub fn from_tree(tree: &Value) -> Result<Option<Self>, DocumentError> {
        let Value::Object(map) = tree else {
            return Err(DocumentError::malformed("<tree>", "mapping is required"));
        };
        match map.get("cwlVersion") {
            None => Ok(None),
            Some(Value::String(tag)) => tag.parse().map(Some),
            Some(other) => Err(DocumentError::malformed(
                "<tree>",
                format!("cwlVersion must be a string, got {other}"),
            )),
        }
    }
}

impl Display for CwlVersion {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CwlVersion {
    type Err = DocumentError;

    /// Accepts release tags and their development tags (`v1.2.0-dev5`)
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let release = s.split_once('-').map_or(s, |(head, _)| head);
        match version_split(release).as_deref() {
            Some([1, 0] | [1, 0, 0]) => Ok(Self::V1_0),
            Some([1, 1] | [1, 1, 0]) => Ok(Self::V1_1),
            Some([1, 2] | [1, 2, 0]) => Ok(Self::V1_2),
            _ => Err(DocumentError::UnrecognizedVersion(s.to_string())),
        }
    }
}

/// Split a `cwlVersion` tag into its numerical components
///
/// `"v1.2"` becomes `[1, 2]`. Returns `None` for tags not of the form
/// `v<n>(.<n>)*`.
#[must_use]
pub fn version_split(version: &str) -> Option<Vec<u32>> {
    let digits = version.strip_prefix('v')?;
    digits.split('.').map(|part| part.parse().ok()).collect()
}
