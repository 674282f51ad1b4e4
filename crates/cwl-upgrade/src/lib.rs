//! CWL Version Upgrader
//!
//! Pure transformations between schema versions. Each adjacent pair of
//! versions has a [`Hop`] between [`VersionedTree`]s of marker types; the
//! static [`HOPS`] table chains them so that
//!
//! ```text
//! upgrade(upgrade(d, a, m), m, b) == upgrade(d, a, b)
//! ```
//!
//! Upgrades never change process count, order or ids.
//!
//! # Example
//!
//! ```rust
//! use cwl_document::{CwlVersion, Document, DocumentUri};
//! use cwl_upgrade::upgrade_to;
//! use serde_json::json;
//!
//! let uri = DocumentUri::parse("file:///t/echo.cwl").unwrap();
//! let doc = Document::new(uri, CwlVersion::V1_0, vec![json!({
//!     "id": "echo", "class": "CommandLineTool", "inputs": [], "outputs": []
//! })]);
//! let upgraded = upgrade_to(&doc, CwlVersion::V1_2).unwrap();
//! assert_eq!(upgraded.version(), CwlVersion::V1_2);
//! ```

#![warn(unreachable_pub)]

mod chain;
mod error;
mod hop;
pub mod hops;

pub use chain::{parse_version, path, upgrade, upgrade_to, HOPS};
pub use error::UpgradeError;
pub use hop::{Hop, HopEntry, ReapplyPolicy, SchemaVersion, VersionedTree, V1_0, V1_1, V1_2};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
