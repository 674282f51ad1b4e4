//! CWL Document Model
//!
//! Versioned, URI-addressed workflow documents.
//!
//! # Core Concepts
//!
//! - [`Document`]: one parsed file (or embedded fragment) holding one or
//!   more process trees and a declared [`CwlVersion`]
//! - [`DocumentUri`]: canonical identity of a document
//! - [`Reference`]: pointer from one document to another (URI + fragment)
//! - [`idmap`]: expansion of the `{id: value}` shorthand into list form
//!
//! Process trees stay as insertion-ordered [`serde_json::Value`]s here; the
//! typed model lives in `cwl-graph`.
//!
//! # Example
//!
//! ```rust
//! use cwl_document::{CwlVersion, Document, DocumentUri};
//! use serde_json::json;
//!
//! let uri = DocumentUri::parse("file:///data/echo.cwl").unwrap();
//! let tree = json!({
//!     "cwlVersion": "v1.0",
//!     "class": "CommandLineTool",
//!     "inputs": [],
//!     "outputs": []
//! });
//! let doc = Document::from_tree(uri, tree, None).unwrap();
//! assert_eq!(doc.version(), CwlVersion::V1_0);
//! assert_eq!(doc.process_ids().next(), Some("echo"));
//! ```

#![warn(unreachable_pub)]

mod document;
mod error;
pub mod idmap;
mod uri;
mod version;

pub use document::Document;
pub use error::{DocumentError, IdMapError};
pub use uri::{scoped_fragment, shortname, DocumentUri, Reference};
pub use version::{version_split, CwlVersion};

/// Re-export of the tree type used throughout the workspace
pub use serde_json::{Map, Value};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
