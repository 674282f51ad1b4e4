//! CWL Core - Conversion pipeline
//!
//! Ties the workspace together:
//! - Resolves a root document and everything it references
//! - Upgrades every document to one target version
//! - Builds the typed process model and validates its step graph
//! - Renders models back to documents
//!
//! # Example
//!
//! ```rust
//! use cwl_core::{ConvertConfig, Converter};
//! use cwl_document::CwlVersion;
//! use cwl_resolver::InMemoryFetcher;
//! use serde_json::json;
//!
//! let fetcher = InMemoryFetcher::new()
//!     .with_document(
//!         "file:///w/echo.cwl",
//!         json!({
//!             "cwlVersion": "v1.0",
//!             "class": "CommandLineTool",
//!             "baseCommand": "echo",
//!             "inputs": {"message": "string"},
//!             "outputs": {"out": "stdout"}
//!         }),
//!     )
//!     .unwrap();
//!
//! let converter = Converter::new(&fetcher, ConvertConfig::new());
//! let conversion = converter.convert("file:///w/echo.cwl", CwlVersion::V1_2).unwrap();
//! assert!(conversion.is_valid());
//!
//! let rendered = cwl_core::render(&conversion.model, CwlVersion::V1_2).unwrap();
//! assert_eq!(rendered.tree()["cwlVersion"], "v1.2");
//! ```

#![warn(unreachable_pub)]

pub mod citations;
pub mod config;
pub mod error;
pub mod logging;
pub mod pipeline;
pub mod serializer;

pub use citations::{software_requirements, SoftwareCitation};
pub use config::ConvertConfig;
pub use error::{ConvertError, ErrorKind, RenderError};
pub use pipeline::{Conversion, Converter};
pub use serializer::{render, render_yaml, RenderedDocument, PACKED_ROOT_ID};

/// Common imports for running conversions
pub mod prelude {
    pub use crate::{
        render, ConvertConfig, ConvertError, Conversion, Converter, ErrorKind, RenderedDocument,
    };
    pub use cwl_document::CwlVersion;
    pub use cwl_graph::{Diagnostic, ProcessModel, ValidationResult};
    pub use cwl_resolver::{DocumentFetcher, FileFetcher, InMemoryFetcher};
}

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
