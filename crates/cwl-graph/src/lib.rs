//! CWL Process Graph
//!
//! Typed model of a resolved workflow graph and its validation.
//!
//! # Architecture
//!
//! - [`ModelBuilder`]: [`ResolvedGraph`](cwl_resolver::ResolvedGraph) to
//!   [`ProcessModel`], rejecting malformed trees
//! - [`ProcessModel`]: arena of [`Process`]es; steps refer to targets by
//!   [`ProcessId`]
//! - [`TypeDescriptor`] and [`type_compatible`]: directional type checks
//! - [`GraphValidator`]: accumulates [`Diagnostic`]s, never fails
//!
//! # Example
//!
//! ```rust
//! use cwl_graph::{GraphValidator, ModelBuilder};
//! use cwl_resolver::{InMemoryFetcher, Resolver};
//! use serde_json::json;
//!
//! let fetcher = InMemoryFetcher::new()
//!     .with_document(
//!         "file:///t/echo.cwl",
//!         json!({
//!             "cwlVersion": "v1.2",
//!             "class": "CommandLineTool",
//!             "inputs": {"message": "string"},
//!             "outputs": {"out": "stdout"}
//!         }),
//!     )
//!     .unwrap();
//! let graph = Resolver::new(&fetcher).resolve("file:///t/echo.cwl").unwrap();
//! let model = ModelBuilder::build(&graph).unwrap();
//! assert!(GraphValidator::default().validate(&model).is_valid());
//! ```

#![warn(unreachable_pub)]

mod builder;
mod dag;
mod error;
mod model;
mod requirement;
mod types;
mod validator;

pub use builder::ModelBuilder;
pub use dag::StepGraph;
pub use error::ModelError;
pub use model::{
    Binding, LinkMerge, OutputBinding, Parameter, PickValue, Process, ProcessId, ProcessKind,
    ProcessModel, ScatterMethod, SourceRef, Step, StepInput,
};
pub use requirement::{Requirement, RequirementKind, SoftwarePackage};
pub use types::{type_compatible, ParsedType, RecordField, ScalarType, TypeDescriptor, TypeRules};
pub use validator::{Diagnostic, GraphValidator, ValidationResult, ValidatorOptions};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
