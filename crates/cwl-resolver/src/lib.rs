//! CWL Reference Resolver
//!
//! Turns a root reference into a [`ResolvedGraph`]: every document reachable
//! through `run` and `$import` references, fetched once, normalized, and
//! linked by canonical process keys.
//!
//! # Architecture
//!
//! - [`DocumentFetcher`]: the only way documents enter the system
//!   ([`InMemoryFetcher`], [`FileFetcher`], [`Cancellable`] wrapper)
//! - [`Resolver`]: single-request resolution with a per-request cache
//! - [`ResolvedGraph`]: document arena plus [`ProcessHandle`]s
//!
//! Resolution is all-or-nothing: the first unresolved reference aborts the
//! request with a [`ResolveError`].

#![warn(unreachable_pub)]

mod cache;
mod error;
mod fetch;
mod graph;
mod normalize;
mod parsers;
mod resolver;

pub use cache::{CacheStats, DocumentIndex};
pub use error::{FetchError, ResolveError};
pub use fetch::{CancelToken, Cancellable, DocumentFetcher, FileFetcher, InMemoryFetcher};
pub use graph::{ProcessHandle, ResolvedGraph};
pub use parsers::TextFormat;
pub use resolver::{Resolver, ResolverOptions};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
