//! Conversion pipeline
//!
//! One request runs resolve → upgrade → build → validate, strictly in that
//! order, with a fresh resolver cache. Fatal errors stop the request with
//! no graph; validation problems come back alongside the graph.

use crate::config::ConvertConfig;
use crate::error::ConvertError;
use cwl_document::CwlVersion;
use cwl_graph::{GraphValidator, ModelBuilder, ProcessModel, ValidationResult};
use cwl_resolver::{CacheStats, DocumentFetcher, Resolver};
use cwl_upgrade::upgrade_to;
use rayon::prelude::*;
use tracing::{debug, info, info_span, warn};

/// Outcome of a successful conversion
#[derive(Debug, Clone, PartialEq)]
pub struct Conversion {
    /// Typed graph at the target version
    pub model: ProcessModel,
    /// Diagnostics, empty when the graph is valid
    pub validation: ValidationResult,
    /// Resolver cache counters for the request
    pub stats: CacheStats,
}

impl Conversion {
    /// Whether validation found no problem
    #[inline]
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.validation.is_valid()
    }
}

/// Runs conversions against one fetch capability
#[derive(Debug)]
pub struct Converter<'f, F: DocumentFetcher + ?Sized> {
    fetcher: &'f F,
    config: ConvertConfig,
}

impl<'f, F: DocumentFetcher + ?Sized> Converter<'f, F> {
    /// Create converter
    #[must_use]
    pub fn new(fetcher: &'f F, config: ConvertConfig) -> Self {
        Self { fetcher, config }
    }

    /// Active configuration
    #[inline]
    #[must_use]
    pub fn config(&self) -> &ConvertConfig {
        &self.config
    }

    /// Load the document graph rooted at `root` and validate it at `target`
    ///
    /// # Errors
    /// - `Resolve` for unresolved references and import cycles
    /// - `Upgrade` when a document is newer than `target`
    /// - `Model` for malformed processes and duplicate identifiers
    pub fn convert(&self, root: &str, target: CwlVersion) -> Result<Conversion, ConvertError> {
        let _request = info_span!("convert", root, target = %target).entered();
        info!("starting conversion");

        let graph = {
            let _phase = info_span!("resolve").entered();
            Resolver::with_options(self.fetcher, self.config.resolver_options()).resolve(root)?
        };
        let stats = graph.stats();
        debug!(
            documents = stats.documents,
            fetches = stats.fetches,
            hits = stats.hits,
            "resolved"
        );

        let graph = {
            let _phase = info_span!("upgrade").entered();
            graph.try_map_documents(|document| upgrade_to(document, target))?
        };

        let model = {
            let _phase = info_span!("build").entered();
            ModelBuilder::build(&graph)?
        };

        let validation = {
            let _phase = info_span!("validate").entered();
            GraphValidator::new(self.config.validator_options()).validate(&model)
        };

        if validation.is_valid() {
            info!(processes = model.len(), "conversion finished");
        } else {
            warn!(
                processes = model.len(),
                diagnostics = validation.len(),
                "conversion finished with diagnostics"
            );
        }
        Ok(Conversion {
            model,
            validation,
            stats,
        })
    }

    /// Convert independent requests in parallel
    ///
    /// Each request gets its own resolver cache; results keep the order of
    /// `requests`.
    pub fn convert_many(&self, requests: &[(&str, CwlVersion)]) -> Vec<Result<Conversion, ConvertError>>
    where
        F: Sync,
    {
        info!(requests = requests.len(), "converting batch");
        requests
            .par_iter()
            .map(|(root, target)| self.convert(root, *target))
            .collect()
    }
}
