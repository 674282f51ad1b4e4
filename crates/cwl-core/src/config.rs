//! Conversion settings

use crate::error::ConvertError;
use cwl_graph::ValidatorOptions;
use cwl_resolver::ResolverOptions;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Settings for a [`Converter`](crate::Converter)
///
/// Every field has a default, so a partial TOML table is enough:
///
/// ```toml
/// max_documents = 64
/// numeric_widening = false
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConvertConfig {
    /// Maximum documents one request may pull in
    pub max_documents: usize,
    /// Report steps using features their workflow did not require
    pub check_requirements: bool,
    /// Allow `int → long → float → double` when checking links
    pub numeric_widening: bool,
}

impl ConvertConfig {
    /// Create default configuration
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// With document limit
    #[inline]
    #[must_use]
    pub fn with_max_documents(mut self, max: usize) -> Self {
        self.max_documents = max;
        self
    }

    /// With feature-requirement check toggled
    #[inline]
    #[must_use]
    pub fn with_check_requirements(mut self, enabled: bool) -> Self {
        self.check_requirements = enabled;
        self
    }

    /// With numeric widening toggled
    #[inline]
    #[must_use]
    pub fn with_numeric_widening(mut self, enabled: bool) -> Self {
        self.numeric_widening = enabled;
        self
    }

    /// Parse from TOML text
    ///
    /// # Errors
    /// `Config` if the text is not valid TOML or has fields of the wrong type
    pub fn from_toml_str(text: &str) -> Result<Self, ConvertError> {
        toml::from_str(text).map_err(|e| ConvertError::Config(e.to_string()))
    }

    /// Load from a TOML file
    ///
    /// # Errors
    /// `Config` if the file cannot be read or parsed
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConvertError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|e| ConvertError::Config(format!("{}: {e}", path.display())))?;
        Self::from_toml_str(&text)
    }

    /// Resolver limits derived from this configuration
    #[must_use]
    pub fn resolver_options(&self) -> ResolverOptions {
        ResolverOptions::default().with_max_documents(self.max_documents)
    }

    /// Validator settings derived from this configuration
    #[must_use]
    pub fn validator_options(&self) -> ValidatorOptions {
        ValidatorOptions::default()
            .with_check_requirements(self.check_requirements)
            .with_numeric_widening(self.numeric_widening)
    }
}

impl Default for ConvertConfig {
    fn default() -> Self {
        Self {
            max_documents: ResolverOptions::default().max_documents,
            check_requirements: true,
            numeric_widening: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_toml_keeps_defaults() {
        let config = ConvertConfig::from_toml_str("numeric_widening = false\n").unwrap();
        assert!(!config.numeric_widening);
        assert!(config.check_requirements);
        assert_eq!(config.max_documents, 256);
    }

    #[test]
    fn wrong_type_is_config_error() {
        let err = ConvertConfig::from_toml_str("max_documents = \"many\"").unwrap_err();
        assert!(matches!(err, ConvertError::Config(_)));
    }

    #[test]
    fn derived_options() {
        let config = ConvertConfig::new()
            .with_max_documents(3)
            .with_check_requirements(false)
            .with_numeric_widening(false);
        assert_eq!(config.resolver_options().max_documents, 3);
        let options = config.validator_options();
        assert!(!options.check_requirements);
        assert!(!options.type_rules.numeric_widening);
    }

    #[test]
    fn load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("convert.toml");
        std::fs::write(&path, "max_documents = 8\ncheck_requirements = false\n").unwrap();

        let config = ConvertConfig::load(&path).unwrap();
        assert_eq!(config, ConvertConfig::new().with_max_documents(8).with_check_requirements(false));

        let missing = ConvertConfig::load(dir.path().join("absent.toml")).unwrap_err();
        assert!(missing.to_string().contains("absent.toml"));
    }
}
