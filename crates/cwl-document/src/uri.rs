//! Canonical document URIs and references between documents
//!
//! A [`DocumentUri`] identifies one document. Fetched documents are keyed by
//! their URI without fragment; documents embedded inline in a step carry a
//! synthetic fragment naming where they were found.

use crate::error::DocumentError;
use std::fmt::{self, Display, Formatter};
use std::path::Path;
use url::Url;

/// Canonical identity of a document
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct DocumentUri(Url);

impl DocumentUri {
    /// Parse an absolute URI, dropping any fragment
    ///
    /// # Errors
    /// `InvalidUri` if `raw` is not an absolute URI
    pub fn parse(raw: &str) -> Result<Self, DocumentError> {
        let url = Url::parse(raw).map_err(|e| DocumentError::invalid_uri(raw, e))?;
        Ok(Self::from_url(url))
    }

    /// Wrap a URL, dropping any fragment
    #[must_use]
    pub fn from_url(mut url: Url) -> Self {
        url.set_fragment(None);
        Self(url)
    }

    /// URI of an absolute filesystem path
    ///
    /// # Errors
    /// `InvalidUri` if the path is relative
    pub fn from_file_path(path: impl AsRef<Path>) -> Result<Self, DocumentError> {
        let path = path.as_ref();
        Url::from_file_path(path)
            .map(Self)
            .map_err(|()| DocumentError::invalid_uri(path.display().to_string(), "path must be absolute"))
    }

    /// Synthetic URI for a process embedded in `step` of `process`
    #[must_use]
    pub fn inline(&self, process: &str, step: &str) -> Self {
        let mut url = self.0.clone();
        let fragment = match self.0.fragment() {
            Some(parent) => format!("{parent}/{process}/{step}/run"),
            None => format!("{process}/{step}/run"),
        };
        url.set_fragment(Some(&fragment));
        Self(url)
    }

    /// Whether this identifies an inline (embedded) document
    #[inline]
    #[must_use]
    pub fn is_inline(&self) -> bool {
        self.0.fragment().is_some()
    }

    /// Underlying URL
    #[inline]
    #[must_use]
    pub fn as_url(&self) -> &Url {
        &self.0
    }

    /// URI text
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }

    /// Last path segment without its extension
    #[must_use]
    pub fn stem(&self) -> Option<&str> {
        let segment = self.0.path_segments()?.filter(|s| !s.is_empty()).last()?;
        Some(segment.rsplit_once('.').map_or(segment, |(stem, _)| stem)).filter(|s| !s.is_empty())
    }

    /// Id given to a process that declares none
    #[must_use]
    pub fn default_process_id(&self) -> String {
        match self.0.fragment() {
            Some(fragment) => fragment.replace('/', "_"),
            None => self.stem().unwrap_or("main").to_string(),
        }
    }

    /// Canonical key naming process `id` inside this document
    #[must_use]
    pub fn process_key(&self, id: &str) -> String {
        if self.is_inline() {
            format!("{}/{id}", self.0)
        } else {
            format!("{}#{id}", self.0)
        }
    }
}

impl Display for DocumentUri {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        Display::fmt(&self.0, f)
    }
}

/// Reference to a document and optionally a process within it
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Reference {
    /// Target document
    pub document: DocumentUri,
    /// Target fragment without the leading `#`
    pub fragment: Option<String>,
}

impl Reference {
    /// Parse an absolute reference
    ///
    /// # Errors
    /// `InvalidUri` if `raw` is not absolute
    pub fn parse(raw: &str) -> Result<Self, DocumentError> {
        let url = Url::parse(raw).map_err(|e| DocumentError::invalid_uri(raw, e))?;
        Ok(Self::from_url(url))
    }

    /// Resolve `raw` against the document it appears in
    ///
    /// `#frag` stays in `base`; anything else is joined like a relative URL.
    ///
    /// # Errors
    /// `InvalidUri` if the join fails
    pub fn resolve(base: &DocumentUri, raw: &str) -> Result<Self, DocumentError> {
        if let Some(fragment) = raw.strip_prefix('#') {
            return Ok(Self {
                document: base.clone(),
                fragment: Some(fragment.to_string()).filter(|f| !f.is_empty()),
            });
        }
        let url = base
            .as_url()
            .join(raw)
            .map_err(|e| DocumentError::invalid_uri(raw, e))?;
        Ok(Self::from_url(url))
    }

    fn from_url(url: Url) -> Self {
        let fragment = url
            .fragment()
            .filter(|f| !f.is_empty())
            .map(ToString::to_string);
        Self {
            document: DocumentUri::from_url(url),
            fragment,
        }
    }

    /// Whether the reference stays inside `base`
    #[inline]
    #[must_use]
    pub fn is_local_to(&self, base: &DocumentUri) -> bool {
        &self.document == base
    }
}

impl Display for Reference {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match &self.fragment {
            Some(fragment) => write!(f, "{}#{fragment}", self.document),
            None => write!(f, "{}", self.document),
        }
    }
}

/// Short name of an identifier
///
/// Drops everything up to the last `#` and then up to the last `/`:
/// `file:///w.cwl#main/step1/out` becomes `out`.
#[must_use]
pub fn shortname(raw: &str) -> &str {
    let fragment = raw.rsplit_once('#').map_or(raw, |(_, f)| f);
    fragment.rsplit_once('/').map_or(fragment, |(_, name)| name)
}

/// Fragment part of an identifier, relative to `scope`
///
/// `#main/step1/out` inside scope `main` becomes `step1/out`.
#[must_use]
pub fn scoped_fragment<'a>(raw: &'a str, scope: &str) -> &'a str {
    let fragment = raw.rsplit_once('#').map_or(raw, |(_, f)| f);
    fragment
        .strip_prefix(scope)
        .and_then(|rest| rest.strip_prefix('/'))
        .unwrap_or(fragment)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn parse_drops_fragment() {
        let uri = DocumentUri::parse("file:///data/wf.cwl#main").unwrap();
        assert_eq!(uri.as_str(), "file:///data/wf.cwl");
        assert!(!uri.is_inline());
    }

    #[test]
    fn parse_rejects_relative() {
        assert!(DocumentUri::parse("wf.cwl").is_err());
    }

    #[test]
    fn resolve_relative_reference() {
        let base = DocumentUri::parse("file:///data/wf.cwl").unwrap();
        let reference = Reference::resolve(&base, "tools/echo.cwl#echo").unwrap();
        assert_eq!(reference.document.as_str(), "file:///data/tools/echo.cwl");
        assert_eq!(reference.fragment.as_deref(), Some("echo"));
        assert!(!reference.is_local_to(&base));
    }

    #[test]
    fn resolve_fragment_reference() {
        let base = DocumentUri::parse("file:///data/packed.cwl").unwrap();
        let reference = Reference::resolve(&base, "#tool").unwrap();
        assert!(reference.is_local_to(&base));
        assert_eq!(reference.to_string(), "file:///data/packed.cwl#tool");
    }

    #[test]
    fn resolve_absolute_reference() {
        let base = DocumentUri::parse("file:///data/wf.cwl").unwrap();
        let reference = Reference::resolve(&base, "https://example.org/t.cwl").unwrap();
        assert_eq!(reference.document.as_str(), "https://example.org/t.cwl");
        assert_eq!(reference.fragment, None);
    }

    #[test]
    fn inline_uri_is_synthetic() {
        let base = DocumentUri::parse("file:///data/wf.cwl").unwrap();
        let inline = base.inline("main", "step1");
        assert!(inline.is_inline());
        assert_eq!(inline.as_str(), "file:///data/wf.cwl#main/step1/run");
        assert_eq!(inline.default_process_id(), "main_step1_run");
        assert_eq!(inline.process_key("x"), "file:///data/wf.cwl#main/step1/run/x");

        let nested = inline.inline("inner", "s");
        assert_eq!(nested.as_str(), "file:///data/wf.cwl#main/step1/run/inner/s/run");

        let sibling = Reference::resolve(&inline, "echo.cwl").unwrap();
        assert_eq!(sibling.document.as_str(), "file:///data/echo.cwl");
    }

    #[test]
    fn stem_and_default_id() {
        let uri = DocumentUri::parse("file:///data/echo-tool.cwl").unwrap();
        assert_eq!(uri.stem(), Some("echo-tool"));
        assert_eq!(uri.default_process_id(), "echo-tool");
        assert_eq!(uri.process_key("echo"), "file:///data/echo-tool.cwl#echo");
    }

    #[test]
    fn file_path_uri() {
        let uri = DocumentUri::from_file_path("/tmp/wf.cwl").unwrap();
        assert_eq!(uri.as_str(), "file:///tmp/wf.cwl");
        assert!(DocumentUri::from_file_path("relative.cwl").is_err());
    }

    #[test]
    fn shortnames() {
        assert_eq!(shortname("file:///w.cwl#main/step1/out"), "out");
        assert_eq!(shortname("#main/x"), "x");
        assert_eq!(shortname("x"), "x");
    }

    #[test]
    fn scoped_fragments() {
        assert_eq!(scoped_fragment("#main/step1/out", "main"), "step1/out");
        assert_eq!(scoped_fragment("step1/out", "main"), "step1/out");
        assert_eq!(scoped_fragment("#x", "main"), "x");
        assert_eq!(scoped_fragment("file:///w.cwl#main/x", "main"), "x");
        assert_eq!(scoped_fragment("mainly", "main"), "mainly");
    }
}
