//! Fetch capability
//!
//! The resolver never touches the filesystem or network itself. It asks a
//! [`DocumentFetcher`] for the parsed tree behind a URI.

use crate::error::FetchError;
use crate::parsers::TextFormat;
use cwl_document::{DocumentError, DocumentUri};
use indexmap::IndexMap;
use serde_json::Value;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use url::Url;

/// URI → parsed tree
///
/// URIs passed in never carry a fragment.
pub trait DocumentFetcher {
    /// Fetch and parse the document at `uri`
    ///
    /// # Errors
    /// [`FetchError`] describing why nothing could be supplied
    fn fetch(&self, uri: &Url) -> Result<Value, FetchError>;
}

impl<F: DocumentFetcher + ?Sized> DocumentFetcher for &F {
    fn fetch(&self, uri: &Url) -> Result<Value, FetchError> {
        (**self).fetch(uri)
    }
}

impl<F: DocumentFetcher + ?Sized> DocumentFetcher for Box<F> {
    fn fetch(&self, uri: &Url) -> Result<Value, FetchError> {
        (**self).fetch(uri)
    }
}

impl<F: DocumentFetcher + ?Sized> DocumentFetcher for Arc<F> {
    fn fetch(&self, uri: &Url) -> Result<Value, FetchError> {
        (**self).fetch(uri)
    }
}

/// Fetcher over documents held in memory
#[derive(Debug, Clone, Default)]
pub struct InMemoryFetcher {
    documents: IndexMap<DocumentUri, Value>,
}

impl InMemoryFetcher {
    /// Create empty fetcher
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a parsed tree
    ///
    /// # Errors
    /// `InvalidUri` if `uri` is not absolute
    pub fn insert(&mut self, uri: &str, tree: Value) -> Result<(), DocumentError> {
        self.documents.insert(DocumentUri::parse(uri)?, tree);
        Ok(())
    }

    /// Register YAML or JSON text, parsed according to the URI's extension
    ///
    /// # Errors
    /// `InvalidUri` for a relative URI, `Malformed` for unparsable text
    pub fn insert_text(&mut self, uri: &str, text: &str) -> Result<(), DocumentError> {
        let tree = TextFormat::for_path(uri)
            .parse(text)
            .map_err(|message| DocumentError::malformed(uri, message))?;
        self.insert(uri, tree)
    }

    /// Builder-style [`InMemoryFetcher::insert`]
    ///
    /// # Errors
    /// See [`InMemoryFetcher::insert`]
    pub fn with_document(mut self, uri: &str, tree: Value) -> Result<Self, DocumentError> {
        self.insert(uri, tree)?;
        Ok(self)
    }

    /// Number of registered documents
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.documents.len()
    }

    /// Whether no documents are registered
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }
}

impl DocumentFetcher for InMemoryFetcher {
    fn fetch(&self, uri: &Url) -> Result<Value, FetchError> {
        self.documents
            .get(&DocumentUri::from_url(uri.clone()))
            .cloned()
            .ok_or_else(|| FetchError::NotFound(uri.to_string()))
    }
}

/// Fetcher reading `file:` URIs from the local filesystem
#[derive(Debug, Clone, Copy)]
pub struct FileFetcher {
    max_file_size: u64,
}

impl FileFetcher {
    /// Default maximum file size (16 MiB)
    pub const DEFAULT_MAX_FILE_SIZE: u64 = 16 * 1024 * 1024;

    /// Create fetcher with the default size limit
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self {
            max_file_size: Self::DEFAULT_MAX_FILE_SIZE,
        }
    }

    /// Override maximum file size in bytes
    #[inline]
    #[must_use]
    pub fn with_max_file_size(mut self, bytes: u64) -> Self {
        self.max_file_size = bytes;
        self
    }
}

impl Default for FileFetcher {
    fn default() -> Self {
        Self::new()
    }
}

impl DocumentFetcher for FileFetcher {
    fn fetch(&self, uri: &Url) -> Result<Value, FetchError> {
        if uri.scheme() != "file" {
            return Err(FetchError::UnsupportedScheme {
                scheme: uri.scheme().to_string(),
                uri: uri.to_string(),
            });
        }
        let path = uri
            .to_file_path()
            .map_err(|()| FetchError::NotFound(uri.to_string()))?;

        let io_error = |e: std::io::Error| {
            if e.kind() == std::io::ErrorKind::NotFound {
                FetchError::NotFound(uri.to_string())
            } else {
                FetchError::Io {
                    uri: uri.to_string(),
                    message: e.to_string(),
                }
            }
        };

        let size = std::fs::metadata(&path).map_err(io_error)?.len();
        if size > self.max_file_size {
            return Err(FetchError::Io {
                uri: uri.to_string(),
                message: format!("file is {size} bytes, limit is {}", self.max_file_size),
            });
        }

        let text = std::fs::read_to_string(&path).map_err(io_error)?;
        TextFormat::for_path(uri.path())
            .parse(&text)
            .map_err(|message| FetchError::Parse {
                uri: uri.to_string(),
                message,
            })
    }
}

/// Shared cancellation flag
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    /// Create token in the live state
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Cancel every fetch made through this token from now on
    #[inline]
    pub fn cancel(&self) {
        self.0.store(true, Ordering::Release);
    }

    /// Whether [`CancelToken::cancel`] was called
    #[inline]
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

/// Fetcher wrapper that fails with [`FetchError::Cancelled`] once its token
/// is cancelled
#[derive(Debug, Clone)]
pub struct Cancellable<F> {
    inner: F,
    token: CancelToken,
}

impl<F: DocumentFetcher> Cancellable<F> {
    /// Wrap `inner`
    #[inline]
    #[must_use]
    pub fn new(inner: F, token: CancelToken) -> Self {
        Self { inner, token }
    }
}

impl<F: DocumentFetcher> DocumentFetcher for Cancellable<F> {
    fn fetch(&self, uri: &Url) -> Result<Value, FetchError> {
        if self.token.is_cancelled() {
            return Err(FetchError::Cancelled(uri.to_string()));
        }
        self.inner.fetch(uri)
    }
}
