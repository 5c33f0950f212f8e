//! Source provider trait — the abstraction over information domains.
//!
//! A source takes a free-form query and returns zero or more
//! [`ContentChunk`]s: file content, semantic code search hits, stored
//! project facts, language server answers, and so on.

use async_trait::async_trait;
use indexmap::IndexMap;
use std::sync::Arc;

use crate::chunk::{ContentChunk, GatherOptions};
use crate::error::SourceError;

/// Well-known source names and metadata keys.
pub mod names {
    /// Local file content.
    pub const FILES: &str = "files";
    /// Semantic code search.
    pub const CODE_SEARCH: &str = "code_search";
    /// Stored project facts.
    pub const MEMORY: &str = "memory";
    /// Language intelligence (definitions, references, hover).
    pub const LSP: &str = "lsp";

    /// Metadata key holding a file path.
    pub const META_PATH: &str = "path";
}

/// The core SourceProvider trait.
///
/// Each provider (files, code_search, memory, lsp, ...) implements this
/// trait and is registered with the aggregation engine under its name.
#[async_trait]
pub trait SourceProvider: Send + Sync {
    /// Stable, unique name of this source (e.g. "files", "lsp").
    fn name(&self) -> &str;

    /// Cheap readiness probe. Sources that report `false` are skipped for
    /// the call and their `gather` is never invoked.
    async fn is_available(&self) -> bool;

    /// Fetch candidate chunks for `query`. An empty result is valid.
    ///
    /// Providers should handle their own backend failures and return an
    /// empty list where possible; the engine also tolerates an `Err`.
    async fn gather(
        &self,
        query: &str,
        options: &GatherOptions,
    ) -> Result<Vec<ContentChunk>, SourceError>;
}

/// Insertion-ordered registry of sources.
///
/// Populated once during setup; not meant to be mutated while a gather
/// call is in flight.
#[derive(Clone, Default)]
pub struct SourceRegistry {
    sources: IndexMap<String, Arc<dyn SourceProvider>>,
}

impl SourceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a source. Replaces any existing source with the same name
    /// in place, keeping its original position. Returns the replaced source.
    pub fn register(&mut self, source: Arc<dyn SourceProvider>) -> Option<Arc<dyn SourceProvider>> {
        let name = source.name().to_string();
        self.sources.insert(name, source)
    }

    /// Get a source by name.
    pub fn get(&self, name: &str) -> Option<&Arc<dyn SourceProvider>> {
        self.sources.get(name)
    }

    /// Registered names in registration order.
    pub fn names(&self) -> Vec<&str> {
        self.sources.keys().map(String::as_str).collect()
    }

    /// Iterate `(name, source)` pairs in registration order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Arc<dyn SourceProvider>)> {
        self.sources.iter().map(|(name, source)| (name.as_str(), source))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.sources.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.sources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }
}

impl std::fmt::Debug for SourceRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SourceRegistry")
            .field("sources", &self.names())
            .finish()
    }
}
