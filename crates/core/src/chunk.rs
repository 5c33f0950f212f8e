//! Content chunks and per-call gather options.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::source::names;

/// One unit of candidate context produced by a source for a single query.
///
/// Chunks are created fresh on every gather call and never cached.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContentChunk {
    /// Name of the source that produced this chunk.
    pub source_name: String,

    /// The candidate context text.
    pub content: String,

    /// Relevance score in `[0, 1]`, the sole ranking key.
    pub relevance: f32,

    /// Optional structured metadata (e.g. `path` for file content).
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub metadata: BTreeMap<String, String>,
}

impl ContentChunk {
    /// Create a chunk. Relevance is clamped into `[0, 1]`.
    pub fn new(source_name: impl Into<String>, content: impl Into<String>, relevance: f32) -> Self {
        Self {
            source_name: source_name.into(),
            content: content.into(),
            relevance: clamp_relevance(relevance),
            metadata: BTreeMap::new(),
        }
    }

    /// Attach a metadata entry.
    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    /// The file path this chunk was read from, if any.
    pub fn path(&self) -> Option<&str> {
        self.metadata.get(names::META_PATH).map(String::as_str)
    }
}

/// Clamp a relevance score into `[0, 1]`. NaN becomes 0.
pub fn clamp_relevance(relevance: f32) -> f32 {
    if relevance.is_nan() {
        0.0
    } else {
        relevance.clamp(0.0, 1.0)
    }
}

/// Options for a single gather call. Immutable once handed to the engine.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GatherOptions {
    /// Token budget for this call. Falls back to the configured default.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<usize>,

    /// When non-empty, exactly these sources are queried (if registered and
    /// available), bypassing the configured enable flags.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preferred_sources: Option<Vec<String>>,

    /// Whether the file source should read file content at all.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub include_file_content: Option<bool>,
}

impl GatherOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_max_tokens(mut self, max_tokens: usize) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    pub fn with_preferred_sources<I, S>(mut self, sources: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.preferred_sources = Some(sources.into_iter().map(Into::into).collect());
        self
    }

    pub fn with_file_content(mut self, include: bool) -> Self {
        self.include_file_content = Some(include);
        self
    }

    /// The preferred source list, if one was supplied and is non-empty.
    pub fn preferred(&self) -> Option<&[String]> {
        self.preferred_sources
            .as_deref()
            .filter(|sources| !sources.is_empty())
    }
}
