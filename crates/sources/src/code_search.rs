//! Semantic code search source.
//!
//! Adapter over an out-of-process symbol index (a code-intelligence
//! server reached over its own protocol). The adapter turns the query into
//! a symbol lookup and renders each hit as a chunk; the transport lives
//! behind [`SymbolIndex`].

use async_trait::async_trait;
use ctxmesh_config::CodeSearchConfig;
use ctxmesh_core::error::SourceError;
use ctxmesh_core::source::{SourceProvider, names};
use ctxmesh_core::{ContentChunk, GatherOptions};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::warn;

/// One symbol hit returned by the index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SymbolMatch {
    /// Symbol name (e.g. `ContextAggregator::gather_context`).
    pub name: String,
    /// Symbol kind as reported by the index (function, struct, ...).
    pub kind: String,
    /// File the symbol is defined in.
    pub path: String,
    /// 1-based line of the definition, when known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub line: Option<u32>,
    /// Source excerpt around the symbol.
    #[serde(default)]
    pub snippet: String,
    /// Match score in `[0, 1]`.
    pub score: f32,
}

/// Client for a semantic symbol index.
#[async_trait]
pub trait SymbolIndex: Send + Sync {
    /// Whether the index is reachable and ready to answer.
    async fn is_ready(&self) -> bool;

    /// Find up to `limit` symbols relevant to `query`.
    async fn search(&self, query: &str, limit: usize) -> Result<Vec<SymbolMatch>, SourceError>;
}

/// Source backed by a [`SymbolIndex`]. Unavailable until an index is
/// attached.
pub struct CodeSearchSource {
    index: Option<Arc<dyn SymbolIndex>>,
    max_results: usize,
}

impl CodeSearchSource {
    pub fn new(max_results: usize) -> Self {
        Self {
            index: None,
            max_results,
        }
    }

    pub fn from_config(config: &CodeSearchConfig) -> Self {
        Self::new(config.max_results)
    }

    /// Attach the index client.
    pub fn with_index(mut self, index: Arc<dyn SymbolIndex>) -> Self {
        self.index = Some(index);
        self
    }
}

#[async_trait]
impl SourceProvider for CodeSearchSource {
    fn name(&self) -> &str {
        names::CODE_SEARCH
    }

    async fn is_available(&self) -> bool {
        match &self.index {
            Some(index) => index.is_ready().await,
            None => false,
        }
    }

    async fn gather(
        &self,
        query: &str,
        _options: &GatherOptions,
    ) -> Result<Vec<ContentChunk>, SourceError> {
        let Some(index) = &self.index else {
            return Ok(Vec::new());
        };

        let matches = match index.search(query, self.max_results).await {
            Ok(matches) => matches,
            Err(e) => {
                warn!(source = names::CODE_SEARCH, error = %e, "Symbol search failed");
                return Ok(Vec::new());
            }
        };

        Ok(matches
            .into_iter()
            .take(self.max_results)
            .map(symbol_chunk)
            .collect())
    }
}

fn symbol_chunk(hit: SymbolMatch) -> ContentChunk {
    let location = match hit.line {
        Some(line) => format!("{}:{}", hit.path, line),
        None => hit.path.clone(),
    };

    let mut content = format!("{} `{}` in {}", hit.kind, hit.name, location);
    if !hit.snippet.trim().is_empty() {
        content.push_str("\n```\n");
        content.push_str(hit.snippet.trim_end());
        content.push_str("\n```");
    }

    let mut chunk = ContentChunk::new(names::CODE_SEARCH, content, hit.score)
        .with_metadata(names::META_PATH, hit.path)
        .with_metadata("symbol", hit.name)
        .with_metadata("kind", hit.kind);
    if let Some(line) = hit.line {
        chunk = chunk.with_metadata("line", line.to_string());
    }
    chunk
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    struct FakeIndex {
        ready: bool,
        hits: Vec<SymbolMatch>,
        fail: bool,
        last_limit: Mutex<Option<usize>>,
    }

    impl FakeIndex {
        fn with_hits(hits: Vec<SymbolMatch>) -> Self {
            Self {
                ready: true,
                hits,
                fail: false,
                last_limit: Mutex::new(None),
            }
        }
    }

    #[async_trait]
    impl SymbolIndex for FakeIndex {
        async fn is_ready(&self) -> bool {
            self.ready
        }

        async fn search(&self, _query: &str, limit: usize) -> Result<Vec<SymbolMatch>, SourceError> {
            *self.last_limit.lock().unwrap() = Some(limit);
            if self.fail {
                return Err(SourceError::backend(names::CODE_SEARCH, "index offline"));
            }
            Ok(self.hits.clone())
        }
    }

    fn hit(name: &str, score: f32) -> SymbolMatch {
        SymbolMatch {
            name: name.into(),
            kind: "function".into(),
            path: "src/engine.rs".into(),
            line: Some(42),
            snippet: format!("pub fn {name}() {{}}\n"),
            score,
        }
    }

    #[tokio::test]
    async fn detached_source_is_unavailable() {
        let source = CodeSearchSource::new(5);
        assert!(!source.is_available().await);
        let chunks = source.gather("anything", &GatherOptions::default()).await.unwrap();
        assert!(chunks.is_empty());
    }

    #[tokio::test]
    async fn readiness_follows_index() {
        let mut index = FakeIndex::with_hits(vec![]);
        index.ready = false;
        let source = CodeSearchSource::new(5).with_index(Arc::new(index));
        assert!(!source.is_available().await);
    }

    #[tokio::test]
    async fn hits_become_chunks() {
        let index = Arc::new(FakeIndex::with_hits(vec![hit("gather", 0.8), hit("select", 0.6)]));
        let source = CodeSearchSource::new(5).with_index(index.clone());

        let chunks = source.gather("gather", &GatherOptions::default()).await.unwrap();
        assert_eq!(chunks.len(), 2);
        assert_eq!(*index.last_limit.lock().unwrap(), Some(5));

        let first = &chunks[0];
        assert_eq!(first.source_name, names::CODE_SEARCH);
        assert_eq!(first.relevance, 0.8);
        assert!(first.content.starts_with("function `gather` in src/engine.rs:42"));
        assert!(first.content.contains("```\npub fn gather() {}\n```"));
        assert_eq!(first.metadata.get("symbol").map(String::as_str), Some("gather"));
        assert_eq!(first.metadata.get("line").map(String::as_str), Some("42"));
    }

    #[tokio::test]
    async fn results_are_capped() {
        let hits = (0..10).map(|i| hit(&format!("f{i}"), 0.5)).collect();
        let source = CodeSearchSource::new(3).with_index(Arc::new(FakeIndex::with_hits(hits)));
        let chunks = source.gather("f", &GatherOptions::default()).await.unwrap();
        assert_eq!(chunks.len(), 3);
    }

    #[tokio::test]
    async fn backend_error_yields_empty_result() {
        let mut index = FakeIndex::with_hits(vec![hit("gather", 0.8)]);
        index.fail = true;
        let source = CodeSearchSource::new(5).with_index(Arc::new(index));
        let chunks = source.gather("gather", &GatherOptions::default()).await.unwrap();
        assert!(chunks.is_empty());
    }

    #[test]
    fn snippetless_hit_renders_header_only() {
        let mut h = hit("Config", 0.7);
        h.kind = "struct".into();
        h.line = None;
        h.snippet = String::new();
        let chunk = symbol_chunk(h);
        assert_eq!(chunk.content, "struct `Config` in src/engine.rs");
        assert!(!chunk.metadata.contains_key("line"));
    }
}
