//! Project memory source — stored facts about the project.
//!
//! The usual backend is a knowledge-graph service reached out of process;
//! [`InMemoryProjectMemory`] is a keyword-matching backend for small fact
//! files and tests.

use async_trait::async_trait;
use ctxmesh_config::MemoryConfig;
use ctxmesh_core::error::SourceError;
use ctxmesh_core::source::{SourceProvider, names};
use ctxmesh_core::{ContentChunk, GatherOptions};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;
use tracing::warn;

/// A single stored project fact.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemoryFact {
    /// What the fact is about (component, convention, decision, ...).
    #[serde(default)]
    pub subject: String,
    /// The fact itself.
    pub fact: String,
    /// Confidence in `[0, 1]`.
    #[serde(default = "default_confidence")]
    pub confidence: f32,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
}

fn default_confidence() -> f32 {
    0.7
}

impl MemoryFact {
    pub fn new(subject: impl Into<String>, fact: impl Into<String>, confidence: f32) -> Self {
        Self {
            subject: subject.into(),
            fact: fact.into(),
            confidence,
            tags: Vec::new(),
        }
    }
}

/// Client for a project memory store.
#[async_trait]
pub trait ProjectMemory: Send + Sync {
    /// Whether the store is reachable.
    async fn is_ready(&self) -> bool;

    /// Recall up to `limit` facts relevant to `query`, best first. The
    /// returned `confidence` is used as the chunk relevance.
    async fn recall(&self, query: &str, limit: usize) -> Result<Vec<MemoryFact>, SourceError>;
}

/// Source backed by a [`ProjectMemory`]. Unavailable until a backend is
/// attached.
pub struct MemorySource {
    backend: Option<Arc<dyn ProjectMemory>>,
    max_results: usize,
}

impl MemorySource {
    pub fn new(max_results: usize) -> Self {
        Self {
            backend: None,
            max_results,
        }
    }

    pub fn from_config(config: &MemoryConfig) -> Self {
        Self::new(config.max_results)
    }

    pub fn with_backend(mut self, backend: Arc<dyn ProjectMemory>) -> Self {
        self.backend = Some(backend);
        self
    }
}

#[async_trait]
impl SourceProvider for MemorySource {
    fn name(&self) -> &str {
        names::MEMORY
    }

    async fn is_available(&self) -> bool {
        match &self.backend {
            Some(backend) => backend.is_ready().await,
            None => false,
        }
    }

    async fn gather(
        &self,
        query: &str,
        _options: &GatherOptions,
    ) -> Result<Vec<ContentChunk>, SourceError> {
        let Some(backend) = &self.backend else {
            return Ok(Vec::new());
        };

        let facts = match backend.recall(query, self.max_results).await {
            Ok(facts) => facts,
            Err(e) => {
                warn!(source = names::MEMORY, error = %e, "Memory recall failed");
                return Ok(Vec::new());
            }
        };

        Ok(facts
            .into_iter()
            .take(self.max_results)
            .map(fact_chunk)
            .collect())
    }
}

fn fact_chunk(fact: MemoryFact) -> ContentChunk {
    let content = if fact.subject.is_empty() {
        fact.fact
    } else {
        format!("{}: {}", fact.subject, fact.fact)
    };
    let mut chunk = ContentChunk::new(names::MEMORY, content, fact.confidence);
    if !fact.subject.is_empty() {
        chunk = chunk.with_metadata("subject", fact.subject);
    }
    if !fact.tags.is_empty() {
        chunk = chunk.with_metadata("tags", fact.tags.join(","));
    }
    chunk
}

// ── In-process backend ─────────────────────────────────────────────────

#[derive(Debug, Default, Deserialize)]
struct FactsFile {
    #[serde(default)]
    facts: Vec<MemoryFact>,
}

/// Keyword-matching memory over a fixed list of facts.
///
/// A fact matches when it shares at least one query term (three or more
/// characters) with its subject, text or tags. Its score is the fact's
/// confidence scaled by the share of query terms it matched.
#[derive(Debug, Clone, Default)]
pub struct InMemoryProjectMemory {
    facts: Vec<MemoryFact>,
}

impl InMemoryProjectMemory {
    pub fn new(facts: Vec<MemoryFact>) -> Self {
        Self { facts }
    }

    /// Parse a TOML document with a `[[facts]]` array.
    pub fn from_toml_str(content: &str) -> Result<Self, SourceError> {
        let file: FactsFile = toml::from_str(content).map_err(|e| SourceError::Io {
            path: "<facts>".into(),
            reason: e.to_string(),
        })?;
        Ok(Self::new(file.facts))
    }

    /// Load facts from a TOML file.
    pub fn load(path: &Path) -> Result<Self, SourceError> {
        let content = std::fs::read_to_string(path).map_err(|e| SourceError::Io {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;
        Self::from_toml_str(&content).map_err(|e| match e {
            SourceError::Io { reason, .. } => SourceError::Io {
                path: path.display().to_string(),
                reason,
            },
            other => other,
        })
    }

    pub fn len(&self) -> usize {
        self.facts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.facts.is_empty()
    }
}

#[async_trait]
impl ProjectMemory for InMemoryProjectMemory {
    async fn is_ready(&self) -> bool {
        true
    }

    async fn recall(&self, query: &str, limit: usize) -> Result<Vec<MemoryFact>, SourceError> {
        let terms = query_terms(query);
        if terms.is_empty() {
            return Ok(Vec::new());
        }

        let mut results: Vec<MemoryFact> = self
            .facts
            .iter()
            .filter_map(|fact| {
                let haystack = format!(
                    "{} {} {}",
                    fact.subject.to_lowercase(),
                    fact.fact.to_lowercase(),
                    fact.tags.join(" ").to_lowercase()
                );
                let hits = terms.iter().filter(|t| haystack.contains(t.as_str())).count();
                if hits == 0 {
                    return None;
                }
                let mut scored = fact.clone();
                scored.confidence = fact.confidence.clamp(0.0, 1.0) * hits as f32 / terms.len() as f32;
                Some(scored)
            })
            .collect();

        // Stable: equal scores keep file order.
        results.sort_by(|a, b| b.confidence.total_cmp(&a.confidence));
        results.truncate(limit);
        Ok(results)
    }
}

fn query_terms(query: &str) -> Vec<String> {
    let mut terms: Vec<String> = Vec::new();
    for word in query.split(|c: char| !c.is_alphanumeric() && c != '_') {
        let word = word.to_lowercase();
        if word.chars().count() >= 3 && !terms.contains(&word) {
            terms.push(word);
        }
    }
    terms
}

#[cfg(test)]
mod tests {
    use super::*;

    const FACTS: &str = r#"
[[facts]]
subject = "release"
fact = "Release builds are produced with cargo xtask dist"
confidence = 0.9
tags = ["build"]

[[facts]]
subject = "config"
fact = "Budgets default to 8000 tokens"
confidence = 0.8

[[facts]]
fact = "The CI pipeline runs on every pull request"
"#;

    fn memory() -> InMemoryProjectMemory {
        InMemoryProjectMemory::from_toml_str(FACTS).unwrap()
    }

    #[test]
    fn facts_file_parses_with_defaults() {
        let mem = memory();
        assert_eq!(mem.len(), 3);
        assert_eq!(mem.facts[2].subject, "");
        assert_eq!(mem.facts[2].confidence, 0.7);
    }

    #[test]
    fn malformed_facts_file_is_an_error() {
        let err = InMemoryProjectMemory::from_toml_str("[[facts]]\nsubject = 3").unwrap_err();
        assert!(matches!(err, SourceError::Io { .. }));
    }

    #[test]
    fn load_reports_missing_file() {
        let err = InMemoryProjectMemory::load(Path::new("/nonexistent/facts.toml")).unwrap_err();
        assert!(err.to_string().contains("/nonexistent/facts.toml"));
    }

    #[tokio::test]
    async fn recall_matches_keywords() {
        let facts = memory().recall("how do I build a release?", 10).await.unwrap();
        assert_eq!(facts.len(), 1);
        assert_eq!(facts[0].subject, "release");
        // "how" misses, "build" and "release" hit: 2 of 3 terms.
        assert!((facts[0].confidence - 0.9 * 2.0 / 3.0).abs() < 1e-6);
    }

    #[tokio::test]
    async fn recall_respects_limit_and_order() {
        let facts = memory().recall("release config pipeline", 2).await.unwrap();
        assert_eq!(facts.len(), 2);
        assert!(facts[0].confidence >= facts[1].confidence);
    }

    #[tokio::test]
    async fn short_queries_recall_nothing() {
        let facts = memory().recall("a b", 10).await.unwrap();
        assert!(facts.is_empty());
    }

    #[tokio::test]
    async fn source_renders_subject_prefix() {
        let source = MemorySource::new(5).with_backend(Arc::new(memory()));
        assert!(source.is_available().await);

        let chunks = source.gather("budgets", &GatherOptions::default()).await.unwrap();
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].source_name, names::MEMORY);
        assert_eq!(chunks[0].content, "config: Budgets default to 8000 tokens");
        assert_eq!(chunks[0].metadata.get("subject").map(String::as_str), Some("config"));
    }

    #[tokio::test]
    async fn detached_source_is_unavailable() {
        let source = MemorySource::new(5);
        assert!(!source.is_available().await);
        assert!(source.gather("release", &GatherOptions::default()).await.unwrap().is_empty());
    }

    struct BrokenMemory;

    #[async_trait]
    impl ProjectMemory for BrokenMemory {
        async fn is_ready(&self) -> bool {
            true
        }

        async fn recall(&self, _query: &str, _limit: usize) -> Result<Vec<MemoryFact>, SourceError> {
            Err(SourceError::backend(names::MEMORY, "graph store unreachable"))
        }
    }

    #[tokio::test]
    async fn backend_error_yields_empty_result() {
        let source = MemorySource::new(5).with_backend(Arc::new(BrokenMemory));
        let chunks = source.gather("release", &GatherOptions::default()).await.unwrap();
        assert!(chunks.is_empty());
    }
}
