//! Language intelligence source — definitions, references and hover text.
//!
//! Adapter over a language server bridge. Identifier-like tokens in the
//! query (`snake_case`, `CamelCase`, `path::to::item`, `call()`) are looked
//! up one by one; each answer becomes one chunk.

use async_trait::async_trait;
use ctxmesh_config::LspConfig;
use ctxmesh_core::error::SourceError;
use ctxmesh_core::source::{SourceProvider, names};
use ctxmesh_core::{ContentChunk, GatherOptions};
use serde::{Deserialize, Serialize};
use std::fmt::Write as _;
use std::sync::Arc;
use tracing::{debug, warn};

const DEFINED_RELEVANCE: f32 = 0.75;
const UNDEFINED_RELEVANCE: f32 = 0.55;
/// References listed per symbol before summarising the rest.
const MAX_LISTED_REFERENCES: usize = 5;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Location {
    pub path: String,
    pub line: u32,
}

impl std::fmt::Display for Location {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.path, self.line)
    }
}

/// What the language server knows about one symbol.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct SymbolReport {
    pub symbol: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub definition: Option<Location>,
    #[serde(default)]
    pub references: Vec<Location>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hover: Option<String>,
}

/// Client for a language server bridge.
#[async_trait]
pub trait LanguageIntelligence: Send + Sync {
    /// Whether a server is attached and initialised.
    async fn is_ready(&self) -> bool;

    /// Definition, references and hover for `symbol`, or `None` when the
    /// server does not know it.
    async fn describe(&self, symbol: &str) -> Result<Option<SymbolReport>, SourceError>;
}

/// Source backed by a [`LanguageIntelligence`] client.
pub struct LspSource {
    backend: Option<Arc<dyn LanguageIntelligence>>,
    max_symbols: usize,
}

impl LspSource {
    pub fn new(max_symbols: usize) -> Self {
        Self {
            backend: None,
            max_symbols,
        }
    }

    pub fn from_config(config: &LspConfig) -> Self {
        Self::new(config.max_symbols)
    }

    pub fn with_backend(mut self, backend: Arc<dyn LanguageIntelligence>) -> Self {
        self.backend = Some(backend);
        self
    }
}

#[async_trait]
impl SourceProvider for LspSource {
    fn name(&self) -> &str {
        names::LSP
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

        let symbols = extract_symbols(query, self.max_symbols);
        if symbols.is_empty() {
            return Ok(Vec::new());
        }

        let lookups = symbols.iter().map(|symbol| backend.describe(symbol));
        let answers = futures::future::join_all(lookups).await;

        let mut chunks = Vec::new();
        for (symbol, answer) in symbols.iter().zip(answers) {
            match answer {
                Ok(Some(report)) => chunks.push(report_chunk(report)),
                Ok(None) => debug!(symbol = %symbol, "Language server has no answer"),
                Err(e) => warn!(source = names::LSP, symbol = %symbol, error = %e, "Symbol lookup failed"),
            }
        }
        Ok(chunks)
    }
}

fn report_chunk(report: SymbolReport) -> ContentChunk {
    let mut content = match &report.kind {
        Some(kind) => format!("{} `{}`", kind, report.symbol),
        None => format!("`{}`", report.symbol),
    };
    if let Some(def) = &report.definition {
        let _ = write!(content, "\nDefined at {def}");
    }
    if !report.references.is_empty() {
        let listed: Vec<String> = report
            .references
            .iter()
            .take(MAX_LISTED_REFERENCES)
            .map(Location::to_string)
            .collect();
        let _ = write!(content, "\nReferenced at {}", listed.join(", "));
        let rest = report.references.len().saturating_sub(MAX_LISTED_REFERENCES);
        if rest > 0 {
            let _ = write!(content, " (+{rest} more)");
        }
    }
    if let Some(hover) = report.hover.as_deref().map(str::trim).filter(|h| !h.is_empty()) {
        let _ = write!(content, "\n{hover}");
    }

    let relevance = if report.definition.is_some() {
        DEFINED_RELEVANCE
    } else {
        UNDEFINED_RELEVANCE
    };

    let mut chunk = ContentChunk::new(names::LSP, content, relevance)
        .with_metadata("symbol", report.symbol)
        .with_metadata("references", report.references.len().to_string());
    if let Some(def) = report.definition {
        chunk = chunk.with_metadata("definition", def.to_string());
    }
    chunk
}

/// Identifier-like tokens in `query`, in order, deduplicated, at most
/// `limit`.
pub fn extract_symbols(query: &str, limit: usize) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();

    for raw in query.split_whitespace() {
        if out.len() >= limit {
            break;
        }
        let trimmed = raw.trim_matches(|c: char| !is_symbol_char(c));
        let is_call = trimmed.ends_with("()");
        let token = trimmed.trim_end_matches("()").trim_matches(':');

        if token.is_empty()
            || !token.chars().all(|c| c.is_alphanumeric() || c == '_' || c == ':')
            || !token.chars().next().is_some_and(|c| c.is_alphabetic() || c == '_')
        {
            continue;
        }
        if !(is_call || looks_like_identifier(token)) {
            continue;
        }
        if !out.iter().any(|existing| existing == token) {
            out.push(token.to_string());
        }
    }

    out
}

/// Characters kept at the edges of a token: identifier characters, path
/// separators and call parentheses.
fn is_symbol_char(c: char) -> bool {
    c.is_alphanumeric() || matches!(c, '_' | ':' | '(' | ')')
}

fn looks_like_identifier(token: &str) -> bool {
    if token.contains("::") {
        return true;
    }
    if token.contains('_') && token.chars().any(char::is_alphanumeric) {
        return true;
    }
    // CamelCase / camelCase: an uppercase letter after the first character
    // with lowercase letters present.
    let has_lower = token.chars().any(char::is_lowercase);
    let inner_upper = token.chars().skip(1).any(char::is_uppercase);
    has_lower && inner_upper
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn extracts_identifier_shapes() {
        let got = extract_symbols(
            "Why does ContextAggregator call gather_context() and std::mem::take, not Plain words?",
            10,
        );
        assert_eq!(got, vec!["ContextAggregator", "gather_context", "std::mem::take"]);
    }

    #[test]
    fn bare_calls_count_as_symbols() {
        assert_eq!(extract_symbols("what does run() do", 5), vec!["run"]);
    }

    #[test]
    fn quotes_and_punctuation_are_trimmed() {
        let got = extract_symbols("is `load_config()`, or \"AppConfig\" the entry?", 5);
        assert_eq!(got, vec!["load_config", "AppConfig"]);
    }

    #[test]
    fn symbols_are_capped_and_deduplicated() {
        let got = extract_symbols("foo_a foo_a foo_b foo_c", 2);
        assert_eq!(got, vec!["foo_a", "foo_b"]);
    }

    #[test]
    fn prose_yields_nothing() {
        assert!(extract_symbols("How is the budget chosen? 42 times!", 5).is_empty());
    }

    struct FakeServer {
        reports: HashMap<String, SymbolReport>,
    }

    #[async_trait]
    impl LanguageIntelligence for FakeServer {
        async fn is_ready(&self) -> bool {
            true
        }

        async fn describe(&self, symbol: &str) -> Result<Option<SymbolReport>, SourceError> {
            if symbol == "explode_now" {
                return Err(SourceError::backend(names::LSP, "server crashed"));
            }
            Ok(self.reports.get(symbol).cloned())
        }
    }

    fn server() -> Arc<FakeServer> {
        let mut reports = HashMap::new();
        reports.insert(
            "parse_config".to_string(),
            SymbolReport {
                symbol: "parse_config".into(),
                kind: Some("function".into()),
                definition: Some(Location {
                    path: "src/config.rs".into(),
                    line: 12,
                }),
                references: (1..=7)
                    .map(|line| Location {
                        path: "src/main.rs".into(),
                        line,
                    })
                    .collect(),
                hover: Some("fn parse_config(path: &Path) -> Config".into()),
            },
        );
        reports.insert(
            "HttpClient".to_string(),
            SymbolReport {
                symbol: "HttpClient".into(),
                ..SymbolReport::default()
            },
        );
        Arc::new(FakeServer { reports })
    }

    #[tokio::test]
    async fn reports_become_chunks_in_query_order() {
        let source = LspSource::new(5).with_backend(server());
        assert!(source.is_available().await);

        let chunks = source
            .gather(
                "where is parse_config defined and who uses HttpClient or unknown_thing",
                &GatherOptions::default(),
            )
            .await
            .unwrap();
        assert_eq!(chunks.len(), 2);

        let first = &chunks[0];
        assert_eq!(first.source_name, names::LSP);
        assert_eq!(first.relevance, DEFINED_RELEVANCE);
        assert!(first.content.starts_with("function `parse_config`"));
        assert!(first.content.contains("Defined at src/config.rs:12"));
        assert!(first.content.contains("(+2 more)"));
        assert!(first.content.ends_with("fn parse_config(path: &Path) -> Config"));
        assert_eq!(first.metadata.get("references").map(String::as_str), Some("7"));

        assert_eq!(chunks[1].relevance, UNDEFINED_RELEVANCE);
        assert_eq!(chunks[1].content, "`HttpClient`");
    }

    #[tokio::test]
    async fn failing_lookup_does_not_hide_others() {
        let source = LspSource::new(5).with_backend(server());
        let chunks = source
            .gather("explode_now then parse_config", &GatherOptions::default())
            .await
            .unwrap();
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].metadata.get("symbol").map(String::as_str), Some("parse_config"));
    }

    #[tokio::test]
    async fn detached_source_is_unavailable() {
        let source = LspSource::new(5);
        assert!(!source.is_available().await);
    }
}
