//! Context aggregation — the core of ctxmesh.
//!
//! Queries every active source concurrently, merges what comes back,
//! ranks by relevance and selects greedily under a token budget.
//!
//! # Determinism
//!
//! Given deterministic source output, the bundle is deterministic: chunks
//! are merged in activation order (not completion order), and the ranking
//! sort is stable, so equal-relevance chunks keep that order.
//!
//! # Failure isolation
//!
//! Each source runs in its own task. An `Err`, a panic, or (when a timeout
//! is configured) a timeout is logged and the source contributes nothing.
//! `gather_context` itself cannot fail.

use ctxmesh_config::{AppConfig, ContextConfig};
use ctxmesh_core::error::SourceError;
use ctxmesh_core::source::{SourceProvider, SourceRegistry, names};
use ctxmesh_core::{ContentChunk, ContextBundle, GatherOptions};
use futures::future::join_all;
use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

use crate::token::TokenEstimator;

// ── Settings ──────────────────────────────────────────────────────────────

/// Engine settings, usually derived from [`ContextConfig`].
#[derive(Debug, Clone)]
pub struct AggregatorSettings {
    /// Budget used when a call does not supply `max_tokens`.
    pub default_max_tokens: usize,
    /// Default for `GatherOptions::include_file_content`.
    pub include_file_content: bool,
    /// Per-source enable flags; unlisted sources are enabled.
    pub enabled: BTreeMap<String, bool>,
    /// Per-source limit on availability probes and gathers. `None` waits
    /// indefinitely.
    pub gather_timeout: Option<Duration>,
}

impl AggregatorSettings {
    pub fn from_config(config: &ContextConfig) -> Self {
        Self {
            default_max_tokens: config.default_max_tokens,
            include_file_content: config.include_file_content,
            enabled: config.sources.clone(),
            gather_timeout: config.gather_timeout_ms.map(Duration::from_millis),
        }
    }

    /// Whether `name` is switched on. Unknown names default to on.
    pub fn is_enabled(&self, name: &str) -> bool {
        self.enabled.get(name).copied().unwrap_or(true)
    }
}

impl Default for AggregatorSettings {
    fn default() -> Self {
        Self::from_config(&ContextConfig::default())
    }
}

// ── Aggregator ────────────────────────────────────────────────────────────

type ActiveSource = (String, Arc<dyn SourceProvider>);

/// A selected chunk with its estimated cost.
struct Selected {
    chunk: ContentChunk,
    tokens: usize,
}

/// The aggregation engine. Register sources once, then call
/// [`gather_context`](Self::gather_context) as often as needed.
pub struct ContextAggregator {
    registry: SourceRegistry,
    settings: AggregatorSettings,
    estimator: TokenEstimator,
}

impl ContextAggregator {
    pub fn new(settings: AggregatorSettings, estimator: TokenEstimator) -> Self {
        Self {
            registry: SourceRegistry::new(),
            settings,
            estimator,
        }
    }

    /// Build an engine (without sources) from application config.
    pub fn from_config(config: &AppConfig) -> Self {
        Self::new(
            AggregatorSettings::from_config(&config.context),
            TokenEstimator::from_config(&config.estimator),
        )
    }

    /// Register a source under its own name. A source with the same name
    /// is replaced in place.
    ///
    /// Registration is a setup step; it takes `&mut self`, so it cannot
    /// overlap an in-flight gather.
    pub fn register_source(&mut self, source: Arc<dyn SourceProvider>) {
        let name = source.name().to_string();
        if self.registry.register(source).is_some() {
            info!(source = %name, "Replaced context source");
        } else {
            info!(source = %name, "Registered context source");
        }
    }

    /// Registered source names in registration order.
    pub fn source_names(&self) -> Vec<&str> {
        self.registry.names()
    }

    pub fn is_registered(&self, name: &str) -> bool {
        self.registry.contains(name)
    }

    /// Look up a registered source.
    pub fn source(&self, name: &str) -> Option<&Arc<dyn SourceProvider>> {
        self.registry.get(name)
    }

    pub fn settings(&self) -> &AggregatorSettings {
        &self.settings
    }

    pub fn estimator(&self) -> &TokenEstimator {
        &self.estimator
    }

    /// Gather a budget-constrained context bundle for `query`.
    ///
    /// # Algorithm
    ///
    /// 1. Activate sources: the preferred list if non-empty (enable flags
    ///    ignored), otherwise every enabled source; either way only those
    ///    that report available
    /// 2. Run every active source concurrently and wait for all of them
    /// 3. Merge chunks in activation order, stable-sort by relevance
    /// 4. Single greedy pass: keep a chunk iff it still fits the budget
    /// 5. Bucket the kept chunks by source
    pub async fn gather_context(&self, query: &str, options: GatherOptions) -> ContextBundle {
        let started = Instant::now();
        let options = self.resolve_options(options);
        let budget = options.max_tokens.unwrap_or(self.settings.default_max_tokens);

        let active = self.active_sources(&options).await;
        let outcomes = self.run_sources(active, query, &options).await;

        let mut candidates = merge(outcomes);
        let candidate_count = candidates.len();
        rank(&mut candidates);

        let selected = self.select(candidates, budget);
        let selected_count = selected.len();
        let bundle = build_bundle(query, selected);

        info!(
            sources_used = ?bundle.sources_used,
            total_tokens = bundle.total_tokens,
            budget,
            selected = selected_count,
            candidates = candidate_count,
            duration_ms = started.elapsed().as_millis() as u64,
            "Context gathered"
        );

        bundle
    }

    fn resolve_options(&self, mut options: GatherOptions) -> GatherOptions {
        if options.include_file_content.is_none() {
            options.include_file_content = Some(self.settings.include_file_content);
        }
        options
    }

    // ── Activation ────────────────────────────────────────────────────────

    async fn active_sources(&self, options: &GatherOptions) -> Vec<ActiveSource> {
        let candidates: Vec<ActiveSource> = match options.preferred() {
            Some(preferred) => {
                let mut seen = HashSet::new();
                preferred
                    .iter()
                    .filter(|name| seen.insert(name.as_str()))
                    .filter_map(|name| match self.registry.get(name) {
                        Some(source) => Some((name.clone(), Arc::clone(source))),
                        None => {
                            debug!(source = %name, "Preferred source is not registered");
                            None
                        }
                    })
                    .collect()
            }
            None => self
                .registry
                .iter()
                .filter(|(name, _)| {
                    let enabled = self.settings.is_enabled(name);
                    if !enabled {
                        debug!(source = %name, "Source disabled by configuration");
                    }
                    enabled
                })
                .map(|(name, source)| (name.to_string(), Arc::clone(source)))
                .collect(),
        };

        let timeout = self.settings.gather_timeout;
        let probes = candidates.iter().map(|(_, source)| {
            let source = Arc::clone(source);
            tokio::spawn(async move {
                match timeout {
                    Some(limit) => tokio::time::timeout(limit, source.is_available())
                        .await
                        .unwrap_or(false),
                    None => source.is_available().await,
                }
            })
        });
        let probed = join_all(probes).await;

        candidates
            .into_iter()
            .zip(probed)
            .filter_map(|((name, source), probe)| match probe {
                Ok(true) => Some((name, source)),
                Ok(false) => {
                    debug!(source = %name, "Source unavailable, skipping");
                    None
                }
                Err(e) => {
                    warn!(source = %name, error = %e, "Availability probe failed, skipping source");
                    None
                }
            })
            .collect()
    }

    // ── Fan-out ───────────────────────────────────────────────────────────

    /// One task per source; every outcome is captured as a
    /// `(name, result)` pair, in activation order.
    async fn run_sources(
        &self,
        active: Vec<ActiveSource>,
        query: &str,
        options: &GatherOptions,
    ) -> Vec<(String, Result<Vec<ContentChunk>, SourceError>)> {
        let query: Arc<str> = Arc::from(query);
        let options = Arc::new(options.clone());
        let timeout = self.settings.gather_timeout;

        let (names, tasks): (Vec<String>, Vec<_>) = active
            .into_iter()
            .map(|(name, source)| {
                let query = Arc::clone(&query);
                let options = Arc::clone(&options);
                let task_name = name.clone();
                let task = tokio::spawn(async move {
                    let gathered = source.gather(&query, &options);
                    match timeout {
                        Some(limit) => tokio::time::timeout(limit, gathered)
                            .await
                            .unwrap_or_else(|_| {
                                Err(SourceError::Timeout {
                                    source_name: task_name,
                                    timeout_ms: limit.as_millis() as u64,
                                })
                            }),
                        None => gathered.await,
                    }
                });
                (name, task)
            })
            .unzip();

        let joined = join_all(tasks).await;

        names
            .into_iter()
            .zip(joined)
            .map(|(name, joined)| {
                let result = joined.unwrap_or_else(|e| {
                    Err(SourceError::TaskFailed {
                        source_name: name.clone(),
                        reason: e.to_string(),
                    })
                });
                if let Err(e) = &result {
                    warn!(source = %name, error = %e, "Source gather failed, excluding from this call");
                }
                (name, result)
            })
            .collect()
    }

    // ── Selection ─────────────────────────────────────────────────────────

    /// Greedy single pass over ranked chunks. A chunk is taken whole if it
    /// fits in what is left of the budget, otherwise skipped; later smaller
    /// chunks may still fit.
    fn select(&self, ranked: Vec<ContentChunk>, budget: usize) -> Vec<Selected> {
        let mut used = 0usize;
        let mut file_paths: HashSet<String> = HashSet::new();
        let mut selected = Vec::new();

        for chunk in ranked {
            let file_path = (chunk.source_name == names::FILES)
                .then(|| chunk.path().map(str::to_owned))
                .flatten();
            if let Some(path) = &file_path
                && file_paths.contains(path)
            {
                debug!(path = %path, "Duplicate file chunk skipped");
                continue;
            }

            let tokens = self.estimator.estimate(&chunk.content);
            if used.saturating_add(tokens) > budget {
                debug!(
                    source = %chunk.source_name,
                    tokens,
                    remaining = budget - used,
                    "Chunk does not fit budget"
                );
                continue;
            }

            used += tokens;
            if let Some(path) = file_path {
                file_paths.insert(path);
            }
            selected.push(Selected { chunk, tokens });
        }

        selected
    }
}

// ── Pipeline steps ────────────────────────────────────────────────────────

/// Flatten successful outcomes in order. Failed sources contribute nothing.
///
/// Chunks are normalised on the way: relevance is clamped into `[0, 1]`,
/// an empty `source_name` is filled with the producing source's name, and
/// file chunks without a path are dropped, since they have nowhere to go in
/// the bundle.
fn merge(outcomes: Vec<(String, Result<Vec<ContentChunk>, SourceError>)>) -> Vec<ContentChunk> {
    let mut merged = Vec::new();
    for (name, result) in outcomes {
        let Ok(chunks) = result else { continue };
        for mut chunk in chunks {
            if chunk.source_name.is_empty() {
                chunk.source_name = name.clone();
            }
            if chunk.source_name == names::FILES && chunk.path().is_none() {
                debug!(source = %name, "File chunk without path metadata dropped");
                continue;
            }
            chunk.relevance = ctxmesh_core::chunk::clamp_relevance(chunk.relevance);
            merged.push(chunk);
        }
    }
    merged
}

/// Sort by descending relevance. `sort_by` is stable, so ties keep merge
/// order.
fn rank(chunks: &mut [ContentChunk]) {
    chunks.sort_by(|a, b| b.relevance.total_cmp(&a.relevance));
}

/// Route selected chunks into their buckets and total their cost.
fn build_bundle(query: &str, selected: Vec<Selected>) -> ContextBundle {
    let mut bundle = ContextBundle::empty(query);

    for Selected { chunk, tokens } in selected {
        let source = chunk.source_name.clone();
        match source.as_str() {
            names::CODE_SEARCH => bundle.code_context.push(chunk.content),
            names::MEMORY => bundle.memory_context.push(chunk.content),
            names::LSP => bundle.lsp_context.push(chunk.content),
            names::FILES => match chunk.path() {
                Some(path) => {
                    let path = path.to_string();
                    bundle.file_contents.insert(path, chunk.content);
                }
                None => continue,
            },
            other => bundle
                .additional_info
                .entry(other.to_string())
                .or_default()
                .push(chunk.content),
        }
        bundle.total_tokens += tokens;
        bundle.sources_used.insert(source);
    }

    bundle
}
