//! The typed, budget-constrained result of one gather call.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Context gathered for one query, bucketed by the kind of source it came
/// from.
///
/// `total_tokens` is the summed estimated cost of exactly the chunks that
/// appear in the buckets, and `sources_used` names a source only when at
/// least one of its chunks survived selection.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ContextBundle {
    /// The query this bundle was gathered for.
    pub query: String,

    /// Chunks from the semantic code search source.
    #[serde(default)]
    pub code_context: Vec<String>,

    /// File path → file content, in selection order.
    #[serde(default)]
    pub file_contents: IndexMap<String, String>,

    /// Chunks from the project memory source.
    #[serde(default)]
    pub memory_context: Vec<String>,

    /// Chunks from the language intelligence source.
    #[serde(default)]
    pub lsp_context: Vec<String>,

    /// Chunks from any other source, keyed by source name in first-seen order.
    #[serde(default)]
    pub additional_info: IndexMap<String, Vec<String>>,

    /// Estimated token cost of everything in the bundle.
    pub total_tokens: usize,

    /// Sources that contributed at least one selected chunk.
    #[serde(default)]
    pub sources_used: BTreeSet<String>,
}

impl ContextBundle {
    /// An empty bundle for `query`.
    pub fn empty(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            ..Self::default()
        }
    }

    /// True when no bucket holds any content.
    pub fn is_empty(&self) -> bool {
        self.code_context.is_empty()
            && self.file_contents.is_empty()
            && self.memory_context.is_empty()
            && self.lsp_context.is_empty()
            && self.additional_info.values().all(Vec::is_empty)
    }

    /// Number of chunks held across all buckets.
    pub fn chunk_count(&self) -> usize {
        self.code_context.len()
            + self.file_contents.len()
            + self.memory_context.len()
            + self.lsp_context.len()
            + self.additional_info.values().map(Vec::len).sum::<usize>()
    }
}
