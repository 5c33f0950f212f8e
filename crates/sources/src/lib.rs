//! Built-in context sources for ctxmesh.
//!
//! Sources give the aggregator something to rank: the content of files the
//! query names, semantic code search hits, stored project facts, and
//! language server answers.
//!
//! Code search, memory and language intelligence are adapters to
//! out-of-process services. Each one talks to its service through a small
//! client trait ([`SymbolIndex`], [`ProjectMemory`], [`LanguageIntelligence`])
//! and reports itself unavailable until a client is attached.

pub mod code_search;
pub mod files;
pub mod lsp;
pub mod memory;
pub mod path;

use ctxmesh_config::AppConfig;
use ctxmesh_core::SourceProvider;
use std::sync::Arc;
use tracing::{info, warn};

pub use code_search::{CodeSearchSource, SymbolIndex, SymbolMatch};
pub use files::FileContentSource;
pub use lsp::{LanguageIntelligence, Location, LspSource, SymbolReport};
pub use memory::{InMemoryProjectMemory, MemoryFact, MemorySource, ProjectMemory};
pub use path::{PathGuard, PathGuardError};

/// Build the built-in sources from configuration, in canonical order:
/// files, code_search, memory, lsp.
///
/// When `memory.facts_path` is set, the memory source is backed by an
/// [`InMemoryProjectMemory`] loaded from that file; a file that fails to
/// load leaves the source detached (and therefore unavailable).
pub fn build_from_config(config: &AppConfig) -> Vec<Arc<dyn SourceProvider>> {
    let files = FileContentSource::from_config(&config.files);
    let code_search = CodeSearchSource::from_config(&config.code_search);
    let lsp = LspSource::from_config(&config.lsp);

    let mut memory = MemorySource::from_config(&config.memory);
    if let Some(path) = &config.memory.facts_path {
        match InMemoryProjectMemory::load(path) {
            Ok(backend) => {
                info!(path = %path.display(), facts = backend.len(), "Loaded project memory facts");
                memory = memory.with_backend(Arc::new(backend));
            }
            Err(e) => warn!(path = %path.display(), error = %e, "Failed to load project memory facts"),
        }
    }

    vec![
        Arc::new(files),
        Arc::new(code_search),
        Arc::new(memory),
        Arc::new(lsp),
    ]
}
