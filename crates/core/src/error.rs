//! Error types for the ctxmesh domain.
//!
//! Uses `thiserror` for ergonomic error definitions.
//! Each bounded context has its own error enum.

use thiserror::Error;

/// Failures raised by a source provider while gathering.
///
/// The aggregation engine never propagates these; a failing source simply
/// contributes nothing to the bundle for that call.
#[derive(Debug, Clone, Error)]
pub enum SourceError {
    #[error("Backend request failed for {source_name}: {reason}")]
    Backend { source_name: String, reason: String },

    #[error("I/O error on '{path}': {reason}")]
    Io { path: String, reason: String },

    #[error("Source {source_name} timed out after {timeout_ms}ms")]
    Timeout { source_name: String, timeout_ms: u64 },

    #[error("Gather task for {source_name} failed: {reason}")]
    TaskFailed { source_name: String, reason: String },
}

impl SourceError {
    /// Shorthand for a backend failure.
    pub fn backend(source_name: impl Into<String>, reason: impl ToString) -> Self {
        Self::Backend {
            source_name: source_name.into(),
            reason: reason.to_string(),
        }
    }
}

/// Token estimator failures. Both variants are recovered from by falling
/// back to the character heuristic.
#[derive(Debug, Clone, Error)]
pub enum EstimatorError {
    #[error("Tokenizer initialization failed: {0}")]
    Init(String),

    #[error("Tokenizer failed to encode text: {0}")]
    Encode(String),
}
