//! # ctxmesh Core
//!
//! Domain types, traits, and error definitions for the ctxmesh context
//! aggregator. This crate has **no async runtime dependency**. It defines the
//! model that the sources, the engine and the CLI all build against.
//!
//! ## Design Philosophy
//!
//! Every information provider is a [`SourceProvider`]. Implementations live
//! in `ctxmesh-sources`; the aggregation engine only ever sees the trait.
//! This enables:
//! - Plugging in new providers without touching the engine
//! - Easy testing with mock/stub providers
//! - Clean dependency graph (all crates depend inward on core)

pub mod bundle;
pub mod chunk;
pub mod error;
pub mod source;

// Re-export key types at crate root for ergonomics
pub use bundle::ContextBundle;
pub use chunk::{ContentChunk, GatherOptions};
pub use error::{EstimatorError, SourceError};
pub use source::{SourceProvider, SourceRegistry, names};
