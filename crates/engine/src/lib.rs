//! The ctxmesh aggregation engine.
//!
//! Given a query, the engine:
//!
//! 1. **Activates** the registered sources that are enabled (or explicitly
//!    preferred) and currently available
//! 2. **Fans out** one task per active source and waits for all of them
//! 3. **Merges** every returned chunk and **ranks** by relevance (stable)
//! 4. **Selects** greedily under the token budget, all-or-nothing per chunk
//! 5. **Buckets** the selection into a typed [`ContextBundle`]
//!
//! A failing, panicking or timed-out source contributes nothing; the call
//! itself always produces a bundle.
//!
//! [`ContextBundle`]: ctxmesh_core::ContextBundle

pub mod aggregator;
pub mod format;
pub mod token;

pub use aggregator::{AggregatorSettings, ContextAggregator};
pub use format::{SECTION_SEPARATOR, format_for_model};
pub use token::{BpeEncoder, SubwordEncoder, TokenEstimator, heuristic_tokens};
