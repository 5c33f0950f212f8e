pub mod config_cmd;
pub mod gather;
pub mod sources;

use ctxmesh_config::AppConfig;
use ctxmesh_engine::ContextAggregator;
use std::path::Path;

/// Load config from `path`, or from the default location.
pub fn load_config(path: Option<&Path>) -> Result<AppConfig, Box<dyn std::error::Error>> {
    let config = match path {
        Some(path) => AppConfig::load_with_env(path),
        None => AppConfig::load(),
    }
    .map_err(|e| format!("Failed to load config: {e}"))?;
    Ok(config)
}

/// An engine with every built-in source registered.
pub fn build_engine(config: &AppConfig) -> ContextAggregator {
    let mut engine = ContextAggregator::from_config(config);
    for source in ctxmesh_sources::build_from_config(config) {
        engine.register_source(source);
    }
    engine
}
