//! `ctxmesh sources` — List sources, enable flags and availability.

use ctxmesh_config::AppConfig;

pub async fn run(config: &AppConfig) -> Result<(), Box<dyn std::error::Error>> {
    let engine = super::build_engine(config);

    println!("ctxmesh sources");
    println!("===============");
    println!("  Config dir:  {}", AppConfig::config_dir().display());
    println!("  File root:   {}", config.files.root_dir().display());
    println!("  Budget:      {} tokens", config.context.default_max_tokens);
    println!("  Estimator:   {}", engine.estimator().mode_name());
    println!();

    for name in engine.source_names() {
        let enabled = engine.settings().is_enabled(name);
        let available = match engine.source(name) {
            Some(source) => source.is_available().await,
            None => false,
        };
        println!(
            "  {:<12} {:<9} {}",
            name,
            if enabled { "enabled" } else { "disabled" },
            if available { "✅ available" } else { "⚠️  unavailable" }
        );
    }

    Ok(())
}
