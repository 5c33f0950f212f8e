//! `ctxmesh config` — Print configuration as TOML.

use ctxmesh_config::AppConfig;

/// Print the built-in defaults, a starting point for `config.toml`.
pub fn print_default() {
    println!("# {}", AppConfig::config_dir().join("config.toml").display());
    print!("{}", AppConfig::default_toml());
}

/// Print the configuration after file loading and env overrides.
pub fn print_effective(config: &AppConfig) -> Result<(), Box<dyn std::error::Error>> {
    print!("{}", toml::to_string_pretty(config)?);
    Ok(())
}
