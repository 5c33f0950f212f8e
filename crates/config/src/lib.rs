//! Configuration loading, validation, and management for ctxmesh.
//!
//! Loads configuration from `~/.ctxmesh/config.toml` with environment
//! variable overrides. Validates all settings at startup.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Encodings the token estimator understands. `heuristic` disables the
/// precise tokenizer altogether.
pub const KNOWN_ENCODINGS: &[&str] = &["cl100k_base", "p50k_base", "r50k_base", "heuristic"];

/// The root configuration structure.
///
/// Maps directly to `~/.ctxmesh/config.toml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Aggregation settings (budget, enable flags, timeouts)
    #[serde(default)]
    pub context: ContextConfig,

    /// Token estimator settings
    #[serde(default)]
    pub estimator: EstimatorConfig,

    /// File content source settings
    #[serde(default)]
    pub files: FilesConfig,

    /// Project memory source settings
    #[serde(default)]
    pub memory: MemoryConfig,

    /// Semantic code search source settings
    #[serde(default)]
    pub code_search: CodeSearchConfig,

    /// Language intelligence source settings
    #[serde(default)]
    pub lsp: LspConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContextConfig {
    /// Token budget used when a call does not supply one
    #[serde(default = "default_max_tokens")]
    pub default_max_tokens: usize,

    /// Whether file-content gathering is attempted at all
    #[serde(default = "default_true")]
    pub include_file_content: bool,

    /// Per-source timeout in milliseconds. Absent = wait indefinitely.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gather_timeout_ms: Option<u64>,

    /// Per-source enable flags. Names not listed here are enabled.
    #[serde(default = "default_source_flags")]
    pub sources: BTreeMap<String, bool>,
}

fn default_max_tokens() -> usize {
    8000
}
fn default_true() -> bool {
    true
}
fn default_source_flags() -> BTreeMap<String, bool> {
    ["files", "code_search", "memory", "lsp"]
        .into_iter()
        .map(|name| (name.to_string(), true))
        .collect()
}

impl Default for ContextConfig {
    fn default() -> Self {
        Self {
            default_max_tokens: default_max_tokens(),
            include_file_content: true,
            gather_timeout_ms: None,
            sources: default_source_flags(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EstimatorConfig {
    /// BPE encoding name, or "heuristic"
    #[serde(default = "default_encoding")]
    pub encoding: String,

    /// HuggingFace `tokenizer.json`; takes precedence over `encoding`
    /// when the `hf-tokenizers` feature is enabled
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tokenizer_path: Option<PathBuf>,
}

fn default_encoding() -> String {
    "cl100k_base".into()
}

impl Default for EstimatorConfig {
    fn default() -> Self {
        Self {
            encoding: default_encoding(),
            tokenizer_path: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FilesConfig {
    /// Workspace root the file source reads under. Defaults to the
    /// current directory.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub root: Option<PathBuf>,

    #[serde(default = "default_max_file_bytes")]
    pub max_file_bytes: u64,

    #[serde(default = "default_max_files")]
    pub max_files: usize,
}

fn default_max_file_bytes() -> u64 {
    256 * 1024
}
fn default_max_files() -> usize {
    8
}

impl FilesConfig {
    /// The configured root, or the current directory.
    pub fn root_dir(&self) -> PathBuf {
        self.root.clone().unwrap_or_else(|| PathBuf::from("."))
    }
}

impl Default for FilesConfig {
    fn default() -> Self {
        Self {
            root: None,
            max_file_bytes: default_max_file_bytes(),
            max_files: default_max_files(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryConfig {
    /// TOML file of project facts for the in-process memory backend
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub facts_path: Option<PathBuf>,

    #[serde(default = "default_max_results")]
    pub max_results: usize,
}

fn default_max_results() -> usize {
    10
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            facts_path: None,
            max_results: default_max_results(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CodeSearchConfig {
    #[serde(default = "default_max_results")]
    pub max_results: usize,
}

impl Default for CodeSearchConfig {
    fn default() -> Self {
        Self {
            max_results: default_max_results(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LspConfig {
    #[serde(default = "default_max_symbols")]
    pub max_symbols: usize,
}

fn default_max_symbols() -> usize {
    5
}

impl Default for LspConfig {
    fn default() -> Self {
        Self {
            max_symbols: default_max_symbols(),
        }
    }
}

impl AppConfig {
    /// Load configuration from the default path (~/.ctxmesh/config.toml).
    ///
    /// Environment overrides (highest priority):
    /// - `CTXMESH_MAX_TOKENS` — default token budget
    /// - `CTXMESH_ROOT` — file source root
    pub fn load() -> Result<Self, ConfigError> {
        let config_path = Self::config_dir().join("config.toml");
        Self::load_with_env(&config_path)
    }

    /// Load from `path`, then apply environment overrides.
    pub fn load_with_env(path: &Path) -> Result<Self, ConfigError> {
        let mut config = Self::load_from(path)?;
        config.apply_overrides(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a specific file path.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            tracing::info!("No config file found at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        let config: Self = toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Apply overrides from a key lookup (the process environment in
    /// production).
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(raw) = lookup("CTXMESH_MAX_TOKENS") {
            self.context.default_max_tokens = raw.trim().parse().map_err(|_| {
                ConfigError::ValidationError(format!(
                    "CTXMESH_MAX_TOKENS must be a positive integer, got '{raw}'"
                ))
            })?;
        }

        if let Some(root) = lookup("CTXMESH_ROOT") {
            self.files.root = Some(PathBuf::from(root));
        }

        Ok(())
    }

    /// Get the configuration directory path.
    pub fn config_dir() -> PathBuf {
        dirs_home().join(".ctxmesh")
    }

    /// Validate the configuration.
    fn validate(&self) -> Result<(), ConfigError> {
        if self.context.default_max_tokens == 0 {
            return Err(ConfigError::ValidationError(
                "context.default_max_tokens must be > 0".into(),
            ));
        }

        if self.context.gather_timeout_ms == Some(0) {
            return Err(ConfigError::ValidationError(
                "context.gather_timeout_ms must be > 0 when set".into(),
            ));
        }

        if self.files.max_files == 0 {
            return Err(ConfigError::ValidationError(
                "files.max_files must be > 0".into(),
            ));
        }

        if !KNOWN_ENCODINGS.contains(&self.estimator.encoding.as_str()) {
            return Err(ConfigError::ValidationError(format!(
                "estimator.encoding '{}' is not one of {}",
                self.estimator.encoding,
                KNOWN_ENCODINGS.join(", ")
            )));
        }

        Ok(())
    }

    /// Generate a default config TOML string.
    pub fn default_toml() -> String {
        let config = Self::default();
        toml::to_string_pretty(&config).unwrap_or_default()
    }
}

/// Get the user's home directory.
fn dirs_home() -> PathBuf {
    #[cfg(target_os = "windows")]
    {
        std::env::var("USERPROFILE")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("C:\\Users\\Default"))
    }
    #[cfg(not(target_os = "windows"))]
    {
        std::env::var("HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("/tmp"))
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file at {path}: {reason}")]
    ReadError { path: PathBuf, reason: String },

    #[error("Failed to parse config file at {path}: {reason}")]
    ParseError { path: PathBuf, reason: String },

    #[error("Configuration validation failed: {0}")]
    ValidationError(String),
}
