//! File content source — reads files the query names explicitly.
//!
//! A query like "why does `src/config.rs` reject zero budgets?" yields the
//! content of `src/config.rs`, provided it lives under the workspace root.
//! Small files rank higher than large ones.

use async_trait::async_trait;
use ctxmesh_config::FilesConfig;
use ctxmesh_core::error::SourceError;
use ctxmesh_core::source::{SourceProvider, names};
use ctxmesh_core::{ContentChunk, GatherOptions};
use std::collections::HashSet;
use std::path::PathBuf;
use tracing::{debug, warn};

use crate::path::PathGuard;

/// Relevance of a file the query names explicitly.
const EXPLICIT_MENTION_RELEVANCE: f32 = 0.85;
/// Files at or below this size get a bonus.
const SMALL_FILE_BYTES: u64 = 4 * 1024;
const SMALL_FILE_BONUS: f32 = 0.1;
/// Files above this size have their relevance halved.
const LARGE_FILE_BYTES: u64 = 64 * 1024;
/// Path-like tokens considered per query. `max_files` caps the files
/// actually read; prose such as "e.g." can also look like a path.
const MAX_PATH_CANDIDATES: usize = 64;

pub struct FileContentSource {
    root: PathBuf,
    max_file_bytes: u64,
    max_files: usize,
}

impl FileContentSource {
    /// Create a file source rooted at `root` with default limits.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        let defaults = FilesConfig::default();
        Self {
            root: root.into(),
            max_file_bytes: defaults.max_file_bytes,
            max_files: defaults.max_files,
        }
    }

    pub fn from_config(config: &FilesConfig) -> Self {
        Self::new(config.root_dir())
            .with_max_file_bytes(config.max_file_bytes)
            .with_max_files(config.max_files)
    }

    pub fn with_max_file_bytes(mut self, max_file_bytes: u64) -> Self {
        self.max_file_bytes = max_file_bytes;
        self
    }

    pub fn with_max_files(mut self, max_files: usize) -> Self {
        self.max_files = max_files.max(1);
        self
    }
}

#[async_trait]
impl SourceProvider for FileContentSource {
    fn name(&self) -> &str {
        names::FILES
    }

    async fn is_available(&self) -> bool {
        tokio::fs::metadata(&self.root)
            .await
            .map(|m| m.is_dir())
            .unwrap_or(false)
    }

    async fn gather(
        &self,
        query: &str,
        options: &GatherOptions,
    ) -> Result<Vec<ContentChunk>, SourceError> {
        if options.include_file_content == Some(false) {
            return Ok(Vec::new());
        }

        let candidates = extract_path_candidates(query, MAX_PATH_CANDIDATES);
        if candidates.is_empty() {
            return Ok(Vec::new());
        }

        let guard = match PathGuard::new(&self.root).await {
            Ok(guard) => guard,
            Err(e) => {
                warn!(root = %self.root.display(), error = %e, "File source root unusable");
                return Ok(Vec::new());
            }
        };

        let mut seen = HashSet::new();
        let mut chunks = Vec::new();

        for candidate in candidates {
            if chunks.len() >= self.max_files {
                debug!(limit = self.max_files, "File limit reached, ignoring remaining paths");
                break;
            }
            let resolved = match guard.resolve(&candidate).await {
                Ok(path) => path,
                Err(e) => {
                    debug!(path = %candidate, error = %e, "Skipping path named in query");
                    continue;
                }
            };
            if !seen.insert(resolved.clone()) {
                continue;
            }

            let meta = match tokio::fs::metadata(&resolved).await {
                Ok(meta) if meta.is_file() => meta,
                Ok(_) => continue,
                Err(e) => {
                    debug!(path = %candidate, error = %e, "Skipping unreadable path");
                    continue;
                }
            };

            let bytes = meta.len();
            if bytes > self.max_file_bytes {
                debug!(path = %candidate, bytes, limit = self.max_file_bytes, "Skipping oversized file");
                continue;
            }

            let content = match tokio::fs::read_to_string(&resolved).await {
                Ok(content) => content,
                Err(e) => {
                    debug!(path = %candidate, error = %e, "Skipping non-text file");
                    continue;
                }
            };

            chunks.push(
                ContentChunk::new(names::FILES, content, file_relevance(bytes))
                    .with_metadata(names::META_PATH, candidate)
                    .with_metadata("bytes", bytes.to_string()),
            );
        }

        Ok(chunks)
    }
}

/// Relevance for an explicitly named file of `bytes` size.
pub fn file_relevance(bytes: u64) -> f32 {
    if bytes <= SMALL_FILE_BYTES {
        (EXPLICIT_MENTION_RELEVANCE + SMALL_FILE_BONUS).min(1.0)
    } else if bytes > LARGE_FILE_BYTES {
        EXPLICIT_MENTION_RELEVANCE * 0.5
    } else {
        EXPLICIT_MENTION_RELEVANCE
    }
}

/// Pull path-like tokens out of free text, in order of appearance.
///
/// A token counts when it contains a `/` or ends in a file extension.
/// Surrounding quotes, backticks, brackets and trailing punctuation are
/// stripped; URLs are ignored.
pub fn extract_path_candidates(query: &str, limit: usize) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();

    for raw in query.split_whitespace() {
        if out.len() >= limit {
            break;
        }
        let token = raw
            .trim_start_matches(is_wrapper)
            .trim_end_matches(|c: char| is_wrapper(c) || c == '.');

        if token.is_empty() || token.contains("://") || !looks_like_path(token) {
            continue;
        }
        if !out.iter().any(|existing| existing == token) {
            out.push(token.to_string());
        }
    }

    out
}

fn is_wrapper(c: char) -> bool {
    matches!(
        c,
        '"' | '\'' | '`' | '(' | ')' | '[' | ']' | '{' | '}' | '<' | '>' | ',' | ';' | ':' | '!' | '?'
    )
}

fn looks_like_path(token: &str) -> bool {
    if token.contains('/') || token.contains('\\') {
        return token.chars().any(char::is_alphanumeric);
    }
    match token.rsplit_once('.') {
        Some((stem, ext)) => {
            !stem.is_empty()
                && !ext.is_empty()
                && ext.len() <= 8
                && ext.chars().all(|c| c.is_ascii_alphanumeric())
                && ext.chars().any(|c| c.is_ascii_alphabetic())
        }
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn workspace() -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("src")).unwrap();
        let mut f = std::fs::File::create(dir.path().join("src/main.rs")).unwrap();
        writeln!(f, "fn main() {{ println!(\"hi\"); }}").unwrap();
        std::fs::write(dir.path().join("README.md"), "# Demo").unwrap();
        dir
    }

    #[test]
    fn extracts_paths_and_filenames() {
        let got = extract_path_candidates(
            "Why does `src/main.rs` panic? See README.md, and (docs/guide.md).",
            10,
        );
        assert_eq!(got, vec!["src/main.rs", "README.md", "docs/guide.md"]);
    }

    #[test]
    fn ignores_prose_numbers_and_urls() {
        let got = extract_path_candidates(
            "version 3.14 is at https://example.com/x.html and that's it.",
            10,
        );
        assert!(got.is_empty());
    }

    #[test]
    fn candidates_are_deduplicated_and_capped() {
        let got = extract_path_candidates("a.rs a.rs b.rs c.rs d.rs", 2);
        assert_eq!(got, vec!["a.rs", "b.rs"]);
    }

    #[test]
    fn small_files_rank_above_large_files() {
        let small = file_relevance(100);
        let medium = file_relevance(16 * 1024);
        let large = file_relevance(128 * 1024);
        assert!(small > medium);
        assert!(medium > large);
        assert!(small <= 1.0);
        assert!(large > 0.0);
    }

    #[tokio::test]
    async fn reads_named_file_with_path_metadata() {
        let dir = workspace();
        let source = FileContentSource::new(dir.path());
        assert!(source.is_available().await);

        let chunks = source
            .gather("what does src/main.rs print?", &GatherOptions::default())
            .await
            .unwrap();
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].source_name, names::FILES);
        assert_eq!(chunks[0].path(), Some("src/main.rs"));
        assert!(chunks[0].content.contains("println!"));
        assert_eq!(chunks[0].relevance, file_relevance(chunks[0].content.len() as u64));
    }

    #[tokio::test]
    async fn query_without_paths_returns_nothing() {
        let dir = workspace();
        let source = FileContentSource::new(dir.path());
        let chunks = source
            .gather("how does startup work", &GatherOptions::default())
            .await
            .unwrap();
        assert!(chunks.is_empty());
    }

    #[tokio::test]
    async fn file_content_can_be_switched_off() {
        let dir = workspace();
        let source = FileContentSource::new(dir.path());
        let chunks = source
            .gather("src/main.rs", &GatherOptions::new().with_file_content(false))
            .await
            .unwrap();
        assert!(chunks.is_empty());
    }

    #[tokio::test]
    async fn oversized_files_are_skipped() {
        let dir = workspace();
        std::fs::write(dir.path().join("big.log"), "x".repeat(2048)).unwrap();
        let source = FileContentSource::new(dir.path()).with_max_file_bytes(1024);
        let chunks = source
            .gather("big.log README.md", &GatherOptions::default())
            .await
            .unwrap();
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].path(), Some("README.md"));
    }

    #[tokio::test]
    async fn file_limit_counts_only_files_read() {
        let dir = workspace();
        std::fs::write(dir.path().join("lib.rs"), "pub mod x;").unwrap();
        let source = FileContentSource::new(dir.path()).with_max_files(2);

        // "e.g" and "i.e" look like paths but resolve to nothing.
        let chunks = source
            .gather("e.g. i.e. lib.rs", &GatherOptions::default())
            .await
            .unwrap();
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].path(), Some("lib.rs"));
    }

    #[tokio::test]
    async fn file_limit_caps_files_read() {
        let dir = workspace();
        std::fs::write(dir.path().join("lib.rs"), "pub mod x;").unwrap();
        let source = FileContentSource::new(dir.path()).with_max_files(2);

        let chunks = source
            .gather("src/main.rs README.md lib.rs", &GatherOptions::default())
            .await
            .unwrap();
        let paths: Vec<_> = chunks.iter().filter_map(|c| c.path()).collect();
        assert_eq!(paths, vec!["src/main.rs", "README.md"]);
    }

    #[tokio::test]
    async fn from_config_applies_limits() {
        let dir = workspace();
        let config = FilesConfig {
            root: Some(dir.path().to_path_buf()),
            max_file_bytes: 4,
            max_files: 8,
        };
        let source = FileContentSource::from_config(&config);
        let chunks = source
            .gather("src/main.rs README.md", &GatherOptions::default())
            .await
            .unwrap();
        // Both files exceed four bytes.
        assert!(chunks.is_empty());
    }

    #[tokio::test]
    async fn same_file_named_twice_is_read_once() {
        let dir = workspace();
        let source = FileContentSource::new(dir.path());
        let chunks = source
            .gather("src/main.rs vs ./src/main.rs", &GatherOptions::default())
            .await
            .unwrap();
        assert_eq!(chunks.len(), 1);
    }

    #[tokio::test]
    async fn traversal_and_missing_paths_are_skipped() {
        let dir = workspace();
        let source = FileContentSource::new(dir.path());
        let chunks = source
            .gather("../../etc/passwd missing.rs", &GatherOptions::default())
            .await
            .unwrap();
        assert!(chunks.is_empty());
    }

    #[tokio::test]
    async fn directories_and_binary_files_are_skipped() {
        let dir = workspace();
        std::fs::write(dir.path().join("logo.png"), [0xff_u8, 0xfe, 0x00, 0x9f]).unwrap();
        let source = FileContentSource::new(dir.path());
        let chunks = source
            .gather("src/ logo.png", &GatherOptions::default())
            .await
            .unwrap();
        assert!(chunks.is_empty());
    }

    #[tokio::test]
    async fn missing_root_is_unavailable() {
        let source = FileContentSource::new("/nonexistent/ctxmesh/workspace");
        assert!(!source.is_available().await);
    }
}
