//! Tuning constants and runtime configuration.
//!
//! Retrieval constants are fixed; the storage location and the query defaults
//! come from [`RagConfig`], which callers build directly or from the environment.

use std::path::PathBuf;

/// Vocabulary terms must be longer than this many characters.
pub const MIN_TERM_CHARS: usize = 2;

/// Keyword query tokens must be longer than this many characters.
pub const MIN_KEYWORD_CHARS: usize = 3;

/// Vector hits at or below this cosine similarity are dropped.
pub const MIN_SIMILARITY: f64 = 0.1;

/// Length of the content prefix returned as a result excerpt.
pub const EXCERPT_CHARS: usize = 500;

/// Marker appended to truncated excerpts.
pub const TRUNCATION_MARKER: &str = "...";

/// Number of results returned when the caller does not ask for a specific count.
pub const DEFAULT_TOP_K: usize = 3;

/// Character budget of an assembled context window.
pub const DEFAULT_MAX_CONTEXT_CHARS: usize = 3500;

/// Default directory holding both snapshot files.
pub const DEFAULT_DATA_DIR: &str = "./data/vector_store";

/// Document Store snapshot file name.
pub const DOCUMENTS_FILE: &str = "metadata.json";

/// Sparse Vector Index snapshot file name.
pub const VECTORS_FILE: &str = "vectors.json";

pub const ENV_DATA_DIR: &str = "PAPERDEX_DATA_DIR";
pub const ENV_TOP_K: &str = "PAPERDEX_TOP_K";
pub const ENV_MAX_CONTEXT_CHARS: &str = "PAPERDEX_MAX_CONTEXT_CHARS";

#[derive(Debug, Clone, PartialEq)]
pub struct RagConfig {
    /// Directory holding `metadata.json` and `vectors.json`.
    pub storage_dir: PathBuf,
    pub top_k: usize,
    pub max_context_chars: usize,
}

impl Default for RagConfig {
    fn default() -> Self {
        Self {
            storage_dir: PathBuf::from(DEFAULT_DATA_DIR),
            top_k: DEFAULT_TOP_K,
            max_context_chars: DEFAULT_MAX_CONTEXT_CHARS,
        }
    }
}

impl RagConfig {
    pub fn new<P: Into<PathBuf>>(storage_dir: P) -> Self {
        Self { storage_dir: storage_dir.into(), ..Self::default() }
    }

    /// Defaults overridden by `PAPERDEX_*` environment variables. Unparsable
    /// numbers are ignored with a warning.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup<F: Fn(&str) -> Option<String>>(lookup: F) -> Self {
        let mut cfg = Self::default();
        if let Some(dir) = lookup(ENV_DATA_DIR).filter(|d| !d.trim().is_empty()) {
            cfg.storage_dir = PathBuf::from(dir);
        }
        if let Some(k) = parse_usize(ENV_TOP_K, lookup(ENV_TOP_K)) {
            cfg.top_k = k;
        }
        if let Some(n) = parse_usize(ENV_MAX_CONTEXT_CHARS, lookup(ENV_MAX_CONTEXT_CHARS)) {
            cfg.max_context_chars = n;
        }
        cfg
    }
}

fn parse_usize(key: &str, raw: Option<String>) -> Option<usize> {
    let raw = raw?;
    match raw.trim().parse() {
        Ok(n) => Some(n),
        Err(_) => {
            tracing::warn!(key, value = %raw, "ignoring unparsable configuration value");
            None
        }
    }
}
