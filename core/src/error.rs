use std::path::PathBuf;

pub type Result<T> = std::result::Result<T, RagError>;

/// Errors surfaced by the corpus. Search, scoring and classification never fail;
/// only identifier validation, lookups and snapshot I/O do.
#[derive(Debug, thiserror::Error)]
pub enum RagError {
    #[error("document not found: {doc_id}")]
    NotFound { doc_id: String },

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("snapshot I/O failed for {}: {source}", path.display())]
    Persistence {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("snapshot {} is not valid JSON: {source}", path.display())]
    Snapshot {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

impl RagError {
    /// True for the snapshot failure class (the in-memory corpus is still intact).
    pub fn is_persistence(&self) -> bool {
        matches!(self, RagError::Persistence { .. } | RagError::Snapshot { .. })
    }
}
