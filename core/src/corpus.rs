//! Retrieval orchestration over the Document Store and the Sparse Vector Index.
//!
//! A [`Corpus`] owns both structures behind one read-write lock. Mutations hold
//! the write lock across the in-memory update and both snapshot writes, so a
//! reader never sees a document in one structure but not the other. Snapshot
//! failures never undo an in-memory change; they come back as
//! [`Durability::Degraded`].

use crate::classify::{classify, ContextTag};
use crate::config::{RagConfig, EXCERPT_CHARS};
use crate::error::{RagError, Result};
use crate::keyword::{self, excerpt};
use crate::persist::{load_documents, load_vectors, quarantine, save_documents, save_vectors, SnapshotPaths};
use crate::store::{DocMeta, DocumentStore, DocumentSummary, Overview};
use crate::tokenizer::char_len;
use crate::vector::SparseVectorIndex;
use parking_lot::RwLock;
use serde::Serialize;
use serde_json::{Map, Value};
use std::cmp::Ordering;
use std::collections::HashMap;
use std::fmt;
use std::path::Path;
use std::str::FromStr;

/// Separator placed between excerpts in an assembled context.
pub const EXCERPT_SEPARATOR: &str = "\n\n";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Strategy {
    Keyword,
    Vector,
    #[default]
    Hybrid,
}

/// Which signal orders merged results; the other one breaks ties.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RankBy {
    #[default]
    VectorFirst,
    KeywordFirst,
}

impl FromStr for Strategy {
    type Err = String;
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "keyword" => Ok(Strategy::Keyword),
            "vector" => Ok(Strategy::Vector),
            "hybrid" => Ok(Strategy::Hybrid),
            other => Err(format!("unknown strategy '{other}' (expected keyword, vector or hybrid)")),
        }
    }
}

impl FromStr for RankBy {
    type Err = String;
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "vector" | "vector_first" => Ok(RankBy::VectorFirst),
            "keyword" | "keyword_first" => Ok(RankBy::KeywordFirst),
            other => Err(format!("unknown ranking '{other}' (expected vector or keyword)")),
        }
    }
}

#[derive(Debug, Clone)]
pub struct QueryRequest<'a> {
    pub text: &'a str,
    pub top_k: usize,
    pub strategy: Strategy,
    pub rank_by: RankBy,
}

impl<'a> QueryRequest<'a> {
    pub fn new(text: &'a str, top_k: usize) -> Self {
        Self { text, top_k, strategy: Strategy::default(), rank_by: RankBy::default() }
    }

    pub fn strategy(mut self, strategy: Strategy) -> Self {
        self.strategy = strategy;
        self
    }

    pub fn rank_by(mut self, rank_by: RankBy) -> Self {
        self.rank_by = rank_by;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RetrievalResult {
    pub doc_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub similarity: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub keyword_score: Option<u64>,
    pub excerpt: String,
    pub metadata: DocMeta,
}

/// Bounded context handed to the generation collaborator.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AssembledContext {
    pub text: String,
    pub tag: ContextTag,
    /// Documents that contributed at least part of an excerpt, in order.
    pub sources: Vec<String>,
    /// True when an excerpt was cut or left out to respect the budget.
    pub truncated: bool,
}

/// Outcome of a mutation once the in-memory change has been applied.
#[derive(Debug)]
#[must_use = "a degraded write leaves the on-disk snapshot stale"]
pub enum Durability {
    Persisted,
    /// The corpus changed in memory but at least one snapshot file was not written.
    Degraded(Vec<RagError>),
}

impl Durability {
    pub fn is_persisted(&self) -> bool {
        matches!(self, Durability::Persisted)
    }

    pub fn errors(&self) -> &[RagError] {
        match self {
            Durability::Persisted => &[],
            Durability::Degraded(errors) => errors,
        }
    }
}

impl fmt::Display for Durability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Durability::Persisted => f.write_str("persisted"),
            Durability::Degraded(errors) => {
                f.write_str("degraded durability: ")?;
                for (i, e) in errors.iter().enumerate() {
                    if i > 0 {
                        f.write_str("; ")?;
                    }
                    write!(f, "{e}")?;
                }
                Ok(())
            }
        }
    }
}

#[derive(Default)]
struct CorpusState {
    store: DocumentStore,
    index: SparseVectorIndex,
}

pub struct Corpus {
    config: RagConfig,
    paths: SnapshotPaths,
    state: RwLock<CorpusState>,
}

/// Loads one snapshot. A file that fails to parse is moved aside so no later
/// rewrite can replace it; the second value is true when loading failed.
fn load_or_empty<T: Default>(what: &str, path: &Path, loaded: Result<Option<T>>) -> (T, bool) {
    match loaded {
        Ok(Some(value)) => (value, false),
        Ok(None) => (T::default(), false),
        Err(e) => {
            tracing::warn!(error = %e, "could not load {what} snapshot, starting empty");
            if matches!(e, RagError::Snapshot { .. }) {
                match quarantine(path) {
                    Ok(moved) => tracing::warn!(from = %path.display(), to = %moved.display(), "unreadable snapshot moved aside"),
                    Err(qe) => tracing::warn!(error = %qe, "could not move unreadable snapshot aside"),
                }
            }
            (T::default(), true)
        }
    }
}

fn vector_is_stale(index: &SparseVectorIndex, doc_id: &str, meta: Option<&DocMeta>) -> bool {
    match (index.meta(doc_id), meta) {
        (Some(v), Some(m)) => v.content_length != m.content_length || v.word_count != m.word_count || v.extra != m.extra,
        (None, _) => true,
        (Some(_), None) => false,
    }
}

impl Corpus {
    /// Loads both snapshots from `config.storage_dir`. Missing files give an empty
    /// corpus; unreadable ones are logged and treated as empty, and unparsable ones
    /// are renamed to `*.corrupt`. Vectors are then reconciled against the
    /// documents, which are the source of truth. The reconciled state is only
    /// written back when both snapshots loaded cleanly.
    pub fn open(config: RagConfig) -> Self {
        let paths = SnapshotPaths::new(&config.storage_dir);
        let (mut store, docs_failed): (DocumentStore, bool) =
            load_or_empty("documents", &paths.documents(), load_documents(&paths));
        let (mut index, vectors_failed): (SparseVectorIndex, bool) =
            load_or_empty("vectors", &paths.vectors(), load_vectors(&paths));

        let repaired = store.repair();
        let dropped = index.retain(|id| store.contains(id));
        let mut rebuilt = 0usize;
        let empty = Map::new();
        for (doc_id, content) in store.iter() {
            let meta = store.meta(doc_id);
            if vector_is_stale(&index, doc_id, meta) {
                index.index(doc_id, content, meta.map(|m| &m.extra).unwrap_or(&empty));
                rebuilt += 1;
            }
        }
        tracing::info!(
            dir = %paths.root.display(),
            documents = store.len(),
            vectors = index.len(),
            "corpus loaded"
        );

        let corpus = Self { config, paths, state: RwLock::new(CorpusState { store, index }) };
        if docs_failed || vectors_failed {
            tracing::warn!(docs_failed, vectors_failed, "snapshot load failed, leaving files on disk untouched until the next write");
        } else if repaired + dropped + rebuilt > 0 {
            tracing::warn!(repaired, dropped, rebuilt, "snapshots were out of sync, reconciled from documents");
            let state = corpus.state.read();
            if let Durability::Degraded(errors) = corpus.persist(&state) {
                tracing::warn!(failures = errors.len(), "reconciled corpus not written back");
            }
        }
        corpus
    }

    pub fn config(&self) -> &RagConfig {
        &self.config
    }

    pub fn paths(&self) -> &SnapshotPaths {
        &self.paths
    }

    /// Rewrites both snapshot files. Both are attempted even if the first fails.
    fn persist(&self, state: &CorpusState) -> Durability {
        let mut errors = Vec::new();
        if let Err(e) = save_documents(&self.paths, &state.store) {
            tracing::warn!(error = %e, "failed to save documents snapshot");
            errors.push(e);
        }
        if let Err(e) = save_vectors(&self.paths, &state.index) {
            tracing::warn!(error = %e, "failed to save vectors snapshot");
            errors.push(e);
        }
        if errors.is_empty() {
            Durability::Persisted
        } else {
            Durability::Degraded(errors)
        }
    }

    /// Adds or replaces a document in the store and the vector index as one unit.
    pub fn ingest(&self, doc_id: &str, content: &str, metadata: Option<Map<String, Value>>) -> Result<Durability> {
        if doc_id.trim().is_empty() {
            return Err(RagError::InvalidInput("doc_id must not be empty".into()));
        }
        let mut guard = self.state.write();
        let state = &mut *guard;
        let meta = state.store.add(doc_id, content, metadata);
        let (words, chars) = (meta.word_count, meta.content_length);
        state.index.index(doc_id, content, &meta.extra);
        tracing::info!(doc_id, words, chars, "document ingested");
        Ok(self.persist(state))
    }

    /// Absent ids are a no-op, still followed by a snapshot rewrite.
    pub fn remove(&self, doc_id: &str) -> Durability {
        let mut guard = self.state.write();
        let state = &mut *guard;
        let removed = state.store.remove(doc_id);
        state.index.remove(doc_id);
        if removed {
            tracing::info!(doc_id, "document removed");
        } else {
            tracing::debug!(doc_id, "remove of unknown document ignored");
        }
        self.persist(state)
    }

    pub fn clear(&self) -> Durability {
        let mut guard = self.state.write();
        let state = &mut *guard;
        let count = state.store.len();
        state.store.clear();
        state.index.clear();
        tracing::info!(count, "corpus cleared");
        self.persist(state)
    }

    pub fn get(&self, doc_id: &str) -> Result<String> {
        self.state
            .read()
            .store
            .get(doc_id)
            .map(str::to_string)
            .ok_or_else(|| RagError::NotFound { doc_id: doc_id.to_string() })
    }

    pub fn meta(&self, doc_id: &str) -> Option<DocMeta> {
        self.state.read().store.meta(doc_id).cloned()
    }

    pub fn list(&self) -> Vec<DocumentSummary> {
        self.state.read().store.list()
    }

    pub fn overview(&self) -> Overview {
        self.state.read().store.overview()
    }

    pub fn len(&self) -> usize {
        self.state.read().store.len()
    }

    pub fn is_empty(&self) -> bool {
        self.state.read().store.is_empty()
    }

    pub fn query(&self, request: &QueryRequest<'_>) -> Vec<RetrievalResult> {
        run_query(&self.state.read(), request)
    }

    pub fn assemble_context(&self, results: &[RetrievalResult], max_chars: usize) -> AssembledContext {
        assemble_context(results, max_chars)
    }

    /// Hybrid query plus context assembly under a single read lock.
    pub fn retrieve_context(&self, query: &str, top_k: usize, max_chars: usize) -> AssembledContext {
        let state = self.state.read();
        let results = run_query(&state, &QueryRequest::new(query, top_k));
        assemble_context(&results, max_chars)
    }
}

fn run_query(state: &CorpusState, request: &QueryRequest<'_>) -> Vec<RetrievalResult> {
    if request.top_k == 0 {
        return Vec::new();
    }
    let similarities: HashMap<String, f64> = match request.strategy {
        Strategy::Vector | Strategy::Hybrid => state
            .index
            .search(request.text, usize::MAX)
            .into_iter()
            .map(|h| (h.doc_id, h.similarity))
            .collect(),
        Strategy::Keyword => HashMap::new(),
    };
    let keyword_scores: HashMap<String, u64> = match request.strategy {
        Strategy::Keyword | Strategy::Hybrid => keyword::score(request.text, state.store.iter())
            .into_iter()
            .map(|h| (h.doc_id, h.score))
            .collect(),
        Strategy::Vector => HashMap::new(),
    };

    // corpus order first, so the stable sort below breaks full ties deterministically
    let mut results: Vec<RetrievalResult> = state
        .store
        .iter()
        .filter_map(|(doc_id, content)| {
            let similarity = similarities.get(doc_id).copied();
            let keyword_score = keyword_scores.get(doc_id).copied();
            if similarity.is_none() && keyword_score.is_none() {
                return None;
            }
            Some(RetrievalResult {
                doc_id: doc_id.to_string(),
                similarity,
                keyword_score,
                excerpt: excerpt(content, EXCERPT_CHARS),
                metadata: state.store.meta(doc_id).cloned()?,
            })
        })
        .collect();

    let by_vector = |a: &RetrievalResult, b: &RetrievalResult| {
        b.similarity.unwrap_or(0.0).partial_cmp(&a.similarity.unwrap_or(0.0)).unwrap_or(Ordering::Equal)
    };
    let by_keyword = |a: &RetrievalResult, b: &RetrievalResult| b.keyword_score.unwrap_or(0).cmp(&a.keyword_score.unwrap_or(0));
    match request.rank_by {
        RankBy::VectorFirst => results.sort_by(|a, b| by_vector(a, b).then_with(|| by_keyword(a, b))),
        RankBy::KeywordFirst => results.sort_by(|a, b| by_keyword(a, b).then_with(|| by_vector(a, b))),
    }
    results.truncate(request.top_k);
    tracing::debug!(
        query = request.text,
        strategy = ?request.strategy,
        vector_hits = similarities.len(),
        keyword_hits = keyword_scores.len(),
        returned = results.len(),
        "query ranked"
    );
    results
}

/// Longest prefix of `text` within `budget` characters that ends on a whitespace
/// boundary. Falls back to a hard cut when the prefix holds no whitespace.
fn cut_at_boundary(text: &str, budget: usize) -> &str {
    let Some((end, next)) = text.char_indices().nth(budget) else {
        return text;
    };
    let prefix = &text[..end];
    if next.is_whitespace() {
        return prefix.trim_end();
    }
    match prefix.rfind(char::is_whitespace) {
        Some(ws) if !prefix[..ws].trim().is_empty() => prefix[..ws].trim_end(),
        _ => prefix,
    }
}

/// Joins ranked excerpts until `max_chars` characters are used, then classifies the result.
pub fn assemble_context(results: &[RetrievalResult], max_chars: usize) -> AssembledContext {
    let sep_len = char_len(EXCERPT_SEPARATOR);
    let mut text = String::new();
    let mut used = 0usize;
    let mut sources = Vec::new();
    let mut truncated = false;

    for result in results {
        if result.excerpt.trim().is_empty() {
            continue;
        }
        let sep = if text.is_empty() { 0 } else { sep_len };
        let len = char_len(&result.excerpt);
        if used + sep + len <= max_chars {
            if sep > 0 {
                text.push_str(EXCERPT_SEPARATOR);
            }
            text.push_str(&result.excerpt);
            used += sep + len;
            sources.push(result.doc_id.clone());
            continue;
        }
        truncated = true;
        let piece = cut_at_boundary(&result.excerpt, max_chars.saturating_sub(used + sep));
        if !piece.trim().is_empty() {
            if sep > 0 {
                text.push_str(EXCERPT_SEPARATOR);
            }
            text.push_str(piece);
            sources.push(result.doc_id.clone());
        }
        break;
    }

    let tag = classify(&text);
    AssembledContext { text, tag, sources, truncated }
}
