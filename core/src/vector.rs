//! Sparse Vector Index: per-document term-frequency vectors and cosine search.
//!
//! Each vector is laid out over its own document's sorted vocabulary, so two
//! vectors only line up position by position. Similarity pads the shorter
//! vector with zeros to the longer one's length, which keeps vectors written
//! by earlier versions of the snapshot comparable.

use crate::config::MIN_SIMILARITY;
use crate::tokenizer::{char_len, term_frequencies, word_count};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

pub type TermVector = Vec<f64>;

/// Vector-side copy of the document statistics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VectorMeta {
    #[serde(default)]
    pub content_length: usize,
    #[serde(default)]
    pub word_count: usize,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VectorHit {
    pub doc_id: String,
    pub similarity: f64,
}

/// L2-normalized term counts in sorted term order. Empty when no term survives.
pub fn text_to_vector(text: &str) -> TermVector {
    let counts: Vec<f64> = term_frequencies(text).into_values().map(f64::from).collect();
    let norm = counts.iter().map(|c| c * c).sum::<f64>().sqrt();
    if norm == 0.0 {
        return counts;
    }
    counts.into_iter().map(|c| c / norm).collect()
}

/// Cosine similarity with zero padding up to the longer vector's length.
pub fn cosine_similarity(a: &[f64], b: &[f64]) -> f64 {
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }
    // positions past the shorter vector multiply against padding zeros
    let dot: f64 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a = a.iter().map(|x| x * x).sum::<f64>().sqrt();
    let norm_b = b.iter().map(|x| x * x).sum::<f64>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a * norm_b)
}

/// Serializes to the `vectors.json` snapshot layout.
#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
pub struct SparseVectorIndex {
    #[serde(default)]
    vectors: BTreeMap<String, TermVector>,
    #[serde(default)]
    metadata: BTreeMap<String, VectorMeta>,
}

impl SparseVectorIndex {
    pub fn new() -> Self { Self::default() }

    /// Recomputes the vector for `doc_id` from scratch, replacing any previous one.
    pub fn index(&mut self, doc_id: &str, content: &str, extra: &Map<String, Value>) {
        self.vectors.insert(doc_id.to_string(), text_to_vector(content));
        self.metadata.insert(
            doc_id.to_string(),
            VectorMeta { content_length: char_len(content), word_count: word_count(content), extra: extra.clone() },
        );
    }

    pub fn remove(&mut self, doc_id: &str) -> bool {
        let had = self.vectors.remove(doc_id).is_some();
        self.metadata.remove(doc_id);
        had
    }

    pub fn clear(&mut self) {
        self.vectors.clear();
        self.metadata.clear();
    }

    pub fn len(&self) -> usize { self.vectors.len() }

    pub fn is_empty(&self) -> bool { self.vectors.is_empty() }

    pub fn contains(&self, doc_id: &str) -> bool { self.vectors.contains_key(doc_id) }

    pub fn vector(&self, doc_id: &str) -> Option<&[f64]> {
        self.vectors.get(doc_id).map(Vec::as_slice)
    }

    pub fn meta(&self, doc_id: &str) -> Option<&VectorMeta> {
        self.metadata.get(doc_id)
    }

    pub fn doc_ids(&self) -> impl Iterator<Item = &str> {
        self.vectors.keys().map(String::as_str)
    }

    /// Documents with similarity above [`MIN_SIMILARITY`], best first, at most `top_k`.
    /// Equal similarities keep index order.
    pub fn search(&self, query: &str, top_k: usize) -> Vec<VectorHit> {
        let q = text_to_vector(query);
        if q.is_empty() || top_k == 0 {
            return Vec::new();
        }
        let mut hits: Vec<VectorHit> = self
            .vectors
            .iter()
            .map(|(doc_id, v)| VectorHit { doc_id: doc_id.clone(), similarity: cosine_similarity(&q, v) })
            .filter(|h| h.similarity > MIN_SIMILARITY)
            .collect();
        hits.sort_by(|a, b| b.similarity.partial_cmp(&a.similarity).unwrap_or(std::cmp::Ordering::Equal));
        hits.truncate(top_k);
        hits
    }

    /// Drops entries whose id fails `keep`. Returns how many were dropped.
    pub(crate) fn retain<F: Fn(&str) -> bool>(&mut self, keep: F) -> usize {
        let before = self.vectors.len();
        self.vectors.retain(|id, _| keep(id));
        self.metadata.retain(|id, _| keep(id));
        before - self.vectors.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn norm(v: &[f64]) -> f64 {
        v.iter().map(|x| x * x).sum::<f64>().sqrt()
    }

    #[test]
    fn vectors_are_unit_length() {
        let v = text_to_vector("graph graph theory of sparse graph matrices");
        assert_eq!(v.len(), 4);
        assert!((norm(&v) - 1.0).abs() < 1e-9);
    }

    #[test]
    fn short_tokens_give_empty_vector() {
        assert!(text_to_vector("a an of to").is_empty());
        assert_eq!(cosine_similarity(&[], &[1.0]), 0.0);
    }

    #[test]
    fn padding_compares_by_position() {
        // [1, 0] against [1] padded to [1, 0]
        assert!((cosine_similarity(&[1.0, 0.0], &[1.0]) - 1.0).abs() < 1e-12);
        let s = cosine_similarity(&[0.6, 0.8], &[1.0]);
        assert!((s - 0.6).abs() < 1e-12);
    }

    #[test]
    fn search_finds_self_and_applies_threshold() {
        let mut idx = SparseVectorIndex::new();
        let empty = Map::new();
        idx.index("p1", "sparse retrieval with cosine similarity", &empty);
        idx.index("p2", "xx yy", &empty);
        let hits = idx.search("sparse retrieval with cosine similarity", 5);
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].doc_id, "p1");
        assert!((hits[0].similarity - 1.0).abs() < 1e-9);
        assert!(idx.search("", 5).is_empty());
        assert!(idx.search("sparse", 0).is_empty());
    }

    #[test]
    fn reindex_replaces() {
        let mut idx = SparseVectorIndex::new();
        let empty = Map::new();
        idx.index("p", "one two three", &empty);
        idx.index("p", "alpha beta gamma delta", &empty);
        assert_eq!(idx.len(), 1);
        assert_eq!(idx.vector("p").unwrap().len(), 4);
        assert_eq!(idx.meta("p").unwrap().word_count, 4);
    }
}
