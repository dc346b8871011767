//! Document Store: raw text plus derived metadata, keyed by caller-chosen id.

use crate::tokenizer::{char_len, word_count};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;

/// Metadata keys computed by the store. Caller-supplied values for these are dropped.
/// `added_at` given to metadata recomputed for a document that had none.
pub const UNKNOWN_ADDED_AT: &str = "Unknown";

pub const RESERVED_KEYS: &[&str] = &["added_at", "content_length", "word_count"];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocMeta {
    #[serde(default, alias = "added_date")]
    pub added_at: String,
    #[serde(default)]
    pub content_length: usize,
    #[serde(default)]
    pub word_count: usize,
    /// Caller-supplied fields, flattened next to the reserved ones.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl DocMeta {
    fn compute(content: &str, added_at: String, extra: Map<String, Value>) -> Self {
        Self { added_at, content_length: char_len(content), word_count: word_count(content), extra: strip_reserved(extra) }
    }
}

/// Drops the reserved keys (and the legacy `added_date`) from caller metadata.
pub fn strip_reserved(mut extra: Map<String, Value>) -> Map<String, Value> {
    for key in RESERVED_KEYS.iter().chain(std::iter::once(&"added_date")) {
        extra.remove(*key);
    }
    extra
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DocumentSummary {
    pub doc_id: String,
    pub added_at: String,
    pub content_length: usize,
    pub word_count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Overview {
    pub total_documents: usize,
    pub total_words: usize,
    pub total_characters: usize,
    /// Per-document stats, largest word count first.
    pub documents: Vec<DocumentSummary>,
    pub last_updated: Option<String>,
}

/// In-memory documents and metadata. Serializes to the `metadata.json` snapshot layout.
#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentStore {
    #[serde(default)]
    documents: BTreeMap<String, String>,
    #[serde(default)]
    metadata: BTreeMap<String, DocMeta>,
    #[serde(default)]
    last_updated: Option<String>,
}

pub(crate) fn now_rfc3339() -> String {
    OffsetDateTime::now_utc().format(&Rfc3339).unwrap_or_default()
}

impl DocumentStore {
    pub fn new() -> Self { Self::default() }

    /// Stores `content` verbatim, replacing any previous document with the same id.
    pub fn add(&mut self, doc_id: &str, content: &str, extra: Option<Map<String, Value>>) -> &DocMeta {
        let now = now_rfc3339();
        let meta = DocMeta::compute(content, now.clone(), extra.unwrap_or_default());
        self.documents.insert(doc_id.to_string(), content.to_string());
        self.metadata.insert(doc_id.to_string(), meta);
        self.last_updated = Some(now);
        &self.metadata[doc_id]
    }

    /// Returns whether a document was present. Absent ids are not an error and
    /// leave `last_updated` alone.
    pub fn remove(&mut self, doc_id: &str) -> bool {
        let had_doc = self.documents.remove(doc_id).is_some();
        let had_meta = self.metadata.remove(doc_id).is_some();
        let removed = had_doc || had_meta;
        if removed {
            self.last_updated = Some(now_rfc3339());
        }
        removed
    }

    pub fn clear(&mut self) {
        self.documents.clear();
        self.metadata.clear();
        self.last_updated = Some(now_rfc3339());
    }

    pub fn get(&self, doc_id: &str) -> Option<&str> {
        self.documents.get(doc_id).map(String::as_str)
    }

    pub fn meta(&self, doc_id: &str) -> Option<&DocMeta> {
        self.metadata.get(doc_id)
    }

    pub fn contains(&self, doc_id: &str) -> bool {
        self.documents.contains_key(doc_id)
    }

    pub fn len(&self) -> usize { self.documents.len() }

    pub fn is_empty(&self) -> bool { self.documents.is_empty() }

    /// `(doc_id, content)` pairs in storage order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.documents.iter().map(|(id, c)| (id.as_str(), c.as_str()))
    }

    pub fn list(&self) -> Vec<DocumentSummary> {
        self.metadata
            .iter()
            .map(|(doc_id, m)| DocumentSummary {
                doc_id: doc_id.clone(),
                added_at: m.added_at.clone(),
                content_length: m.content_length,
                word_count: m.word_count,
            })
            .collect()
    }

    pub fn overview(&self) -> Overview {
        let mut documents = self.list();
        // stable: equal word counts keep storage order
        documents.sort_by(|a, b| b.word_count.cmp(&a.word_count));
        Overview {
            total_documents: self.documents.len(),
            total_words: documents.iter().map(|d| d.word_count).sum(),
            total_characters: documents.iter().map(|d| d.content_length).sum(),
            documents,
            last_updated: self.last_updated.clone(),
        }
    }

    /// Brings a freshly loaded snapshot back to one metadata entry per document.
    /// Returns how many entries were dropped or recomputed.
    pub(crate) fn repair(&mut self) -> usize {
        let before = self.metadata.len();
        let documents = &self.documents;
        self.metadata.retain(|id, _| documents.contains_key(id));
        let mut fixed = before - self.metadata.len();
        for (id, content) in &self.documents {
            if !self.metadata.contains_key(id) {
                self.metadata.insert(id.clone(), DocMeta::compute(content, UNKNOWN_ADDED_AT.to_string(), Map::new()));
                fixed += 1;
            }
        }
        fixed
    }
}
