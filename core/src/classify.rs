//! Content classification used to pick a prompt strategy.

use lazy_static::lazy_static;
use regex::RegexSet;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Field tags and keywords that mark bibliographic (RIS-style) metadata.
pub const CITATION_MARKERS: &[&str] = &[
    "au -", "py -", "t1 -", "do -", "jo -",
    "author:", "title:", "journal:", "citation file", "bibliographic",
];

/// Words an extractor leaves behind when it could only recover part of a document.
pub const DEGRADED_MARKERS: &[&str] = &["corrupted", "partial"];

lazy_static! {
    static ref CITATION: RegexSet = case_insensitive_set(CITATION_MARKERS);
    static ref DEGRADED: RegexSet = case_insensitive_set(DEGRADED_MARKERS);
}

fn case_insensitive_set(markers: &[&str]) -> RegexSet {
    RegexSet::new(markers.iter().map(|m| format!("(?i){}", regex::escape(m)))).expect("valid marker patterns")
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContextTag {
    CitationMetadata,
    DegradedExtraction,
    Normal,
}

impl ContextTag {
    pub fn as_str(&self) -> &'static str {
        match self {
            ContextTag::CitationMetadata => "citation_metadata",
            ContextTag::DegradedExtraction => "degraded_extraction",
            ContextTag::Normal => "normal",
        }
    }
}

impl fmt::Display for ContextTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Citation markers take precedence over degraded-extraction markers.
pub fn classify(text: &str) -> ContextTag {
    if CITATION.is_match(text) {
        ContextTag::CitationMetadata
    } else if DEGRADED.is_match(text) {
        ContextTag::DegradedExtraction
    } else {
        ContextTag::Normal
    }
}
