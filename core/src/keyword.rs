//! Keyword Scorer: term-overlap relevance over raw document text.
//!
//! Needs no index. Each query token longer than three characters contributes
//! `occurrences × token length`, so long and frequently repeated terms dominate.

use crate::config::{EXCERPT_CHARS, TRUNCATION_MARKER};
use crate::tokenizer::keyword_tokens;
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct KeywordHit {
    pub doc_id: String,
    pub score: u64,
    pub excerpt: String,
}

/// First `max_chars` characters of `content`, with `...` appended when cut.
pub fn excerpt(content: &str, max_chars: usize) -> String {
    match content.char_indices().nth(max_chars) {
        Some((byte_idx, _)) => format!("{}{}", &content[..byte_idx], TRUNCATION_MARKER),
        None => content.to_string(),
    }
}

/// Score of one lowercased document against already-filtered query tokens.
/// Occurrences are non-overlapping substring matches.
pub fn score_document(tokens: &[String], content_lower: &str) -> u64 {
    tokens
        .iter()
        .map(|t| (content_lower.matches(t.as_str()).count() * t.chars().count()) as u64)
        .sum()
}

/// Scores every `(doc_id, content)` pair. Zero-score documents are left out;
/// the rest are sorted by score, ties keeping corpus order.
pub fn score<'a, I>(query: &str, corpus: I) -> Vec<KeywordHit>
where
    I: IntoIterator<Item = (&'a str, &'a str)>,
{
    let tokens = keyword_tokens(query);
    if tokens.is_empty() {
        return Vec::new();
    }
    let mut hits: Vec<KeywordHit> = corpus
        .into_iter()
        .filter_map(|(doc_id, content)| {
            let score = score_document(&tokens, &content.to_lowercase());
            (score > 0).then(|| KeywordHit { doc_id: doc_id.to_string(), score, excerpt: excerpt(content, EXCERPT_CHARS) })
        })
        .collect();
    hits.sort_by(|a, b| b.score.cmp(&a.score));
    hits
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_query_tokens_score_nothing() {
        let corpus = [("d", "the cat sat on the mat the end")];
        assert!(score("the cat sat", corpus).is_empty());
    }

    #[test]
    fn counts_substrings_times_length() {
        let corpus = [("d", "Sorting sorts; SORTING is fun")];
        let hits = score("sort", corpus);
        // "sort" appears three times in the lowercased text
        assert_eq!(hits[0].score, 12);
        let hits = score("sorting sorting", corpus);
        assert_eq!(hits[0].score, 28);
    }

    #[test]
    fn ranks_by_score() {
        let corpus = [("a", "graphs"), ("b", "graphs graphs"), ("c", "nothing here")];
        let hits = score("graphs", corpus);
        let ids: Vec<&str> = hits.iter().map(|h| h.doc_id.as_str()).collect();
        assert_eq!(ids, vec!["b", "a"]);
    }

    #[test]
    fn excerpt_is_bounded() {
        let long = "é".repeat(600);
        let e = excerpt(&long, EXCERPT_CHARS);
        assert_eq!(e.chars().count(), EXCERPT_CHARS + TRUNCATION_MARKER.len());
        assert!(e.ends_with("..."));
        assert_eq!(excerpt("short", EXCERPT_CHARS), "short");
        assert_eq!(excerpt(&"x".repeat(500), EXCERPT_CHARS), "x".repeat(500));
    }
}
