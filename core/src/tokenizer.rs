use crate::config::{MIN_KEYWORD_CHARS, MIN_TERM_CHARS};
use std::collections::BTreeMap;

/// Lowercase and split on whitespace, keeping tokens longer than `min_chars` characters.
fn tokens_longer_than(text: &str, min_chars: usize) -> Vec<String> {
    text.to_lowercase()
        .split_whitespace()
        .filter(|t| t.chars().count() > min_chars)
        .map(str::to_string)
        .collect()
}

/// Vocabulary terms of a text: lowercase whitespace tokens with more than two characters.
/// Punctuation stays attached to the token.
pub fn tokenize(text: &str) -> Vec<String> {
    tokens_longer_than(text, MIN_TERM_CHARS)
}

/// Query tokens that take part in keyword scoring (more than three characters).
pub fn keyword_tokens(query: &str) -> Vec<String> {
    tokens_longer_than(query, MIN_KEYWORD_CHARS)
}

/// Term frequencies keyed in sorted term order, which fixes the vector layout.
pub fn term_frequencies(text: &str) -> BTreeMap<String, u32> {
    let mut tf = BTreeMap::new();
    for term in tokenize(text) {
        *tf.entry(term).or_insert(0) += 1;
    }
    tf
}

pub fn word_count(text: &str) -> usize {
    text.split_whitespace().count()
}

pub fn char_len(text: &str) -> usize {
    text.chars().count()
}
