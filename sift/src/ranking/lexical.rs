//! Term-overlap relevance, the lexical half of hybrid ranking.
//!
//! Scores are normalized to [0, 1]. Identifier-like tokens (ticket keys,
//! error codes, snake_case names) carry double weight so an exact keyword
//! match keeps a floor under documents the embedding space under-ranks.

use std::collections::HashSet;

use unicode_segmentation::UnicodeSegmentation;

/// Query words that carry no retrieval signal on their own.
const STOPWORDS: &[&str] = &[
    "a", "an", "and", "are", "as", "at", "be", "by", "did", "do", "does", "for", "from", "how",
    "in", "is", "it", "of", "on", "or", "that", "the", "this", "to", "was", "were", "what",
    "when", "where", "which", "who", "why", "with",
];

fn is_stopword(token: &str) -> bool {
    STOPWORDS.contains(&token)
}

/// A token that looks like an identifier rather than prose: ticket keys
/// (PROJ-123), error codes, snake_case or digit-bearing names.
pub fn is_identifier(token: &str) -> bool {
    token.chars().any(|c| c.is_ascii_digit())
        || token.contains('-')
        || token.contains('_')
}

/// Lowercased tokens of a text. Identifier-like whitespace tokens are kept
/// whole in addition to their word parts, so both "PROJ-123" and "proj"
/// match later.
pub fn tokenize(text: &str) -> Vec<String> {
    let mut tokens = Vec::new();
    for raw in text.split_whitespace() {
        let trimmed = raw.trim_matches(|c: char| !c.is_alphanumeric());
        if trimmed.is_empty() {
            continue;
        }
        let lower = trimmed.to_lowercase();
        if is_identifier(&lower) {
            tokens.push(lower.clone());
        }
        for word in lower.unicode_words() {
            if word != lower || !is_identifier(&lower) {
                tokens.push(word.to_string());
            }
        }
    }
    tokens
}

/// Distinct query tokens with stopwords removed. Falls back to the full
/// token set when the query is nothing but stopwords.
pub fn query_tokens(query: &str) -> Vec<String> {
    let all: Vec<String> = tokenize(query);
    let mut seen = HashSet::new();
    let filtered: Vec<String> = all
        .iter()
        .filter(|t| !is_stopword(t))
        .filter(|t| seen.insert((*t).clone()))
        .cloned()
        .collect();
    if filtered.is_empty() {
        let mut seen = HashSet::new();
        all.into_iter().filter(|t| seen.insert(t.clone())).collect()
    } else {
        filtered
    }
}

/// Weighted term-overlap score of `text` against pre-tokenized query terms.
/// Identifier tokens weigh 2, prose tokens 1; the result is
/// matched_weight / total_weight, in [0, 1].
pub fn score(query_terms: &[String], text: &str) -> f32 {
    if query_terms.is_empty() {
        return 0.0;
    }

    let text_tokens: HashSet<String> = tokenize(text).into_iter().collect();

    let mut total = 0.0f32;
    let mut matched = 0.0f32;
    for term in query_terms {
        let weight = if is_identifier(term) { 2.0 } else { 1.0 };
        total += weight;
        if text_tokens.contains(term) {
            matched += weight;
        }
    }

    if total == 0.0 {
        0.0
    } else {
        matched / total
    }
}
