use std::cmp::Ordering;
use std::collections::HashMap;

use crate::config::SearchConfig;
use crate::models::{Candidate, RankedResult};

use super::lexical;

/// Fusion weights for hybrid ranking. Normalized to sum to 1 so scores stay
/// in [0, 1] regardless of how they were configured.
#[derive(Debug, Clone, Copy)]
pub struct RankWeights {
    pub semantic: f32,
    pub lexical: f32,
}

impl Default for RankWeights {
    fn default() -> Self {
        Self {
            semantic: 0.7,
            lexical: 0.3,
        }
    }
}

impl RankWeights {
    pub fn from_config(config: &SearchConfig) -> Self {
        Self::new(config.semantic_weight, config.lexical_weight)
    }

    pub fn new(semantic: f32, lexical: f32) -> Self {
        let sum = semantic + lexical;
        if !(sum > 0.0) || semantic < 0.0 || lexical < 0.0 {
            tracing::warn!(semantic, lexical, "Invalid rank weights, using defaults");
            return Self::default();
        }
        Self {
            semantic: semantic / sum,
            lexical: lexical / sum,
        }
    }
}

/// Merge semantic and lexical relevance into one deterministic ranking.
///
/// A pure function of (query, candidate set, weights): no hidden state, and
/// the comparator is total (score, then newer `updated_at`, then ascending
/// id), so repeated calls and permuted inputs produce the same order.
/// Candidates appearing via both retrieval paths are deduplicated by id
/// first, keeping the best semantic score either path produced.
pub fn rank(
    query: &str,
    candidates: Vec<Candidate>,
    weights: &RankWeights,
    top_k: usize,
) -> Vec<RankedResult> {
    let query_terms = lexical::query_tokens(query);

    let mut by_id: HashMap<String, Candidate> = HashMap::new();
    for candidate in candidates {
        match by_id.get_mut(&candidate.id) {
            Some(existing) => {
                if candidate.semantic_score > existing.semantic_score {
                    existing.semantic_score = candidate.semantic_score;
                }
            }
            None => {
                by_id.insert(candidate.id.clone(), candidate);
            }
        }
    }

    let mut ranked: Vec<RankedResult> = by_id
        .into_values()
        .map(|candidate| {
            let semantic_score = candidate.semantic_score.clamp(0.0, 1.0);
            let lexical_score = lexical::score(&query_terms, &candidate.text);
            let score = weights.semantic * semantic_score + weights.lexical * lexical_score;
            RankedResult {
                candidate,
                score,
                semantic_score,
                lexical_score,
            }
        })
        .collect();

    ranked.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(Ordering::Equal)
            .then_with(|| b.candidate.updated_at.cmp(&a.candidate.updated_at))
            .then_with(|| a.candidate.id.cmp(&b.candidate.id))
    });

    ranked.truncate(top_k);
    ranked
}
