use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{AccessSpec, Metadata, Source};

#[derive(Debug, Clone, Default, Serialize, Deserialize, utoipa::ToSchema)]
pub struct DateRange {
    pub start: Option<DateTime<Utc>>,
    pub end: Option<DateTime<Utc>>,
}

/// Caller-supplied constraints on the candidate set.
#[derive(Debug, Clone, Default, Serialize, Deserialize, utoipa::ToSchema)]
pub struct SearchFilters {
    pub sources: Option<Vec<Source>>,
    pub project_key: Option<String>,
    pub date_range: Option<DateRange>,
}

/// Internal search request handed to the query service.
#[derive(Debug, Clone)]
pub struct SearchQuery {
    pub q: String,
    pub top_k: u32,
    pub filters: SearchFilters,
    /// Identity the permission filter evaluates against.
    pub requester: String,
    pub conversation_id: Option<String>,
}

/// Metadata filter pushed down to the index query. Only an optimization;
/// the permission filter re-checks every candidate after retrieval.
#[derive(Debug, Clone, Default)]
pub struct IndexFilter {
    pub sources: Option<Vec<Source>>,
    pub project_key: Option<String>,
    pub updated_after: Option<DateTime<Utc>>,
    pub updated_before: Option<DateTime<Utc>>,
}

impl IndexFilter {
    pub fn from_filters(filters: &SearchFilters) -> Self {
        let (updated_after, updated_before) = match &filters.date_range {
            Some(range) => (range.start, range.end),
            None => (None, None),
        };
        Self {
            sources: filters.sources.clone(),
            project_key: filters.project_key.clone(),
            updated_after,
            updated_before,
        }
    }
}

/// A document as retrieved from the index, before filtering and ranking.
///
/// `access` is `None` when the stored access metadata could not be parsed;
/// the permission filter treats that as not visible.
#[derive(Debug, Clone)]
pub struct Candidate {
    pub id: String,
    pub source: Source,
    pub text: String,
    pub project_key: Option<String>,
    pub access: Option<AccessSpec>,
    pub source_metadata: Metadata,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Vector-similarity score normalized to [0, 1]. Zero for candidates
    /// surfaced only by the keyword path.
    pub semantic_score: f32,
}

#[derive(Debug, Clone, Serialize, Deserialize, utoipa::ToSchema)]
pub struct IndexStats {
    pub total_documents: u64,
}

/// One ranked hit with its fused score and component scores.
#[derive(Debug, Clone)]
pub struct RankedResult {
    pub candidate: Candidate,
    pub score: f32,
    pub semantic_score: f32,
    pub lexical_score: f32,
}

#[derive(Debug, Clone, Serialize, Deserialize, utoipa::ToSchema)]
pub struct Citation {
    pub source: Source,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, utoipa::ToSchema)]
pub struct SearchResultItem {
    pub document_id: String,
    pub source: Source,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    pub snippet: String,
    pub score: f32,
    pub citation: Citation,
}

/// Result of a completed search call.
#[derive(Debug, Clone)]
pub struct SearchOutcome {
    pub results: Vec<SearchResultItem>,
    pub conversation_id: Option<String>,
    /// Set when conversation context could not be read or written; results
    /// are still valid but follow-up continuity is degraded.
    pub context_degraded: bool,
    pub timing_ms: u64,
}
