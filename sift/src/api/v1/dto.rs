//! Wire types for the v1 API. Field names serialize as camelCase.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ingest::IngestResult;
use crate::models::{
    ConversationTurn, SearchFilters, SearchOutcome, SearchResultItem, Source, SourceStatus,
};

#[derive(Debug, Clone, Deserialize, utoipa::ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SearchRequest {
    /// Natural-language query.
    pub q: String,
    /// Identity the results are permission-filtered for.
    pub requester: String,
    /// Number of results to return. Defaults to the configured value and is
    /// clamped to the configured maximum.
    #[serde(default)]
    pub top_k: Option<u32>,
    #[serde(default)]
    pub filters: Option<SearchFilters>,
    /// Present when this query continues an earlier conversation.
    #[serde(default)]
    pub conversation_id: Option<String>,
}

#[derive(Debug, Clone, Serialize, utoipa::ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SearchResponse {
    pub results: Vec<SearchResultItem>,
    pub total: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub conversation_id: Option<String>,
    /// True when conversation context could not be read or written; results
    /// are still valid but follow-up continuity is degraded.
    pub context_degraded: bool,
    pub timing_ms: u64,
}

impl From<SearchOutcome> for SearchResponse {
    fn from(outcome: SearchOutcome) -> Self {
        Self {
            total: outcome.results.len() as u32,
            results: outcome.results,
            conversation_id: outcome.conversation_id,
            context_degraded: outcome.context_degraded,
            timing_ms: outcome.timing_ms,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize, utoipa::ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct IngestRequest {
    /// Restrict the run to one source. Absent means every registered source.
    #[serde(default)]
    pub source: Option<Source>,
    /// Start of an explicit backfill window. Requires `end`.
    #[serde(default)]
    pub start: Option<DateTime<Utc>>,
    /// End of an explicit backfill window. Requires `start`.
    #[serde(default)]
    pub end: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, utoipa::ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct IngestResponse {
    pub runs: Vec<IngestResult>,
}

#[derive(Debug, Clone, Serialize, utoipa::ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct IngestStatusResponse {
    pub sources: Vec<SourceStatus>,
    pub total_documents: u64,
}

#[derive(Debug, Clone, Serialize, utoipa::ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ConversationHistoryResponse {
    pub conversation_id: String,
    pub turns: Vec<ConversationTurn>,
}
