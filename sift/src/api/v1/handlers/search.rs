//! v1 search handler.
//!
//! `POST /api/v1/search`: permission-aware hybrid search with optional
//! conversation continuity.

use axum::extract::State;

use crate::api::v1::dto::{SearchRequest, SearchResponse};
use crate::api::v1::response::{ApiError, ApiResponse, ErrorCode};
use crate::api::AppState;
use crate::models::SearchQuery;

/// `POST /api/v1/search`
#[utoipa::path(
    post,
    path = "/api/v1/search",
    tag = "search",
    operation_id = "search.search",
    request_body = SearchRequest,
    responses(
        (status = 200, description = "Ranked, permission-filtered results", body = SearchResponse),
        (status = 400, description = "Invalid request", body = ApiError),
        (status = 503, description = "Search index unavailable", body = ApiError),
        (status = 504, description = "Query exceeded its time budget", body = ApiError),
    )
)]
pub async fn search(
    State(state): State<AppState>,
    axum::Json(req): axum::Json<SearchRequest>,
) -> ApiResponse<SearchResponse> {
    if req.q.trim().is_empty() {
        return ApiResponse::error(ErrorCode::InvalidRequest, "Query cannot be empty");
    }
    if req.requester.trim().is_empty() {
        return ApiResponse::error(ErrorCode::InvalidRequest, "Requester cannot be empty");
    }
    if let Some(0) = req.top_k {
        return ApiResponse::error(ErrorCode::InvalidRequest, "topK must be at least 1");
    }

    let query = SearchQuery {
        q: req.q,
        top_k: req.top_k.unwrap_or(state.config.search.default_top_k),
        filters: req.filters.unwrap_or_default(),
        requester: req.requester,
        conversation_id: req.conversation_id,
    };

    match state.search.search(query).await {
        Ok(outcome) => ApiResponse::success(SearchResponse::from(outcome)),
        Err(e) => ApiResponse::from(e),
    }
}
