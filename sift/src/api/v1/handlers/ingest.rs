//! v1 ingestion handlers.
//!
//! `POST /api/v1/ingest` runs ingestion for one source or all of them;
//! `GET /api/v1/ingest/status` reports per-source watermarks and staleness.

use axum::extract::State;

use crate::api::v1::dto::{IngestRequest, IngestResponse, IngestStatusResponse};
use crate::api::v1::response::{ApiError, ApiResponse, ErrorCode};
use crate::api::AppState;
use crate::ingest::IngestWindow;

/// `POST /api/v1/ingest`
#[utoipa::path(
    post,
    path = "/api/v1/ingest",
    tag = "ingest",
    operation_id = "ingest.run",
    request_body = IngestRequest,
    responses(
        (status = 200, description = "Per-source run results", body = IngestResponse),
        (status = 400, description = "Invalid request", body = ApiError),
        (status = 503, description = "Source unavailable", body = ApiError),
    )
)]
pub async fn run_ingest(
    State(state): State<AppState>,
    axum::Json(req): axum::Json<IngestRequest>,
) -> ApiResponse<IngestResponse> {
    let window = match (req.start, req.end) {
        (Some(start), Some(end)) => {
            if end <= start {
                return ApiResponse::error(ErrorCode::InvalidRequest, "end must be after start");
            }
            IngestWindow::Range { start, end }
        }
        (None, None) => IngestWindow::Incremental,
        _ => {
            return ApiResponse::error(
                ErrorCode::InvalidRequest,
                "start and end must be provided together",
            );
        }
    };

    match req.source {
        Some(source) => match state.pipeline.ingest(source, window).await {
            Ok(run) => ApiResponse::success(IngestResponse { runs: vec![run] }),
            Err(e) => ApiResponse::from(e),
        },
        None => {
            if matches!(window, IngestWindow::Range { .. }) {
                return ApiResponse::error(
                    ErrorCode::InvalidRequest,
                    "A backfill range requires an explicit source",
                );
            }
            let runs = state.pipeline.ingest_all().await;
            ApiResponse::success(IngestResponse { runs })
        }
    }
}

/// `GET /api/v1/ingest/status`
#[utoipa::path(
    get,
    path = "/api/v1/ingest/status",
    tag = "ingest",
    operation_id = "ingest.status",
    responses(
        (status = 200, description = "Per-source sync status", body = IngestStatusResponse),
    )
)]
pub async fn ingest_status(State(state): State<AppState>) -> ApiResponse<IngestStatusResponse> {
    let sources = match state.pipeline.status().await {
        Ok(sources) => sources,
        Err(e) => return ApiResponse::from(e),
    };
    let total_documents = match state.backend.stats().await {
        Ok(stats) => stats.total_documents,
        Err(e) => return ApiResponse::from(e),
    };

    ApiResponse::success(IngestStatusResponse {
        sources,
        total_documents,
    })
}
