use axum::extract::State;
use serde::Serialize;

use crate::api::state::AppState;
use crate::api::v1::response::ApiResponse;

/// Health data returned inside the v1 envelope.
#[derive(Debug, Clone, Serialize, utoipa::ToSchema)]
pub struct HealthData {
    pub status: String,
    pub version: String,
    pub database: DatabaseStatus,
    pub embeddings: EmbeddingsStatus,
    pub sources: SourcesStatus,
}

#[derive(Debug, Clone, Serialize, utoipa::ToSchema)]
pub struct DatabaseStatus {
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_documents: Option<u64>,
}

#[derive(Debug, Clone, Serialize, utoipa::ToSchema)]
pub struct EmbeddingsStatus {
    pub status: String,
    pub model: String,
    pub dimensions: usize,
}

#[derive(Debug, Clone, Serialize, utoipa::ToSchema)]
pub struct SourcesStatus {
    pub registered: usize,
}

/// `GET /api/v1/health`
#[utoipa::path(
    get,
    path = "/api/v1/health",
    tag = "health",
    responses(
        (status = 200, description = "Service health status", body = HealthData),
    )
)]
pub async fn health_check(State(state): State<AppState>) -> ApiResponse<HealthData> {
    // Pulls fresh replica state on remote-replica deployments so every
    // process converges on the shared database; a no-op locally.
    let database = match state.backend.sync().await {
        Ok(()) => match state.backend.stats().await {
            Ok(stats) => DatabaseStatus {
                status: "ok".to_string(),
                total_documents: Some(stats.total_documents),
            },
            Err(_) => DatabaseStatus {
                status: "error".to_string(),
                total_documents: None,
            },
        },
        Err(_) => DatabaseStatus {
            status: "error".to_string(),
            total_documents: None,
        },
    };

    let embeddings = EmbeddingsStatus {
        status: "ok".to_string(),
        model: state.config.embeddings.model.clone(),
        dimensions: state.embeddings.dimensions(),
    };

    let sources = SourcesStatus {
        registered: state.pipeline.sources().len(),
    };

    ApiResponse::success(HealthData {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        database,
        embeddings,
        sources,
    })
}
