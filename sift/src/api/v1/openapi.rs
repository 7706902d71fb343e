use axum::Json;
use utoipa::OpenApi;
use utoipa_redoc::{Redoc, Servable};

use crate::ingest;
use crate::models;

use super::dto;
use super::handlers;
use super::response;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Sift API",
        version = "1.0.0",
        description = "Permission-aware hybrid search over organizational knowledge sources.",
    ),
    paths(
        handlers::health::health_check,
        handlers::search::search,
        handlers::ingest::run_ingest,
        handlers::ingest::ingest_status,
        handlers::conversation::get_history,
    ),
    components(schemas(
        // Response envelope
        response::ErrorCode,
        response::ApiError,
        // Search
        dto::SearchRequest,
        dto::SearchResponse,
        models::SearchFilters,
        models::DateRange,
        models::SearchResultItem,
        models::Citation,
        models::Source,
        // Ingest
        dto::IngestRequest,
        dto::IngestResponse,
        dto::IngestStatusResponse,
        ingest::IngestResult,
        ingest::IngestItemError,
        models::SourceStatus,
        // Conversations
        dto::ConversationHistoryResponse,
        models::ConversationTurn,
        models::TurnRole,
        // Health (handler-local types)
        handlers::health::HealthData,
        handlers::health::DatabaseStatus,
        handlers::health::EmbeddingsStatus,
        handlers::health::SourcesStatus,
    )),
    tags(
        (name = "health", description = "Health check"),
        (name = "search", description = "Permission-aware hybrid search"),
        (name = "ingest", description = "Source ingestion and sync status"),
        (name = "conversations", description = "Multi-turn conversation history"),
    ),
    security(
        ("bearer_auth" = [])
    ),
    modifiers(&SecurityAddon),
)]
pub struct ApiDoc;

struct SecurityAddon;

impl utoipa::Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "bearer_auth",
            utoipa::openapi::security::SecurityScheme::Http(utoipa::openapi::security::Http::new(
                utoipa::openapi::security::HttpAuthScheme::Bearer,
            )),
        );
    }
}

pub async fn openapi_json() -> Json<utoipa::openapi::OpenApi> {
    Json(ApiDoc::openapi())
}

pub fn redoc_router<S: Clone + Send + Sync + 'static>() -> axum::Router<S> {
    Redoc::with_url("/docs", ApiDoc::openapi()).into()
}
