use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::models::Source;

#[derive(Error, Debug)]
pub enum SiftError {
    #[error("Database error: {0}")]
    Database(#[from] libsql::Error),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Source {source} unavailable: {message}")]
    SourceUnavailable { source: Source, message: String },

    #[error("Embedding error: {0}")]
    Embedding(String),

    #[error("Vector index unavailable: {0}")]
    IndexUnavailable(String),

    #[error("Permission evaluation error for document {document_id}: {message}")]
    PermissionEvaluation {
        document_id: String,
        message: String,
    },

    #[error("Conversation store error: {0}")]
    ConversationStore(String),

    #[error("Query timed out after {budget_ms} ms")]
    QueryTimeout { budget_ms: u64 },

    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("API rate limit exceeded, retry after {retry_after:?} seconds")]
    ApiRateLimit { retry_after: Option<u64> },

    #[error("API authentication error: {0}")]
    ApiAuth(String),

    #[error("Internal server error: {0}")]
    Internal(String),
}

impl IntoResponse for SiftError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            SiftError::NotFound(msg) => (StatusCode::NOT_FOUND, msg.clone()),
            SiftError::Validation(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            SiftError::Database(e) => (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()),
            SiftError::SourceUnavailable { .. } => {
                (StatusCode::SERVICE_UNAVAILABLE, self.to_string())
            }
            SiftError::Embedding(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg.clone()),
            SiftError::IndexUnavailable(msg) => (StatusCode::SERVICE_UNAVAILABLE, msg.clone()),
            SiftError::PermissionEvaluation { .. } => {
                (StatusCode::INTERNAL_SERVER_ERROR, self.to_string())
            }
            SiftError::ConversationStore(msg) => (StatusCode::SERVICE_UNAVAILABLE, msg.clone()),
            SiftError::QueryTimeout { .. } => (StatusCode::GATEWAY_TIMEOUT, self.to_string()),
            SiftError::Http(e) => (StatusCode::BAD_GATEWAY, e.to_string()),
            SiftError::Json(e) => (StatusCode::BAD_REQUEST, e.to_string()),
            SiftError::Io(e) => (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()),
            SiftError::ApiRateLimit { .. } => (StatusCode::TOO_MANY_REQUESTS, self.to_string()),
            SiftError::ApiAuth(msg) => (StatusCode::UNAUTHORIZED, msg.clone()),
            SiftError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg.clone()),
        };

        let body = Json(json!({
            "error": message,
            "code": status.as_u16()
        }));

        (status, body).into_response()
    }
}

pub type Result<T> = std::result::Result<T, SiftError>;
