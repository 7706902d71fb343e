//! v1 conversation handler.
//!
//! `GET /api/v1/conversations/{conversationId}` returns the unexpired turns
//! of a conversation, oldest first. Unknown and expired conversations both
//! return an empty list.

use axum::extract::{Path, State};

use crate::api::v1::dto::ConversationHistoryResponse;
use crate::api::v1::response::{ApiError, ApiResponse};
use crate::api::AppState;

/// `GET /api/v1/conversations/{conversationId}`
#[utoipa::path(
    get,
    path = "/api/v1/conversations/{conversationId}",
    tag = "conversations",
    operation_id = "conversations.history",
    params(
        ("conversationId" = String, Path, description = "Conversation identifier"),
    ),
    responses(
        (status = 200, description = "Conversation turns, oldest first", body = ConversationHistoryResponse),
        (status = 503, description = "Conversation store unavailable", body = ApiError),
    )
)]
pub async fn get_history(
    State(state): State<AppState>,
    Path(conversation_id): Path<String>,
) -> ApiResponse<ConversationHistoryResponse> {
    match state.conversations.history(&conversation_id).await {
        Ok(turns) => ApiResponse::success(ConversationHistoryResponse {
            conversation_id,
            turns,
        }),
        Err(e) => ApiResponse::from(e),
    }
}
