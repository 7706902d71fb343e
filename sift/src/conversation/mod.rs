//! Conversation continuity on top of the shared store: TTL-bounded history
//! and follow-up query enrichment.

use std::sync::Arc;

use crate::db::StorageBackend;
use crate::error::{Result, SiftError};
use crate::models::{ConversationTurn, TurnRole};
use crate::ranking::lexical;

/// Upper bound on terms pulled from history into a follow-up query, so a
/// long conversation cannot drown out the actual question.
const MAX_CONTEXT_TERMS: usize = 8;

/// A query this short is assumed to lean on prior turns for its meaning.
const SHORT_QUERY_TERMS: usize = 3;

const FOLLOW_UP_MARKERS: &[&str] = &[
    "it", "that", "this", "those", "these", "they", "them", "he", "she", "there",
];

#[derive(Clone)]
pub struct ConversationService {
    backend: Arc<dyn StorageBackend>,
    ttl_secs: i64,
}

impl ConversationService {
    pub fn new(backend: Arc<dyn StorageBackend>, ttl_secs: i64) -> Self {
        Self { backend, ttl_secs }
    }

    pub async fn append(
        &self,
        conversation_id: &str,
        role: TurnRole,
        content: &str,
    ) -> Result<ConversationTurn> {
        self.backend
            .append_turn(conversation_id, role, content, self.ttl_secs)
            .await
            .map_err(store_unavailable)
    }

    /// Unexpired turns, oldest first. Empty for unknown or expired
    /// conversations.
    pub async fn history(&self, conversation_id: &str) -> Result<Vec<ConversationTurn>> {
        self.backend
            .get_history(conversation_id)
            .await
            .map_err(store_unavailable)
    }

    pub async fn purge_expired(&self) -> Result<u64> {
        self.backend.purge_expired().await.map_err(store_unavailable)
    }
}

/// A database failure here means the shared store is unreachable; report it
/// as that rather than a generic internal error.
fn store_unavailable(err: SiftError) -> SiftError {
    match err {
        SiftError::Database(inner) => SiftError::ConversationStore(inner.to_string()),
        other => other,
    }
}

/// Terms from recent user turns worth carrying into a follow-up query.
///
/// Only applies when the query looks dependent on context: very short, or
/// carrying a bare pronoun. Identifier-like tokens (issue keys, error
/// codes) from the last two user turns are preferred since they are what
/// follow-ups usually point back at.
pub fn context_terms(history: &[ConversationTurn], query: &str) -> Vec<String> {
    let query_terms = lexical::query_tokens(query);
    if !looks_like_follow_up(query, &query_terms) {
        return Vec::new();
    }

    let mut terms: Vec<String> = Vec::new();
    let recent_user_turns = history
        .iter()
        .rev()
        .filter(|turn| turn.role == TurnRole::User)
        .take(2);

    for turn in recent_user_turns {
        for token in lexical::query_tokens(&turn.content) {
            if query_terms.contains(&token) || terms.contains(&token) {
                continue;
            }
            // Identifier-like tokens go first; plain words fill the rest.
            if lexical::is_identifier(&token) {
                terms.insert(0, token);
            } else {
                terms.push(token);
            }
        }
    }

    terms.truncate(MAX_CONTEXT_TERMS);
    terms
}

fn looks_like_follow_up(query: &str, query_terms: &[String]) -> bool {
    if query_terms.len() <= SHORT_QUERY_TERMS {
        return true;
    }
    query
        .split_whitespace()
        .map(|w| w.trim_matches(|c: char| !c.is_alphanumeric()).to_lowercase())
        .any(|w| FOLLOW_UP_MARKERS.contains(&w.as_str()))
}
