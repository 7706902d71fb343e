use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::Result;
use crate::models::{
    Candidate, ConversationTurn, Document, IndexFilter, IndexStats, Source, SyncState, TurnRole,
};

// ---------------------------------------------------------------------------
// Individual store traits
// ---------------------------------------------------------------------------

/// Vector + keyword retrieval over documents. Upsert is the sole mutation
/// path; re-ingesting an overlapping window is always safe because ids are
/// content-addressed.
#[async_trait]
pub trait VectorIndex: Send + Sync {
    /// Insert-or-update a document and its embedding, keyed by `doc.id`.
    async fn upsert_document(&self, doc: &Document, embedding: &[f32]) -> Result<()>;

    /// Content hashes for the given ids, used to skip re-embedding
    /// unchanged items. Missing ids are simply absent from the map.
    async fn content_hashes(&self, ids: &[String]) -> Result<HashMap<String, String>>;

    /// Approximate nearest-neighbor query with optional metadata filter.
    /// Scores are normalized to [0, 1].
    async fn query_semantic(
        &self,
        embedding: &[f32],
        limit: u32,
        filter: &IndexFilter,
    ) -> Result<Vec<Candidate>>;

    /// Lexical candidate scan: documents containing any of `terms`, most
    /// recently updated first. Semantic score is zero on these candidates;
    /// the ranker computes their lexical score.
    async fn query_keyword(
        &self,
        terms: &[String],
        limit: u32,
        filter: &IndexFilter,
    ) -> Result<Vec<Candidate>>;

    async fn stats(&self) -> Result<IndexStats>;
}

/// Persistence for per-source ingestion watermarks.
#[async_trait]
pub trait SyncStateStore: Send + Sync {
    async fn get_sync_state(&self, source: Source) -> Result<Option<SyncState>>;

    /// Advance the watermark. Never moves `last_sync_at` backwards; a stale
    /// write is ignored.
    async fn advance_sync_state(
        &self,
        source: Source,
        last_sync_at: DateTime<Utc>,
        batch_id: Option<&str>,
    ) -> Result<()>;

    async fn all_sync_states(&self) -> Result<Vec<SyncState>>;
}

/// Shared multi-turn conversation log. Backed by the common database so any
/// serving process can resume any conversation; unavailability is a loud
/// error, never a silent fallback to process-local memory.
#[async_trait]
pub trait ConversationStore: Send + Sync {
    async fn append_turn(
        &self,
        conversation_id: &str,
        role: TurnRole,
        content: &str,
        ttl_secs: i64,
    ) -> Result<ConversationTurn>;

    /// Unexpired turns for a conversation, oldest first. An expired or
    /// unknown conversation yields an empty list, not an error.
    async fn get_history(&self, conversation_id: &str) -> Result<Vec<ConversationTurn>>;

    /// Delete expired turns, returning the number removed.
    async fn purge_expired(&self) -> Result<u64>;
}

// ---------------------------------------------------------------------------
// Unified backend supertrait
// ---------------------------------------------------------------------------

/// A complete storage backend combining all store traits plus lifecycle
/// operations.
#[async_trait]
pub trait StorageBackend: VectorIndex + SyncStateStore + ConversationStore {
    /// Sync with remote (e.g. Turso replication). No-op for local backends.
    async fn sync(&self) -> Result<()>;
}
