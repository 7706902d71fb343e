use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::db::connection::Database;
use crate::db::repository::{ConversationRepository, DocumentRepository, SyncStateRepository};
use crate::db::traits::{ConversationStore, StorageBackend, SyncStateStore, VectorIndex};
use crate::error::Result;
use crate::models::{
    Candidate, ConversationTurn, Document, IndexFilter, IndexStats, Source, SyncState, TurnRole,
};

pub struct LibSqlBackend {
    db: Database,
}

impl LibSqlBackend {
    pub fn new(db: Database) -> Self {
        Self { db }
    }
}

#[async_trait]
impl VectorIndex for LibSqlBackend {
    async fn upsert_document(&self, doc: &Document, embedding: &[f32]) -> Result<()> {
        let conn = self.db.connect()?;
        DocumentRepository::upsert(&conn, doc, embedding).await
    }

    async fn content_hashes(&self, ids: &[String]) -> Result<HashMap<String, String>> {
        let conn = self.db.connect()?;
        DocumentRepository::content_hashes(&conn, ids).await
    }

    async fn query_semantic(
        &self,
        embedding: &[f32],
        limit: u32,
        filter: &IndexFilter,
    ) -> Result<Vec<Candidate>> {
        let conn = self.db.connect()?;
        DocumentRepository::query_semantic(&conn, embedding, limit, filter).await
    }

    async fn query_keyword(
        &self,
        terms: &[String],
        limit: u32,
        filter: &IndexFilter,
    ) -> Result<Vec<Candidate>> {
        let conn = self.db.connect()?;
        DocumentRepository::query_keyword(&conn, terms, limit, filter).await
    }

    async fn stats(&self) -> Result<IndexStats> {
        let conn = self.db.connect()?;
        DocumentRepository::stats(&conn).await
    }
}

#[async_trait]
impl SyncStateStore for LibSqlBackend {
    async fn get_sync_state(&self, source: Source) -> Result<Option<SyncState>> {
        let conn = self.db.connect()?;
        SyncStateRepository::get(&conn, source).await
    }

    async fn advance_sync_state(
        &self,
        source: Source,
        last_sync_at: DateTime<Utc>,
        batch_id: Option<&str>,
    ) -> Result<()> {
        let conn = self.db.connect()?;
        SyncStateRepository::advance(&conn, source, last_sync_at, batch_id).await
    }

    async fn all_sync_states(&self) -> Result<Vec<SyncState>> {
        let conn = self.db.connect()?;
        SyncStateRepository::all(&conn).await
    }
}

#[async_trait]
impl ConversationStore for LibSqlBackend {
    async fn append_turn(
        &self,
        conversation_id: &str,
        role: TurnRole,
        content: &str,
        ttl_secs: i64,
    ) -> Result<ConversationTurn> {
        let conn = self.db.connect()?;
        ConversationRepository::append(&conn, conversation_id, role, content, ttl_secs).await
    }

    async fn get_history(&self, conversation_id: &str) -> Result<Vec<ConversationTurn>> {
        let conn = self.db.connect()?;
        ConversationRepository::history(&conn, conversation_id).await
    }

    async fn purge_expired(&self) -> Result<u64> {
        let conn = self.db.connect()?;
        ConversationRepository::purge_expired(&conn).await
    }
}

#[async_trait]
impl StorageBackend for LibSqlBackend {
    async fn sync(&self) -> Result<()> {
        self.db.sync().await
    }
}
