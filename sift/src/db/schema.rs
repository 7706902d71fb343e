use libsql::Connection;

use crate::error::Result;

pub async fn init_schema(conn: &Connection, dimensions: usize) -> Result<()> {
    let schema = format!(
        r#"
        -- Indexed documents with their embedding vector
        CREATE TABLE IF NOT EXISTS documents (
            id TEXT PRIMARY KEY,
            source TEXT NOT NULL,
            text TEXT NOT NULL,
            content_hash TEXT NOT NULL,
            project_key TEXT,
            access TEXT NOT NULL,
            source_metadata TEXT DEFAULT '{{}}',
            embedding F32_BLOB({dimensions}),
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        );

        CREATE INDEX IF NOT EXISTS documents_embedding_idx ON documents(libsql_vector_idx(embedding));
        CREATE INDEX IF NOT EXISTS idx_documents_source ON documents(source);
        CREATE INDEX IF NOT EXISTS idx_documents_project_key ON documents(project_key);
        CREATE INDEX IF NOT EXISTS idx_documents_updated_at ON documents(updated_at);

        -- One ingestion watermark per source
        CREATE TABLE IF NOT EXISTS sync_state (
            source TEXT PRIMARY KEY,
            last_sync_at TEXT NOT NULL,
            batch_id TEXT,
            updated_at TEXT NOT NULL
        );

        -- Append-only multi-turn conversation log, TTL bounded
        CREATE TABLE IF NOT EXISTS conversation_turns (
            id TEXT PRIMARY KEY,
            conversation_id TEXT NOT NULL,
            role TEXT NOT NULL,
            content TEXT NOT NULL,
            created_at TEXT NOT NULL,
            expires_at TEXT NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_turns_conversation_id
            ON conversation_turns(conversation_id);
        CREATE INDEX IF NOT EXISTS idx_turns_expires_at
            ON conversation_turns(expires_at);
        "#
    );

    conn.execute_batch(&schema).await?;
    Ok(())
}
