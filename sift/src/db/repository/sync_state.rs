use chrono::{DateTime, Utc};
use libsql::{params, Connection};

use crate::error::Result;
use crate::models::{Source, SyncState};

pub struct SyncStateRepository;

impl SyncStateRepository {
    pub async fn get(conn: &Connection, source: Source) -> Result<Option<SyncState>> {
        let mut rows = conn
            .query(
                "SELECT source, last_sync_at, batch_id, updated_at FROM sync_state WHERE source = ?1",
                params![source.to_string()],
            )
            .await?;

        if let Some(row) = rows.next().await? {
            Ok(Some(Self::row_to_state(&row)?))
        } else {
            Ok(None)
        }
    }

    /// Advance the watermark for a source. Monotonic: a timestamp older than
    /// the stored one is ignored, so a partially failed run can never move a
    /// source backwards.
    pub async fn advance(
        conn: &Connection,
        source: Source,
        last_sync_at: DateTime<Utc>,
        batch_id: Option<&str>,
    ) -> Result<()> {
        if let Some(existing) = Self::get(conn, source).await? {
            if last_sync_at <= existing.last_sync_at {
                tracing::debug!(
                    source = %source,
                    proposed = %last_sync_at,
                    current = %existing.last_sync_at,
                    "Skipping non-advancing sync watermark"
                );
                return Ok(());
            }
        }

        conn.execute(
            r#"
            INSERT INTO sync_state (source, last_sync_at, batch_id, updated_at)
            VALUES (?1, ?2, ?3, ?4)
            ON CONFLICT(source) DO UPDATE SET
                last_sync_at = excluded.last_sync_at,
                batch_id = excluded.batch_id,
                updated_at = excluded.updated_at
            "#,
            params![
                source.to_string(),
                last_sync_at.to_rfc3339(),
                batch_id,
                Utc::now().to_rfc3339(),
            ],
        )
        .await?;

        Ok(())
    }

    pub async fn all(conn: &Connection) -> Result<Vec<SyncState>> {
        let mut rows = conn
            .query(
                "SELECT source, last_sync_at, batch_id, updated_at FROM sync_state ORDER BY source",
                (),
            )
            .await?;

        let mut states = Vec::new();
        while let Some(row) = rows.next().await? {
            states.push(Self::row_to_state(&row)?);
        }
        Ok(states)
    }

    fn row_to_state(row: &libsql::Row) -> Result<SyncState> {
        Ok(SyncState {
            source: row.get::<String>(0)?.parse().map_err(|e: String| {
                crate::error::SiftError::Internal(format!("corrupt sync_state source: {e}"))
            })?,
            last_sync_at: DateTime::parse_from_rfc3339(&row.get::<String>(1)?)
                .map(|dt| dt.with_timezone(&Utc))
                .unwrap_or_else(|_| Utc::now()),
            batch_id: row.get(2)?,
            updated_at: DateTime::parse_from_rfc3339(&row.get::<String>(3)?)
                .map(|dt| dt.with_timezone(&Utc))
                .unwrap_or_else(|_| Utc::now()),
        })
    }
}
