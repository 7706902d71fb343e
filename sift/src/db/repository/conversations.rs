use chrono::{DateTime, Duration, Utc};
use libsql::{params, Connection};
use nanoid::nanoid;

use crate::error::Result;
use crate::models::{ConversationTurn, TurnRole};

pub struct ConversationRepository;

impl ConversationRepository {
    /// Append one turn. Single INSERT into an ordered log; concurrent
    /// appends for the same conversation interleave but never replace or
    /// drop each other.
    pub async fn append(
        conn: &Connection,
        conversation_id: &str,
        role: TurnRole,
        content: &str,
        ttl_secs: i64,
    ) -> Result<ConversationTurn> {
        let now = Utc::now();
        let turn = ConversationTurn {
            id: nanoid!(),
            conversation_id: conversation_id.to_string(),
            role,
            content: content.to_string(),
            created_at: now,
            expires_at: now + Duration::seconds(ttl_secs),
        };

        conn.execute(
            r#"
            INSERT INTO conversation_turns (
                id, conversation_id, role, content, created_at, expires_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            "#,
            params![
                turn.id.clone(),
                turn.conversation_id.clone(),
                turn.role.to_string(),
                turn.content.clone(),
                turn.created_at.to_rfc3339(),
                turn.expires_at.to_rfc3339(),
            ],
        )
        .await?;

        Ok(turn)
    }

    /// Unexpired turns, oldest first. Expired conversations read as empty.
    pub async fn history(conn: &Connection, conversation_id: &str) -> Result<Vec<ConversationTurn>> {
        let mut rows = conn
            .query(
                r#"
                SELECT id, conversation_id, role, content, created_at, expires_at
                FROM conversation_turns
                WHERE conversation_id = ?1 AND expires_at > ?2
                ORDER BY created_at ASC, id ASC
                "#,
                params![conversation_id, Utc::now().to_rfc3339()],
            )
            .await?;

        let mut turns = Vec::new();
        while let Some(row) = rows.next().await? {
            turns.push(Self::row_to_turn(&row)?);
        }
        Ok(turns)
    }

    pub async fn purge_expired(conn: &Connection) -> Result<u64> {
        let deleted = conn
            .execute(
                "DELETE FROM conversation_turns WHERE expires_at <= ?1",
                params![Utc::now().to_rfc3339()],
            )
            .await?;
        Ok(deleted)
    }

    fn row_to_turn(row: &libsql::Row) -> Result<ConversationTurn> {
        Ok(ConversationTurn {
            id: row.get(0)?,
            conversation_id: row.get(1)?,
            role: row
                .get::<String>(2)?
                .parse()
                .unwrap_or(TurnRole::User),
            content: row.get(3)?,
            created_at: DateTime::parse_from_rfc3339(&row.get::<String>(4)?)
                .map(|dt| dt.with_timezone(&Utc))
                .unwrap_or_else(|_| Utc::now()),
            expires_at: DateTime::parse_from_rfc3339(&row.get::<String>(5)?)
                .map(|dt| dt.with_timezone(&Utc))
                .unwrap_or_else(|_| Utc::now()),
        })
    }
}
