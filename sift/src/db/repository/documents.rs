use chrono::{DateTime, Utc};
use libsql::{params, Connection};
use std::collections::HashMap;

use crate::error::Result;
use crate::models::{Candidate, Document, IndexFilter, IndexStats};

const CANDIDATE_COLUMNS: &str =
    "id, source, text, project_key, access, source_metadata, created_at, updated_at";

/// Build parameterized WHERE clauses for an index filter. Returns
/// (sql_fragment, param_values) where the fragment starts with " AND " and
/// uses positional placeholders from `start_idx`.
fn build_filter(filter: &IndexFilter, start_idx: usize) -> (String, Vec<libsql::Value>) {
    let mut sql = String::new();
    let mut values: Vec<libsql::Value> = Vec::new();
    let mut idx = start_idx;

    if let Some(ref sources) = filter.sources {
        if !sources.is_empty() {
            let mut placeholders = Vec::with_capacity(sources.len());
            for source in sources {
                placeholders.push(format!("?{idx}"));
                values.push(libsql::Value::from(source.as_str().to_string()));
                idx += 1;
            }
            sql.push_str(&format!(" AND source IN ({})", placeholders.join(", ")));
        }
    }

    if let Some(ref project_key) = filter.project_key {
        sql.push_str(&format!(" AND project_key = ?{idx}"));
        values.push(libsql::Value::from(project_key.clone()));
        idx += 1;
    }

    if let Some(after) = filter.updated_after {
        sql.push_str(&format!(" AND updated_at >= ?{idx}"));
        values.push(libsql::Value::from(after.to_rfc3339()));
        idx += 1;
    }

    if let Some(before) = filter.updated_before {
        sql.push_str(&format!(" AND updated_at <= ?{idx}"));
        values.push(libsql::Value::from(before.to_rfc3339()));
    }

    (sql, values)
}

/// Escape LIKE wildcards so a term matches literally under `ESCAPE '\'`.
fn escape_like(term: &str) -> String {
    term.replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_")
}

pub struct DocumentRepository;

impl DocumentRepository {
    /// Insert-or-update by id. The only mutation path into the index.
    pub async fn upsert(conn: &Connection, doc: &Document, embedding: &[f32]) -> Result<()> {
        let embedding_json = serde_json::to_string(embedding)?;

        conn.execute(
            r#"
            INSERT INTO documents (
                id, source, text, content_hash, project_key, access,
                source_metadata, embedding, created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, vector32(?8), ?9, ?10)
            ON CONFLICT(id) DO UPDATE SET
                source = excluded.source,
                text = excluded.text,
                content_hash = excluded.content_hash,
                project_key = excluded.project_key,
                access = excluded.access,
                source_metadata = excluded.source_metadata,
                embedding = excluded.embedding,
                created_at = excluded.created_at,
                updated_at = excluded.updated_at
            "#,
            params![
                doc.id.clone(),
                doc.source.to_string(),
                doc.text.clone(),
                doc.content_hash.clone(),
                doc.project_key.clone(),
                serde_json::to_string(&doc.access)?,
                serde_json::to_string(&doc.source_metadata)?,
                embedding_json,
                doc.created_at.to_rfc3339(),
                doc.updated_at.to_rfc3339(),
            ],
        )
        .await?;

        Ok(())
    }

    pub async fn content_hashes(
        conn: &Connection,
        ids: &[String],
    ) -> Result<HashMap<String, String>> {
        if ids.is_empty() {
            return Ok(HashMap::new());
        }

        let mut placeholders = String::new();
        for i in 0..ids.len() {
            if i > 0 {
                placeholders.push_str(", ");
            }
            placeholders.push('?');
            placeholders.push_str(&(i + 1).to_string());
        }

        let sql = format!("SELECT id, content_hash FROM documents WHERE id IN ({placeholders})");
        let params: Vec<libsql::Value> = ids
            .iter()
            .map(|id| libsql::Value::from(id.clone()))
            .collect();

        let mut rows = conn.query(&sql, libsql::params_from_iter(params)).await?;
        let mut hashes = HashMap::new();
        while let Some(row) = rows.next().await? {
            hashes.insert(row.get::<String>(0)?, row.get::<String>(1)?);
        }
        Ok(hashes)
    }

    pub async fn query_semantic(
        conn: &Connection,
        embedding: &[f32],
        limit: u32,
        filter: &IndexFilter,
    ) -> Result<Vec<Candidate>> {
        let embedding_json = serde_json::to_string(embedding)?;
        // Fixed params: ?1 = embedding, ?2 = limit; filter params start at ?3
        let (filter_sql, filter_values) = build_filter(filter, 3);

        let sql = format!(
            r#"
            SELECT {CANDIDATE_COLUMNS},
                   vector_distance_cos(embedding, vector32(?1)) AS distance
            FROM documents
            WHERE embedding IS NOT NULL{filter_sql}
            ORDER BY distance ASC
            LIMIT ?2
            "#
        );

        let mut values: Vec<libsql::Value> = vec![
            libsql::Value::from(embedding_json),
            libsql::Value::from(limit as i64),
        ];
        values.extend(filter_values);

        let mut rows = conn.query(&sql, libsql::params_from_iter(values)).await?;
        let mut candidates = Vec::new();
        while let Some(row) = rows.next().await? {
            let distance: f64 = row.get(8)?;
            // Cosine distance is in [0, 2]; map to a [0, 1] similarity.
            let score = ((2.0 - distance) / 2.0).clamp(0.0, 1.0) as f32;
            candidates.push(Self::row_to_candidate(&row, score)?);
        }
        Ok(candidates)
    }

    pub async fn query_keyword(
        conn: &Connection,
        terms: &[String],
        limit: u32,
        filter: &IndexFilter,
    ) -> Result<Vec<Candidate>> {
        let terms: Vec<&String> = terms.iter().filter(|t| !t.is_empty()).collect();
        if terms.is_empty() {
            return Ok(Vec::new());
        }

        // Fixed params: ?1 = limit; term params start at ?2. LIKE wildcards
        // inside a term (snake_case identifiers in particular) are escaped
        // so they match literally.
        let mut clauses = Vec::with_capacity(terms.len());
        let mut values: Vec<libsql::Value> = vec![libsql::Value::from(limit as i64)];
        for (i, term) in terms.iter().enumerate() {
            clauses.push(format!("text LIKE ?{} ESCAPE '\\'", i + 2));
            values.push(libsql::Value::from(format!("%{}%", escape_like(term))));
        }
        let (filter_sql, filter_values) = build_filter(filter, terms.len() + 2);
        values.extend(filter_values);

        let sql = format!(
            r#"
            SELECT {CANDIDATE_COLUMNS}
            FROM documents
            WHERE ({}){filter_sql}
            ORDER BY updated_at DESC
            LIMIT ?1
            "#,
            clauses.join(" OR ")
        );

        let mut rows = conn.query(&sql, libsql::params_from_iter(values)).await?;
        let mut candidates = Vec::new();
        while let Some(row) = rows.next().await? {
            candidates.push(Self::row_to_candidate(&row, 0.0)?);
        }
        Ok(candidates)
    }

    pub async fn stats(conn: &Connection) -> Result<IndexStats> {
        let mut rows = conn.query("SELECT COUNT(*) FROM documents", ()).await?;
        let total = match rows.next().await? {
            Some(row) => row.get::<i64>(0)? as u64,
            None => 0,
        };
        Ok(IndexStats {
            total_documents: total,
        })
    }

    fn row_to_candidate(row: &libsql::Row, semantic_score: f32) -> Result<Candidate> {
        let id: String = row.get(0)?;
        // Malformed access metadata maps to None so the permission filter
        // can fail closed instead of the whole query failing.
        let access = match serde_json::from_str(&row.get::<String>(4)?) {
            Ok(spec) => Some(spec),
            Err(e) => {
                tracing::warn!(document_id = %id, error = %e, "Unparseable access metadata");
                None
            }
        };

        Ok(Candidate {
            id,
            source: row.get::<String>(1)?.parse().map_err(|e: String| {
                crate::error::SiftError::Internal(format!("corrupt source column: {e}"))
            })?,
            text: row.get(2)?,
            project_key: row.get(3)?,
            access,
            source_metadata: serde_json::from_str(&row.get::<String>(5)?).unwrap_or_default(),
            created_at: DateTime::parse_from_rfc3339(&row.get::<String>(6)?)
                .map(|dt| dt.with_timezone(&Utc))
                .unwrap_or_else(|_| Utc::now()),
            updated_at: DateTime::parse_from_rfc3339(&row.get::<String>(7)?)
                .map(|dt| dt.with_timezone(&Utc))
                .unwrap_or_else(|_| Utc::now()),
            semantic_score,
        })
    }
}
