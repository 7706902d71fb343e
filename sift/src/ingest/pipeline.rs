use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use nanoid::nanoid;
use serde::Serialize;
use tokio::sync::Mutex;

use crate::config::IngestionConfig;
use crate::connectors::ConnectorRegistry;
use crate::db::StorageBackend;
use crate::embeddings::EmbeddingProvider;
use crate::error::{Result, SiftError};
use crate::models::{Source, SourceStatus};

use super::normalize;

/// What to ingest: everything since the stored watermark, or an explicit
/// backfill range.
#[derive(Debug, Clone, Copy)]
pub enum IngestWindow {
    Incremental,
    Range {
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    },
}

/// One item that failed during a run. The run itself continues; the error
/// is surfaced so the operator can inspect and re-trigger.
#[derive(Debug, Clone, Serialize, utoipa::ToSchema)]
pub struct IngestItemError {
    pub native_id: String,
    pub message: String,
}

/// Outcome of one source run. `run_error` is set when the run stopped
/// early; counts always reflect work actually completed.
#[derive(Debug, Clone, Serialize, utoipa::ToSchema)]
pub struct IngestResult {
    pub source: Source,
    pub batch_id: String,
    pub fetched: usize,
    pub embedded: usize,
    pub upserted: usize,
    pub skipped: usize,
    pub errors: Vec<IngestItemError>,
    pub run_error: Option<String>,
}

impl IngestResult {
    fn new(source: Source, batch_id: String) -> Self {
        Self {
            source,
            batch_id,
            fetched: 0,
            embedded: 0,
            upserted: 0,
            skipped: 0,
            errors: Vec::new(),
            run_error: None,
        }
    }
}

/// Pull-based ingestion: page through a connector window, normalize, embed,
/// upsert, and advance the per-source watermark after every durable batch.
///
/// Runs for the same source are serialized; an interrupted run resumes from
/// the last advanced watermark and idempotent upserts make the overlap
/// harmless.
pub struct IngestionPipeline {
    backend: Arc<dyn StorageBackend>,
    embeddings: EmbeddingProvider,
    registry: ConnectorRegistry,
    config: IngestionConfig,
    source_locks: std::sync::Mutex<HashMap<Source, Arc<Mutex<()>>>>,
}

impl IngestionPipeline {
    pub fn new(
        backend: Arc<dyn StorageBackend>,
        embeddings: EmbeddingProvider,
        registry: ConnectorRegistry,
        config: IngestionConfig,
    ) -> Self {
        Self {
            backend,
            embeddings,
            registry,
            config,
            source_locks: std::sync::Mutex::new(HashMap::new()),
        }
    }

    pub fn sources(&self) -> Vec<Source> {
        self.registry.sources()
    }

    /// Run ingestion for one source. Returns an error only when the run
    /// could not start at all (unknown source, first page unreachable);
    /// otherwise failures are reported inside the result.
    pub async fn ingest(&self, source: Source, window: IngestWindow) -> Result<IngestResult> {
        let connector = self.registry.get(source).ok_or_else(|| {
            SiftError::SourceUnavailable {
                source,
                message: "no connector registered for source".to_string(),
            }
        })?;

        let lock = self.lock_for(source);
        let _guard = lock.lock().await;

        let batch_id = nanoid!();
        let mut result = IngestResult::new(source, batch_id.clone());

        let (mut cursor, end) = match window {
            IngestWindow::Incremental => (self.incremental_cursor(source).await?, None),
            IngestWindow::Range { start, end } => (start, Some(end)),
        };

        tracing::info!(
            source = %source,
            batch_id = %batch_id,
            cursor = %cursor,
            "Starting ingestion run"
        );

        loop {
            let page = match end {
                Some(end) => {
                    connector
                        .fetch_range(cursor, end, self.config.batch_size)
                        .await
                }
                None => connector.fetch_since(cursor, self.config.batch_size).await,
            };

            let items = match page {
                Ok(items) => items,
                Err(err) if result.fetched == 0 => {
                    // Nothing was ingested at all: surface the source outage
                    // instead of reporting a successful empty run.
                    return Err(SiftError::SourceUnavailable {
                        source,
                        message: err.to_string(),
                    });
                }
                Err(err) => {
                    tracing::warn!(source = %source, error = %err, "Fetch failed mid-run");
                    result.run_error = Some(err.to_string());
                    break;
                }
            };

            if items.is_empty() {
                break;
            }
            result.fetched += items.len();
            let page_len = items.len();

            let batch_max = items
                .iter()
                .map(|item| item.updated_at)
                .max()
                .unwrap_or(cursor);

            if let Err(err) = self.process_page(source, &items, &mut result).await {
                // Embedding or index outage: stop without advancing the
                // watermark so the next run retries this page.
                tracing::warn!(source = %source, error = %err, "Batch processing failed");
                result.run_error = Some(err.to_string());
                break;
            }

            self.backend
                .advance_sync_state(source, batch_max, Some(&batch_id))
                .await?;

            if batch_max <= cursor {
                // Connector returned a full page without advancing in time;
                // bail out rather than refetch the same window forever.
                tracing::warn!(source = %source, cursor = %cursor, "Ingestion made no progress");
                break;
            }
            cursor = batch_max;

            if page_len < self.config.batch_size as usize {
                break;
            }
            tokio::time::sleep(Duration::from_millis(self.config.inter_batch_delay_ms)).await;
        }

        tracing::info!(
            source = %source,
            batch_id = %batch_id,
            fetched = result.fetched,
            upserted = result.upserted,
            skipped = result.skipped,
            item_errors = result.errors.len(),
            run_error = result.run_error.is_some(),
            "Ingestion run finished"
        );

        Ok(result)
    }

    /// Run every registered source in order. A failed source never stops the
    /// others; its failure is folded into that source's result.
    pub async fn ingest_all(&self) -> Vec<IngestResult> {
        let sources = self.registry.sources();
        let mut results = Vec::with_capacity(sources.len());

        for (i, source) in sources.iter().enumerate() {
            if i > 0 {
                tokio::time::sleep(Duration::from_millis(self.config.inter_source_delay_ms)).await;
            }
            match self.ingest(*source, IngestWindow::Incremental).await {
                Ok(result) => results.push(result),
                Err(err) => {
                    tracing::error!(source = %source, error = %err, "Source run failed");
                    let mut result = IngestResult::new(*source, String::new());
                    result.run_error = Some(err.to_string());
                    results.push(result);
                }
            }
        }

        results
    }

    /// Per-source operational view: last watermark and whether it is stale
    /// against the configured threshold.
    pub async fn status(&self) -> Result<Vec<SourceStatus>> {
        let states = self.backend.all_sync_states().await?;
        let by_source: HashMap<Source, DateTime<Utc>> = states
            .into_iter()
            .map(|s| (s.source, s.last_sync_at))
            .collect();

        let now = Utc::now();
        Ok(self
            .registry
            .sources()
            .into_iter()
            .map(|source| {
                SourceStatus::evaluate(
                    source,
                    by_source.get(&source).copied(),
                    now,
                    self.config.staleness_threshold_secs,
                )
            })
            .collect())
    }

    /// Normalize, dedupe against stored content hashes, embed, and upsert
    /// one fetched page. Per-item embedding failures are recorded and the
    /// rest of the page proceeds; an error return means the whole page must
    /// be retried on the next run.
    async fn process_page(
        &self,
        source: Source,
        items: &[crate::connectors::RawItem],
        result: &mut IngestResult,
    ) -> Result<()> {
        let mut docs = Vec::new();
        for item in items {
            docs.extend(normalize(source, item, self.config.max_item_chars));
        }
        if docs.is_empty() {
            return Ok(());
        }

        let ids: Vec<String> = docs.iter().map(|d| d.id.clone()).collect();
        let existing = self.backend.content_hashes(&ids).await?;

        let mut pending = Vec::new();
        for doc in docs {
            if existing.get(&doc.id) == Some(&doc.content_hash) {
                result.skipped += 1;
            } else {
                pending.push(doc);
            }
        }
        if pending.is_empty() {
            return Ok(());
        }

        let texts: Vec<String> = pending.iter().map(|d| d.text.clone()).collect();
        let embeddings = match self.embeddings.embed_passages(&texts).await {
            Ok(embeddings) => embeddings,
            Err(batch_err) => {
                // The batch call failed as a whole; retry item by item so a
                // single oversized document cannot sink the page.
                let mut per_item = Vec::with_capacity(pending.len());
                let mut any_ok = false;
                for doc in &pending {
                    match self.embeddings.embed_single(&doc.text).await {
                        Ok(embedding) => {
                            any_ok = true;
                            per_item.push(Some(embedding));
                        }
                        Err(err) => {
                            result.errors.push(IngestItemError {
                                native_id: doc.id.clone(),
                                message: err.to_string(),
                            });
                            per_item.push(None);
                        }
                    }
                }
                if !any_ok {
                    return Err(batch_err);
                }
                let mut kept_docs = Vec::new();
                let mut kept_embeddings = Vec::new();
                for (doc, embedding) in pending.into_iter().zip(per_item) {
                    if let Some(embedding) = embedding {
                        kept_docs.push(doc);
                        kept_embeddings.push(embedding);
                    }
                }
                pending = kept_docs;
                kept_embeddings
            }
        };
        result.embedded += embeddings.len();

        for (doc, embedding) in pending.iter().zip(embeddings.iter()) {
            match self.backend.upsert_document(doc, embedding).await {
                Ok(()) => result.upserted += 1,
                Err(err) => result.errors.push(IngestItemError {
                    native_id: doc.id.clone(),
                    message: err.to_string(),
                }),
            }
        }

        Ok(())
    }

    async fn incremental_cursor(&self, source: Source) -> Result<DateTime<Utc>> {
        match self.backend.get_sync_state(source).await? {
            Some(state) => Ok(state.last_sync_at),
            None => Ok(Utc::now() - chrono::Duration::days(self.config.initial_backfill_days)),
        }
    }

    fn lock_for(&self, source: Source) -> Arc<Mutex<()>> {
        let mut locks = self
            .source_locks
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        locks.entry(source).or_default().clone()
    }
}
