use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use super::Source;

/// Per-source ingestion watermark. One row per source, advanced
/// monotonically after each successful batch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncState {
    pub source: Source,
    /// Timestamp of the most recent successfully ingested item.
    pub last_sync_at: DateTime<Utc>,
    /// Label for range-based backfills, when one produced this watermark.
    pub batch_id: Option<String>,
    pub updated_at: DateTime<Utc>,
}

/// Operational view of one source, as returned by the status surface.
#[derive(Debug, Clone, Serialize, Deserialize, utoipa::ToSchema)]
pub struct SourceStatus {
    pub source: Source,
    pub last_sync_at: Option<DateTime<Utc>>,
    pub stale: bool,
}

impl SourceStatus {
    /// A source is stale when it has never been ingested or its watermark is
    /// older than the freshness threshold.
    pub fn evaluate(
        source: Source,
        last_sync_at: Option<DateTime<Utc>>,
        now: DateTime<Utc>,
        threshold_secs: i64,
    ) -> Self {
        let stale = match last_sync_at {
            Some(ts) => now - ts > Duration::seconds(threshold_secs),
            None => true,
        };
        Self {
            source,
            last_sync_at,
            stale,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fresh_source_is_not_stale() {
        let now = Utc::now();
        let status =
            SourceStatus::evaluate(Source::Chat, Some(now - Duration::hours(1)), now, 86400);
        assert!(!status.stale);
    }

    #[test]
    fn test_old_source_is_stale() {
        let now = Utc::now();
        let status =
            SourceStatus::evaluate(Source::Chat, Some(now - Duration::hours(25)), now, 86400);
        assert!(status.stale);
    }

    #[test]
    fn test_never_ingested_source_is_stale() {
        let status = SourceStatus::evaluate(Source::Issue, None, Utc::now(), 86400);
        assert!(status.stale);
        assert!(status.last_sync_at.is_none());
    }
}
