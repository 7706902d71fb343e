mod http;

pub use http::HttpSourceConnector;

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::config::SourceEndpoint;
use crate::error::Result;
use crate::models::Source;

/// One item as delivered by an upstream source, carrying enough to derive a
/// stable document id and an access spec.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawItem {
    /// Source-native identifier (message ts, issue key, meeting id, ...).
    pub native_id: String,
    pub title: Option<String>,
    pub url: Option<String>,
    pub author: Option<String>,
    pub body: String,
    pub project_key: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Identities allowed to see restricted content (attendees plus
    /// explicitly shared). Absent for organization-wide sources.
    #[serde(default)]
    pub participants: Option<Vec<String>>,
    #[serde(default)]
    pub is_public: Option<bool>,
}

/// Contract implemented once per source and selected by explicit source
/// identifier. `fetch_since`/`fetch_range` return at most `batch_size`
/// items ordered by `updated_at` ascending; a short page signals the end of
/// the window.
#[async_trait]
pub trait SourceConnector: Send + Sync {
    fn source(&self) -> Source;

    async fn fetch_since(&self, since: DateTime<Utc>, batch_size: u32) -> Result<Vec<RawItem>>;

    async fn fetch_range(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        batch_size: u32,
    ) -> Result<Vec<RawItem>>;
}

/// Connectors keyed by source. Registration is explicit configuration,
/// never runtime attribute probing.
#[derive(Clone, Default)]
pub struct ConnectorRegistry {
    connectors: HashMap<Source, Arc<dyn SourceConnector>>,
}

impl ConnectorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a registry of HTTP connectors from configured endpoints.
    pub fn from_endpoints(endpoints: &[SourceEndpoint], max_retries: u32) -> Result<Self> {
        let mut registry = Self::new();
        for endpoint in endpoints {
            let connector = HttpSourceConnector::new(endpoint.clone(), max_retries)?;
            registry.register(Arc::new(connector));
        }
        Ok(registry)
    }

    pub fn register(&mut self, connector: Arc<dyn SourceConnector>) {
        self.connectors.insert(connector.source(), connector);
    }

    pub fn get(&self, source: Source) -> Option<Arc<dyn SourceConnector>> {
        self.connectors.get(&source).cloned()
    }

    /// Registered sources in a stable order.
    pub fn sources(&self) -> Vec<Source> {
        let mut sources: Vec<Source> = self.connectors.keys().copied().collect();
        sources.sort_by_key(|s| s.as_str());
        sources
    }

    pub fn is_empty(&self) -> bool {
        self.connectors.is_empty()
    }
}
