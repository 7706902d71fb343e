use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Client;

use crate::config::SourceEndpoint;
use crate::error::{Result, SiftError};
use crate::models::Source;

use super::{RawItem, SourceConnector};

/// HTTP connector for a source adapter exposing the standard items feed:
/// `GET {base_url}/items?since=...&limit=...` and
/// `GET {base_url}/items?start=...&end=...&limit=...`, both returning a JSON
/// array of items ordered by `updated_at` ascending.
pub struct HttpSourceConnector {
    source: Source,
    client: Client,
    base_url: String,
    token: Option<String>,
    max_retries: u32,
}

impl HttpSourceConnector {
    pub fn new(endpoint: SourceEndpoint, max_retries: u32) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| SiftError::SourceUnavailable {
                source: endpoint.source,
                message: format!("Failed to create HTTP client: {e}"),
            })?;

        Ok(Self {
            source: endpoint.source,
            client,
            base_url: endpoint.base_url.trim_end_matches('/').to_string(),
            token: endpoint.token,
            max_retries,
        })
    }

    fn unavailable(&self, message: impl Into<String>) -> SiftError {
        SiftError::SourceUnavailable {
            source: self.source,
            message: message.into(),
        }
    }

    /// Issue the feed request with bounded retries on transient failures.
    /// Auth errors are not transient and are surfaced immediately.
    async fn fetch(&self, query: &[(&str, String)]) -> Result<Vec<RawItem>> {
        let url = format!("{}/items", self.base_url);

        let mut last_error = None;
        for attempt in 0..=self.max_retries {
            if attempt > 0 {
                let delay = Duration::from_millis(200 * 2_u64.pow(attempt - 1));
                tokio::time::sleep(delay).await;
            }

            let mut request = self.client.get(&url).query(query);
            if let Some(ref token) = self.token {
                request = request.bearer_auth(token);
            }

            match request.send().await {
                Ok(resp) => {
                    let status = resp.status();

                    if status.is_success() {
                        return resp.json::<Vec<RawItem>>().await.map_err(|e| {
                            self.unavailable(format!("Failed to parse items feed: {e}"))
                        });
                    }

                    if status == reqwest::StatusCode::UNAUTHORIZED
                        || status == reqwest::StatusCode::FORBIDDEN
                    {
                        let body = resp.text().await.unwrap_or_default();
                        return Err(SiftError::ApiAuth(format!(
                            "Source {} rejected credentials: {body}",
                            self.source
                        )));
                    }

                    if status == reqwest::StatusCode::TOO_MANY_REQUESTS
                        || status.is_server_error()
                    {
                        last_error = Some(self.unavailable(format!("Upstream error {status}")));
                        continue;
                    }

                    let body = resp.text().await.unwrap_or_default();
                    return Err(self.unavailable(format!("Unexpected status {status}: {body}")));
                }
                Err(e) => {
                    last_error = Some(self.unavailable(format!("Request failed: {e}")));
                    continue;
                }
            }
        }

        Err(last_error.unwrap_or_else(|| self.unavailable("Unknown error")))
    }
}

#[async_trait]
impl SourceConnector for HttpSourceConnector {
    fn source(&self) -> Source {
        self.source
    }

    async fn fetch_since(&self, since: DateTime<Utc>, batch_size: u32) -> Result<Vec<RawItem>> {
        self.fetch(&[
            ("since", since.to_rfc3339()),
            ("limit", batch_size.to_string()),
        ])
        .await
    }

    async fn fetch_range(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        batch_size: u32,
    ) -> Result<Vec<RawItem>> {
        self.fetch(&[
            ("start", start.to_rfc3339()),
            ("end", end.to_rfc3339()),
            ("limit", batch_size.to_string()),
        ])
        .await
    }
}
