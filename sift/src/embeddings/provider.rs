use lru::LruCache;
use std::num::NonZeroUsize;
use std::sync::{Arc, Mutex};

use crate::config::EmbeddingsConfig;
use crate::error::{Result, SiftError};

use super::api::{ApiConfig, EmbeddingApiClient};

/// Embedding capability used by both ingestion and the query path.
///
/// Treated as a pure function with network latency: the same text always
/// maps to the same vector, which is what makes the query-side LRU cache
/// sound.
#[derive(Clone)]
pub struct EmbeddingProvider {
    client: EmbeddingApiClient,
    dimensions: usize,
    batch_size: usize,
    query_cache: Arc<Mutex<LruCache<String, Vec<f32>>>>,
}

impl EmbeddingProvider {
    pub fn new(config: &EmbeddingsConfig) -> Result<Self> {
        let client = EmbeddingApiClient::new(ApiConfig {
            base_url: config.base_url.clone(),
            api_key: config.api_key.clone(),
            model: config.model.clone(),
            timeout_secs: config.timeout_secs,
            max_retries: config.max_retries,
        })?;

        let cache_size = NonZeroUsize::new(config.query_cache_size.max(1))
            .expect("cache size clamped to at least 1");

        Ok(Self {
            client,
            dimensions: config.dimensions,
            batch_size: config.batch_size.max(1),
            query_cache: Arc::new(Mutex::new(LruCache::new(cache_size))),
        })
    }

    pub async fn embed_single(&self, text: &str) -> Result<Vec<f32>> {
        let embeddings = self.client.embed(&[text]).await?;
        embeddings
            .into_iter()
            .next()
            .ok_or_else(|| SiftError::Embedding("No embedding generated".to_string()))
    }

    pub async fn embed_query(&self, query: &str) -> Result<Vec<f32>> {
        if let Ok(mut cache) = self.query_cache.lock() {
            if let Some(cached) = cache.get(query) {
                return Ok(cached.clone());
            }
        }

        let embedding = self.embed_single(query).await?;

        if let Ok(mut cache) = self.query_cache.lock() {
            cache.put(query.to_string(), embedding.clone());
        }

        Ok(embedding)
    }

    /// Embed document bodies in bounded batches, yielding between batches so
    /// the ingestion task never starves the query path.
    pub async fn embed_passages(&self, passages: &[String]) -> Result<Vec<Vec<f32>>> {
        if passages.is_empty() {
            return Ok(Vec::new());
        }

        let mut all_embeddings = Vec::with_capacity(passages.len());
        for batch in passages.chunks(self.batch_size) {
            let refs: Vec<&str> = batch.iter().map(|p| p.as_str()).collect();
            let mut embedded = self.client.embed(&refs).await?;
            all_embeddings.append(&mut embedded);
            tokio::task::yield_now().await;
        }

        Ok(all_embeddings)
    }

    pub fn dimensions(&self) -> usize {
        self.dimensions
    }
}
