use serde::Deserialize;
use std::env;
use std::str::FromStr;

use crate::models::Source;

fn parse_env_or<T: std::str::FromStr>(var: &str, default: T) -> T
where
    T::Err: std::fmt::Display,
{
    match env::var(var) {
        Ok(val) => match val.parse() {
            Ok(parsed) => parsed,
            Err(e) => {
                tracing::warn!("Invalid value '{}' for {}: {}. Using default.", val, var, e);
                default
            }
        },
        Err(_) => default,
    }
}

/// Parse the `SIFT_SOURCES` env var.
/// Format: comma-separated `source=base_url` pairs, e.g.
/// `chat=https://chat.internal/api,issue=https://tracker.internal/api`.
/// Each source may carry a bearer token via `SIFT_SOURCE_TOKEN_<SOURCE>`
/// (source name uppercased, e.g. `SIFT_SOURCE_TOKEN_CODE_REVIEW`).
fn parse_sources() -> Vec<SourceEndpoint> {
    match env::var("SIFT_SOURCES") {
        Ok(val) if !val.is_empty() => val
            .split(',')
            .filter_map(|pair| {
                let mut parts = pair.splitn(2, '=');
                let name = parts.next()?.trim();
                let base_url = parts.next()?.trim();
                if name.is_empty() || base_url.is_empty() {
                    tracing::warn!("Invalid source pair '{}' in SIFT_SOURCES, skipping", pair);
                    return None;
                }
                let source = match Source::from_str(name) {
                    Ok(s) => s,
                    Err(_) => {
                        tracing::warn!("Unknown source '{}' in SIFT_SOURCES, skipping", name);
                        return None;
                    }
                };
                let token_var = format!("SIFT_SOURCE_TOKEN_{}", name.to_uppercase());
                Some(SourceEndpoint {
                    source,
                    base_url: base_url.to_string(),
                    token: env::var(token_var).ok(),
                })
            })
            .collect(),
        _ => Vec::new(),
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub embeddings: EmbeddingsConfig,
    pub ingestion: IngestionConfig,
    pub search: SearchConfig,
    pub conversation: ConversationConfig,
    pub sources: Vec<SourceEndpoint>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub api_keys: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub auth_token: Option<String>,
    pub local_path: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EmbeddingsConfig {
    pub model: String,
    pub dimensions: usize,
    pub batch_size: usize,
    pub api_key: Option<String>,
    pub base_url: String,
    pub timeout_secs: u64,
    pub max_retries: u32,
    pub query_cache_size: usize,
}

/// One configured upstream content source.
#[derive(Debug, Clone, Deserialize)]
pub struct SourceEndpoint {
    pub source: Source,
    pub base_url: String,
    pub token: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct IngestionConfig {
    /// Items fetched per connector page.
    pub batch_size: u32,
    /// Fixed delay between batches of the same source.
    pub inter_batch_delay_ms: u64,
    /// Fixed delay between distinct sources in a full run.
    pub inter_source_delay_ms: u64,
    /// Interval between background ingestion cycles.
    pub interval_secs: u64,
    /// Window used for a source that has never been ingested.
    pub initial_backfill_days: i64,
    /// Bodies longer than this are split into per-chunk documents.
    pub max_item_chars: usize,
    /// A source whose last sync is older than this is reported stale.
    pub staleness_threshold_secs: i64,
    /// Connector fetch retries before a source run is marked failed.
    pub fetch_max_retries: u32,
}

impl Default for IngestionConfig {
    fn default() -> Self {
        Self {
            batch_size: 100,
            inter_batch_delay_ms: 500,
            inter_source_delay_ms: 2000,
            interval_secs: 900,
            initial_backfill_days: 30,
            max_item_chars: 8000,
            staleness_threshold_secs: 86400,
            fetch_max_retries: 3,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct SearchConfig {
    /// Weight of the vector-similarity score in the hybrid fusion.
    pub semantic_weight: f32,
    /// Weight of the term-overlap score in the hybrid fusion.
    pub lexical_weight: f32,
    /// Candidates fetched per retrieval path = top_k * overfetch_factor.
    pub overfetch_factor: u32,
    /// Overfetch multiplier for the single widened retry.
    pub widen_factor: u32,
    pub default_top_k: u32,
    pub max_top_k: u32,
    /// Latency budget covering retrieval, filtering, and ranking.
    pub timeout_ms: u64,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            semantic_weight: 0.7,
            lexical_weight: 0.3,
            overfetch_factor: 4,
            widen_factor: 4,
            default_top_k: 10,
            max_top_k: 50,
            timeout_ms: 10_000,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ConversationConfig {
    pub ttl_secs: i64,
    pub purge_interval_secs: u64,
}

impl Default for ConversationConfig {
    fn default() -> Self {
        Self {
            ttl_secs: 3600,
            purge_interval_secs: 600,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server: ServerConfig {
                host: env::var("SIFT_HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
                port: parse_env_or("SIFT_PORT", 3000),
                api_keys: env::var("SIFT_API_KEYS")
                    .map(|keys| keys.split(',').map(|s| s.trim().to_string()).collect())
                    .unwrap_or_default(),
            },
            database: DatabaseConfig {
                url: env::var("DATABASE_URL").unwrap_or_else(|_| "file:sift.db".to_string()),
                auth_token: env::var("DATABASE_AUTH_TOKEN").ok(),
                local_path: env::var("DATABASE_LOCAL_PATH").ok(),
            },
            embeddings: EmbeddingsConfig {
                model: env::var("EMBEDDING_MODEL")
                    .unwrap_or_else(|_| "text-embedding-3-small".to_string()),
                dimensions: parse_env_or("EMBEDDING_DIMENSIONS", 384),
                batch_size: parse_env_or("EMBEDDING_BATCH_SIZE", 64),
                api_key: env::var("EMBEDDING_API_KEY").ok(),
                base_url: env::var("EMBEDDING_BASE_URL")
                    .unwrap_or_else(|_| "https://api.openai.com/v1".to_string()),
                timeout_secs: parse_env_or("EMBEDDING_TIMEOUT", 30),
                max_retries: parse_env_or("EMBEDDING_MAX_RETRIES", 3),
                query_cache_size: parse_env_or("EMBEDDING_QUERY_CACHE_SIZE", 1000),
            },
            ingestion: IngestionConfig {
                batch_size: parse_env_or("INGEST_BATCH_SIZE", 100),
                inter_batch_delay_ms: parse_env_or("INGEST_BATCH_DELAY_MS", 500),
                inter_source_delay_ms: parse_env_or("INGEST_SOURCE_DELAY_MS", 2000),
                interval_secs: parse_env_or("INGEST_INTERVAL_SECS", 900),
                initial_backfill_days: parse_env_or("INGEST_BACKFILL_DAYS", 30),
                max_item_chars: parse_env_or("INGEST_MAX_ITEM_CHARS", 8000),
                staleness_threshold_secs: parse_env_or("INGEST_STALENESS_SECS", 86400),
                fetch_max_retries: parse_env_or("INGEST_FETCH_MAX_RETRIES", 3),
            },
            search: SearchConfig {
                semantic_weight: parse_env_or("SEARCH_SEMANTIC_WEIGHT", 0.7),
                lexical_weight: parse_env_or("SEARCH_LEXICAL_WEIGHT", 0.3),
                overfetch_factor: parse_env_or("SEARCH_OVERFETCH_FACTOR", 4),
                widen_factor: parse_env_or("SEARCH_WIDEN_FACTOR", 4),
                default_top_k: parse_env_or("SEARCH_DEFAULT_TOP_K", 10),
                max_top_k: parse_env_or("SEARCH_MAX_TOP_K", 50),
                timeout_ms: parse_env_or("SEARCH_TIMEOUT_MS", 10_000),
            },
            conversation: ConversationConfig {
                ttl_secs: parse_env_or("CONVERSATION_TTL_SECS", 3600),
                purge_interval_secs: parse_env_or("CONVERSATION_PURGE_INTERVAL_SECS", 600),
            },
            sources: parse_sources(),
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        Self::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    #[serial]
    fn test_search_config_defaults() {
        env::remove_var("SEARCH_SEMANTIC_WEIGHT");
        env::remove_var("SEARCH_LEXICAL_WEIGHT");

        let config = Config::default();
        assert_eq!(config.search.semantic_weight, 0.7);
        assert_eq!(config.search.lexical_weight, 0.3);
        assert_eq!(config.search.overfetch_factor, 4);
        assert_eq!(config.search.default_top_k, 10);
    }

    #[test]
    #[serial]
    fn test_search_weights_from_env() {
        env::set_var("SEARCH_SEMANTIC_WEIGHT", "0.6");
        env::set_var("SEARCH_LEXICAL_WEIGHT", "0.4");

        let config = Config::default();
        assert_eq!(config.search.semantic_weight, 0.6);
        assert_eq!(config.search.lexical_weight, 0.4);

        env::remove_var("SEARCH_SEMANTIC_WEIGHT");
        env::remove_var("SEARCH_LEXICAL_WEIGHT");
    }

    #[test]
    #[serial]
    fn test_ingestion_config_defaults() {
        env::remove_var("INGEST_BATCH_SIZE");
        env::remove_var("INGEST_STALENESS_SECS");

        let config = Config::default();
        assert_eq!(config.ingestion.batch_size, 100);
        assert_eq!(config.ingestion.staleness_threshold_secs, 86400);
        assert_eq!(config.ingestion.interval_secs, 900);
    }

    #[test]
    #[serial]
    fn test_conversation_ttl_from_env() {
        env::set_var("CONVERSATION_TTL_SECS", "120");
        let config = Config::default();
        assert_eq!(config.conversation.ttl_secs, 120);
        env::remove_var("CONVERSATION_TTL_SECS");
    }

    #[test]
    #[serial]
    fn test_parse_sources() {
        env::set_var(
            "SIFT_SOURCES",
            "chat=https://chat.internal/api,transcript=https://meet.internal/api",
        );
        env::set_var("SIFT_SOURCE_TOKEN_CHAT", "secret-token");

        let sources = parse_sources();
        assert_eq!(sources.len(), 2);
        assert_eq!(sources[0].source, Source::Chat);
        assert_eq!(sources[0].base_url, "https://chat.internal/api");
        assert_eq!(sources[0].token.as_deref(), Some("secret-token"));
        assert_eq!(sources[1].source, Source::Transcript);
        assert!(sources[1].token.is_none());

        env::remove_var("SIFT_SOURCES");
        env::remove_var("SIFT_SOURCE_TOKEN_CHAT");
    }

    #[test]
    #[serial]
    fn test_parse_sources_skips_unknown() {
        env::set_var("SIFT_SOURCES", "wiki=https://wiki.internal,chat=https://c");
        let sources = parse_sources();
        assert_eq!(sources.len(), 1);
        assert_eq!(sources[0].source, Source::Chat);
        env::remove_var("SIFT_SOURCES");
    }

    #[test]
    #[serial]
    fn test_parse_env_or_invalid_falls_back() {
        env::set_var("__TEST_SIFT_PORT", "not-a-number");
        let result: u16 = parse_env_or("__TEST_SIFT_PORT", 3000);
        assert_eq!(result, 3000);
        env::remove_var("__TEST_SIFT_PORT");
    }
}
