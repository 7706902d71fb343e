use std::net::SocketAddr;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde_json::json;
use tempfile::TempDir;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, Respond, ResponseTemplate};

use sift::api::{create_router, AppState};
use sift::config::{
    Config, ConversationConfig, DatabaseConfig, EmbeddingsConfig, IngestionConfig, SearchConfig,
    ServerConfig, SourceEndpoint,
};
use sift::connectors::ConnectorRegistry;
use sift::db::{Database, LibSqlBackend, StorageBackend};
use sift::embeddings::EmbeddingProvider;
use sift::ingest::IngestionPipeline;
use sift::models::{content_hash, document_id, AccessSpec, Document, Metadata, Source};

pub const DIMS: usize = 4;
pub const API_KEY: &str = "test-key";

/// Deterministic pseudo-embedding so semantic similarity is stable across
/// test runs: identical texts map to identical unit vectors.
pub fn hash_embedding(text: &str) -> Vec<f32> {
    let mut h: u32 = 2166136261;
    for b in text.bytes() {
        h = (h ^ b as u32).wrapping_mul(16777619);
    }
    let mut v: Vec<f32> = (0..DIMS)
        .map(|i| {
            let hi = h.wrapping_add(i as u32).wrapping_mul(2654435761);
            ((hi % 1000) as f32 / 1000.0) - 0.5
        })
        .collect();
    let norm = v.iter().map(|x| x * x).sum::<f32>().sqrt().max(1e-6);
    for x in &mut v {
        *x /= norm;
    }
    v
}

/// A 4-dim unit vector orthogonal to `v`.
pub fn orthogonal(v: &[f32]) -> Vec<f32> {
    vec![-v[1], v[0], -v[3], v[2]]
}

/// Mock embeddings endpoint: one hash embedding per input string.
pub struct EmbeddingResponder;

impl Respond for EmbeddingResponder {
    fn respond(&self, request: &wiremock::Request) -> ResponseTemplate {
        let body: serde_json::Value =
            serde_json::from_slice(&request.body).expect("embedding request body");
        let data: Vec<serde_json::Value> = body["input"]
            .as_array()
            .expect("input array")
            .iter()
            .map(|t| json!({"embedding": hash_embedding(t.as_str().expect("input string"))}))
            .collect();
        ResponseTemplate::new(200).set_body_json(json!({ "data": data }))
    }
}

/// Same embeddings as [`EmbeddingResponder`], served after a fixed delay.
pub struct SlowEmbeddingResponder(pub std::time::Duration);

impl Respond for SlowEmbeddingResponder {
    fn respond(&self, request: &wiremock::Request) -> ResponseTemplate {
        EmbeddingResponder.respond(request).set_delay(self.0)
    }
}

pub async fn mount_embeddings(server: &MockServer) {
    Mock::given(method("POST"))
        .and(path("/embeddings"))
        .respond_with(EmbeddingResponder)
        .mount(server)
        .await;
}

pub fn test_config(db_url: &str, embed_base: &str, sources: Vec<SourceEndpoint>) -> Config {
    Config {
        server: ServerConfig {
            host: "127.0.0.1".to_string(),
            port: 0,
            api_keys: vec![API_KEY.to_string()],
        },
        database: DatabaseConfig {
            url: db_url.to_string(),
            auth_token: None,
            local_path: None,
        },
        embeddings: EmbeddingsConfig {
            model: "text-embedding-3-small".to_string(),
            dimensions: DIMS,
            batch_size: 8,
            api_key: Some("embed-key".to_string()),
            base_url: embed_base.to_string(),
            timeout_secs: 5,
            max_retries: 0,
            query_cache_size: 16,
        },
        ingestion: IngestionConfig {
            batch_size: 2,
            inter_batch_delay_ms: 0,
            inter_source_delay_ms: 0,
            interval_secs: 900,
            initial_backfill_days: 30,
            max_item_chars: 8000,
            staleness_threshold_secs: 86400,
            fetch_max_retries: 0,
        },
        search: SearchConfig::default(),
        conversation: ConversationConfig {
            ttl_secs: 3600,
            purge_interval_secs: 600,
        },
        sources,
    }
}

pub struct TestApp {
    pub addr: SocketAddr,
    pub backend: Arc<dyn StorageBackend>,
    pub db: Database,
    pub pipeline: Arc<IngestionPipeline>,
    _temp_dir: TempDir,
}

impl TestApp {
    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }
}

/// Stand up the full HTTP app over a file-backed database with the given
/// source endpoints, serving on an ephemeral port.
pub async fn spawn_app(embed_server: &MockServer, sources: Vec<SourceEndpoint>) -> TestApp {
    spawn_app_with(embed_server, sources, |_| {}).await
}

/// [`spawn_app`] with a hook to adjust the config before wiring.
pub async fn spawn_app_with(
    embed_server: &MockServer,
    sources: Vec<SourceEndpoint>,
    tweak: impl FnOnce(&mut Config),
) -> TestApp {
    let temp_dir = TempDir::new().expect("temp dir");
    let db_path = temp_dir.path().join("sift_test.db");
    let db_url = format!("file:{}", db_path.to_str().expect("utf-8 path"));

    let mut config = test_config(&db_url, &embed_server.uri(), sources);
    tweak(&mut config);

    let db = Database::new(&config.database, DIMS).await.expect("database");
    let backend: Arc<dyn StorageBackend> = Arc::new(LibSqlBackend::new(db.clone()));
    let embeddings = EmbeddingProvider::new(&config.embeddings).expect("embeddings");
    let registry = ConnectorRegistry::from_endpoints(
        &config.sources,
        config.ingestion.fetch_max_retries,
    )
    .expect("registry");
    let pipeline = Arc::new(IngestionPipeline::new(
        backend.clone(),
        embeddings.clone(),
        registry,
        config.ingestion.clone(),
    ));

    let state = AppState::new(config, backend.clone(), embeddings, pipeline.clone());
    let app = create_router(state);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind");
    let addr = listener.local_addr().expect("local addr");
    tokio::spawn(async move {
        axum::serve(listener, app).await.expect("server");
    });

    TestApp {
        addr,
        backend,
        db,
        pipeline,
        _temp_dir: temp_dir,
    }
}

/// Build a document the way the normalizer would, for direct index seeding.
pub fn seed_document(
    source: Source,
    native_id: &str,
    text: &str,
    access: AccessSpec,
    updated_at: DateTime<Utc>,
) -> Document {
    let mut metadata = Metadata::new();
    metadata.insert("native_id".to_string(), json!(native_id));
    metadata.insert("title".to_string(), json!(format!("{native_id} title")));
    Document {
        id: document_id(source, native_id, 0),
        source,
        content_hash: content_hash(text),
        text: text.to_string(),
        project_key: None,
        access,
        source_metadata: metadata,
        created_at: updated_at,
        updated_at,
    }
}

/// One raw source item as the HTTP connector expects it on the wire.
pub fn raw_item_json(
    native_id: &str,
    body: &str,
    updated_at: DateTime<Utc>,
    participants: Option<Vec<&str>>,
) -> serde_json::Value {
    json!({
        "native_id": native_id,
        "title": format!("{native_id} title"),
        "url": format!("https://example.com/{native_id}"),
        "author": "alice",
        "body": body,
        "project_key": "PROJ",
        "created_at": updated_at,
        "updated_at": updated_at,
        "participants": participants,
        "is_public": null
    })
}

pub fn restricted(identities: &[&str]) -> AccessSpec {
    AccessSpec::Restricted {
        allowed_identities: identities.iter().map(|s| s.to_string()).collect(),
        is_public: false,
    }
}
