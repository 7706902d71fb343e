use std::sync::Arc;

use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use sift::api::{create_router, AppState};
use sift::config::Config;
use sift::connectors::ConnectorRegistry;
use sift::db::{Database, LibSqlBackend, StorageBackend};
use sift::embeddings::EmbeddingProvider;
use sift::ingest::IngestionPipeline;

#[derive(Parser)]
#[command(name = "sift")]
#[command(about = "Permission-aware hybrid search over organizational knowledge")]
struct Args {
    /// Skip the periodic background ingestion loop (serve queries only)
    #[arg(long)]
    no_background_ingest: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "sift=info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env();

    if config.server.api_keys.is_empty() {
        tracing::warn!(
            "SIFT_API_KEYS is not set; protected endpoints are locked. Set SIFT_API_KEYS to enable access."
        );
    }

    tracing::info!("Initializing database...");
    let raw_db = Database::new(&config.database, config.embeddings.dimensions).await?;
    let backend: Arc<dyn StorageBackend> = Arc::new(LibSqlBackend::new(raw_db));

    tracing::info!("Initializing embedding client: {}...", config.embeddings.model);
    let embeddings = EmbeddingProvider::new(&config.embeddings)?;

    let registry = ConnectorRegistry::from_endpoints(
        &config.sources,
        config.ingestion.fetch_max_retries,
    )?;
    if registry.is_empty() {
        tracing::warn!("No sources configured; set SIFT_SOURCES to enable ingestion");
    } else {
        tracing::info!(sources = ?registry.sources(), "Registered source connectors");
    }

    let pipeline = Arc::new(IngestionPipeline::new(
        backend.clone(),
        embeddings.clone(),
        registry,
        config.ingestion.clone(),
    ));

    let state = AppState::new(config.clone(), backend, embeddings, pipeline);

    let cancel_token = CancellationToken::new();

    if !args.no_background_ingest && !state.pipeline.sources().is_empty() {
        tracing::info!(
            "Starting background ingestion... (interval={}s)",
            state.config.ingestion.interval_secs
        );
        let pipeline = state.pipeline.clone();
        let interval_secs = state.config.ingestion.interval_secs;
        let token = cancel_token.child_token();
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = token.cancelled() => {
                        tracing::info!("Background ingestion shutting down...");
                        break;
                    }
                    _ = tokio::time::sleep(tokio::time::Duration::from_secs(interval_secs)) => {
                        for run in pipeline.ingest_all().await {
                            if let Some(err) = &run.run_error {
                                tracing::error!(source = %run.source, error = %err, "Background ingestion error");
                            }
                        }
                    }
                }
            }
        });
    }

    tracing::info!(
        "Starting conversation purge... (interval={}s, ttl={}s)",
        state.config.conversation.purge_interval_secs,
        state.config.conversation.ttl_secs
    );
    let conversations = state.conversations.clone();
    let purge_interval = state.config.conversation.purge_interval_secs;
    let token = cancel_token.child_token();
    tokio::spawn(async move {
        loop {
            tokio::select! {
                _ = token.cancelled() => {
                    tracing::info!("Conversation purge shutting down...");
                    break;
                }
                _ = tokio::time::sleep(tokio::time::Duration::from_secs(purge_interval)) => {
                    match conversations.purge_expired().await {
                        Ok(0) => {}
                        Ok(purged) => tracing::debug!(purged, "Purged expired conversation turns"),
                        Err(e) => tracing::error!("Conversation purge error: {}", e),
                    }
                }
            }
        }
    });

    let app = create_router(state);

    let addr = format!("{}:{}", config.server.host, config.server.port);
    tracing::info!("Sift starting on http://{}", addr);
    tracing::info!("  Health check: http://{}/api/v1/health", addr);
    tracing::info!("  API docs:     http://{}/api/v1/docs", addr);
    tracing::info!("  OpenAPI spec: http://{}/api/v1/openapi.json", addr);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(cancel_token))
        .await?;

    Ok(())
}

async fn shutdown_signal(cancel_token: CancellationToken) {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received, cancelling background tasks...");
    cancel_token.cancel();
}
