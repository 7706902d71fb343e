use std::sync::Arc;

use crate::config::Config;
use crate::conversation::ConversationService;
use crate::db::StorageBackend;
use crate::embeddings::EmbeddingProvider;
use crate::ingest::IngestionPipeline;
use crate::services::SearchService;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub backend: Arc<dyn StorageBackend>,
    pub embeddings: EmbeddingProvider,
    pub search: SearchService,
    pub conversations: ConversationService,
    pub pipeline: Arc<IngestionPipeline>,
}

impl AppState {
    pub fn new(
        config: Config,
        backend: Arc<dyn StorageBackend>,
        embeddings: EmbeddingProvider,
        pipeline: Arc<IngestionPipeline>,
    ) -> Self {
        let config = Arc::new(config);
        let conversations =
            ConversationService::new(backend.clone(), config.conversation.ttl_secs);
        let search = SearchService::new(
            backend.clone(),
            embeddings.clone(),
            conversations.clone(),
            config.search.clone(),
        );

        Self {
            config,
            backend,
            embeddings,
            search,
            conversations,
            pipeline,
        }
    }
}
