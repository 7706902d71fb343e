use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::config::SearchConfig;
use crate::conversation::{context_terms, ConversationService};
use crate::db::StorageBackend;
use crate::embeddings::EmbeddingProvider;
use crate::error::{Result, SiftError};
use crate::models::{
    Candidate, Citation, IndexFilter, RankedResult, SearchOutcome, SearchQuery, SearchResultItem,
    TurnRole,
};
use crate::ranking::{lexical, rank, RankWeights};
use crate::services::permissions;

const SNIPPET_MAX_CHARS: usize = 240;

/// The query pipeline: embed, retrieve on both paths, permission-filter,
/// rank, respond. The whole pipeline runs under one timeout budget; an
/// unreachable index is surfaced as such, never disguised as an empty
/// result set.
#[derive(Clone)]
pub struct SearchService {
    backend: Arc<dyn StorageBackend>,
    embeddings: EmbeddingProvider,
    conversations: ConversationService,
    config: SearchConfig,
    weights: RankWeights,
}

impl SearchService {
    pub fn new(
        backend: Arc<dyn StorageBackend>,
        embeddings: EmbeddingProvider,
        conversations: ConversationService,
        config: SearchConfig,
    ) -> Self {
        let weights = RankWeights::from_config(&config);
        Self {
            backend,
            embeddings,
            conversations,
            config,
            weights,
        }
    }

    pub async fn search(&self, query: SearchQuery) -> Result<SearchOutcome> {
        let budget_ms = self.config.timeout_ms;
        match tokio::time::timeout(Duration::from_millis(budget_ms), self.execute(query)).await {
            Ok(outcome) => outcome,
            Err(_) => Err(SiftError::QueryTimeout { budget_ms }),
        }
    }

    async fn execute(&self, query: SearchQuery) -> Result<SearchOutcome> {
        let started = Instant::now();
        let top_k = query.top_k.clamp(1, self.config.max_top_k);
        let mut context_degraded = false;

        tracing::debug!(requester = %query.requester, top_k, stage = "received", "Search received");

        // Conversation history is best-effort on the read side: a store
        // outage degrades continuity but must not block the search itself.
        let history = match &query.conversation_id {
            Some(conversation_id) => match self.conversations.history(conversation_id).await {
                Ok(history) => history,
                Err(err) => {
                    tracing::warn!(
                        conversation_id = %conversation_id,
                        error = %err,
                        "Conversation history unavailable, continuing without context"
                    );
                    context_degraded = true;
                    Vec::new()
                }
            },
            None => Vec::new(),
        };

        let extra_terms = context_terms(&history, &query.q);
        let effective_query = if extra_terms.is_empty() {
            query.q.clone()
        } else {
            format!("{} {}", query.q, extra_terms.join(" "))
        };

        let embedding = self.embeddings.embed_query(&effective_query).await?;
        let filter = IndexFilter::from_filters(&query.filters);
        let keyword_terms = lexical::query_tokens(&effective_query);

        tracing::debug!(stage = "retrieving", "Retrieving candidates");
        let limit = top_k * self.config.overfetch_factor;
        let candidates = self.retrieve(&embedding, &keyword_terms, limit, &filter).await?;

        tracing::debug!(stage = "filtering", candidates = candidates.len(), "Applying permission filter");
        let visible = permissions::filter_visible(candidates, &query.requester);

        tracing::debug!(stage = "ranking", visible = visible.len(), "Ranking candidates");
        let mut ranked = rank(&effective_query, visible, &self.weights, top_k as usize);

        // One widened retry when the permission filter thinned the pool
        // below what was asked for. After that the short list stands.
        if ranked.len() < top_k as usize && self.config.widen_factor > 1 {
            let widened_limit = limit * self.config.widen_factor;
            tracing::debug!(widened_limit, "Widening retrieval once");
            let candidates = self
                .retrieve(&embedding, &keyword_terms, widened_limit, &filter)
                .await?;
            let visible = permissions::filter_visible(candidates, &query.requester);
            ranked = rank(&effective_query, visible, &self.weights, top_k as usize);
        }

        tracing::debug!(stage = "responding", results = ranked.len(), "Building response");
        let results: Vec<SearchResultItem> = ranked.iter().map(to_result_item).collect();

        if let Some(conversation_id) = &query.conversation_id {
            if let Err(err) = self.record_turns(conversation_id, &query.q, &results).await {
                tracing::warn!(
                    conversation_id = %conversation_id,
                    error = %err,
                    "Failed to record conversation turns"
                );
                context_degraded = true;
            }
        }

        Ok(SearchOutcome {
            results,
            conversation_id: query.conversation_id,
            context_degraded,
            timing_ms: started.elapsed().as_millis() as u64,
        })
    }

    /// Both retrieval paths against the index. Index failures become
    /// `IndexUnavailable` so the caller sees an outage, not an empty hit
    /// list.
    async fn retrieve(
        &self,
        embedding: &[f32],
        keyword_terms: &[String],
        limit: u32,
        filter: &IndexFilter,
    ) -> Result<Vec<Candidate>> {
        let semantic = self
            .backend
            .query_semantic(embedding, limit, filter)
            .await
            .map_err(index_unavailable)?;
        let keyword = self
            .backend
            .query_keyword(keyword_terms, limit, filter)
            .await
            .map_err(index_unavailable)?;

        let mut candidates = semantic;
        candidates.extend(keyword);
        Ok(candidates)
    }

    async fn record_turns(
        &self,
        conversation_id: &str,
        question: &str,
        results: &[SearchResultItem],
    ) -> Result<()> {
        self.conversations
            .append(conversation_id, TurnRole::User, question)
            .await?;
        let summary = summarize_results(results);
        self.conversations
            .append(conversation_id, TurnRole::Assistant, &summary)
            .await?;
        Ok(())
    }
}

fn index_unavailable(err: SiftError) -> SiftError {
    match err {
        SiftError::Database(inner) => {
            tracing::error!(error = %inner, "Index query failed");
            SiftError::IndexUnavailable(inner.to_string())
        }
        other => other,
    }
}

fn to_result_item(ranked: &RankedResult) -> SearchResultItem {
    let candidate = &ranked.candidate;
    let title = metadata_str(candidate, "title");

    SearchResultItem {
        document_id: candidate.id.clone(),
        source: candidate.source,
        title: title.clone(),
        snippet: make_snippet(&candidate.text),
        score: ranked.score,
        citation: Citation {
            source: candidate.source,
            title,
            url: metadata_str(candidate, "url"),
            author: metadata_str(candidate, "author"),
            timestamp: candidate.updated_at,
        },
    }
}

fn metadata_str(candidate: &Candidate, key: &str) -> Option<String> {
    candidate
        .source_metadata
        .get(key)
        .and_then(|v| v.as_str())
        .map(|s| s.to_string())
}

/// First words of the document, cut at a word boundary.
fn make_snippet(text: &str) -> String {
    if text.chars().count() <= SNIPPET_MAX_CHARS {
        return text.to_string();
    }
    let mut snippet = String::new();
    for word in text.split_whitespace() {
        if snippet.chars().count() + word.chars().count() + 1 > SNIPPET_MAX_CHARS {
            break;
        }
        if !snippet.is_empty() {
            snippet.push(' ');
        }
        snippet.push_str(word);
    }
    snippet.push('…');
    snippet
}

fn summarize_results(results: &[SearchResultItem]) -> String {
    if results.is_empty() {
        return "No matching documents found.".to_string();
    }
    let titles: Vec<String> = results
        .iter()
        .take(3)
        .map(|r| {
            r.title
                .clone()
                .unwrap_or_else(|| format!("{} {}", r.source, r.document_id))
        })
        .collect();
    format!("Found {} documents, top: {}", results.len(), titles.join("; "))
}
