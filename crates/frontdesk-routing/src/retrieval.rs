//! Retrieval Router: quick-answer cache first, semantic search second.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, warn};

use frontdesk_core::config::RetrievalConfig;
use frontdesk_core::types::{
    AnswerSet, QuickAnswer, RetrievalAnswer, RetrievalSource, SemanticHit, TenantId,
};
use frontdesk_storage::{KnowledgeIndex, QuickAnswerRepository};

use crate::error::RetrievalError;

/// Tenant-curated cached answers keyed by question.
#[async_trait]
pub trait QuickAnswerCache: Send + Sync {
    async fn lookup(
        &self,
        tenant: &TenantId,
        query: &str,
    ) -> Result<Option<QuickAnswer>, RetrievalError>;
}

/// Similarity search over a tenant's indexed content.
#[async_trait]
pub trait SemanticIndex: Send + Sync {
    /// Up to `k` hits, best first. An outage is an error, never an empty list.
    async fn search(
        &self,
        tenant: &TenantId,
        query: &str,
        k: usize,
    ) -> Result<Vec<SemanticHit>, RetrievalError>;
}

// SQLite calls block on the connection mutex; they run on the blocking pool
// so the router's deadline can fire while they wait.

#[async_trait]
impl QuickAnswerCache for QuickAnswerRepository {
    async fn lookup(
        &self,
        tenant: &TenantId,
        query: &str,
    ) -> Result<Option<QuickAnswer>, RetrievalError> {
        let repo = self.clone();
        let tenant = tenant.clone();
        let query = query.to_string();
        tokio::task::spawn_blocking(move || QuickAnswerRepository::lookup(&repo, &tenant, &query))
            .await
            .map_err(|e| RetrievalError::Unavailable(format!("quick-answer task failed: {e}")))?
            .map_err(RetrievalError::from)
    }
}

#[async_trait]
impl SemanticIndex for KnowledgeIndex {
    async fn search(
        &self,
        tenant: &TenantId,
        query: &str,
        k: usize,
    ) -> Result<Vec<SemanticHit>, RetrievalError> {
        let index = self.clone();
        let tenant = tenant.clone();
        let query = query.to_string();
        tokio::task::spawn_blocking(move || KnowledgeIndex::search(&index, &tenant, &query, k))
            .await
            .map_err(|e| RetrievalError::Unavailable(format!("search task failed: {e}")))?
            .map_err(RetrievalError::from)
    }
}

/// Chooses between a cached quick answer and semantic search.
///
/// Holds no mutable state; every call reads straight from the cache and index.
pub struct RetrievalRouter {
    cache: Arc<dyn QuickAnswerCache>,
    index: Arc<dyn SemanticIndex>,
    config: RetrievalConfig,
}

impl RetrievalRouter {
    pub fn new(
        cache: Arc<dyn QuickAnswerCache>,
        index: Arc<dyn SemanticIndex>,
        config: RetrievalConfig,
    ) -> Self {
        Self {
            cache,
            index,
            config,
        }
    }

    /// Best available answers for `query`.
    ///
    /// A cached answer is returned alone when its confidence is strictly above
    /// the configured threshold. Anything else, including a cache failure,
    /// falls through to semantic search. Zero semantic hits is a valid empty
    /// set; a failed or timed-out search is an error.
    pub async fn answer(
        &self,
        tenant: &TenantId,
        query: &str,
        k: Option<usize>,
    ) -> Result<AnswerSet, RetrievalError> {
        let query = query.trim();
        if query.is_empty() {
            return Err(RetrievalError::InvalidQuery(
                "query must not be empty".to_string(),
            ));
        }
        let k = k.unwrap_or(self.config.default_k).min(self.config.max_k);
        if k == 0 {
            return Err(RetrievalError::InvalidQuery(
                "k must be at least 1".to_string(),
            ));
        }

        if let Some(quick) = self.cached(tenant, query).await {
            if quick.confidence > self.config.quick_answer_threshold {
                debug!(tenant = %tenant, confidence = quick.confidence, "Answered from quick-answer cache");
                return Ok(AnswerSet {
                    results: vec![RetrievalAnswer {
                        content: quick.answer,
                        score: quick.confidence,
                        relevance_type: quick
                            .question_type
                            .unwrap_or_else(|| "quick_answer".to_string()),
                        source: RetrievalSource::QuickAnswer,
                    }],
                    search_type: RetrievalSource::QuickAnswer,
                    query_expanded: false,
                });
            }
        }

        let timeout_ms = self.config.search_timeout_ms;
        let hits = tokio::time::timeout(
            Duration::from_millis(timeout_ms),
            self.index.search(tenant, query, k),
        )
        .await
        .map_err(|_| RetrievalError::TimedOut(timeout_ms))??;

        debug!(tenant = %tenant, hits = hits.len(), k, "Answered from semantic search");
        Ok(AnswerSet {
            results: hits
                .into_iter()
                .take(k)
                .map(|hit| RetrievalAnswer {
                    content: hit.content,
                    score: hit.score,
                    relevance_type: hit.relevance_type,
                    source: RetrievalSource::Semantic,
                })
                .collect(),
            search_type: RetrievalSource::Semantic,
            query_expanded: false,
        })
    }

    async fn cached(&self, tenant: &TenantId, query: &str) -> Option<QuickAnswer> {
        let deadline = Duration::from_millis(self.config.search_timeout_ms);
        match tokio::time::timeout(deadline, self.cache.lookup(tenant, query)).await {
            Ok(Ok(found)) => found,
            Ok(Err(e)) => {
                warn!(tenant = %tenant, error = %e, "Quick-answer lookup failed, using semantic search");
                None
            }
            Err(_) => {
                warn!(tenant = %tenant, "Quick-answer lookup timed out, using semantic search");
                None
            }
        }
    }
}
