//! Hybrid retrieval combining full-text and vector search per content type.

use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use tracing::{debug, info, instrument, warn};

use civic_core::{
    defaults, ContentType, EvidenceItem, EvidenceStore, Error, RankedList, Result, Vector,
};

use crate::embedder::QueryEmbedder;
use crate::rrf::{rrf_fuse, WeightedRanking};

/// Configuration for hybrid search.
#[derive(Debug, Clone, PartialEq)]
pub struct HybridSearchConfig {
    /// RRF constant `k`.
    pub rrf_k: f32,
    /// RRF weight of the full-text ranking.
    pub text_weight: f32,
    /// RRF weight of the vector ranking.
    pub vector_weight: f32,
    /// Vector candidates below this cosine similarity never enter fusion.
    pub min_semantic_similarity: f32,
    /// Cap on `limit` when sizing candidate pools.
    pub max_candidates: usize,
}

impl Default for HybridSearchConfig {
    fn default() -> Self {
        Self {
            rrf_k: defaults::RRF_K,
            text_weight: defaults::TEXT_WEIGHT,
            vector_weight: defaults::VECTOR_WEIGHT,
            min_semantic_similarity: defaults::MIN_SEMANTIC_SIMILARITY,
            max_candidates: defaults::MAX_CANDIDATE_LIMIT,
        }
    }
}

fn env_f32(name: &str, default: f32) -> f32 {
    std::env::var(name)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

impl HybridSearchConfig {
    /// Load from `CIVIC_RRF_K`, `CIVIC_TEXT_WEIGHT`, `CIVIC_VECTOR_WEIGHT`
    /// and `CIVIC_MIN_SEMANTIC_SIMILARITY`, falling back to defaults.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            rrf_k: env_f32("CIVIC_RRF_K", defaults.rrf_k),
            text_weight: env_f32("CIVIC_TEXT_WEIGHT", defaults.text_weight),
            vector_weight: env_f32("CIVIC_VECTOR_WEIGHT", defaults.vector_weight),
            min_semantic_similarity: env_f32(
                "CIVIC_MIN_SEMANTIC_SIMILARITY",
                defaults.min_semantic_similarity,
            ),
            ..defaults
        }
    }

    pub fn with_weights(mut self, text_weight: f32, vector_weight: f32) -> Self {
        self.text_weight = text_weight;
        self.vector_weight = vector_weight;
        self
    }

    pub fn with_rrf_k(mut self, k: f32) -> Self {
        self.rrf_k = k;
        self
    }

    pub fn with_min_semantic_similarity(mut self, threshold: f32) -> Self {
        self.min_semantic_similarity = threshold;
        self
    }

    /// Candidates requested from each sub-ranking: `min(limit, cap) * 2`.
    pub fn candidate_limit(&self, limit: usize) -> usize {
        limit.min(self.max_candidates) * defaults::CANDIDATE_MULTIPLIER
    }
}

/// Hybrid search over one content type.
#[async_trait]
pub trait HybridSearch: Send + Sync {
    /// Search with a precomputed query vector (or none for text-only).
    async fn search(
        &self,
        content_type: ContentType,
        query: &str,
        query_vector: Option<&Vector>,
        limit: usize,
    ) -> Result<RankedList>;

    /// Embed the query (if possible) and search.
    async fn search_text(
        &self,
        content_type: ContentType,
        query: &str,
        limit: usize,
    ) -> Result<RankedList>;

    /// Embed a query once, for callers searching several content types.
    async fn embed_query(&self, query: &str) -> Option<Vector>;
}

/// Hybrid search engine implementation.
#[derive(Clone)]
pub struct HybridSearchEngine {
    store: Arc<dyn EvidenceStore>,
    embedder: QueryEmbedder,
    config: HybridSearchConfig,
}

impl HybridSearchEngine {
    pub fn new(store: Arc<dyn EvidenceStore>, embedder: QueryEmbedder) -> Self {
        Self {
            store,
            embedder,
            config: HybridSearchConfig::default(),
        }
    }

    pub fn with_config(mut self, config: HybridSearchConfig) -> Self {
        self.config = config;
        self
    }

    pub fn config(&self) -> &HybridSearchConfig {
        &self.config
    }

    async fn vector_ranking(
        &self,
        content_type: ContentType,
        embedding: &Vector,
        candidates: usize,
    ) -> Result<Vec<EvidenceItem>> {
        let threshold = self.config.min_semantic_similarity;
        let results = self
            .store
            .vector_search(content_type, embedding, candidates)
            .await?;
        Ok(results
            .into_iter()
            .filter(|item| item.score() >= threshold)
            .collect())
    }
}

#[async_trait]
impl HybridSearch for HybridSearchEngine {
    #[instrument(skip(self, query_vector), fields(
        subsystem = "search",
        component = "hybrid_search",
        op = "search",
        content_type = %content_type,
        query = %query,
    ))]
    async fn search(
        &self,
        content_type: ContentType,
        query: &str,
        query_vector: Option<&Vector>,
        limit: usize,
    ) -> Result<RankedList> {
        if limit == 0 {
            return Ok(RankedList::empty(content_type));
        }

        let start = Instant::now();
        let candidates = self.config.candidate_limit(limit);

        let use_vector =
            self.config.vector_weight > 0.0 && self.store.has_vector_index(content_type);
        let vector_query = query_vector.filter(|_| use_vector);

        let text_retrieval = async {
            if query.trim().is_empty() {
                Ok(Vec::new())
            } else {
                self.store.text_search(content_type, query, candidates).await
            }
        };
        let vector_retrieval = async {
            match vector_query {
                Some(embedding) => {
                    Some(self.vector_ranking(content_type, embedding, candidates).await)
                }
                None => None,
            }
        };
        let (text_result, vector_result) = tokio::join!(text_retrieval, vector_retrieval);

        let vector_attempted = vector_result.is_some();
        let mut rankings = Vec::new();
        let mut text_hits = 0usize;
        let mut vector_hits = 0usize;

        let text_failed = match text_result {
            Ok(items) => {
                text_hits = items.len();
                if !items.is_empty() && self.config.text_weight > 0.0 {
                    rankings.push(WeightedRanking::new(items, self.config.text_weight));
                }
                None
            }
            Err(e) => Some(e),
        };

        match vector_result {
            Some(Ok(items)) => {
                vector_hits = items.len();
                if !items.is_empty() {
                    rankings.push(WeightedRanking::new(items, self.config.vector_weight));
                }
            }
            Some(Err(e)) => {
                if let Some(text_err) = &text_failed {
                    return Err(Error::Search(format!(
                        "both retrievals failed for {content_type}: text: {text_err}; vector: {e}"
                    )));
                }
                warn!(error = %e, "Vector retrieval failed, using full-text only");
            }
            None => {}
        }

        if let Some(text_err) = text_failed {
            if !vector_attempted {
                return Err(Error::Search(format!(
                    "full-text retrieval failed for {content_type}: {text_err}"
                )));
            }
            warn!(error = %text_err, "Full-text retrieval failed, using vector only");
        }

        debug!(text_hits, vector_hits, candidates, "Sub-rankings retrieved");

        let list = rrf_fuse(content_type, rankings, self.config.rrf_k, limit);

        info!(
            result_count = list.len(),
            duration_ms = start.elapsed().as_millis() as u64,
            "Hybrid search complete"
        );

        Ok(list)
    }

    async fn search_text(
        &self,
        content_type: ContentType,
        query: &str,
        limit: usize,
    ) -> Result<RankedList> {
        let embedding = if content_type.has_vector_index() {
            self.embedder.embed(query).await
        } else {
            None
        };
        self.search(content_type, query, embedding.as_ref(), limit)
            .await
    }

    async fn embed_query(&self, query: &str) -> Option<Vector> {
        self.embedder.embed(query).await
    }
}
