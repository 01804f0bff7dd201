use std::sync::Arc;

use civic_agent::ResearchAgent;
use civic_core::AnswerStore;
use civic_search::HybridSearch;

use crate::services::SearchCache;

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    /// Hybrid retrieval for the keyword and direct-search paths.
    pub search: Arc<dyn HybridSearch>,
    /// Research loop for the question path.
    pub agent: Arc<ResearchAgent>,
    /// Cached answers for shared-link replay.
    pub answers: Arc<dyn AnswerStore>,
    /// Redis cache for keyword results.
    pub search_cache: SearchCache,
}

impl AppState {
    pub fn new(
        search: Arc<dyn HybridSearch>,
        agent: Arc<ResearchAgent>,
        answers: Arc<dyn AnswerStore>,
    ) -> Self {
        Self {
            search,
            agent,
            answers,
            search_cache: SearchCache::disabled(),
        }
    }

    pub fn with_search_cache(mut self, search_cache: SearchCache) -> Self {
        self.search_cache = search_cache;
        self
    }
}
