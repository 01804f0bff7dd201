//! Query embedding with graceful degradation.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{debug, warn};

use civic_core::{defaults, EmbeddingBackend, Vector};

/// Turns query text into a vector when an embedding service is available.
///
/// Every failure mode (no backend, service error, timeout, empty response)
/// yields `None` and a warning, so callers fall back to full-text retrieval.
#[derive(Clone)]
pub struct QueryEmbedder {
    backend: Option<Arc<dyn EmbeddingBackend>>,
    timeout: Duration,
}

impl QueryEmbedder {
    pub fn new(backend: Arc<dyn EmbeddingBackend>) -> Self {
        Self {
            backend: Some(backend),
            timeout: Duration::from_secs(defaults::CALL_TIMEOUT_SECS),
        }
    }

    /// An embedder that never produces a vector.
    pub fn disabled() -> Self {
        Self {
            backend: None,
            timeout: Duration::from_secs(defaults::CALL_TIMEOUT_SECS),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn is_enabled(&self) -> bool {
        self.backend.is_some()
    }

    pub async fn embed(&self, text: &str) -> Option<Vector> {
        let backend = self.backend.as_ref()?;
        if text.trim().is_empty() {
            return None;
        }
        let start = Instant::now();
        let input = vec![text.to_string()];
        match tokio::time::timeout(self.timeout, backend.embed_texts(&input)).await {
            Ok(Ok(mut vectors)) if !vectors.is_empty() => {
                debug!(
                    subsystem = "search",
                    component = "query_embedder",
                    model = backend.model_name(),
                    duration_ms = start.elapsed().as_millis() as u64,
                    "Query embedded"
                );
                Some(vectors.swap_remove(0))
            }
            Ok(Ok(_)) => {
                warn!(
                    subsystem = "search",
                    component = "query_embedder",
                    "Embedding service returned no vectors, falling back to full-text"
                );
                None
            }
            Ok(Err(e)) => {
                warn!(
                    subsystem = "search",
                    component = "query_embedder",
                    error = %e,
                    "Embedding unavailable, falling back to full-text"
                );
                None
            }
            Err(_) => {
                warn!(
                    subsystem = "search",
                    component = "query_embedder",
                    timeout_secs = self.timeout.as_secs(),
                    "Embedding timed out, falling back to full-text"
                );
                None
            }
        }
    }
}
