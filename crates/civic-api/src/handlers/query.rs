//! `POST /api/v1/query`: keyword results as JSON, questions as an SSE stream.

use std::convert::Infallible;
use std::time::Duration;

use axum::extract::State;
use axum::response::sse::{Event, KeepAlive};
use axum::response::{IntoResponse, Response, Sse};
use axum::Json;
use futures::Stream;
use serde::{Deserialize, Serialize};
use tracing::{info, instrument, warn};

use civic_agent::{spawn_research, EventStream, ResearchRequest};
use civic_core::{classify, defaults, ContentType, ConversationTurn, Intent, RankedList};

use crate::error::ApiError;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct QueryRequest {
    pub query: String,
    /// Prior conversation, oldest first.
    #[serde(default)]
    pub turns: Vec<ConversationTurn>,
    /// Start a new topic regardless of the prior turns.
    #[serde(default)]
    pub new_search: bool,
    /// Results per content type on the keyword path.
    #[serde(default)]
    pub limit: Option<usize>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KeywordResponse {
    pub query: String,
    pub intent: Intent,
    /// One list per content type.
    pub results: Vec<RankedList>,
    pub total: usize,
}

pub(crate) fn validate_query(query: &str) -> Result<&str, ApiError> {
    let trimmed = query.trim();
    if trimmed.chars().count() > defaults::MAX_QUERY_CHARS {
        return Err(ApiError::BadRequest(format!(
            "query must be at most {} characters",
            defaults::MAX_QUERY_CHARS
        )));
    }
    Ok(trimmed)
}

pub(crate) fn validate_limit(limit: Option<usize>) -> Result<usize, ApiError> {
    match limit {
        None => Ok(defaults::SEARCH_LIMIT),
        Some(n) if (1..=defaults::MAX_SEARCH_LIMIT).contains(&n) => Ok(n),
        Some(n) => Err(ApiError::BadRequest(format!(
            "limit must be between 1 and {}, got {}",
            defaults::MAX_SEARCH_LIMIT,
            n
        ))),
    }
}

#[instrument(skip_all, fields(subsystem = "api", op = "query"))]
pub async fn query(
    State(state): State<AppState>,
    Json(request): Json<QueryRequest>,
) -> Result<Response, ApiError> {
    let query = validate_query(&request.query)?;
    let limit = validate_limit(request.limit)?;

    match classify(query) {
        Intent::Keyword => {
            let response = keyword_search(&state, query, limit).await?;
            Ok(Json(response).into_response())
        }
        Intent::Question => {
            info!(turns = request.turns.len(), "Starting research");
            let research = ResearchRequest::new(query)
                .with_turns(request.turns)
                .with_new_search(request.new_search);
            let events = spawn_research(state.agent.clone(), research);
            Ok(event_stream(events).into_response())
        }
    }
}

/// Hybrid search across every content type, embedding the query once.
async fn keyword_search(
    state: &AppState,
    query: &str,
    limit: usize,
) -> Result<KeywordResponse, ApiError> {
    if query.is_empty() {
        return Ok(KeywordResponse {
            query: String::new(),
            intent: Intent::Keyword,
            results: ContentType::ALL.map(RankedList::empty).to_vec(),
            total: 0,
        });
    }

    let cache_key = state.search_cache.cache_key(query, None, limit);
    if let Some(cached) = state.search_cache.get::<KeywordResponse>(&cache_key).await {
        return Ok(cached);
    }

    let vector = state.search.embed_query(query).await;
    let searches = ContentType::ALL
        .iter()
        .map(|ct| state.search.search(*ct, query, vector.as_ref(), limit));
    let outcomes = futures::future::join_all(searches).await;

    let mut failed = 0usize;
    let results: Vec<RankedList> = ContentType::ALL
        .into_iter()
        .zip(outcomes)
        .map(|(content_type, outcome)| {
            outcome.unwrap_or_else(|e| {
                warn!(%content_type, error = %e, "Keyword search failed for content type");
                failed += 1;
                RankedList::empty(content_type)
            })
        })
        .collect();
    let total = results.iter().map(RankedList::len).sum();

    let response = KeywordResponse {
        query: query.to_string(),
        intent: Intent::Keyword,
        results,
        total,
    };
    // partial results are served but not cached
    if failed == 0 {
        state.search_cache.set(&cache_key, &response).await;
    }
    Ok(response)
}

/// Forward agent events as SSE records named by event type.
fn event_stream(events: EventStream) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    use tokio_stream::StreamExt as _;

    let stream = events.filter_map(|event| match serde_json::to_string(&event) {
        Ok(json) => Some(Ok(Event::default().event(event.event_type()).data(json))),
        Err(e) => {
            warn!(error = %e, "Dropping unserializable event");
            None
        }
    });

    Sse::new(stream).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(defaults::SSE_KEEPALIVE_SECS))
            .text("keepalive"),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_limit() {
        assert_eq!(validate_limit(None).unwrap(), defaults::SEARCH_LIMIT);
        assert_eq!(validate_limit(Some(5)).unwrap(), 5);
        assert!(validate_limit(Some(0)).is_err());
        assert!(validate_limit(Some(defaults::MAX_SEARCH_LIMIT + 1)).is_err());
    }

    #[test]
    fn test_validate_query_trims_and_bounds() {
        assert_eq!(validate_query("  parking  ").unwrap(), "parking");
        assert_eq!(validate_query("   ").unwrap(), "");
        let long = "a".repeat(defaults::MAX_QUERY_CHARS + 1);
        assert!(validate_query(&long).is_err());
    }
}
