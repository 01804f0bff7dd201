//! `GET /api/v1/search`: hybrid search over one content type, bypassing
//! intent classification.

use axum::extract::{Query, State};
use axum::Json;
use serde::Deserialize;
use tracing::instrument;

use civic_core::{ContentType, RankedList};

use super::query::{validate_limit, validate_query};
use crate::error::ApiError;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct SearchParams {
    pub q: String,
    /// Content type name, e.g. `motion` or `document_sections`.
    #[serde(rename = "type")]
    pub content_type: String,
    pub limit: Option<usize>,
}

#[instrument(skip_all, fields(subsystem = "api", op = "search"))]
pub async fn search(
    State(state): State<AppState>,
    Query(params): Query<SearchParams>,
) -> Result<Json<RankedList>, ApiError> {
    let content_type: ContentType = params.content_type.parse()?;
    let query = validate_query(&params.q)?;
    if query.is_empty() {
        return Err(ApiError::BadRequest("q must not be empty".to_string()));
    }
    let limit = validate_limit(params.limit)?;

    let cache_key = state.search_cache.cache_key(query, Some(content_type), limit);
    if let Some(cached) = state.search_cache.get::<RankedList>(&cache_key).await {
        return Ok(Json(cached));
    }

    let list = state.search.search_text(content_type, query, limit).await?;
    state.search_cache.set(&cache_key, &list).await;
    Ok(Json(list))
}
