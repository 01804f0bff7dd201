use axum::extract::{Path, State};
use axum::Json;
use uuid::Uuid;

use civic_core::{CachedAnswer, Error};

use crate::error::ApiError;
use crate::state::AppState;

/// `GET /api/v1/answers/:id`: replay a cached answer verbatim.
pub async fn get_answer(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<CachedAnswer>, ApiError> {
    match state.answers.get(id).await? {
        Some(answer) => Ok(Json(answer)),
        None => Err(Error::AnswerNotFound(id).into()),
    }
}
