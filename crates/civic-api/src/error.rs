use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;

/// Errors returned by HTTP handlers, rendered as `{"error": message}`.
#[derive(Debug)]
pub enum ApiError {
    Internal(civic_core::Error),
    NotFound(String),
    BadRequest(String),
}

impl From<civic_core::Error> for ApiError {
    fn from(err: civic_core::Error) -> Self {
        match err {
            civic_core::Error::NotFound(msg) => ApiError::NotFound(msg),
            civic_core::Error::AnswerNotFound(id) => {
                ApiError::NotFound(format!("Answer {} not found", id))
            }
            civic_core::Error::InvalidInput(msg) => ApiError::BadRequest(msg),
            other => ApiError::Internal(other),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::Internal(err) => {
                tracing::error!(error = %err, "Request failed");
                (StatusCode::INTERNAL_SERVER_ERROR, err.to_string())
            }
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
        };

        let body = Json(serde_json::json!({
            "error": message,
        }));

        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[test]
    fn test_core_errors_map_to_status() {
        let cases = [
            (civic_core::Error::NotFound("x".into()), StatusCode::NOT_FOUND),
            (
                civic_core::Error::AnswerNotFound(Uuid::nil()),
                StatusCode::NOT_FOUND,
            ),
            (
                civic_core::Error::InvalidInput("bad".into()),
                StatusCode::BAD_REQUEST,
            ),
            (
                civic_core::Error::Search("both retrievals failed".into()),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];
        for (err, status) in cases {
            assert_eq!(ApiError::from(err).into_response().status(), status);
        }
    }
}
