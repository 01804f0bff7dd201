//! Error types for civic-research.

use thiserror::Error;

/// Result type alias using civic-research's Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for civic-research operations.
#[derive(Error, Debug)]
pub enum Error {
    /// Database operation failed (wraps sqlx::Error)
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Resource not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Cached answer not found or expired
    #[error("Answer not found: {0}")]
    AnswerNotFound(uuid::Uuid),

    /// Embedding service down or unconfigured
    #[error("Embedding unavailable: {0}")]
    Embedding(String),

    /// LLM planning or completion call failed
    #[error("Inference error: {0}")]
    Inference(String),

    /// Search operation failed
    #[error("Search error: {0}")]
    Search(String),

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// HTTP/network request failed
    #[error("Request error: {0}")]
    Request(String),

    /// A remote call exceeded its wall-clock budget
    #[error("Timed out: {0}")]
    Timeout(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// True for failures of the LLM service (planning or synthesis).
    pub fn is_inference(&self) -> bool {
        matches!(self, Error::Inference(_))
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Serialization(e.to_string())
    }
}

impl From<reqwest::Error> for Error {
    fn from(e: reqwest::Error) -> Self {
        Error::Request(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[test]
    fn test_error_display_not_found() {
        let err = Error::NotFound("meeting".to_string());
        assert_eq!(err.to_string(), "Not found: meeting");
    }

    #[test]
    fn test_error_display_answer_not_found() {
        let id = Uuid::nil();
        let err = Error::AnswerNotFound(id);
        assert_eq!(err.to_string(), format!("Answer not found: {}", id));
    }

    #[test]
    fn test_error_display_embedding() {
        let err = Error::Embedding("no endpoint configured".to_string());
        assert_eq!(err.to_string(), "Embedding unavailable: no endpoint configured");
    }

    #[test]
    fn test_error_display_inference() {
        let err = Error::Inference("model timeout".to_string());
        assert_eq!(err.to_string(), "Inference error: model timeout");
        assert!(err.is_inference());
    }

    #[test]
    fn test_error_display_timeout() {
        let err = Error::Timeout("search_motions after 60s".to_string());
        assert_eq!(err.to_string(), "Timed out: search_motions after 60s");
        assert!(!err.is_inference());
    }

    #[test]
    fn test_from_serde_json_error() {
        let json_err = serde_json::from_str::<i32>("not a number").unwrap_err();
        let err: Error = json_err.into();
        match err {
            Error::Serialization(msg) => assert!(!msg.is_empty()),
            _ => panic!("Expected Serialization error"),
        }
    }

    #[test]
    fn test_error_is_send_sync() {
        fn assert_send<T: Send>() {}
        fn assert_sync<T: Sync>() {}

        assert_send::<Error>();
        assert_sync::<Error>();
    }
}
