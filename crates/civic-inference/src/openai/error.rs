//! OpenAI-specific error handling.

use civic_core::Error;

/// Error classes reported by OpenAI-compatible endpoints.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpenAIErrorCode {
    AuthenticationError,
    RateLimitExceeded,
    ModelNotFound,
    ContextLengthExceeded,
    ServerError,
    Unknown,
}

impl OpenAIErrorCode {
    /// Classify from HTTP status and the error body's `type`.
    pub fn from_response(status: u16, error_type: &str) -> Self {
        match (status, error_type) {
            (401, _) | (403, _) => Self::AuthenticationError,
            (429, _) => Self::RateLimitExceeded,
            (404, _) | (_, "model_not_found") => Self::ModelNotFound,
            (400, _) if error_type.contains("context_length") => Self::ContextLengthExceeded,
            (500..=599, _) => Self::ServerError,
            _ => Self::Unknown,
        }
    }

    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::RateLimitExceeded | Self::ServerError)
    }
}

/// Convert a failed completion response into an inference error.
///
/// All classes map to [`Error::Inference`]: the research loop treats any
/// LLM failure as terminal regardless of cause.
pub fn to_civic_error(code: OpenAIErrorCode, status: u16, message: &str) -> Error {
    let class = match code {
        OpenAIErrorCode::AuthenticationError => "authentication failed",
        OpenAIErrorCode::RateLimitExceeded => "rate limit exceeded",
        OpenAIErrorCode::ModelNotFound => "model not found",
        OpenAIErrorCode::ContextLengthExceeded => "context too long",
        OpenAIErrorCode::ServerError => "server error",
        OpenAIErrorCode::Unknown => "request failed",
    };
    Error::Inference(format!("LLM service {class} ({status}): {message}"))
}
