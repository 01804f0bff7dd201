//! Centralized default constants for civic-research.
//!
//! All crates reference these constants instead of defining their own magic
//! numbers. Environment variables override most of them at startup.

// =============================================================================
// RETRIEVAL
// =============================================================================

/// Reciprocal Rank Fusion constant.
pub const RRF_K: f32 = 50.0;

/// Default per-method RRF weight for the full-text ranking.
pub const TEXT_WEIGHT: f32 = 1.0;

/// Default per-method RRF weight for the vector ranking.
pub const VECTOR_WEIGHT: f32 = 1.0;

/// Minimum cosine similarity for a vector candidate to enter fusion.
pub const MIN_SEMANTIC_SIMILARITY: f32 = 0.3;

/// Upper bound on `limit` used when sizing sub-ranking candidate pools.
pub const MAX_CANDIDATE_LIMIT: usize = 30;

/// Candidate multiplier applied to the capped limit.
pub const CANDIDATE_MULTIPLIER: usize = 2;

/// Default number of results for the keyword path and direct search.
pub const SEARCH_LIMIT: usize = 20;

/// Default number of results a tool asks for.
pub const TOOL_LIMIT: usize = 8;

/// Default snippet length in characters.
pub const SNIPPET_LENGTH: usize = 240;

// =============================================================================
// AGENT
// =============================================================================

/// Maximum planning rounds before synthesis is forced.
pub const MAX_STEPS: usize = 6;

/// Wall-clock budget for a single remote call, in seconds.
pub const CALL_TIMEOUT_SECS: u64 = 60;

/// Capacity of the per-request event channel.
pub const EVENT_CHANNEL_CAPACITY: usize = 32;

/// Maximum follow-up suggestions attached to an answer.
pub const MAX_SUGGESTIONS: usize = 3;

/// Characters of an evidence snippet shown to the model in observations.
pub const OBSERVATION_SNIPPET_CHARS: usize = 400;

// =============================================================================
// CONVERSATION
// =============================================================================

/// Number of prior turns retained.
pub const MAX_TURNS: usize = 5;

/// Character budget for the conversation context handed to the orchestrator.
pub const CONTEXT_CHAR_BUDGET: usize = 2000;

// =============================================================================
// CACHED ANSWERS
// =============================================================================

/// Lifetime of a cached answer, in days.
pub const ANSWER_TTL_DAYS: i64 = 30;

/// Keyword-path result cache TTL in seconds (Redis).
pub const SEARCH_CACHE_TTL_SECS: u64 = 300;

// =============================================================================
// INFERENCE
// =============================================================================

/// Default OpenAI-compatible endpoint.
pub const OPENAI_URL: &str = "https://api.openai.com/v1";

/// Default embedding model name.
pub const EMBED_MODEL: &str = "text-embedding-3-small";

/// Default embedding vector dimension for text-embedding-3-small.
pub const EMBED_DIMENSION: usize = 1536;

/// Default generation model name.
pub const GEN_MODEL: &str = "gpt-4o-mini";

/// Timeout for HTTP requests to the inference service, in seconds.
pub const INFERENCE_TIMEOUT_SECS: u64 = 120;

// =============================================================================
// SERVER
// =============================================================================

/// Default HTTP server port.
pub const SERVER_PORT: u16 = 3000;

/// Default SSE keep-alive interval in seconds.
pub const SSE_KEEPALIVE_SECS: u64 = 15;

/// Maximum request body size in bytes.
pub const MAX_BODY_SIZE_BYTES: usize = 64 * 1024;

/// Maximum accepted query length in characters.
pub const MAX_QUERY_CHARS: usize = 2000;

/// Largest `limit` accepted by the search endpoints.
pub const MAX_SEARCH_LIMIT: usize = 100;

/// Seconds between database housekeeping runs (expired answer purge).
pub const HOUSEKEEPING_INTERVAL_SECS: u64 = 3600;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_candidate_pool_bounds() {
        assert_eq!(MAX_CANDIDATE_LIMIT * CANDIDATE_MULTIPLIER, 60);
        assert!(TOOL_LIMIT <= MAX_CANDIDATE_LIMIT);
    }

    #[test]
    fn test_conversation_defaults() {
        assert_eq!(MAX_TURNS, 5);
        assert!(CONTEXT_CHAR_BUDGET > 0);
    }
}
