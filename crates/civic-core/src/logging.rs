//! Structured logging field names shared by every crate.
//!
//! ## Log Level Contract
//!
//! | Level | Usage |
//! |-------|-------|
//! | ERROR | Degraded service, requires operator attention |
//! | WARN  | Recoverable issue, automatic fallback applied |
//! | INFO  | Lifecycle events, request completions |
//! | DEBUG | Decision points, intermediate values |
//! | TRACE | Per-item iteration (hits, fragments) |

// ─── Identity fields ───────────────────────────────────────────────────────

/// Correlation ID propagated across request → agent → tool calls.
pub const REQUEST_ID: &str = "request_id";

/// Subsystem originating the log event.
/// Values: "api", "search", "db", "inference", "agent"
pub const SUBSYSTEM: &str = "subsystem";

/// Component within a subsystem.
/// Examples: "hybrid_search", "rrf_fusion", "orchestrator", "tool_registry"
pub const COMPONENT: &str = "component";

/// Logical operation name.
pub const OPERATION: &str = "op";

// ─── Entity fields ─────────────────────────────────────────────────────────

/// Content type being searched.
pub const CONTENT_TYPE: &str = "content_type";

/// Tool name being invoked.
pub const TOOL: &str = "tool";

/// Cached answer UUID.
pub const ANSWER_ID: &str = "answer_id";

/// Query text.
pub const QUERY: &str = "query";

// ─── Measurement fields ────────────────────────────────────────────────────

/// Wall-clock duration in milliseconds.
pub const DURATION_MS: &str = "duration_ms";

/// Number of results returned.
pub const RESULT_COUNT: &str = "result_count";

/// Planning step number (1-based).
pub const STEP: &str = "step";

/// Number of sources in the registry.
pub const SOURCE_COUNT: &str = "source_count";

// ─── Search-specific fields ────────────────────────────────────────────────

/// Number of full-text candidates before fusion.
pub const TEXT_HITS: &str = "text_hits";

/// Number of vector candidates before fusion.
pub const VECTOR_HITS: &str = "vector_hits";

/// RRF k parameter.
pub const RRF_K: &str = "rrf_k";

// ─── Inference fields ──────────────────────────────────────────────────────

/// Model name used for inference.
pub const MODEL: &str = "model";

// ─── Outcome fields ────────────────────────────────────────────────────────

/// Error message when an operation fails.
pub const ERROR_MSG: &str = "error";
