//! Progress events emitted while a research question is answered.
//!
//! Events are produced in strict temporal order by the orchestrator and
//! forwarded by the transport layer one SSE record per event. Each event is
//! consumed exactly once.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::models::{ConfidenceLevel, Source};

/// A single step of the research loop, as seen by the caller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AgentEvent {
    /// The model chose to invoke a tool.
    ToolCall { name: String, arguments: Value },
    /// Result of a tool invocation. Exactly one of `summary`/`error` is set.
    ToolObservation {
        name: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        summary: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        error: Option<String>,
    },
    /// A word-granular slice of the streamed answer.
    FinalAnswerChunk { text: String },
    /// Every source gathered for the answer.
    Sources {
        sources: Vec<Source>,
        source_count: usize,
        confidence: ConfidenceLevel,
    },
    /// Terminal event.
    Done {
        #[serde(default)]
        answer_id: Option<Uuid>,
        #[serde(default)]
        suggestions: Vec<String>,
    },
    /// The research loop failed; always followed by `done`.
    Error { message: String },
}

impl AgentEvent {
    /// SSE event name.
    pub fn event_type(&self) -> &'static str {
        match self {
            AgentEvent::ToolCall { .. } => "tool_call",
            AgentEvent::ToolObservation { .. } => "tool_observation",
            AgentEvent::FinalAnswerChunk { .. } => "final_answer_chunk",
            AgentEvent::Sources { .. } => "sources",
            AgentEvent::Done { .. } => "done",
            AgentEvent::Error { .. } => "error",
        }
    }

    pub fn observation_ok(name: impl Into<String>, summary: impl Into<String>) -> Self {
        AgentEvent::ToolObservation {
            name: name.into(),
            summary: Some(summary.into()),
            error: None,
        }
    }

    pub fn observation_err(name: impl Into<String>, error: impl Into<String>) -> Self {
        AgentEvent::ToolObservation {
            name: name.into(),
            summary: None,
            error: Some(error.into()),
        }
    }

    pub fn done_empty() -> Self {
        AgentEvent::Done {
            answer_id: None,
            suggestions: Vec::new(),
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, AgentEvent::Done { .. })
    }
}
