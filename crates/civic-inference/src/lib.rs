//! # civic-inference
//!
//! LLM and embedding backends for civic-research.
//!
//! This crate provides:
//! - OpenAI-compatible implementation (feature `openai`, default) covering
//!   embeddings, plain and streamed completion, and function calling
//! - A scripted backend for deterministic tests (feature `mock`)
//!
//! The traits themselves live in `civic-core` so that retrieval and the
//! research loop depend only on abstractions.

#[cfg(feature = "openai")]
pub mod openai;

#[cfg(any(test, feature = "mock"))]
pub mod mock;

pub use civic_core::{
    EmbeddingBackend, GenerationBackend, ResearchBackend, StreamingGeneration, TokenStream,
    ToolCallingBackend, ToolDecision, ToolDefinition, ToolInvocation,
};

#[cfg(feature = "openai")]
pub use openai::{OpenAIBackend, OpenAIConfig};
