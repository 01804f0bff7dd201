//! Core traits for storage and inference abstractions.

use std::pin::Pin;

use async_trait::async_trait;
use futures::Stream;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::error::Result;
use crate::models::*;

// =============================================================================
// STORAGE TRAITS
// =============================================================================

/// Ranked retrieval over one content type.
///
/// Implementations order text results by rank descending and vector results
/// by similarity descending, ties broken by meeting date (newest first) and
/// then id. The item's `score` carries the raw rank or cosine similarity.
#[async_trait]
pub trait EvidenceStore: Send + Sync {
    /// Full-text search.
    async fn text_search(
        &self,
        content_type: ContentType,
        query: &str,
        limit: usize,
    ) -> Result<Vec<EvidenceItem>>;

    /// Nearest-neighbour search by cosine similarity.
    async fn vector_search(
        &self,
        content_type: ContentType,
        embedding: &Vector,
        limit: usize,
    ) -> Result<Vec<EvidenceItem>>;

    /// Whether a vector index exists for the content type.
    fn has_vector_index(&self, content_type: ContentType) -> bool {
        content_type.has_vector_index()
    }
}

/// Structured lookups that are not relevance ranked.
#[async_trait]
pub trait RecordLookup: Send + Sync {
    /// Statements by a speaker (case-insensitive substring), most recent first.
    async fn statements_by_speaker(&self, person: &str, limit: usize)
        -> Result<Vec<EvidenceItem>>;

    /// Recorded votes, filtered by person and/or a motion text query.
    /// Most recent meeting first.
    async fn voting_history(
        &self,
        person: Option<&str>,
        motion_query: Option<&str>,
        limit: usize,
    ) -> Result<Vec<VoteRecord>>;
}

/// Write-once storage for completed answers.
#[async_trait]
pub trait AnswerStore: Send + Sync {
    /// Insert the answer unless the id already exists. Returns whether a row
    /// was written.
    async fn insert_if_absent(&self, answer: &CachedAnswer) -> Result<bool>;

    /// Fetch an unexpired answer.
    async fn get(&self, id: Uuid) -> Result<Option<CachedAnswer>>;
}

// =============================================================================
// INFERENCE TRAITS
// =============================================================================

/// Stream of text fragments from a streaming completion.
pub type TokenStream = Pin<Box<dyn Stream<Item = Result<String>> + Send>>;

/// Backend for generating text embeddings.
#[async_trait]
pub trait EmbeddingBackend: Send + Sync {
    /// Generate embeddings for the given texts, one per input.
    async fn embed_texts(&self, texts: &[String]) -> Result<Vec<Vector>>;

    /// Expected dimension of embedding vectors.
    fn dimension(&self) -> usize;

    fn model_name(&self) -> &str;
}

/// Backend for plain text generation.
#[async_trait]
pub trait GenerationBackend: Send + Sync {
    async fn generate(&self, prompt: &str) -> Result<String>;

    async fn generate_with_system(&self, system: &str, prompt: &str) -> Result<String>;

    fn model_name(&self) -> &str;
}

/// Backend for streamed generation.
#[async_trait]
pub trait StreamingGeneration: Send + Sync {
    async fn generate_with_system_stream(&self, system: &str, prompt: &str)
        -> Result<TokenStream>;
}

/// A tool offered to the model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    /// JSON Schema for the arguments object.
    pub parameters: Value,
}

/// A tool invocation requested by the model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolInvocation {
    /// Provider-assigned call id, echoed back with the result.
    pub id: String,
    pub name: String,
    pub arguments: Value,
}

/// What the model decided to do at a planning step.
#[derive(Debug, Clone, PartialEq)]
pub enum ToolDecision {
    CallTools(Vec<ToolInvocation>),
    /// The model has enough evidence and wants to answer.
    Answer,
}

/// One message of the planning transcript.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "role", rename_all = "snake_case")]
pub enum ResearchMessage {
    System { content: String },
    User { content: String },
    /// Tool calls the model made in an earlier step.
    AssistantToolCalls { calls: Vec<ToolInvocation> },
    ToolResult { id: String, content: String },
}

/// Backend able to choose tools via function calling.
#[async_trait]
pub trait ToolCallingBackend: Send + Sync {
    async fn decide(
        &self,
        messages: &[ResearchMessage],
        tools: &[ToolDefinition],
    ) -> Result<ToolDecision>;
}

/// Everything the research loop needs from an LLM service.
pub trait ResearchBackend: ToolCallingBackend + StreamingGeneration + GenerationBackend {}

impl<T> ResearchBackend for T where T: ToolCallingBackend + StreamingGeneration + GenerationBackend {}
