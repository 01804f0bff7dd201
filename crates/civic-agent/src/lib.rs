//! # civic-agent
//!
//! Tool-calling research agent for civic-research.
//!
//! This crate provides:
//! - The closed tool registry (content searches, voting history, speaker
//!   statements, current date) with schema-validated arguments
//! - The request-scoped source registry and citation handling
//! - Conversation context bounding and topic-change detection
//! - The orchestrator that plans, calls tools, and streams a cited answer
//! - A spawned producer task feeding a bounded event channel
//!
//! ## Example
//!
//! ```ignore
//! use civic_agent::{spawn_research, ResearchAgent, ResearchRequest, ToolRegistry};
//!
//! let tools = ToolRegistry::civic(search, records);
//! let agent = Arc::new(ResearchAgent::new(backend, tools).with_answer_store(answers));
//! let mut events = spawn_research(agent, ResearchRequest::new("What did council decide about parking?"));
//! while let Some(event) = events.next().await {
//!     println!("{}", event.event_type());
//! }
//! ```

pub mod chunker;
pub mod citations;
pub mod conversation;
pub mod orchestrator;
pub mod prompts;
pub mod sources;
pub mod stream;
pub mod tools;

pub use chunker::WordChunker;
pub use citations::{
    cited_indices_valid, confidence_for, extract_citations, resolve, strip_invalid_citations,
    Resolution,
};
pub use conversation::{significant_words, ConversationManager};
pub use orchestrator::{AgentConfig, ResearchAgent, ResearchRequest};
pub use sources::SourceRegistry;
pub use stream::{spawn_research, spawn_research_with_capacity, EventStream};
pub use tools::{Tool, ToolExecutionError, ToolOutput, ToolRegistry};
