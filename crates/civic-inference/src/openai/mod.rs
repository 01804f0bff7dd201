//! OpenAI-compatible inference backend.
//!
//! Works with any endpoint that speaks the OpenAI chat completions and
//! embeddings protocol, including function calling:
//!
//! - OpenAI cloud API
//! - Azure OpenAI
//! - Ollama (in OpenAI compatibility mode)
//! - vLLM
//!
//! # Example
//!
//! ```rust,no_run
//! use civic_inference::openai::{OpenAIBackend, OpenAIConfig};
//! use civic_core::EmbeddingBackend;
//!
//! #[tokio::main]
//! async fn main() {
//!     let config = OpenAIConfig::default()
//!         .with_base_url("http://localhost:11434/v1")
//!         .with_timeout(60);
//!     let backend = OpenAIBackend::new(config).unwrap();
//!
//!     let texts = vec!["parking bylaw amendment".to_string()];
//!     let vectors = backend.embed_texts(&texts).await.unwrap();
//! }
//! ```

mod backend;
mod error;
mod streaming;
mod types;

pub use backend::{OpenAIBackend, OpenAIConfig};
pub use error::{to_civic_error, OpenAIErrorCode};
pub use streaming::parse_sse_stream;
pub use types::*;
