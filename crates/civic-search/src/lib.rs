//! # civic-search
//!
//! Hybrid retrieval engine (full-text + vector) for civic-research.
//!
//! This crate provides:
//! - Weighted Reciprocal Rank Fusion over per-method rankings
//! - A hybrid engine scoped to one content type per call
//! - Query embedding that degrades to full-text when the embedding
//!   service is unavailable
//!
//! ## Example
//!
//! ```ignore
//! use civic_search::{HybridSearch, HybridSearchEngine, QueryEmbedder};
//!
//! let engine = HybridSearchEngine::new(store, QueryEmbedder::new(backend));
//! let list = engine
//!     .search_text(ContentType::Motion, "parking bylaw", 8)
//!     .await?;
//! ```

pub mod embedder;
pub mod hybrid;
pub mod rrf;

// Re-export core types
pub use civic_core::*;

pub use embedder::QueryEmbedder;
pub use hybrid::{HybridSearch, HybridSearchConfig, HybridSearchEngine};
pub use rrf::{rrf_fuse, WeightedRanking};
