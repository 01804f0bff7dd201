//! # civic-core
//!
//! Core types, traits, and abstractions for civic-research.
//!
//! This crate provides the data model for civic records, the research event
//! vocabulary, and the storage and inference traits the other crates
//! implement.

pub mod defaults;
pub mod error;
pub mod events;
pub mod intent;
pub mod logging;
pub mod models;
pub mod traits;

// In-memory storage doubles for tests
#[cfg(any(test, feature = "mock"))]
pub mod mock;

// Re-export commonly used types at crate root
pub use error::{Error, Result};
pub use events::AgentEvent;
pub use intent::{classify, Intent};
pub use models::*;
pub use traits::*;
