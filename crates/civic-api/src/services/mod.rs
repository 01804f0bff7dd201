//! Service layer for the HTTP handlers.

pub mod search_cache;

pub use search_cache::SearchCache;
