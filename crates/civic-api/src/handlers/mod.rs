//! HTTP handlers for civic-api.

pub mod answers;
pub mod health;
pub mod query;
pub mod search;

pub use answers::get_answer;
pub use health::health_check;
pub use query::{query, KeywordResponse, QueryRequest};
pub use search::{search, SearchParams};
