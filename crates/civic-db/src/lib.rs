//! # civic-db
//!
//! PostgreSQL database layer for civic-research.
//!
//! This crate provides:
//! - Connection pool management
//! - Full-text search per content type with PostgreSQL tsvector
//! - Vector search with pgvector
//! - Speaker and voting-record lookups
//! - The write-once cached answer repository
//!
//! ## Example
//!
//! ```rust,ignore
//! use civic_db::Database;
//! use civic_core::{ContentType, EvidenceStore};
//!
//! let db = Database::connect("postgres://localhost/civic").await?;
//! let hits = db.search.text_search(ContentType::Motion, "parking bylaw", 16).await?;
//! ```

pub mod answers;
pub mod pool;
pub mod records;
pub mod search;

pub use answers::PgAnswerRepository;
pub use pool::{create_pool, PoolConfig, PoolStats};
pub use records::PgRecordLookup;
pub use search::PgEvidenceSearch;

use civic_core::Result;

/// Escape LIKE/ILIKE wildcard characters (`%`, `_`, `\`) in user input.
pub fn escape_like(input: &str) -> String {
    input
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_")
}

/// Combined database context with all repositories.
#[derive(Clone)]
pub struct Database {
    pub pool: sqlx::Pool<sqlx::Postgres>,
    /// Ranked evidence retrieval.
    pub search: PgEvidenceSearch,
    /// Speaker and vote lookups.
    pub records: PgRecordLookup,
    /// Cached research answers.
    pub answers: PgAnswerRepository,
}

impl Database {
    pub fn new(pool: sqlx::Pool<sqlx::Postgres>) -> Self {
        Self {
            search: PgEvidenceSearch::new(pool.clone()),
            records: PgRecordLookup::new(pool.clone()),
            answers: PgAnswerRepository::new(pool.clone()),
            pool,
        }
    }

    /// Connect with the default pool configuration.
    pub async fn connect(database_url: &str) -> Result<Self> {
        Self::connect_with_config(database_url, PoolConfig::default()).await
    }

    pub async fn connect_with_config(database_url: &str, config: PoolConfig) -> Result<Self> {
        let pool = create_pool(database_url, config).await?;
        Ok(Self::new(pool))
    }

    /// Run pending migrations.
    #[cfg(feature = "migrations")]
    pub async fn migrate(&self) -> Result<()> {
        sqlx::migrate!("../../migrations")
            .run(&self.pool)
            .await
            .map_err(|e| civic_core::Error::Database(sqlx::Error::Migrate(Box::new(e))))?;
        Ok(())
    }

    pub fn pool(&self) -> &sqlx::Pool<sqlx::Postgres> {
        &self.pool
    }

    /// Periodic maintenance: log pool occupancy and delete expired answers.
    /// Returns the number of answers removed.
    pub async fn housekeeping(&self) -> Result<u64> {
        PoolStats::of(&self.pool).log();
        self.answers.purge_expired().await
    }
}
