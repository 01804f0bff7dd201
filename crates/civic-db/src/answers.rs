//! Write-once repository for completed research answers.

use async_trait::async_trait;
use sqlx::{Pool, Postgres, Row};
use tracing::{debug, info, instrument};
use uuid::Uuid;

use civic_core::{AnswerStore, CachedAnswer, Result};

/// Cached answers stored as JSONB payloads keyed by id.
#[derive(Clone)]
pub struct PgAnswerRepository {
    pool: Pool<Postgres>,
}

impl PgAnswerRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    /// Delete expired answers. Returns the number removed.
    pub async fn purge_expired(&self) -> Result<u64> {
        let result = sqlx::query("DELETE FROM cached_answer WHERE expires_at <= now()")
            .execute(&self.pool)
            .await?;
        let removed = result.rows_affected();
        if removed > 0 {
            info!(
                subsystem = "db",
                component = "answers",
                op = "purge_expired",
                removed,
                "Purged expired cached answers"
            );
        }
        Ok(removed)
    }
}

#[async_trait]
impl AnswerStore for PgAnswerRepository {
    #[instrument(skip(self, answer), fields(subsystem = "db", component = "answers", op = "insert", answer_id = %answer.id))]
    async fn insert_if_absent(&self, answer: &CachedAnswer) -> Result<bool> {
        let payload = serde_json::to_value(answer)?;
        let result = sqlx::query(
            r#"
            INSERT INTO cached_answer (id, query, payload, created_at, expires_at)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (id) DO NOTHING
            "#,
        )
        .bind(answer.id)
        .bind(&answer.query)
        .bind(payload)
        .bind(answer.created_at)
        .bind(answer.expires_at)
        .execute(&self.pool)
        .await?;

        let inserted = result.rows_affected() == 1;
        debug!(inserted, "Cached answer write");
        Ok(inserted)
    }

    #[instrument(skip(self), fields(subsystem = "db", component = "answers", op = "get"))]
    async fn get(&self, id: Uuid) -> Result<Option<CachedAnswer>> {
        let row = sqlx::query(
            "SELECT payload FROM cached_answer WHERE id = $1 AND expires_at > now()",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => {
                let payload: serde_json::Value = row.try_get("payload")?;
                Ok(Some(serde_json::from_value(payload)?))
            }
            None => Ok(None),
        }
    }
}
