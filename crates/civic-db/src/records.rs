//! Speaker and voting-record lookups.

use async_trait::async_trait;
use sqlx::{Pool, Postgres, Row};
use tracing::{debug, instrument};

use civic_core::{ContentType, EvidenceItem, RecordLookup, Result, VoteRecord};

use crate::escape_like;
use crate::search::{evidence_from_row, motion_from_row, projection};

fn statements_by_speaker_sql() -> String {
    let (table, columns) = projection(ContentType::Statement);
    format!(
        r#"
        SELECT {columns}, NULL::real AS score
        FROM {table} r
        JOIN meeting mt ON mt.id = r.meeting_id
        WHERE r.speaker ILIKE '%' || $1 || '%' ESCAPE '\'
        ORDER BY mt.meeting_date DESC, r.id ASC
        LIMIT $2
        "#
    )
}

fn voting_history_sql() -> String {
    let (_, columns) = projection(ContentType::Motion);
    format!(
        r#"
        SELECT {columns}, NULL::real AS score, v.person, v.vote
        FROM vote v
        JOIN motion r ON r.id = v.motion_id
        JOIN meeting mt ON mt.id = r.meeting_id
        WHERE ($1::text IS NULL OR v.person ILIKE '%' || $1 || '%' ESCAPE '\')
          AND ($2::text IS NULL OR r.tsv @@ websearch_to_tsquery('english', $2))
        ORDER BY mt.meeting_date DESC, r.id ASC, v.person ASC
        LIMIT $3
        "#
    )
}

/// Structured record lookups backed by PostgreSQL.
#[derive(Clone)]
pub struct PgRecordLookup {
    pool: Pool<Postgres>,
}

impl PgRecordLookup {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl RecordLookup for PgRecordLookup {
    #[instrument(skip(self), fields(subsystem = "db", component = "records", op = "statements_by_speaker"))]
    async fn statements_by_speaker(
        &self,
        person: &str,
        limit: usize,
    ) -> Result<Vec<EvidenceItem>> {
        let rows = sqlx::query(&statements_by_speaker_sql())
            .bind(escape_like(person.trim()))
            .bind(limit as i64)
            .fetch_all(&self.pool)
            .await?;

        let items = rows
            .iter()
            .map(|row| evidence_from_row(ContentType::Statement, row))
            .collect::<Result<Vec<_>>>()?;
        debug!(result_count = items.len(), "Speaker lookup complete");
        Ok(items)
    }

    #[instrument(skip(self), fields(subsystem = "db", component = "records", op = "voting_history"))]
    async fn voting_history(
        &self,
        person: Option<&str>,
        motion_query: Option<&str>,
        limit: usize,
    ) -> Result<Vec<VoteRecord>> {
        let rows = sqlx::query(&voting_history_sql())
            .bind(person.map(|p| escape_like(p.trim())))
            .bind(motion_query)
            .bind(limit as i64)
            .fetch_all(&self.pool)
            .await?;

        let mut votes = Vec::with_capacity(rows.len());
        for row in &rows {
            votes.push(VoteRecord {
                motion: motion_from_row(row)?,
                person: row.try_get("person")?,
                vote: row.try_get("vote")?,
            });
        }
        debug!(result_count = votes.len(), "Voting history lookup complete");
        Ok(votes)
    }
}
