//! Full-text and vector retrieval per content type.
//!
//! Full-text ranking uses `websearch_to_tsquery('english', ..)` against each
//! table's generated `tsv` column and `ts_rank`. Vector ranking uses pgvector
//! cosine distance; the reported score is `1 - distance`. Both order ties by
//! meeting date (newest first) and then id.

use std::time::Instant;

use async_trait::async_trait;
use pgvector::Vector;
use sqlx::postgres::PgRow;
use sqlx::{Pool, Postgres, Row};
use tracing::{debug, instrument};

use civic_core::{
    defaults, ContentType, DocumentSectionEvidence, EvidenceItem, EvidenceStore,
    MotionEvidence, Result, StatementEvidence, TranscriptSegmentEvidence,
};

/// Table and projected columns for a content type. Every projection aliases
/// the record table as `r` and joins `meeting mt`.
pub(crate) fn projection(content_type: ContentType) -> (&'static str, String) {
    let snippet = format!("left(r.body, {}) AS snippet", defaults::SNIPPET_LENGTH);
    match content_type {
        ContentType::Motion => (
            "motion",
            format!(
                "r.id, r.meeting_id, mt.meeting_date, r.title, {snippet}, \
                 r.mover, r.seconder, r.result"
            ),
        ),
        ContentType::Statement => (
            "statement",
            format!(
                "r.id, r.meeting_id, mt.meeting_date, \
                 CASE WHEN r.topic = '' THEN mt.title ELSE r.topic END AS title, \
                 {snippet}, r.speaker"
            ),
        ),
        ContentType::TranscriptSegment => (
            "transcript_segment",
            format!(
                "r.id, r.meeting_id, mt.meeting_date, mt.title AS title, {snippet}, \
                 r.speaker, r.start_seconds"
            ),
        ),
        ContentType::DocumentSection => (
            "document_section",
            format!(
                "r.id, r.meeting_id, mt.meeting_date, \
                 CASE WHEN r.heading = '' THEN r.document_title ELSE r.heading END AS title, \
                 {snippet}, r.document_title, r.page"
            ),
        ),
    }
}

pub(crate) fn text_search_sql(content_type: ContentType) -> String {
    let (table, columns) = projection(content_type);
    format!(
        r#"
        SELECT {columns},
               ts_rank(r.tsv, websearch_to_tsquery('english', $1)) AS score
        FROM {table} r
        JOIN meeting mt ON mt.id = r.meeting_id
        WHERE r.tsv @@ websearch_to_tsquery('english', $1)
        ORDER BY score DESC, mt.meeting_date DESC, r.id ASC
        LIMIT $2
        "#
    )
}

pub(crate) fn vector_search_sql(content_type: ContentType) -> String {
    let (table, columns) = projection(content_type);
    format!(
        r#"
        SELECT {columns},
               (1.0 - (r.embedding <=> $1::vector))::real AS score
        FROM {table} r
        JOIN meeting mt ON mt.id = r.meeting_id
        WHERE r.embedding IS NOT NULL
        ORDER BY r.embedding <=> $1::vector, mt.meeting_date DESC, r.id ASC
        LIMIT $2
        "#
    )
}

pub(crate) fn motion_from_row(row: &PgRow) -> Result<MotionEvidence> {
    Ok(MotionEvidence {
        id: row.try_get("id")?,
        title: row.try_get("title")?,
        snippet: row.try_get("snippet")?,
        meeting_id: row.try_get("meeting_id")?,
        meeting_date: row.try_get("meeting_date")?,
        mover: row.try_get("mover")?,
        seconder: row.try_get("seconder")?,
        result: row.try_get("result")?,
        score: row.try_get::<Option<f32>, _>("score")?.unwrap_or(0.0),
    })
}

/// Map a projected row to its evidence variant.
pub(crate) fn evidence_from_row(content_type: ContentType, row: &PgRow) -> Result<EvidenceItem> {
    let score: f32 = row.try_get::<Option<f32>, _>("score")?.unwrap_or(0.0);
    let item = match content_type {
        ContentType::Motion => EvidenceItem::Motion(motion_from_row(row)?),
        ContentType::Statement => EvidenceItem::Statement(StatementEvidence {
            id: row.try_get("id")?,
            title: row.try_get("title")?,
            snippet: row.try_get("snippet")?,
            meeting_id: row.try_get("meeting_id")?,
            meeting_date: row.try_get("meeting_date")?,
            speaker: row.try_get("speaker")?,
            score,
        }),
        ContentType::TranscriptSegment => {
            EvidenceItem::TranscriptSegment(TranscriptSegmentEvidence {
                id: row.try_get("id")?,
                title: row.try_get("title")?,
                snippet: row.try_get("snippet")?,
                meeting_id: row.try_get("meeting_id")?,
                meeting_date: row.try_get("meeting_date")?,
                speaker: row.try_get("speaker")?,
                start_seconds: row.try_get("start_seconds")?,
                score,
            })
        }
        ContentType::DocumentSection => EvidenceItem::DocumentSection(DocumentSectionEvidence {
            id: row.try_get("id")?,
            title: row.try_get("title")?,
            snippet: row.try_get("snippet")?,
            meeting_id: row.try_get("meeting_id")?,
            meeting_date: row.try_get("meeting_date")?,
            document_title: row.try_get("document_title")?,
            page: row.try_get("page")?,
            score,
        }),
    };
    Ok(item)
}

/// Evidence retrieval backed by PostgreSQL.
#[derive(Clone)]
pub struct PgEvidenceSearch {
    pool: Pool<Postgres>,
}

impl PgEvidenceSearch {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl EvidenceStore for PgEvidenceSearch {
    #[instrument(skip(self), fields(subsystem = "db", component = "evidence_search", op = "text_search"))]
    async fn text_search(
        &self,
        content_type: ContentType,
        query: &str,
        limit: usize,
    ) -> Result<Vec<EvidenceItem>> {
        let start = Instant::now();
        let rows = sqlx::query(&text_search_sql(content_type))
            .bind(query)
            .bind(limit as i64)
            .fetch_all(&self.pool)
            .await?;

        let items = rows
            .iter()
            .map(|row| evidence_from_row(content_type, row))
            .collect::<Result<Vec<_>>>()?;

        debug!(
            result_count = items.len(),
            duration_ms = start.elapsed().as_millis() as u64,
            "Full-text retrieval complete"
        );
        Ok(items)
    }

    #[instrument(skip(self, embedding), fields(subsystem = "db", component = "evidence_search", op = "vector_search"))]
    async fn vector_search(
        &self,
        content_type: ContentType,
        embedding: &Vector,
        limit: usize,
    ) -> Result<Vec<EvidenceItem>> {
        if !content_type.has_vector_index() {
            return Ok(Vec::new());
        }
        let start = Instant::now();
        let rows = sqlx::query(&vector_search_sql(content_type))
            .bind(embedding)
            .bind(limit as i64)
            .fetch_all(&self.pool)
            .await?;

        let items = rows
            .iter()
            .map(|row| evidence_from_row(content_type, row))
            .collect::<Result<Vec<_>>>()?;

        debug!(
            result_count = items.len(),
            duration_ms = start.elapsed().as_millis() as u64,
            "Vector retrieval complete"
        );
        Ok(items)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_text_sql_orders_with_tie_breaks() {
        let sql = text_search_sql(ContentType::Motion);
        assert!(sql.contains("FROM motion r"));
        assert!(sql.contains("websearch_to_tsquery('english', $1)"));
        assert!(sql.contains("ORDER BY score DESC, mt.meeting_date DESC, r.id ASC"));
    }

    #[test]
    fn test_vector_sql_uses_cosine_distance() {
        let sql = vector_search_sql(ContentType::DocumentSection);
        assert!(sql.contains("FROM document_section r"));
        assert!(sql.contains("1.0 - (r.embedding <=> $1::vector)"));
    }

    #[test]
    fn test_projection_tables() {
        assert_eq!(projection(ContentType::Statement).0, "statement");
        assert_eq!(
            projection(ContentType::TranscriptSegment).0,
            "transcript_segment"
        );
        assert!(projection(ContentType::TranscriptSegment)
            .1
            .contains("r.start_seconds"));
    }
}
