//! Data models for civic records and research answers.

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub use pgvector::Vector;

use crate::error::Error;

// =============================================================================
// CONTENT TYPES
// =============================================================================

/// The four searchable kinds of civic record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContentType {
    Motion,
    Statement,
    TranscriptSegment,
    DocumentSection,
}

impl ContentType {
    /// Every content type, in the order keyword results are reported.
    pub const ALL: [ContentType; 4] = [
        ContentType::Motion,
        ContentType::Statement,
        ContentType::TranscriptSegment,
        ContentType::DocumentSection,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ContentType::Motion => "motion",
            ContentType::Statement => "statement",
            ContentType::TranscriptSegment => "transcript_segment",
            ContentType::DocumentSection => "document_section",
        }
    }

    /// Whether the store maintains an ANN vector index for this type.
    ///
    /// Transcript segments are only full-text indexed.
    pub fn has_vector_index(&self) -> bool {
        !matches!(self, ContentType::TranscriptSegment)
    }
}

impl fmt::Display for ContentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ContentType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "motion" | "motions" => Ok(ContentType::Motion),
            "statement" | "statements" => Ok(ContentType::Statement),
            "transcript_segment" | "transcript_segments" | "transcript" => {
                Ok(ContentType::TranscriptSegment)
            }
            "document_section" | "document_sections" | "document" => {
                Ok(ContentType::DocumentSection)
            }
            other => Err(Error::InvalidInput(format!("unknown content type: {other}"))),
        }
    }
}

// =============================================================================
// EVIDENCE
// =============================================================================

/// A council motion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MotionEvidence {
    pub id: Uuid,
    pub title: String,
    pub snippet: String,
    pub meeting_id: Uuid,
    pub meeting_date: NaiveDate,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mover: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seconder: Option<String>,
    /// Outcome as recorded in the minutes ("carried", "defeated", ...).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<String>,
    #[serde(default)]
    pub score: f32,
}

/// A statement attributed to a named speaker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatementEvidence {
    pub id: Uuid,
    pub title: String,
    pub snippet: String,
    pub meeting_id: Uuid,
    pub meeting_date: NaiveDate,
    pub speaker: String,
    #[serde(default)]
    pub score: f32,
}

/// A slice of a meeting transcript.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TranscriptSegmentEvidence {
    pub id: Uuid,
    pub title: String,
    pub snippet: String,
    pub meeting_id: Uuid,
    pub meeting_date: NaiveDate,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub speaker: Option<String>,
    /// Offset from the start of the recording.
    pub start_seconds: f64,
    #[serde(default)]
    pub score: f32,
}

/// A section of an agenda or staff-report document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentSectionEvidence {
    pub id: Uuid,
    pub title: String,
    pub snippet: String,
    pub meeting_id: Uuid,
    pub meeting_date: NaiveDate,
    pub document_title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page: Option<i32>,
    #[serde(default)]
    pub score: f32,
}

/// One retrievable record, tagged by content type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EvidenceItem {
    Motion(MotionEvidence),
    Statement(StatementEvidence),
    TranscriptSegment(TranscriptSegmentEvidence),
    DocumentSection(DocumentSectionEvidence),
}

/// Identity of an evidence item for deduplication.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EvidenceKey {
    pub content_type: ContentType,
    pub id: Uuid,
}

impl EvidenceItem {
    pub fn content_type(&self) -> ContentType {
        match self {
            EvidenceItem::Motion(_) => ContentType::Motion,
            EvidenceItem::Statement(_) => ContentType::Statement,
            EvidenceItem::TranscriptSegment(_) => ContentType::TranscriptSegment,
            EvidenceItem::DocumentSection(_) => ContentType::DocumentSection,
        }
    }

    pub fn id(&self) -> Uuid {
        match self {
            EvidenceItem::Motion(m) => m.id,
            EvidenceItem::Statement(s) => s.id,
            EvidenceItem::TranscriptSegment(t) => t.id,
            EvidenceItem::DocumentSection(d) => d.id,
        }
    }

    pub fn key(&self) -> EvidenceKey {
        EvidenceKey {
            content_type: self.content_type(),
            id: self.id(),
        }
    }

    pub fn title(&self) -> &str {
        match self {
            EvidenceItem::Motion(m) => &m.title,
            EvidenceItem::Statement(s) => &s.title,
            EvidenceItem::TranscriptSegment(t) => &t.title,
            EvidenceItem::DocumentSection(d) => &d.title,
        }
    }

    pub fn snippet(&self) -> &str {
        match self {
            EvidenceItem::Motion(m) => &m.snippet,
            EvidenceItem::Statement(s) => &s.snippet,
            EvidenceItem::TranscriptSegment(t) => &t.snippet,
            EvidenceItem::DocumentSection(d) => &d.snippet,
        }
    }

    pub fn meeting_id(&self) -> Uuid {
        match self {
            EvidenceItem::Motion(m) => m.meeting_id,
            EvidenceItem::Statement(s) => s.meeting_id,
            EvidenceItem::TranscriptSegment(t) => t.meeting_id,
            EvidenceItem::DocumentSection(d) => d.meeting_id,
        }
    }

    pub fn meeting_date(&self) -> NaiveDate {
        match self {
            EvidenceItem::Motion(m) => m.meeting_date,
            EvidenceItem::Statement(s) => s.meeting_date,
            EvidenceItem::TranscriptSegment(t) => t.meeting_date,
            EvidenceItem::DocumentSection(d) => d.meeting_date,
        }
    }

    /// The person the record is attributed to, if any. A motion is
    /// attributed to its mover.
    pub fn speaker(&self) -> Option<&str> {
        match self {
            EvidenceItem::Motion(m) => m.mover.as_deref(),
            EvidenceItem::Statement(s) => Some(&s.speaker),
            EvidenceItem::TranscriptSegment(t) => t.speaker.as_deref(),
            EvidenceItem::DocumentSection(_) => None,
        }
    }

    /// Retrieval score from the store (ts_rank or cosine similarity).
    pub fn score(&self) -> f32 {
        match self {
            EvidenceItem::Motion(m) => m.score,
            EvidenceItem::Statement(s) => s.score,
            EvidenceItem::TranscriptSegment(t) => t.score,
            EvidenceItem::DocumentSection(d) => d.score,
        }
    }

    pub fn set_score(&mut self, score: f32) {
        match self {
            EvidenceItem::Motion(m) => m.score = score,
            EvidenceItem::Statement(s) => s.score = score,
            EvidenceItem::TranscriptSegment(t) => t.score = score,
            EvidenceItem::DocumentSection(d) => d.score = score,
        }
    }

    /// One-line provenance shown next to a citation, e.g.
    /// `motion, 2024-03-12, moved by Cllr. Diaz`.
    pub fn provenance(&self) -> String {
        let date = self.meeting_date();
        match self {
            EvidenceItem::Motion(m) => {
                let mut line = format!("motion, {date}");
                if let Some(mover) = &m.mover {
                    line.push_str(&format!(", moved by {mover}"));
                }
                if let Some(result) = &m.result {
                    line.push_str(&format!(", {result}"));
                }
                line
            }
            EvidenceItem::Statement(s) => format!("statement, {date}, {}", s.speaker),
            EvidenceItem::TranscriptSegment(t) => {
                let mins = (t.start_seconds / 60.0).floor() as i64;
                let secs = (t.start_seconds % 60.0).floor() as i64;
                match &t.speaker {
                    Some(speaker) => format!("transcript, {date} @{mins}:{secs:02}, {speaker}"),
                    None => format!("transcript, {date} @{mins}:{secs:02}"),
                }
            }
            EvidenceItem::DocumentSection(d) => match d.page {
                Some(page) => format!("document, {date}, {} p.{page}", d.document_title),
                None => format!("document, {date}, {}", d.document_title),
            },
        }
    }
}

// =============================================================================
// RANKED RESULTS
// =============================================================================

/// One fused search hit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankedHit {
    pub item: EvidenceItem,
    /// Fused RRF score.
    pub score: f32,
}

impl RankedHit {
    /// Result ordering: score descending, then more recent meeting, then
    /// lower id.
    pub fn ranking_order(a: &RankedHit, b: &RankedHit) -> Ordering {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(Ordering::Equal)
            .then_with(|| b.item.meeting_date().cmp(&a.item.meeting_date()))
            .then_with(|| a.item.id().cmp(&b.item.id()))
    }
}

/// Ordered hits for a single content type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankedList {
    pub content_type: ContentType,
    pub hits: Vec<RankedHit>,
}

impl RankedList {
    pub fn empty(content_type: ContentType) -> Self {
        Self {
            content_type,
            hits: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.hits.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hits.is_empty()
    }

    pub fn items(&self) -> impl Iterator<Item = &EvidenceItem> {
        self.hits.iter().map(|h| &h.item)
    }

    pub fn into_items(self) -> Vec<EvidenceItem> {
        self.hits.into_iter().map(|h| h.item).collect()
    }
}

// =============================================================================
// VOTES & CONVERSATION
// =============================================================================

/// One councillor's recorded vote on one motion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VoteRecord {
    pub motion: MotionEvidence,
    pub person: String,
    /// "yes", "no", "abstain" or "absent".
    pub vote: String,
}

/// A prior question/answer exchange supplied by the caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationTurn {
    pub question: String,
    pub answer: String,
}

// =============================================================================
// ANSWERS
// =============================================================================

/// Advisory confidence derived from how much evidence backs an answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConfidenceLevel {
    High,
    Medium,
    Low,
}

impl ConfidenceLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConfidenceLevel::High => "high",
            ConfidenceLevel::Medium => "medium",
            ConfidenceLevel::Low => "low",
        }
    }
}

/// A numbered source cited by an answer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Source {
    /// 1-based citation index.
    pub index: usize,
    pub item: EvidenceItem,
}

/// A completed research answer, persisted for shared-link replay.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CachedAnswer {
    pub id: Uuid,
    pub query: String,
    pub answer: String,
    pub sources: Vec<Source>,
    pub source_count: usize,
    pub confidence: ConfidenceLevel,
    pub suggestions: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl CachedAnswer {
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }
}
