//! In-memory storage doubles for deterministic testing.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use civic_core::mock::InMemoryStore;
//!
//! let store = InMemoryStore::new().with_item(item.clone());
//! let hits = store.text_search(ContentType::Motion, "parking", 10).await?;
//! ```

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::Utc;
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::models::*;
use crate::traits::{AnswerStore, EvidenceStore, RecordLookup};

/// Evidence, votes and cached answers held in memory.
///
/// Text search scores an item by the fraction of query terms found in its
/// title and snippet. Vector search uses cosine similarity against
/// embeddings registered with [`InMemoryStore::with_embedding`].
#[derive(Clone, Default)]
pub struct InMemoryStore {
    inner: Arc<Inner>,
}

#[derive(Default)]
struct Inner {
    items: Mutex<Vec<EvidenceItem>>,
    embeddings: Mutex<HashMap<EvidenceKey, Vec<f32>>>,
    votes: Mutex<Vec<VoteRecord>>,
    answers: Mutex<HashMap<Uuid, CachedAnswer>>,
    fail_text: AtomicBool,
    fail_vector: AtomicBool,
    fail_lookup: AtomicBool,
    text_calls: AtomicUsize,
    vector_calls: AtomicUsize,
}

fn lock_err<T>(_: std::sync::PoisonError<T>) -> Error {
    Error::Internal("in-memory store lock poisoned".to_string())
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_item(self, item: EvidenceItem) -> Self {
        if let Ok(mut items) = self.inner.items.lock() {
            items.push(item);
        }
        self
    }

    pub fn with_embedding(self, key: EvidenceKey, embedding: Vec<f32>) -> Self {
        if let Ok(mut embeddings) = self.inner.embeddings.lock() {
            embeddings.insert(key, embedding);
        }
        self
    }

    pub fn with_vote(self, vote: VoteRecord) -> Self {
        if let Ok(mut votes) = self.inner.votes.lock() {
            votes.push(vote);
        }
        self
    }

    /// Make every full-text search fail.
    pub fn failing_text(self) -> Self {
        self.inner.fail_text.store(true, Ordering::SeqCst);
        self
    }

    /// Make every vector search fail.
    pub fn failing_vector(self) -> Self {
        self.inner.fail_vector.store(true, Ordering::SeqCst);
        self
    }

    /// Make speaker and voting lookups fail.
    pub fn failing_lookup(self) -> Self {
        self.inner.fail_lookup.store(true, Ordering::SeqCst);
        self
    }

    pub fn text_calls(&self) -> usize {
        self.inner.text_calls.load(Ordering::SeqCst)
    }

    pub fn vector_calls(&self) -> usize {
        self.inner.vector_calls.load(Ordering::SeqCst)
    }

    pub fn answer_count(&self) -> usize {
        self.inner.answers.lock().map(|a| a.len()).unwrap_or(0)
    }

    fn sort_and_truncate(mut items: Vec<EvidenceItem>, limit: usize) -> Vec<EvidenceItem> {
        items.sort_by(|a, b| {
            b.score()
                .partial_cmp(&a.score())
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| b.meeting_date().cmp(&a.meeting_date()))
                .then_with(|| a.id().cmp(&b.id()))
        });
        items.truncate(limit);
        items
    }
}

fn terms(text: &str) -> Vec<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(|t| t.to_lowercase())
        .collect()
}

fn cosine(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let na: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let nb: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if na == 0.0 || nb == 0.0 {
        0.0
    } else {
        dot / (na * nb)
    }
}

#[async_trait]
impl EvidenceStore for InMemoryStore {
    async fn text_search(
        &self,
        content_type: ContentType,
        query: &str,
        limit: usize,
    ) -> Result<Vec<EvidenceItem>> {
        self.inner.text_calls.fetch_add(1, Ordering::SeqCst);
        if self.inner.fail_text.load(Ordering::SeqCst) {
            return Err(Error::Search("full-text index unavailable".to_string()));
        }
        let query_terms = terms(query);
        if query_terms.is_empty() {
            return Ok(Vec::new());
        }
        let items = self.inner.items.lock().map_err(lock_err)?;
        let matches = items
            .iter()
            .filter(|item| item.content_type() == content_type)
            .filter_map(|item| {
                let haystack = terms(&format!("{} {}", item.title(), item.snippet()));
                let found = query_terms
                    .iter()
                    .filter(|t| haystack.contains(t))
                    .count();
                if found == 0 {
                    return None;
                }
                let mut hit = item.clone();
                hit.set_score(found as f32 / query_terms.len() as f32);
                Some(hit)
            })
            .collect();
        Ok(Self::sort_and_truncate(matches, limit))
    }

    async fn vector_search(
        &self,
        content_type: ContentType,
        embedding: &Vector,
        limit: usize,
    ) -> Result<Vec<EvidenceItem>> {
        self.inner.vector_calls.fetch_add(1, Ordering::SeqCst);
        if self.inner.fail_vector.load(Ordering::SeqCst) {
            return Err(Error::Search("vector index unavailable".to_string()));
        }
        let query = embedding.as_slice();
        let items = self.inner.items.lock().map_err(lock_err)?;
        let embeddings = self.inner.embeddings.lock().map_err(lock_err)?;
        let matches = items
            .iter()
            .filter(|item| item.content_type() == content_type)
            .filter_map(|item| {
                let stored = embeddings.get(&item.key())?;
                let mut hit = item.clone();
                hit.set_score(cosine(query, stored));
                Some(hit)
            })
            .collect();
        Ok(Self::sort_and_truncate(matches, limit))
    }
}

#[async_trait]
impl RecordLookup for InMemoryStore {
    async fn statements_by_speaker(
        &self,
        person: &str,
        limit: usize,
    ) -> Result<Vec<EvidenceItem>> {
        if self.inner.fail_lookup.load(Ordering::SeqCst) {
            return Err(Error::Search("speaker lookup unavailable".to_string()));
        }
        let needle = person.to_lowercase();
        let items = self.inner.items.lock().map_err(lock_err)?;
        let mut matches: Vec<EvidenceItem> = items
            .iter()
            .filter(|item| match item {
                EvidenceItem::Statement(s) => s.speaker.to_lowercase().contains(&needle),
                _ => false,
            })
            .cloned()
            .collect();
        matches.sort_by(|a, b| {
            b.meeting_date()
                .cmp(&a.meeting_date())
                .then_with(|| a.id().cmp(&b.id()))
        });
        matches.truncate(limit);
        Ok(matches)
    }

    async fn voting_history(
        &self,
        person: Option<&str>,
        motion_query: Option<&str>,
        limit: usize,
    ) -> Result<Vec<VoteRecord>> {
        if self.inner.fail_lookup.load(Ordering::SeqCst) {
            return Err(Error::Search("voting lookup unavailable".to_string()));
        }
        let person = person.map(str::to_lowercase);
        let motion_terms = motion_query.map(terms).unwrap_or_default();
        let votes = self.inner.votes.lock().map_err(lock_err)?;
        let mut matches: Vec<VoteRecord> = votes
            .iter()
            .filter(|v| {
                person
                    .as_ref()
                    .map_or(true, |p| v.person.to_lowercase().contains(p))
            })
            .filter(|v| {
                if motion_terms.is_empty() {
                    return true;
                }
                let haystack = terms(&format!("{} {}", v.motion.title, v.motion.snippet));
                motion_terms.iter().any(|t| haystack.contains(t))
            })
            .cloned()
            .collect();
        matches.sort_by(|a, b| {
            b.motion
                .meeting_date
                .cmp(&a.motion.meeting_date)
                .then_with(|| a.motion.id.cmp(&b.motion.id))
        });
        matches.truncate(limit);
        Ok(matches)
    }
}

#[async_trait]
impl AnswerStore for InMemoryStore {
    async fn insert_if_absent(&self, answer: &CachedAnswer) -> Result<bool> {
        let mut answers = self.inner.answers.lock().map_err(lock_err)?;
        if answers.contains_key(&answer.id) {
            return Ok(false);
        }
        answers.insert(answer.id, answer.clone());
        Ok(true)
    }

    async fn get(&self, id: Uuid) -> Result<Option<CachedAnswer>> {
        let answers = self.inner.answers.lock().map_err(lock_err)?;
        Ok(answers
            .get(&id)
            .filter(|a| !a.is_expired_at(Utc::now()))
            .cloned())
    }
}
