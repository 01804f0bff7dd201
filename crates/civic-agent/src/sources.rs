//! Request-scoped registry of cited evidence.

use std::collections::HashMap;

use civic_core::{EvidenceItem, EvidenceKey, Source};

/// Deduplicated, 1-indexed evidence list in first-seen order.
///
/// A record keeps the index it was first registered under; later sightings
/// of the same `(content_type, id)` return that index and leave the stored
/// item untouched.
#[derive(Debug, Clone, Default)]
pub struct SourceRegistry {
    items: Vec<EvidenceItem>,
    positions: HashMap<EvidenceKey, usize>,
}

impl SourceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an item and return its citation index.
    pub fn add(&mut self, item: EvidenceItem) -> usize {
        let key = item.key();
        if let Some(&index) = self.positions.get(&key) {
            return index;
        }
        self.items.push(item);
        let index = self.items.len();
        self.positions.insert(key, index);
        index
    }

    /// Register items in order, returning each one's citation index.
    pub fn extend<I>(&mut self, items: I) -> Vec<usize>
    where
        I: IntoIterator<Item = EvidenceItem>,
    {
        items.into_iter().map(|item| self.add(item)).collect()
    }

    pub fn index_of(&self, key: &EvidenceKey) -> Option<usize> {
        self.positions.get(key).copied()
    }

    /// Item at a 1-based citation index.
    pub fn get(&self, index: usize) -> Option<&EvidenceItem> {
        index.checked_sub(1).and_then(|i| self.items.get(i))
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (usize, &EvidenceItem)> {
        self.items.iter().enumerate().map(|(i, item)| (i + 1, item))
    }

    pub fn sources(&self) -> Vec<Source> {
        self.iter()
            .map(|(index, item)| Source {
                index,
                item: item.clone(),
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use civic_core::{StatementEvidence, TranscriptSegmentEvidence};
    use uuid::Uuid;

    fn statement(id: u128, score: f32) -> EvidenceItem {
        EvidenceItem::Statement(StatementEvidence {
            id: Uuid::from_u128(id),
            title: format!("Statement {id}"),
            snippet: String::new(),
            meeting_id: Uuid::from_u128(1),
            meeting_date: NaiveDate::from_ymd_opt(2024, 2, 1).unwrap(),
            speaker: "Mayor Lindqvist".to_string(),
            score,
        })
    }

    fn segment(id: u128) -> EvidenceItem {
        EvidenceItem::TranscriptSegment(TranscriptSegmentEvidence {
            id: Uuid::from_u128(id),
            title: "Segment".to_string(),
            snippet: String::new(),
            meeting_id: Uuid::from_u128(1),
            meeting_date: NaiveDate::from_ymd_opt(2024, 2, 1).unwrap(),
            speaker: None,
            start_seconds: 0.0,
            score: 0.0,
        })
    }

    #[test]
    fn test_first_seen_order_and_dedup() {
        let mut registry = SourceRegistry::new();
        assert_eq!(registry.extend([statement(10, 0.9), statement(11, 0.5)]), vec![1, 2]);
        assert_eq!(registry.extend([statement(11, 0.1), statement(12, 0.4)]), vec![2, 3]);

        assert_eq!(registry.len(), 3);
        let ids: Vec<u128> = registry.iter().map(|(_, i)| i.id().as_u128()).collect();
        assert_eq!(ids, vec![10, 11, 12]);
        // first sighting wins
        assert_eq!(registry.get(2).unwrap().score(), 0.5);
    }

    #[test]
    fn test_same_id_different_type_is_distinct() {
        let mut registry = SourceRegistry::new();
        registry.add(statement(7, 0.0));
        registry.add(segment(7));
        assert_eq!(registry.len(), 2);
        assert_eq!(registry.index_of(&segment(7).key()), Some(2));
    }

    #[test]
    fn test_get_is_one_based() {
        let mut registry = SourceRegistry::new();
        registry.add(statement(1, 0.0));
        assert!(registry.get(0).is_none());
        assert!(registry.get(1).is_some());
        assert!(registry.get(2).is_none());
    }

    #[test]
    fn test_sources_carry_indices() {
        let mut registry = SourceRegistry::new();
        registry.extend([statement(3, 0.0), statement(4, 0.0)]);
        let sources = registry.sources();
        assert_eq!(sources[0].index, 1);
        assert_eq!(sources[1].index, 2);
        assert_eq!(sources[1].item.id(), Uuid::from_u128(4));
    }
}
