//! Weighted Reciprocal Rank Fusion (RRF) for combining ranked retrievals.

use std::collections::HashMap;

use tracing::debug;

use civic_core::{ContentType, EvidenceItem, EvidenceKey, RankedHit, RankedList};

/// One ranked retrieval and the weight its contributions carry.
#[derive(Debug, Clone)]
pub struct WeightedRanking {
    /// Items in rank order (best first).
    pub items: Vec<EvidenceItem>,
    pub weight: f32,
}

impl WeightedRanking {
    pub fn new(items: Vec<EvidenceItem>, weight: f32) -> Self {
        Self { items, weight }
    }
}

/// Fuse rankings with weighted RRF.
///
/// Each occurrence contributes `weight / (k + rank)` with 1-based rank;
/// contributions for the same `(content_type, id)` are summed. Scores are
/// not normalized. The output is ordered by fused score descending, ties
/// by more recent meeting date and then lower id, and truncated to `limit`.
pub fn rrf_fuse(
    content_type: ContentType,
    rankings: Vec<WeightedRanking>,
    k: f32,
    limit: usize,
) -> RankedList {
    let mut scores: HashMap<EvidenceKey, f32> = HashMap::new();
    let mut items: HashMap<EvidenceKey, EvidenceItem> = HashMap::new();
    let num_lists = rankings.len();

    for ranking in rankings {
        let mut rank = 0usize;
        let mut seen_in_list = std::collections::HashSet::new();
        for item in ranking.items {
            let key = item.key();
            // A record counts once per ranking, at its best position.
            if !seen_in_list.insert(key) {
                continue;
            }
            rank += 1;
            *scores.entry(key).or_insert(0.0) += ranking.weight / (k + rank as f32);
            items.entry(key).or_insert(item);
        }
    }

    let mut hits: Vec<RankedHit> = scores
        .into_iter()
        .filter_map(|(key, score)| items.remove(&key).map(|item| RankedHit { item, score }))
        .collect();

    hits.sort_by(RankedHit::ranking_order);
    hits.truncate(limit);

    debug!(
        input_lists = num_lists,
        rrf_k = k,
        content_type = %content_type,
        result_count = hits.len(),
        "RRF fusion complete"
    );

    RankedList { content_type, hits }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use civic_core::MotionEvidence;
    use uuid::Uuid;

    fn motion(id: u128, day: u32) -> EvidenceItem {
        EvidenceItem::Motion(MotionEvidence {
            id: Uuid::from_u128(id),
            title: format!("Motion {id}"),
            snippet: String::new(),
            meeting_id: Uuid::from_u128(500),
            meeting_date: NaiveDate::from_ymd_opt(2024, 6, day).unwrap(),
            mover: None,
            seconder: None,
            result: None,
            score: 0.0,
        })
    }

    fn ids(list: &RankedList) -> Vec<u128> {
        list.hits.iter().map(|h| h.item.id().as_u128()).collect()
    }

    #[test]
    fn test_single_list_scores() {
        let list = rrf_fuse(
            ContentType::Motion,
            vec![WeightedRanking::new(vec![motion(1, 1), motion(2, 1)], 1.0)],
            50.0,
            10,
        );
        assert_eq!(ids(&list), vec![1, 2]);
        assert!((list.hits[0].score - 1.0 / 51.0).abs() < 1e-6);
        assert!((list.hits[1].score - 1.0 / 52.0).abs() < 1e-6);
    }

    #[test]
    fn test_contributions_are_summed() {
        // 2 appears in both lists and overtakes 1 and 3.
        let list = rrf_fuse(
            ContentType::Motion,
            vec![
                WeightedRanking::new(vec![motion(1, 1), motion(2, 1)], 1.0),
                WeightedRanking::new(vec![motion(3, 1), motion(2, 1)], 1.0),
            ],
            50.0,
            10,
        );
        assert_eq!(list.hits[0].item.id().as_u128(), 2);
        assert!((list.hits[0].score - 2.0 / 52.0).abs() < 1e-6);
        assert_eq!(list.len(), 3);
    }

    #[test]
    fn test_weights_scale_contributions() {
        let list = rrf_fuse(
            ContentType::Motion,
            vec![
                WeightedRanking::new(vec![motion(1, 1)], 0.5),
                WeightedRanking::new(vec![motion(2, 1)], 2.0),
            ],
            50.0,
            10,
        );
        assert_eq!(ids(&list), vec![2, 1]);
        assert!((list.hits[0].score - 2.0 / 51.0).abs() < 1e-6);
        assert!((list.hits[1].score - 0.5 / 51.0).abs() < 1e-6);
    }

    #[test]
    fn test_ties_prefer_recent_then_lower_id() {
        // All rank 1 in their own list: identical fused scores.
        let list = rrf_fuse(
            ContentType::Motion,
            vec![
                WeightedRanking::new(vec![motion(9, 3)], 1.0),
                WeightedRanking::new(vec![motion(4, 7)], 1.0),
                WeightedRanking::new(vec![motion(2, 7)], 1.0),
            ],
            50.0,
            10,
        );
        assert_eq!(ids(&list), vec![2, 4, 9]);
    }

    #[test]
    fn test_truncates_to_limit() {
        let items = (1..=10).map(|i| motion(i, 1)).collect();
        let list = rrf_fuse(
            ContentType::Motion,
            vec![WeightedRanking::new(items, 1.0)],
            50.0,
            3,
        );
        assert_eq!(ids(&list), vec![1, 2, 3]);
    }

    #[test]
    fn test_duplicate_within_list_counted_once() {
        let list = rrf_fuse(
            ContentType::Motion,
            vec![WeightedRanking::new(
                vec![motion(1, 1), motion(1, 1), motion(2, 1)],
                1.0,
            )],
            50.0,
            10,
        );
        assert_eq!(list.len(), 2);
        assert!((list.hits[1].score - 1.0 / 52.0).abs() < 1e-6);
    }

    #[test]
    fn test_empty_input() {
        let list = rrf_fuse(ContentType::Statement, vec![], 50.0, 10);
        assert!(list.is_empty());
        assert_eq!(list.content_type, ContentType::Statement);
    }
}
