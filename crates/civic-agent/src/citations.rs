//! Citation handling and answer confidence.
//!
//! Answers cite evidence as `[N]`, a 1-based index into the request's
//! [`SourceRegistry`]. Only one to three digit markers are citations, so
//! bracketed years such as `[2024]` pass through untouched. Confidence is
//! derived from the registry size alone and is advisory.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use civic_core::ConfidenceLevel;

use crate::sources::SourceRegistry;

static CITATION: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\[(\d{1,3})\]").expect("citation pattern is valid"));

/// Resolved citation metadata for a completed answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Resolution {
    pub source_count: usize,
    pub confidence: ConfidenceLevel,
}

/// ≥6 sources is high, 3–5 medium, fewer is low.
pub fn confidence_for(source_count: usize) -> ConfidenceLevel {
    match source_count {
        n if n >= 6 => ConfidenceLevel::High,
        3..=5 => ConfidenceLevel::Medium,
        _ => ConfidenceLevel::Low,
    }
}

pub fn resolve(registry: &SourceRegistry) -> Resolution {
    let source_count = registry.len();
    Resolution {
        source_count,
        confidence: confidence_for(source_count),
    }
}

/// Cited indices in order of appearance. Repeats are kept.
pub fn extract_citations(text: &str) -> Vec<usize> {
    CITATION
        .captures_iter(text)
        .filter_map(|c| c.get(1))
        .filter_map(|m| m.as_str().parse().ok())
        .collect()
}

/// Remove `[N]` markers outside `1..=max`.
pub fn strip_invalid_citations(text: &str, max: usize) -> String {
    CITATION
        .replace_all(text, |caps: &regex::Captures<'_>| {
            let valid = caps[1]
                .parse::<usize>()
                .map(|n| (1..=max).contains(&n))
                .unwrap_or(false);
            if valid {
                caps[0].to_string()
            } else {
                String::new()
            }
        })
        .into_owned()
}

pub fn cited_indices_valid(text: &str, source_count: usize) -> bool {
    extract_citations(text)
        .into_iter()
        .all(|n| (1..=source_count).contains(&n))
}
