//! Query intent classification.
//!
//! Decides whether a query is a short keyword lookup (answered with ranked
//! results) or a natural-language question (answered by the research loop).
//! Pure and deterministic; the first matching rule wins.

use serde::{Deserialize, Serialize};

/// How a query will be answered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Intent {
    Question,
    Keyword,
}

impl Intent {
    pub fn as_str(&self) -> &'static str {
        match self {
            Intent::Question => "question",
            Intent::Keyword => "keyword",
        }
    }
}

/// Phrases that open a request for an explanation.
const OPENERS: &[&str] = &[
    "tell me",
    "explain",
    "describe",
    "compare",
    "show me",
    "give me",
    "what's",
    "how many",
    "summarize",
    "list the",
];

const QUESTION_WORDS: &[&str] = &[
    "who", "what", "when", "where", "why", "how", "is", "are", "was", "were", "do", "does", "did",
    "can", "could", "will", "would", "should", "has", "have",
];

/// Classify a raw query.
pub fn classify(query: &str) -> Intent {
    let trimmed = query.trim();
    if trimmed.is_empty() {
        return Intent::Keyword;
    }
    if trimmed.ends_with('?') {
        return Intent::Question;
    }

    let lower = trimmed.to_lowercase();
    if OPENERS.iter().any(|opener| starts_with_phrase(&lower, opener)) {
        return Intent::Question;
    }

    let words: Vec<&str> = lower.split_whitespace().collect();
    let first = words[0].trim_matches(|c: char| !c.is_alphanumeric());
    if QUESTION_WORDS.contains(&first) {
        return Intent::Question;
    }

    match words.len() {
        0..=3 => Intent::Keyword,
        _ => Intent::Question,
    }
}

/// `phrase` is a prefix of `text` ending on a word boundary.
fn starts_with_phrase(text: &str, phrase: &str) -> bool {
    match text.strip_prefix(phrase) {
        Some(rest) => rest
            .chars()
            .next()
            .map_or(true, |c| !c.is_alphanumeric() && c != '\''),
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_is_keyword() {
        assert_eq!(classify(""), Intent::Keyword);
        assert_eq!(classify("   \t"), Intent::Keyword);
    }

    #[test]
    fn test_question_mark_wins() {
        assert_eq!(classify("parking?"), Intent::Question);
        assert_eq!(
            classify("What did council decide about the parking bylaw?"),
            Intent::Question
        );
    }

    #[test]
    fn test_openers() {
        assert_eq!(classify("Tell me about the budget"), Intent::Question);
        assert_eq!(classify("explain zoning"), Intent::Question);
        assert_eq!(classify("what's new"), Intent::Question);
        assert_eq!(classify("HOW MANY motions"), Intent::Question);
        assert_eq!(classify("summarize"), Intent::Question);
    }

    #[test]
    fn test_opener_requires_word_boundary() {
        // "explainer" is not "explain"
        assert_eq!(classify("explainer video"), Intent::Keyword);
        assert_eq!(classify("describes"), Intent::Keyword);
    }

    #[test]
    fn test_question_words() {
        assert_eq!(classify("who moved"), Intent::Question);
        assert_eq!(classify("Did council vote"), Intent::Question);
        assert_eq!(classify("when"), Intent::Question);
    }

    #[test]
    fn test_short_queries_are_keywords() {
        assert_eq!(classify("parking bylaw"), Intent::Keyword);
        assert_eq!(classify("budget"), Intent::Keyword);
        assert_eq!(classify("transit fare increase"), Intent::Keyword);
    }

    #[test]
    fn test_longer_queries_are_questions() {
        assert_eq!(classify("parking bylaw council vote"), Intent::Question);
        assert_eq!(
            classify("Diaz position on downtown parking bylaw"),
            Intent::Question
        );
    }

    #[test]
    fn test_deterministic() {
        let q = "parking bylaw";
        assert_eq!(classify(q), classify(q));
    }

    #[test]
    fn test_intent_serialization() {
        assert_eq!(serde_json::to_string(&Intent::Keyword).unwrap(), "\"keyword\"");
        assert_eq!(Intent::Question.as_str(), "question");
    }
}
