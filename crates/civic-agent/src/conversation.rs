//! Caller-supplied conversation memory.
//!
//! Turns are never stored server-side. Each request carries its prior turns;
//! this module decides whether they are still on topic and renders the most
//! recent ones into a bounded context string for the research loop.

use std::collections::BTreeSet;

use civic_core::{defaults, ConversationTurn};

const STOPWORDS: &[&str] = &[
    "about", "after", "again", "all", "also", "and", "any", "are", "because", "been", "before",
    "being", "between", "both", "but", "can", "could", "did", "does", "doing", "down", "during",
    "each", "few", "for", "from", "further", "had", "has", "have", "having", "her", "here",
    "hers", "him", "his", "how", "into", "its", "itself", "just", "more", "most", "not", "now",
    "off", "once", "only", "other", "our", "ours", "out", "over", "own", "same", "she", "should",
    "some", "such", "than", "that", "the", "their", "theirs", "them", "then", "there", "these",
    "they", "this", "those", "through", "too", "under", "until", "very", "was", "were", "what",
    "when", "where", "which", "while", "who", "whom", "why", "will", "with", "would", "you",
    "your", "yours", "tell", "please", "know",
];

/// Lowercased alphanumeric tokens of length ≥ 3 that are not stopwords.
pub fn significant_words(text: &str) -> BTreeSet<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|w| w.chars().count() >= 3)
        .map(str::to_lowercase)
        .filter(|w| !STOPWORDS.contains(&w.as_str()))
        .collect()
}

/// Bounds applied to caller-supplied turns.
#[derive(Debug, Clone)]
pub struct ConversationManager {
    max_turns: usize,
    char_budget: usize,
}

impl Default for ConversationManager {
    fn default() -> Self {
        Self {
            max_turns: defaults::MAX_TURNS,
            char_budget: defaults::CONTEXT_CHAR_BUDGET,
        }
    }
}

impl ConversationManager {
    pub fn new(max_turns: usize, char_budget: usize) -> Self {
        Self {
            max_turns,
            char_budget,
        }
    }

    pub fn char_budget(&self) -> usize {
        self.char_budget
    }

    /// The most recent `max_turns` turns, oldest first.
    pub fn retained<'a>(&self, turns: &'a [ConversationTurn]) -> &'a [ConversationTurn] {
        let start = turns.len().saturating_sub(self.max_turns);
        &turns[start..]
    }

    /// Whether the new query starts a new topic.
    ///
    /// Compares significant words of the query against the most recent
    /// turn's question and answer. A query with no significant words of its
    /// own ("and why?") is treated as a follow-up.
    pub fn should_reset(&self, new_query: &str, turns: &[ConversationTurn]) -> bool {
        let Some(last) = turns.last() else {
            return false;
        };
        let query_words = significant_words(new_query);
        if query_words.is_empty() {
            return false;
        }
        let mut previous = significant_words(&last.question);
        previous.extend(significant_words(&last.answer));
        query_words.is_disjoint(&previous)
    }

    /// Render retained turns within the character budget.
    ///
    /// Filled from the most recent turn backwards. The most recent turn is
    /// truncated if it alone exceeds the budget; older turns that do not fit
    /// are dropped along with everything before them.
    pub fn build_context(&self, turns: &[ConversationTurn]) -> String {
        const SEPARATOR: &str = "\n\n";

        let mut kept: Vec<String> = Vec::new();
        let mut used = 0usize;

        for (i, turn) in self.retained(turns).iter().rev().enumerate() {
            let rendered = format!("Q: {}\nA: {}", turn.question, turn.answer);
            let sep = if i == 0 { 0 } else { SEPARATOR.len() };
            let len = rendered.chars().count();

            if used + sep + len <= self.char_budget {
                used += sep + len;
                kept.push(rendered);
            } else if i == 0 {
                kept.push(rendered.chars().take(self.char_budget).collect());
                break;
            } else {
                break;
            }
        }

        kept.reverse();
        kept.join(SEPARATOR)
    }

    /// Context for a request, or `None` when the conversation resets.
    pub fn context_for(
        &self,
        new_query: &str,
        turns: &[ConversationTurn],
        new_search: bool,
    ) -> Option<String> {
        if new_search || turns.is_empty() || self.should_reset(new_query, turns) {
            return None;
        }
        let context = self.build_context(turns);
        (!context.is_empty()).then_some(context)
    }
}
