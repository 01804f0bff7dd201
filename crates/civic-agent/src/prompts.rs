//! Prompt text for planning, synthesis and follow-up suggestions.

use civic_core::EvidenceItem;

use crate::sources::SourceRegistry;

pub const PLANNING_SYSTEM: &str = "You are a research assistant for municipal council records. \
Use the available tools to find motions, votes, statements, transcript excerpts and document \
sections that answer the user's question. Call several tools at once when the searches are \
independent. Each tool result lists evidence as [N] where N is its source number. \
When you have enough evidence, or nothing more can be found, stop calling tools.";

pub const SYNTHESIS_SYSTEM: &str = "You answer questions about municipal council records using \
only the numbered sources provided. Cite every factual claim with its source number in square \
brackets, for example [1] or [2][3]. Only cite numbers that appear in the source list. If the \
sources do not answer the question, say so plainly. Be concise and neutral.";

pub const SUGGESTION_SYSTEM: &str = "Suggest short follow-up questions a resident might ask next \
about council records. Reply with one question per line and nothing else.";

/// The first user message of the planning transcript.
pub fn planning_request(question: &str, context: Option<&str>) -> String {
    match context {
        Some(context) => format!(
            "Earlier in this conversation:\n{context}\n\nCurrent question: {question}"
        ),
        None => format!("Question: {question}"),
    }
}

fn source_block(index: usize, item: &EvidenceItem, snippet_chars: usize) -> String {
    let snippet: String = item.snippet().chars().take(snippet_chars).collect();
    format!(
        "[{index}] {} ({})\n{snippet}",
        item.title(),
        item.provenance()
    )
}

/// User prompt for the streamed answer.
pub fn synthesis_request(
    question: &str,
    context: Option<&str>,
    registry: &SourceRegistry,
    snippet_chars: usize,
) -> String {
    let mut prompt = String::new();
    if let Some(context) = context {
        prompt.push_str("Earlier in this conversation:\n");
        prompt.push_str(context);
        prompt.push_str("\n\n");
    }

    if registry.is_empty() {
        prompt.push_str("Sources: none were found.\n\n");
    } else {
        prompt.push_str("Sources:\n");
        let blocks: Vec<String> = registry
            .iter()
            .map(|(index, item)| source_block(index, item, snippet_chars))
            .collect();
        prompt.push_str(&blocks.join("\n\n"));
        prompt.push_str("\n\n");
    }

    prompt.push_str("Question: ");
    prompt.push_str(question);
    prompt
}

pub fn suggestion_request(question: &str, answer: &str, max: usize) -> String {
    format!("Question: {question}\n\nAnswer: {answer}\n\nSuggest up to {max} follow-up questions.")
}

/// Parse a one-per-line suggestion reply, dropping list markers and blanks.
pub fn parse_suggestions(reply: &str, max: usize) -> Vec<String> {
    reply
        .lines()
        .map(|line| {
            line.trim()
                .trim_start_matches(|c: char| {
                    c.is_ascii_digit() || matches!(c, '-' | '*' | '•' | '.' | ')')
                })
                .trim()
                .to_string()
        })
        .filter(|line| !line.is_empty())
        .take(max)
        .collect()
}
