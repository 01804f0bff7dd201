//! Tools the research model can call.
//!
//! Each tool is a typed handler with a JSON Schema argument contract derived
//! from its argument struct. Arguments are validated before dispatch; an
//! unknown tool name or bad arguments is a [`ToolExecutionError`], which the
//! orchestrator reports as an observation rather than failing the request.

use std::collections::BTreeSet;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use schemars::{schema_for, JsonSchema};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, instrument};
use uuid::Uuid;

use civic_core::{
    defaults, ContentType, EvidenceItem, RankedList, RecordLookup, ToolDefinition, VoteRecord,
};
use civic_search::HybridSearch;

use crate::sources::SourceRegistry;

/// Upper bound for a tool's `limit` argument.
pub const MAX_TOOL_LIMIT: u32 = defaults::MAX_CANDIDATE_LIMIT as u32;

/// A single tool call that did not produce a result.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ToolExecutionError {
    #[error("unknown tool: {0}")]
    UnknownTool(String),

    #[error("invalid arguments for {tool}: {message}")]
    InvalidArguments { tool: String, message: String },

    #[error("{tool} failed: {message}")]
    Failed { tool: String, message: String },

    #[error("{tool} timed out after {seconds}s")]
    TimedOut { tool: String, seconds: u64 },
}

impl ToolExecutionError {
    fn invalid(tool: &str, message: impl Into<String>) -> Self {
        Self::InvalidArguments {
            tool: tool.to_string(),
            message: message.into(),
        }
    }

    fn failed(tool: &str, err: impl std::fmt::Display) -> Self {
        Self::Failed {
            tool: tool.to_string(),
            message: err.to_string(),
        }
    }
}

/// Result of a successful tool call.
#[derive(Debug, Clone, PartialEq)]
pub enum ToolOutput {
    Ranked(RankedList),
    Statements(Vec<EvidenceItem>),
    Votes(Vec<VoteRecord>),
    Date(NaiveDate),
}

impl ToolOutput {
    /// Evidence to register as sources, in result order.
    pub fn evidence(&self) -> Vec<EvidenceItem> {
        match self {
            ToolOutput::Ranked(list) => list.items().cloned().collect(),
            ToolOutput::Statements(items) => items.clone(),
            ToolOutput::Votes(votes) => votes
                .iter()
                .map(|v| EvidenceItem::Motion(v.motion.clone()))
                .collect(),
            ToolOutput::Date(_) => Vec::new(),
        }
    }

    /// Short caller-facing summary for the observation event.
    pub fn summary(&self) -> String {
        match self {
            ToolOutput::Ranked(list) => {
                let noun = content_noun(list.content_type, list.len());
                match list.len() {
                    0 => format!("No {noun} found"),
                    n => format!("Found {n} {noun}"),
                }
            }
            ToolOutput::Statements(items) => match items.len() {
                0 => "No statements found".to_string(),
                n => format!("Found {n} {}", plural(n, "statement", "statements")),
            },
            ToolOutput::Votes(votes) if votes.is_empty() => "No recorded votes found".to_string(),
            ToolOutput::Votes(votes) => {
                let motions: BTreeSet<Uuid> = votes.iter().map(|v| v.motion.id).collect();
                format!(
                    "Found {} recorded {} on {} {}",
                    votes.len(),
                    plural(votes.len(), "vote", "votes"),
                    motions.len(),
                    plural(motions.len(), "motion", "motions"),
                )
            }
            ToolOutput::Date(date) => format!("Today is {date}"),
        }
    }

    /// Observation text for the model. Evidence is listed with its current
    /// citation index so the model can cite it.
    pub fn render(&self, registry: &SourceRegistry, snippet_chars: usize) -> String {
        let line = |item: &EvidenceItem| -> String {
            let index = registry
                .index_of(&item.key())
                .map(|i| format!("[{i}]"))
                .unwrap_or_else(|| "[?]".to_string());
            let snippet = truncate_chars(item.snippet(), snippet_chars);
            if snippet.is_empty() {
                format!("{index} {} ({})", item.title(), item.provenance())
            } else {
                format!("{index} {} ({}): {snippet}", item.title(), item.provenance())
            }
        };

        match self {
            ToolOutput::Ranked(list) if list.is_empty() => {
                format!("No {} matched.", content_noun(list.content_type, 0))
            }
            ToolOutput::Ranked(list) => list.items().map(line).collect::<Vec<_>>().join("\n"),
            ToolOutput::Statements(items) if items.is_empty() => {
                "No statements by that person were found.".to_string()
            }
            ToolOutput::Statements(items) => items.iter().map(line).collect::<Vec<_>>().join("\n"),
            ToolOutput::Votes(votes) if votes.is_empty() => "No recorded votes matched.".to_string(),
            ToolOutput::Votes(votes) => votes
                .iter()
                .map(|v| {
                    let motion = EvidenceItem::Motion(v.motion.clone());
                    format!("{} voted {}: {}", v.person, v.vote, line(&motion))
                })
                .collect::<Vec<_>>()
                .join("\n"),
            ToolOutput::Date(date) => format!("Today's date is {}.", date.format("%Y-%m-%d")),
        }
    }
}

fn plural(n: usize, one: &'static str, many: &'static str) -> &'static str {
    if n == 1 {
        one
    } else {
        many
    }
}

fn content_noun(content_type: ContentType, count: usize) -> &'static str {
    match (content_type, count == 1) {
        (ContentType::Motion, true) => "motion",
        (ContentType::Motion, false) => "motions",
        (ContentType::Statement, true) => "statement",
        (ContentType::Statement, false) => "statements",
        (ContentType::TranscriptSegment, true) => "transcript segment",
        (ContentType::TranscriptSegment, false) => "transcript segments",
        (ContentType::DocumentSection, true) => "document section",
        (ContentType::DocumentSection, false) => "document sections",
    }
}

fn truncate_chars(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        text.to_string()
    } else {
        let mut out: String = text.chars().take(max).collect();
        out.push('…');
        out
    }
}

// =============================================================================
// ARGUMENTS
// =============================================================================

/// Arguments for the content search tools.
#[derive(Debug, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct SearchArgs {
    /// Keywords or a short phrase describing what to find.
    pub query: String,
    /// Maximum number of results (default 8).
    #[schemars(range(min = 1, max = 30))]
    #[serde(default)]
    pub limit: Option<u32>,
}

/// Arguments for `get_voting_history`. At least one filter is required.
#[derive(Debug, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct VotingHistoryArgs {
    /// Councillor name, or part of it.
    #[serde(default)]
    pub person: Option<String>,
    /// Words identifying the motion.
    #[serde(default)]
    pub motion_query: Option<String>,
    /// Maximum number of votes (default 8).
    #[schemars(range(min = 1, max = 30))]
    #[serde(default)]
    pub limit: Option<u32>,
}

/// Arguments for `get_statements_by_person`.
#[derive(Debug, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct StatementsByPersonArgs {
    /// Speaker name, or part of it.
    pub person: String,
    /// Maximum number of statements (default 8).
    #[schemars(range(min = 1, max = 30))]
    #[serde(default)]
    pub limit: Option<u32>,
}

/// `get_current_date` takes no arguments.
#[derive(Debug, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct NoArgs {}

/// JSON Schema for an argument struct, without schemars metadata.
pub fn parameters_schema<T: JsonSchema>() -> Value {
    let mut value = serde_json::to_value(schema_for!(T)).unwrap_or_else(|_| {
        serde_json::json!({"type": "object", "additionalProperties": false})
    });
    if let Some(obj) = value.as_object_mut() {
        obj.remove("$schema");
        obj.remove("title");
    }
    value
}

fn parse_args<T: DeserializeOwned>(tool: &str, arguments: Value) -> Result<T, ToolExecutionError> {
    let arguments = match arguments {
        Value::Null => Value::Object(Default::default()),
        other => other,
    };
    serde_json::from_value(arguments).map_err(|e| ToolExecutionError::invalid(tool, e.to_string()))
}

fn resolve_limit(tool: &str, limit: Option<u32>) -> Result<usize, ToolExecutionError> {
    match limit {
        None => Ok(defaults::TOOL_LIMIT),
        Some(n) if (1..=MAX_TOOL_LIMIT).contains(&n) => Ok(n as usize),
        Some(n) => Err(ToolExecutionError::invalid(
            tool,
            format!("limit must be between 1 and {MAX_TOOL_LIMIT}, got {n}"),
        )),
    }
}

fn required_text(tool: &str, field: &str, value: &str) -> Result<String, ToolExecutionError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        Err(ToolExecutionError::invalid(tool, format!("{field} must not be empty")))
    } else {
        Ok(trimmed.to_string())
    }
}

fn optional_text(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

// =============================================================================
// TOOLS
// =============================================================================

/// A named operation the model may invoke.
#[async_trait]
pub trait Tool: Send + Sync {
    fn name(&self) -> &'static str;

    fn description(&self) -> &'static str;

    /// JSON Schema of the arguments object.
    fn parameters(&self) -> Value;

    async fn invoke(&self, arguments: Value) -> Result<ToolOutput, ToolExecutionError>;

    fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: self.name().to_string(),
            description: self.description().to_string(),
            parameters: self.parameters(),
        }
    }
}

/// Hybrid search scoped to one content type.
pub struct SearchTool {
    content_type: ContentType,
    search: Arc<dyn HybridSearch>,
}

impl SearchTool {
    pub fn new(content_type: ContentType, search: Arc<dyn HybridSearch>) -> Self {
        Self {
            content_type,
            search,
        }
    }
}

#[async_trait]
impl Tool for SearchTool {
    fn name(&self) -> &'static str {
        match self.content_type {
            ContentType::Motion => "search_motions",
            ContentType::Statement => "search_statements",
            ContentType::TranscriptSegment => "search_transcript_segments",
            ContentType::DocumentSection => "search_document_sections",
        }
    }

    fn description(&self) -> &'static str {
        match self.content_type {
            ContentType::Motion => {
                "Search council motions and decisions, including mover, seconder and result."
            }
            ContentType::Statement => "Search statements made by councillors, staff and delegates.",
            ContentType::TranscriptSegment => {
                "Search verbatim meeting transcript excerpts (keyword matching only)."
            }
            ContentType::DocumentSection => {
                "Search sections of agenda packages, staff reports and bylaws."
            }
        }
    }

    fn parameters(&self) -> Value {
        parameters_schema::<SearchArgs>()
    }

    #[instrument(skip(self, arguments), fields(subsystem = "agent", component = "tools", tool = self.name()))]
    async fn invoke(&self, arguments: Value) -> Result<ToolOutput, ToolExecutionError> {
        let name = self.name();
        let args: SearchArgs = parse_args(name, arguments)?;
        let query = required_text(name, "query", &args.query)?;
        let limit = resolve_limit(name, args.limit)?;

        let list = self
            .search
            .search_text(self.content_type, &query, limit)
            .await
            .map_err(|e| ToolExecutionError::failed(name, e))?;

        debug!(result_count = list.len(), "Search tool complete");
        Ok(ToolOutput::Ranked(list))
    }
}

/// Recorded votes by person and/or motion.
pub struct VotingHistoryTool {
    records: Arc<dyn RecordLookup>,
}

impl VotingHistoryTool {
    pub fn new(records: Arc<dyn RecordLookup>) -> Self {
        Self { records }
    }
}

#[async_trait]
impl Tool for VotingHistoryTool {
    fn name(&self) -> &'static str {
        "get_voting_history"
    }

    fn description(&self) -> &'static str {
        "Look up how councillors voted. Filter by person, by motion keywords, or both."
    }

    fn parameters(&self) -> Value {
        parameters_schema::<VotingHistoryArgs>()
    }

    async fn invoke(&self, arguments: Value) -> Result<ToolOutput, ToolExecutionError> {
        let name = self.name();
        let args: VotingHistoryArgs = parse_args(name, arguments)?;
        let person = optional_text(args.person);
        let motion_query = optional_text(args.motion_query);
        if person.is_none() && motion_query.is_none() {
            return Err(ToolExecutionError::invalid(
                name,
                "at least one of person or motion_query is required",
            ));
        }
        let limit = resolve_limit(name, args.limit)?;

        let votes = self
            .records
            .voting_history(person.as_deref(), motion_query.as_deref(), limit)
            .await
            .map_err(|e| ToolExecutionError::failed(name, e))?;
        Ok(ToolOutput::Votes(votes))
    }
}

/// Statements by a speaker, most recent first.
pub struct StatementsByPersonTool {
    records: Arc<dyn RecordLookup>,
}

impl StatementsByPersonTool {
    pub fn new(records: Arc<dyn RecordLookup>) -> Self {
        Self { records }
    }
}

#[async_trait]
impl Tool for StatementsByPersonTool {
    fn name(&self) -> &'static str {
        "get_statements_by_person"
    }

    fn description(&self) -> &'static str {
        "List what a named person said at meetings, most recent first."
    }

    fn parameters(&self) -> Value {
        parameters_schema::<StatementsByPersonArgs>()
    }

    async fn invoke(&self, arguments: Value) -> Result<ToolOutput, ToolExecutionError> {
        let name = self.name();
        let args: StatementsByPersonArgs = parse_args(name, arguments)?;
        let person = required_text(name, "person", &args.person)?;
        let limit = resolve_limit(name, args.limit)?;

        let items = self
            .records
            .statements_by_speaker(&person, limit)
            .await
            .map_err(|e| ToolExecutionError::failed(name, e))?;
        Ok(ToolOutput::Statements(items))
    }
}

/// Today's date, for resolving relative time references.
#[derive(Default)]
pub struct CurrentDateTool {
    fixed: Option<NaiveDate>,
}

impl CurrentDateTool {
    pub fn new() -> Self {
        Self::default()
    }

    /// Always report `date`.
    pub fn fixed(date: NaiveDate) -> Self {
        Self { fixed: Some(date) }
    }
}

#[async_trait]
impl Tool for CurrentDateTool {
    fn name(&self) -> &'static str {
        "get_current_date"
    }

    fn description(&self) -> &'static str {
        "Get today's date. Use it to interpret phrases like 'last month' or 'this year'."
    }

    fn parameters(&self) -> Value {
        parameters_schema::<NoArgs>()
    }

    async fn invoke(&self, arguments: Value) -> Result<ToolOutput, ToolExecutionError> {
        let _: NoArgs = parse_args(self.name(), arguments)?;
        Ok(ToolOutput::Date(
            self.fixed.unwrap_or_else(|| Utc::now().date_naive()),
        ))
    }
}

// =============================================================================
// REGISTRY
// =============================================================================

/// Closed set of tools offered to the model, in registration order.
#[derive(Clone, Default)]
pub struct ToolRegistry {
    tools: Vec<Arc<dyn Tool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a tool. A tool with the same name replaces the earlier one.
    pub fn register(mut self, tool: impl Tool + 'static) -> Self {
        let tool: Arc<dyn Tool> = Arc::new(tool);
        match self.tools.iter().position(|t| t.name() == tool.name()) {
            Some(pos) => self.tools[pos] = tool,
            None => self.tools.push(tool),
        }
        self
    }

    /// The standard civic research tool set.
    pub fn civic(search: Arc<dyn HybridSearch>, records: Arc<dyn RecordLookup>) -> Self {
        let mut registry = Self::new();
        for content_type in ContentType::ALL {
            registry = registry.register(SearchTool::new(content_type, search.clone()));
        }
        registry
            .register(VotingHistoryTool::new(records.clone()))
            .register(StatementsByPersonTool::new(records))
            .register(CurrentDateTool::new())
    }

    pub fn definitions(&self) -> Vec<ToolDefinition> {
        self.tools.iter().map(|t| t.definition()).collect()
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.tools.iter().map(|t| t.name()).collect()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Validate and dispatch a call by name.
    pub async fn invoke(&self, name: &str, arguments: Value) -> Result<ToolOutput, ToolExecutionError> {
        let tool = self
            .tools
            .iter()
            .find(|t| t.name() == name)
            .ok_or_else(|| ToolExecutionError::UnknownTool(name.to_string()))?;
        tool.invoke(arguments).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use civic_core::mock::InMemoryStore;
    use civic_core::{MotionEvidence, StatementEvidence};
    use civic_search::{HybridSearchEngine, QueryEmbedder};
    use serde_json::json;

    fn motion(id: u128, title: &str) -> MotionEvidence {
        MotionEvidence {
            id: Uuid::from_u128(id),
            title: title.to_string(),
            snippet: "That council adopt the bylaw.".to_string(),
            meeting_id: Uuid::from_u128(500),
            meeting_date: NaiveDate::from_ymd_opt(2024, 3, 12).unwrap(),
            mover: Some("Cllr. Diaz".to_string()),
            seconder: None,
            result: Some("carried".to_string()),
            score: 0.0,
        }
    }

    fn statement(id: u128, speaker: &str) -> EvidenceItem {
        EvidenceItem::Statement(StatementEvidence {
            id: Uuid::from_u128(id),
            title: "Remarks on parking".to_string(),
            snippet: "I support the change.".to_string(),
            meeting_id: Uuid::from_u128(500),
            meeting_date: NaiveDate::from_ymd_opt(2024, 3, 12).unwrap(),
            speaker: speaker.to_string(),
            score: 0.0,
        })
    }

    fn registry(store: InMemoryStore) -> ToolRegistry {
        let store = Arc::new(store);
        let engine = HybridSearchEngine::new(store.clone(), QueryEmbedder::disabled());
        ToolRegistry::civic(Arc::new(engine), store)
    }

    fn parking_store() -> InMemoryStore {
        let m = motion(1, "Parking bylaw amendment");
        InMemoryStore::new()
            .with_item(EvidenceItem::Motion(m.clone()))
            .with_item(statement(2, "Cllr. Okafor"))
            .with_vote(VoteRecord {
                motion: m,
                person: "Cllr. Okafor".to_string(),
                vote: "no".to_string(),
            })
    }

    #[test]
    fn test_civic_registry_has_seven_tools() {
        let registry = registry(InMemoryStore::new());
        assert_eq!(
            registry.names(),
            vec![
                "search_motions",
                "search_statements",
                "search_transcript_segments",
                "search_document_sections",
                "get_voting_history",
                "get_statements_by_person",
                "get_current_date",
            ]
        );
    }

    #[test]
    fn test_schema_denies_unknown_fields() {
        let schema = parameters_schema::<SearchArgs>();
        assert_eq!(schema["type"], "object");
        assert_eq!(schema["additionalProperties"], false);
        assert_eq!(schema["required"], json!(["query"]));
        assert_eq!(schema["properties"]["limit"]["maximum"], 30.0);
        assert!(schema.get("$schema").is_none());
        assert!(schema.get("title").is_none());
    }

    #[tokio::test]
    async fn test_search_tool_returns_ranked_list() {
        let registry = registry(parking_store());
        let output = registry
            .invoke("search_motions", json!({"query": "parking bylaw"}))
            .await
            .unwrap();
        match &output {
            ToolOutput::Ranked(list) => {
                assert_eq!(list.content_type, ContentType::Motion);
                assert_eq!(list.len(), 1);
            }
            other => panic!("unexpected output: {:?}", other),
        }
        assert_eq!(output.summary(), "Found 1 motion");
    }

    #[tokio::test]
    async fn test_unknown_tool() {
        let err = registry(InMemoryStore::new())
            .invoke("delete_everything", json!({}))
            .await
            .unwrap_err();
        assert_eq!(err, ToolExecutionError::UnknownTool("delete_everything".to_string()));
    }

    #[tokio::test]
    async fn test_schema_violations_are_invalid_arguments() {
        let registry = registry(InMemoryStore::new());
        for (name, args) in [
            ("search_motions", json!({"query": "parking", "limit": 0})),
            ("search_motions", json!({"query": "parking", "limit": 31})),
            ("search_motions", json!({"query": "parking", "sort": "date"})),
            ("search_motions", json!({"limit": 5})),
            ("search_motions", json!({"query": "   "})),
            ("search_statements", Value::String("{not json".to_string())),
            ("get_voting_history", json!({})),
            ("get_statements_by_person", json!({"person": ""})),
            ("get_current_date", json!({"tz": "UTC"})),
        ] {
            let err = registry.invoke(name, args.clone()).await.unwrap_err();
            assert!(
                matches!(err, ToolExecutionError::InvalidArguments { .. }),
                "{name} {args}: {err:?}"
            );
        }
    }

    #[tokio::test]
    async fn test_store_failure_is_failed() {
        let registry = registry(InMemoryStore::new().failing_text().failing_lookup());
        let err = registry
            .invoke("search_motions", json!({"query": "parking"}))
            .await
            .unwrap_err();
        assert!(matches!(err, ToolExecutionError::Failed { .. }));

        let err = registry
            .invoke("get_voting_history", json!({"person": "Okafor"}))
            .await
            .unwrap_err();
        assert!(matches!(err, ToolExecutionError::Failed { .. }));
    }

    #[tokio::test]
    async fn test_voting_history_motions_become_evidence() {
        let registry = registry(parking_store());
        let output = registry
            .invoke("get_voting_history", json!({"person": "okafor", "limit": 5}))
            .await
            .unwrap();
        let evidence = output.evidence();
        assert_eq!(evidence.len(), 1);
        assert_eq!(evidence[0].content_type(), ContentType::Motion);
        assert_eq!(output.summary(), "Found 1 recorded vote on 1 motion");
    }

    #[tokio::test]
    async fn test_statements_by_person() {
        let registry = registry(parking_store());
        let output = registry
            .invoke("get_statements_by_person", json!({"person": "Okafor"}))
            .await
            .unwrap();
        assert_eq!(output.evidence().len(), 1);
        assert_eq!(output.summary(), "Found 1 statement");
    }

    #[tokio::test]
    async fn test_current_date_has_no_evidence() {
        let registry =
            ToolRegistry::new().register(CurrentDateTool::fixed(NaiveDate::from_ymd_opt(2024, 5, 1).unwrap()));
        let output = registry.invoke("get_current_date", Value::Null).await.unwrap();
        assert!(output.evidence().is_empty());
        assert_eq!(
            output.render(&SourceRegistry::new(), 100),
            "Today's date is 2024-05-01."
        );
    }

    #[test]
    fn test_render_lists_citation_indices() {
        let mut sources = SourceRegistry::new();
        sources.add(statement(9, "Mayor Lindqvist"));
        let output = ToolOutput::Statements(vec![statement(2, "Cllr. Okafor")]);
        sources.extend(output.evidence());

        let text = output.render(&sources, 10);
        assert!(text.starts_with("[2] Remarks on parking (statement, 2024-03-12, Cllr. Okafor): "));
        assert!(text.ends_with("I support …"));
    }
}
