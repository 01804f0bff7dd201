//! The bounded research loop.
//!
//! ```text
//! Planning ──► ToolCall ──► Observing ──┐
//!    ▲                                  │ (at most max_steps rounds)
//!    └──────────────────────────────────┘
//!    │ model answers / budget spent
//!    ▼
//! Synthesizing ──► Done
//! ```
//!
//! An LLM failure (or timeout) while planning or synthesizing is terminal:
//! `error` then `done`. Tool failures are observations and the loop goes on.
//! Every run that still has a listener ends with `done`.

use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use futures::future::join_all;
use futures::StreamExt;
use tokio::sync::mpsc;
use tokio::time::timeout;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use civic_core::{
    defaults, AgentEvent, AnswerStore, CachedAnswer, ConversationTurn, Error, ResearchBackend,
    ResearchMessage, Result, ToolDecision, ToolDefinition, ToolInvocation,
};

use crate::chunker::WordChunker;
use crate::citations::{resolve, strip_invalid_citations};
use crate::conversation::ConversationManager;
use crate::prompts;
use crate::sources::SourceRegistry;
use crate::tools::{ToolExecutionError, ToolOutput, ToolRegistry};

/// Research loop configuration.
#[derive(Debug, Clone)]
pub struct AgentConfig {
    /// Maximum planning rounds before synthesis is forced.
    pub max_steps: usize,
    /// Wall-clock budget for each remote call.
    pub call_timeout: Duration,
    pub max_suggestions: usize,
    pub answer_ttl: chrono::Duration,
    pub max_turns: usize,
    pub context_char_budget: usize,
    /// Snippet length shown to the model per evidence item.
    pub snippet_chars: usize,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            max_steps: defaults::MAX_STEPS,
            call_timeout: Duration::from_secs(defaults::CALL_TIMEOUT_SECS),
            max_suggestions: defaults::MAX_SUGGESTIONS,
            answer_ttl: chrono::Duration::days(defaults::ANSWER_TTL_DAYS),
            max_turns: defaults::MAX_TURNS,
            context_char_budget: defaults::CONTEXT_CHAR_BUDGET,
            snippet_chars: defaults::OBSERVATION_SNIPPET_CHARS,
        }
    }
}

impl AgentConfig {
    /// Load from `CIVIC_*` environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        fn parse<T: std::str::FromStr>(key: &str) -> Option<T> {
            std::env::var(key).ok().and_then(|v| v.parse().ok())
        }

        let base = Self::default();
        Self {
            max_steps: parse("CIVIC_MAX_STEPS")
                .filter(|n: &usize| *n > 0)
                .unwrap_or(base.max_steps),
            call_timeout: parse("CIVIC_CALL_TIMEOUT_SECS")
                .filter(|n: &u64| *n > 0)
                .map(Duration::from_secs)
                .unwrap_or(base.call_timeout),
            answer_ttl: parse("CIVIC_ANSWER_TTL_DAYS")
                .map(chrono::Duration::days)
                .unwrap_or(base.answer_ttl),
            context_char_budget: parse("CIVIC_CONTEXT_CHAR_BUDGET")
                .unwrap_or(base.context_char_budget),
            ..base
        }
    }

    pub fn with_max_steps(mut self, max_steps: usize) -> Self {
        self.max_steps = max_steps;
        self
    }

    pub fn with_call_timeout(mut self, call_timeout: Duration) -> Self {
        self.call_timeout = call_timeout;
        self
    }

    pub fn with_answer_ttl(mut self, ttl: chrono::Duration) -> Self {
        self.answer_ttl = ttl;
        self
    }
}

/// One question to research.
#[derive(Debug, Clone, Default)]
pub struct ResearchRequest {
    pub query: String,
    /// Prior turns, oldest first.
    pub turns: Vec<ConversationTurn>,
    /// Caller asked to start over.
    pub new_search: bool,
}

impl ResearchRequest {
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            ..Default::default()
        }
    }

    pub fn with_turns(mut self, turns: Vec<ConversationTurn>) -> Self {
        self.turns = turns;
        self
    }

    pub fn with_new_search(mut self, new_search: bool) -> Self {
        self.new_search = new_search;
        self
    }
}

/// Why a run stopped before `done`.
#[derive(Debug)]
enum Halt {
    /// The receiver is gone; nothing more can be delivered.
    Disconnected,
}

/// Sends events, reporting a closed channel as [`Halt::Disconnected`].
struct Emitter {
    tx: mpsc::Sender<AgentEvent>,
}

impl Emitter {
    async fn emit(&self, event: AgentEvent) -> std::result::Result<(), Halt> {
        self.tx.send(event).await.map_err(|_| Halt::Disconnected)
    }

    async fn fail(&self, err: &Error) -> std::result::Result<(), Halt> {
        warn!(error = %err, "Research run failed");
        self.emit(AgentEvent::Error {
            message: user_message(err),
        })
        .await?;
        self.emit(AgentEvent::done_empty()).await
    }
}

fn user_message(err: &Error) -> String {
    match err {
        Error::Timeout(_) => "The language model did not respond in time. Please try again.".to_string(),
        _ => format!("The language model service failed: {}", err),
    }
}

/// Drives planning, tool execution and synthesis for one question.
pub struct ResearchAgent {
    backend: Arc<dyn ResearchBackend>,
    tools: ToolRegistry,
    answers: Option<Arc<dyn AnswerStore>>,
    conversation: ConversationManager,
    config: AgentConfig,
}

impl ResearchAgent {
    pub fn new(backend: Arc<dyn ResearchBackend>, tools: ToolRegistry) -> Self {
        let config = AgentConfig::default();
        Self {
            backend,
            tools,
            answers: None,
            conversation: ConversationManager::new(config.max_turns, config.context_char_budget),
            config,
        }
    }

    pub fn with_config(mut self, config: AgentConfig) -> Self {
        self.conversation = ConversationManager::new(config.max_turns, config.context_char_budget);
        self.config = config;
        self
    }

    /// Persist completed answers for replay.
    pub fn with_answer_store(mut self, answers: Arc<dyn AnswerStore>) -> Self {
        self.answers = Some(answers);
        self
    }

    pub fn config(&self) -> &AgentConfig {
        &self.config
    }

    pub fn tools(&self) -> &ToolRegistry {
        &self.tools
    }

    /// Run the loop, writing events to `tx` until `done` or disconnect.
    #[instrument(
        skip(self, request, tx),
        fields(subsystem = "agent", component = "orchestrator", op = "research")
    )]
    pub async fn run(&self, request: ResearchRequest, tx: mpsc::Sender<AgentEvent>) {
        let start = Instant::now();
        let emitter = Emitter { tx };
        match self.research(&request, &emitter).await {
            Ok(()) => info!(
                duration_ms = start.elapsed().as_millis() as u64,
                "Research run complete"
            ),
            Err(Halt::Disconnected) => {
                debug!("Event receiver dropped; research run abandoned")
            }
        }
    }

    async fn research(
        &self,
        request: &ResearchRequest,
        emitter: &Emitter,
    ) -> std::result::Result<(), Halt> {
        let context =
            self.conversation
                .context_for(&request.query, &request.turns, request.new_search);
        let definitions = self.tools.definitions();
        let mut registry = SourceRegistry::new();
        let mut messages = vec![
            ResearchMessage::System {
                content: prompts::PLANNING_SYSTEM.to_string(),
            },
            ResearchMessage::User {
                content: prompts::planning_request(&request.query, context.as_deref()),
            },
        ];

        let mut step = 0;
        while step < self.config.max_steps {
            step += 1;
            let decision = match self.plan(&messages, &definitions).await {
                Ok(decision) => decision,
                Err(err) => return emitter.fail(&err).await,
            };

            let calls = match decision {
                ToolDecision::Answer => {
                    debug!(step, "Model elected to answer");
                    break;
                }
                ToolDecision::CallTools(calls) if calls.is_empty() => break,
                ToolDecision::CallTools(calls) => calls,
            };

            for call in &calls {
                emitter
                    .emit(AgentEvent::ToolCall {
                        name: call.name.clone(),
                        arguments: call.arguments.clone(),
                    })
                    .await?;
            }

            let outcomes = join_all(calls.iter().map(|call| self.invoke(call))).await;
            messages.push(ResearchMessage::AssistantToolCalls {
                calls: calls.clone(),
            });

            for (call, outcome) in calls.iter().zip(outcomes) {
                match outcome {
                    Ok(output) => {
                        registry.extend(output.evidence());
                        messages.push(ResearchMessage::ToolResult {
                            id: call.id.clone(),
                            content: output.render(&registry, self.config.snippet_chars),
                        });
                        emitter
                            .emit(AgentEvent::observation_ok(&call.name, output.summary()))
                            .await?;
                    }
                    Err(err) => {
                        warn!(tool = %call.name, error = %err, "Tool call failed");
                        messages.push(ResearchMessage::ToolResult {
                            id: call.id.clone(),
                            content: format!("Error: {err}"),
                        });
                        emitter
                            .emit(AgentEvent::observation_err(&call.name, err.to_string()))
                            .await?;
                    }
                }
            }

            if step == self.config.max_steps {
                info!(step, source_count = registry.len(), "Step budget spent; synthesizing");
            }
        }

        let answer = match self
            .synthesize(&request.query, context.as_deref(), &registry, emitter)
            .await?
        {
            Ok(answer) => answer,
            Err(err) => return emitter.fail(&err).await,
        };

        let resolution = resolve(&registry);
        emitter
            .emit(AgentEvent::Sources {
                sources: registry.sources(),
                source_count: resolution.source_count,
                confidence: resolution.confidence,
            })
            .await?;

        let suggestions = self.suggest(&request.query, &answer).await;

        let answer_id = match &self.answers {
            Some(store) => {
                let now = Utc::now();
                let cached = CachedAnswer {
                    id: Uuid::new_v4(),
                    query: request.query.clone(),
                    answer,
                    sources: registry.sources(),
                    source_count: resolution.source_count,
                    confidence: resolution.confidence,
                    suggestions: suggestions.clone(),
                    created_at: now,
                    expires_at: now + self.config.answer_ttl,
                };
                self.store_answer(store.as_ref(), &cached).await
            }
            None => None,
        };

        emitter
            .emit(AgentEvent::Done {
                answer_id,
                suggestions,
            })
            .await
    }

    async fn plan(
        &self,
        messages: &[ResearchMessage],
        definitions: &[ToolDefinition],
    ) -> Result<ToolDecision> {
        match timeout(self.config.call_timeout, self.backend.decide(messages, definitions)).await {
            Ok(result) => result,
            Err(_) => Err(Error::Timeout(format!(
                "planning call exceeded {}s",
                self.config.call_timeout.as_secs()
            ))),
        }
    }

    async fn invoke(&self, call: &ToolInvocation) -> std::result::Result<ToolOutput, ToolExecutionError> {
        let arguments = call.arguments.clone();
        match timeout(self.config.call_timeout, self.tools.invoke(&call.name, arguments)).await {
            Ok(result) => result,
            Err(_) => Err(ToolExecutionError::TimedOut {
                tool: call.name.clone(),
                seconds: self.config.call_timeout.as_secs(),
            }),
        }
    }

    /// Stream the answer. The outer result is delivery, the inner one the
    /// LLM outcome.
    async fn synthesize(
        &self,
        question: &str,
        context: Option<&str>,
        registry: &SourceRegistry,
        emitter: &Emitter,
    ) -> std::result::Result<Result<String>, Halt> {
        let prompt =
            prompts::synthesis_request(question, context, registry, self.config.snippet_chars);
        let call_timeout = self.config.call_timeout;

        let mut stream = match timeout(
            call_timeout,
            self.backend
                .generate_with_system_stream(prompts::SYNTHESIS_SYSTEM, &prompt),
        )
        .await
        {
            Ok(Ok(stream)) => stream,
            Ok(Err(err)) => return Ok(Err(err)),
            Err(_) => {
                return Ok(Err(Error::Timeout(format!(
                    "synthesis did not start within {}s",
                    call_timeout.as_secs()
                ))))
            }
        };

        let max_citation = registry.len();
        let mut chunker = WordChunker::new();
        let mut answer = String::new();

        loop {
            let fragment = match timeout(call_timeout, stream.next()).await {
                Ok(Some(Ok(fragment))) => fragment,
                Ok(Some(Err(err))) => return Ok(Err(err)),
                Ok(None) => break,
                Err(_) => {
                    return Ok(Err(Error::Timeout(format!(
                        "answer stream stalled for {}s",
                        call_timeout.as_secs()
                    ))))
                }
            };
            for word in chunker.push(&fragment) {
                emit_chunk(emitter, &word, max_citation, &mut answer).await?;
            }
        }
        if let Some(rest) = chunker.finish() {
            emit_chunk(emitter, &rest, max_citation, &mut answer).await?;
        }

        debug!(answer_len = answer.len(), "Synthesis complete");
        Ok(Ok(answer))
    }

    /// Follow-up questions. Failure yields none.
    async fn suggest(&self, question: &str, answer: &str) -> Vec<String> {
        if self.config.max_suggestions == 0 {
            return Vec::new();
        }
        let prompt = prompts::suggestion_request(question, answer, self.config.max_suggestions);
        match timeout(
            self.config.call_timeout,
            self.backend
                .generate_with_system(prompts::SUGGESTION_SYSTEM, &prompt),
        )
        .await
        {
            Ok(Ok(reply)) => prompts::parse_suggestions(&reply, self.config.max_suggestions),
            Ok(Err(err)) => {
                warn!(error = %err, "Follow-up suggestions failed");
                Vec::new()
            }
            Err(_) => {
                warn!("Follow-up suggestions timed out");
                Vec::new()
            }
        }
    }

    async fn store_answer(&self, store: &dyn AnswerStore, answer: &CachedAnswer) -> Option<Uuid> {
        match store.insert_if_absent(answer).await {
            Ok(true) => Some(answer.id),
            Ok(false) => {
                warn!(answer_id = %answer.id, "Answer id already present; not overwritten");
                None
            }
            Err(err) => {
                warn!(error = %err, "Failed to cache answer");
                None
            }
        }
    }
}

async fn emit_chunk(
    emitter: &Emitter,
    text: &str,
    max_citation: usize,
    answer: &mut String,
) -> std::result::Result<(), Halt> {
    let clean = strip_invalid_citations(text, max_citation);
    if clean.is_empty() {
        return Ok(());
    }
    answer.push_str(&clean);
    emitter.emit(AgentEvent::FinalAnswerChunk { text: clean }).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = AgentConfig::default();
        assert_eq!(config.max_steps, 6);
        assert_eq!(config.call_timeout, Duration::from_secs(60));
        assert_eq!(config.max_suggestions, 3);
        assert_eq!(config.answer_ttl, chrono::Duration::days(30));
        assert_eq!(config.max_turns, 5);
    }

    #[test]
    fn test_config_builders() {
        let config = AgentConfig::default()
            .with_max_steps(2)
            .with_call_timeout(Duration::from_millis(50));
        assert_eq!(config.max_steps, 2);
        assert_eq!(config.call_timeout, Duration::from_millis(50));
    }

    #[test]
    fn test_timeout_message_is_friendly() {
        let msg = user_message(&Error::Timeout("planning".to_string()));
        assert!(msg.contains("did not respond in time"));
        let msg = user_message(&Error::Inference("LLM service server error (502): boom".to_string()));
        assert!(msg.contains("502"));
    }

    #[test]
    fn test_request_builders() {
        let request = ResearchRequest::new("Why?").with_new_search(true);
        assert_eq!(request.query, "Why?");
        assert!(request.new_search);
        assert!(request.turns.is_empty());
    }
}
