//! Scripted LLM backend for deterministic orchestrator tests.
//!
//! Each planning call pops the next step from a queue. An exhausted queue
//! means "answer now". Synthesis streams a fixed list of fragments.
//!
//! ```rust
//! use civic_inference::mock::ScriptedBackend;
//! use serde_json::json;
//!
//! let backend = ScriptedBackend::new()
//!     .then_call("search_motions", json!({"query": "parking bylaw"}))
//!     .then_answer()
//!     .with_answer(["The bylaw ", "carried [1]."]);
//! ```

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use futures::stream;
use serde_json::Value;

use civic_core::{
    EmbeddingBackend, Error, GenerationBackend, ResearchMessage, Result, StreamingGeneration,
    TokenStream, ToolCallingBackend, ToolDecision, ToolDefinition, ToolInvocation, Vector,
};

/// One scripted planning response.
#[derive(Debug, Clone)]
pub enum PlanStep {
    Tools(Vec<(String, Value)>),
    Answer,
    Fail(String),
    /// Never resolves; exercises call timeouts.
    Hang,
}

#[derive(Debug, Clone)]
struct Script {
    answer: Vec<String>,
    stream_fail_after: Option<usize>,
    stream_start_fails: bool,
    /// `Err` carries the failure message.
    suggestions: std::result::Result<String, String>,
    embedding: Option<Vec<f32>>,
}

impl Default for Script {
    fn default() -> Self {
        Self {
            answer: vec!["No relevant records were found.".to_string()],
            stream_fail_after: None,
            stream_start_fails: false,
            suggestions: Ok(String::new()),
            embedding: None,
        }
    }
}

/// A synthesis request as received by the backend.
#[derive(Debug, Clone)]
pub struct SynthesisCall {
    pub system: String,
    pub prompt: String,
}

/// Scripted backend implementing every inference trait.
#[derive(Clone, Default)]
pub struct ScriptedBackend {
    script: Arc<Script>,
    plan: Arc<Mutex<VecDeque<PlanStep>>>,
    steps: Arc<AtomicUsize>,
    transcripts: Arc<Mutex<Vec<Vec<ResearchMessage>>>>,
    offered_tools: Arc<Mutex<Vec<String>>>,
    synthesis_calls: Arc<Mutex<Vec<SynthesisCall>>>,
    generate_calls: Arc<AtomicUsize>,
}

impl ScriptedBackend {
    pub fn new() -> Self {
        Self::default()
    }

    fn push(self, step: PlanStep) -> Self {
        self.plan.lock().unwrap().push_back(step);
        self
    }

    /// Plan a single tool call.
    pub fn then_call(self, name: impl Into<String>, arguments: Value) -> Self {
        self.push(PlanStep::Tools(vec![(name.into(), arguments)]))
    }

    /// Plan several tool calls in one step.
    pub fn then_call_many<I, S>(self, calls: I) -> Self
    where
        I: IntoIterator<Item = (S, Value)>,
        S: Into<String>,
    {
        let calls = calls.into_iter().map(|(n, a)| (n.into(), a)).collect();
        self.push(PlanStep::Tools(calls))
    }

    pub fn then_answer(self) -> Self {
        self.push(PlanStep::Answer)
    }

    pub fn then_fail(self, message: impl Into<String>) -> Self {
        self.push(PlanStep::Fail(message.into()))
    }

    pub fn then_hang(self) -> Self {
        self.push(PlanStep::Hang)
    }

    /// Fragments streamed during synthesis.
    pub fn with_answer<I, S>(mut self, fragments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Arc::make_mut(&mut self.script).answer = fragments.into_iter().map(Into::into).collect();
        self
    }

    /// Fail the synthesis stream after `n` fragments.
    pub fn with_stream_failure_after(mut self, n: usize) -> Self {
        Arc::make_mut(&mut self.script).stream_fail_after = Some(n);
        self
    }

    /// Fail the synthesis request before any fragment.
    pub fn with_stream_start_failure(mut self) -> Self {
        Arc::make_mut(&mut self.script).stream_start_fails = true;
        self
    }

    /// Completion text returned for the follow-up suggestion request.
    pub fn with_suggestions(mut self, text: impl Into<String>) -> Self {
        Arc::make_mut(&mut self.script).suggestions = Ok(text.into());
        self
    }

    pub fn with_failing_suggestions(mut self) -> Self {
        Arc::make_mut(&mut self.script).suggestions = Err("suggestion request failed".to_string());
        self
    }

    /// Embedding returned for every text.
    pub fn with_embedding(mut self, embedding: Vec<f32>) -> Self {
        Arc::make_mut(&mut self.script).embedding = Some(embedding);
        self
    }

    /// Number of planning calls received.
    pub fn planning_calls(&self) -> usize {
        self.steps.load(Ordering::SeqCst)
    }

    /// Message transcripts of every planning call, in order.
    pub fn transcripts(&self) -> Vec<Vec<ResearchMessage>> {
        self.transcripts.lock().unwrap().clone()
    }

    /// Tool names offered on the most recent planning call.
    pub fn offered_tools(&self) -> Vec<String> {
        self.offered_tools.lock().unwrap().clone()
    }

    pub fn synthesis_calls(&self) -> Vec<SynthesisCall> {
        self.synthesis_calls.lock().unwrap().clone()
    }

    /// Number of plain completion calls (follow-up suggestions).
    pub fn generate_calls(&self) -> usize {
        self.generate_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ToolCallingBackend for ScriptedBackend {
    async fn decide(
        &self,
        messages: &[ResearchMessage],
        tools: &[ToolDefinition],
    ) -> Result<ToolDecision> {
        let step = self.steps.fetch_add(1, Ordering::SeqCst) + 1;
        self.transcripts.lock().unwrap().push(messages.to_vec());
        *self.offered_tools.lock().unwrap() = tools.iter().map(|t| t.name.clone()).collect();

        let next = self.plan.lock().unwrap().pop_front();
        match next {
            None | Some(PlanStep::Answer) => Ok(ToolDecision::Answer),
            Some(PlanStep::Tools(calls)) => Ok(ToolDecision::CallTools(
                calls
                    .into_iter()
                    .enumerate()
                    .map(|(i, (name, arguments))| ToolInvocation {
                        id: format!("call_{}_{}", step, i),
                        name,
                        arguments,
                    })
                    .collect(),
            )),
            Some(PlanStep::Fail(message)) => Err(Error::Inference(message)),
            Some(PlanStep::Hang) => {
                futures::future::pending::<()>().await;
                Ok(ToolDecision::Answer)
            }
        }
    }
}

#[async_trait]
impl StreamingGeneration for ScriptedBackend {
    async fn generate_with_system_stream(&self, system: &str, prompt: &str) -> Result<TokenStream> {
        self.synthesis_calls.lock().unwrap().push(SynthesisCall {
            system: system.to_string(),
            prompt: prompt.to_string(),
        });

        if self.script.stream_start_fails {
            return Err(Error::Inference("synthesis request failed".to_string()));
        }

        let mut items: Vec<Result<String>> = self.script.answer.iter().cloned().map(Ok).collect();
        if let Some(n) = self.script.stream_fail_after {
            items.truncate(n);
            items.push(Err(Error::Inference("stream interrupted".to_string())));
        }
        Ok(Box::pin(stream::iter(items)))
    }
}

#[async_trait]
impl GenerationBackend for ScriptedBackend {
    async fn generate(&self, prompt: &str) -> Result<String> {
        self.generate_with_system("", prompt).await
    }

    async fn generate_with_system(&self, _system: &str, _prompt: &str) -> Result<String> {
        self.generate_calls.fetch_add(1, Ordering::SeqCst);
        self.script.suggestions.clone().map_err(Error::Inference)
    }

    fn model_name(&self) -> &str {
        "scripted"
    }
}

#[async_trait]
impl EmbeddingBackend for ScriptedBackend {
    async fn embed_texts(&self, texts: &[String]) -> Result<Vec<Vector>> {
        match &self.script.embedding {
            Some(embedding) => Ok(texts
                .iter()
                .map(|_| Vector::from(embedding.clone()))
                .collect()),
            None => Err(Error::Embedding("embeddings not configured".to_string())),
        }
    }

    fn dimension(&self) -> usize {
        self.script.embedding.as_ref().map_or(0, Vec::len)
    }

    fn model_name(&self) -> &str {
        "scripted"
    }
}
