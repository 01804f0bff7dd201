//! OpenAI-compatible inference backend implementation.

use async_trait::async_trait;
use reqwest::{Client, Response};
use std::time::Duration;
use tracing::{debug, info, instrument};

use civic_core::{
    defaults, EmbeddingBackend, Error, GenerationBackend, ResearchMessage, Result,
    StreamingGeneration, TokenStream, ToolCallingBackend, ToolDecision, ToolDefinition,
    ToolInvocation, Vector,
};

use super::error::{to_civic_error, OpenAIErrorCode};
use super::streaming::parse_sse_stream;
use super::types::*;

/// Configuration for an OpenAI-compatible backend.
#[derive(Debug, Clone)]
pub struct OpenAIConfig {
    /// Base URL for the API endpoint.
    pub base_url: String,
    /// API key for authentication (optional for local endpoints).
    pub api_key: Option<String>,
    pub embed_model: String,
    pub gen_model: String,
    /// Expected embedding dimension; must match the vector columns.
    pub embed_dimension: usize,
    pub timeout_seconds: u64,
    /// Sampling temperature for planning and synthesis calls.
    pub temperature: Option<f32>,
    /// Skip TLS verification (for self-signed certs in local environments).
    pub skip_tls_verify: bool,
}

impl Default for OpenAIConfig {
    fn default() -> Self {
        Self {
            base_url: defaults::OPENAI_URL.to_string(),
            api_key: None,
            embed_model: defaults::EMBED_MODEL.to_string(),
            gen_model: defaults::GEN_MODEL.to_string(),
            embed_dimension: defaults::EMBED_DIMENSION,
            timeout_seconds: defaults::INFERENCE_TIMEOUT_SECS,
            temperature: None,
            skip_tls_verify: false,
        }
    }
}

impl OpenAIConfig {
    /// Read configuration from `OPENAI_*` environment variables.
    pub fn from_env() -> Self {
        let base = Self::default();
        Self {
            base_url: std::env::var("OPENAI_BASE_URL").unwrap_or(base.base_url),
            api_key: std::env::var("OPENAI_API_KEY")
                .ok()
                .filter(|k| !k.is_empty()),
            embed_model: std::env::var("OPENAI_EMBED_MODEL").unwrap_or(base.embed_model),
            gen_model: std::env::var("OPENAI_GEN_MODEL").unwrap_or(base.gen_model),
            embed_dimension: std::env::var("OPENAI_EMBED_DIM")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(base.embed_dimension),
            timeout_seconds: std::env::var("OPENAI_TIMEOUT")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(base.timeout_seconds),
            temperature: std::env::var("OPENAI_TEMPERATURE")
                .ok()
                .and_then(|s| s.parse().ok()),
            skip_tls_verify: std::env::var("OPENAI_SKIP_TLS_VERIFY")
                .map(|v| v == "1" || v.to_lowercase() == "true")
                .unwrap_or(false),
        }
    }

    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    pub fn with_api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    pub fn with_timeout(mut self, seconds: u64) -> Self {
        self.timeout_seconds = seconds;
        self
    }
}

/// OpenAI-compatible backend for embeddings, generation and tool calling.
pub struct OpenAIBackend {
    client: Client,
    config: OpenAIConfig,
}

impl OpenAIBackend {
    pub fn new(config: OpenAIConfig) -> Result<Self> {
        let mut client_builder =
            Client::builder().timeout(Duration::from_secs(config.timeout_seconds));

        if config.skip_tls_verify {
            client_builder = client_builder.danger_accept_invalid_certs(true);
        }

        let client = client_builder
            .build()
            .map_err(|e| Error::Inference(format!("Failed to create HTTP client: {}", e)))?;

        info!(
            subsystem = "inference",
            component = "openai",
            "Initializing OpenAI backend: url={}, embed={}, gen={}",
            config.base_url,
            config.embed_model,
            config.gen_model
        );

        Ok(Self { client, config })
    }

    pub fn from_env() -> Result<Self> {
        Self::new(OpenAIConfig::from_env())
    }

    pub fn config(&self) -> &OpenAIConfig {
        &self.config
    }

    /// Build a request with authentication if configured.
    fn build_request(&self, endpoint: &str) -> reqwest::RequestBuilder {
        let url = format!("{}{}", self.config.base_url.trim_end_matches('/'), endpoint);
        let mut req = self.client.post(&url);

        if let Some(ref api_key) = self.config.api_key {
            req = req.header("Authorization", format!("Bearer {}", api_key));
        }

        req.header("Content-Type", "application/json")
    }

    fn chat_request(
        &self,
        messages: Vec<ChatMessage>,
        stream: bool,
        tools: Option<Vec<ToolSpec>>,
    ) -> ChatCompletionRequest {
        let tool_choice = tools.as_ref().map(|_| "auto".to_string());
        ChatCompletionRequest {
            model: self.config.gen_model.clone(),
            messages,
            temperature: self.config.temperature,
            max_tokens: None,
            stream,
            tools,
            tool_choice,
        }
    }

    async fn send_chat(&self, request: &ChatCompletionRequest) -> Result<Response> {
        let response = self
            .build_request("/chat/completions")
            .json(request)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    Error::Timeout(format!("LLM request timed out: {}", e))
                } else {
                    Error::Inference(format!("Request failed: {}", e))
                }
            })?;

        if !response.status().is_success() {
            return Err(error_from_response(response).await);
        }
        Ok(response)
    }

    async fn complete(&self, messages: Vec<ChatMessage>) -> Result<String> {
        let request = self.chat_request(messages, false, None);
        let response = self.send_chat(&request).await?;

        let result: ChatCompletionResponse = response
            .json()
            .await
            .map_err(|e| Error::Inference(format!("Failed to parse response: {}", e)))?;

        let content = result
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .unwrap_or_default();

        debug!("Generation complete, response length: {}", content.len());
        Ok(content)
    }
}

fn system_and_user(system: &str, prompt: &str) -> Vec<ChatMessage> {
    let mut messages = Vec::with_capacity(2);
    if !system.is_empty() {
        messages.push(ChatMessage::system(system));
    }
    messages.push(ChatMessage::user(prompt));
    messages
}

/// Turn a non-success response into a classified inference error.
async fn error_from_response(response: Response) -> Error {
    let status = response.status().as_u16();
    let body = response.text().await.unwrap_or_default();
    let (error_type, message) = match serde_json::from_str::<OpenAIErrorResponse>(&body) {
        Ok(parsed) => (
            parsed
                .error
                .code
                .filter(|c| c == "model_not_found" || c.contains("context_length"))
                .unwrap_or(parsed.error.error_type),
            parsed.error.message,
        ),
        Err(_) if body.is_empty() => ("unknown".to_string(), "Unknown error".to_string()),
        Err(_) => ("unknown".to_string(), body),
    };
    let code = OpenAIErrorCode::from_response(status, &error_type);
    to_civic_error(code, status, &message)
}

#[async_trait]
impl EmbeddingBackend for OpenAIBackend {
    #[instrument(
        skip(self, texts),
        fields(subsystem = "inference", component = "openai", op = "embed_texts", count = texts.len())
    )]
    async fn embed_texts(&self, texts: &[String]) -> Result<Vec<Vector>> {
        if texts.is_empty() {
            return Ok(vec![]);
        }

        let request = EmbeddingRequest {
            model: self.config.embed_model.clone(),
            input: texts.to_vec(),
            encoding_format: Some("float".to_string()),
        };

        let response = self
            .build_request("/embeddings")
            .json(&request)
            .send()
            .await
            .map_err(|e| Error::Embedding(format!("Request failed: {}", e)))?;

        if !response.status().is_success() {
            let err = error_from_response(response).await;
            return Err(Error::Embedding(err.to_string()));
        }

        let result: EmbeddingResponse = response
            .json()
            .await
            .map_err(|e| Error::Embedding(format!("Failed to parse response: {}", e)))?;

        let mut data = result.data;
        data.sort_by_key(|d| d.index);

        if data.len() != texts.len() {
            return Err(Error::Embedding(format!(
                "Expected {} embeddings, got {}",
                texts.len(),
                data.len()
            )));
        }

        let vectors: Vec<Vector> = data
            .into_iter()
            .map(|d| Vector::from(d.embedding))
            .collect();

        debug!("Generated {} embeddings", vectors.len());
        Ok(vectors)
    }

    fn dimension(&self) -> usize {
        self.config.embed_dimension
    }

    fn model_name(&self) -> &str {
        &self.config.embed_model
    }
}

#[async_trait]
impl GenerationBackend for OpenAIBackend {
    async fn generate(&self, prompt: &str) -> Result<String> {
        self.generate_with_system("", prompt).await
    }

    #[instrument(
        skip(self, system, prompt),
        fields(subsystem = "inference", component = "openai", op = "generate", prompt_len = prompt.len())
    )]
    async fn generate_with_system(&self, system: &str, prompt: &str) -> Result<String> {
        self.complete(system_and_user(system, prompt)).await
    }

    fn model_name(&self) -> &str {
        &self.config.gen_model
    }
}

#[async_trait]
impl StreamingGeneration for OpenAIBackend {
    #[instrument(
        skip(self, system, prompt),
        fields(subsystem = "inference", component = "openai", op = "generate_stream", prompt_len = prompt.len())
    )]
    async fn generate_with_system_stream(&self, system: &str, prompt: &str) -> Result<TokenStream> {
        let request = self.chat_request(system_and_user(system, prompt), true, None);
        let response = self.send_chat(&request).await?;
        Ok(parse_sse_stream(response.bytes_stream()))
    }
}

#[async_trait]
impl ToolCallingBackend for OpenAIBackend {
    #[instrument(
        skip(self, messages, tools),
        fields(subsystem = "inference", component = "openai", op = "decide", messages = messages.len())
    )]
    async fn decide(
        &self,
        messages: &[ResearchMessage],
        tools: &[ToolDefinition],
    ) -> Result<ToolDecision> {
        let wire_messages: Vec<ChatMessage> = messages.iter().map(ChatMessage::from).collect();
        let specs = if tools.is_empty() {
            None
        } else {
            Some(tools.iter().map(ToolSpec::from).collect())
        };
        let request = self.chat_request(wire_messages, false, specs);
        let response = self.send_chat(&request).await?;

        let result: ChatCompletionResponse = response
            .json()
            .await
            .map_err(|e| Error::Inference(format!("Failed to parse response: {}", e)))?;

        let calls: Vec<ToolInvocation> = result
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.tool_calls)
            .unwrap_or_default()
            .into_iter()
            .map(ToolInvocation::from)
            .collect();

        debug!(tool_calls = calls.len(), "Planning step decided");
        if calls.is_empty() {
            Ok(ToolDecision::Answer)
        } else {
            Ok(ToolDecision::CallTools(calls))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = OpenAIConfig::default();
        assert_eq!(config.base_url, defaults::OPENAI_URL);
        assert_eq!(config.embed_model, defaults::EMBED_MODEL);
        assert_eq!(config.gen_model, defaults::GEN_MODEL);
        assert_eq!(config.embed_dimension, 1536);
        assert_eq!(config.timeout_seconds, defaults::INFERENCE_TIMEOUT_SECS);
        assert!(config.api_key.is_none());
        assert!(!config.skip_tls_verify);
    }

    #[test]
    fn test_config_builders() {
        let config = OpenAIConfig::default()
            .with_base_url("http://localhost:8080/v1")
            .with_api_key("test-key")
            .with_timeout(5);
        assert_eq!(config.base_url, "http://localhost:8080/v1");
        assert_eq!(config.api_key.as_deref(), Some("test-key"));
        assert_eq!(config.timeout_seconds, 5);
    }

    #[test]
    fn test_model_name_accessors() {
        let config = OpenAIConfig {
            embed_model: "test-embed".to_string(),
            gen_model: "test-gen".to_string(),
            embed_dimension: 512,
            ..Default::default()
        };
        let backend = OpenAIBackend::new(config).unwrap();
        assert_eq!(EmbeddingBackend::model_name(&backend), "test-embed");
        assert_eq!(GenerationBackend::model_name(&backend), "test-gen");
        assert_eq!(backend.dimension(), 512);
    }

    #[test]
    fn test_chat_request_sets_tool_choice_with_tools() {
        let backend = OpenAIBackend::new(OpenAIConfig::default()).unwrap();
        let request = backend.chat_request(
            vec![ChatMessage::user("hi")],
            false,
            Some(vec![ToolSpec::from(&ToolDefinition {
                name: "get_current_date".to_string(),
                description: "Today".to_string(),
                parameters: serde_json::json!({"type": "object"}),
            })]),
        );
        assert_eq!(request.tool_choice.as_deref(), Some("auto"));

        let plain = backend.chat_request(vec![ChatMessage::user("hi")], true, None);
        assert!(plain.tool_choice.is_none());
        assert!(plain.stream);
    }

    #[test]
    fn test_system_and_user_skips_empty_system() {
        assert_eq!(system_and_user("", "q").len(), 1);
        let both = system_and_user("s", "q");
        assert_eq!(both[0].role, "system");
        assert_eq!(both[1].role, "user");
    }
}
