use async_trait::async_trait;
use secrecy::ExposeSecret;
use serde_json::{json, Value};
use thiserror::Error;
use tracing::warn;

use aerolens_core::config::{LlmConfig, LlmProvider};
use aerolens_gateway::ToolSpec;

const ANTHROPIC_DEFAULT_BASE_URL: &str = "https://api.anthropic.com";
const OPENAI_DEFAULT_BASE_URL: &str = "https://api.openai.com";
const ANTHROPIC_VERSION: &str = "2023-06-01";

#[derive(Debug, Error)]
pub enum LlmError {
    #[error("reasoning provider transport failure: {0}")]
    Transport(String),
    #[error("reasoning provider returned status {status}: {body}")]
    Api { status: u16, body: String },
    #[error("reasoning provider response could not be decoded: {0}")]
    Decode(String),
    #[error("reasoning client misconfigured: {0}")]
    Configuration(String),
}

impl LlmError {
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Transport(_))
    }
}

/// One tool invocation requested by the reasoning loop.
#[derive(Clone, Debug, PartialEq)]
pub struct ToolRequest {
    pub id: String,
    pub name: String,
    pub arguments: Value,
}

/// Result of one executed tool call, fed back into the loop's context.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ToolResultMessage {
    pub request_id: String,
    pub tool_name: String,
    pub content: String,
    pub is_error: bool,
}

/// Conversation entries as the wire protocols model them: plain user and
/// assistant text, plus the tool-use / tool-result pairs a tool round adds.
#[derive(Clone, Debug, PartialEq)]
pub enum ChatMessage {
    User { content: String },
    Assistant { content: String },
    ToolUse { requests: Vec<ToolRequest> },
    ToolResults { results: Vec<ToolResultMessage> },
}

impl ChatMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self::User { content: content.into() }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::Assistant { content: content.into() }
    }
}

#[derive(Clone, Debug)]
pub struct ChatRequest {
    pub system: String,
    pub messages: Vec<ChatMessage>,
    pub tools: Vec<ToolSpec>,
}

/// Terminal outcome of one reasoning invocation: either the final answer or
/// a batch of requested tool calls.
#[derive(Clone, Debug, PartialEq)]
pub enum ChatOutcome {
    Answer(String),
    ToolRequests(Vec<ToolRequest>),
}

/// The reasoning loop is an opaque external capability with bounded latency
/// and non-zero failure probability; everything above this seam is testable
/// with deterministic stubs.
#[async_trait]
pub trait ReasoningClient: Send + Sync {
    async fn chat(&self, request: ChatRequest) -> Result<ChatOutcome, LlmError>;
}

/// HTTP client speaking either the Anthropic messages protocol or the
/// OpenAI-compatible chat-completions protocol (which Ollama also serves).
pub struct HttpReasoningClient {
    http: reqwest::Client,
    provider: LlmProvider,
    base_url: String,
    api_key: Option<String>,
    model: String,
    max_tokens: u32,
    max_retries: u32,
}

impl HttpReasoningClient {
    pub fn from_config(config: &LlmConfig) -> Result<Self, LlmError> {
        let base_url = config
            .base_url
            .clone()
            .unwrap_or_else(|| match config.provider {
                LlmProvider::Anthropic => ANTHROPIC_DEFAULT_BASE_URL.to_string(),
                LlmProvider::OpenAi => OPENAI_DEFAULT_BASE_URL.to_string(),
                LlmProvider::Ollama => "http://localhost:11434".to_string(),
            })
            .trim_end_matches('/')
            .to_string();

        let api_key = config.api_key.as_ref().map(|key| key.expose_secret().to_string());
        if api_key.is_none() && !matches!(config.provider, LlmProvider::Ollama) {
            return Err(LlmError::Configuration(
                "api key is required for hosted providers".to_string(),
            ));
        }

        let http = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|error| LlmError::Transport(error.to_string()))?;

        Ok(Self {
            http,
            provider: config.provider,
            base_url,
            api_key,
            model: config.model.clone(),
            max_tokens: config.max_tokens,
            max_retries: config.max_retries,
        })
    }

    async fn post_once(&self, request: &ChatRequest) -> Result<ChatOutcome, LlmError> {
        let (url, body) = match self.provider {
            LlmProvider::Anthropic => (
                format!("{}/v1/messages", self.base_url),
                build_anthropic_request(&self.model, self.max_tokens, request),
            ),
            LlmProvider::OpenAi | LlmProvider::Ollama => (
                format!("{}/v1/chat/completions", self.base_url),
                build_openai_request(&self.model, self.max_tokens, request),
            ),
        };

        let mut builder = self.http.post(&url).json(&body);
        builder = match self.provider {
            LlmProvider::Anthropic => builder
                .header("x-api-key", self.api_key.clone().unwrap_or_default())
                .header("anthropic-version", ANTHROPIC_VERSION),
            LlmProvider::OpenAi => {
                builder.bearer_auth(self.api_key.clone().unwrap_or_default())
            }
            LlmProvider::Ollama => match &self.api_key {
                Some(key) => builder.bearer_auth(key.clone()),
                None => builder,
            },
        };

        let response =
            builder.send().await.map_err(|error| LlmError::Transport(error.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(LlmError::Api { status: status.as_u16(), body });
        }

        let payload: Value =
            response.json().await.map_err(|error| LlmError::Decode(error.to_string()))?;

        match self.provider {
            LlmProvider::Anthropic => parse_anthropic_response(payload),
            LlmProvider::OpenAi | LlmProvider::Ollama => parse_openai_response(payload),
        }
    }
}

#[async_trait]
impl ReasoningClient for HttpReasoningClient {
    async fn chat(&self, request: ChatRequest) -> Result<ChatOutcome, LlmError> {
        let mut attempt = 0;
        loop {
            match self.post_once(&request).await {
                Ok(outcome) => return Ok(outcome),
                Err(error) if error.is_retryable() && attempt < self.max_retries => {
                    warn!(
                        event_name = "llm.request_retry",
                        attempt,
                        error = %error,
                        "retrying reasoning call after transport failure"
                    );
                    attempt += 1;
                }
                Err(error) => return Err(error),
            }
        }
    }
}

fn build_anthropic_request(model: &str, max_tokens: u32, request: &ChatRequest) -> Value {
    let messages: Vec<Value> = request
        .messages
        .iter()
        .map(|message| match message {
            ChatMessage::User { content } => json!({"role": "user", "content": content}),
            ChatMessage::Assistant { content } => json!({"role": "assistant", "content": content}),
            ChatMessage::ToolUse { requests } => json!({
                "role": "assistant",
                "content": requests
                    .iter()
                    .map(|req| json!({
                        "type": "tool_use",
                        "id": req.id,
                        "name": req.name,
                        "input": req.arguments,
                    }))
                    .collect::<Vec<_>>(),
            }),
            ChatMessage::ToolResults { results } => json!({
                "role": "user",
                "content": results
                    .iter()
                    .map(|result| json!({
                        "type": "tool_result",
                        "tool_use_id": result.request_id,
                        "content": result.content,
                        "is_error": result.is_error,
                    }))
                    .collect::<Vec<_>>(),
            }),
        })
        .collect();

    let mut body = json!({
        "model": model,
        "max_tokens": max_tokens,
        "system": request.system,
        "messages": messages,
    });

    if !request.tools.is_empty() {
        body["tools"] = request
            .tools
            .iter()
            .map(|tool| {
                json!({
                    "name": tool.name,
                    "description": tool.description,
                    "input_schema": tool.input_schema,
                })
            })
            .collect::<Vec<_>>()
            .into();
    }

    body
}

fn build_openai_request(model: &str, max_tokens: u32, request: &ChatRequest) -> Value {
    let mut messages = vec![json!({"role": "system", "content": request.system})];
    for message in &request.messages {
        match message {
            ChatMessage::User { content } => {
                messages.push(json!({"role": "user", "content": content}));
            }
            ChatMessage::Assistant { content } => {
                messages.push(json!({"role": "assistant", "content": content}));
            }
            ChatMessage::ToolUse { requests } => {
                messages.push(json!({
                    "role": "assistant",
                    "content": Value::Null,
                    "tool_calls": requests
                        .iter()
                        .map(|req| json!({
                            "id": req.id,
                            "type": "function",
                            "function": {
                                "name": req.name,
                                "arguments": req.arguments.to_string(),
                            }
                        }))
                        .collect::<Vec<_>>(),
                }));
            }
            ChatMessage::ToolResults { results } => {
                for result in results {
                    messages.push(json!({
                        "role": "tool",
                        "tool_call_id": result.request_id,
                        "content": result.content,
                    }));
                }
            }
        }
    }

    let mut body = json!({
        "model": model,
        "max_tokens": max_tokens,
        "messages": messages,
    });

    if !request.tools.is_empty() {
        body["tools"] = request
            .tools
            .iter()
            .map(|tool| {
                json!({
                    "type": "function",
                    "function": {
                        "name": tool.name,
                        "description": tool.description,
                        "parameters": tool.input_schema,
                    }
                })
            })
            .collect::<Vec<_>>()
            .into();
    }

    body
}

fn parse_anthropic_response(payload: Value) -> Result<ChatOutcome, LlmError> {
    let blocks = payload
        .get("content")
        .and_then(Value::as_array)
        .ok_or_else(|| LlmError::Decode("response has no content array".to_string()))?;

    let mut requests = Vec::new();
    let mut text_parts = Vec::new();
    for block in blocks {
        match block.get("type").and_then(Value::as_str) {
            Some("tool_use") => requests.push(ToolRequest {
                id: block
                    .get("id")
                    .and_then(Value::as_str)
                    .ok_or_else(|| LlmError::Decode("tool_use block lacks id".to_string()))?
                    .to_string(),
                name: block
                    .get("name")
                    .and_then(Value::as_str)
                    .ok_or_else(|| LlmError::Decode("tool_use block lacks name".to_string()))?
                    .to_string(),
                arguments: block.get("input").cloned().unwrap_or_else(|| json!({})),
            }),
            Some("text") => {
                if let Some(text) = block.get("text").and_then(Value::as_str) {
                    text_parts.push(text.to_string());
                }
            }
            _ => {}
        }
    }

    if !requests.is_empty() {
        return Ok(ChatOutcome::ToolRequests(requests));
    }

    if text_parts.is_empty() {
        return Err(LlmError::Decode("response carries neither text nor tool_use".to_string()));
    }

    Ok(ChatOutcome::Answer(text_parts.join("\n")))
}

fn parse_openai_response(payload: Value) -> Result<ChatOutcome, LlmError> {
    let message = payload
        .get("choices")
        .and_then(Value::as_array)
        .and_then(|choices| choices.first())
        .and_then(|choice| choice.get("message"))
        .ok_or_else(|| LlmError::Decode("response has no choices[0].message".to_string()))?;

    if let Some(calls) = message.get("tool_calls").and_then(Value::as_array) {
        if !calls.is_empty() {
            let mut requests = Vec::new();
            for call in calls {
                let function = call
                    .get("function")
                    .ok_or_else(|| LlmError::Decode("tool call lacks function".to_string()))?;
                let raw_arguments =
                    function.get("arguments").and_then(Value::as_str).unwrap_or("{}");
                requests.push(ToolRequest {
                    id: call
                        .get("id")
                        .and_then(Value::as_str)
                        .unwrap_or_default()
                        .to_string(),
                    name: function
                        .get("name")
                        .and_then(Value::as_str)
                        .ok_or_else(|| LlmError::Decode("tool call lacks name".to_string()))?
                        .to_string(),
                    arguments: serde_json::from_str(raw_arguments)
                        .unwrap_or_else(|_| json!({"raw": raw_arguments})),
                });
            }
            return Ok(ChatOutcome::ToolRequests(requests));
        }
    }

    match message.get("content").and_then(Value::as_str) {
        Some(content) if !content.is_empty() => Ok(ChatOutcome::Answer(content.to_string())),
        _ => Err(LlmError::Decode("response carries neither content nor tool calls".to_string())),
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use aerolens_core::SpecialistDomain;
    use aerolens_gateway::ToolCatalog;

    use super::{
        build_anthropic_request, build_openai_request, parse_anthropic_response,
        parse_openai_response, ChatMessage, ChatOutcome, ChatRequest, ToolRequest,
        ToolResultMessage,
    };

    fn request_fixture() -> ChatRequest {
        ChatRequest {
            system: "You are the operations specialist.".to_string(),
            messages: vec![
                ChatMessage::user("Which routes have the most delays?"),
                ChatMessage::ToolUse {
                    requests: vec![ToolRequest {
                        id: "call-1".to_string(),
                        name: "operations.run_cypher".to_string(),
                        arguments: json!({"query": "MATCH (d:Delay) RETURN count(d)"}),
                    }],
                },
                ChatMessage::ToolResults {
                    results: vec![ToolResultMessage {
                        request_id: "call-1".to_string(),
                        tool_name: "operations.run_cypher".to_string(),
                        content: "{\"count\": 12}".to_string(),
                        is_error: false,
                    }],
                },
            ],
            tools: ToolCatalog::for_domain(SpecialistDomain::Operations).specs().to_vec(),
        }
    }

    #[test]
    fn anthropic_request_threads_tool_rounds_through_content_blocks() {
        let body = build_anthropic_request("claude-sonnet-4", 1024, &request_fixture());

        assert_eq!(body["system"], "You are the operations specialist.");
        assert_eq!(body["messages"][1]["role"], "assistant");
        assert_eq!(body["messages"][1]["content"][0]["type"], "tool_use");
        assert_eq!(body["messages"][2]["role"], "user");
        assert_eq!(body["messages"][2]["content"][0]["tool_use_id"], "call-1");
        assert_eq!(body["tools"][0]["name"], "operations.get_schema");
    }

    #[test]
    fn openai_request_threads_tool_rounds_through_tool_messages() {
        let body = build_openai_request("gpt-4o", 1024, &request_fixture());

        assert_eq!(body["messages"][0]["role"], "system");
        assert_eq!(body["messages"][2]["tool_calls"][0]["function"]["name"], "operations.run_cypher");
        assert_eq!(body["messages"][3]["role"], "tool");
        assert_eq!(body["messages"][3]["tool_call_id"], "call-1");
        assert_eq!(body["tools"][0]["type"], "function");
    }

    #[test]
    fn anthropic_tool_use_wins_over_accompanying_text() {
        let outcome = parse_anthropic_response(json!({
            "content": [
                {"type": "text", "text": "Let me check the graph."},
                {"type": "tool_use", "id": "call-9", "name": "operations.get_schema", "input": {}}
            ]
        }))
        .expect("outcome");

        match outcome {
            ChatOutcome::ToolRequests(requests) => {
                assert_eq!(requests.len(), 1);
                assert_eq!(requests[0].name, "operations.get_schema");
            }
            other => panic!("expected tool requests, got {other:?}"),
        }
    }

    #[test]
    fn anthropic_text_blocks_join_into_an_answer() {
        let outcome = parse_anthropic_response(json!({
            "content": [
                {"type": "text", "text": "Three routes stand out."},
                {"type": "text", "text": "JFK-ORD leads with 14 delays."}
            ]
        }))
        .expect("outcome");

        assert_eq!(
            outcome,
            ChatOutcome::Answer("Three routes stand out.\nJFK-ORD leads with 14 delays.".to_string())
        );
    }

    #[test]
    fn openai_tool_call_arguments_are_decoded_from_json_strings() {
        let outcome = parse_openai_response(json!({
            "choices": [{
                "message": {
                    "content": null,
                    "tool_calls": [{
                        "id": "call-3",
                        "type": "function",
                        "function": {
                            "name": "maintenance.run_cypher",
                            "arguments": "{\"query\": \"MATCH (m:MaintenanceEvent) RETURN m LIMIT 5\"}"
                        }
                    }]
                }
            }]
        }))
        .expect("outcome");

        match outcome {
            ChatOutcome::ToolRequests(requests) => {
                assert_eq!(requests[0].arguments["query"], "MATCH (m:MaintenanceEvent) RETURN m LIMIT 5");
            }
            other => panic!("expected tool requests, got {other:?}"),
        }
    }

    #[test]
    fn empty_responses_are_decode_errors() {
        assert!(parse_anthropic_response(json!({"content": []})).is_err());
        assert!(parse_openai_response(json!({"choices": []})).is_err());
    }
}
