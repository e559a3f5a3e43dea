//! Ollama chat backend
//!
//! Uses direct HTTP to `/api/chat` for tool calling support. Ollama has no
//! named tool choice, so the prompt's trailing instruction carries that
//! constraint instead.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::{ChatMessage, ChatModel, LlmError, Role, ToolCall, ToolChoice, ToolSpec};

const DEFAULT_OLLAMA_URL: &str = "http://localhost:11434";

/// Information about an available model
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelInfo {
    pub name: String,
    #[serde(default)]
    pub size: u64,
    #[serde(default)]
    pub modified_at: String,
}

#[derive(Debug, Deserialize)]
struct OllamaTagsResponse {
    models: Vec<ModelInfo>,
}

/// Reduce any URL to `http://host:port`
fn base_url(raw: &str) -> String {
    match url::Url::parse(raw) {
        Ok(url) => {
            let host = url.host_str().unwrap_or("localhost");
            let port = url.port().unwrap_or(11434);
            format!("http://{}:{}", host, port)
        }
        Err(e) => {
            tracing::warn!("Invalid Ollama URL {:?} ({}), using {}", raw, e, DEFAULT_OLLAMA_URL);
            DEFAULT_OLLAMA_URL.to_string()
        }
    }
}

/// List available models from Ollama
pub async fn list_models(ollama_url: &str) -> Result<Vec<ModelInfo>, LlmError> {
    let api_url = format!("{}/api/tags", base_url(ollama_url));

    let response = reqwest::Client::new().get(&api_url).send().await?;
    if !response.status().is_success() {
        let status = response.status().as_u16();
        let body = response.text().await.unwrap_or_default();
        return Err(LlmError::from_status(status, body));
    }

    let tags: OllamaTagsResponse = response
        .json()
        .await
        .map_err(|e| LlmError::InvalidResponse(e.to_string()))?;

    Ok(tags.models)
}

#[derive(Debug, Serialize)]
struct DirectChatRequest<'a> {
    model: &'a str,
    messages: Vec<DirectMessage>,
    #[serde(skip_serializing_if = "no_tools")]
    tools: &'a [ToolSpec],
    stream: bool,
    options: RequestOptions,
}

fn no_tools(tools: &&[ToolSpec]) -> bool {
    tools.is_empty()
}

#[derive(Debug, Serialize)]
struct RequestOptions {
    temperature: f32,
}

#[derive(Debug, Serialize, Deserialize)]
struct DirectMessage {
    role: String,
    #[serde(default)]
    content: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    tool_calls: Vec<DirectToolCall>,
}

#[derive(Debug, Serialize, Deserialize)]
struct DirectToolCall {
    function: DirectFunction,
}

/// Ollama sends arguments as a JSON object
#[derive(Debug, Serialize, Deserialize)]
struct DirectFunction {
    name: String,
    #[serde(default)]
    arguments: serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct DirectChatResponse {
    message: DirectMessage,
}

/// Fallback for models that print the call as JSON content
/// Format: `{"name": "tool_name", "arguments": {"key": "value"}}`
#[derive(Deserialize)]
struct ContentToolCall {
    name: String,
    arguments: serde_json::Value,
}

fn parse_content_tool_call(content: &str) -> Option<ToolCall> {
    let parsed: ContentToolCall = serde_json::from_str(content.trim()).ok()?;
    Some(ToolCall::new(None, parsed.name, parsed.arguments))
}

impl From<&ChatMessage> for DirectMessage {
    fn from(message: &ChatMessage) -> Self {
        let role = match message.role {
            Role::System => "system",
            Role::User => "user",
            Role::Assistant => "assistant",
            Role::Tool => "tool",
        };
        Self {
            role: role.to_string(),
            content: message.content.clone(),
            tool_calls: message
                .tool_calls
                .iter()
                .map(|call| DirectToolCall {
                    function: DirectFunction {
                        name: call.function.name.clone(),
                        arguments: call.function.arguments.clone(),
                    },
                })
                .collect(),
        }
    }
}

/// Ollama client using direct HTTP calls
pub struct OllamaClient {
    http_client: reqwest::Client,
    base_url: String,
    model: String,
    temperature: f32,
    timeout: Duration,
}

impl OllamaClient {
    /// Create a new Ollama client
    pub fn new(url: &str, model: &str) -> Self {
        Self {
            http_client: reqwest::Client::new(),
            base_url: base_url(url),
            model: model.to_string(),
            temperature: 0.8,
            timeout: Duration::from_secs(120),
        }
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

#[async_trait]
impl ChatModel for OllamaClient {
    async fn invoke(
        &self,
        messages: &[ChatMessage],
        tools: &[ToolSpec],
        _tool_choice: &ToolChoice,
    ) -> Result<ChatMessage, LlmError> {
        let request = DirectChatRequest {
            model: &self.model,
            messages: messages.iter().map(DirectMessage::from).collect(),
            tools,
            stream: false,
            options: RequestOptions {
                temperature: self.temperature,
            },
        };

        tracing::debug!(
            model = %self.model,
            messages = messages.len(),
            tools = tools.len(),
            "Sending Ollama chat request"
        );

        let response = self
            .http_client
            .post(format!("{}/api/chat", self.base_url))
            .timeout(self.timeout)
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(LlmError::from_status(status, body));
        }

        let raw_body = response.text().await?;
        let body: DirectChatResponse = serde_json::from_str(&raw_body)
            .map_err(|e| LlmError::InvalidResponse(format!("{}: {}", e, raw_body)))?;

        let assistant = body.message;
        let mut calls: Vec<ToolCall> = assistant
            .tool_calls
            .into_iter()
            .enumerate()
            .map(|(i, call)| {
                ToolCall::new(Some(format!("call_{}", i)), call.function.name, call.function.arguments)
            })
            .collect();

        if calls.is_empty() {
            if let Some(parsed) = parse_content_tool_call(&assistant.content) {
                tracing::info!("Parsed tool call from content: {}", parsed.function.name);
                calls.push(parsed);
            }
        }

        Ok(ChatMessage::tool_calls(assistant.content, calls))
    }

    fn model(&self) -> &str {
        &self.model
    }
}
