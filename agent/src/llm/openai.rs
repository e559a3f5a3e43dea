//! OpenAI-compatible chat completion backend
//!
//! Talks to `/v1/chat/completions` over direct HTTP. Works against OpenAI
//! itself and against self-hosted servers (vLLM, llama.cpp) exposing the same
//! API with named tool choice.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::{ChatMessage, ChatModel, LlmError, Role, ToolCall, ToolChoice, ToolSpec};

const DEFAULT_BASE_URL: &str = "http://localhost:8000/v1";

/// Normalize a server URL to the `/v1` API base
fn api_base(raw: &str) -> String {
    let trimmed = raw.trim().trim_end_matches('/');
    match url::Url::parse(trimmed) {
        Ok(_) if trimmed.ends_with("/v1") => trimmed.to_string(),
        Ok(_) => format!("{}/v1", trimmed),
        Err(e) => {
            tracing::warn!("Invalid completion service URL {:?} ({}), using {}", raw, e, DEFAULT_BASE_URL);
            DEFAULT_BASE_URL.to_string()
        }
    }
}

#[derive(Debug, Serialize)]
struct CompletionRequest<'a> {
    model: &'a str,
    messages: Vec<WireMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tools: Option<&'a [ToolSpec]>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_choice: Option<serde_json::Value>,
    temperature: f32,
}

#[derive(Debug, Serialize, Deserialize)]
struct WireMessage {
    role: String,
    #[serde(default)]
    content: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    tool_calls: Option<Vec<WireToolCall>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    tool_call_id: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
struct WireToolCall {
    #[serde(default)]
    id: Option<String>,
    #[serde(rename = "type", default = "function_type")]
    call_type: String,
    function: WireFunction,
}

fn function_type() -> String {
    "function".to_string()
}

/// OpenAI sends arguments as a JSON-encoded string
#[derive(Debug, Serialize, Deserialize)]
struct WireFunction {
    name: String,
    #[serde(default)]
    arguments: String,
}

#[derive(Debug, Deserialize)]
struct CompletionResponse {
    choices: Vec<CompletionChoice>,
}

#[derive(Debug, Deserialize)]
struct CompletionChoice {
    message: WireMessage,
}

#[derive(Debug, Deserialize)]
struct ModelsResponse {
    data: Vec<ModelEntry>,
}

#[derive(Debug, Deserialize)]
struct ModelEntry {
    id: String,
}

impl From<&ChatMessage> for WireMessage {
    fn from(message: &ChatMessage) -> Self {
        let role = match message.role {
            Role::System => "system",
            Role::User => "user",
            Role::Assistant => "assistant",
            Role::Tool => "tool",
        };

        let tool_calls = if message.tool_calls.is_empty() {
            None
        } else {
            Some(
                message
                    .tool_calls
                    .iter()
                    .map(|call| WireToolCall {
                        id: call.id.clone(),
                        call_type: function_type(),
                        function: WireFunction {
                            name: call.function.name.clone(),
                            arguments: match &call.function.arguments {
                                serde_json::Value::String(raw) => raw.clone(),
                                other => other.to_string(),
                            },
                        },
                    })
                    .collect(),
            )
        };

        Self {
            role: role.to_string(),
            content: Some(message.content.clone()),
            name: message.name.clone(),
            tool_calls,
            tool_call_id: message.tool_call_id.clone(),
        }
    }
}

impl From<WireMessage> for ChatMessage {
    fn from(message: WireMessage) -> Self {
        let calls = message
            .tool_calls
            .unwrap_or_default()
            .into_iter()
            .map(|call| {
                // Unparseable arguments stay as a raw string so validation can report them
                let arguments = serde_json::from_str(&call.function.arguments)
                    .unwrap_or(serde_json::Value::String(call.function.arguments));
                ToolCall::new(call.id, call.function.name, arguments)
            })
            .collect();

        ChatMessage::tool_calls(message.content.unwrap_or_default(), calls)
    }
}

/// OpenAI-compatible chat client
pub struct OpenAiClient {
    http_client: reqwest::Client,
    base_url: String,
    api_key: String,
    model: String,
    temperature: f32,
    timeout: Duration,
}

impl OpenAiClient {
    /// Create a new client for the given server URL and model
    pub fn new(url: &str, model: &str) -> Self {
        Self {
            http_client: reqwest::Client::new(),
            base_url: api_base(url),
            api_key: "EMPTY".to_string(),
            model: model.to_string(),
            temperature: 0.8,
            timeout: Duration::from_secs(120),
        }
    }

    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = api_key.into();
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

/// List model ids served at `url`
pub async fn list_models(url: &str, api_key: &str) -> Result<Vec<String>, LlmError> {
    let endpoint = format!("{}/models", api_base(url));
    let response = reqwest::Client::new()
        .get(&endpoint)
        .bearer_auth(api_key)
        .send()
        .await?;

    if !response.status().is_success() {
        let status = response.status().as_u16();
        let body = response.text().await.unwrap_or_default();
        return Err(LlmError::from_status(status, body));
    }

    let models: ModelsResponse = response
        .json()
        .await
        .map_err(|e| LlmError::InvalidResponse(e.to_string()))?;

    Ok(models.data.into_iter().map(|m| m.id.trim().to_string()).collect())
}

#[async_trait]
impl ChatModel for OpenAiClient {
    async fn invoke(
        &self,
        messages: &[ChatMessage],
        tools: &[ToolSpec],
        tool_choice: &ToolChoice,
    ) -> Result<ChatMessage, LlmError> {
        let request = CompletionRequest {
            model: &self.model,
            messages: messages.iter().map(WireMessage::from).collect(),
            tools: (!tools.is_empty()).then_some(tools),
            tool_choice: (!tools.is_empty()).then(|| tool_choice.to_wire()),
            temperature: self.temperature,
        };

        tracing::debug!(
            model = %self.model,
            messages = messages.len(),
            tools = tools.len(),
            "Sending chat completion request"
        );

        let response = self
            .http_client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
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
        let body: CompletionResponse = serde_json::from_str(&raw_body)
            .map_err(|e| LlmError::InvalidResponse(format!("{}: {}", e, raw_body)))?;

        let message = body
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| LlmError::InvalidResponse("response has no choices".to_string()))?
            .message;

        let message = ChatMessage::from(message);
        tracing::debug!(
            content_len = message.content.len(),
            tool_calls = message.tool_calls.len(),
            "Received chat completion"
        );

        Ok(message)
    }

    fn model(&self) -> &str {
        &self.model
    }
}
