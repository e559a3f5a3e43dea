//! Agent module - structured model invocations with retries
//!
//! A [`Responder`] binds a prompt template and one tool to a chat backend.
//! Each call runs the "validate and correct" loop:
//! 1. The prompt is rendered around the current conversation log
//! 2. The model is forced to call the bound tool
//! 3. The tool call is checked against the tool's schema and parsed
//! 4. On failure the bad response plus corrective feedback is appended to the
//!    log and the model is asked again, up to the validation bound
//!
//! Transient service failures are retried separately with exponential
//! backoff inside each validation attempt.

use std::marker::PhantomData;
use std::sync::Arc;

use serde::de::DeserializeOwned;
use thiserror::Error;

use crate::llm::{ChatMessage, ChatModel, ConversationLog, LlmError, ToolChoice, ToolSpec};
use crate::schemas::StructuredOutput;

mod prompt;
mod retry;

pub use prompt::{PromptTemplate, DEFAULT_CLOSING};
pub use retry::RetryPolicy;

/// Why a model response was rejected
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ValidationError {
    #[error("Response did not call a function; expected a call to {expected}")]
    MissingToolCall { expected: String },

    #[error("Response called {found}; expected a call to {expected}")]
    WrongTool { expected: String, found: String },

    #[error("Arguments for {tool} failed schema validation: {}", .errors.join("; "))]
    Schema { tool: String, errors: Vec<String> },

    #[error("Arguments for {tool} could not be parsed: {reason}")]
    Malformed { tool: String, reason: String },
}

/// Outcome of one [`Responder::respond`] call
#[derive(Debug, Clone)]
pub struct Response<T> {
    /// The model's last raw response
    pub message: ChatMessage,
    /// The parsed record, `None` when validation attempts ran out
    pub record: Option<T>,
}

impl<T> Response<T> {
    pub fn is_valid(&self) -> bool {
        self.record.is_some()
    }
}

/// Model invocation bound to one prompt and one structured output
pub struct Responder<T> {
    model: Arc<dyn ChatModel>,
    prompt: PromptTemplate,
    tool: ToolSpec,
    policy: RetryPolicy,
    _output: PhantomData<fn() -> T>,
}

impl<T: StructuredOutput> Responder<T> {
    /// Bind `prompt` to the tool derived from `T`
    pub fn for_output(model: Arc<dyn ChatModel>, prompt: PromptTemplate) -> Self {
        Self::new(model, prompt, T::tool())
    }
}

impl<T: DeserializeOwned> Responder<T> {
    /// Bind `prompt` to an explicit tool whose arguments deserialize into `T`
    pub fn new(model: Arc<dyn ChatModel>, prompt: PromptTemplate, tool: ToolSpec) -> Self {
        Self {
            model,
            prompt,
            tool,
            policy: RetryPolicy::default(),
            _output: PhantomData,
        }
    }

    pub fn with_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn tool(&self) -> &ToolSpec {
        &self.tool
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Invoke the model against `log` until it produces a valid record
    ///
    /// Every rejected response is appended to `log` followed by a feedback
    /// message, so later attempts (and later callers) see the correction. A
    /// valid response is returned without being appended. When validation
    /// attempts run out, the last raw response is returned with `record: None`.
    ///
    /// Fails only when the service fails: non-transient errors immediately,
    /// transient ones once the request bound is exhausted.
    pub async fn respond(&self, log: &mut ConversationLog) -> Result<Response<T>, LlmError> {
        let attempts = self.policy.validation_attempts.max(1);
        let mut attempt = 0;

        loop {
            attempt += 1;
            let message = self.invoke_with_backoff(log).await?;

            match self.validate(&message) {
                Ok(record) => {
                    tracing::debug!(tool = %self.tool.name(), attempt, "Response validated");
                    return Ok(Response {
                        message,
                        record: Some(record),
                    });
                }
                Err(err) => {
                    tracing::warn!(
                        tool = %self.tool.name(),
                        attempt,
                        max_attempts = attempts,
                        "Validation failed: {}",
                        err
                    );

                    let reply_to = message.first_tool_call().and_then(|call| call.id.clone());
                    let feedback = self.feedback(&err);
                    log.push(message.clone());
                    log.push(match reply_to {
                        Some(id) => ChatMessage::tool(feedback, Some(id)),
                        None => ChatMessage::user(feedback),
                    });

                    if attempt >= attempts {
                        tracing::warn!(
                            tool = %self.tool.name(),
                            "Validation attempts exhausted, returning last response"
                        );
                        return Ok(Response {
                            message,
                            record: None,
                        });
                    }
                }
            }
        }
    }

    /// Check that `message` calls the bound tool with arguments that fit its schema
    pub fn validate(&self, message: &ChatMessage) -> Result<T, ValidationError> {
        let expected = self.tool.name();
        let call = message
            .first_tool_call()
            .ok_or_else(|| ValidationError::MissingToolCall {
                expected: expected.to_string(),
            })?;

        if call.name() != expected {
            return Err(ValidationError::WrongTool {
                expected: expected.to_string(),
                found: call.name().to_string(),
            });
        }

        let arguments = &call.function.arguments;
        if let serde_json::Value::String(raw) = arguments {
            return Err(ValidationError::Malformed {
                tool: expected.to_string(),
                reason: format!("arguments are not a JSON object: {}", raw),
            });
        }

        let errors = schema_errors(self.tool.parameters(), arguments);
        if !errors.is_empty() {
            return Err(ValidationError::Schema {
                tool: expected.to_string(),
                errors,
            });
        }

        serde_json::from_value(arguments.clone()).map_err(|e| ValidationError::Malformed {
            tool: expected.to_string(),
            reason: e.to_string(),
        })
    }

    /// Corrective message appended after a rejected response
    fn feedback(&self, err: &ValidationError) -> String {
        let schema = serde_json::to_string(self.tool.parameters()).unwrap_or_default();
        format!(
            "{}\n\nPay close attention to the function schema.\n\n{} Respond by fixing all validation errors.",
            err, schema
        )
    }

    /// One validation attempt: call the model, backing off on transient failures
    async fn invoke_with_backoff(&self, log: &ConversationLog) -> Result<ChatMessage, LlmError> {
        let messages = self.prompt.render(log, self.tool.name());
        let tools = std::slice::from_ref(&self.tool);
        let choice = ToolChoice::Function(self.tool.name().to_string());
        let max_requests = self.policy.request_attempts.max(1);
        let mut retry: u32 = 0;

        loop {
            match self.model.invoke(&messages, tools, &choice).await {
                Ok(message) => return Ok(message),
                Err(e) if e.is_transient() && (retry as usize) + 1 < max_requests => {
                    let delay = self.policy.sample_delay(retry);
                    tracing::warn!(
                        tool = %self.tool.name(),
                        kind = e.kind(),
                        retry = retry + 1,
                        "Transient error, retrying in {:.2}s: {}",
                        delay.as_secs_f64(),
                        e
                    );
                    tokio::time::sleep(delay).await;
                    retry += 1;
                }
                Err(e) => {
                    if e.is_transient() {
                        tracing::error!(tool = %self.tool.name(), "Max retries exceeded: {}", e);
                    } else {
                        tracing::error!(tool = %self.tool.name(), kind = e.kind(), "Model call failed: {}", e);
                    }
                    return Err(e);
                }
            }
        }
    }
}

fn schema_errors(schema: &serde_json::Value, instance: &serde_json::Value) -> Vec<String> {
    let compiled = match jsonschema::JSONSchema::compile(schema) {
        Ok(compiled) => compiled,
        Err(e) => {
            tracing::warn!("Skipping schema check, tool schema does not compile: {}", e);
            return Vec::new();
        }
    };
    let result = compiled.validate(instance);
    match result {
        Ok(()) => Vec::new(),
        Err(errors) => errors.map(|err| err.to_string()).collect(),
    }
}
