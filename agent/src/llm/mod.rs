//! LLM abstraction layer

mod error;
mod message;
mod scripted;
pub mod tools;

#[cfg(feature = "http")]
mod ollama;
#[cfg(feature = "http")]
mod openai;

pub use error::LlmError;
pub use message::{ChatMessage, ConversationLog, Role, ToolCall, ToolCallFunction};
pub use scripted::{RecordedCall, ScriptedModel};
pub use tools::{ToolChoice, ToolSpec};

#[cfg(feature = "http")]
pub use ollama::{list_models as list_ollama_models, ModelInfo, OllamaClient};
#[cfg(feature = "http")]
pub use openai::{list_models as list_openai_models, OpenAiClient};

use std::sync::Arc;

use async_trait::async_trait;

/// Trait for chat completion backends
///
/// A backend takes the full conversation plus the tools the model may call and
/// returns one assistant message. Implementations must be stateless so a single
/// handle can be shared across concurrently running pipelines.
#[async_trait]
pub trait ChatModel: Send + Sync {
    /// Run one completion
    async fn invoke(
        &self,
        messages: &[ChatMessage],
        tools: &[ToolSpec],
        tool_choice: &ToolChoice,
    ) -> Result<ChatMessage, LlmError>;

    /// Get the model name
    fn model(&self) -> &str;
}

#[async_trait]
impl<T: ChatModel + ?Sized> ChatModel for Arc<T> {
    async fn invoke(
        &self,
        messages: &[ChatMessage],
        tools: &[ToolSpec],
        tool_choice: &ToolChoice,
    ) -> Result<ChatMessage, LlmError> {
        (**self).invoke(messages, tools, tool_choice).await
    }

    fn model(&self) -> &str {
        (**self).model()
    }
}
