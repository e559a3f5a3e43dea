//! Conversation messages and tool calls
//!
//! These are the backend-neutral shapes the orchestration core works with.
//! Each backend converts them to its own wire format.

use serde::{Deserialize, Serialize};

/// Who authored a message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
    Tool,
}

/// A structured tool invocation produced by the model
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct ToolCall {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub function: ToolCallFunction,
}

/// The function details within a tool call
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct ToolCallFunction {
    pub name: String,
    pub arguments: serde_json::Value,
}

impl ToolCall {
    pub fn new(id: Option<String>, name: impl Into<String>, arguments: serde_json::Value) -> Self {
        Self {
            id,
            function: ToolCallFunction {
                name: name.into(),
                arguments,
            },
        }
    }

    pub fn name(&self) -> &str {
        &self.function.name
    }
}

/// A message in the conversation log
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct ChatMessage {
    pub role: Role,
    #[serde(default)]
    pub content: String,
    /// Name of the worker that authored the message, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_calls: Vec<ToolCall>,
    /// Tool call this message answers (tool role only)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
}

impl ChatMessage {
    fn with_role(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
            name: None,
            tool_calls: Vec::new(),
            tool_call_id: None,
        }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::with_role(Role::System, content)
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::with_role(Role::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::with_role(Role::Assistant, content)
    }

    /// Assistant message carrying tool calls
    pub fn tool_calls(content: impl Into<String>, calls: Vec<ToolCall>) -> Self {
        let mut message = Self::with_role(Role::Assistant, content);
        message.tool_calls = calls;
        message
    }

    /// Tool-role message answering a previous tool call
    pub fn tool(content: impl Into<String>, tool_call_id: Option<String>) -> Self {
        let mut message = Self::with_role(Role::Tool, content);
        message.tool_call_id = tool_call_id;
        message
    }

    /// Attach the authoring worker's name
    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn first_tool_call(&self) -> Option<&ToolCall> {
        self.tool_calls.first()
    }
}

/// Ordered, append-only log of a conversation
///
/// Entries are never mutated once pushed. The only non-append operation is
/// [`ConversationLog::reset_to_preamble`], used by a phase supervisor between
/// major steps.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConversationLog {
    messages: Vec<ChatMessage>,
}

impl ConversationLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, message: ChatMessage) {
        self.messages.push(message);
    }

    pub fn extend(&mut self, messages: impl IntoIterator<Item = ChatMessage>) {
        self.messages.extend(messages);
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn last(&self) -> Option<&ChatMessage> {
        self.messages.last()
    }

    pub fn get(&self, index: usize) -> Option<&ChatMessage> {
        self.messages.get(index)
    }

    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    pub fn iter(&self) -> impl Iterator<Item = &ChatMessage> {
        self.messages.iter()
    }

    /// Drop everything but the first message
    pub fn reset_to_preamble(&mut self) {
        self.messages.truncate(1);
    }
}

impl From<Vec<ChatMessage>> for ConversationLog {
    fn from(messages: Vec<ChatMessage>) -> Self {
        Self { messages }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reset_keeps_only_preamble() {
        let mut log = ConversationLog::from(vec![
            ChatMessage::user("### Context:\n\nabc"),
            ChatMessage::user("### Question:\n\nq"),
            ChatMessage::assistant("a"),
        ]);

        log.reset_to_preamble();

        assert_eq!(log.len(), 1);
        assert_eq!(log.messages()[0].content, "### Context:\n\nabc");
    }

    #[test]
    fn test_message_serialization_skips_empty_fields() {
        let message = ChatMessage::user("hello").named("first_question_generator");
        let json = serde_json::to_value(&message).unwrap();

        assert_eq!(json["role"], "user");
        assert_eq!(json["name"], "first_question_generator");
        assert!(json.get("tool_calls").is_none());
        assert!(json.get("tool_call_id").is_none());
    }
}
