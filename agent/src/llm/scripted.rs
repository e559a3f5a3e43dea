//! In-memory chat backend driven by a script
//!
//! Replays queued replies in order, or answers through a handler closure
//! that sees the rendered messages and the bound tool. Every call is
//! recorded so tests can assert on what the model was shown.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;

use super::{ChatMessage, ChatModel, LlmError, ToolCall, ToolChoice, ToolSpec};

type Handler = Box<dyn Fn(&[ChatMessage], &ToolSpec) -> Result<ChatMessage, LlmError> + Send + Sync>;

/// One recorded model call
#[derive(Debug, Clone)]
pub struct RecordedCall {
    pub messages: Vec<ChatMessage>,
    pub tool_names: Vec<String>,
}

enum Script {
    Queue(Mutex<VecDeque<Result<ChatMessage, LlmError>>>),
    Handler(Handler),
}

pub struct ScriptedModel {
    script: Script,
    calls: Mutex<Vec<RecordedCall>>,
    next_id: AtomicUsize,
}

impl ScriptedModel {
    /// Replay `replies` in order; fails once they run out
    pub fn new(replies: impl IntoIterator<Item = Result<ChatMessage, LlmError>>) -> Self {
        Self {
            script: Script::Queue(Mutex::new(replies.into_iter().collect())),
            calls: Mutex::new(Vec::new()),
            next_id: AtomicUsize::new(0),
        }
    }

    /// Answer every call through `handler`
    pub fn from_fn<F>(handler: F) -> Self
    where
        F: Fn(&[ChatMessage], &ToolSpec) -> Result<ChatMessage, LlmError> + Send + Sync + 'static,
    {
        Self {
            script: Script::Handler(Box::new(handler)),
            calls: Mutex::new(Vec::new()),
            next_id: AtomicUsize::new(0),
        }
    }

    /// Assistant message carrying a single tool call
    pub fn tool_reply(name: &str, arguments: serde_json::Value) -> ChatMessage {
        ChatMessage::tool_calls("", vec![ToolCall::new(None, name, arguments)])
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().map(|c| c.len()).unwrap_or_default()
    }

    /// Give every id-less tool call a unique id, the way real servers do
    fn assign_ids(&self, mut message: ChatMessage) -> ChatMessage {
        for call in message.tool_calls.iter_mut() {
            if call.id.is_none() {
                let n = self.next_id.fetch_add(1, Ordering::Relaxed);
                call.id = Some(format!("call_{}", n));
            }
        }
        message
    }
}

#[async_trait]
impl ChatModel for ScriptedModel {
    async fn invoke(
        &self,
        messages: &[ChatMessage],
        tools: &[ToolSpec],
        _tool_choice: &ToolChoice,
    ) -> Result<ChatMessage, LlmError> {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(RecordedCall {
                messages: messages.to_vec(),
                tool_names: tools.iter().map(|t| t.name().to_string()).collect(),
            });
        }

        let reply = match &self.script {
            Script::Queue(queue) => queue
                .lock()
                .map_err(|_| LlmError::InvalidResponse("script lock poisoned".to_string()))?
                .pop_front()
                .unwrap_or_else(|| Err(LlmError::InvalidResponse("script exhausted".to_string()))),
            Script::Handler(handler) => {
                let tool = tools
                    .first()
                    .ok_or_else(|| LlmError::Config("no tool bound to the call".to_string()))?;
                handler(messages, tool)
            }
        };

        reply.map(|message| self.assign_ids(message))
    }

    fn model(&self) -> &str {
        "scripted"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_queue_replays_in_order() {
        let model = ScriptedModel::new(vec![
            Ok(ChatMessage::assistant("one")),
            Err(LlmError::Overloaded("busy".into())),
        ]);

        let first = model.invoke(&[], &[], &ToolChoice::Auto).await.unwrap();
        assert_eq!(first.content, "one");
        assert!(model.invoke(&[], &[], &ToolChoice::Auto).await.unwrap_err().is_transient());
        assert!(model.invoke(&[], &[], &ToolChoice::Auto).await.is_err());
        assert_eq!(model.call_count(), 3);
    }

    #[tokio::test]
    async fn test_handler_sees_bound_tool() {
        let model = ScriptedModel::from_fn(|_, tool| {
            Ok(ScriptedModel::tool_reply(tool.name(), serde_json::json!({"next": "FINISH"})))
        });
        let tool = ToolSpec::function("Router", "route", serde_json::json!({"type": "object"}));

        let reply = model
            .invoke(&[ChatMessage::user("hi")], &[tool], &ToolChoice::Function("Router".into()))
            .await
            .unwrap();

        let call = reply.first_tool_call().unwrap();
        assert_eq!(call.name(), "Router");
        assert_eq!(call.id.as_deref(), Some("call_0"));
        assert_eq!(model.calls()[0].tool_names, vec!["Router"]);
    }
}
