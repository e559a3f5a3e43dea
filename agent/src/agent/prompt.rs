//! Prompt template wrapped around a conversation log

use crate::llm::{ChatMessage, ConversationLog};

/// Default trailing instruction; `{function_name}` is replaced with the bound tool name
pub const DEFAULT_CLOSING: &str = "You MUST use the {function_name} function to respond.";

/// System preamble, then the full log, then a trailing system instruction
#[derive(Debug, Clone)]
pub struct PromptTemplate {
    system: String,
    closing: String,
}

impl PromptTemplate {
    pub fn new(system: impl Into<String>) -> Self {
        Self {
            system: system.into(),
            closing: DEFAULT_CLOSING.to_string(),
        }
    }

    /// Replace the trailing instruction
    pub fn with_closing(mut self, closing: impl Into<String>) -> Self {
        self.closing = closing.into();
        self
    }

    pub fn system(&self) -> &str {
        &self.system
    }

    /// Render the messages sent to the model for one call
    pub fn render(&self, log: &ConversationLog, function_name: &str) -> Vec<ChatMessage> {
        let mut messages = Vec::with_capacity(log.len() + 2);
        messages.push(ChatMessage::system(
            self.system.replace("{function_name}", function_name),
        ));
        messages.extend(log.iter().cloned());
        messages.push(ChatMessage::system(
            self.closing.replace("{function_name}", function_name),
        ));
        messages
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::Role;

    #[test]
    fn test_render_wraps_log() {
        let mut log = ConversationLog::new();
        log.push(ChatMessage::user("### Context:\n\nParis is in France."));
        log.push(ChatMessage::user("Generate a question."));

        let template = PromptTemplate::new("You are an expert question generator.");
        let messages = template.render(&log, "QuestionGeneration");

        assert_eq!(messages.len(), 4);
        assert_eq!(messages[0].role, Role::System);
        assert_eq!(messages[0].content, "You are an expert question generator.");
        assert_eq!(messages[1].content, "### Context:\n\nParis is in France.");
        assert_eq!(messages[3].role, Role::System);
        assert_eq!(
            messages[3].content,
            "You MUST use the QuestionGeneration function to respond."
        );
    }

    #[test]
    fn test_custom_closing() {
        let template = PromptTemplate::new("Route the work.")
            .with_closing("Given the conversation above, who should act next? Use {function_name}.");
        let messages = template.render(&ConversationLog::new(), "Router");

        assert_eq!(messages.len(), 2);
        assert_eq!(
            messages[1].content,
            "Given the conversation above, who should act next? Use Router."
        );
    }
}
