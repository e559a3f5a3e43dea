//! Locate the final generation record left by a refinement loop
//!
//! A loop that stops on the log cap right after a reflect step leaves the
//! revision last; one that stops on FINISH leaves the generation last with
//! the previous revision before it. The lookup rule:
//! - one message produced: the last message
//! - last message calls the revision tool: the last message
//! - otherwise: the second-to-last message

use thiserror::Error;

use qag_agent::llm::ConversationLog;
use qag_agent::schemas::Generation;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ExtractionError {
    #[error("Refinement loop produced no messages")]
    NothingProduced,

    #[error("Log has {len} entries, too few to hold a generation record")]
    TooShort { len: usize },

    #[error("Message {index} carries no tool call")]
    NoToolCall { index: usize },

    #[error("Message {index} calls {found}, expected {expected}")]
    UnexpectedTool {
        index: usize,
        expected: String,
        found: String,
    },

    #[error("Arguments of {tool} do not form a record: {reason}")]
    Malformed { tool: String, reason: String },
}

/// Extract the record of type `G` from a log a refinement loop appended `produced` messages to
pub fn extract_record<G: Generation>(
    log: &ConversationLog,
    produced: usize,
) -> Result<G, ExtractionError> {
    if produced == 0 {
        return Err(ExtractionError::NothingProduced);
    }

    let len = log.len();
    let last = len.checked_sub(1).ok_or(ExtractionError::TooShort { len })?;

    let ends_with_revision = log
        .last()
        .and_then(|m| m.first_tool_call())
        .is_some_and(|call| call.name() == G::REVISION_NAME);

    let index = if produced == 1 || ends_with_revision {
        last
    } else {
        len.checked_sub(2).ok_or(ExtractionError::TooShort { len })?
    };

    let call = log
        .get(index)
        .and_then(|m| m.first_tool_call())
        .ok_or(ExtractionError::NoToolCall { index })?;

    if call.name() != G::NAME && call.name() != G::REVISION_NAME {
        return Err(ExtractionError::UnexpectedTool {
            index,
            expected: G::NAME.to_string(),
            found: call.name().to_string(),
        });
    }

    serde_json::from_value(call.function.arguments.clone()).map_err(|e| ExtractionError::Malformed {
        tool: call.name().to_string(),
        reason: e.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use qag_agent::llm::{ChatMessage, ToolCall};
    use qag_agent::schemas::{AnswerGeneration, QuestionGeneration};
    use serde_json::json;

    fn call(name: &str, question: &str) -> ChatMessage {
        ChatMessage::tool_calls(
            "",
            vec![ToolCall::new(
                Some("call_1".into()),
                name,
                json!({"question": question, "reflection": "r", "recommendation": "more detail"}),
            )],
        )
    }

    fn log_of(messages: Vec<ChatMessage>) -> ConversationLog {
        ConversationLog::from(messages)
    }

    #[test]
    fn test_single_generation_uses_last() {
        let log = log_of(vec![
            ChatMessage::user("### Context:\n\nctx"),
            call("QuestionGeneration", "q1"),
        ]);

        let record: QuestionGeneration = extract_record(&log, 1).unwrap();
        assert_eq!(record.question, "q1");
    }

    #[test]
    fn test_trailing_revision_uses_last() {
        let log = log_of(vec![
            ChatMessage::user("ctx"),
            call("QuestionGeneration", "draft"),
            call("QuestionRevision", "revised"),
        ]);

        let record: QuestionGeneration = extract_record(&log, 2).unwrap();
        assert_eq!(record.question, "revised");
    }

    #[test]
    fn test_trailing_generation_uses_second_to_last() {
        let log = log_of(vec![
            ChatMessage::user("ctx"),
            call("QuestionGeneration", "draft"),
            call("QuestionRevision", "revised"),
            call("QuestionGeneration", "regenerated"),
        ]);

        let record: QuestionGeneration = extract_record(&log, 3).unwrap();
        assert_eq!(record.question, "revised");
    }

    #[test]
    fn test_no_tool_call_is_extraction_error() {
        // Generate step ran out of validation attempts: raw reply plus feedback
        let log = log_of(vec![
            ChatMessage::user("ctx"),
            ChatMessage::assistant("Here is a question: why?"),
            ChatMessage::user("Response did not call a function"),
        ]);

        let err = extract_record::<QuestionGeneration>(&log, 2).unwrap_err();
        assert_eq!(err, ExtractionError::NoToolCall { index: 1 });
    }

    #[test]
    fn test_short_log_is_extraction_error() {
        let log = log_of(vec![call("QuestionGeneration", "q")]);
        assert_eq!(
            extract_record::<QuestionGeneration>(&log, 2).unwrap_err(),
            ExtractionError::TooShort { len: 1 }
        );
        assert_eq!(
            extract_record::<QuestionGeneration>(&ConversationLog::new(), 1).unwrap_err(),
            ExtractionError::TooShort { len: 0 }
        );
        assert_eq!(
            extract_record::<QuestionGeneration>(&log, 0).unwrap_err(),
            ExtractionError::NothingProduced
        );
    }

    #[test]
    fn test_wrong_record_type() {
        let log = log_of(vec![ChatMessage::user("ctx"), call("QuestionGeneration", "q")]);

        let err = extract_record::<AnswerGeneration>(&log, 1).unwrap_err();
        assert!(matches!(err, ExtractionError::UnexpectedTool { .. }));
    }

    #[test]
    fn test_missing_field_is_malformed() {
        let log = log_of(vec![
            ChatMessage::user("ctx"),
            ChatMessage::tool_calls(
                "",
                vec![ToolCall::new(None, "AnswerGeneration", json!({"answer": "42"}))],
            ),
        ]);

        let err = extract_record::<AnswerGeneration>(&log, 1).unwrap_err();
        assert!(matches!(err, ExtractionError::Malformed { .. }));
    }
}
