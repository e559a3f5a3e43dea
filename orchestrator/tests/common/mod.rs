//! Scripted model that plays every role of a well-behaved run
//!
//! Routing: first question, two next questions, one check, then FINISH.
//! The checker removes "Question 2?". Answers echo their question, and any
//! context containing `FAIL` makes the service reject the request.

#![allow(dead_code)]

use std::sync::Arc;

use qag_agent::llm::{ChatMessage, LlmError, ScriptedModel, ToolSpec};
use serde_json::json;

pub const FIRST: &str = "first_question_generator";
pub const NEXT: &str = "next_question_generator";
pub const CHECKER: &str = "questions_checker";

fn named_count(messages: &[ChatMessage], name: &str) -> usize {
    messages
        .iter()
        .filter(|m| m.name.as_deref() == Some(name))
        .count()
}

fn respond(messages: &[ChatMessage], tool: &ToolSpec) -> Result<ChatMessage, LlmError> {
    let context = messages
        .iter()
        .find_map(|m| m.content.strip_prefix("### Context:\n\n"))
        .unwrap_or_default();
    if context.contains("FAIL") {
        return Err(LlmError::Api {
            status: 400,
            body: "context rejected".to_string(),
        });
    }

    let generated = named_count(messages, FIRST) + named_count(messages, NEXT);

    let reply = match tool.name() {
        "Router" => {
            let next = if named_count(messages, FIRST) == 0 {
                FIRST
            } else if named_count(messages, NEXT) < 2 {
                NEXT
            } else if named_count(messages, CHECKER) == 0 {
                CHECKER
            } else {
                "FINISH"
            };
            ScriptedModel::tool_reply("Router", json!({ "next": next }))
        }
        "QuestionGeneration" => ScriptedModel::tool_reply(
            "QuestionGeneration",
            json!({
                "question": format!("Question {}?", generated + 1),
                "reflection": "answerable from the context",
                "recommendation": "FINISH"
            }),
        ),
        "CheckQuestionsGeneration" => ScriptedModel::tool_reply(
            "CheckQuestionsGeneration",
            json!({
                "questions_to_remove": ["Question 2?"],
                "reflection": "Question 2 overlaps with Question 3",
                "recommendation": "FINISH"
            }),
        ),
        "AnswerGeneration" => {
            let question = messages
                .iter()
                .find_map(|m| m.content.strip_prefix("### Question:\n\n"))
                .unwrap_or("none");
            ScriptedModel::tool_reply(
                "AnswerGeneration",
                json!({
                    "answer": format!("answer to {}", question),
                    "explanation": "stated in the context",
                    "reflection": "complete",
                    "recommendation": "FINISH"
                }),
            )
        }
        other => {
            return Err(LlmError::InvalidResponse(format!("unexpected tool {}", other)));
        }
    };
    Ok(reply)
}

pub fn scripted_team() -> Arc<ScriptedModel> {
    Arc::new(ScriptedModel::from_fn(respond))
}
