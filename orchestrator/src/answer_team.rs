//! Answer phase: answer every question in order
//!
//! No routing model here. While some question lacks an answer, the log is
//! reset to its preamble, the next question is appended, and the answer loop
//! runs. An answer is accepted only if it passes the self-reference guard;
//! otherwise the same question is tried again.

use std::sync::Arc;

use qag_agent::agent::RetryPolicy;
use qag_agent::llm::{ChatMessage, ChatModel, LlmError};
use qag_agent::schemas::AnswerGeneration;

use crate::extract::extract_record;
use crate::pipeline::PipelineError;
use crate::prompts::{ANSWER_INSTRUCTION, ANSWER_PROMPT, ANSWER_REVISION_INSTRUCTION};
use crate::refine::{RefinementLoop, ANSWER_LOG_CAP};
use crate::state::{AnswerRecord, OverallState};

pub const ANSWER_GENERATOR: &str = "answer_generator";

/// Phrases showing the model is talking about the task instead of answering
pub const SELF_REFERENCE_PHRASES: [&str; 10] = [
    "user's question",
    "user's answer",
    "user's explanation",
    "original question",
    "original answer",
    "original explanation",
    "upon reflection",
    "initial answer",
    "initial explanation",
    "initial question",
];

const NOT_GENERATED: &str = "Answer and explanation not generated. PLEASE TRY AGAIN.";

/// Whether neither text contains a reserved phrase (case-insensitive)
pub fn passes_self_reference_guard(answer: &str, explanation: &str) -> bool {
    let answer = answer.to_lowercase();
    let explanation = explanation.to_lowercase();
    !SELF_REFERENCE_PHRASES
        .iter()
        .any(|phrase| answer.contains(phrase) || explanation.contains(phrase))
}

pub struct AnswerTeam {
    generator: RefinementLoop<AnswerGeneration>,
    max_attempts: Option<usize>,
}

impl AnswerTeam {
    pub fn new(model: Arc<dyn ChatModel>) -> Self {
        Self {
            generator: RefinementLoop::new(
                model,
                ANSWER_PROMPT,
                ANSWER_INSTRUCTION,
                ANSWER_REVISION_INSTRUCTION,
                ANSWER_LOG_CAP,
            ),
            max_attempts: None,
        }
    }

    pub fn with_policy(mut self, policy: RetryPolicy) -> Self {
        self.generator = self.generator.with_policy(policy);
        self
    }

    /// Bound the passes spent on one question; `None` keeps retrying
    pub fn with_max_attempts(mut self, max_attempts: Option<usize>) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    /// Answer every unanswered question, in order
    pub async fn run(&self, state: &mut OverallState) -> Result<(), PipelineError> {
        let mut attempts = 0;

        while let Some(index) = state.next_unanswered() {
            let question = match state.questions.get(index) {
                Some(question) => question.to_string(),
                None => break,
            };

            if let Some(max) = self.max_attempts {
                if attempts >= max {
                    return Err(PipelineError::AnswerStalled {
                        index,
                        question,
                        attempts,
                    });
                }
            }
            attempts += 1;

            if let Some(record) = self.answer(state, &question).await? {
                tracing::info!(index, "Answer accepted");
                state.answers.push(record);
                attempts = 0;
            }
        }

        tracing::info!(answers = state.answers.len(), "Answer phase complete");
        Ok(())
    }

    /// One pass at `question`; `None` when no acceptable answer came out
    async fn answer(&self, state: &mut OverallState, question: &str) -> Result<Option<AnswerRecord>, LlmError> {
        state.log.reset_to_preamble();
        state.log.push(ChatMessage::user(format!("### Question:\n\n{}", question)));

        let outcome = self.generator.run(&mut state.log).await?;

        let (summary, accepted) = match extract_record::<AnswerGeneration>(&state.log, outcome.produced) {
            Ok(record) if passes_self_reference_guard(&record.answer, &record.explanation) => (
                format!(
                    "[Generated the answer and explanation]\n\nAnswer: {}\n\nExplanation: {}",
                    record.answer, record.explanation
                ),
                Some(AnswerRecord {
                    answer: record.answer,
                    explanation: record.explanation,
                }),
            ),
            Ok(_) => {
                tracing::warn!("Answer refers to the task instead of answering it, retrying");
                (NOT_GENERATED.to_string(), None)
            }
            Err(e) => {
                tracing::warn!("Answer generation failed: {}", e);
                (NOT_GENERATED.to_string(), None)
            }
        };

        state.log.push(ChatMessage::user(summary).named(ANSWER_GENERATOR));
        Ok(accepted)
    }
}
