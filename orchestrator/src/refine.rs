//! Generate/reflect refinement loop
//!
//! `generate` produces a record, `reflect` revises it, and control returns to
//! `generate`. After every generate step the loop stops when the record's
//! recommendation contains FINISH or the log has grown past the cap. Every
//! step appends at least one message, so the cap always ends the loop.

use std::sync::Arc;

use qag_agent::agent::{PromptTemplate, Responder, RetryPolicy};
use qag_agent::llm::{ChatModel, ConversationLog, LlmError};
use qag_agent::schemas::{Generation, Revision};

use crate::prompts::with_instruction;

/// Log length cap for question-producing loops
pub const QUESTION_LOG_CAP: usize = 10;

/// Log length cap for answer-producing loops
pub const ANSWER_LOG_CAP: usize = 6;

/// Why a refinement loop stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// The model put FINISH in its recommendation
    Finished,
    /// The log grew past the cap
    LogCap,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RefineOutcome {
    /// Messages the loop appended to the log
    pub produced: usize,
    pub stop: StopReason,
    /// Generate steps run
    pub rounds: usize,
}

/// Two-state refinement loop bound to one record type
pub struct RefinementLoop<G: Generation> {
    generate: Responder<G>,
    reflect: Responder<Revision<G>>,
    log_cap: usize,
}

impl<G: Generation> RefinementLoop<G> {
    /// Build a loop whose prompts share `template`, filled with the step instructions
    pub fn new(
        model: Arc<dyn ChatModel>,
        template: &str,
        generate_instruction: &str,
        reflect_instruction: &str,
        log_cap: usize,
    ) -> Self {
        Self {
            generate: Responder::for_output(
                model.clone(),
                PromptTemplate::new(with_instruction(template, generate_instruction)),
            ),
            reflect: Responder::for_output(
                model,
                PromptTemplate::new(with_instruction(template, reflect_instruction)),
            ),
            log_cap,
        }
    }

    pub fn with_policy(mut self, policy: RetryPolicy) -> Self {
        self.generate = self.generate.with_policy(policy.clone());
        self.reflect = self.reflect.with_policy(policy);
        self
    }

    pub fn log_cap(&self) -> usize {
        self.log_cap
    }

    /// Run until FINISH or the cap, appending every step's output to `log`
    pub async fn run(&self, log: &mut ConversationLog) -> Result<RefineOutcome, LlmError> {
        let start = log.len();
        let mut rounds = 0;

        let stop = loop {
            rounds += 1;
            let generated = self.generate.respond(log).await?;
            let finished = match generated.record {
                Some(record) => {
                    log.push(generated.message);
                    record.is_finished()
                }
                None => false,
            };

            if finished {
                break StopReason::Finished;
            }
            if log.len() > self.log_cap {
                break StopReason::LogCap;
            }

            let revised = self.reflect.respond(log).await?;
            if revised.record.is_some() {
                log.push(revised.message);
            }
        };

        let outcome = RefineOutcome {
            produced: log.len() - start,
            stop,
            rounds,
        };
        tracing::debug!(
            record = G::NAME,
            produced = outcome.produced,
            rounds = outcome.rounds,
            stop = ?outcome.stop,
            "Refinement loop halted"
        );
        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use qag_agent::llm::{ChatMessage, ScriptedModel};
    use qag_agent::schemas::QuestionGeneration;
    use serde_json::json;

    fn question(name: &str, text: &str, recommendation: &str) -> Result<ChatMessage, LlmError> {
        Ok(ScriptedModel::tool_reply(
            name,
            json!({"question": text, "reflection": "r", "recommendation": recommendation}),
        ))
    }

    fn refinement(model: Arc<ScriptedModel>, cap: usize) -> RefinementLoop<QuestionGeneration> {
        RefinementLoop::new(model, "Ask. {instruction}", "Generate.", "Revise.", cap)
            .with_policy(RetryPolicy::without_delay())
    }

    fn seeded() -> ConversationLog {
        ConversationLog::from(vec![ChatMessage::user("### Context:\n\nctx")])
    }

    #[tokio::test]
    async fn test_finish_on_first_generate() {
        let model = Arc::new(ScriptedModel::new(vec![question("QuestionGeneration", "q", "FINISH")]));
        let mut log = seeded();

        let outcome = refinement(model.clone(), QUESTION_LOG_CAP).run(&mut log).await.unwrap();

        assert_eq!(outcome.stop, StopReason::Finished);
        assert_eq!(outcome.produced, 1);
        assert_eq!(outcome.rounds, 1);
        assert_eq!(model.call_count(), 1);
    }

    #[tokio::test]
    async fn test_reflect_then_finish() {
        let model = Arc::new(ScriptedModel::new(vec![
            question("QuestionGeneration", "draft", "be more specific"),
            question("QuestionRevision", "revised", "looks good"),
            question("QuestionGeneration", "final", "FINISH"),
        ]));
        let mut log = seeded();

        let outcome = refinement(model.clone(), QUESTION_LOG_CAP).run(&mut log).await.unwrap();

        assert_eq!(outcome.stop, StopReason::Finished);
        assert_eq!(outcome.produced, 3);
        assert_eq!(outcome.rounds, 2);

        let calls = model.calls();
        assert_eq!(calls[0].tool_names, vec!["QuestionGeneration"]);
        assert_eq!(calls[1].tool_names, vec!["QuestionRevision"]);
        assert_eq!(calls[1].messages[0].content, "Ask. Revise.");
        assert_eq!(calls[2].tool_names, vec!["QuestionGeneration"]);
    }

    #[tokio::test]
    async fn test_cap_bounds_a_model_that_never_finishes() {
        let model = Arc::new(ScriptedModel::from_fn(|_, tool| {
            Ok(ScriptedModel::tool_reply(
                tool.name(),
                json!({"question": "q", "reflection": "r", "recommendation": "keep going"}),
            ))
        }));
        let mut log = seeded();

        let outcome = refinement(model.clone(), ANSWER_LOG_CAP).run(&mut log).await.unwrap();

        // Generate steps leave the log at 2, 4, 6, 8 entries; 8 is past the cap
        assert_eq!(outcome.stop, StopReason::LogCap);
        assert_eq!(log.len(), 8);
        assert_eq!(outcome.rounds, 4);
        // Stopped right after a generate step
        assert_eq!(
            log.last().unwrap().first_tool_call().unwrap().name(),
            "QuestionGeneration"
        );
    }

    #[tokio::test]
    async fn test_cap_bounds_invalid_output() {
        let model = Arc::new(ScriptedModel::from_fn(|_, _| {
            Ok(ChatMessage::assistant("no tool call here"))
        }));
        let mut log = seeded();

        let outcome = refinement(model, QUESTION_LOG_CAP).run(&mut log).await.unwrap();

        assert_eq!(outcome.stop, StopReason::LogCap);
        assert!(log.len() > QUESTION_LOG_CAP);
    }

    #[tokio::test]
    async fn test_transient_exhaustion_aborts_loop() {
        let model = Arc::new(ScriptedModel::new(vec![
            Err(LlmError::Connection("refused".into())),
            Err(LlmError::Connection("refused".into())),
        ]));
        let mut log = seeded();

        let err = refinement(model, QUESTION_LOG_CAP).run(&mut log).await.unwrap_err();

        assert!(matches!(err, LlmError::Connection(_)));
        assert_eq!(log.len(), 1);
    }
}
