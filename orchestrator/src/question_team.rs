//! Question phase: a routed team of three workers
//!
//! Each worker runs its refinement loop on a copy of the supervisor log and
//! reports back with a single named summary message. A worker whose record
//! cannot be extracted leaves the question set untouched and says so in the
//! log, and routing carries on.

use std::sync::Arc;

use qag_agent::agent::RetryPolicy;
use qag_agent::llm::{ChatMessage, ChatModel, LlmError};
use qag_agent::schemas::{CheckQuestionsGeneration, QuestionGeneration, FINISH};

use crate::extract::extract_record;
use crate::prompts::{
    question_supervisor_prompt, CHECK_QUESTIONS_INSTRUCTION, CHECK_QUESTIONS_PROMPT,
    CHECK_QUESTIONS_REVISION_INSTRUCTION, FIRST_QUESTION_INSTRUCTION, FIRST_QUESTION_PROMPT,
    NEXT_QUESTION_INSTRUCTION, NEXT_QUESTION_PROMPT, QUESTION_REVISION_INSTRUCTION,
};
use crate::refine::{RefinementLoop, QUESTION_LOG_CAP};
use crate::state::{OverallState, QuestionUpdate};
use crate::supervisor::{Route, Supervisor};

pub const FIRST_QUESTION_GENERATOR: &str = "first_question_generator";
pub const NEXT_QUESTION_GENERATOR: &str = "next_question_generator";
pub const QUESTIONS_CHECKER: &str = "questions_checker";

const NO_EDIT: &str = "There is no need to edit the current list of questions.";

pub struct QuestionTeam {
    supervisor: Supervisor,
    first: RefinementLoop<QuestionGeneration>,
    next: RefinementLoop<QuestionGeneration>,
    checker: RefinementLoop<CheckQuestionsGeneration>,
}

impl QuestionTeam {
    pub fn new(model: Arc<dyn ChatModel>) -> Self {
        let workers = vec![
            FIRST_QUESTION_GENERATOR.to_string(),
            NEXT_QUESTION_GENERATOR.to_string(),
            QUESTIONS_CHECKER.to_string(),
        ];
        let prompt =
            question_supervisor_prompt(FIRST_QUESTION_GENERATOR, NEXT_QUESTION_GENERATOR, QUESTIONS_CHECKER);

        Self {
            supervisor: Supervisor::new(model.clone(), prompt, workers),
            first: RefinementLoop::new(
                model.clone(),
                FIRST_QUESTION_PROMPT,
                FIRST_QUESTION_INSTRUCTION,
                QUESTION_REVISION_INSTRUCTION,
                QUESTION_LOG_CAP,
            ),
            next: RefinementLoop::new(
                model.clone(),
                NEXT_QUESTION_PROMPT,
                NEXT_QUESTION_INSTRUCTION,
                QUESTION_REVISION_INSTRUCTION,
                QUESTION_LOG_CAP,
            ),
            checker: RefinementLoop::new(
                model,
                CHECK_QUESTIONS_PROMPT,
                CHECK_QUESTIONS_INSTRUCTION,
                CHECK_QUESTIONS_REVISION_INSTRUCTION,
                QUESTION_LOG_CAP,
            ),
        }
    }

    pub fn with_policy(self, policy: RetryPolicy) -> Self {
        Self {
            supervisor: self.supervisor.with_policy(policy.clone()),
            first: self.first.with_policy(policy.clone()),
            next: self.next.with_policy(policy.clone()),
            checker: self.checker.with_policy(policy),
        }
    }

    /// Route workers until the supervisor finishes
    pub async fn run(&self, state: &mut OverallState) -> Result<(), LlmError> {
        loop {
            let worker = match self.supervisor.route(&mut state.log, state.questions.len()).await? {
                Route::Finish => break,
                Route::Worker(worker) => worker,
            };

            match worker.as_str() {
                FIRST_QUESTION_GENERATOR => self.first_question(state).await?,
                NEXT_QUESTION_GENERATOR => self.next_question(state).await?,
                QUESTIONS_CHECKER => self.check_questions(state).await?,
                other => {
                    tracing::warn!("No question worker named {:?}, finishing", other);
                    break;
                }
            }
        }

        tracing::info!(questions = state.questions.len(), "Question phase complete");
        Ok(())
    }

    async fn first_question(&self, state: &mut OverallState) -> Result<(), LlmError> {
        tracing::info!("Current questions in list: {}", state.questions.len());

        let mut working = state.log.clone();
        let outcome = self.first.run(&mut working).await?;

        let summary = match extract_record::<QuestionGeneration>(&working, outcome.produced) {
            Ok(record) => {
                tracing::info!("First question generated: {}", record.question);
                let summary = format!(
                    "[Generated the first question]\n\nHere is the first question: {}",
                    record.question
                );
                state.questions.apply(QuestionUpdate::Add(vec![record.question]));
                summary
            }
            Err(e) => {
                tracing::warn!("First question generation failed: {}", e);
                "First question not generated. PLEASE TRY AGAIN.".to_string()
            }
        };

        state.log.push(ChatMessage::user(summary).named(FIRST_QUESTION_GENERATOR));
        Ok(())
    }

    async fn next_question(&self, state: &mut OverallState) -> Result<(), LlmError> {
        tracing::info!("Current questions in list: {}", state.questions.len());

        let mut working = state.log.clone();
        working.push(ChatMessage::user(current_list(
            "Generate the next question.",
            &state.questions.bulleted(),
        )));
        let outcome = self.next.run(&mut working).await?;

        let summary = match extract_record::<QuestionGeneration>(&working, outcome.produced) {
            Ok(record) => {
                tracing::info!("Next question generated: {}", record.question);
                let summary = format!(
                    "[Generated the next question]\n\nHere is the next question: {}",
                    record.question
                );
                state.questions.apply(QuestionUpdate::Add(vec![record.question]));
                summary
            }
            Err(e) => {
                tracing::warn!("Next question generation failed: {}", e);
                "Next question not generated. PLEASE TRY AGAIN.".to_string()
            }
        };

        state.log.push(ChatMessage::user(summary).named(NEXT_QUESTION_GENERATOR));
        Ok(())
    }

    async fn check_questions(&self, state: &mut OverallState) -> Result<(), LlmError> {
        tracing::info!("Checking questions list with {} question(s)", state.questions.len());

        let mut working = state.log.clone();
        working.push(ChatMessage::user(current_list(
            "Check the current list of questions.",
            &state.questions.bulleted(),
        )));
        let outcome = self.checker.run(&mut working).await?;

        let summary = match extract_record::<CheckQuestionsGeneration>(&working, outcome.produced) {
            Ok(record) => {
                let removed = if record.questions_to_remove.is_empty() {
                    tracing::info!("No questions removed by checker");
                    NO_EDIT.to_string()
                } else {
                    tracing::info!("Questions being removed by checker: {:?}", record.questions_to_remove);
                    let lines: Vec<String> =
                        record.questions_to_remove.iter().map(|q| format!("- {}", q)).collect();
                    format!("Here are the questions removed:\n{}", lines.join("\n"))
                };
                let summary = checker_summary(&removed, &record.reflection, &record.recommendation);

                let count = state
                    .questions
                    .apply(QuestionUpdate::Remove(record.questions_to_remove));
                tracing::info!("Removed {} question(s) from the list", count);
                summary
            }
            Err(e) => {
                tracing::warn!("Question checking failed: {}", e);
                NO_EDIT.to_string()
            }
        };

        state.log.push(ChatMessage::user(summary).named(QUESTIONS_CHECKER));
        Ok(())
    }
}

fn current_list(heading: &str, bulleted: &str) -> String {
    format!("{}\nHere is the current list of questions:\n{}", heading, bulleted)
        .trim()
        .to_string()
}

fn checker_summary(removed: &str, reflection: &str, recommendation: &str) -> String {
    let mut summary = format!("[Checked questions]\n\n{}\n\nReflection: {}", removed, reflection);
    if !recommendation.is_empty() && recommendation != FINISH {
        summary.push_str(&format!("\n\nRecommendation: {}", recommendation));
    }
    summary
}
