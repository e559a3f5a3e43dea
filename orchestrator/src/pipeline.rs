//! Two-phase pipeline for one context
//!
//! The question phase runs to completion first. The answer phase then starts
//! from the context preamble alone and answers the fixed question list.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use qag_agent::agent::RetryPolicy;
use qag_agent::llm::{ChatModel, ConversationLog, LlmError};

use crate::answer_team::AnswerTeam;
use crate::question_team::QuestionTeam;
use crate::state::{AnswerRecord, OverallState};

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error(transparent)]
    Llm(#[from] LlmError),

    #[error("Question {index} still unanswered after {attempts} attempts: {question}")]
    AnswerStalled {
        index: usize,
        question: String,
        attempts: usize,
    },
}

/// Final artifact for one input example
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QagResult {
    pub context: String,
    pub questions: Vec<String>,
    pub answers: Vec<AnswerRecord>,
}

pub struct QagPipeline {
    question_team: QuestionTeam,
    answer_team: AnswerTeam,
}

impl QagPipeline {
    pub fn new(model: Arc<dyn ChatModel>) -> Self {
        Self {
            question_team: QuestionTeam::new(model.clone()),
            answer_team: AnswerTeam::new(model),
        }
    }

    pub fn with_policy(self, policy: RetryPolicy) -> Self {
        Self {
            question_team: self.question_team.with_policy(policy.clone()),
            answer_team: self.answer_team.with_policy(policy),
        }
    }

    pub fn with_max_answer_attempts(mut self, max_attempts: Option<usize>) -> Self {
        self.answer_team = self.answer_team.with_max_attempts(max_attempts);
        self
    }

    /// Generate questions for `context`, then answer them
    pub async fn run(&self, context: &str) -> Result<QagResult, PipelineError> {
        let mut question_state = OverallState::seeded(context);
        self.question_team.run(&mut question_state).await?;
        tracing::info!("Questions: {:?}", question_state.questions.as_slice());

        let preamble: Vec<_> = question_state.log.get(0).cloned().into_iter().collect();
        let mut answer_state = OverallState {
            log: ConversationLog::from(preamble),
            questions: question_state.questions,
            answers: Vec::new(),
        };
        self.answer_team.run(&mut answer_state).await?;
        tracing::info!(answers = answer_state.answers.len(), "Pipeline complete");

        Ok(QagResult {
            context: context.to_string(),
            questions: answer_state.questions.into_vec(),
            answers: answer_state.answers,
        })
    }
}
