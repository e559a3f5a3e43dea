//! Model-driven routing between named workers
//!
//! The host applies hard ceilings before asking the model. Routing calls that
//! never produce a usable choice fall back to finishing.

use std::sync::Arc;

use qag_agent::agent::{PromptTemplate, Responder, RetryPolicy};
use qag_agent::llm::{ChatModel, ConversationLog, LlmError};
use qag_agent::schemas::{Router, FINISH};

use crate::prompts::router_closing;

/// Question count at which routing always finishes
pub const MAX_QUESTIONS: usize = 10;

/// Log length at which routing always finishes
pub const MAX_LOG_ENTRIES: usize = 20;

/// Routing calls made before defaulting to finish
pub const ROUTING_ATTEMPTS: usize = 2;

/// Next step chosen by a supervisor
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Route {
    Worker(String),
    Finish,
}

pub struct Supervisor {
    responder: Responder<Router>,
    workers: Vec<String>,
}

impl Supervisor {
    pub fn new(model: Arc<dyn ChatModel>, system_prompt: impl Into<String>, workers: Vec<String>) -> Self {
        let prompt = PromptTemplate::new(system_prompt).with_closing(router_closing(&workers));
        let responder = Responder::new(model, prompt, Router::tool_for(&workers));
        Self { responder, workers }
    }

    pub fn with_policy(mut self, policy: RetryPolicy) -> Self {
        self.responder = self.responder.with_policy(policy);
        self
    }

    pub fn workers(&self) -> &[String] {
        &self.workers
    }

    /// Choose the next worker for a phase holding `question_count` questions
    ///
    /// Rejected routing responses are left in `log` with their feedback.
    pub async fn route(&self, log: &mut ConversationLog, question_count: usize) -> Result<Route, LlmError> {
        if question_count >= MAX_QUESTIONS || log.len() >= MAX_LOG_ENTRIES {
            tracing::info!(
                questions = question_count,
                log_entries = log.len(),
                "Routing ceiling reached, finishing"
            );
            return Ok(Route::Finish);
        }

        let mut choice = None;
        for attempt in 1..=ROUTING_ATTEMPTS {
            let response = self.responder.respond(log).await?;
            match response.record {
                Some(router) => {
                    choice = Some(router.next);
                    break;
                }
                None => {
                    tracing::warn!("Routing attempt {}/{} produced no choice", attempt, ROUTING_ATTEMPTS);
                }
            }
        }

        let route = match choice {
            None => {
                tracing::warn!("Routing attempts exhausted, finishing");
                Route::Finish
            }
            Some(next) => self.normalize(&next),
        };
        tracing::info!(route = ?route, "Supervisor routed");
        Ok(route)
    }

    fn normalize(&self, next: &str) -> Route {
        let next = next.trim();
        if next.is_empty() || next == FINISH {
            return Route::Finish;
        }
        if self.workers.iter().any(|w| w == next) {
            Route::Worker(next.to_string())
        } else {
            tracing::warn!("Router chose unknown worker {:?}, finishing", next);
            Route::Finish
        }
    }
}
