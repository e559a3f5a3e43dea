//! Question/answer generation orchestration built on qag-agent
//!
//! This crate provides:
//! - Shared run state and the question-list reducer
//! - Generate/reflect refinement loops for each worker
//! - A model-driven supervisor for the question phase
//! - The two-phase pipeline and a batch driver over JSONL datasets
//!
//! # Example
//!
//! ```rust,ignore
//! use qag_orchestrator::QagPipeline;
//!
//! let model = config.llm.build_model().await?;
//! let result = QagPipeline::new(model)
//!     .run("City Y is the capital of Country X.")
//!     .await?;
//! ```

pub mod answer_team;
pub mod batch;
pub mod extract;
pub mod pipeline;
pub mod prompts;
pub mod question_team;
pub mod refine;
pub mod state;
pub mod supervisor;

pub use answer_team::AnswerTeam;
pub use batch::{BatchError, BatchRunner, BatchSummary, ContextText};
pub use pipeline::{PipelineError, QagPipeline, QagResult};
pub use question_team::QuestionTeam;
pub use refine::{RefineOutcome, RefinementLoop, StopReason};
pub use state::{AnswerRecord, OverallState, QuestionSet, QuestionUpdate};
pub use supervisor::{Route, Supervisor};

/// Re-export commonly used types from the agent crate
pub use qag_agent::agent::RetryPolicy;
pub use qag_agent::config::QagConfig;
pub use qag_agent::llm::{ChatModel, LlmError};
