//! Structured outputs the model must produce
//!
//! Every model call is bound to exactly one record type and must answer with
//! a tool call named after it. Each generation record has a revision twin with
//! identical fields, used by the reflect step of a refinement loop.

use schemars::JsonSchema;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::llm::tools::parameters_for;
use crate::llm::ToolSpec;

/// Sentinel a model writes into `recommendation` to stop refinement,
/// or into the router's `next` to end a phase
pub const FINISH: &str = "FINISH";

/// A record type a model invocation can be bound to
pub trait StructuredOutput: DeserializeOwned + Send + Sync + 'static {
    /// Tool name the model must call
    const NAME: &'static str;

    /// Tool description shown to the model
    const DESCRIPTION: &'static str;

    /// JSON schema of the tool arguments
    fn parameters() -> serde_json::Value;

    fn tool() -> ToolSpec {
        ToolSpec::function(Self::NAME, Self::DESCRIPTION, Self::parameters())
    }
}

/// A record produced by a generate step
pub trait Generation: StructuredOutput + Clone + std::fmt::Debug {
    const REVISION_NAME: &'static str;
    const REVISION_DESCRIPTION: &'static str;

    /// Free-text self-critique
    fn reflection(&self) -> &str;

    /// Improvement directive, or a text containing [`FINISH`]
    fn recommendation(&self) -> &str;

    fn is_finished(&self) -> bool {
        self.recommendation().contains(FINISH)
    }
}

/// Correction pass over a generation record, same fields under a different tool name
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(transparent)]
pub struct Revision<G>(pub G);

impl<G> Revision<G> {
    pub fn into_inner(self) -> G {
        self.0
    }
}

impl<G: Generation> StructuredOutput for Revision<G> {
    const NAME: &'static str = G::REVISION_NAME;
    const DESCRIPTION: &'static str = G::REVISION_DESCRIPTION;

    fn parameters() -> serde_json::Value {
        G::parameters()
    }
}

// ============================================================================
// Question generation
// ============================================================================

/// Complex question generated from the context, with self-critique
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct QuestionGeneration {
    /// A generated complex question based on the context. The question MUST BE
    /// complex which means that it requires multiple reasoning steps to answer
    /// it. The question MUST BE answerable only based on information from the
    /// context and does not require any additional information. The question
    /// MUST NOT have any reasoning shortcuts that allow someone to answer the
    /// question easily.
    pub question: String,
    /// Your reflection of the generated complex question. Be severe to
    /// maximize improvement.
    pub reflection: String,
    /// Your recommendation of how to improve the generated complex question.
    /// Be as detailed as possible to maximize improvement.
    pub recommendation: String,
}

pub type QuestionRevision = Revision<QuestionGeneration>;

impl StructuredOutput for QuestionGeneration {
    const NAME: &'static str = "QuestionGeneration";
    const DESCRIPTION: &'static str = "Based on the given context, generate a complex question and \
        then reflect on the question generated. The question MUST BE complex which means that it \
        requires multiple reasoning steps to answer it. The question MUST BE answerable only based \
        on information from the context and does not require any additional information.";

    fn parameters() -> serde_json::Value {
        parameters_for::<Self>()
    }
}

impl Generation for QuestionGeneration {
    const REVISION_NAME: &'static str = "QuestionRevision";
    const REVISION_DESCRIPTION: &'static str = "Revise your original question based on the context \
        and the new information given. You should use the previous critique to improve the \
        question. Then, reflect on the generated question again.";

    fn reflection(&self) -> &str {
        &self.reflection
    }

    fn recommendation(&self) -> &str {
        &self.recommendation
    }
}

// ============================================================================
// Question list checking
// ============================================================================

/// Selection of questions to drop from the current list, with self-critique
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct CheckQuestionsGeneration {
    /// The list of questions to remove from the current list of questions
    /// based on the given context. Your goal is to ensure that the list of
    /// questions are of diverse question types and cover as much of the
    /// context as possible.
    pub questions_to_remove: Vec<String>,
    /// Your reflection of the selection of questions to remove. Be severe to
    /// maximize improvement.
    pub reflection: String,
    /// Your recommendation of how to improve the current list of questions and
    /// whether questions should be kept or removed. Be as detailed as possible
    /// to maximize improvement.
    pub recommendation: String,
}

pub type CheckQuestionsRevision = Revision<CheckQuestionsGeneration>;

impl StructuredOutput for CheckQuestionsGeneration {
    const NAME: &'static str = "CheckQuestionsGeneration";
    const DESCRIPTION: &'static str = "Based on the given context and list of complex questions, \
        decide which questions are unnecessary and should be removed from the list.";

    fn parameters() -> serde_json::Value {
        parameters_for::<Self>()
    }
}

impl Generation for CheckQuestionsGeneration {
    const REVISION_NAME: &'static str = "CheckQuestionsRevision";
    const REVISION_DESCRIPTION: &'static str = "Revise your list of questions to remove based on \
        the context and the new information given. You should use the previous critique to \
        improve the list. Then, reflect on the list again.";

    fn reflection(&self) -> &str {
        &self.reflection
    }

    fn recommendation(&self) -> &str {
        &self.recommendation
    }
}

// ============================================================================
// Answer generation
// ============================================================================

/// Answer and explanation for one question, with self-critique
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct AnswerGeneration {
    /// A short and concise answer based on the context and question. The answer
    /// must answer the question fully and not use any external information
    /// outside of the provided contexts.
    pub answer: String,
    /// An explanation of the answer based on the context and question. The
    /// explanation can be long-form and lays out the reasoning steps needed to
    /// arrive at the final answer, using only the provided contexts.
    pub explanation: String,
    /// Your reflection of the generated answer and explanation. Be severe to
    /// maximize improvement.
    pub reflection: String,
    /// Your recommendation of how to improve the generated answer and
    /// explanation. Be as detailed as possible to maximize improvement.
    pub recommendation: String,
}

pub type AnswerRevision = Revision<AnswerGeneration>;

impl StructuredOutput for AnswerGeneration {
    const NAME: &'static str = "AnswerGeneration";
    const DESCRIPTION: &'static str = "Based on the given context and complex question, generate \
        the answer and explanation and then reflect on them. The answer and explanation MUST \
        answer the question fully and MUST ONLY use information from the context.";

    fn parameters() -> serde_json::Value {
        parameters_for::<Self>()
    }
}

impl Generation for AnswerGeneration {
    const REVISION_NAME: &'static str = "AnswerRevision";
    const REVISION_DESCRIPTION: &'static str = "Revise and improve your answer and explanation \
        using the critique and recommendations. You MUST only REVISE the answer and explanation. \
        Then, reflect on them again.";

    fn reflection(&self) -> &str {
        &self.reflection
    }

    fn recommendation(&self) -> &str {
        &self.recommendation
    }
}

// ============================================================================
// Supervisor routing
// ============================================================================

/// Routing choice made by a supervisor
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Router {
    pub next: String,
}

impl StructuredOutput for Router {
    const NAME: &'static str = "Router";
    const DESCRIPTION: &'static str = "Select the worker to act next, or FINISH.";

    fn parameters() -> serde_json::Value {
        Self::parameters_with_options(&[])
    }
}

impl Router {
    /// Arguments schema constraining `next` to `FINISH` or one of `workers`
    pub fn parameters_with_options(workers: &[String]) -> serde_json::Value {
        let mut options = vec![FINISH.to_string()];
        options.extend(workers.iter().cloned());
        serde_json::json!({
            "type": "object",
            "properties": {
                "next": { "type": "string", "enum": options }
            },
            "required": ["next"]
        })
    }

    /// Tool definition for a supervisor managing `workers`
    pub fn tool_for(workers: &[String]) -> ToolSpec {
        ToolSpec::function(Self::NAME, Self::DESCRIPTION, Self::parameters_with_options(workers))
    }
}
