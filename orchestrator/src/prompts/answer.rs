//! Answer generator prompts

pub const ANSWER_PROMPT: &str = r#"Answer questions using ONLY the provided context.
Requirements: SHORT answer, CLEAR explanation, grounded in context.

{instruction}

Reflect: Is it accurate? Recommend improvements or FINISH if good."#;

pub const ANSWER_INSTRUCTION: &str = "Generate a short answer and clear explanation based on the \
context. Keep answer concise, explanation complete and natural.";

pub const ANSWER_REVISION_INSTRUCTION: &str = "Revise the answer and explanation using the \
critique. Only improve what needs fixing.";
