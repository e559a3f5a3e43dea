//! System prompts for every role
//!
//! Worker templates carry an `{instruction}` slot filled with the generate or
//! reflect instruction; every prompt may use `{function_name}`, which is
//! replaced with the tool the call is bound to.

mod answer;
mod question;
mod supervisor;

pub use answer::{ANSWER_INSTRUCTION, ANSWER_PROMPT, ANSWER_REVISION_INSTRUCTION};
pub use question::{
    CHECK_QUESTIONS_INSTRUCTION, CHECK_QUESTIONS_PROMPT, CHECK_QUESTIONS_REVISION_INSTRUCTION,
    FIRST_QUESTION_INSTRUCTION, FIRST_QUESTION_PROMPT, NEXT_QUESTION_INSTRUCTION,
    NEXT_QUESTION_PROMPT, QUESTION_REVISION_INSTRUCTION,
};
pub use supervisor::{question_supervisor_prompt, router_closing};

/// Fill a worker template's `{instruction}` slot
pub fn with_instruction(template: &str, instruction: &str) -> String {
    template.replace("{instruction}", instruction)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_templates_have_instruction_slot() {
        for template in [FIRST_QUESTION_PROMPT, NEXT_QUESTION_PROMPT, CHECK_QUESTIONS_PROMPT, ANSWER_PROMPT] {
            assert!(template.contains("{instruction}"));
        }
    }

    #[test]
    fn test_with_instruction() {
        let filled = with_instruction(ANSWER_PROMPT, ANSWER_INSTRUCTION);
        assert!(filled.contains(ANSWER_INSTRUCTION));
        assert!(!filled.contains("{instruction}"));
    }
}
