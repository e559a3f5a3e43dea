//! Supervisor routing prompts

use qag_agent::schemas::FINISH;

/// Routing prompt for the question team
pub fn question_supervisor_prompt(first: &str, next: &str, checker: &str) -> String {
    format!(
        "You are a supervisor tasked with managing a conversation between the following \
workers: [{first}, {next}, {checker}].

The {first} generates the first question based on the context.
The {next} generates subsequent questions based on the provided context.
The {checker} decides which questions to remove from the current list of questions, when \
questions are not complete, duplicated, or not diverse enough. You should check the questions \
whenever you deem necessary but there should not be sequential checking of questions. A check \
should be followed by generating more questions or {FINISH}.

Your goal is to generate a diverse list of complex questions based on the given context. \
Remember that when you have multiple questions, you MUST check that the questions cover as much \
information in the context as possible and are diverse. The questions MUST BE answerable based \
on only using information from the contexts and do not require any external information and \
knowledge. The questions MUST BE as specific as possible. A complex question is one that \
requires multiple reasoning steps before arriving at the answer. The questions MUST NOT have \
any reasoning shortcuts that allow someone to answer the question easily.

Given the following user request, respond with the worker to act next. Each worker will \
perform a task and respond with their results and status. When finished, respond with {FINISH}."
    )
}

/// Trailing instruction for routing calls, listing the allowed options
pub fn router_closing(workers: &[String]) -> String {
    let mut options = vec![FINISH.to_string()];
    options.extend(workers.iter().cloned());
    format!(
        "You MUST respond using the {{function_name}} function. Do NOT call any other functions \
or tools. Only use the {{function_name}} function to select the next worker from the available \
options: [{}]",
        options.join(", ")
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_router_closing_lists_options() {
        let closing = router_closing(&["answer_generator".to_string()]);
        assert!(closing.ends_with("options: [FINISH, answer_generator]"));
        assert!(closing.contains("{function_name}"));
    }

    #[test]
    fn test_supervisor_prompt_names_workers() {
        let prompt = question_supervisor_prompt("a", "b", "c");
        assert!(prompt.contains("workers: [a, b, c]"));
        assert!(prompt.contains("The c decides"));
    }
}
