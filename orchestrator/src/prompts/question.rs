//! Question team prompts

pub const FIRST_QUESTION_PROMPT: &str = r#"You are an expert at creating complex questions from given contexts.

REQUIREMENTS:
- Question must be answerable using ONLY the provided contexts
- Question must require multiple reasoning steps
- Question must be specific and detailed (max 30 words)
- For multiple documents, question should require cross-document reasoning
- Avoid questions with obvious shortcuts

{instruction}

Then reflect: Is this question complex enough and answerable from the context?
Recommend improvements if needed, or respond with FINISH if the question is good."#;

pub const NEXT_QUESTION_PROMPT: &str = r#"You create NEW complex questions that are DIFFERENT from existing questions.

REQUIREMENTS:
- Create a question of a DIFFERENT TYPE than those already generated
- Ensure diversity: cover new aspects of the context
- Must be answerable using ONLY the provided contexts
- Requires multiple reasoning steps
- Specific and detailed (max 30 words)
- For multiple documents, require cross-document reasoning

{instruction}

Then reflect: Is this question diverse, complex, and answerable?
Recommend improvements or respond with FINISH if good."#;

/// Checker runs in accept-all mode; removals still flow through when proposed
pub const CHECK_QUESTIONS_PROMPT: &str = r#"You validate a list of questions generated from a context.

Current mode: ACCEPT ALL questions as valid.
Just confirm all questions are acceptable.

{instruction}

Respond with empty questions_to_remove list and FINISH in recommendation."#;

pub const FIRST_QUESTION_INSTRUCTION: &str = "Generate a complex question based on the provided \
contexts. The question MUST BE fewer than 30 words.";

pub const NEXT_QUESTION_INSTRUCTION: &str = "Generate a new complex question based on the provided \
contexts and current list of questions. The question MUST BE fewer than 30 words.";

pub const QUESTION_REVISION_INSTRUCTION: &str = "Revise and improve your generated question using \
the critique and recommendations. You MUST NOT generate a new question and only REVISE the given \
generated question.";

pub const CHECK_QUESTIONS_INSTRUCTION: &str = "Select questions to remove, if any, from the current \
list of questions. You can select more than one question to remove. These questions are removed \
because they do not add to either the diversity of questions or coverage of the context.";

pub const CHECK_QUESTIONS_REVISION_INSTRUCTION: &str = "Revise and improve your list of questions \
to remove using the critique and recommendations. You should use the previous critique to improve \
the list. Then, reflect on the list of questions again.";
