//! Prompt templates for the chat and relevance-judge model calls
//!
//! Placeholders are substituted with simple string replacement before the
//! templates are sent to the backend. All four templates can be overridden
//! in the `[prompts]` section of the config file.

/// System prompt for answering user questions.
pub const CHAT_SYSTEM_PROMPT: &str = "You are a helpful question-answering assistant. \
Answer the user's question directly and concisely. \
If you do not know the answer, say so plainly instead of guessing.";

/// User prompt for answering questions.
///
/// Placeholder: {question} - the user's question
pub const CHAT_USER_PROMPT: &str = "Question: {question}";

/// System prompt for the relevance judge.
///
/// The judge model must reply with a single categorical token so the
/// gateway can interpret the verdict without parsing free-form text.
pub const JUDGE_SYSTEM_PROMPT: &str = "You are a strict relevance judge. \
You are given a question and a candidate answer. \
Decide whether the candidate answer is relevant to and actually addresses the question. \
Respond with a single word: YES or NO. Do not add explanations or punctuation.";

/// User prompt for the relevance judge.
///
/// Placeholders: {question} - the original question,
/// {answer} - the candidate answer to judge
pub const JUDGE_USER_PROMPT: &str = r#"Question:
{question}

Candidate answer:
{answer}

Is the candidate answer relevant to the question? Respond with YES or NO only."#;
