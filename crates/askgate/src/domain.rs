//! Domain values exchanged with clients
//!
//! Questions and answers are validated newtypes: both always carry
//! non-blank text. The fallback answer is the fixed text substituted when
//! no relevant candidate survives the retry budget.

use crate::error::{AskgateError, Result};

/// Fixed text returned when no relevant answer could be produced.
pub const FALLBACK_ANSWER: &str = "Can't find answer to your question.";

/// A client question. Always non-blank.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Question(String);

impl Question {
    /// Validate and wrap raw question text.
    ///
    /// Rejects empty and whitespace-only input.
    pub fn new(text: impl Into<String>) -> Result<Self> {
        let text = text.into();
        if text.trim().is_empty() {
            return Err(AskgateError::InvalidInput(
                "'question' is a required field".to_string(),
            ));
        }
        Ok(Self(text))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for Question {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// An answer returned to the client: either genuine model output or the
/// fixed fallback text. Always non-blank.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Answer(String);

impl Answer {
    /// Validate and wrap answer text.
    pub fn new(text: impl Into<String>) -> Result<Self> {
        let text = text.into();
        if text.trim().is_empty() {
            return Err(AskgateError::InvalidInput(
                "'answer' is a required field".to_string(),
            ));
        }
        Ok(Self(text))
    }

    /// The fixed fallback answer.
    pub fn fallback() -> Self {
        Self(FALLBACK_ANSWER.to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_inner(self) -> String {
        self.0
    }
}

impl std::fmt::Display for Answer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}
