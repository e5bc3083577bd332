//! Relevance judgment for candidate answers
//!
//! A judge decides whether a candidate answer actually addresses the
//! question. The model call is delegated to the backend; what this module
//! owns is the contract: a single categorical token in, a pass/fail
//! outcome out.

use async_trait::async_trait;

use crate::error::Result;

mod model;

pub use model::ModelJudge;

/// Outcome of one relevance judgment.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EvaluationOutcome {
    /// Whether the answer was judged relevant.
    pub pass: bool,
    /// 1.0 on pass, 0.0 on fail. No partial credit.
    pub confidence: f32,
}

impl EvaluationOutcome {
    pub fn passed() -> Self {
        Self {
            pass: true,
            confidence: 1.0,
        }
    }

    pub fn failed() -> Self {
        Self {
            pass: false,
            confidence: 0.0,
        }
    }
}

/// Trait for relevance judges (model-backed, test doubles)
#[async_trait]
pub trait RelevanceJudge: Send + Sync {
    /// Decide whether `answer` is relevant to `question`.
    async fn judge(&self, question: &str, answer: &str) -> Result<EvaluationOutcome>;
}

/// Interpret the judge model's reply.
///
/// A trimmed, case-insensitive exact "yes" passes; anything else fails,
/// including empty, multi-word, and malformed output.
pub fn interpret_verdict(raw: &str) -> EvaluationOutcome {
    if raw.trim().eq_ignore_ascii_case("yes") {
        EvaluationOutcome::passed()
    } else {
        EvaluationOutcome::failed()
    }
}
