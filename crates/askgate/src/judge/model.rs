//! Model-backed relevance judge

use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use crate::backend::{ChatBackend, Completion};
use crate::config::PromptsConfig;
use crate::error::Result;
use crate::judge::{EvaluationOutcome, RelevanceJudge, interpret_verdict};

/// Judge that asks the chat backend for a YES/NO verdict.
///
/// The model is instructed (via the judge prompts) to respond with a
/// single token; interpretation stays strictly local. An empty completion
/// counts as a failed judgment.
pub struct ModelJudge {
    backend: Arc<dyn ChatBackend>,
    prompts: PromptsConfig,
}

impl ModelJudge {
    pub fn new(backend: Arc<dyn ChatBackend>, prompts: PromptsConfig) -> Self {
        Self { backend, prompts }
    }
}

#[async_trait]
impl RelevanceJudge for ModelJudge {
    async fn judge(&self, question: &str, answer: &str) -> Result<EvaluationOutcome> {
        let user_prompt = self
            .prompts
            .judge_user
            .replace("{question}", question)
            .replace("{answer}", answer);

        let completion = self
            .backend
            .complete(&self.prompts.judge_system, &user_prompt)
            .await?;

        let outcome = match completion {
            Completion::Text(verdict) => {
                debug!("Judge verdict: {verdict}");
                interpret_verdict(&verdict)
            }
            Completion::Empty => EvaluationOutcome::failed(),
        };

        Ok(outcome)
    }
}
