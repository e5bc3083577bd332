//! The answer-acceptance pipeline
//!
//! A candidate answer is accepted only when the relevance judge passes it.
//! A rejected candidate triggers a fresh backend query, up to the attempt
//! budget; once the budget is gone the caller gets the fixed fallback
//! answer. The pipeline never fails visibly: transport failures degrade to
//! the fallback too.

use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::backend::{ChatBackend, Completion};
use crate::config::PromptsConfig;
use crate::domain::{Answer, Question};
use crate::judge::RelevanceJudge;
use crate::metrics::PipelineMetrics;

/// Total attempts (backend query + judgment) before falling back.
const MAX_ATTEMPTS: u32 = 2;

/// Orchestrates candidate generation and relevance gating for one question
/// at a time. Holds no per-question state; concurrent calls are
/// independent.
pub struct AnswerPipeline {
    backend: Arc<dyn ChatBackend>,
    judge: Arc<dyn RelevanceJudge>,
    metrics: Arc<dyn PipelineMetrics>,
    prompts: PromptsConfig,
}

impl AnswerPipeline {
    pub fn new(
        backend: Arc<dyn ChatBackend>,
        judge: Arc<dyn RelevanceJudge>,
        metrics: Arc<dyn PipelineMetrics>,
        prompts: PromptsConfig,
    ) -> Self {
        Self {
            backend,
            judge,
            metrics,
            prompts,
        }
    }

    /// Answer a question.
    ///
    /// Each attempt re-queries the backend from scratch; a rejected
    /// candidate is never re-judged. An empty completion consumes an
    /// attempt without involving the judge. Judge errors count as a failed
    /// judgment rather than propagating.
    pub async fn answer(&self, question: &Question) -> Answer {
        let user_prompt = self
            .prompts
            .chat_user
            .replace("{question}", question.as_str());

        for attempt in 1..=MAX_ATTEMPTS {
            let candidate = match self
                .backend
                .complete(&self.prompts.chat_system, &user_prompt)
                .await
            {
                Ok(Completion::Text(text)) => text,
                Ok(Completion::Empty) => {
                    debug!(attempt, "Backend returned no usable text");
                    self.metrics.attempt_failed_irrelevant();
                    continue;
                }
                Err(e) => {
                    warn!("Backend call failed: {e}");
                    return Answer::fallback();
                }
            };

            match self.judge.judge(question.as_str(), &candidate).await {
                Ok(outcome) if outcome.pass => {
                    debug!(attempt, "Candidate accepted");
                    self.metrics.attempt_succeeded();
                    return Answer::new(candidate).unwrap_or_else(|_| Answer::fallback());
                }
                Ok(_) => {
                    debug!(attempt, "Candidate judged not relevant");
                    self.metrics.attempt_failed_irrelevant();
                }
                Err(e) => {
                    warn!("Relevance judgment failed: {e}");
                    self.metrics.attempt_failed_irrelevant();
                }
            }
        }

        info!("No relevant answer within {MAX_ATTEMPTS} attempts, falling back");
        self.metrics.retry_exhausted();
        Answer::fallback()
    }
}
