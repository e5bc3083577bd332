//! Pipeline outcome events
//!
//! The answer pipeline reports at most three named events per invocation:
//! attempt-succeeded, attempt-failed-irrelevant, and retry-exhausted. How
//! the events leave the process is a deployment concern; the default sink
//! writes structured log records.

/// Sink for pipeline outcome events.
pub trait PipelineMetrics: Send + Sync {
    /// A candidate answer passed the relevance judgment.
    fn attempt_succeeded(&self);

    /// A candidate answer was rejected (or the backend produced none),
    /// consuming one attempt.
    fn attempt_failed_irrelevant(&self);

    /// The attempt budget ran out without a relevant answer.
    fn retry_exhausted(&self);
}

/// Default sink: structured log records via `tracing`.
#[derive(Debug, Default)]
pub struct LogMetrics;

impl PipelineMetrics for LogMetrics {
    fn attempt_succeeded(&self) {
        tracing::info!(event = "attempt_succeeded", "answer accepted");
    }

    fn attempt_failed_irrelevant(&self) {
        tracing::debug!(event = "attempt_failed_irrelevant", "candidate rejected");
    }

    fn retry_exhausted(&self) {
        tracing::info!(event = "retry_exhausted", "attempt budget exhausted");
    }
}
