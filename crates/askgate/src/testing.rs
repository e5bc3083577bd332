//! Test utilities - scripted doubles for the backend and judge
//!
//! The pipeline and streaming tests need collaborators with exact call
//! counts and controllable byte streams; these doubles replay scripted
//! results and record how they were used.

use std::collections::VecDeque;
use std::pin::Pin;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll};

use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::{self, Stream};
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;

use crate::backend::{ByteStream, ChatBackend, Completion};
use crate::error::{AskgateError, Result};
use crate::judge::{EvaluationOutcome, RelevanceJudge};

/// Backend double replaying scripted completion results in order.
///
/// When the script runs out, the fallback completion (if any) repeats
/// forever; otherwise further calls fail.
pub struct ScriptedBackend {
    script: Mutex<VecDeque<Result<Completion>>>,
    fallback: Option<Completion>,
    calls: AtomicUsize,
    last_prompts: Mutex<Option<(String, String)>>,
}

impl ScriptedBackend {
    pub fn with_completions(script: Vec<Result<Completion>>) -> Self {
        Self {
            script: Mutex::new(script.into()),
            fallback: None,
            calls: AtomicUsize::new(0),
            last_prompts: Mutex::new(None),
        }
    }

    /// Every call returns a clone of `completion`.
    pub fn always(completion: Completion) -> Self {
        Self {
            script: Mutex::new(VecDeque::new()),
            fallback: Some(completion),
            calls: AtomicUsize::new(0),
            last_prompts: Mutex::new(None),
        }
    }

    /// Number of `complete` calls made so far.
    pub fn completion_calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// The (system, user) prompts of the most recent call.
    pub fn last_prompts(&self) -> Option<(String, String)> {
        self.last_prompts.lock().unwrap().clone()
    }
}

#[async_trait]
impl ChatBackend for ScriptedBackend {
    async fn complete(&self, system_prompt: &str, user_prompt: &str) -> Result<Completion> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        *self.last_prompts.lock().unwrap() =
            Some((system_prompt.to_string(), user_prompt.to_string()));

        if let Some(scripted) = self.script.lock().unwrap().pop_front() {
            return scripted;
        }
        match &self.fallback {
            Some(completion) => Ok(completion.clone()),
            None => Err(AskgateError::Backend(
                "no scripted completion available".to_string(),
            )),
        }
    }

    async fn complete_stream(&self, _system: &str, _user: &str) -> Result<ByteStream> {
        Err(AskgateError::Backend(
            "streaming not scripted for this double".to_string(),
        ))
    }
}

/// Judge double replaying scripted outcomes in order.
pub struct ScriptedJudge {
    script: Mutex<VecDeque<Result<EvaluationOutcome>>>,
    fallback: Option<EvaluationOutcome>,
    calls: AtomicUsize,
}

impl ScriptedJudge {
    pub fn with_outcomes(script: Vec<Result<EvaluationOutcome>>) -> Self {
        Self {
            script: Mutex::new(script.into()),
            fallback: None,
            calls: AtomicUsize::new(0),
        }
    }

    /// Every call returns `outcome`.
    pub fn always(outcome: EvaluationOutcome) -> Self {
        Self {
            script: Mutex::new(VecDeque::new()),
            fallback: Some(outcome),
            calls: AtomicUsize::new(0),
        }
    }

    /// Number of `judge` calls made so far.
    pub fn judge_calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl RelevanceJudge for ScriptedJudge {
    async fn judge(&self, _question: &str, _answer: &str) -> Result<EvaluationOutcome> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        if let Some(scripted) = self.script.lock().unwrap().pop_front() {
            return scripted;
        }
        match self.fallback {
            Some(outcome) => Ok(outcome),
            None => Err(AskgateError::Backend(
                "no scripted judgment available".to_string(),
            )),
        }
    }
}

/// Counting sink for pipeline outcome events.
#[derive(Debug, Default)]
pub struct CountingMetrics {
    pub succeeded: AtomicUsize,
    pub failed_irrelevant: AtomicUsize,
    pub exhausted: AtomicUsize,
}

impl crate::metrics::PipelineMetrics for CountingMetrics {
    fn attempt_succeeded(&self) {
        self.succeeded.fetch_add(1, Ordering::SeqCst);
    }

    fn attempt_failed_irrelevant(&self) {
        self.failed_irrelevant.fetch_add(1, Ordering::SeqCst);
    }

    fn retry_exhausted(&self) {
        self.exhausted.fetch_add(1, Ordering::SeqCst);
    }
}

/// Byte stream wrapper that records its drop.
///
/// A session that ends any way at all must release the backend connection
/// exactly once; the release counter makes both leaks and double releases
/// visible to tests.
pub struct TrackedStream<S> {
    inner: S,
    releases: Arc<AtomicUsize>,
}

impl<S> Drop for TrackedStream<S> {
    fn drop(&mut self) {
        self.releases.fetch_add(1, Ordering::SeqCst);
    }
}

impl<S> Stream for TrackedStream<S>
where
    S: Stream<Item = std::io::Result<Bytes>> + Unpin,
{
    type Item = std::io::Result<Bytes>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        Pin::new(&mut self.inner).poll_next(cx)
    }
}

enum ByteSource {
    Chunks(Vec<std::io::Result<Bytes>>),
    Channel(mpsc::Receiver<std::io::Result<Bytes>>),
}

/// Backend double for the streaming path.
///
/// Serves one streaming call from either a fixed chunk list or a
/// test-driven channel, wrapped so releases are counted.
pub struct StreamingBackend {
    source: Mutex<Option<ByteSource>>,
    releases: Arc<AtomicUsize>,
    fail_open: bool,
}

impl StreamingBackend {
    /// Stream a fixed set of chunks.
    pub fn with_chunks(chunks: Vec<std::io::Result<Bytes>>) -> Self {
        Self {
            source: Mutex::new(Some(ByteSource::Chunks(chunks))),
            releases: Arc::new(AtomicUsize::new(0)),
            fail_open: false,
        }
    }

    /// Stream whatever the test sends through the returned channel.
    pub fn with_channel() -> (Self, mpsc::Sender<std::io::Result<Bytes>>) {
        let (tx, rx) = mpsc::channel(16);
        let backend = Self {
            source: Mutex::new(Some(ByteSource::Channel(rx))),
            releases: Arc::new(AtomicUsize::new(0)),
            fail_open: false,
        };
        (backend, tx)
    }

    /// Fail the streaming call before any bytes flow.
    pub fn failing_open() -> Self {
        Self {
            source: Mutex::new(None),
            releases: Arc::new(AtomicUsize::new(0)),
            fail_open: true,
        }
    }

    /// How many times the served stream has been released.
    pub fn release_count(&self) -> usize {
        self.releases.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ChatBackend for StreamingBackend {
    async fn complete(&self, _system: &str, _user: &str) -> Result<Completion> {
        Err(AskgateError::Backend(
            "completions not scripted for this double".to_string(),
        ))
    }

    async fn complete_stream(&self, _system: &str, _user: &str) -> Result<ByteStream> {
        if self.fail_open {
            return Err(AskgateError::Backend("connection refused".to_string()));
        }

        let source = self
            .source
            .lock()
            .unwrap()
            .take()
            .ok_or_else(|| AskgateError::Backend("stream already consumed".to_string()))?;

        let releases = Arc::clone(&self.releases);
        let bytes: ByteStream = match source {
            ByteSource::Chunks(chunks) => Box::pin(TrackedStream {
                inner: stream::iter(chunks),
                releases,
            }),
            ByteSource::Channel(rx) => Box::pin(TrackedStream {
                inner: ReceiverStream::new(rx),
                releases,
            }),
        };
        Ok(bytes)
    }
}
