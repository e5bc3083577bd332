//! Client-facing streaming sessions
//!
//! One session per question: the backend SSE stream is decoded and every
//! extracted fragment is republished to the consumer channel in arrival
//! order. The backend connection is released exactly once whether the
//! stream completes, errors, or the consumer cancels; a consumer that
//! simply drops its end counts as cancellation.

use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use futures::stream::{Stream, StreamExt};
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::backend::{ByteStream, ChatBackend};
use crate::config::PromptsConfig;
use crate::domain::Question;
use crate::error::Result;
use crate::sse::{EventStream, extract_text};

/// Bound on in-flight fragments between the pump task and the consumer.
/// A slow consumer suspends the upstream read through this channel.
const FRAGMENT_CHANNEL_CAPACITY: usize = 32;

/// Opens streaming exchanges against the backend.
///
/// Sessions are independent: each one owns its connection, decoder state,
/// and cancellation token for the lifetime of a single exchange.
pub struct StreamingSession {
    backend: Arc<dyn ChatBackend>,
    prompts: PromptsConfig,
}

impl StreamingSession {
    pub fn new(backend: Arc<dyn ChatBackend>, prompts: PromptsConfig) -> Self {
        Self { backend, prompts }
    }

    /// Open a streaming exchange for `question`.
    ///
    /// Backend failures (including failure to open the stream) surface as
    /// a single terminal `Err` item on the returned stream, never as a
    /// panic or a hang.
    pub fn open(&self, question: &Question) -> FragmentStream {
        let (tx, rx) = mpsc::channel(FRAGMENT_CHANNEL_CAPACITY);
        let cancel = CancellationToken::new();
        let session_id = Uuid::new_v4();

        let backend = Arc::clone(&self.backend);
        let system_prompt = self.prompts.chat_system.clone();
        let user_prompt = self
            .prompts
            .chat_user
            .replace("{question}", question.as_str());
        let pump_cancel = cancel.clone();

        tokio::spawn(async move {
            pump(backend, system_prompt, user_prompt, tx, pump_cancel, session_id).await;
        });

        FragmentStream {
            rx: ReceiverStream::new(rx),
            cancel,
        }
    }
}

/// Ordered text fragments for one streaming exchange.
///
/// Dropping the stream cancels the session and releases the backend
/// connection.
pub struct FragmentStream {
    rx: ReceiverStream<Result<String>>,
    cancel: CancellationToken,
}

impl FragmentStream {
    /// Stop the session. The upstream read ends at its next iteration and
    /// no further fragments are delivered.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }
}

impl Drop for FragmentStream {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

impl Stream for FragmentStream {
    type Item = Result<String>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        Pin::new(&mut self.rx).poll_next(cx)
    }
}

/// Reads the backend stream and republishes fragments until one of the
/// exit paths is taken. The decoder (and the connection it owns) drops
/// when this function returns, on every path.
async fn pump(
    backend: Arc<dyn ChatBackend>,
    system_prompt: String,
    user_prompt: String,
    tx: mpsc::Sender<Result<String>>,
    cancel: CancellationToken,
    session_id: Uuid,
) {
    let bytes: ByteStream = tokio::select! {
        _ = cancel.cancelled() => {
            debug!(%session_id, "Session cancelled before the backend stream opened");
            return;
        }
        opened = backend.complete_stream(&system_prompt, &user_prompt) => match opened {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!(%session_id, "Failed to open backend stream: {e}");
                let _ = tx.send(Err(e)).await;
                return;
            }
        }
    };

    let mut events = EventStream::new(bytes);

    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                debug!(%session_id, "Streaming session cancelled");
                break;
            }
            event = events.next() => match event {
                Some(Ok(payload)) => {
                    if let Some(text) = extract_text(&payload) {
                        if tx.send(Ok(text.to_string())).await.is_err() {
                            debug!(%session_id, "Consumer gone, stopping stream");
                            break;
                        }
                    }
                }
                Some(Err(e)) => {
                    warn!(%session_id, "Backend stream failed: {e}");
                    let _ = tx.send(Err(e)).await;
                    break;
                }
                None => {
                    debug!(%session_id, "Backend stream complete");
                    break;
                }
            }
        }
    }
}
