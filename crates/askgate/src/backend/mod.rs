//! LLM backend collaborator
//!
//! The rest of the crate talks to the model through the `ChatBackend`
//! trait. The vendor response is decoded into a `Completion` at this
//! boundary, so no response-schema branching leaks into the pipeline:
//! callers see text, an empty result, or a transport error.

use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::BoxStream;

use crate::error::Result;

mod remote;

pub use remote::RemoteBackend;

/// Raw SSE-framed byte stream from a streaming chat call.
///
/// Dropping the stream releases the underlying connection.
pub type ByteStream = BoxStream<'static, std::io::Result<Bytes>>;

/// Outcome of a completed (non-streaming) chat call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Completion {
    /// The model produced usable text.
    Text(String),
    /// The response carried no usable text (no choices, empty content).
    Empty,
}

/// Trait for chat backends (remote API, test doubles)
#[async_trait]
pub trait ChatBackend: Send + Sync {
    /// Request a full completion for the given prompts.
    async fn complete(&self, system_prompt: &str, user_prompt: &str) -> Result<Completion>;

    /// Request a streaming completion. The returned bytes are SSE framed
    /// and terminated by the `[DONE]` sentinel.
    async fn complete_stream(
        &self,
        system_prompt: &str,
        user_prompt: &str,
    ) -> Result<ByteStream>;
}
