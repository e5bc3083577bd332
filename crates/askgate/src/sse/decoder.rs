//! Incremental decoder for SSE-framed backend streams
//!
//! The backend frames streaming completions as Server-Sent Events: `data:`
//! lines carrying JSON payloads, a literal `[DONE]` payload as the terminal
//! sentinel. Chunks arrive with arbitrary boundaries, so decoding is
//! line-buffered: the tail of a split line (or a split UTF-8 sequence)
//! waits for the next chunk.

use std::collections::VecDeque;
use std::pin::Pin;
use std::task::{Context, Poll};

use bytes::Bytes;
use futures::stream::Stream;
use serde_json::Value;

use crate::error::AskgateError;

/// End-of-stream sentinel sent by the backend as an ordinary data payload.
const DONE_SENTINEL: &str = "[DONE]";

/// One decoded frame of the SSE grammar.
#[derive(Debug, Clone, PartialEq)]
pub enum SseFrame {
    /// A parsed `data:` payload.
    Payload(Value),
    /// The terminal `[DONE]` marker.
    Done,
}

/// Line-oriented SSE scanner, fed raw byte chunks as they arrive.
///
/// Blank lines, `:` comments, and non-data fields are skipped. Payloads
/// that fail to parse as JSON are logged and dropped; they never terminate
/// the scan. After the sentinel, further input is ignored.
#[derive(Debug, Default)]
pub struct SseScanner {
    buf: Vec<u8>,
    done: bool,
}

impl SseScanner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether the terminal sentinel has been seen.
    pub fn is_done(&self) -> bool {
        self.done
    }

    /// Feed one chunk, returning every frame completed by it.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<SseFrame> {
        let mut frames = Vec::new();
        if self.done {
            return frames;
        }

        self.buf.extend_from_slice(chunk);

        while let Some(pos) = self.buf.iter().position(|&b| b == b'\n') {
            let line: Vec<u8> = self.buf.drain(..=pos).collect();
            let line = String::from_utf8_lossy(&line[..line.len() - 1]);
            if let Some(frame) = scan_line(line.trim_end_matches('\r')) {
                let terminal = frame == SseFrame::Done;
                frames.push(frame);
                if terminal {
                    self.done = true;
                    break;
                }
            }
        }

        frames
    }

    /// Flush a trailing line that arrived without a final newline.
    pub fn finish(&mut self) -> Option<SseFrame> {
        if self.done || self.buf.is_empty() {
            return None;
        }
        let line = String::from_utf8_lossy(&std::mem::take(&mut self.buf)).into_owned();
        let frame = scan_line(line.trim_end_matches('\r'));
        if matches!(frame, Some(SseFrame::Done)) {
            self.done = true;
        }
        frame
    }
}

fn scan_line(line: &str) -> Option<SseFrame> {
    if line.is_empty() || line.starts_with(':') {
        return None;
    }

    // Non-data fields ("event:", "id:", ...) carry no payload of interest
    let data = line.strip_prefix("data:")?.trim();

    if data.eq_ignore_ascii_case(DONE_SENTINEL) {
        return Some(SseFrame::Done);
    }

    match serde_json::from_str(data) {
        Ok(value) => Some(SseFrame::Payload(value)),
        Err(e) => {
            tracing::debug!("Skipping malformed streaming event: {e}");
            None
        }
    }
}

/// A lazy sequence of decoded event payloads over a raw byte stream.
///
/// The sequence ends when the sentinel is seen or the byte stream closes;
/// both are normal completion. A transport error from the byte stream ends
/// the sequence with a single terminal error. The wrapped stream (and the
/// connection it holds) is dropped with the decoder, whichever way the
/// consumer stops.
pub struct EventStream<S> {
    inner: S,
    scanner: SseScanner,
    pending: VecDeque<Value>,
    finished: bool,
}

impl<S> EventStream<S>
where
    S: Stream<Item = std::io::Result<Bytes>> + Unpin,
{
    pub fn new(inner: S) -> Self {
        Self {
            inner,
            scanner: SseScanner::new(),
            pending: VecDeque::new(),
            finished: false,
        }
    }

    fn absorb(&mut self, frames: Vec<SseFrame>) {
        for frame in frames {
            match frame {
                SseFrame::Payload(value) => self.pending.push_back(value),
                SseFrame::Done => self.finished = true,
            }
        }
    }
}

impl<S> Stream for EventStream<S>
where
    S: Stream<Item = std::io::Result<Bytes>> + Unpin,
{
    type Item = Result<Value, AskgateError>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = &mut *self;

        loop {
            if let Some(value) = this.pending.pop_front() {
                return Poll::Ready(Some(Ok(value)));
            }
            if this.finished {
                return Poll::Ready(None);
            }

            match Pin::new(&mut this.inner).poll_next(cx) {
                Poll::Ready(Some(Ok(chunk))) => {
                    let frames = this.scanner.push(&chunk);
                    this.absorb(frames);
                }
                Poll::Ready(Some(Err(e))) => {
                    this.finished = true;
                    return Poll::Ready(Some(Err(AskgateError::Stream(e.to_string()))));
                }
                Poll::Ready(None) => {
                    let trailing = this.scanner.finish();
                    this.absorb(trailing.into_iter().collect());
                    this.finished = true;
                }
                Poll::Pending => return Poll::Pending,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::stream::{self, StreamExt};
    use serde_json::json;

    fn payloads(frames: Vec<SseFrame>) -> Vec<Value> {
        frames
            .into_iter()
            .filter_map(|f| match f {
                SseFrame::Payload(v) => Some(v),
                SseFrame::Done => None,
            })
            .collect()
    }

    #[test]
    fn test_scanner_yields_n_payloads_then_done() {
        let mut scanner = SseScanner::new();
        let raw = "data: {\"text\":\"a\"}\n\ndata: {\"text\":\"b\"}\n\ndata: [DONE]\n\n";

        let frames = scanner.push(raw.as_bytes());

        assert_eq!(frames.len(), 3);
        assert_eq!(frames[0], SseFrame::Payload(json!({"text": "a"})));
        assert_eq!(frames[1], SseFrame::Payload(json!({"text": "b"})));
        assert_eq!(frames[2], SseFrame::Done);
        assert!(scanner.is_done());
    }

    #[test]
    fn test_scanner_skips_comments_and_blank_lines() {
        let mut scanner = SseScanner::new();
        let raw = ": keep-alive\n\ndata: {\"text\":\"x\"}\n: another comment\n\n";

        let frames = scanner.push(raw.as_bytes());

        assert_eq!(frames, vec![SseFrame::Payload(json!({"text": "x"}))]);
    }

    #[test]
    fn test_scanner_skips_event_and_id_fields() {
        let mut scanner = SseScanner::new();
        let raw = "event: delta\nid: 7\ndata: {\"text\":\"x\"}\n\n";

        let frames = scanner.push(raw.as_bytes());

        assert_eq!(frames, vec![SseFrame::Payload(json!({"text": "x"}))]);
    }

    #[test]
    fn test_scanner_skips_malformed_payload() {
        let mut scanner = SseScanner::new();
        let raw = "data: {not json}\n\ndata: {\"text\":\"ok\"}\n\n";

        let frames = scanner.push(raw.as_bytes());

        assert_eq!(frames, vec![SseFrame::Payload(json!({"text": "ok"}))]);
        assert!(!scanner.is_done());
    }

    #[test]
    fn test_scanner_done_is_case_insensitive() {
        let mut scanner = SseScanner::new();
        let frames = scanner.push(b"data: [done]\n");
        assert_eq!(frames, vec![SseFrame::Done]);
    }

    #[test]
    fn test_scanner_ignores_input_after_done() {
        let mut scanner = SseScanner::new();
        let raw = "data: [DONE]\n\ndata: {\"text\":\"late\"}\n\n";

        let frames = scanner.push(raw.as_bytes());
        assert_eq!(frames, vec![SseFrame::Done]);

        let more = scanner.push(b"data: {\"text\":\"later\"}\n\n");
        assert!(more.is_empty());
    }

    #[test]
    fn test_scanner_handles_lines_split_across_chunks() {
        let mut scanner = SseScanner::new();

        let first = scanner.push(b"data: {\"te");
        assert!(first.is_empty());

        let second = scanner.push(b"xt\":\"joined\"}\n");
        assert_eq!(second, vec![SseFrame::Payload(json!({"text": "joined"}))]);
    }

    #[test]
    fn test_scanner_handles_utf8_split_across_chunks() {
        let mut scanner = SseScanner::new();
        let raw = "data: {\"text\":\"héllo\"}\n".as_bytes();
        // Split in the middle of the two-byte 'é'
        let split = raw.iter().position(|&b| b == 0xc3).unwrap() + 1;

        assert!(scanner.push(&raw[..split]).is_empty());
        let frames = scanner.push(&raw[split..]);
        assert_eq!(frames, vec![SseFrame::Payload(json!({"text": "héllo"}))]);
    }

    #[test]
    fn test_scanner_finish_flushes_trailing_line() {
        let mut scanner = SseScanner::new();
        assert!(scanner.push(b"data: {\"text\":\"tail\"}").is_empty());

        let frame = scanner.finish();
        assert_eq!(frame, Some(SseFrame::Payload(json!({"text": "tail"}))));
    }

    #[test]
    fn test_scanner_crlf_line_endings() {
        let mut scanner = SseScanner::new();
        let frames = scanner.push(b"data: {\"text\":\"win\"}\r\ndata: [DONE]\r\n");
        assert_eq!(
            payloads(frames.clone()),
            vec![json!({"text": "win"})]
        );
        assert_eq!(frames.last(), Some(&SseFrame::Done));
    }

    #[tokio::test]
    async fn test_event_stream_terminates_on_sentinel() {
        let chunks: Vec<std::io::Result<Bytes>> = vec![
            Ok(Bytes::from("data: {\"text\":\"one\"}\n\n")),
            Ok(Bytes::from("data: {\"text\":\"two\"}\n\ndata: [DONE]\n\n")),
            Ok(Bytes::from("data: {\"text\":\"never\"}\n\n")),
        ];

        let decoded: Vec<_> = EventStream::new(stream::iter(chunks)).collect().await;

        assert_eq!(decoded.len(), 2);
        assert_eq!(decoded[0].as_ref().unwrap(), &json!({"text": "one"}));
        assert_eq!(decoded[1].as_ref().unwrap(), &json!({"text": "two"}));
    }

    #[tokio::test]
    async fn test_event_stream_ends_cleanly_without_sentinel() {
        let chunks: Vec<std::io::Result<Bytes>> =
            vec![Ok(Bytes::from("data: {\"text\":\"only\"}\n"))];

        let decoded: Vec<_> = EventStream::new(stream::iter(chunks)).collect().await;

        assert_eq!(decoded.len(), 1);
        assert!(decoded[0].is_ok());
    }

    #[tokio::test]
    async fn test_event_stream_surfaces_transport_error_once() {
        let chunks: Vec<std::io::Result<Bytes>> = vec![
            Ok(Bytes::from("data: {\"text\":\"pre\"}\n")),
            Err(std::io::Error::other("connection reset")),
        ];

        let decoded: Vec<_> = EventStream::new(stream::iter(chunks)).collect().await;

        assert_eq!(decoded.len(), 2);
        assert!(decoded[0].is_ok());
        let err = decoded[1].as_ref().unwrap_err().to_string();
        assert!(err.contains("connection reset"));
    }

    #[tokio::test]
    async fn test_event_stream_skips_malformed_and_continues() {
        let chunks: Vec<std::io::Result<Bytes>> = vec![
            Ok(Bytes::from("data: oops\n")),
            Ok(Bytes::from("data: {\"text\":\"fine\"}\ndata: [DONE]\n")),
        ];

        let decoded: Vec<_> = EventStream::new(stream::iter(chunks)).collect().await;

        assert_eq!(decoded.len(), 1);
        assert_eq!(decoded[0].as_ref().unwrap(), &json!({"text": "fine"}));
    }
}
