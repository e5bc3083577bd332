//! SSE decoding for backend streams

mod decoder;
mod extract;

pub use decoder::{EventStream, SseFrame, SseScanner};
pub use extract::extract_text;
