//! Error types for askgate

use thiserror::Error;

/// Main error type for gateway operations
#[derive(Error, Debug)]
pub enum AskgateError {
    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Backend call errors (connect, timeout, unexpected status)
    #[error("Backend error: {0}")]
    Backend(String),

    /// Streaming transport errors
    #[error("Stream error: {0}")]
    Stream(String),

    /// Invalid client input (blank question, blank answer text)
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// HTTP server errors (bind, serve)
    #[error("Server error: {0}")]
    Server(String),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for gateway operations
pub type Result<T> = std::result::Result<T, AskgateError>;
