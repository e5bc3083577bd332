//! HTTP surface for the gateway
//!
//! Routes:
//! - `GET  /health` - liveness probe
//! - `POST /ask` - full answer with relevance-gated retries
//! - `POST /ask/stream` - SSE stream of answer fragments

use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    Json, Router,
    body::Body,
    extract::State,
    http::StatusCode,
    response::sse::{Event, Sse},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use futures::stream::StreamExt;
use serde::{Deserialize, Serialize};
use tokio::net::TcpListener;
use tokio::signal;
use tower_http::trace::TraceLayer;

use crate::config::ServerConfig;
use crate::domain::Question;
use crate::error::{AskgateError, Result};
use crate::pipeline::AnswerPipeline;
use crate::streaming::StreamingSession;

/// Shared application state for all handlers
#[derive(Clone)]
pub struct AppState {
    /// Non-streaming answer pipeline
    pub pipeline: Arc<AnswerPipeline>,
    /// Streaming session factory
    pub streaming: Arc<StreamingSession>,
}

/// The gateway HTTP server
pub struct GatewayServer {
    config: ServerConfig,
    state: Arc<AppState>,
}

impl GatewayServer {
    pub fn new(
        config: ServerConfig,
        pipeline: Arc<AnswerPipeline>,
        streaming: Arc<StreamingSession>,
    ) -> Self {
        Self {
            config,
            state: Arc::new(AppState {
                pipeline,
                streaming,
            }),
        }
    }

    /// Start the server and listen for requests
    pub async fn serve(&self) -> Result<()> {
        let app = create_router(Arc::clone(&self.state));

        let addr: SocketAddr = self
            .config
            .listen_addr
            .parse()
            .map_err(|e| AskgateError::Config(format!("Invalid listen address: {e}")))?;

        tracing::info!("Starting gateway server on {addr}");

        let listener = TcpListener::bind(addr)
            .await
            .map_err(|e| AskgateError::Server(format!("Failed to bind to {addr}: {e}")))?;

        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown_signal())
            .await
            .map_err(|e| AskgateError::Server(format!("Server error: {e}")))?;

        tracing::info!("Gateway server shut down gracefully");
        Ok(())
    }
}

/// Create the router with all routes configured
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/ask", post(ask_handler))
        .route("/ask/stream", post(ask_stream_handler))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Question as submitted by the client
#[derive(Debug, Deserialize)]
pub struct AskRequest {
    #[serde(default)]
    question: String,
}

/// Answer as returned to the client
#[derive(Debug, Serialize)]
pub struct AskResponse {
    answer: String,
}

/// Health check endpoint - returns JSON status
async fn health_handler() -> Json<serde_json::Value> {
    Json(serde_json::json!({"status": "ok"}))
}

/// Answer a question in full.
///
/// Relevance exhaustion is not an error: the fallback answer comes back
/// with an ordinary 200. Only malformed input is rejected.
async fn ask_handler(
    State(state): State<Arc<AppState>>,
    Json(request): Json<AskRequest>,
) -> Response {
    let question = match Question::new(request.question) {
        Ok(q) => q,
        Err(e) => {
            return create_error_response(StatusCode::BAD_REQUEST, "invalid_question", &e.to_string());
        }
    };

    let answer = state.pipeline.answer(&question).await;

    Json(AskResponse {
        answer: answer.into_inner(),
    })
    .into_response()
}

/// Stream answer fragments as Server-Sent Events.
///
/// Backend failures surface as a single terminal `error` event; a client
/// disconnect cancels the backend read.
async fn ask_stream_handler(
    State(state): State<Arc<AppState>>,
    Json(request): Json<AskRequest>,
) -> Response {
    let question = match Question::new(request.question) {
        Ok(q) => q,
        Err(e) => {
            return create_error_response(StatusCode::BAD_REQUEST, "invalid_question", &e.to_string());
        }
    };

    let fragments = state.streaming.open(&question);

    let events = fragments.map(|item| -> std::result::Result<Event, Infallible> {
        Ok(match item {
            Ok(text) => Event::default().data(text),
            Err(e) => Event::default().event("error").data(e.to_string()),
        })
    });

    Sse::new(events).into_response()
}

/// Create a JSON error response
fn create_error_response(status: StatusCode, error_type: &str, message: &str) -> Response {
    let body = serde_json::json!({
        "error": {
            "type": error_type,
            "message": message,
        }
    });

    Response::builder()
        .status(status)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap_or_else(|_| {
            Response::builder()
                .status(StatusCode::INTERNAL_SERVER_ERROR)
                .body(Body::empty())
                .unwrap()
        })
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM)
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C, initiating graceful shutdown");
        },
        _ = terminate => {
            tracing::info!("Received SIGTERM, initiating graceful shutdown");
        },
    }
}
