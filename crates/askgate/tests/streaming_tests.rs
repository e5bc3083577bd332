//! Streaming tests over a mocked SSE backend
//!
//! Drives the real RemoteBackend + StreamingSession pair against wiremock
//! responses framed as SSE, including the payload-shape variations the
//! delta extraction has to tolerate.

use std::sync::Arc;

use futures::StreamExt;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use askgate::backend::{ChatBackend, RemoteBackend};
use askgate::config::{BackendConfig, PromptsConfig};
use askgate::domain::Question;
use askgate::streaming::StreamingSession;

fn backend_config(api_url: String, api_key_env: &str) -> BackendConfig {
    unsafe { std::env::set_var(api_key_env, "test-key") };
    BackendConfig {
        api_url,
        api_key_env: api_key_env.to_string(),
        model: "gpt-4o-mini".to_string(),
        timeout_secs: 30,
        temperature: 0.0,
    }
}

async fn session_over(mock_server: &MockServer, api_key_env: &str) -> StreamingSession {
    let config = backend_config(mock_server.uri(), api_key_env);
    let backend: Arc<dyn ChatBackend> = Arc::new(RemoteBackend::new(&config).unwrap());
    StreamingSession::new(backend, PromptsConfig::default())
}

fn sse_response(body: &str) -> ResponseTemplate {
    ResponseTemplate::new(200)
        .insert_header("content-type", "text/event-stream")
        .set_body_raw(body, "text/event-stream")
}

#[tokio::test]
async fn test_streaming_fragments_in_arrival_order() {
    let mock_server = MockServer::start().await;

    let sse_body = "data: {\"text\":\"The capital \"}\n\n\
data: {\"text\":\"of France \"}\n\n\
data: {\"text\":\"is Paris.\"}\n\n\
data: [DONE]\n\n";

    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(sse_response(sse_body))
        .mount(&mock_server)
        .await;

    let session = session_over(&mock_server, "ASKGATE_STREAM_TEST_ORDER").await;
    let question = Question::new("What is the capital of France?").unwrap();

    let fragments: Vec<String> = session
        .open(&question)
        .map(|item| item.unwrap())
        .collect()
        .await;

    assert_eq!(fragments, vec!["The capital ", "of France ", "is Paris."]);
}

#[tokio::test]
async fn test_streaming_tolerates_varied_payload_shapes() {
    let mock_server = MockServer::start().await;

    // Fragments nested under different schemas, plus an event with no
    // text at all
    let sse_body = "data: {\"delta\":{\"text\":\"a\"}}\n\n\
data: {\"message\":{\"content\":[{\"type\":\"text\",\"text\":\"b\"}]}}\n\n\
data: {\"type\":\"ping\"}\n\n\
data: {\"choices\":[{\"delta\":{\"TEXT\":\"c\"}}]}\n\n\
data: [DONE]\n\n";

    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(sse_response(sse_body))
        .mount(&mock_server)
        .await;

    let session = session_over(&mock_server, "ASKGATE_STREAM_TEST_SHAPES").await;
    let question = Question::new("Shapes?").unwrap();

    let fragments: Vec<String> = session
        .open(&question)
        .map(|item| item.unwrap())
        .collect()
        .await;

    assert_eq!(fragments, vec!["a", "b", "c"]);
}

#[tokio::test]
async fn test_streaming_skips_malformed_events() {
    let mock_server = MockServer::start().await;

    let sse_body = "data: {\"text\":\"ok1\"}\n\n\
data: this is not json\n\n\
data: {\"text\":\"ok2\"}\n\n\
data: [DONE]\n\n";

    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(sse_response(sse_body))
        .mount(&mock_server)
        .await;

    let session = session_over(&mock_server, "ASKGATE_STREAM_TEST_MALFORMED").await;
    let question = Question::new("Robust?").unwrap();

    let fragments: Vec<String> = session
        .open(&question)
        .map(|item| item.unwrap())
        .collect()
        .await;

    assert_eq!(fragments, vec!["ok1", "ok2"]);
}

#[tokio::test]
async fn test_streaming_backend_error_is_single_terminal_item() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(503).set_body_string("overloaded"))
        .mount(&mock_server)
        .await;

    let session = session_over(&mock_server, "ASKGATE_STREAM_TEST_503").await;
    let question = Question::new("Down?").unwrap();

    let items: Vec<_> = session.open(&question).collect().await;

    assert_eq!(items.len(), 1);
    let err = items[0].as_ref().unwrap_err().to_string();
    assert!(err.contains("503"));
}

#[tokio::test]
async fn test_streaming_stream_end_without_sentinel() {
    let mock_server = MockServer::start().await;

    // Physical close without the application-level sentinel is normal
    // completion
    let sse_body = "data: {\"text\":\"partial\"}\n\n";

    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(sse_response(sse_body))
        .mount(&mock_server)
        .await;

    let session = session_over(&mock_server, "ASKGATE_STREAM_TEST_NOSENTINEL").await;
    let question = Question::new("Cut off?").unwrap();

    let fragments: Vec<String> = session
        .open(&question)
        .map(|item| item.unwrap())
        .collect()
        .await;

    assert_eq!(fragments, vec!["partial"]);
}
