use axum::{http::StatusCode, routing::post, Json, Router};
use llm::{Client, ClientConfig, InferenceError, FALLBACK_REPLY};
use serde_json::{json, Value};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Start a throwaway model server answering every request with `status` and `body`.
async fn fake_ollama(status: StatusCode, body: Value) -> (String, Arc<Mutex<Vec<Value>>>) {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let seen_clone = seen.clone();

    let app = Router::new().route(
        "/api/generate",
        post(move |Json(req): Json<Value>| {
            let seen = seen_clone.clone();
            let body = body.clone();
            async move {
                seen.lock().unwrap().push(req);
                (status, Json(body))
            }
        }),
    );

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    (format!("http://{}/api/generate", addr), seen)
}

fn client_for(url: String) -> Client {
    Client::new(ClientConfig {
        url,
        timeout: Duration::from_secs(5),
        ..Default::default()
    })
    .unwrap()
}

#[tokio::test]
async fn test_generate_returns_response_field() {
    let (url, seen) = fake_ollama(StatusCode::OK, json!({ "response": "  Paris, com certeza!  ", "done": true })).await;
    let client = client_for(url);

    let reply = client.generate("qual a capital da frança").await.unwrap();
    assert_eq!(reply, "Paris, com certeza!");

    let requests = seen.lock().unwrap();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0]["model"], "gemma3:4b");
    assert_eq!(requests[0]["prompt"], "qual a capital da frança");
    assert_eq!(requests[0]["stream"], false);
}

#[tokio::test]
async fn test_missing_response_field_uses_fallback() {
    let (url, _) = fake_ollama(StatusCode::OK, json!({ "done": true })).await;
    let reply = client_for(url).generate("oi").await.unwrap();
    assert_eq!(reply, FALLBACK_REPLY);
}

#[tokio::test]
async fn test_long_reply_is_truncated() {
    let (url, _) = fake_ollama(StatusCode::OK, json!({ "response": "a".repeat(2000) })).await;
    let reply = client_for(url).generate("fale bastante").await.unwrap();
    assert_eq!(reply.chars().count(), 800);
}

#[tokio::test]
async fn test_error_status_is_reported() {
    let (url, _) = fake_ollama(StatusCode::NOT_FOUND, json!({ "error": "model 'gemma3:4b' not found" })).await;
    let err = client_for(url).generate("oi").await.unwrap_err();

    match &err {
        InferenceError::Status { status, body } => {
            assert_eq!(*status, 404);
            assert!(body.contains("not found"));
        }
        other => panic!("expected status error, got {other:?}"),
    }
    assert!(err.to_string().starts_with("404"));
}

#[tokio::test]
async fn test_unreachable_server_is_transport_error() {
    // Bind then drop to get a port nobody listens on
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let err = client_for(format!("http://{}/api/generate", addr))
        .generate("oi")
        .await
        .unwrap_err();
    assert!(matches!(err, InferenceError::Transport(_)));
}
