use std::sync::{Arc, OnceLock};

use async_trait::async_trait;
use axum::{
    body::{to_bytes, Body},
    http::{header, HeaderValue, Method, Request, StatusCode},
    response::Response,
    Router,
};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use personaiq_common::{
    completion::{Completer, CompletionOptions, EchoCompleter},
    config::AppConfig,
    embeddings::HashEmbedder,
    errors::{AppError, Result},
    models::{ChatTurn, EmbeddingChunk, ScoredChunk},
    services::Services,
    store::{InMemoryStore, Stores, VectorStore},
};
use serde_json::{json, Value};
use tower::ServiceExt;

use super::*;

struct FailingCompleter;

#[async_trait]
impl Completer for FailingCompleter {
    async fn complete(&self, _messages: &[ChatTurn], _options: CompletionOptions) -> Result<String> {
        Err(AppError::provider("completion", "rate limit reached for gpt-4o"))
    }

    fn model_name(&self) -> &str {
        "failing"
    }
}

/// Never answers within any timeout
struct StalledCompleter;

#[async_trait]
impl Completer for StalledCompleter {
    async fn complete(&self, _messages: &[ChatTurn], _options: CompletionOptions) -> Result<String> {
        std::future::pending().await
    }

    fn model_name(&self) -> &str {
        "stalled"
    }
}

/// Vector store whose writes always fail
struct ReadOnlyStore;

#[async_trait]
impl VectorStore for ReadOnlyStore {
    async fn insert_chunks(&self, _chunks: &[EmbeddingChunk]) -> Result<()> {
        Err(AppError::storage("could not write embeddings: disk full"))
    }

    async fn search(&self, _embedding: &[f32], _persona_id: &str, _limit: usize) -> Result<Vec<ScoredChunk>> {
        Ok(Vec::new())
    }

    async fn count_by_persona(&self, _persona_id: &str) -> Result<u64> {
        Ok(0)
    }

    async fn delete_persona_chunks(&self, _persona_id: &str) -> Result<u64> {
        Ok(0)
    }

    async fn ping(&self) -> Result<()> {
        Ok(())
    }
}

fn state_with(config: AppConfig, stores: Stores, completer: Arc<dyn Completer>) -> AppState {
    let config = Arc::new(config);
    let services = Services::new(&config, stores.clone(), Arc::new(HashEmbedder::new(256)), completer);
    AppState::new(config, services, stores)
}

fn build_router(completer: Arc<dyn Completer>) -> Router {
    create_router(state_with(AppConfig::offline(), Stores::in_memory(), completer))
}

/// The process-wide Prometheus recorder, installed once for this test binary
fn prometheus() -> PrometheusHandle {
    static HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();
    HANDLE
        .get_or_init(|| {
            PrometheusBuilder::new()
                .install_recorder()
                .expect("install recorder")
        })
        .clone()
}

fn test_router() -> Router {
    build_router(Arc::new(EchoCompleter))
}

fn json_request(method: Method, uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .expect("build request")
}

fn empty_request(method: Method, uri: &str) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .body(Body::empty())
        .expect("build request")
}

async fn json_body(response: Response) -> Value {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.expect("read body");
    serde_json::from_slice(&bytes).expect("json body")
}

async fn send(app: &Router, request: Request<Body>) -> Response {
    app.clone().oneshot(request).await.expect("router call")
}

#[tokio::test]
async fn health_and_root() {
    let app = test_router();

    let response = send(&app, empty_request(Method::GET, "/health")).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(json_body(response).await["status"], "healthy");

    let response = send(&app, empty_request(Method::GET, "/")).await;
    let json = json_body(response).await;
    assert_eq!(json["status"], "running");
    assert_eq!(json["version"], personaiq_common::VERSION);

    let response = send(&app, empty_request(Method::GET, "/ready")).await;
    let json = json_body(response).await;
    assert_eq!(json["status"], "ready");
    assert_eq!(json["checks"]["store"]["status"], "up");
}

#[tokio::test]
async fn ingest_then_chat_answers_from_context() {
    let app = test_router();

    let response = send(
        &app,
        json_request(Method::POST, "/api/ingest", json!({ "text": "Doug likes blue." })),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    let json = json_body(response).await;
    assert_eq!(json["success"], true);
    assert_eq!(json["chunks_processed"], 1);
    assert_eq!(json["persona_id"], "default");
    assert_eq!(json["message"], "Successfully processed 1 chunks for persona 'default'");

    let response = send(
        &app,
        json_request(
            Method::POST,
            "/api/chat",
            json!({ "messages": [{ "role": "user", "content": "What color does Doug like?" }] }),
        ),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    let json = json_body(response).await;
    assert!(json["message"].as_str().unwrap().contains("blue"));
    assert_eq!(json["context_used"][0], "Doug likes blue.");
}

#[tokio::test]
async fn blank_ingest_is_validation_error() {
    let app = test_router();
    send(&app, json_request(Method::POST, "/api/personas", json!({ "id": "doug" }))).await;

    let response = send(
        &app,
        json_request(Method::POST, "/api/ingest", json!({ "text": "   ", "persona_id": "doug" })),
    )
    .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let json = json_body(response).await;
    assert_eq!(json["error"]["code"], "VALIDATION_ERROR");
    assert_eq!(json["error"]["field"], "text");
    assert!(json["detail"].as_str().unwrap().contains("text must not be empty"));

    let response = send(&app, empty_request(Method::GET, "/api/personas/doug")).await;
    assert_eq!(json_body(response).await["chunks"], 0);
}

#[tokio::test]
async fn chat_with_unknown_persona_is_404() {
    let app = test_router();

    let response = send(
        &app,
        json_request(
            Method::POST,
            "/api/chat",
            json!({ "message": "hello", "persona_id": "nobody" }),
        ),
    )
    .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let json = json_body(response).await;
    assert_eq!(json["error"]["code"], "PERSONA_NOT_FOUND");
}

#[tokio::test]
async fn malformed_json_is_json_error() {
    let app = test_router();

    let request = Request::builder()
        .method(Method::POST)
        .uri("/api/chat")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from("{not json"))
        .expect("build request");
    let response = send(&app, request).await;
    assert!(response.status().is_client_error());
    let json = json_body(response).await;
    assert_eq!(json["error"]["code"], "INVALID_JSON");
}

#[tokio::test]
async fn chat_out_of_range_temperature() {
    let app = test_router();

    let response = send(
        &app,
        json_request(Method::POST, "/api/chat", json!({ "message": "hi", "temperature": 3.0 })),
    )
    .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(json_body(response).await["error"]["field"], "temperature");
}

#[tokio::test]
async fn persona_lifecycle() {
    let app = test_router();

    let response = send(
        &app,
        json_request(
            Method::POST,
            "/api/personas",
            json!({ "name": "doug", "display_name": "Doug Martin", "profile": "CMO, friendly" }),
        ),
    )
    .await;
    assert_eq!(response.status(), StatusCode::CREATED);
    let json = json_body(response).await;
    assert_eq!(json["id"], "doug");
    assert_eq!(json["chunks"], 0);

    let response = send(
        &app,
        json_request(Method::POST, "/api/personas", json!({ "persona_id": "doug" })),
    )
    .await;
    assert_eq!(response.status(), StatusCode::CONFLICT);

    let response = send(&app, empty_request(Method::GET, "/api/personas")).await;
    let json = json_body(response).await;
    let ids: Vec<&str> = json["personas"]
        .as_array()
        .unwrap()
        .iter()
        .filter_map(|p| p["id"].as_str())
        .collect();
    assert!(ids.contains(&"doug"));

    let response = send(&app, empty_request(Method::DELETE, "/api/personas/doug")).await;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    let response = send(&app, empty_request(Method::GET, "/api/personas")).await;
    let json = json_body(response).await;
    assert!(json["personas"]
        .as_array()
        .unwrap()
        .iter()
        .all(|p| p["id"] != "doug"));

    let response = send(&app, empty_request(Method::DELETE, "/api/personas/doug")).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn persona_delete_removes_its_chunks() {
    let app = test_router();

    send(&app, json_request(Method::POST, "/api/personas", json!({ "id": "doug" }))).await;
    let response = send(
        &app,
        json_request(
            Method::POST,
            "/api/ingest",
            json!({ "text": "Doug likes blue.", "persona_id": "doug", "metadata": { "source": "notes" } }),
        ),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);

    let response = send(&app, empty_request(Method::GET, "/api/personas/doug")).await;
    assert_eq!(json_body(response).await["chunks"], 1);

    send(&app, empty_request(Method::DELETE, "/api/personas/doug")).await;
    send(&app, json_request(Method::POST, "/api/personas", json!({ "id": "doug" }))).await;

    let response = send(&app, empty_request(Method::GET, "/api/personas/doug")).await;
    assert_eq!(json_body(response).await["chunks"], 0);
}

#[tokio::test]
async fn provider_failure_is_bad_gateway() {
    let app = build_router(Arc::new(FailingCompleter));

    let response = send(
        &app,
        json_request(Method::POST, "/api/chat", json!({ "message": "hi" })),
    )
    .await;
    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    let json = json_body(response).await;
    assert_eq!(json["error"]["code"], "PROVIDER_ERROR");
    assert!(json["detail"].as_str().unwrap().contains("rate limit reached"));
}

#[tokio::test]
async fn unknown_api_path_is_json_404() {
    let app = test_router();

    let response = send(&app, empty_request(Method::GET, "/api/nope")).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(json_body(response).await["error"]["code"], "NOT_FOUND");
}

#[tokio::test]
async fn cors_allows_local_dev_and_rejects_others() {
    let app = test_router();

    let preflight = |origin: &str| {
        Request::builder()
            .method(Method::OPTIONS)
            .uri("/api/chat")
            .header(header::ORIGIN, origin)
            .header(header::ACCESS_CONTROL_REQUEST_METHOD, "POST")
            .body(Body::empty())
            .expect("build request")
    };

    let response = send(&app, preflight("http://localhost:4321")).await;
    assert_eq!(
        response.headers().get(header::ACCESS_CONTROL_ALLOW_ORIGIN),
        Some(&HeaderValue::from_static("http://localhost:4321"))
    );

    let response = send(&app, preflight("https://evil.example.com")).await;
    assert!(response.headers().get(header::ACCESS_CONTROL_ALLOW_ORIGIN).is_none());
}

#[tokio::test]
async fn request_id_is_propagated() {
    let app = test_router();
    let response = send(&app, empty_request(Method::GET, "/health")).await;
    assert!(response.headers().contains_key("x-request-id"));
}

#[test]
fn local_dev_origin_matching() {
    let ok = ["http://localhost", "http://localhost:5173", "http://127.0.0.1:3011"];
    let bad = [
        "https://localhost:5173",
        "http://localhost.evil.com",
        "http://localhost:",
        "http://127.0.0.1:80x",
    ];
    for origin in ok {
        assert!(is_local_dev_origin(&HeaderValue::from_static(origin)), "{origin}");
    }
    for origin in bad {
        assert!(!is_local_dev_origin(&HeaderValue::from_static(origin)), "{origin}");
    }
}

#[tokio::test]
async fn store_write_failure_is_server_error() {
    let personas = Arc::new(InMemoryStore::new());
    let stores = Stores {
        vectors: Arc::new(ReadOnlyStore),
        personas,
    };
    let app = create_router(state_with(AppConfig::offline(), stores, Arc::new(EchoCompleter)));

    let response = send(
        &app,
        json_request(Method::POST, "/api/ingest", json!({ "text": "Doug likes blue." })),
    )
    .await;
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let json = json_body(response).await;
    assert_eq!(json["error"]["code"], "STORAGE_ERROR");
    assert!(json["detail"].as_str().unwrap().contains("disk full"));
}

#[tokio::test]
async fn stalled_completion_is_gateway_timeout() {
    let mut config = AppConfig::offline();
    config.completion.timeout_secs = 0;
    let app = create_router(state_with(config, Stores::in_memory(), Arc::new(StalledCompleter)));

    let response = send(
        &app,
        json_request(Method::POST, "/api/chat", json!({ "message": "hi" })),
    )
    .await;
    assert_eq!(response.status(), StatusCode::GATEWAY_TIMEOUT);
    let json = json_body(response).await;
    assert_eq!(json["error"]["code"], "PROVIDER_TIMEOUT");
    assert!(json["detail"].as_str().unwrap().contains("completion"));
}

#[tokio::test]
async fn rejected_persona_ids_never_become_metric_labels() {
    let handle = prometheus();
    let app = create_router(
        state_with(AppConfig::offline(), Stores::in_memory(), Arc::new(EchoCompleter)).with_metrics(handle),
    );

    for i in 0..20 {
        let response = send(
            &app,
            json_request(
                Method::POST,
                "/api/chat",
                json!({ "message": "hi", "persona_id": format!("Not A Slug {i} {}", "x".repeat(200)) }),
            ),
        )
        .await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
    let response = send(
        &app,
        json_request(
            Method::POST,
            "/api/ingest",
            json!({ "text": "Doug likes blue.", "persona_id": "unregistered-label-check" }),
        ),
    )
    .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let response = send(&app, json_request(Method::POST, "/api/chat", json!({ "message": "hi" }))).await;
    assert_eq!(response.status(), StatusCode::OK);

    let response = send(&app, empty_request(Method::GET, "/metrics")).await;
    assert_eq!(response.status(), StatusCode::OK);
    let bytes = to_bytes(response.into_body(), usize::MAX).await.expect("read body");
    let body = String::from_utf8(bytes.to_vec()).expect("utf-8 exposition");

    assert!(!body.contains("Not A Slug"));
    assert!(!body.contains("unregistered-label-check"));
    assert!(body.contains(r#"persona="unresolved""#));
    assert!(body.contains(r#"persona="default""#));
}
