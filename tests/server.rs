//! HTTP surface tests driven through `tower::ServiceExt::oneshot`.

use anyhow::Result;
use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceExt;

use task_recall::completion::{CompletionProvider, CompletionRequest, CompletionResponse};
use task_recall::embedding::{EmbeddingProvider, QueryCodec};
use task_recall::models::TaskKind;
use task_recall::respond::{Responder, ResponderSettings, ERROR_SENTINEL, NO_CONTEXT_SENTINEL};
use task_recall::retrieve::RetrievalEngine;
use task_recall::server::router;
use task_recall::store::memory::InMemoryStore;

struct UnitEmbeddings;

#[async_trait]
impl EmbeddingProvider for UnitEmbeddings {
    fn model_name(&self) -> &str {
        "unit"
    }

    async fn embed_raw(&self, _text: &str) -> Result<Value> {
        Ok(json!({ "data": [{ "embedding": [1.0, 0.0] }] }))
    }
}

struct EchoCompletion;

#[async_trait]
impl CompletionProvider for EchoCompletion {
    fn model_name(&self) -> &str {
        "echo"
    }

    async fn complete(&self, _request: &CompletionRequest) -> Result<CompletionResponse> {
        Ok(CompletionResponse::with_content("You have one task in progress."))
    }
}

fn app(store: InMemoryStore) -> axum::Router {
    let store = Arc::new(store);
    let codec = QueryCodec::new(Arc::new(UnitEmbeddings), Duration::from_secs(5));
    let retrieval = RetrievalEngine::new(store.clone(), store, Duration::from_secs(5));
    let responder = Responder::new(
        codec,
        retrieval,
        Arc::new(EchoCompletion),
        ResponderSettings::default(),
    );
    router(responder)
}

fn seeded() -> InMemoryStore {
    let store = InMemoryStore::new();
    store
        .insert(
            TaskKind::Active,
            "1",
            json!({"id": 1, "title": "Ship release"}),
            Some(vec![1.0, 0.0]),
        )
        .unwrap();
    store
}

async fn post_ask(app: axum::Router, body: &str) -> (StatusCode, Value) {
    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/ask")
                .header("content-type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
        )
        .await
        .unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    (status, serde_json::from_slice(&bytes).unwrap())
}

#[tokio::test]
async fn test_ask_returns_answer() {
    let (status, body) = post_ask(app(seeded()), r#"{"query": "status update"}"#).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["answer"], "You have one task in progress.");
}

#[tokio::test]
async fn test_ask_without_context_returns_sentinel() {
    let (status, body) = post_ask(app(InMemoryStore::new()), r#"{"query": "status"}"#).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["answer"], NO_CONTEXT_SENTINEL);
}

#[tokio::test]
async fn test_non_string_query_returns_error_sentinel() {
    for body in [r#"{"query": 5}"#, r#"{"query": null}"#, r#"{}"#] {
        let (status, json) = post_ask(app(seeded()), body).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["answer"], ERROR_SENTINEL);
    }
}

#[tokio::test]
async fn test_malformed_body_is_bad_request() {
    for body in ["not json", r#"["status"]"#] {
        let (status, json) = post_ask(app(seeded()), body).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json["error"]["code"], "bad_request");
        assert!(json["error"]["message"].is_string());
    }
}

#[tokio::test]
async fn test_health() {
    let response = app(InMemoryStore::new())
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let body: Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(body["status"], "ok");
    assert_eq!(body["version"], env!("CARGO_PKG_VERSION"));
}
