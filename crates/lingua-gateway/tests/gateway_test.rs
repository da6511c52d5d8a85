//! Integration tests for the HTTP gateway.
//!
//! Uses Axum's tower integration for in-process testing without
//! starting a real TCP listener, grounded on the same `oneshot`
//! pattern the platform's other service tests use.

use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use tower::ServiceExt;

use lingua_cache::PredictionCache;
use lingua_data::MockDataStore;
use lingua_gateway::build_app;
use lingua_gateway::state::AppState;

fn app_with_key(api_key: &str) -> axum::Router {
    let store = Arc::new(MockDataStore::new());
    let cache = Arc::new(PredictionCache::new("redis://127.0.0.1:1").unwrap());
    let state = AppState::new(store.clone(), store, cache, api_key.to_string());
    build_app(state)
}

#[tokio::test]
async fn health_endpoint_returns_ok_without_api_key() {
    let app = app_with_key("");

    let response = app
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let health: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(health["status"], "ok");
}

#[tokio::test]
async fn missing_api_key_is_rejected_when_one_is_configured() {
    let app = app_with_key("secret-123");

    let response = app
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn correct_api_key_is_accepted() {
    let app = app_with_key("secret-123");

    let response = app
        .oneshot(
            Request::builder()
                .uri("/health")
                .header("x-api-key", "secret-123")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn knowledge_state_round_trips_for_a_fresh_user() {
    let app = app_with_key("");
    let user_id = lingua_core::UserId::new();
    let payload = serde_json::json!({ "userId": user_id });

    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/knowledge-state")
                .header("content-type", "application/json")
                .body(Body::from(payload.to_string()))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn delete_user_is_idempotent_through_the_http_route() {
    let app = app_with_key("");
    let user_id = lingua_core::UserId::new();
    let uri = format!("/user/{user_id}");

    let first = app
        .clone()
        .oneshot(Request::builder().method("DELETE").uri(&uri).body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(first.status(), StatusCode::OK);

    let second = app
        .oneshot(Request::builder().method("DELETE").uri(&uri).body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(second.status(), StatusCode::OK);
}
