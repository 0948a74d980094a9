//! Link API integration tests
//!
//! Creation validation, read-back and listing through the API router.

use axum::{
    body::Body,
    http::{header, Request, StatusCode},
    Router,
};
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceExt;
use wisp::api::create_api_router;
use wisp::config::{
    AnalyticsConfig, Config, DatabaseBackend, DatabaseConfig, LinkConfig, RedirectMode,
    ServerConfig,
};
use wisp::models::NewVisit;
use wisp::storage::{SqliteStorage, Storage};

async fn create_test_storage() -> Arc<dyn Storage> {
    let storage = SqliteStorage::new("sqlite::memory:", 1).await.unwrap();
    storage.init().await.unwrap();
    Arc::new(storage)
}

fn create_test_config() -> Arc<Config> {
    Arc::new(Config {
        database: DatabaseConfig {
            backend: DatabaseBackend::Sqlite,
            url: "sqlite::memory:".to_string(),
            max_connections: 1,
        },
        api_server: ServerConfig {
            host: "127.0.0.1".to_string(),
            port: 8080,
        },
        redirect_server: ServerConfig {
            host: "127.0.0.1".to_string(),
            port: 3000,
        },
        links: LinkConfig::default(),
        analytics: AnalyticsConfig::default(),
        redirect_status: RedirectMode::Found,
    })
}

fn create_app(storage: &Arc<dyn Storage>) -> Router {
    create_api_router(Arc::clone(storage), create_test_config())
}

async fn post_link(app: &Router, body: Value) -> (StatusCode, Value) {
    let request = Request::builder()
        .method("POST")
        .uri("/links")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap();
    send(app, request).await
}

async fn get_json(app: &Router, uri: &str) -> (StatusCode, Value) {
    let request = Request::builder().uri(uri).body(Body::empty()).unwrap();
    send(app, request).await
}

async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, value)
}

#[tokio::test]
async fn test_create_link_returns_created_link() {
    let storage = create_test_storage().await;
    let app = create_app(&storage);

    let (status, body) = post_link(&app, json!({ "url": "https://example.com/page?x=1" })).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["target_url"], "https://example.com/page?x=1");
    assert_eq!(body["usage_count"], 0);
    assert_eq!(body["max_uses"], 3);
    assert_eq!(body["expired"], false);

    let code = body["code"].as_str().unwrap();
    assert_eq!(code.len(), 6);
    assert!(code.chars().all(|c| c.is_ascii_alphanumeric()));
}

#[tokio::test]
async fn test_created_target_round_trips_unchanged() {
    let storage = create_test_storage().await;
    let app = create_app(&storage);

    // Mixed case host and an unnormalized path must survive as typed
    let target = "https://Example.COM/a/../b?q=hello%20world#frag";
    let (status, created) = post_link(&app, json!({ "url": target, "max_uses": 5 })).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(created["max_uses"], 5);

    let code = created["code"].as_str().unwrap();
    let (status, fetched) = get_json(&app, &format!("/links/{code}")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(fetched["target_url"], target);
    assert_eq!(fetched["id"], created["id"]);
}

#[tokio::test]
async fn test_invalid_create_requests_are_rejected() {
    let storage = create_test_storage().await;
    let app = create_app(&storage);

    for body in [
        json!({}),
        json!({ "url": "" }),
        json!({ "url": "not a url" }),
        json!({ "url": "/relative" }),
        json!({ "url": "https://example.com", "max_uses": 0 }),
        json!({ "url": "https://example.com", "max_uses": -1 }),
    ] {
        let (status, response) = post_link(&app, body.clone()).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "body: {body}");
        assert!(response["error"].is_string(), "body: {body}");
    }

    let (_, listed) = get_json(&app, "/links").await;
    assert_eq!(listed.as_array().unwrap().len(), 0);
}

#[tokio::test]
async fn test_malformed_create_bodies_are_bad_requests() {
    let storage = create_test_storage().await;
    let app = create_app(&storage);

    // Wrongly typed fields
    for body in [
        json!({ "url": 42 }),
        json!({ "url": "https://example.com", "max_uses": "three" }),
        json!([1, 2, 3]),
    ] {
        let (status, response) = post_link(&app, body.clone()).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "body: {body}");
        assert!(response["error"].is_string(), "body: {body}");
    }

    // Syntactically broken JSON
    let request = Request::builder()
        .method("POST")
        .uri("/links")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from("{\"url\": "))
        .unwrap();
    let (status, response) = send(&app, request).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(response["error"].is_string());

    // No content type
    let request = Request::builder()
        .method("POST")
        .uri("/links")
        .body(Body::from(json!({ "url": "https://example.com" }).to_string()))
        .unwrap();
    let (status, response) = send(&app, request).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(response["error"].is_string());

    let (_, listed) = get_json(&app, "/links").await;
    assert_eq!(listed.as_array().unwrap().len(), 0);
}

#[tokio::test]
async fn test_get_unknown_link_is_not_found() {
    let storage = create_test_storage().await;
    let app = create_app(&storage);

    let (status, body) = get_json(&app, "/links/zzzzzz").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "Link not found");
}

#[tokio::test]
async fn test_listing_includes_visit_counts() {
    let storage = create_test_storage().await;
    let app = create_app(&storage);

    let (_, first) = post_link(&app, json!({ "url": "https://example.com/1" })).await;
    let (_, second) = post_link(&app, json!({ "url": "https://example.com/2" })).await;

    let first_id = first["id"].as_i64().unwrap();
    for i in 0..2 {
        storage
            .append_visit(&NewVisit {
                link_id: first_id,
                client_address: format!("192.0.2.{i}"),
                geo: None,
                signature: Default::default(),
                raw_signature: String::new(),
                referrer: None,
                created_at: 1_700_000_000 + i,
            })
            .await
            .unwrap();
    }

    let (status, listed) = get_json(&app, "/links").await;
    assert_eq!(status, StatusCode::OK);
    let listed = listed.as_array().unwrap();
    assert_eq!(listed.len(), 2);

    // Newest first, id breaks ties within the same second
    assert_eq!(listed[0]["code"], second["code"]);
    assert_eq!(listed[0]["visits"], 0);
    assert_eq!(listed[1]["code"], first["code"]);
    assert_eq!(listed[1]["visits"], 2);
}

#[tokio::test]
async fn test_health_check() {
    let storage = create_test_storage().await;
    let app = create_app(&storage);

    let (status, body) = get_json(&app, "/health").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "OK");
}
