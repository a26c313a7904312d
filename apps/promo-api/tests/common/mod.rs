//! Shared helpers for HTTP integration tests.

#![allow(dead_code)]

use std::time::Duration;

use axum::body::Body;
use axum::http::{Method, Request, Response, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use tower::ServiceExt;

use promo_api::{build_app, AppState, ServiceConfig};
use promo_core::Money;
use promo_db::{Database, DbConfig};

/// Build a test `ServiceConfig` with safe defaults.
pub fn test_config() -> ServiceConfig {
    ServiceConfig {
        db_path: ":memory:".to_string(),
        dedupe_window: Duration::from_secs(60),
        ..ServiceConfig::default()
    }
}

/// An in-memory database holding a small catalog:
///
/// | id | title        | price |
/// |----|--------------|-------|
/// | 10 | Desk         | 100.00|
/// | 11 | Chair        |  50.00|
/// | 12 | Lamp         |  20.00|
/// | 20 | Pen          |   1.00|
pub async fn test_db() -> Database {
    let db = Database::new(DbConfig::in_memory()).await.unwrap();
    let catalog = db.catalog();
    for (id, title, price) in [
        (10, "Desk", 10_000),
        (11, "Chair", 5_000),
        (12, "Lamp", 2_000),
        (20, "Pen", 100),
    ] {
        catalog.upsert(id, title, Money::from_minor(price)).await.unwrap();
    }
    db
}

/// The full application router, as `main` builds it.
pub async fn build_test_app() -> Router {
    build_app(AppState::new(test_db().await, test_config()))
}

pub async fn send(app: &Router, method: Method, uri: &str, body: Option<serde_json::Value>) -> Response<Body> {
    let builder = Request::builder().method(method).uri(uri);
    let request = match body {
        Some(json) => builder
            .header("content-type", "application/json")
            .body(Body::from(json.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };
    app.clone().oneshot(request).await.unwrap()
}

pub async fn get(app: &Router, uri: &str) -> Response<Body> {
    send(app, Method::GET, uri, None).await
}

pub async fn put_json(app: &Router, uri: &str, body: serde_json::Value) -> Response<Body> {
    send(app, Method::PUT, uri, Some(body)).await
}

pub async fn post_json(app: &Router, uri: &str, body: serde_json::Value) -> Response<Body> {
    send(app, Method::POST, uri, Some(body)).await
}

pub async fn patch_json(app: &Router, uri: &str, body: serde_json::Value) -> Response<Body> {
    send(app, Method::PATCH, uri, Some(body)).await
}

pub async fn delete(app: &Router, uri: &str) -> Response<Body> {
    send(app, Method::DELETE, uri, None).await
}

pub async fn body_json(response: Response<Body>) -> serde_json::Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

/// Asserts the status and returns the JSON body.
pub async fn expect(response: Response<Body>, status: StatusCode) -> serde_json::Value {
    assert_eq!(response.status(), status);
    body_json(response).await
}
