//! Integration tests for the health check endpoint and general HTTP behaviour.

mod common;

use axum::http::StatusCode;
use common::{build_test_app, expect, get};

#[tokio::test]
async fn health_check_returns_ok_with_json() {
    let app = build_test_app().await;
    let json = expect(get(&app, "/health").await, StatusCode::OK).await;

    assert_eq!(json["status"], "ok");
    assert!(json["version"].is_string());
    assert_eq!(json["db_healthy"], true);
    assert_eq!(json["schema_version"], 1);
}

#[tokio::test]
async fn unknown_route_returns_404() {
    let app = build_test_app().await;
    let response = get(&app, "/this-route-does-not-exist").await;

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn unknown_product_recommendation_returns_404() {
    let app = build_test_app().await;
    let json = expect(
        get(&app, "/api/v1/products/999/recommendations").await,
        StatusCode::NOT_FOUND,
    )
    .await;

    assert_eq!(json["code"], "NOT_FOUND");
}
