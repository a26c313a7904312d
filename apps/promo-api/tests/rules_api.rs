//! Integration tests for rule management and recommendations.

mod common;

use axum::http::{Method, StatusCode};
use common::{build_test_app, delete, expect, get, post_json, put_json, send};
use serde_json::json;

// ---------------------------------------------------------------------------
// Tier configs
// ---------------------------------------------------------------------------

#[tokio::test]
async fn put_tiers_then_get_returns_sorted_config() {
    let app = build_test_app().await;

    let body = json!({ "tiers": [{ "min_qty": 5, "rate": 0.10 }, { "min_qty": 2, "rate": 0.05 }] });
    let saved = expect(put_json(&app, "/api/v1/rules/20", body).await, StatusCode::OK).await;
    assert_eq!(saved["kind"], "quantity_discount");
    assert_eq!(saved["tiers"][0]["min_qty"], 2);
    assert_eq!(saved["tiers"][1]["rate"], 0.10);

    let rules = expect(get(&app, "/api/v1/rules/20").await, StatusCode::OK).await;
    assert_eq!(rules["owner_id"], 20);
    assert_eq!(rules["quantity_discount"]["enabled"], true);
    assert!(rules["bundle"].is_null());
}

#[tokio::test]
async fn invalid_payload_returns_400_with_reason() {
    let app = build_test_app().await;

    let body = json!({ "tiers": [{ "min_qty": 1, "rate": 0.05 }] });
    let err = expect(put_json(&app, "/api/v1/rules/20", body).await, StatusCode::BAD_REQUEST).await;
    assert_eq!(err["code"], "VALIDATION_ERROR");
    assert_eq!(err["reason"], "out_of_range");

    let empty = expect(put_json(&app, "/api/v1/rules/20", json!({})).await, StatusCode::BAD_REQUEST).await;
    assert_eq!(empty["reason"], "required");

    // Nothing was written.
    let response = get(&app, "/api/v1/rules/20").await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn unknown_product_is_rejected() {
    let app = build_test_app().await;

    let body = json!({ "tiers": [{ "min_qty": 2, "rate": 0.05 }] });
    let err = expect(put_json(&app, "/api/v1/rules/999", body).await, StatusCode::BAD_REQUEST).await;
    assert_eq!(err["reason"], "unknown_products");
}

// ---------------------------------------------------------------------------
// Bundles
// ---------------------------------------------------------------------------

#[tokio::test]
async fn bundle_round_trip_and_recommendation() {
    let app = build_test_app().await;

    let body = json!({
        "name": "Desk set",
        "main_ids": [10],
        "product_ids": [10, 11, 12],
        "discount_rules": [{ "min_items": 2, "rate": 0.10 }]
    });
    let saved = expect(put_json(&app, "/api/v1/rules/10", body).await, StatusCode::OK).await;
    assert_eq!(saved["kind"], "bundle_discount");
    assert_eq!(saved["targets"], json!([10]));
    let group_key = saved["group_key"].as_str().unwrap().to_string();

    let rules = expect(get(&app, "/api/v1/rules/10").await, StatusCode::OK).await;
    assert_eq!(rules["bundle"]["group_key"], group_key.as_str());
    assert_eq!(rules["bundle"]["combo_ids"], json!([11, 12]));

    let rec = expect(
        get(&app, "/api/v1/products/10/recommendations").await,
        StatusCode::OK,
    )
    .await;
    assert_eq!(rec["group_key"], group_key.as_str());
    assert_eq!(rec["recommended_product_ids"], json!([11, 12]));

    // A member that is not a target anchors nothing.
    let rec = expect(
        get(&app, "/api/v1/products/11/recommendations").await,
        StatusCode::OK,
    )
    .await;
    assert!(rec["group_key"].is_null());
    assert_eq!(rec["recommended_product_ids"], json!([]));
}

#[tokio::test]
async fn legacy_combo_ids_are_accepted() {
    let app = build_test_app().await;

    let body = json!({
        "combo_ids": [11],
        "discount_rules": [{ "min_items": 2, "rate": 0.10 }]
    });
    let saved = expect(put_json(&app, "/api/v1/rules/10", body).await, StatusCode::OK).await;
    assert_eq!(saved["main_ids"], json!([10]));
    assert_eq!(saved["product_ids"], json!([10, 11]));
}

#[tokio::test]
async fn deleting_a_shared_bundle_cascades() {
    let app = build_test_app().await;

    let body = json!({
        "apply_scope": "all_in_combo",
        "product_ids": [10, 11],
        "discount_rules": [{ "min_items": 2, "rate": 0.10 }]
    });
    let saved = expect(put_json(&app, "/api/v1/rules/10", body).await, StatusCode::OK).await;
    assert_eq!(saved["targets"], json!([10, 11]));
    expect(get(&app, "/api/v1/rules/11").await, StatusCode::OK).await;

    let outcome = expect(
        delete(&app, "/api/v1/rules/10?kind=bundle_discount").await,
        StatusCode::OK,
    )
    .await;
    assert_eq!(outcome["affected"], json!([10, 11]));

    assert_eq!(get(&app, "/api/v1/rules/10").await.status(), StatusCode::NOT_FOUND);
    assert_eq!(get(&app, "/api/v1/rules/11").await.status(), StatusCode::NOT_FOUND);
    assert_eq!(delete(&app, "/api/v1/rules/10").await.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn disable_keeps_tiers_and_enable_restores_pricing() {
    let app = build_test_app().await;
    let tiers = json!({ "tiers": [{ "min_qty": 2, "rate": 0.05 }] });
    expect(put_json(&app, "/api/v1/rules/20", tiers).await, StatusCode::OK).await;

    let outcome = expect(
        send(&app, Method::POST, "/api/v1/rules/20/disable", None).await,
        StatusCode::OK,
    )
    .await;
    assert_eq!(outcome["enabled"], false);
    assert_eq!(outcome["kinds"], json!(["quantity_discount"]));

    let rules = expect(get(&app, "/api/v1/rules/20").await, StatusCode::OK).await;
    assert_eq!(rules["quantity_discount"]["enabled"], false);
    assert_eq!(rules["quantity_discount"]["tiers"][0]["min_qty"], 2);

    let cart = expect(
        post_json(&app, "/api/v1/cart/items", json!({ "product_id": 20, "quantity": 3 })).await,
        StatusCode::CREATED,
    )
    .await;
    assert_eq!(cart["lines"][0]["unit_price"], 100);

    expect(
        send(&app, Method::POST, "/api/v1/rules/20/enable?kind=quantity_discount", None).await,
        StatusCode::OK,
    )
    .await;
    let cart = expect(
        post_json(&app, "/api/v1/cart/items", json!({ "product_id": 20 })).await,
        StatusCode::CREATED,
    )
    .await;
    assert_eq!(cart["lines"][0]["unit_price"], 95);

    let missing = send(&app, Method::POST, "/api/v1/rules/11/disable", None).await;
    assert_eq!(missing.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn unknown_query_values_are_validation_errors() {
    let app = build_test_app().await;

    let err = expect(get(&app, "/api/v1/rules?filter=everything").await, StatusCode::BAD_REQUEST).await;
    assert_eq!(err["code"], "VALIDATION_ERROR");
    assert_eq!(err["reason"], "not_allowed");

    let err = expect(delete(&app, "/api/v1/rules/20?kind=tiers").await, StatusCode::BAD_REQUEST).await;
    assert_eq!(err["reason"], "not_allowed");
}

// ---------------------------------------------------------------------------
// Listing
// ---------------------------------------------------------------------------

#[tokio::test]
async fn list_filters_searches_and_summarizes() {
    let app = build_test_app().await;

    let tiers = json!({ "tiers": [{ "min_qty": 2, "rate": 0.05 }] });
    expect(put_json(&app, "/api/v1/rules/20", tiers).await, StatusCode::OK).await;
    let disabled = json!({ "enabled": false, "tiers": [{ "min_qty": 3, "rate": 0.05 }] });
    expect(put_json(&app, "/api/v1/rules/12", disabled).await, StatusCode::OK).await;

    let page = expect(get(&app, "/api/v1/rules").await, StatusCode::OK).await;
    assert_eq!(page["total"], 2);
    assert_eq!(page["page"], 1);
    assert_eq!(page["per_page"], 50);

    let page = expect(get(&app, "/api/v1/rules?filter=disabled").await, StatusCode::OK).await;
    assert_eq!(page["total"], 1);
    assert_eq!(page["items"][0]["owner_id"], 12);

    let page = expect(get(&app, "/api/v1/rules?search=pen").await, StatusCode::OK).await;
    assert_eq!(page["total"], 1);
    assert_eq!(page["items"][0]["title"], "Pen");

    let page = expect(get(&app, "/api/v1/rules?per_page=1&page=2").await, StatusCode::OK).await;
    assert_eq!(page["items"].as_array().unwrap().len(), 1);

    let summary = expect(get(&app, "/api/v1/rules/summary").await, StatusCode::OK).await;
    assert_eq!(summary["scanned"], 2);
    assert_eq!(summary["enabled"], 1);
    assert_eq!(summary["disabled"], 1);
    assert_eq!(summary["quantity"], 2);
    assert_eq!(summary["bundle"], 0);
}
