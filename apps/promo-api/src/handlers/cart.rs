//! # Cart Handlers
//!
//! Every mutation follows the same path:
//!
//! ```text
//! catalog lookups (async, no lock)
//!        │
//!        ▼
//! lock cart ──► mutate ──► load promo snapshot ──► PricingEngine::reprice
//!                                                     │
//!                                                     ▼
//!                                    line prices + bundle fees written back
//! ```
//!
//! Pricing fails open: if the snapshot cannot be loaded, the cart is priced
//! against an empty one, which puts every line back at its base price.

use std::collections::BTreeMap;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use promo_core::validation::{validate_product_id, validate_quantity};
use promo_core::{DedupeKey, Money, PricingContext, ProductId, PromoSnapshot};

use crate::error::{ApiError, ApiResult};
use crate::state::{AppState, CartView, InMemoryCart};

// ---------------------------------------------------------------------------
// Requests / responses
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct AddItemRequest {
    pub product_id: ProductId,
    #[serde(default)]
    pub variation_id: Option<ProductId>,
    #[serde(default)]
    pub quantity: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateItemRequest {
    /// New quantity; 0 removes the line.
    pub quantity: i64,
}

/// Body of `POST /cart/bundles`: add the anchor and every bundle member.
#[derive(Debug, Deserialize)]
pub struct AddBundleRequest {
    pub product_id: ProductId,
    #[serde(default)]
    pub variation_id: Option<ProductId>,
    #[serde(default)]
    pub quantity: Option<i64>,
    /// Storefront add-on fields; part of the duplicate key.
    #[serde(default)]
    pub custom_fields: BTreeMap<String, String>,
}

#[derive(Debug, Serialize)]
pub struct CartResponse {
    #[serde(flatten)]
    pub cart: CartView,
    /// True when the request repeated a recent bundle add and changed nothing.
    pub duplicate: bool,
}

impl CartResponse {
    fn of(cart: &InMemoryCart) -> Self {
        CartResponse {
            cart: cart.view(),
            duplicate: false,
        }
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Title and base price of a purchasable product.
async fn lookup(state: &AppState, product_id: ProductId) -> ApiResult<(String, Money)> {
    let price = state
        .catalog
        .base_price(product_id)
        .await?
        .ok_or_else(|| ApiError::not_found("Product", product_id))?;
    let title = state.catalog.title(product_id).await?.unwrap_or_default();
    Ok((title, price))
}

/// Recomputes every promo price in the cart.
async fn reprice(state: &AppState, cart: &mut InMemoryCart) {
    let ids = cart.product_ids();
    let snapshot = match state.db.meta().load_snapshot(&ids).await {
        Ok(snapshot) => snapshot,
        Err(e) => {
            warn!(error = %e, "Promo data unavailable, pricing at base");
            PromoSnapshot::new()
        }
    };

    let mut ctx = PricingContext::new();
    let summary = state.engine.reprice(&mut ctx, &snapshot, cart);
    cart.set_pricing(summary);
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

/// GET /api/v1/cart
pub async fn get_cart(State(state): State<AppState>) -> impl IntoResponse {
    let cart = state.cart.lock().await;
    Json(CartResponse::of(&cart))
}

/// POST /api/v1/cart/items
pub async fn add_item(
    State(state): State<AppState>,
    Json(req): Json<AddItemRequest>,
) -> ApiResult<impl IntoResponse> {
    validate_product_id("product_id", req.product_id)?;
    let quantity = validate_quantity(req.quantity.unwrap_or(1))?;
    let (title, price) = lookup(&state, req.product_id).await?;

    let mut cart = state.cart.lock().await;
    let line_id = cart.add_item(req.product_id, req.variation_id, &title, price, quantity)?;
    reprice(&state, &mut cart).await;

    debug!(product_id = %req.product_id, line_id = %line_id, quantity, "Item added to cart");
    Ok((StatusCode::CREATED, Json(CartResponse::of(&cart))))
}

/// PATCH /api/v1/cart/items/{line_id}
pub async fn update_item(
    State(state): State<AppState>,
    Path(line_id): Path<String>,
    Json(req): Json<UpdateItemRequest>,
) -> ApiResult<impl IntoResponse> {
    let quantity = match req.quantity {
        0 => 0,
        q => validate_quantity(q)?,
    };

    let mut cart = state.cart.lock().await;
    cart.update_quantity(&line_id, quantity)?;
    reprice(&state, &mut cart).await;

    debug!(line_id = %line_id, quantity, "Cart line updated");
    Ok(Json(CartResponse::of(&cart)))
}

/// DELETE /api/v1/cart/items/{line_id}
pub async fn remove_item(
    State(state): State<AppState>,
    Path(line_id): Path<String>,
) -> ApiResult<impl IntoResponse> {
    let mut cart = state.cart.lock().await;
    cart.remove_item(&line_id)?;
    reprice(&state, &mut cart).await;

    debug!(line_id = %line_id, "Cart line removed");
    Ok(Json(CartResponse::of(&cart)))
}

/// POST /api/v1/cart/bundles
///
/// Adds the anchor product and the rest of its bundle in one step. A repeat
/// of the same add inside the duplicate window changes nothing and answers
/// `200` with `duplicate: true`.
pub async fn add_bundle(
    State(state): State<AppState>,
    Json(req): Json<AddBundleRequest>,
) -> ApiResult<impl IntoResponse> {
    validate_product_id("product_id", req.product_id)?;
    let quantity = validate_quantity(req.quantity.unwrap_or(1))?;

    let snapshot = state.db.meta().load_snapshot(&[req.product_id]).await?;
    let bundle = snapshot.bundle_for(req.product_id).ok_or_else(|| {
        ApiError::validation(format!("Product {} has no active bundle", req.product_id))
    })?;

    let mut members = Vec::with_capacity(bundle.combo_ids.len() + 1);
    members.push(req.product_id);
    members.extend(bundle.combo_ids.iter().copied());

    let mut priced = Vec::with_capacity(members.len());
    for id in members {
        priced.push((id, lookup(&state, id).await?));
    }

    let key = DedupeKey::new(req.product_id, req.variation_id, &req.custom_fields);
    let mut cart = state.cart.lock().await;
    if state.suppressor.is_duplicate(&key) {
        info!(product_id = %req.product_id, "Duplicate bundle add ignored");
        let response = CartResponse {
            cart: cart.view(),
            duplicate: true,
        };
        return Ok((StatusCode::OK, Json(response)));
    }

    // All or nothing: a member hitting a cart limit aborts the whole add.
    let mut next = cart.clone();
    for (id, (title, price)) in priced {
        let variation = if id == req.product_id { req.variation_id } else { None };
        next.add_item(id, variation, &title, price, quantity)?;
    }

    // The cart lock serializes bundle adds, so check and record cannot interleave.
    state.suppressor.record(&key);
    *cart = next;
    reprice(&state, &mut cart).await;

    info!(
        product_id = %req.product_id,
        group_key = %bundle.group_key,
        lines = cart.items().len(),
        "Bundle added to cart"
    );
    Ok((StatusCode::CREATED, Json(CartResponse::of(&cart))))
}

/// DELETE /api/v1/cart
pub async fn clear_cart(State(state): State<AppState>) -> impl IntoResponse {
    let mut cart = state.cart.lock().await;
    cart.clear();
    reprice(&state, &mut cart).await;

    debug!("Cart cleared");
    Json(CartResponse::of(&cart))
}
