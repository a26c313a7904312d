//! Storefront-facing product handlers.

use axum::extract::{Path, State};
use axum::response::IntoResponse;
use axum::Json;
use tracing::debug;

use promo_core::{ProductId, Recommendation};

use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

/// GET /api/v1/products/{id}/recommendations
///
/// The bundle this product anchors, or an empty recommendation when it
/// anchors none (or the bundle is switched off).
pub async fn recommendations(
    State(state): State<AppState>,
    Path(product_id): Path<ProductId>,
) -> ApiResult<impl IntoResponse> {
    if !state.catalog.exists(product_id).await? {
        return Err(ApiError::not_found("Product", product_id));
    }

    let recommendation = state
        .db
        .meta()
        .get(product_id)
        .await?
        .and_then(|promo| promo.bundle)
        .filter(|bundle| bundle.enabled)
        .map(|bundle| bundle.recommendation())
        .unwrap_or_else(|| Recommendation::empty(product_id));

    debug!(
        product_id = %product_id,
        recommended = recommendation.recommended_product_ids.len(),
        "Recommendation served"
    );
    Ok(Json(recommendation))
}
