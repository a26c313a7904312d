//! Handlers for discount rule management.
//!
//! A `PUT` body is classified once into a tier config or a bundle, then
//! handed to the rule store, which validates ids against the catalog and
//! rewrites the pricing projection in the same transaction.

use axum::extract::{Path, Query, State};
use axum::response::IntoResponse;
use axum::Json;
use serde::Deserialize;
use tracing::info;

use promo_core::validation::{classify, normalize_page, parse_filter, parse_kind};
use promo_core::{CoreError, ProductId, RuleDraft, RuleKind};

use crate::error::ApiResult;
use crate::state::AppState;

/// Query parameters of `GET /rules`.
#[derive(Debug, Default, Deserialize)]
pub struct ListParams {
    pub search: Option<String>,
    pub page: Option<i64>,
    pub per_page: Option<i64>,
    /// `all | enabled | disabled | quantity | bundle`
    pub filter: Option<String>,
}

/// `?kind=` selector of delete and enable/disable.
#[derive(Debug, Default, Deserialize)]
pub struct KindParams {
    pub kind: Option<String>,
}

impl KindParams {
    fn kind(&self) -> ApiResult<Option<RuleKind>> {
        Ok(self.kind.as_deref().map(parse_kind).transpose()?)
    }
}

/// GET /api/v1/rules
///
/// Pages through owners with rules, optionally searching by id or title.
pub async fn list_rules(
    State(state): State<AppState>,
    Query(params): Query<ListParams>,
) -> ApiResult<impl IntoResponse> {
    let filter = params.filter.as_deref().map(parse_filter).transpose()?;
    let page = normalize_page(params.page, params.per_page, state.config.max_page_size);
    let result = state
        .db
        .rules()
        .list(
            page,
            params.search.as_deref(),
            filter.unwrap_or_default(),
            state.catalog.as_ref(),
        )
        .await?;

    Ok(Json(result))
}

/// GET /api/v1/rules/summary
pub async fn rules_summary(State(state): State<AppState>) -> ApiResult<impl IntoResponse> {
    let summary = state.db.rules().summary().await?;
    Ok(Json(summary))
}

/// GET /api/v1/rules/{owner_id}
pub async fn get_rules(
    State(state): State<AppState>,
    Path(owner_id): Path<ProductId>,
) -> ApiResult<impl IntoResponse> {
    let rules = state
        .db
        .rules()
        .get_by_owner(owner_id)
        .await?
        .ok_or(CoreError::RuleNotFound(owner_id))?;

    Ok(Json(rules))
}

/// PUT /api/v1/rules/{owner_id}
///
/// Creates or replaces the owner's tier config or bundle.
pub async fn put_rules(
    State(state): State<AppState>,
    Path(owner_id): Path<ProductId>,
    Json(draft): Json<RuleDraft>,
) -> ApiResult<impl IntoResponse> {
    let spec = classify(owner_id, &draft)?;
    let kind = spec.kind();

    let outcome = state
        .db
        .rules()
        .upsert(owner_id, spec, state.catalog.as_ref())
        .await?;

    info!(owner_id = %owner_id, kind = kind.as_str(), "Rule saved");
    Ok(Json(outcome))
}

/// DELETE /api/v1/rules/{owner_id}?kind=
///
/// Deleting a bundle removes it from every product that shares it.
pub async fn delete_rules(
    State(state): State<AppState>,
    Path(owner_id): Path<ProductId>,
    Query(params): Query<KindParams>,
) -> ApiResult<impl IntoResponse> {
    let outcome = state.db.rules().delete_by_owner(owner_id, params.kind()?).await?;

    info!(owner_id = %owner_id, affected = outcome.affected.len(), "Rule deleted");
    Ok(Json(outcome))
}

/// POST /api/v1/rules/{owner_id}/enable?kind=
pub async fn enable_rules(
    State(state): State<AppState>,
    Path(owner_id): Path<ProductId>,
    Query(params): Query<KindParams>,
) -> ApiResult<impl IntoResponse> {
    let outcome = state.db.rules().set_enabled(owner_id, params.kind()?, true).await?;
    Ok(Json(outcome))
}

/// POST /api/v1/rules/{owner_id}/disable?kind=
///
/// Switches rules off without touching tiers or bundle members, so a later
/// enable restores them as they were.
pub async fn disable_rules(
    State(state): State<AppState>,
    Path(owner_id): Path<ProductId>,
    Query(params): Query<KindParams>,
) -> ApiResult<impl IntoResponse> {
    let outcome = state.db.rules().set_enabled(owner_id, params.kind()?, false).await?;
    Ok(Json(outcome))
}
