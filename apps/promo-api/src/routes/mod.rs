pub mod health;

use axum::routing::{get, patch, post};
use axum::Router;

use crate::handlers::{cart, products, rules};
use crate::state::AppState;

/// Build the `/api/v1` route tree.
///
/// ```text
/// GET    /rules                          -> list_rules
/// GET    /rules/summary                  -> rules_summary
/// GET    /rules/{owner_id}               -> get_rules
/// PUT    /rules/{owner_id}               -> put_rules
/// DELETE /rules/{owner_id}?kind=         -> delete_rules
/// POST   /rules/{owner_id}/enable?kind=  -> enable_rules
/// POST   /rules/{owner_id}/disable?kind= -> disable_rules
///
/// GET    /products/{id}/recommendations  -> recommendations
///
/// GET    /cart                           -> get_cart
/// DELETE /cart                           -> clear_cart
/// POST   /cart/items                     -> add_item
/// PATCH  /cart/items/{line_id}           -> update_item
/// DELETE /cart/items/{line_id}           -> remove_item
/// POST   /cart/bundles                   -> add_bundle
/// ```
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .nest("/rules", rules_router())
        .route("/products/{id}/recommendations", get(products::recommendations))
        .nest("/cart", cart_router())
}

fn rules_router() -> Router<AppState> {
    Router::new()
        .route("/", get(rules::list_rules))
        .route("/summary", get(rules::rules_summary))
        .route(
            "/{owner_id}",
            get(rules::get_rules)
                .put(rules::put_rules)
                .delete(rules::delete_rules),
        )
        .route("/{owner_id}/enable", post(rules::enable_rules))
        .route("/{owner_id}/disable", post(rules::disable_rules))
}

fn cart_router() -> Router<AppState> {
    Router::new()
        .route("/", get(cart::get_cart).delete(cart::clear_cart))
        .route("/items", post(cart::add_item))
        .route(
            "/items/{line_id}",
            patch(cart::update_item).delete(cart::remove_item),
        )
        .route("/bundles", post(cart::add_bundle))
}
