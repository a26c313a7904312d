//! # Promo API
//!
//! HTTP service over the promo engine: rule management for admins, bundle
//! recommendations for the storefront, and a reference cart that shows the
//! pricing engine at work.
//!
//! ## Module Organization
//! ```text
//! promo_api/
//! ├── lib.rs          ◄─── You are here (router assembly)
//! ├── main.rs         ◄─── Startup: tracing, config, database, serve
//! ├── config.rs       ◄─── ServiceConfig (env driven)
//! ├── error.rs        ◄─── ApiError → JSON error responses
//! ├── state/
//! │   ├── mod.rs      ◄─── AppState
//! │   └── cart.rs     ◄─── In-memory cart implementing `Cart`
//! ├── handlers/       ◄─── rules, products, cart
//! └── routes/         ◄─── /api/v1 tree + /health
//! ```
//!
//! ## Request Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  PUT /api/v1/rules/{id}                                                 │
//! │     └── classify draft ──► RuleRepository::upsert (one transaction)     │
//! │                                 └── product_promo_meta rewritten        │
//! │                                                                         │
//! │  POST /api/v1/cart/items                                                │
//! │     └── catalog price ──► cart mutation ──► load_snapshot ──► reprice   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

pub mod config;
pub mod error;
pub mod handlers;
pub mod routes;
pub mod state;

use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer};
use tracing::Level;

pub use config::ServiceConfig;
pub use error::{ApiError, ApiResult, ErrorCode};
pub use state::AppState;

/// Builds the full application router with its middleware stack.
///
/// Tests call this too, so they exercise the same layers production uses.
pub fn build_app(state: AppState) -> Router {
    Router::new()
        .merge(routes::health::router())
        .nest("/api/v1", routes::api_routes())
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        .layer(CorsLayer::permissive())
        .with_state(state)
}
