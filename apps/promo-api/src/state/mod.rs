//! # State Module
//!
//! Shared application state handed to every handler via `State<AppState>`.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    State Architecture                                   │
//! │                                                                         │
//! │  AppState (Clone, cheap)                                                │
//! │   ├── db          Database (SQLite pool, repositories)                  │
//! │   ├── catalog     Arc<dyn ProductCatalog>                               │
//! │   ├── engine      PricingEngine (currency precision)                    │
//! │   ├── suppressor  Arc<DuplicateSuppressor>  (std Mutex inside)          │
//! │   ├── cart        CartState  (Arc<tokio Mutex<InMemoryCart>>)           │
//! │   └── config      Arc<ServiceConfig>                                    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

mod cart;

use std::sync::Arc;

use promo_core::{DuplicateSuppressor, PricingConfig, PricingEngine};
use promo_db::{Database, ProductCatalog};

use crate::config::ServiceConfig;

pub use cart::{CartError, CartFee, CartItem, CartState, CartView, InMemoryCart};

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    /// Database connection pool.
    pub db: Database,
    /// Product lookups for CRUD validation and cart prices.
    pub catalog: Arc<dyn ProductCatalog>,
    /// Cart pricing pipeline.
    pub engine: PricingEngine,
    /// Guards "add bundle" against double submission.
    pub suppressor: Arc<DuplicateSuppressor>,
    /// The reference cart.
    pub cart: CartState,
    /// Service configuration.
    pub config: Arc<ServiceConfig>,
}

impl AppState {
    /// Builds state around an open database, using its catalog table.
    pub fn new(db: Database, config: ServiceConfig) -> Self {
        let catalog: Arc<dyn ProductCatalog> = Arc::new(db.catalog());
        AppState::with_catalog(db, catalog, config)
    }

    /// Builds state with a custom catalog.
    pub fn with_catalog(db: Database, catalog: Arc<dyn ProductCatalog>, config: ServiceConfig) -> Self {
        let engine = PricingEngine::new(PricingConfig {
            currency_decimals: config.currency_decimals,
        });
        let suppressor = DuplicateSuppressor::new(config.dedupe_window, config.dedupe_capacity);

        AppState {
            db,
            catalog,
            engine,
            suppressor: Arc::new(suppressor),
            cart: CartState::new(),
            config: Arc::new(config),
        }
    }
}
