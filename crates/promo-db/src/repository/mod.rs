//! # Repository Module
//!
//! Database repository implementations for the Promo Engine.
//!
//! ## Repository Pattern
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Repositories and their tables                        │
//! │                                                                         │
//! │  HTTP handler                                                          │
//! │       │                                                                 │
//! │       │  db.rules().upsert(owner_id, spec, &catalog)                   │
//! │       ▼                                                                 │
//! │  RuleRepository ─────────┬──► rules, bundle_groups, rule_index         │
//! │                          └──► product_promo_meta (same transaction)    │
//! │                                                                         │
//! │  MetaRepository ─────────────► product_promo_meta (pricing reads)      │
//! │                                                                         │
//! │  CatalogRepository ──────────► products                                │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Available Repositories
//!
//! - [`rules::RuleRepository`] - Tier configs, bundle groups, listing
//! - [`meta::MetaRepository`] - Per-product pricing projection
//! - [`catalog::CatalogRepository`] - Product catalog (and the [`catalog::ProductCatalog`] seam)

pub mod catalog;
pub mod meta;
pub mod rules;
