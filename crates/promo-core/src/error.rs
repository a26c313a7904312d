//! # Error Types
//!
//! Domain-specific error types for promo-core.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Error Types                                     │
//! │                                                                         │
//! │  promo-core errors (this file)                                         │
//! │  ├── CoreError        - Rule-store level domain errors                 │
//! │  └── ValidationError  - Rule payload validation failures               │
//! │                                                                         │
//! │  promo-db errors (separate crate)                                      │
//! │  └── DbError          - Database operation failures (wraps CoreError)  │
//! │                                                                         │
//! │  promo-api errors (in app)                                             │
//! │  └── ApiError         - What HTTP clients see                          │
//! │                                                                         │
//! │  Flow: ValidationError → CoreError → DbError → ApiError → Client       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The pricing path never returns these: it fails open to the base price.

use thiserror::Error;

use crate::types::ProductId;

// =============================================================================
// Core Error
// =============================================================================

/// Domain errors raised while managing rules.
#[derive(Debug, Error)]
pub enum CoreError {
    /// No rule of any kind is configured for the owner.
    #[error("No discount rule configured for product {0}")]
    RuleNotFound(ProductId),

    /// One or more referenced products are unknown to the catalog.
    ///
    /// ## When This Occurs
    /// - A bundle lists a product id that was deleted from the catalog
    /// - A tier config is written for an id that never existed
    #[error("Unknown product ids: {0:?}")]
    UnknownProducts(Vec<ProductId>),

    /// Validation error (wraps ValidationError).
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),
}

// =============================================================================
// Validation Error
// =============================================================================

/// Rule payload validation errors.
///
/// Always client errors. Raised before any write happens.
#[derive(Debug, Error)]
pub enum ValidationError {
    /// A required field is missing or empty.
    #[error("{field} is required")]
    Required { field: String },

    /// Field value is too long.
    #[error("{field} must be at most {max} characters")]
    TooLong { field: String, max: usize },

    /// Numeric value is out of range.
    #[error("{field} must be between {min} and {max}")]
    OutOfRange { field: String, min: i64, max: i64 },

    /// Discount rate outside the accepted interval.
    #[error("{field} must be greater than 0 and at most {max}, got {value}")]
    RateOutOfRange { field: String, value: f64, max: f64 },

    /// Collection has fewer distinct entries than required.
    #[error("{field} needs at least {min} distinct entries, got {actual}")]
    TooFewItems {
        field: String,
        min: usize,
        actual: usize,
    },

    /// Entries of one list are missing from another.
    #[error("{field} contains ids not in {superset}: {missing:?}")]
    NotSubset {
        field: String,
        superset: String,
        missing: Vec<ProductId>,
    },

    /// Invalid format or shape.
    #[error("{field} has invalid format: {reason}")]
    InvalidFormat { field: String, reason: String },

    /// Value is not in allowed set.
    #[error("{field} must be one of: {allowed:?}")]
    NotAllowed { field: String, allowed: Vec<String> },

    /// Duplicate value inside one payload.
    #[error("duplicate {field} '{value}'")]
    Duplicate { field: String, value: String },
}

impl ValidationError {
    /// Short machine-readable reason code, returned next to the message.
    pub fn reason(&self) -> &'static str {
        match self {
            ValidationError::Required { .. } => "required",
            ValidationError::TooLong { .. } => "too_long",
            ValidationError::OutOfRange { .. } => "out_of_range",
            ValidationError::RateOutOfRange { .. } => "rate_out_of_range",
            ValidationError::TooFewItems { .. } => "too_few_items",
            ValidationError::NotSubset { .. } => "not_subset",
            ValidationError::InvalidFormat { .. } => "invalid_format",
            ValidationError::NotAllowed { .. } => "not_allowed",
            ValidationError::Duplicate { .. } => "duplicate",
        }
    }
}

// =============================================================================
// Result Type Alias
// =============================================================================

/// Convenience type alias for Results with CoreError.
pub type CoreResult<T> = Result<T, CoreError>;

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let err = CoreError::UnknownProducts(vec![7, 9]);
        assert_eq!(err.to_string(), "Unknown product ids: [7, 9]");

        let err = CoreError::RuleNotFound(42);
        assert_eq!(err.to_string(), "No discount rule configured for product 42");
    }

    #[test]
    fn test_validation_error_messages() {
        let err = ValidationError::TooFewItems {
            field: "product_ids".to_string(),
            min: 2,
            actual: 1,
        };
        assert_eq!(
            err.to_string(),
            "product_ids needs at least 2 distinct entries, got 1"
        );
        assert_eq!(err.reason(), "too_few_items");

        let err = ValidationError::NotSubset {
            field: "main_ids".to_string(),
            superset: "product_ids".to_string(),
            missing: vec![5],
        };
        assert_eq!(err.to_string(), "main_ids contains ids not in product_ids: [5]");
    }

    #[test]
    fn test_validation_converts_to_core_error() {
        let validation_err = ValidationError::Required {
            field: "tiers".to_string(),
        };
        let core_err: CoreError = validation_err.into();
        assert!(matches!(core_err, CoreError::Validation(_)));
    }
}
