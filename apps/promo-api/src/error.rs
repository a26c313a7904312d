//! # API Error Type
//!
//! Unified error type for HTTP handlers.
//!
//! ## Error Handling Strategy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Error Flow in the Promo API                          │
//! │                                                                         │
//! │  Handler                                                                │
//! │  ApiResult<T>                                                           │
//! │     │                                                                   │
//! │     ├── ValidationError ─────────────► 400 VALIDATION_ERROR (+reason)   │
//! │     ├── CoreError::RuleNotFound ─────► 404 NOT_FOUND                    │
//! │     ├── CoreError::UnknownProducts ──► 400 VALIDATION_ERROR             │
//! │     ├── DbError::UniqueViolation ────► 409 CONFLICT                     │
//! │     ├── CartError ───────────────────► 404 / 400                        │
//! │     ├── DbError::NotFound ───────────► 404 NOT_FOUND                    │
//! │     ├── DbError::* (other) ──────────► 500 DATABASE_ERROR (logged)      │
//! │     └── anything else ───────────────► 500 INTERNAL (logged)            │
//! │                                                                         │
//! │  Body: { "error": "<message>", "code": "<CODE>", "reason"?: "<why>" }   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Internal details are logged, never returned.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

use promo_core::{CoreError, ValidationError};
use promo_db::DbError;

use crate::state::CartError;

/// Convenience type alias for handler return values.
pub type ApiResult<T> = Result<T, ApiError>;

/// API error returned from handlers.
///
/// ## Serialization
/// ```json
/// {
///   "error": "Rule not found: 42",
///   "code": "NOT_FOUND"
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiError {
    /// Machine-readable error code for programmatic handling
    pub code: ErrorCode,

    /// Human-readable error message for display
    pub message: String,

    /// Validation reason code, when there is one
    pub reason: Option<&'static str>,
}

/// Error codes for API responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    /// Resource not found (404)
    NotFound,

    /// Input validation failed (400)
    ValidationError,

    /// Database operation failed (500)
    DatabaseError,

    /// Request contradicts stored state (409)
    Conflict,

    /// Internal server error (500)
    Internal,
}

impl ErrorCode {
    pub fn status(&self) -> StatusCode {
        match self {
            ErrorCode::NotFound => StatusCode::NOT_FOUND,
            ErrorCode::ValidationError => StatusCode::BAD_REQUEST,
            ErrorCode::Conflict => StatusCode::CONFLICT,
            ErrorCode::DatabaseError | ErrorCode::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl ApiError {
    /// Creates a new API error.
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        ApiError {
            code,
            message: message.into(),
            reason: None,
        }
    }

    /// Creates a not found error.
    pub fn not_found(resource: &str, id: impl std::fmt::Display) -> Self {
        ApiError::new(ErrorCode::NotFound, format!("{} not found: {}", resource, id))
    }

    /// Creates a validation error.
    pub fn validation(message: impl Into<String>) -> Self {
        ApiError::new(ErrorCode::ValidationError, message)
    }

    /// Creates an internal error. The message is logged, not returned.
    pub fn internal(message: impl Into<String>) -> Self {
        let message = message.into();
        tracing::error!(error = %message, "Internal error");
        ApiError::new(ErrorCode::Internal, "An internal error occurred")
    }

    fn with_reason(mut self, reason: &'static str) -> Self {
        self.reason = Some(reason);
        self
    }
}

#[derive(Serialize)]
struct ErrorBody<'a> {
    error: &'a str,
    code: ErrorCode,
    #[serde(skip_serializing_if = "Option::is_none")]
    reason: Option<&'static str>,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: &self.message,
            code: self.code,
            reason: self.reason,
        };
        (self.code.status(), Json(body)).into_response()
    }
}

impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{:?}] {}", self.code, self.message)
    }
}

impl std::error::Error for ApiError {}

// =============================================================================
// Conversions
// =============================================================================

impl From<ValidationError> for ApiError {
    fn from(err: ValidationError) -> Self {
        let reason = err.reason();
        ApiError::validation(err.to_string()).with_reason(reason)
    }
}

impl From<CoreError> for ApiError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::RuleNotFound(id) => ApiError::not_found("Rule", id),
            CoreError::UnknownProducts(_) => {
                ApiError::validation(err.to_string()).with_reason("unknown_products")
            }
            CoreError::Validation(e) => e.into(),
        }
    }
}

impl From<DbError> for ApiError {
    fn from(err: DbError) -> Self {
        match err {
            DbError::NotFound { entity, id } => ApiError::not_found(&entity, id),
            DbError::UniqueViolation { field, value } => ApiError::new(
                ErrorCode::Conflict,
                format!("{} '{}' already exists", field, value),
            ),
            DbError::ForeignKeyViolation { message } => {
                tracing::error!("Foreign key violation: {}", message);
                ApiError::validation("Invalid reference")
            }
            DbError::Core(core) => core.into(),
            DbError::ConnectionFailed(e) => {
                tracing::error!("Database connection failed: {}", e);
                ApiError::new(ErrorCode::DatabaseError, "Database connection failed")
            }
            DbError::PoolExhausted => {
                ApiError::new(ErrorCode::DatabaseError, "Database pool exhausted")
            }
            other => {
                tracing::error!(error = %other, "Database operation failed");
                ApiError::new(ErrorCode::DatabaseError, "Database operation failed")
            }
        }
    }
}

impl From<CartError> for ApiError {
    fn from(err: CartError) -> Self {
        match err {
            CartError::LineNotFound(id) => ApiError::not_found("Cart line", id),
            CartError::QuantityTooLarge { .. } => {
                ApiError::validation(err.to_string()).with_reason("quantity_too_large")
            }
            CartError::TooManyLines { .. } => {
                ApiError::validation(err.to_string()).with_reason("too_many_lines")
            }
        }
    }
}
