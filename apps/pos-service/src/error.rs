//! # API Error Type
//!
//! What the web client sees when a request fails.
//!
//! ## Error Handling Strategy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Error Flow in Caja POS                               │
//! │                                                                         │
//! │  ValidationError ──► CoreError ──► DbError ──► ApiError ──► HTTP       │
//! │                                                                         │
//! │  ┌───────────────────────┬─────────────────────────┬────────┐          │
//! │  │ Source                │ code                    │ status │          │
//! │  ├───────────────────────┼─────────────────────────┼────────┤          │
//! │  │ DbError::NotFound     │ NOT_FOUND               │ 404    │          │
//! │  │ ValidationError       │ VALIDATION_ERROR        │ 400    │          │
//! │  │ bad JSON arguments    │ VALIDATION_ERROR        │ 400    │          │
//! │  │ unknown fieldName     │ UNKNOWN_FIELD           │ 400    │          │
//! │  │ CoreError (rules)     │ BUSINESS_RULE           │ 422    │          │
//! │  │ InsufficientStock     │ INSUFFICIENT_STOCK      │ 422    │          │
//! │  │ DbError::Conflict     │ CONFLICT                │ 409    │          │
//! │  │ DbError::Busy         │ CONFLICT                │ 409    │          │
//! │  │ sqlx / pool failures  │ DATABASE_ERROR          │ 500    │          │
//! │  └───────────────────────┴─────────────────────────┴────────┘          │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Database internals are logged with `tracing::error!` and replaced with
//! a generic message before leaving the process.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use caja_core::CoreError;
use caja_db::DbError;
use serde::Serialize;

/// API error returned from every endpoint.
///
/// ## Serialization
/// ```json
/// {
///   "code": "INSUFFICIENT_STOCK",
///   "message": "Insufficient stock for Arroz 1kg: available 3, requested 5"
/// }
/// ```
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiError {
    /// Machine-readable error code for programmatic handling
    pub code: ErrorCode,

    /// Human-readable error message for display
    pub message: String,
}

/// Error codes for API responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    /// Resource not found (404)
    NotFound,

    /// Input validation failed (400)
    ValidationError,

    /// `fieldName` names no mutation (400)
    UnknownField,

    /// Business rule rejected the request (422)
    BusinessRule,

    /// Not enough stock for a sale line (422)
    InsufficientStock,

    /// Row changed concurrently (409)
    Conflict,

    /// Database operation failed (500)
    DatabaseError,

    /// Internal server error (500)
    Internal,
}

impl ErrorCode {
    /// HTTP status for this code.
    pub fn status(self) -> StatusCode {
        match self {
            ErrorCode::NotFound => StatusCode::NOT_FOUND,
            ErrorCode::ValidationError | ErrorCode::UnknownField => StatusCode::BAD_REQUEST,
            ErrorCode::BusinessRule | ErrorCode::InsufficientStock => {
                StatusCode::UNPROCESSABLE_ENTITY
            }
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
        }
    }

    /// Creates a not found error.
    pub fn not_found(resource: &str, id: &str) -> Self {
        ApiError::new(
            ErrorCode::NotFound,
            format!("{} not found: {}", resource, id),
        )
    }

    /// Creates a validation error.
    pub fn validation(message: impl Into<String>) -> Self {
        ApiError::new(ErrorCode::ValidationError, message)
    }

    /// Creates an unknown mutation error.
    pub fn unknown_field(name: &str) -> Self {
        ApiError::new(ErrorCode::UnknownField, format!("Unknown field {}", name))
    }

    /// Creates an internal error.
    pub fn internal(message: impl Into<String>) -> Self {
        ApiError::new(ErrorCode::Internal, message)
    }
}

/// Converts database errors to API errors.
impl From<DbError> for ApiError {
    fn from(err: DbError) -> Self {
        match err {
            DbError::NotFound { entity, id } => ApiError::not_found(&entity, &id),
            DbError::Conflict { entity, id } => ApiError::new(
                ErrorCode::Conflict,
                format!("{} {} was modified concurrently, retry the request", entity, id),
            ),
            DbError::Busy(e) => {
                tracing::warn!("Database busy: {}", e);
                ApiError::new(ErrorCode::Conflict, "Database is busy, retry the request")
            }
            DbError::UniqueViolation { field, .. } => {
                tracing::warn!(field = %field, "Unique constraint violated");
                ApiError::new(ErrorCode::Conflict, format!("Duplicate {}", field))
            }
            DbError::ForeignKeyViolation { message } => {
                tracing::error!("Foreign key violation: {}", message);
                ApiError::validation("Invalid reference")
            }
            DbError::Domain(core) => core.into(),
            DbError::ConnectionFailed(e) => {
                tracing::error!("Database connection failed: {}", e);
                ApiError::new(ErrorCode::DatabaseError, "Database connection failed")
            }
            DbError::MigrationFailed(e) => {
                tracing::error!("Database migration failed: {}", e);
                ApiError::new(ErrorCode::DatabaseError, "Database migration failed")
            }
            DbError::QueryFailed(e) => {
                // Log the actual error but return a generic message
                tracing::error!("Database query failed: {}", e);
                ApiError::new(ErrorCode::DatabaseError, "Database operation failed")
            }
            DbError::PoolExhausted => {
                ApiError::new(ErrorCode::DatabaseError, "Database pool exhausted")
            }
            DbError::Internal(e) => {
                tracing::error!("Internal database error: {}", e);
                ApiError::new(ErrorCode::DatabaseError, "Database operation failed")
            }
        }
    }
}

/// Converts core errors to API errors.
impl From<CoreError> for ApiError {
    fn from(err: CoreError) -> Self {
        match &err {
            CoreError::Validation(e) => ApiError::validation(e.to_string()),
            CoreError::InsufficientStock { .. } => {
                ApiError::new(ErrorCode::InsufficientStock, err.to_string())
            }
            CoreError::EmptySale
            | CoreError::TooManyItems { .. }
            | CoreError::DiscountExceedsSubtotal { .. } => ApiError::validation(err.to_string()),
            CoreError::RegisterNotOpen { .. }
            | CoreError::InvalidSaleStatus { .. }
            | CoreError::TaxConfigInactive { .. }
            | CoreError::MissingIssuerData { .. } => {
                ApiError::new(ErrorCode::BusinessRule, err.to_string())
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.code.status(), Json(self)).into_response()
    }
}

impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{:?}] {}", self.code, self.message)
    }
}

impl std::error::Error for ApiError {}

/// Result type for handlers.
pub type ApiResult<T> = Result<T, ApiError>;
