//! # Error Types
//!
//! Domain-specific error types for caja-core.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Error Types                                     │
//! │                                                                         │
//! │  caja-core errors (this file)                                          │
//! │  ├── CoreError        - Business rule violations                       │
//! │  └── ValidationError  - Input validation failures                      │
//! │                                                                         │
//! │  caja-db errors (separate crate)                                       │
//! │  └── DbError          - Database failures, wraps CoreError             │
//! │                                                                         │
//! │  pos-service errors (in app)                                           │
//! │  └── ApiError         - What the web client sees ({code, message})     │
//! │                                                                         │
//! │  Flow: ValidationError → CoreError → DbError → ApiError → Client       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Design Principles
//! 1. Use `thiserror` for derive macros (not manual impl)
//! 2. Include context in error messages (register id, product name, ...)
//! 3. Errors are enum variants, never String
//! 4. Each error variant maps to a user-facing message

use thiserror::Error;

// =============================================================================
// Core Error
// =============================================================================

/// Core business logic errors.
///
/// Missing rows are reported by the database layer; everything here is a
/// rule that the data, once loaded, violates.
#[derive(Debug, Error)]
pub enum CoreError {
    /// The register is not in `APERTURA`.
    ///
    /// ## When This Occurs
    /// - Closing a register that is already closed
    /// - Ringing up a sale on a closed register
    #[error("Register {register_id} is not open (status {status})")]
    RegisterNotOpen { register_id: String, status: String },

    /// Insufficient stock to complete sale.
    ///
    /// ## User Workflow
    /// ```text
    /// Ticket has 5 × "Arroz 1kg"
    ///      │
    ///      ▼
    /// Check stock: available=3
    ///      │
    ///      ▼
    /// InsufficientStock { product: "Arroz 1kg", available: 3, requested: 5 }
    ///      │
    ///      ▼
    /// Cashier sees: "Stock insuficiente para producto Arroz 1kg"
    /// ```
    #[error("Insufficient stock for {product}: available {available}, requested {requested}")]
    InsufficientStock {
        product: String,
        available: i64,
        requested: i64,
    },

    /// Sale is not in a state that allows the requested operation.
    ///
    /// ## When This Occurs
    /// - Voiding a sale that is already `CANCELADA`
    /// - Emitting an invoice for a voided sale
    #[error("Sale {sale_id} is {current_status}, cannot perform operation")]
    InvalidSaleStatus {
        sale_id: String,
        current_status: String,
    },

    /// A sale needs at least one line.
    #[error("Sale must contain at least one item")]
    EmptySale,

    /// Sale has exceeded maximum allowed lines.
    #[error("Sale cannot have more than {max} items")]
    TooManyItems { max: usize },

    /// Discount is larger than what is being sold.
    #[error("Discount {discount} exceeds subtotal {subtotal}")]
    DiscountExceedsSubtotal { discount: i64, subtotal: i64 },

    /// The site's SUNAT configuration is switched off.
    #[error("SUNAT configuration for site {site_id} is inactive")]
    TaxConfigInactive { site_id: String },

    /// The SUNAT configuration lacks issuer data required on every invoice.
    #[error("SUNAT configuration for site {site_id} is missing {field}")]
    MissingIssuerData { site_id: String, field: String },

    /// Validation error (wraps ValidationError).
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),
}

// =============================================================================
// Validation Error
// =============================================================================

/// Input validation errors.
///
/// These errors occur when user input doesn't meet requirements.
/// Used for early validation before business logic runs.
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

    /// Value must not be negative.
    #[error("{field} must not be negative")]
    MustNotBeNegative { field: String },

    /// Invalid format (e.g., invalid UUID, DNI with letters).
    #[error("{field} has invalid format: {reason}")]
    InvalidFormat { field: String, reason: String },

    /// Value is not in allowed set.
    #[error("{field} must be one of: {allowed:?}")]
    NotAllowed { field: String, allowed: Vec<String> },
}

impl ValidationError {
    /// Shorthand for [`ValidationError::NotAllowed`] over string literals.
    pub fn not_allowed(field: &str, allowed: &[&str]) -> Self {
        ValidationError::NotAllowed {
            field: field.to_string(),
            allowed: allowed.iter().map(|s| s.to_string()).collect(),
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
