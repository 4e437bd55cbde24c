//! # Validation Module
//!
//! Input validation utilities for Caja POS.
//!
//! ## Validation Strategy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Validation Layers                                  │
//! │                                                                         │
//! │  Layer 1: Web client                                                   │
//! │  └── Basic form checks, immediate feedback                             │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 2: pos-service (Rust)                                           │
//! │  ├── Type validation (deserialization of mutation arguments)           │
//! │  └── THIS MODULE: field rules (lengths, ranges, DNI/RUC shapes)        │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 3: Database (SQLite)                                            │
//! │  ├── NOT NULL / CHECK (stock >= 0) constraints                         │
//! │  ├── UNIQUE (register_id, ticket_number), (ruc, series, number)        │
//! │  └── Foreign key constraints                                           │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//! ```rust
//! use caja_core::validation::{validate_quantity, validate_ruc};
//!
//! validate_quantity(5).unwrap();
//! validate_ruc("20123456789").unwrap();
//! ```

use crate::error::ValidationError;
use crate::{MAX_AMOUNT_CENTS, MAX_LINE_QUANTITY};

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

// =============================================================================
// String Validators
// =============================================================================

/// Validates a required free-text field and returns it trimmed.
///
/// ## Rules
/// - Must not be empty after trimming
/// - Must not exceed `max` characters
pub fn validate_text(field: &str, value: &str, max: usize) -> ValidationResult<String> {
    let value = value.trim();

    if value.is_empty() {
        return Err(ValidationError::Required {
            field: field.to_string(),
        });
    }

    if value.chars().count() > max {
        return Err(ValidationError::TooLong {
            field: field.to_string(),
            max,
        });
    }

    Ok(value.to_string())
}

/// Validates an identifier argument (register id, sale id, ...).
pub fn validate_id(field: &str, id: &str) -> ValidationResult<()> {
    if id.trim().is_empty() {
        return Err(ValidationError::Required {
            field: field.to_string(),
        });
    }
    Ok(())
}

/// Validates a product name.
///
/// ## Example
/// ```rust
/// use caja_core::validation::validate_product_name;
///
/// assert!(validate_product_name("Inca Kola 500ml").is_ok());
/// assert!(validate_product_name("  ").is_err());
/// ```
pub fn validate_product_name(name: &str) -> ValidationResult<String> {
    validate_text("name", name, 200)
}

/// Validates a search query.
///
/// ## Rules
/// - Can be empty (returns all results)
/// - Maximum 100 characters
///
/// ## Returns
/// The trimmed query string.
pub fn validate_search_query(query: &str) -> ValidationResult<String> {
    let query = query.trim();

    if query.chars().count() > 100 {
        return Err(ValidationError::TooLong {
            field: "query".to_string(),
            max: 100,
        });
    }

    Ok(query.to_string())
}

/// Validates a SUNAT series such as `F001` or `B001`.
///
/// ## Rules
/// - Exactly 4 characters
/// - Uppercase ASCII letters and digits only
pub fn validate_series(field: &str, series: &str) -> ValidationResult<()> {
    let ok = series.len() == 4
        && series
            .chars()
            .all(|c| c.is_ascii_uppercase() || c.is_ascii_digit());

    if !ok {
        return Err(ValidationError::InvalidFormat {
            field: field.to_string(),
            reason: "must be 4 uppercase letters or digits".to_string(),
        });
    }

    Ok(())
}

fn validate_digits(field: &str, value: &str, len: usize) -> ValidationResult<()> {
    if value.len() != len || !value.chars().all(|c| c.is_ascii_digit()) {
        return Err(ValidationError::InvalidFormat {
            field: field.to_string(),
            reason: format!("must be exactly {len} digits"),
        });
    }
    Ok(())
}

/// Validates a DNI (national id): 8 digits.
pub fn validate_dni(field: &str, dni: &str) -> ValidationResult<()> {
    validate_digits(field, dni, 8)
}

/// Validates a RUC (taxpayer id): 11 digits.
///
/// ## Example
/// ```rust
/// use caja_core::validation::validate_ruc;
///
/// assert!(validate_ruc("20123456789").is_ok());
/// assert!(validate_ruc("2012345678").is_err());
/// ```
pub fn validate_ruc(ruc: &str) -> ValidationResult<()> {
    validate_digits("ruc", ruc, 11)
}

// =============================================================================
// Numeric Validators
// =============================================================================

/// Validates a line quantity.
///
/// ## Rules
/// - Must be at least 1
/// - Must not exceed MAX_LINE_QUANTITY
///
/// ## User Workflow
/// ```text
/// ┌─────────────────────────────────────────────────────────────────────────┐
/// │  Cashier types quantity: 5                                             │
/// │       │                                                                 │
/// │       ▼                                                                 │
/// │  validate_quantity(5) ← THIS FUNCTION                                  │
/// │       │                                                                 │
/// │       ├── qty < 1?      → Error: "quantity must be between 1 and 9999" │
/// │       ├── qty > 9999?   → same error                                   │
/// │       └── OK → line accepted, stock check follows                      │
/// └─────────────────────────────────────────────────────────────────────────┘
/// ```
pub fn validate_quantity(qty: i64) -> ValidationResult<()> {
    if !(1..=MAX_LINE_QUANTITY).contains(&qty) {
        return Err(ValidationError::OutOfRange {
            field: "quantity".to_string(),
            min: 1,
            max: MAX_LINE_QUANTITY,
        });
    }

    Ok(())
}

/// Validates a count that may be zero but never negative (stock levels).
///
/// ## Example
/// ```rust
/// use caja_core::validation::validate_non_negative;
///
/// assert!(validate_non_negative("stock", 12).is_ok());
/// assert!(validate_non_negative("stock", 0).is_ok());
/// assert!(validate_non_negative("stock", -1).is_err());
/// ```
pub fn validate_non_negative(field: &str, value: i64) -> ValidationResult<()> {
    if value < 0 {
        return Err(ValidationError::MustNotBeNegative {
            field: field.to_string(),
        });
    }

    Ok(())
}

/// Validates a money amount in céntimos: prices, discounts, opening cash
/// and expenses. Zero is allowed; anything above [`MAX_AMOUNT_CENTS`] is
/// rejected so totals cannot overflow.
///
/// ## Example
/// ```rust
/// use caja_core::validation::validate_amount;
///
/// assert!(validate_amount("unitPriceCents", 1099).is_ok());
/// assert!(validate_amount("unitPriceCents", 0).is_ok());
/// assert!(validate_amount("unitPriceCents", -100).is_err());
/// assert!(validate_amount("unitPriceCents", i64::MAX).is_err());
/// ```
pub fn validate_amount(field: &str, cents: i64) -> ValidationResult<()> {
    validate_non_negative(field, cents)?;
    if cents > MAX_AMOUNT_CENTS {
        return Err(ValidationError::OutOfRange {
            field: field.to_string(),
            min: 0,
            max: MAX_AMOUNT_CENTS,
        });
    }

    Ok(())
}

// =============================================================================
// Unit Tests
// =============================================================================
