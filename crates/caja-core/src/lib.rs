//! # caja-core: Pure Business Logic for Caja POS
//!
//! This crate holds every business rule of the POS backend as plain
//! functions and types, with zero I/O dependencies.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Caja POS Architecture                            │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                    Web client (POS, Caja, Ventas, CE pages)     │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │ POST /mutations                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │                    pos-service (axum)                           │   │
//! │  │    abrirCaja, cerrarCaja, crearPOSVentaConDetalles, ...        │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │                caja-db (transactions, repositories)             │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │ asks for every decision               │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │               ★ caja-core (THIS CRATE) ★                        │   │
//! │  │                                                                 │   │
//! │  │   types · money · register · sale · ticket · invoice · retry    │   │
//! │  │                                                                 │   │
//! │  │   NO I/O • NO DATABASE • NO NETWORK • PURE FUNCTIONS           │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`catalog`] - Admin payloads (sites, products, registers)
//! - [`types`] - Domain entities (Product, Register, Sale, Invoice, ...)
//! - [`money`] - Money type with integer céntimos (no floating point!)
//! - [`error`] - Domain error types
//! - [`validation`] - Input validation rules
//! - [`register`] - Cash register state machine
//! - [`sale`] - Sale inputs, totals and stock checks
//! - [`ticket`] - Per-register ticket numbering
//! - [`invoice`] - SUNAT series / correlative selection, receiver rules
//! - [`retry`] - Retry schedule for the SUNAT submission queue
//!
//! ## Example Usage
//!
//! ```rust
//! use caja_core::money::Money;
//! use caja_core::ticket::next_ticket_number;
//!
//! let price = Money::from_cents(1050); // S/ 10.50
//! assert_eq!((price * 2).cents(), 2100);
//!
//! let next = next_ticket_number(["00000001", "00000007"]);
//! assert_eq!(next, "00000008");
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod catalog;
pub mod error;
pub mod invoice;
pub mod money;
pub mod register;
pub mod retry;
pub mod sale;
pub mod ticket;
pub mod types;
pub mod validation;

// =============================================================================
// Re-exports for Convenience
// =============================================================================

pub use error::{CoreError, CoreResult, ValidationError};
pub use money::Money;
pub use types::*;

// =============================================================================
// Crate-Level Constants
// =============================================================================

/// Width of a sale ticket number (`00000001`).
pub const TICKET_WIDTH: usize = 8;

/// Maximum lines allowed in a single sale.
pub const MAX_SALE_LINES: usize = 200;

/// Maximum quantity of a single line.
///
/// ## Business Reason
/// Catches typing accidents (1000 instead of 10) before stock is touched.
pub const MAX_LINE_QUANTITY: i64 = 9_999;

/// Largest amount accepted for a single price, discount, float or expense
/// (S/ 1,000,000,000.00).
///
/// With [`MAX_SALE_LINES`] and [`MAX_LINE_QUANTITY`] a sale total stays far
/// below `i64::MAX` céntimos.
pub const MAX_AMOUNT_CENTS: i64 = 100_000_000_000;

/// Largest stock a product may hold, and largest single stock adjustment.
pub const MAX_STOCK: i64 = 1_000_000_000;

/// Reason recorded on a voided sale when the caller gives none.
pub const DEFAULT_VOID_REASON: &str = "Anulación solicitada";

/// Fallback boleta series when a tax configuration leaves it blank.
pub const DEFAULT_BOLETA_SERIES: &str = "B001";

/// Fallback factura series when a tax configuration leaves it blank.
pub const DEFAULT_FACTURA_SERIES: &str = "F001";

/// Currency of every amount in the system.
pub const CURRENCY_PEN: &str = "PEN";
