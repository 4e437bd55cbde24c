//! # Domain Types
//!
//! Core domain types used throughout Caja POS.
//!
//! ## Type Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Domain Types                                    │
//! │                                                                         │
//! │  Site ──┬── Product (stock, price)                                      │
//! │         ├── Register ──┬── RegisterLog (APERTURA / CIERRE / ...)        │
//! │         │              └── Sale ── SaleLine (PRODUCTO | SERVICIO)       │
//! │         └── TaxConfig (series + correlatives)                          │
//! │                              │                                          │
//! │                              ▼                                          │
//! │                    Invoice ── InvoiceLine                               │
//! │                       │                                                 │
//! │                       ▼                                                 │
//! │               SubmissionEntry (outbound SUNAT queue)                   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Wire Values
//! Type and variant names are English; the values stored in the database
//! and sent over the wire keep the Spanish/SUNAT codes the web client and
//! the tax authority use (`APERTURA`, `COMPLETADA`, `01`, ...).

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::error::ValidationError;
use crate::money::Money;

// =============================================================================
// Wire String Helpers
// =============================================================================

/// Implements `as_str`, `Display` and `FromStr` for an enum whose variants
/// map one-to-one onto wire strings.
macro_rules! wire_strings {
    ($ty:ident, $field:literal, { $($variant:ident => $wire:literal),+ $(,)? }) => {
        impl $ty {
            /// Every value accepted on the wire, in declaration order.
            pub const ALL: &'static [&'static str] = &[$($wire),+];

            /// The stored/wire representation.
            pub const fn as_str(&self) -> &'static str {
                match self {
                    $($ty::$variant => $wire),+
                }
            }
        }

        impl fmt::Display for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $ty {
            type Err = ValidationError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($wire => Ok($ty::$variant),)+
                    _ => Err(ValidationError::not_allowed($field, $ty::ALL)),
                }
            }
        }
    };
}

// =============================================================================
// Site
// =============================================================================

/// A physical branch (sede). Registers, products and the SUNAT
/// configuration all hang off a site.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Site {
    pub id: String,
    pub name: String,
    pub address: Option<String>,
    pub phone: Option<String>,
    /// Taxpayer id of the legal entity running the site.
    pub ruc: Option<String>,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

// =============================================================================
// Product
// =============================================================================

/// Catalog classification of a product.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "SCREAMING_SNAKE_CASE"))]
#[ts(export)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ProductType {
    /// Kitchen input (ingredients, packaging).
    Insumo,
    /// Shelf grocery item.
    Abarrote,
}

wire_strings!(ProductType, "productType", { Insumo => "INSUMO", Abarrote => "ABARROTE" });

/// A product available for sale at one site.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Product {
    /// Unique identifier (UUID v4).
    pub id: String,

    /// Site that stocks this product.
    pub site_id: String,

    /// Display name shown to the cashier and on the ticket.
    pub name: String,

    pub product_type: Option<ProductType>,

    /// Units on hand. A sale never drives this below zero.
    pub stock: i64,

    /// Price in céntimos, IGV included.
    pub price_cents: i64,

    /// Optimistic-concurrency counter, bumped on every write.
    pub version: i64,

    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,

    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

impl Product {
    /// Returns the price as a Money type.
    #[inline]
    pub fn price(&self) -> Money {
        Money::from_cents(self.price_cents)
    }

    /// Checks if `quantity` units can be taken from stock.
    #[inline]
    pub fn can_sell(&self, quantity: i64) -> bool {
        self.stock >= quantity
    }
}

// =============================================================================
// Register (Caja)
// =============================================================================

/// Lifecycle status of a cash register.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[ts(export)]
pub enum RegisterStatus {
    /// Open for business; sales may be rung up.
    #[serde(rename = "APERTURA")]
    #[cfg_attr(feature = "sqlx", sqlx(rename = "APERTURA"))]
    Open,
    /// Closed; no sales accepted.
    #[serde(rename = "CIERRE")]
    #[cfg_attr(feature = "sqlx", sqlx(rename = "CIERRE"))]
    Closed,
}

wire_strings!(RegisterStatus, "status", { Open => "APERTURA", Closed => "CIERRE" });

impl Default for RegisterStatus {
    fn default() -> Self {
        RegisterStatus::Closed
    }
}

/// A cash register (caja) at a site.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Register {
    pub id: String,
    pub site_id: String,
    pub status: RegisterStatus,
    #[ts(as = "Option<String>")]
    pub opened_at: Option<DateTime<Utc>>,
    #[ts(as = "Option<String>")]
    pub closed_at: Option<DateTime<Utc>>,
    /// Cash placed in the drawer when the register was last opened.
    pub opening_amount_cents: i64,
    /// Cash taken out of the drawer during the shift.
    pub expenses_cents: i64,
    pub assigned_user_id: Option<String>,
    pub version: i64,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

/// Kind of event recorded in a register log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[ts(export)]
pub enum RegisterOperation {
    #[serde(rename = "APERTURA")]
    #[cfg_attr(feature = "sqlx", sqlx(rename = "APERTURA"))]
    Open,
    #[serde(rename = "CIERRE")]
    #[cfg_attr(feature = "sqlx", sqlx(rename = "CIERRE"))]
    Close,
    #[serde(rename = "PAUSA")]
    #[cfg_attr(feature = "sqlx", sqlx(rename = "PAUSA"))]
    Pause,
    #[serde(rename = "REANUDACION")]
    #[cfg_attr(feature = "sqlx", sqlx(rename = "REANUDACION"))]
    Resume,
}

wire_strings!(RegisterOperation, "operation", {
    Open => "APERTURA",
    Close => "CIERRE",
    Pause => "PAUSA",
    Resume => "REANUDACION",
});

/// Append-only audit entry of a register event (CajaRegistro).
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct RegisterLog {
    pub id: String,
    pub register_id: String,
    pub user_id: Option<String>,
    pub operation: RegisterOperation,
    pub initial_amount_cents: i64,
    pub final_amount_cents: i64,
    pub notes: Option<String>,
    #[ts(as = "String")]
    pub recorded_at: DateTime<Utc>,
}

// =============================================================================
// Sale Status
// =============================================================================

/// The status of a sale.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[ts(export)]
pub enum SaleStatus {
    /// Rung up and paid.
    #[serde(rename = "COMPLETADA")]
    #[cfg_attr(feature = "sqlx", sqlx(rename = "COMPLETADA"))]
    Completed,
    /// Voided; stock was restored.
    #[serde(rename = "CANCELADA")]
    #[cfg_attr(feature = "sqlx", sqlx(rename = "CANCELADA"))]
    Cancelled,
}

wire_strings!(SaleStatus, "status", { Completed => "COMPLETADA", Cancelled => "CANCELADA" });

impl Default for SaleStatus {
    fn default() -> Self {
        SaleStatus::Completed
    }
}

// =============================================================================
// Payment Method
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[ts(export)]
pub enum PaymentMethod {
    #[serde(rename = "EFECTIVO")]
    #[cfg_attr(feature = "sqlx", sqlx(rename = "EFECTIVO"))]
    Cash,
    #[serde(rename = "TARJETA")]
    #[cfg_attr(feature = "sqlx", sqlx(rename = "TARJETA"))]
    Card,
    #[serde(rename = "YAPE")]
    #[cfg_attr(feature = "sqlx", sqlx(rename = "YAPE"))]
    Yape,
    #[serde(rename = "PLIN")]
    #[cfg_attr(feature = "sqlx", sqlx(rename = "PLIN"))]
    Plin,
    #[serde(rename = "TRANSFERENCIA")]
    #[cfg_attr(feature = "sqlx", sqlx(rename = "TRANSFERENCIA"))]
    Transfer,
}

wire_strings!(PaymentMethod, "paymentMethod", {
    Cash => "EFECTIVO",
    Card => "TARJETA",
    Yape => "YAPE",
    Plin => "PLIN",
    Transfer => "TRANSFERENCIA",
});

impl Default for PaymentMethod {
    fn default() -> Self {
        PaymentMethod::Cash
    }
}

// =============================================================================
// Sale
// =============================================================================

/// A sale rung up on a register (POSVenta).
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Sale {
    pub id: String,
    /// 8-digit zero-padded, unique per register.
    pub ticket_number: String,
    pub register_id: String,
    pub seller_user_id: String,
    pub customer_name: Option<String>,
    pub customer_dni: Option<String>,
    pub subtotal_cents: i64,
    pub discount_cents: i64,
    /// Always 0: prices already include IGV.
    pub igv_cents: i64,
    pub total_cents: i64,
    pub payment_method: PaymentMethod,
    pub status: SaleStatus,
    pub notes: Option<String>,
    #[ts(as = "String")]
    pub sold_at: DateTime<Utc>,
    #[ts(as = "Option<String>")]
    pub modified_at: Option<DateTime<Utc>>,
    pub version: i64,
}

impl Sale {
    #[inline]
    pub fn total(&self) -> Money {
        Money::from_cents(self.total_cents)
    }
}

/// Whether a line sells stock or a free-text service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[ts(export)]
pub enum ItemType {
    #[serde(rename = "PRODUCTO")]
    #[cfg_attr(feature = "sqlx", sqlx(rename = "PRODUCTO"))]
    Product,
    #[serde(rename = "SERVICIO")]
    #[cfg_attr(feature = "sqlx", sqlx(rename = "SERVICIO"))]
    Service,
}

wire_strings!(ItemType, "itemType", { Product => "PRODUCTO", Service => "SERVICIO" });

/// A line of a sale (POSVentaDetalle).
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct SaleLine {
    pub id: String,
    pub sale_id: String,
    pub item_type: ItemType,
    /// Null for services.
    pub product_id: Option<String>,
    pub description: String,
    pub quantity: i64,
    pub unit_price_cents: i64,
    /// quantity × unit_price_cents
    pub subtotal_cents: i64,
}

impl SaleLine {
    /// Product whose stock this line moved, if any.
    pub fn stocked_product(&self) -> Option<&str> {
        match self.item_type {
            ItemType::Product => self.product_id.as_deref(),
            ItemType::Service => None,
        }
    }
}

/// A sale together with its lines, as returned by the mutations.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct SaleDetail {
    pub sale: Sale,
    pub lines: Vec<SaleLine>,
}

// =============================================================================
// SUNAT Configuration
// =============================================================================

/// SUNAT endpoint family the site submits to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[ts(export)]
pub enum SunatEnvironment {
    #[serde(rename = "CERTIFICACION")]
    #[cfg_attr(feature = "sqlx", sqlx(rename = "CERTIFICACION"))]
    Certification,
    #[serde(rename = "PRODUCCION")]
    #[cfg_attr(feature = "sqlx", sqlx(rename = "PRODUCCION"))]
    Production,
}

wire_strings!(SunatEnvironment, "environment", {
    Certification => "CERTIFICACION",
    Production => "PRODUCCION",
});

impl Default for SunatEnvironment {
    fn default() -> Self {
        SunatEnvironment::Certification
    }
}

/// Per-site electronic invoicing setup (ConfiguracionSUNAT).
///
/// Holds the two correlative counters. They are only ever incremented
/// atomically by the database layer while an invoice is inserted.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct TaxConfig {
    pub site_id: String,
    pub boleta_series: String,
    pub factura_series: String,
    pub last_boleta_number: i64,
    pub last_factura_number: i64,
    pub environment: SunatEnvironment,
    pub issuer_ruc: Option<String>,
    pub issuer_legal_name: Option<String>,
    pub issuer_address: Option<String>,
    pub issuer_ubigeo: Option<String>,
    /// Opaque reference to the signing certificate in a secret store.
    pub certificate_ref: Option<String>,
    pub sunat_endpoint: Option<String>,
    pub sunat_user: Option<String>,
    pub active: bool,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

// =============================================================================
// Invoice (Comprobante Electrónico)
// =============================================================================

/// SUNAT document type (catálogo 01).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[ts(export)]
pub enum InvoiceType {
    #[serde(rename = "01")]
    #[cfg_attr(feature = "sqlx", sqlx(rename = "01"))]
    Factura,
    #[serde(rename = "03")]
    #[cfg_attr(feature = "sqlx", sqlx(rename = "03"))]
    Boleta,
    #[serde(rename = "07")]
    #[cfg_attr(feature = "sqlx", sqlx(rename = "07"))]
    CreditNote,
    #[serde(rename = "08")]
    #[cfg_attr(feature = "sqlx", sqlx(rename = "08"))]
    DebitNote,
}

wire_strings!(InvoiceType, "invoiceType", {
    Factura => "01",
    Boleta => "03",
    CreditNote => "07",
    DebitNote => "08",
});

/// Receiver identity document type (catálogo 06, subset).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[ts(export)]
pub enum ReceiverDocType {
    /// No document (anonymous boleta).
    #[serde(rename = "0")]
    #[cfg_attr(feature = "sqlx", sqlx(rename = "0"))]
    NoDocument,
    #[serde(rename = "1")]
    #[cfg_attr(feature = "sqlx", sqlx(rename = "1"))]
    Dni,
    #[serde(rename = "6")]
    #[cfg_attr(feature = "sqlx", sqlx(rename = "6"))]
    Ruc,
}

wire_strings!(ReceiverDocType, "receiverDocumentType", { NoDocument => "0", Dni => "1", Ruc => "6" });

/// Acceptance state reported by SUNAT.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[ts(export)]
pub enum SunatStatus {
    #[serde(rename = "PENDIENTE")]
    #[cfg_attr(feature = "sqlx", sqlx(rename = "PENDIENTE"))]
    Pending,
    #[serde(rename = "ACEPTADO")]
    #[cfg_attr(feature = "sqlx", sqlx(rename = "ACEPTADO"))]
    Accepted,
    #[serde(rename = "RECHAZADO")]
    #[cfg_attr(feature = "sqlx", sqlx(rename = "RECHAZADO"))]
    Rejected,
    #[serde(rename = "OBSERVADO")]
    #[cfg_attr(feature = "sqlx", sqlx(rename = "OBSERVADO"))]
    Observed,
}

wire_strings!(SunatStatus, "sunatStatus", {
    Pending => "PENDIENTE",
    Accepted => "ACEPTADO",
    Rejected => "RECHAZADO",
    Observed => "OBSERVADO",
});

impl Default for SunatStatus {
    fn default() -> Self {
        SunatStatus::Pending
    }
}

/// An electronic tax document issued for a sale.
///
/// Issuer fields are a snapshot of the site's [`TaxConfig`] at issue time.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Invoice {
    pub id: String,
    pub invoice_type: InvoiceType,
    pub series: String,
    pub number: i64,
    #[ts(as = "String")]
    pub issued_at: DateTime<Utc>,
    #[ts(as = "Option<String>")]
    pub due_date: Option<NaiveDate>,

    pub issuer_ruc: String,
    pub issuer_legal_name: String,
    pub issuer_address: String,
    pub issuer_ubigeo: Option<String>,

    pub receiver_doc_type: ReceiverDocType,
    pub receiver_doc_number: String,
    pub receiver_name: String,
    pub receiver_address: Option<String>,

    pub subtotal_cents: i64,
    pub igv_cents: i64,
    pub total_cents: i64,

    pub sunat_status: SunatStatus,
    pub sunat_response: Option<String>,
    pub sunat_response_code: Option<String>,
    #[ts(as = "Option<String>")]
    pub sunat_responded_at: Option<DateTime<Utc>>,

    // Filled by the signing pipeline, never by this service.
    pub xml_generated: Option<String>,
    pub xml_signed: Option<String>,
    pub cdr: Option<String>,

    pub sale_id: Option<String>,
    pub currency: String,
    pub exchange_rate: f64,
    pub notes: Option<String>,
}

impl Invoice {
    /// SUNAT document id, `F001-123`.
    pub fn cbc_id(&self) -> String {
        crate::invoice::cbc_id(&self.series, self.number)
    }
}

/// A line of an invoice, copied from a sale line.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct InvoiceLine {
    pub id: String,
    pub invoice_id: String,
    pub description: String,
    pub quantity: i64,
    /// UN/ECE unit code, `NIU` for units.
    pub unit_code: String,
    pub unit_price_cents: i64,
    pub subtotal_cents: i64,
    pub igv_cents: i64,
    /// SUNAT catálogo 07 affectation code.
    pub igv_type: String,
    pub sale_line_id: Option<String>,
}

/// An invoice together with its lines.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct InvoiceDetail {
    pub invoice: Invoice,
    pub lines: Vec<InvoiceLine>,
}

// =============================================================================
// Submission Queue
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[ts(export)]
pub enum SubmissionStatus {
    #[serde(rename = "PENDIENTE")]
    #[cfg_attr(feature = "sqlx", sqlx(rename = "PENDIENTE"))]
    Pending,
    #[serde(rename = "ENVIADO")]
    #[cfg_attr(feature = "sqlx", sqlx(rename = "ENVIADO"))]
    Sent,
    #[serde(rename = "FALLIDO")]
    #[cfg_attr(feature = "sqlx", sqlx(rename = "FALLIDO"))]
    Failed,
}

wire_strings!(SubmissionStatus, "status", {
    Pending => "PENDIENTE",
    Sent => "ENVIADO",
    Failed => "FALLIDO",
});

/// An outbound SUNAT submission waiting in the queue (SUNATEnvioQueue).
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct SubmissionEntry {
    pub id: String,
    pub invoice_id: Option<String>,
    pub cbc_id: String,
    pub issuer_ruc: String,
    pub invoice_type: InvoiceType,
    pub series: String,
    pub number: i64,
    pub zip_name: String,
    pub zip_base64: String,
    pub xml_sha1: String,
    pub status: SubmissionStatus,
    pub attempts: i64,
    pub max_attempts: i64,
    #[ts(as = "Option<String>")]
    pub next_retry_at: Option<DateTime<Utc>>,
    pub fault_code: Option<String>,
    pub fault_string: Option<String>,
    pub last_response_snippet: Option<String>,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

// =============================================================================
// Unit Tests
// =============================================================================
