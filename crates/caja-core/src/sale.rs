//! # Sale Rules
//!
//! Everything decided about a sale before any row is written: argument
//! validation, totals, per-product stock demand, and which status changes
//! are allowed.
//!
//! ## Create Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  NewSale ──► validate() ──► totals() ──► stock_demand()                 │
//! │                                              │                          │
//! │                                              ▼                          │
//! │                         for each product: check_stock(product, qty)     │
//! │                                              │                          │
//! │                                              ▼                          │
//! │                           (caja-db) insert sale + lines, take stock     │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Pricing
//! Unit prices already include IGV, so `igv` is always zero and
//! `total = subtotal − discount`.
//!
//! ## Argument Names
//! The camelCase names are canonical. The Spanish names of the web client
//! (`cajaId`, `usuarioVendedorUserId`, `metodo_pago`, `observaciones`,
//! `tipo_item`, `productoId`, `descripcion`, `cantidad`, `ventaId`,
//! `motivo`) are accepted as aliases. Amounts are not: the client sends
//! `descuento` and `precio_unitario` as decimal soles, while this service
//! takes integer `discountCents` and `unitPriceCents`.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::error::{CoreError, CoreResult, ValidationError};
use crate::money::Money;
use crate::types::{ItemType, PaymentMethod, Product, Sale, SaleStatus};
use crate::validation::{
    validate_amount, validate_dni, validate_id, validate_quantity, validate_text,
};
use crate::{DEFAULT_VOID_REASON, MAX_SALE_LINES};

// =============================================================================
// Operation Inputs
// =============================================================================

/// One requested line of `crearPOSVentaConDetalles`.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct SaleItemInput {
    #[serde(alias = "tipo_item")]
    pub item_type: ItemType,
    #[serde(default, alias = "productoId")]
    pub product_id: Option<String>,
    #[serde(alias = "descripcion")]
    pub description: String,
    #[serde(default = "default_quantity", alias = "cantidad")]
    pub quantity: i64,
    pub unit_price_cents: i64,
}

fn default_quantity() -> i64 {
    1
}

impl SaleItemInput {
    /// `unit_price × quantity`, or an error when it would overflow.
    pub fn subtotal(&self) -> CoreResult<Money> {
        Money::from_cents(self.unit_price_cents)
            .checked_multiply_quantity(self.quantity)
            .ok_or_else(|| amount_overflow("unitPriceCents"))
    }

    /// Product id for `PRODUCTO` lines; services never carry one.
    pub fn stocked_product(&self) -> Option<&str> {
        match self.item_type {
            ItemType::Product => self.product_id.as_deref(),
            ItemType::Service => None,
        }
    }
}

/// Arguments of `crearPOSVentaConDetalles`.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct NewSale {
    #[serde(alias = "cajaId")]
    pub register_id: String,
    #[serde(alias = "usuarioVendedorUserId")]
    pub seller_user_id: String,
    #[serde(default, alias = "metodo_pago")]
    pub payment_method: PaymentMethod,
    #[serde(default)]
    pub discount_cents: i64,
    #[serde(default, alias = "observaciones")]
    pub notes: Option<String>,
    #[serde(default)]
    pub customer_name: Option<String>,
    #[serde(default)]
    pub customer_dni: Option<String>,
    pub items: Vec<SaleItemInput>,
}

impl NewSale {
    /// Field-level checks. Does not look at stock.
    pub fn validate(&self) -> CoreResult<()> {
        validate_id("registerId", &self.register_id)?;
        validate_id("sellerUserId", &self.seller_user_id)?;

        if self.items.is_empty() {
            return Err(CoreError::EmptySale);
        }
        if self.items.len() > MAX_SALE_LINES {
            return Err(CoreError::TooManyItems {
                max: MAX_SALE_LINES,
            });
        }

        for item in &self.items {
            validate_text("description", &item.description, 250)?;
            validate_quantity(item.quantity)?;
            validate_amount("unitPriceCents", item.unit_price_cents)?;

            if item.item_type == ItemType::Product {
                let has_id = item
                    .product_id
                    .as_deref()
                    .is_some_and(|id| !id.trim().is_empty());
                if !has_id {
                    return Err(ValidationError::Required {
                        field: "productId".to_string(),
                    }
                    .into());
                }
            }
        }

        validate_amount("discountCents", self.discount_cents)?;

        if let Some(dni) = self.customer_dni.as_deref().filter(|d| !d.is_empty()) {
            validate_dni("customerDni", dni)?;
        }

        Ok(())
    }

    /// Subtotal, discount and total of the requested lines.
    pub fn totals(&self) -> CoreResult<SaleTotals> {
        let mut subtotal = Money::zero();
        for item in &self.items {
            subtotal = subtotal
                .checked_add(item.subtotal()?)
                .ok_or_else(|| amount_overflow("items"))?;
        }
        SaleTotals::new(subtotal, Money::from_cents(self.discount_cents))
    }

    /// Units requested per product, summed across lines.
    ///
    /// Two lines of the same product must be checked against stock
    /// together, otherwise each would pass on its own.
    pub fn stock_demand(&self) -> BTreeMap<String, i64> {
        let mut demand = BTreeMap::new();
        for item in &self.items {
            if let Some(product_id) = item.stocked_product() {
                let units = demand.entry(product_id.to_string()).or_insert(0_i64);
                *units = units.saturating_add(item.quantity);
            }
        }
        demand
    }
}

fn amount_overflow(field: &str) -> CoreError {
    ValidationError::OutOfRange {
        field: field.to_string(),
        min: 0,
        max: i64::MAX,
    }
    .into()
}

// =============================================================================
// Totals
// =============================================================================

/// Money summary of a sale.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SaleTotals {
    pub subtotal: Money,
    pub discount: Money,
    pub igv: Money,
    pub total: Money,
}

impl SaleTotals {
    /// Builds totals for IGV-inclusive prices.
    pub fn new(subtotal: Money, discount: Money) -> CoreResult<Self> {
        if discount.is_negative() {
            return Err(ValidationError::MustNotBeNegative {
                field: "discountCents".to_string(),
            }
            .into());
        }
        if discount > subtotal {
            return Err(CoreError::DiscountExceedsSubtotal {
                discount: discount.cents(),
                subtotal: subtotal.cents(),
            });
        }

        Ok(SaleTotals {
            subtotal,
            discount,
            igv: Money::zero(),
            total: subtotal - discount,
        })
    }
}

// =============================================================================
// Stock & Status Checks
// =============================================================================

/// Fails when `product` cannot cover `requested` units.
pub fn check_stock(product: &Product, requested: i64) -> CoreResult<()> {
    if !product.can_sell(requested) {
        return Err(CoreError::InsufficientStock {
            product: product.name.clone(),
            available: product.stock,
            requested,
        });
    }
    Ok(())
}

impl Sale {
    /// Only a completed sale can be voided; voiding twice would restock twice.
    pub fn ensure_voidable(&self) -> CoreResult<()> {
        self.ensure_completed()
    }

    /// Voided sales cannot be invoiced.
    pub fn ensure_invoiceable(&self) -> CoreResult<()> {
        self.ensure_completed()
    }

    fn ensure_completed(&self) -> CoreResult<()> {
        if self.status != SaleStatus::Completed {
            return Err(CoreError::InvalidSaleStatus {
                sale_id: self.id.clone(),
                current_status: self.status.to_string(),
            });
        }
        Ok(())
    }
}

/// Arguments of `anularPOSVenta`.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct VoidSale {
    #[serde(alias = "ventaId")]
    pub sale_id: String,
    #[serde(default, alias = "motivo")]
    pub reason: Option<String>,
}

impl VoidSale {
    pub fn validate(&self) -> CoreResult<()> {
        validate_id("saleId", &self.sale_id)?;
        Ok(())
    }

    /// Reason stored in the sale's notes.
    pub fn reason(&self) -> String {
        match self.reason.as_deref().map(str::trim) {
            Some(r) if !r.is_empty() => r.to_string(),
            _ => DEFAULT_VOID_REASON.to_string(),
        }
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
