//! # Register State Machine
//!
//! Rules for opening and closing a cash register (caja).
//!
//! ## Lifecycle
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │        create                abrirCaja                                  │
//! │   ────────────► CIERRE ─────────────────► APERTURA ──┐                  │
//! │                   ▲      log: APERTURA        │      │ abrirCaja        │
//! │                   │      initial = opening    │      │ (no-op, no log)  │
//! │                   │                           │ ◄────┘                  │
//! │                   │         cerrarCaja        │                         │
//! │                   └───────────────────────────┘                         │
//! │                     log: CIERRE                                         │
//! │                     final = opening + Σ sales − expenses                │
//! │                                                                         │
//! │   Sales may only be rung up while the register is in APERTURA.         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::error::{CoreError, CoreResult};
use crate::money::Money;
use crate::types::{Register, RegisterStatus};
use crate::validation::{validate_amount, validate_id};

// =============================================================================
// Operation Inputs
// =============================================================================

/// Arguments of `abrirCaja`.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct OpenRegister {
    #[serde(alias = "cajaId")]
    pub register_id: String,
    #[serde(default, alias = "usuarioId")]
    pub user_id: Option<String>,
    /// Cash placed in the drawer.
    #[serde(default)]
    pub opening_amount_cents: i64,
    #[serde(default, alias = "observaciones")]
    pub notes: Option<String>,
}

impl OpenRegister {
    pub fn validate(&self) -> CoreResult<()> {
        validate_id("registerId", &self.register_id)?;
        validate_amount("openingAmountCents", self.opening_amount_cents)?;
        Ok(())
    }
}

/// Arguments of `cerrarCaja`.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct CloseRegister {
    #[serde(alias = "cajaId")]
    pub register_id: String,
    #[serde(default, alias = "usuarioId")]
    pub user_id: Option<String>,
    #[serde(default, alias = "observaciones")]
    pub notes: Option<String>,
}

impl CloseRegister {
    pub fn validate(&self) -> CoreResult<()> {
        validate_id("registerId", &self.register_id)?;
        Ok(())
    }
}

// =============================================================================
// Transitions
// =============================================================================

/// What opening a register amounts to, given its current state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpenPlan {
    /// Already in `APERTURA`: return it unchanged, write nothing.
    AlreadyOpen,
    /// Log an `APERTURA` entry and flip the status.
    Open,
}

impl Register {
    #[inline]
    pub fn is_open(&self) -> bool {
        self.status == RegisterStatus::Open
    }

    /// Fails unless the register is in `APERTURA`.
    ///
    /// Guards both `cerrarCaja` and `crearPOSVentaConDetalles`.
    pub fn ensure_open(&self) -> CoreResult<()> {
        if !self.is_open() {
            return Err(CoreError::RegisterNotOpen {
                register_id: self.id.clone(),
                status: self.status.to_string(),
            });
        }
        Ok(())
    }

    /// Decides whether `abrirCaja` has anything to do.
    pub fn open_plan(&self) -> OpenPlan {
        if self.is_open() {
            OpenPlan::AlreadyOpen
        } else {
            OpenPlan::Open
        }
    }

    #[inline]
    pub fn opening_amount(&self) -> Money {
        Money::from_cents(self.opening_amount_cents)
    }

    #[inline]
    pub fn expenses(&self) -> Money {
        Money::from_cents(self.expenses_cents)
    }

    /// Cash expected in the drawer at close.
    ///
    /// `completed_sales` is the sum of totals of this register's
    /// `COMPLETADA` sales; voided sales never count.
    ///
    /// ## Example
    /// ```text
    /// opening 100.00 + sales 250.50 − expenses 20.00 = 330.50
    /// ```
    pub fn closing_balance(&self, completed_sales: Money) -> Money {
        self.opening_amount() + completed_sales - self.expenses()
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
