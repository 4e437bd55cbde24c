//! # Money Module
//!
//! Provides the `Money` type for handling monetary values safely.
//!
//! ## Why Integer Money?
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  THE FLOATING POINT PROBLEM                                             │
//! │                                                                         │
//! │  With floats, summing a day of tickets drifts:                          │
//! │    0.1 + 0.2 = 0.30000000000000004  ❌ WRONG!                           │
//! │                                                                         │
//! │  A register closing balance must match the drawer to the céntimo.      │
//! │                                                                         │
//! │  OUR SOLUTION: Integer Céntimos                                         │
//! │    S/ 10.50 is stored as 1050                                          │
//! │    Every total, discount and balance is exact integer math             │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//! ```rust
//! use caja_core::money::Money;
//!
//! // Create from céntimos (preferred)
//! let price = Money::from_cents(1099); // S/ 10.99
//!
//! // Arithmetic operations
//! let doubled = price * 2;                      // S/ 21.98
//! let total = price + Money::from_cents(500);   // S/ 15.99
//! assert_eq!(total.to_string(), "S/ 15.99");
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use std::iter::Sum;
use std::ops::{Add, AddAssign, Mul, Sub, SubAssign};
use ts_rs::TS;

// =============================================================================
// Money Type
// =============================================================================

/// Represents a monetary value in céntimos (1/100 of a Peruvian sol).
///
/// ## Design Decisions
/// - **i64 (signed)**: balances can go negative when expenses exceed cash
/// - **Single field tuple struct**: Zero-cost abstraction over i64
/// - **Serialized as a bare integer**: the wire carries `*_cents` fields
///
/// ## Where Money is Used
/// ```text
/// ┌─────────────────────────────────────────────────────────────────────────┐
/// │  Product.price_cents ──► SaleLine.unit_price ──► SaleLine.subtotal      │
/// │                                                                         │
/// │  Σ SaleLine.subtotal ──► Sale.subtotal ── − discount ──► Sale.total     │
/// │                                                                         │
/// │  Register.opening + Σ Sale.total − expenses ──► closing balance        │
/// └─────────────────────────────────────────────────────────────────────────┘
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Money(i64);

impl Money {
    /// Creates a Money value from céntimos.
    ///
    /// ## Example
    /// ```rust
    /// use caja_core::money::Money;
    ///
    /// let price = Money::from_cents(1099); // S/ 10.99
    /// assert_eq!(price.cents(), 1099);
    /// ```
    #[inline]
    pub const fn from_cents(cents: i64) -> Self {
        Money(cents)
    }

    /// Creates a Money value from soles and céntimos.
    ///
    /// ## Note
    /// For negative amounts, only the major unit should be negative.
    /// `from_soles_cents(-5, 50)` = -S/ 5.50, not -S/ 4.50
    #[inline]
    pub const fn from_soles_cents(soles: i64, cents: i64) -> Self {
        if soles < 0 {
            Money(soles * 100 - cents)
        } else {
            Money(soles * 100 + cents)
        }
    }

    /// Returns the value in céntimos.
    #[inline]
    pub const fn cents(&self) -> i64 {
        self.0
    }

    /// Returns the whole-soles portion.
    ///
    /// ## Example
    /// ```rust
    /// use caja_core::money::Money;
    ///
    /// assert_eq!(Money::from_cents(1099).soles(), 10);
    /// assert_eq!(Money::from_cents(-550).soles(), -5);
    /// ```
    #[inline]
    pub const fn soles(&self) -> i64 {
        self.0 / 100
    }

    /// Returns the céntimos portion (always 0-99).
    #[inline]
    pub const fn cents_part(&self) -> i64 {
        (self.0 % 100).abs()
    }

    /// Returns zero money value.
    #[inline]
    pub const fn zero() -> Self {
        Money(0)
    }

    /// Checks if the value is zero.
    #[inline]
    pub const fn is_zero(&self) -> bool {
        self.0 == 0
    }

    /// Checks if the value is positive (greater than zero).
    #[inline]
    pub const fn is_positive(&self) -> bool {
        self.0 > 0
    }

    /// Checks if the value is negative (less than zero).
    #[inline]
    pub const fn is_negative(&self) -> bool {
        self.0 < 0
    }

    /// Returns the absolute value.
    #[inline]
    pub const fn abs(&self) -> Self {
        Money(self.0.abs())
    }

    /// Multiplies money by a quantity.
    ///
    /// ## Example
    /// ```rust
    /// use caja_core::money::Money;
    ///
    /// let unit_price = Money::from_cents(350); // S/ 3.50
    /// let line = unit_price.multiply_quantity(3);
    /// assert_eq!(line.cents(), 1050);          // S/ 10.50
    /// ```
    #[inline]
    pub const fn multiply_quantity(&self, qty: i64) -> Self {
        Money(self.0 * qty)
    }

    /// [`Money::multiply_quantity`] that returns `None` instead of
    /// overflowing.
    #[inline]
    pub const fn checked_multiply_quantity(&self, qty: i64) -> Option<Self> {
        match self.0.checked_mul(qty) {
            Some(cents) => Some(Money(cents)),
            None => None,
        }
    }

    /// Addition that returns `None` instead of overflowing.
    ///
    /// ## Example
    /// ```rust
    /// use caja_core::money::Money;
    ///
    /// assert_eq!(Money::from_cents(1).checked_add(Money::from_cents(2)), Some(Money::from_cents(3)));
    /// assert_eq!(Money::from_cents(i64::MAX).checked_add(Money::from_cents(1)), None);
    /// ```
    #[inline]
    pub const fn checked_add(self, other: Self) -> Option<Self> {
        match self.0.checked_add(other.0) {
            Some(cents) => Some(Money(cents)),
            None => None,
        }
    }
}

// =============================================================================
// Trait Implementations
// =============================================================================

/// Renders as `S/ 10.99`, the way receipts print soles.
impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        write!(f, "{}S/ {}.{:02}", sign, self.soles().abs(), self.cents_part())
    }
}

impl Default for Money {
    fn default() -> Self {
        Money::zero()
    }
}

impl Add for Money {
    type Output = Self;

    #[inline]
    fn add(self, other: Self) -> Self {
        Money(self.0 + other.0)
    }
}

impl AddAssign for Money {
    #[inline]
    fn add_assign(&mut self, other: Self) {
        self.0 += other.0;
    }
}

impl Sub for Money {
    type Output = Self;

    #[inline]
    fn sub(self, other: Self) -> Self {
        Money(self.0 - other.0)
    }
}

impl SubAssign for Money {
    #[inline]
    fn sub_assign(&mut self, other: Self) {
        self.0 -= other.0;
    }
}

/// Multiplication by quantity.
impl Mul<i64> for Money {
    type Output = Self;

    #[inline]
    fn mul(self, qty: i64) -> Self {
        Money(self.0 * qty)
    }
}

/// Sum of ticket totals, line subtotals, ...
impl Sum for Money {
    fn sum<I: Iterator<Item = Money>>(iter: I) -> Self {
        iter.fold(Money::zero(), |acc, m| acc + m)
    }
}

impl<'a> Sum<&'a Money> for Money {
    fn sum<I: Iterator<Item = &'a Money>>(iter: I) -> Self {
        iter.copied().sum()
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
