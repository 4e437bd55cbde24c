//! # Catalog & Administration Inputs
//!
//! Payloads for the admin screens: sites, products, registers and cash
//! expenses. Each carries its own `validate()`.

use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::error::{CoreResult, ValidationError};
use crate::types::ProductType;
use crate::validation::{
    validate_amount, validate_id, validate_product_name, validate_ruc, validate_text,
};
use crate::MAX_STOCK;

/// New site (sede).
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct NewSite {
    pub name: String,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub ruc: Option<String>,
}

impl NewSite {
    pub fn validate(&self) -> CoreResult<()> {
        validate_text("name", &self.name, 200)?;
        if let Some(ruc) = self.ruc.as_deref() {
            validate_ruc(ruc)?;
        }
        Ok(())
    }
}

/// New product for a site.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct NewProduct {
    pub site_id: String,
    pub name: String,
    #[serde(default)]
    pub product_type: Option<ProductType>,
    #[serde(default)]
    pub stock: i64,
    pub price_cents: i64,
}

impl NewProduct {
    pub fn validate(&self) -> CoreResult<()> {
        validate_id("siteId", &self.site_id)?;
        validate_product_name(&self.name)?;
        validate_stock_level("stock", self.stock, 0)?;
        validate_amount("priceCents", self.price_cents)?;
        Ok(())
    }
}

/// Stock correction (count, reception, shrinkage). Negative deltas remove.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct StockAdjustment {
    pub product_id: String,
    pub delta: i64,
}

impl StockAdjustment {
    pub fn validate(&self) -> CoreResult<()> {
        validate_id("productId", &self.product_id)?;
        validate_stock_level("delta", self.delta, -MAX_STOCK)?;
        Ok(())
    }

    /// Units taken out by a negative delta; zero otherwise.
    pub fn removed(&self) -> i64 {
        self.delta.checked_neg().unwrap_or(i64::MAX).max(0)
    }
}

fn validate_stock_level(field: &str, value: i64, min: i64) -> CoreResult<()> {
    if !(min..=MAX_STOCK).contains(&value) {
        return Err(ValidationError::OutOfRange {
            field: field.to_string(),
            min,
            max: MAX_STOCK,
        }
        .into());
    }
    Ok(())
}

/// New register for a site. Registers start closed.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct NewRegister {
    pub site_id: String,
    #[serde(default)]
    pub assigned_user_id: Option<String>,
}

impl NewRegister {
    pub fn validate(&self) -> CoreResult<()> {
        validate_id("siteId", &self.site_id)?;
        Ok(())
    }
}

/// Cash taken out of an open register (egreso).
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct RegisterExpense {
    pub register_id: String,
    pub amount_cents: i64,
}

impl RegisterExpense {
    pub fn validate(&self) -> CoreResult<()> {
        validate_id("registerId", &self.register_id)?;
        validate_amount("amountCents", self.amount_cents)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CoreError;

    #[test]
    fn test_new_product_validation() {
        let mut product = NewProduct {
            site_id: "sede-1".to_string(),
            name: "Gaseosa 500ml".to_string(),
            product_type: Some(ProductType::Abarrote),
            stock: 24,
            price_cents: 250,
        };
        assert!(product.validate().is_ok());

        product.stock = -1;
        assert!(matches!(product.validate(), Err(CoreError::Validation(_))));

        product.stock = 0;
        product.name = " ".to_string();
        assert!(product.validate().is_err());
    }

    #[test]
    fn test_new_site_ruc() {
        let site = NewSite {
            name: "Sede Centro".to_string(),
            address: None,
            phone: None,
            ruc: Some("123".to_string()),
        };
        assert!(site.validate().is_err());
    }

    #[test]
    fn test_stock_adjustment_bounds() {
        let mut adjustment = StockAdjustment {
            product_id: "prod-1".to_string(),
            delta: -12,
        };
        assert!(adjustment.validate().is_ok());
        assert_eq!(adjustment.removed(), 12);

        adjustment.delta = 30;
        assert_eq!(adjustment.removed(), 0);

        adjustment.delta = i64::MIN;
        assert!(matches!(
            adjustment.validate(),
            Err(CoreError::Validation(ValidationError::OutOfRange { .. }))
        ));
        assert_eq!(adjustment.removed(), i64::MAX);

        adjustment.delta = MAX_STOCK + 1;
        assert!(adjustment.validate().is_err());
    }

    #[test]
    fn test_expense_must_not_be_negative() {
        let expense = RegisterExpense {
            register_id: "caja-1".to_string(),
            amount_cents: -100,
        };
        assert!(expense.validate().is_err());
    }
}
