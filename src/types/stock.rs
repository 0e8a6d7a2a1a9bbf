//! Stock unit types
//!
//! Every document is one physical unit; there is no fungible quantity. A unit
//! is either available (`available_qty = 1`) or sold (`available_qty = 0`).

use super::error::LedgerError;
use super::ids::{StockItemId, Timestamp};
use super::money::Amount;
use serde::{Deserialize, Serialize};

/// One physical inventory unit
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct StockItem {
    pub id: StockItemId,

    /// Human-readable SKU, trimmed and uppercase, unique per owner
    pub external_code: String,

    pub brand: String,

    #[serde(default)]
    pub cost_price: Amount,

    #[serde(default)]
    pub sale_price: Amount,

    /// 1 while the unit is on the shelf, 0 once sold
    #[serde(default)]
    pub available_qty: u8,

    pub created_at: Timestamp,
}

impl StockItem {
    pub fn is_available(&self) -> bool {
        self.available_qty == 1
    }

    /// Gross margin at the listed sale price
    pub fn margin(&self) -> Result<Amount, LedgerError> {
        self.sale_price
            .checked_sub(self.cost_price)
            .ok_or_else(|| LedgerError::arithmetic_overflow("stock margin"))
    }

    pub(crate) fn mark_sold(&mut self) {
        self.available_qty = 0;
    }

    pub(crate) fn mark_available(&mut self) {
        self.available_qty = 1;
    }

    /// Check the record-level invariants a decoded document must satisfy
    pub fn check_shape(&self) -> Result<(), String> {
        if self.available_qty > 1 {
            return Err(format!("availableQty must be 0 or 1, got {}", self.available_qty));
        }
        if self.cost_price < 0 || self.sale_price < 0 {
            return Err(format!(
                "prices must not be negative, got cost {} and sale {}",
                self.cost_price, self.sale_price
            ));
        }
        if self.external_code.trim().is_empty() {
            return Err("externalCode must not be empty".to_string());
        }
        if self.external_code != normalize_code(&self.external_code) {
            return Err(format!(
                "externalCode '{}' is not trimmed uppercase",
                self.external_code
            ));
        }
        Ok(())
    }
}

/// Normalize a stock code: trimmed and uppercase
pub fn normalize_code(raw: &str) -> String {
    raw.trim().to_uppercase()
}

/// Split a free-form code list on whitespace and commas
///
/// Each code is normalized; empty fragments are dropped. Order is preserved
/// and duplicates are kept so the caller can report them.
pub fn parse_code_list(raw: &str) -> Vec<String> {
    raw.split(|c: char| c.is_whitespace() || c == ',')
        .map(normalize_code)
        .filter(|code| !code.is_empty())
        .collect()
}

/// Brand and price fields shared by intake and stock edits
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StockPricing {
    pub brand: String,
    pub cost_price: Amount,
    pub sale_price: Amount,
}

impl StockPricing {
    pub fn new(brand: impl Into<String>, cost_price: Amount, sale_price: Amount) -> Self {
        StockPricing {
            brand: brand.into(),
            cost_price,
            sale_price,
        }
    }

    /// Validate and normalize (brand trimmed)
    pub fn validated(self) -> Result<Self, LedgerError> {
        let brand = self.brand.trim().to_string();
        if brand.is_empty() {
            return Err(LedgerError::validation("brand required"));
        }
        if self.cost_price <= 0 {
            return Err(LedgerError::validation(format!(
                "invalid cost price {}",
                self.cost_price
            )));
        }
        if self.sale_price <= 0 {
            return Err(LedgerError::validation(format!(
                "invalid sale price {}",
                self.sale_price
            )));
        }
        if self.sale_price < self.cost_price {
            return Err(LedgerError::validation(format!(
                "sale price {} is below cost price {}",
                self.sale_price, self.cost_price
            )));
        }
        Ok(StockPricing { brand, ..self })
    }
}
