//! Point-in-time copy of an owner's four collections
//!
//! The snapshot is the read model everything outside the engine works from:
//! aggregation, views, command resolution and JSON export. Collections are
//! kept in a deterministic order so identical contents compare equal.

use super::customer::{name_key, Customer};
use super::document::{decode, encode};
use super::error::LedgerError;
use super::ids::{CustomerId, Timestamp};
use super::payment::PaymentRecord;
use super::sale::SaleRecord;
use super::stock::StockItem;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashSet;

/// Consistent copy of stock, customers, payments and sales
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LedgerSnapshot {
    pub stock_items: Vec<StockItem>,
    pub customers: Vec<Customer>,
    pub payments: Vec<PaymentRecord>,
    pub sales: Vec<SaleRecord>,
    /// Store revision the snapshot was taken at
    pub revision: u64,
    /// Store clock when the snapshot was taken
    pub taken_at: Option<Timestamp>,
}

/// Raw on-disk layout, one untyped document per entry
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawSnapshot {
    #[serde(default)]
    stock_items: Vec<Value>,
    #[serde(default)]
    customers: Vec<Value>,
    #[serde(default)]
    payments: Vec<Value>,
    #[serde(default)]
    sales: Vec<Value>,
}

impl LedgerSnapshot {
    pub fn new(
        stock_items: Vec<StockItem>,
        customers: Vec<Customer>,
        payments: Vec<PaymentRecord>,
        sales: Vec<SaleRecord>,
    ) -> Self {
        let mut snapshot = LedgerSnapshot {
            stock_items,
            customers,
            payments,
            sales,
            revision: 0,
            taken_at: None,
        };
        snapshot.sort();
        snapshot
    }

    fn sort(&mut self) {
        self.stock_items
            .sort_by(|a, b| a.external_code.cmp(&b.external_code).then(a.id.cmp(&b.id)));
        self.customers
            .sort_by(|a, b| a.joined_at.cmp(&b.joined_at).then(a.id.cmp(&b.id)));
        self.payments
            .sort_by(|a, b| a.occurred_at.cmp(&b.occurred_at).then(a.id.cmp(&b.id)));
        self.sales
            .sort_by(|a, b| a.occurred_at.cmp(&b.occurred_at).then(a.id.cmp(&b.id)));
    }

    pub fn customer(&self, id: &CustomerId) -> Option<&Customer> {
        self.customers.iter().find(|c| c.id == *id)
    }

    /// First active customer whose name matches, earliest joined first
    pub fn active_customer_named(&self, name: &str) -> Option<&Customer> {
        let key = name_key(name);
        self.customers
            .iter()
            .find(|c| c.is_active() && c.name_key() == key)
    }

    pub fn stock_by_code(&self, code: &str) -> Option<&StockItem> {
        self.stock_items.iter().find(|i| i.external_code == code)
    }

    /// Decode a JSON snapshot, validating every document and every reference
    pub fn from_json(json: &str) -> Result<Self, LedgerError> {
        let raw: RawSnapshot = serde_json::from_str(json)?;

        let stock_items = raw
            .stock_items
            .into_iter()
            .map(decode::<StockItem>)
            .collect::<Result<Vec<_>, _>>()?;
        let customers = raw
            .customers
            .into_iter()
            .map(decode::<Customer>)
            .collect::<Result<Vec<_>, _>>()?;
        let payments = raw
            .payments
            .into_iter()
            .map(decode::<PaymentRecord>)
            .collect::<Result<Vec<_>, _>>()?;
        let sales = raw
            .sales
            .into_iter()
            .map(decode::<SaleRecord>)
            .collect::<Result<Vec<_>, _>>()?;

        let snapshot = LedgerSnapshot::new(stock_items, customers, payments, sales);
        snapshot.check_references()?;
        Ok(snapshot)
    }

    /// Encode as pretty JSON in the same layout `from_json` reads
    pub fn to_json(&self) -> Result<String, LedgerError> {
        let document = serde_json::json!({
            "stockItems": self.stock_items.iter().map(encode).collect::<Result<Vec<_>, _>>()?,
            "customers": self.customers.iter().map(encode).collect::<Result<Vec<_>, _>>()?,
            "payments": self.payments.iter().map(encode).collect::<Result<Vec<_>, _>>()?,
            "sales": self.sales.iter().map(encode).collect::<Result<Vec<_>, _>>()?,
        });
        Ok(serde_json::to_string_pretty(&document)?)
    }

    /// Every payment and sale must point at a known customer, every sale at a
    /// sold unit, and stock codes must be unique
    fn check_references(&self) -> Result<(), LedgerError> {
        let customer_ids: HashSet<_> = self.customers.iter().map(|c| c.id).collect();

        let mut codes = HashSet::new();
        for item in &self.stock_items {
            if !codes.insert(item.external_code.as_str()) {
                return Err(LedgerError::duplicate_codes(
                    vec![item.external_code.clone()],
                    false,
                ));
            }
        }

        for payment in &self.payments {
            if !customer_ids.contains(&payment.customer_id) {
                return Err(LedgerError::malformed_document(
                    "payments",
                    Some(payment.id.to_string()),
                    format!("unknown customer {}", payment.customer_id),
                ));
            }
        }

        for sale in &self.sales {
            if !customer_ids.contains(&sale.customer_id) {
                return Err(LedgerError::malformed_document(
                    "sales",
                    Some(sale.id.to_string()),
                    format!("unknown customer {}", sale.customer_id),
                ));
            }
            let sold = self
                .stock_items
                .iter()
                .any(|i| i.id == sale.stock_item_id && !i.is_available());
            if !sold {
                return Err(LedgerError::malformed_document(
                    "sales",
                    Some(sale.id.to_string()),
                    format!("stock item {} is not a sold unit", sale.stock_item_id),
                ));
            }
        }

        Ok(())
    }
}
