//! Ledger transaction engine
//!
//! This module provides the `LedgerEngine` that executes every ledger command
//! as one atomic unit against a `LedgerStore`.
//!
//! The engine enforces business rules such as:
//! - Stock availability re-checked inside the transaction (no double sale)
//! - Payments capped at the outstanding balance, refunds at the paid amount
//! - Returns restoring stock and bill together, never touching money paid
//! - Stock edits and removals only while a unit is still on the shelf
//!
//! Every operation reads, decides and writes inside a single transaction body.
//! The store may run a body more than once; bodies therefore derive everything
//! from what they read in the current attempt.

use crate::aggregation::{compute_stats, LedgerStats};
use crate::config::LedgerConfig;
use crate::core::traits::{LedgerStore, Transaction};
use crate::types::{
    Amount, Customer, CustomerId, CustomerStatus, LedgerError, LedgerSnapshot, PaymentKind,
    PaymentRecord, SaleRecord, SaleRecordId, StockItem, StockItemId, StockPricing,
};
use std::collections::HashSet;
use tracing::info;

/// Everything a completed sale wrote
#[derive(Debug, Clone, PartialEq)]
pub struct SaleReceipt {
    /// Customer record after the sale
    pub customer: Customer,
    pub sales: Vec<SaleRecord>,
    /// Present when money was collected at the counter
    pub payment: Option<PaymentRecord>,
    pub total: Amount,
}

/// State after a return
#[derive(Debug, Clone, PartialEq)]
pub struct ReturnReceipt {
    pub customer: Customer,
    /// The unit, back on the shelf
    pub item: StockItem,
    /// The sale record that was removed
    pub sale: SaleRecord,
}

/// Ledger transaction engine
///
/// Stateless apart from its configuration: all state lives in the store, so
/// any number of engines over the same store stay consistent.
#[derive(Debug)]
pub struct LedgerEngine<S: LedgerStore> {
    store: S,
    config: LedgerConfig,
}

impl<S: LedgerStore> LedgerEngine<S> {
    /// Create a new LedgerEngine
    ///
    /// # Arguments
    ///
    /// * `store` - Owner-scoped store every command runs against
    /// * `config` - Business parameters (partner share rate, intake chunking)
    pub fn new(store: S, config: LedgerConfig) -> Self {
        LedgerEngine { store, config }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn config(&self) -> &LedgerConfig {
        &self.config
    }

    /// Consistent copy of the four collections
    pub fn snapshot(&self) -> Result<LedgerSnapshot, LedgerError> {
        self.store.snapshot()
    }

    /// Derived statistics over a fresh snapshot
    pub fn stats(&self) -> Result<LedgerStats, LedgerError> {
        let snapshot = self.store.snapshot()?;
        compute_stats(&snapshot, self.config.partner_share_rate)
    }

    /// Sell one or more stock units to a customer
    ///
    /// Resolves the customer by name among active customers (case-insensitive,
    /// trimmed), creating one if none matches, then bills the total, books any
    /// money collected at the counter and writes one sale record per unit.
    ///
    /// # Arguments
    ///
    /// * `items` - Units to sell; each must still be available at commit time
    /// * `customer_name` - Name to resolve or create
    /// * `initial_paid` - Amount collected with the sale, may be zero
    ///
    /// # Returns
    ///
    /// * `Ok(SaleReceipt)` with the updated customer and the new records
    /// * `Err(LedgerError)` if the sale was rejected; nothing was written
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - `items` is empty or lists a unit twice, the name is blank, or the
    ///   payment is negative
    /// - A unit does not exist (`StockItemNotFound`) or was already sold
    ///   (`ItemUnavailable`, naming its code)
    /// - The store gave up after repeated conflicts
    pub fn process_sale(
        &self,
        items: &[StockItemId],
        customer_name: &str,
        initial_paid: Amount,
    ) -> Result<SaleReceipt, LedgerError> {
        let name = customer_name.trim();
        if items.is_empty() {
            return Err(LedgerError::validation("sale needs at least one item"));
        }
        if name.is_empty() {
            return Err(LedgerError::validation("customer name required"));
        }
        if initial_paid < 0 {
            return Err(LedgerError::validation(format!(
                "initial payment must not be negative, got {}",
                initial_paid
            )));
        }
        let mut seen = HashSet::new();
        if let Some(twice) = items.iter().find(|id| !seen.insert(**id)) {
            return Err(LedgerError::validation(format!(
                "stock item {} listed twice",
                twice
            )));
        }

        let rate = self.config.partner_share_rate;
        let receipt = self.store.run_transaction("process_sale", |tx| {
            let now = tx.now();

            let mut units = Vec::with_capacity(items.len());
            for id in items {
                let item = tx
                    .stock_item(*id)?
                    .ok_or_else(|| LedgerError::stock_item_not_found(id.to_string()))?;
                if !item.is_available() {
                    return Err(LedgerError::item_unavailable(item.external_code));
                }
                units.push(item);
            }

            let total = units
                .iter()
                .try_fold(0 as Amount, |sum, item| sum.checked_add(item.sale_price))
                .ok_or_else(|| LedgerError::arithmetic_overflow("sale total"))?;

            let mut customer = match tx.active_customer_named(name)? {
                Some(existing) => existing,
                None => Customer::new(CustomerId::new(), name, now),
            };

            customer.total_billed = customer
                .total_billed
                .checked_add(total)
                .ok_or_else(|| LedgerError::arithmetic_overflow("customer bill"))?;
            customer.total_paid = customer
                .total_paid
                .checked_add(initial_paid)
                .ok_or_else(|| LedgerError::arithmetic_overflow("customer payments"))?;
            customer.status = CustomerStatus::Active;
            customer.last_updated = Some(now);

            let payment = if initial_paid > 0 {
                customer.last_payment_at = Some(now);
                let record = PaymentRecord::new(
                    customer.id,
                    initial_paid,
                    PaymentKind::SaleInitialPayment,
                    now,
                );
                tx.append_payment(record.clone());
                Some(record)
            } else {
                None
            };

            let mut sales = Vec::with_capacity(units.len());
            for mut item in units {
                let sale = SaleRecord::for_item(&item, customer.id, rate, now)?;
                item.mark_sold();
                tx.put_stock_item(item);
                tx.put_sale_record(sale.clone());
                sales.push(sale);
            }

            tx.put_customer(customer.clone());
            Ok(SaleReceipt {
                customer,
                sales,
                payment,
                total,
            })
        })?;

        info!(
            customer = %receipt.customer.name,
            items = receipt.sales.len(),
            total = receipt.total,
            paid = initial_paid,
            "sale committed"
        );
        Ok(receipt)
    }

    /// Reverse the goods side of a sale
    ///
    /// Puts the unit back on the shelf, lowers the customer's bill by the sale
    /// price (never below zero) and deletes the sale record. Money already
    /// paid stays paid; issue a refund separately if cash goes back.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The sale record does not exist
    /// - Its customer or its stock unit is missing; nothing is restored
    pub fn return_item(&self, sale_id: SaleRecordId) -> Result<ReturnReceipt, LedgerError> {
        let receipt = self.store.run_transaction("return_item", |tx| {
            let now = tx.now();
            let sale = tx
                .sale_record(sale_id)?
                .ok_or_else(|| LedgerError::sale_record_not_found(sale_id.to_string()))?;
            let mut customer = tx
                .customer(sale.customer_id)?
                .ok_or_else(|| LedgerError::customer_not_found(sale.customer_id.to_string()))?;
            let mut item = tx
                .stock_item(sale.stock_item_id)?
                .ok_or_else(|| LedgerError::stock_item_not_found(sale.external_code.clone()))?;

            customer.total_billed = (customer.total_billed - sale.sale_price).max(0);
            customer.last_updated = Some(now);
            item.mark_available();

            tx.put_customer(customer.clone());
            tx.put_stock_item(item.clone());
            tx.delete_sale_record(sale.id);

            Ok(ReturnReceipt {
                customer,
                item,
                sale,
            })
        })?;

        info!(
            customer = %receipt.customer.name,
            code = %receipt.item.external_code,
            amount = receipt.sale.sale_price,
            "return committed"
        );
        Ok(receipt)
    }

    /// Record a payment against a customer's outstanding balance
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - `amount` is not positive
    /// - The customer does not exist
    /// - `amount` exceeds the outstanding balance (`ExceedsBalance`)
    pub fn record_payment(
        &self,
        customer_id: CustomerId,
        amount: Amount,
    ) -> Result<Customer, LedgerError> {
        require_positive(amount, "payment")?;

        let customer = self.store.run_transaction("record_payment", |tx| {
            let now = tx.now();
            let mut customer = load_customer(tx, customer_id)?;

            let balance = customer.balance();
            if amount > balance {
                return Err(LedgerError::exceeds_balance(
                    &customer.name,
                    balance.max(0),
                    amount,
                ));
            }

            customer.total_paid += amount;
            customer.last_payment_at = Some(now);
            tx.put_customer(customer.clone());
            tx.append_payment(PaymentRecord::new(
                customer.id,
                amount,
                PaymentKind::Payment,
                now,
            ));
            Ok(customer)
        })?;

        info!(customer = %customer.name, amount, balance = customer.balance(), "payment committed");
        Ok(customer)
    }

    /// Give money back to a customer
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - `amount` is not positive
    /// - The customer does not exist
    /// - `amount` exceeds what the customer has paid (`ExceedsPaidAmount`)
    pub fn record_refund(
        &self,
        customer_id: CustomerId,
        amount: Amount,
    ) -> Result<Customer, LedgerError> {
        require_positive(amount, "refund")?;

        let customer = self.store.run_transaction("record_refund", |tx| {
            let now = tx.now();
            let mut customer = load_customer(tx, customer_id)?;

            if amount > customer.total_paid {
                return Err(LedgerError::exceeds_paid_amount(
                    &customer.name,
                    customer.total_paid,
                    amount,
                ));
            }

            customer.total_paid = (customer.total_paid - amount).max(0);
            tx.put_customer(customer.clone());
            tx.append_payment(PaymentRecord::new(
                customer.id,
                amount,
                PaymentKind::Refund,
                now,
            ));
            Ok(customer)
        })?;

        info!(customer = %customer.name, amount, paid = customer.total_paid, "refund committed");
        Ok(customer)
    }

    /// Hide a customer from name resolution; balances are kept as they are
    pub fn archive_customer(&self, customer_id: CustomerId) -> Result<Customer, LedgerError> {
        self.set_customer_status(customer_id, CustomerStatus::Deleted)
    }

    /// Make an archived customer resolvable by name again
    pub fn restore_customer(&self, customer_id: CustomerId) -> Result<Customer, LedgerError> {
        self.set_customer_status(customer_id, CustomerStatus::Active)
    }

    fn set_customer_status(
        &self,
        customer_id: CustomerId,
        status: CustomerStatus,
    ) -> Result<Customer, LedgerError> {
        let operation = match status {
            CustomerStatus::Active => "restore_customer",
            CustomerStatus::Deleted => "archive_customer",
        };

        let customer = self.store.run_transaction(operation, |tx| {
            let mut customer = load_customer(tx, customer_id)?;
            if customer.status != status {
                customer.status = status;
                tx.put_customer(customer.clone());
            }
            Ok(customer)
        })?;

        info!(customer = %customer.name, balance = customer.balance(), operation, "status committed");
        Ok(customer)
    }

    /// Mark the partner share of several sales settled (`paid`) or pending
    ///
    /// All named records change together or none do.
    ///
    /// # Returns
    ///
    /// Number of sale records updated
    ///
    /// # Errors
    ///
    /// Returns `SaleRecordNotFound` if any id does not exist.
    pub fn settle_partner_share(
        &self,
        sale_ids: &[SaleRecordId],
        paid: bool,
    ) -> Result<usize, LedgerError> {
        if sale_ids.is_empty() {
            return Err(LedgerError::validation("no sale records selected"));
        }
        let ids: Vec<SaleRecordId> = {
            let mut seen = HashSet::new();
            sale_ids.iter().copied().filter(|id| seen.insert(*id)).collect()
        };

        let updated = self.store.run_transaction("settle_partner_share", |tx| {
            let now = tx.now();
            for id in &ids {
                let mut sale = tx
                    .sale_record(*id)?
                    .ok_or_else(|| LedgerError::sale_record_not_found(id.to_string()))?;
                sale.set_settlement(paid.then_some(now));
                tx.put_sale_record(sale);
            }
            Ok(ids.len())
        })?;

        info!(records = updated, paid, "partner share settlement committed");
        Ok(updated)
    }

    /// Change brand and prices of a unit still on the shelf
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The pricing is invalid (blank brand, non-positive prices, sale below cost)
    /// - The unit does not exist, or is sold (`ItemUnavailable`)
    pub fn update_stock_item(
        &self,
        id: StockItemId,
        pricing: StockPricing,
    ) -> Result<StockItem, LedgerError> {
        let pricing = pricing.validated()?;

        let item = self.store.run_transaction("update_stock_item", |tx| {
            let mut item = load_available(tx, id)?;
            item.brand = pricing.brand.clone();
            item.cost_price = pricing.cost_price;
            item.sale_price = pricing.sale_price;
            tx.put_stock_item(item.clone());
            Ok(item)
        })?;

        info!(code = %item.external_code, cost = item.cost_price, price = item.sale_price, "stock edit committed");
        Ok(item)
    }

    /// Delete a unit still on the shelf
    ///
    /// Sold units cannot be removed: their sale record refers to them.
    pub fn remove_stock_item(&self, id: StockItemId) -> Result<StockItem, LedgerError> {
        let item = self.store.run_transaction("remove_stock_item", |tx| {
            let item = load_available(tx, id)?;
            tx.delete_stock_item(item.id);
            Ok(item)
        })?;

        info!(code = %item.external_code, "stock removal committed");
        Ok(item)
    }
}

fn require_positive(amount: Amount, what: &str) -> Result<(), LedgerError> {
    if amount <= 0 {
        return Err(LedgerError::validation(format!(
            "{} amount must be positive, got {}",
            what, amount
        )));
    }
    Ok(())
}

fn load_customer(tx: &mut dyn Transaction, id: CustomerId) -> Result<Customer, LedgerError> {
    tx.customer(id)?
        .ok_or_else(|| LedgerError::customer_not_found(id.to_string()))
}

fn load_available(tx: &mut dyn Transaction, id: StockItemId) -> Result<StockItem, LedgerError> {
    let item = tx
        .stock_item(id)?
        .ok_or_else(|| LedgerError::stock_item_not_found(id.to_string()))?;
    if !item.is_available() {
        return Err(LedgerError::item_unavailable(item.external_code));
    }
    Ok(item)
}
