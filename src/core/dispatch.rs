//! Command dispatch
//!
//! Turns a `LedgerCommand` (names and codes, as typed by a user) into a call on
//! the engine (ids). Resolution reads the store's read model; the engine then
//! re-checks everything that matters inside its own transaction.
//!
//! - Names resolve to the earliest-joined active customer; `restore` resolves
//!   to the most recently joined archived one.
//! - Codes resolve through the stock code index, or for `return` and
//!   `settle` to the most recent sale record carrying the code.

use crate::core::engine::{LedgerEngine, ReturnReceipt, SaleReceipt};
use crate::core::intake::IntakeReport;
use crate::core::traits::LedgerStore;
use crate::types::{
    normalize_code, Customer, LedgerCommand, LedgerError, SaleRecord, SaleRecordId, StockItem,
    StockItemId,
};
use std::collections::HashSet;

/// What a successfully applied command produced
#[derive(Debug, Clone, PartialEq)]
pub enum CommandOutcome {
    Intake(IntakeReport),
    Stock(StockItem),
    Sale(SaleReceipt),
    Customer(Customer),
    Return(ReturnReceipt),
    Settled(usize),
}

impl<S: LedgerStore> LedgerEngine<S> {
    /// Resolve and execute one command
    ///
    /// # Errors
    ///
    /// Returns the first resolution failure (`CustomerNotFound`,
    /// `StockItemNotFound`, `SaleRecordNotFound`) or whatever the engine
    /// operation rejects the command with.
    pub fn apply(&self, command: &LedgerCommand) -> Result<CommandOutcome, LedgerError> {
        match command {
            LedgerCommand::Intake { codes, pricing } => self
                .intake_stock(codes, pricing.clone())
                .map(CommandOutcome::Intake),
            LedgerCommand::EditStock { code, pricing } => {
                let id = self.resolve_stock(code)?;
                self.update_stock_item(id, pricing.clone())
                    .map(CommandOutcome::Stock)
            }
            LedgerCommand::RemoveStock { code } => {
                let id = self.resolve_stock(code)?;
                self.remove_stock_item(id).map(CommandOutcome::Stock)
            }
            LedgerCommand::Sale {
                customer,
                codes,
                initial_payment,
            } => {
                if codes.is_empty() {
                    return Err(LedgerError::validation("sale needs at least one item"));
                }
                let ids = codes
                    .iter()
                    .map(|code| self.resolve_stock(code))
                    .collect::<Result<Vec<StockItemId>, _>>()?;
                self.process_sale(&ids, customer, *initial_payment)
                    .map(CommandOutcome::Sale)
            }
            LedgerCommand::Payment { customer, amount } => {
                let id = self.resolve_active_customer(customer)?.id;
                self.record_payment(id, *amount).map(CommandOutcome::Customer)
            }
            LedgerCommand::Refund { customer, amount } => {
                let id = self.resolve_active_customer(customer)?.id;
                self.record_refund(id, *amount).map(CommandOutcome::Customer)
            }
            LedgerCommand::Return { code } => {
                let sale = self.resolve_latest_sale(code)?;
                self.return_item(sale.id).map(CommandOutcome::Return)
            }
            LedgerCommand::Archive { customer } => {
                let id = self.resolve_active_customer(customer)?.id;
                self.archive_customer(id).map(CommandOutcome::Customer)
            }
            LedgerCommand::Restore { customer } => {
                let id = self.resolve_archived_customer(customer)?.id;
                self.restore_customer(id).map(CommandOutcome::Customer)
            }
            LedgerCommand::Settle { codes, paid } => {
                let mut seen = HashSet::new();
                let ids = codes
                    .iter()
                    .map(|code| self.resolve_latest_sale(code).map(|s| s.id))
                    .collect::<Result<Vec<SaleRecordId>, _>>()?
                    .into_iter()
                    .filter(|id| seen.insert(*id))
                    .collect::<Vec<_>>();
                self.settle_partner_share(&ids, *paid)
                    .map(CommandOutcome::Settled)
            }
        }
    }

    fn resolve_stock(&self, code: &str) -> Result<StockItemId, LedgerError> {
        let code = normalize_code(code);
        self.store()
            .find_stock_by_code(&code)?
            .map(|item| item.id)
            .ok_or_else(|| LedgerError::stock_item_not_found(code))
    }

    /// Earliest-joined active customer with this name
    pub fn resolve_active_customer(&self, name: &str) -> Result<Customer, LedgerError> {
        self.store()
            .find_customers(&|c: &Customer| c.is_active() && c.matches_name(name))?
            .into_iter()
            .next()
            .ok_or_else(|| LedgerError::customer_not_found(name.trim()))
    }

    /// Most recently joined archived customer with this name
    pub fn resolve_archived_customer(&self, name: &str) -> Result<Customer, LedgerError> {
        self.store()
            .find_customers(&|c: &Customer| !c.is_active() && c.matches_name(name))?
            .into_iter()
            .last()
            .ok_or_else(|| LedgerError::customer_not_found(name.trim()))
    }

    /// Most recent sale of the unit with this code
    pub fn resolve_latest_sale(&self, code: &str) -> Result<SaleRecord, LedgerError> {
        let code = normalize_code(code);
        self.store()
            .find_sales(&|s: &SaleRecord| s.external_code == code)?
            .into_iter()
            .last()
            .ok_or_else(|| LedgerError::sale_record_not_found(code))
    }
}
