//! Replayable ledger commands
//!
//! A `LedgerCommand` is one line of a command log, already validated for
//! shape but not yet resolved against the store: customers are referenced by
//! name and stock units by external code.

use super::customer::name_key;
use super::money::Amount;
use super::stock::{normalize_code, StockPricing};
use std::fmt;

/// One user-initiated command against the ledger
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LedgerCommand {
    /// Add one available unit per code, all sharing brand and prices
    Intake { codes: Vec<String>, pricing: StockPricing },
    /// Change brand and prices of an available unit
    EditStock { code: String, pricing: StockPricing },
    /// Delete an available unit
    RemoveStock { code: String },
    Sale {
        customer: String,
        codes: Vec<String>,
        initial_payment: Amount,
    },
    Payment { customer: String, amount: Amount },
    Refund { customer: String, amount: Amount },
    /// Return the most recent sale of the unit with this code
    Return { code: String },
    Archive { customer: String },
    Restore { customer: String },
    /// Mark partner share settled (`paid`) or pending on the sales of these codes
    Settle { codes: Vec<String>, paid: bool },
}

/// Entity a command may read or write, used to group commands that must
/// run in order
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ConflictKey {
    /// Normalized customer name
    Customer(String),
    /// Normalized stock code
    Code(String),
}

impl LedgerCommand {
    pub fn name(&self) -> &'static str {
        match self {
            LedgerCommand::Intake { .. } => "intake",
            LedgerCommand::EditStock { .. } => "edit",
            LedgerCommand::RemoveStock { .. } => "remove",
            LedgerCommand::Sale { .. } => "sale",
            LedgerCommand::Payment { .. } => "payment",
            LedgerCommand::Refund { .. } => "refund",
            LedgerCommand::Return { .. } => "return",
            LedgerCommand::Archive { .. } => "archive",
            LedgerCommand::Restore { .. } => "restore",
            LedgerCommand::Settle { paid: true, .. } => "settle",
            LedgerCommand::Settle { paid: false, .. } => "unsettle",
        }
    }

    /// Entities named directly by this command
    ///
    /// A return also touches the customer who bought the unit; that key is
    /// not known until the sale is looked up.
    pub fn conflict_keys(&self) -> Vec<ConflictKey> {
        let code = |c: &String| ConflictKey::Code(normalize_code(c));
        let customer = |n: &String| ConflictKey::Customer(name_key(n));

        match self {
            LedgerCommand::Intake { codes, .. } | LedgerCommand::Settle { codes, .. } => {
                codes.iter().map(code).collect()
            }
            LedgerCommand::EditStock { code: c, .. }
            | LedgerCommand::RemoveStock { code: c }
            | LedgerCommand::Return { code: c } => vec![code(c)],
            LedgerCommand::Sale {
                customer: name,
                codes,
                ..
            } => std::iter::once(customer(name))
                .chain(codes.iter().map(code))
                .collect(),
            LedgerCommand::Payment { customer: name, .. }
            | LedgerCommand::Refund { customer: name, .. }
            | LedgerCommand::Archive { customer: name }
            | LedgerCommand::Restore { customer: name } => vec![customer(name)],
        }
    }
}

impl fmt::Display for LedgerCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LedgerCommand::Intake { codes, pricing } => write!(
                f,
                "intake {} x {} @ {}/{}",
                codes.len(),
                pricing.brand,
                pricing.cost_price,
                pricing.sale_price
            ),
            LedgerCommand::EditStock { code, pricing } => write!(
                f,
                "edit {} -> {} @ {}/{}",
                code, pricing.brand, pricing.cost_price, pricing.sale_price
            ),
            LedgerCommand::RemoveStock { code } => write!(f, "remove {}", code),
            LedgerCommand::Sale {
                customer,
                codes,
                initial_payment,
            } => write!(
                f,
                "sale [{}] to {} paying {}",
                codes.join(" "),
                customer,
                initial_payment
            ),
            LedgerCommand::Payment { customer, amount } => {
                write!(f, "payment {} from {}", amount, customer)
            }
            LedgerCommand::Refund { customer, amount } => {
                write!(f, "refund {} to {}", amount, customer)
            }
            LedgerCommand::Return { code } => write!(f, "return {}", code),
            LedgerCommand::Archive { customer } => write!(f, "archive {}", customer),
            LedgerCommand::Restore { customer } => write!(f, "restore {}", customer),
            LedgerCommand::Settle { codes, .. } => {
                write!(f, "{} [{}]", self.name(), codes.join(" "))
            }
        }
    }
}
