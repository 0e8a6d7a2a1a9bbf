//! List views over a snapshot
//!
//! Directory, history, partner-share ledger and stock listing. Pure functions
//! of the snapshot they are given, like the statistics.

use crate::types::{
    Amount, Customer, CustomerId, LedgerSnapshot, PaymentRecord, SaleRecord, StockItem, Timestamp,
};
use serde::Serialize;
use std::cmp::Ordering;

/// Compare codes so that embedded numbers sort by value (`A2` before `A10`)
pub fn natural_cmp(a: &str, b: &str) -> Ordering {
    let mut left = a.chars().peekable();
    let mut right = b.chars().peekable();

    loop {
        match (left.peek().copied(), right.peek().copied()) {
            (None, None) => return a.cmp(b),
            (None, Some(_)) => return Ordering::Less,
            (Some(_), None) => return Ordering::Greater,
            (Some(x), Some(y)) if x.is_ascii_digit() && y.is_ascii_digit() => {
                let lhs = take_digits(&mut left);
                let rhs = take_digits(&mut right);
                let ord = compare_digit_runs(&lhs, &rhs);
                if ord != Ordering::Equal {
                    return ord;
                }
            }
            (Some(x), Some(y)) => {
                let ord = x.to_lowercase().cmp(y.to_lowercase());
                if ord != Ordering::Equal {
                    return ord;
                }
                left.next();
                right.next();
            }
        }
    }
}

fn take_digits(chars: &mut std::iter::Peekable<std::str::Chars<'_>>) -> String {
    let mut run = String::new();
    while let Some(c) = chars.peek().copied().filter(char::is_ascii_digit) {
        run.push(c);
        chars.next();
    }
    run
}

fn compare_digit_runs(a: &str, b: &str) -> Ordering {
    let a = a.trim_start_matches('0');
    let b = b.trim_start_matches('0');
    a.len().cmp(&b.len()).then_with(|| a.cmp(b))
}

/// Active customers whose name contains `filter` (case-insensitive)
///
/// Customers who still owe money come first, then everyone else; each group
/// is ordered by name ignoring case.
pub fn customer_directory<'a>(snapshot: &'a LedgerSnapshot, filter: &str) -> Vec<&'a Customer> {
    let needle = filter.trim().to_lowercase();
    let mut listed: Vec<&Customer> = snapshot
        .customers
        .iter()
        .filter(|c| c.is_active() && c.name.to_lowercase().contains(&needle))
        .collect();
    listed.sort_by(|a, b| {
        (b.balance() > 0)
            .cmp(&(a.balance() > 0))
            .then_with(|| a.name.to_lowercase().cmp(&b.name.to_lowercase()))
    });
    listed
}

/// Archived customers, most recently joined first
pub fn archived_customers(snapshot: &LedgerSnapshot) -> Vec<&Customer> {
    snapshot
        .customers
        .iter()
        .rev()
        .filter(|c| !c.is_active())
        .collect()
}

/// One line of a customer's history
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum HistoryEntry {
    Payment(PaymentRecord),
    Sale(SaleRecord),
}

impl HistoryEntry {
    pub fn occurred_at(&self) -> Timestamp {
        match self {
            HistoryEntry::Payment(p) => p.occurred_at,
            HistoryEntry::Sale(s) => s.occurred_at,
        }
    }

    /// Effect on the customer's balance
    pub fn balance_delta(&self) -> Amount {
        match self {
            HistoryEntry::Payment(p) => -p.kind.signed(p.amount),
            HistoryEntry::Sale(s) => s.sale_price,
        }
    }
}

/// Payments and sales of one customer, newest first
pub fn customer_history(snapshot: &LedgerSnapshot, customer: CustomerId) -> Vec<HistoryEntry> {
    let mut entries: Vec<HistoryEntry> = snapshot
        .payments
        .iter()
        .filter(|p| p.customer_id == customer)
        .cloned()
        .map(HistoryEntry::Payment)
        .chain(
            snapshot
                .sales
                .iter()
                .filter(|s| s.customer_id == customer)
                .cloned()
                .map(HistoryEntry::Sale),
        )
        .collect();
    // Stable sort keeps snapshot order for equal timestamps
    entries.sort_by(|a, b| b.occurred_at().cmp(&a.occurred_at()));
    entries
}

/// Sale records whose partner share is settled (`true`) or pending (`false`),
/// in natural code order
pub fn partner_ledger(snapshot: &LedgerSnapshot, settled: bool) -> Vec<&SaleRecord> {
    let mut listed: Vec<&SaleRecord> = snapshot
        .sales
        .iter()
        .filter(|s| s.partner_share_paid == settled)
        .collect();
    listed.sort_by(|a, b| natural_cmp(&a.external_code, &b.external_code));
    listed
}

/// Filter for the stock listing
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StockQuery {
    /// Matches a code containing it (case-insensitive) or a brand containing it
    pub search: String,
    pub available_only: bool,
}

/// Stock listing plus the cost of everything in it
#[derive(Debug, Clone, PartialEq)]
pub struct StockListing<'a> {
    pub items: Vec<&'a StockItem>,
    pub total_cost: Amount,
}

pub fn stock_listing<'a>(snapshot: &'a LedgerSnapshot, query: &StockQuery) -> StockListing<'a> {
    let upper = query.search.trim().to_uppercase();
    let lower = query.search.trim().to_lowercase();

    let mut items: Vec<&StockItem> = snapshot
        .stock_items
        .iter()
        .filter(|i| !query.available_only || i.is_available())
        .filter(|i| {
            i.external_code.contains(&upper) || i.brand.to_lowercase().contains(&lower)
        })
        .collect();
    items.sort_by(|a, b| natural_cmp(&a.external_code, &b.external_code));
    let total_cost = items.iter().map(|i| i.cost_price).sum();

    StockListing { items, total_cost }
}

/// The `limit` most recent sales, newest first
pub fn recent_sales(snapshot: &LedgerSnapshot, limit: usize) -> Vec<&SaleRecord> {
    snapshot.sales.iter().rev().take(limit).collect()
}
