//! Ledger statistics
//!
//! Every figure is a pure function of one snapshot: no caching, no clock, no
//! hidden state. Running `compute_stats` twice on the same snapshot yields the
//! same `LedgerStats`.

use crate::types::{Amount, LedgerError, LedgerSnapshot, ShareRate};
use serde::Serialize;

/// Dashboard figures derived from the four collections
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LedgerStats {
    /// Cost of every unit on file, sold or not
    pub capital: Amount,

    /// Σ (profit − partner share) over booked sales
    pub realized_net_profit: Amount,

    /// Same deduction applied to unsold stock at its listed price
    pub projected_net_profit: Amount,

    pub total_net_profit: Amount,

    /// Σ max(0, balance) over active customers
    pub receivable: Amount,

    /// Σ total paid over all customers
    pub received: Amount,

    /// Units still on the shelf
    pub stock_count: usize,

    /// Cost of units still on the shelf
    pub stock_value: Amount,

    pub partner_share_total: Amount,
    pub partner_share_paid: Amount,
    pub partner_share_pending: Amount,
}

/// Compute statistics over a snapshot
///
/// # Arguments
///
/// * `snapshot` - Consistent copy of the four collections
/// * `rate` - Partner share rate for the projected deduction on unsold stock
///
/// # Errors
///
/// `ArithmeticOverflow` if an unsold unit's margin does not fit an `Amount`.
pub fn compute_stats(snapshot: &LedgerSnapshot, rate: ShareRate) -> Result<LedgerStats, LedgerError> {
    let mut stats = LedgerStats::default();

    for item in &snapshot.stock_items {
        stats.capital = stats.capital.saturating_add(item.cost_price);
        if item.is_available() {
            let margin = item.margin()?;
            stats.stock_count += 1;
            stats.stock_value = stats.stock_value.saturating_add(item.cost_price);
            stats.projected_net_profit = stats
                .projected_net_profit
                .saturating_add(margin - rate.apply(margin));
        }
    }

    for sale in &snapshot.sales {
        stats.realized_net_profit = stats.realized_net_profit.saturating_add(sale.net_profit());
        stats.partner_share_total = stats.partner_share_total.saturating_add(sale.partner_share);
        if sale.partner_share_paid {
            stats.partner_share_paid = stats.partner_share_paid.saturating_add(sale.partner_share);
        }
    }
    stats.partner_share_pending = stats.partner_share_total - stats.partner_share_paid;

    for customer in &snapshot.customers {
        stats.received = stats.received.saturating_add(customer.total_paid);
        if customer.is_active() {
            stats.receivable = stats.receivable.saturating_add(customer.balance().max(0));
        }
    }

    stats.total_net_profit = stats
        .realized_net_profit
        .saturating_add(stats.projected_net_profit);
    Ok(stats)
}
