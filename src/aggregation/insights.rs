//! Customer insights
//!
//! Risk and high-debt classification. Both flags depend on the clock, so they
//! are recomputed against a caller-supplied `now` every time and never stored.

use crate::config::LedgerConfig;
use crate::types::{Amount, Customer, CustomerId, LedgerSnapshot, Timestamp};
use chrono::Duration;
use serde::Serialize;

/// Thresholds the classifier works with
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InsightRules {
    /// Inactivity longer than this puts an indebted customer at risk
    pub risk_window: Duration,
    /// Balances strictly above this count as high debt
    pub high_debt_threshold: Amount,
}

impl InsightRules {
    pub fn from_config(config: &LedgerConfig) -> Self {
        Self {
            risk_window: Duration::days(config.risk_window_days),
            high_debt_threshold: config.high_debt_threshold,
        }
    }
}

impl Default for InsightRules {
    fn default() -> Self {
        Self::from_config(&LedgerConfig::default())
    }
}

/// Classification of one active customer at a point in time
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomerInsight {
    pub customer_id: CustomerId,
    pub name: String,
    pub balance: Amount,
    pub last_activity: Timestamp,
    pub at_risk: bool,
    pub high_debt: bool,
}

/// Owes money and has been quiet for longer than the window
pub fn is_at_risk(customer: &Customer, now: Timestamp, window: Duration) -> bool {
    customer.balance() > 0 && now - customer.last_activity() > window
}

pub fn is_high_debt(customer: &Customer, threshold: Amount) -> bool {
    customer.balance() > threshold
}

/// Classify every active customer in the snapshot
///
/// Archived customers are skipped. Order follows the snapshot (join order).
pub fn customer_insights(
    snapshot: &LedgerSnapshot,
    now: Timestamp,
    rules: InsightRules,
) -> Vec<CustomerInsight> {
    snapshot
        .customers
        .iter()
        .filter(|c| c.is_active())
        .map(|c| CustomerInsight {
            customer_id: c.id,
            name: c.name.clone(),
            balance: c.balance(),
            last_activity: c.last_activity(),
            at_risk: is_at_risk(c, now, rules.risk_window),
            high_debt: is_high_debt(c, rules.high_debt_threshold),
        })
        .collect()
}

/// Active customers currently at risk, largest balance first
pub fn at_risk_customers(
    snapshot: &LedgerSnapshot,
    now: Timestamp,
    rules: InsightRules,
) -> Vec<CustomerInsight> {
    let mut flagged: Vec<_> = customer_insights(snapshot, now, rules)
        .into_iter()
        .filter(|i| i.at_risk)
        .collect();
    flagged.sort_by(|a, b| b.balance.cmp(&a.balance));
    flagged
}
