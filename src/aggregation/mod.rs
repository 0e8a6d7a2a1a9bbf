//! Aggregation layer
//!
//! Read-only derivations over a `LedgerSnapshot`. Nothing here touches the
//! store; callers take a snapshot (or receive one from the stats feed) and
//! recompute on every change.
//!
//! - `stats`: Dashboard totals (capital, profit, receivables, partner share)
//! - `insights`: Risk and high-debt classification of active customers
//! - `views`: Directory, history, partner-share ledger and stock listing

pub mod insights;
pub mod stats;
pub mod views;

pub use insights::{
    at_risk_customers, customer_insights, is_at_risk, is_high_debt, CustomerInsight, InsightRules,
};
pub use stats::{compute_stats, LedgerStats};
pub use views::{
    archived_customers, customer_directory, customer_history, natural_cmp, partner_ledger,
    recent_sales, stock_listing, HistoryEntry, StockListing, StockQuery,
};
