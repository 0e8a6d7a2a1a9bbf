//! Retail ledger library
//!
//! # Overview
//!
//! Transactional bookkeeping for a small retail business that sells
//! individually tracked stock units on credit: customers carry a running
//! balance, payments and refunds move money, returns put units back on the
//! shelf, and a partner takes a configurable share of each sale's profit.
//!
//! # Architecture
//!
//! - [`types`] - Fixed-shape records, identifiers, money, commands and errors
//! - [`core`] - Store contract, in-memory optimistic store and the engine:
//!   - [`core::engine`] - Atomic sale, return, payment, archive and settle commands
//!   - [`core::intake`] - Chunked stock intake
//!   - [`core::memory_store`] - Owner-partitioned document store with retrying transactions
//!   - `core::async` - Async facade, conflict-group batch replay, live statistics
//! - [`aggregation`] - Pure statistics, customer insights and list views
//! - [`io`] - CSV command logs, CSV reports, JSON snapshots
//! - [`strategy`] - Sequential and parallel replay pipelines
//! - [`config`], [`cli`], [`logging`] - The binary's outer surface
//!
//! # Money
//!
//! All amounts are whole currency units (`i64`). The partner share of a sale is
//! `round(max(0, profit) * rate)` with halves rounded up.

pub mod aggregation;
pub mod cli;
pub mod config;
pub mod core;
pub mod io;
pub mod logging;
pub mod strategy;
pub mod types;

pub use aggregation::{compute_stats, LedgerStats};
pub use config::LedgerConfig;
pub use core::{LedgerEngine, LedgerStore, MemoryStore, OwnerStore};
pub use types::{
    Customer, LedgerCommand, LedgerError, LedgerSnapshot, PaymentRecord, SaleRecord, ShareRate,
    StockItem,
};
