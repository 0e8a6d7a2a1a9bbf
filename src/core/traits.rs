//! Core traits for the document store the ledger runs on
//!
//! The engine depends only on these two traits: a way to take a consistent
//! snapshot of the four collections, and a way to submit an atomic
//! read-verify-write unit. Any store offering optimistic transactions and a
//! change feed can sit behind them.

use crate::types::{
    Customer, CustomerId, LedgerError, LedgerSnapshot, OwnerId, PaymentRecord, SaleRecord,
    SaleRecordId, StockItem, StockItemId, Timestamp,
};
use tokio::sync::watch;

/// One attempt of an atomic unit of work
///
/// Reads record the version they observed; writes are buffered and become
/// visible to later reads in the same attempt. Nothing reaches the store until
/// the body returns `Ok` and every observed version is still current.
pub trait Transaction {
    /// Store clock, read once when the attempt started
    fn now(&self) -> Timestamp;

    fn stock_item(&mut self, id: StockItemId) -> Result<Option<StockItem>, LedgerError>;

    fn customer(&mut self, id: CustomerId) -> Result<Option<Customer>, LedgerError>;

    fn sale_record(&mut self, id: SaleRecordId) -> Result<Option<SaleRecord>, LedgerError>;

    /// Active customer matching `name` case-insensitively, earliest joined
    /// first
    ///
    /// The absence of a match is observed too: a concurrent commit creating
    /// or reactivating a customer under this name aborts the attempt.
    fn active_customer_named(&mut self, name: &str) -> Result<Option<Customer>, LedgerError>;

    fn put_stock_item(&mut self, item: StockItem);

    fn delete_stock_item(&mut self, id: StockItemId);

    fn put_customer(&mut self, customer: Customer);

    fn append_payment(&mut self, record: PaymentRecord);

    fn put_sale_record(&mut self, record: SaleRecord);

    fn delete_sale_record(&mut self, id: SaleRecordId);
}

/// Owner-scoped document store with optimistic transactions
pub trait LedgerStore: Send + Sync {
    fn owner(&self) -> &OwnerId;

    /// Store clock
    fn now(&self) -> Timestamp;

    /// Consistent copy of all four collections
    fn snapshot(&self) -> Result<LedgerSnapshot, LedgerError>;

    /// Revision feed, bumped once per commit
    fn subscribe(&self) -> watch::Receiver<u64>;

    /// Run `body` as one atomic unit
    ///
    /// On a version conflict the whole body runs again against fresh reads,
    /// up to the configured attempt limit. A business error returned by the
    /// body discards its writes and is passed through untouched.
    ///
    /// # Errors
    ///
    /// - whatever `body` returns
    /// - `TransactionConflict` once attempts are exhausted
    /// - `WriteLimitExceeded` if the body buffered too many writes
    fn run_transaction<T, F>(&self, operation: &str, body: F) -> Result<T, LedgerError>
    where
        F: FnMut(&mut dyn Transaction) -> Result<T, LedgerError>;

    /// Insert new stock units as one atomic batch
    ///
    /// Fails with `DuplicateIdentifier` if any code is already taken at commit
    /// time; nothing from the batch is written in that case.
    fn insert_stock_batch(&self, items: Vec<StockItem>) -> Result<usize, LedgerError>;

    /// Upper bound on documents written by a single commit
    fn max_batch_writes(&self) -> usize;

    fn find_stock_by_code(&self, code: &str) -> Result<Option<StockItem>, LedgerError>;

    fn find_customers(
        &self,
        predicate: &dyn Fn(&Customer) -> bool,
    ) -> Result<Vec<Customer>, LedgerError>;

    fn find_sales(
        &self,
        predicate: &dyn Fn(&SaleRecord) -> bool,
    ) -> Result<Vec<SaleRecord>, LedgerError>;
}
