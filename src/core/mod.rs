//! Core business logic module
//!
//! This module contains the ledger's transaction processing components:
//! - `traits` - Store contract (`LedgerStore`, `Transaction`)
//! - `memory_store` - In-memory optimistic document store, partitioned by owner
//! - `clock` - Store clock abstraction
//! - `engine` - Atomic ledger commands (sale, return, payment, archive, settle)
//! - `intake` - Chunked stock intake with partial-success reporting
//! - `dispatch` - Resolution of named commands to engine calls
//! - `async` - Async facade, concurrent batch replay and live statistics

pub mod r#async;
pub mod clock;
pub mod dispatch;
pub mod engine;
pub mod intake;
pub mod memory_store;
pub mod traits;

pub use clock::{Clock, ManualClock, SystemClock};
pub use dispatch::CommandOutcome;
pub use engine::{LedgerEngine, ReturnReceipt, SaleReceipt};
pub use intake::IntakeReport;
pub use memory_store::{MemoryStore, OwnerStore};
pub use r#async::{AsyncLedger, BatchProcessor, ProcessingResult, StatsFeed};
pub use traits::{LedgerStore, Transaction};
