//! Asynchronous layer over the ledger engine
//!
//! The engine and store are synchronous and thread-safe; this module adds the
//! pieces async callers need on top of them:
//!
//! - **AsyncLedger**: cloneable handle running engine commands on the blocking pool
//! - **BatchProcessor**: concurrent replay of conflict-free command groups
//! - **StatsFeed**: statistics recomputed after every store commit
//!
//! # Thread Safety
//!
//! Isolation comes entirely from the store's optimistic transactions. Tasks
//! share one `Arc<LedgerEngine>`; no lock is held across an await point.

pub mod batch_processor;
pub mod ledger;
pub mod stats_feed;

pub use batch_processor::{BatchProcessor, ConflictGroup, ProcessingResult};
pub use ledger::AsyncLedger;
pub use stats_feed::StatsFeed;
