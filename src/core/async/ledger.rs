//! Async facade over the ledger engine
//!
//! This module provides `AsyncLedger`, a cloneable handle that runs engine
//! commands from async code. Engine operations are synchronous and may spin
//! through optimistic retries, so each call is moved onto tokio's blocking
//! pool instead of running on a runtime worker.
//!
//! # Architecture
//!
//! ```text
//! AsyncLedger
//!     └── Arc<LedgerEngine<S>>  (shared engine, one store partition)
//! ```

use std::sync::Arc;

use crate::aggregation::LedgerStats;
use crate::core::dispatch::CommandOutcome;
use crate::core::engine::LedgerEngine;
use crate::core::traits::LedgerStore;
use crate::types::{LedgerCommand, LedgerError, LedgerSnapshot};

/// Cloneable async handle to a `LedgerEngine`
#[derive(Debug)]
pub struct AsyncLedger<S: LedgerStore> {
    engine: Arc<LedgerEngine<S>>,
}

impl<S: LedgerStore> Clone for AsyncLedger<S> {
    fn clone(&self) -> Self {
        Self {
            engine: Arc::clone(&self.engine),
        }
    }
}

impl<S: LedgerStore + 'static> AsyncLedger<S> {
    /// Create a new AsyncLedger
    ///
    /// # Arguments
    ///
    /// * `engine` - Arc-wrapped engine shared by every clone of the handle
    pub fn new(engine: Arc<LedgerEngine<S>>) -> Self {
        Self { engine }
    }

    pub fn engine(&self) -> &Arc<LedgerEngine<S>> {
        &self.engine
    }

    /// Resolve and execute one command on the blocking pool
    ///
    /// # Errors
    ///
    /// Whatever `LedgerEngine::apply` rejects the command with, or
    /// `TaskFailed` if the worker panicked.
    pub async fn apply(&self, command: LedgerCommand) -> Result<CommandOutcome, LedgerError> {
        let engine = Arc::clone(&self.engine);
        tokio::task::spawn_blocking(move || engine.apply(&command)).await?
    }

    pub async fn snapshot(&self) -> Result<LedgerSnapshot, LedgerError> {
        let engine = Arc::clone(&self.engine);
        tokio::task::spawn_blocking(move || engine.snapshot()).await?
    }

    pub async fn stats(&self) -> Result<LedgerStats, LedgerError> {
        let engine = Arc::clone(&self.engine);
        tokio::task::spawn_blocking(move || engine.stats()).await?
    }
}
