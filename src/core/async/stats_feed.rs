//! Live statistics feed
//!
//! `StatsFeed` follows the store's revision counter and yields freshly
//! computed `LedgerStats` after every commit. Nothing is cached between
//! revisions; several commits landing before the consumer polls collapse into
//! one recomputation over the newest snapshot.

use std::sync::Arc;

use tokio::sync::watch;
use tracing::debug;

use crate::aggregation::LedgerStats;
use crate::core::engine::LedgerEngine;
use crate::core::traits::LedgerStore;
use crate::types::LedgerError;

/// Statistics that follow the store
#[derive(Debug)]
pub struct StatsFeed<S: LedgerStore> {
    engine: Arc<LedgerEngine<S>>,
    revisions: watch::Receiver<u64>,
}

impl<S: LedgerStore + 'static> StatsFeed<S> {
    /// Start following the engine's store from its current revision
    pub fn new(engine: Arc<LedgerEngine<S>>) -> Self {
        let revisions = engine.store().subscribe();
        Self { engine, revisions }
    }

    /// Revision the feed last observed
    pub fn revision(&self) -> u64 {
        *self.revisions.borrow()
    }

    /// Statistics as of now, without waiting for a change
    pub async fn current(&self) -> Result<LedgerStats, LedgerError> {
        let engine = Arc::clone(&self.engine);
        tokio::task::spawn_blocking(move || engine.stats()).await?
    }

    /// Wait for the next commit and recompute
    ///
    /// # Returns
    ///
    /// * `Some(Ok(stats))` after a commit
    /// * `Some(Err(..))` if the snapshot could not be decoded
    /// * `None` once the store is gone
    pub async fn next(&mut self) -> Option<Result<LedgerStats, LedgerError>> {
        self.revisions.changed().await.ok()?;
        let revision = *self.revisions.borrow_and_update();
        debug!(revision, "recomputing statistics");
        Some(self.current().await)
    }
}
