//! Replay strategy module
//!
//! This module defines the Strategy pattern for replaying a command log
//! against a ledger, covering both CSV parsing and engine execution. The
//! implementation (sequential or conflict-group parallel) is selected at
//! runtime; both leave the store in the same final state.

use crate::cli::StrategyType;
use crate::core::{LedgerEngine, OwnerStore};
use crate::types::{LedgerCommand, LedgerError};
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, error, warn};

pub mod r#async;
pub mod sync;

pub use self::r#async::{AsyncProcessingStrategy, BatchConfig};
pub use sync::SyncProcessingStrategy;

/// Counts of what happened during a replay
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReplaySummary {
    /// Commands that committed
    pub applied: usize,
    /// Commands the engine refused (business rules, unknown names, conflicts)
    pub rejected: usize,
    /// Rows that could not be parsed into a command
    pub unreadable: usize,
}

impl ReplaySummary {
    /// Tally one command result, logging rejections
    pub(crate) fn record<T>(&mut self, command: &LedgerCommand, result: &Result<T, LedgerError>) {
        match result {
            Ok(_) => {
                self.applied += 1;
                debug!(command = %command, "command applied");
            }
            Err(e) if e.is_rejection() => {
                self.rejected += 1;
                warn!(command = %command, error = %e, "command rejected");
            }
            Err(e) => {
                self.rejected += 1;
                error!(command = %command, error = %e, "command failed");
            }
        }
    }
}

/// Replay strategy trait for complete command log pipelines
pub trait ProcessingStrategy: Send + Sync {
    /// Replay every command of a CSV log against the engine
    ///
    /// # Arguments
    ///
    /// * `input_path` - Path to the command log
    /// * `engine` - Engine over the (possibly pre-seeded) owner store
    ///
    /// # Returns
    ///
    /// * `Ok(ReplaySummary)` once the whole log was read
    /// * `Err(LedgerError)` if a fatal error occurred (file not found, runtime failure)
    ///
    /// Individual command failures are logged and counted, never returned;
    /// replay continues with the next command.
    fn replay(
        &self,
        input_path: &Path,
        engine: &Arc<LedgerEngine<OwnerStore>>,
    ) -> Result<ReplaySummary, LedgerError>;
}

/// Create a replay strategy based on the specified strategy type
///
/// # Arguments
///
/// * `strategy_type` - Sequential or conflict-group parallel replay
/// * `config` - Batch configuration for async replay (ignored for sync)
pub fn create_strategy(
    strategy_type: StrategyType,
    config: Option<BatchConfig>,
) -> Box<dyn ProcessingStrategy> {
    match strategy_type {
        StrategyType::Sync => Box::new(SyncProcessingStrategy),
        StrategyType::Async => Box::new(AsyncProcessingStrategy::new(config.unwrap_or_default())),
    }
}
