//! Synchronous replay strategy
//!
//! Reads the command log with `SyncReader` and applies each command in file
//! order on the calling thread. This is the reference behavior the async
//! strategy must reproduce.

use crate::core::{LedgerEngine, OwnerStore};
use crate::io::sync_reader::SyncReader;
use crate::strategy::{ProcessingStrategy, ReplaySummary};
use crate::types::LedgerError;
use std::path::Path;
use std::sync::Arc;
use tracing::warn;

/// Synchronous replay strategy
#[derive(Debug, Clone, Copy)]
pub struct SyncProcessingStrategy;

impl ProcessingStrategy for SyncProcessingStrategy {
    fn replay(
        &self,
        input_path: &Path,
        engine: &Arc<LedgerEngine<OwnerStore>>,
    ) -> Result<ReplaySummary, LedgerError> {
        let reader = SyncReader::new(input_path)?;
        let mut summary = ReplaySummary::default();

        for row in reader {
            match row {
                Ok(command) => {
                    let result = engine.apply(&command);
                    summary.record(&command, &result);
                }
                Err(error) => {
                    summary.unreadable += 1;
                    warn!(%error, "skipping unreadable command");
                }
            }
        }

        Ok(summary)
    }
}
