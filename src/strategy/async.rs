//! Asynchronous batch replay strategy
//!
//! This module provides a multi-threaded implementation of the
//! ProcessingStrategy trait. It replays the command log in batches using
//! conflict-group parallelism.
//!
//! # Architecture
//!
//! ```text
//! AsyncProcessingStrategy
//!     ├── BatchConfig (batch_size, max_concurrent_batches)
//!     ├── AsyncReader (batch CSV reading)
//!     └── BatchProcessor (conflict groups + tokio tasks)
//!         └── AsyncLedger (engine on the blocking pool)
//! ```
//!
//! # Ordering
//!
//! - Batches are replayed one after another
//! - Within a batch, commands sharing a customer or stock code run in file order
//! - Unrelated commands run concurrently
//!
//! The final state therefore equals a sequential replay of the same log.

use crate::core::{AsyncLedger, BatchProcessor, LedgerEngine, OwnerStore};
use crate::io::async_reader::AsyncReader;
use crate::strategy::{ProcessingStrategy, ReplaySummary};
use crate::types::LedgerError;
use std::path::Path;
use std::sync::Arc;
use tracing::{info, warn};

/// Configuration for batch replay
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BatchConfig {
    /// Number of commands per batch
    pub batch_size: usize,
    /// Number of runtime worker threads
    pub max_concurrent_batches: usize,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            batch_size: 1000,
            max_concurrent_batches: num_cpus::get(),
        }
    }
}

impl BatchConfig {
    /// Create a new BatchConfig; zero values fall back to the defaults
    pub fn new(batch_size: usize, max_concurrent_batches: usize) -> Self {
        let default = Self::default();

        let batch_size = if batch_size == 0 {
            warn!(
                batch_size,
                fallback = default.batch_size,
                "invalid batch size, using default"
            );
            default.batch_size
        } else {
            batch_size
        };

        let max_concurrent_batches = if max_concurrent_batches == 0 {
            warn!(
                max_concurrent_batches,
                fallback = default.max_concurrent_batches,
                "invalid concurrency, using default"
            );
            default.max_concurrent_batches
        } else {
            max_concurrent_batches
        };

        Self {
            batch_size,
            max_concurrent_batches,
        }
    }
}

/// Asynchronous batch replay strategy
#[derive(Debug, Clone)]
pub struct AsyncProcessingStrategy {
    config: BatchConfig,
}

impl AsyncProcessingStrategy {
    pub fn new(config: BatchConfig) -> Self {
        Self { config }
    }
}

impl ProcessingStrategy for AsyncProcessingStrategy {
    /// Replay the log batch by batch on a dedicated tokio runtime
    ///
    /// 1. Builds a multi-threaded runtime sized by `max_concurrent_batches`
    /// 2. Reads commands in batches with `AsyncReader`
    /// 3. Replays each batch through the `BatchProcessor` and waits for it
    ///    before reading the next
    ///
    /// # Errors
    ///
    /// `Io` if the runtime cannot be created or the file cannot be opened.
    fn replay(
        &self,
        input_path: &Path,
        engine: &Arc<LedgerEngine<OwnerStore>>,
    ) -> Result<ReplaySummary, LedgerError> {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(self.config.max_concurrent_batches)
            .build()
            .map_err(|e| LedgerError::Io {
                message: format!("Failed to create tokio runtime: {}", e),
            })?;

        runtime.block_on(async {
            let processor = BatchProcessor::new(AsyncLedger::new(Arc::clone(engine)));

            let file = tokio::fs::File::open(input_path)
                .await
                .map_err(|e| LedgerError::Io {
                    message: format!("Failed to open file '{}': {}", input_path.display(), e),
                })?;
            let compat_file = tokio_util::compat::TokioAsyncReadCompatExt::compat(file);
            let mut reader = AsyncReader::new(compat_file);

            let mut summary = ReplaySummary::default();
            let mut batches = 0usize;
            loop {
                let batch = reader.read_batch(self.config.batch_size).await;
                if batch.is_empty() {
                    break;
                }
                batches += 1;

                for outcome in processor.process_batch(batch).await {
                    summary.record(&outcome.command, &outcome.result);
                }
            }
            summary.unreadable = reader.skipped();

            info!(
                batches,
                applied = summary.applied,
                rejected = summary.rejected,
                "async replay finished"
            );
            Ok(summary)
        })
    }
}
