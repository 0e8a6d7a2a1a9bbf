//! Batch processing with conflict-group partitioning for async replay
//!
//! This module provides the `BatchProcessor` struct, which replays a batch of
//! commands concurrently while producing exactly the state a sequential replay
//! of the same batch would.
//!
//! # Design
//!
//! Two commands conflict when they touch the same customer (by name) or the
//! same stock code. Conflicts are transitive, so the batch is split into the
//! connected components of the "shares a key" relation:
//!
//! - Commands in one group run sequentially, in batch order
//! - Different groups run concurrently on tokio tasks
//! - Batches themselves are processed one after another by the caller
//!
//! A `return` names only a stock code, but it changes the bill of whichever
//! customer bought that unit last. That customer is looked up before
//! partitioning so the return joins the buyer's group.
//!
//! # Architecture
//!
//! ```text
//! BatchProcessor
//!     └── AsyncLedger<S>  (shared engine handle)
//! ```

use std::collections::HashMap;

use tracing::error;

use super::AsyncLedger;
use crate::core::dispatch::CommandOutcome;
use crate::core::traits::LedgerStore;
use crate::types::{ConflictKey, Customer, LedgerCommand, LedgerError};

/// Result of replaying a single command
#[derive(Debug, Clone)]
pub struct ProcessingResult {
    /// Position of the command in its batch
    pub index: usize,

    /// The command that was replayed
    pub command: LedgerCommand,

    /// The result of replaying it (success or rejection)
    pub result: Result<CommandOutcome, LedgerError>,
}

/// One conflict group: commands with their batch positions, in batch order
pub type ConflictGroup = Vec<(usize, LedgerCommand)>;

/// Batch processor with conflict-group partitioning
#[derive(Debug)]
pub struct BatchProcessor<S: LedgerStore> {
    ledger: AsyncLedger<S>,
}

impl<S: LedgerStore> Clone for BatchProcessor<S> {
    fn clone(&self) -> Self {
        Self {
            ledger: self.ledger.clone(),
        }
    }
}

impl<S: LedgerStore + 'static> BatchProcessor<S> {
    /// Create a new BatchProcessor
    ///
    /// # Arguments
    ///
    /// * `ledger` - Async engine handle shared by every group task
    pub fn new(ledger: AsyncLedger<S>) -> Self {
        Self { ledger }
    }

    pub fn ledger(&self) -> &AsyncLedger<S> {
        &self.ledger
    }

    /// Keys a command touches, including the buyer behind a `return`
    fn keys_for(&self, command: &LedgerCommand) -> Vec<ConflictKey> {
        let mut keys = command.conflict_keys();
        if let LedgerCommand::Return { code } = command {
            let engine = self.ledger.engine();
            let buyer = engine.resolve_latest_sale(code).ok().and_then(|sale| {
                engine
                    .store()
                    .find_customers(&|c: &Customer| c.id == sale.customer_id)
                    .ok()
                    .and_then(|found| found.into_iter().next())
            });
            if let Some(customer) = buyer {
                keys.push(ConflictKey::Customer(customer.name_key()));
            }
        }
        keys
    }

    /// Partition a batch into conflict groups
    ///
    /// # Arguments
    ///
    /// * `batch` - Commands in file order
    ///
    /// # Returns
    ///
    /// Groups ordered by their first command; inside a group, commands keep
    /// their batch order.
    ///
    /// # Guarantees
    ///
    /// - Each command appears in exactly one group
    /// - Two commands sharing a key always land in the same group
    pub fn partition(&self, batch: Vec<LedgerCommand>) -> Vec<ConflictGroup> {
        let mut sets = DisjointSet::new(batch.len());
        let mut owners: HashMap<ConflictKey, usize> = HashMap::new();

        for (index, command) in batch.iter().enumerate() {
            for key in self.keys_for(command) {
                match owners.get(&key) {
                    Some(&first) => sets.union(first, index),
                    None => {
                        owners.insert(key, index);
                    }
                }
            }
        }

        let mut slots: HashMap<usize, usize> = HashMap::new();
        let mut groups: Vec<ConflictGroup> = Vec::new();
        for (index, command) in batch.into_iter().enumerate() {
            let root = sets.find(index);
            let slot = *slots.entry(root).or_insert_with(|| {
                groups.push(Vec::new());
                groups.len() - 1
            });
            groups[slot].push((index, command));
        }
        groups
    }

    /// Replay one group sequentially
    ///
    /// Rejections are captured in the results and do not stop the group.
    pub async fn process_group(&self, group: ConflictGroup) -> Vec<ProcessingResult> {
        let mut results = Vec::with_capacity(group.len());

        for (index, command) in group {
            let result = self.ledger.apply(command.clone()).await;
            results.push(ProcessingResult {
                index,
                command,
                result,
            });
        }

        results
    }

    /// Replay a batch with conflict-group partitioning
    ///
    /// This method:
    /// 1. Partitions the batch into conflict groups
    /// 2. Spawns a tokio task per group
    /// 3. Waits for every task and returns all results in batch order
    ///
    /// # Guarantees
    ///
    /// - The store ends in the state a sequential replay of the batch produces
    /// - Every command yields exactly one result
    pub async fn process_batch(&self, batch: Vec<LedgerCommand>) -> Vec<ProcessingResult> {
        let groups = self.partition(batch);

        let mut tasks = Vec::with_capacity(groups.len());
        for group in groups {
            let processor = self.clone();
            tasks.push(tokio::spawn(
                async move { processor.process_group(group).await },
            ));
        }

        let mut results = Vec::new();
        for task in tasks {
            match task.await {
                Ok(group_results) => results.extend(group_results),
                Err(e) => error!(error = %e, "replay task failed"),
            }
        }

        results.sort_by_key(|r| r.index);
        results
    }
}

/// Union-find over batch positions
struct DisjointSet {
    parent: Vec<usize>,
}

impl DisjointSet {
    fn new(len: usize) -> Self {
        Self {
            parent: (0..len).collect(),
        }
    }

    fn find(&mut self, mut node: usize) -> usize {
        while self.parent[node] != node {
            self.parent[node] = self.parent[self.parent[node]];
            node = self.parent[node];
        }
        node
    }

    fn union(&mut self, a: usize, b: usize) {
        let (ra, rb) = (self.find(a), self.find(b));
        if ra != rb {
            // Lower position stays root so groups keep a stable identity
            let (root, child) = if ra < rb { (ra, rb) } else { (rb, ra) };
            self.parent[child] = root;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LedgerConfig;
    use crate::core::engine::LedgerEngine;
    use crate::core::memory_store::{MemoryStore, OwnerStore};
    use crate::types::{OwnerId, StockPricing};
    use rstest::{fixture, rstest};
    use std::sync::Arc;

    #[fixture]
    fn processor() -> BatchProcessor<OwnerStore> {
        let store = MemoryStore::default().scope(OwnerId::new("owner-1"));
        let engine = LedgerEngine::new(store, LedgerConfig::default());
        BatchProcessor::new(AsyncLedger::new(Arc::new(engine)))
    }

    fn intake(codes: &[&str]) -> LedgerCommand {
        LedgerCommand::Intake {
            codes: codes.iter().map(|c| c.to_string()).collect(),
            pricing: StockPricing::new("Khaadi", 1000, 1500),
        }
    }

    fn sale(customer: &str, codes: &[&str]) -> LedgerCommand {
        LedgerCommand::Sale {
            customer: customer.to_string(),
            codes: codes.iter().map(|c| c.to_string()).collect(),
            initial_payment: 0,
        }
    }

    fn payment(customer: &str, amount: i64) -> LedgerCommand {
        LedgerCommand::Payment {
            customer: customer.to_string(),
            amount,
        }
    }

    fn positions(groups: &[ConflictGroup]) -> Vec<Vec<usize>> {
        groups
            .iter()
            .map(|g| g.iter().map(|(i, _)| *i).collect())
            .collect()
    }

    #[rstest]
    fn test_partition_links_shared_keys(processor: BatchProcessor<OwnerStore>) {
        let batch = vec![
            intake(&["A1", "B2"]),
            sale("Ali", &["A1"]),
            payment("Sara", 100),
            sale("sara ", &["C3"]),
            payment("Zain", 100),
            sale("Zain", &["B2"]),
        ];

        let groups = processor.partition(batch);
        // A1 links 0-1, B2 links 0-5, Zain links 4-5, Sara links 2-3
        assert_eq!(positions(&groups), vec![vec![0, 1, 4, 5], vec![2, 3]]);
    }

    #[rstest]
    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_return_joins_the_buyers_group(processor: BatchProcessor<OwnerStore>) {
        processor
            .process_batch(vec![intake(&["A1"]), sale("Ali", &["A1"])])
            .await;

        let groups = processor.partition(vec![
            payment("Ali", 100),
            LedgerCommand::Return {
                code: "a1".to_string(),
            },
            payment("Sara", 100),
        ]);
        assert_eq!(positions(&groups), vec![vec![0, 1], vec![2]]);
    }

    #[rstest]
    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_results_come_back_in_batch_order(processor: BatchProcessor<OwnerStore>) {
        let batch = vec![
            intake(&["A1", "B2", "C3"]),
            sale("Ali", &["A1"]),
            sale("Sara", &["B2"]),
            sale("Zain", &["A1"]),
            payment("Ali", 2000),
            payment("Sara", 500),
        ];

        let results = processor.process_batch(batch).await;
        let indexes: Vec<usize> = results.iter().map(|r| r.index).collect();
        assert_eq!(indexes, vec![0, 1, 2, 3, 4, 5]);

        assert!(results[1].result.is_ok());
        assert_eq!(
            results[3].result.as_ref().err(),
            Some(&LedgerError::item_unavailable("A1"))
        );
        assert!(matches!(
            results[4].result,
            Err(LedgerError::ExceedsBalance { .. })
        ));

        let stats = processor.ledger().stats().await.unwrap();
        assert_eq!(stats.receivable, 1500 + 1000);
        assert_eq!(stats.stock_count, 1);
    }

    #[test]
    fn test_disjoint_set() {
        let mut sets = DisjointSet::new(5);
        sets.union(3, 4);
        sets.union(1, 4);
        assert_eq!(sets.find(4), 1);
        assert_eq!(sets.find(3), 1);
        assert_eq!(sets.find(0), 0);
        assert_eq!(sets.find(2), 2);
    }
}
