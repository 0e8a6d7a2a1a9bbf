//! In-memory optimistic document store
//!
//! `MemoryStore` keeps one partition per owner. Each partition holds the four
//! collections as raw JSON documents in `DashMap`s, tagged with the version of
//! the commit that last wrote them. Reads decode documents strictly, so a
//! malformed document surfaces as `MalformedDocument` at the read site.
//!
//! # Transactions
//!
//! A `MemoryTransaction` records the version of every document it reads and
//! buffers every write. Commit takes the partition's write gate, checks that
//! all observed versions are still current, and applies the buffered writes
//! under a single new version. A stale read is a conflict: the whole body is
//! run again against fresh reads.
//!
//! Customer resolution by name is guarded by a per-name version that moves
//! whenever a customer under that name is created, archived, restored or
//! renamed, so two sales racing to create "Ali" cannot both succeed while sales
//! to different names never conflict.

use crate::config::StoreConfig;
use crate::core::clock::{Clock, SystemClock};
use crate::core::traits::{LedgerStore, Transaction};
use crate::types::document::{decode, encode, encode_checked, LedgerDocument};
use crate::types::{
    name_key, Customer, CustomerId, LedgerError, LedgerSnapshot, OwnerId, PaymentRecord,
    PaymentRecordId, SaleRecord, SaleRecordId, StockItem, StockItemId, Timestamp,
};
use dashmap::DashMap;
use serde_json::Value;
use std::collections::{BTreeSet, HashMap};
use std::hash::Hash;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tokio::sync::watch;
use tracing::{debug, trace};

/// Raw document plus the version of the commit that wrote it
#[derive(Debug, Clone)]
struct Versioned {
    version: u64,
    doc: Value,
}

/// Identity of something a transaction observed
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum ReadKey {
    Stock(StockItemId),
    Customer(CustomerId),
    Sale(SaleRecordId),
    /// Set of active customers under one normalized name
    Name(String),
}

/// One owner's collections
#[derive(Debug)]
struct Partition {
    /// Held shared by reads, exclusively by commits
    gate: RwLock<()>,
    stock: DashMap<StockItemId, Versioned>,
    customers: DashMap<CustomerId, Versioned>,
    payments: DashMap<PaymentRecordId, Versioned>,
    sales: DashMap<SaleRecordId, Versioned>,
    /// External code -> stock unit
    codes: DashMap<String, StockItemId>,
    /// Normalized customer name -> version of the last change to its active set
    names: DashMap<String, u64>,
    version: AtomicU64,
    revision: watch::Sender<u64>,
}

impl Partition {
    fn new() -> Self {
        let (revision, _) = watch::channel(0);
        Partition {
            gate: RwLock::new(()),
            stock: DashMap::new(),
            customers: DashMap::new(),
            payments: DashMap::new(),
            sales: DashMap::new(),
            codes: DashMap::new(),
            names: DashMap::new(),
            version: AtomicU64::new(0),
            revision,
        }
    }

    fn read_gate(&self) -> RwLockReadGuard<'_, ()> {
        self.gate.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write_gate(&self) -> RwLockWriteGuard<'_, ()> {
        self.gate.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Current version of an observed key; 0 means absent
    fn current_version(&self, key: &ReadKey) -> u64 {
        match key {
            ReadKey::Stock(id) => self.stock.get(id).map(|e| e.version),
            ReadKey::Customer(id) => self.customers.get(id).map(|e| e.version),
            ReadKey::Sale(id) => self.sales.get(id).map(|e| e.version),
            ReadKey::Name(key) => self.names.get(key).map(|v| *v),
        }
        .unwrap_or(0)
    }

    /// Claim the next commit version; caller must hold the write gate
    fn next_version(&self) -> u64 {
        self.version.fetch_add(1, Ordering::SeqCst) + 1
    }

    fn publish(&self, version: u64) {
        self.revision.send_replace(version);
    }

    fn get_raw<K: Eq + Hash>(map: &DashMap<K, Versioned>, id: &K) -> Option<Versioned> {
        map.get(id).map(|entry| entry.value().clone())
    }

    fn all_raw<K: Eq + Hash>(map: &DashMap<K, Versioned>) -> Vec<Value> {
        map.iter().map(|entry| entry.value().doc.clone()).collect()
    }
}

/// Name key and active flag of a raw customer document, without a full decode
fn customer_identity(doc: &Value) -> Option<(String, bool)> {
    let name = doc.get("name")?.as_str()?;
    let active = doc.get("status").and_then(Value::as_str) != Some("deleted");
    Some((name_key(name), active))
}

fn decode_all<T: LedgerDocument>(raw: Vec<Value>) -> Result<Vec<T>, LedgerError> {
    raw.into_iter().map(decode).collect()
}

/// Multi-tenant in-memory store
#[derive(Debug)]
pub struct MemoryStore {
    partitions: DashMap<OwnerId, Arc<Partition>>,
    config: StoreConfig,
    clock: Arc<dyn Clock>,
}

impl MemoryStore {
    pub fn new(config: StoreConfig) -> Self {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    pub fn with_clock(config: StoreConfig, clock: Arc<dyn Clock>) -> Self {
        MemoryStore {
            partitions: DashMap::new(),
            config,
            clock,
        }
    }

    /// Handle on one owner's partition, created empty on first use
    pub fn scope(&self, owner: OwnerId) -> OwnerStore {
        let partition = self
            .partitions
            .entry(owner.clone())
            .or_insert_with(|| Arc::new(Partition::new()))
            .clone();

        OwnerStore {
            owner,
            partition,
            config: self.config.clone(),
            clock: Arc::clone(&self.clock),
        }
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new(StoreConfig::default())
    }
}

/// Outcome of a failed commit
enum CommitFailure {
    /// An observed document changed; run the body again
    Conflict,
    /// The commit can never succeed as written
    Rejected(LedgerError),
}

/// One owner's view of a `MemoryStore`
#[derive(Debug, Clone)]
pub struct OwnerStore {
    owner: OwnerId,
    partition: Arc<Partition>,
    config: StoreConfig,
    clock: Arc<dyn Clock>,
}

impl OwnerStore {
    /// Replace nothing, add everything: write every document of `snapshot`
    /// into this partition as one commit
    ///
    /// # Errors
    ///
    /// Returns `MalformedDocument` if a record breaks its shape invariants
    /// (negative prices, a bad quantity, ...), or `DuplicateIdentifier` if a
    /// stock code in the snapshot is already held by a different unit in the
    /// partition. Nothing is loaded in either case.
    pub fn load_snapshot(&self, snapshot: &LedgerSnapshot) -> Result<u64, LedgerError> {
        let stock = snapshot
            .stock_items
            .iter()
            .map(|item| Ok((item.id, item.external_code.clone(), encode_checked(item)?)))
            .collect::<Result<Vec<_>, LedgerError>>()?;
        let customers = snapshot
            .customers
            .iter()
            .map(|c| Ok((c.id, encode_checked(c)?)))
            .collect::<Result<Vec<_>, LedgerError>>()?;
        let payments = snapshot
            .payments
            .iter()
            .map(|p| Ok((p.id, encode_checked(p)?)))
            .collect::<Result<Vec<_>, LedgerError>>()?;
        let sales = snapshot
            .sales
            .iter()
            .map(|s| Ok((s.id, encode_checked(s)?)))
            .collect::<Result<Vec<_>, LedgerError>>()?;

        let p = &self.partition;
        let _gate = p.write_gate();

        let taken: Vec<String> = stock
            .iter()
            .filter(|(id, code, _)| p.codes.get(code).is_some_and(|owner| *owner != *id))
            .map(|(_, code, _)| code.clone())
            .collect();
        if !taken.is_empty() {
            return Err(LedgerError::duplicate_codes(taken, false));
        }

        let version = p.next_version();
        for (id, code, doc) in stock {
            p.codes.insert(code, id);
            p.stock.insert(id, Versioned { version, doc });
        }
        for customer in &snapshot.customers {
            p.names.insert(customer.name_key(), version);
        }
        for (id, doc) in customers {
            p.customers.insert(id, Versioned { version, doc });
        }
        for (id, doc) in payments {
            p.payments.insert(id, Versioned { version, doc });
        }
        for (id, doc) in sales {
            p.sales.insert(id, Versioned { version, doc });
        }
        p.publish(version);

        debug!(
            owner = %self.owner,
            version,
            stock = snapshot.stock_items.len(),
            customers = snapshot.customers.len(),
            "loaded snapshot"
        );
        Ok(version)
    }

    /// Write a raw customer document as an external writer could, bypassing
    /// record validation
    #[cfg(test)]
    pub(crate) fn put_raw_customer(&self, id: CustomerId, doc: Value) {
        let p = &self.partition;
        let _gate = p.write_gate();
        let version = p.next_version();
        let previous = Partition::get_raw(&p.customers, &id).and_then(|old| customer_identity(&old.doc));
        for (key, _) in previous.into_iter().chain(customer_identity(&doc)) {
            p.names.insert(key, version);
        }
        p.customers.insert(id, Versioned { version, doc });
        p.publish(version);
    }

    fn commit(&self, tx: MemoryTransaction<'_>) -> Result<u64, CommitFailure> {
        let writes = tx.write_count();
        if writes > self.config.max_writes_per_commit {
            return Err(CommitFailure::Rejected(LedgerError::write_limit_exceeded(
                writes,
                self.config.max_writes_per_commit,
            )));
        }
        if writes == 0 {
            return Ok(self.partition.version.load(Ordering::SeqCst));
        }

        let encoded = tx.encode_writes().map_err(CommitFailure::Rejected)?;
        let p = &self.partition;
        let _gate = p.write_gate();

        for (key, observed) in &tx.reads {
            if p.current_version(key) != *observed {
                trace!(?key, observed, "stale read");
                return Err(CommitFailure::Conflict);
            }
        }

        for (item, _) in &encoded.stock_puts {
            let held_by_other = p
                .codes
                .get(&item.external_code)
                .is_some_and(|owner| *owner != item.id);
            if held_by_other {
                return Err(CommitFailure::Rejected(LedgerError::duplicate_codes(
                    vec![item.external_code.clone()],
                    false,
                )));
            }
        }

        let version = p.next_version();

        for (item, doc) in encoded.stock_puts {
            p.codes.insert(item.external_code.clone(), item.id);
            p.stock.insert(item.id, Versioned { version, doc });
        }
        for id in encoded.stock_deletes {
            if let Some((_, old)) = p.stock.remove(&id) {
                if let Some(code) = old.doc.get("externalCode").and_then(Value::as_str) {
                    p.codes.remove(code);
                }
            }
        }

        for (customer, doc) in encoded.customers {
            let previous = Partition::get_raw(&p.customers, &customer.id)
                .and_then(|old| customer_identity(&old.doc));
            let current = (customer.name_key(), customer.is_active());
            if previous.as_ref() != Some(&current) {
                if let Some((old_key, _)) = previous {
                    p.names.insert(old_key, version);
                }
                p.names.insert(current.0, version);
            }
            p.customers.insert(customer.id, Versioned { version, doc });
        }

        for (id, doc) in encoded.payments {
            p.payments.insert(id, Versioned { version, doc });
        }
        for (id, doc) in encoded.sale_puts {
            p.sales.insert(id, Versioned { version, doc });
        }
        for id in encoded.sale_deletes {
            p.sales.remove(&id);
        }

        p.publish(version);
        Ok(version)
    }
}

impl LedgerStore for OwnerStore {
    fn owner(&self) -> &OwnerId {
        &self.owner
    }

    fn now(&self) -> Timestamp {
        self.clock.now()
    }

    fn snapshot(&self) -> Result<LedgerSnapshot, LedgerError> {
        let p = &self.partition;
        let (stock, customers, payments, sales, revision) = {
            let _gate = p.read_gate();
            (
                Partition::all_raw(&p.stock),
                Partition::all_raw(&p.customers),
                Partition::all_raw(&p.payments),
                Partition::all_raw(&p.sales),
                p.version.load(Ordering::SeqCst),
            )
        };

        let mut snapshot = LedgerSnapshot::new(
            decode_all(stock)?,
            decode_all(customers)?,
            decode_all(payments)?,
            decode_all(sales)?,
        );
        snapshot.revision = revision;
        snapshot.taken_at = Some(self.clock.now());
        Ok(snapshot)
    }

    fn subscribe(&self) -> watch::Receiver<u64> {
        self.partition.revision.subscribe()
    }

    fn run_transaction<T, F>(&self, operation: &str, mut body: F) -> Result<T, LedgerError>
    where
        F: FnMut(&mut dyn Transaction) -> Result<T, LedgerError>,
    {
        let attempts = self.config.max_attempts;
        for attempt in 1..=attempts {
            let mut tx = MemoryTransaction::new(&self.partition, self.clock.now());
            let value = body(&mut tx)?;

            match self.commit(tx) {
                Ok(version) => {
                    trace!(operation, attempt, version, "committed");
                    return Ok(value);
                }
                Err(CommitFailure::Conflict) => {
                    debug!(operation, attempt, "optimistic conflict, retrying");
                    std::thread::yield_now();
                }
                Err(CommitFailure::Rejected(error)) => return Err(error),
            }
        }
        Err(LedgerError::transaction_conflict(operation, attempts))
    }

    fn insert_stock_batch(&self, items: Vec<StockItem>) -> Result<usize, LedgerError> {
        if items.len() > self.config.max_writes_per_commit {
            return Err(LedgerError::write_limit_exceeded(
                items.len(),
                self.config.max_writes_per_commit,
            ));
        }
        let encoded = items
            .iter()
            .map(|item| Ok((item, encode_checked(item)?)))
            .collect::<Result<Vec<_>, LedgerError>>()?;

        let p = &self.partition;
        let _gate = p.write_gate();

        let mut seen = BTreeSet::new();
        let mut in_batch = Vec::new();
        let mut existing = Vec::new();
        for item in &items {
            if !seen.insert(item.external_code.as_str()) {
                in_batch.push(item.external_code.clone());
            } else if p.codes.contains_key(&item.external_code) {
                existing.push(item.external_code.clone());
            }
        }
        if !in_batch.is_empty() {
            return Err(LedgerError::duplicate_codes(in_batch, true));
        }
        if !existing.is_empty() {
            return Err(LedgerError::duplicate_codes(existing, false));
        }

        let version = p.next_version();
        for (item, doc) in encoded {
            p.codes.insert(item.external_code.clone(), item.id);
            p.stock.insert(item.id, Versioned { version, doc });
        }
        p.publish(version);
        Ok(items.len())
    }

    fn max_batch_writes(&self) -> usize {
        self.config.max_writes_per_commit
    }

    fn find_stock_by_code(&self, code: &str) -> Result<Option<StockItem>, LedgerError> {
        let p = &self.partition;
        let raw = {
            let _gate = p.read_gate();
            p.codes
                .get(code)
                .map(|id| *id)
                .and_then(|id| Partition::get_raw(&p.stock, &id))
        };
        raw.map(|v| decode(v.doc)).transpose()
    }

    fn find_customers(
        &self,
        predicate: &dyn Fn(&Customer) -> bool,
    ) -> Result<Vec<Customer>, LedgerError> {
        let raw = {
            let _gate = self.partition.read_gate();
            Partition::all_raw(&self.partition.customers)
        };
        let mut found: Vec<Customer> = decode_all::<Customer>(raw)?
            .into_iter()
            .filter(|c| predicate(c))
            .collect();
        found.sort_by(|a, b| a.joined_at.cmp(&b.joined_at).then(a.id.cmp(&b.id)));
        Ok(found)
    }

    fn find_sales(
        &self,
        predicate: &dyn Fn(&SaleRecord) -> bool,
    ) -> Result<Vec<SaleRecord>, LedgerError> {
        let raw = {
            let _gate = self.partition.read_gate();
            Partition::all_raw(&self.partition.sales)
        };
        let mut found: Vec<SaleRecord> = decode_all::<SaleRecord>(raw)?
            .into_iter()
            .filter(|s| predicate(s))
            .collect();
        found.sort_by(|a, b| a.occurred_at.cmp(&b.occurred_at).then(a.id.cmp(&b.id)));
        Ok(found)
    }
}

/// Buffered writes, encoded and ready to apply
struct EncodedWrites {
    stock_puts: Vec<(StockItem, Value)>,
    stock_deletes: Vec<StockItemId>,
    customers: Vec<(Customer, Value)>,
    payments: Vec<(PaymentRecordId, Value)>,
    sale_puts: Vec<(SaleRecordId, Value)>,
    sale_deletes: Vec<SaleRecordId>,
}

/// One attempt against a partition
struct MemoryTransaction<'a> {
    partition: &'a Partition,
    now: Timestamp,
    /// First version observed per key
    reads: HashMap<ReadKey, u64>,
    /// `None` marks a delete
    stock: HashMap<StockItemId, Option<StockItem>>,
    customers: HashMap<CustomerId, Customer>,
    sales: HashMap<SaleRecordId, Option<SaleRecord>>,
    payments: Vec<PaymentRecord>,
}

impl<'a> MemoryTransaction<'a> {
    fn new(partition: &'a Partition, now: Timestamp) -> Self {
        MemoryTransaction {
            partition,
            now,
            reads: HashMap::new(),
            stock: HashMap::new(),
            customers: HashMap::new(),
            sales: HashMap::new(),
            payments: Vec::new(),
        }
    }

    fn write_count(&self) -> usize {
        self.stock.len() + self.customers.len() + self.sales.len() + self.payments.len()
    }

    /// Read a committed document and remember the version seen
    fn observe<K, T>(
        &mut self,
        map: &DashMap<K, Versioned>,
        id: K,
        key: ReadKey,
    ) -> Result<Option<T>, LedgerError>
    where
        K: Eq + Hash,
        T: LedgerDocument,
    {
        let raw = {
            let _gate = self.partition.read_gate();
            Partition::get_raw(map, &id)
        };
        self.reads
            .entry(key)
            .or_insert_with(|| raw.as_ref().map_or(0, |v| v.version));
        raw.map(|v| decode(v.doc)).transpose()
    }

    fn encode_writes(&self) -> Result<EncodedWrites, LedgerError> {
        let mut writes = EncodedWrites {
            stock_puts: Vec::new(),
            stock_deletes: Vec::new(),
            customers: Vec::new(),
            payments: Vec::new(),
            sale_puts: Vec::new(),
            sale_deletes: Vec::new(),
        };

        for (id, item) in &self.stock {
            match item {
                Some(item) => writes.stock_puts.push((item.clone(), encode(item)?)),
                None => writes.stock_deletes.push(*id),
            }
        }
        for customer in self.customers.values() {
            writes.customers.push((customer.clone(), encode(customer)?));
        }
        for payment in &self.payments {
            writes.payments.push((payment.id, encode(payment)?));
        }
        for (id, sale) in &self.sales {
            match sale {
                Some(sale) => writes.sale_puts.push((*id, encode(sale)?)),
                None => writes.sale_deletes.push(*id),
            }
        }
        Ok(writes)
    }
}

impl Transaction for MemoryTransaction<'_> {
    fn now(&self) -> Timestamp {
        self.now
    }

    fn stock_item(&mut self, id: StockItemId) -> Result<Option<StockItem>, LedgerError> {
        if let Some(buffered) = self.stock.get(&id) {
            return Ok(buffered.clone());
        }
        let partition = self.partition;
        self.observe(&partition.stock, id, ReadKey::Stock(id))
    }

    fn customer(&mut self, id: CustomerId) -> Result<Option<Customer>, LedgerError> {
        if let Some(buffered) = self.customers.get(&id) {
            return Ok(Some(buffered.clone()));
        }
        let partition = self.partition;
        self.observe(&partition.customers, id, ReadKey::Customer(id))
    }

    fn sale_record(&mut self, id: SaleRecordId) -> Result<Option<SaleRecord>, LedgerError> {
        if let Some(buffered) = self.sales.get(&id) {
            return Ok(buffered.clone());
        }
        let partition = self.partition;
        self.observe(&partition.sales, id, ReadKey::Sale(id))
    }

    fn active_customer_named(&mut self, name: &str) -> Result<Option<Customer>, LedgerError> {
        let key = name_key(name);
        let partition = self.partition;

        let (name_version, candidates) = {
            let _gate = partition.read_gate();
            let name_version = partition.names.get(&key).map_or(0, |v| *v);
            let candidates: Vec<(CustomerId, Versioned)> = partition
                .customers
                .iter()
                .filter(|entry| {
                    customer_identity(&entry.value().doc)
                        .is_some_and(|(k, active)| active && k == key)
                })
                .map(|entry| (*entry.key(), entry.value().clone()))
                .collect();
            (name_version, candidates)
        };
        self.reads
            .entry(ReadKey::Name(key.clone()))
            .or_insert(name_version);

        let mut matches = Vec::new();
        for (id, raw) in candidates {
            if self.customers.contains_key(&id) {
                continue;
            }
            self.reads
                .entry(ReadKey::Customer(id))
                .or_insert(raw.version);
            matches.push(decode::<Customer>(raw.doc)?);
        }
        matches.extend(
            self.customers
                .values()
                .filter(|c| c.is_active() && c.name_key() == key)
                .cloned(),
        );

        Ok(matches
            .into_iter()
            .min_by(|a, b| a.joined_at.cmp(&b.joined_at).then(a.id.cmp(&b.id))))
    }

    fn put_stock_item(&mut self, item: StockItem) {
        self.stock.insert(item.id, Some(item));
    }

    fn delete_stock_item(&mut self, id: StockItemId) {
        self.stock.insert(id, None);
    }

    fn put_customer(&mut self, customer: Customer) {
        self.customers.insert(customer.id, customer);
    }

    fn append_payment(&mut self, record: PaymentRecord) {
        self.payments.push(record);
    }

    fn put_sale_record(&mut self, record: SaleRecord) {
        self.sales.insert(record.id, Some(record));
    }

    fn delete_sale_record(&mut self, id: SaleRecordId) {
        self.sales.insert(id, None);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::clock::ManualClock;
    use chrono::{TimeZone, Utc};
    use serde_json::json;

    fn store() -> OwnerStore {
        MemoryStore::default().scope(OwnerId::new("owner-1"))
    }

    fn unit(code: &str) -> StockItem {
        StockItem {
            id: StockItemId::new(),
            external_code: code.to_string(),
            brand: "Khaadi".to_string(),
            cost_price: 1000,
            sale_price: 1500,
            available_qty: 1,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_owners_are_isolated() {
        let memory = MemoryStore::default();
        let a = memory.scope(OwnerId::new("a"));
        let b = memory.scope(OwnerId::new("b"));

        a.insert_stock_batch(vec![unit("A1")]).unwrap();
        assert_eq!(a.snapshot().unwrap().stock_items.len(), 1);
        assert!(b.snapshot().unwrap().stock_items.is_empty());
        // The same code is free in another owner's partition
        assert_eq!(b.insert_stock_batch(vec![unit("A1")]).unwrap(), 1);
    }

    #[test]
    fn test_scope_twice_shares_partition() {
        let memory = MemoryStore::default();
        memory
            .scope(OwnerId::new("a"))
            .insert_stock_batch(vec![unit("A1")])
            .unwrap();
        let again = memory.scope(OwnerId::new("a"));
        assert!(again.find_stock_by_code("A1").unwrap().is_some());
    }

    #[test]
    fn test_body_error_discards_writes() {
        let store = store();
        let result: Result<(), _> = store.run_transaction("test", |tx| {
            tx.put_customer(Customer::new(CustomerId::new(), "Ali", tx.now()));
            Err(LedgerError::validation("nope"))
        });

        assert_eq!(result, Err(LedgerError::validation("nope")));
        assert!(store.snapshot().unwrap().customers.is_empty());
    }

    #[test]
    fn test_reads_see_buffered_writes() {
        let store = store();
        let item = unit("A1");
        store.insert_stock_batch(vec![item.clone()]).unwrap();

        store
            .run_transaction("test", |tx| {
                let mut sold = tx.stock_item(item.id)?.unwrap();
                sold.mark_sold();
                tx.put_stock_item(sold);
                assert!(!tx.stock_item(item.id)?.unwrap().is_available());
                Ok(())
            })
            .unwrap();

        let stored = store.find_stock_by_code("A1").unwrap().unwrap();
        assert!(!stored.is_available());
    }

    #[test]
    fn test_stale_read_retries_whole_body() {
        let store = store();
        let customer = Customer::new(CustomerId::new(), "Ali", Utc::now());
        store
            .run_transaction("seed", |tx| {
                tx.put_customer(customer.clone());
                Ok(())
            })
            .unwrap();

        let mut runs = 0;
        store
            .run_transaction("test", |tx| {
                runs += 1;
                let mut current = tx.customer(customer.id)?.unwrap();
                if runs == 1 {
                    // Another session commits between our read and our commit
                    store.run_transaction("interloper", |inner| {
                        let mut c = inner.customer(customer.id)?.unwrap();
                        c.total_billed += 100;
                        inner.put_customer(c);
                        Ok(())
                    })?;
                }
                current.total_billed += 1000;
                tx.put_customer(current);
                Ok(())
            })
            .unwrap();

        assert_eq!(runs, 2);
        let stored = store.snapshot().unwrap();
        assert_eq!(stored.customers[0].total_billed, 1100);
    }

    #[test]
    fn test_conflict_exhausts_attempts() {
        let store = store();
        let customer = Customer::new(CustomerId::new(), "Ali", Utc::now());
        store
            .run_transaction("seed", |tx| {
                tx.put_customer(customer.clone());
                Ok(())
            })
            .unwrap();

        let result: Result<(), _> = store.run_transaction("payment", |tx| {
            let current = tx.customer(customer.id)?.unwrap();
            store.run_transaction("interloper", |inner| {
                let mut c = inner.customer(customer.id)?.unwrap();
                c.total_billed += 1;
                inner.put_customer(c);
                Ok(())
            })?;
            tx.put_customer(current);
            Ok(())
        });

        assert_eq!(result, Err(LedgerError::transaction_conflict("payment", 5)));
    }

    #[test]
    fn test_new_customer_under_same_name_conflicts() {
        let store = store();
        let mut runs = 0;
        let created = store
            .run_transaction("sale", |tx| {
                runs += 1;
                let found = tx.active_customer_named("ali")?;
                if runs == 1 {
                    assert!(found.is_none());
                    store.run_transaction("other-sale", |inner| {
                        inner.put_customer(Customer::new(CustomerId::new(), "ALI", inner.now()));
                        Ok(())
                    })?;
                }
                let customer =
                    found.unwrap_or_else(|| Customer::new(CustomerId::new(), "Ali", tx.now()));
                tx.put_customer(customer.clone());
                Ok(customer)
            })
            .unwrap();

        assert_eq!(runs, 2);
        assert_eq!(created.name, "ALI");
        assert_eq!(store.snapshot().unwrap().customers.len(), 1);
    }

    #[test]
    fn test_raw_customer_write_conflicts_with_name_lookup() {
        let store = store();
        let mut runs = 0;
        let created = store
            .run_transaction("sale", |tx| {
                runs += 1;
                let found = tx.active_customer_named("ali")?;
                if runs == 1 {
                    assert!(found.is_none());
                    let id = CustomerId::new();
                    store.put_raw_customer(
                        id,
                        json!({
                            "id": id.to_string(),
                            "name": "ALI",
                            "joinedAt": "2026-01-01T00:00:00Z",
                        }),
                    );
                }
                let customer =
                    found.unwrap_or_else(|| Customer::new(CustomerId::new(), "Ali", tx.now()));
                tx.put_customer(customer.clone());
                Ok(customer)
            })
            .unwrap();

        assert_eq!(runs, 2);
        assert_eq!(created.name, "ALI");
        assert_eq!(store.snapshot().unwrap().customers.len(), 1);
    }

    #[test]
    fn test_other_names_do_not_conflict() {
        let store = store();
        let mut runs = 0;
        store
            .run_transaction("sale", |tx| {
                runs += 1;
                assert!(tx.active_customer_named("ali")?.is_none());
                if runs == 1 {
                    store.run_transaction("other-sale", |inner| {
                        inner.put_customer(Customer::new(CustomerId::new(), "Sara", inner.now()));
                        Ok(())
                    })?;
                }
                tx.put_customer(Customer::new(CustomerId::new(), "Ali", tx.now()));
                Ok(())
            })
            .unwrap();
        assert_eq!(runs, 1);
    }

    #[test]
    fn test_write_limit() {
        let memory = MemoryStore::new(StoreConfig {
            max_attempts: 5,
            max_writes_per_commit: 2,
        });
        let store = memory.scope(OwnerId::new("a"));

        let result: Result<(), _> = store.run_transaction("big", |tx| {
            for _ in 0..3 {
                tx.put_customer(Customer::new(CustomerId::new(), "Ali", tx.now()));
            }
            Ok(())
        });
        assert_eq!(result, Err(LedgerError::write_limit_exceeded(3, 2)));

        let batch = vec![unit("A1"), unit("A2"), unit("A3")];
        assert_eq!(
            store.insert_stock_batch(batch),
            Err(LedgerError::write_limit_exceeded(3, 2))
        );
    }

    #[test]
    fn test_insert_batch_rejects_duplicates() {
        let store = store();
        store.insert_stock_batch(vec![unit("A1")]).unwrap();

        assert_eq!(
            store.insert_stock_batch(vec![unit("B1"), unit("B1")]),
            Err(LedgerError::duplicate_codes(vec!["B1".to_string()], true))
        );
        assert_eq!(
            store.insert_stock_batch(vec![unit("A1"), unit("C1")]),
            Err(LedgerError::duplicate_codes(vec!["A1".to_string()], false))
        );
        assert_eq!(store.snapshot().unwrap().stock_items.len(), 1);
    }

    #[test]
    fn test_deleted_stock_frees_its_code() {
        let store = store();
        let item = unit("A1");
        store.insert_stock_batch(vec![item.clone()]).unwrap();
        store
            .run_transaction("remove", |tx| {
                tx.delete_stock_item(item.id);
                Ok(())
            })
            .unwrap();

        assert!(store.find_stock_by_code("A1").unwrap().is_none());
        assert_eq!(store.insert_stock_batch(vec![unit("A1")]).unwrap(), 1);
    }

    #[test]
    fn test_malformed_document_surfaces_on_read() {
        let store = store();
        let id = CustomerId::new();
        store.put_raw_customer(
            id,
            json!({ "id": id.to_string(), "joinedAt": "2026-01-01T00:00:00Z" }),
        );

        let error = store.snapshot().unwrap_err();
        assert!(matches!(error, LedgerError::MalformedDocument { .. }));

        let read: Result<Option<Customer>, _> =
            store.run_transaction("read", |tx| tx.customer(id));
        assert!(read.is_err());
    }

    #[test]
    fn test_commit_bumps_revision_and_snapshot_uses_store_clock() {
        let at = Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap();
        let memory = MemoryStore::with_clock(StoreConfig::default(), Arc::new(ManualClock::new(at)));
        let store = memory.scope(OwnerId::new("a"));
        let feed = store.subscribe();

        store.insert_stock_batch(vec![unit("A1")]).unwrap();
        assert_eq!(*feed.borrow(), 1);

        let snapshot = store.snapshot().unwrap();
        assert_eq!(snapshot.revision, 1);
        assert_eq!(snapshot.taken_at, Some(at));
    }

    #[test]
    fn test_load_snapshot_round_trip() {
        let source = store();
        source.insert_stock_batch(vec![unit("A1"), unit("B2")]).unwrap();
        source
            .run_transaction("seed", |tx| {
                tx.put_customer(Customer::new(CustomerId::new(), "Ali", tx.now()));
                Ok(())
            })
            .unwrap();
        let exported = source.snapshot().unwrap();

        let target = store();
        target.load_snapshot(&exported).unwrap();
        let imported = target.snapshot().unwrap();
        assert_eq!(imported.stock_items, exported.stock_items);
        assert_eq!(imported.customers, exported.customers);
        assert!(target.find_stock_by_code("B2").unwrap().is_some());
    }

    #[test]
    fn test_load_snapshot_rejects_negative_prices() {
        let mut bad = unit("B2");
        bad.cost_price = -10;
        bad.sale_price = i64::MAX;
        let snapshot = LedgerSnapshot {
            stock_items: vec![unit("A1"), bad],
            ..LedgerSnapshot::default()
        };

        let target = store();
        let err = target.load_snapshot(&snapshot).unwrap_err();
        assert!(matches!(err, LedgerError::MalformedDocument { .. }), "{err}");
        assert!(target.snapshot().unwrap().stock_items.is_empty());
        assert!(target.find_stock_by_code("A1").unwrap().is_none());
    }
}
