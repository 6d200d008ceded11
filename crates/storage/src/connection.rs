//! In-memory connection
//!
//! # Locking
//!
//! - `write_slot`: held for the whole of `read_write`; one writer at a time
//! - `committed`: committed objects, read by transactions and registrations
//! - `extensions`: registered extensions, maintained on commit
//!
//! Lock order is `committed` before `extensions`. Registration does not take
//! the write slot, so it can run while the registering thread has a
//! transaction open.

use crate::extension::RegisteredExtension;
use crate::transaction::{Collections, MemoryTransaction, WriteOp};
use lattice_core::{
    ColumnValue, Connection, ExtensionDefinition, IndexRow, LatticeError, LatticeResult, Record,
    TransactionHandle,
};
use parking_lot::{Mutex, RwLock};
use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, info};

/// Extension registry change, in the order it happened
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExtensionEvent {
    /// Extension built and registered
    Registered(String),
    /// Extension removed
    Unregistered(String),
}

/// Connection counters
///
/// Relaxed ordering; these are observational only.
#[derive(Debug, Default)]
struct ConnectionStats {
    read_write_calls: AtomicU64,
    commits: AtomicU64,
    rollbacks: AtomicU64,
    rebuilds: AtomicU64,
}

/// Snapshot of connection counters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StatsSnapshot {
    /// `read_write` invocations
    pub read_write_calls: u64,
    /// Transactions committed
    pub commits: u64,
    /// Transactions rolled back
    pub rollbacks: u64,
    /// Extensions built from scratch
    pub rebuilds: u64,
}

/// Connection to one in-memory database
#[derive(Debug)]
pub struct MemoryConnection {
    path: PathBuf,
    write_slot: Mutex<()>,
    committed: Arc<RwLock<Collections>>,
    extensions: RwLock<BTreeMap<String, RegisteredExtension>>,
    next_txn_id: AtomicU64,
    stats: ConnectionStats,
    events: Mutex<Vec<ExtensionEvent>>,
    failing_registrations: Mutex<HashSet<String>>,
}

impl MemoryConnection {
    /// Create an empty database
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_slot: Mutex::new(()),
            committed: Arc::new(RwLock::new(Collections::new())),
            extensions: RwLock::new(BTreeMap::new()),
            next_txn_id: AtomicU64::new(1),
            stats: ConnectionStats::default(),
            events: Mutex::new(Vec::new()),
            failing_registrations: Mutex::new(HashSet::new()),
        }
    }

    /// Path this connection was opened with
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Counter snapshot
    pub fn stats(&self) -> StatsSnapshot {
        StatsSnapshot {
            read_write_calls: self.stats.read_write_calls.load(Ordering::Relaxed),
            commits: self.stats.commits.load(Ordering::Relaxed),
            rollbacks: self.stats.rollbacks.load(Ordering::Relaxed),
            rebuilds: self.stats.rebuilds.load(Ordering::Relaxed),
        }
    }

    /// Extension registry changes so far
    pub fn extension_events(&self) -> Vec<ExtensionEvent> {
        self.events.lock().clone()
    }

    /// Reject the next registration of `name`
    pub fn fail_next_registration(&self, name: &str) {
        self.failing_registrations.lock().insert(name.to_string());
    }

    /// Names of registered extensions
    pub fn registered_extensions(&self) -> Vec<String> {
        self.extensions.read().keys().cloned().collect()
    }

    /// Definition registered under `name`
    pub fn extension_definition(&self, name: &str) -> Option<ExtensionDefinition> {
        self.extensions
            .read()
            .get(name)
            .map(|ext| ext.definition().clone())
    }

    /// Secondary index row of `key` in extension `name`
    pub fn index_row(&self, name: &str, key: &str) -> Option<IndexRow> {
        self.extensions
            .read()
            .get(name)
            .and_then(|ext| ext.row(key).cloned())
    }

    /// Keys whose `column` holds `value` in extension `name`
    pub fn query_index(&self, name: &str, column: &str, value: &ColumnValue) -> Vec<String> {
        self.extensions
            .read()
            .get(name)
            .map(|ext| ext.query(column, value))
            .unwrap_or_default()
    }

    /// Keys matching `term` in search extension `name`
    pub fn search(&self, name: &str, term: &str) -> Vec<String> {
        self.extensions
            .read()
            .get(name)
            .map(|ext| ext.search(term))
            .unwrap_or_default()
    }

    /// Committed object
    pub fn object(&self, collection: &str, key: &str) -> Option<Record> {
        self.committed
            .read()
            .get(collection)
            .and_then(|objects| objects.get(key))
            .cloned()
    }

    /// Committed objects in `collection`
    pub fn object_count(&self, collection: &str) -> usize {
        self.committed
            .read()
            .get(collection)
            .map(BTreeMap::len)
            .unwrap_or(0)
    }

    /// Committed objects across all collections
    pub fn total_objects(&self) -> usize {
        self.committed.read().values().map(BTreeMap::len).sum()
    }

    fn commit(&self, writes: Vec<WriteOp>) {
        let mut committed = self.committed.write();
        let mut extensions = self.extensions.write();

        for op in writes {
            match op {
                WriteOp::Put(record) => {
                    for ext in extensions.values_mut() {
                        ext.apply_put(&record);
                    }
                    committed
                        .entry(record.collection.clone())
                        .or_default()
                        .insert(record.key.clone(), record);
                }
                WriteOp::Remove { collection, key } => {
                    for ext in extensions.values_mut() {
                        ext.apply_remove(&collection, &key);
                    }
                    if let Some(objects) = committed.get_mut(&collection) {
                        objects.remove(&key);
                        if objects.is_empty() {
                            committed.remove(&collection);
                        }
                    }
                }
                WriteOp::RemoveAll => {
                    for ext in extensions.values_mut() {
                        ext.clear();
                    }
                    committed.clear();
                }
            }
        }
    }
}

impl Connection for MemoryConnection {
    fn read_write(&self, work: &mut dyn FnMut(Arc<dyn TransactionHandle>)) -> LatticeResult<()> {
        let _slot = self.write_slot.lock();
        self.stats.read_write_calls.fetch_add(1, Ordering::Relaxed);

        let txn_id = self.next_txn_id.fetch_add(1, Ordering::Relaxed);
        let txn = Arc::new(MemoryTransaction::new(txn_id, Arc::clone(&self.committed)));
        work(Arc::clone(&txn) as Arc<dyn TransactionHandle>);

        match txn.finish() {
            Some(writes) => {
                let count = writes.len();
                self.commit(writes);
                self.stats.commits.fetch_add(1, Ordering::Relaxed);
                debug!(target: "lattice::storage", txn_id, writes = count, "Transaction committed");
            }
            None => {
                self.stats.rollbacks.fetch_add(1, Ordering::Relaxed);
                debug!(target: "lattice::storage", txn_id, "Transaction rolled back");
            }
        }
        Ok(())
    }

    fn register_extension(&self, definition: ExtensionDefinition, name: &str) -> LatticeResult<()> {
        if self.failing_registrations.lock().remove(name) {
            return Err(LatticeError::storage(format!(
                "registration of '{}' rejected",
                name
            )));
        }

        let committed = self.committed.read();
        let mut extensions = self.extensions.write();

        if let Some(existing) = extensions.get(name) {
            if existing.definition() == &definition {
                return Ok(());
            }
            return Err(LatticeError::storage(format!(
                "extension '{}' is already registered with a different definition",
                name
            )));
        }

        let records = committed
            .get(definition.collection())
            .into_iter()
            .flat_map(BTreeMap::values);
        let ext = RegisteredExtension::build(definition, records);
        info!(target: "lattice::storage", extension = name, entries = ext.len(), "Extension built");

        extensions.insert(name.to_string(), ext);
        self.stats.rebuilds.fetch_add(1, Ordering::Relaxed);
        self.events
            .lock()
            .push(ExtensionEvent::Registered(name.to_string()));
        Ok(())
    }

    fn unregister_extension(&self, name: &str) -> LatticeResult<()> {
        if self.extensions.write().remove(name).is_none() {
            return Err(LatticeError::storage(format!(
                "no extension registered under '{}'",
                name
            )));
        }
        self.events
            .lock()
            .push(ExtensionEvent::Unregistered(name.to_string()));
        Ok(())
    }

    fn is_extension_registered(&self, name: &str) -> bool {
        self.extensions.read().contains_key(name)
    }
}
