//! Read-write transaction of the in-memory engine
//!
//! Writes are staged in order and applied by the connection on commit.
//! Reads consult the staged writes first (read-your-writes), then the
//! committed objects. Once finished, every operation fails with
//! `TransactionClosed`.

use lattice_core::{LatticeError, LatticeResult, Record, TransactionHandle};
use parking_lot::{Mutex, RwLock};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

/// Committed objects: collection -> key -> record
pub(crate) type Collections = BTreeMap<String, BTreeMap<String, Record>>;

/// A staged write
#[derive(Debug, Clone)]
pub(crate) enum WriteOp {
    Put(Record),
    Remove { collection: String, key: String },
    RemoveAll,
}

#[derive(Debug, Default)]
struct TxnState {
    writes: Vec<WriteOp>,
    rolled_back: bool,
    finished: bool,
}

/// Handle to a [`MemoryConnection`](crate::MemoryConnection) transaction
#[derive(Debug)]
pub struct MemoryTransaction {
    id: u64,
    state: Mutex<TxnState>,
    committed: Arc<RwLock<Collections>>,
}

impl MemoryTransaction {
    pub(crate) fn new(id: u64, committed: Arc<RwLock<Collections>>) -> Self {
        Self {
            id,
            state: Mutex::new(TxnState::default()),
            committed,
        }
    }

    /// Transaction identifier, unique per connection
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Close the transaction
    ///
    /// Returns the staged writes to apply, or `None` if it was rolled back.
    pub(crate) fn finish(&self) -> Option<Vec<WriteOp>> {
        let mut state = self.state.lock();
        state.finished = true;
        let writes = std::mem::take(&mut state.writes);
        if state.rolled_back {
            None
        } else {
            Some(writes)
        }
    }

    fn stage(&self, op: WriteOp) -> LatticeResult<()> {
        let mut state = self.state.lock();
        if state.finished {
            return Err(LatticeError::TransactionClosed);
        }
        state.writes.push(op);
        Ok(())
    }
}

impl TransactionHandle for MemoryTransaction {
    fn rollback(&self) {
        let mut state = self.state.lock();
        state.rolled_back = true;
        state.writes.clear();
    }

    fn is_rolled_back(&self) -> bool {
        self.state.lock().rolled_back
    }

    fn put(&self, record: Record) -> LatticeResult<()> {
        self.stage(WriteOp::Put(record))
    }

    fn get(&self, collection: &str, key: &str) -> LatticeResult<Option<Record>> {
        let state = self.state.lock();
        if state.finished {
            return Err(LatticeError::TransactionClosed);
        }

        // Newest staged write touching the key decides
        for op in state.writes.iter().rev() {
            match op {
                WriteOp::Put(r) if r.collection == collection && r.key == key => {
                    return Ok(Some(r.clone()));
                }
                WriteOp::Remove { collection: c, key: k } if c == collection && k == key => {
                    return Ok(None);
                }
                WriteOp::RemoveAll => return Ok(None),
                _ => {}
            }
        }

        Ok(self
            .committed
            .read()
            .get(collection)
            .and_then(|objects| objects.get(key))
            .cloned())
    }

    fn remove(&self, collection: &str, key: &str) -> LatticeResult<bool> {
        let existed = self.get(collection, key)?.is_some();
        self.stage(WriteOp::Remove {
            collection: collection.to_string(),
            key: key.to_string(),
        })?;
        Ok(existed)
    }

    fn remove_all_objects_in_all_collections(&self) -> LatticeResult<()> {
        self.stage(WriteOp::RemoveAll)
    }

    fn collections(&self) -> LatticeResult<Vec<String>> {
        let state = self.state.lock();
        if state.finished {
            return Err(LatticeError::TransactionClosed);
        }

        let mut view: BTreeMap<String, BTreeSet<String>> = self
            .committed
            .read()
            .iter()
            .map(|(name, objects)| (name.clone(), objects.keys().cloned().collect()))
            .collect();

        for op in &state.writes {
            match op {
                WriteOp::Put(r) => {
                    view.entry(r.collection.clone())
                        .or_default()
                        .insert(r.key.clone());
                }
                WriteOp::Remove { collection, key } => {
                    if let Some(keys) = view.get_mut(collection) {
                        keys.remove(key);
                    }
                }
                WriteOp::RemoveAll => view.clear(),
            }
        }

        Ok(view
            .into_iter()
            .filter(|(_, keys)| !keys.is_empty())
            .map(|(name, _)| name)
            .collect())
    }
}
