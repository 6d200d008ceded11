//! Reentrant per-thread transaction scoping
//!
//! Each thread holds at most one active engine transaction per database
//! instance. The first `run` on a thread opens it through the engine's
//! read-write primitive; nested `run` calls on the same thread reuse the
//! active handle.
//!
//! ```text
//! Idle ──run──▶ Active(outermost) ──work returns──▶ Idle
//!                 │    ▲
//!                 └run─┘ (reentrant: same handle, no new transaction)
//! ```
//!
//! The active handle is kept in a map keyed by `ThreadId` and removed by a
//! guard when the outermost unit of work returns or unwinds.

use crate::transaction::context::Scope;
use dashmap::DashMap;
use lattice_core::{Connection, LatticeError, LatticeResult, TransactionHandle};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, ThreadId};
use tracing::{debug, trace};

/// Result of a unit of work plus how it ran
#[derive(Debug)]
pub struct ScopeOutcome<T> {
    /// Value returned by the unit of work
    pub value: T,
    /// Whether the call opened the transaction
    pub scope: Scope,
    /// Whether the transaction was rolled back by the time the call ended
    pub rolled_back: bool,
}

/// Thread-keyed active transaction handles of one database instance
#[derive(Default)]
pub struct TransactionContextManager {
    active: DashMap<ThreadId, Arc<dyn TransactionHandle>>,
    opened: AtomicU64,
    reentered: AtomicU64,
}

impl std::fmt::Debug for TransactionContextManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransactionContextManager")
            .field("active_threads", &self.active.len())
            .field("opened", &self.opened.load(Ordering::Relaxed))
            .field("reentered", &self.reentered.load(Ordering::Relaxed))
            .finish()
    }
}

/// Removes the thread's entry when the outermost unit of work ends
struct ActiveEntry<'a> {
    active: &'a DashMap<ThreadId, Arc<dyn TransactionHandle>>,
    thread: ThreadId,
}

impl<'a> ActiveEntry<'a> {
    fn install(
        active: &'a DashMap<ThreadId, Arc<dyn TransactionHandle>>,
        handle: Arc<dyn TransactionHandle>,
    ) -> Self {
        let thread = thread::current().id();
        active.insert(thread, handle);
        Self { active, thread }
    }
}

impl Drop for ActiveEntry<'_> {
    fn drop(&mut self) {
        self.active.remove(&self.thread);
    }
}

impl TransactionContextManager {
    /// Manager with no active transactions
    pub fn new() -> Self {
        Self::default()
    }

    /// Active handle of the calling thread
    pub fn current(&self) -> Option<Arc<dyn TransactionHandle>> {
        self.active
            .get(&thread::current().id())
            .map(|entry| Arc::clone(entry.value()))
    }

    /// Whether the calling thread has a transaction open
    pub fn is_active(&self) -> bool {
        self.active.contains_key(&thread::current().id())
    }

    /// Threads with a transaction open
    pub fn active_threads(&self) -> usize {
        self.active.len()
    }

    /// Engine transactions opened so far
    pub fn opened_count(&self) -> u64 {
        self.opened.load(Ordering::Relaxed)
    }

    /// Calls that reused an active transaction
    pub fn reentered_count(&self) -> u64 {
        self.reentered.load(Ordering::Relaxed)
    }

    /// Run `work` in the calling thread's transaction, opening one if needed
    ///
    /// # Arguments
    /// * `connection` - Engine connection used to open the transaction
    /// * `work` - Unit of work; receives the handle and its nesting position
    ///
    /// # Returns
    /// * `Ok(ScopeOutcome)` - `work` succeeded (the transaction may still have
    ///   been rolled back explicitly)
    /// * `Err` - the error returned by `work`, unchanged, after the engine
    ///   rolled back; or an engine failure
    pub fn run<T, F>(&self, connection: &dyn Connection, work: F) -> LatticeResult<ScopeOutcome<T>>
    where
        F: FnOnce(&Arc<dyn TransactionHandle>, Scope) -> LatticeResult<T>,
    {
        // Clone out so no map guard is held while user code runs
        if let Some(handle) = self.current() {
            self.reentered.fetch_add(1, Ordering::Relaxed);
            trace!(target: "lattice::txn", "Reusing active transaction");
            let value = work(&handle, Scope::Reentrant)?;
            return Ok(ScopeOutcome {
                value,
                scope: Scope::Reentrant,
                rolled_back: handle.is_rolled_back(),
            });
        }

        let mut work = Some(work);
        let mut outcome: Option<(LatticeResult<T>, bool)> = None;
        let engine_result = connection.read_write(&mut |handle| {
            let Some(work) = work.take() else {
                return;
            };
            let _entry = ActiveEntry::install(&self.active, Arc::clone(&handle));
            self.opened.fetch_add(1, Ordering::Relaxed);
            debug!(target: "lattice::txn", "Transaction opened");

            let result = work(&handle, Scope::Outermost);
            if result.is_err() {
                handle.rollback();
            }
            outcome = Some((result, handle.is_rolled_back()));
        });

        match (engine_result, outcome) {
            // The unit of work's own failure wins over anything the engine reports
            (_, Some((Err(e), _))) => {
                debug!(target: "lattice::txn", error = %e, "Transaction rolled back");
                Err(e)
            }
            (Err(e), _) => Err(e),
            (Ok(()), Some((Ok(value), rolled_back))) => {
                if rolled_back {
                    debug!(target: "lattice::txn", "Transaction rolled back by unit of work");
                } else {
                    debug!(target: "lattice::txn", "Transaction committed");
                }
                Ok(ScopeOutcome {
                    value,
                    scope: Scope::Outermost,
                    rolled_back,
                })
            }
            (Ok(()), None) => Err(LatticeError::storage(
                "engine returned without running the unit of work",
            )),
        }
    }
}
