//! Transaction wrapper handed to units of work
//!
//! [`Transaction`] wraps the thread's active engine handle and the
//! instance's notification aggregator. Nested `execute` calls on the same
//! thread get a wrapper over the same handle.
//!
//! # Usage
//!
//! ```ignore
//! db.execute(Notifications::new(), |txn| {
//!     txn.put(Record::new("Task", "a").with("done", true))?;
//!     txn.track("task.created", json!({"key": "a"}));
//!     Ok(())
//! })?;
//! ```

use crate::notify::{NotificationAggregator, Payload};
use lattice_core::{LatticeResult, Record, TransactionHandle};
use std::sync::Arc;

/// Position of a call in the thread's transaction nesting
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scope {
    /// Opened the engine transaction
    Outermost,
    /// Rides inside a transaction opened further up the stack
    Reentrant,
}

/// Unit-of-work view of the active transaction
pub struct Transaction<'a> {
    handle: &'a Arc<dyn TransactionHandle>,
    notifications: &'a NotificationAggregator,
    scope: Scope,
}

impl<'a> Transaction<'a> {
    pub(crate) fn new(
        handle: &'a Arc<dyn TransactionHandle>,
        notifications: &'a NotificationAggregator,
        scope: Scope,
    ) -> Self {
        Self {
            handle,
            notifications,
            scope,
        }
    }

    /// Insert or replace an object
    pub fn put(&self, record: Record) -> LatticeResult<()> {
        self.handle.put(record)
    }

    /// Read an object, including this transaction's own writes
    pub fn get(&self, collection: &str, key: &str) -> LatticeResult<Option<Record>> {
        self.handle.get(collection, key)
    }

    /// Remove an object; returns whether it existed
    pub fn remove(&self, collection: &str, key: &str) -> LatticeResult<bool> {
        self.handle.remove(collection, key)
    }

    /// Names of non-empty collections
    pub fn collections(&self) -> LatticeResult<Vec<String>> {
        self.handle.collections()
    }

    /// Queue a notification for delivery after the outermost commit
    pub fn track(&self, namespace: impl Into<String>, payload: impl Into<Payload>) {
        self.notifications.track(namespace, payload);
    }

    /// Discard every write of the whole transaction
    ///
    /// A rolled-back transaction delivers no notifications, even when the
    /// unit of work returns `Ok`.
    pub fn rollback(&self) {
        self.handle.rollback();
    }

    /// Whether the transaction has been rolled back
    pub fn is_rolled_back(&self) -> bool {
        self.handle.is_rolled_back()
    }

    /// Nesting position of this call
    pub fn scope(&self) -> Scope {
        self.scope
    }

    /// Whether this call is nested inside another `execute`
    pub fn is_nested(&self) -> bool {
        self.scope == Scope::Reentrant
    }

    /// The engine handle
    pub fn handle(&self) -> &Arc<dyn TransactionHandle> {
        self.handle
    }
}

impl std::fmt::Debug for Transaction<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Transaction")
            .field("scope", &self.scope)
            .field("rolled_back", &self.handle.is_rolled_back())
            .finish()
    }
}
