//! Database instance
//!
//! A [`DatabaseInstance`] exclusively owns, for one named database:
//! - the engine connection and the settings store
//! - the declared index specs and their build coordinator
//! - the per-thread transaction contexts and notification batches
//!
//! Instances are created by the [`DatabaseRegistry`] and live for as long
//! as the registry does.
//!
//! # execute
//!
//! ```text
//! register notifications into the thread's batch
//! ensure secondary indexes current ─┐
//! ensure search indexes current    ─┤ failure: discard batch (outermost), return error
//! open or reuse transaction        ─┘
//! run unit of work
//! outermost and committed  → flush batch
//! outermost and rolled back → discard batch
//! reentrant                 → leave batch for the outermost call
//! ```

pub mod config;
pub mod registry;

pub use config::{LatticeConfig, CONFIG_FILE_NAME};
pub use registry::{global, install_global, validate_database_name, DatabaseRegistry};

use crate::index::{BuildReport, IndexBuildCoordinator, IndexDefinitionStore};
use crate::notify::{NotificationAggregator, NotificationSink, Notifications, Payload};
use crate::transaction::{Scope, Transaction, TransactionContextManager};
use lattice_core::{Connection, FieldResolver, LatticeError, LatticeResult, SettingsStore};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Discards the thread's batch unless defused; covers error returns and unwinding
struct DiscardOnExit<'a> {
    notifications: &'a NotificationAggregator,
    armed: bool,
}

impl DiscardOnExit<'_> {
    fn defuse(mut self) {
        self.armed = false;
    }
}

impl Drop for DiscardOnExit<'_> {
    fn drop(&mut self) {
        if self.armed {
            self.notifications.discard();
        }
    }
}

/// One named database
pub struct DatabaseInstance {
    name: String,
    path: PathBuf,
    connection: Arc<dyn Connection>,
    settings: Arc<dyn SettingsStore>,
    definitions: IndexDefinitionStore,
    builder: IndexBuildCoordinator,
    transactions: TransactionContextManager,
    notifications: NotificationAggregator,
}

impl std::fmt::Debug for DatabaseInstance {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DatabaseInstance")
            .field("name", &self.name)
            .field("path", &self.path)
            .field("definitions", &self.definitions)
            .field("transactions", &self.transactions)
            .field("notifications", &self.notifications)
            .finish()
    }
}

impl DatabaseInstance {
    /// Assemble an instance over an open connection and settings store
    pub fn new(
        name: impl Into<String>,
        path: impl Into<PathBuf>,
        connection: Arc<dyn Connection>,
        settings: Arc<dyn SettingsStore>,
    ) -> Self {
        Self {
            name: name.into(),
            path: path.into(),
            connection,
            settings,
            definitions: IndexDefinitionStore::new(),
            builder: IndexBuildCoordinator::new(),
            transactions: TransactionContextManager::new(),
            notifications: NotificationAggregator::new(),
        }
    }

    /// Registry name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Database file path
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Engine connection
    pub fn connection(&self) -> &Arc<dyn Connection> {
        &self.connection
    }

    /// Settings store holding index fingerprints
    pub fn settings(&self) -> &Arc<dyn SettingsStore> {
        &self.settings
    }

    /// Declared index specs
    pub fn definitions(&self) -> &IndexDefinitionStore {
        &self.definitions
    }

    /// Index build coordinator
    pub fn builder(&self) -> &IndexBuildCoordinator {
        &self.builder
    }

    /// Transaction contexts
    pub fn transactions(&self) -> &TransactionContextManager {
        &self.transactions
    }

    /// Notification aggregator
    pub fn notifications(&self) -> &NotificationAggregator {
        &self.notifications
    }

    // ========================================================================
    // Declarations
    // ========================================================================

    /// Declare a secondary index; see [`IndexDefinitionStore::declare_index`]
    pub fn declare_index<I, S>(
        &self,
        collection: &str,
        fields: I,
        resolver: &dyn FieldResolver,
    ) -> LatticeResult<()>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.definitions.declare_index(collection, fields, resolver)
    }

    /// Declare a search index; see [`IndexDefinitionStore::declare_search_index`]
    pub fn declare_search_index<I, S>(
        &self,
        collection: &str,
        fields: I,
        resolver: &dyn FieldResolver,
    ) -> LatticeResult<()>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.definitions
            .declare_search_index(collection, fields, resolver)
    }

    /// Run the secondary index pass
    pub fn ensure_indexes_current(&self) -> LatticeResult<BuildReport> {
        self.builder.ensure_indexes_current(
            &self.definitions,
            self.connection.as_ref(),
            self.settings.as_ref(),
        )
    }

    /// Run the search index pass
    pub fn ensure_search_indexes_current(&self) -> LatticeResult<BuildReport> {
        self.builder.ensure_search_indexes_current(
            &self.definitions,
            self.connection.as_ref(),
            self.settings.as_ref(),
        )
    }

    fn ensure_all_current(&self) -> LatticeResult<()> {
        let mut report = self.ensure_indexes_current()?;
        report.absorb(self.ensure_search_indexes_current()?);
        if !report.rebuilt.is_empty() {
            info!(target: "lattice::db", database = %self.name, rebuilt = ?report.rebuilt, "Indexes rebuilt");
        }
        Ok(())
    }

    // ========================================================================
    // Execution
    // ========================================================================

    /// Run `work` in this thread's transaction, opening one if needed
    ///
    /// `notifications` join the thread's pending batch first. The batch is
    /// delivered once, after the outermost call commits. Nested calls on the
    /// same thread share the outermost transaction and never flush.
    ///
    /// # Errors
    /// * `IndexBuild` - an index pass failed; it is retried on the next call
    /// * any error returned by `work`, unchanged, after rollback
    pub fn execute<T, F>(&self, notifications: Notifications, work: F) -> LatticeResult<T>
    where
        F: FnOnce(&Transaction<'_>) -> LatticeResult<T>,
    {
        let outermost = !self.transactions.is_active();
        self.notifications.register(notifications);
        let guard = DiscardOnExit {
            notifications: &self.notifications,
            armed: outermost,
        };

        self.ensure_all_current()?;
        let outcome = self.transactions.run(self.connection.as_ref(), |handle, scope| {
            work(&Transaction::new(handle, &self.notifications, scope))
        })?;

        if outcome.scope == Scope::Outermost && !outcome.rolled_back {
            guard.defuse();
            self.notifications.flush();
        }
        Ok(outcome.value)
    }

    /// [`execute`](Self::execute) with no notifications
    pub fn read_write<T, F>(&self, work: F) -> LatticeResult<T>
    where
        F: FnOnce(&Transaction<'_>) -> LatticeResult<T>,
    {
        self.execute(Notifications::new(), work)
    }

    /// Queue a notification in the calling thread's open transaction
    ///
    /// Returns `false` and drops the payload when the calling thread has no
    /// transaction open on this instance; only an outermost commit or
    /// rollback ever clears a thread's batch.
    pub fn track(&self, namespace: impl Into<String>, payload: impl Into<Payload>) -> bool {
        let namespace = namespace.into();
        if !self.transactions.is_active() {
            warn!(target: "lattice::db", database = %self.name, namespace = %namespace, "Notification tracked outside a transaction; dropped");
            return false;
        }
        self.notifications.track(namespace, payload);
        true
    }

    /// Deliver flushed notifications to `sink`
    pub fn subscribe<S>(&self, sink: S)
    where
        S: NotificationSink + 'static,
    {
        self.notifications.subscribe(Arc::new(sink));
    }

    /// Whether the calling thread has a transaction open on this instance
    pub fn in_transaction(&self) -> bool {
        self.transactions.is_active()
    }

    // ========================================================================
    // Purge
    // ========================================================================

    /// Delete every stored object and every persisted index fingerprint
    ///
    /// Destructive and irreversible. The deletion runs in its own engine
    /// transaction without an index pass; both dirty flags stay set so the
    /// next `execute` rebuilds every declared index.
    ///
    /// # Errors
    /// * `Purge` - the calling thread has a transaction open on this
    ///   instance, or the settings store or engine failed
    pub fn purge(&self) -> LatticeResult<()> {
        if self.transactions.is_active() {
            return Err(LatticeError::purge(
                "cannot purge while this thread has a transaction open",
            ));
        }

        warn!(target: "lattice::db", database = %self.name, "Purging database");
        self.settings.purge_all().map_err(LatticeError::purge)?;
        self.definitions.mark_all_dirty();

        let mut failure = None;
        self.connection
            .read_write(&mut |handle| {
                if let Err(e) = handle.remove_all_objects_in_all_collections() {
                    handle.rollback();
                    failure = Some(e);
                }
            })
            .map_err(LatticeError::purge)?;
        if let Some(e) = failure {
            return Err(LatticeError::purge(e));
        }

        debug!(target: "lattice::db", database = %self.name, "Purge complete");
        Ok(())
    }
}
