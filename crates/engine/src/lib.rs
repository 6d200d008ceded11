//! Coordination engine for lattice
//!
//! This crate sits on top of an embedded storage engine and coordinates:
//! - Index lifecycle: declared specs, fingerprints, check-lock-check rebuilds
//! - Transactions: one reentrant transaction per thread per database
//! - Notifications: per-thread batches flushed after the outermost commit
//! - Registry: name-keyed database instances, created lazily
//!
//! The storage engine, the settings store and the model field resolver are
//! consumed through the traits in `lattice-core`.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod database;
pub mod index;
pub mod notify;
pub mod transaction;

pub use database::{
    global, install_global, validate_database_name, DatabaseInstance, DatabaseRegistry,
    LatticeConfig, CONFIG_FILE_NAME,
};
pub use database::registry::{Initializer, MAX_NAME_LENGTH};
pub use index::{
    BuildReport, DirtyFlag, ExtensionPlan, IndexBuildCoordinator, IndexDefinitionStore, IndexKind,
};
pub use notify::{
    NotificationAggregator, NotificationBatch, NotificationEvent, NotificationSink,
    Notifications, Payload,
};
pub use transaction::{Scope, ScopeOutcome, Transaction, TransactionContextManager};
