//! LatticeDB - index lifecycle and transaction coordination for embedded stores
//!
//! LatticeDB sits on top of an embedded object store and manages three things
//! the store itself does not:
//! - Secondary and full-text indexes declared against collections, rebuilt
//!   exactly once when their definition changes
//! - One reentrant transaction per thread per database
//! - Change notifications batched per thread and delivered after the
//!   outermost commit
//!
//! # Quick Start
//!
//! ```
//! use latticedb::{DatabaseRegistry, FieldType, ModelSchema, Notifications, Record};
//! use serde_json::json;
//!
//! let schema = ModelSchema::new().field("Task", "done", FieldType::Boolean);
//! let registry = DatabaseRegistry::in_memory();
//! let db = registry.default_instance()?;
//! db.declare_index("Task", ["done"], &schema)?;
//!
//! db.execute(Notifications::new().with("task.created", json!({"key": "a"})), |txn| {
//!     txn.put(Record::new("Task", "a").with("done", true))
//! })?;
//! # Ok::<(), latticedb::LatticeError>(())
//! ```
//!
//! # Architecture
//!
//! | Crate | Contents |
//! |-------|----------|
//! | `lattice-core` | Errors, field types, index specs, collaborator traits |
//! | `lattice-storage` | In-memory reference engine, settings stores |
//! | `lattice-engine` | Definition store, build coordinator, transactions, notifications, registry |

pub use lattice_core::{
    index_extension_name, index_settings_key, search_extension_name, search_settings_key,
    BoxError, ColumnType, ColumnValue, Connection, ExtensionDefinition, FieldDeclarations,
    FieldResolver, FieldType, FieldValue, Fingerprint, IndexRow, IndexSpec, LatticeError,
    LatticeResult, ModelSchema, Record, SearchIndexDefinition, SearchIndexSpec,
    SecondaryIndexDefinition, SettingsProvider, SettingsStore, StorageEngine, TransactionHandle,
    EXTENSION_VERSION, INDEX_SETTINGS_SUFFIX, SEARCH_SETTINGS_SUFFIX,
};
pub use lattice_engine::{
    global, install_global, validate_database_name, BuildReport, DatabaseInstance,
    DatabaseRegistry, DirtyFlag, ExtensionPlan, IndexBuildCoordinator, IndexDefinitionStore,
    IndexKind, Initializer, LatticeConfig, NotificationAggregator, NotificationBatch,
    NotificationEvent, NotificationSink, Notifications, Payload, Scope, ScopeOutcome, Transaction,
    TransactionContextManager, CONFIG_FILE_NAME, MAX_NAME_LENGTH,
};

/// Reference storage engine and settings stores
pub mod storage {
    pub use lattice_storage::*;
}
