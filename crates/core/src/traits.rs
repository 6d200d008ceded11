//! Collaborator traits
//!
//! The coordination layer consumes three collaborators through these traits:
//! - [`StorageEngine`] / [`Connection`] / [`TransactionHandle`]: the embedded store
//! - [`SettingsStore`] / [`SettingsProvider`]: persisted index fingerprints
//! - [`FieldResolver`]: model field declarations
//!
//! All of them are object-safe and shared as `Arc<dyn _>`.

use crate::error::LatticeResult;
use crate::index::ExtensionDefinition;
use crate::types::{FieldType, Record};
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

// ============================================================================
// Storage engine
// ============================================================================

/// Opens connections to database files
pub trait StorageEngine: Send + Sync {
    /// Open (or create) the database at `path`
    fn open_connection(&self, path: &Path) -> LatticeResult<Arc<dyn Connection>>;
}

/// A connection to one database
///
/// Implementations are thread-safe and provide single-writer exclusivity:
/// `read_write` blocks until the write slot is free.
pub trait Connection: Send + Sync {
    /// Run `work` inside a read-write transaction
    ///
    /// The transaction commits when `work` returns unless the handle was
    /// rolled back. An `Err` from this method is an engine failure; `work`
    /// itself has no error channel.
    fn read_write(&self, work: &mut dyn FnMut(Arc<dyn TransactionHandle>)) -> LatticeResult<()>;

    /// Register an extension under `name`
    ///
    /// Registering an identical definition under an already-registered name
    /// is a no-op. A different definition under a taken name is rejected.
    fn register_extension(&self, definition: ExtensionDefinition, name: &str) -> LatticeResult<()>;

    /// Remove the extension registered under `name`
    fn unregister_extension(&self, name: &str) -> LatticeResult<()>;

    /// Whether an extension is registered under `name`
    fn is_extension_registered(&self, name: &str) -> bool;
}

/// Handle to an open read-write transaction
///
/// Handles are shared (`Arc`) so nested calls on the same thread can reuse
/// them. Every operation fails with
/// [`LatticeError::TransactionClosed`](crate::LatticeError::TransactionClosed)
/// once the transaction has finished.
pub trait TransactionHandle: Send + Sync {
    /// Discard every write made in this transaction
    fn rollback(&self);

    /// Whether `rollback` has been called
    fn is_rolled_back(&self) -> bool;

    /// Insert or replace an object
    fn put(&self, record: Record) -> LatticeResult<()>;

    /// Read an object, seeing this transaction's own writes
    fn get(&self, collection: &str, key: &str) -> LatticeResult<Option<Record>>;

    /// Remove an object; returns whether it existed
    fn remove(&self, collection: &str, key: &str) -> LatticeResult<bool>;

    /// Remove every object in every collection
    fn remove_all_objects_in_all_collections(&self) -> LatticeResult<()>;

    /// Names of non-empty collections
    fn collections(&self) -> LatticeResult<Vec<String>>;
}

// ============================================================================
// Settings
// ============================================================================

/// Persistent key-value settings
pub trait SettingsStore: Send + Sync {
    /// Read a value
    fn get(&self, key: &str) -> LatticeResult<Option<String>>;

    /// Write a value
    fn set(&self, key: &str, value: &str) -> LatticeResult<()>;

    /// Remove every value
    fn purge_all(&self) -> LatticeResult<()>;
}

/// Opens the settings store belonging to a named database
pub trait SettingsProvider: Send + Sync {
    /// Settings store for `database`
    fn open_settings(&self, database: &str) -> LatticeResult<Arc<dyn SettingsStore>>;
}

// ============================================================================
// Model fields
// ============================================================================

/// Field declarations of one collection: name to declared type (`None` = untyped)
pub type FieldDeclarations = BTreeMap<String, Option<FieldType>>;

/// Resolves a collection's declared fields
pub trait FieldResolver {
    /// Declared fields of `collection`, or `None` if the collection is unknown
    fn fields_of(&self, collection: &str) -> Option<FieldDeclarations>;
}
