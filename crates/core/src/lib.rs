//! Core types and traits for lattice
//!
//! This crate defines the foundational types used throughout the system:
//! - Error: `LatticeError` and the `LatticeResult` alias
//! - Types: declared field types, field values, column values, records
//! - Index: index specs, fingerprints, extension definitions and naming
//! - Traits: collaborator interfaces (storage engine, settings, field resolver)
//! - Schema: `ModelSchema`, an in-memory field resolver

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod error;
pub mod index;
pub mod schema;
pub mod traits;
pub mod types;

pub use error::{BoxError, LatticeError, LatticeResult};
pub use index::{
    index_extension_name, index_settings_key, search_extension_name, search_settings_key,
    ExtensionDefinition, Fingerprint, IndexRow, IndexSpec, SearchIndexDefinition,
    SearchIndexSpec, SecondaryIndexDefinition, EXTENSION_VERSION, INDEX_SETTINGS_SUFFIX,
    SEARCH_SETTINGS_SUFFIX,
};
pub use schema::ModelSchema;
pub use traits::{
    Connection, FieldDeclarations, FieldResolver, SettingsProvider, SettingsStore, StorageEngine,
    TransactionHandle,
};
pub use types::{ColumnType, ColumnValue, FieldType, FieldValue, Record};
