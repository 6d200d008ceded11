//! Reference storage engine for lattice
//!
//! This crate implements the collaborator traits from `lattice-core`:
//! - MemoryEngine / MemoryConnection: single-writer in-memory object store
//!   with an extension registry (secondary and full-text indexes)
//! - MemoryTransaction: staged writes, read-your-writes, rollback
//! - MemorySettings / JsonFileSettings: settings stores and their providers
//!
//! The in-memory engine is what tests and embedded callers run against. It
//! also exposes inspection hooks (counters, extension event log, index
//! queries, injected registration failures).

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod connection;
pub mod engine;
pub mod extension;
pub mod settings;
pub mod transaction;

pub use connection::{ExtensionEvent, MemoryConnection, StatsSnapshot};
pub use engine::MemoryEngine;
pub use extension::{IndexEntry, RegisteredExtension};
pub use settings::{
    JsonFileSettings, JsonFileSettingsProvider, MemorySettings, MemorySettingsProvider,
};
pub use transaction::MemoryTransaction;
