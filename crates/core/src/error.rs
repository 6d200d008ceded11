//! Error types for lattice
//!
//! This module defines all error types used throughout the system.
//! We use `thiserror` for automatic `Display` and `Error` trait implementations.
//!
//! # Categories
//!
//! | Category | Variants | Raised by |
//! |----------|----------|-----------|
//! | Configuration | `UnknownField`, `MissingType`, `InvalidName`, `Config` | Declarations, registry, config loading |
//! | Index build | `IndexBuild` | Extension (re)registration |
//! | Unit of work | `UnitOfWork` | Caller code running inside `execute` |
//! | Purge | `Purge` | Destructive purge |
//! | Infrastructure | `Storage`, `Settings`, `TransactionClosed`, `Serialization`, `Io` | Collaborators |

use std::io;
use thiserror::Error;

/// Boxed error type carried by [`LatticeError::UnitOfWork`]
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Result type alias for lattice operations
pub type LatticeResult<T> = std::result::Result<T, LatticeError>;

/// Error types for lattice
#[derive(Debug, Error)]
pub enum LatticeError {
    /// A declared index references a field the model does not declare
    #[error("unknown field '{field}' on collection '{collection}'")]
    UnknownField {
        /// Collection the declaration targeted
        collection: String,
        /// Field that could not be resolved
        field: String,
    },

    /// A secondary index references a field with no declared type
    #[error("field '{field}' on collection '{collection}' has no declared type")]
    MissingType {
        /// Collection the declaration targeted
        collection: String,
        /// Field without a type
        field: String,
    },

    /// The storage engine rejected an extension registration
    #[error("failed to build extension '{extension}': {reason}")]
    IndexBuild {
        /// Extension name (e.g. `Task_IDX`)
        extension: String,
        /// Underlying failure
        reason: String,
    },

    /// Failure raised by the caller's unit of work
    #[error("unit of work failed: {0}")]
    UnitOfWork(#[source] BoxError),

    /// Failure during a destructive purge
    #[error("purge failed: {reason}")]
    Purge {
        /// Underlying failure
        reason: String,
    },

    /// A transaction handle was used after its transaction finished
    #[error("transaction is no longer open")]
    TransactionClosed,

    /// A database name is not usable as a registry key
    #[error("invalid database name '{name}': {reason}")]
    InvalidName {
        /// Rejected name
        name: String,
        /// Why it was rejected
        reason: String,
    },

    /// Storage engine error
    #[error("storage error: {0}")]
    Storage(String),

    /// Settings store error
    #[error("settings error: {0}")]
    Settings(String),

    /// Configuration file error
    #[error("config error: {0}")]
    Config(String),

    /// Serialization/deserialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

impl LatticeError {
    /// Failure raised by caller code, from a message
    pub fn work(message: impl Into<String>) -> Self {
        LatticeError::UnitOfWork(message.into().into())
    }

    /// Failure raised by caller code, wrapping any error
    pub fn unit_of_work<E>(error: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        LatticeError::UnitOfWork(Box::new(error))
    }

    /// Storage engine failure
    pub fn storage(message: impl Into<String>) -> Self {
        LatticeError::Storage(message.into())
    }

    /// Settings store failure
    pub fn settings(message: impl Into<String>) -> Self {
        LatticeError::Settings(message.into())
    }

    /// Configuration failure
    pub fn config(message: impl Into<String>) -> Self {
        LatticeError::Config(message.into())
    }

    /// Wrap an engine failure raised while (un)registering `extension`
    pub fn index_build(extension: impl Into<String>, cause: &LatticeError) -> Self {
        LatticeError::IndexBuild {
            extension: extension.into(),
            reason: cause.to_string(),
        }
    }

    /// Wrap a failure raised during purge
    pub fn purge(cause: impl std::fmt::Display) -> Self {
        LatticeError::Purge {
            reason: cause.to_string(),
        }
    }

    /// Raised synchronously by a declaration or by configuration loading
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            LatticeError::UnknownField { .. }
                | LatticeError::MissingType { .. }
                | LatticeError::InvalidName { .. }
                | LatticeError::Config(_)
        )
    }

    /// Raised by an index pass; the next `execute` retries
    pub fn is_index_build(&self) -> bool {
        matches!(self, LatticeError::IndexBuild { .. })
    }

    /// Raised by caller code inside a transaction
    pub fn is_unit_of_work(&self) -> bool {
        matches!(self, LatticeError::UnitOfWork(_))
    }

    /// Raised by a purge
    pub fn is_purge(&self) -> bool {
        matches!(self, LatticeError::Purge { .. })
    }
}
