//! Transaction scoping
//!
//! This module provides:
//! - [`TransactionContextManager`]: per-thread reentrant transaction contexts
//! - [`Transaction`]: the view of the active transaction handed to units of work

pub mod context;
pub mod manager;

pub use context::{Scope, Transaction};
pub use manager::{ScopeOutcome, TransactionContextManager};
