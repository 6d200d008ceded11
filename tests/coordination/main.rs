//! Coordination suite: index lifecycle, transactions, notifications,
//! registry and purge, driven through the public API over the in-memory
//! engine.

mod common;

mod index_lifecycle;
mod notifications;
mod purge;
mod registry;
mod transactions;
