//! In-memory storage engine
//!
//! Connections are keyed by path: opening the same path twice returns the
//! same connection, so objects and registered extensions outlive any one
//! registry. This mirrors reopening the same database file after a restart.

use crate::connection::MemoryConnection;
use dashmap::DashMap;
use lattice_core::{Connection, LatticeResult, StorageEngine};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::debug;

/// Engine handing out [`MemoryConnection`]s
#[derive(Debug, Default)]
pub struct MemoryEngine {
    connections: DashMap<PathBuf, Arc<MemoryConnection>>,
}

impl MemoryEngine {
    /// Create an engine with no databases
    pub fn new() -> Self {
        Self::default()
    }

    /// Concrete connection previously opened at `path`
    pub fn connection(&self, path: &Path) -> Option<Arc<MemoryConnection>> {
        self.connections.get(path).map(|c| Arc::clone(c.value()))
    }

    /// Number of distinct databases opened
    pub fn len(&self) -> usize {
        self.connections.len()
    }

    /// Whether no database has been opened
    pub fn is_empty(&self) -> bool {
        self.connections.is_empty()
    }
}

impl StorageEngine for MemoryEngine {
    fn open_connection(&self, path: &Path) -> LatticeResult<Arc<dyn Connection>> {
        let conn: Arc<dyn Connection> = self
            .connections
            .entry(path.to_path_buf())
            .or_insert_with(|| {
                debug!(target: "lattice::storage", path = ?path, "Creating in-memory database");
                Arc::new(MemoryConnection::new(path))
            })
            .value()
            .clone();
        Ok(conn)
    }
}
