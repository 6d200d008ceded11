//! Index build coordinator
//!
//! Brings the engine's registered extensions in line with the declared
//! specs. One coordinator per database instance; passes are serialized on
//! its lock.
//!
//! ## Pass
//!
//! ```text
//! flag clear?  ──yes──▶ return (no lock taken)
//!      │no
//!   lock
//! flag clear?  ──yes──▶ return
//!      │no
//! for each declared collection:
//!   persisted fingerprint == current?
//!     yes: register (idempotent)
//!     no:  persist fingerprint, unregister if registered, register
//! clear flag (only if no declaration raced the pass)
//! ```
//!
//! Any failure returns early with the flag still set; the next `execute`
//! runs the pass again.

use crate::index::definitions::{DirtyFlag, ExtensionPlan, IndexDefinitionStore};
use lattice_core::{
    index_settings_key, search_settings_key, Connection, LatticeError, LatticeResult,
    SettingsStore,
};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::{debug, info, warn};

/// Which family of extensions a pass covers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexKind {
    /// `<collection>_IDX`, fingerprint under `<collection>_idx_defn`
    Secondary,
    /// `<collection>_SIDX`, fingerprint under `<collection>_sidx_defn`
    Search,
}

impl IndexKind {
    fn settings_key(self, collection: &str) -> String {
        match self {
            IndexKind::Secondary => index_settings_key(collection),
            IndexKind::Search => search_settings_key(collection),
        }
    }

    fn label(self) -> &'static str {
        match self {
            IndexKind::Secondary => "secondary",
            IndexKind::Search => "search",
        }
    }
}

/// Outcome of one pass
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BuildReport {
    /// Collections whose extension was torn down and rebuilt
    pub rebuilt: Vec<String>,
    /// Collections whose fingerprint matched; re-registered only
    pub unchanged: Vec<String>,
}

impl BuildReport {
    /// Whether the pass was skipped or touched nothing
    pub fn is_empty(&self) -> bool {
        self.rebuilt.is_empty() && self.unchanged.is_empty()
    }

    /// Fold another report into this one
    pub fn absorb(&mut self, other: BuildReport) {
        self.rebuilt.extend(other.rebuilt);
        self.unchanged.extend(other.unchanged);
    }
}

/// Serializes extension (re)registration for one database instance
#[derive(Debug, Default)]
pub struct IndexBuildCoordinator {
    lock: Mutex<()>,
    passes: AtomicU64,
}

impl IndexBuildCoordinator {
    /// Create a coordinator
    pub fn new() -> Self {
        Self::default()
    }

    /// Passes that got past the fast path and the re-check
    pub fn pass_count(&self) -> u64 {
        self.passes.load(Ordering::Relaxed)
    }

    /// Bring secondary index extensions up to date
    pub fn ensure_indexes_current(
        &self,
        definitions: &IndexDefinitionStore,
        connection: &dyn Connection,
        settings: &dyn SettingsStore,
    ) -> LatticeResult<BuildReport> {
        self.ensure_current(
            IndexKind::Secondary,
            definitions.indexes_dirty(),
            || definitions.index_plans(),
            connection,
            settings,
        )
    }

    /// Bring search index extensions up to date
    pub fn ensure_search_indexes_current(
        &self,
        definitions: &IndexDefinitionStore,
        connection: &dyn Connection,
        settings: &dyn SettingsStore,
    ) -> LatticeResult<BuildReport> {
        self.ensure_current(
            IndexKind::Search,
            definitions.search_indexes_dirty(),
            || definitions.search_index_plans(),
            connection,
            settings,
        )
    }

    fn ensure_current<P>(
        &self,
        kind: IndexKind,
        flag: &DirtyFlag,
        plans: P,
        connection: &dyn Connection,
        settings: &dyn SettingsStore,
    ) -> LatticeResult<BuildReport>
    where
        P: FnOnce() -> LatticeResult<Vec<ExtensionPlan>>,
    {
        if !flag.is_dirty() {
            return Ok(BuildReport::default());
        }

        let _guard = self.lock.lock();
        if !flag.is_dirty() {
            return Ok(BuildReport::default());
        }
        self.passes.fetch_add(1, Ordering::Relaxed);

        let generation = flag.generation();
        let mut report = BuildReport::default();
        for plan in plans()? {
            if let Err(e) = bring_current(kind, plan, connection, settings, &mut report) {
                warn!(target: "lattice::index", kind = kind.label(), error = %e, "Index pass failed; will retry on next execute");
                return Err(e);
            }
        }

        if !flag.clear_if_unchanged(generation) {
            debug!(target: "lattice::index", kind = kind.label(), "Declarations changed during pass; flag stays set");
        }
        debug!(
            target: "lattice::index",
            kind = kind.label(),
            rebuilt = report.rebuilt.len(),
            unchanged = report.unchanged.len(),
            "Index pass complete"
        );
        Ok(report)
    }
}

fn bring_current(
    kind: IndexKind,
    plan: ExtensionPlan,
    connection: &dyn Connection,
    settings: &dyn SettingsStore,
    report: &mut BuildReport,
) -> LatticeResult<()> {
    let ExtensionPlan {
        collection,
        extension,
        fingerprint,
        definition,
    } = plan;
    let key = kind.settings_key(&collection);
    let wrap = |e: LatticeError| LatticeError::index_build(extension.as_str(), &e);

    let persisted = settings.get(&key).map_err(wrap)?;
    if persisted.as_deref() == Some(fingerprint.as_str()) {
        connection
            .register_extension(definition, &extension)
            .map_err(wrap)?;
        debug!(target: "lattice::index", collection = %collection, extension = %extension, "Index unchanged");
        report.unchanged.push(collection);
        return Ok(());
    }

    info!(
        target: "lattice::index",
        collection = %collection,
        extension = %extension,
        fingerprint = %fingerprint,
        "Index definition changed, rebuilding"
    );
    settings.set(&key, fingerprint.as_str()).map_err(wrap)?;
    if connection.is_extension_registered(&extension) {
        connection.unregister_extension(&extension).map_err(wrap)?;
    }
    connection
        .register_extension(definition, &extension)
        .map_err(wrap)?;
    report.rebuilt.push(collection);
    Ok(())
}
