//! Settings stores
//!
//! Two [`SettingsStore`] implementations:
//! - [`MemorySettings`]: process-lifetime map
//! - [`JsonFileSettings`]: JSON object in a file, rewritten atomically on change
//!
//! and the matching [`SettingsProvider`]s, which hand out one store per
//! database name.

use dashmap::DashMap;
use lattice_core::{LatticeError, LatticeResult, SettingsProvider, SettingsStore};
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::debug;

// ============================================================================
// MemorySettings
// ============================================================================

/// Settings held in memory
#[derive(Debug, Default)]
pub struct MemorySettings {
    values: RwLock<BTreeMap<String, String>>,
}

impl MemorySettings {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy of every key/value pair
    pub fn snapshot(&self) -> BTreeMap<String, String> {
        self.values.read().clone()
    }

    /// Number of stored values
    pub fn len(&self) -> usize {
        self.values.read().len()
    }

    /// Whether the store is empty
    pub fn is_empty(&self) -> bool {
        self.values.read().is_empty()
    }
}

impl SettingsStore for MemorySettings {
    fn get(&self, key: &str) -> LatticeResult<Option<String>> {
        Ok(self.values.read().get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> LatticeResult<()> {
        self.values
            .write()
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn purge_all(&self) -> LatticeResult<()> {
        self.values.write().clear();
        Ok(())
    }
}

// ============================================================================
// JsonFileSettings
// ============================================================================

/// Settings persisted as a JSON object
///
/// Every change rewrites the whole file through a temporary sibling and a
/// rename, so a crash leaves either the old or the new contents.
#[derive(Debug)]
pub struct JsonFileSettings {
    path: PathBuf,
    values: RwLock<BTreeMap<String, String>>,
}

impl JsonFileSettings {
    /// Open the store at `path`; a missing file reads as empty
    pub fn open(path: impl Into<PathBuf>) -> LatticeResult<Self> {
        let path = path.into();
        let values = if path.exists() {
            let content = std::fs::read_to_string(&path)?;
            serde_json::from_str(&content).map_err(|e| {
                LatticeError::settings(format!(
                    "failed to parse settings file '{}': {}",
                    path.display(),
                    e
                ))
            })?
        } else {
            BTreeMap::new()
        };
        Ok(Self {
            path,
            values: RwLock::new(values),
        })
    }

    /// File backing this store
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn persist(&self, values: &BTreeMap<String, String>) -> LatticeResult<()> {
        let content = serde_json::to_string_pretty(values)?;
        let tmp = self.path.with_extension("json.tmp");
        std::fs::write(&tmp, content)?;
        std::fs::rename(&tmp, &self.path)?;
        debug!(target: "lattice::storage", path = ?self.path, entries = values.len(), "Settings persisted");
        Ok(())
    }
}

impl SettingsStore for JsonFileSettings {
    fn get(&self, key: &str) -> LatticeResult<Option<String>> {
        Ok(self.values.read().get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> LatticeResult<()> {
        let mut values = self.values.write();
        let mut next = values.clone();
        next.insert(key.to_string(), value.to_string());
        self.persist(&next)?;
        *values = next;
        Ok(())
    }

    fn purge_all(&self) -> LatticeResult<()> {
        let mut values = self.values.write();
        self.persist(&BTreeMap::new())?;
        values.clear();
        Ok(())
    }
}

// ============================================================================
// Providers
// ============================================================================

/// One [`MemorySettings`] per database name, kept for the provider's lifetime
#[derive(Debug, Default)]
pub struct MemorySettingsProvider {
    stores: DashMap<String, Arc<MemorySettings>>,
}

impl MemorySettingsProvider {
    /// Create a provider with no stores
    pub fn new() -> Self {
        Self::default()
    }

    /// Concrete store of `database`, if opened
    pub fn store(&self, database: &str) -> Option<Arc<MemorySettings>> {
        self.stores.get(database).map(|s| Arc::clone(s.value()))
    }
}

impl SettingsProvider for MemorySettingsProvider {
    fn open_settings(&self, database: &str) -> LatticeResult<Arc<dyn SettingsStore>> {
        let store: Arc<dyn SettingsStore> = self
            .stores
            .entry(database.to_string())
            .or_insert_with(|| Arc::new(MemorySettings::new()))
            .value()
            .clone();
        Ok(store)
    }
}

/// One [`JsonFileSettings`] per database, at `<dir>/<name>.settings.json`
#[derive(Debug)]
pub struct JsonFileSettingsProvider {
    dir: PathBuf,
}

impl JsonFileSettingsProvider {
    /// Provider storing files under `dir`
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Settings file of `database`
    pub fn path_for(&self, database: &str) -> PathBuf {
        self.dir.join(format!("{}.settings.json", database))
    }
}

impl SettingsProvider for JsonFileSettingsProvider {
    fn open_settings(&self, database: &str) -> LatticeResult<Arc<dyn SettingsStore>> {
        std::fs::create_dir_all(&self.dir)?;
        Ok(Arc::new(JsonFileSettings::open(self.path_for(database))?))
    }
}
