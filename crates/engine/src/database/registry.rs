//! Name-keyed database registry
//!
//! Maps database names to [`DatabaseInstance`]s. The first lookup of a name
//! opens the engine connection and settings store and builds the instance;
//! every later lookup, from any thread, returns the same `Arc`.
//!
//! # Invariants
//!
//! - Each name maps to exactly one instance for the registry's lifetime
//! - Instances are never removed
//! - Lookup and construction share one critical section
//! - Names are validated before they reach the filesystem
//!
//! An optional process-wide registry can be installed once with
//! [`install_global`] and reached with [`global`].

use super::config::{LatticeConfig, CONFIG_FILE_NAME};
use super::DatabaseInstance;
use lattice_core::{LatticeError, LatticeResult, SettingsProvider, StorageEngine};
use lattice_storage::{JsonFileSettingsProvider, MemoryEngine, MemorySettingsProvider};
use once_cell::sync::OnceCell;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info};

/// Maximum length of a database name.
pub const MAX_NAME_LENGTH: usize = 256;

/// Hook run once on every newly created instance, before it is published
pub type Initializer = Arc<dyn Fn(&DatabaseInstance) -> LatticeResult<()> + Send + Sync>;

/// Process-wide set of named database instances
pub struct DatabaseRegistry {
    config: LatticeConfig,
    engine: Arc<dyn StorageEngine>,
    settings: Arc<dyn SettingsProvider>,
    initializer: Option<Initializer>,
    instances: Mutex<HashMap<String, Arc<DatabaseInstance>>>,
}

impl std::fmt::Debug for DatabaseRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DatabaseRegistry")
            .field("config", &self.config)
            .field("instances", &self.names())
            .field("has_initializer", &self.initializer.is_some())
            .finish()
    }
}

impl DatabaseRegistry {
    /// Create a registry over an engine and a settings provider
    pub fn new(
        config: LatticeConfig,
        engine: Arc<dyn StorageEngine>,
        settings: Arc<dyn SettingsProvider>,
    ) -> Self {
        Self {
            config,
            engine,
            settings,
            initializer: None,
            instances: Mutex::new(HashMap::new()),
        }
    }

    /// Registry backed by the in-memory engine and in-memory settings
    pub fn in_memory() -> Self {
        Self::new(
            LatticeConfig::default(),
            Arc::new(MemoryEngine::new()),
            Arc::new(MemorySettingsProvider::new()),
        )
    }

    /// Registry rooted at `dir`, configured by `dir/lattice.toml`
    ///
    /// Writes a default `lattice.toml` on first open. Index fingerprints are
    /// kept as JSON files under the configured data directory.
    pub fn open(dir: impl AsRef<Path>) -> LatticeResult<Self> {
        let dir = dir.as_ref();
        std::fs::create_dir_all(dir)?;

        let config_path = dir.join(CONFIG_FILE_NAME);
        LatticeConfig::write_default_if_missing(&config_path)?;
        let config = LatticeConfig::from_file(&config_path)?.resolve_against(dir);
        std::fs::create_dir_all(&config.data_dir)?;

        info!(target: "lattice::registry", data_dir = ?config.data_dir, "Registry opened");
        let settings = Arc::new(JsonFileSettingsProvider::new(config.data_dir.clone()));
        Ok(Self::new(config, Arc::new(MemoryEngine::new()), settings))
    }

    /// Run `initializer` on every instance this registry creates
    ///
    /// The hook runs inside the registry's critical section and must not
    /// look up instances of the same registry.
    pub fn with_initializer<F>(mut self, initializer: F) -> Self
    where
        F: Fn(&DatabaseInstance) -> LatticeResult<()> + Send + Sync + 'static,
    {
        self.initializer = Some(Arc::new(initializer));
        self
    }

    /// Configuration in effect
    pub fn config(&self) -> &LatticeConfig {
        &self.config
    }

    /// Resolve `name`, creating the instance on first use
    ///
    /// # Errors
    /// * `InvalidName` - `name` is empty, too long, or has characters other
    ///   than ASCII alphanumerics, `-` and `_`
    /// * engine, settings or initializer failures; nothing is registered
    pub fn instance(&self, name: &str) -> LatticeResult<Arc<DatabaseInstance>> {
        let mut instances = self.instances.lock();
        if let Some(instance) = instances.get(name) {
            return Ok(Arc::clone(instance));
        }

        validate_database_name(name)?;
        let path = self.config.database_path(name);
        let connection = self.engine.open_connection(&path)?;
        let settings = self.settings.open_settings(name)?;
        let instance = Arc::new(DatabaseInstance::new(name, path, connection, settings));

        if let Some(initializer) = &self.initializer {
            initializer(&instance)?;
        }

        info!(target: "lattice::registry", database = %name, path = ?instance.path(), "Database instance created");
        instances.insert(name.to_string(), Arc::clone(&instance));
        Ok(instance)
    }

    /// Resolve the configured default database
    pub fn default_instance(&self) -> LatticeResult<Arc<DatabaseInstance>> {
        self.instance(&self.config.default_database)
    }

    /// Purge the database called `name`; see [`DatabaseInstance::purge`]
    pub fn purge(&self, name: &str) -> LatticeResult<()> {
        debug!(target: "lattice::registry", database = %name, "Purge requested");
        self.instance(name)?.purge()
    }

    /// Whether `name` has been created
    pub fn contains(&self, name: &str) -> bool {
        self.instances.lock().contains_key(name)
    }

    /// Names of created instances, sorted
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.instances.lock().keys().cloned().collect();
        names.sort();
        names
    }

    /// Number of created instances
    pub fn len(&self) -> usize {
        self.instances.lock().len()
    }

    /// Whether no instance has been created
    pub fn is_empty(&self) -> bool {
        self.instances.lock().is_empty()
    }
}

/// Check that `name` can be used as a database name.
///
/// Valid names:
/// - Are non-empty
/// - Are at most 256 characters
/// - Contain only ASCII alphanumerics, hyphens, and underscores
///
/// Names become file names, so this also rules out path traversal.
pub fn validate_database_name(name: &str) -> LatticeResult<()> {
    let invalid = |reason: &str| LatticeError::InvalidName {
        name: name.to_string(),
        reason: reason.to_string(),
    };

    if name.is_empty() {
        return Err(invalid("name is empty"));
    }
    if name.len() > MAX_NAME_LENGTH {
        return Err(invalid("name is longer than 256 characters"));
    }
    if !name
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
    {
        return Err(invalid(
            "only ASCII letters, digits, '-' and '_' are allowed",
        ));
    }
    Ok(())
}

// =============================================================================
// Process-wide registry
// =============================================================================

static GLOBAL_REGISTRY: OnceCell<DatabaseRegistry> = OnceCell::new();

/// Install the process-wide registry
///
/// # Errors
/// Returns a `Config` error if one is already installed.
pub fn install_global(registry: DatabaseRegistry) -> LatticeResult<&'static DatabaseRegistry> {
    GLOBAL_REGISTRY
        .set(registry)
        .map_err(|_| LatticeError::config("a global registry is already installed"))?;
    GLOBAL_REGISTRY
        .get()
        .ok_or_else(|| LatticeError::config("global registry missing after install"))
}

/// The process-wide registry, if installed
pub fn global() -> Option<&'static DatabaseRegistry> {
    GLOBAL_REGISTRY.get()
}
