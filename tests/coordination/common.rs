//! Shared helpers for the coordination suite.

#![allow(dead_code)]

use latticedb::storage::{MemoryConnection, MemoryEngine, MemorySettings, MemorySettingsProvider};
use latticedb::{
    DatabaseInstance, DatabaseRegistry, FieldType, LatticeConfig, ModelSchema, NotificationEvent,
};
use parking_lot::Mutex;
use std::sync::Arc;

/// Schema used across the suite
pub fn task_schema() -> ModelSchema {
    ModelSchema::new()
        .field("Task", "done", FieldType::Boolean)
        .field("Task", "title", FieldType::String)
        .field("Task", "due", FieldType::Time)
        .field("Task", "rank", FieldType::Integer)
        .untyped_field("Task", "notes")
        .field("Note", "body", FieldType::String)
}

// ============================================================================
// Harness
// ============================================================================

/// Engine and settings that outlive any one registry
///
/// `registry()` builds a fresh registry over the same engine and settings,
/// which is what a process restart against the same files looks like.
pub struct Harness {
    pub engine: Arc<MemoryEngine>,
    pub settings: Arc<MemorySettingsProvider>,
    pub config: LatticeConfig,
}

impl Harness {
    pub fn new() -> Self {
        Self {
            engine: Arc::new(MemoryEngine::new()),
            settings: Arc::new(MemorySettingsProvider::new()),
            config: LatticeConfig::default(),
        }
    }

    pub fn registry(&self) -> DatabaseRegistry {
        DatabaseRegistry::new(
            self.config.clone(),
            Arc::clone(&self.engine) as Arc<dyn latticedb::StorageEngine>,
            Arc::clone(&self.settings) as Arc<dyn latticedb::SettingsProvider>,
        )
    }

    /// Concrete connection of an already-created database
    pub fn connection(&self, name: &str) -> Arc<MemoryConnection> {
        self.engine
            .connection(&self.config.database_path(name))
            .expect("database not opened yet")
    }

    /// Concrete settings store of an already-created database
    pub fn settings_of(&self, name: &str) -> Arc<MemorySettings> {
        self.settings
            .store(name)
            .expect("settings not opened yet")
    }
}

/// Subscribe a recording sink to `db`
pub fn record_events(db: &DatabaseInstance) -> Arc<Mutex<Vec<NotificationEvent>>> {
    let events = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&events);
    db.subscribe(move |event: &NotificationEvent| sink.lock().push(event.clone()));
    events
}

/// Recorded events sorted by namespace
pub fn sorted(events: &Mutex<Vec<NotificationEvent>>) -> Vec<NotificationEvent> {
    let mut events = events.lock().clone();
    events.sort_by(|a, b| a.namespace.cmp(&b.namespace));
    events
}
