//! Registry resolution and the process-wide registry

use crate::common::*;
use latticedb::{
    global, install_global, DatabaseRegistry, LatticeError, Record, SettingsStore,
    CONFIG_FILE_NAME,
};
use std::sync::{Arc, Barrier};
use std::thread;
use tempfile::TempDir;

#[test]
fn concurrent_first_access_yields_one_instance() {
    let harness = Harness::new();
    let registry = Arc::new(harness.registry());
    let barrier = Arc::new(Barrier::new(16));

    let handles: Vec<_> = (0..16)
        .map(|_| {
            let registry = Arc::clone(&registry);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                registry.instance("shared").unwrap()
            })
        })
        .collect();
    let instances: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();

    assert!(instances.iter().all(|i| Arc::ptr_eq(i, &instances[0])));
    assert_eq!(registry.names(), vec!["shared"]);
    assert_eq!(harness.engine.len(), 1);
}

#[test]
fn initializer_declares_indexes_for_every_instance() {
    let harness = Harness::new();
    let schema = task_schema();
    let registry = harness
        .registry()
        .with_initializer(move |db| db.declare_index("Task", ["done"], &schema));

    for name in ["alpha", "beta"] {
        let db = registry.instance(name).unwrap();
        db.read_write(|txn| txn.put(Record::new("Task", "a").with("done", true)))
            .unwrap();
        assert!(harness
            .connection(name)
            .index_row("Task_IDX", "a")
            .is_some());
    }
}

#[test]
fn invalid_names_rejected() {
    let registry = Harness::new().registry();
    for name in ["", "../escape", "white space", "dots.db"] {
        let err = registry.instance(name).unwrap_err();
        assert!(matches!(err, LatticeError::InvalidName { .. }), "{name:?}");
    }
    assert!(registry.is_empty());
}

#[test]
fn file_backed_registry_keeps_fingerprints_across_restart() {
    let dir = TempDir::new().unwrap();
    let schema = task_schema();

    {
        let registry = DatabaseRegistry::open(dir.path()).unwrap();
        let db = registry.default_instance().unwrap();
        db.declare_index("Task", ["done"], &schema).unwrap();
        let report = db.ensure_indexes_current().unwrap();
        assert_eq!(report.rebuilt, vec!["Task"]);
    }

    assert!(dir.path().join(CONFIG_FILE_NAME).exists());

    let registry = DatabaseRegistry::open(dir.path()).unwrap();
    let db = registry.default_instance().unwrap();
    assert!(db.settings().get("Task_idx_defn").unwrap().is_some());

    db.declare_index("Task", ["done"], &schema).unwrap();
    let report = db.ensure_indexes_current().unwrap();
    assert_eq!(report.unchanged, vec!["Task"]);
    assert!(report.rebuilt.is_empty());
}

#[test]
fn global_registry_installs_once() {
    let registry = install_global(DatabaseRegistry::in_memory()).unwrap();
    assert!(std::ptr::eq(registry, global().unwrap()));

    let err = install_global(DatabaseRegistry::in_memory()).unwrap_err();
    assert!(err.is_configuration());

    let db = global().unwrap().default_instance().unwrap();
    assert_eq!(db.name(), "default");
}
