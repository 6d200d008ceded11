//! Purge: settings and objects removed, indexes rebuilt on next use

use crate::common::*;
use latticedb::storage::ExtensionEvent;
use latticedb::{ColumnValue, Record, SettingsStore};

#[test]
fn purge_default_clears_settings_and_collections() {
    let harness = Harness::new();
    let registry = harness.registry();
    let db = registry.default_instance().unwrap();
    let schema = task_schema();
    db.declare_index("Task", ["done"], &schema).unwrap();
    db.declare_search_index("Task", ["title"], &schema).unwrap();
    db.declare_index("Note", ["body"], &schema).unwrap();

    db.read_write(|txn| {
        txn.put(Record::new("Task", "a").with("done", true).with("title", "x"))?;
        txn.put(Record::new("Note", "n").with("body", "hello"))
    })
    .unwrap();
    let settings = harness.settings_of("default");
    assert_eq!(settings.len(), 3);

    registry.purge("default").unwrap();

    for key in ["Task_idx_defn", "Task_sidx_defn", "Note_idx_defn"] {
        assert!(settings.get(key).unwrap().is_none(), "{key} survived purge");
    }
    let conn = harness.connection("default");
    assert_eq!(conn.total_objects(), 0);
    db.read_write(|txn| {
        assert!(txn.collections()?.is_empty());
        Ok(())
    })
    .unwrap();
}

#[test]
fn purge_forces_rebuild_on_next_execute() {
    let harness = Harness::new();
    let registry = harness.registry();
    let db = registry.default_instance().unwrap();
    db.declare_index("Task", ["done"], &task_schema()).unwrap();
    db.read_write(|_| Ok(())).unwrap();

    db.purge().unwrap();
    db.read_write(|txn| txn.put(Record::new("Task", "b").with("done", false)))
        .unwrap();

    let conn = harness.connection("default");
    assert_eq!(
        conn.extension_events(),
        vec![
            ExtensionEvent::Registered("Task_IDX".to_string()),
            ExtensionEvent::Unregistered("Task_IDX".to_string()),
            ExtensionEvent::Registered("Task_IDX".to_string()),
        ]
    );
    assert_eq!(
        conn.index_row("Task_IDX", "b").unwrap()["done"],
        ColumnValue::Integer(0)
    );
    assert!(harness
        .settings_of("default")
        .get("Task_idx_defn")
        .unwrap()
        .is_some());
}

#[test]
fn purge_runs_in_its_own_transaction() {
    let harness = Harness::new();
    let registry = harness.registry();
    let db = registry.default_instance().unwrap();
    db.read_write(|txn| txn.put(Record::new("Task", "a"))).unwrap();

    let before = harness.connection("default").stats().read_write_calls;
    db.purge().unwrap();
    assert_eq!(
        harness.connection("default").stats().read_write_calls,
        before + 1
    );
}

#[test]
fn purge_refused_inside_transaction() {
    let harness = Harness::new();
    let registry = harness.registry();
    let db = registry.default_instance().unwrap();

    let err = db
        .read_write(|txn| {
            txn.put(Record::new("Task", "a"))?;
            db.purge()
        })
        .unwrap_err();

    assert!(err.is_purge());
    assert_eq!(harness.connection("default").total_objects(), 0);
}

#[test]
fn purge_of_unused_name_creates_empty_instance() {
    let harness = Harness::new();
    let registry = harness.registry();

    registry.purge("fresh").unwrap();
    assert!(registry.contains("fresh"));
    assert_eq!(harness.connection("fresh").total_objects(), 0);
}
