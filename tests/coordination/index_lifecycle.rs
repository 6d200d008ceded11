//! Index declaration, fingerprinting and rebuild behavior

use crate::common::*;
use chrono::{TimeZone, Utc};
use latticedb::storage::ExtensionEvent;
use latticedb::{ColumnValue, Connection, LatticeError, Record, SettingsStore};

// ============================================================================
// Stored values
// ============================================================================

#[test]
fn boolean_index_stores_integer_and_null_marker() {
    let harness = Harness::new();
    let registry = harness.registry();
    let db = registry.default_instance().unwrap();
    db.declare_index("Task", ["done"], &task_schema()).unwrap();

    db.read_write(|txn| {
        txn.put(Record::new("Task", "finished").with("done", true))?;
        txn.put(Record::new("Task", "unknown").with("done", None::<bool>))
    })
    .unwrap();

    let conn = harness.connection("default");
    assert_eq!(
        conn.index_row("Task_IDX", "finished").unwrap()["done"],
        ColumnValue::Integer(1)
    );
    assert_eq!(
        conn.index_row("Task_IDX", "unknown").unwrap()["done"],
        ColumnValue::Null
    );
}

#[test]
fn column_mapping_per_field_type() {
    let harness = Harness::new();
    let registry = harness.registry();
    let db = registry.default_instance().unwrap();
    db.declare_index("Task", ["done", "title", "due", "rank"], &task_schema())
        .unwrap();

    let due = Utc.with_ymd_and_hms(2024, 1, 2, 3, 4, 5).unwrap();
    db.read_write(|txn| {
        txn.put(
            Record::new("Task", "a")
                .with("done", false)
                .with("title", "write docs")
                .with("due", due)
                .with("rank", 3_i64),
        )
    })
    .unwrap();

    let row = harness.connection("default").index_row("Task_IDX", "a").unwrap();
    assert_eq!(row["done"], ColumnValue::Integer(0));
    assert_eq!(row["title"], ColumnValue::Text("write docs".to_string()));
    assert_eq!(row["due"], ColumnValue::Integer(due.timestamp()));
    assert_eq!(row["rank"], ColumnValue::Integer(3));
}

#[test]
fn search_index_concatenates_declared_fields() {
    let harness = Harness::new();
    let registry = harness.registry();
    let db = registry.default_instance().unwrap();
    db.declare_search_index("Task", ["title", "notes"], &task_schema())
        .unwrap();

    db.read_write(|txn| {
        txn.put(
            Record::new("Task", "a")
                .with("title", "Buy milk")
                .with("notes", "oat please"),
        )?;
        txn.put(Record::new("Task", "b").with("title", "Walk dog"))
    })
    .unwrap();

    let conn = harness.connection("default");
    assert_eq!(conn.search("Task_SIDX", "oat"), vec!["a"]);
    assert_eq!(conn.search("Task_SIDX", "dog"), vec!["b"]);
    assert!(conn.search("Task_SIDX", "cat").is_empty());
}

// ============================================================================
// Declaration errors
// ============================================================================

#[test]
fn unknown_field_names_collection_and_field() {
    let registry = Harness::new().registry();
    let db = registry.default_instance().unwrap();

    let err = db.declare_index("Task", ["priority"], &task_schema()).unwrap_err();
    assert!(err.is_configuration());
    assert_eq!(
        err.to_string(),
        "unknown field 'priority' on collection 'Task'"
    );
}

#[test]
fn untyped_field_cannot_back_secondary_index() {
    let registry = Harness::new().registry();
    let db = registry.default_instance().unwrap();

    let err = db.declare_index("Task", ["notes"], &task_schema()).unwrap_err();
    assert!(matches!(err, LatticeError::MissingType { .. }));
}

// ============================================================================
// Fingerprints across runs
// ============================================================================

#[test]
fn unchanged_spec_across_runs_does_not_rebuild() {
    let harness = Harness::new();
    let schema = task_schema();

    for _ in 0..2 {
        let registry = harness.registry();
        let db = registry.default_instance().unwrap();
        db.declare_index("Task", ["done", "title"], &schema).unwrap();
        db.read_write(|_| Ok(())).unwrap();
    }

    let conn = harness.connection("default");
    assert_eq!(conn.stats().rebuilds, 1);
    assert_eq!(
        conn.extension_events(),
        vec![ExtensionEvent::Registered("Task_IDX".to_string())]
    );
}

#[test]
fn changed_spec_unregisters_before_registering() {
    let harness = Harness::new();
    let schema = task_schema();

    {
        let registry = harness.registry();
        let db = registry.default_instance().unwrap();
        db.declare_index("Task", ["done"], &schema).unwrap();
        db.read_write(|_| Ok(())).unwrap();
    }

    let registry = harness.registry();
    let db = registry.default_instance().unwrap();
    db.declare_index("Task", ["done", "rank"], &schema).unwrap();
    db.read_write(|_| Ok(())).unwrap();

    let conn = harness.connection("default");
    assert_eq!(
        conn.extension_events(),
        vec![
            ExtensionEvent::Registered("Task_IDX".to_string()),
            ExtensionEvent::Unregistered("Task_IDX".to_string()),
            ExtensionEvent::Registered("Task_IDX".to_string()),
        ]
    );

    let expected = db.definitions().index_spec("Task").unwrap().fingerprint().unwrap();
    assert_eq!(
        harness
            .settings_of("default")
            .get("Task_idx_defn")
            .unwrap()
            .as_deref(),
        Some(expected.as_str())
    );
}

#[test]
fn declaration_order_does_not_change_fingerprint() {
    let harness = Harness::new();
    let registry = harness.registry();
    let schema = task_schema();

    let a = registry.instance("a").unwrap();
    a.declare_index("Task", ["done", "title", "rank"], &schema).unwrap();
    a.read_write(|_| Ok(())).unwrap();

    let b = registry.instance("b").unwrap();
    b.declare_index("Task", ["rank"], &schema).unwrap();
    b.declare_index("Task", ["title", "done"], &schema).unwrap();
    b.read_write(|_| Ok(())).unwrap();

    let fingerprint_a = harness.settings_of("a").get("Task_idx_defn").unwrap();
    let fingerprint_b = harness.settings_of("b").get("Task_idx_defn").unwrap();
    assert!(fingerprint_a.is_some());
    assert_eq!(fingerprint_a, fingerprint_b);
}

#[test]
fn search_declaration_order_across_runs_does_not_rebuild() {
    let harness = Harness::new();
    let schema = task_schema();

    {
        let registry = harness.registry();
        let db = registry.default_instance().unwrap();
        db.declare_search_index("Task", ["title", "notes"], &schema).unwrap();
        db.read_write(|txn| txn.put(Record::new("Task", "a").with("notes", "oat milk")))
            .unwrap();
    }

    let registry = harness.registry();
    let db = registry.default_instance().unwrap();
    db.declare_search_index("Task", ["notes", "title"], &schema).unwrap();
    for _ in 0..3 {
        db.read_write(|_| Ok(())).unwrap();
    }
    assert!(!db.definitions().search_indexes_dirty().is_dirty());

    let conn = harness.connection("default");
    assert_eq!(conn.stats().rebuilds, 1);
    assert_eq!(
        conn.extension_events(),
        vec![ExtensionEvent::Registered("Task_SIDX".to_string())]
    );
    assert_eq!(conn.search("Task_SIDX", "oat"), vec!["a"]);
}

#[test]
fn new_declaration_between_executes_triggers_one_pass() {
    let harness = Harness::new();
    let registry = harness.registry();
    let db = registry.default_instance().unwrap();
    let schema = task_schema();

    db.declare_index("Task", ["done"], &schema).unwrap();
    db.read_write(|_| Ok(())).unwrap();
    db.read_write(|_| Ok(())).unwrap();
    assert_eq!(db.builder().pass_count(), 2); // one per index kind

    db.declare_index("Note", ["body"], &schema).unwrap();
    db.read_write(|_| Ok(())).unwrap();
    assert_eq!(db.builder().pass_count(), 3);
    assert!(harness.connection("default").is_extension_registered("Note_IDX"));
}

// ============================================================================
// Failures
// ============================================================================

#[test]
fn failed_registration_is_retried_on_next_execute() {
    let harness = Harness::new();
    let registry = harness.registry();
    let db = registry.default_instance().unwrap();
    db.declare_index("Task", ["done"], &task_schema()).unwrap();
    // The connection exists once the instance does
    harness.connection("default").fail_next_registration("Task_IDX");

    let err = db.read_write(|_| Ok(())).unwrap_err();
    assert!(err.is_index_build());
    assert!(db.definitions().indexes_dirty().is_dirty());

    db.read_write(|txn| txn.put(Record::new("Task", "a").with("done", true)))
        .unwrap();
    assert_eq!(
        harness.connection("default").index_row("Task_IDX", "a").unwrap()["done"],
        ColumnValue::Integer(1)
    );
}
