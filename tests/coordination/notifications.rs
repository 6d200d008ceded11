//! Notification batching and delivery

use crate::common::*;
use latticedb::{LatticeResult, Notifications, Record};
use serde_json::json;
use std::sync::Arc;
use std::thread;

#[test]
fn nested_calls_flush_once_after_outermost() {
    let registry = Harness::new().registry();
    let db = registry.default_instance().unwrap();
    let events = record_events(&db);

    db.execute(Notifications::new().with("task.created", json!("a")), |_| {
        db.execute(Notifications::new().with("task.created", json!("b")), |_| {
            db.execute(Notifications::new().with("note.created", json!("n")), |txn| {
                txn.track("task.created", json!("c"));
                Ok(())
            })
        })?;
        assert!(events.lock().is_empty());
        Ok(())
    })
    .unwrap();

    let delivered = sorted(&events);
    assert_eq!(delivered.len(), 2);
    assert_eq!(delivered[0].namespace, "note.created");
    assert_eq!(delivered[0].instances, vec![json!("n")]);
    assert_eq!(delivered[1].namespace, "task.created");
    assert_eq!(
        delivered[1].instances,
        vec![json!("a"), json!("b"), json!("c")]
    );
    assert_eq!(db.notifications().flush_count(), 1);
}

#[test]
fn empty_notifications_fire_nothing() {
    let registry = Harness::new().registry();
    let db = registry.default_instance().unwrap();
    let events = record_events(&db);

    db.read_write(|txn| txn.put(Record::new("Task", "a"))).unwrap();
    assert!(events.lock().is_empty());
    assert_eq!(db.notifications().flush_count(), 0);
}

#[test]
fn failed_execute_does_not_flush_and_does_not_leak() {
    let registry = Harness::new().registry();
    let db = registry.default_instance().unwrap();
    let events = record_events(&db);

    let _ = db.execute(
        Notifications::new().with("task.created", json!("lost")),
        |_| -> LatticeResult<()> { Err(latticedb::LatticeError::work("nope")) },
    );
    db.execute(Notifications::new().with("task.created", json!("kept")), |_| Ok(()))
        .unwrap();

    let delivered = events.lock().clone();
    assert_eq!(delivered.len(), 1);
    assert_eq!(delivered[0].instances, vec![json!("kept")]);
}

#[test]
fn rolled_back_execute_discards_batch() {
    let registry = Harness::new().registry();
    let db = registry.default_instance().unwrap();
    let events = record_events(&db);

    db.execute(Notifications::new().with("task.created", json!("a")), |txn| {
        txn.rollback();
        Ok(())
    })
    .unwrap();

    assert!(events.lock().is_empty());
    assert!(db.notifications().pending().is_empty());
}

#[test]
fn batches_do_not_cross_threads() {
    let registry = Harness::new().registry();
    let db = registry.default_instance().unwrap();
    let events = record_events(&db);

    db.notifications().track("main", json!(1));

    let worker_db = Arc::clone(&db);
    thread::spawn(move || {
        worker_db
            .execute(Notifications::new().with("worker", json!(2)), |_| Ok(()))
            .unwrap();
    })
    .join()
    .unwrap();

    // Only the worker's batch has been delivered so far
    {
        let seen = events.lock();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].namespace, "worker");
        assert_eq!(seen[0].instances, vec![json!(2)]);
    }

    db.read_write(|_| Ok(())).unwrap();
    let delivered = sorted(&events);
    assert_eq!(delivered.len(), 2);
    assert_eq!(delivered[0].namespace, "main");
}

#[test]
fn track_outside_transaction_is_dropped() {
    let registry = Harness::new().registry();
    let db = registry.default_instance().unwrap();
    let events = record_events(&db);

    assert!(!db.track("orphan", json!(1)));
    assert_eq!(db.notifications().pending_threads(), 0);

    db.read_write(|_| {
        assert!(db.track("task.updated", json!(2)));
        Ok(())
    })
    .unwrap();

    let seen = events.lock();
    assert_eq!(seen.len(), 1);
    assert_eq!(seen[0].namespace, "task.updated");
    assert_eq!(db.notifications().pending_threads(), 0);
}

#[test]
fn sink_may_execute_after_flush() {
    let registry = Harness::new().registry();
    let db = registry.default_instance().unwrap();

    let follow_up = Arc::clone(&db);
    db.subscribe(move |event: &latticedb::NotificationEvent| {
        if event.namespace == "task.created" {
            follow_up
                .read_write(|txn| txn.put(Record::new("Audit", "entry")))
                .unwrap();
        }
    });

    db.execute(Notifications::new().with("task.created", json!("a")), |_| Ok(()))
        .unwrap();

    let db_check = registry.default_instance().unwrap();
    db_check
        .read_write(|txn| {
            assert!(txn.get("Audit", "entry")?.is_some());
            Ok(())
        })
        .unwrap();
}
