//! Reentrant transaction scoping and error propagation

use crate::common::*;
use latticedb::{DatabaseInstance, FieldValue, LatticeError, LatticeResult, Notifications, Record, Scope};
use serde_json::json;
use std::fmt;
use std::sync::{Arc, Barrier};
use std::thread;

#[derive(Debug, PartialEq)]
struct Rejected {
    code: u32,
}

impl fmt::Display for Rejected {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "rejected with code {}", self.code)
    }
}

impl std::error::Error for Rejected {}

fn nest(db: &DatabaseInstance, depth: usize) -> LatticeResult<()> {
    db.read_write(|txn| {
        txn.put(Record::new("Task", format!("depth-{}", depth)))?;
        if depth > 1 {
            nest(db, depth - 1)?;
        }
        Ok(())
    })
}

#[test]
fn nested_executes_use_one_engine_transaction() {
    let harness = Harness::new();
    let registry = harness.registry();
    let db = registry.default_instance().unwrap();

    nest(&db, 5).unwrap();

    let conn = harness.connection("default");
    assert_eq!(conn.stats().read_write_calls, 1);
    assert_eq!(conn.object_count("Task"), 5);
    assert_eq!(db.transactions().opened_count(), 1);
    assert_eq!(db.transactions().reentered_count(), 4);
    assert!(!db.in_transaction());
}

#[test]
fn nested_reads_see_outer_writes() {
    let registry = Harness::new().registry();
    let db = registry.default_instance().unwrap();

    db.read_write(|outer| {
        outer.put(Record::new("Task", "a").with("title", "first"))?;
        db.read_write(|inner| {
            assert_eq!(inner.scope(), Scope::Reentrant);
            let seen = inner.get("Task", "a")?.expect("outer write visible");
            assert_eq!(seen.get("title"), Some(&FieldValue::String("first".to_string())));
            Ok(())
        })
    })
    .unwrap();
}

#[test]
fn failing_unit_of_work_rolls_back_and_reraises_original() {
    let harness = Harness::new();
    let registry = harness.registry();
    let db = registry.default_instance().unwrap();
    let events = record_events(&db);

    let err = db
        .execute(
            Notifications::new().with("task.created", json!({"key": "a"})),
            |txn| -> LatticeResult<()> {
                txn.put(Record::new("Task", "a"))?;
                Err(LatticeError::unit_of_work(Rejected { code: 7 }))
            },
        )
        .unwrap_err();

    match &err {
        LatticeError::UnitOfWork(source) => {
            assert_eq!(source.downcast_ref::<Rejected>(), Some(&Rejected { code: 7 }));
        }
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(harness.connection("default").total_objects(), 0);
    assert!(events.lock().is_empty());
    assert!(db.notifications().pending().is_empty());
}

#[test]
fn inner_failure_propagated_by_outer_rolls_back_everything() {
    let harness = Harness::new();
    let registry = harness.registry();
    let db = registry.default_instance().unwrap();

    let result = db.read_write(|txn| {
        txn.put(Record::new("Task", "outer"))?;
        db.read_write(|inner| -> LatticeResult<()> {
            inner.put(Record::new("Task", "inner"))?;
            Err(LatticeError::work("inner failed"))
        })
    });

    assert!(result.unwrap_err().is_unit_of_work());
    assert_eq!(harness.connection("default").total_objects(), 0);
}

#[test]
fn inner_failure_recovered_by_outer_still_commits() {
    let harness = Harness::new();
    let registry = harness.registry();
    let db = registry.default_instance().unwrap();

    db.read_write(|txn| {
        txn.put(Record::new("Task", "outer"))?;
        let inner = db.read_write(|_| -> LatticeResult<()> { Err(LatticeError::work("ignored")) });
        assert!(inner.is_err());
        Ok(())
    })
    .unwrap();

    assert!(harness.connection("default").object("Task", "outer").is_some());
}

#[test]
fn context_cleared_after_outermost_returns() {
    let registry = Harness::new().registry();
    let db = registry.default_instance().unwrap();

    db.read_write(|_| {
        assert!(db.in_transaction());
        Ok(())
    })
    .unwrap();
    assert!(!db.in_transaction());
    assert_eq!(db.transactions().active_threads(), 0);

    // A fresh call is outermost again
    db.read_write(|txn| {
        assert_eq!(txn.scope(), Scope::Outermost);
        Ok(())
    })
    .unwrap();
}

#[test]
fn threads_do_not_share_transactions() {
    let harness = Harness::new();
    let registry = Arc::new(harness.registry());
    let barrier = Arc::new(Barrier::new(4));

    let handles: Vec<_> = (0..4)
        .map(|i| {
            let registry = Arc::clone(&registry);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                let db = registry.default_instance().unwrap();
                barrier.wait();
                db.read_write(|txn| {
                    assert_eq!(txn.scope(), Scope::Outermost);
                    txn.put(Record::new("Task", format!("t{}", i)))
                })
                .unwrap();
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    let conn = harness.connection("default");
    assert_eq!(conn.stats().read_write_calls, 4);
    assert_eq!(conn.object_count("Task"), 4);
}
