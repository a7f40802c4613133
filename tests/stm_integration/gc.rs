//! Snapshot Reclamation Tests
//!
//! Superseded snapshots are kept only while a transaction still reads from
//! them.

use crate::*;

fn increment(stm: &Stm, handle: Handle) {
    stm.atomically(|txn| {
        txn.load::<Account>(handle)?.update(|a| a.balance += 1);
        Ok(())
    })
    .unwrap();
}

#[test]
fn test_unheld_snapshots_are_reclaimed() {
    let stm = create_stm();
    let handle = open_account(&stm, 0);
    for _ in 0..10 {
        increment(&stm, handle);
    }
    stm.collect_garbage();
    assert_eq!(stm.heap().retained_snapshots(), 0);
}

#[test]
fn test_held_snapshot_stays_readable() {
    let stm = create_stm();
    let handle = open_account(&stm, 0);
    let held = stm.version();

    let mut reader = stm.start_transaction();
    for _ in 0..5 {
        increment(&stm, handle);
    }
    stm.collect_garbage();
    assert!(stm.heap().retained_snapshots() >= 1);
    assert_eq!(stm.heap().snapshot(held).unwrap().version(), held);

    // Cell history is kept back to the oldest retained snapshot.
    let old = stm.heap().read_at(handle, held).unwrap().unwrap();
    assert_eq!(old.downcast_ref::<Account>(), Some(&0));

    assert_eq!(reader.load::<Account>(handle).unwrap().get().balance, 0);
    drop(reader);

    stm.collect_garbage();
    assert_eq!(stm.heap().retained_snapshots(), 0);
    assert!(matches!(
        stm.heap().snapshot(held),
        Err(StmError::SnapshotTooOld { .. })
    ));
}

#[test]
fn test_collection_can_be_manual_only() {
    let stm = Stm::builder().collect_garbage_on_commit(false).build();
    let handle = open_account(&stm, 0);
    for _ in 0..4 {
        increment(&stm, handle);
    }
    assert_eq!(stm.heap().retained_snapshots(), 5);
    assert_eq!(stm.collect_garbage(), 5);
    assert_eq!(stm.heap().retained_snapshots(), 0);
}

#[test]
fn test_config_from_toml_drives_engine() {
    let config = StmConfig::from_toml_str(
        r#"
        [heap]
        collect_garbage_on_commit = false

        [retry]
        max_retries = 3
        "#,
    )
    .unwrap();
    let stm = Stm::with_config(config);
    assert_eq!(stm.config().retry.max_retries, 3);
    assert!(!stm.heap().config().collect_garbage_on_commit);

    let handle = open_account(&stm, 0);
    increment(&stm, handle);
    assert_eq!(stm.heap().retained_snapshots(), 2);
}
