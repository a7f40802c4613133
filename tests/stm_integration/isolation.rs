//! Snapshot Isolation Tests
//!
//! A transaction sees exactly the heap version it started on, plus its own
//! changes, and nothing else.

use crate::*;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Barrier;

// =============================================================================
// SINGLE-THREADED
// =============================================================================

#[test]
fn test_reader_ignores_later_commits() {
    let stm = create_stm();
    let handle = open_account(&stm, 100);

    let mut reader = stm.start_transaction();
    stm.atomically(|txn| {
        txn.load::<Account>(handle)?.set(Account { balance: 5 });
        Ok(())
    })
    .unwrap();

    assert_eq!(reader.load::<Account>(handle).unwrap().get().balance, 100);
    assert!(reader.version() < stm.version());
    assert_eq!(balance(&stm, handle), 5);
}

#[test]
fn test_uncommitted_changes_are_invisible() {
    let stm = create_stm();
    let handle = open_account(&stm, 100);

    let mut writer = stm.start_transaction();
    writer.load::<Account>(handle).unwrap().set(Account { balance: 0 });

    let mut reader = stm.start_transaction();
    assert_eq!(reader.load::<Account>(handle).unwrap().get().balance, 100);

    stm.abort(&mut writer).unwrap();
    assert_eq!(balance(&stm, handle), 100);
}

#[test]
fn test_reads_see_own_writes() {
    let stm = create_stm();
    let handle = open_account(&stm, 1);

    stm.atomically(|txn| {
        let first = txn.load::<Account>(handle)?;
        first.update(|a| a.balance += 1);
        let second = txn.load::<Account>(handle)?;
        assert!(Tracked::ptr_eq(&first, &second));
        assert_eq!(second.get().balance, 2);
        Ok(())
    })
    .unwrap();
}

#[test]
fn test_new_objects_are_visible_only_after_commit() {
    let stm = create_stm();
    let mut creator = stm.start_transaction();
    let handle = creator
        .attach_as_root(&Tracked::new(Account { balance: 9 }))
        .unwrap();

    let mut early = stm.start_transaction();
    assert!(matches!(
        early.load::<Account>(handle),
        Err(StmError::NoSuchObject { .. })
    ));

    stm.commit(&mut creator).unwrap();
    assert_eq!(balance(&stm, handle), 9);
}

#[test]
fn test_finished_transaction_rejects_reads() {
    let stm = create_stm();
    let handle = open_account(&stm, 1);
    let mut txn = stm.start_transaction();
    stm.commit(&mut txn).unwrap();
    assert!(matches!(
        txn.load::<Account>(handle),
        Err(StmError::IllegalTransactionState { .. })
    ));
}

// =============================================================================
// MULTI-THREADED
// =============================================================================

/// Readers must never observe a transfer half-applied.
#[test]
fn test_readers_see_consistent_totals_during_transfers() {
    const ACCOUNTS: usize = 4;
    const TOTAL: i64 = 1_000;

    let stm = create_stm();
    let accounts: Vec<Handle> = (0..ACCOUNTS)
        .map(|_| open_account(&stm, TOTAL / ACCOUNTS as i64))
        .collect();
    let accounts = Arc::new(accounts);
    let done = Arc::new(AtomicBool::new(false));
    let barrier = Arc::new(Barrier::new(3));

    let writers: Vec<_> = (0..2)
        .map(|w| {
            let stm = Arc::clone(&stm);
            let accounts = Arc::clone(&accounts);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                for i in 0..200 {
                    let from = accounts[(i + w) % ACCOUNTS];
                    let to = accounts[(i + w + 1) % ACCOUNTS];
                    stm.atomically(|txn| transfer(txn, from, to, (i % 7) as i64))
                        .unwrap();
                }
            })
        })
        .collect();

    let reader = {
        let stm = Arc::clone(&stm);
        let accounts = Arc::clone(&accounts);
        let done = Arc::clone(&done);
        let barrier = Arc::clone(&barrier);
        thread::spawn(move || {
            barrier.wait();
            let mut checks = 0;
            while !done.load(Ordering::Acquire) || checks == 0 {
                let total = stm
                    .atomically(|txn| {
                        let mut sum = 0;
                        for handle in accounts.iter() {
                            sum += txn.load::<Account>(*handle)?.get().balance;
                        }
                        Ok(sum)
                    })
                    .unwrap();
                assert_eq!(total, TOTAL);
                checks += 1;
            }
            checks
        })
    };

    for w in writers {
        w.join().unwrap();
    }
    done.store(true, Ordering::Release);
    assert!(reader.join().unwrap() > 0);

    let final_total: i64 = accounts.iter().map(|h| balance(&stm, *h)).sum();
    assert_eq!(final_total, TOTAL);
}
