//! Conflict Detection Tests
//!
//! Writes are validated against the heap at commit time: the first committer
//! wins, later writers of the same object fail with a write conflict, and
//! nothing else is rejected.

use crate::*;
use std::sync::Barrier;

#[test]
fn test_first_committer_wins() {
    let stm = create_stm();
    let handle = open_account(&stm, 10);

    let mut first = stm.start_transaction();
    let mut second = stm.start_transaction();
    first.load::<Account>(handle).unwrap().set(Account { balance: 11 });
    second.load::<Account>(handle).unwrap().set(Account { balance: 12 });

    stm.commit(&mut first).unwrap();
    let err = stm.commit(&mut second).unwrap_err();
    match err {
        StmError::WriteConflict {
            handle: conflicted,
            read_version,
            current_version,
        } => {
            assert_eq!(conflicted, handle);
            assert!(current_version > read_version);
        }
        other => panic!("expected a write conflict, got {other}"),
    }
    assert_eq!(second.status(), TransactionStatus::Aborted);
    assert_eq!(balance(&stm, handle), 11);
}

#[test]
fn test_disjoint_writers_both_commit() {
    let stm = create_stm();
    let a = open_account(&stm, 0);
    let b = open_account(&stm, 0);

    let mut first = stm.start_transaction();
    let mut second = stm.start_transaction();
    first.load::<Account>(a).unwrap().set(Account { balance: 1 });
    second.load::<Account>(b).unwrap().set(Account { balance: 2 });

    stm.commit(&mut first).unwrap();
    stm.commit(&mut second).unwrap();
    assert_eq!((balance(&stm, a), balance(&stm, b)), (1, 2));
}

#[test]
fn test_read_only_transactions_never_conflict() {
    let stm = create_stm();
    let handle = open_account(&stm, 10);

    let mut reader = stm.start_transaction();
    assert_eq!(reader.load::<Account>(handle).unwrap().get().balance, 10);
    stm.atomically(|txn| transfer(txn, handle, handle, 0)).unwrap();
    stm.atomically(|txn| {
        txn.load::<Account>(handle)?.set(Account { balance: 0 });
        Ok(())
    })
    .unwrap();

    let version = stm.version();
    assert_eq!(stm.commit(&mut reader).unwrap(), 0);
    assert_eq!(stm.version(), version);
}

#[test]
fn test_failed_commit_publishes_nothing() {
    let stm = create_stm();
    let a = open_account(&stm, 0);
    let b = open_account(&stm, 0);

    let mut loser = stm.start_transaction();
    transfer(&mut loser, a, b, 5).unwrap();
    stm.atomically(|txn| {
        txn.load::<Account>(b)?.set(Account { balance: 100 });
        Ok(())
    })
    .unwrap();

    assert!(stm.commit(&mut loser).unwrap_err().is_conflict());
    assert_eq!(balance(&stm, a), 0);
    assert_eq!(balance(&stm, b), 100);
}

#[test]
fn test_contended_counter_loses_no_updates() {
    const THREADS: usize = 8;
    const INCREMENTS: usize = 100;

    let stm = create_stm();
    let counter = open_account(&stm, 0);
    let barrier = Arc::new(Barrier::new(THREADS));

    let handles: Vec<_> = (0..THREADS)
        .map(|_| {
            let stm = Arc::clone(&stm);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                for _ in 0..INCREMENTS {
                    stm.atomically(|txn| {
                        txn.load::<Account>(counter)?.update(|a| a.balance += 1);
                        Ok(())
                    })
                    .unwrap();
                }
            })
        })
        .collect();
    for h in handles {
        h.join().unwrap();
    }

    assert_eq!(balance(&stm, counter), (THREADS * INCREMENTS) as i64);
    let stats = stm.statistics();
    assert_eq!(stats.aborted, stats.conflicted);
}

#[test]
fn test_concurrent_transfers_preserve_total() {
    const THREADS: usize = 4;
    const ACCOUNTS: usize = 5;

    let stm = create_stm();
    let accounts: Arc<Vec<Handle>> =
        Arc::new((0..ACCOUNTS).map(|_| open_account(&stm, 100)).collect());
    let barrier = Arc::new(Barrier::new(THREADS));

    let handles: Vec<_> = (0..THREADS)
        .map(|t| {
            let stm = Arc::clone(&stm);
            let accounts = Arc::clone(&accounts);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                for i in 0..100 {
                    let from = accounts[(t + i) % ACCOUNTS];
                    let to = accounts[(t * 3 + i * 7 + 1) % ACCOUNTS];
                    stm.atomically(|txn| transfer(txn, from, to, 3)).unwrap();
                }
            })
        })
        .collect();
    for h in handles {
        h.join().unwrap();
    }

    let total: i64 = accounts.iter().map(|h| balance(&stm, *h)).sum();
    assert_eq!(total, 100 * ACCOUNTS as i64);
}
