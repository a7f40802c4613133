//! Version Ordering Tests
//!
//! Every committed write set gets the next version; read-only and empty
//! commits publish nothing.

use crate::*;
use std::sync::Barrier;

#[test]
fn test_each_write_commit_advances_version_by_one() {
    let stm = create_stm();
    assert_eq!(stm.version(), Version::ZERO);

    let handle = open_account(&stm, 0);
    assert_eq!(stm.version(), Version::new(1));

    balance(&stm, handle);
    assert_eq!(stm.version(), Version::new(1));

    for expected in 2..=5 {
        stm.atomically(|txn| {
            txn.load::<Account>(handle)?.update(|a| a.balance += 1);
            Ok(())
        })
        .unwrap();
        assert_eq!(stm.version(), Version::new(expected));
    }
}

#[test]
fn test_multi_object_commit_is_one_version() {
    let stm = create_stm();
    let before = stm.version();
    stm.atomically(|txn| {
        for balance in 0..10 {
            txn.attach_as_root(&Tracked::new(Account { balance }))?;
        }
        Ok(())
    })
    .unwrap();
    assert_eq!(stm.version(), before.next());
}

#[test]
fn test_versions_are_monotonic_under_threads() {
    const THREADS: usize = 6;
    const COMMITS: usize = 50;

    let stm = create_stm();
    let accounts: Vec<Handle> = (0..THREADS).map(|_| open_account(&stm, 0)).collect();
    let start = stm.version();
    let barrier = Arc::new(Barrier::new(THREADS));

    let workers: Vec<_> = accounts
        .into_iter()
        .map(|account| {
            let stm = Arc::clone(&stm);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                let mut observed = Vec::with_capacity(COMMITS);
                for _ in 0..COMMITS {
                    stm.atomically(|txn| {
                        observed.push(txn.version());
                        txn.load::<Account>(account)?.update(|a| a.balance += 1);
                        Ok(())
                    })
                    .unwrap();
                }
                observed
            })
        })
        .collect();

    for worker in workers {
        let observed = worker.join().unwrap();
        assert!(observed.windows(2).all(|w| w[0] <= w[1]), "{observed:?}");
    }

    let expected = start.as_u64() + (THREADS * COMMITS) as u64;
    assert_eq!(stm.version(), Version::new(expected));
}

#[test]
fn test_historical_snapshot_lookup() {
    let stm = Stm::builder().collect_garbage_on_commit(false).build();
    let handle = open_account(&stm, 0);
    for _ in 0..3 {
        stm.atomically(|txn| {
            txn.load::<Account>(handle)?.update(|a| a.balance += 10);
            Ok(())
        })
        .unwrap();
    }

    let snapshot = stm.heap().snapshot(Version::new(2)).unwrap();
    assert_eq!(snapshot.version(), Version::new(2));
    let stored = snapshot.lookup(handle).unwrap();
    assert_eq!(stored.downcast_ref::<Account>(), Some(&10));

    let head = stm.heap().snapshot(Version::new(100)).unwrap();
    assert_eq!(head.version(), stm.version());
}
