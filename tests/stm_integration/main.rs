//! STM Integration Test Suite
//!
//! End-to-end tests through the public `mvstm` API: snapshot isolation,
//! conflict detection, version ordering, object graphs, blocking retry and
//! snapshot reclamation, many of them under real thread contention.
//!
//! ## Running Tests
//!
//! ```bash
//! # Run the whole suite
//! cargo test --test stm_integration
//!
//! # With engine logs
//! RUST_LOG=debug cargo test --test stm_integration -- --nocapture
//! ```

use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use mvstm::prelude::*;
use mvstm::ObjectRef;

pub mod conflicts;
pub mod gc;
pub mod isolation;
pub mod object_graph;
pub mod properties;
pub mod versions;

// =============================================================================
// SHARED TEST UTILITIES
// =============================================================================

/// Route engine logs through the test harness
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
}

/// Engine with short backoff, shareable across threads
pub fn create_stm() -> Arc<Stm> {
    init_tracing();
    Arc::new(Stm::builder().max_retries(1_000).backoff(0, 1).build())
}

/// Poll `condition` until it holds or `timeout` passes
pub fn wait_until(timeout: Duration, mut condition: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        thread::sleep(Duration::from_millis(2));
    }
    condition()
}

/// Bank account used by most tests
#[derive(Debug, Clone, PartialEq)]
pub struct Account {
    pub balance: i64,
}

impl Persistent for Account {
    type Stored = i64;

    fn dehydrate(&self) -> i64 {
        self.balance
    }

    fn hydrate(stored: &i64) -> Self {
        Account { balance: *stored }
    }
}

/// Store a new account and return its handle
pub fn open_account(stm: &Stm, balance: i64) -> Handle {
    stm.atomically(|txn| txn.attach_as_root(&Tracked::new(Account { balance })))
        .unwrap()
}

/// Committed balance of `handle`
pub fn balance(stm: &Stm, handle: Handle) -> i64 {
    stm.atomically(|txn| Ok(txn.load::<Account>(handle)?.get().balance))
        .unwrap()
}

/// Move `amount` between two accounts
pub fn transfer(txn: &mut Transaction, from: Handle, to: Handle, amount: i64) -> StmResult<()> {
    txn.load::<Account>(from)?.update(|a| a.balance -= amount);
    txn.load::<Account>(to)?.update(|a| a.balance += amount);
    Ok(())
}

/// Person with one outgoing reference, for object graph tests
#[derive(Debug)]
pub struct Person {
    pub name: String,
    pub friend: Link<Person>,
}

impl Person {
    pub fn new(name: &str) -> Tracked<Person> {
        Tracked::new(Person {
            name: name.to_string(),
            friend: Link::null(),
        })
    }
}

impl Persistent for Person {
    type Stored = (String, Handle);

    fn dehydrate(&self) -> (String, Handle) {
        (self.name.clone(), self.friend.handle())
    }

    fn hydrate(stored: &(String, Handle)) -> Self {
        Person {
            name: stored.0.clone(),
            friend: Link::from_handle(stored.1),
        }
    }

    fn members(&self) -> Vec<ObjectRef> {
        self.friend.member().into_iter().collect()
    }
}
