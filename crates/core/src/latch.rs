//! Single-use gate used by blocked transactions
//!
//! A [`Latch`] starts closed. Any thread may [`open`](Latch::open) it, after
//! which every current and future [`wait`](Latch::wait) returns immediately.
//! It is the only blocking primitive in the engine: a transaction that asked
//! for a retry registers a latch on its read handles and parks on it until a
//! writer touches one of them.

use parking_lot::{Condvar, Mutex};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

/// Openable, never-closing gate
///
/// # Example
///
/// ```
/// use mvstm_core::Latch;
/// use std::sync::Arc;
/// use std::thread;
///
/// let latch = Arc::new(Latch::new());
/// let opener = {
///     let latch = Arc::clone(&latch);
///     thread::spawn(move || latch.open())
/// };
/// latch.wait();
/// assert!(latch.is_open());
/// opener.join().unwrap();
/// ```
#[derive(Debug, Default)]
pub struct Latch {
    open: AtomicBool,
    lock: Mutex<()>,
    cond: Condvar,
}

impl Latch {
    /// Create a closed latch
    pub fn new() -> Self {
        Self::default()
    }

    /// Open the latch and wake every waiter
    ///
    /// Idempotent: opening an open latch does nothing.
    pub fn open(&self) {
        if self.open.swap(true, Ordering::AcqRel) {
            return;
        }
        // Taking the lock orders this notify after any waiter that already
        // observed `open == false` under the lock and went to sleep.
        let _guard = self.lock.lock();
        self.cond.notify_all();
    }

    /// Check whether the latch is open without blocking
    #[inline]
    pub fn is_open(&self) -> bool {
        self.open.load(Ordering::Acquire)
    }

    /// Block until the latch is open
    pub fn wait(&self) {
        if self.is_open() {
            return;
        }
        let mut guard = self.lock.lock();
        while !self.is_open() {
            self.cond.wait(&mut guard);
        }
    }

    /// Block until the latch is open or `timeout` elapses
    ///
    /// Returns `true` if the latch is open.
    pub fn wait_timeout(&self, timeout: Duration) -> bool {
        if self.is_open() {
            return true;
        }
        let deadline = Instant::now() + timeout;
        let mut guard = self.lock.lock();
        while !self.is_open() {
            if self.cond.wait_until(&mut guard, deadline).timed_out() {
                return self.is_open();
            }
        }
        true
    }
}
