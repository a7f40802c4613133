//! Transaction counters
//!
//! Lock-free `AtomicU64` counters with `Relaxed` ordering: a reader may see
//! slightly stale values but never torn ones.

use serde::Serialize;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

/// Live counters kept by [`crate::Stm`]
#[derive(Debug, Default)]
pub struct StmStatistics {
    started: AtomicU64,
    committed: AtomicU64,
    read_only: AtomicU64,
    aborted: AtomicU64,
    retried: AtomicU64,
    conflicted: AtomicU64,
}

impl StmStatistics {
    /// All counters at zero
    pub fn new() -> Self {
        Self::default()
    }

    /// A transaction was started
    pub fn record_started(&self) {
        self.started.fetch_add(1, Ordering::Relaxed);
    }

    /// A transaction committed; `write_count == 0` marks it read-only
    pub fn record_committed(&self, write_count: usize) {
        self.committed.fetch_add(1, Ordering::Relaxed);
        if write_count == 0 {
            self.read_only.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// A transaction was aborted, explicitly or by a failed commit
    pub fn record_aborted(&self) {
        self.aborted.fetch_add(1, Ordering::Relaxed);
    }

    /// A blocked transaction was restarted after a relevant write
    pub fn record_retried(&self) {
        self.retried.fetch_add(1, Ordering::Relaxed);
    }

    /// A commit failed with a write conflict
    pub fn record_conflicted(&self) {
        self.conflicted.fetch_add(1, Ordering::Relaxed);
    }

    /// Read a point-in-time copy
    pub fn snapshot(&self) -> StatisticsSnapshot {
        StatisticsSnapshot {
            started: self.started.load(Ordering::Relaxed),
            committed: self.committed.load(Ordering::Relaxed),
            read_only: self.read_only.load(Ordering::Relaxed),
            aborted: self.aborted.load(Ordering::Relaxed),
            retried: self.retried.load(Ordering::Relaxed),
            conflicted: self.conflicted.load(Ordering::Relaxed),
        }
    }

    /// Reset all counters to zero
    pub fn reset(&self) {
        for counter in [
            &self.started,
            &self.committed,
            &self.read_only,
            &self.aborted,
            &self.retried,
            &self.conflicted,
        ] {
            counter.store(0, Ordering::Relaxed);
        }
    }
}

/// Copy of the counters at one point in time
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StatisticsSnapshot {
    /// Transactions started, retried ones included
    pub started: u64,
    /// Successful commits, read-only ones included
    pub committed: u64,
    /// Commits that wrote nothing
    pub read_only: u64,
    /// Aborts, failed commits included
    pub aborted: u64,
    /// Restarts after a blocking retry
    pub retried: u64,
    /// Commits rejected by a write conflict
    pub conflicted: u64,
}

impl StatisticsSnapshot {
    /// Fraction of finished transactions that committed
    pub fn commit_rate(&self) -> f64 {
        let finished = self.committed + self.aborted;
        if finished == 0 {
            return 0.0;
        }
        self.committed as f64 / finished as f64
    }
}

impl fmt::Display for StatisticsSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "stm(started={} committed={} read_only={} aborted={} retried={} conflicted={})",
            self.started,
            self.committed,
            self.read_only,
            self.aborted,
            self.retried,
            self.conflicted,
        )
    }
}
