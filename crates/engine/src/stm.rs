//! The STM facade
//!
//! [`Stm`] owns the heap and the transaction manager and is the entry point
//! applications use. It can be shared between threads behind an `Arc`; each
//! thread runs its own transactions.
//!
//! Most code should go through [`Stm::atomically`], which runs a closure in a
//! transaction and takes care of every way an attempt can end:
//!
//! | Outcome | Action |
//! |---------|--------|
//! | `Ok` and commit succeeds | return the value |
//! | [`StmError::Retry`] | block until a handle the attempt read is written, then rerun |
//! | retryable error (conflict, starvation) | back off and rerun, up to [`RetryConfig::max_retries`] |
//! | anything else | abort and return the error |

use crate::config::{RetryConfig, StmConfig};
use crate::statistics::{StatisticsSnapshot, StmStatistics};
use mvstm_concurrency::{ObjectHeap, Transaction, TransactionManager};
use mvstm_core::{StmError, StmResult, Version};
use mvstm_storage::HeapConfig;
use std::sync::Arc;
use std::thread;
use tracing::{debug, warn};

/// Software transactional memory over one heap
#[derive(Debug)]
pub struct Stm {
    config: StmConfig,
    manager: TransactionManager,
    statistics: StmStatistics,
}

impl Stm {
    /// Create an engine with default configuration
    pub fn new() -> Self {
        Self::with_config(StmConfig::default())
    }

    /// Create an engine
    pub fn with_config(config: StmConfig) -> Self {
        let heap = Arc::new(ObjectHeap::with_config(config.heap.clone()));
        Self {
            config,
            manager: TransactionManager::new(heap),
            statistics: StmStatistics::new(),
        }
    }

    /// Start configuring an engine
    pub fn builder() -> StmBuilder {
        StmBuilder::new()
    }

    /// Configuration in use
    pub fn config(&self) -> &StmConfig {
        &self.config
    }

    /// Underlying heap
    pub fn heap(&self) -> &Arc<ObjectHeap> {
        self.manager.heap()
    }

    /// Transaction manager
    pub fn manager(&self) -> &TransactionManager {
        &self.manager
    }

    /// Current heap version
    pub fn version(&self) -> Version {
        self.manager.current_version()
    }

    /// Current counter values
    pub fn statistics(&self) -> StatisticsSnapshot {
        self.statistics.snapshot()
    }

    /// Reset all counters
    pub fn reset_statistics(&self) {
        self.statistics.reset();
    }

    /// Reclaim snapshots no transaction holds; returns how many went
    pub fn collect_garbage(&self) -> usize {
        self.heap().collect_garbage()
    }

    /// Start a transaction on the current snapshot
    pub fn start_transaction(&self) -> Transaction {
        self.statistics.record_started();
        self.manager.begin()
    }

    /// Block until a handle `predecessor` read has been written, then start
    /// a new transaction
    ///
    /// An active predecessor is aborted first.
    ///
    /// # Errors
    ///
    /// [`StmError::NoProgressPossible`] if the predecessor read nothing.
    pub fn start_retried_transaction(&self, predecessor: &mut Transaction) -> StmResult<Transaction> {
        if predecessor.is_active() {
            self.abort(predecessor)?;
        }
        let next = self.manager.begin_after(predecessor)?;
        self.statistics.record_retried();
        self.statistics.record_started();
        Ok(next)
    }

    /// Commit `txn`, keeping the counters up to date
    ///
    /// Returns the number of handles written.
    pub fn commit(&self, txn: &mut Transaction) -> StmResult<usize> {
        let was_active = txn.is_active();
        match txn.commit() {
            Ok(write_count) => {
                if was_active {
                    self.statistics.record_committed(write_count);
                }
                Ok(write_count)
            }
            Err(e) => {
                if was_active {
                    self.statistics.record_aborted();
                    if e.is_conflict() {
                        self.statistics.record_conflicted();
                    }
                }
                Err(e)
            }
        }
    }

    /// Abort `txn`, keeping the counters up to date
    pub fn abort(&self, txn: &mut Transaction) -> StmResult<()> {
        let was_active = txn.is_active();
        txn.abort()?;
        if was_active {
            self.statistics.record_aborted();
        }
        Ok(())
    }

    /// Run `f` in a transaction until it commits
    ///
    /// `f` may run several times, each time on a fresh snapshot, so it must
    /// not have side effects outside the transaction.
    ///
    /// # Errors
    ///
    /// - a retryable error once the restart budget is exhausted
    /// - [`StmError::NoProgressPossible`] if `f` requested a retry without
    ///   reading anything
    /// - any other error returned by `f` or by the commit
    pub fn atomically<T, F>(&self, mut f: F) -> StmResult<T>
    where
        F: FnMut(&mut Transaction) -> StmResult<T>,
    {
        let retry = &self.config.retry;
        let mut restarts = 0usize;
        let mut txn = self.start_transaction();

        loop {
            let error = match f(&mut txn) {
                Ok(value) => match self.commit(&mut txn) {
                    Ok(_) => return Ok(value),
                    Err(e) => e,
                },
                Err(e) => e,
            };

            match error {
                StmError::Retry => {
                    txn = self.start_retried_transaction(&mut txn)?;
                }
                e if e.is_retryable() && restarts < retry.max_retries => {
                    if txn.is_active() {
                        self.abort(&mut txn)?;
                    }
                    let delay = retry.calculate_delay(restarts);
                    restarts += 1;
                    debug!(
                        txn_id = %txn.id(),
                        attempt = restarts,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "restarting transaction"
                    );
                    if !delay.is_zero() {
                        thread::sleep(delay);
                    }
                    txn = self.start_transaction();
                }
                e => {
                    if txn.is_active() {
                        self.abort(&mut txn)?;
                    }
                    if e.is_retryable() {
                        warn!(attempts = restarts + 1, error = %e, "restart budget exhausted");
                    }
                    return Err(e);
                }
            }
        }
    }
}

impl Default for Stm {
    fn default() -> Self {
        Self::new()
    }
}

/// Fluent builder for [`Stm`]
///
/// # Example
///
/// ```
/// use mvstm_engine::Stm;
///
/// let stm = Stm::builder()
///     .max_commit_attempts(64)
///     .max_retries(5)
///     .backoff(1, 10)
///     .build();
/// assert_eq!(stm.config().retry.max_retries, 5);
/// ```
#[derive(Debug, Clone, Default)]
pub struct StmBuilder {
    config: StmConfig,
}

impl StmBuilder {
    /// Start from the default configuration
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the whole configuration
    pub fn config(mut self, config: StmConfig) -> Self {
        self.config = config;
        self
    }

    /// Replace the heap configuration
    pub fn heap_config(mut self, heap: HeapConfig) -> Self {
        self.config.heap = heap;
        self
    }

    /// Replace the restart policy
    pub fn retry_config(mut self, retry: RetryConfig) -> Self {
        self.config.retry = retry;
        self
    }

    /// Publish attempts per commit before starvation
    pub fn max_commit_attempts(mut self, attempts: usize) -> Self {
        self.config.heap = self.config.heap.with_max_commit_attempts(attempts);
        self
    }

    /// Collect unreachable snapshots after each commit
    pub fn collect_garbage_on_commit(mut self, enabled: bool) -> Self {
        self.config.heap = self.config.heap.with_garbage_collection(enabled);
        self
    }

    /// Restarts allowed after conflicts
    pub fn max_retries(mut self, max_retries: usize) -> Self {
        self.config.retry.max_retries = max_retries;
        self
    }

    /// Exponential backoff bounds in milliseconds
    pub fn backoff(mut self, base_delay_ms: u64, max_delay_ms: u64) -> Self {
        self.config.retry.base_delay_ms = base_delay_ms;
        self.config.retry.max_delay_ms = max_delay_ms;
        self
    }

    /// Build the engine
    pub fn build(self) -> Stm {
        Stm::with_config(self.config)
    }
}
