//! Transaction manager
//!
//! Hands out transactions on a shared heap and drives the blocking half of
//! the retry protocol:
//!
//! ```text
//! 1. abort the predecessor if it is still active
//! 2. register a latch on the predecessor's read set at its version
//! 3. block until a commit writes one of those handles
//! 4. start a fresh transaction on the new snapshot
//! ```
//!
//! Transaction ids come from a manager-wide counter and are only used for
//! ownership checks and logging; the heap version is the commit clock.

use crate::transaction::{ObjectHeap, Transaction};
use mvstm_core::{Latch, StmResult, TxnId, Version};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::debug;

/// Creates transactions on one heap
///
/// # Thread Safety
///
/// The manager is `Sync`; every thread begins its own transactions through a
/// shared reference.
#[derive(Debug)]
pub struct TransactionManager {
    heap: Arc<ObjectHeap>,
    /// Next transaction ID
    next_txn_id: AtomicU64,
}

impl TransactionManager {
    /// Create a manager over `heap`
    pub fn new(heap: Arc<ObjectHeap>) -> Self {
        Self {
            heap,
            next_txn_id: AtomicU64::new(1),
        }
    }

    /// Shared heap
    pub fn heap(&self) -> &Arc<ObjectHeap> {
        &self.heap
    }

    /// Current heap version
    pub fn current_version(&self) -> Version {
        self.heap.version()
    }

    /// Allocate the next transaction ID
    pub fn next_txn_id(&self) -> TxnId {
        TxnId::new(self.next_txn_id.fetch_add(1, Ordering::Relaxed))
    }

    /// Start a transaction on the current snapshot
    pub fn begin(&self) -> Transaction {
        Transaction::new(self.next_txn_id(), Arc::clone(&self.heap))
    }

    /// Block until something `predecessor` read has changed, then start a
    /// new transaction
    ///
    /// The predecessor is aborted first if it is still active. Returns
    /// immediately if a relevant write already happened after the
    /// predecessor's snapshot.
    ///
    /// # Errors
    ///
    /// [`mvstm_core::StmError::NoProgressPossible`] if the predecessor read
    /// nothing.
    pub fn begin_after(&self, predecessor: &mut Transaction) -> StmResult<Transaction> {
        if predecessor.is_active() {
            predecessor.abort()?;
        }
        let latch = Arc::new(Latch::new());
        predecessor.register_retry(&latch)?;
        if !latch.is_open() {
            debug!(
                txn_id = %predecessor.id(),
                version = %predecessor.version(),
                handles = predecessor.read_set().len(),
                "waiting for retry"
            );
            latch.wait();
        }
        let next = self.begin();
        debug!(txn_id = %next.id(), previous = %predecessor.id(), version = %next.version(), "retrying");
        Ok(next)
    }
}

impl Default for TransactionManager {
    fn default() -> Self {
        Self::new(Arc::new(ObjectHeap::new()))
    }
}
