//! Transactions
//!
//! A [`Transaction`] is one attempt at an atomic unit of work. It is bound to
//! the heap snapshot that was current when it started and serves every read
//! from that snapshot, so it observes exactly one version of the heap no
//! matter what commits in the meantime.
//!
//! ## State machine
//!
//! ```text
//! Active ──commit ok──► Committed
//!    │
//!    └──abort / failed commit──► Aborted
//! ```
//!
//! Committing a committed transaction and aborting an aborted one are no-ops.
//! Committing an aborted transaction, aborting a committed one, and reading or
//! attaching in either terminal state fail with
//! [`StmError::IllegalTransactionState`].
//!
//! ## Object identity
//!
//! Reads are cached by handle: reading the same handle twice returns the same
//! [`Tracked`] instance, so modifications made through one reference are seen
//! through the other (read-your-own-writes). Objects of
//! [`Persistent::IMMUTABLE`] types are hydrated on every read instead.
//!
//! ## Commit
//!
//! Dirtiness is self-reported: only objects whose own state was modified are
//! written. Fresh objects reachable from a dirty object are attached first so
//! that every link written refers to a real handle.

use crate::object::{ObjectRef, Persistent, StoredObject, Tracked};
use crate::walker::{walk, Walk};
use mvstm_core::{Handle, Latch, StmError, StmResult, TxnId, Version};
use mvstm_storage::{ChangeSet, Heap, Snapshot};
use rustc_hash::{FxHashMap, FxHashSet};
use std::any;
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, trace};

/// Heap storing type-erased persistent objects
pub type ObjectHeap = Heap<StoredObject>;

/// Life-cycle state of a transaction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionStatus {
    /// Reads and attaches are allowed
    Active,
    /// Changes were published
    Committed,
    /// Changes were discarded
    Aborted,
}

impl TransactionStatus {
    /// Lowercase name used in errors and logs
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionStatus::Active => "active",
            TransactionStatus::Committed => "committed",
            TransactionStatus::Aborted => "aborted",
        }
    }
}

impl fmt::Display for TransactionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One transaction attempt
///
/// Transactions are single-threaded: the objects they hand out are `Rc`
/// based and neither the transaction nor its objects can leave the thread
/// that created them.
pub struct Transaction {
    id: TxnId,
    heap: Arc<ObjectHeap>,
    snapshot: Arc<Snapshot<StoredObject>>,
    status: TransactionStatus,
    /// Hydrated and freshly attached objects by handle
    cache: FxHashMap<Handle, ObjectRef>,
    /// Handles allocated by this transaction
    fresh: FxHashSet<Handle>,
    deleted: FxHashSet<Handle>,
    read_set: FxHashSet<Handle>,
    write_count: usize,
    start_time: Instant,
}

impl Transaction {
    /// Start a transaction on the heap's current snapshot
    pub fn new(id: TxnId, heap: Arc<ObjectHeap>) -> Self {
        let snapshot = heap.active_snapshot();
        trace!(txn_id = %id, version = %snapshot.version(), "transaction started");
        Self {
            id,
            heap,
            snapshot,
            status: TransactionStatus::Active,
            cache: FxHashMap::default(),
            fresh: FxHashSet::default(),
            deleted: FxHashSet::default(),
            read_set: FxHashSet::default(),
            write_count: 0,
            start_time: Instant::now(),
        }
    }

    /// Transaction id
    pub fn id(&self) -> TxnId {
        self.id
    }

    /// Version of the snapshot this transaction reads from
    pub fn version(&self) -> Version {
        self.snapshot.version()
    }

    /// Snapshot this transaction reads from
    pub fn snapshot(&self) -> &Arc<Snapshot<StoredObject>> {
        &self.snapshot
    }

    /// Heap this transaction belongs to
    pub fn heap(&self) -> &Arc<ObjectHeap> {
        &self.heap
    }

    /// Current state
    pub fn status(&self) -> TransactionStatus {
        self.status
    }

    /// Check if the transaction can still read and attach
    pub fn is_active(&self) -> bool {
        self.status == TransactionStatus::Active
    }

    /// Handles read from the heap so far
    pub fn read_set(&self) -> &FxHashSet<Handle> {
        &self.read_set
    }

    /// Number of handles written by the successful commit
    pub fn write_count(&self) -> usize {
        self.write_count
    }

    /// Time since the transaction started
    pub fn elapsed(&self) -> Duration {
        self.start_time.elapsed()
    }

    fn ensure_active(&self, operation: &'static str) -> StmResult<()> {
        if self.is_active() {
            Ok(())
        } else {
            Err(StmError::IllegalTransactionState {
                txn: self.id,
                state: self.status.as_str(),
                operation,
            })
        }
    }

    /// Read the object stored under `handle`
    ///
    /// The null handle reads as `None`. Repeated reads of a handle return the
    /// same instance, including objects attached by this transaction.
    ///
    /// # Errors
    ///
    /// - [`StmError::NoSuchObject`] if the snapshot has no such handle
    /// - [`StmError::ObjectDeleted`] if the object was deleted, in the
    ///   snapshot or by this transaction
    /// - [`StmError::InvalidArgument`] if the handle holds another type
    /// - [`StmError::IllegalTransactionState`] if the transaction is finished
    pub fn read<T: Persistent>(&mut self, handle: Handle) -> StmResult<Option<Tracked<T>>> {
        self.ensure_active("read")?;
        if handle.is_null() {
            return Ok(None);
        }
        if let Some(object) = self.cache.get(&handle) {
            return Tracked::from_object(object.clone()).map(Some);
        }
        if self.deleted.contains(&handle) {
            return Err(StmError::ObjectDeleted { handle });
        }

        self.read_set.insert(handle);
        let stored = self.snapshot.lookup(handle)?;
        let state = stored.downcast_ref::<T>().ok_or_else(|| {
            StmError::InvalidArgument(format!(
                "{} stores a {}, not a {}",
                handle,
                stored.type_name(),
                any::type_name::<T>()
            ))
        })?;

        let object = Tracked::hydrated(T::hydrate(state), handle, self.id);
        if !T::IMMUTABLE {
            self.cache.insert(handle, object.as_object());
        }
        trace!(txn_id = %self.id, handle = %handle, "hydrated");
        Ok(Some(object))
    }

    /// Read the object stored under `handle`, which must not be null
    pub fn load<T: Persistent>(&mut self, handle: Handle) -> StmResult<Tracked<T>> {
        self.read(handle)?.ok_or(StmError::NoSuchObject {
            handle,
            version: self.version(),
        })
    }

    /// Attach `root` and every fresh object reachable from it
    ///
    /// Fresh objects receive a new handle and are bound to this transaction.
    /// Objects already bound here are left alone. Returns the root's handle.
    ///
    /// # Errors
    ///
    /// [`StmError::BadTransactionState`] if any reachable object is bound to
    /// another transaction.
    pub fn attach_as_root<T: Persistent>(&mut self, root: &Tracked<T>) -> StmResult<Handle> {
        self.ensure_active("attach")?;
        self.attach_all([root.as_object()])?;
        Ok(root.handle())
    }

    fn attach_all<I>(&mut self, roots: I) -> StmResult<usize>
    where
        I: IntoIterator<Item = ObjectRef>,
    {
        walk(roots, |object| match object.owner() {
            None => {
                let handle = self.heap.create_handle();
                object.bind(handle, self.id);
                self.cache.insert(handle, object.clone());
                self.fresh.insert(handle);
                trace!(txn_id = %self.id, handle = %handle, "attached");
                Ok(Walk::Descend)
            }
            Some(owner) if owner == self.id => Ok(Walk::Descend),
            Some(owner) => Err(StmError::BadTransactionState {
                handle: object.handle(),
                owner,
                current: self.id,
            }),
        })
    }

    /// Delete a stored object
    ///
    /// Deleting an object this transaction created drops it from the write
    /// set; deleting an unattached object does nothing.
    pub fn delete<T: Persistent>(&mut self, object: &Tracked<T>) -> StmResult<()> {
        self.ensure_active("delete")?;
        match object.owner() {
            None => return Ok(()),
            Some(owner) if owner != self.id => {
                return Err(StmError::BadTransactionState {
                    handle: object.handle(),
                    owner,
                    current: self.id,
                })
            }
            Some(_) => {}
        }

        let handle = object.handle();
        self.cache.remove(&handle);
        object.as_object().mark_clean();
        if !self.fresh.remove(&handle) {
            self.deleted.insert(handle);
        }
        trace!(txn_id = %self.id, handle = %handle, "deleted");
        Ok(())
    }

    /// Publish this transaction's changes
    ///
    /// Returns the number of handles written. Committing again is a no-op
    /// that returns the same count.
    ///
    /// # Errors
    ///
    /// Any failure aborts the transaction before it is returned; a
    /// [`StmError::WriteConflict`] means another transaction committed to a
    /// written handle first.
    pub fn commit(&mut self) -> StmResult<usize> {
        match self.status {
            TransactionStatus::Committed => return Ok(self.write_count),
            TransactionStatus::Aborted => {
                return Err(StmError::IllegalTransactionState {
                    txn: self.id,
                    state: self.status.as_str(),
                    operation: "commit",
                })
            }
            TransactionStatus::Active => {}
        }

        match self.publish() {
            Ok(write_count) => {
                self.status = TransactionStatus::Committed;
                self.write_count = write_count;
                debug!(
                    txn_id = %self.id,
                    version = %self.heap.version(),
                    write_count,
                    elapsed_us = self.elapsed().as_micros() as u64,
                    "committed"
                );
                Ok(write_count)
            }
            Err(e) => {
                self.status = TransactionStatus::Aborted;
                self.release();
                debug!(txn_id = %self.id, error = %e, "commit failed, aborted");
                Err(e)
            }
        }
    }

    fn publish(&mut self) -> StmResult<usize> {
        let dirty: Vec<ObjectRef> = self
            .cache
            .values()
            .filter(|object| object.is_dirty())
            .cloned()
            .collect();
        // Attaching may add fresh objects to the cache; they are dirty too.
        self.attach_all(dirty)?;

        let mut dirty: Vec<ObjectRef> = self
            .cache
            .values()
            .filter(|object| object.is_dirty())
            .cloned()
            .collect();
        dirty.sort_unstable_by_key(|object| object.handle());

        let read_version = self.version();
        let mut changes = ChangeSet::with_capacity(dirty.len() + self.deleted.len());
        for object in &dirty {
            changes.put(object.handle(), object.dehydrate(), read_version);
        }
        let mut deleted: Vec<Handle> = self.deleted.iter().copied().collect();
        deleted.sort_unstable();
        for handle in deleted {
            changes.delete(handle, read_version);
        }

        let result = self.heap.commit(read_version, &changes)?;
        for object in &dirty {
            object.mark_clean();
        }
        Ok(result.write_count)
    }

    /// Discard this transaction's changes
    ///
    /// Aborting again is a no-op.
    pub fn abort(&mut self) -> StmResult<()> {
        match self.status {
            TransactionStatus::Aborted => Ok(()),
            TransactionStatus::Committed => Err(StmError::IllegalTransactionState {
                txn: self.id,
                state: self.status.as_str(),
                operation: "abort",
            }),
            TransactionStatus::Active => {
                self.status = TransactionStatus::Aborted;
                self.release();
                debug!(txn_id = %self.id, "aborted");
                Ok(())
            }
        }
    }

    /// Drop buffered state; the read set survives for retry registration
    fn release(&mut self) {
        self.cache.clear();
        self.fresh.clear();
        self.deleted.clear();
    }

    /// Arrange for `latch` to open once a handle this transaction read is
    /// written after its snapshot
    ///
    /// # Errors
    ///
    /// [`StmError::NoProgressPossible`] if nothing was read: no write could
    /// ever open the latch.
    pub fn register_retry(&self, latch: &Arc<Latch>) -> StmResult<()> {
        if self.read_set.is_empty() {
            return Err(StmError::NoProgressPossible { txn: self.id });
        }
        trace!(txn_id = %self.id, handles = self.read_set.len(), version = %self.version(), "registering retry");
        self.heap
            .listen(latch, self.read_set.iter().copied(), self.version());
        Ok(())
    }
}

impl fmt::Debug for Transaction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Transaction")
            .field("id", &self.id)
            .field("version", &self.version())
            .field("status", &self.status)
            .field("cached", &self.cache.len())
            .field("reads", &self.read_set.len())
            .finish()
    }
}
