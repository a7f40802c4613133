//! Transactional FIFO queue
//!
//! Built from two stacks of immutable nodes: pushes go onto the back stack,
//! pops come off the front stack, and the back stack is reversed into the
//! front once the front runs dry. Each element is moved at most once, so
//! both ends are amortized O(1).
//!
//! A bounded queue requests a retry on [`TQueue::push`] when full, and every
//! queue requests one on [`TQueue::pop`] when empty; run under
//! `Stm::atomically` these block until another transaction pops or pushes.

use crate::stack::StackNode;
use mvstm_concurrency::{retry, unwrap_or_retry, Link, ObjectRef, Persistent, Tracked, Transaction};
use mvstm_core::{Handle, StmResult};
use std::fmt;

struct QueueState<E> {
    front: Link<StackNode<E>>,
    back: Link<StackNode<E>>,
    len: usize,
    capacity: Option<usize>,
}

impl<E> Persistent for QueueState<E>
where
    E: Clone + Send + Sync + 'static,
{
    type Stored = (Handle, Handle, usize, Option<usize>);

    fn dehydrate(&self) -> Self::Stored {
        (self.front.handle(), self.back.handle(), self.len, self.capacity)
    }

    fn hydrate(stored: &Self::Stored) -> Self {
        QueueState {
            front: Link::from_handle(stored.0),
            back: Link::from_handle(stored.1),
            len: stored.2,
            capacity: stored.3,
        }
    }

    fn members(&self) -> Vec<ObjectRef> {
        self.front
            .member()
            .into_iter()
            .chain(self.back.member())
            .collect()
    }
}

/// Transactional queue, optionally bounded
///
/// Like [`TStack`](crate::TStack), a `TQueue` is a view bound to the
/// transaction that opened or attached it.
pub struct TQueue<E> {
    state: Tracked<QueueState<E>>,
}

impl<E> TQueue<E>
where
    E: Clone + Send + Sync + 'static,
{
    /// Create an unbounded empty queue
    pub fn new() -> Self {
        Self::build(None)
    }

    /// Create an empty queue holding at most `capacity` elements
    ///
    /// A capacity of zero makes every push wait forever.
    pub fn with_capacity(capacity: usize) -> Self {
        Self::build(Some(capacity))
    }

    fn build(capacity: Option<usize>) -> Self {
        Self {
            state: Tracked::new(QueueState {
                front: Link::null(),
                back: Link::null(),
                len: 0,
                capacity,
            }),
        }
    }

    /// Open the queue stored under `handle`
    pub fn open(txn: &mut Transaction, handle: Handle) -> StmResult<Self> {
        Ok(Self {
            state: txn.load(handle)?,
        })
    }

    /// Attach the queue and its elements to `txn`; returns its handle
    pub fn attach(&self, txn: &mut Transaction) -> StmResult<Handle> {
        txn.attach_as_root(&self.state)
    }

    /// Handle, or [`Handle::NULL`] if never attached
    pub fn handle(&self) -> Handle {
        self.state.handle()
    }

    /// Number of elements
    pub fn len(&self) -> usize {
        self.state.get().len
    }

    /// Check whether the queue has no elements
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Maximum number of elements, `None` if unbounded
    pub fn capacity(&self) -> Option<usize> {
        self.state.get().capacity
    }

    /// Check whether a push would have to wait
    pub fn is_full(&self) -> bool {
        let state = self.state.get();
        state.capacity.map_or(false, |capacity| state.len >= capacity)
    }

    /// Append `value`, retrying while the queue is full
    pub fn push(&self, value: E) -> StmResult<()> {
        if self.is_full() {
            return retry();
        }
        self.state.update(|state| {
            let next = std::mem::take(&mut state.back);
            state.back = Link::to(&StackNode::push(value, next));
            state.len += 1;
        });
        Ok(())
    }

    /// Remove and return the oldest element, retrying while the queue is
    /// empty
    pub fn pop(&self, txn: &mut Transaction) -> StmResult<E> {
        unwrap_or_retry(self.try_pop(txn)?)
    }

    /// Remove and return the oldest element, if any
    pub fn try_pop(&self, txn: &mut Transaction) -> StmResult<Option<E>> {
        if self.state.get().front.is_null() {
            self.refill(txn)?;
        }
        let front = self.state.get().front.clone();
        let Some(node) = front.resolve(txn)? else {
            return Ok(None);
        };
        let (value, next) = StackNode::split(&node);
        self.state.update(|state| {
            state.front = next;
            state.len = state.len.saturating_sub(1);
        });
        txn.delete(&node)?;
        Ok(Some(value))
    }

    /// Move the back stack onto the empty front stack, reversing it
    fn refill(&self, txn: &mut Transaction) -> StmResult<()> {
        let mut link = self.state.get().back.clone();
        if link.is_null() {
            return Ok(());
        }
        let mut front = Link::null();
        while let Some(node) = link.resolve(txn)? {
            let (value, next) = StackNode::split(&node);
            front = Link::to(&StackNode::push(value, front));
            txn.delete(&node)?;
            link = next;
        }
        self.state.update(|state| {
            state.front = front;
            state.back = Link::null();
        });
        Ok(())
    }
}

impl<E> Default for TQueue<E>
where
    E: Clone + Send + Sync + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<E> fmt::Debug for TQueue<E>
where
    E: Clone + Send + Sync + 'static,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.get();
        f.debug_struct("TQueue")
            .field("handle", &self.state.handle())
            .field("len", &state.len)
            .field("capacity", &state.capacity)
            .finish()
    }
}
