//! Transactional LIFO stack
//!
//! ## Layout
//!
//! A stack is one mutable root object holding the head link and the element
//! count, plus one immutable node per element:
//!
//! ```text
//! root ──head──► node(c) ──next──► node(b) ──next──► node(a) ──► null
//! ```
//!
//! Pushing writes a new node and the root; popping writes the root and
//! deletes the popped node. Nodes never change once stored, so concurrent
//! pushes and pops only collide on the root.
//!
//! ## Blocking
//!
//! [`TStack::pop`] on an empty stack requests a retry: run under
//! `Stm::atomically` it blocks until another transaction pushes.

use mvstm_concurrency::{unwrap_or_retry, Link, ObjectRef, Persistent, Tracked, Transaction};
use mvstm_core::{Handle, StmResult};
use std::fmt;

/// One stored element
#[derive(Debug)]
pub(crate) struct StackNode<E> {
    pub(crate) value: E,
    pub(crate) next: Link<StackNode<E>>,
}

impl<E> StackNode<E>
where
    E: Clone + Send + Sync + 'static,
{
    pub(crate) fn push(value: E, next: Link<StackNode<E>>) -> Tracked<Self> {
        Tracked::new(StackNode { value, next })
    }

    /// Value and successor of `node`
    pub(crate) fn split(node: &Tracked<Self>) -> (E, Link<Self>) {
        let node = node.get();
        (node.value.clone(), node.next.clone())
    }
}

impl<E> Drop for StackNode<E> {
    fn drop(&mut self) {
        // Unlink iteratively so long in-memory stacks cannot overflow the
        // stack; stop at the first node someone else still holds.
        let mut next = std::mem::take(&mut self.next);
        while let Link::Object(tracked) = next {
            match tracked.try_unwrap() {
                Ok(mut node) => next = std::mem::take(&mut node.next),
                Err(_) => break,
            }
        }
    }
}

impl<E> Persistent for StackNode<E>
where
    E: Clone + Send + Sync + 'static,
{
    type Stored = (E, Handle);
    const IMMUTABLE: bool = true;

    fn dehydrate(&self) -> (E, Handle) {
        (self.value.clone(), self.next.handle())
    }

    fn hydrate(stored: &(E, Handle)) -> Self {
        StackNode {
            value: stored.0.clone(),
            next: Link::from_handle(stored.1),
        }
    }

    fn members(&self) -> Vec<ObjectRef> {
        self.next.member().into_iter().collect()
    }
}

struct StackState<E> {
    head: Link<StackNode<E>>,
    len: usize,
}

impl<E> Persistent for StackState<E>
where
    E: Clone + Send + Sync + 'static,
{
    type Stored = (Handle, usize);

    fn dehydrate(&self) -> (Handle, usize) {
        (self.head.handle(), self.len)
    }

    fn hydrate(stored: &(Handle, usize)) -> Self {
        StackState {
            head: Link::from_handle(stored.0),
            len: stored.1,
        }
    }

    fn members(&self) -> Vec<ObjectRef> {
        self.head.member().into_iter().collect()
    }
}

/// Transactional stack
///
/// A `TStack` value is a view bound to one transaction: obtain it with
/// [`TStack::open`] (or create it with [`TStack::new`] and
/// [`TStack::attach`]) inside the transaction that uses it.
///
/// # Example
///
/// ```
/// use mvstm_engine::Stm;
/// use mvstm_primitives::TStack;
///
/// let stm = Stm::new();
/// let handle = stm
///     .atomically(|txn| TStack::<String>::new().attach(txn))
///     .unwrap();
///
/// stm.atomically(|txn| {
///     let stack = TStack::<String>::open(txn, handle)?;
///     stack.push("x".to_string());
///     stack.push("y".to_string());
///     Ok(())
/// })
/// .unwrap();
///
/// let top = stm
///     .atomically(|txn| TStack::<String>::open(txn, handle)?.pop(txn))
///     .unwrap();
/// assert_eq!(top, "y");
/// ```
pub struct TStack<E> {
    state: Tracked<StackState<E>>,
}

impl<E> TStack<E>
where
    E: Clone + Send + Sync + 'static,
{
    /// Create an empty stack; it is stored once attached
    pub fn new() -> Self {
        Self {
            state: Tracked::new(StackState {
                head: Link::null(),
                len: 0,
            }),
        }
    }

    /// Open the stack stored under `handle`
    pub fn open(txn: &mut Transaction, handle: Handle) -> StmResult<Self> {
        Ok(Self {
            state: txn.load(handle)?,
        })
    }

    /// Attach the stack and its elements to `txn`; returns its handle
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

    /// Check whether the stack has no elements
    pub fn is_empty(&self) -> bool {
        self.state.get().head.is_null()
    }

    /// Push `value` on top
    pub fn push(&self, value: E) {
        self.state.update(|state| {
            let next = std::mem::take(&mut state.head);
            state.head = Link::to(&StackNode::push(value, next));
            state.len += 1;
        });
    }

    /// Remove and return the top element, retrying while the stack is empty
    pub fn pop(&self, txn: &mut Transaction) -> StmResult<E> {
        unwrap_or_retry(self.try_pop(txn)?)
    }

    /// Remove and return the top element, if any
    pub fn try_pop(&self, txn: &mut Transaction) -> StmResult<Option<E>> {
        let head = self.state.get().head.clone();
        let Some(node) = head.resolve(txn)? else {
            return Ok(None);
        };
        let (value, next) = StackNode::split(&node);
        self.state.update(|state| {
            state.head = next;
            state.len = state.len.saturating_sub(1);
        });
        txn.delete(&node)?;
        Ok(Some(value))
    }

    /// Top element, if any
    pub fn peek(&self, txn: &mut Transaction) -> StmResult<Option<E>> {
        let head = self.state.get().head.clone();
        Ok(head
            .resolve(txn)?
            .map(|node| node.get().value.clone()))
    }

    /// All elements, top first
    pub fn to_vec(&self, txn: &mut Transaction) -> StmResult<Vec<E>> {
        let mut values = Vec::with_capacity(self.len());
        let mut link = self.state.get().head.clone();
        while let Some(node) = link.resolve(txn)? {
            let (value, next) = StackNode::split(&node);
            values.push(value);
            link = next;
        }
        Ok(values)
    }
}

impl<E> Default for TStack<E>
where
    E: Clone + Send + Sync + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<E> fmt::Debug for TStack<E>
where
    E: Clone + Send + Sync + 'static,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.get();
        f.debug_struct("TStack")
            .field("handle", &self.state.handle())
            .field("len", &state.len)
            .finish()
    }
}
