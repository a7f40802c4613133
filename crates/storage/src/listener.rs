//! Pending-listener lists
//!
//! Each handle with a blocked transaction waiting on it owns a
//! [`ListenerList`]: a lock-free stack of latches. Registration pushes with a
//! compare-and-swap loop; a committer that wrote the handle detaches the whole
//! stack with one atomic swap and opens every latch on it.

use arc_swap::ArcSwapOption;
use mvstm_core::Latch;
use std::fmt;
use std::sync::Arc;

struct ListenerNode {
    latch: Arc<Latch>,
    next: Option<Arc<ListenerNode>>,
}

/// Lock-free stack of latches registered on one handle
#[derive(Default)]
pub struct ListenerList {
    head: ArcSwapOption<ListenerNode>,
}

impl ListenerList {
    /// Create an empty list
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a latch
    ///
    /// Latches that were already opened through another handle are dropped
    /// from the list on the way, so rarely written handles do not accumulate
    /// dead registrations.
    pub fn push(&self, latch: Arc<Latch>) {
        self.head.rcu(|head| {
            Some(Arc::new(ListenerNode {
                latch: Arc::clone(&latch),
                next: without_open(head),
            }))
        });
    }

    /// Detach every registered latch
    pub fn take(&self) -> Vec<Arc<Latch>> {
        let mut latches = Vec::new();
        let mut next = self.head.swap(None);
        while let Some(node) = next {
            latches.push(Arc::clone(&node.latch));
            next = node.next.clone();
        }
        latches
    }

    /// Detach and open every registered latch, returning how many were opened
    pub fn open_all(&self) -> usize {
        let latches = self.take();
        for latch in &latches {
            latch.open();
        }
        latches.len()
    }

    /// Number of registered latches
    pub fn len(&self) -> usize {
        let head = self.head.load_full();
        let mut count = 0;
        let mut node = head.as_deref();
        while let Some(n) = node {
            count += 1;
            node = n.next.as_deref();
        }
        count
    }

    /// Check if no latch is registered
    pub fn is_empty(&self) -> bool {
        self.head.load().is_none()
    }
}

fn without_open(head: &Option<Arc<ListenerNode>>) -> Option<Arc<ListenerNode>> {
    let mut node = head.as_deref();
    let mut any_open = false;
    while let Some(n) = node {
        if n.latch.is_open() {
            any_open = true;
            break;
        }
        node = n.next.as_deref();
    }
    if !any_open {
        return head.clone();
    }

    let mut live = Vec::new();
    let mut node = head.as_deref();
    while let Some(n) = node {
        if !n.latch.is_open() {
            live.push(Arc::clone(&n.latch));
        }
        node = n.next.as_deref();
    }
    live.into_iter().rev().fold(None, |next, latch| {
        Some(Arc::new(ListenerNode { latch, next }))
    })
}

impl fmt::Debug for ListenerList {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ListenerList")
            .field("len", &self.len())
            .finish()
    }
}
