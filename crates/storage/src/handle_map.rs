//! Persistent handle-keyed map
//!
//! Snapshots need a map from [`Handle`] to cell that can be "updated" into a
//! new map while the old one stays valid and unchanged. [`HandleMap`] is a
//! 32-way hash-array-mapped trie keyed by the raw handle bits: an insert
//! copies only the branches on the path to the key (at most 13 levels, in
//! practice 2-4 for sequential handles) and shares everything else.
//!
//! # Design
//!
//! - Level `n` indexes children with bits `5n..5n+5` of the handle.
//! - A leaf sits at the shallowest level where its prefix is unique; inserting
//!   a colliding key pushes the existing leaf one level down.
//! - Cloning a map is one `Arc` increment.

use mvstm_core::Handle;
use std::fmt;
use std::sync::Arc;

const BITS: u32 = 5;
const WIDTH: usize = 1 << BITS;
const MASK: u64 = (WIDTH as u64) - 1;

type Children<T> = Box<[Option<Arc<Node<T>>>; WIDTH]>;

enum Node<T> {
    Leaf { key: u64, value: T },
    Branch(Children<T>),
}

#[inline]
fn slot(key: u64, shift: u32) -> usize {
    ((key >> shift) & MASK) as usize
}

fn empty_children<T>() -> Children<T> {
    Box::new(std::array::from_fn(|_| None))
}

/// Immutable map from handle to `T` with structural sharing
pub struct HandleMap<T> {
    root: Arc<Node<T>>,
    len: usize,
}

impl<T> HandleMap<T> {
    /// Create an empty map
    pub fn new() -> Self {
        Self {
            root: Arc::new(Node::Branch(empty_children())),
            len: 0,
        }
    }

    /// Number of entries
    pub fn len(&self) -> usize {
        self.len
    }

    /// Check if the map is empty
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Look up a handle
    pub fn get(&self, handle: Handle) -> Option<&T> {
        let key = handle.as_u64();
        let mut node = &*self.root;
        let mut shift = 0;
        loop {
            match node {
                Node::Leaf { key: found, value } => {
                    return (*found == key).then_some(value);
                }
                Node::Branch(children) => {
                    node = children[slot(key, shift)].as_deref()?;
                    shift += BITS;
                }
            }
        }
    }

    /// Check if a handle is present
    pub fn contains(&self, handle: Handle) -> bool {
        self.get(handle).is_some()
    }

    /// Return a new map with `handle` bound to `value`
    ///
    /// `self` is unchanged and keeps sharing all untouched branches with the
    /// result.
    pub fn insert(&self, handle: Handle, value: T) -> Self {
        let (root, replaced) = insert_into(&self.root, handle.as_u64(), value, 0);
        Self {
            root,
            len: if replaced { self.len } else { self.len + 1 },
        }
    }

    /// Iterate entries in trie order (not sorted by handle)
    pub fn iter(&self) -> Iter<'_, T> {
        Iter {
            stack: vec![&*self.root],
        }
    }

    /// Check whether two maps share the same root
    pub fn ptr_eq(a: &Self, b: &Self) -> bool {
        Arc::ptr_eq(&a.root, &b.root)
    }
}

fn insert_into<T>(node: &Arc<Node<T>>, key: u64, value: T, shift: u32) -> (Arc<Node<T>>, bool) {
    match &**node {
        Node::Leaf { key: existing, .. } if *existing == key => {
            (Arc::new(Node::Leaf { key, value }), true)
        }
        Node::Leaf { key: existing, .. } => {
            // Push the existing leaf down one level, then insert beside it.
            let mut children = empty_children();
            children[slot(*existing, shift)] = Some(Arc::clone(node));
            let branch = Arc::new(Node::Branch(children));
            insert_into(&branch, key, value, shift)
        }
        Node::Branch(children) => {
            let index = slot(key, shift);
            let mut children = children.clone();
            let (child, replaced) = match &children[index] {
                None => (Arc::new(Node::Leaf { key, value }), false),
                Some(child) => insert_into(child, key, value, shift + BITS),
            };
            children[index] = Some(child);
            (Arc::new(Node::Branch(children)), replaced)
        }
    }
}

impl<T> Clone for HandleMap<T> {
    fn clone(&self) -> Self {
        Self {
            root: Arc::clone(&self.root),
            len: self.len,
        }
    }
}

impl<T> Default for HandleMap<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: fmt::Debug> fmt::Debug for HandleMap<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.iter()).finish()
    }
}

/// Iterator over `(Handle, &T)` entries
pub struct Iter<'a, T> {
    stack: Vec<&'a Node<T>>,
}

impl<'a, T> Iterator for Iter<'a, T> {
    type Item = (Handle, &'a T);

    fn next(&mut self) -> Option<Self::Item> {
        while let Some(node) = self.stack.pop() {
            match node {
                Node::Leaf { key, value } => return Some((Handle::new(*key), value)),
                Node::Branch(children) => {
                    self.stack
                        .extend(children.iter().rev().filter_map(|c| c.as_deref()));
                }
            }
        }
        None
    }
}
