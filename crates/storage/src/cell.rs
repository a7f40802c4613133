//! Versioned cells
//!
//! A [`VersionedCell`] is one storage location's write history: an immutable,
//! newest-first singly-linked chain of `(version, content)` nodes. A write
//! never touches existing nodes; it returns a new head that points at the old
//! one. Readers holding an older head keep seeing exactly what they saw.
//!
//! ```text
//! head ──► [v7: Value] ──► [v4: Tombstone] ──► [v2: Value] ──► ∅
//! ```
//!
//! # Invariants
//!
//! - Versions strictly decrease walking from the head towards the tail.
//! - A write at `v <= head.version` is a [`StmError::StaleWrite`]: the commit
//!   layer detects legitimate conflicts before a cell is ever written.

use mvstm_core::{Handle, StmError, StmResult, Version};
use std::sync::Arc;

/// What a cell holds at one version
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Content<V> {
    /// A live value
    Value(V),
    /// Marks the object as deleted at this version
    Tombstone,
}

impl<V> Content<V> {
    /// The value, unless this is a tombstone
    pub fn as_value(&self) -> Option<&V> {
        match self {
            Content::Value(v) => Some(v),
            Content::Tombstone => None,
        }
    }

    /// Check for a tombstone
    pub fn is_tombstone(&self) -> bool {
        matches!(self, Content::Tombstone)
    }
}

/// One node of a cell's version chain; the head node stands for the cell
#[derive(Debug)]
pub struct VersionedCell<V> {
    handle: Handle,
    version: Version,
    content: Content<V>,
    parent: Option<Arc<VersionedCell<V>>>,
}

impl<V> VersionedCell<V> {
    /// Create a single-node chain
    pub fn new(handle: Handle, version: Version, content: Content<V>) -> Arc<Self> {
        Arc::new(Self {
            handle,
            version,
            content,
            parent: None,
        })
    }

    /// Handle this cell stores
    pub fn handle(&self) -> Handle {
        self.handle
    }

    /// Version of the head node
    pub fn version(&self) -> Version {
        self.version
    }

    /// Content of the head node
    pub fn content(&self) -> &Content<V> {
        &self.content
    }

    /// Next older node, if retained
    pub fn parent(&self) -> Option<&Arc<VersionedCell<V>>> {
        self.parent.as_ref()
    }

    /// Iterate nodes from newest to oldest
    pub fn iter(&self) -> CellIter<'_, V> {
        CellIter { next: Some(self) }
    }

    /// Number of retained nodes
    pub fn depth(&self) -> usize {
        self.iter().count()
    }

    /// Version of the oldest retained node
    pub fn oldest_version(&self) -> Version {
        self.iter().last().map_or(self.version, |node| node.version)
    }

    /// Content as of `at_version`
    ///
    /// Returns the content of the newest node whose version is `<= at_version`.
    ///
    /// # Errors
    ///
    /// [`StmError::VersionTooOld`] if every retained node is newer than
    /// `at_version`.
    pub fn read(&self, at_version: Version) -> StmResult<&Content<V>> {
        self.iter()
            .find(|node| node.version <= at_version)
            .map(|node| &node.content)
            .ok_or_else(|| StmError::VersionTooOld {
                requested: at_version,
                oldest: self.oldest_version(),
            })
    }

    /// Value of the head node
    ///
    /// # Errors
    ///
    /// [`StmError::ObjectDeleted`] if the head is a tombstone.
    pub fn read_current(&self) -> StmResult<&V> {
        self.content.as_value().ok_or(StmError::ObjectDeleted {
            handle: self.handle,
        })
    }

    /// Append a new head at `version`
    ///
    /// The receiver is left untouched; the returned chain shares every
    /// existing node with it.
    ///
    /// # Errors
    ///
    /// [`StmError::StaleWrite`] if `version` is not newer than the head.
    pub fn write(self: &Arc<Self>, version: Version, content: Content<V>) -> StmResult<Arc<Self>> {
        if version <= self.version {
            return Err(StmError::StaleWrite {
                attempted: version,
                head: self.version,
            });
        }
        Ok(Arc::new(Self {
            handle: self.handle,
            version,
            content,
            parent: Some(Arc::clone(self)),
        }))
    }
}

impl<V: Clone> VersionedCell<V> {
    /// Drop history no reader at `minimal_version` or later can observe
    ///
    /// Keeps every node newer than `minimal_version` plus the newest node at or
    /// below it. Nodes newer than the cut are rebuilt so the original chain,
    /// which other snapshots may still hold, is never modified.
    pub fn prune(self: &Arc<Self>, minimal_version: Version) -> Arc<Self> {
        let keep = self
            .iter()
            .position(|node| node.version <= minimal_version);
        let keep = match keep {
            Some(index) => index,
            None => return Arc::clone(self),
        };
        let nodes: Vec<&VersionedCell<V>> = self.iter().take(keep + 1).collect();
        if nodes[keep].parent.is_none() {
            return Arc::clone(self);
        }

        let mut rebuilt: Option<Arc<Self>> = None;
        for node in nodes.into_iter().rev() {
            rebuilt = Some(Arc::new(Self {
                handle: node.handle,
                version: node.version,
                content: node.content.clone(),
                parent: rebuilt,
            }));
        }
        rebuilt.unwrap_or_else(|| Arc::clone(self))
    }
}

impl<V> Drop for VersionedCell<V> {
    fn drop(&mut self) {
        // Unlink iteratively so long chains cannot overflow the stack.
        let mut next = self.parent.take();
        while let Some(node) = next {
            match Arc::try_unwrap(node) {
                Ok(mut node) => next = node.parent.take(),
                Err(_) => break,
            }
        }
    }
}

/// Iterator over a cell's nodes, newest first
pub struct CellIter<'a, V> {
    next: Option<&'a VersionedCell<V>>,
}

impl<'a, V> Iterator for CellIter<'a, V> {
    type Item = &'a VersionedCell<V>;

    fn next(&mut self) -> Option<Self::Item> {
        let node = self.next?;
        self.next = node.parent.as_deref();
        Some(node)
    }
}
