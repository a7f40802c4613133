//! Commit change sets
//!
//! A [`ChangeSet`] is what a transaction hands to the heap at commit time:
//! one [`Change`] per written handle, each carrying the version the writer
//! last observed. The heap may have to evaluate the same change set several
//! times while racing other committers, so it is borrowed, never consumed.

use crate::cell::Content;
use mvstm_core::{Handle, Version};
use rustc_hash::FxHashMap;

/// One handle's new content plus the version its writer last saw
#[derive(Debug, Clone)]
pub struct Change<V> {
    /// Handle being written
    pub handle: Handle,
    /// New content (value or tombstone)
    pub content: Content<V>,
    /// Version the writer observed; a newer version in the latest snapshot
    /// is a write conflict
    pub read_version: Version,
}

/// Ordered, de-duplicated set of changes
///
/// Writing the same handle twice keeps the position of the first write and
/// the content of the last.
#[derive(Debug, Clone)]
pub struct ChangeSet<V> {
    changes: Vec<Change<V>>,
    index: FxHashMap<Handle, usize>,
}

impl<V> ChangeSet<V> {
    /// Create an empty change set
    pub fn new() -> Self {
        Self {
            changes: Vec::new(),
            index: FxHashMap::default(),
        }
    }

    /// Create an empty change set with room for `capacity` changes
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            changes: Vec::with_capacity(capacity),
            index: FxHashMap::with_capacity_and_hasher(capacity, Default::default()),
        }
    }

    /// Add or replace a change
    pub fn push(&mut self, change: Change<V>) {
        match self.index.get(&change.handle) {
            Some(&pos) => self.changes[pos] = change,
            None => {
                self.index.insert(change.handle, self.changes.len());
                self.changes.push(change);
            }
        }
    }

    /// Write `value` to `handle`
    pub fn put(&mut self, handle: Handle, value: V, read_version: Version) {
        self.push(Change {
            handle,
            content: Content::Value(value),
            read_version,
        });
    }

    /// Write a tombstone to `handle`
    pub fn delete(&mut self, handle: Handle, read_version: Version) {
        self.push(Change {
            handle,
            content: Content::Tombstone,
            read_version,
        });
    }

    /// Number of distinct handles written
    pub fn len(&self) -> usize {
        self.changes.len()
    }

    /// Check if nothing is written
    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }

    /// Check if `handle` is written
    pub fn contains(&self, handle: Handle) -> bool {
        self.index.contains_key(&handle)
    }

    /// Iterate changes in insertion order
    pub fn iter(&self) -> std::slice::Iter<'_, Change<V>> {
        self.changes.iter()
    }

    /// Iterate written handles in insertion order
    pub fn handles(&self) -> impl Iterator<Item = Handle> + '_ {
        self.changes.iter().map(|c| c.handle)
    }
}

impl<V> Default for ChangeSet<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<'a, V> IntoIterator for &'a ChangeSet<V> {
    type Item = &'a Change<V>;
    type IntoIter = std::slice::Iter<'a, Change<V>>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}
