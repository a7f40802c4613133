//! Heap snapshots
//!
//! A [`Snapshot`] is the whole heap frozen at one version: a persistent map
//! from handle to the head of that handle's cell chain as of the version.
//! Snapshots are never modified after construction. A commit builds the next
//! snapshot from the latest one via [`Snapshot::create_next`], which copies
//! only the map paths of the handles it writes.
//!
//! # Conflict rule
//!
//! A change set conflicts with snapshot `S` iff some change `c` has
//! `S.version_of(c.handle) > c.read_version`. The rule is evaluated for the
//! entire change set before anything is built, so a conflicting commit never
//! produces a partial snapshot.

use crate::cell::VersionedCell;
use crate::change::ChangeSet;
use crate::handle_map::HandleMap;
use mvstm_core::{Handle, StmError, StmResult, Version};
use std::fmt;
use std::sync::Arc;

/// Immutable heap view at one version
pub struct Snapshot<V> {
    version: Version,
    cells: HandleMap<Arc<VersionedCell<V>>>,
}

impl<V> Snapshot<V> {
    /// The empty heap at version zero
    pub fn empty() -> Self {
        Self {
            version: Version::ZERO,
            cells: HandleMap::new(),
        }
    }

    /// Version this snapshot represents
    pub fn version(&self) -> Version {
        self.version
    }

    /// Number of handles ever written up to this version (tombstones included)
    pub fn len(&self) -> usize {
        self.cells.len()
    }

    /// Check if nothing has been written yet
    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    /// Cell chain for `handle` as of this version
    pub fn cell(&self, handle: Handle) -> Option<&Arc<VersionedCell<V>>> {
        self.cells.get(handle)
    }

    /// Live value of `handle`; `None` if never written or deleted
    pub fn read(&self, handle: Handle) -> Option<&V> {
        self.cell(handle).and_then(|cell| cell.content().as_value())
    }

    /// Live value of `handle`, distinguishing why it is missing
    ///
    /// # Errors
    ///
    /// - [`StmError::NoSuchObject`] if the handle was never written at or
    ///   before this version
    /// - [`StmError::ObjectDeleted`] if its latest content is a tombstone
    pub fn lookup(&self, handle: Handle) -> StmResult<&V> {
        self.cell(handle)
            .ok_or(StmError::NoSuchObject {
                handle,
                version: self.version,
            })?
            .read_current()
    }

    /// Version at which `handle` was last written; `None` if never written
    pub fn version_of(&self, handle: Handle) -> Option<Version> {
        self.cell(handle).map(|cell| cell.version())
    }

    /// Iterate handles present in this snapshot
    pub fn handles(&self) -> impl Iterator<Item = Handle> + '_ {
        self.cells.iter().map(|(handle, _)| handle)
    }

    /// First change in `changes` that conflicts with this snapshot
    pub fn check_conflicts(&self, changes: &ChangeSet<V>) -> StmResult<()> {
        for change in changes {
            if let Some(current) = self.version_of(change.handle) {
                if current > change.read_version {
                    return Err(StmError::WriteConflict {
                        handle: change.handle,
                        read_version: change.read_version,
                        current_version: current,
                    });
                }
            }
        }
        Ok(())
    }
}

impl<V: Clone> Snapshot<V> {
    /// Build the successor snapshot that applies `changes`
    ///
    /// The new snapshot is at `self.version + 1`. Every written cell chain is
    /// pruned down to what a reader at `minimal_version` or later can observe.
    ///
    /// # Errors
    ///
    /// [`StmError::WriteConflict`] if any change conflicts with `self`; in
    /// that case nothing is built.
    pub fn create_next(&self, changes: &ChangeSet<V>, minimal_version: Version) -> StmResult<Self> {
        self.check_conflicts(changes)?;

        let version = self.version.next();
        let mut cells = self.cells.clone();
        for change in changes {
            let cell = match self.cells.get(change.handle) {
                Some(cell) => cell
                    .write(version, change.content.clone())?
                    .prune(minimal_version),
                None => VersionedCell::new(change.handle, version, change.content.clone()),
            };
            cells = cells.insert(change.handle, cell);
        }
        Ok(Self { version, cells })
    }
}

impl<V> Default for Snapshot<V> {
    fn default() -> Self {
        Self::empty()
    }
}

impl<V> fmt::Debug for Snapshot<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Snapshot")
            .field("version", &self.version)
            .field("handles", &self.cells.len())
            .finish()
    }
}
