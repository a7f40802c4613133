//! Snapshot chain and version clock
//!
//! The chain owns the published head snapshot and a version-ordered registry
//! of superseded snapshots that may still be observed. The head's version is
//! the heap's clock: it only moves by publishing a successor built from the
//! current head, so every successful publish advances it by exactly one.
//!
//! # Lifetime contract
//!
//! Every transaction holds an `Arc` to the snapshot it was started on. A
//! retained snapshot whose only remaining owner is the registry can no longer
//! be observed through a transaction, and [`SnapshotChain::collect_garbage`]
//! drops it, but only from the oldest end: reclamation stops at the first
//! snapshot that is still held, so the registry never has holes below a live
//! version.

use crate::snapshot::Snapshot;
use arc_swap::ArcSwap;
use mvstm_core::{StmError, StmResult, Version};
use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

/// Published head plus retained history
pub struct SnapshotChain<V> {
    head: ArcSwap<Snapshot<V>>,
    retained: Mutex<BTreeMap<Version, Arc<Snapshot<V>>>>,
}

impl<V> SnapshotChain<V> {
    /// Create a chain whose head is the empty snapshot
    pub fn new() -> Self {
        Self {
            head: ArcSwap::from_pointee(Snapshot::empty()),
            retained: Mutex::new(BTreeMap::new()),
        }
    }

    /// Current head
    pub fn head(&self) -> Arc<Snapshot<V>> {
        self.head.load_full()
    }

    /// Version of the current head
    pub fn version(&self) -> Version {
        self.head.load().version()
    }

    /// Newest snapshot at or below `version`
    ///
    /// # Errors
    ///
    /// [`StmError::SnapshotTooOld`] if every such snapshot has been reclaimed.
    pub fn get(&self, version: Version) -> StmResult<Arc<Snapshot<V>>> {
        let head = self.head();
        if version >= head.version() {
            return Ok(head);
        }
        let retained = self.retained.lock();
        if let Some((_, snapshot)) = retained.range(..=version).next_back() {
            return Ok(Arc::clone(snapshot));
        }
        Err(StmError::SnapshotTooOld {
            requested: version,
            oldest: retained
                .keys()
                .next()
                .copied()
                .unwrap_or_else(|| head.version()),
        })
    }

    /// Replace `expected` with `next` if `expected` is still the head
    ///
    /// `expected` is entered into the registry before the swap so that a
    /// reader asking for its version never finds a gap. On failure the current
    /// head is returned.
    pub fn try_publish(
        &self,
        expected: &Arc<Snapshot<V>>,
        next: Arc<Snapshot<V>>,
    ) -> Result<(), Arc<Snapshot<V>>> {
        {
            let mut retained = self.retained.lock();
            let current = self.head.load_full();
            if !Arc::ptr_eq(&current, expected) {
                return Err(current);
            }
            retained
                .entry(expected.version())
                .or_insert_with(|| Arc::clone(expected));
        }
        let previous = self.head.compare_and_swap(expected, next);
        if Arc::ptr_eq(&*previous, expected) {
            Ok(())
        } else {
            Err(arc_swap::Guard::into_inner(previous))
        }
    }

    /// Drop retained snapshots no transaction holds, oldest first
    ///
    /// Returns the number of snapshots reclaimed.
    pub fn collect_garbage(&self) -> usize {
        let head_version = self.version();
        let mut retained = self.retained.lock();
        let mut reclaimed = 0;
        while let Some(entry) = retained.first_entry() {
            if *entry.key() >= head_version || Arc::strong_count(entry.get()) > 1 {
                break;
            }
            entry.remove();
            reclaimed += 1;
        }
        reclaimed
    }

    /// Version of the oldest snapshot still observable
    pub fn oldest_version(&self) -> Version {
        let retained = self.retained.lock();
        retained
            .keys()
            .next()
            .copied()
            .unwrap_or_else(|| self.version())
    }

    /// Number of superseded snapshots still retained
    pub fn retained_len(&self) -> usize {
        self.retained.lock().len()
    }
}

impl<V> Default for SnapshotChain<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V> fmt::Debug for SnapshotChain<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SnapshotChain")
            .field("version", &self.version())
            .field("retained", &self.retained_len())
            .finish()
    }
}
