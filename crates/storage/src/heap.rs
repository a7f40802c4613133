//! Multiversioned heap
//!
//! [`Heap`] combines the snapshot chain, the handle allocator and the
//! per-handle listener registry into the facade the transaction layer talks
//! to.
//!
//! # Commit protocol
//!
//! 1. Load the current head snapshot.
//! 2. Check the change set against it and build the successor
//!    ([`Snapshot::create_next`]). A conflict ends the commit.
//! 3. Try to publish the successor. If another committer won the race, go
//!    back to 1 with the new head; the change set is only borrowed, so it
//!    can be evaluated again.
//! 4. Open every latch registered on a written handle.
//!
//! The loop is bounded by [`HeapConfig::max_commit_attempts`].
//!
//! # Listener protocol
//!
//! A committer publishes first and detaches listeners second; a listener
//! registers first and re-reads the head second. Whichever order the two
//! interleave in, either the committer finds the latch or the listener sees
//! the new version.

use crate::change::ChangeSet;
use crate::chain::SnapshotChain;
use crate::listener::ListenerList;
use crate::snapshot::Snapshot;
use dashmap::DashMap;
use mvstm_core::{Handle, Latch, StmError, StmResult, Version};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, trace, warn};

/// Heap tuning knobs
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HeapConfig {
    /// Publish attempts before a commit gives up with
    /// [`StmError::Starvation`]
    pub max_commit_attempts: usize,
    /// Run snapshot garbage collection after every successful commit
    pub collect_garbage_on_commit: bool,
}

impl Default for HeapConfig {
    fn default() -> Self {
        Self {
            max_commit_attempts: 1024,
            collect_garbage_on_commit: true,
        }
    }
}

impl HeapConfig {
    /// Set the publish attempt budget (at least one attempt is always made)
    pub fn with_max_commit_attempts(mut self, attempts: usize) -> Self {
        self.max_commit_attempts = attempts.max(1);
        self
    }

    /// Enable or disable garbage collection on commit
    pub fn with_garbage_collection(mut self, enabled: bool) -> Self {
        self.collect_garbage_on_commit = enabled;
        self
    }
}

/// Outcome of a successful commit
#[derive(Debug)]
pub struct CommitResult<V> {
    /// Snapshot the commit produced, or the unchanged head for a read-only
    /// commit
    pub snapshot: Arc<Snapshot<V>>,
    /// Number of handles written
    pub write_count: usize,
}

impl<V> CommitResult<V> {
    /// Version of the resulting snapshot
    pub fn version(&self) -> Version {
        self.snapshot.version()
    }

    /// Check if the commit wrote nothing
    pub fn is_read_only(&self) -> bool {
        self.write_count == 0
    }
}

/// Shared multiversioned object heap
pub struct Heap<V> {
    config: HeapConfig,
    next_handle: AtomicU64,
    chain: SnapshotChain<V>,
    listeners: DashMap<Handle, ListenerList>,
}

impl<V> Heap<V> {
    /// Create an empty heap with default configuration
    pub fn new() -> Self {
        Self::with_config(HeapConfig::default())
    }

    /// Create an empty heap
    pub fn with_config(config: HeapConfig) -> Self {
        Self {
            config,
            next_handle: AtomicU64::new(1),
            chain: SnapshotChain::new(),
            listeners: DashMap::new(),
        }
    }

    /// Configuration in use
    pub fn config(&self) -> &HeapConfig {
        &self.config
    }

    /// Allocate a fresh handle
    ///
    /// Handles are never reused. A handle that is never committed is simply
    /// wasted.
    pub fn create_handle(&self) -> Handle {
        Handle::new(self.next_handle.fetch_add(1, Ordering::Relaxed))
    }

    /// Current head snapshot
    pub fn active_snapshot(&self) -> Arc<Snapshot<V>> {
        self.chain.head()
    }

    /// Newest snapshot at or below `version`
    pub fn snapshot(&self, version: Version) -> StmResult<Arc<Snapshot<V>>> {
        self.chain.get(version)
    }

    /// Current version
    pub fn version(&self) -> Version {
        self.chain.version()
    }

    /// Drop retained snapshots no transaction holds; returns how many went
    pub fn collect_garbage(&self) -> usize {
        let reclaimed = self.chain.collect_garbage();
        if reclaimed > 0 {
            trace!(reclaimed, retained = self.chain.retained_len(), "collected snapshots");
        }
        reclaimed
    }

    /// Number of superseded snapshots still retained
    pub fn retained_snapshots(&self) -> usize {
        self.chain.retained_len()
    }

    /// Number of latches waiting on `handle`
    pub fn pending_listeners(&self, handle: Handle) -> usize {
        self.listeners.get(&handle).map_or(0, |list| list.len())
    }

    /// Open `latch` once any of `handles` is written after `threshold`
    ///
    /// If one of them already moved past `threshold` the latch is opened
    /// immediately and nothing is registered.
    pub fn listen<I>(&self, latch: &Arc<Latch>, handles: I, threshold: Version)
    where
        I: IntoIterator<Item = Handle>,
    {
        let handles: Vec<Handle> = handles.into_iter().collect();
        let head = self.active_snapshot();
        if advanced_past(&head, &handles, threshold) {
            trace!(threshold = %threshold, version = %head.version(), "listen satisfied immediately");
            latch.open();
            return;
        }

        for handle in &handles {
            self.listeners
                .entry(*handle)
                .or_default()
                .push(Arc::clone(latch));
        }

        let latest = self.active_snapshot();
        if !Arc::ptr_eq(&latest, &head) && advanced_past(&latest, &handles, threshold) {
            trace!(threshold = %threshold, version = %latest.version(), "write raced listener registration");
            latch.open();
        }
    }

    fn wake(&self, handles: impl Iterator<Item = Handle>, version: Version) {
        let mut woken = 0;
        for handle in handles {
            if let Some(list) = self.listeners.get(&handle) {
                woken += list.open_all();
            }
            // `entry()` holds the shard lock while pushing, so an entry that
            // is empty here has no push in flight.
            self.listeners.remove_if(&handle, |_, list| list.is_empty());
        }
        if woken > 0 {
            debug!(version = %version, woken, "opened latches");
        }
    }
}

impl<V: Clone> Heap<V> {
    /// Content of `handle` as of `version`, read through the newest chain
    ///
    /// Returns `None` if the handle was deleted at that version.
    ///
    /// # Errors
    ///
    /// - [`StmError::NoSuchObject`] if the handle has never been written
    /// - [`StmError::VersionTooOld`] if `version` predates the retained
    ///   history of the handle
    pub fn read_at(&self, handle: Handle, version: Version) -> StmResult<Option<V>> {
        let head = self.active_snapshot();
        let cell = head.cell(handle).ok_or(StmError::NoSuchObject {
            handle,
            version: head.version(),
        })?;
        Ok(cell.read(version)?.as_value().cloned())
    }

    /// Atomically apply `changes` on top of the latest snapshot
    ///
    /// `start_version` is the snapshot the writer worked from. An empty change
    /// set succeeds without advancing the version.
    ///
    /// # Errors
    ///
    /// - [`StmError::WriteConflict`] if a written handle changed after the
    ///   version its change was read at
    /// - [`StmError::Starvation`] if every publish attempt lost a race
    /// - [`StmError::InvalidArgument`] if `start_version` is in the future
    pub fn commit(&self, start_version: Version, changes: &ChangeSet<V>) -> StmResult<CommitResult<V>> {
        let mut head = self.active_snapshot();
        if start_version > head.version() {
            return Err(StmError::InvalidArgument(format!(
                "start version {} is newer than heap version {}",
                start_version,
                head.version()
            )));
        }
        if changes.is_empty() {
            return Ok(CommitResult {
                snapshot: head,
                write_count: 0,
            });
        }

        let attempts = self.config.max_commit_attempts.max(1);
        for attempt in 1..=attempts {
            let minimal = self.chain.oldest_version();
            let next = match head.create_next(changes, minimal) {
                Ok(next) => Arc::new(next),
                Err(e) => {
                    debug!(start = %start_version, head = %head.version(), error = %e, "commit rejected");
                    return Err(e);
                }
            };

            match self.chain.try_publish(&head, Arc::clone(&next)) {
                Ok(()) => {
                    // Release the superseded head before collecting, or it
                    // would count as held.
                    drop(head);
                    let version = next.version();
                    debug!(
                        version = %version,
                        start = %start_version,
                        write_count = changes.len(),
                        attempt,
                        "published snapshot"
                    );
                    self.wake(changes.handles(), version);
                    if self.config.collect_garbage_on_commit {
                        self.collect_garbage();
                    }
                    return Ok(CommitResult {
                        snapshot: next,
                        write_count: changes.len(),
                    });
                }
                Err(current) => {
                    trace!(attempt, lost_to = %current.version(), "publish race lost");
                    head = current;
                }
            }
        }

        warn!(attempts, start = %start_version, "commit starved");
        Err(StmError::Starvation { attempts })
    }
}

fn advanced_past<V>(snapshot: &Snapshot<V>, handles: &[Handle], threshold: Version) -> bool {
    handles
        .iter()
        .any(|h| snapshot.version_of(*h).is_some_and(|v| v > threshold))
}

impl<V> Default for Heap<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V> fmt::Debug for Heap<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Heap")
            .field("version", &self.version())
            .field("next_handle", &self.next_handle.load(Ordering::Relaxed))
            .field("retained", &self.chain.retained_len())
            .field("listened_handles", &self.listeners.len())
            .finish()
    }
}
