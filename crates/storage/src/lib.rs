//! Multiversioned storage for mvstm
//!
//! This crate implements the heap the transaction layer commits into:
//! - [`VersionedCell`]: immutable per-handle write history
//! - [`HandleMap`]: persistent handle map with structural sharing
//! - [`Snapshot`]: the whole heap frozen at one version
//! - [`SnapshotChain`]: CAS-published head plus reclaimable history
//! - [`ListenerList`]: lock-free latch stacks for blocked transactions
//! - [`Heap`]: the facade (handles, snapshots, commit, listen)
//!
//! Nothing here knows about transactions or object types: the heap is
//! generic over the stored value `V`.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod cell;
pub mod chain;
pub mod change;
pub mod handle_map;
pub mod heap;
pub mod listener;
pub mod snapshot;

pub use cell::{Content, VersionedCell};
pub use chain::SnapshotChain;
pub use change::{Change, ChangeSet};
pub use handle_map::HandleMap;
pub use heap::{CommitResult, Heap, HeapConfig};
pub use listener::ListenerList;
pub use snapshot::Snapshot;
