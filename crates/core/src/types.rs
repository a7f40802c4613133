//! Core identifier types for the multiversioned heap
//!
//! This module defines the fundamental types used throughout the system:
//! - [`Handle`]: Opaque identifier of a heap location
//! - [`Version`]: Position on the heap's global version clock
//! - [`TxnId`]: Identifier of a single transaction attempt

use serde::{Deserialize, Serialize};

/// Opaque identifier of a heap-resident object
///
/// A handle works like a pointer that is never dereferenced directly: the
/// heap resolves it against a snapshot. Handles are allocated from a
/// monotonically increasing counter and are never reused.
///
/// `Handle::NULL` (raw value `0`) means "no object".
///
/// # Examples
///
/// ```
/// use mvstm_core::types::Handle;
///
/// let handle = Handle::new(7);
/// assert!(!handle.is_null());
/// assert!(Handle::NULL.is_null());
/// assert_eq!(handle.as_u64(), 7);
/// ```
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub struct Handle(u64);

impl Handle {
    /// The "no object" handle
    pub const NULL: Handle = Handle(0);

    /// Wrap a raw handle value
    pub const fn new(raw: u64) -> Self {
        Handle(raw)
    }

    /// Raw value of the handle
    pub const fn as_u64(self) -> u64 {
        self.0
    }

    /// Check whether this is [`Handle::NULL`]
    pub const fn is_null(self) -> bool {
        self.0 == 0
    }
}

impl std::fmt::Display for Handle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Position on the heap's global version clock
///
/// The clock starts at [`Version::ZERO`] (the empty heap) and advances by
/// exactly one for every commit that writes at least one object. A version
/// identifies both a heap snapshot and a point in a cell's history.
///
/// # Examples
///
/// ```
/// use mvstm_core::types::Version;
///
/// let v = Version::ZERO.next();
/// assert_eq!(v, Version::new(1));
/// assert!(v > Version::ZERO);
/// ```
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub struct Version(u64);

impl Version {
    /// Version of the empty heap
    pub const ZERO: Version = Version(0);

    /// Wrap a raw version value
    pub const fn new(raw: u64) -> Self {
        Version(raw)
    }

    /// Raw value of the version
    pub const fn as_u64(self) -> u64 {
        self.0
    }

    /// The version immediately following this one
    ///
    /// Saturates at `u64::MAX`; a heap performing 2^64 commits is not a
    /// supported workload.
    pub const fn next(self) -> Version {
        Version(self.0.saturating_add(1))
    }
}

impl std::fmt::Display for Version {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "v{}", self.0)
    }
}

/// Identifier of a single transaction attempt
///
/// Every started transaction, including each restart of a retried or
/// conflicted transaction, receives a fresh id. Objects remember the id of the
/// transaction they are bound to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TxnId(u64);

impl TxnId {
    /// Wrap a raw transaction id
    pub const fn new(raw: u64) -> Self {
        TxnId(raw)
    }

    /// Raw value of the id
    pub const fn as_u64(self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for TxnId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "txn-{}", self.0)
    }
}
