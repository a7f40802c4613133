//! Error taxonomy for the STM engine.
//!
//! Errors fall into three classes:
//!
//! | Class | Variants | Expected handling |
//! |-------|----------|-------------------|
//! | Recoverable | `WriteConflict`, `Starvation` | restart the transaction |
//! | Control flow | `Retry` | block until a read handle changes, then restart |
//! | Programming error | `StaleWrite`, `IllegalTransactionState`, `NoProgressPossible` | fix the caller |
//!
//! Everything else (`NoSuchObject`, `ObjectDeleted`, `BadTransactionState`,
//! ...) is fatal to the operation that raised it but not to the process.

use crate::types::{Handle, TxnId, Version};
use thiserror::Error;

/// All STM errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StmError {
    /// A cell write was submitted with a version that is not newer than the
    /// cell's head. Indicates a bug in the layer above the cell.
    #[error("stale write: version {attempted} is not newer than head version {head}")]
    StaleWrite {
        /// Version the write was attempted at
        attempted: Version,
        /// Version of the cell's current head
        head: Version,
    },

    /// Another transaction committed a change to an object this transaction
    /// wrote, after this transaction's snapshot was taken.
    #[error("write conflict on {handle}: read at {read_version}, now at {current_version}")]
    WriteConflict {
        /// Conflicting handle
        handle: Handle,
        /// Version the writer last observed
        read_version: Version,
        /// Version of the handle in the latest snapshot
        current_version: Version,
    },

    /// The handle is unknown to the snapshot the read was served from.
    #[error("no object {handle} at {version}")]
    NoSuchObject {
        /// Requested handle
        handle: Handle,
        /// Snapshot version the lookup ran against
        version: Version,
    },

    /// The handle's current content is a tombstone.
    #[error("object {handle} has been deleted")]
    ObjectDeleted {
        /// Deleted handle
        handle: Handle,
    },

    /// A point-in-time cell read predates the oldest retained cell version.
    #[error("version {requested} is older than the oldest retained version {oldest}")]
    VersionTooOld {
        /// Requested version
        requested: Version,
        /// Oldest version still in the chain
        oldest: Version,
    },

    /// The requested historical snapshot has already been reclaimed.
    #[error("snapshot {requested} has been reclaimed (oldest retained: {oldest})")]
    SnapshotTooOld {
        /// Requested version
        requested: Version,
        /// Oldest snapshot version still retained
        oldest: Version,
    },

    /// An object bound to one transaction was handed to another.
    #[error("object {handle} is owned by {owner}, not {current}")]
    BadTransactionState {
        /// Handle of the object (may be `#0` for never-attached objects)
        handle: Handle,
        /// Transaction the object is bound to
        owner: TxnId,
        /// Transaction that attempted to use it
        current: TxnId,
    },

    /// API misuse such as commit-after-abort or read-after-commit.
    #[error("cannot {operation} {txn}: transaction is {state}")]
    IllegalTransactionState {
        /// Offending transaction
        txn: TxnId,
        /// State the transaction was in
        state: &'static str,
        /// Attempted operation
        operation: &'static str,
    },

    /// Retry was requested by a transaction that read nothing, so nothing
    /// could ever wake it.
    #[error("{txn} requested a retry but has an empty read set")]
    NoProgressPossible {
        /// Offending transaction
        txn: TxnId,
    },

    /// A bounded compare-and-swap loop exhausted its attempt budget.
    #[error("gave up after {attempts} contended attempts")]
    Starvation {
        /// Attempts made
        attempts: usize,
    },

    /// Argument rejected by the engine (for example a handle storing an
    /// object of a different type than the one requested).
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// The transaction cannot proceed with the state it observed and asks the
    /// driver to block until one of its read handles changes.
    #[error("transaction requested a retry")]
    Retry,
}

/// Result type for STM operations.
pub type StmResult<T> = std::result::Result<T, StmError>;

impl StmError {
    /// Check if this error may succeed when the whole transaction is
    /// restarted on a fresh snapshot.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            StmError::WriteConflict { .. } | StmError::Starvation { .. }
        )
    }

    /// Check if this is a write conflict.
    pub fn is_conflict(&self) -> bool {
        matches!(self, StmError::WriteConflict { .. })
    }

    /// Check if this is the retry signal.
    pub fn is_retry(&self) -> bool {
        matches!(self, StmError::Retry)
    }

    /// Check if this error indicates a bug in the calling code.
    pub fn is_programming_error(&self) -> bool {
        matches!(
            self,
            StmError::StaleWrite { .. }
                | StmError::IllegalTransactionState { .. }
                | StmError::NoProgressPossible { .. }
        )
    }
}
