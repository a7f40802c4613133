//! # mvstm
//!
//! Multiversioned software transactional memory over an in-process object
//! heap.
//!
//! Transactions read one consistent snapshot of the heap, buffer their
//! writes, and publish them atomically at commit. A commit fails with a
//! write conflict if another transaction changed one of the same objects in
//! the meantime. A transaction that cannot proceed (popping an empty queue)
//! can ask to be retried: it then blocks until an object it read changes.
//!
//! ## Quick Start
//!
//! ```
//! use mvstm::prelude::*;
//!
//! let stm = Stm::new();
//!
//! // Store a stack and remember its handle
//! let handle = stm.atomically(|txn| TStack::<String>::new().attach(txn))?;
//!
//! // Two separate transactions push
//! for value in ["x", "y"] {
//!     stm.atomically(|txn| {
//!         TStack::<String>::open(txn, handle)?.push(value.to_string());
//!         Ok(())
//!     })?;
//! }
//!
//! // A third pops in LIFO order
//! let popped = stm.atomically(|txn| {
//!     let stack = TStack::<String>::open(txn, handle)?;
//!     Ok((stack.pop(txn)?, stack.pop(txn)?))
//! })?;
//! assert_eq!(popped, ("y".to_string(), "x".to_string()));
//! # Ok::<(), StmError>(())
//! ```
//!
//! ## Your own types
//!
//! Implement [`Persistent`] to say how a type is stored, then work with it
//! through [`Tracked`] inside transactions. References to other persistent
//! objects are [`Link`]s.
//!
//! ## Layers
//!
//! | Crate | Contents |
//! |-------|----------|
//! | `mvstm-core` | handles, versions, errors, latch |
//! | `mvstm-storage` | versioned cells, snapshots, the heap |
//! | `mvstm-concurrency` | object contract, transactions, retry |
//! | `mvstm-engine` | [`Stm`] facade, configuration, statistics |
//! | `mvstm-primitives` | [`TStack`], [`TQueue`], [`StateCell`] |

#![warn(missing_docs)]

pub mod prelude;

pub use mvstm_concurrency::{
    guard, retry, unwrap_or_retry, Link, ObjectHeap, ObjectRef, Persistent, StmObject, Tracked,
    Transaction, TransactionManager, TransactionStatus,
};
pub use mvstm_core::{Handle, Latch, StmError, StmResult, TxnId, Version};
pub use mvstm_engine::{RetryConfig, StatisticsSnapshot, Stm, StmBuilder, StmConfig};
pub use mvstm_primitives::{StateCell, TQueue, TStack};
pub use mvstm_storage::{CommitResult, HeapConfig, Snapshot};

/// Lower-level building blocks
pub mod storage {
    pub use mvstm_storage::*;
}
