//! Transaction layer for mvstm
//!
//! This crate mediates between application objects and the multiversioned
//! heap:
//! - [`Persistent`], [`Tracked`], [`Link`]: the object contract
//! - [`walker`]: cycle-safe traversal of in-memory object graphs
//! - [`Transaction`]: snapshot reads, attach, commit, abort, retry
//!   registration
//! - [`TransactionManager`]: transaction ids and blocking retry
//! - [`retry`], [`guard`], [`unwrap_or_retry`]: the retry signal

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod manager;
pub mod object;
pub mod retry;
pub mod transaction;
pub mod walker;

pub use manager::TransactionManager;
pub use object::{Link, ObjectRef, Persistent, StmObject, StoredObject, Tracked};
pub use retry::{guard, retry, unwrap_or_retry};
pub use transaction::{ObjectHeap, Transaction, TransactionStatus};
pub use walker::Walk;
