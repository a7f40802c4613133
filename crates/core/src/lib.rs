//! Core types for mvstm
//!
//! This crate holds what every other layer shares:
//! - [`Handle`], [`Version`], [`TxnId`]: identifiers
//! - [`StmError`] / [`StmResult`]: the error taxonomy
//! - [`Latch`]: the blocking primitive behind transactional retry

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod error;
pub mod latch;
pub mod types;

pub use error::{StmError, StmResult};
pub use latch::Latch;
pub use types::{Handle, TxnId, Version};
