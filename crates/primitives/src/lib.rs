//! Transactional primitives for mvstm
//!
//! Ready-made persistent data structures:
//! - [`TStack`]: LIFO stack, `pop` blocks while empty
//! - [`TQueue`]: FIFO queue, optionally bounded; `pop` blocks while empty
//!   and `push` while full
//! - [`StateCell`]: a single value
//!
//! All of them are views bound to one transaction. Create one with `new` and
//! store it with `attach`, or reopen a stored one by handle with `open`.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod queue;
pub mod stack;
pub mod state_cell;

pub use queue::TQueue;
pub use stack::TStack;
pub use state_cell::StateCell;
