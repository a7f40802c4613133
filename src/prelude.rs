//! Convenient imports for mvstm.
//!
//! ```
//! use mvstm::prelude::*;
//!
//! let stm = Stm::new();
//! let handle = stm.atomically(|txn| StateCell::new(0u32).attach(txn)).unwrap();
//! # let _ = handle;
//! ```

// Entry point
pub use crate::{Stm, StmBuilder, StmConfig};

// Error handling
pub use crate::{StmError, StmResult};

// Object model
pub use crate::{Link, Persistent, Tracked, Transaction, TransactionStatus};

// Retry signal
pub use crate::{guard, retry, unwrap_or_retry};

// Primitives
pub use crate::{StateCell, TQueue, TStack};

// Identifiers
pub use crate::{Handle, Version};
