//! Retry signalling
//!
//! A transaction that cannot proceed with what it observed (popping an empty
//! queue, waiting for a flag) returns [`StmError::Retry`]. The driver then
//! aborts it, waits until another transaction writes something it read, and
//! runs it again on a fresh snapshot. These helpers produce the signal.

use mvstm_core::{StmError, StmResult};

/// Give up on this attempt and wait for a read handle to change
pub fn retry<T>() -> StmResult<T> {
    Err(StmError::Retry)
}

/// Retry unless `condition` holds
#[inline]
pub fn guard(condition: bool) -> StmResult<()> {
    if condition {
        Ok(())
    } else {
        retry()
    }
}

/// Unwrap `option`, retrying on `None`
#[inline]
pub fn unwrap_or_retry<T>(option: Option<T>) -> StmResult<T> {
    match option {
        Some(value) => Ok(value),
        None => retry(),
    }
}
