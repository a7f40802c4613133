//! Engine layer for mvstm
//!
//! Wraps the transaction layer in a shareable [`Stm`] with:
//! - [`Stm::atomically`]: run-until-committed with blocking retry and
//!   bounded, backed-off restarts after conflicts
//! - [`StmConfig`]: heap and restart settings, loadable from TOML
//! - [`StmStatistics`]: commit, abort and restart counters

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod config;
pub mod statistics;
pub mod stm;

pub use config::{RetryConfig, StmConfig};
pub use statistics::{StatisticsSnapshot, StmStatistics};
pub use stm::{Stm, StmBuilder};
