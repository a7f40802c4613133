//! Engine configuration
//!
//! [`StmConfig`] gathers every tunable in one serde-deserializable struct.
//! Missing fields take their defaults, so a TOML document only needs the
//! values it changes:
//!
//! ```toml
//! [heap]
//! max_commit_attempts = 64
//!
//! [retry]
//! max_retries = 10
//! base_delay_ms = 1
//! max_delay_ms = 50
//! ```

use mvstm_core::{StmError, StmResult};
use mvstm_storage::HeapConfig;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Restart policy for transactions that fail with a retryable error
///
/// Applies to write conflicts and commit starvation. Transactions that
/// request a retry themselves block instead and are not counted here.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Maximum number of restarts (0 = fail on the first conflict)
    pub max_retries: usize,
    /// Base delay between restarts in milliseconds (exponential backoff)
    pub base_delay_ms: u64,
    /// Maximum delay between restarts in milliseconds
    pub max_delay_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 100,
            base_delay_ms: 1,
            max_delay_ms: 20,
        }
    }
}

impl RetryConfig {
    /// Create a RetryConfig with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a RetryConfig that never restarts
    pub fn no_retry() -> Self {
        Self {
            max_retries: 0,
            ..Default::default()
        }
    }

    /// Set maximum number of restarts
    pub fn with_max_retries(mut self, max_retries: usize) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// Set base delay for exponential backoff
    pub fn with_base_delay_ms(mut self, base_delay_ms: u64) -> Self {
        self.base_delay_ms = base_delay_ms;
        self
    }

    /// Set maximum delay between restarts
    pub fn with_max_delay_ms(mut self, max_delay_ms: u64) -> Self {
        self.max_delay_ms = max_delay_ms;
        self
    }

    /// Delay before restart number `attempt` (zero-based)
    pub fn calculate_delay(&self, attempt: usize) -> Duration {
        let shift = attempt.min(63);
        let delay_ms = self.base_delay_ms.saturating_mul(1u64 << shift);
        Duration::from_millis(delay_ms.min(self.max_delay_ms))
    }
}

/// Complete engine configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StmConfig {
    /// Heap settings
    pub heap: HeapConfig,
    /// Restart policy
    pub retry: RetryConfig,
}

impl StmConfig {
    /// Parse a TOML document
    ///
    /// # Errors
    ///
    /// [`StmError::InvalidArgument`] if the document is malformed or has
    /// fields of the wrong type.
    pub fn from_toml_str(source: &str) -> StmResult<Self> {
        toml::from_str(source)
            .map_err(|e| StmError::InvalidArgument(format!("invalid configuration: {}", e)))
    }
}
