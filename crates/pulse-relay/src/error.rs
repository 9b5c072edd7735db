//! Relay error types

use pulse_cache::RedisPoolError;
use pulse_core::CoreError;

/// Errors surfaced while processing log entries
#[derive(Debug, thiserror::Error)]
pub enum RelayError {
    #[error("Redis error: {0}")]
    Redis(#[from] RedisPoolError),

    #[error("Contract error: {0}")]
    Contract(#[from] CoreError),

    /// Some recipients of a fan-out could not be updated; the entry must
    /// not be acknowledged so the remainder is retried
    #[error("Reconciliation incomplete: {failed} of {total} recipients failed")]
    Incomplete { failed: usize, total: usize },
}

/// Result alias for relay operations
pub type RelayResult<T> = Result<T, RelayError>;
