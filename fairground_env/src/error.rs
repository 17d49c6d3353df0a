//! Error types for the Fairground environment abstraction.

use thiserror::Error;

/// Errors raised by environment capabilities.
///
/// The fairness engine never forwards these to its callers: the entropy
/// source folds every variant into its zero-sentinel result. They exist so
/// adapters can say *why* a lookup failed, which the tagged lookup keeps.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EnvError {
    /// The history service is not deployed on this platform version
    #[error("History service unavailable")]
    HistoryUnavailable,

    /// The history query itself failed (reverted, malformed reply, ...)
    #[error("History query failed: {0}")]
    QueryFailed(String),

    /// Requested position is the current one or in the future
    #[error("Position {position} is not in the past (current {current})")]
    PositionNotInPast { position: u64, current: u64 },

    /// Requested position has aged out of the service's ring buffer
    #[error("Position {position} expired (age {age} exceeds window {window})")]
    PositionExpired { position: u64, age: u64, window: u64 },
}

impl EnvError {
    /// Creates a query failure.
    pub fn query_failed(msg: impl Into<String>) -> Self {
        Self::QueryFailed(msg.into())
    }
}
