//! Core ledger context trait for the fairness engine.

use crate::types::Hash;

/// The central interface for ledger interaction.
///
/// This trait abstracts the chain so the engine can run against a live
/// adapter or the deterministic `SimLedger`.
///
/// # Implementations
///
/// - **Simulation**: `SimLedger` - seeded hashes, manually advanced positions
///
/// # Determinism
///
/// Every method is a pure read of ledger state at the moment of the call.
/// Execution on the ledger is serialized, so two reads inside one call
/// always agree.
pub trait LedgerContext: Send + Sync + 'static {
    /// Returns the position (block number) currently being executed.
    ///
    /// Positions strictly below this value are "in the past".
    fn current_position(&self) -> u64;

    /// Returns the timestamp of the current position, in seconds.
    fn timestamp(&self) -> u64;

    /// Returns the hash of a past position through the native lookback.
    ///
    /// Mirrors the platform's cheap built-in lookup: it yields `ZERO_HASH`
    /// for the current position, future positions and anything older than
    /// the platform's native window. Callers must treat zero as "unknown".
    fn native_hash(&self, position: u64) -> Hash;
}
