//! Extended-history capability abstraction.

use crate::error::EnvError;
use crate::types::Hash;

/// Abstraction for the extended position-hash history service.
///
/// On newer platform versions a system service keeps a ring buffer of
/// recent position hashes, far longer than the native lookback. Older
/// versions don't have it at all, so holders keep it as an optional
/// capability and check `is_deployed` before relying on it.
///
/// # Implementations
///
/// - **Simulation**: `SimHistoryService` - shares the simulated chain and
///   supports fault injection via `HistoryController`
///
/// # Lookup Flow
///
/// ```text
/// Engine                    HistoryService              Ledger
///   |                            |                          |
///   |-- query(position) -------->|                          |
///   |                            |-- [ring buffer read] --->|
///   |<-- Ok(hash) / Err(..) -----|                          |
/// ```
pub trait HistoryService: Send + Sync {
    /// Returns true if the service exists in the current execution context.
    fn is_deployed(&self) -> bool;

    /// Queries the stored hash of a past position.
    ///
    /// # Returns
    /// * `Ok(hash)` - The stored hash (may be `ZERO_HASH` if never recorded)
    /// * `Err(EnvError::HistoryUnavailable)` - Service not deployed
    /// * `Err(EnvError::PositionNotInPast)` / `Err(EnvError::PositionExpired)` -
    ///   Position outside the service's range
    /// * `Err(EnvError::QueryFailed)` - The call itself failed
    fn query(&self, position: u64) -> Result<Hash, EnvError>;
}

/// Fault-injection controller for simulated history services.
///
/// Allows injecting faults like an undeployed service or failing calls.
pub trait HistoryController: Send + Sync {
    /// Deploys or removes the service.
    fn set_deployed(&self, deployed: bool);

    /// Makes every query fail (simulates a reverting call).
    fn set_failing(&self, failing: bool);
}
