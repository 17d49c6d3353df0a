//! Simulated extended-history service with fault injection.

use crate::context::SimLedger;
use fairground_core::EXTENDED_WINDOW;
use fairground_env::{EnvError, Hash, HistoryController, HistoryService, LedgerContext};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

/// Simulated history service sharing the chain of a `SimLedger`.
///
/// Serves any position whose age is within `EXTENDED_WINDOW`, like the
/// platform's ring buffer.
pub struct SimHistoryService {
    /// Chain this service records
    ledger: SimLedger,

    /// Whether the service exists on the simulated platform
    deployed: AtomicBool,

    /// Whether queries currently fail
    failing: AtomicBool,

    /// Number of queries served (successful or not)
    queries: AtomicU64,
}

impl SimHistoryService {
    /// Creates a deployed, healthy history service.
    pub fn new(ledger: SimLedger) -> Self {
        Self {
            ledger,
            deployed: AtomicBool::new(true),
            failing: AtomicBool::new(false),
            queries: AtomicU64::new(0),
        }
    }

    /// Creates a service that is not deployed (older platform).
    pub fn undeployed(ledger: SimLedger) -> Self {
        let service = Self::new(ledger);
        service.set_deployed(false);
        service
    }

    /// Returns the number of queries issued so far.
    pub fn query_count(&self) -> u64 {
        self.queries.load(Ordering::SeqCst)
    }
}

impl HistoryService for SimHistoryService {
    fn is_deployed(&self) -> bool {
        self.deployed.load(Ordering::SeqCst)
    }

    fn query(&self, position: u64) -> Result<Hash, EnvError> {
        self.queries.fetch_add(1, Ordering::SeqCst);

        if !self.is_deployed() {
            return Err(EnvError::HistoryUnavailable);
        }
        if self.failing.load(Ordering::SeqCst) {
            return Err(EnvError::query_failed("history call reverted"));
        }

        let current = self.ledger.current_position();
        if position >= current {
            return Err(EnvError::PositionNotInPast { position, current });
        }
        let age = current - position;
        if age > EXTENDED_WINDOW {
            return Err(EnvError::PositionExpired {
                position,
                age,
                window: EXTENDED_WINDOW,
            });
        }

        Ok(self.ledger.position_hash(position))
    }
}

impl HistoryController for SimHistoryService {
    fn set_deployed(&self, deployed: bool) {
        self.deployed.store(deployed, Ordering::SeqCst);
    }

    fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_history_serves_extended_window() {
        let ledger = SimLedger::new(7, 10_000);
        let history = SimHistoryService::new(ledger.clone());

        assert_eq!(history.query(9_999), Ok(ledger.position_hash(9_999)));
        assert_eq!(
            history.query(10_000 - EXTENDED_WINDOW),
            Ok(ledger.position_hash(10_000 - EXTENDED_WINDOW))
        );
        assert!(matches!(
            history.query(10_000 - EXTENDED_WINDOW - 1),
            Err(EnvError::PositionExpired { .. })
        ));
        assert!(matches!(history.query(10_000), Err(EnvError::PositionNotInPast { .. })));
        assert_eq!(history.query_count(), 4);
    }

    #[test]
    fn test_fault_injection() {
        let ledger = SimLedger::new(7, 500);
        let history = SimHistoryService::undeployed(ledger);
        assert!(!history.is_deployed());
        assert_eq!(history.query(100), Err(EnvError::HistoryUnavailable));

        history.set_deployed(true);
        history.set_failing(true);
        assert!(matches!(history.query(100), Err(EnvError::QueryFailed(_))));

        history.set_failing(false);
        assert!(history.query(100).is_ok());
    }
}
