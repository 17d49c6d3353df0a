//! Simulated ledger implementing LedgerContext for deterministic testing.

use fairground_core::NATIVE_WINDOW;
use fairground_env::{Hash, LedgerContext, ZERO_HASH};
use sha2::{Digest, Sha256};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Seconds between simulated positions.
pub const BLOCK_TIME_SECS: u64 = 12;

/// Simulated chain backed by a manually advanced position counter.
///
/// This implements `LedgerContext` using:
/// - A virtual position that only moves when the harness advances it
/// - Position hashes derived from the master seed, so every run with the
///   same seed sees the same "history"
/// - A native lookback of `NATIVE_WINDOW` positions, like the real platform
pub struct SimLedger {
    /// Master seed for this simulation
    seed: u64,

    /// Position currently being executed (shared between clones)
    position: Arc<AtomicU64>,

    /// Timestamp of position 0
    genesis_timestamp: u64,

    /// Native lookback depth
    native_window: u64,
}

impl SimLedger {
    /// Creates a new SimLedger with the given seed, starting at `position`.
    pub fn new(seed: u64, position: u64) -> Self {
        Self {
            seed,
            position: Arc::new(AtomicU64::new(position)),
            genesis_timestamp: 1704067200, // 2024-01-01 00:00:00 UTC
            native_window: NATIVE_WINDOW,
        }
    }

    /// Creates an Arc-wrapped ledger for sharing.
    pub fn shared(seed: u64, position: u64) -> Arc<Self> {
        Arc::new(Self::new(seed, position))
    }

    /// Overrides the native lookback depth (models older platforms).
    pub fn with_native_window(mut self, window: u64) -> Self {
        self.native_window = window;
        self
    }

    /// Advances the chain by `blocks` positions.
    pub fn advance(&self, blocks: u64) {
        self.position.fetch_add(blocks, Ordering::SeqCst);
    }

    /// Sets the current position.
    pub fn set_position(&self, position: u64) {
        self.position.store(position, Ordering::SeqCst);
    }

    /// Ground-truth hash of any position, regardless of lookback windows.
    pub fn position_hash(&self, position: u64) -> Hash {
        let mut hasher = Sha256::new();
        hasher.update(b"fairground-sim/position");
        hasher.update(self.seed.to_be_bytes());
        hasher.update(position.to_be_bytes());
        hasher.finalize().into()
    }

    /// Returns the master seed.
    pub fn seed(&self) -> u64 {
        self.seed
    }
}

impl Clone for SimLedger {
    fn clone(&self) -> Self {
        Self {
            seed: self.seed,
            position: Arc::clone(&self.position),
            genesis_timestamp: self.genesis_timestamp,
            native_window: self.native_window,
        }
    }
}

impl LedgerContext for SimLedger {
    fn current_position(&self) -> u64 {
        self.position.load(Ordering::SeqCst)
    }

    fn timestamp(&self) -> u64 {
        self.genesis_timestamp + self.current_position() * BLOCK_TIME_SECS
    }

    fn native_hash(&self, position: u64) -> Hash {
        let current = self.current_position();
        if position < current && current - position <= self.native_window {
            self.position_hash(position)
        } else {
            ZERO_HASH
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sim_ledger_positions() {
        let ledger = SimLedger::new(42, 100);
        assert_eq!(ledger.current_position(), 100);

        ledger.advance(5);
        assert_eq!(ledger.current_position(), 105);
        assert_eq!(ledger.timestamp(), 1704067200 + 105 * BLOCK_TIME_SECS);
    }

    #[test]
    fn test_native_window() {
        let ledger = SimLedger::new(42, 1000);
        assert_eq!(ledger.native_hash(1000), ZERO_HASH);
        assert_eq!(ledger.native_hash(999), ledger.position_hash(999));
        assert_eq!(ledger.native_hash(1000 - NATIVE_WINDOW), ledger.position_hash(1000 - NATIVE_WINDOW));
        assert_eq!(ledger.native_hash(1000 - NATIVE_WINDOW - 1), ZERO_HASH);

        let short = SimLedger::new(42, 1000).with_native_window(10);
        assert_eq!(short.native_hash(980), ZERO_HASH);
    }

    #[test]
    fn test_hashes_deterministic_per_seed() {
        let a = SimLedger::new(42, 0);
        let b = SimLedger::new(42, 0);
        let c = SimLedger::new(43, 0);
        assert_eq!(a.position_hash(7), b.position_hash(7));
        assert_ne!(a.position_hash(7), c.position_hash(7));
        assert_ne!(a.position_hash(7), a.position_hash(8));
    }

    #[test]
    fn test_clone_shares_position() {
        let a = SimLedger::new(42, 10);
        let b = a.clone();
        a.advance(3);
        assert_eq!(b.current_position(), 13);
    }
}
