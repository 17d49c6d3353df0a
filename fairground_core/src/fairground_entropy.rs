//! The "ENTROPY" Engine - Tiered Ledger Randomness
//!
//! Solves the "Expired History" problem by:
//! - Reading recent position hashes through the cheap native lookback
//! - Falling back to the extended-history service once the native window
//!   has passed, when the platform has one
//! - Reporting unavailability as a zero sentinel instead of failing, so the
//!   calling game decides whether to retry, pick another position or abort
//!
//! Callers fix a resolution position in the near future at commit time and
//! query it once it is in the past but before it ages out of
//! `effective_window()`.

use fairground_env::{EnvError, Hash, HistoryService, LedgerContext, ZERO_HASH};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::debug;

/// Lookback range of the native mechanism, in positions.
pub const NATIVE_WINDOW: u64 = 256;

/// Lookback range of the extended-history service, in positions.
pub const EXTENDED_WINDOW: u64 = 8191;

/// Which mechanism produced a value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntropySourceKind {
    Native,
    Extended,
}

/// Tagged result of an entropy lookup.
///
/// `get_with_fallback` and `get_extended` collapse every non-`Value`
/// variant to `ZERO_HASH`; this keeps the reason for callers that care.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntropyLookup {
    /// A usable, nonzero hash
    Value { hash: Hash, source: EntropySourceKind },

    /// Position is the current one or in the future
    NotInPast,

    /// Position is older than every window that could serve it
    TooOld,

    /// No history service, or not deployed on this platform
    Unavailable,

    /// The history query failed
    QueryFailed,

    /// A source answered, but with the zero hash
    Empty,
}

impl EntropyLookup {
    /// The hash, or `ZERO_HASH` for every failure variant.
    pub fn hash_or_zero(&self) -> Hash {
        match self {
            EntropyLookup::Value { hash, .. } => *hash,
            _ => ZERO_HASH,
        }
    }

    pub fn is_value(&self) -> bool {
        matches!(self, EntropyLookup::Value { .. })
    }
}

impl From<EnvError> for EntropyLookup {
    fn from(err: EnvError) -> Self {
        match err {
            EnvError::HistoryUnavailable => EntropyLookup::Unavailable,
            EnvError::QueryFailed(_) => EntropyLookup::QueryFailed,
            EnvError::PositionNotInPast { .. } => EntropyLookup::NotInPast,
            EnvError::PositionExpired { .. } => EntropyLookup::TooOld,
        }
    }
}

/// Result of `get_with_fallback`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntropyQuery {
    /// The hash, `ZERO_HASH` if unavailable
    pub hash: Hash,

    /// True only when the extended service produced `hash`
    pub used_extended: bool,
}

impl EntropyQuery {
    /// The "unavailable" answer.
    pub const UNAVAILABLE: EntropyQuery = EntropyQuery {
        hash: ZERO_HASH,
        used_extended: false,
    };

    /// Returns true if `hash` may be used as entropy.
    pub fn is_available(&self) -> bool {
        self.hash != ZERO_HASH
    }
}

impl From<EntropyLookup> for EntropyQuery {
    fn from(lookup: EntropyLookup) -> Self {
        match lookup {
            EntropyLookup::Value { hash, source } => EntropyQuery {
                hash,
                used_extended: source == EntropySourceKind::Extended,
            },
            _ => EntropyQuery::UNAVAILABLE,
        }
    }
}

/// Historical ledger entropy with a native → extended degradation path.
///
/// Holds the ledger context and an optional handle to the extended-history
/// capability. A missing handle behaves exactly like an undeployed service.
pub struct EntropySource<C: LedgerContext> {
    /// Ledger context (position, native lookback)
    ctx: Arc<C>,

    /// Extended-history capability, if the platform offers one
    history: Option<Arc<dyn HistoryService>>,
}

impl<C: LedgerContext> EntropySource<C> {
    /// Creates a source backed by the native lookback only.
    pub fn new(ctx: Arc<C>) -> Self {
        Self { ctx, history: None }
    }

    /// Creates a source with an extended-history capability attached.
    pub fn with_history(ctx: Arc<C>, history: Arc<dyn HistoryService>) -> Self {
        Self {
            ctx,
            history: Some(history),
        }
    }

    /// Returns true if the extended-history service is reachable.
    pub fn is_available(&self) -> bool {
        self.history.as_ref().is_some_and(|h| h.is_deployed())
    }

    /// Returns the deepest lookback currently served, in positions.
    ///
    /// Lets callers validate a resolution position before querying.
    pub fn effective_window(&self) -> u64 {
        if self.is_available() {
            EXTENDED_WINDOW
        } else {
            NATIVE_WINDOW
        }
    }

    /// Returns the age of a strictly past position, `None` otherwise.
    pub fn age(&self, position: u64) -> Option<u64> {
        let current = self.ctx.current_position();
        (position < current).then(|| current - position)
    }

    /// Queries the extended-history service only.
    ///
    /// Returns `ZERO_HASH` if the position is not in the past, is older
    /// than `EXTENDED_WINDOW`, or the service is unavailable or fails.
    pub fn get_extended(&self, position: u64) -> Hash {
        self.lookup_extended(position).hash_or_zero()
    }

    /// Native lookback first, extended service second.
    ///
    /// - age within `NATIVE_WINDOW` and native nonzero → `used_extended = false`
    /// - else age within `EXTENDED_WINDOW` and extended nonzero → `used_extended = true`
    /// - else `ZERO_HASH` with `used_extended = false`
    pub fn get_with_fallback(&self, position: u64) -> EntropyQuery {
        self.lookup(position).into()
    }

    /// Tagged variant of `get_with_fallback`.
    pub fn lookup(&self, position: u64) -> EntropyLookup {
        let Some(age) = self.age(position) else {
            return EntropyLookup::NotInPast;
        };

        if age <= NATIVE_WINDOW {
            let hash = self.ctx.native_hash(position);
            if hash != ZERO_HASH {
                return EntropyLookup::Value {
                    hash,
                    source: EntropySourceKind::Native,
                };
            }
        }

        if age <= EXTENDED_WINDOW {
            debug!("Position {} (age {}) falling back to extended history", position, age);
            return self.lookup_extended(position);
        }

        debug!("Position {} (age {}) outside every window", position, age);
        EntropyLookup::TooOld
    }

    /// Tagged variant of `get_extended`.
    pub fn lookup_extended(&self, position: u64) -> EntropyLookup {
        let Some(age) = self.age(position) else {
            return EntropyLookup::NotInPast;
        };
        if age > EXTENDED_WINDOW {
            return EntropyLookup::TooOld;
        }

        let history = match self.history.as_ref() {
            Some(h) if h.is_deployed() => h,
            _ => return EntropyLookup::Unavailable,
        };

        match history.query(position) {
            Ok(hash) if hash == ZERO_HASH => EntropyLookup::Empty,
            Ok(hash) => EntropyLookup::Value {
                hash,
                source: EntropySourceKind::Extended,
            },
            Err(e) => {
                debug!("History query for position {} failed: {}", position, e);
                e.into()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sha2::{Digest, Sha256};
    use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

    fn position_hash(position: u64) -> Hash {
        Sha256::digest(position.to_be_bytes()).into()
    }

    /// Chain with a configurable native window
    struct FixedChain {
        current: AtomicU64,
        native_window: u64,
    }

    impl FixedChain {
        fn at(current: u64) -> Arc<Self> {
            Arc::new(Self {
                current: AtomicU64::new(current),
                native_window: NATIVE_WINDOW,
            })
        }
    }

    impl LedgerContext for FixedChain {
        fn current_position(&self) -> u64 {
            self.current.load(Ordering::SeqCst)
        }

        fn timestamp(&self) -> u64 {
            self.current_position() * 12
        }

        fn native_hash(&self, position: u64) -> Hash {
            let current = self.current_position();
            if position < current && current - position <= self.native_window {
                position_hash(position)
            } else {
                ZERO_HASH
            }
        }
    }

    struct FixedHistory {
        chain: Arc<FixedChain>,
        deployed: AtomicBool,
        failing: AtomicBool,
    }

    impl FixedHistory {
        fn new(chain: Arc<FixedChain>) -> Arc<Self> {
            Arc::new(Self {
                chain,
                deployed: AtomicBool::new(true),
                failing: AtomicBool::new(false),
            })
        }
    }

    impl HistoryService for FixedHistory {
        fn is_deployed(&self) -> bool {
            self.deployed.load(Ordering::SeqCst)
        }

        fn query(&self, position: u64) -> Result<Hash, EnvError> {
            if !self.is_deployed() {
                return Err(EnvError::HistoryUnavailable);
            }
            if self.failing.load(Ordering::SeqCst) {
                return Err(EnvError::query_failed("reverted"));
            }
            let current = self.chain.current_position();
            if position >= current {
                return Err(EnvError::PositionNotInPast { position, current });
            }
            Ok(position_hash(position))
        }
    }

    const CURRENT: u64 = 20_000;

    fn full_source() -> (EntropySource<FixedChain>, Arc<FixedHistory>) {
        let chain = FixedChain::at(CURRENT);
        let history = FixedHistory::new(chain.clone());
        (EntropySource::with_history(chain, history.clone()), history)
    }

    #[test]
    fn test_window_boundaries() {
        let (source, _) = full_source();

        let native_edge = source.get_with_fallback(CURRENT - NATIVE_WINDOW);
        assert_eq!(native_edge.hash, position_hash(CURRENT - NATIVE_WINDOW));
        assert!(!native_edge.used_extended);

        let first_extended = source.get_with_fallback(CURRENT - NATIVE_WINDOW - 1);
        assert_eq!(first_extended.hash, position_hash(CURRENT - NATIVE_WINDOW - 1));
        assert!(first_extended.used_extended);

        let extended_edge = source.get_with_fallback(CURRENT - EXTENDED_WINDOW);
        assert!(extended_edge.is_available());
        assert!(extended_edge.used_extended);

        let expired = source.get_with_fallback(CURRENT - EXTENDED_WINDOW - 1);
        assert_eq!(expired, EntropyQuery::UNAVAILABLE);
        assert_eq!(source.lookup(CURRENT - EXTENDED_WINDOW - 1), EntropyLookup::TooOld);
    }

    #[test]
    fn test_current_and_future_positions_unavailable() {
        let (source, _) = full_source();
        assert_eq!(source.get_with_fallback(CURRENT), EntropyQuery::UNAVAILABLE);
        assert_eq!(source.get_with_fallback(CURRENT + 5), EntropyQuery::UNAVAILABLE);
        assert_eq!(source.get_extended(CURRENT), ZERO_HASH);
        assert_eq!(source.lookup(CURRENT), EntropyLookup::NotInPast);
        assert_eq!(source.age(CURRENT - 1), Some(1));
        assert_eq!(source.age(CURRENT), None);
    }

    #[test]
    fn test_native_only_source() {
        let source = EntropySource::new(FixedChain::at(CURRENT));

        assert!(!source.is_available());
        assert_eq!(source.effective_window(), NATIVE_WINDOW);
        assert!(source.get_with_fallback(CURRENT - 1).is_available());

        let past_native = CURRENT - NATIVE_WINDOW - 1;
        assert_eq!(source.get_with_fallback(past_native), EntropyQuery::UNAVAILABLE);
        assert_eq!(source.lookup(past_native), EntropyLookup::Unavailable);
        assert_eq!(source.get_extended(past_native), ZERO_HASH);
    }

    #[test]
    fn test_effective_window_tracks_deployment() {
        let (source, history) = full_source();
        assert!(source.is_available());
        assert_eq!(source.effective_window(), EXTENDED_WINDOW);

        history.deployed.store(false, Ordering::SeqCst);
        assert!(!source.is_available());
        assert_eq!(source.effective_window(), NATIVE_WINDOW);
        assert_eq!(source.lookup_extended(CURRENT - 300), EntropyLookup::Unavailable);
    }

    #[test]
    fn test_failing_history_degrades_to_zero() {
        let (source, history) = full_source();
        history.failing.store(true, Ordering::SeqCst);

        let position = CURRENT - 1000;
        assert_eq!(source.get_extended(position), ZERO_HASH);
        assert_eq!(source.get_with_fallback(position), EntropyQuery::UNAVAILABLE);
        assert_eq!(source.lookup(position), EntropyLookup::QueryFailed);

        // Native window unaffected
        assert!(source.get_with_fallback(CURRENT - 10).is_available());
    }

    #[test]
    fn test_get_extended_serves_native_range_too() {
        let (source, _) = full_source();
        assert_eq!(source.get_extended(CURRENT - 1), position_hash(CURRENT - 1));
        assert_eq!(source.get_extended(CURRENT - EXTENDED_WINDOW - 1), ZERO_HASH);
    }

    #[test]
    fn test_empty_native_falls_back_inside_native_window() {
        // Platform whose native lookback is shorter than the nominal window
        let chain = Arc::new(FixedChain {
            current: AtomicU64::new(CURRENT),
            native_window: 16,
        });
        let history = FixedHistory::new(chain.clone());
        let source = EntropySource::with_history(chain, history);

        let query = source.get_with_fallback(CURRENT - 100);
        assert!(query.is_available());
        assert!(query.used_extended);
    }

    #[test]
    fn test_lookup_follows_chain_progress() {
        let (source, _) = full_source();
        let position = CURRENT + 10;
        assert!(!source.get_with_fallback(position).is_available());

        source.ctx.current.store(CURRENT + 11, Ordering::SeqCst);
        assert!(matches!(
            source.lookup(position),
            EntropyLookup::Value { source: EntropySourceKind::Native, .. }
        ));
    }
}
