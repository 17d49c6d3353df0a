//! The "OUTCOME" Engine - Per-Entity Outcome Derivation
//!
//! Pure functions, no stored state. One entropy value plus a resolution
//! context becomes a seed; every entity index gets its own re-hash of that
//! seed, reduced to a basis-point roll and compared against a target rate.
//!
//! Re-hashing per index (instead of slicing one hash across entities) keeps
//! neighbouring entities' outcomes uncorrelated.

use fairground_env::{Hash, ZERO_HASH};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;

/// Rolls are uniform over `0..BPS_DENOMINATOR`.
pub const BPS_DENOMINATOR: u16 = 10_000;

/// Upper bound on entities per outcome set.
pub const MAX_ENTITY_COUNT: u32 = 10_000;

const SEED_DOMAIN: &[u8] = b"fairground/seed/v1";

/// Derivation input errors, raised before any hashing.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum OutcomeError {
    #[error("Entity count {count} exceeds maximum {max}")]
    EntityCountTooLarge { count: u32, max: u32 },

    #[error("Rate {rate_bps} bps exceeds {max} bps")]
    RateOutOfRange { rate_bps: u16, max: u16 },

    #[error("Entropy value is zero; pick another position or abort the round")]
    ZeroEntropy,
}

/// Caller-supplied context folded into the seed.
///
/// Two resolutions that happen to read the same entropy still get different
/// seeds as long as any field differs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeedContext {
    /// Timestamp of the resolving call
    pub timestamp: u64,

    /// Position whose hash supplied the entropy
    pub position: u64,

    /// Size of the entity set being resolved
    pub entity_count: u32,

    /// Game-specific domain tag (e.g. "ant-arena/round")
    pub domain: String,
}

impl SeedContext {
    pub fn new(domain: impl Into<String>, timestamp: u64, position: u64, entity_count: u32) -> Self {
        Self {
            timestamp,
            position,
            entity_count,
            domain: domain.into(),
        }
    }
}

/// Combines an entropy value with its resolution context into a seed.
pub fn derive_seed(entropy: &Hash, ctx: &SeedContext) -> Result<Hash, OutcomeError> {
    if *entropy == ZERO_HASH {
        return Err(OutcomeError::ZeroEntropy);
    }

    let mut hasher = Sha256::new();
    hasher.update(SEED_DOMAIN);
    hasher.update(entropy);
    hasher.update(ctx.timestamp.to_be_bytes());
    hasher.update(ctx.position.to_be_bytes());
    hasher.update(ctx.entity_count.to_be_bytes());
    // Length prefix keeps the domain unambiguous
    hasher.update((ctx.domain.len() as u32).to_be_bytes());
    hasher.update(ctx.domain.as_bytes());
    Ok(hasher.finalize().into())
}

/// Basis-point roll of one entity: `SHA-256(seed || index) mod 10_000`.
pub fn roll_bps(seed: &Hash, entity_index: u32) -> u16 {
    let mut hasher = Sha256::new();
    hasher.update(seed);
    hasher.update(u64::from(entity_index).to_be_bytes());
    let digest: Hash = hasher.finalize().into();

    // Big-endian 256-bit value reduced byte by byte
    let modulus = u32::from(BPS_DENOMINATOR);
    let roll = digest
        .iter()
        .fold(0u32, |acc, &b| (acc * 256 + u32::from(b)) % modulus);
    roll as u16
}

/// Decision for one entity: selected iff its roll is below `rate_bps`.
pub fn derive_outcome(seed: &Hash, entity_index: u32, rate_bps: u16) -> bool {
    roll_bps(seed, entity_index) < rate_bps
}

/// Applies `derive_outcome` to `0..entity_count`.
///
/// Returns the selected indices in ascending order. Bounds are checked
/// before any hashing.
pub fn derive_outcome_set(
    seed: &Hash,
    entity_count: u32,
    rate_bps: u16,
) -> Result<Vec<u32>, OutcomeError> {
    if entity_count > MAX_ENTITY_COUNT {
        return Err(OutcomeError::EntityCountTooLarge {
            count: entity_count,
            max: MAX_ENTITY_COUNT,
        });
    }
    if rate_bps > BPS_DENOMINATOR {
        return Err(OutcomeError::RateOutOfRange {
            rate_bps,
            max: BPS_DENOMINATOR,
        });
    }

    Ok((0..entity_count)
        .filter(|&i| derive_outcome(seed, i, rate_bps))
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seed(n: u8) -> Hash {
        let ctx = SeedContext::new("test", 1_700_000_000, 100, 1000);
        derive_seed(&[n.max(1); 32], &ctx).unwrap()
    }

    #[test]
    fn test_outcome_set_deterministic() {
        let s = seed(1);
        let a = derive_outcome_set(&s, 1000, 4000).unwrap();
        let b = derive_outcome_set(&s, 1000, 4000).unwrap();
        assert_eq!(a, b);
        assert!(a.windows(2).all(|w| w[0] < w[1]));
        assert!(a.iter().all(|&i| i < 1000));
    }

    #[test]
    fn test_rate_extremes() {
        let s = seed(2);
        assert!(derive_outcome_set(&s, 500, 0).unwrap().is_empty());
        assert_eq!(derive_outcome_set(&s, 500, 10_000).unwrap().len(), 500);
        assert!(derive_outcome_set(&s, 0, 5000).unwrap().is_empty());
    }

    #[test]
    fn test_bounds_rejected() {
        let s = seed(3);
        assert_eq!(
            derive_outcome_set(&s, MAX_ENTITY_COUNT + 1, 100),
            Err(OutcomeError::EntityCountTooLarge { count: MAX_ENTITY_COUNT + 1, max: MAX_ENTITY_COUNT })
        );
        assert_eq!(
            derive_outcome_set(&s, 10, 10_001),
            Err(OutcomeError::RateOutOfRange { rate_bps: 10_001, max: BPS_DENOMINATOR })
        );
        assert!(derive_outcome_set(&s, MAX_ENTITY_COUNT, 10_000).is_ok());
    }

    #[test]
    fn test_zero_entropy_rejected() {
        let ctx = SeedContext::new("test", 0, 0, 1);
        assert_eq!(derive_seed(&ZERO_HASH, &ctx), Err(OutcomeError::ZeroEntropy));
    }

    #[test]
    fn test_seed_binds_every_context_field() {
        let entropy = [9u8; 32];
        let base = SeedContext::new("arena", 1000, 50, 10);
        let s = derive_seed(&entropy, &base).unwrap();

        let variants = [
            SeedContext { timestamp: 1001, ..base.clone() },
            SeedContext { position: 51, ..base.clone() },
            SeedContext { entity_count: 11, ..base.clone() },
            SeedContext { domain: "arena2".into(), ..base.clone() },
        ];
        for v in &variants {
            assert_ne!(derive_seed(&entropy, v).unwrap(), s);
        }
        assert_ne!(derive_seed(&[8u8; 32], &base).unwrap(), s);
    }

    #[test]
    fn test_roll_range_and_outcome_consistency() {
        let s = seed(4);
        for i in 0..2000 {
            let roll = roll_bps(&s, i);
            assert!(roll < BPS_DENOMINATOR);
            assert_eq!(derive_outcome(&s, i, 4000), roll < 4000);
        }
    }

    #[test]
    fn test_adjacent_entities_uncorrelated() {
        // Agreement rate of neighbouring decisions at 50% should be ~50%
        let mut agree = 0u32;
        let mut pairs = 0u32;
        for n in 1..=20u8 {
            let s = seed(n);
            let set: Vec<bool> = (0..500).map(|i| derive_outcome(&s, i, 5000)).collect();
            for w in set.windows(2) {
                pairs += 1;
                if w[0] == w[1] {
                    agree += 1;
                }
            }
        }
        let rate = agree as f64 / pairs as f64;
        assert!((rate - 0.5).abs() < 0.05, "neighbour agreement {}", rate);
    }
}
