//! Fairground Metrics Module
//! =========================
//!
//! Repeated-trial statistics for the outcome derivation's rate contract:
//! - **Selected fraction**: per trial, `|selected| / entity_count`
//! - **Min / Avg / Max**: across trials, compared against `rate_bps / 10_000`
//! - **Binomial spread**: expected per-trial standard deviation
//!
//! The simulator's `rate_convergence` scenario and the tests below drive this.

use crate::fairground_outcome::{derive_outcome_set, OutcomeError, BPS_DENOMINATOR};
use fairground_env::Hash;
use serde::Serialize;

/// Aggregated selected-fraction statistics over independent seeds.
#[derive(Debug, Clone, Default, Serialize)]
pub struct RateTrialStats {
    /// Number of seeds evaluated
    pub trials: usize,
    /// Entities per trial
    pub entity_count: u32,
    /// Target rate in basis points
    pub rate_bps: u16,
    /// Smallest observed fraction
    pub min_fraction: f64,
    /// Mean observed fraction
    pub avg_fraction: f64,
    /// Largest observed fraction
    pub max_fraction: f64,
}

impl RateTrialStats {
    /// Target fraction `rate_bps / 10_000`
    pub fn target_fraction(&self) -> f64 {
        f64::from(self.rate_bps) / f64::from(BPS_DENOMINATOR)
    }

    /// Per-trial binomial standard deviation `sqrt(p(1-p)/n)`
    pub fn binomial_std_dev(&self) -> f64 {
        if self.entity_count == 0 {
            return 0.0;
        }
        let p = self.target_fraction();
        (p * (1.0 - p) / f64::from(self.entity_count)).sqrt()
    }

    /// True if the mean lies within `tolerance` of the target
    pub fn avg_within(&self, tolerance: f64) -> bool {
        (self.avg_fraction - self.target_fraction()).abs() <= tolerance
    }

    /// Worst single-trial deviation, in binomial standard deviations
    pub fn max_deviation_sigmas(&self) -> f64 {
        let sigma = self.binomial_std_dev();
        if sigma == 0.0 {
            return 0.0;
        }
        let target = self.target_fraction();
        (self.min_fraction - target)
            .abs()
            .max((self.max_fraction - target).abs())
            / sigma
    }
}

/// Runs `derive_outcome_set` once per seed and aggregates the fractions.
pub fn run_rate_trials<I>(
    seeds: I,
    entity_count: u32,
    rate_bps: u16,
) -> Result<RateTrialStats, OutcomeError>
where
    I: IntoIterator<Item = Hash>,
{
    let mut stats = RateTrialStats {
        entity_count,
        rate_bps,
        min_fraction: f64::MAX,
        max_fraction: f64::MIN,
        ..Default::default()
    };
    let mut sum = 0.0;

    for seed in seeds {
        let selected = derive_outcome_set(&seed, entity_count, rate_bps)?;
        let fraction = if entity_count == 0 {
            0.0
        } else {
            selected.len() as f64 / f64::from(entity_count)
        };
        stats.trials += 1;
        stats.min_fraction = stats.min_fraction.min(fraction);
        stats.max_fraction = stats.max_fraction.max(fraction);
        sum += fraction;
    }

    if stats.trials == 0 {
        stats.min_fraction = 0.0;
        stats.max_fraction = 0.0;
    } else {
        stats.avg_fraction = sum / stats.trials as f64;
    }
    Ok(stats)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fairground_outcome::{derive_seed, SeedContext};
    use approx::assert_abs_diff_eq;
    use sha2::{Digest, Sha256};

    fn trial_seeds(count: u64) -> Vec<Hash> {
        (0..count)
            .map(|i| {
                let entropy: Hash = Sha256::digest(i.to_be_bytes()).into();
                let ctx = SeedContext::new("convergence", 1_700_000_000 + i, 18_000_000 + i, 1000);
                derive_seed(&entropy, &ctx).unwrap()
            })
            .collect()
    }

    #[test]
    fn test_statistical_convergence_40_percent() {
        let stats = run_rate_trials(trial_seeds(100), 1000, 4000).unwrap();

        assert_eq!(stats.trials, 100);
        assert_abs_diff_eq!(stats.avg_fraction, 0.40, epsilon = 0.02);
        assert!(stats.min_fraction <= stats.avg_fraction);
        assert!(stats.avg_fraction <= stats.max_fraction);
        // 100 draws of Binomial(1000, 0.4) stay well inside 5 sigma
        assert!(stats.max_deviation_sigmas() < 5.0, "{:?}", stats);
    }

    #[test]
    fn test_binomial_std_dev() {
        let stats = RateTrialStats {
            entity_count: 1000,
            rate_bps: 4000,
            ..Default::default()
        };
        assert_abs_diff_eq!(stats.target_fraction(), 0.4);
        assert_abs_diff_eq!(stats.binomial_std_dev(), (0.24f64 / 1000.0).sqrt(), epsilon = 1e-12);
    }

    #[test]
    fn test_no_trials() {
        let stats = run_rate_trials(Vec::new(), 10, 5000).unwrap();
        assert_eq!(stats.trials, 0);
        assert_eq!(stats.avg_fraction, 0.0);
        assert_eq!(stats.min_fraction, 0.0);
        assert_eq!(stats.max_fraction, 0.0);
    }

    #[test]
    fn test_bounds_propagate() {
        assert!(run_rate_trials(trial_seeds(1), 1000, 20_000).is_err());
    }
}
