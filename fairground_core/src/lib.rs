//! Fairground Core - Fairness Engine for Wager Mini-Games on a Shared Ledger
//!
//! This library solves three problems every commit-and-resolve game has:
//! 1. **Peeking Opponent Problem**: Commit / reveal / forfeit ledger with identity-bound digests
//! 2. **Expired History Problem**: Ledger entropy with a native → extended-history fallback
//! 3. **Correlated Outcome Problem**: Per-entity re-hashed basis-point rolls from one seed
//!
//! Game contracts compose these: they own a `CommitmentLedger` and an
//! `EntropySource`, and feed the entropy into `derive_seed` /
//! `derive_outcome_set` when resolving a round. Payouts stay with the game.

pub mod fairground_commit;
pub mod fairground_entropy;
pub mod fairground_outcome;
pub mod metrics;

// Re-export key types for convenience
pub use fairground_commit::{
    generate_commitment_hash, Commitment, CommitmentLedger, CommitmentStore, LedgerError,
    LedgerFact, SledCommitmentStore,
};
pub use fairground_entropy::{
    EntropyLookup, EntropyQuery, EntropySource, EntropySourceKind, EXTENDED_WINDOW, NATIVE_WINDOW,
};
pub use fairground_outcome::{
    derive_outcome, derive_outcome_set, derive_seed, roll_bps, OutcomeError, SeedContext,
    BPS_DENOMINATOR, MAX_ENTITY_COUNT,
};
pub use metrics::{run_rate_trials, RateTrialStats};
