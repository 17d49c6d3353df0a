//! SimGame - A reference calling game composed from the Fairground engines.
//!
//! The game owns a `CommitmentLedger` and an `EntropySource` and drives the
//! round lifecycle around them:
//! - Opening a round fixes a resolution position in the future
//! - Commitments and reveals are forwarded to the ledger
//! - Closing reveals forfeits everyone who stayed silent
//! - Resolution reads the entropy at the fixed position and eliminates
//!   revealed participants at the configured rate
//!
//! Payout accounting is left out; the report lists who survived.

use crate::context::SimLedger;
use crate::history::SimHistoryService;

use fairground_core::{
    derive_outcome_set, derive_seed, CommitmentLedger, EntropyLookup, EntropyQuery, EntropySource,
    LedgerError, LedgerFact, OutcomeError, SeedContext,
};
use fairground_env::{Hash, LedgerContext, ParticipantId, RoundId};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info};

/// Domain tag of this game's seeds.
pub const GAME_DOMAIN: &str = "fairground-sim/arena";

/// Positions between opening a round and its resolution position.
pub const DEFAULT_RESOLUTION_DELAY: u64 = 5;

/// Errors surfaced by the simulated game.
#[derive(Debug, Error)]
pub enum GameError {
    #[error("Ledger: {0}")]
    Ledger(#[from] LedgerError),

    #[error("Outcome: {0}")]
    Outcome(#[from] OutcomeError),

    #[error("Round {0} was never opened")]
    UnknownRound(RoundId),

    #[error("Round {0} is already open")]
    RoundAlreadyOpen(RoundId),

    #[error("Round {round} closed at position {resolution_position} (current {current})")]
    RoundClosed {
        round: RoundId,
        resolution_position: u64,
        current: u64,
    },

    #[error("Entropy for position {position} unavailable: {lookup:?}")]
    EntropyUnavailable { position: u64, lookup: EntropyLookup },
}

/// Outcome of a resolved round.
#[derive(Debug, Clone, Serialize)]
pub struct RoundReport {
    pub round: RoundId,

    /// Position whose hash seeded the round
    pub resolution_position: u64,

    /// Entropy as returned by the source
    pub entropy: EntropyQuery,

    /// Derived seed
    pub seed: Hash,

    /// Revealed participants, in entity-index order
    pub entities: Vec<ParticipantId>,

    /// Entities selected for elimination
    pub eliminated: Vec<ParticipantId>,
}

impl RoundReport {
    /// Revealed participants that were not eliminated.
    pub fn survivors(&self) -> Vec<ParticipantId> {
        self.entities
            .iter()
            .filter(|p| !self.eliminated.contains(p))
            .copied()
            .collect()
    }
}

/// A simulated game running on the deterministic ledger.
pub struct SimGame {
    /// Commit / reveal / forfeit state
    ledger: CommitmentLedger,

    /// Tiered entropy
    entropy: EntropySource<SimLedger>,

    /// Chain handle (for positions and timestamps)
    chain: Arc<SimLedger>,

    /// Elimination rate in basis points
    rate_bps: u16,

    /// Positions between `open_round` and the resolution position
    resolution_delay: u64,

    /// Resolution position per open round
    rounds: HashMap<RoundId, u64>,
}

impl SimGame {
    /// Creates a new game.
    ///
    /// # Arguments
    /// * `chain` - Simulated ledger
    /// * `history` - Extended-history capability, if the platform has one
    /// * `rate_bps` - Elimination rate per revealed participant
    pub fn new(chain: Arc<SimLedger>, history: Option<Arc<SimHistoryService>>, rate_bps: u16) -> Self {
        let entropy = match history {
            Some(h) => EntropySource::with_history(chain.clone(), h),
            None => EntropySource::new(chain.clone()),
        };

        Self {
            ledger: CommitmentLedger::new(),
            entropy,
            chain,
            rate_bps,
            resolution_delay: DEFAULT_RESOLUTION_DELAY,
            rounds: HashMap::new(),
        }
    }

    /// Sets the resolution delay.
    pub fn with_resolution_delay(mut self, delay: u64) -> Self {
        self.resolution_delay = delay;
        self
    }

    /// Opens a round and fixes its resolution position.
    ///
    /// The position is in the future so nobody can know its hash while
    /// commitments are being collected. The position is fixed for the life
    /// of the round; opening it again fails.
    pub fn open_round(&mut self, round: RoundId) -> Result<u64, GameError> {
        if self.rounds.contains_key(&round) {
            return Err(GameError::RoundAlreadyOpen(round));
        }
        let position = self.chain.current_position() + self.resolution_delay;
        self.rounds.insert(round, position);
        info!("Opened {} (resolution position {})", round, position);
        Ok(position)
    }

    /// Returns the resolution position of an open round.
    pub fn resolution_position(&self, round: RoundId) -> Option<u64> {
        self.rounds.get(&round).copied()
    }

    /// Fails once the resolution position has been reached, so nothing
    /// enters the round after its entropy can be known.
    fn ensure_open(&self, round: RoundId) -> Result<(), GameError> {
        let resolution_position = self
            .resolution_position(round)
            .ok_or(GameError::UnknownRound(round))?;
        let current = self.chain.current_position();
        if current >= resolution_position {
            return Err(GameError::RoundClosed {
                round,
                resolution_position,
                current,
            });
        }
        Ok(())
    }

    pub fn commit(
        &mut self,
        round: RoundId,
        participant: ParticipantId,
        digest: Hash,
        stake: u128,
    ) -> Result<(), GameError> {
        self.ensure_open(round)?;
        self.ledger.commit(round, participant, digest, stake)?;
        Ok(())
    }

    pub fn reveal(
        &mut self,
        round: RoundId,
        participant: ParticipantId,
        choice: u8,
        secret: &Hash,
    ) -> Result<u8, GameError> {
        self.ensure_open(round)?;
        Ok(self.ledger.reveal(round, participant, choice, secret)?)
    }

    /// Ends the reveal window: forfeits every silent participant.
    ///
    /// Returns the total stake seized.
    pub fn close_reveals(&mut self, round: RoundId) -> u128 {
        let seized = self.ledger.forfeit_unrevealed(round);
        if seized > 0 {
            info!("{}: forfeited {} from non-revealers", round, seized);
        }
        seized
    }

    /// Resolves a round from the entropy at its resolution position.
    pub fn resolve(&mut self, round: RoundId) -> Result<RoundReport, GameError> {
        let position = self
            .resolution_position(round)
            .ok_or(GameError::UnknownRound(round))?;

        let lookup = self.entropy.lookup(position);
        if !lookup.is_value() {
            return Err(GameError::EntropyUnavailable { position, lookup });
        }
        let entropy = EntropyQuery::from(lookup);

        let entities: Vec<ParticipantId> = self
            .ledger
            .round_commitments(round)
            .into_iter()
            .filter(|(_, c)| c.revealed)
            .map(|(p, _)| p)
            .collect();

        let ctx = SeedContext::new(
            GAME_DOMAIN,
            self.chain.timestamp(),
            position,
            entities.len() as u32,
        );
        let seed = derive_seed(&entropy.hash, &ctx)?;
        let selected = derive_outcome_set(&seed, entities.len() as u32, self.rate_bps)?;
        let eliminated: Vec<ParticipantId> =
            selected.iter().map(|&i| entities[i as usize]).collect();

        debug!(
            "{} resolved: entities={} eliminated={} extended={}",
            round,
            entities.len(),
            eliminated.len(),
            entropy.used_extended
        );

        Ok(RoundReport {
            round,
            resolution_position: position,
            entropy,
            seed,
            entities,
            eliminated,
        })
    }

    /// Drains the ledger's emitted facts.
    pub fn take_facts(&mut self) -> Vec<LedgerFact> {
        self.ledger.take_facts()
    }

    /// Returns a reference to the commitment ledger.
    pub fn ledger(&self) -> &CommitmentLedger {
        &self.ledger
    }

    /// Returns a mutable reference to the commitment ledger.
    pub fn ledger_mut(&mut self) -> &mut CommitmentLedger {
        &mut self.ledger
    }

    /// Returns a reference to the entropy source.
    pub fn entropy(&self) -> &EntropySource<SimLedger> {
        &self.entropy
    }
}
