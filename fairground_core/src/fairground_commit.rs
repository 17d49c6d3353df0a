//! The "COMMIT" Engine - Commit / Reveal / Forfeit Ledger
//!
//! Solves the "Peeking Opponent" problem by:
//! - Hiding each participant's choice behind a one-way digest until reveal
//! - Binding the digest to the participant's identity so nobody can replay it
//! - Seizing the stake of anyone who commits and then refuses to reveal
//! - Mirroring every slot to an optional persistent store for auditing

use fairground_env::{Hash, ParticipantId, RoundId, ZERO_HASH};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, warn};

/// Domain tag prefixed to every commitment preimage.
const COMMIT_DOMAIN: &[u8] = b"fairground/commit/v1";

/// Commitment ledger errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LedgerError {
    #[error("Commitment digest is zero")]
    ZeroDigest,

    #[error("Stake amount is zero")]
    ZeroStake,

    #[error("Participant {participant} already committed in {round}")]
    AlreadyCommitted { round: RoundId, participant: ParticipantId },

    #[error("Participant {participant} forfeited in {round}; slot cannot be reused")]
    SlotForfeited { round: RoundId, participant: ParticipantId },

    #[error("No active commitment for {participant} in {round}")]
    NoActiveCommitment { round: RoundId, participant: ParticipantId },

    #[error("Participant {participant} already revealed in {round}")]
    AlreadyRevealed { round: RoundId, participant: ParticipantId },

    #[error("Reveal does not match the committed digest")]
    DigestMismatch,

    #[error("Storage error: {0}")]
    Storage(String),
}

/// One participant's commitment within a round.
///
/// Never deleted: after reveal or forfeiture it stays as the audit record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Commitment {
    /// Binding digest, written once at commit time
    pub hash: Hash,

    /// Stake at risk; zero only after forfeiture
    pub amount: u128,

    /// Whether the participant opened the commitment
    pub revealed: bool,

    /// The opened choice (`None` until revealed)
    pub revealed_choice: Option<u8>,
}

impl Commitment {
    /// Stake is still at risk (not forfeited).
    pub fn is_active(&self) -> bool {
        self.amount != 0
    }

    /// Active and not yet opened.
    pub fn can_reveal(&self) -> bool {
        self.is_active() && !self.revealed
    }
}

/// Facts emitted for off-core consumers (UIs, indexers).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum LedgerFact {
    Committed {
        round: RoundId,
        participant: ParticipantId,
        amount: u128,
    },
    Revealed {
        round: RoundId,
        participant: ParticipantId,
        choice: u8,
    },
    Forfeited {
        round: RoundId,
        participant: ParticipantId,
        amount: u128,
    },
}

/// Computes the binding digest a participant submits at commit time.
///
/// `SHA-256(domain || choice || secret || participant)`. Pure; callers run it
/// off the write path and keep `(choice, secret)` private until reveal.
pub fn generate_commitment_hash(choice: u8, secret: &Hash, participant: &ParticipantId) -> Hash {
    let mut hasher = Sha256::new();
    hasher.update(COMMIT_DOMAIN);
    hasher.update([choice]);
    hasher.update(secret);
    hasher.update(participant.as_bytes());
    hasher.finalize().into()
}

// ============================================================================
// COMMITMENT STORE (Persistent audit mirror)
// ============================================================================

/// Trait for persistent commitment storage
///
/// Implementations must be thread-safe and persist data across restarts.
pub trait CommitmentStore: Send + Sync {
    /// Write (or overwrite) the slot for `(round, participant)`
    fn insert(
        &self,
        round: RoundId,
        participant: ParticipantId,
        commitment: &Commitment,
    ) -> Result<(), LedgerError>;

    /// Load every stored slot
    fn load_all(&self) -> Result<BTreeMap<(RoundId, ParticipantId), Commitment>, LedgerError>;
}

/// Sled-based persistent commitment store
///
/// Keys are `round (8 bytes BE) || participant (32 bytes)`, values are JSON.
pub struct SledCommitmentStore {
    db: sled::Db,
}

impl SledCommitmentStore {
    /// Open a persistent store at the given path
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, LedgerError> {
        let db = sled::open(path)
            .map_err(|e| LedgerError::Storage(format!("Failed to open sled DB: {}", e)))?;
        Ok(Self { db })
    }

    /// Create a temporary store (for testing and simulation)
    pub fn open_temp() -> Result<Self, LedgerError> {
        let config = sled::Config::new().temporary(true);
        let db = config
            .open()
            .map_err(|e| LedgerError::Storage(format!("Failed to open temp DB: {}", e)))?;
        Ok(Self { db })
    }

    fn slot_key(round: RoundId, participant: &ParticipantId) -> [u8; 40] {
        let mut key = [0u8; 40];
        key[..8].copy_from_slice(&round.0.to_be_bytes());
        key[8..].copy_from_slice(participant.as_bytes());
        key
    }
}

impl CommitmentStore for SledCommitmentStore {
    fn insert(
        &self,
        round: RoundId,
        participant: ParticipantId,
        commitment: &Commitment,
    ) -> Result<(), LedgerError> {
        let value = serde_json::to_vec(commitment)
            .map_err(|e| LedgerError::Storage(format!("Encode failed: {}", e)))?;
        self.db
            .insert(Self::slot_key(round, &participant), value)
            .map_err(|e| LedgerError::Storage(format!("Insert failed: {}", e)))?;
        self.db
            .flush()
            .map_err(|e| LedgerError::Storage(format!("Flush failed: {}", e)))?;
        Ok(())
    }

    fn load_all(&self) -> Result<BTreeMap<(RoundId, ParticipantId), Commitment>, LedgerError> {
        let mut slots = BTreeMap::new();
        for result in self.db.iter() {
            let (key, value) = result
                .map_err(|e| LedgerError::Storage(format!("Iteration failed: {}", e)))?;
            if key.len() != 40 {
                continue;
            }
            let mut round_bytes = [0u8; 8];
            round_bytes.copy_from_slice(&key[..8]);
            let mut participant = [0u8; 32];
            participant.copy_from_slice(&key[8..]);

            let commitment: Commitment = serde_json::from_slice(&value)
                .map_err(|e| LedgerError::Storage(format!("Decode failed: {}", e)))?;
            slots.insert(
                (RoundId(u64::from_be_bytes(round_bytes)), ParticipantId(participant)),
                commitment,
            );
        }
        Ok(slots)
    }
}

// ============================================================================
// COMMITMENT LEDGER
// ============================================================================

/// Per-round, per-participant commit/reveal/forfeit state machine
///
/// Handles:
/// - Commitment admission (nonzero digest, nonzero stake, one slot per round)
/// - Reveal verification against the stored digest
/// - Forfeiture of unrevealed stakes
/// - **Audit**: Optional persistent mirror of every slot
///
/// All mutation goes through `&mut self`; the surrounding ledger serializes
/// calls, so a slot never sees two writers. A failed call leaves the table
/// untouched.
pub struct CommitmentLedger {
    /// Owned commitment table
    slots: BTreeMap<(RoundId, ParticipantId), Commitment>,

    /// Facts emitted since the last `take_facts`
    facts: Vec<LedgerFact>,

    /// Optional persistent mirror
    store: Option<Arc<dyn CommitmentStore>>,
}

impl CommitmentLedger {
    /// Create an empty in-memory ledger
    pub fn new() -> Self {
        Self {
            slots: BTreeMap::new(),
            facts: Vec::new(),
            store: None,
        }
    }

    /// Create a ledger mirrored to a persistent store
    ///
    /// Hydrates the in-memory table from the store on creation.
    pub fn with_store(store: Arc<dyn CommitmentStore>) -> Result<Self, LedgerError> {
        let slots = store.load_all()?;
        debug!("Hydrated {} commitment slots from store", slots.len());

        Ok(Self {
            slots,
            facts: Vec::new(),
            store: Some(store),
        })
    }

    /// Record a commitment and its stake
    ///
    /// # Arguments
    /// * `round` - Round the commitment belongs to
    /// * `participant` - Ledger-authenticated caller
    /// * `digest` - Output of `generate_commitment_hash`
    /// * `amount` - Stake collected by the calling game
    pub fn commit(
        &mut self,
        round: RoundId,
        participant: ParticipantId,
        digest: Hash,
        amount: u128,
    ) -> Result<(), LedgerError> {
        if digest == ZERO_HASH {
            return Err(LedgerError::ZeroDigest);
        }
        if amount == 0 {
            return Err(LedgerError::ZeroStake);
        }
        if let Some(existing) = self.slots.get(&(round, participant)) {
            // The digest is write-once, so even a forfeited slot stays closed
            return Err(if existing.is_active() {
                LedgerError::AlreadyCommitted { round, participant }
            } else {
                LedgerError::SlotForfeited { round, participant }
            });
        }

        let commitment = Commitment {
            hash: digest,
            amount,
            revealed: false,
            revealed_choice: None,
        };
        persist(self.store.as_deref(), round, participant, &commitment);
        self.slots.insert((round, participant), commitment);
        self.emit(LedgerFact::Committed { round, participant, amount });

        Ok(())
    }

    /// Open a commitment
    ///
    /// Recomputes the digest from `(choice, secret, participant)` and checks
    /// it against the stored one. Returns the revealed choice.
    pub fn reveal(
        &mut self,
        round: RoundId,
        participant: ParticipantId,
        choice: u8,
        secret: &Hash,
    ) -> Result<u8, LedgerError> {
        let commitment = match self.slots.get_mut(&(round, participant)) {
            Some(c) if c.is_active() => c,
            _ => return Err(LedgerError::NoActiveCommitment { round, participant }),
        };
        if commitment.revealed {
            return Err(LedgerError::AlreadyRevealed { round, participant });
        }
        if generate_commitment_hash(choice, secret, &participant) != commitment.hash {
            return Err(LedgerError::DigestMismatch);
        }

        commitment.revealed = true;
        commitment.revealed_choice = Some(choice);
        persist(self.store.as_deref(), round, participant, commitment);
        self.emit(LedgerFact::Revealed { round, participant, choice });

        Ok(choice)
    }

    /// Seize the stake of an unrevealed commitment
    ///
    /// Returns the forfeited amount, or 0 when there is nothing to seize
    /// (no slot, already forfeited, or already revealed).
    pub fn forfeit(&mut self, round: RoundId, participant: ParticipantId) -> u128 {
        let commitment = match self.slots.get_mut(&(round, participant)) {
            Some(c) if c.can_reveal() => c,
            _ => return 0,
        };

        let amount = std::mem::take(&mut commitment.amount);
        persist(self.store.as_deref(), round, participant, commitment);
        self.emit(LedgerFact::Forfeited { round, participant, amount });

        amount
    }

    /// Forfeit every participant in `round` who has not revealed
    ///
    /// Returns the total seized.
    pub fn forfeit_unrevealed(&mut self, round: RoundId) -> u128 {
        self.unrevealed(round)
            .into_iter()
            .fold(0u128, |total, p| total.saturating_add(self.forfeit(round, p)))
    }

    /// Has a commitment whose stake is still at risk
    pub fn has_active_commitment(&self, round: RoundId, participant: ParticipantId) -> bool {
        self.slots
            .get(&(round, participant))
            .is_some_and(Commitment::is_active)
    }

    /// Has committed at some point, forfeited or not
    pub fn has_ever_committed(&self, round: RoundId, participant: ParticipantId) -> bool {
        self.slots
            .get(&(round, participant))
            .is_some_and(|c| c.hash != ZERO_HASH)
    }

    pub fn has_revealed(&self, round: RoundId, participant: ParticipantId) -> bool {
        self.slots
            .get(&(round, participant))
            .is_some_and(|c| c.revealed)
    }

    pub fn can_reveal(&self, round: RoundId, participant: ParticipantId) -> bool {
        self.slots
            .get(&(round, participant))
            .is_some_and(Commitment::can_reveal)
    }

    /// Full snapshot of one slot
    pub fn commitment(&self, round: RoundId, participant: ParticipantId) -> Option<Commitment> {
        self.slots.get(&(round, participant)).cloned()
    }

    /// All slots of a round, ordered by participant
    pub fn round_commitments(&self, round: RoundId) -> Vec<(ParticipantId, Commitment)> {
        let lo = (round, ParticipantId([0x00; 32]));
        let hi = (round, ParticipantId([0xff; 32]));
        self.slots
            .range(lo..=hi)
            .map(|((_, p), c)| (*p, c.clone()))
            .collect()
    }

    /// Participants in `round` who can still reveal
    pub fn unrevealed(&self, round: RoundId) -> Vec<ParticipantId> {
        self.round_commitments(round)
            .into_iter()
            .filter(|(_, c)| c.can_reveal())
            .map(|(p, _)| p)
            .collect()
    }

    /// Drain the facts emitted since the last call
    pub fn take_facts(&mut self) -> Vec<LedgerFact> {
        std::mem::take(&mut self.facts)
    }

    /// Number of slots ever created
    pub fn slot_count(&self) -> usize {
        self.slots.len()
    }

    fn emit(&mut self, fact: LedgerFact) {
        debug!(?fact, "ledger fact");
        self.facts.push(fact);
    }
}

/// Mirror one slot to the store, if any.
fn persist(
    store: Option<&dyn CommitmentStore>,
    round: RoundId,
    participant: ParticipantId,
    commitment: &Commitment,
) {
    if let Some(store) = store {
        if let Err(e) = store.insert(round, participant, commitment) {
            // The in-memory table stays authoritative
            warn!("Failed to persist commitment {} / {}: {}", round, participant, e);
        }
    }
}

impl Default for CommitmentLedger {
    fn default() -> Self {
        Self::new()
    }
}
