//! Deterministic participant key and secret provider for simulation.

use ed25519_dalek::SigningKey;
use fairground_env::{Hash, ParticipantId, RoundId};
use rand::{RngCore, SeedableRng};
use rand_chacha::ChaCha8Rng;
use std::collections::HashMap;

/// Provides deterministic participant identities and commitment secrets.
///
/// In simulation, we need reproducible participants for each run.
/// This provider generates keys that are:
/// - Deterministic: Same seed always produces same keys and secrets
/// - Unique: Each participant gets a different key
/// - Isolated: Changing participant count doesn't affect other participants
pub struct DeterministicKeyProvider {
    /// Master seed
    master_seed: u64,

    /// Cache of generated keys by participant index
    key_cache: HashMap<u64, SigningKey>,
}

impl DeterministicKeyProvider {
    /// Creates a new key provider with the given master seed.
    pub fn new(master_seed: u64) -> Self {
        Self {
            master_seed,
            key_cache: HashMap::new(),
        }
    }

    /// Generates or retrieves the signing key for a participant.
    ///
    /// The key is derived deterministically from:
    /// `master_seed * golden + index * prime`
    pub fn participant_key(&mut self, index: u64) -> SigningKey {
        if let Some(key) = self.key_cache.get(&index) {
            return key.clone();
        }

        let participant_seed = self
            .master_seed
            .wrapping_mul(0x9e3779b97f4a7c15) // Golden ratio prime
            .wrapping_add(index.wrapping_mul(0x517cc1b727220a95));

        let mut rng = ChaCha8Rng::seed_from_u64(participant_seed);
        let key = SigningKey::generate(&mut rng);

        self.key_cache.insert(index, key.clone());
        key
    }

    /// Ledger identity of a participant (its verifying key).
    pub fn participant_id(&mut self, index: u64) -> ParticipantId {
        ParticipantId::from_verifying_key(&self.participant_key(index).verifying_key())
    }

    /// Generates a batch of participant identities.
    pub fn participants(&mut self, count: usize) -> Vec<ParticipantId> {
        (0..count as u64).map(|i| self.participant_id(i)).collect()
    }

    /// Commitment secret a participant uses in a round.
    ///
    /// Fresh per (participant, round), never reused across rounds.
    pub fn secret(&self, index: u64, round: RoundId) -> Hash {
        let secret_seed = self
            .master_seed
            .wrapping_mul(0x3c6ef372fe94f82b)
            .wrapping_add(index.wrapping_mul(0x517cc1b727220a95))
            ^ round.0.wrapping_mul(0x9e3779b97f4a7c15);
        let mut rng = ChaCha8Rng::seed_from_u64(secret_seed);
        let mut secret = [0u8; 32];
        rng.fill_bytes(&mut secret);
        secret
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deterministic_participants() {
        let mut provider1 = DeterministicKeyProvider::new(42);
        let mut provider2 = DeterministicKeyProvider::new(42);

        assert_eq!(provider1.participant_id(5), provider2.participant_id(5));
        assert_eq!(provider1.secret(5, RoundId(1)), provider2.secret(5, RoundId(1)));
    }

    #[test]
    fn test_different_participants_different_keys() {
        let mut provider = DeterministicKeyProvider::new(42);
        let ids = provider.participants(3);

        assert_ne!(ids[0], ids[1]);
        assert_ne!(ids[1], ids[2]);
        assert_ne!(ids[0], ids[2]);
    }

    #[test]
    fn test_secrets_fresh_per_round() {
        let provider = DeterministicKeyProvider::new(42);
        assert_ne!(provider.secret(0, RoundId(1)), provider.secret(0, RoundId(2)));
        assert_ne!(provider.secret(0, RoundId(1)), provider.secret(1, RoundId(1)));
    }

    #[test]
    fn test_key_isolation() {
        // Adding more participants shouldn't change existing keys
        let mut provider1 = DeterministicKeyProvider::new(42);
        let mut provider2 = DeterministicKeyProvider::new(42);

        let ids1 = provider1.participants(3);
        let ids2 = provider2.participants(10);

        assert_eq!(ids1[..], ids2[..3]);
    }
}
