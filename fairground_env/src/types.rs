//! Common types for the Fairground environment abstraction.

use ed25519_dalek::VerifyingKey;
use serde::{Deserialize, Serialize};

/// A 32-byte ledger hash.
pub type Hash = [u8; 32];

/// The "no value" sentinel: never a valid commitment digest or seed.
pub const ZERO_HASH: Hash = [0u8; 32];

/// Opaque identifier scoping a batch of commitments resolved together.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct RoundId(pub u64);

impl RoundId {
    /// Returns the raw round number.
    pub fn get(&self) -> u64 {
        self.0
    }
}

impl From<u64> for RoundId {
    fn from(value: u64) -> Self {
        Self(value)
    }
}

impl std::fmt::Display for RoundId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "round#{}", self.0)
    }
}

/// Identity of a participant on the ledger.
///
/// This is what the commitment digest binds to, so it must be the identity
/// the ledger authenticated for the call, not a caller-supplied label.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ParticipantId(pub [u8; 32]);

impl ParticipantId {
    /// Creates a ParticipantId from raw identity bytes.
    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Creates a ParticipantId from an Ed25519 verifying key.
    pub fn from_verifying_key(key: &VerifyingKey) -> Self {
        Self(key.to_bytes())
    }

    /// Creates a deterministic ParticipantId from a seed (for tests).
    pub fn from_seed(seed: u64) -> Self {
        let mut bytes = [0u8; 32];
        bytes[0..8].copy_from_slice(&seed.to_le_bytes());
        bytes[8..16].copy_from_slice(&seed.wrapping_mul(0x517cc1b727220a95).to_le_bytes());
        bytes[16..24].copy_from_slice(&seed.wrapping_mul(0x9e3779b97f4a7c15).to_le_bytes());
        bytes[24..32].copy_from_slice(&(!seed).to_le_bytes());
        Self(bytes)
    }

    /// Returns the identity bytes.
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

impl std::fmt::Display for ParticipantId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // First 4 bytes are enough to tell participants apart in logs
        write!(f, "{}", hex::encode(&self.0[..4]))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ed25519_dalek::SigningKey;
    use rand::rngs::OsRng;

    #[test]
    fn test_participant_from_seed_deterministic() {
        assert_eq!(ParticipantId::from_seed(7), ParticipantId::from_seed(7));
        assert_ne!(ParticipantId::from_seed(7), ParticipantId::from_seed(8));
    }

    #[test]
    fn test_participant_from_verifying_key() {
        let key = SigningKey::generate(&mut OsRng);
        let id = ParticipantId::from_verifying_key(&key.verifying_key());
        assert_eq!(id.as_bytes(), &key.verifying_key().to_bytes());
    }

    #[test]
    fn test_display_is_short_hex() {
        let id = ParticipantId::from_bytes([0xab; 32]);
        assert_eq!(id.to_string(), "abababab");
        assert_eq!(RoundId(3).to_string(), "round#3");
    }

    #[test]
    fn test_round_ordering() {
        assert!(RoundId(1) < RoundId(2));
        assert_eq!(RoundId::from(9).get(), 9);
    }
}
