//! # Challenge Records
//!
//! The on-chain channel storage mirrored into this process via chain events.

use serde::{Deserialize, Serialize};
use turnstile_crypto::channel_storage_hash;
use turnstile_types::{Address, Hash, ADDRESS_ZERO, HASH_ZERO};

/// One channel's adjudicator storage.
///
/// `keccak256` of the five fields is what the chain actually stores; zeroed
/// challenge fields denote "no active challenge".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChallengeRecord {
    /// Highest turn number the chain has seen proven.
    pub turn_num_record: u64,
    /// Unix time the current challenge matures, 0 when none is active.
    pub finalizes_at: u64,
    /// Hash of the challenge state, zero when none is active.
    pub state_hash: Hash,
    /// Who registered the challenge, zero address when none is active.
    pub challenger: Address,
    /// Hash of the challenge state's outcome, zero when none is active.
    pub outcome_hash: Hash,
}

impl ChallengeRecord {
    /// Storage with no active challenge at a given turn-number record.
    pub fn cleared(turn_num_record: u64) -> Self {
        Self {
            turn_num_record,
            finalizes_at: 0,
            state_hash: HASH_ZERO,
            challenger: ADDRESS_ZERO,
            outcome_hash: HASH_ZERO,
        }
    }

    /// True while a challenge countdown is running or matured.
    pub fn is_active(&self) -> bool {
        self.finalizes_at != 0
    }

    /// True once an active challenge's countdown has elapsed.
    pub fn is_expired(&self, now: u64) -> bool {
        self.is_active() && now >= self.finalizes_at
    }

    /// The hash the chain stores for this record.
    pub fn storage_hash(&self) -> Hash {
        channel_storage_hash(
            self.turn_num_record,
            self.finalizes_at,
            &self.state_hash,
            &self.challenger,
            &self.outcome_hash,
        )
    }
}

impl Default for ChallengeRecord {
    fn default() -> Self {
        Self::cleared(0)
    }
}
