//! # Core Domain Entities
//!
//! Defines the channel entities shared by every engine subsystem.
//!
//! ## Clusters
//!
//! - **Identity**: `Hash`, `Address`, `Signature`, `Destination`
//! - **Channel**: `FixedPart`, `State`, `Stage`
//! - **Participants**: `Participant`

use serde::{Deserialize, Serialize};
use serde_with::{serde_as, Bytes};

// Re-export U256 from primitive-types for use across all subsystems
pub use primitive_types::U256;

use crate::outcome::Outcome;

// =============================================================================
// CLUSTER A: IDENTITY
// =============================================================================

/// A 32-byte Keccak-256 hash.
pub type Hash = [u8; 32];

/// A 65-byte recoverable ECDSA signature (r || s || v).
pub type Signature = [u8; 65];

/// A 20-byte Ethereum-style address.
pub type Address = [u8; 20];

/// Channel identifier: `keccak256(chainId, participants, channelNonce)`.
pub type ChannelId = Hash;

/// The zero address, used on-chain to denote "no challenger".
pub const ADDRESS_ZERO: Address = [0u8; 20];

/// The zero hash, used on-chain to denote "no challenge state".
pub const HASH_ZERO: Hash = [0u8; 32];

/// A 32-byte allocation destination.
///
/// Either a zero-padded external address (funds leave the channel network on
/// payout) or a channel id (funds back another channel).
#[serde_as]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub struct Destination(#[serde_as(as = "Bytes")] pub [u8; 32]);

impl Destination {
    /// Destination for an external address (left-padded with zeros).
    pub fn from_address(address: Address) -> Self {
        let mut bytes = [0u8; 32];
        bytes[12..].copy_from_slice(&address);
        Self(bytes)
    }

    /// Destination backing another channel.
    pub fn from_channel(channel_id: ChannelId) -> Self {
        Self(channel_id)
    }

    /// True if the first 12 bytes are zero, i.e. this is an external address.
    pub fn is_external(&self) -> bool {
        self.0[..12].iter().all(|b| *b == 0)
    }

    /// Extract the external address, if this destination is one.
    pub fn as_address(&self) -> Option<Address> {
        if !self.is_external() {
            return None;
        }
        let mut address = [0u8; 20];
        address.copy_from_slice(&self.0[12..]);
        Some(address)
    }

    /// Interpret the destination as a channel id.
    pub fn as_channel_id(&self) -> ChannelId {
        self.0
    }
}

// =============================================================================
// CLUSTER B: THE CHANNEL
// =============================================================================

/// The immutable part of a channel.
///
/// The channel id is a pure function of these fields; changing any of them
/// names a different channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FixedPart {
    /// Chain the adjudicator lives on.
    pub chain_id: u64,
    /// Signing addresses of every participant, in turn order.
    pub participants: Vec<Address>,
    /// Nonce distinguishing channels with the same participants.
    pub channel_nonce: u64,
    /// Address of the application validator contract.
    pub app_definition: Address,
    /// Seconds a registered challenge stays open before finalizing.
    pub challenge_duration: u64,
}

impl FixedPart {
    /// Number of participants in the channel.
    pub fn num_participants(&self) -> usize {
        self.participants.len()
    }

    /// Index of the participant whose turn it is at `turn_num`.
    pub fn mover_index(&self, turn_num: u64) -> usize {
        (turn_num % self.participants.len() as u64) as usize
    }

    /// Signing address of the participant whose turn it is at `turn_num`.
    pub fn mover(&self, turn_num: u64) -> Address {
        self.participants[self.mover_index(turn_num)]
    }

    /// Position of a signing address in the participant list.
    pub fn index_of(&self, address: &Address) -> Option<usize> {
        self.participants.iter().position(|p| p == address)
    }
}

/// The variable part of a channel at one turn.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct State {
    /// Monotonically increasing sequence number.
    pub turn_num: u64,
    /// Final states short-circuit the challenge countdown on conclusion.
    pub is_final: bool,
    /// Channel this state belongs to.
    pub channel_id: ChannelId,
    /// Opaque application data, validated by the app definition only.
    pub app_data: Vec<u8>,
    /// Asset allocations paid out if this state finalizes.
    pub outcome: Outcome,
}

/// Protocol stage derived from the supported state.
///
/// The prefund round opens at turn 0 and takes one turn per participant; the
/// postfund round opens at turn `numParticipants`. Ordinary updates run from
/// turn `2 * numParticipants`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Stage {
    /// No supported state exists yet.
    Missing,
    /// Turns `0..n`: participants commit to the opening outcome.
    PrefundSetup,
    /// Turns `n..2n`: participants confirm funding landed.
    PostfundSetup,
    /// Ordinary turn-taking updates.
    Running,
    /// A final state; the channel can be concluded without a challenge.
    Final,
}

impl Stage {
    /// Derive the stage of a state given the participant count.
    pub fn of(turn_num: u64, is_final: bool, num_participants: usize) -> Self {
        let n = num_participants as u64;
        if is_final {
            Stage::Final
        } else if turn_num < n {
            Stage::PrefundSetup
        } else if turn_num < 2 * n {
            Stage::PostfundSetup
        } else {
            Stage::Running
        }
    }
}

// =============================================================================
// CLUSTER C: PARTICIPANTS
// =============================================================================

/// A channel participant as known to the messaging layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Participant {
    /// Address the participant signs channel states with.
    pub signing_address: Address,
    /// Routing identifier used by the message service.
    pub participant_id: String,
    /// Where this participant's funds go on payout.
    pub destination: Destination,
}
