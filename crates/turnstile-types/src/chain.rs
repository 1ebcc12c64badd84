//! # Chain Boundary Types
//!
//! Transactions the engine submits to the adjudicator and the events it
//! watches for. The set is fixed by the adjudicator ABI; the transport (RPC,
//! in-memory mock) is an adapter concern.

use serde::{Deserialize, Serialize};

use crate::entities::{Address, ChannelId, FixedPart, Hash, U256};
use crate::signed_state::SignedState;

/// A transaction bound for the adjudicator.
///
/// Dispute transactions carry the channel's fixed part, as the on-chain ABI
/// does: the adjudicator stores only hashes and re-derives everything from
/// calldata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChainTransaction {
    /// Fund a channel. `expected_held` guards against double-funding races:
    /// the deposit reverts unless current holdings equal it.
    Deposit {
        channel_id: ChannelId,
        asset: Address,
        amount: U256,
        expected_held: U256,
    },
    /// Assert `support`'s head state is the latest, starting the countdown.
    Challenge {
        fixed: FixedPart,
        support: Vec<SignedState>,
        challenger: Address,
    },
    /// Clear a challenge with the immediate successor state.
    Respond {
        fixed: FixedPart,
        response: SignedState,
    },
    /// Clear a challenge by proving the challenger signed a later state.
    Refute {
        fixed: FixedPart,
        declared_turn_num_record: u64,
        refutation: SignedState,
    },
    /// Advance the turn-number record without disputing.
    Checkpoint {
        fixed: FixedPart,
        support: Vec<SignedState>,
    },
    /// Finalize immediately on a unanimous final state.
    Conclude {
        fixed: FixedPart,
        finale: SignedState,
    },
    /// Release a finalized channel's funds per its outcome.
    TransferAllAssets { channel_id: ChannelId },
    /// Release a guarantee claim against a finalized guarantor channel.
    Claim { channel_id: ChannelId },
}

impl ChainTransaction {
    /// The channel this transaction touches.
    ///
    /// Dispute transactions name their channel through the states they
    /// carry; a malformed submission with no states maps to the zero id and
    /// fails validation downstream.
    pub fn channel_id(&self) -> ChannelId {
        match self {
            ChainTransaction::Deposit { channel_id, .. }
            | ChainTransaction::TransferAllAssets { channel_id }
            | ChainTransaction::Claim { channel_id } => *channel_id,
            ChainTransaction::Challenge { support, .. }
            | ChainTransaction::Checkpoint { support, .. } => support
                .last()
                .map(|signed| signed.channel_id())
                .unwrap_or(crate::entities::HASH_ZERO),
            ChainTransaction::Respond { response, .. } => response.channel_id(),
            ChainTransaction::Refute { refutation, .. } => refutation.channel_id(),
            ChainTransaction::Conclude { finale, .. } => finale.channel_id(),
        }
    }

    /// Short name for logging and handles.
    pub fn kind(&self) -> &'static str {
        match self {
            ChainTransaction::Deposit { .. } => "deposit",
            ChainTransaction::Challenge { .. } => "challenge",
            ChainTransaction::Respond { .. } => "respond",
            ChainTransaction::Refute { .. } => "refute",
            ChainTransaction::Checkpoint { .. } => "checkpoint",
            ChainTransaction::Conclude { .. } => "conclude",
            ChainTransaction::TransferAllAssets { .. } => "transferAllAssets",
            ChainTransaction::Claim { .. } => "claim",
        }
    }
}

/// Handle returned for a submitted transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxHandle {
    /// Monotone submission id, unique per chain service instance.
    pub tx_id: u64,
}

/// An adjudicator event observed on-chain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChainEvent {
    /// A deposit landed.
    Deposited {
        channel_id: ChannelId,
        asset: Address,
        amount: U256,
    },
    /// A channel's holdings changed (deposit or payout).
    AllocationUpdated {
        channel_id: ChannelId,
        asset: Address,
        new_holding: U256,
    },
    /// A challenge was registered; the countdown is running.
    ChallengeRegistered {
        channel_id: ChannelId,
        turn_num_record: u64,
        finalizes_at: u64,
        challenger: Address,
        state_hash: Hash,
        outcome_hash: Hash,
    },
    /// The channel finalized (conclusion or matured challenge).
    ChannelFinalized { channel_id: ChannelId },
}

impl ChainEvent {
    /// The channel this event concerns.
    pub fn channel_id(&self) -> ChannelId {
        match self {
            ChainEvent::Deposited { channel_id, .. }
            | ChainEvent::AllocationUpdated { channel_id, .. }
            | ChainEvent::ChallengeRegistered { channel_id, .. }
            | ChainEvent::ChannelFinalized { channel_id } => *channel_id,
        }
    }
}
