//! # Protocol State Views
//!
//! Read-only views the scheduler hands to crank functions. Cranks are pure:
//! given an identical view they return the identical action, which is what
//! makes message re-delivery and crash recovery a matter of re-cranking.

use turnstile_store::ChannelRecord;
use turnstile_types::{Address, ChannelId, FundingStrategy};

/// View for the open-channel protocol.
#[derive(Debug, Clone, Copy)]
pub struct OpenState<'a> {
    /// The local participant approved this objective.
    pub approved: bool,
    /// How the channel gets funded.
    pub strategy: FundingStrategy,
    /// A deposit transaction is already in flight.
    pub deposit_in_flight: bool,
    /// The channel being opened.
    pub app: &'a ChannelRecord,
}

/// View for the close-channel protocol.
#[derive(Debug, Clone, Copy)]
pub struct CloseState<'a> {
    /// The local participant approved this objective.
    pub approved: bool,
    /// This engine created the objective (and therefore submits on-chain).
    pub originated_locally: bool,
    /// A conclude transaction is already in flight or confirmed.
    pub conclude_submitted: bool,
    /// A payout transaction is already in flight or confirmed.
    pub transfer_submitted: bool,
    /// The channel being closed.
    pub app: &'a ChannelRecord,
}

/// View for the ledger-funding protocol.
#[derive(Debug, Clone, Copy)]
pub struct LedgerState<'a> {
    /// The local participant approved this objective.
    pub approved: bool,
    /// The sub-channel receiving the guarantee.
    pub app: &'a ChannelRecord,
    /// The ledger channel whose allocation is debited.
    pub ledger: &'a ChannelRecord,
}

/// The local participant's role in a virtual funding.
#[derive(Debug, Clone, Copy)]
pub enum VirtualRole<'a> {
    /// A target-channel participant; validates its own debit.
    Endpoint {
        /// The channel receiving the guarantee.
        app: &'a ChannelRecord,
    },
    /// The intermediary; validates that its allocation never moves.
    Hub,
}

/// View for the virtual-funding protocol.
#[derive(Debug, Clone, Copy)]
pub struct VirtualState<'a> {
    /// The local participant approved this objective.
    pub approved: bool,
    /// The joint channel (target participants + hub) carrying the guarantee.
    pub joint: &'a ChannelRecord,
    /// The channel being guaranteed.
    pub target_channel: ChannelId,
    /// The intermediary's signing address.
    pub hub: Address,
    /// This participant's role.
    pub role: VirtualRole<'a>,
}

/// View for the defund protocol.
#[derive(Debug, Clone, Copy)]
pub struct DefundState<'a> {
    /// A payout transaction is already in flight or confirmed.
    pub transfer_submitted: bool,
    /// The finalized channel.
    pub app: &'a ChannelRecord,
}

// =============================================================================
// GUARDS
// =============================================================================

/// True once the state at `turn_num` carries our signature.
pub fn signed_by_me(record: &ChannelRecord, turn_num: u64) -> bool {
    record
        .signers_at(turn_num)
        .is_some_and(|signers| signers.contains(&record.my_index()))
}

/// True once every prefund turn is covered by the supported state.
pub fn prefund_complete(record: &ChannelRecord) -> bool {
    let n = record.fixed().num_participants() as u64;
    record
        .supported_state()
        .is_some_and(|signed| signed.turn_num() >= n - 1)
}

/// True once every postfund turn is covered by the supported state.
pub fn postfund_complete(record: &ChannelRecord) -> bool {
    let n = record.fixed().num_participants() as u64;
    record
        .supported_state()
        .is_some_and(|signed| signed.turn_num() >= 2 * n - 1)
}

/// True once every asset's holding is back to zero.
pub fn defunded(record: &ChannelRecord) -> bool {
    record
        .supported_state()
        .map(|signed| {
            signed
                .state
                .outcome
                .assets()
                .all(|asset| record.holding(&asset.asset).is_zero())
        })
        .unwrap_or(true)
}
