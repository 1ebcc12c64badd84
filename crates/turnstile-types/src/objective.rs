//! # Objectives
//!
//! An objective is a named multi-step goal driven to completion by repeated
//! cranking. The set of kinds is closed: dispatch is an exhaustive match, so
//! adding a kind is a compile-checked change everywhere it is handled.

use serde::{Deserialize, Serialize};

use crate::entities::{Address, ChannelId, FixedPart, Participant};

/// How a channel gets its funds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FundingStrategy {
    /// Each participant deposits on-chain, in participant order.
    Direct,
    /// A ledger channel's allocation backs the new channel.
    Ledger,
    /// A hub-mediated joint channel guarantees the new channel.
    Virtual,
    /// Treated as instantly funded. Test environments only.
    Fake,
}

/// Open a channel: exchange setup states and fund it.
///
/// The proposal carries everything a peer needs to construct the channel
/// record from scratch: the fixed part and the participant routing table.
/// The receiving engine recomputes the channel id from the fixed part and
/// rejects a proposal whose `target_channel` does not match.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OpenChannel {
    /// The channel being opened.
    pub target_channel: ChannelId,
    /// The channel's immutable part.
    pub fixed: FixedPart,
    /// Messaging identities, in participant order.
    pub participants: Vec<Participant>,
    /// How the channel gets funded once the prefund round completes.
    pub funding_strategy: FundingStrategy,
}

/// Close a channel: agree a final state, then defund.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CloseChannel {
    /// The channel being closed.
    pub target_channel: ChannelId,
}

/// Fund a sub-channel out of a ledger channel's allocation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FundLedgerChannel {
    /// The sub-channel receiving the guarantee.
    pub target_channel: ChannelId,
    /// The ledger channel whose allocation is debited.
    pub ledger_channel: ChannelId,
}

/// Fund a channel through a hub-mediated joint channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FundVirtualChannel {
    /// The channel receiving the guarantee.
    pub target_channel: ChannelId,
    /// The joint channel (target participants + hub) carrying the guarantee.
    pub joint_channel: ChannelId,
    /// The intermediary's signing address.
    pub hub: Address,
}

/// Release a channel's backing funds after it has concluded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Defund {
    /// The concluded channel.
    pub target_channel: ChannelId,
}

/// The closed set of objective kinds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Objective {
    /// Open (and fund) a channel.
    OpenChannel(OpenChannel),
    /// Close (and defund) a channel.
    CloseChannel(CloseChannel),
    /// Fund a sub-channel from a ledger channel.
    FundLedgerChannel(FundLedgerChannel),
    /// Fund a channel through a hub.
    FundVirtualChannel(FundVirtualChannel),
    /// Defund a concluded channel.
    Defund(Defund),
}

impl Objective {
    /// The channel this objective is driving.
    pub fn target_channel(&self) -> ChannelId {
        match self {
            Objective::OpenChannel(o) => o.target_channel,
            Objective::CloseChannel(o) => o.target_channel,
            Objective::FundLedgerChannel(o) => o.target_channel,
            Objective::FundVirtualChannel(o) => o.target_channel,
            Objective::Defund(o) => o.target_channel,
        }
    }

    /// Every channel this objective reads or mutates.
    pub fn channels(&self) -> Vec<ChannelId> {
        match self {
            Objective::OpenChannel(o) => vec![o.target_channel],
            Objective::CloseChannel(o) => vec![o.target_channel],
            Objective::FundLedgerChannel(o) => vec![o.target_channel, o.ledger_channel],
            Objective::FundVirtualChannel(o) => vec![o.target_channel, o.joint_channel],
            Objective::Defund(o) => vec![o.target_channel],
        }
    }

    /// Deterministic objective id.
    ///
    /// Ids are a pure function of the objective so a duplicate proposal (or a
    /// re-delivered message) maps onto the existing objective instead of
    /// spawning a second one.
    pub fn id(&self) -> String {
        let kind = match self {
            Objective::OpenChannel(_) => "OpenChannel",
            Objective::CloseChannel(_) => "CloseChannel",
            Objective::FundLedgerChannel(_) => "FundLedgerChannel",
            Objective::FundVirtualChannel(_) => "FundVirtualChannel",
            Objective::Defund(_) => "Defund",
        };
        format!("{kind}-0x{}", hex_encode(&self.target_channel()))
    }
}

/// Terminal outcome of an objective.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ObjectiveOutcome {
    /// The objective's goal was reached.
    Success,
    /// The objective was abandoned or cannot complete.
    Failure,
}

fn hex_encode(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}
