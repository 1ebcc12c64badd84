//! # API Results
//!
//! Every engine call returns what changed (a channel view), what must leave
//! the process (outbound notices), and what must reach the chain (pending
//! transactions). The caller owns delivery of the latter two.

use serde::{Deserialize, Serialize};
use turnstile_types::{
    ChainTransaction, ChannelId, Notice, ObjectiveOutcome, Outcome, Stage,
};

/// A caller-facing snapshot of one channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelResult {
    /// The channel.
    pub channel_id: ChannelId,
    /// Turn number of the supported state, if any.
    pub turn_num: Option<u64>,
    /// Stage derived from the supported state.
    pub stage: Stage,
    /// Outcome of the supported state, if any.
    pub outcome: Option<Outcome>,
    /// True once the channel's funding target is met.
    pub funded: bool,
}

/// Status of one objective, reported back to the caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectiveStatus {
    /// Deterministic objective id.
    pub objective_id: String,
    /// Set once the objective reached a terminal status.
    pub outcome: Option<ObjectiveOutcome>,
}

/// The full result of one engine call.
#[derive(Debug, Clone, Default)]
pub struct EngineResponse {
    /// Snapshot of the touched channel, when one exists.
    pub channel_result: Option<ChannelResult>,
    /// Objectives created or progressed by this call.
    pub objectives: Vec<ObjectiveStatus>,
    /// Outbound notices, already merged and deduplicated.
    pub outbox: Vec<Notice>,
    /// Transactions awaiting submission through the chain service.
    pub chain_requests: Vec<ChainTransaction>,
}

impl EngineResponse {
    /// Fold another response into this one.
    pub fn absorb(&mut self, other: EngineResponse) {
        if other.channel_result.is_some() {
            self.channel_result = other.channel_result;
        }
        self.objectives.extend(other.objectives);
        self.outbox.extend(other.outbox);
        self.chain_requests.extend(other.chain_requests);
    }
}
