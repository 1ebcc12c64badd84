//! # Crank Actions
//!
//! A crank maps protocol state to at most one action. The scheduler applies
//! the action, then re-cranks until the protocol returns [`Action::NoAction`]
//! twice in a row or completes.

use turnstile_store::StateUpdate;
use turnstile_types::{Address, ChainTransaction, ChannelId, ObjectiveOutcome, U256};

/// How to produce the signature the crank is asking for.
#[derive(Debug, Clone)]
pub enum SignAction {
    /// Sign the setup state at this turn: a copy of the previous turn's
    /// content (or the existing state at this turn, if already stored).
    SetupTurn { turn_num: u64 },
    /// Add our signature to the state already stored at this turn.
    Countersign { turn_num: u64 },
    /// Build the next state from the supported one and sign it.
    Next(StateUpdate),
}

/// One step requested by a crank.
#[derive(Debug, Clone)]
pub enum Action {
    /// Sign and store a state on a channel, then relay it to peers.
    SignState {
        channel_id: ChannelId,
        sign: SignAction,
    },
    /// Submit an adjudicator transaction.
    SubmitTransaction(ChainTransaction),
    /// Record off-chain guarantee funding observed for a channel.
    RecordFunding {
        channel_id: ChannelId,
        asset: Address,
        amount: U256,
    },
    /// The objective reached a terminal status.
    Complete(ObjectiveOutcome),
    /// Nothing to do; the protocol is waiting on external input.
    NoAction,
}

impl Action {
    /// True for [`Action::NoAction`].
    pub fn is_noop(&self) -> bool {
        matches!(self, Action::NoAction)
    }
}
